//! Builds an SSA instruction stream (`spec.md` §4.3, §5).
//!
//! Every instruction that produces a value writes its destination
//! [`VarId`] first (allocated from the writer's own monotonic counter),
//! then its [`TypeInfo`], then its operands. Instructions with no result
//! (`Store*`, `Ret`, `Jump*`) skip the destination. This mirrors the
//! source's writer: one counter per function body, ids handed out in
//! emission order, never reused.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::ir::opcode::CompareCondition;
use crate::ssa::opcode::{BinOp, SsaOpcode};
use crate::ssa::types as wire_types;
use crate::ssa::value::{VarId, VarIdAllocator};
use crate::types::TypeInfo;

/// A finished SSA instruction stream plus the type recorded for every
/// value id it defines.
#[derive(Debug, Clone, Default)]
pub struct SsaBuffer {
    pub bytes: Vec<u8>,
    pub types: HashMap<VarId, TypeInfo>,
}

/// Incrementally builds an [`SsaBuffer`] for one function body.
#[derive(Debug)]
pub struct SsaWriter {
    bytes: Vec<u8>,
    ids: VarIdAllocator,
    types: HashMap<VarId, TypeInfo>,
}

impl SsaWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            ids: VarIdAllocator::new(),
            types: HashMap::new(),
        }
    }

    fn emit_opcode(&mut self, op: SsaOpcode) {
        self.bytes.push(op as u8);
    }

    fn emit_var(&mut self, id: VarId) {
        self.bytes.extend_from_slice(&id.to_raw().to_le_bytes());
    }

    fn emit_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_i64(&mut self, v: i64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_type(&mut self, ty: TypeInfo) {
        wire_types::encode(ty, &mut self.bytes);
    }

    fn alloc_result(&mut self, ty: TypeInfo) -> VarId {
        let id = self.ids.alloc();
        self.types.insert(id, ty);
        self.emit_var(id);
        self.emit_type(ty);
        id
    }

    pub fn write_assign_variable(&mut self, ty: TypeInfo, src: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::AssignVariable);
        let id = self.alloc_result(ty);
        self.emit_var(src);
        id
    }

    pub fn write_assign_literal(&mut self, ty: TypeInfo, literal: i64) -> VarId {
        self.emit_opcode(SsaOpcode::AssignLiteral);
        let id = self.alloc_result(ty);
        self.emit_i64(literal);
        id
    }

    pub fn write_load(&mut self, ty: TypeInfo, ptr: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::Load);
        let id = self.alloc_result(ty);
        self.emit_var(ptr);
        id
    }

    pub fn write_load_global(&mut self, ty: TypeInfo, global: u32) -> VarId {
        self.emit_opcode(SsaOpcode::LoadGlobal);
        let id = self.alloc_result(ty);
        self.emit_u32(global);
        id
    }

    pub fn write_load_global_ext(&mut self, ty: TypeInfo, global: u32, module: u16) -> VarId {
        self.emit_opcode(SsaOpcode::LoadGlobalExt);
        let id = self.alloc_result(ty);
        self.emit_u32(global);
        self.emit_u16(module);
        id
    }

    pub fn write_store(&mut self, ptr: VarId, value: VarId) {
        self.emit_opcode(SsaOpcode::Store);
        self.emit_var(ptr);
        self.emit_var(value);
    }

    pub fn write_store_global(&mut self, global: u32, value: VarId) {
        self.emit_opcode(SsaOpcode::StoreGlobal);
        self.emit_u32(global);
        self.emit_var(value);
    }

    pub fn write_store_global_ext(&mut self, global: u32, module: u16, value: VarId) {
        self.emit_opcode(SsaOpcode::StoreGlobalExt);
        self.emit_u32(global);
        self.emit_u16(module);
        self.emit_var(value);
    }

    pub fn write_expand_sx(&mut self, ty: TypeInfo, src: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::ExpandSX);
        let id = self.alloc_result(ty);
        self.emit_var(src);
        id
    }

    pub fn write_expand_zx(&mut self, ty: TypeInfo, src: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::ExpandZX);
        let id = self.alloc_result(ty);
        self.emit_var(src);
        id
    }

    pub fn write_trunc(&mut self, ty: TypeInfo, src: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::Trunc);
        let id = self.alloc_result(ty);
        self.emit_var(src);
        id
    }

    pub fn write_binop_vtov(&mut self, ty: TypeInfo, op: BinOp, a: VarId, b: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::BinOpVtoV);
        let id = self.alloc_result(ty);
        self.bytes.push(op.to_u8());
        self.emit_var(a);
        self.emit_var(b);
        id
    }

    pub fn write_binop_vtoi(&mut self, ty: TypeInfo, op: BinOp, a: VarId, imm: i64) -> VarId {
        self.emit_opcode(SsaOpcode::BinOpVtoI);
        let id = self.alloc_result(ty);
        self.bytes.push(op.to_u8());
        self.emit_var(a);
        self.emit_i64(imm);
        id
    }

    pub fn write_binop_itov(&mut self, ty: TypeInfo, op: BinOp, imm: i64, b: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::BinOpItoV);
        let id = self.alloc_result(ty);
        self.bytes.push(op.to_u8());
        self.emit_i64(imm);
        self.emit_var(b);
        id
    }

    pub fn write_comp_vtov(&mut self, cond: CompareCondition, a: VarId, b: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::CompVtoV);
        let id = self.alloc_result(TypeInfo::BOOL);
        self.bytes.push(cond as u8);
        self.emit_var(a);
        self.emit_var(b);
        id
    }

    pub fn write_comp_vtoi(&mut self, cond: CompareCondition, a: VarId, imm: i64) -> VarId {
        self.emit_opcode(SsaOpcode::CompVtoI);
        let id = self.alloc_result(TypeInfo::BOOL);
        self.bytes.push(cond as u8);
        self.emit_var(a);
        self.emit_i64(imm);
        id
    }

    pub fn write_comp_itov(&mut self, cond: CompareCondition, imm: i64, b: VarId) -> VarId {
        self.emit_opcode(SsaOpcode::CompItoV);
        let id = self.alloc_result(TypeInfo::BOOL);
        self.bytes.push(cond as u8);
        self.emit_i64(imm);
        self.emit_var(b);
        id
    }

    pub fn write_compute_ptr(&mut self, ty: TypeInfo, base: VarId, offset: i64) -> VarId {
        self.emit_opcode(SsaOpcode::ComputePtr);
        let id = self.alloc_result(ty.with_pointer(true));
        self.emit_var(base);
        self.emit_i64(offset);
        id
    }

    /// Merges `parts` (in frame order) into one value of `ty` (`spec.md`
    /// §4.4's "Join" rule for a raw-byte frame that undershoots the
    /// requested size).
    pub fn write_join(&mut self, ty: TypeInfo, parts: &[VarId]) -> VarId {
        self.emit_opcode(SsaOpcode::Join);
        let id = self.alloc_result(ty);
        self.emit_u32(parts.len() as u32);
        for p in parts {
            self.emit_var(*p);
        }
        id
    }

    /// Splits `src` into a value of `ty` plus a remainder value
    /// (`spec.md` §4.4's "Split" rule for a frame that overshoots the
    /// requested size). Returns `(value, remainder)`.
    pub fn write_split(&mut self, ty: TypeInfo, remainder_ty: TypeInfo, src: VarId) -> (VarId, VarId) {
        self.emit_opcode(SsaOpcode::Split);
        let value = self.alloc_result(ty);
        let remainder = self.alloc_result(remainder_ty);
        self.emit_var(src);
        (value, remainder)
    }

    fn write_args(&mut self, args: &[VarId]) {
        self.emit_u32(args.len() as u32);
        for a in args {
            self.emit_var(*a);
        }
    }

    /// Calls carry their has-result flag before the result id, unlike every
    /// other result-producing instruction (`alloc_result`'s var-then-type
    /// order) — a decoder needs to know whether to expect a result at all
    /// before it can read one.
    fn alloc_call_result(&mut self, ty: TypeInfo) -> VarId {
        let id = self.ids.alloc();
        self.types.insert(id, ty);
        self.emit_type(ty);
        self.emit_var(id);
        id
    }

    pub fn write_call(&mut self, func_index: u32, args: &[VarId], ret_ty: Option<TypeInfo>) -> Option<VarId> {
        self.emit_opcode(SsaOpcode::Call);
        self.emit_u32(func_index);
        self.bytes.push(ret_ty.is_some() as u8);
        let id = ret_ty.map(|ty| self.alloc_call_result(ty));
        self.write_args(args);
        id
    }

    pub fn write_call_ext(
        &mut self,
        module: u16,
        func_index: u32,
        args: &[VarId],
        ret_ty: Option<TypeInfo>,
    ) -> Option<VarId> {
        self.emit_opcode(SsaOpcode::CallExt);
        self.emit_u16(module);
        self.emit_u32(func_index);
        self.bytes.push(ret_ty.is_some() as u8);
        let id = ret_ty.map(|ty| self.alloc_call_result(ty));
        self.write_args(args);
        id
    }

    pub fn write_call_ind(&mut self, target: VarId, args: &[VarId], ret_ty: Option<TypeInfo>) -> Option<VarId> {
        self.emit_opcode(SsaOpcode::CallInd);
        self.emit_var(target);
        self.bytes.push(ret_ty.is_some() as u8);
        let id = ret_ty.map(|ty| self.alloc_call_result(ty));
        self.write_args(args);
        id
    }

    pub fn write_call_ind_ext(
        &mut self,
        target: VarId,
        module: u16,
        args: &[VarId],
        ret_ty: Option<TypeInfo>,
    ) -> Option<VarId> {
        self.emit_opcode(SsaOpcode::CallIndExt);
        self.emit_var(target);
        self.emit_u16(module);
        self.bytes.push(ret_ty.is_some() as u8);
        let id = ret_ty.map(|ty| self.alloc_call_result(ty));
        self.write_args(args);
        id
    }

    pub fn write_ret(&mut self, value: Option<VarId>) {
        self.emit_opcode(SsaOpcode::Ret);
        self.bytes.push(value.is_some() as u8);
        if let Some(v) = value {
            self.emit_var(v);
        }
    }

    pub fn write_jump(&mut self, target: u32) {
        self.emit_opcode(SsaOpcode::Jump);
        self.emit_u32(target);
    }

    pub fn write_jump_true(&mut self, cond: VarId, target: u32) {
        self.emit_opcode(SsaOpcode::JumpTrue);
        self.emit_var(cond);
        self.emit_u32(target);
    }

    pub fn write_jump_false(&mut self, cond: VarId, target: u32) {
        self.emit_opcode(SsaOpcode::JumpFalse);
        self.emit_var(cond);
        self.emit_u32(target);
    }

    pub fn type_of(&self, id: VarId) -> Option<TypeInfo> {
        self.types.get(&id).copied()
    }

    pub fn next_id_peek(&self) -> u32 {
        self.ids.peek()
    }

    /// The byte offset the next-written instruction will start at. Passes
    /// that need to patch a jump target forward reference record this
    /// before emitting the jump and overwrite the placeholder once the
    /// destination is known.
    pub fn current_offset(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Overwrites the 4-byte little-endian target embedded at `offset`
    /// (the start of the `u32` operand, not the opcode byte). Used to
    /// back-patch a jump emitted before its destination was known.
    pub fn patch_u32_at(&mut self, offset: u32, value: u32) {
        let offset = offset as usize;
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn finish(self) -> SsaBuffer {
        SsaBuffer {
            bytes: self.bytes,
            types: self.types,
        }
    }
}

impl Default for SsaWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A small-vector of instruction operands, sized for the common 0–2 operand
/// case without heap allocation — used by the visitor when it needs to
/// collect a variable number of call arguments before dispatching.
pub type OperandVec = SmallVec<[VarId; 4]>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opcode::CompareCondition;

    #[test]
    fn assigns_monotonic_ids_starting_at_one() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 1);
        let b = w.write_assign_literal(TypeInfo::I32, 2);
        assert_eq!(a.local_id(), Some(1));
        assert_eq!(b.local_id(), Some(2));
    }

    #[test]
    fn records_result_types() {
        let mut w = SsaWriter::new();
        let v = w.write_assign_literal(TypeInfo::F64, 0);
        assert_eq!(w.type_of(v), Some(TypeInfo::F64));
    }

    #[test]
    fn compares_always_produce_bool() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 1);
        let b = w.write_assign_literal(TypeInfo::I32, 2);
        let c = w.write_comp_vtov(CompareCondition::Less, a, b);
        assert_eq!(w.type_of(c), Some(TypeInfo::BOOL));
    }

    #[test]
    fn call_without_return_type_yields_no_id() {
        let mut w = SsaWriter::new();
        let r = w.write_call(7, &[], None);
        assert!(r.is_none());
    }
}
