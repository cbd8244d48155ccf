//! Streams a decoded [`crate::ssa::writer::SsaBuffer`] to a visitor.
//!
//! Unlike the IR opcode set, every SSA instruction already carries its
//! operands explicitly — there is no family of one-byte "sugar" opcodes
//! collapsing onto a two-byte general form the way `Push0`..`Push3` do for
//! `PushN`. So the visitor here is one method per opcode with no default
//! dispatch to a generic fallback; each pass that walks SSA implements
//! exactly the handlers it cares about and lets `#[allow(unused)]` cover
//! the rest through the trait's provided no-op defaults.

use crate::error::DecodeError;
use crate::ir::opcode::CompareCondition;
use crate::ssa::opcode::SsaOpcode;
use crate::ssa::types as wire_types;
use crate::ssa::value::VarId;
use crate::types::TypeInfo;

pub(crate) fn read_u32(bytes: &[u8], off: usize) -> Result<(u32, usize), DecodeError> {
    let s: [u8; 4] = bytes
        .get(off..off + 4)
        .ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?
        .try_into()
        .expect("slice of length 4");
    Ok((u32::from_le_bytes(s), 4))
}

pub(crate) fn read_u16(bytes: &[u8], off: usize) -> Result<(u16, usize), DecodeError> {
    let s: [u8; 2] = bytes
        .get(off..off + 2)
        .ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?
        .try_into()
        .expect("slice of length 2");
    Ok((u16::from_le_bytes(s), 2))
}

pub(crate) fn read_i64(bytes: &[u8], off: usize) -> Result<(i64, usize), DecodeError> {
    let s: [u8; 8] = bytes
        .get(off..off + 8)
        .ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?
        .try_into()
        .expect("slice of length 8");
    Ok((i64::from_le_bytes(s), 8))
}

pub(crate) fn read_var(bytes: &[u8], off: usize) -> Result<(VarId, usize), DecodeError> {
    let (raw, len) = read_u32(bytes, off)?;
    Ok((VarId::from_raw(raw), len))
}

fn read_cond(bytes: &[u8], off: usize) -> Result<(CompareCondition, usize), DecodeError> {
    let b = *bytes
        .get(off)
        .ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
    let cond = CompareCondition::from_u8(b).ok_or(DecodeError::UnknownOpcode {
        offset: off as u32,
        opcode: b as u16,
    })?;
    Ok((cond, 1))
}

/// A call's argument list plus whether it produced a result, decoded by
/// [`walk`] and handed to the visitor as a borrowed slice.
pub struct CallArgs<'a> {
    pub result: Option<VarId>,
    pub args: &'a [VarId],
}

/// One method per SSA opcode; every method defaults to doing nothing so a
/// pass only overrides what it reads.
#[allow(unused_variables)]
pub trait SsaVisitor {
    fn visit_nop(&mut self) {}
    fn visit_assign_variable(&mut self, dst: VarId, ty: TypeInfo, src: VarId) {}
    fn visit_assign_literal(&mut self, dst: VarId, ty: TypeInfo, literal: i64) {}
    fn visit_load(&mut self, dst: VarId, ty: TypeInfo, ptr: VarId) {}
    fn visit_load_global(&mut self, dst: VarId, ty: TypeInfo, global: u32) {}
    fn visit_load_global_ext(&mut self, dst: VarId, ty: TypeInfo, global: u32, module: u16) {}
    fn visit_store(&mut self, ptr: VarId, value: VarId) {}
    fn visit_store_global(&mut self, global: u32, value: VarId) {}
    fn visit_store_global_ext(&mut self, global: u32, module: u16, value: VarId) {}
    fn visit_expand_sx(&mut self, dst: VarId, ty: TypeInfo, src: VarId) {}
    fn visit_expand_zx(&mut self, dst: VarId, ty: TypeInfo, src: VarId) {}
    fn visit_trunc(&mut self, dst: VarId, ty: TypeInfo, src: VarId) {}
    fn visit_binop_vtov(&mut self, dst: VarId, ty: TypeInfo, op: u8, a: VarId, b: VarId) {}
    fn visit_binop_vtoi(&mut self, dst: VarId, ty: TypeInfo, op: u8, a: VarId, imm: i64) {}
    fn visit_binop_itov(&mut self, dst: VarId, ty: TypeInfo, op: u8, imm: i64, b: VarId) {}
    fn visit_comp_vtov(&mut self, dst: VarId, cond: CompareCondition, a: VarId, b: VarId) {}
    fn visit_comp_vtoi(&mut self, dst: VarId, cond: CompareCondition, a: VarId, imm: i64) {}
    fn visit_comp_itov(&mut self, dst: VarId, cond: CompareCondition, imm: i64, b: VarId) {}
    fn visit_compute_ptr(&mut self, dst: VarId, ty: TypeInfo, base: VarId, offset: i64) {}
    fn visit_join(&mut self, dst: VarId, ty: TypeInfo, parts: &[VarId]) {}
    fn visit_split(&mut self, value: VarId, value_ty: TypeInfo, remainder: VarId, remainder_ty: TypeInfo, src: VarId) {}
    fn visit_call(&mut self, func_index: u32, call: CallArgs<'_>) {}
    fn visit_call_ext(&mut self, module: u16, func_index: u32, call: CallArgs<'_>) {}
    fn visit_call_ind(&mut self, target: VarId, call: CallArgs<'_>) {}
    fn visit_call_ind_ext(&mut self, target: VarId, module: u16, call: CallArgs<'_>) {}
    fn visit_ret(&mut self, value: Option<VarId>) {}
    fn visit_jump(&mut self, target: u32) {}
    fn visit_jump_true(&mut self, cond: VarId, target: u32) {}
    fn visit_jump_false(&mut self, cond: VarId, target: u32) {}
}

/// Decodes `bytes` front to back, dispatching each instruction to `visitor`.
pub fn walk(bytes: &[u8], visitor: &mut impl SsaVisitor) -> Result<(), DecodeError> {
    let mut off = 0usize;
    let mut args_scratch: Vec<VarId> = Vec::new();
    while off < bytes.len() {
        let (op, op_len) = SsaOpcode::decode(bytes, off)?;
        off += op_len;
        match op {
            SsaOpcode::Nop => visitor.visit_nop(),
            SsaOpcode::AssignVariable => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_assign_variable(dst, ty, src);
            }
            SsaOpcode::AssignLiteral => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (lit, l) = read_i64(bytes, off)?;
                off += l;
                visitor.visit_assign_literal(dst, ty, lit);
            }
            SsaOpcode::Load => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (ptr, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_load(dst, ty, ptr);
            }
            SsaOpcode::LoadGlobal => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (global, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_load_global(dst, ty, global);
            }
            SsaOpcode::LoadGlobalExt => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (global, l) = read_u32(bytes, off)?;
                off += l;
                let (module, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_load_global_ext(dst, ty, global, module);
            }
            SsaOpcode::Store => {
                let (ptr, l) = read_var(bytes, off)?;
                off += l;
                let (value, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_store(ptr, value);
            }
            SsaOpcode::StoreGlobal => {
                let (global, l) = read_u32(bytes, off)?;
                off += l;
                let (value, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_store_global(global, value);
            }
            SsaOpcode::StoreGlobalExt => {
                let (global, l) = read_u32(bytes, off)?;
                off += l;
                let (module, l) = read_u16(bytes, off)?;
                off += l;
                let (value, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_store_global_ext(global, module, value);
            }
            SsaOpcode::ExpandSX => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_expand_sx(dst, ty, src);
            }
            SsaOpcode::ExpandZX => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_expand_zx(dst, ty, src);
            }
            SsaOpcode::Trunc => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_trunc(dst, ty, src);
            }
            SsaOpcode::BinOpVtoV => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let bop = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let (a, l) = read_var(bytes, off)?;
                off += l;
                let (b, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_binop_vtov(dst, ty, bop, a, b);
            }
            SsaOpcode::BinOpVtoI => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let bop = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let (a, l) = read_var(bytes, off)?;
                off += l;
                let (imm, l) = read_i64(bytes, off)?;
                off += l;
                visitor.visit_binop_vtoi(dst, ty, bop, a, imm);
            }
            SsaOpcode::BinOpItoV => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let bop = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let (imm, l) = read_i64(bytes, off)?;
                off += l;
                let (b, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_binop_itov(dst, ty, bop, imm, b);
            }
            SsaOpcode::CompVtoV => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (cond, l) = read_cond(bytes, off)?;
                off += l;
                let (a, l) = read_var(bytes, off)?;
                off += l;
                let (b, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_comp_vtov(dst, cond, a, b);
            }
            SsaOpcode::CompVtoI => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (cond, l) = read_cond(bytes, off)?;
                off += l;
                let (a, l) = read_var(bytes, off)?;
                off += l;
                let (imm, l) = read_i64(bytes, off)?;
                off += l;
                visitor.visit_comp_vtoi(dst, cond, a, imm);
            }
            SsaOpcode::CompItoV => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (cond, l) = read_cond(bytes, off)?;
                off += l;
                let (imm, l) = read_i64(bytes, off)?;
                off += l;
                let (b, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_comp_itov(dst, cond, imm, b);
            }
            SsaOpcode::ComputePtr => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (base, l) = read_var(bytes, off)?;
                off += l;
                let (offset, l) = read_i64(bytes, off)?;
                off += l;
                visitor.visit_compute_ptr(dst, ty, base, offset);
            }
            SsaOpcode::Join => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (count, l) = read_u32(bytes, off)?;
                off += l;
                args_scratch.clear();
                for _ in 0..count {
                    let (v, l) = read_var(bytes, off)?;
                    off += l;
                    args_scratch.push(v);
                }
                visitor.visit_join(dst, ty, &args_scratch);
            }
            SsaOpcode::Split => {
                let (value, l) = read_var(bytes, off)?;
                off += l;
                let (value_ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (remainder, l) = read_var(bytes, off)?;
                off += l;
                let (remainder_ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                visitor.visit_split(value, value_ty, remainder, remainder_ty, src);
            }
            SsaOpcode::Call | SsaOpcode::CallExt | SsaOpcode::CallInd | SsaOpcode::CallIndExt => {
                let (module, target) = match op {
                    SsaOpcode::CallExt => {
                        let (m, l) = read_u16(bytes, off)?;
                        off += l;
                        (Some(m), None)
                    }
                    SsaOpcode::CallInd => {
                        let (t, l) = read_var(bytes, off)?;
                        off += l;
                        (None, Some(t))
                    }
                    SsaOpcode::CallIndExt => {
                        let (t, l) = read_var(bytes, off)?;
                        off += l;
                        let (m, l) = read_u16(bytes, off)?;
                        off += l;
                        (Some(m), Some(t))
                    }
                    _ => (None, None),
                };
                let func_index = if matches!(op, SsaOpcode::Call | SsaOpcode::CallExt) {
                    let (f, l) = read_u32(bytes, off)?;
                    off += l;
                    f
                } else {
                    0
                };
                let has_result = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })? != 0;
                off += 1;
                let result = if has_result {
                    let (ty, l) = wire_types::decode(bytes, off)?;
                    off += l;
                    let (id, l) = read_var(bytes, off)?;
                    off += l;
                    let _ = ty;
                    Some(id)
                } else {
                    None
                };
                let (count, l) = read_u32(bytes, off)?;
                off += l;
                args_scratch.clear();
                for _ in 0..count {
                    let (v, l) = read_var(bytes, off)?;
                    off += l;
                    args_scratch.push(v);
                }
                let call = CallArgs { result, args: &args_scratch };
                match op {
                    SsaOpcode::Call => visitor.visit_call(func_index, call),
                    SsaOpcode::CallExt => visitor.visit_call_ext(module.unwrap(), func_index, call),
                    SsaOpcode::CallInd => visitor.visit_call_ind(target.unwrap(), call),
                    SsaOpcode::CallIndExt => visitor.visit_call_ind_ext(target.unwrap(), module.unwrap(), call),
                    _ => unreachable!(),
                }
            }
            SsaOpcode::Ret => {
                let has_value = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })? != 0;
                off += 1;
                let value = if has_value {
                    let (v, l) = read_var(bytes, off)?;
                    off += l;
                    Some(v)
                } else {
                    None
                };
                visitor.visit_ret(value);
            }
            SsaOpcode::Jump => {
                let (target, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_jump(target);
            }
            SsaOpcode::JumpTrue => {
                let (cond, l) = read_var(bytes, off)?;
                off += l;
                let (target, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_jump_true(cond, target);
            }
            SsaOpcode::JumpFalse => {
                let (cond, l) = read_var(bytes, off)?;
                off += l;
                let (target, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_jump_false(cond, target);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::writer::SsaWriter;

    #[derive(Default)]
    struct Counter {
        n: usize,
    }

    impl SsaVisitor for Counter {
        fn visit_assign_literal(&mut self, _dst: VarId, _ty: TypeInfo, _literal: i64) {
            self.n += 1;
        }
        fn visit_comp_vtov(&mut self, _dst: VarId, _cond: CompareCondition, _a: VarId, _b: VarId) {
            self.n += 1;
        }
    }

    #[test]
    fn walk_visits_every_instruction_once() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 1);
        let b = w.write_assign_literal(TypeInfo::I32, 2);
        w.write_comp_vtov(CompareCondition::Equal, a, b);
        let buf = w.finish();

        let mut counter = Counter::default();
        walk(&buf.bytes, &mut counter).unwrap();
        assert_eq!(counter.n, 3);
    }

    #[test]
    fn walk_round_trips_join_operand_count() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I8, 1);
        let b = w.write_assign_literal(TypeInfo::I8, 2);
        w.write_join(TypeInfo::I16, &[a, b]);
        let buf = w.finish();

        struct JoinCheck(usize);
        impl SsaVisitor for JoinCheck {
            fn visit_join(&mut self, _dst: VarId, _ty: TypeInfo, parts: &[VarId]) {
                self.0 = parts.len();
            }
        }
        let mut check = JoinCheck(0);
        walk(&buf.bytes, &mut check).unwrap();
        assert_eq!(check.0, 2);
    }
}
