//! A typed, in-memory decoding of one SSA function body, shared by every
//! pass in this module (`spec.md` §4.5–§4.7).
//!
//! [`crate::emulate::ssa_emulator`] decodes for execution and only needs
//! runtime values; a rewriting pass needs each instruction's *type*
//! information too, since re-emitting through [`SsaWriter`] requires it.
//! Hence a second, independent decode here rather than reuse of the
//! emulator's `Instr`.
//!
//! Every pass in this module follows the same shape: decode, walk the
//! instructions in order (dropping, rewriting, or expanding some),
//! re-emit through a fresh [`SsaWriter`], and patch jump targets at the
//! end. [`ProgramEmitter`] carries the bookkeeping that last step needs.

use hashbrown::HashMap;

use crate::error::DecodeError;
use crate::ir::opcode::CompareCondition;
use crate::ssa::opcode::{BinOp, SsaOpcode};
use crate::ssa::types as wire_types;
use crate::ssa::value::VarId;
use crate::ssa::visitor::{read_i64, read_u16, read_u32, read_var};
use crate::ssa::writer::{SsaBuffer, SsaWriter};
use crate::types::TypeInfo;

#[derive(Debug, Clone)]
pub enum SsaInstr {
    Nop,
    AssignLiteral { dst: VarId, ty: TypeInfo, literal: i64 },
    AssignVariable { dst: VarId, ty: TypeInfo, src: VarId },
    Load { dst: VarId, ty: TypeInfo, ptr: VarId },
    LoadGlobal { dst: VarId, ty: TypeInfo, global: u32 },
    LoadGlobalExt { dst: VarId, ty: TypeInfo, global: u32, module: u16 },
    Store { ptr: VarId, value: VarId },
    StoreGlobal { global: u32, value: VarId },
    StoreGlobalExt { global: u32, module: u16, value: VarId },
    ExpandSX { dst: VarId, ty: TypeInfo, src: VarId },
    ExpandZX { dst: VarId, ty: TypeInfo, src: VarId },
    Trunc { dst: VarId, ty: TypeInfo, src: VarId },
    BinOpVtoV { dst: VarId, ty: TypeInfo, op: BinOp, a: VarId, b: VarId },
    BinOpVtoI { dst: VarId, ty: TypeInfo, op: BinOp, a: VarId, imm: i64 },
    BinOpItoV { dst: VarId, ty: TypeInfo, op: BinOp, imm: i64, b: VarId },
    CompVtoV { dst: VarId, cond: CompareCondition, a: VarId, b: VarId },
    CompVtoI { dst: VarId, cond: CompareCondition, a: VarId, imm: i64 },
    CompItoV { dst: VarId, cond: CompareCondition, imm: i64, b: VarId },
    ComputePtr { dst: VarId, ty: TypeInfo, base: VarId, offset: i64 },
    Join { dst: VarId, ty: TypeInfo, parts: Vec<VarId> },
    Split { value: VarId, value_ty: TypeInfo, remainder: VarId, remainder_ty: TypeInfo, src: VarId },
    Call { func_index: u32, result: Option<(VarId, TypeInfo)>, args: Vec<VarId> },
    CallExt { module: u16, func_index: u32, result: Option<(VarId, TypeInfo)>, args: Vec<VarId> },
    CallInd { target: VarId, result: Option<(VarId, TypeInfo)>, args: Vec<VarId> },
    CallIndExt { target: VarId, module: u16, result: Option<(VarId, TypeInfo)>, args: Vec<VarId> },
    Ret { value: Option<VarId> },
    Jump { target_idx: usize },
    JumpTrue { cond: VarId, target_idx: usize },
    JumpFalse { cond: VarId, target_idx: usize },
}

impl SsaInstr {
    /// Every variable id this instruction *defines*, in emission order
    /// (`Split` defines two).
    pub fn defs(&self) -> Vec<VarId> {
        use SsaInstr::*;
        match self {
            Nop | Store { .. } | StoreGlobal { .. } | StoreGlobalExt { .. } | Ret { .. } | Jump { .. }
            | JumpTrue { .. } | JumpFalse { .. } => vec![],
            AssignLiteral { dst, .. }
            | AssignVariable { dst, .. }
            | Load { dst, .. }
            | LoadGlobal { dst, .. }
            | LoadGlobalExt { dst, .. }
            | ExpandSX { dst, .. }
            | ExpandZX { dst, .. }
            | Trunc { dst, .. }
            | BinOpVtoV { dst, .. }
            | BinOpVtoI { dst, .. }
            | BinOpItoV { dst, .. }
            | CompVtoV { dst, .. }
            | CompVtoI { dst, .. }
            | CompItoV { dst, .. }
            | ComputePtr { dst, .. }
            | Join { dst, .. } => vec![*dst],
            Split { value, remainder, .. } => vec![*value, *remainder],
            Call { result, .. } | CallExt { result, .. } | CallInd { result, .. } | CallIndExt { result, .. } => {
                result.iter().map(|(id, _)| *id).collect()
            }
        }
    }

    /// Same as [`Self::defs`], paired with the type each id was declared
    /// with — constant folding needs a definition's original type even
    /// after the instruction that declared it stops being emitted (e.g.
    /// an eliminated `AssignVariable`).
    pub fn defs_with_types(&self) -> Vec<(VarId, TypeInfo)> {
        use SsaInstr::*;
        match self {
            Nop | Store { .. } | StoreGlobal { .. } | StoreGlobalExt { .. } | Ret { .. } | Jump { .. }
            | JumpTrue { .. } | JumpFalse { .. } => vec![],
            AssignLiteral { dst, ty, .. }
            | AssignVariable { dst, ty, .. }
            | Load { dst, ty, .. }
            | LoadGlobal { dst, ty, .. }
            | LoadGlobalExt { dst, ty, .. }
            | ExpandSX { dst, ty, .. }
            | ExpandZX { dst, ty, .. }
            | Trunc { dst, ty, .. }
            | BinOpVtoV { dst, ty, .. }
            | BinOpVtoI { dst, ty, .. }
            | BinOpItoV { dst, ty, .. }
            | ComputePtr { dst, ty, .. }
            | Join { dst, ty, .. } => vec![(*dst, *ty)],
            CompVtoV { dst, .. } | CompVtoI { dst, .. } | CompItoV { dst, .. } => vec![(*dst, TypeInfo::BOOL)],
            Split { value, value_ty, remainder, remainder_ty, .. } => vec![(*value, *value_ty), (*remainder, *remainder_ty)],
            Call { result, .. } | CallExt { result, .. } | CallInd { result, .. } | CallIndExt { result, .. } => {
                result.iter().map(|(id, ty)| (*id, *ty)).collect()
            }
        }
    }

    /// Every variable id this instruction *reads*.
    pub fn uses(&self) -> Vec<VarId> {
        use SsaInstr::*;
        match self {
            Nop | AssignLiteral { .. } | LoadGlobal { .. } | LoadGlobalExt { .. } | Ret { value: None } | Jump { .. } => {
                vec![]
            }
            AssignVariable { src, .. } | Load { ptr: src, .. } | ExpandSX { src, .. } | ExpandZX { src, .. } | Trunc {
                src,
                ..
            } => vec![*src],
            Store { ptr, value } => vec![*ptr, *value],
            StoreGlobal { value, .. } => vec![*value],
            StoreGlobalExt { value, .. } => vec![*value],
            BinOpVtoV { a, b, .. } => vec![*a, *b],
            BinOpVtoI { a, .. } => vec![*a],
            BinOpItoV { b, .. } => vec![*b],
            CompVtoV { a, b, .. } => vec![*a, *b],
            CompVtoI { a, .. } => vec![*a],
            CompItoV { b, .. } => vec![*b],
            ComputePtr { base, .. } => vec![*base],
            Join { parts, .. } => parts.clone(),
            Split { src, .. } => vec![*src],
            Call { args, .. } | CallExt { args, .. } => args.clone(),
            CallInd { target, args, .. } | CallIndExt { target, args, .. } => {
                let mut v = vec![*target];
                v.extend(args.iter().copied());
                v
            }
            Ret { value: Some(v) } => vec![*v],
            JumpTrue { cond, .. } | JumpFalse { cond, .. } => vec![*cond],
        }
    }
}

/// Decodes `bytes` into an ordered instruction list plus the byte-offset
/// to instruction-index map jump targets are resolved through.
pub fn decode_program(bytes: &[u8]) -> Result<Vec<SsaInstr>, DecodeError> {
    let mut offsets: HashMap<u32, usize> = HashMap::new();
    let mut raw: Vec<(SsaOpcode, usize, Vec<u8>)> = Vec::new();
    // First pass: find every instruction's start so forward jump targets
    // resolve regardless of where they point.
    {
        let mut off = 0usize;
        while off < bytes.len() {
            offsets.insert(off as u32, raw.len());
            let start = off;
            let (op, op_len) = SsaOpcode::decode(bytes, off)?;
            off += op_len;
            let len = skip_operands(op, bytes, off)?;
            off += len;
            raw.push((op, start, bytes[start..off].to_vec()));
        }
    }

    let mut program = Vec::with_capacity(raw.len());
    for (op, start, _) in &raw {
        program.push(decode_one(*op, bytes, *start, &offsets)?);
    }
    Ok(program)
}

fn skip_operands(op: SsaOpcode, bytes: &[u8], mut off: usize) -> Result<usize, DecodeError> {
    let start = off;
    macro_rules! var {
        () => {{
            let (_, l) = read_var(bytes, off)?;
            off += l;
        }};
    }
    macro_rules! ty {
        () => {{
            let (_, l) = wire_types::decode(bytes, off)?;
            off += l;
        }};
    }
    macro_rules! u32_ {
        () => {{
            let (_, l) = read_u32(bytes, off)?;
            off += l;
        }};
    }
    macro_rules! u16_ {
        () => {{
            let (_, l) = read_u16(bytes, off)?;
            off += l;
        }};
    }
    macro_rules! i64_ {
        () => {{
            let (_, l) = read_i64(bytes, off)?;
            off += l;
        }};
    }
    macro_rules! byte {
        () => {{
            let _ = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
            off += 1;
        }};
    }
    use SsaOpcode::*;
    match op {
        Nop => {}
        AssignVariable => {
            var!();
            ty!();
            var!();
        }
        AssignLiteral => {
            var!();
            ty!();
            i64_!();
        }
        Load => {
            var!();
            ty!();
            var!();
        }
        LoadGlobal => {
            var!();
            ty!();
            u32_!();
        }
        LoadGlobalExt => {
            var!();
            ty!();
            u32_!();
            u16_!();
        }
        Store => {
            var!();
            var!();
        }
        StoreGlobal => {
            u32_!();
            var!();
        }
        StoreGlobalExt => {
            u32_!();
            u16_!();
            var!();
        }
        ExpandSX | ExpandZX | Trunc => {
            var!();
            ty!();
            var!();
        }
        BinOpVtoV => {
            var!();
            ty!();
            byte!();
            var!();
            var!();
        }
        BinOpVtoI => {
            var!();
            ty!();
            byte!();
            var!();
            i64_!();
        }
        BinOpItoV => {
            var!();
            ty!();
            byte!();
            i64_!();
            var!();
        }
        CompVtoV => {
            var!();
            byte!();
            var!();
            var!();
        }
        CompVtoI => {
            var!();
            byte!();
            var!();
            i64_!();
        }
        CompItoV => {
            var!();
            byte!();
            i64_!();
            var!();
        }
        ComputePtr => {
            var!();
            ty!();
            var!();
            i64_!();
        }
        Join => {
            var!();
            ty!();
            let (count, l) = read_u32(bytes, off)?;
            off += l;
            for _ in 0..count {
                var!();
            }
        }
        Split => {
            var!();
            ty!();
            var!();
            ty!();
            var!();
        }
        Call | CallExt | CallInd | CallIndExt => {
            if matches!(op, CallExt) {
                u16_!();
            }
            if matches!(op, CallInd | CallIndExt) {
                var!();
            }
            if matches!(op, CallIndExt) {
                u16_!();
            }
            if matches!(op, Call | CallExt) {
                u32_!();
            }
            let has_result = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })? != 0;
            off += 1;
            if has_result {
                ty!();
                var!();
            }
            let (count, l) = read_u32(bytes, off)?;
            off += l;
            for _ in 0..count {
                var!();
            }
        }
        Ret => {
            let has_value = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })? != 0;
            off += 1;
            if has_value {
                var!();
            }
        }
        Jump => u32_!(),
        JumpTrue | JumpFalse => {
            var!();
            u32_!();
        }
    }
    Ok(off - start)
}

fn decode_one(op: SsaOpcode, bytes: &[u8], start: usize, offsets: &HashMap<u32, usize>) -> Result<SsaInstr, DecodeError> {
    let (_, op_len) = SsaOpcode::decode(bytes, start)?;
    let mut off = start + op_len;
    use SsaOpcode::*;
    Ok(match op {
        Nop => SsaInstr::Nop,
        AssignVariable => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (src, _l) = read_var(bytes, off)?;
            SsaInstr::AssignVariable { dst, ty, src }
        }
        AssignLiteral => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (literal, _l) = read_i64(bytes, off)?;
            SsaInstr::AssignLiteral { dst, ty, literal }
        }
        Load => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (ptr, _l) = read_var(bytes, off)?;
            SsaInstr::Load { dst, ty, ptr }
        }
        LoadGlobal => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (global, _l) = read_u32(bytes, off)?;
            SsaInstr::LoadGlobal { dst, ty, global }
        }
        LoadGlobalExt => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (global, l) = read_u32(bytes, off)?;
            off += l;
            let (module, _l) = read_u16(bytes, off)?;
            SsaInstr::LoadGlobalExt { dst, ty, global, module }
        }
        Store => {
            let (ptr, l) = read_var(bytes, off)?;
            off += l;
            let (value, _l) = read_var(bytes, off)?;
            SsaInstr::Store { ptr, value }
        }
        StoreGlobal => {
            let (global, l) = read_u32(bytes, off)?;
            off += l;
            let (value, _l) = read_var(bytes, off)?;
            SsaInstr::StoreGlobal { global, value }
        }
        StoreGlobalExt => {
            let (global, l) = read_u32(bytes, off)?;
            off += l;
            let (module, l) = read_u16(bytes, off)?;
            off += l;
            let (value, _l) = read_var(bytes, off)?;
            SsaInstr::StoreGlobalExt { global, module, value }
        }
        ExpandSX | ExpandZX | Trunc => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (src, _l) = read_var(bytes, off)?;
            match op {
                ExpandSX => SsaInstr::ExpandSX { dst, ty, src },
                ExpandZX => SsaInstr::ExpandZX { dst, ty, src },
                _ => SsaInstr::Trunc { dst, ty, src },
            }
        }
        BinOpVtoV => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let opb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
            off += 1;
            let (a, l) = read_var(bytes, off)?;
            off += l;
            let (b, _l) = read_var(bytes, off)?;
            let op_kind = BinOp::from_u8(opb).ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: opb as u16 })?;
            SsaInstr::BinOpVtoV { dst, ty, op: op_kind, a, b }
        }
        BinOpVtoI => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let opb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
            off += 1;
            let (a, l) = read_var(bytes, off)?;
            off += l;
            let (imm, _l) = read_i64(bytes, off)?;
            let op_kind = BinOp::from_u8(opb).ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: opb as u16 })?;
            SsaInstr::BinOpVtoI { dst, ty, op: op_kind, a, imm }
        }
        BinOpItoV => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let opb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
            off += 1;
            let (imm, l) = read_i64(bytes, off)?;
            off += l;
            let (b, _l) = read_var(bytes, off)?;
            let op_kind = BinOp::from_u8(opb).ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: opb as u16 })?;
            SsaInstr::BinOpItoV { dst, ty, op: op_kind, imm, b }
        }
        CompVtoV => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let condb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
            off += 1;
            let (a, l) = read_var(bytes, off)?;
            off += l;
            let (b, _l) = read_var(bytes, off)?;
            let cond = CompareCondition::from_u8(condb)
                .ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: condb as u16 })?;
            SsaInstr::CompVtoV { dst, cond, a, b }
        }
        CompVtoI => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let condb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
            off += 1;
            let (a, l) = read_var(bytes, off)?;
            off += l;
            let (imm, _l) = read_i64(bytes, off)?;
            let cond = CompareCondition::from_u8(condb)
                .ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: condb as u16 })?;
            SsaInstr::CompVtoI { dst, cond, a, imm }
        }
        CompItoV => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let condb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
            off += 1;
            let (imm, l) = read_i64(bytes, off)?;
            off += l;
            let (b, _l) = read_var(bytes, off)?;
            let cond = CompareCondition::from_u8(condb)
                .ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: condb as u16 })?;
            SsaInstr::CompItoV { dst, cond, imm, b }
        }
        ComputePtr => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (base, l) = read_var(bytes, off)?;
            off += l;
            let (offset, _l) = read_i64(bytes, off)?;
            SsaInstr::ComputePtr { dst, ty, base, offset }
        }
        Join => {
            let (dst, l) = read_var(bytes, off)?;
            off += l;
            let (ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (count, l) = read_u32(bytes, off)?;
            off += l;
            let mut parts = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (v, l) = read_var(bytes, off)?;
                off += l;
                parts.push(v);
            }
            SsaInstr::Join { dst, ty, parts }
        }
        Split => {
            let (value, l) = read_var(bytes, off)?;
            off += l;
            let (value_ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (remainder, l) = read_var(bytes, off)?;
            off += l;
            let (remainder_ty, l) = wire_types::decode(bytes, off)?;
            off += l;
            let (src, _l) = read_var(bytes, off)?;
            SsaInstr::Split { value, value_ty, remainder, remainder_ty, src }
        }
        Call | CallExt | CallInd | CallIndExt => {
            let module = if matches!(op, CallExt) {
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                Some(m)
            } else {
                None
            };
            let target = if matches!(op, CallInd | CallIndExt) {
                let (t, l) = read_var(bytes, off)?;
                off += l;
                Some(t)
            } else {
                None
            };
            let module = if matches!(op, CallIndExt) {
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                Some(m)
            } else {
                module
            };
            let func_index = if matches!(op, Call | CallExt) {
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
                Some((id, ty))
            } else {
                None
            };
            let (count, l) = read_u32(bytes, off)?;
            off += l;
            let mut args = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (v, l) = read_var(bytes, off)?;
                off += l;
                args.push(v);
            }
            match op {
                Call => SsaInstr::Call { func_index, result, args },
                CallExt => SsaInstr::CallExt { module: module.unwrap(), func_index, result, args },
                CallInd => SsaInstr::CallInd { target: target.unwrap(), result, args },
                _ => SsaInstr::CallIndExt { target: target.unwrap(), module: module.unwrap(), result, args },
            }
        }
        Ret => {
            let has_value = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })? != 0;
            off += 1;
            let value = if has_value {
                let (v, _l) = read_var(bytes, off)?;
                Some(v)
            } else {
                None
            };
            SsaInstr::Ret { value }
        }
        Jump => {
            let (target, _l) = read_u32(bytes, off)?;
            SsaInstr::Jump { target_idx: resolve(offsets, target)? }
        }
        JumpTrue | JumpFalse => {
            let (cond, l) = read_var(bytes, off)?;
            off += l;
            let (target, _l) = read_u32(bytes, off)?;
            let idx = resolve(offsets, target)?;
            if op == JumpTrue {
                SsaInstr::JumpTrue { cond, target_idx: idx }
            } else {
                SsaInstr::JumpFalse { cond, target_idx: idx }
            }
        }
    })
}

fn resolve(offsets: &HashMap<u32, usize>, target: u32) -> Result<usize, DecodeError> {
    offsets.get(&target).copied().ok_or(DecodeError::UnknownOpcode { offset: target, opcode: 0 })
}

/// Wraps [`SsaWriter`] with the bookkeeping every rewriting pass in this
/// module needs: a record of where each *old* instruction's emission
/// started, so jump targets (carried as old instruction indices from
/// [`decode_program`]) can be patched once the whole pass has run.
pub struct ProgramEmitter {
    pub writer: SsaWriter,
    new_offsets: Vec<u32>,
    pending: Vec<(u32, usize)>,
}

impl ProgramEmitter {
    pub fn new() -> Self {
        Self { writer: SsaWriter::new(), new_offsets: Vec::new(), pending: Vec::new() }
    }

    /// Call once per *old* instruction, in order, right before translating
    /// it (even if the instruction will be dropped) — a jump that targeted
    /// a dropped instruction then correctly redirects to whatever code
    /// follows it.
    pub fn mark(&mut self) {
        self.new_offsets.push(self.writer.current_offset());
    }

    /// How many `mark()` calls have been made so far. A nested splice
    /// (the inliner stitching a callee's instructions into this stream)
    /// uses this as the base offset when translating the callee's own
    /// jump target indices into this emitter's shared mark sequence.
    pub fn mark_count(&self) -> usize {
        self.new_offsets.len()
    }

    pub fn write_jump(&mut self, target_idx: usize) {
        let patch_at = self.writer.current_offset() + 1;
        self.writer.write_jump(0);
        self.pending.push((patch_at, target_idx));
    }

    pub fn write_jump_true(&mut self, cond: VarId, target_idx: usize) {
        let patch_at = self.writer.current_offset() + 1 + 4;
        self.writer.write_jump_true(cond, 0);
        self.pending.push((patch_at, target_idx));
    }

    pub fn write_jump_false(&mut self, cond: VarId, target_idx: usize) {
        let patch_at = self.writer.current_offset() + 1 + 4;
        self.writer.write_jump_false(cond, 0);
        self.pending.push((patch_at, target_idx));
    }

    /// Patches every recorded jump and returns the finished stream. Call
    /// `mark()` one extra time at the end (with nothing left to translate)
    /// so a jump to "one past the last instruction" resolves.
    pub fn finish(mut self) -> SsaBuffer {
        for (patch_at, target_idx) in &self.pending {
            let target = self.new_offsets[*target_idx];
            self.writer.patch_u32_at(*patch_at, target);
        }
        self.writer.finish()
    }
}

impl Default for ProgramEmitter {
    fn default() -> Self {
        Self::new()
    }
}
