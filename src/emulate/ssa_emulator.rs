//! A reference interpreter for the SSA stream (`spec.md` §4.8, supplemented
//! per the gap noted in §9: the source ships an SSA emulator skeleton with
//! no body — this one actually runs).
//!
//! Calls cross function boundaries, which this interpreter alone has no
//! view of — it is handed a `call_fn` closure by whatever drives it across
//! a whole module (see [`crate::loader`]) and defers every `Call*` to that.

use hashbrown::HashMap;

use crate::emulate::globals::Globals;
use crate::error::{DecodeError, EmulateError};
use crate::ir::opcode::CompareCondition;
use crate::ssa::opcode::SsaOpcode;
use crate::ssa::types as wire_types;
use crate::ssa::value::VarId;
use crate::ssa::visitor::{read_i64, read_u16, read_u32, read_var};
use crate::types::{PrimitiveTag, TypeInfo};

#[derive(Debug, Clone)]
enum Instr {
    Nop,
    AssignVariable { dst: VarId, src: VarId },
    AssignLiteral { dst: VarId, ty: TypeInfo, literal: i64 },
    Load { dst: VarId, ptr: VarId },
    LoadGlobal { dst: VarId, global: u32 },
    LoadGlobalExt { dst: VarId, global: u32, module: u16 },
    Store { ptr: VarId, value: VarId },
    StoreGlobal { global: u32, value: VarId },
    StoreGlobalExt { global: u32, module: u16, value: VarId },
    ExpandSX { dst: VarId, ty: TypeInfo, src: VarId },
    ExpandZX { dst: VarId, ty: TypeInfo, src: VarId },
    Trunc { dst: VarId, ty: TypeInfo, src: VarId },
    BinOpVtoV { dst: VarId, ty: TypeInfo, op: u8, a: VarId, b: VarId },
    BinOpVtoI { dst: VarId, ty: TypeInfo, op: u8, a: VarId, imm: i64 },
    BinOpItoV { dst: VarId, ty: TypeInfo, op: u8, imm: i64, b: VarId },
    CompVtoV { dst: VarId, cond: CompareCondition, a: VarId, b: VarId },
    CompVtoI { dst: VarId, cond: CompareCondition, a: VarId, imm: i64 },
    CompItoV { dst: VarId, cond: CompareCondition, imm: i64, b: VarId },
    ComputePtr { dst: VarId, base: VarId, offset: i64 },
    Join { dst: VarId, parts: Vec<VarId> },
    Split { value: VarId, remainder: VarId, src: VarId },
    Call { func_index: u32, result: Option<VarId>, args: Vec<VarId> },
    CallExt { module: u16, func_index: u32, result: Option<VarId>, args: Vec<VarId> },
    CallInd { target: VarId, result: Option<VarId>, args: Vec<VarId> },
    CallIndExt { target: VarId, module: u16, result: Option<VarId>, args: Vec<VarId> },
    Ret { value: Option<VarId> },
    Jump { target: u32 },
    JumpTrue { cond: VarId, target: u32 },
    JumpFalse { cond: VarId, target: u32 },
}

fn decode_program(bytes: &[u8]) -> Result<(Vec<Instr>, HashMap<u32, usize>), DecodeError> {
    let mut program = Vec::new();
    let mut offsets = HashMap::new();
    let mut off = 0usize;
    while off < bytes.len() {
        offsets.insert(off as u32, program.len());
        let (op, op_len) = SsaOpcode::decode(bytes, off)?;
        off += op_len;
        let instr = match op {
            SsaOpcode::Nop => Instr::Nop,
            SsaOpcode::AssignVariable => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (_ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                Instr::AssignVariable { dst, src }
            }
            SsaOpcode::AssignLiteral => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (literal, l) = read_i64(bytes, off)?;
                off += l;
                Instr::AssignLiteral { dst, ty, literal }
            }
            SsaOpcode::Load => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (_ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (ptr, l) = read_var(bytes, off)?;
                off += l;
                Instr::Load { dst, ptr }
            }
            SsaOpcode::LoadGlobal => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (_ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (global, l) = read_u32(bytes, off)?;
                off += l;
                Instr::LoadGlobal { dst, global }
            }
            SsaOpcode::LoadGlobalExt => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (_ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (global, l) = read_u32(bytes, off)?;
                off += l;
                let (module, l) = read_u16(bytes, off)?;
                off += l;
                Instr::LoadGlobalExt { dst, global, module }
            }
            SsaOpcode::Store => {
                let (ptr, l) = read_var(bytes, off)?;
                off += l;
                let (value, l) = read_var(bytes, off)?;
                off += l;
                Instr::Store { ptr, value }
            }
            SsaOpcode::StoreGlobal => {
                let (global, l) = read_u32(bytes, off)?;
                off += l;
                let (value, l) = read_var(bytes, off)?;
                off += l;
                Instr::StoreGlobal { global, value }
            }
            SsaOpcode::StoreGlobalExt => {
                let (global, l) = read_u32(bytes, off)?;
                off += l;
                let (module, l) = read_u16(bytes, off)?;
                off += l;
                let (value, l) = read_var(bytes, off)?;
                off += l;
                Instr::StoreGlobalExt { global, module, value }
            }
            SsaOpcode::ExpandSX => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                Instr::ExpandSX { dst, ty, src }
            }
            SsaOpcode::ExpandZX => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                Instr::ExpandZX { dst, ty, src }
            }
            SsaOpcode::Trunc => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                Instr::Trunc { dst, ty, src }
            }
            SsaOpcode::BinOpVtoV => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let opb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let (a, l) = read_var(bytes, off)?;
                off += l;
                let (b, l) = read_var(bytes, off)?;
                off += l;
                Instr::BinOpVtoV { dst, ty, op: opb, a, b }
            }
            SsaOpcode::BinOpVtoI => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let opb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let (a, l) = read_var(bytes, off)?;
                off += l;
                let (imm, l) = read_i64(bytes, off)?;
                off += l;
                Instr::BinOpVtoI { dst, ty, op: opb, a, imm }
            }
            SsaOpcode::BinOpItoV => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let opb = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let (imm, l) = read_i64(bytes, off)?;
                off += l;
                let (b, l) = read_var(bytes, off)?;
                off += l;
                Instr::BinOpItoV { dst, ty, op: opb, imm, b }
            }
            SsaOpcode::CompVtoV => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let cond_byte = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let cond = CompareCondition::from_u8(cond_byte)
                    .ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: cond_byte as u16 })?;
                let (a, l) = read_var(bytes, off)?;
                off += l;
                let (b, l) = read_var(bytes, off)?;
                off += l;
                Instr::CompVtoV { dst, cond, a, b }
            }
            SsaOpcode::CompVtoI => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let cond_byte = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let cond = CompareCondition::from_u8(cond_byte)
                    .ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: cond_byte as u16 })?;
                let (a, l) = read_var(bytes, off)?;
                off += l;
                let (imm, l) = read_i64(bytes, off)?;
                off += l;
                Instr::CompVtoI { dst, cond, a, imm }
            }
            SsaOpcode::CompItoV => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let cond_byte = *bytes.get(off).ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?;
                off += 1;
                let cond = CompareCondition::from_u8(cond_byte)
                    .ok_or(DecodeError::UnknownOpcode { offset: off as u32, opcode: cond_byte as u16 })?;
                let (imm, l) = read_i64(bytes, off)?;
                off += l;
                let (b, l) = read_var(bytes, off)?;
                off += l;
                Instr::CompItoV { dst, cond, imm, b }
            }
            SsaOpcode::ComputePtr => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (_ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (base, l) = read_var(bytes, off)?;
                off += l;
                let (offset, l) = read_i64(bytes, off)?;
                off += l;
                Instr::ComputePtr { dst, base, offset }
            }
            SsaOpcode::Join => {
                let (dst, l) = read_var(bytes, off)?;
                off += l;
                let (_ty, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (count, l) = read_u32(bytes, off)?;
                off += l;
                let mut parts = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (v, l) = read_var(bytes, off)?;
                    off += l;
                    parts.push(v);
                }
                Instr::Join { dst, parts }
            }
            SsaOpcode::Split => {
                let (value, l) = read_var(bytes, off)?;
                off += l;
                let (_vt, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (remainder, l) = read_var(bytes, off)?;
                off += l;
                let (_rt, l) = wire_types::decode(bytes, off)?;
                off += l;
                let (src, l) = read_var(bytes, off)?;
                off += l;
                Instr::Split { value, remainder, src }
            }
            SsaOpcode::Call | SsaOpcode::CallExt | SsaOpcode::CallInd | SsaOpcode::CallIndExt => {
                let module = if matches!(op, SsaOpcode::CallExt) {
                    let (m, l) = read_u16(bytes, off)?;
                    off += l;
                    Some(m)
                } else {
                    None
                };
                let target = if matches!(op, SsaOpcode::CallInd | SsaOpcode::CallIndExt) {
                    let (t, l) = read_var(bytes, off)?;
                    off += l;
                    Some(t)
                } else {
                    None
                };
                let module = if matches!(op, SsaOpcode::CallIndExt) {
                    let (m, l) = read_u16(bytes, off)?;
                    off += l;
                    Some(m)
                } else {
                    module
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
                    let (_ty, l) = wire_types::decode(bytes, off)?;
                    off += l;
                    let (id, l) = read_var(bytes, off)?;
                    off += l;
                    Some(id)
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
                    SsaOpcode::Call => Instr::Call { func_index, result, args },
                    SsaOpcode::CallExt => Instr::CallExt { module: module.unwrap(), func_index, result, args },
                    SsaOpcode::CallInd => Instr::CallInd { target: target.unwrap(), result, args },
                    SsaOpcode::CallIndExt => {
                        Instr::CallIndExt { target: target.unwrap(), module: module.unwrap(), result, args }
                    }
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
                Instr::Ret { value }
            }
            SsaOpcode::Jump => {
                let (target, l) = read_u32(bytes, off)?;
                off += l;
                Instr::Jump { target }
            }
            SsaOpcode::JumpTrue => {
                let (cond, l) = read_var(bytes, off)?;
                off += l;
                let (target, l) = read_u32(bytes, off)?;
                off += l;
                Instr::JumpTrue { cond, target }
            }
            SsaOpcode::JumpFalse => {
                let (cond, l) = read_var(bytes, off)?;
                off += l;
                let (target, l) = read_u32(bytes, off)?;
                off += l;
                Instr::JumpFalse { cond, target }
            }
        };
        program.push(instr);
    }
    Ok((program, offsets))
}

fn apply_binop(op: u8, ty: TypeInfo, a: i64, b: i64) -> Result<i64, EmulateError> {
    let is_float = matches!(ty.tag(), PrimitiveTag::F32 | PrimitiveTag::F64);
    if is_float {
        let (fa, fb) = if matches!(ty.tag(), PrimitiveTag::F32) {
            (f32::from_bits(a as u32) as f64, f32::from_bits(b as u32) as f64)
        } else {
            (f64::from_bits(a as u64), f64::from_bits(b as u64))
        };
        let r = match op {
            0 => fa + fb,
            1 => fa - fb,
            2 => fa * fb,
            3 => {
                if fb == 0.0 {
                    return Err(EmulateError::DivideByZero);
                }
                fa / fb
            }
            _ => return Err(EmulateError::StackFault("unknown binop")),
        };
        return Ok(if matches!(ty.tag(), PrimitiveTag::F32) {
            (r as f32).to_bits() as i64
        } else {
            r.to_bits() as i64
        });
    }
    Ok(match op {
        0 => a.wrapping_add(b),
        1 => a.wrapping_sub(b),
        2 => a.wrapping_mul(b),
        3 => {
            if b == 0 {
                return Err(EmulateError::DivideByZero);
            }
            a.wrapping_div(b)
        }
        _ => return Err(EmulateError::StackFault("unknown binop")),
    })
}

/// Outcome of calling into another function through `call_fn`.
pub type CallResult = Result<Option<i64>, EmulateError>;

/// Runs one SSA function body to completion.
///
/// `args` supplies the raw values for the function's argument
/// pseudo-variables, in order. `call_fn` resolves `Call`/`CallExt` by
/// function index and `CallInd`/`CallIndExt` by the already-evaluated
/// target value, returning the callee's raw return value if any.
pub fn run(
    bytes: &[u8],
    args: &[i64],
    globals: &mut Globals,
    mut call_fn: impl FnMut(Option<u16>, u32, &[i64]) -> CallResult,
) -> Result<Option<i64>, EmulateError> {
    let (program, offsets) = decode_program(bytes).map_err(EmulateError::Decode)?;
    let mut regs: HashMap<VarId, i64> = HashMap::new();
    let read = |regs: &HashMap<VarId, i64>, id: VarId| -> Result<i64, EmulateError> {
        if let Some(idx) = id.argument_index() {
            return args
                .get(idx as usize)
                .copied()
                .ok_or(EmulateError::StackFault("argument index out of range"));
        }
        regs.get(&id).copied().ok_or(EmulateError::StackFault("read of undefined SSA value"))
    };

    let mut pc = 0usize;
    loop {
        let instr = program.get(pc).ok_or(EmulateError::StackFault("fell off the end of the function"))?;
        let mut next_pc = pc + 1;
        match instr {
            Instr::Nop => {}
            Instr::AssignVariable { dst, src } => {
                let v = read(&regs, *src)?;
                regs.insert(*dst, v);
            }
            Instr::AssignLiteral { dst, literal, .. } => {
                regs.insert(*dst, *literal);
            }
            Instr::Load { dst, ptr } => {
                let p = read(&regs, *ptr)?;
                regs.insert(*dst, p);
            }
            Instr::LoadGlobal { dst, global } | Instr::LoadGlobalExt { dst, global, .. } => {
                let slot = globals.get(*global).ok_or(EmulateError::StackFault("unknown global"))?;
                let mut raw = [0u8; 8];
                let n = slot.bytes().len().min(8);
                raw[..n].copy_from_slice(&slot.bytes()[..n]);
                regs.insert(*dst, i64::from_le_bytes(raw));
            }
            Instr::Store { value, .. } => {
                read(&regs, *value)?;
            }
            Instr::StoreGlobal { global, value } | Instr::StoreGlobalExt { global, value, .. } => {
                let v = read(&regs, *value)?;
                let slot = globals.get_mut(*global).ok_or(EmulateError::StackFault("unknown global"))?;
                let len = slot.bytes().len();
                let bytes = v.to_le_bytes();
                slot.write(&bytes[..len.min(8)]).ok();
            }
            Instr::ExpandSX { dst, src, .. } | Instr::ExpandZX { dst, src, .. } | Instr::Trunc { dst, src, .. } => {
                let v = read(&regs, *src)?;
                regs.insert(*dst, v);
            }
            Instr::BinOpVtoV { dst, ty, op, a, b } => {
                let va = read(&regs, *a)?;
                let vb = read(&regs, *b)?;
                regs.insert(*dst, apply_binop(*op, *ty, va, vb)?);
            }
            Instr::BinOpVtoI { dst, ty, op, a, imm } => {
                let va = read(&regs, *a)?;
                regs.insert(*dst, apply_binop(*op, *ty, va, *imm)?);
            }
            Instr::BinOpItoV { dst, ty, op, imm, b } => {
                let vb = read(&regs, *b)?;
                regs.insert(*dst, apply_binop(*op, *ty, *imm, vb)?);
            }
            Instr::CompVtoV { dst, cond, a, b } => {
                let va = read(&regs, *a)?;
                let vb = read(&regs, *b)?;
                regs.insert(*dst, cond.eval_signed(va, vb) as i64);
            }
            Instr::CompVtoI { dst, cond, a, imm } => {
                let va = read(&regs, *a)?;
                regs.insert(*dst, cond.eval_signed(va, *imm) as i64);
            }
            Instr::CompItoV { dst, cond, imm, b } => {
                let vb = read(&regs, *b)?;
                regs.insert(*dst, cond.eval_signed(*imm, vb) as i64);
            }
            Instr::ComputePtr { dst, base, offset } => {
                let b = read(&regs, *base)?;
                regs.insert(*dst, b.wrapping_add(*offset));
            }
            Instr::Join { dst, parts } => {
                let mut acc: i64 = 0;
                let mut shift = 0u32;
                for p in parts {
                    let v = read(&regs, *p)?;
                    acc |= (v as i64) << shift;
                    shift += 8;
                }
                regs.insert(*dst, acc);
            }
            Instr::Split { value, remainder, src } => {
                let v = read(&regs, *src)?;
                regs.insert(*value, v);
                regs.insert(*remainder, 0);
            }
            Instr::Call { func_index, result, args: call_args } => {
                let vals: Vec<i64> = call_args.iter().map(|a| read(&regs, *a)).collect::<Result<_, _>>()?;
                let r = call_fn(None, *func_index, &vals)?;
                if let (Some(dst), Some(v)) = (result, r) {
                    regs.insert(*dst, v);
                }
            }
            Instr::CallExt { module, func_index, result, args: call_args } => {
                let vals: Vec<i64> = call_args.iter().map(|a| read(&regs, *a)).collect::<Result<_, _>>()?;
                let r = call_fn(Some(*module), *func_index, &vals)?;
                if let (Some(dst), Some(v)) = (result, r) {
                    regs.insert(*dst, v);
                }
            }
            Instr::CallInd { target, result, args: call_args } => {
                let func_index = read(&regs, *target)? as u32;
                let vals: Vec<i64> = call_args.iter().map(|a| read(&regs, *a)).collect::<Result<_, _>>()?;
                let r = call_fn(None, func_index, &vals)?;
                if let (Some(dst), Some(v)) = (result, r) {
                    regs.insert(*dst, v);
                }
            }
            Instr::CallIndExt { target, module, result, args: call_args } => {
                let func_index = read(&regs, *target)? as u32;
                let vals: Vec<i64> = call_args.iter().map(|a| read(&regs, *a)).collect::<Result<_, _>>()?;
                let r = call_fn(Some(*module), func_index, &vals)?;
                if let (Some(dst), Some(v)) = (result, r) {
                    regs.insert(*dst, v);
                }
            }
            Instr::Ret { value } => {
                return match value {
                    Some(v) => Ok(Some(read(&regs, *v)?)),
                    None => Ok(None),
                };
            }
            Instr::Jump { target } => {
                next_pc = *offsets.get(target).ok_or(EmulateError::StackFault("jump to unknown offset"))?;
            }
            Instr::JumpTrue { cond, target } => {
                if read(&regs, *cond)? != 0 {
                    next_pc = *offsets.get(target).ok_or(EmulateError::StackFault("jump to unknown offset"))?;
                }
            }
            Instr::JumpFalse { cond, target } => {
                if read(&regs, *cond)? == 0 {
                    next_pc = *offsets.get(target).ok_or(EmulateError::StackFault("jump to unknown offset"))?;
                }
            }
        }
        pc = next_pc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::writer::SsaWriter;

    #[test]
    fn runs_straight_line_arithmetic() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 10);
        let b = w.write_assign_literal(TypeInfo::I32, 32);
        let sum = w.write_binop_vtov(TypeInfo::I32, crate::ssa::opcode::BinOp::Add, a, b);
        w.write_ret(Some(sum));
        let buf = w.finish();

        let mut globals = Globals::new();
        let result = run(&buf.bytes, &[], &mut globals, |_, _, _| Ok(None)).unwrap();
        assert_eq!(result, Some(42));
    }

    #[test]
    fn divide_by_zero_is_reported() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 1);
        let z = w.write_assign_literal(TypeInfo::I32, 0);
        let d = w.write_binop_vtov(TypeInfo::I32, crate::ssa::opcode::BinOp::Div, a, z);
        w.write_ret(Some(d));
        let buf = w.finish();

        let mut globals = Globals::new();
        let err = run(&buf.bytes, &[], &mut globals, |_, _, _| Ok(None)).unwrap_err();
        assert_eq!(err, EmulateError::DivideByZero);
    }

    #[test]
    fn conditional_jump_skips_the_false_branch() {
        let mut w = SsaWriter::new();
        let cond = w.write_assign_literal(TypeInfo::BOOL, 0);
        // The jump's target operand sits after its opcode byte and the
        // 4-byte condition VarId.
        let jump_start = w.current_offset();
        w.write_jump_false(cond, 0);
        let jump_target_operand = jump_start + 1 + 4;
        let _skipped = w.write_assign_literal(TypeInfo::I32, 1);
        let target = w.current_offset();
        let marker = w.write_assign_literal(TypeInfo::I32, 7);
        w.write_ret(Some(marker));
        w.patch_u32_at(jump_target_operand, target);
        let program = w.finish();

        let mut globals = Globals::new();
        let result = run(&program.bytes, &[], &mut globals, |_, _, _| Ok(None)).unwrap();
        assert_eq!(result, Some(7));
    }
}
