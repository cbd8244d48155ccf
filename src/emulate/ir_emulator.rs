//! A reference interpreter for raw IR bytecode (`spec.md` §4.1–§4.2),
//! independent of the lifter and the SSA form.
//!
//! This exists alongside [`crate::emulate::ssa_emulator`] so a function can
//! be checked two ways: interpret its IR directly, lift it and interpret
//! the SSA, and compare. Like the SSA emulator, everything is carried as
//! raw `i64` bit patterns; floats are reinterpreted at the arithmetic ops
//! that need them.

use hashbrown::HashMap;

use crate::emulate::globals::Globals;
use crate::error::{DecodeError, EmulateError};
use crate::ir::function::{CalleeSignature, IrFunction};
use crate::ir::opcode::Opcode;
use crate::mangle::{self, ArgSlot};
use crate::types::{TypeInfo, TypeRegistry};

fn read_u16(bytes: &[u8], off: usize) -> Result<(u16, usize), DecodeError> {
    let s: [u8; 2] = bytes
        .get(off..off + 2)
        .ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?
        .try_into()
        .expect("slice of length 2");
    Ok((u16::from_le_bytes(s), 2))
}

fn read_u32(bytes: &[u8], off: usize) -> Result<(u32, usize), DecodeError> {
    let s: [u8; 4] = bytes
        .get(off..off + 4)
        .ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?
        .try_into()
        .expect("slice of length 4");
    Ok((u32::from_le_bytes(s), 4))
}

fn read_i32(bytes: &[u8], off: usize) -> Result<(i32, usize), DecodeError> {
    let s: [u8; 4] = bytes
        .get(off..off + 4)
        .ok_or(DecodeError::TruncatedImmediate { offset: off as u32, opcode: 0 })?
        .try_into()
        .expect("slice of length 4");
    Ok((i32::from_le_bytes(s), 4))
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    value: i64,
    size: u32,
}

fn apply_binop(op: Opcode, a: i64, b: i64) -> Result<i64, EmulateError> {
    use Opcode::*;
    Ok(match op {
        AddI32 => (a as i32).wrapping_add(b as i32) as i64,
        SubI32 => (a as i32).wrapping_sub(b as i32) as i64,
        MulI32 => (a as i32).wrapping_mul(b as i32) as i64,
        DivI32 => {
            if b == 0 {
                return Err(EmulateError::DivideByZero);
            }
            (a as i32).wrapping_div(b as i32) as i64
        }
        AddI64 => a.wrapping_add(b),
        SubI64 => a.wrapping_sub(b),
        MulI64 => a.wrapping_mul(b),
        DivI64 => {
            if b == 0 {
                return Err(EmulateError::DivideByZero);
            }
            a.wrapping_div(b)
        }
        _ => return Err(EmulateError::StackFault("not a binary arithmetic opcode")),
    })
}

fn eval_compare(op: Opcode, a: i64, b: i64) -> bool {
    use Opcode::*;
    let cond = (op as u16 & 0x0F) as u8;
    let cond = crate::ir::opcode::CompareCondition::from_u8(cond).expect("compare opcode encodes a valid condition");
    match op {
        CompI32Above | CompI32AboveOrEqual | CompI32Below | CompI32BelowOrEqual | CompI32Equal | CompI32Greater
        | CompI32GreaterOrEqual | CompI32Less | CompI32LessOrEqual | CompI32NotEqual => {
            cond.eval_signed(a as i32 as i64, b as i32 as i64)
        }
        _ => cond.eval_signed(a, b),
    }
}

/// Interprets `func`'s raw IR bytecode.
///
/// `args` supplies the function's incoming argument-register values;
/// `globals` backs `PushGlobal*`/`PopGlobal*`. `resolve_call_signature`
/// answers what a `Call`/`CallExt` site's target returns and how it wants
/// its arguments passed, the same question [`crate::lifter::lift::lift`]
/// asks; `call_fn` then actually dispatches the call. `CallInd`/
/// `CallIndExt` resolve their own argument layout from their target
/// local's registered mangled signature instead (`spec.md` §4.4, §9).
pub fn run(
    func: &IrFunction,
    registry: &TypeRegistry,
    args: &[i64],
    globals: &mut Globals,
    mut resolve_call_signature: impl FnMut(Option<u16>, u32) -> Option<CalleeSignature>,
    mut call_fn: impl FnMut(Option<u16>, u32, &[i64]) -> Result<Option<i64>, EmulateError>,
) -> Result<Option<i64>, EmulateError> {
    let bytes = &func.bytecode;
    let mut stack: Vec<Frame> = Vec::new();
    let mut locals: Vec<i64> = vec![0; func.locals.len()];
    let mut arg_regs: Vec<i64> = vec![0; func.arguments.len().max(args.len())];
    arg_regs[..args.len()].copy_from_slice(args);
    let mut offsets: HashMap<u32, usize> = HashMap::new();
    let mut pc_positions: Vec<usize> = Vec::new();

    // First pass: record every instruction's starting byte offset so
    // Jump/JumpTrue/JumpFalse can resolve their u32 targets to a pc.
    {
        let mut off = 0usize;
        while off < bytes.len() {
            offsets.insert(off as u32, pc_positions.len());
            pc_positions.push(off);
            let (op, op_len) = Opcode::decode(bytes, off)?;
            off += op_len;
            off += operand_len(op);
        }
    }

    let pop = |stack: &mut Vec<Frame>, size: u32| -> Result<i64, EmulateError> {
        let frame = stack.pop().ok_or(EmulateError::StackFault("operand stack underflow"))?;
        debug_assert!(frame.size == size || size == 8);
        Ok(frame.value)
    };

    // Forwards a caller's own argument register, or pops one raw 8-byte
    // value off the operand stack, per declared `ArgSlot` (`spec.md` §3,
    // §4.4, mirroring the original's `HandleCallSite`).
    let build_call_args = |arg_regs: &[i64], stack: &mut Vec<Frame>, slots: &[ArgSlot]| -> Result<Vec<i64>, EmulateError> {
        slots
            .iter()
            .map(|slot| match *slot {
                ArgSlot::Register(k) => {
                    arg_regs.get(k as usize).copied().ok_or(EmulateError::StackFault("argument register out of range"))
                }
                ArgSlot::Stack(_) => pop(stack, 8),
            })
            .collect()
    };

    let mut pc = 0usize;
    loop {
        let Some(&off) = pc_positions.get(pc) else {
            return Err(EmulateError::StackFault("fell off the end of the function body"));
        };
        let (op, op_len) = Opcode::decode(bytes, off)?;
        let mut cursor = off + op_len;
        use Opcode::*;
        match op {
            Nop => {}
            Push0 | Push1 | Push2 | Push3 => {
                let idx = (op as u16 & 0x0F) as usize;
                stack.push(Frame { value: locals[idx], size: 8 });
            }
            PushN => {
                let (idx, l) = read_u16(bytes, cursor)?;
                cursor += l;
                stack.push(Frame { value: locals[idx as usize], size: 8 });
            }
            PushArg0 | PushArg1 | PushArg2 | PushArg3 => {
                let idx = (op as u16 & 0x0F) as usize;
                stack.push(Frame {
                    value: *arg_regs.get(idx).ok_or(EmulateError::StackFault("argument index out of range"))?,
                    size: 8,
                });
            }
            PushArgN => {
                let (idx, l) = read_u16(bytes, cursor)?;
                cursor += l;
                stack.push(Frame {
                    value: *arg_regs
                        .get(idx as usize)
                        .ok_or(EmulateError::StackFault("argument index out of range"))?,
                    size: 8,
                });
            }
            Pop0 | Pop1 | Pop2 | Pop3 => {
                let idx = (op as u16 & 0x0F) as usize;
                locals[idx] = pop(&mut stack, 8)?;
            }
            PopN => {
                let (idx, l) = read_u16(bytes, cursor)?;
                cursor += l;
                locals[idx as usize] = pop(&mut stack, 8)?;
            }
            PopArg0 | PopArg1 | PopArg2 | PopArg3 => {
                let idx = (op as u16 & 0x0F) as usize;
                let value = pop(&mut stack, 8)?;
                arg_regs[idx] = value;
            }
            PopArgN => {
                let (idx, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let value = pop(&mut stack, 8)?;
                arg_regs[idx as usize] = value;
            }
            PushPtr => {
                let (idx, l) = read_u16(bytes, cursor)?;
                cursor += l;
                stack.push(Frame { value: locals[idx as usize], size: 8 });
            }
            PopPtr => {
                let (idx, l) = read_u16(bytes, cursor)?;
                cursor += l;
                locals[idx as usize] = pop(&mut stack, 8)?;
            }
            PushGlobal | PushGlobalPtr => {
                let (global, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let value = read_global(globals, global)?;
                stack.push(Frame { value, size: 8 });
            }
            PushGlobalExt | PushGlobalExtPtr => {
                let (global, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let (_module, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let value = read_global(globals, global)?;
                stack.push(Frame { value, size: 8 });
            }
            PopGlobal | PopGlobalPtr => {
                let (global, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let value = pop(&mut stack, 8)?;
                write_global(globals, global, value)?;
            }
            PopGlobalExt | PopGlobalExtPtr => {
                let (global, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let (_module, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let value = pop(&mut stack, 8)?;
                write_global(globals, global, value)?;
            }
            PopCount => {
                let (count, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let mut remaining = count as u32;
                while remaining > 0 {
                    let frame = stack.pop().ok_or(EmulateError::StackFault("operand stack underflow"))?;
                    remaining = remaining.saturating_sub(frame.size);
                }
            }
            Dup1 | Dup2 | Dup4 | Dup8 => {
                let width = match op {
                    Dup1 => 1,
                    Dup2 => 2,
                    Dup4 => 4,
                    Dup8 => 8,
                    _ => unreachable!(),
                };
                let top = *stack.last().ok_or(EmulateError::StackFault("operand stack underflow"))?;
                stack.push(Frame { value: top.value, size: width });
            }
            ExpandSX12 | ExpandSX14 | ExpandSX18 | ExpandSX24 | ExpandSX28 | ExpandSX48 => {
                let v = pop(&mut stack, 8)?;
                stack.push(Frame { value: v, size: 8 });
            }
            ExpandZX12 | ExpandZX14 | ExpandZX18 | ExpandZX24 | ExpandZX28 | ExpandZX48 => {
                let v = pop(&mut stack, 8)?;
                let masked = match op {
                    ExpandZX12 | ExpandZX14 | ExpandZX18 => v & 0xFF,
                    ExpandZX24 | ExpandZX28 => v & 0xFFFF,
                    ExpandZX48 => v & 0xFFFF_FFFF,
                    _ => unreachable!(),
                };
                stack.push(Frame { value: masked, size: 8 });
            }
            Trunc84 | Trunc82 | Trunc81 | Trunc42 | Trunc41 | Trunc21 => {
                let v = pop(&mut stack, 8)?;
                let mask: i64 = match op {
                    Trunc84 | Trunc42 => 0xFFFF_FFFF,
                    Trunc82 | Trunc21 => 0xFFFF,
                    Trunc81 | Trunc41 => 0xFF,
                    _ => unreachable!(),
                };
                stack.push(Frame { value: v & mask, size: 8 });
            }
            Load => {
                let (dst, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let (src, l) = read_u16(bytes, cursor)?;
                cursor += l;
                locals[dst as usize] = locals[src as usize];
            }
            LoadGlobal => {
                let (dst, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let (global, l) = read_u32(bytes, cursor)?;
                cursor += l;
                locals[dst as usize] = read_global(globals, global)?;
            }
            LoadGlobalExt => {
                let (dst, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let (global, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let (_module, l) = read_u16(bytes, cursor)?;
                cursor += l;
                locals[dst as usize] = read_global(globals, global)?;
            }
            Store => {
                let (dst, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let (src, l) = read_u16(bytes, cursor)?;
                cursor += l;
                locals[dst as usize] = locals[src as usize];
            }
            StoreGlobal => {
                let (global, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let (src, l) = read_u16(bytes, cursor)?;
                cursor += l;
                write_global(globals, global, locals[src as usize])?;
            }
            StoreGlobalExt => {
                let (global, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let (_module, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let (src, l) = read_u16(bytes, cursor)?;
                cursor += l;
                write_global(globals, global, locals[src as usize])?;
            }
            Const0 | Const1 | Const2 | Const3 | Const4 | ConstFF | Const7F => {
                let value = match op {
                    Const0 => 0,
                    Const1 => 1,
                    Const2 => 2,
                    Const3 => 3,
                    Const4 => 4,
                    ConstFF => 0xFF,
                    Const7F => 0x7F,
                    _ => unreachable!(),
                };
                stack.push(Frame { value, size: 4 });
            }
            ConstN => {
                let (value, l) = read_u32(bytes, cursor)?;
                cursor += l;
                stack.push(Frame { value: value as i64, size: 4 });
            }
            AddI32 | SubI32 | MulI32 | DivI32 | AddI64 | SubI64 | MulI64 | DivI64 => {
                let b = pop(&mut stack, 8)?;
                let a = pop(&mut stack, 8)?;
                let r = apply_binop(op, a, b)?;
                let size = if matches!(op, AddI32 | SubI32 | MulI32 | DivI32) { 4 } else { 8 };
                stack.push(Frame { value: r, size });
            }
            CompI32Above | CompI32AboveOrEqual | CompI32Below | CompI32BelowOrEqual | CompI32Equal
            | CompI32Greater | CompI32GreaterOrEqual | CompI32Less | CompI32LessOrEqual | CompI32NotEqual
            | CompI64Above | CompI64AboveOrEqual | CompI64Below | CompI64BelowOrEqual | CompI64Equal
            | CompI64Greater | CompI64GreaterOrEqual | CompI64Less | CompI64LessOrEqual | CompI64NotEqual => {
                let b = pop(&mut stack, 8)?;
                let a = pop(&mut stack, 8)?;
                let r = eval_compare(op, a, b);
                stack.push(Frame { value: r as i64, size: 1 });
            }
            Call => {
                let (func_index, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let sig = resolve_call_signature(None, func_index);
                let slots = sig.as_ref().map(|s| s.arguments.as_slice()).unwrap_or(&[]);
                let call_args = build_call_args(&arg_regs, &mut stack, slots)?;
                let result = call_fn(None, func_index, &call_args)?;
                if let Some(v) = result {
                    arg_regs[0] = v;
                }
            }
            CallExt => {
                let (func_index, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let (module, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let sig = resolve_call_signature(Some(module), func_index);
                let slots = sig.as_ref().map(|s| s.arguments.as_slice()).unwrap_or(&[]);
                let call_args = build_call_args(&arg_regs, &mut stack, slots)?;
                let result = call_fn(Some(module), func_index, &call_args)?;
                if let Some(v) = result {
                    arg_regs[0] = v;
                }
            }
            CallInd => {
                let (local_index, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let target = *locals
                    .get(local_index as usize)
                    .ok_or(EmulateError::StackFault("indirect call target local out of range"))?;
                let slots = indirect_signature(func, registry, local_index as u16)?;
                let call_args = build_call_args(&arg_regs, &mut stack, &slots)?;
                let result = call_fn(None, target as u32, &call_args)?;
                if let Some(v) = result {
                    arg_regs[0] = v;
                }
            }
            CallIndExt => {
                let (local_index, l) = read_u32(bytes, cursor)?;
                cursor += l;
                let (module, l) = read_u16(bytes, cursor)?;
                cursor += l;
                let target = *locals
                    .get(local_index as usize)
                    .ok_or(EmulateError::StackFault("indirect call target local out of range"))?;
                let slots = indirect_signature(func, registry, local_index as u16)?;
                let call_args = build_call_args(&arg_regs, &mut stack, &slots)?;
                let result = call_fn(Some(module), target as u32, &call_args)?;
                if let Some(v) = result {
                    arg_regs[0] = v;
                }
            }
            Ret => {
                // The return value always lives in argument register 0,
                // never on the operand stack (`spec.md` §4.4, §4.8).
                let value = if func.return_type.is_some() {
                    Some(*arg_regs.first().ok_or(EmulateError::StackFault("no argument register 0 to return"))?)
                } else {
                    None
                };
                return Ok(value);
            }
            Jump => {
                let (rel, l) = read_i32(bytes, cursor)?;
                let target = (cursor as i64 + l as i64 + rel as i64) as u32;
                pc = *offsets
                    .get(&target)
                    .ok_or(EmulateError::StackFault("jump target is not an instruction boundary"))?;
                continue;
            }
            JumpTrue | JumpFalse => {
                let (rel, l) = read_i32(bytes, cursor)?;
                let target = (cursor as i64 + l as i64 + rel as i64) as u32;
                let cond = pop(&mut stack, 1)? != 0;
                let take = if op == JumpTrue { cond } else { !cond };
                if take {
                    pc = *offsets
                        .get(&target)
                        .ok_or(EmulateError::StackFault("jump target is not an instruction boundary"))?;
                    continue;
                }
            }
        }
        pc += 1;
    }
}

/// Recovers an indirect call target's argument layout from the mangled
/// signature string carried by its local's registered custom type
/// (`spec.md` §4.4, §9).
fn indirect_signature(func: &IrFunction, registry: &TypeRegistry, local_index: u16) -> Result<Vec<ArgSlot>, EmulateError> {
    let ty = *func
        .locals
        .get(local_index as usize)
        .ok_or(EmulateError::StackFault("indirect call target local out of range"))?;
    let id = ty.custom_type_id().ok_or(EmulateError::StackFault("indirect call target is not a custom type"))?;
    let descriptor = registry.lookup(id).ok_or(EmulateError::StackFault("indirect call target type not registered"))?;
    let name = descriptor
        .debug
        .as_ref()
        .and_then(|d| d.name.as_ref())
        .ok_or(EmulateError::StackFault("indirect call target has no mangled signature"))?;
    mangle::parse(name).map_err(|_| EmulateError::StackFault("indirect call target signature failed to parse"))
}

fn read_global(globals: &Globals, index: u32) -> Result<i64, EmulateError> {
    let slot = globals.get(index).ok_or(EmulateError::StackFault("unknown global index"))?;
    let mut buf = [0u8; 8];
    let bytes = slot.bytes();
    buf[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
    Ok(i64::from_le_bytes(buf))
}

fn write_global(globals: &mut Globals, index: u32, value: i64) -> Result<(), EmulateError> {
    let slot = globals.get_mut(index).ok_or(EmulateError::StackFault("unknown global index"))?;
    let width = slot.bytes().len();
    slot.write(&value.to_le_bytes()[..width])
}

/// Byte length of `op`'s immediate operand(s). Used only by the
/// pc-mapping pre-pass; the main loop re-decodes operands itself.
fn operand_len(op: Opcode) -> usize {
    use Opcode::*;
    match op {
        Nop | Push0 | Push1 | Push2 | Push3 | PushArg0 | PushArg1 | PushArg2 | PushArg3 | Pop0 | Pop1 | Pop2
        | Pop3 | PopArg0 | PopArg1 | PopArg2 | PopArg3 | Dup1 | Dup2 | Dup4 | Dup8 | Const0 | Const1 | Const2
        | Const3 | Const4 | ConstFF | Const7F | AddI32 | AddI64 | SubI32 | SubI64 | MulI32 | MulI64 | DivI32
        | DivI64 | CompI32Above | CompI32AboveOrEqual | CompI32Below | CompI32BelowOrEqual | CompI32Equal
        | CompI32Greater | CompI32GreaterOrEqual | CompI32Less | CompI32LessOrEqual | CompI32NotEqual
        | CompI64Above | CompI64AboveOrEqual | CompI64Below | CompI64BelowOrEqual | CompI64Equal | CompI64Greater
        | CompI64GreaterOrEqual | CompI64Less | CompI64LessOrEqual | CompI64NotEqual | Ret | ExpandSX12
        | ExpandSX14 | ExpandSX18 | ExpandSX24 | ExpandSX28 | ExpandSX48 | ExpandZX12 | ExpandZX14 | ExpandZX18
        | ExpandZX24 | ExpandZX28 | ExpandZX48 | Trunc84 | Trunc82 | Trunc81 | Trunc42 | Trunc41 | Trunc21 => 0,
        PushN | PushArgN | PopN | PopArgN | PushPtr | PopPtr | PopCount => 2,
        PushGlobal | PushGlobalPtr | Call => 4,
        PushGlobalExt | PushGlobalExtPtr | CallExt => 6,
        PopGlobal | PopGlobalPtr => 4,
        PopGlobalExt | PopGlobalExtPtr => 6,
        Load | Store => 4,
        LoadGlobal => 6,
        LoadGlobalExt => 8,
        StoreGlobal => 6,
        StoreGlobalExt => 8,
        ConstN => 4,
        CallInd => 4,
        CallIndExt => 6,
        Jump | JumpTrue | JumpFalse => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::writer::IrWriter;

    #[test]
    fn runs_straight_line_arithmetic() {
        let mut w = IrWriter::new();
        w.write_const(10);
        w.write_const(32);
        w.write_binop(Opcode::AddI64);
        w.write_ret();
        let bytecode = w.finish();
        let mut func = IrFunction::new("f", bytecode, vec![], vec![]);
        func.return_type = Some(TypeInfo::I64);

        let registry = TypeRegistry::new();
        let mut globals = Globals::new();
        let result = run(&func, &registry, &[], &mut globals, |_, _| None, |_, _, _| Ok(None)).unwrap();
        assert_eq!(result, Some(42));
    }

    #[test]
    fn conditional_jump_skips_the_false_branch() {
        let mut w = IrWriter::new();
        w.write_const_small(1);
        let jump_opcode_at = w.current_offset();
        w.write_jump_false(0);
        w.write_const_small(4);
        w.write_ret();
        let target = w.current_offset();
        w.write_const(7);
        w.write_ret();
        let mut bytes = w.finish();

        let imm_at = (jump_opcode_at + 1) as usize;
        let after_immediate = imm_at as i64 + 4;
        let relative = (target as i64 - after_immediate) as i32;
        bytes[imm_at..imm_at + 4].copy_from_slice(&relative.to_le_bytes());

        let mut func = IrFunction::new("f", bytes, vec![], vec![]);
        func.return_type = Some(TypeInfo::I32);
        let registry = TypeRegistry::new();
        let mut globals = Globals::new();
        let result = run(&func, &registry, &[], &mut globals, |_, _| None, |_, _, _| Ok(None)).unwrap();
        assert_eq!(result, Some(7));
    }

    #[test]
    fn division_by_zero_is_reported() {
        let mut w = IrWriter::new();
        w.write_const_small(1);
        w.write_const_small(0);
        w.write_binop(Opcode::DivI32);
        w.write_ret();
        let bytecode = w.finish();
        let mut func = IrFunction::new("f", bytecode, vec![], vec![]);
        func.return_type = Some(TypeInfo::I32);
        let registry = TypeRegistry::new();
        let mut globals = Globals::new();
        let err = run(&func, &registry, &[], &mut globals, |_, _| None, |_, _, _| Ok(None)).unwrap_err();
        assert_eq!(err, EmulateError::DivideByZero);
    }
}
