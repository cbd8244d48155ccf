//! Builds an IR instruction stream (`spec.md` §4.2).
//!
//! Mirrors [`crate::ssa::writer::SsaWriter`]'s shape, but the opcodes
//! themselves pick their own wire width: the sugar forms (`Push0`..`Push3`,
//! `Pop0`..`Pop3`, ...) are one byte with no immediate, their general
//! forms (`PushN`, `PopN`, ...) are two bytes plus an explicit index.

use crate::ir::opcode::Opcode;

/// Incrementally builds an IR function body.
#[derive(Debug, Default)]
pub struct IrWriter {
    bytes: Vec<u8>,
}

impl IrWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit_opcode(&mut self, op: Opcode) {
        let (hi, lo) = op.wire_bytes();
        if let Some(hi) = hi {
            self.bytes.push(hi);
        }
        self.bytes.push(lo);
    }

    fn emit_u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// Pushes local `index` onto the stack, picking the one-byte sugar
    /// opcode for `index < 4` and the general two-byte form otherwise.
    pub fn write_push(&mut self, index: u16) {
        match index {
            0 => self.emit_opcode(Opcode::Push0),
            1 => self.emit_opcode(Opcode::Push1),
            2 => self.emit_opcode(Opcode::Push2),
            3 => self.emit_opcode(Opcode::Push3),
            n => {
                self.emit_opcode(Opcode::PushN);
                self.emit_u16(n);
            }
        }
    }

    pub fn write_push_arg(&mut self, index: u16) {
        match index {
            0 => self.emit_opcode(Opcode::PushArg0),
            1 => self.emit_opcode(Opcode::PushArg1),
            2 => self.emit_opcode(Opcode::PushArg2),
            3 => self.emit_opcode(Opcode::PushArg3),
            n => {
                self.emit_opcode(Opcode::PushArgN);
                self.emit_u16(n);
            }
        }
    }

    pub fn write_push_ptr(&mut self, local: u16) {
        self.emit_opcode(Opcode::PushPtr);
        self.emit_u16(local);
    }

    pub fn write_push_global(&mut self, global: u32) {
        self.emit_opcode(Opcode::PushGlobal);
        self.emit_u32(global);
    }

    pub fn write_push_global_ext(&mut self, global: u32, module: u16) {
        self.emit_opcode(Opcode::PushGlobalExt);
        self.emit_u32(global);
        self.emit_u16(module);
    }

    pub fn write_push_global_ptr(&mut self, global: u32) {
        self.emit_opcode(Opcode::PushGlobalPtr);
        self.emit_u32(global);
    }

    pub fn write_push_global_ext_ptr(&mut self, global: u32, module: u16) {
        self.emit_opcode(Opcode::PushGlobalExtPtr);
        self.emit_u32(global);
        self.emit_u16(module);
    }

    pub fn write_pop(&mut self, index: u16) {
        match index {
            0 => self.emit_opcode(Opcode::Pop0),
            1 => self.emit_opcode(Opcode::Pop1),
            2 => self.emit_opcode(Opcode::Pop2),
            3 => self.emit_opcode(Opcode::Pop3),
            n => {
                self.emit_opcode(Opcode::PopN);
                self.emit_u16(n);
            }
        }
    }

    pub fn write_pop_arg(&mut self, index: u16) {
        match index {
            0 => self.emit_opcode(Opcode::PopArg0),
            1 => self.emit_opcode(Opcode::PopArg1),
            2 => self.emit_opcode(Opcode::PopArg2),
            3 => self.emit_opcode(Opcode::PopArg3),
            n => {
                self.emit_opcode(Opcode::PopArgN);
                self.emit_u16(n);
            }
        }
    }

    pub fn write_pop_ptr(&mut self, local: u16) {
        self.emit_opcode(Opcode::PopPtr);
        self.emit_u16(local);
    }

    pub fn write_pop_global(&mut self, global: u32) {
        self.emit_opcode(Opcode::PopGlobal);
        self.emit_u32(global);
    }

    pub fn write_pop_global_ext(&mut self, global: u32, module: u16) {
        self.emit_opcode(Opcode::PopGlobalExt);
        self.emit_u32(global);
        self.emit_u16(module);
    }

    pub fn write_pop_count(&mut self, count: u16) {
        self.emit_opcode(Opcode::PopCount);
        self.emit_u16(count);
    }

    pub fn write_dup(&mut self, width: u8) {
        self.emit_opcode(match width {
            1 => Opcode::Dup1,
            2 => Opcode::Dup2,
            4 => Opcode::Dup4,
            8 => Opcode::Dup8,
            _ => panic!("unsupported dup width {width}"),
        });
    }

    pub fn write_load(&mut self, dst_local: u16, src_ptr_local: u16) {
        self.emit_opcode(Opcode::Load);
        self.emit_u16(dst_local);
        self.emit_u16(src_ptr_local);
    }

    pub fn write_load_global(&mut self, dst_local: u16, global: u32) {
        self.emit_opcode(Opcode::LoadGlobal);
        self.emit_u16(dst_local);
        self.emit_u32(global);
    }

    pub fn write_load_global_ext(&mut self, dst_local: u16, global: u32, module: u16) {
        self.emit_opcode(Opcode::LoadGlobalExt);
        self.emit_u16(dst_local);
        self.emit_u32(global);
        self.emit_u16(module);
    }

    pub fn write_store(&mut self, dst_ptr_local: u16, src_local: u16) {
        self.emit_opcode(Opcode::Store);
        self.emit_u16(dst_ptr_local);
        self.emit_u16(src_local);
    }

    pub fn write_store_global(&mut self, global: u32, src_local: u16) {
        self.emit_opcode(Opcode::StoreGlobal);
        self.emit_u32(global);
        self.emit_u16(src_local);
    }

    pub fn write_store_global_ext(&mut self, global: u32, module: u16, src_local: u16) {
        self.emit_opcode(Opcode::StoreGlobalExt);
        self.emit_u32(global);
        self.emit_u16(module);
        self.emit_u16(src_local);
    }

    pub fn write_const_small(&mut self, value: u8) {
        self.emit_opcode(match value {
            0 => Opcode::Const0,
            1 => Opcode::Const1,
            2 => Opcode::Const2,
            3 => Opcode::Const3,
            4 => Opcode::Const4,
            0xFF => Opcode::ConstFF,
            0x7F => Opcode::Const7F,
            _ => panic!("{value} has no small-constant sugar opcode"),
        });
    }

    pub fn write_const(&mut self, value: u32) {
        self.emit_opcode(Opcode::ConstN);
        self.emit_u32(value);
    }

    pub fn write_binop(&mut self, op: Opcode) {
        self.emit_opcode(op);
    }

    pub fn write_call(&mut self, func_index: u32) {
        self.emit_opcode(Opcode::Call);
        self.emit_u32(func_index);
    }

    pub fn write_call_ext(&mut self, func_index: u32, module: u16) {
        self.emit_opcode(Opcode::CallExt);
        self.emit_u32(func_index);
        self.emit_u16(module);
    }

    /// `local_index` names the local whose registered type carries the
    /// mangled argument-list signature the lifter recovers at call time
    /// (`spec.md` §4.4, §9).
    pub fn write_call_ind(&mut self, local_index: u32) {
        self.emit_opcode(Opcode::CallInd);
        self.emit_u32(local_index);
    }

    pub fn write_call_ind_ext(&mut self, local_index: u32, module: u16) {
        self.emit_opcode(Opcode::CallIndExt);
        self.emit_u32(local_index);
        self.emit_u16(module);
    }

    pub fn write_ret(&mut self) {
        self.emit_opcode(Opcode::Ret);
    }

    /// Encodes `target` (an absolute byte offset into this function's body)
    /// as the signed offset relative to the first byte after the
    /// immediate, the wire's actual unit (`spec.md` §6).
    fn relative_offset(&self, target: u32) -> i32 {
        let after_immediate = self.bytes.len() as i64 + 4;
        (target as i64 - after_immediate) as i32
    }

    pub fn write_jump(&mut self, target: u32) {
        self.emit_opcode(Opcode::Jump);
        let offset = self.relative_offset(target);
        self.emit_i32(offset);
    }

    pub fn write_jump_true(&mut self, target: u32) {
        self.emit_opcode(Opcode::JumpTrue);
        let offset = self.relative_offset(target);
        self.emit_i32(offset);
    }

    pub fn write_jump_false(&mut self, target: u32) {
        self.emit_opcode(Opcode::JumpFalse);
        let offset = self.relative_offset(target);
        self.emit_i32(offset);
    }

    pub fn current_offset(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_pushes_pick_one_byte_sugar() {
        let mut w = IrWriter::new();
        w.write_push(2);
        assert_eq!(w.finish(), vec![0x12]);
    }

    #[test]
    fn large_push_falls_back_to_pushn() {
        let mut w = IrWriter::new();
        w.write_push(500);
        let bytes = w.finish();
        assert_eq!(bytes[0], 0x90);
        assert_eq!(bytes[1], 0x10);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 500);
    }
}
