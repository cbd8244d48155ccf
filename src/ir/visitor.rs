//! Decodes an IR instruction stream, dispatching to a visitor
//! (`spec.md` §4.2).
//!
//! The sugar opcodes (`Push0`..`Push3`, `Pop0`..`Pop3`, `PushArg0`..
//! `PushArg3`, `PopArg0`..`PopArg3`) each have their own trait method, but
//! its default implementation forwards to the general handler
//! (`visit_push`, `visit_pop`, ...) with the implied index. A visitor that
//! only cares about "a local got pushed, which one" overrides just the
//! general method; one that wants to special-case `Push0` overrides that
//! method alone and the other sugar forms still fall through.

use crate::error::DecodeError;
use crate::ir::opcode::Opcode;

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

#[allow(unused_variables)]
pub trait IrVisitor {
    fn visit_nop(&mut self) {}

    fn visit_push(&mut self, local: u16) {}
    fn visit_push0(&mut self) {
        self.visit_push(0);
    }
    fn visit_push1(&mut self) {
        self.visit_push(1);
    }
    fn visit_push2(&mut self) {
        self.visit_push(2);
    }
    fn visit_push3(&mut self) {
        self.visit_push(3);
    }

    fn visit_push_arg(&mut self, arg: u16) {}
    fn visit_push_arg0(&mut self) {
        self.visit_push_arg(0);
    }
    fn visit_push_arg1(&mut self) {
        self.visit_push_arg(1);
    }
    fn visit_push_arg2(&mut self) {
        self.visit_push_arg(2);
    }
    fn visit_push_arg3(&mut self) {
        self.visit_push_arg(3);
    }

    fn visit_push_ptr(&mut self, local: u16) {}
    fn visit_push_global(&mut self, global: u32) {}
    fn visit_push_global_ext(&mut self, global: u32, module: u16) {}
    fn visit_push_global_ptr(&mut self, global: u32) {}
    fn visit_push_global_ext_ptr(&mut self, global: u32, module: u16) {}

    fn visit_pop(&mut self, local: u16) {}
    fn visit_pop0(&mut self) {
        self.visit_pop(0);
    }
    fn visit_pop1(&mut self) {
        self.visit_pop(1);
    }
    fn visit_pop2(&mut self) {
        self.visit_pop(2);
    }
    fn visit_pop3(&mut self) {
        self.visit_pop(3);
    }

    fn visit_pop_arg(&mut self, arg: u16) {}
    fn visit_pop_arg0(&mut self) {
        self.visit_pop_arg(0);
    }
    fn visit_pop_arg1(&mut self) {
        self.visit_pop_arg(1);
    }
    fn visit_pop_arg2(&mut self) {
        self.visit_pop_arg(2);
    }
    fn visit_pop_arg3(&mut self) {
        self.visit_pop_arg(3);
    }

    fn visit_pop_ptr(&mut self, local: u16) {}
    fn visit_pop_global(&mut self, global: u32) {}
    fn visit_pop_global_ext(&mut self, global: u32, module: u16) {}
    fn visit_pop_global_ptr(&mut self, global: u32) {}
    fn visit_pop_global_ext_ptr(&mut self, global: u32, module: u16) {}
    fn visit_pop_count(&mut self, count: u16) {}

    fn visit_dup(&mut self, width: u8) {}

    fn visit_expand_sx(&mut self, from: u8, to: u8) {}
    fn visit_expand_zx(&mut self, from: u8, to: u8) {}
    fn visit_trunc(&mut self, from: u8, to: u8) {}

    fn visit_load(&mut self, dst_local: u16, src_ptr_local: u16) {}
    fn visit_load_global(&mut self, dst_local: u16, global: u32) {}
    fn visit_load_global_ext(&mut self, dst_local: u16, global: u32, module: u16) {}
    fn visit_store(&mut self, dst_ptr_local: u16, src_local: u16) {}
    fn visit_store_global(&mut self, global: u32, src_local: u16) {}
    fn visit_store_global_ext(&mut self, global: u32, module: u16, src_local: u16) {}

    fn visit_const(&mut self, value: u32) {}
    fn visit_const0(&mut self) {
        self.visit_const(0);
    }
    fn visit_const1(&mut self) {
        self.visit_const(1);
    }
    fn visit_const2(&mut self) {
        self.visit_const(2);
    }
    fn visit_const3(&mut self) {
        self.visit_const(3);
    }
    fn visit_const4(&mut self) {
        self.visit_const(4);
    }
    fn visit_const_ff(&mut self) {
        self.visit_const(0xFF);
    }
    fn visit_const_7f(&mut self) {
        self.visit_const(0x7F);
    }

    fn visit_add_i32(&mut self) {}
    fn visit_add_i64(&mut self) {}
    fn visit_sub_i32(&mut self) {}
    fn visit_sub_i64(&mut self) {}
    fn visit_mul_i32(&mut self) {}
    fn visit_mul_i64(&mut self) {}
    fn visit_div_i32(&mut self) {}
    fn visit_div_i64(&mut self) {}

    fn visit_comp_i32(&mut self, cond: u8) {}
    fn visit_comp_i64(&mut self, cond: u8) {}

    fn visit_call(&mut self, func_index: u32) {}
    fn visit_call_ext(&mut self, func_index: u32, module: u16) {}
    fn visit_call_ind(&mut self, local_index: u32) {}
    fn visit_call_ind_ext(&mut self, local_index: u32, module: u16) {}

    fn visit_ret(&mut self) {}
    fn visit_jump(&mut self, target: u32) {}
    fn visit_jump_true(&mut self, target: u32) {}
    fn visit_jump_false(&mut self, target: u32) {}
}

fn widths_for(op: Opcode) -> (u8, u8) {
    use Opcode::*;
    match op {
        ExpandSX12 => (1, 2),
        ExpandSX14 => (1, 4),
        ExpandSX18 => (1, 8),
        ExpandSX24 => (2, 4),
        ExpandSX28 => (2, 8),
        ExpandSX48 => (4, 8),
        ExpandZX12 => (1, 2),
        ExpandZX14 => (1, 4),
        ExpandZX18 => (1, 8),
        ExpandZX24 => (2, 4),
        ExpandZX28 => (2, 8),
        ExpandZX48 => (4, 8),
        Trunc84 => (8, 4),
        Trunc82 => (8, 2),
        Trunc81 => (8, 1),
        Trunc42 => (4, 2),
        Trunc41 => (4, 1),
        Trunc21 => (2, 1),
        _ => unreachable!("widths_for called on non-conversion opcode"),
    }
}

/// Decodes `bytes` front to back, dispatching each instruction to
/// `visitor`.
pub fn walk(bytes: &[u8], visitor: &mut impl IrVisitor) -> Result<(), DecodeError> {
    let mut off = 0usize;
    while off < bytes.len() {
        let (op, op_len) = Opcode::decode(bytes, off)?;
        off += op_len;
        use Opcode::*;
        match op {
            Nop => visitor.visit_nop(),
            Push0 => visitor.visit_push0(),
            Push1 => visitor.visit_push1(),
            Push2 => visitor.visit_push2(),
            Push3 => visitor.visit_push3(),
            PushN => {
                let (n, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_push(n);
            }
            PushArg0 => visitor.visit_push_arg0(),
            PushArg1 => visitor.visit_push_arg1(),
            PushArg2 => visitor.visit_push_arg2(),
            PushArg3 => visitor.visit_push_arg3(),
            PushArgN => {
                let (n, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_push_arg(n);
            }
            PushPtr => {
                let (n, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_push_ptr(n);
            }
            PushGlobal => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_push_global(g);
            }
            PushGlobalExt => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_push_global_ext(g, m);
            }
            PushGlobalPtr => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_push_global_ptr(g);
            }
            PushGlobalExtPtr => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_push_global_ext_ptr(g, m);
            }
            Pop0 => visitor.visit_pop0(),
            Pop1 => visitor.visit_pop1(),
            Pop2 => visitor.visit_pop2(),
            Pop3 => visitor.visit_pop3(),
            PopN => {
                let (n, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_pop(n);
            }
            PopArg0 => visitor.visit_pop_arg0(),
            PopArg1 => visitor.visit_pop_arg1(),
            PopArg2 => visitor.visit_pop_arg2(),
            PopArg3 => visitor.visit_pop_arg3(),
            PopArgN => {
                let (n, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_pop_arg(n);
            }
            PopPtr => {
                let (n, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_pop_ptr(n);
            }
            PopGlobal => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_pop_global(g);
            }
            PopGlobalExt => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_pop_global_ext(g, m);
            }
            PopGlobalPtr => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_pop_global_ptr(g);
            }
            PopGlobalExtPtr => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_pop_global_ext_ptr(g, m);
            }
            PopCount => {
                let (n, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_pop_count(n);
            }
            Dup1 => visitor.visit_dup(1),
            Dup2 => visitor.visit_dup(2),
            Dup4 => visitor.visit_dup(4),
            Dup8 => visitor.visit_dup(8),
            ExpandSX12 | ExpandSX14 | ExpandSX18 | ExpandSX24 | ExpandSX28 | ExpandSX48 => {
                let (from, to) = widths_for(op);
                visitor.visit_expand_sx(from, to);
            }
            ExpandZX12 | ExpandZX14 | ExpandZX18 | ExpandZX24 | ExpandZX28 | ExpandZX48 => {
                let (from, to) = widths_for(op);
                visitor.visit_expand_zx(from, to);
            }
            Trunc84 | Trunc82 | Trunc81 | Trunc42 | Trunc41 | Trunc21 => {
                let (from, to) = widths_for(op);
                visitor.visit_trunc(from, to);
            }
            Load => {
                let (dst, l) = read_u16(bytes, off)?;
                off += l;
                let (src, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_load(dst, src);
            }
            LoadGlobal => {
                let (dst, l) = read_u16(bytes, off)?;
                off += l;
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_load_global(dst, g);
            }
            LoadGlobalExt => {
                let (dst, l) = read_u16(bytes, off)?;
                off += l;
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_load_global_ext(dst, g, m);
            }
            Store => {
                let (dst, l) = read_u16(bytes, off)?;
                off += l;
                let (src, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_store(dst, src);
            }
            StoreGlobal => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                let (src, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_store_global(g, src);
            }
            StoreGlobalExt => {
                let (g, l) = read_u32(bytes, off)?;
                off += l;
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                let (src, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_store_global_ext(g, m, src);
            }
            Const0 => visitor.visit_const0(),
            Const1 => visitor.visit_const1(),
            Const2 => visitor.visit_const2(),
            Const3 => visitor.visit_const3(),
            Const4 => visitor.visit_const4(),
            ConstFF => visitor.visit_const_ff(),
            Const7F => visitor.visit_const_7f(),
            ConstN => {
                let (v, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_const(v);
            }
            AddI32 => visitor.visit_add_i32(),
            AddI64 => visitor.visit_add_i64(),
            SubI32 => visitor.visit_sub_i32(),
            SubI64 => visitor.visit_sub_i64(),
            MulI32 => visitor.visit_mul_i32(),
            MulI64 => visitor.visit_mul_i64(),
            DivI32 => visitor.visit_div_i32(),
            DivI64 => visitor.visit_div_i64(),
            CompI32Above | CompI32AboveOrEqual | CompI32Below | CompI32BelowOrEqual | CompI32Equal
            | CompI32Greater | CompI32GreaterOrEqual | CompI32Less | CompI32LessOrEqual | CompI32NotEqual => {
                visitor.visit_comp_i32((op as u16 & 0x0F) as u8);
            }
            CompI64Above | CompI64AboveOrEqual | CompI64Below | CompI64BelowOrEqual | CompI64Equal
            | CompI64Greater | CompI64GreaterOrEqual | CompI64Less | CompI64LessOrEqual | CompI64NotEqual => {
                visitor.visit_comp_i64((op as u16 & 0x0F) as u8);
            }
            Call => {
                let (f, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_call(f);
            }
            CallExt => {
                let (f, l) = read_u32(bytes, off)?;
                off += l;
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_call_ext(f, m);
            }
            CallInd => {
                let (s, l) = read_u32(bytes, off)?;
                off += l;
                visitor.visit_call_ind(s);
            }
            CallIndExt => {
                let (s, l) = read_u32(bytes, off)?;
                off += l;
                let (m, l) = read_u16(bytes, off)?;
                off += l;
                visitor.visit_call_ind_ext(s, m);
            }
            Ret => visitor.visit_ret(),
            Jump => {
                let (rel, l) = read_i32(bytes, off)?;
                off += l;
                visitor.visit_jump((off as i64 + rel as i64) as u32);
            }
            JumpTrue => {
                let (rel, l) = read_i32(bytes, off)?;
                off += l;
                visitor.visit_jump_true((off as i64 + rel as i64) as u32);
            }
            JumpFalse => {
                let (rel, l) = read_i32(bytes, off)?;
                off += l;
                visitor.visit_jump_false((off as i64 + rel as i64) as u32);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::writer::IrWriter;

    #[derive(Default)]
    struct Pushes(Vec<u16>);
    impl IrVisitor for Pushes {
        fn visit_push(&mut self, local: u16) {
            self.0.push(local);
        }
    }

    #[test]
    fn sugar_pushes_reach_the_general_handler_by_default() {
        let mut w = IrWriter::new();
        w.write_push(0);
        w.write_push(1);
        w.write_push(500);
        let bytes = w.finish();

        let mut pushes = Pushes::default();
        walk(&bytes, &mut pushes).unwrap();
        assert_eq!(pushes.0, vec![0, 1, 500]);
    }

    #[derive(Default)]
    struct OverridesPush0 {
        saw_push0: bool,
        general_calls: u32,
    }
    impl IrVisitor for OverridesPush0 {
        fn visit_push0(&mut self) {
            self.saw_push0 = true;
        }
        fn visit_push(&mut self, _local: u16) {
            self.general_calls += 1;
        }
    }

    #[test]
    fn overriding_a_sugar_method_bypasses_the_general_handler() {
        let mut w = IrWriter::new();
        w.write_push(0);
        w.write_push(1);
        let bytes = w.finish();

        let mut v = OverridesPush0::default();
        walk(&bytes, &mut v).unwrap();
        assert!(v.saw_push0);
        assert_eq!(v.general_calls, 1);
    }
}
