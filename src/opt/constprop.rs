//! Constant propagation and copy propagation over an SSA stream
//! (`spec.md` §4.5).
//!
//! Every variable id is tracked under one of two linkages as the pass
//! walks the stream forward: a known literal, or a reference to an
//! earlier id (itself already resolved, so lookups never chase a chain).
//! `AssignVariable` and any instruction folded down to a literal are
//! never re-emitted — downstream reads are rewritten to use the
//! resolved value directly. Argument pseudo-variables are never folded;
//! the spec calls them out explicitly as always "kept as Variable".

use hashbrown::HashMap;

use crate::error::PassError;
use crate::opt::program::{decode_program, ProgramEmitter, SsaInstr};
use crate::ssa::opcode::BinOp;
use crate::ssa::value::VarId;
use crate::ssa::writer::SsaBuffer;
use crate::types::TypeInfo;

#[derive(Copy, Clone, Debug)]
enum Operand {
    Var(VarId),
    Literal(i64),
}

fn signed_width_bits(ty: TypeInfo) -> u32 {
    ty.fixed_size().unwrap_or(8) * 8
}

fn sign_extend(value: i64, from_bits: u32) -> i64 {
    if from_bits >= 64 {
        return value;
    }
    let shift = 64 - from_bits;
    (value << shift) >> shift
}

fn zero_extend(value: i64, from_bits: u32) -> i64 {
    if from_bits >= 64 {
        return value;
    }
    value & ((1i64 << from_bits) - 1)
}

fn truncate(value: i64, to_bits: u32) -> i64 {
    zero_extend(value, to_bits)
}

fn fold_binop(op: BinOp, ty: TypeInfo, a: i64, b: i64) -> Option<i64> {
    let bits = signed_width_bits(ty);
    let wrap = |v: i64| if bits >= 64 { v } else { truncate(v, bits) };
    Some(match op {
        BinOp::Add => wrap(a.wrapping_add(b)),
        BinOp::Sub => wrap(a.wrapping_sub(b)),
        BinOp::Mul => wrap(a.wrapping_mul(b)),
        BinOp::Div => {
            if b == 0 {
                return None;
            }
            wrap(a.wrapping_div(b))
        }
    })
}

/// Runs constant/copy propagation over one function's SSA stream.
pub fn run(bytes: &[u8]) -> Result<SsaBuffer, PassError> {
    let instrs = decode_program(bytes)?;
    let mut var_types: HashMap<VarId, TypeInfo> = HashMap::new();
    for instr in &instrs {
        for (id, ty) in instr.defs_with_types() {
            var_types.insert(id, ty);
        }
    }

    let mut literal: HashMap<VarId, i64> = HashMap::new();
    let mut alias: HashMap<VarId, VarId> = HashMap::new();
    let mut id_map: HashMap<VarId, VarId> = HashMap::new();
    let mut emitter = ProgramEmitter::new();

    let resolve = |literal: &HashMap<VarId, i64>, alias: &HashMap<VarId, VarId>, v: VarId| -> Operand {
        if v.is_argument() {
            return Operand::Var(v);
        }
        if let Some(&lit) = literal.get(&v) {
            return Operand::Literal(lit);
        }
        if let Some(&a) = alias.get(&v) {
            return Operand::Var(a);
        }
        Operand::Var(v)
    };

    macro_rules! eff {
        ($v:expr) => {
            resolve(&literal, &alias, $v)
        };
    }

    // Translates an already-resolved operand into a concrete id in the new
    // stream, materializing a fresh `AssignLiteral` if it resolved to a
    // constant but this opcode has no immediate-operand form.
    let materialize = |emitter: &mut ProgramEmitter, id_map: &HashMap<VarId, VarId>, orig: VarId, op: Operand| -> VarId {
        match op {
            Operand::Var(v) => {
                if v.is_argument() {
                    v
                } else {
                    *id_map.get(&v).expect("referenced id must already have been emitted")
                }
            }
            Operand::Literal(lit) => {
                let ty = var_types.get(&orig).copied().unwrap_or(TypeInfo::I64);
                emitter.writer.write_assign_literal(ty, lit)
            }
        }
    };

    for instr in &instrs {
        emitter.mark();
        match instr {
            SsaInstr::Nop => {}
            SsaInstr::AssignLiteral { dst, literal: lit, .. } => {
                literal.insert(*dst, *lit);
            }
            SsaInstr::AssignVariable { dst, src, .. } => match eff!(*src) {
                Operand::Literal(lit) => {
                    literal.insert(*dst, lit);
                }
                Operand::Var(v) => {
                    alias.insert(*dst, v);
                }
            },
            SsaInstr::Load { dst, ty, ptr } => {
                let p = materialize(&mut emitter, &id_map, *ptr, eff!(*ptr));
                let new_id = emitter.writer.write_load(*ty, p);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::LoadGlobal { dst, ty, global } => {
                let new_id = emitter.writer.write_load_global(*ty, *global);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::LoadGlobalExt { dst, ty, global, module } => {
                let new_id = emitter.writer.write_load_global_ext(*ty, *global, *module);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::Store { ptr, value } => {
                let p = materialize(&mut emitter, &id_map, *ptr, eff!(*ptr));
                let v = materialize(&mut emitter, &id_map, *value, eff!(*value));
                emitter.writer.write_store(p, v);
            }
            SsaInstr::StoreGlobal { global, value } => {
                let v = materialize(&mut emitter, &id_map, *value, eff!(*value));
                emitter.writer.write_store_global(*global, v);
            }
            SsaInstr::StoreGlobalExt { global, module, value } => {
                let v = materialize(&mut emitter, &id_map, *value, eff!(*value));
                emitter.writer.write_store_global_ext(*global, *module, v);
            }
            SsaInstr::ExpandSX { dst, ty, src } => {
                let src_ty = var_types.get(src).copied().unwrap_or(TypeInfo::I64);
                match eff!(*src) {
                    Operand::Literal(lit) if fold_ok_for_cast(src_ty, *ty, true) => {
                        let folded = sign_extend(lit, signed_width_bits(src_ty));
                        literal.insert(*dst, folded);
                    }
                    resolved => {
                        let v = materialize(&mut emitter, &id_map, *src, resolved);
                        let new_id = emitter.writer.write_expand_sx(*ty, v);
                        id_map.insert(*dst, new_id);
                    }
                }
            }
            SsaInstr::ExpandZX { dst, ty, src } => {
                let src_ty = var_types.get(src).copied().unwrap_or(TypeInfo::I64);
                match eff!(*src) {
                    Operand::Literal(lit) if fold_ok_for_cast(src_ty, *ty, true) => {
                        let folded = zero_extend(lit, signed_width_bits(src_ty));
                        literal.insert(*dst, folded);
                    }
                    resolved => {
                        let v = materialize(&mut emitter, &id_map, *src, resolved);
                        let new_id = emitter.writer.write_expand_zx(*ty, v);
                        id_map.insert(*dst, new_id);
                    }
                }
            }
            SsaInstr::Trunc { dst, ty, src } => {
                let src_ty = var_types.get(src).copied().unwrap_or(TypeInfo::I64);
                match eff!(*src) {
                    Operand::Literal(lit) if fold_ok_for_cast(src_ty, *ty, false) => {
                        let folded = truncate(lit, signed_width_bits(*ty));
                        literal.insert(*dst, folded);
                    }
                    resolved => {
                        let v = materialize(&mut emitter, &id_map, *src, resolved);
                        let new_id = emitter.writer.write_trunc(*ty, v);
                        id_map.insert(*dst, new_id);
                    }
                }
            }
            SsaInstr::BinOpVtoV { dst, ty, op, a, b } => {
                let ea = eff!(*a);
                let eb = eff!(*b);
                match (ea, eb) {
                    (Operand::Literal(la), Operand::Literal(lb)) => match fold_binop(*op, *ty, la, lb) {
                        Some(folded) => {
                            literal.insert(*dst, folded);
                        }
                        None => {
                            let va = materialize(&mut emitter, &id_map, *a, ea);
                            let vb = materialize(&mut emitter, &id_map, *b, eb);
                            let new_id = emitter.writer.write_binop_vtov(*ty, *op, va, vb);
                            id_map.insert(*dst, new_id);
                        }
                    },
                    (Operand::Var(va), Operand::Literal(lb)) => {
                        let new_id = emitter.writer.write_binop_vtoi(*ty, *op, va, lb);
                        id_map.insert(*dst, new_id);
                    }
                    (Operand::Literal(la), Operand::Var(vb)) => {
                        let new_id = emitter.writer.write_binop_itov(*ty, *op, la, vb);
                        id_map.insert(*dst, new_id);
                    }
                    (Operand::Var(va), Operand::Var(vb)) => {
                        let new_id = emitter.writer.write_binop_vtov(*ty, *op, va, vb);
                        id_map.insert(*dst, new_id);
                    }
                }
            }
            SsaInstr::BinOpVtoI { dst, ty, op, a, imm } => {
                match eff!(*a) {
                    Operand::Literal(la) => match fold_binop(*op, *ty, la, *imm) {
                        Some(folded) => {
                            literal.insert(*dst, folded);
                        }
                        None => {
                            let va = materialize(&mut emitter, &id_map, *a, Operand::Literal(la));
                            let new_id = emitter.writer.write_binop_vtoi(*ty, *op, va, *imm);
                            id_map.insert(*dst, new_id);
                        }
                    },
                    Operand::Var(va) => {
                        let new_id = emitter.writer.write_binop_vtoi(*ty, *op, va, *imm);
                        id_map.insert(*dst, new_id);
                    }
                }
            }
            SsaInstr::BinOpItoV { dst, ty, op, imm, b } => match eff!(*b) {
                Operand::Literal(lb) => match fold_binop(*op, *ty, *imm, lb) {
                    Some(folded) => {
                        literal.insert(*dst, folded);
                    }
                    None => {
                        let vb = materialize(&mut emitter, &id_map, *b, Operand::Literal(lb));
                        let new_id = emitter.writer.write_binop_itov(*ty, *op, *imm, vb);
                        id_map.insert(*dst, new_id);
                    }
                },
                Operand::Var(vb) => {
                    let new_id = emitter.writer.write_binop_itov(*ty, *op, *imm, vb);
                    id_map.insert(*dst, new_id);
                }
            },
            // Comparisons are pass-through only: `spec.md` reserves folding
            // a Comp binop kind for a later pass.
            SsaInstr::CompVtoV { dst, cond, a, b } => {
                let ea = eff!(*a);
                let eb = eff!(*b);
                let new_id = match (ea, eb) {
                    (Operand::Var(va), Operand::Var(vb)) => emitter.writer.write_comp_vtov(*cond, va, vb),
                    (Operand::Var(va), Operand::Literal(lb)) => emitter.writer.write_comp_vtoi(*cond, va, lb),
                    (Operand::Literal(la), Operand::Var(vb)) => emitter.writer.write_comp_itov(*cond, la, vb),
                    (Operand::Literal(la), Operand::Literal(lb)) => {
                        let va = materialize(&mut emitter, &id_map, *a, Operand::Literal(la));
                        emitter.writer.write_comp_vtoi(*cond, va, lb)
                    }
                };
                id_map.insert(*dst, new_id);
            }
            SsaInstr::CompVtoI { dst, cond, a, imm } => {
                let va = materialize(&mut emitter, &id_map, *a, eff!(*a));
                let new_id = emitter.writer.write_comp_vtoi(*cond, va, *imm);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::CompItoV { dst, cond, imm, b } => {
                let vb = materialize(&mut emitter, &id_map, *b, eff!(*b));
                let new_id = emitter.writer.write_comp_itov(*cond, *imm, vb);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::ComputePtr { dst, ty, base, offset } => match eff!(*base) {
                Operand::Literal(b) => {
                    literal.insert(*dst, b.wrapping_add(*offset));
                }
                Operand::Var(v) => {
                    let new_id = emitter.writer.write_compute_ptr(*ty, v, *offset);
                    id_map.insert(*dst, new_id);
                }
            },
            SsaInstr::Join { dst, ty, parts } => {
                let translated: Vec<VarId> =
                    parts.iter().map(|p| materialize(&mut emitter, &id_map, *p, eff!(*p))).collect();
                let new_id = emitter.writer.write_join(*ty, &translated);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::Split { value, value_ty, remainder, remainder_ty, src } => {
                let v = materialize(&mut emitter, &id_map, *src, eff!(*src));
                let (nv, nr) = emitter.writer.write_split(*value_ty, *remainder_ty, v);
                id_map.insert(*value, nv);
                id_map.insert(*remainder, nr);
            }
            SsaInstr::Call { func_index, result, args } => {
                let translated: Vec<VarId> =
                    args.iter().map(|a| materialize(&mut emitter, &id_map, *a, eff!(*a))).collect();
                let new_id = emitter.writer.write_call(*func_index, &translated, result.map(|(_, ty)| ty));
                if let (Some((old, _)), Some(new)) = (result, new_id) {
                    id_map.insert(*old, new);
                }
            }
            SsaInstr::CallExt { module, func_index, result, args } => {
                let translated: Vec<VarId> =
                    args.iter().map(|a| materialize(&mut emitter, &id_map, *a, eff!(*a))).collect();
                let new_id =
                    emitter.writer.write_call_ext(*module, *func_index, &translated, result.map(|(_, ty)| ty));
                if let (Some((old, _)), Some(new)) = (result, new_id) {
                    id_map.insert(*old, new);
                }
            }
            SsaInstr::CallInd { target, result, args } => {
                let t = materialize(&mut emitter, &id_map, *target, eff!(*target));
                let translated: Vec<VarId> =
                    args.iter().map(|a| materialize(&mut emitter, &id_map, *a, eff!(*a))).collect();
                let new_id = emitter.writer.write_call_ind(t, &translated, result.map(|(_, ty)| ty));
                if let (Some((old, _)), Some(new)) = (result, new_id) {
                    id_map.insert(*old, new);
                }
            }
            SsaInstr::CallIndExt { target, module, result, args } => {
                let t = materialize(&mut emitter, &id_map, *target, eff!(*target));
                let translated: Vec<VarId> =
                    args.iter().map(|a| materialize(&mut emitter, &id_map, *a, eff!(*a))).collect();
                let new_id = emitter.writer.write_call_ind_ext(t, *module, &translated, result.map(|(_, ty)| ty));
                if let (Some((old, _)), Some(new)) = (result, new_id) {
                    id_map.insert(*old, new);
                }
            }
            SsaInstr::Ret { value } => {
                let v = value.map(|v| materialize(&mut emitter, &id_map, v, eff!(v)));
                emitter.writer.write_ret(v);
            }
            SsaInstr::Jump { target_idx } => {
                emitter.write_jump(*target_idx);
            }
            SsaInstr::JumpTrue { cond, target_idx } => {
                let c = materialize(&mut emitter, &id_map, *cond, eff!(*cond));
                emitter.write_jump_true(c, *target_idx);
            }
            SsaInstr::JumpFalse { cond, target_idx } => {
                let c = materialize(&mut emitter, &id_map, *cond, eff!(*cond));
                emitter.write_jump_false(c, *target_idx);
            }
        }
    }
    emitter.mark();
    Ok(emitter.finish())
}

/// Whether an extend/truncate pair is foldable at compile time: no
/// floating-point or void/bool operand, extension can't narrow, and
/// truncation can't widen or no-op on equal widths (`spec.md` §4.5).
fn fold_ok_for_cast(from: TypeInfo, to: TypeInfo, extending: bool) -> bool {
    use crate::types::PrimitiveTag::*;
    let is_int = |t: TypeInfo| {
        matches!(t.tag(), I8 | I16 | I32 | I64 | U8 | U16 | U32 | U64) && !t.is_pointer()
    };
    if !is_int(from) || !is_int(to) {
        return false;
    }
    let (fb, tb) = (signed_width_bits(from), signed_width_bits(to));
    if extending {
        tb > fb
    } else {
        tb < fb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opcode::CompareCondition;
    use crate::ssa::visitor::walk;
    use crate::ssa::writer::SsaWriter;
    use crate::types::TypeInfo;

    #[test]
    fn folds_straight_line_arithmetic_to_a_single_literal() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I64, 10);
        let b = w.write_assign_literal(TypeInfo::I64, 32);
        let sum = w.write_binop_vtov(TypeInfo::I64, BinOp::Add, a, b);
        w.write_ret(Some(sum));
        let buf = w.finish();

        let optimized = run(&buf.bytes).unwrap();

        struct RetLiteral(Option<i64>);
        impl crate::ssa::visitor::SsaVisitor for RetLiteral {
            fn visit_assign_literal(&mut self, _dst: VarId, _ty: TypeInfo, literal: i64) {
                self.0 = Some(literal);
            }
        }
        let mut check = RetLiteral(None);
        walk(&optimized.bytes, &mut check).unwrap();
        assert_eq!(check.0, Some(42));
    }

    #[test]
    fn copy_through_assign_variable_is_eliminated() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 7);
        let copy = w.write_assign_variable(TypeInfo::I32, a);
        w.write_ret(Some(copy));
        let buf = w.finish();

        let optimized = run(&buf.bytes).unwrap();
        struct Counter(usize);
        impl crate::ssa::visitor::SsaVisitor for Counter {
            fn visit_assign_variable(&mut self, _dst: VarId, _ty: TypeInfo, _src: VarId) {
                self.0 += 1;
            }
        }
        let mut c = Counter(0);
        walk(&optimized.bytes, &mut c).unwrap();
        assert_eq!(c.0, 0);
    }

    #[test]
    fn argument_sources_are_never_folded() {
        let mut w = SsaWriter::new();
        let arg = VarId::argument(0);
        let copy = w.write_assign_variable(TypeInfo::I32, arg);
        w.write_ret(Some(copy));
        let buf = w.finish();

        let optimized = run(&buf.bytes).unwrap();
        struct RetArg(Option<VarId>);
        impl crate::ssa::visitor::SsaVisitor for RetArg {
            fn visit_ret(&mut self, value: Option<VarId>) {
                self.0 = value;
            }
        }
        let mut check = RetArg(None);
        walk(&optimized.bytes, &mut check).unwrap();
        assert_eq!(check.0, Some(arg));
    }

    #[test]
    fn division_by_a_literal_zero_is_not_folded() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 10);
        let b = w.write_assign_literal(TypeInfo::I32, 0);
        let q = w.write_binop_vtov(TypeInfo::I32, BinOp::Div, a, b);
        w.write_ret(Some(q));
        let buf = w.finish();

        // Must not panic or error; the division simply survives unfolded.
        let optimized = run(&buf.bytes).unwrap();
        assert!(!optimized.bytes.is_empty());
    }

    #[test]
    fn comparisons_are_never_folded() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 1);
        let b = w.write_assign_literal(TypeInfo::I32, 1);
        let eq = w.write_comp_vtov(CompareCondition::Equal, a, b);
        w.write_ret(Some(eq));
        let buf = w.finish();

        let optimized = run(&buf.bytes).unwrap();
        struct Seen(bool);
        impl crate::ssa::visitor::SsaVisitor for Seen {
            fn visit_comp_itov(&mut self, _dst: VarId, _cond: CompareCondition, _imm: i64, _b: VarId) {
                self.0 = true;
            }
            fn visit_comp_vtoi(&mut self, _dst: VarId, _cond: CompareCondition, _a: VarId, _imm: i64) {
                self.0 = true;
            }
        }
        let mut s = Seen(false);
        walk(&optimized.bytes, &mut s).unwrap();
        assert!(s.0);
    }
}
