//! Dead-code elimination over an SSA stream (`spec.md` §4.6).
//!
//! An instruction survives iff it is inherently side-effecting (store,
//! call, return, branch) or its result is read — directly or
//! transitively — by something that does. Since every use in this
//! representation reads a definition that occurs strictly earlier in the
//! byte stream, a single backward pass over the decoded instructions
//! computes exact liveness: walk from the end, keep an instruction if any
//! of its results is already marked live, and if kept, mark its own
//! operands live in turn. Surviving variables are renumbered densely as
//! they are re-emitted, through the same kind of `oldId -> newId` table
//! `opt::constprop` uses.

use hashbrown::{HashMap, HashSet};

use crate::error::PassError;
use crate::opt::program::{decode_program, ProgramEmitter, SsaInstr};
use crate::ssa::value::VarId;
use crate::ssa::writer::SsaBuffer;

fn always_kept(instr: &SsaInstr) -> bool {
    matches!(
        instr,
        SsaInstr::Store { .. }
            | SsaInstr::StoreGlobal { .. }
            | SsaInstr::StoreGlobalExt { .. }
            | SsaInstr::Ret { .. }
            | SsaInstr::Jump { .. }
            | SsaInstr::JumpTrue { .. }
            | SsaInstr::JumpFalse { .. }
            | SsaInstr::Call { .. }
            | SsaInstr::CallExt { .. }
            | SsaInstr::CallInd { .. }
            | SsaInstr::CallIndExt { .. }
    )
}

/// Runs dead-code elimination over one function's SSA stream.
pub fn run(bytes: &[u8]) -> Result<SsaBuffer, PassError> {
    let instrs = decode_program(bytes)?;

    let mut live: HashSet<VarId> = HashSet::new();
    let mut keep = vec![false; instrs.len()];
    for (i, instr) in instrs.iter().enumerate().rev() {
        let defs = instr.defs();
        let is_live = always_kept(instr) || defs.iter().any(|d| live.contains(d));
        if is_live {
            keep[i] = true;
            for u in instr.uses() {
                live.insert(u);
            }
        }
    }

    let mut id_map: HashMap<VarId, VarId> = HashMap::new();
    let mut emitter = ProgramEmitter::new();

    let translate = |id_map: &HashMap<VarId, VarId>, v: VarId| -> VarId {
        if v.is_argument() {
            v
        } else {
            *id_map.get(&v).expect("a live instruction can only read an id that also survived")
        }
    };

    for (i, instr) in instrs.iter().enumerate() {
        emitter.mark();
        if !keep[i] {
            continue;
        }
        match instr {
            SsaInstr::Nop => {}
            SsaInstr::AssignLiteral { dst, ty, literal } => {
                let new_id = emitter.writer.write_assign_literal(*ty, *literal);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::AssignVariable { dst, ty, src } => {
                let s = translate(&id_map, *src);
                let new_id = emitter.writer.write_assign_variable(*ty, s);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::Load { dst, ty, ptr } => {
                let p = translate(&id_map, *ptr);
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
                let p = translate(&id_map, *ptr);
                let v = translate(&id_map, *value);
                emitter.writer.write_store(p, v);
            }
            SsaInstr::StoreGlobal { global, value } => {
                let v = translate(&id_map, *value);
                emitter.writer.write_store_global(*global, v);
            }
            SsaInstr::StoreGlobalExt { global, module, value } => {
                let v = translate(&id_map, *value);
                emitter.writer.write_store_global_ext(*global, *module, v);
            }
            SsaInstr::ExpandSX { dst, ty, src } => {
                let s = translate(&id_map, *src);
                let new_id = emitter.writer.write_expand_sx(*ty, s);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::ExpandZX { dst, ty, src } => {
                let s = translate(&id_map, *src);
                let new_id = emitter.writer.write_expand_zx(*ty, s);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::Trunc { dst, ty, src } => {
                let s = translate(&id_map, *src);
                let new_id = emitter.writer.write_trunc(*ty, s);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::BinOpVtoV { dst, ty, op, a, b } => {
                let a = translate(&id_map, *a);
                let b = translate(&id_map, *b);
                let new_id = emitter.writer.write_binop_vtov(*ty, *op, a, b);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::BinOpVtoI { dst, ty, op, a, imm } => {
                let a = translate(&id_map, *a);
                let new_id = emitter.writer.write_binop_vtoi(*ty, *op, a, *imm);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::BinOpItoV { dst, ty, op, imm, b } => {
                let b = translate(&id_map, *b);
                let new_id = emitter.writer.write_binop_itov(*ty, *op, *imm, b);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::CompVtoV { dst, cond, a, b } => {
                let a = translate(&id_map, *a);
                let b = translate(&id_map, *b);
                let new_id = emitter.writer.write_comp_vtov(*cond, a, b);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::CompVtoI { dst, cond, a, imm } => {
                let a = translate(&id_map, *a);
                let new_id = emitter.writer.write_comp_vtoi(*cond, a, *imm);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::CompItoV { dst, cond, imm, b } => {
                let b = translate(&id_map, *b);
                let new_id = emitter.writer.write_comp_itov(*cond, *imm, b);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::ComputePtr { dst, ty, base, offset } => {
                let base = translate(&id_map, *base);
                let new_id = emitter.writer.write_compute_ptr(*ty, base, *offset);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::Join { dst, ty, parts } => {
                let translated: Vec<VarId> = parts.iter().map(|p| translate(&id_map, *p)).collect();
                let new_id = emitter.writer.write_join(*ty, &translated);
                id_map.insert(*dst, new_id);
            }
            SsaInstr::Split { value, value_ty, remainder, remainder_ty, src } => {
                let s = translate(&id_map, *src);
                let (nv, nr) = emitter.writer.write_split(*value_ty, *remainder_ty, s);
                id_map.insert(*value, nv);
                id_map.insert(*remainder, nr);
            }
            SsaInstr::Call { func_index, result, args } => {
                let translated: Vec<VarId> = args.iter().map(|a| translate(&id_map, *a)).collect();
                let new_id = emitter.writer.write_call(*func_index, &translated, result.map(|(_, ty)| ty));
                if let (Some((old, _)), Some(new)) = (result, new_id) {
                    id_map.insert(*old, new);
                }
            }
            SsaInstr::CallExt { module, func_index, result, args } => {
                let translated: Vec<VarId> = args.iter().map(|a| translate(&id_map, *a)).collect();
                let new_id = emitter.writer.write_call_ext(*module, *func_index, &translated, result.map(|(_, ty)| ty));
                if let (Some((old, _)), Some(new)) = (result, new_id) {
                    id_map.insert(*old, new);
                }
            }
            SsaInstr::CallInd { target, result, args } => {
                let t = translate(&id_map, *target);
                let translated: Vec<VarId> = args.iter().map(|a| translate(&id_map, *a)).collect();
                let new_id = emitter.writer.write_call_ind(t, &translated, result.map(|(_, ty)| ty));
                if let (Some((old, _)), Some(new)) = (result, new_id) {
                    id_map.insert(*old, new);
                }
            }
            SsaInstr::CallIndExt { target, module, result, args } => {
                let t = translate(&id_map, *target);
                let translated: Vec<VarId> = args.iter().map(|a| translate(&id_map, *a)).collect();
                let new_id = emitter.writer.write_call_ind_ext(t, *module, &translated, result.map(|(_, ty)| ty));
                if let (Some((old, _)), Some(new)) = (result, new_id) {
                    id_map.insert(*old, new);
                }
            }
            SsaInstr::Ret { value } => {
                let v = value.map(|v| translate(&id_map, v));
                emitter.writer.write_ret(v);
            }
            SsaInstr::Jump { target_idx } => {
                emitter.write_jump(*target_idx);
            }
            SsaInstr::JumpTrue { cond, target_idx } => {
                let c = translate(&id_map, *cond);
                emitter.write_jump_true(c, *target_idx);
            }
            SsaInstr::JumpFalse { cond, target_idx } => {
                let c = translate(&id_map, *cond);
                emitter.write_jump_false(c, *target_idx);
            }
        }
    }
    emitter.mark();
    Ok(emitter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::opcode::BinOp;
    use crate::ssa::visitor::walk;
    use crate::ssa::writer::SsaWriter;
    use crate::types::TypeInfo;

    #[test]
    fn drops_a_computed_value_nobody_reads() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 1);
        let b = w.write_assign_literal(TypeInfo::I32, 2);
        let _dead = w.write_binop_vtov(TypeInfo::I32, BinOp::Add, a, b);
        w.write_ret(Some(a));
        let buf = w.finish();

        let optimized = run(&buf.bytes).unwrap();

        struct Counter(usize);
        impl crate::ssa::visitor::SsaVisitor for Counter {
            fn visit_binop_vtov(&mut self, _dst: VarId, _ty: TypeInfo, _op: u8, _a: VarId, _b: VarId) {
                self.0 += 1;
            }
        }
        let mut c = Counter(0);
        walk(&optimized.bytes, &mut c).unwrap();
        assert_eq!(c.0, 0);
    }

    #[test]
    fn keeps_a_value_used_only_by_a_store() {
        let mut w = SsaWriter::new();
        let ptr = VarId::argument(0);
        let value = w.write_assign_literal(TypeInfo::I32, 9);
        w.write_store(ptr, value);
        w.write_ret(None);
        let buf = w.finish();

        let optimized = run(&buf.bytes).unwrap();
        struct Counter(usize);
        impl crate::ssa::visitor::SsaVisitor for Counter {
            fn visit_assign_literal(&mut self, _dst: VarId, _ty: TypeInfo, _literal: i64) {
                self.0 += 1;
            }
        }
        let mut c = Counter(0);
        walk(&optimized.bytes, &mut c).unwrap();
        assert_eq!(c.0, 1);
    }

    #[test]
    fn jump_to_a_dropped_instruction_redirects_to_whatever_follows_it() {
        let mut w = SsaWriter::new();
        let cond = VarId::argument(0);
        let patch_at = w.current_offset() + 1 + 4;
        w.write_jump_true(cond, 0);
        let dead_target = w.current_offset();
        let _dead = w.write_assign_literal(TypeInfo::I32, 1);
        w.patch_u32_at(patch_at, dead_target);
        w.write_ret(None);
        let buf = w.finish();

        // The dead literal has no reader, so DCE drops it; the jump target
        // must still land on valid code (the `Ret` that follows) rather
        // than an now-nonexistent offset.
        let optimized = run(&buf.bytes).unwrap();
        struct JumpTarget(u32);
        impl crate::ssa::visitor::SsaVisitor for JumpTarget {
            fn visit_jump_true(&mut self, _cond: VarId, target: u32) {
                self.0 = target;
            }
        }
        let mut jt = JumpTarget(u32::MAX);
        walk(&optimized.bytes, &mut jt).unwrap();
        assert!((jt.0 as usize) <= optimized.bytes.len());
    }
}
