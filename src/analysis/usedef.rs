//! Use/def analysis over an SSA stream (`spec.md` §4.6).
//!
//! For every instruction that reads an operand, records an edge from the
//! operand's definition to the instruction's own result. Instructions with
//! no result but a visible effect — stores, calls, returns, conditional
//! jumps — have nothing to key that edge by, so their operands are
//! recorded as *roots*: definitions dead-code elimination must keep no
//! matter what else reads them. Argument pseudo-variables are never
//! definitions anyone tracks liveness for, so uses of them are not
//! recorded at all.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::ir::opcode::CompareCondition;
use crate::ssa::value::VarId;
use crate::ssa::visitor::{CallArgs, SsaVisitor};
use crate::types::TypeInfo;

/// The def→users edges gathered by [`UseDefAnalyzer`], plus the root set of
/// definitions kept alive by a side effect regardless of further use.
#[derive(Debug, Clone, Default)]
pub struct UseDefMap {
    uses: HashMap<VarId, SmallVec<[VarId; 4]>>,
    roots: Vec<VarId>,
}

impl UseDefMap {
    pub fn record_use(&mut self, def: VarId, user: VarId) {
        if def.is_argument() {
            return;
        }
        self.uses.entry(def).or_default().push(user);
    }

    fn record_root(&mut self, def: VarId) {
        if def.is_argument() {
            return;
        }
        self.roots.push(def);
        self.uses.entry(def).or_default().push(def);
    }

    pub fn users_of(&self, def: VarId) -> &[VarId] {
        self.uses.get(&def).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_used(&self, def: VarId) -> bool {
        self.uses.get(&def).is_some_and(|v| !v.is_empty())
    }

    pub fn roots(&self) -> &[VarId] {
        &self.roots
    }
}

/// An [`SsaVisitor`] that populates a [`UseDefMap`] by walking one
/// function body once.
#[derive(Debug, Default)]
pub struct UseDefAnalyzer {
    pub map: UseDefMap,
}

impl UseDefAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SsaVisitor for UseDefAnalyzer {
    fn visit_assign_variable(&mut self, dst: VarId, _ty: TypeInfo, src: VarId) {
        self.map.record_use(src, dst);
    }

    fn visit_load(&mut self, dst: VarId, _ty: TypeInfo, ptr: VarId) {
        self.map.record_use(ptr, dst);
    }

    fn visit_store(&mut self, ptr: VarId, value: VarId) {
        self.map.record_root(ptr);
        self.map.record_root(value);
    }

    fn visit_store_global(&mut self, _global: u32, value: VarId) {
        self.map.record_root(value);
    }

    fn visit_store_global_ext(&mut self, _global: u32, _module: u16, value: VarId) {
        self.map.record_root(value);
    }

    fn visit_expand_sx(&mut self, dst: VarId, _ty: TypeInfo, src: VarId) {
        self.map.record_use(src, dst);
    }

    fn visit_expand_zx(&mut self, dst: VarId, _ty: TypeInfo, src: VarId) {
        self.map.record_use(src, dst);
    }

    fn visit_trunc(&mut self, dst: VarId, _ty: TypeInfo, src: VarId) {
        self.map.record_use(src, dst);
    }

    fn visit_binop_vtov(&mut self, dst: VarId, _ty: TypeInfo, _op: u8, a: VarId, b: VarId) {
        self.map.record_use(a, dst);
        self.map.record_use(b, dst);
    }

    fn visit_binop_vtoi(&mut self, dst: VarId, _ty: TypeInfo, _op: u8, a: VarId, _imm: i64) {
        self.map.record_use(a, dst);
    }

    fn visit_binop_itov(&mut self, dst: VarId, _ty: TypeInfo, _op: u8, _imm: i64, b: VarId) {
        self.map.record_use(b, dst);
    }

    fn visit_comp_vtov(&mut self, dst: VarId, _cond: CompareCondition, a: VarId, b: VarId) {
        self.map.record_use(a, dst);
        self.map.record_use(b, dst);
    }

    fn visit_comp_vtoi(&mut self, dst: VarId, _cond: CompareCondition, a: VarId, _imm: i64) {
        self.map.record_use(a, dst);
    }

    fn visit_comp_itov(&mut self, dst: VarId, _cond: CompareCondition, _imm: i64, b: VarId) {
        self.map.record_use(b, dst);
    }

    fn visit_compute_ptr(&mut self, dst: VarId, _ty: TypeInfo, base: VarId, _offset: i64) {
        self.map.record_use(base, dst);
    }

    fn visit_join(&mut self, dst: VarId, _ty: TypeInfo, parts: &[VarId]) {
        for p in parts {
            self.map.record_use(*p, dst);
        }
    }

    fn visit_split(&mut self, value: VarId, _value_ty: TypeInfo, remainder: VarId, _remainder_ty: TypeInfo, src: VarId) {
        self.map.record_use(src, value);
        self.map.record_use(src, remainder);
    }

    fn visit_call(&mut self, _func_index: u32, call: CallArgs<'_>) {
        for a in call.args {
            self.map.record_root(*a);
        }
        if let Some(r) = call.result {
            self.map.record_root(r);
        }
    }

    fn visit_call_ext(&mut self, _module: u16, _func_index: u32, call: CallArgs<'_>) {
        for a in call.args {
            self.map.record_root(*a);
        }
        if let Some(r) = call.result {
            self.map.record_root(r);
        }
    }

    fn visit_call_ind(&mut self, target: VarId, call: CallArgs<'_>) {
        self.map.record_root(target);
        for a in call.args {
            self.map.record_root(*a);
        }
        if let Some(r) = call.result {
            self.map.record_root(r);
        }
    }

    fn visit_call_ind_ext(&mut self, target: VarId, _module: u16, call: CallArgs<'_>) {
        self.map.record_root(target);
        for a in call.args {
            self.map.record_root(*a);
        }
        if let Some(r) = call.result {
            self.map.record_root(r);
        }
    }

    fn visit_ret(&mut self, value: Option<VarId>) {
        if let Some(v) = value {
            self.map.record_root(v);
        }
    }

    fn visit_jump_true(&mut self, cond: VarId, _target: u32) {
        self.map.record_root(cond);
    }

    fn visit_jump_false(&mut self, cond: VarId, _target: u32) {
        self.map.record_root(cond);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::opcode::BinOp;
    use crate::ssa::visitor::walk;
    use crate::ssa::writer::SsaWriter;

    #[test]
    fn side_effecting_operands_become_roots() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 1);
        w.write_ret(Some(a));
        let buf = w.finish();

        let mut analyzer = UseDefAnalyzer::new();
        walk(&buf.bytes, &mut analyzer).unwrap();
        assert!(analyzer.map.roots().contains(&a));
        assert!(analyzer.map.is_used(a));
    }

    #[test]
    fn dead_value_has_no_users() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 1);
        let b = w.write_assign_literal(TypeInfo::I32, 2);
        let sum = w.write_binop_vtov(TypeInfo::I32, BinOp::Add, a, b);
        // `sum` is computed but never used.
        let buf = w.finish();

        let mut analyzer = UseDefAnalyzer::new();
        walk(&buf.bytes, &mut analyzer).unwrap();
        assert!(analyzer.map.is_used(a));
        assert!(analyzer.map.is_used(b));
        assert!(!analyzer.map.is_used(sum));
    }

    #[test]
    fn argument_uses_are_not_recorded() {
        let mut w = SsaWriter::new();
        let arg = VarId::argument(0);
        let doubled = w.write_binop_vtov(TypeInfo::I32, BinOp::Add, arg, arg);
        w.write_ret(Some(doubled));
        let buf = w.finish();

        let mut analyzer = UseDefAnalyzer::new();
        walk(&buf.bytes, &mut analyzer).unwrap();
        assert!(analyzer.map.users_of(arg).is_empty());
    }
}
