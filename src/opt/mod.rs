//! The optimizer suite: constant/copy propagation, dead-code elimination,
//! and inlining over the SSA form (`spec.md` §4.5–§4.7).
//!
//! Each pass is a standalone `decode -> rewrite -> re-emit` transform
//! over one function's SSA bytes; [`program`] holds the decode/re-emit
//! infrastructure they share. `spec.md` does not prescribe a fixed pass
//! ordering or fixpoint loop beyond describing each pass in isolation;
//! [`crate::config::Config`] exposes which of DCE/constprop a convenience
//! pipeline runs, and callers are free to run passes in any order or
//! iterate them to a fixpoint themselves.

pub mod constprop;
pub mod dce;
pub mod inline;
pub mod program;

pub use inline::InlineCandidate;
pub use program::{ProgramEmitter, SsaInstr};

use crate::error::PassError;
use crate::ssa::writer::SsaBuffer;

/// Runs constant propagation followed by dead-code elimination, the
/// convenience pipeline most callers want; equivalent to calling
/// [`constprop::run`] then [`dce::run`] by hand.
pub fn optimize(bytes: &[u8]) -> Result<SsaBuffer, PassError> {
    let after_constprop = constprop::run(bytes)?;
    dce::run(&after_constprop.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::opcode::BinOp;
    use crate::ssa::value::VarId;
    use crate::ssa::visitor::{walk, SsaVisitor};
    use crate::ssa::writer::SsaWriter;
    use crate::types::TypeInfo;

    #[test]
    fn optimize_folds_then_drops_the_dead_arithmetic() {
        let mut w = SsaWriter::new();
        let a = w.write_assign_literal(TypeInfo::I32, 10);
        let b = w.write_assign_literal(TypeInfo::I32, 20);
        let sum = w.write_binop_vtov(TypeInfo::I32, BinOp::Add, a, b);
        let _unused = w.write_binop_vtov(TypeInfo::I32, BinOp::Mul, sum, sum);
        w.write_ret(Some(sum));
        let buf = w.finish();

        let optimized = optimize(&buf.bytes).unwrap();

        struct Counter {
            literals: usize,
            binops: usize,
            ret: Option<VarId>,
        }
        impl SsaVisitor for Counter {
            fn visit_assign_literal(&mut self, _dst: VarId, _ty: TypeInfo, _literal: i64) {
                self.literals += 1;
            }
            fn visit_binop_vtov(&mut self, _dst: VarId, _ty: TypeInfo, _op: u8, _a: VarId, _b: VarId) {
                self.binops += 1;
            }
            fn visit_ret(&mut self, value: Option<VarId>) {
                self.ret = value;
            }
        }
        let mut c = Counter { literals: 0, binops: 0, ret: None };
        walk(&optimized.bytes, &mut c).unwrap();

        assert_eq!(c.binops, 0);
        assert_eq!(c.literals, 1);
        assert!(c.ret.is_some());
    }
}
