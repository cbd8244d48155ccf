//! Per-function return-type record, derived once from a function's `Ret`
//! instructions and cached as an attachment (`spec.md` §4.6).

use crate::ssa::visitor::SsaVisitor;
use crate::ssa::value::VarId;
use crate::types::TypeInfo;

/// A function's return shape: either it always returns a value of a known
/// type, never returns a value, or (inconsistently) does both — which the
/// lifter should not be able to produce, but which we still represent
/// rather than panic on if it ever shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnTypeInfo {
    Void,
    Value(TypeInfo),
    Inconsistent,
}

/// Scans a function's `Ret` instructions, folding them into one
/// [`ReturnTypeInfo`]. Needs the writer's id→type map since the `Ret`
/// instruction itself carries only a [`VarId`], not its type.
pub struct ReturnTypeAnalyzer<'a> {
    types: &'a hashbrown::HashMap<VarId, TypeInfo>,
    result: Option<ReturnTypeInfo>,
}

impl<'a> ReturnTypeAnalyzer<'a> {
    pub fn new(types: &'a hashbrown::HashMap<VarId, TypeInfo>) -> Self {
        Self { types, result: None }
    }

    pub fn finish(self) -> ReturnTypeInfo {
        self.result.unwrap_or(ReturnTypeInfo::Void)
    }

    fn fold(&mut self, this: ReturnTypeInfo) {
        self.result = Some(match self.result {
            None => this,
            Some(prev) if prev == this => prev,
            Some(_) => ReturnTypeInfo::Inconsistent,
        });
    }
}

impl SsaVisitor for ReturnTypeAnalyzer<'_> {
    fn visit_ret(&mut self, value: Option<VarId>) {
        let this = match value {
            None => ReturnTypeInfo::Void,
            Some(v) => match self.types.get(&v) {
                Some(ty) => ReturnTypeInfo::Value(*ty),
                None => ReturnTypeInfo::Inconsistent,
            },
        };
        self.fold(this);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::visitor::walk;
    use crate::ssa::writer::SsaWriter;

    #[test]
    fn single_return_path_is_reported_directly() {
        let mut w = SsaWriter::new();
        let v = w.write_assign_literal(TypeInfo::I32, 1);
        w.write_ret(Some(v));
        let buf = w.finish();

        let mut a = ReturnTypeAnalyzer::new(&buf.types);
        walk(&buf.bytes, &mut a).unwrap();
        assert_eq!(a.finish(), ReturnTypeInfo::Value(TypeInfo::I32));
    }

    #[test]
    fn no_ret_instruction_means_void() {
        let w = SsaWriter::new();
        let buf = w.finish();
        let mut a = ReturnTypeAnalyzer::new(&buf.types);
        walk(&buf.bytes, &mut a).unwrap();
        assert_eq!(a.finish(), ReturnTypeInfo::Void);
    }
}
