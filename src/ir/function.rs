//! An IR function: its bytecode body, local/argument types, and the
//! attachments later passes hang off it (`spec.md` §4.1, §6, §9).

use crate::attachment::AttachmentList;
use crate::entity::entity_id;
use crate::ir::visitor::IrVisitor;
use crate::ir::visitor::walk as walk_ir;
use crate::mangle::ArgSlot;
use crate::types::TypeInfo;

entity_id! {
    /// A dense id for an [`IrModule`] in a [`crate::ir::module::ModuleList`].
    pub struct ModuleId("module");
}

bitflags::bitflags! {
    /// Per-function flags carried alongside the bytecode (`spec.md` §4.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u8 {
        /// The function has no body in this module; it resolves through
        /// an import (`spec.md` §6's hand-off contract).
        const IS_IMPORT = 1 << 0;
        /// The function is reachable from outside the module and must
        /// survive optimization even with no in-module callers.
        const IS_EXPORTED = 1 << 1;
    }
}

/// A caller-facing hint on whether a function is a candidate for inlining
/// (`spec.md` §4.7's decision rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InlineControl {
    #[default]
    Default,
    NoInline,
    InlineHint,
    ForceInline,
}

/// Per-function opt-out of the optimizer suite (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationControl {
    #[default]
    Default,
    NoOptimize,
}

/// A callee's shape as seen from a call site: what it returns and where
/// each of its declared arguments has to come from (`spec.md` §3, §4.4).
#[derive(Debug, Clone, Default)]
pub struct CalleeSignature {
    pub return_type: Option<TypeInfo>,
    pub arguments: Vec<ArgSlot>,
}

/// One function's IR body plus everything known about its shape.
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub name: String,
    pub bytecode: Vec<u8>,
    pub locals: Vec<TypeInfo>,
    /// Where each declared argument lives in a caller's frame: a register
    /// index to forward or a stack offset to pop (`spec.md` §3, §4.4).
    pub arguments: Vec<ArgSlot>,
    pub return_type: Option<TypeInfo>,
    pub flags: FunctionFlags,
    pub inline_control: InlineControl,
    pub optimization_control: OptimizationControl,
    /// The module this function belongs to, if it has been inserted into
    /// one. A plain id rather than a true back-reference, since nothing
    /// here needs to mutate through it.
    pub module: Option<ModuleId>,
    pub attachments: AttachmentList,
}

impl IrFunction {
    pub fn new(name: impl Into<String>, bytecode: Vec<u8>, locals: Vec<TypeInfo>, arguments: Vec<ArgSlot>) -> Self {
        Self {
            name: name.into(),
            bytecode,
            locals,
            arguments,
            return_type: None,
            flags: FunctionFlags::default(),
            inline_control: InlineControl::default(),
            optimization_control: OptimizationControl::default(),
            module: None,
            attachments: AttachmentList::new(),
        }
    }

    /// What a call site needs to know about this function as a callee: its
    /// argument layout and what it hands back (`spec.md` §4.4's `Call`/
    /// `CallExt` translation rule).
    pub fn signature(&self) -> CalleeSignature {
        CalleeSignature { return_type: self.return_type, arguments: self.arguments.clone() }
    }

    /// Every distinct jump target this function's bytecode references,
    /// sorted and deduplicated. A preprocessing step the lifter runs once
    /// up front so it knows, while translating, which byte offsets need a
    /// frame-state snapshot for a later forward jump to join into
    /// (`spec.md` §4.4).
    pub fn label_addresses(&self) -> Vec<u32> {
        #[derive(Default)]
        struct Labels(Vec<u32>);
        impl IrVisitor for Labels {
            fn visit_jump(&mut self, target: u32) {
                self.0.push(target);
            }
            fn visit_jump_true(&mut self, target: u32) {
                self.0.push(target);
            }
            fn visit_jump_false(&mut self, target: u32) {
                self.0.push(target);
            }
        }
        let mut labels = Labels::default();
        // Bytecode was already validated by the loader; a decode failure
        // here would mean this function's own body is corrupt, which the
        // lifter will independently discover and report.
        let _ = walk_ir(&self.bytecode, &mut labels);
        labels.0.sort_unstable();
        labels.0.dedup();
        labels.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::writer::IrWriter;

    #[test]
    fn label_addresses_are_sorted_and_deduped() {
        let mut w = IrWriter::new();
        w.write_jump(40);
        w.write_jump_true(10);
        w.write_jump_false(40);
        let bytecode = w.finish();

        let f = IrFunction::new("f", bytecode, vec![], vec![]);
        assert_eq!(f.label_addresses(), vec![10, 40]);
    }
}
