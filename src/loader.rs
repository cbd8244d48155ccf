//! Glues the lifter and both emulators into a runnable program
//! (`spec.md` §6's hand-off contract).
//!
//! Neither emulator nor the lifter can answer "what does call target X
//! return" or "which function does this index even name" on its own —
//! each only ever sees one function's body at a time, by design (`spec.md`
//! §5: "every component is a straight-line routine"). `Loader` owns the
//! flat module list §4.1 describes (cross-module references are a
//! `(moduleIndex, functionIndex)` pair into it) and answers those
//! questions for every `Call`/`CallExt`/`CallInd`/`CallIndExt` site,
//! following imports to their concrete target.
//!
use crate::emulate::globals::Globals;
use crate::emulate::{ir_emulator, ssa_emulator};
use crate::error::{EmulateError, LoadError};
use crate::ir::function::{CalleeSignature, FunctionFlags, IrFunction};
use crate::ir::module::IrModule;
use crate::lifter::lift;
use crate::types::{TypeInfo, TypeRegistry};

/// A flat, indexable list of loaded modules plus the resolution logic
/// every fallible cross-function reference needs.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    modules: Vec<IrModule>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module at the next flat index and returns that index.
    pub fn add_module(&mut self, module: IrModule) -> u16 {
        let index = self.modules.len() as u16;
        self.modules.push(module);
        index
    }

    pub fn module(&self, index: u16) -> Result<&IrModule, LoadError> {
        self.modules.get(index as usize).ok_or(LoadError::UnknownModule(index))
    }

    /// Resolves `(module, func_index)` to the function that actually owns
    /// a body, following an import through its declared external
    /// module/name if the named function is import-only (`spec.md` §6).
    pub fn resolve_function(&self, module: u16, func_index: u32) -> Result<(&IrModule, &IrFunction), LoadError> {
        let m = self.module(module)?;
        let f = m
            .functions
            .get(func_index as usize)
            .ok_or(LoadError::UnknownFunction { module, function: func_index })?;
        if !f.flags.contains(FunctionFlags::IS_IMPORT) {
            return Ok((m, f));
        }
        let import = m
            .imports
            .iter()
            .find(|imp| imp.name == f.name)
            .ok_or_else(|| LoadError::UnresolvedImport(f.name.clone()))?;
        let target_module_name =
            import.from_module.as_deref().ok_or_else(|| LoadError::UnresolvedImport(import.name.clone()))?;
        let target_module = self
            .modules
            .iter()
            .find(|cand| cand.name == target_module_name)
            .ok_or_else(|| LoadError::UnresolvedImport(import.name.clone()))?;
        let target_fn = target_module
            .function_by_name(&import.name)
            .ok_or_else(|| LoadError::UnresolvedImport(import.name.clone()))?;
        Ok((target_module, target_fn))
    }

    /// Answers the lifter's `resolve_call_signature` question: what does
    /// this `Call`/`CallExt` site's target return, and how does it want its
    /// arguments passed? `call_module` is `None` for a same-module call,
    /// naming `home_module` itself.
    pub fn call_signature(&self, home_module: u16, call_module: Option<u16>, func_index: u32) -> Option<CalleeSignature> {
        let target_module = call_module.unwrap_or(home_module);
        self.resolve_function(target_module, func_index).ok().map(|(_, f)| f.signature())
    }

    /// Interprets `func`'s raw IR bytecode, recursing into this loader to
    /// resolve every call it makes.
    pub fn run_ir(
        &self,
        home_module: u16,
        func: &IrFunction,
        registry: &TypeRegistry,
        args: &[i64],
        globals: &mut Globals,
    ) -> Result<Option<i64>, EmulateError> {
        ir_emulator::run(
            func,
            registry,
            args,
            globals,
            |call_module, func_index| self.call_signature(home_module, call_module, func_index),
            |call_module, func_index, call_args| {
                let target_module = call_module.unwrap_or(home_module);
                let (_, target) = self
                    .resolve_function(target_module, func_index)
                    .map_err(|_| EmulateError::UnknownCallTarget { module: target_module, function: func_index })?;
                // A fresh table per call frame: `globals` is already borrowed
                // for this whole invocation, so a callee can't reborrow it
                // too. This convenience driver doesn't thread one module's
                // global state across a recursive call tree; an embedder
                // that needs shared globals across calls drives the
                // emulators directly instead.
                let mut callee_globals = Globals::new();
                self.run_ir(target_module, target, registry, call_args, &mut callee_globals)
            },
        )
    }

    /// Lifts `func` to SSA on demand and interprets it, recursing into
    /// this loader for every call it makes. Each call lifts its own
    /// callee fresh rather than caching the result — a convenience entry
    /// point for testing/comparing against [`Loader::run_ir`], not a
    /// performance-sensitive path.
    pub fn run_ssa(
        &self,
        home_module: u16,
        func: &IrFunction,
        registry: &TypeRegistry,
        args: &[i64],
        globals: &mut Globals,
    ) -> Result<Option<i64>, EmulateError> {
        let ssa = lift(func, registry, &*globals, |call_module, func_index| {
            self.call_signature(home_module, call_module, func_index)
        })?;
        ssa_emulator::run(&ssa.bytes, args, globals, |call_module, func_index, call_args| {
            let target_module = call_module.unwrap_or(home_module);
            let (_, target) = self
                .resolve_function(target_module, func_index)
                .map_err(|_| EmulateError::UnknownCallTarget { module: target_module, function: func_index })?;
            let mut callee_globals = Globals::new();
            self.run_ssa(target_module, target, registry, call_args, &mut callee_globals)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::writer::IrWriter;
    use crate::mangle::ArgSlot;

    fn module_with_two_functions() -> IrModule {
        let mut m = IrModule::new("m");

        // Argument register 0 already holds the incoming argument by the
        // time the body runs; a pure passthrough callee just returns it.
        let mut callee_writer = IrWriter::new();
        callee_writer.write_ret();
        let mut callee = IrFunction::new("callee", callee_writer.finish(), vec![], vec![ArgSlot::Register(0)]);
        callee.return_type = Some(TypeInfo::I64);
        m.push_function(callee);

        let mut caller_writer = IrWriter::new();
        caller_writer.write_call(0);
        caller_writer.write_ret();
        let mut caller = IrFunction::new("caller", caller_writer.finish(), vec![], vec![ArgSlot::Register(0)]);
        caller.return_type = Some(TypeInfo::I64);
        m.push_function(caller);

        m
    }

    #[test]
    fn resolves_a_same_module_call_target() {
        let mut loader = Loader::new();
        let idx = loader.add_module(module_with_two_functions());

        let (_, f) = loader.resolve_function(idx, 0).unwrap();
        assert_eq!(f.name, "callee");
    }

    #[test]
    fn unknown_module_index_is_reported() {
        let loader = Loader::new();
        assert!(loader.module(3).is_err());
    }

    #[test]
    fn runs_a_caller_through_a_same_module_call_via_the_ir_emulator() {
        let mut loader = Loader::new();
        let idx = loader.add_module(module_with_two_functions());
        let registry = TypeRegistry::new();
        let mut globals = Globals::new();

        let caller = loader.resolve_function(idx, 1).unwrap().1.clone();
        let result = loader.run_ir(idx, &caller, &registry, &[42], &mut globals).unwrap();
        assert_eq!(result, Some(42));
    }
}
