//! A module: a named collection of functions, some of which may be
//! imports resolved from elsewhere (`spec.md` §4.1, §6).

use std::sync::atomic::{AtomicU32, Ordering};

use crate::ir::function::{IrFunction, ModuleId};

static NEXT_MODULE_ID: AtomicU32 = AtomicU32::new(0);

/// One import a module expects to resolve externally: the name it is
/// known by, and the external module it names (if the reference is
/// qualified) (`spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDescriptor {
    pub name: String,
    pub from_module: Option<String>,
}

/// A compiled module: its own functions plus a record of what it expects
/// to be resolved by a loader (`spec.md` §6).
#[derive(Debug, Clone)]
pub struct IrModule {
    pub id: ModuleId,
    pub name: String,
    pub functions: Vec<IrFunction>,
    pub imports: Vec<ImportDescriptor>,
    /// Native modules' functions are call targets resolved outside this
    /// crate entirely; they are never lifted or inlined (`spec.md` §4.1,
    /// §4.7, §6).
    pub is_native: bool,
}

impl IrModule {
    /// Creates an empty module and assigns it a fresh, process-wide unique
    /// id (`spec.md` §5), mirroring [`crate::types::TypeRegistry`]'s id
    /// assignment.
    pub fn new(name: impl Into<String>) -> Self {
        let id = ModuleId::from_u32(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            id,
            name: name.into(),
            functions: Vec::new(),
            imports: Vec::new(),
            is_native: false,
        }
    }

    pub fn push_function(&mut self, mut function: IrFunction) -> usize {
        function.module = Some(self.id);
        let index = self.functions.len();
        self.functions.push(function);
        index
    }

    pub fn function_by_name(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A process-wide collection of loaded modules, keyed by [`ModuleId`].
#[derive(Debug, Clone, Default)]
pub struct ModuleList {
    modules: Vec<IrModule>,
}

impl ModuleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: IrModule) {
        self.modules.push(module);
    }

    pub fn get(&self, id: ModuleId) -> Option<&IrModule> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&IrModule> {
        self.modules.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::IrFunction;

    #[test]
    fn modules_get_distinct_ids() {
        let a = IrModule::new("a");
        let b = IrModule::new("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn pushing_a_function_stamps_its_module_id() {
        let mut m = IrModule::new("m");
        let f = IrFunction::new("f", vec![], vec![], vec![]);
        m.push_function(f);
        assert_eq!(m.functions[0].module, Some(m.id));
    }
}
