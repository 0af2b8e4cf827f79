//! Module namespaces.

use indexmap::IndexMap;

use crate::ir::function::FunctionId;

/// Index into the program's module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn new(id: u32) -> Self {
        ModuleId(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A pure namespace holding functions and child modules; modules carry no
/// executable code of their own.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    /// Full path from the root, ending with this module's own name.
    pub path: Vec<String>,
    pub functions: IndexMap<String, FunctionId>,
    pub children: IndexMap<String, ModuleId>,
}

impl Module {
    pub fn new(name: impl Into<String>, path: Vec<String>) -> Self {
        Module {
            name: name.into(),
            path,
            functions: IndexMap::new(),
            children: IndexMap::new(),
        }
    }
}
