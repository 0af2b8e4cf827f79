//! Variables and their compile-time state.

use std::fmt;

use crate::lexer::Trace;
use crate::types::TypeInfo;

/// Index into the program's variable arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(u32);

impl VariableId {
    pub fn new(id: u32) -> Self {
        VariableId(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A declared variable or function parameter.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// Lexical depth it was declared at; lookups only see variables whose
    /// scope is at or above the current depth.
    pub scope: i32,
    /// The type as written at the declaration site.
    pub declared_type: TypeInfo,
    /// The type of the value currently known to be stored, which may be
    /// narrower than the declared type (e.g. `any` holding an int).
    pub inferred_type: TypeInfo,
    pub is_const: bool,
    pub global: bool,
    /// Declaration site, for diagnostics.
    pub trace: Trace,
    /// Storage slot index, assigned by the backend when the variable is
    /// first materialized. `None` until then.
    pub slot: Option<u32>,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        scope: i32,
        global: bool,
        declared_type: TypeInfo,
        trace: Trace,
    ) -> Self {
        let inferred_type = declared_type.clone();
        Variable {
            name: name.into(),
            scope,
            declared_type,
            inferred_type,
            is_const: false,
            global,
            trace,
            slot: None,
        }
    }
}
