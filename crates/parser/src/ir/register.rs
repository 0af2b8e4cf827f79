//! Compiler-managed registers.

use std::fmt;

/// Index into the program's register pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterId(u32);

impl RegisterId {
    pub fn new(id: u32) -> Self {
        RegisterId(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One register in the pool.
///
/// Operable registers hold scalar arithmetic values the target can operate
/// on directly; non-operable registers hold structured data that can only
/// be moved through storage copies. `vacant` marks a register as reusable;
/// expression lowering frees its output register as soon as the enclosing
/// expression has consumed it.
#[derive(Debug, Clone)]
pub struct Register {
    pub id: RegisterId,
    pub operable: bool,
    pub vacant: bool,
}

impl Register {
    pub fn new(id: RegisterId, operable: bool, vacant: bool) -> Self {
        Register {
            id,
            operable,
            vacant,
        }
    }

    pub fn free(&mut self) {
        self.vacant = true;
    }
}
