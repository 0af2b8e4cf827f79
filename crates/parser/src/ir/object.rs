//! User-declared object types and inline object literals.

use indexmap::IndexMap;

use crate::ir::value::RbcValue;
use crate::types::TypeInfo;

/// Index into the program's object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn new(id: u32) -> Self {
        ObjectId(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Member decorators as written in an object type declaration. `seperate`
/// keeps its source spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberDecorator {
    Optional,
    Required,
    Seperate,
}

/// One member of an object type or literal.
#[derive(Debug, Clone)]
pub struct ObjectMember {
    pub type_info: TypeInfo,
    pub decorator: MemberDecorator,
    /// Filled for inline literals; declared types carry only the shape.
    pub value: Option<RbcValue>,
}

/// A named object type, or the anonymous shape of an inline literal
/// (`name` empty, `type_id` negative).
#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub scope: i32,
    pub type_id: i32,
    pub members: IndexMap<String, ObjectMember>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>, scope: i32, type_id: i32) -> Self {
        ObjectType {
            name: name.into(),
            scope,
            type_id,
            members: IndexMap::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&ObjectMember> {
        self.members.get(name)
    }
}
