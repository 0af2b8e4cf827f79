//! The stack-machine intermediate representation.
//!
//! Parsing emits [`Instruction`]s directly; there is no syntax tree in
//! between. Each instruction carries an [`Opcode`] and up to a handful of
//! [`RbcValue`] parameters referring into the [`Program`] arenas.

pub mod function;
pub mod instruction;
pub mod module;
pub mod object;
pub mod program;
pub mod register;
pub mod value;
pub mod variable;

pub use function::{Decorator, Function, FunctionId, Generics, RawFunction};
pub use instruction::{
    create, create_with, occupy, operate, set, store_return, Instruction, MathOp, Opcode,
};
pub use module::{Module, ModuleId};
pub use object::{MemberDecorator, ObjectId, ObjectMember, ObjectType};
pub use program::{Program, ScopeKind};
pub use register::{Register, RegisterId};
pub use value::{AccessPath, AccessSegment, ConstantKind, RbcConstant, RbcList, RbcValue};
pub use variable::{Variable, VariableId};
