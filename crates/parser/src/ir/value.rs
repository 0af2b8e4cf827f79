//! Values an instruction can carry as a parameter.

use smallvec::SmallVec;
use std::fmt;

use crate::ir::function::FunctionId;
use crate::ir::module::ModuleId;
use crate::ir::object::ObjectId;
use crate::ir::register::RegisterId;
use crate::ir::variable::VariableId;
use crate::lexer::{Token, TokenKind, Trace};
use crate::types::{type_ids, TypeInfo};

/// Literal kind of a [`RbcConstant`].
///
/// The first four discriminants double as the runtime type tags stored next
/// to returned values, so their order is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantKind {
    Int,
    Str,
    Float,
    List,
    Selector,
    /// A bare identifier passed through as raw text.
    Word,
    Null,
}

impl ConstantKind {
    /// Tag written into the return-type slot at runtime; only value-like
    /// kinds have one.
    pub fn runtime_tag(self) -> Option<i32> {
        match self {
            ConstantKind::Int => Some(0),
            ConstantKind::Str => Some(1),
            ConstantKind::Float => Some(2),
            ConstantKind::List => Some(3),
            _ => None,
        }
    }

    /// The type id a literal of this kind satisfies.
    pub fn type_id(self) -> i32 {
        match self {
            ConstantKind::Int => type_ids::INT,
            ConstantKind::Str => type_ids::STRING,
            ConstantKind::Float => type_ids::FLOAT,
            ConstantKind::List => type_ids::LIST,
            ConstantKind::Selector => type_ids::SELECTOR,
            ConstantKind::Word => type_ids::ANY,
            ConstantKind::Null => type_ids::NULL,
        }
    }

    /// Maps a literal token kind; `true`/`false` become int constants.
    pub fn from_token(kind: TokenKind) -> Option<ConstantKind> {
        match kind {
            TokenKind::Int | TokenKind::True | TokenKind::False => Some(ConstantKind::Int),
            TokenKind::Str => Some(ConstantKind::Str),
            TokenKind::Float => Some(ConstantKind::Float),
            TokenKind::Selector => Some(ConstantKind::Selector),
            TokenKind::Word => Some(ConstantKind::Word),
            TokenKind::Null => Some(ConstantKind::Null),
            _ => None,
        }
    }
}

/// A literal embedded into the instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RbcConstant {
    pub kind: ConstantKind,
    pub text: String,
    pub trace: Option<Trace>,
}

impl RbcConstant {
    pub fn new(kind: ConstantKind, text: impl Into<String>) -> Self {
        RbcConstant {
            kind,
            text: text.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Builds a constant from a literal token. `true`/`false` carry the
    /// text `1`/`0` since the target has no boolean scoreboard values.
    pub fn from_token(token: &Token) -> Option<RbcConstant> {
        let kind = ConstantKind::from_token(token.kind)?;
        let text = match token.kind {
            TokenKind::True => "1".to_string(),
            TokenKind::False => "0".to_string(),
            _ => token.text.clone(),
        };
        Some(RbcConstant::new(kind, text).with_trace(token.trace))
    }

    pub fn int(value: i64) -> Self {
        RbcConstant::new(ConstantKind::Int, value.to_string())
    }

    /// Integer value, if this is an int literal.
    pub fn as_int(&self) -> Option<i64> {
        match self.kind {
            ConstantKind::Int => self.text.parse().ok(),
            _ => None,
        }
    }

    /// Text as it should appear inside an emitted command; strings get
    /// their quotes back here.
    pub fn rendered(&self) -> String {
        match self.kind {
            ConstantKind::Str => format!("\"{}\"", self.text),
            _ => self.text.clone(),
        }
    }

    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.text)
    }
}

/// A list literal with its element type and already-lowered elements.
#[derive(Debug, Clone, PartialEq)]
pub struct RbcList {
    pub element_type: TypeInfo,
    pub values: Vec<RbcValue>,
}

/// One step of a member/index access chain.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessSegment {
    Member(String),
    Index(i64),
}

/// An access chain rooted at a variable, e.g. `points[0].x`.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPath {
    pub variable: VariableId,
    pub segments: SmallVec<[AccessSegment; 2]>,
}

impl AccessPath {
    pub fn new(variable: VariableId) -> Self {
        AccessPath {
            variable,
            segments: SmallVec::new(),
        }
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                AccessSegment::Member(name) => write!(f, ".{name}")?,
                AccessSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Parameter of an instruction.
///
/// Everything except [`RbcValue::Constant`] refers into the program's
/// owning tables by id. [`RbcValue::Function`] is the opaque handle used
/// when a callee cannot be found again by name alone (nested functions and
/// generic variations); [`RbcValue::Module`] rides along on calls into a
/// module so the backend can resolve the callee inside it.
#[derive(Debug, Clone, PartialEq)]
pub enum RbcValue {
    Constant(RbcConstant),
    Register(RegisterId),
    Variable(VariableId),
    Object(ObjectId),
    List(RbcList),
    Function(FunctionId),
    Module(ModuleId),
    Path(AccessPath),
}

impl RbcValue {
    pub fn int(value: i64) -> Self {
        RbcValue::Constant(RbcConstant::int(value))
    }

    pub fn as_constant(&self) -> Option<&RbcConstant> {
        match self {
            RbcValue::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    pub fn as_register(&self) -> Option<RegisterId> {
        match self {
            RbcValue::Register(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<VariableId> {
        match self {
            RbcValue::Variable(id) => Some(*id),
            _ => None,
        }
    }

    /// Kind name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            RbcValue::Constant(_) => "constant",
            RbcValue::Register(_) => "register",
            RbcValue::Variable(_) => "variable",
            RbcValue::Object(_) => "object",
            RbcValue::List(_) => "list",
            RbcValue::Function(_) => "function",
            RbcValue::Module(_) => "module",
            RbcValue::Path(_) => "variable path",
        }
    }
}
