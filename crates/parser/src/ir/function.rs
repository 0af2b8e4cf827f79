//! Functions, their decorators and generic bookkeeping.

use indexmap::IndexMap;
use smallvec::SmallVec;
use std::ops::Range;

use crate::ir::instruction::Instruction;
use crate::ir::variable::VariableId;
use crate::types::TypeInfo;

/// Index into the program's function arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(u32);

impl FunctionId {
    pub fn new(id: u32) -> Self {
        FunctionId(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Function decorators, written after the parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decorator {
    /// Declared elsewhere; no body is compiled.
    Extern,
    /// Implemented directly by the backend; calls are replaced by the
    /// native handler's expansion.
    Native,
    /// Call sites skip the return plumbing.
    Noreturn,
    /// Thin forwarding function.
    Wrapper,
    /// Called exactly once; kept for the backend to inline eventually.
    Single,
    /// Parsed and type-checked but not emitted.
    Nocompile,
}

impl Decorator {
    pub fn parse(word: &str) -> Option<Decorator> {
        match word {
            "extern" => Some(Decorator::Extern),
            "wrapper" => Some(Decorator::Wrapper),
            "noreturn" => Some(Decorator::Noreturn),
            "__single__" => Some(Decorator::Single),
            "__native__" => Some(Decorator::Native),
            "__nocompile__" => Some(Decorator::Nocompile),
            _ => None,
        }
    }
}

/// Generic declaration data. The body is *not* parsed with the rest of the
/// function; only its token range inside the declaring fragment is
/// recorded, and specializations re-parse it on first call.
#[derive(Debug, Clone)]
pub struct Generics {
    /// Placeholder names in declaration order; a placeholder's index is
    /// its generic id.
    pub names: Vec<String>,
    /// Fragment the declaration lives in.
    pub fragment: usize,
    /// Token range of the body, brace to brace.
    pub body: Range<usize>,
    /// Cache of specializations keyed by the exact type-argument tuple.
    pub variations: IndexMap<Vec<TypeInfo>, FunctionId>,
}

/// A parsed function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub scope: i32,
    pub params: Vec<VariableId>,
    pub locals: IndexMap<String, VariableId>,
    pub instructions: Vec<Instruction>,
    pub decorators: SmallVec<[Decorator; 2]>,
    pub return_type: TypeInfo,
    /// Names of the enclosing modules, outermost first.
    pub module_path: Vec<String>,
    /// Set for functions declared inside another function's body.
    pub parent: Option<FunctionId>,
    pub children: IndexMap<String, FunctionId>,
    /// Present on generic declarations. Their `instructions` stay empty;
    /// only variations carry code.
    pub generics: Option<Generics>,
    /// On a variation: the concrete types it was instantiated with.
    pub bound_generics: Option<Vec<TypeInfo>>,
    /// False for bodyless declarations (`extern` and friends ending in a
    /// semicolon).
    pub has_body: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, return_type: TypeInfo) -> Self {
        Function {
            name: name.into(),
            scope: 0,
            params: Vec::new(),
            locals: IndexMap::new(),
            instructions: Vec::new(),
            decorators: SmallVec::new(),
            return_type,
            module_path: Vec::new(),
            parent: None,
            children: IndexMap::new(),
            generics: None,
            bound_generics: None,
            has_body: true,
        }
    }

    pub fn has_decorator(&self, decorator: Decorator) -> bool {
        self.decorators.contains(&decorator)
    }

    pub fn is_native(&self) -> bool {
        self.has_decorator(Decorator::Native)
    }

    pub fn is_extern(&self) -> bool {
        self.has_decorator(Decorator::Extern)
    }

    /// True when the backend should skip this function entirely.
    pub fn skip_compile(&self) -> bool {
        self.is_native()
            || self.is_extern()
            || self.has_decorator(Decorator::Nocompile)
            || !self.has_body
    }

    pub fn is_generic(&self) -> bool {
        self.generics.is_some()
    }
}

/// Instructions and locals living outside any declared function (the
/// file-level statements that form the program entry point).
#[derive(Debug, Clone, Default)]
pub struct RawFunction {
    pub locals: IndexMap<String, VariableId>,
    pub instructions: Vec<Instruction>,
}
