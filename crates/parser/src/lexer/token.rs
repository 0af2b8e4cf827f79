//! Token definition and types.

use text_size::TextRange;

use crate::types::type_ids;

/// Source position info attached to every token.
///
/// `line` and `caret` are 1-based; `span` is the absolute byte range of
/// the token inside its fragment. `start` is an optional widened left
/// edge (column) used when an error should underline a whole construct
/// rather than a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trace {
    pub span: TextRange,
    pub line: u32,
    pub caret: u32,
    pub start: Option<u32>,
}

impl Trace {
    pub fn new(span: TextRange, line: u32, caret: u32) -> Self {
        Trace {
            span,
            line,
            caret,
            start: None,
        }
    }
}

/// A positioned lexical unit.
///
/// `info` is an extra discriminator: the operator character for
/// operator tokens, the type id for builtin type names, `-1` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub info: i32,
    pub trace: Trace,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, info: i32, trace: Trace) -> Self {
        Token {
            kind,
            text: text.into(),
            info,
            trace,
        }
    }

    /// Synthesize a token that did not come from source, reusing an
    /// existing trace (used by constant folding).
    pub fn synthetic(kind: TokenKind, text: impl Into<String>, trace: Trace) -> Self {
        Token::new(kind, text, -1, trace)
    }
}

/// Lexical token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Word,
    Int,
    Float,
    Str,
    /// `@`-prefixed runtime selector, e.g. `@a` or `@e[type=pig]`.
    Selector,
    /// Builtin type name; `info` holds the type id.
    TypeName,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    /// Arithmetic operator; `info` holds the operator character.
    Operator,
    /// Compound assignment (`+=` and friends); `info` holds the base
    /// operator character.
    VarOperator,
    CmpEq,
    CmpNe,
    Lt,
    Gt,
    /// Strict type decorator `!`.
    Bang,
    /// Optional type decorator `?`.
    Question,
    /// Type alternative separator `|`.
    Pipe,
    Colon,
    Assign,
    Semicolon,
    Comma,
    Dot,
    ModuleAccess,

    Use,
    Module,
    Method,
    Return,
    If,
    Elif,
    Else,
    Const,
    And,
    Or,
    Not,
    True,
    False,
    Null,
    Optional,
    Required,
    Seperate,
    For,
    While,
    In,
    Break,
    Continue,
    Asm,
}

impl TokenKind {
    /// Human readable name used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Word => "word",
            TokenKind::Int => "int literal",
            TokenKind::Float => "float literal",
            TokenKind::Str => "string literal",
            TokenKind::Selector => "selector literal",
            TokenKind::TypeName => "type name",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Operator => "operator",
            TokenKind::VarOperator => "compound assignment",
            TokenKind::CmpEq => "'=='",
            TokenKind::CmpNe => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Bang => "'!'",
            TokenKind::Question => "'?'",
            TokenKind::Pipe => "'|'",
            TokenKind::Colon => "':'",
            TokenKind::Assign => "'='",
            TokenKind::Semicolon => "semicolon",
            TokenKind::Comma => "comma",
            TokenKind::Dot => "'.'",
            TokenKind::ModuleAccess => "'::'",
            TokenKind::Use => "'use' keyword",
            TokenKind::Module => "'module' keyword",
            TokenKind::Method => "'method' keyword",
            TokenKind::Return => "'return' keyword",
            TokenKind::If => "'if' keyword",
            TokenKind::Elif => "'elif' keyword",
            TokenKind::Else => "'else' keyword",
            TokenKind::Const => "'const' keyword",
            TokenKind::And => "'and' keyword",
            TokenKind::Or => "'or' keyword",
            TokenKind::Not => "'not' keyword",
            TokenKind::True => "'true' keyword",
            TokenKind::False => "'false' keyword",
            TokenKind::Null => "'null' keyword",
            TokenKind::Optional => "'optional' keyword",
            TokenKind::Required => "'required' keyword",
            TokenKind::Seperate => "'seperate' keyword",
            TokenKind::For => "'for' keyword",
            TokenKind::While => "'while' keyword",
            TokenKind::In => "'in' keyword",
            TokenKind::Break => "'break' keyword",
            TokenKind::Continue => "'continue' keyword",
            TokenKind::Asm => "'asm' keyword",
        }
    }

    /// True for the loop/flow words that are reserved but not compiled.
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            TokenKind::For
                | TokenKind::While
                | TokenKind::In
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Asm
        )
    }
}

/// Builtin type names, mapped to their fixed type ids.
pub static TYPE_NAMES: phf::Map<&'static str, i32> = phf::phf_map! {
    "int" => type_ids::INT,
    "string" => type_ids::STRING,
    "float" => type_ids::FLOAT,
    "list" => type_ids::LIST,
    "obj" => type_ids::OBJECT,
    "selector" => type_ids::SELECTOR,
    "void" => type_ids::VOID,
    "any" => type_ids::ANY,
    "bool" => type_ids::BOOL,
};

/// Keywords that should be highlighted in rendered diagnostics.
pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "use" => TokenKind::Use,
    "module" => TokenKind::Module,
    "method" => TokenKind::Method,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "const" => TokenKind::Const,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "not" => TokenKind::Not,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "null" => TokenKind::Null,
    "optional" => TokenKind::Optional,
    "required" => TokenKind::Required,
    "seperate" => TokenKind::Seperate,
    "for" => TokenKind::For,
    "while" => TokenKind::While,
    "in" => TokenKind::In,
    "break" => TokenKind::Break,
    "continue" => TokenKind::Continue,
    "asm" => TokenKind::Asm,
};
