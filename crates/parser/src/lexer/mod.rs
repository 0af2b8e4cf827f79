//! Tokenization of redscript source files.
//!
//! The raw [`logos`] lexer produces spans over the source text; [`tokenize`]
//! wraps it, attaching line/caret positions and folding keywords and type
//! names into their dedicated token kinds.

mod token;

pub use token::{Token, TokenKind, Trace, KEYWORDS, TYPE_NAMES};

use logos::Logos;
use text_size::{TextRange, TextSize};

use crate::error::{Error, ErrorKind, ParseResult};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
enum RawToken {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,

    #[regex(r"[0-9]+")]
    Int,

    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,

    // An unterminated string still has to be caught as its own case so the
    // report can point at the opening quote instead of a generic bad char.
    #[regex(r#""([^"\\\n]|\\.)*"#, priority = 1)]
    UnterminatedStr,

    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*(\[[^\]\n]*\])?")]
    Selector,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token("^")]
    Operator,

    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    VarOperator,

    #[token("==")]
    CmpEq,
    #[token("!=")]
    CmpNe,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // Type decorators. `!=` outranks `!` by longest match.
    #[token("!")]
    Bang,
    #[token("?")]
    Question,
    #[token("|")]
    Pipe,

    #[token("::")]
    ModuleAccess,
    #[token(":")]
    Colon,
    #[token("=")]
    Assign,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
}

/// Byte offsets at which each line starts, used to map a span to a
/// one-based line and caret pair.
struct LineIndex {
    starts: Vec<u32>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0u32];
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(idx as u32 + 1);
            }
        }
        LineIndex { starts }
    }

    fn position(&self, offset: u32) -> (u32, u32) {
        let line = match self.starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        (line as u32 + 1, offset - self.starts[line] + 1)
    }
}

/// Tokenizes one source file. Comments and whitespace are dropped; every
/// remaining lexeme becomes a [`Token`] carrying its position. Fails on the
/// first unterminated string or unrecognized character.
pub fn tokenize(file: &str, source: &str) -> ParseResult<Vec<Token>> {
    let index = LineIndex::new(source);
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();

    while let Some(raw) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();
        let (line, caret) = index.position(span.start as u32);
        let trace = Trace::new(
            TextRange::new(TextSize::new(span.start as u32), TextSize::new(span.end as u32)),
            line,
            caret,
        );

        let raw = match raw {
            Ok(raw) => raw,
            Err(()) => {
                return Err(Error::new(
                    ErrorKind::Syntax(format!("Unrecognized character '{slice}'.")),
                    file,
                    Some(trace),
                )
                .into());
            }
        };
        tokens.push(convert(raw, slice, trace, file)?);
    }

    Ok(tokens)
}

fn convert(raw: RawToken, slice: &str, trace: Trace, file: &str) -> ParseResult<Token> {
    let token = match raw {
        RawToken::Word => {
            if let Some(kind) = KEYWORDS.get(slice) {
                Token::new(*kind, slice, -1, trace)
            } else if let Some(type_id) = TYPE_NAMES.get(slice) {
                Token::new(TokenKind::TypeName, slice, *type_id, trace)
            } else {
                Token::new(TokenKind::Word, slice, -1, trace)
            }
        }
        RawToken::Int => Token::new(TokenKind::Int, slice, -1, trace),
        RawToken::Float => Token::new(TokenKind::Float, slice, -1, trace),
        // The surrounding quotes are stripped; the backend re-quotes string
        // constants when it prints them into commands.
        RawToken::Str => Token::new(TokenKind::Str, unescape(&slice[1..slice.len() - 1]), -1, trace),
        RawToken::UnterminatedStr => {
            return Err(Error::new(
                ErrorKind::UnexpectedEof("Unterminated string literal.".into()),
                file,
                Some(trace),
            )
            .into());
        }
        RawToken::Selector => Token::new(TokenKind::Selector, slice, -1, trace),
        RawToken::LParen => Token::new(TokenKind::LParen, slice, -1, trace),
        RawToken::RParen => Token::new(TokenKind::RParen, slice, -1, trace),
        RawToken::LBrace => Token::new(TokenKind::LBrace, slice, -1, trace),
        RawToken::RBrace => Token::new(TokenKind::RBrace, slice, -1, trace),
        RawToken::LBracket => Token::new(TokenKind::LBracket, slice, -1, trace),
        RawToken::RBracket => Token::new(TokenKind::RBracket, slice, -1, trace),
        // Operator tokens keep their character in `info` so the expression
        // engine can dispatch without re-reading the text.
        RawToken::Operator => {
            Token::new(TokenKind::Operator, slice, slice.as_bytes()[0] as i32, trace)
        }
        RawToken::VarOperator => {
            Token::new(TokenKind::VarOperator, slice, slice.as_bytes()[0] as i32, trace)
        }
        RawToken::CmpEq => Token::new(TokenKind::CmpEq, slice, -1, trace),
        RawToken::CmpNe => Token::new(TokenKind::CmpNe, slice, -1, trace),
        RawToken::Lt => Token::new(TokenKind::Lt, slice, -1, trace),
        RawToken::Gt => Token::new(TokenKind::Gt, slice, -1, trace),
        RawToken::Bang => Token::new(TokenKind::Bang, slice, -1, trace),
        RawToken::Question => Token::new(TokenKind::Question, slice, -1, trace),
        RawToken::Pipe => Token::new(TokenKind::Pipe, slice, -1, trace),
        RawToken::ModuleAccess => Token::new(TokenKind::ModuleAccess, slice, -1, trace),
        RawToken::Colon => Token::new(TokenKind::Colon, slice, -1, trace),
        RawToken::Assign => Token::new(TokenKind::Assign, slice, -1, trace),
        RawToken::Semicolon => Token::new(TokenKind::Semicolon, slice, -1, trace),
        RawToken::Comma => Token::new(TokenKind::Comma, slice, -1, trace),
        RawToken::Dot => Token::new(TokenKind::Dot, slice, -1, trace),
    };
    Ok(token)
}

fn unescape(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
