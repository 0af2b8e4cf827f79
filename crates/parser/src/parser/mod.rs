//! The parser: preprocessed token fragments in, byte code out.
//!
//! There is no syntax tree. Statements compile straight into
//! [`Instruction`](crate::ir::Instruction) streams on the [`Program`] as
//! they are recognized; only arithmetic expressions build a short-lived
//! tree so constant folding and precedence can work ahead of lowering.
//!
//! Every statement handler follows one cursor contract: it is entered
//! with the cursor on the statement's first token and returns with the
//! cursor on the statement's *last* token. The driver loop in
//! [`Parser::parse`] performs the single advance between statements.

mod decorators;
mod expr;
mod operators;
mod stmt;
mod types;

use crate::error::{Error, ErrorKind, ParseResult};
use crate::fragment::ProjectFragment;
use crate::ir::Program;
use crate::lexer::{Token, TokenKind, Trace};

/// Everything a successful parse produces: the program and any warnings
/// collected along the way. Warnings never abort the parse; the driver
/// decides whether to render them.
#[derive(Debug)]
pub struct ParseOutcome {
    pub program: Program,
    pub warnings: Vec<Error>,
}

/// Single-pass parser over the preprocessed fragments of a project.
///
/// Fragments are parsed in order, imports first, so that by the time the
/// entry file's statements run every imported function is already in the
/// program tables. A statement never spans two fragments.
pub struct Parser<'a> {
    fragments: &'a [ProjectFragment],
    fragment: usize,
    at: usize,
    program: Program,
    warnings: Vec<Error>,
}

impl<'a> Parser<'a> {
    pub fn new(fragments: &'a [ProjectFragment]) -> Self {
        Parser {
            fragments,
            fragment: 0,
            at: 0,
            program: Program::new(),
            warnings: Vec::new(),
        }
    }

    /// Runs the parse to completion and hands back the program.
    pub fn parse(mut self) -> ParseResult<ParseOutcome> {
        for index in 0..self.fragments.len() {
            self.fragment = index;
            if self.fragments[index].tokens.is_empty() {
                continue;
            }
            self.at = 0;
            loop {
                self.parse_statement()?;
                if !self.advance() {
                    break;
                }
            }
        }

        if !self.program.scope_stack.is_empty() {
            return Err(self.eof_error("Expected '}'."));
        }
        Ok(ParseOutcome {
            program: self.program,
            warnings: self.warnings,
        })
    }

    // Cursor primitives.

    fn tokens(&self) -> &'a [Token] {
        &self.fragments[self.fragment].tokens
    }

    fn file(&self) -> &'a str {
        &self.fragments[self.fragment].file
    }

    fn current(&self) -> &'a Token {
        &self.tokens()[self.at]
    }

    /// Moves one token forward. Returns false at the end of the fragment,
    /// leaving the cursor on the last token.
    fn advance(&mut self) -> bool {
        if self.at + 1 < self.tokens().len() {
            self.at += 1;
            true
        } else {
            false
        }
    }

    /// [`Parser::advance`], raising an end-of-file error with `message`
    /// when there is nothing left.
    fn advance_or(&mut self, message: &str) -> ParseResult<()> {
        if self.advance() {
            Ok(())
        } else {
            Err(self.eof_error(message))
        }
    }

    /// The token `offset` steps away, without moving.
    fn peek(&self, offset: isize) -> Option<&'a Token> {
        let index = self.at as isize + offset;
        if index < 0 {
            return None;
        }
        self.tokens().get(index as usize)
    }

    /// Does the *next* token have this kind?
    fn follows(&self, kind: TokenKind) -> bool {
        self.peek(1).map(|token| token.kind) == Some(kind)
    }

    /// Errors unless the current token has `kind`.
    fn expect(&self, kind: TokenKind, message: &str) -> ParseResult<()> {
        if self.current().kind == kind {
            Ok(())
        } else {
            Err(self.syntax_error(message))
        }
    }

    // Error construction. Every parse error carries the chain of function
    // names currently being parsed as notes.

    /// Position for a report: the current token, or the last token of the
    /// nearest preceding non-empty fragment once the cursor has run out.
    fn error_site(&self) -> (&'a str, Option<Trace>) {
        if self.fragments.is_empty() {
            return ("", None);
        }
        if let Some(fragment) = self.fragments.get(self.fragment) {
            if let Some(token) = fragment.tokens.get(self.at) {
                return (&fragment.file, Some(token.trace));
            }
        }
        let upto = self.fragment.min(self.fragments.len() - 1);
        for fragment in self.fragments[..=upto].iter().rev() {
            if let Some(token) = fragment.tokens.last() {
                return (&fragment.file, Some(token.trace));
            }
        }
        ("", None)
    }

    fn error(&self, kind: ErrorKind) -> Box<Error> {
        let (file, trace) = self.error_site();
        Error::new(kind, file, trace)
            .with_notes(self.program.call_notes())
            .into()
    }

    fn syntax_error(&self, message: impl Into<String>) -> Box<Error> {
        self.error(ErrorKind::Syntax(message.into()))
    }

    fn error_at(&self, kind: ErrorKind, trace: Trace) -> Box<Error> {
        Error::new(kind, self.file(), Some(trace))
            .with_notes(self.program.call_notes())
            .into()
    }

    fn syntax_error_at(&self, message: impl Into<String>, trace: Trace) -> Box<Error> {
        self.error_at(ErrorKind::Syntax(message.into()), trace)
    }

    fn unsupported_error_at(&self, message: impl Into<String>, trace: Trace) -> Box<Error> {
        self.error_at(ErrorKind::UnsupportedOperation(message.into()), trace)
    }

    fn eof_error(&self, message: impl Into<String>) -> Box<Error> {
        self.error(ErrorKind::UnexpectedEof(message.into()))
    }

    fn unsupported_error(&self, message: impl Into<String>) -> Box<Error> {
        self.error(ErrorKind::UnsupportedOperation(message.into()))
    }

    fn warn(&mut self, message: impl Into<String>) {
        let (file, trace) = self.error_site();
        let warning =
            Error::new(ErrorKind::Syntax(message.into()), file, trace).with_notes(self.program.call_notes());
        self.warnings.push(warning);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{parse, parse_ok};
    use crate::error::ErrorKind;

    #[test]
    fn empty_source_parses_to_empty_program() {
        let outcome = parse_ok("");
        assert!(outcome.program.global.instructions.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn unclosed_scope_is_reported_at_eof() {
        let error = parse("method: void f() {").unwrap_err();
        assert!(matches!(error.kind, ErrorKind::UnexpectedEof(_)));
    }

    #[test]
    fn stray_close_is_rejected() {
        let error = parse("}").unwrap_err();
        assert!(matches!(error.kind, ErrorKind::Syntax(_)));
        assert!(error.kind.message().contains("Unmatched"));
    }

    #[test]
    fn unknown_statement_tokens_warn_and_continue() {
        let outcome = parse_ok("; x: int = 1;");
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].kind.message().contains("suspicious"));
        assert_eq!(outcome.program.global.instructions.len(), 1);
    }
}
