//! Function decorator words, written between the parameter list and the
//! body (`method: void stop() extern;`).

use super::Parser;
use crate::error::ParseResult;
use crate::ir::{Decorator, FunctionId};
use crate::lexer::TokenKind;

impl Parser<'_> {
    /// Consumes the decorator words following a parameter list. Starts on
    /// the closing `)` and ends on the first token that is not a
    /// decorator, normally the body's `{` or the `;` of a bodyless
    /// declaration.
    pub(super) fn parse_function_decorators(&mut self, id: FunctionId) -> ParseResult<()> {
        loop {
            self.advance_or("Expected function definition, not EOF.")?;
            if self.current().kind != TokenKind::Word {
                return Ok(());
            }
            let word = self.current();
            let Some(decorator) = Decorator::parse(&word.text) else {
                return Err(self.syntax_error_at(
                    format!("Unknown function decorator: '{}'.", word.text),
                    word.trace,
                ));
            };
            let function = self.program.function_mut(id);
            if function.has_decorator(decorator) {
                return Err(self.syntax_error_at(
                    format!("Duplicate function decorator: '{}'.", word.text),
                    word.trace,
                ));
            }
            function.decorators.push(decorator);
        }
    }
}
