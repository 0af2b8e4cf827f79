//! Arithmetic expressions: tree building, constant folding, lowering.
//!
//! Expressions are the only place the parser builds an intermediate
//! structure. The tree exists just long enough to fold constant integer
//! subtrees and to pick evaluation order; [`Parser::lower_expression`]
//! then flattens it into `SAVE`/`MATH` instructions over registers and
//! returns the value the surrounding statement should use.

use super::operators;
use super::Parser;
use crate::error::ParseResult;
use crate::ir::{self, AccessPath, AccessSegment, MathOp, RbcConstant, RbcValue};
use crate::lexer::{Token, TokenKind, Trace};

/// A parsed expression before lowering. `Access` is a member/index chain
/// rooted at a variable; a lone literal or variable is a `Leaf`.
#[derive(Debug, Clone)]
pub(super) enum ExprTree {
    Leaf(Token),
    Access(AccessPath, Trace),
    Node {
        op: MathOp,
        trace: Trace,
        left: Box<ExprTree>,
        right: Box<ExprTree>,
    },
}

impl ExprTree {
    /// The literal token, if the (folded) expression is a single literal.
    pub(super) fn as_leaf(&self) -> Option<&Token> {
        match self {
            ExprTree::Leaf(token) => Some(token),
            _ => None,
        }
    }
}

impl Parser<'_> {
    /// Parses one expression starting at the current token.
    ///
    /// Returns with the cursor on the expression's terminator: the first
    /// token that can neither start an operand nor continue an operator
    /// chain (`;`, `,`, `)`, a comparison, `and`/`or`, ...). The caller
    /// validates that the terminator is one it accepts.
    pub(super) fn parse_expression(&mut self) -> ParseResult<ExprTree> {
        let tree = self.parse_subexpr(operators::TOP_RANK)?;
        self.advance_or("Unexpected EOF.")?;
        Ok(tree)
    }

    /// Parse, fold and lower in one step; the common case for statements
    /// that only need the resulting value.
    pub(super) fn evaluate_expression(&mut self) -> ParseResult<RbcValue> {
        let mut tree = self.parse_expression()?;
        self.fold_expression(&mut tree)?;
        self.lower_expression(&tree)
    }

    /// Precedence climb consuming operators that bind tighter than
    /// `tighter_than`. Equal ranks stop the climb, which makes every
    /// operator, including `^`, left-associative.
    fn parse_subexpr(&mut self, tighter_than: u8) -> ParseResult<ExprTree> {
        let mut tree = self.parse_operand()?;

        while let Some(next) = self.peek(1) {
            if next.kind != TokenKind::Operator {
                break;
            }
            let op_char = char::from_u32(next.info as u32).unwrap_or('\0');
            let Some(rank) = operators::rank(op_char) else {
                break;
            };
            if rank >= tighter_than {
                break;
            }
            let Some(op) = MathOp::from_char(op_char) else {
                break;
            };

            self.advance();
            let trace = self.current().trace;
            self.advance_or("Expected expression, not EOF.")?;
            let right = self.parse_subexpr(rank)?;
            tree = ExprTree::Node {
                op,
                trace,
                left: Box::new(tree),
                right: Box::new(right),
            };
        }
        Ok(tree)
    }

    /// One operand: a literal, a variable or access chain, a negated
    /// number, or a parenthesized subexpression. Ends on the operand's
    /// last token.
    fn parse_operand(&mut self) -> ParseResult<ExprTree> {
        let token = self.current();
        match token.kind {
            TokenKind::LParen => {
                self.advance_or("Expected expression, not EOF.")?;
                let inner = self.parse_subexpr(operators::TOP_RANK)?;
                self.advance_or("Expected ')', not EOF.")?;
                self.expect(TokenKind::RParen, "Expected ')'.")?;
                Ok(inner)
            }
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::Selector
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => Ok(ExprTree::Leaf(token.clone())),
            TokenKind::Word => {
                if self.follows(TokenKind::Dot) || self.follows(TokenKind::LBracket) {
                    let trace = token.trace;
                    let path = self.parse_access_path()?;
                    return Ok(ExprTree::Access(path, trace));
                }
                if self.follows(TokenKind::LParen)
                    || self.follows(TokenKind::Lt)
                    || self.follows(TokenKind::ModuleAccess)
                {
                    return Err(self.syntax_error(
                        "Function calls cannot be used inside expressions; assign the result to a variable first.",
                    ));
                }
                Ok(ExprTree::Leaf(token.clone()))
            }
            TokenKind::Operator if token.info == '-' as i32 => {
                let minus = token.trace;
                self.advance_or("Expected expression, not EOF.")?;
                let number = self.current();
                if !matches!(number.kind, TokenKind::Int | TokenKind::Float) {
                    return Err(self.syntax_error("Expected expression."));
                }
                let mut text = String::from("-");
                text.push_str(&number.text);
                Ok(ExprTree::Leaf(Token::new(number.kind, text, -1, minus)))
            }
            _ => Err(self.syntax_error("Unexpected token.")),
        }
    }

    /// A member/index chain such as `points[0].x`, starting on the root
    /// variable's name. Ends on the chain's last token.
    pub(super) fn parse_access_path(&mut self) -> ParseResult<AccessPath> {
        let root = self.current();
        let Some(variable) = self.program.find_variable(&root.text) else {
            return Err(
                self.syntax_error_at(format!("Unknown variable '{}'.", root.text), root.trace)
            );
        };

        let mut path = AccessPath::new(variable);
        loop {
            if self.follows(TokenKind::Dot) {
                self.advance();
                self.advance_or("Expected member name, not EOF.")?;
                self.expect(TokenKind::Word, "Expected member name.")?;
                path.segments
                    .push(AccessSegment::Member(self.current().text.clone()));
            } else if self.follows(TokenKind::LBracket) {
                self.advance();
                self.advance_or("Expected list index, not EOF.")?;
                let index = self.current();
                if index.kind != TokenKind::Int {
                    return Err(self.syntax_error("List indices must be integer constants."));
                }
                let value: i64 = index
                    .text
                    .parse()
                    .map_err(|_| self.syntax_error_at("List index is out of range.", index.trace))?;
                path.segments.push(AccessSegment::Index(value));
                self.advance_or("Expected ']', not EOF.")?;
                self.expect(TokenKind::RBracket, "Expected ']'.")?;
            } else {
                break;
            }
        }
        Ok(path)
    }

    /// Collapses integer subtrees bottom-up. `1 + 2 * 3` folds to a
    /// single `7` leaf; anything touching a variable, string or float is
    /// left for the backend. Division and modulo by a constant zero, and
    /// overflow, are compile errors. Idempotent.
    pub(super) fn fold_expression(&self, tree: &mut ExprTree) -> ParseResult<()> {
        let folded = match tree {
            ExprTree::Node {
                op,
                trace,
                left,
                right,
            } => {
                self.fold_expression(left)?;
                self.fold_expression(right)?;
                let (ExprTree::Leaf(lhs), ExprTree::Leaf(rhs)) = (&**left, &**right) else {
                    return Ok(());
                };
                if lhs.kind != TokenKind::Int || rhs.kind != TokenKind::Int {
                    return Ok(());
                }
                let a = self.int_literal(lhs)?;
                let b = self.int_literal(rhs)?;
                let value = self.apply_constant_op(*op, a, b, *trace)?;
                Token::synthetic(TokenKind::Int, value.to_string(), *trace)
            }
            _ => return Ok(()),
        };
        *tree = ExprTree::Leaf(folded);
        Ok(())
    }

    fn int_literal(&self, token: &Token) -> ParseResult<i64> {
        token
            .text
            .parse()
            .map_err(|_| self.syntax_error_at("Integer literal is out of range.", token.trace))
    }

    fn apply_constant_op(&self, op: MathOp, a: i64, b: i64, trace: Trace) -> ParseResult<i64> {
        let value = match op {
            MathOp::Add => a.checked_add(b),
            MathOp::Sub => a.checked_sub(b),
            MathOp::Mul => a.checked_mul(b),
            MathOp::Div => {
                if b == 0 {
                    return Err(
                        self.syntax_error_at("Division by zero in a constant expression.", trace)
                    );
                }
                a.checked_div(b)
            }
            MathOp::Mod => {
                if b == 0 {
                    return Err(
                        self.syntax_error_at("Modulo by zero in a constant expression.", trace)
                    );
                }
                a.checked_rem(b)
            }
            MathOp::Pow => {
                if b < 0 {
                    return Err(self.syntax_error_at(
                        "Exponents in constant expressions must not be negative.",
                        trace,
                    ));
                }
                u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
            }
            MathOp::Xor => Some(a ^ b),
        };
        value.ok_or_else(|| self.syntax_error_at("Constant expression overflows.", trace))
    }

    /// Flattens a tree into register instructions and returns the value
    /// holding the result: the leaf's own value for leaves, a register
    /// for operations.
    ///
    /// Operations evaluate left then right, pick an output register, copy
    /// the left value in unless it is already there, and apply one `MATH`
    /// per node. A register freed by a subexpression is reused for its
    /// parent where possible, so a left-leaning chain costs a single
    /// register. The output register is freed before returning; callers
    /// consume its value immediately.
    pub(super) fn lower_expression(&mut self, tree: &ExprTree) -> ParseResult<RbcValue> {
        match tree {
            ExprTree::Leaf(token) => self.leaf_value(token),
            ExprTree::Access(path, _) => Ok(RbcValue::Path(path.clone())),
            ExprTree::Node {
                op,
                trace,
                left,
                right,
            } => self.lower_operation(*op, *trace, left, right),
        }
    }

    fn lower_operation(
        &mut self,
        op: MathOp,
        trace: Trace,
        left: &ExprTree,
        right: &ExprTree,
    ) -> ParseResult<RbcValue> {
        // Permissive by long-standing behavior: anything that is not a
        // register counts as operable here, so mixing, say, a string
        // constant into scoreboard math is caught by the backend rather
        // than rejected up front.
        let mut operable = true;

        let left_value = self.lower_expression(left)?;
        if let Some(register) = left_value.as_register() {
            operable = self.program.register(register).operable;
        }

        let right_value = self.lower_expression(right)?;
        if let Some(register) = right_value.as_register() {
            if operable && !self.program.register(register).operable {
                return Err(self.unsupported_error_at(
                    "Cannot operate between operable and non-operable registers.",
                    trace,
                ));
            }
        }

        let output = match left_value.as_register() {
            // The left value already sits in a register nothing else has
            // claimed; keep accumulating there.
            Some(register) if self.program.register(register).vacant => {
                self.program.register_mut(register).vacant = false;
                register
            }
            _ => {
                // The right operand's register still holds its value even
                // though it reads as vacant; exclude it so the copy below
                // cannot clobber it.
                let exclude = right_value.as_register();
                let register = match self.program.free_register_excluding(operable, exclude) {
                    Some(register) => register,
                    None => self.program.make_register(operable, false),
                };
                self.program.register_mut(register).vacant = false;
                self.program.emit(ir::occupy(register, left_value));
                register
            }
        };

        self.program.emit(ir::operate(output, right_value, op));
        self.program.register_mut(output).free();
        Ok(RbcValue::Register(output))
    }

    /// The value of a single leaf token. Bare words must name a known
    /// variable; literals become constants.
    pub(super) fn leaf_value(&self, token: &Token) -> ParseResult<RbcValue> {
        if token.kind == TokenKind::Word {
            let Some(variable) = self.program.find_variable(&token.text) else {
                return Err(self.syntax_error_at(
                    format!("Unknown variable '{}'.", token.text),
                    token.trace,
                ));
            };
            return Ok(RbcValue::Variable(variable));
        }
        match RbcConstant::from_token(token) {
            Some(constant) => Ok(RbcValue::Constant(constant)),
            None => Err(self.syntax_error_at("Unexpected token.", token.trace)),
        }
    }
}
