//! Type syntax and value-against-type verification.
//!
//! The written form of a type is an atom (builtin name, declared object
//! type, generic placeholder, or `null`) followed by any number of
//! suffixes: `!` marks the newest level strict, `?` marks it optional,
//! `[]` adds an array level, and `|` introduces an alternative atom.
//! `int?[]!` is a strict array of optional ints.

use super::Parser;
use crate::error::ParseResult;
use crate::ir::{MemberDecorator, ObjectId, RbcValue};
use crate::lexer::{TokenKind, Trace};
use crate::types::{type_ids, TypeInfo};

/// Which statement asked for the check; selects the error template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum UseCase {
    Assignment,
    Return,
    ListItem,
    Parameter,
}

impl Parser<'_> {
    /// Parses a complete written type. Starts on the type's first token
    /// and ends on its last.
    ///
    /// During a generic instantiation, placeholders resolve to their
    /// bound concrete types on the way out.
    pub(super) fn parse_type(&mut self) -> ParseResult<TypeInfo> {
        let mut info = self.parse_type_atom()?;

        loop {
            let Some(next) = self.peek(1) else { break };
            match next.kind {
                TokenKind::Bang => {
                    self.advance();
                    mark_strict(&mut info);
                }
                TokenKind::Question => {
                    self.advance();
                    mark_optional(&mut info);
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.advance_or("Expected ']', not EOF.")?;
                    self.expect(TokenKind::RBracket, "Expected ']'.")?;
                    info.array_count += 1;
                    info.array_modifiers.push((false, false));
                }
                TokenKind::Pipe => {
                    self.advance();
                    self.advance_or("Expected a type after '|'.")?;
                    let alternative = self.parse_type_alternative()?;
                    info.alternatives.push(alternative);
                }
                _ => break,
            }
        }

        if !self.program.generic_bindings.is_empty() {
            let bindings = self.program.generic_bindings.clone();
            TypeInfo::resolve_generics(&mut info, &bindings);
        }
        Ok(info)
    }

    /// A single atom with optional `!`/`?`; the restricted form allowed
    /// after `|`. Array alternatives are not supported.
    fn parse_type_alternative(&mut self) -> ParseResult<TypeInfo> {
        let mut info = self.parse_type_atom()?;
        loop {
            let Some(next) = self.peek(1) else { break };
            match next.kind {
                TokenKind::Bang => {
                    self.advance();
                    info.strict = true;
                }
                TokenKind::Question => {
                    self.advance();
                    info.optional = true;
                }
                TokenKind::LBracket => {
                    self.advance();
                    return Err(self.syntax_error("Array types cannot be used as alternatives."));
                }
                _ => break,
            }
        }
        Ok(info)
    }

    fn parse_type_atom(&mut self) -> ParseResult<TypeInfo> {
        let token = self.current();
        match token.kind {
            TokenKind::TypeName => Ok(TypeInfo::new(token.info)),
            TokenKind::Null => Ok(TypeInfo::new(type_ids::NULL)),
            TokenKind::Word => {
                if let Some(index) = self.program.generic_names.get(&token.text) {
                    return Ok(TypeInfo::placeholder(*index as i32));
                }
                if let Some(object) = self.program.object_table.get(&token.text) {
                    return Ok(TypeInfo::new(self.program.object(*object).type_id));
                }
                Err(self.syntax_error(format!("Unknown type name '{}'.", token.text)))
            }
            _ => Err(self.syntax_error("Expected a type.")),
        }
    }

    /// Parses the `<T, U>` list of a generic function header, registering
    /// each placeholder name. Starts on `<` and ends on `>`.
    pub(super) fn parse_generic_names(&mut self) -> ParseResult<()> {
        loop {
            self.advance_or("Expected a generic parameter name, not EOF.")?;
            self.expect(TokenKind::Word, "Expected a generic parameter name.")?;
            let name = self.current().text.clone();
            if self.program.generic_names.contains_key(&name) {
                return Err(self.syntax_error(format!("Duplicate generic parameter '{name}'.")));
            }
            let index = self.program.generic_names.len();
            self.program.generic_names.insert(name, index);

            self.advance_or("Expected '>' or ',', not EOF.")?;
            match self.current().kind {
                TokenKind::Comma => continue,
                TokenKind::Gt => break,
                _ => return Err(self.syntax_error("Expected '>' or ','.")),
            }
        }
        Ok(())
    }

    /// Checks that `value` may flow into a slot of type `expected`.
    ///
    /// Constants check by their literal kind, operable registers count as
    /// ints, variables by their declared type, lists element-wise one
    /// level down. Storage access paths are not statically tracked and
    /// always pass.
    pub(super) fn verify_type(
        &self,
        expected: &TypeInfo,
        value: &RbcValue,
        use_case: UseCase,
        trace: Trace,
    ) -> ParseResult<()> {
        let actual = match value {
            RbcValue::Constant(constant) => TypeInfo::new(constant.kind.type_id()),
            RbcValue::Register(id) => {
                let register = self.program.register(*id);
                if !register.operable {
                    return Err(self.unsupported_error_at(
                        "Cannot verify the contents of a non-operable register.",
                        trace,
                    ));
                }
                TypeInfo::new(type_ids::INT)
            }
            RbcValue::Variable(id) => self.program.variable(*id).declared_type.clone(),
            RbcValue::Object(id) => {
                let object = self.program.object(*id);
                if object.type_id < 0 {
                    return self.verify_object_literal(expected, *id, use_case, trace);
                }
                TypeInfo::new(object.type_id)
            }
            RbcValue::List(list) => {
                if expected.array_count == 0 {
                    let actual = format!("{}[]", list.element_type.describe());
                    return Err(self.type_mismatch(use_case, expected, &actual, trace));
                }
                let element_expected = expected.element_type();
                for element in &list.values {
                    self.verify_type(&element_expected, element, UseCase::ListItem, trace)?;
                }
                return Ok(());
            }
            RbcValue::Path(_) => return Ok(()),
            RbcValue::Function(_) | RbcValue::Module(_) => {
                return Err(
                    self.unsupported_error_at("This cannot be used as a value here.", trace)
                );
            }
        };

        if expected.equals(&actual) {
            return Ok(());
        }
        Err(self.type_mismatch(use_case, expected, &actual.describe(), trace))
    }

    /// Shape-checks an inline object literal against the declared object
    /// type it is being placed into.
    fn verify_object_literal(
        &self,
        expected: &TypeInfo,
        literal: ObjectId,
        use_case: UseCase,
        trace: Trace,
    ) -> ParseResult<()> {
        if expected.array_count > 0 {
            return Err(self.type_mismatch(use_case, expected, "object", trace));
        }
        if expected.type_id == type_ids::ANY || expected.type_id == type_ids::OBJECT {
            return Ok(());
        }
        if expected.type_id < type_ids::TYPE_CARET_START {
            return Err(self.type_mismatch(use_case, expected, "object", trace));
        }
        let Some(declared) = self
            .program
            .objects
            .iter()
            .find(|object| object.type_id == expected.type_id)
        else {
            return Err(self.type_mismatch(use_case, expected, "object", trace));
        };

        let literal = self.program.object(literal);
        for (name, member) in &declared.members {
            if member.decorator == MemberDecorator::Required && !literal.members.contains_key(name)
            {
                return Err(self.syntax_error_at(
                    format!(
                        "Missing required member '{}' for object type '{}'.",
                        name, declared.name
                    ),
                    trace,
                ));
            }
        }
        for (name, member) in &literal.members {
            let Some(declared_member) = declared.members.get(name) else {
                return Err(self.syntax_error_at(
                    format!("Object type '{}' has no member '{}'.", declared.name, name),
                    trace,
                ));
            };
            if let Some(value) = &member.value {
                self.verify_type(&declared_member.type_info, value, UseCase::Assignment, trace)?;
            }
        }
        Ok(())
    }

    pub(super) fn type_mismatch(
        &self,
        use_case: UseCase,
        expected: &TypeInfo,
        actual: &str,
        trace: Trace,
    ) -> Box<crate::error::Error> {
        let expected = expected.describe();
        let message = match use_case {
            UseCase::Assignment => {
                format!("Cannot assign a value of type '{actual}' to '{expected}'.")
            }
            UseCase::Return => format!(
                "Cannot return a value of type '{actual}' from a function returning '{expected}'."
            ),
            UseCase::ListItem => {
                format!("List elements must be '{expected}', found '{actual}'.")
            }
            UseCase::Parameter => {
                format!("Cannot pass a value of type '{actual}' to a parameter of type '{expected}'.")
            }
        };
        self.syntax_error_at(message, trace)
    }
}

/// `!` after `[]` tightens the newest array level, otherwise the base.
fn mark_strict(info: &mut TypeInfo) {
    match info.array_modifiers.last_mut() {
        Some(level) => level.1 = true,
        None => info.strict = true,
    }
}

fn mark_optional(info: &mut TypeInfo) {
    match info.array_modifiers.last_mut() {
        Some(level) => level.0 = true,
        None => info.optional = true,
    }
}
