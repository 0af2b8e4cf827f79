//! Statement compilation.
//!
//! Every handler follows the same cursor rule: it is entered with the
//! cursor on the statement's first token and returns with the cursor on
//! the statement's last token. The driver loop advances exactly once
//! between statements. Handlers that read further delegate the same rule
//! downward, so a failed expectation always points at the token that
//! broke it.

use indexmap::IndexMap;

use super::types::UseCase;
use super::Parser;
use crate::error::ParseResult;
use crate::ir::{
    create, create_with, occupy, operate, set, store_return, ConstantKind, Function, FunctionId,
    Generics, Instruction, MathOp, MemberDecorator, Module, ModuleId, ObjectId, ObjectMember,
    ObjectType, Opcode, RbcConstant, RbcList, RbcValue, ScopeKind, Variable,
};
use crate::lexer::{Token, TokenKind};
use crate::types::{type_ids, TypeInfo};

/// What an `=` right-hand side produced: a value to write directly, or a
/// call whose return slots must be copied out afterwards.
enum Rhs {
    Value(RbcValue),
    Call(FunctionId),
}

impl Parser<'_> {
    pub(super) fn parse_statement(&mut self) -> ParseResult<()> {
        let token = self.current();

        // Module bodies hold declarations only; anything that would emit
        // code has no function to land in.
        if self.program.current_module.is_some() && self.program.current_function.is_none() {
            match token.kind {
                TokenKind::Method | TokenKind::Module | TokenKind::RBrace => {}
                _ => return Err(self.syntax_error("Modules can only contain functions.")),
            }
        }

        let mut closed_scope = false;
        match token.kind {
            TokenKind::Word => self.parse_word_statement()?,
            TokenKind::ModuleAccess => self.parse_local_module_call()?,
            TokenKind::Module => self.parse_module_declaration()?,
            TokenKind::Method => self.parse_method_declaration()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::If => self.parse_condition(false)?,
            TokenKind::Elif => self.parse_condition(true)?,
            TokenKind::Else => self.parse_else()?,
            TokenKind::Const => self.parse_const_declaration()?,
            TokenKind::LBrace => {
                self.program.scope_stack.push(ScopeKind::Plain);
                self.program.scope_depth += 1;
                self.program.emit(Instruction::new(Opcode::Inc));
            }
            TokenKind::RBrace => {
                self.close_scope()?;
                closed_scope = true;
            }
            TokenKind::TypeName if token.info == type_ids::OBJECT => {
                self.parse_object_declaration()?;
            }
            TokenKind::TypeName => self.warn("Unimplemented type."),
            kind if kind.is_reserved() => {
                return Err(self.syntax_error(format!(
                    "'{}' is reserved and not implemented yet.",
                    token.text
                )));
            }
            _ => self.warn("Found suspicious token (possibly due to a non-implemented feature)."),
        }

        // `elif`/`else` may only chain directly onto the `}` that closed
        // the previous arm; any other statement in between breaks the
        // chain.
        if !closed_scope {
            self.program.last_scope = ScopeKind::Plain;
        }
        Ok(())
    }

    /// A statement led by a bare word: a variable statement or a call,
    /// decided by the following token.
    fn parse_word_statement(&mut self) -> ParseResult<()> {
        let name = self.current().clone();
        let Some(next) = self.peek(1) else {
            return Err(self.eof_error("Unexpected EOF."));
        };
        match next.kind {
            TokenKind::Colon | TokenKind::Assign | TokenKind::VarOperator => {
                self.advance();
                self.parse_variable(&name, false)
            }
            TokenKind::Dot | TokenKind::LBracket => self.parse_path_assignment(),
            TokenKind::LParen | TokenKind::Lt | TokenKind::ModuleAccess => {
                self.parse_any_call(true)?;
                Ok(())
            }
            _ => {
                self.warn("Found suspicious token (possibly due to a non-implemented feature).");
                Ok(())
            }
        }
    }

    /// `::name(...)` resolves inside the module currently being declared.
    fn parse_local_module_call(&mut self) -> ParseResult<()> {
        let Some(module) = self.program.current_module else {
            return Err(self.syntax_error("'::' can only be used inside a module."));
        };
        self.advance_or("Expected a function name, not EOF.")?;
        self.expect(TokenKind::Word, "Expected a function name.")?;
        self.parse_function_call(Some(module), true)?;
        Ok(())
    }

    // -- Variables ---------------------------------------------------------

    /// Variable statement dispatch. `name` is the consumed name token; the
    /// cursor is on `:`, `=` or a compound operator.
    fn parse_variable(&mut self, name: &Token, is_const: bool) -> ParseResult<()> {
        match self.current().kind {
            TokenKind::Colon => self.parse_declaration(name, false, is_const),
            TokenKind::Assign if is_const => {
                Err(self.syntax_error("Constant variables must declare a type."))
            }
            TokenKind::Assign => self.parse_assignment(name),
            TokenKind::VarOperator => self.parse_compound_assignment(name),
            _ => Err(self.syntax_error("Unexpected token.")),
        }
    }

    /// `name: type` or `name: type = value`. The cursor is on `:`. In
    /// parameter position no code is emitted and the statement ends on the
    /// type's last token instead of `;`.
    fn parse_declaration(&mut self, name: &Token, parameter: bool, is_const: bool) -> ParseResult<()> {
        self.advance_or("Expected a type, not EOF.")?;
        let declared = self.parse_type()?;
        if declared.type_id == type_ids::VOID {
            return Err(self.syntax_error_at(
                "Variables cannot be declared with type 'void'.",
                name.trace,
            ));
        }

        // Redeclaring at the same depth is an error; a deeper block may
        // shadow.
        if let Some(existing) = self.program.find_variable(&name.text) {
            if self.program.variable(existing).scope == self.program.scope_depth {
                return Err(self.syntax_error_at(
                    format!("Variable '{}' already exists.", name.text),
                    name.trace,
                ));
            }
        }

        let global = self.program.current_function.is_none();
        let mut variable = Variable::new(
            name.text.clone(),
            self.program.scope_depth,
            global,
            declared.clone(),
            name.trace,
        );
        variable.is_const = is_const;
        let id = self.program.add_variable(variable);
        self.program.register_local(id);

        if parameter {
            if let Some(function) = self.program.current_function {
                self.program.function_mut(function).params.push(id);
            }
            return Ok(());
        }

        self.advance_or("Expected ';' or '=', not EOF.")?;
        match self.current().kind {
            TokenKind::Semicolon => {
                if is_const {
                    return Err(self.syntax_error_at(
                        format!("Constant variable '{}' must be given a value.", name.text),
                        name.trace,
                    ));
                }
                // A bare declaration materializes with the type's default.
                self.program.emit(create(id));
                Ok(())
            }
            TokenKind::Assign => {
                self.advance_or("Expected expression, not EOF.")?;
                match self.parse_rhs(&declared)? {
                    Rhs::Call(callee) => {
                        let returned = self.program.function(callee).return_type.clone();
                        if !declared.equals(&returned) {
                            return Err(self.type_mismatch(
                                UseCase::Assignment,
                                &declared,
                                &returned.describe(),
                                name.trace,
                            ));
                        }
                        self.program.emit(create(id));
                        self.program.emit(store_return(id));
                    }
                    Rhs::Value(value) => {
                        self.verify_type(&declared, &value, UseCase::Assignment, name.trace)?;
                        self.program.emit(create_with(id, value));
                    }
                }
                self.expect(TokenKind::Semicolon, "Expected ';'.")?;
                Ok(())
            }
            _ => Err(self.syntax_error("Expected ';' or '='.")),
        }
    }

    /// `name = value;` for an existing variable. The cursor is on `=`.
    fn parse_assignment(&mut self, name: &Token) -> ParseResult<()> {
        let id = self.resolve_assignable(name)?;
        self.advance_or("Expected expression, not EOF.")?;
        let declared = self.program.variable(id).declared_type.clone();
        match self.parse_rhs(&declared)? {
            Rhs::Call(callee) => {
                let returned = self.program.function(callee).return_type.clone();
                if !declared.equals(&returned) {
                    return Err(self.type_mismatch(
                        UseCase::Assignment,
                        &declared,
                        &returned.describe(),
                        name.trace,
                    ));
                }
                self.program.emit(store_return(id));
            }
            Rhs::Value(value) => {
                self.verify_type(&declared, &value, UseCase::Assignment, name.trace)?;
                self.program.emit(set(id, value));
            }
        }
        self.expect(TokenKind::Semicolon, "Expected ';'.")?;
        Ok(())
    }

    /// `name += value;` and friends, staged through a scratch register.
    /// The cursor is on the compound operator.
    fn parse_compound_assignment(&mut self, name: &Token) -> ParseResult<()> {
        let id = self.resolve_assignable(name)?;
        let op_token = self.current().clone();
        let Some(op) = char::from_u32(op_token.info as u32).and_then(MathOp::from_char) else {
            return Err(self.syntax_error("Unexpected token."));
        };

        let declared = self.program.variable(id).declared_type.clone();
        let int_type = TypeInfo::new(type_ids::INT);
        if !declared.equals(&int_type) {
            return Err(self.syntax_error_at(
                format!(
                    "Compound assignment needs an 'int' variable, '{}' is '{}'.",
                    name.text,
                    declared.describe()
                ),
                name.trace,
            ));
        }

        self.advance_or("Expected expression, not EOF.")?;
        let value = self.evaluate_expression()?;
        self.verify_type(&int_type, &value, UseCase::Assignment, op_token.trace)?;

        let register = match self.program.free_register(true) {
            Some(register) => register,
            None => self.program.make_register(true, false),
        };
        self.program.register_mut(register).vacant = false;
        self.program.emit(occupy(register, RbcValue::Variable(id)));
        self.program.emit(operate(register, value, op));
        self.program.emit(set(id, RbcValue::Register(register)));
        self.program.register_mut(register).free();

        self.expect(TokenKind::Semicolon, "Expected ';'.")?;
        Ok(())
    }

    /// `root.member[0] = value;`. The cursor is on the root name. Paths
    /// write straight into storage; their contents are not statically
    /// tracked, so the right side only gets the checks its own parse does.
    fn parse_path_assignment(&mut self) -> ParseResult<()> {
        let root = self.current().clone();
        let path = self.parse_access_path()?;
        if self.program.variable(path.variable).is_const {
            return Err(self.syntax_error_at(
                format!("Cannot modify constant variable '{}'.", root.text),
                root.trace,
            ));
        }

        self.advance_or("Expected '=', not EOF.")?;
        match self.current().kind {
            TokenKind::Assign => {}
            TokenKind::VarOperator => {
                return Err(self.unsupported_error(
                    "Compound assignment is not supported on member or index access.",
                ));
            }
            _ => return Err(self.syntax_error("Expected '='.")),
        }

        self.advance_or("Expected expression, not EOF.")?;
        let value = self.evaluate_expression()?;
        self.program
            .emit(Instruction::with(Opcode::Save, [RbcValue::Path(path), value]));
        self.expect(TokenKind::Semicolon, "Expected ';'.")?;
        Ok(())
    }

    fn resolve_assignable(&self, name: &Token) -> ParseResult<crate::ir::VariableId> {
        let Some(id) = self.program.find_variable(&name.text) else {
            return Err(self.syntax_error_at(
                format!("Unknown variable '{}'.", name.text),
                name.trace,
            ));
        };
        if self.program.variable(id).is_const {
            return Err(self.syntax_error_at(
                format!("Cannot reassign constant variable '{}'.", name.text),
                name.trace,
            ));
        }
        Ok(id)
    }

    /// The right side of `=`: a list literal, an object literal, a call,
    /// or an expression. Ends with the cursor on the token after the
    /// value, which for well-formed input is the `;`.
    fn parse_rhs(&mut self, expected: &TypeInfo) -> ParseResult<Rhs> {
        match self.current().kind {
            TokenKind::LBracket => {
                let list = self.parse_list(expected.element_type())?;
                self.advance_or("Expected ';', not EOF.")?;
                Ok(Rhs::Value(RbcValue::List(list)))
            }
            TokenKind::LBrace => {
                let object = self.parse_inline_object()?;
                self.advance_or("Expected ';', not EOF.")?;
                Ok(Rhs::Value(RbcValue::Object(object)))
            }
            TokenKind::Word
                if self.follows(TokenKind::LParen)
                    || self.follows(TokenKind::Lt)
                    || self.follows(TokenKind::ModuleAccess) =>
            {
                let callee = self.parse_any_call(false)?;
                self.advance_or("Expected ';', not EOF.")?;
                Ok(Rhs::Call(callee))
            }
            _ => Ok(Rhs::Value(self.evaluate_expression()?)),
        }
    }

    /// `[a, b, c]`. The cursor is on `[` and ends on `]`. Elements are
    /// checked against the declared element type when the list value is
    /// verified, not here.
    fn parse_list(&mut self, element_type: TypeInfo) -> ParseResult<RbcList> {
        let mut values = Vec::new();
        loop {
            self.advance_or("Expected ']', not EOF.")?;
            if self.current().kind == TokenKind::RBracket {
                break;
            }
            values.push(self.evaluate_expression()?);
            match self.current().kind {
                TokenKind::Comma => continue,
                TokenKind::RBracket => break,
                _ => return Err(self.syntax_error("Expected ',' or ']'.")),
            }
        }
        Ok(RbcList {
            element_type,
            values,
        })
    }

    /// `{name: constant, ...}`. The cursor is on `{` and ends on `}`. The
    /// literal becomes an anonymous object shape that is checked against
    /// the declared type by `verify_type`.
    fn parse_inline_object(&mut self) -> ParseResult<ObjectId> {
        let mut object = ObjectType::new("", self.program.scope_depth, -1);
        loop {
            self.advance_or("Unclosed object literal.")?;
            if self.current().kind == TokenKind::RBrace {
                break;
            }
            self.expect(TokenKind::Word, "Expected a member name.")?;
            let member = self.current().clone();
            if object.members.contains_key(&member.text) {
                return Err(self.syntax_error_at(
                    format!("Duplicate member '{}'.", member.text),
                    member.trace,
                ));
            }
            self.advance_or("Expected ':', not EOF.")?;
            self.expect(TokenKind::Colon, "Expected ':' after the member name.")?;
            self.advance_or("Expected expression, not EOF.")?;
            let constant = self.constant_expression()?;
            let type_info = TypeInfo::new(constant.kind.type_id());
            object.members.insert(
                member.text,
                ObjectMember {
                    type_info,
                    decorator: MemberDecorator::Required,
                    value: Some(RbcValue::Constant(constant)),
                },
            );
            match self.current().kind {
                TokenKind::Comma => continue,
                TokenKind::RBrace => break,
                _ => return Err(self.syntax_error("Expected ',' or '}'.")),
            }
        }
        Ok(self.program.add_object(object))
    }

    /// Parses and folds an expression that must land on a single literal.
    /// Ends on the expression's terminator.
    fn constant_expression(&mut self) -> ParseResult<RbcConstant> {
        let site = self.current().trace;
        let mut tree = self.parse_expression()?;
        self.fold_expression(&mut tree)?;
        let constant = tree
            .as_leaf()
            .and_then(RbcConstant::from_token)
            .filter(|constant| constant.kind != ConstantKind::Word);
        match constant {
            Some(constant) => Ok(constant),
            None => Err(self.syntax_error_at("Expected a constant value.", site)),
        }
    }

    // -- Calls -------------------------------------------------------------

    /// A call statement or call value, starting on the callee's first
    /// word. Walks `a::b::name` chains, applies explicit generic
    /// arguments, stages parameters and emits the call. Ends on `;` when
    /// `terminated`, otherwise on the closing `)`.
    pub(super) fn parse_any_call(&mut self, terminated: bool) -> ParseResult<FunctionId> {
        if self.follows(TokenKind::ModuleAccess) {
            let first = self.current().clone();
            let Some(mut module) = self.program.module_table.get(&first.text).copied() else {
                return Err(self.syntax_error_at("Unknown module name.", first.trace));
            };
            loop {
                self.advance();
                self.advance_or("Expected a function name, not EOF.")?;
                self.expect(TokenKind::Word, "Expected a function name.")?;
                if !self.follows(TokenKind::ModuleAccess) {
                    return self.parse_function_call(Some(module), terminated);
                }
                let name = self.current().clone();
                let Some(child) = self.program.module(module).children.get(&name.text).copied()
                else {
                    return Err(self.syntax_error_at("Unknown module name.", name.trace));
                };
                module = child;
            }
        }
        self.parse_function_call(None, terminated)
    }

    /// The tail of a call once the owning module (if any) is known. The
    /// cursor is on the function name.
    fn parse_function_call(
        &mut self,
        from_module: Option<ModuleId>,
        terminated: bool,
    ) -> ParseResult<FunctionId> {
        let name = self.current().clone();

        let mut type_args = Vec::new();
        if self.follows(TokenKind::Lt) {
            self.advance();
            loop {
                self.advance_or("Expected a type, not EOF.")?;
                type_args.push(self.parse_type()?);
                self.advance_or("Expected '>' or ',', not EOF.")?;
                match self.current().kind {
                    TokenKind::Comma => continue,
                    TokenKind::Gt => break,
                    _ => return Err(self.syntax_error("Expected '>' or ','.")),
                }
            }
        }

        let callee = self.resolve_callee(&name, from_module)?;
        let target = if self.program.function(callee).is_generic() {
            let expected = self
                .program
                .function(callee)
                .generics
                .as_ref()
                .map_or(0, |generics| generics.names.len());
            if type_args.len() != expected {
                return Err(self.syntax_error_at(
                    format!(
                        "Generic function '{}' takes {} type argument(s), found {}.",
                        name.text,
                        expected,
                        type_args.len()
                    ),
                    name.trace,
                ));
            }
            self.instantiate_generic(callee, &name, type_args)?
        } else {
            if !type_args.is_empty() {
                return Err(self.syntax_error_at(
                    format!("Function '{}' is not generic.", name.text),
                    name.trace,
                ));
            }
            callee
        };

        if Some(target) == self.program.current_function
            || self.program.function_stack.contains(&target)
        {
            return Err(self.syntax_error_at(
                "Functions cannot call themselves; recursion is not supported.",
                name.trace,
            ));
        }

        // Plain functions are addressed by name; nested functions and
        // generic variations are not findable by name alone and ride as
        // opaque handles.
        let target_ref = self.program.function(target);
        let callee_value = if target_ref.parent.is_some() || target_ref.bound_generics.is_some() {
            RbcValue::Function(target)
        } else {
            RbcValue::Constant(
                RbcConstant::new(ConstantKind::Word, name.text.clone()).with_trace(name.trace),
            )
        };

        self.advance_or("Expected '(', not EOF.")?;
        self.expect(TokenKind::LParen, "Expected '('.")?;

        let params = self.program.function(target).params.clone();
        let mut staged = 0usize;
        loop {
            self.advance_or("Expected ')', not EOF.")?;
            if self.current().kind == TokenKind::RParen {
                break;
            }
            if staged >= params.len() {
                return Err(self.syntax_error_at(
                    format!(
                        "Function '{}' takes {} argument(s).",
                        name.text,
                        params.len()
                    ),
                    name.trace,
                ));
            }
            let site = self.current().trace;
            let value = self.evaluate_expression()?;
            let param = params[staged];
            let param_type = self.program.variable(param).declared_type.clone();
            self.verify_type(&param_type, &value, UseCase::Parameter, site)?;

            let param_name = self.program.variable(param).name.clone();
            let mut push = vec![
                callee_value.clone(),
                RbcValue::Constant(RbcConstant::new(ConstantKind::Word, param_name)),
                value,
            ];
            if let Some(module) = from_module {
                push.push(RbcValue::Module(module));
            }
            self.program.emit(Instruction::with(Opcode::Push, push));
            staged += 1;

            match self.current().kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => break,
                _ => return Err(self.syntax_error("Expected ',' or ')'.")),
            }
        }
        if staged < params.len() {
            let missing = self.program.variable(params[staged]).name.clone();
            return Err(self.syntax_error_at(
                format!(
                    "Missing argument '{}' for function '{}'.",
                    missing, name.text
                ),
                name.trace,
            ));
        }

        let mut call = vec![callee_value];
        if let Some(module) = from_module {
            call.push(RbcValue::Module(module));
        }
        self.program.emit(Instruction::with(Opcode::Call, call));

        // Native handlers consume their staged arguments themselves.
        if !self.program.function(target).is_native() {
            for _ in 0..staged {
                self.program.emit(Instruction::new(Opcode::Pop));
            }
        }

        if terminated {
            self.advance_or("Expected ';', not EOF.")?;
            self.expect(TokenKind::Semicolon, "Expected ';'.")?;
        }
        Ok(target)
    }

    /// Callee lookup order: children of the current function, children of
    /// each enclosing function, the current module's functions, then
    /// top-level functions.
    fn resolve_callee(
        &self,
        name: &Token,
        from_module: Option<ModuleId>,
    ) -> ParseResult<FunctionId> {
        if let Some(module) = from_module {
            return self
                .program
                .module(module)
                .functions
                .get(&name.text)
                .copied()
                .ok_or_else(|| {
                    self.syntax_error_at(
                        format!(
                            "Unknown function '{}' in module '{}'.",
                            name.text,
                            self.program.module(module).name
                        ),
                        name.trace,
                    )
                });
        }
        // Functions still being parsed are not in any table yet; matching
        // one by name is what trips the recursion check.
        if let Some(current) = self.program.current_function {
            if self.program.function(current).name == name.text {
                return Ok(current);
            }
            if let Some(child) = self.program.function(current).children.get(&name.text) {
                return Ok(*child);
            }
        }
        for enclosing in self.program.function_stack.iter().rev() {
            if self.program.function(*enclosing).name == name.text {
                return Ok(*enclosing);
            }
            if let Some(child) = self.program.function(*enclosing).children.get(&name.text) {
                return Ok(*child);
            }
        }
        if let Some(module) = self.program.current_module {
            if let Some(function) = self.program.module(module).functions.get(&name.text) {
                return Ok(*function);
            }
        }
        self.program
            .function_table
            .get(&name.text)
            .copied()
            .ok_or_else(|| {
                self.syntax_error_at(format!("Unknown function '{}'.", name.text), name.trace)
            })
    }

    /// Finds or builds the variation of a generic function for one tuple
    /// of type arguments. A new variation re-parses the recorded body with
    /// the placeholders bound; the parse position and function context are
    /// saved around the replay.
    fn instantiate_generic(
        &mut self,
        callee: FunctionId,
        name: &Token,
        type_args: Vec<TypeInfo>,
    ) -> ParseResult<FunctionId> {
        let Some(generics) = self.program.function(callee).generics.clone() else {
            return Err(self.syntax_error_at(
                format!("Function '{}' is not generic.", name.text),
                name.trace,
            ));
        };
        if let Some(existing) = generics.variations.get(&type_args) {
            return Ok(*existing);
        }

        let variation = self.program.specialize_function(callee, &type_args);
        // Memoized before the replay so a self-call inside the body finds
        // the variation and trips the recursion check instead of looping.
        if let Some(generics) = &mut self.program.function_mut(callee).generics {
            generics.variations.insert(type_args.clone(), variation);
        }

        let saved_fragment = self.fragment;
        let saved_at = self.at;
        let saved_depth = self.program.scope_depth;
        let saved_function = self.program.current_function;
        let saved_last = self.program.last_scope;
        let saved_names = std::mem::take(&mut self.program.generic_names);
        let saved_bindings = std::mem::take(&mut self.program.generic_bindings);

        for (index, placeholder) in generics.names.iter().enumerate() {
            self.program.generic_names.insert(placeholder.clone(), index);
        }
        self.program.generic_bindings = type_args;
        self.program.current_function = Some(variation);
        self.program.scope_depth = self.program.function(variation).scope + 1;
        self.fragment = generics.fragment;
        self.at = generics.body.start;

        let mut replay = || -> ParseResult<()> {
            while self.at < generics.body.end {
                self.parse_statement()?;
                self.at += 1;
            }
            Ok(())
        };
        let outcome = replay();

        self.fragment = saved_fragment;
        self.at = saved_at;
        self.program.scope_depth = saved_depth;
        self.program.current_function = saved_function;
        self.program.last_scope = saved_last;
        self.program.generic_names = saved_names;
        self.program.generic_bindings = saved_bindings;

        if let Err(mut error) = outcome {
            error
                .notes
                .push(format!("while instantiating generic function '{}'", name.text));
            return Err(error);
        }
        Ok(variation)
    }

    // -- Declarations ------------------------------------------------------

    /// `module name {`. Modules do not change the scope depth; their
    /// braces only bracket what belongs to them.
    fn parse_module_declaration(&mut self) -> ParseResult<()> {
        if self.program.current_function.is_some() {
            return Err(self.syntax_error("Modules are not allowed in a function body."));
        }
        self.advance_or("Expected module, not EOF.")?;
        self.expect(TokenKind::Word, "Expected a module name.")?;
        let name = self.current().clone();

        let exists = match self.program.current_module {
            Some(parent) => self.program.module(parent).children.contains_key(&name.text),
            None => self.program.module_table.contains_key(&name.text),
        };
        if exists {
            return Err(self.syntax_error_at("Module already exists with that name.", name.trace));
        }

        self.advance_or("Expected '{', not EOF.")?;
        self.expect(TokenKind::LBrace, "Expected '{'.")?;

        let path = match self.program.current_module {
            Some(parent) => {
                let mut path = self.program.module(parent).path.clone();
                path.push(name.text.clone());
                path
            }
            None => vec![name.text.clone()],
        };
        let id = self.program.add_module(Module::new(name.text.clone(), path));
        match self.program.current_module {
            Some(parent) => {
                self.program
                    .module_mut(parent)
                    .children
                    .insert(name.text.clone(), id);
                self.program.module_stack.push(parent);
            }
            None => {
                self.program.module_table.insert(name.text.clone(), id);
            }
        }
        self.program.current_module = Some(id);
        self.program.scope_stack.push(ScopeKind::Module);
        Ok(())
    }

    /// `method: type name(params) decorators {` and the bodyless `;` form.
    fn parse_method_declaration(&mut self) -> ParseResult<()> {
        self.advance_or("Expected name, not EOF.")?;
        self.expect(TokenKind::Colon, "Missing function return type.")?;
        self.advance_or("Missing function return type.")?;

        let mut generic_names = Vec::new();
        if self.current().kind == TokenKind::Lt {
            if self.program.current_function.is_some() {
                return Err(self.syntax_error("Nested functions cannot be generic."));
            }
            self.parse_generic_names()?;
            generic_names = self.program.generic_names.keys().cloned().collect();
            self.advance_or("Missing function return type.")?;
        }

        let return_type = self.parse_type()?;
        if return_type.type_id == type_ids::NULL && !return_type.is_generic {
            return Err(self.syntax_error(
                "A function's return type cannot be marked as null, use 'void' instead.",
            ));
        }

        self.advance_or("Expected name, not EOF.")?;
        self.expect(TokenKind::Word, "Invalid function name.")?;
        let name = self.current().clone();
        if name.text.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(self.syntax_error_at(
                "Function names cannot have uppercase letters due to how minecraft functions \
                 are implemented. Only use lower case letters and underscores.",
                name.trace,
            ));
        }

        let duplicate = match (self.program.current_function, self.program.current_module) {
            (Some(function), _) => self.program.function(function).children.contains_key(&name.text),
            (None, Some(module)) => self.program.module(module).functions.contains_key(&name.text),
            (None, None) => self.program.function_table.contains_key(&name.text),
        };
        if duplicate {
            let in_module =
                self.program.current_function.is_none() && self.program.current_module.is_some();
            return Err(if in_module {
                self.syntax_error_at("Function already exists in module.", name.trace)
            } else {
                self.syntax_error_at("Function already exists.", name.trace)
            });
        }

        self.advance_or("Expected function definition, not EOF.")?;
        self.expect(TokenKind::LParen, "Expected '('.")?;

        let mut function = Function::new(name.text.clone(), return_type);
        function.scope = self.program.scope_depth;
        if let Some(module) = self.program.current_module {
            function.module_path = self.program.module(module).path.clone();
        }
        let id = self.program.add_function(function);

        if let Some(current) = self.program.current_function {
            self.program.function_stack.push(current);
        }
        self.program.current_function = Some(id);
        self.program.scope_stack.push(ScopeKind::Function);
        self.program.scope_depth += 1;

        // Parameters are written name-first, `add(a: int, b: int)`.
        loop {
            self.advance_or("Unexpected EOF.")?;
            match self.current().kind {
                TokenKind::RParen => break,
                TokenKind::Word => {
                    let param = self.current().clone();
                    self.advance_or("Unexpected EOF.")?;
                    self.expect(TokenKind::Colon, "Expected ':' after the parameter name.")?;
                    self.parse_declaration(&param, true, false)?;
                    self.advance_or("Expected ')' or ',', not EOF.")?;
                    match self.current().kind {
                        TokenKind::Comma => continue,
                        TokenKind::RParen => break,
                        _ => return Err(self.syntax_error("Expected ')' or ','.")),
                    }
                }
                _ => return Err(self.syntax_error("Unexpected token.")),
            }
        }

        self.parse_function_decorators(id)?;

        match self.current().kind {
            TokenKind::LBrace => {
                if generic_names.is_empty() {
                    // The body is parsed by the main loop inside the scope
                    // opened above.
                    return Ok(());
                }
                self.record_generic_body(id, generic_names)
            }
            TokenKind::Semicolon => {
                if !generic_names.is_empty() {
                    return Err(self.syntax_error("Generic functions must have a body."));
                }
                self.program.function_mut(id).has_body = false;
                self.close_scope()
            }
            _ => Err(self.syntax_error("Expected function definition or semi-colon.")),
        }
    }

    /// Records the token range of a generic body instead of parsing it.
    /// The cursor is on `{`; it ends on the matching `}` with the
    /// function's scope closed.
    fn record_generic_body(&mut self, id: FunctionId, names: Vec<String>) -> ParseResult<()> {
        let open = self.at;
        let mut depth = 0usize;
        let mut close = None;
        for (index, token) in self.tokens().iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(index);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            return Err(self.eof_error("Unclosed function body."));
        };

        self.program.function_mut(id).generics = Some(Generics {
            names,
            fragment: self.fragment,
            body: open + 1..close,
            variations: IndexMap::new(),
        });
        self.program.generic_names.clear();

        self.at = close;
        self.close_scope()
    }

    /// `obj name { members }`. Members carry a decorator, a type and an
    /// optional constant default.
    fn parse_object_declaration(&mut self) -> ParseResult<()> {
        self.advance_or("Unexpected EOF.")?;
        if self.current().kind != TokenKind::Word {
            return Err(self.syntax_error("Unexpected keyword."));
        }
        let name = self.current().clone();
        if self.program.object_table.contains_key(&name.text) {
            return Err(self.syntax_error_at("Object with name already exists.", name.trace));
        }
        self.advance_or("Expected '{', not EOF.")?;
        self.expect(TokenKind::LBrace, "Expected '{'.")?;

        let type_id = type_ids::TYPE_CARET_START + self.program.object_table.len() as i32;
        let mut object = ObjectType::new(name.text.clone(), self.program.scope_depth, type_id);

        loop {
            self.advance_or("Unclosed object declaration.")?;
            if self.current().kind == TokenKind::RBrace {
                break;
            }
            let decorator = match self.current().kind {
                TokenKind::Optional => {
                    self.advance_or("Expected a member name, not EOF.")?;
                    MemberDecorator::Optional
                }
                TokenKind::Required => {
                    self.advance_or("Expected a member name, not EOF.")?;
                    MemberDecorator::Required
                }
                TokenKind::Seperate => {
                    self.advance_or("Expected a member name, not EOF.")?;
                    MemberDecorator::Seperate
                }
                _ => MemberDecorator::Required,
            };
            self.expect(TokenKind::Word, "Expected a member name.")?;
            let member = self.current().clone();
            if object.members.contains_key(&member.text) {
                return Err(self.syntax_error_at(
                    format!("Duplicate member '{}'.", member.text),
                    member.trace,
                ));
            }
            self.advance_or("Expected ':', not EOF.")?;
            self.expect(TokenKind::Colon, "Expected ':' after the member name.")?;
            self.advance_or("Expected a type, not EOF.")?;
            let type_info = self.parse_type()?;

            let mut value = None;
            self.advance_or("Expected ';', not EOF.")?;
            if self.current().kind == TokenKind::Assign {
                self.advance_or("Expected expression, not EOF.")?;
                let constant = self.constant_expression()?;
                self.verify_type(
                    &type_info,
                    &RbcValue::Constant(constant.clone()),
                    UseCase::Assignment,
                    member.trace,
                )?;
                value = Some(RbcValue::Constant(constant));
            }
            self.expect(TokenKind::Semicolon, "Expected ';'.")?;

            object.members.insert(
                member.text,
                ObjectMember {
                    type_info,
                    decorator,
                    value,
                },
            );
        }

        let id = self.program.add_object(object);
        self.program.object_table.insert(name.text, id);
        Ok(())
    }

    fn parse_const_declaration(&mut self) -> ParseResult<()> {
        self.advance_or("Expected a variable name, not EOF.")?;
        self.expect(TokenKind::Word, "Expected a variable name after 'const'.")?;
        let name = self.current().clone();
        self.advance_or("Expected ':', not EOF.")?;
        self.parse_variable(&name, true)
    }

    // -- Control flow ------------------------------------------------------

    /// `if (clauses) {` and `elif (clauses) {`. Each clause becomes its
    /// own conditional instruction; continuation clauses carry a leading
    /// `and`/`or` word so the backend can fold them into the preceding
    /// comparison register.
    fn parse_condition(&mut self, elif: bool) -> ParseResult<()> {
        if elif && !matches!(self.program.last_scope, ScopeKind::If | ScopeKind::Elif) {
            return Err(self.syntax_error("elif blocks can only be used after an if block."));
        }

        self.advance_or("Expected '(', not EOF.")?;
        self.expect(TokenKind::LParen, "Expected '('.")?;

        let mut combiner: Option<&'static str> = None;
        loop {
            self.advance_or("Expected expression, not EOF.")?;
            let inverted = if self.current().kind == TokenKind::Not {
                self.advance_or("Expected expression, not EOF.")?;
                true
            } else {
                false
            };

            let mut left = self.parse_expression()?;
            self.fold_expression(&mut left)?;

            let params = match self.current().kind {
                TokenKind::RParen | TokenKind::And | TokenKind::Or => {
                    vec![self.lower_expression(&left)?]
                }
                TokenKind::CmpEq | TokenKind::CmpNe => {
                    let negated = self.current().kind == TokenKind::CmpNe;
                    let op = self.current().clone();
                    self.advance_or("Expected expression, not EOF.")?;
                    let mut right = self.parse_expression()?;
                    self.fold_expression(&mut right)?;

                    match self.fold_comparison(&left, &right, negated) {
                        Some(truth) => {
                            self.warn("Comparing two constant values is not good practice.");
                            vec![RbcValue::int(i64::from(truth))]
                        }
                        None => {
                            let op_word = if negated { "!=" } else { "==" };
                            vec![
                                self.lower_expression(&left)?,
                                RbcValue::Constant(
                                    RbcConstant::new(ConstantKind::Word, op_word)
                                        .with_trace(op.trace),
                                ),
                                self.lower_expression(&right)?,
                            ]
                        }
                    }
                }
                _ => return Err(self.syntax_error("Unexpected token.")),
            };

            self.emit_clause(elif, inverted, combiner, params);

            match self.current().kind {
                TokenKind::RParen => break,
                TokenKind::And => combiner = Some("and"),
                TokenKind::Or => combiner = Some("or"),
                _ => return Err(self.syntax_error("Unexpected token.")),
            }
        }

        self.advance_or("Unexpected EOF.")?;
        self.expect(TokenKind::LBrace, "Expected '{'.")?;
        self.program
            .scope_stack
            .push(if elif { ScopeKind::Elif } else { ScopeKind::If });
        self.program.scope_depth += 1;
        Ok(())
    }

    /// When both comparison sides folded to literals, the result is known
    /// now. Returns the truth value, or None when either side is runtime.
    fn fold_comparison(
        &self,
        left: &super::expr::ExprTree,
        right: &super::expr::ExprTree,
        negated: bool,
    ) -> Option<bool> {
        let left = left.as_leaf().and_then(RbcConstant::from_token)?;
        let right = right.as_leaf().and_then(RbcConstant::from_token)?;
        if left.kind == ConstantKind::Word || right.kind == ConstantKind::Word {
            return None;
        }
        let equal = constants_equal(&left, &right);
        Some(equal != negated)
    }

    fn emit_clause(
        &mut self,
        elif: bool,
        inverted: bool,
        combiner: Option<&'static str>,
        params: Vec<RbcValue>,
    ) {
        let opcode = match (elif, inverted) {
            (false, false) => Opcode::If,
            (false, true) => Opcode::Nif,
            (true, false) => Opcode::Elif,
            (true, true) => Opcode::Nelif,
        };
        let mut all = Vec::with_capacity(params.len() + 1);
        if let Some(word) = combiner {
            all.push(RbcValue::Constant(RbcConstant::new(ConstantKind::Word, word)));
        }
        all.extend(params);
        self.program.emit(Instruction::with(opcode, all));
    }

    fn parse_else(&mut self) -> ParseResult<()> {
        if !matches!(self.program.last_scope, ScopeKind::If | ScopeKind::Elif) {
            return Err(
                self.syntax_error("Else and elif blocks can only be used after an if block.")
            );
        }
        self.advance_or("Expected else block.")?;
        self.expect(TokenKind::LBrace, "Expected else block.")?;
        self.program.emit(Instruction::new(Opcode::Else));
        self.program.scope_stack.push(ScopeKind::Else);
        self.program.scope_depth += 1;
        Ok(())
    }

    fn parse_return(&mut self) -> ParseResult<()> {
        let Some(function) = self.program.current_function else {
            return Err(self.syntax_error("Return statements can only exist inside a function."));
        };
        let return_type = self.program.function(function).return_type.clone();
        if !self.advance() {
            return Err(self.syntax_error("Expected expression."));
        }

        match self.current().kind {
            TokenKind::Semicolon => {
                if return_type.type_id != type_ids::VOID {
                    return Err(self.syntax_error(
                        "Cannot return nothing to a function with a return type of non-void.",
                    ));
                }
                self.program.emit(Instruction::new(Opcode::Ret));
                Ok(())
            }
            TokenKind::Word
                if self.follows(TokenKind::LParen)
                    || self.follows(TokenKind::Lt)
                    || self.follows(TokenKind::ModuleAccess) =>
            {
                // `return f();`: the call already filled the return slots,
                // so only a bare marker is needed.
                let site = self.current().trace;
                let callee = self.parse_any_call(false)?;
                let returned = self.program.function(callee).return_type.clone();
                if !return_type.equals(&returned) {
                    return Err(self.type_mismatch(
                        UseCase::Return,
                        &return_type,
                        &returned.describe(),
                        site,
                    ));
                }
                self.program.emit(Instruction::new(Opcode::Ret));
                self.advance_or("Expected ';', not EOF.")?;
                self.expect(TokenKind::Semicolon, "Expected ';'.")?;
                Ok(())
            }
            _ => {
                let site = self.current().trace;
                let value = self.evaluate_expression()?;
                self.verify_type(&return_type, &value, UseCase::Return, site)?;
                self.program.emit(Instruction::with(Opcode::Ret, [value]));
                self.expect(TokenKind::Semicolon, "Expected ';'.")?;
                Ok(())
            }
        }
    }

    // -- Scope close -------------------------------------------------------

    /// Handles `}` (and the `;` of a bodyless function). Pops the scope,
    /// finalizes what it closed and emits block-end code.
    pub(super) fn close_scope(&mut self) -> ParseResult<()> {
        let Some(kind) = self.program.scope_stack.pop() else {
            return Err(self.syntax_error("Unmatched closing bracket."));
        };
        self.program.last_scope = kind;

        match kind {
            ScopeKind::Module => {
                self.program.current_module = self.program.module_stack.pop();
            }
            ScopeKind::Function => {
                let Some(id) = self.program.current_function else {
                    return Err(self.syntax_error("Unmatched closing bracket."));
                };
                let name = self.program.function(id).name.clone();
                if let Some(parent) = self.program.function_stack.pop() {
                    self.program.function_mut(id).parent = Some(parent);
                    self.program.function_mut(parent).children.insert(name, id);
                    self.program.current_function = Some(parent);
                } else {
                    match self.program.current_module {
                        Some(module) => {
                            self.program.module_mut(module).functions.insert(name, id);
                        }
                        None => {
                            self.program.function_table.insert(name, id);
                        }
                    }
                    self.program.current_function = None;
                }
                self.program.generic_names.clear();
            }
            ScopeKind::If | ScopeKind::Elif => {
                // The block end is deferred while the chain continues.
                let next = self.peek(1).map(|token| token.kind);
                if next != Some(TokenKind::Else) && next != Some(TokenKind::Elif) {
                    self.program.emit(Instruction::new(Opcode::EndIf));
                }
            }
            ScopeKind::Else => {
                let next = self.peek(1).map(|token| token.kind);
                if next == Some(TokenKind::Else) || next == Some(TokenKind::Elif) {
                    return Err(
                        self.syntax_error("Else and elif blocks cannot follow an else block.")
                    );
                }
                self.program.emit(Instruction::new(Opcode::EndIf));
            }
            ScopeKind::Plain => {
                self.program.emit(Instruction::new(Opcode::Dec));
            }
        }

        if kind != ScopeKind::Module {
            self.program.scope_depth -= 1;
            if self.program.scope_depth < 0 {
                return Err(self.syntax_error("Unmatched closing bracket."));
            }
        }
        Ok(())
    }
}

fn constants_equal(a: &RbcConstant, b: &RbcConstant) -> bool {
    if let (Some(left), Some(right)) = (a.as_int(), b.as_int()) {
        return left == right;
    }
    a.kind == b.kind && a.text == b.text
}

#[cfg(test)]
mod tests {
    use super::super::testing::{parse, parse_ok};
    use crate::ir::{ConstantKind, Decorator, Opcode, RbcValue, ScopeKind};
    use crate::types::type_ids;

    fn opcodes(instructions: &[crate::ir::Instruction]) -> Vec<Opcode> {
        instructions.iter().map(|i| i.op).collect()
    }

    #[test]
    fn function_call_stages_arguments_and_copies_the_return() {
        let outcome = parse_ok(
            "method: int add(a: int, b: int) { return a + b; }\n\
             x: int = add(1, 2);",
        );
        let program = &outcome.program;

        let add = program.function_table["add"];
        assert_eq!(
            opcodes(&program.function(add).instructions),
            [Opcode::Save, Opcode::Math, Opcode::Ret],
        );

        assert_eq!(
            opcodes(&program.global.instructions),
            [
                Opcode::Push,
                Opcode::Push,
                Opcode::Call,
                Opcode::Pop,
                Opcode::Pop,
                Opcode::Create,
                Opcode::SaveRet,
            ],
        );

        // Arguments are staged by parameter name.
        let push = &program.global.instructions[0];
        let name = push.params[1].as_constant().unwrap();
        assert_eq!(name.kind, ConstantKind::Word);
        assert_eq!(name.text, "a");
    }

    #[test]
    fn module_calls_carry_the_module_handle() {
        let outcome = parse_ok(
            "module math { method: int one() { return 1; } }\n\
             y: int = math::one();",
        );
        let program = &outcome.program;
        let math = program.module_table["math"];
        assert!(program.module(math).functions.contains_key("one"));

        let call = program
            .global
            .instructions
            .iter()
            .find(|i| i.op == Opcode::Call)
            .unwrap();
        assert_eq!(call.params.len(), 2);
        assert!(matches!(call.params[1], RbcValue::Module(id) if id == math));
    }

    #[test]
    fn nested_functions_are_called_through_handles() {
        let outcome = parse_ok(
            "method: void outer() {\n\
                 method: int inner() { return 1; }\n\
                 x: int = inner();\n\
             }",
        );
        let program = &outcome.program;
        let outer = program.function_table["outer"];
        let inner = program.function(outer).children["inner"];
        assert_eq!(program.function(inner).parent, Some(outer));

        let call = program
            .function(outer)
            .instructions
            .iter()
            .find(|i| i.op == Opcode::Call)
            .unwrap();
        assert!(matches!(call.params[0], RbcValue::Function(id) if id == inner));
    }

    #[test]
    fn chained_branches_share_one_end_marker() {
        let outcome = parse_ok(
            "x: int = 1;\n\
             if (x == 1) { } elif (x == 2) { } else { }",
        );
        assert_eq!(
            opcodes(&outcome.program.global.instructions),
            [
                Opcode::Create,
                Opcode::If,
                Opcode::Elif,
                Opcode::Else,
                Opcode::EndIf,
            ],
        );
    }

    #[test]
    fn continuation_clauses_lead_with_their_combiner() {
        let outcome = parse_ok(
            "x: int = 1;\n\
             y: int = 2;\n\
             if (x == 1 and y == 2) { }",
        );
        let clauses: Vec<_> = outcome
            .program
            .global
            .instructions
            .iter()
            .filter(|i| i.op == Opcode::If)
            .collect();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].params.len(), 3);
        assert_eq!(clauses[1].params.len(), 4);
        assert_eq!(clauses[1].params[0].as_constant().unwrap().text, "and");
    }

    #[test]
    fn constant_comparisons_fold_and_warn() {
        let outcome = parse_ok("if (1 == 1) { }");
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].to_string().contains("not good practice"));

        let clause = outcome
            .program
            .global
            .instructions
            .iter()
            .find(|i| i.op == Opcode::If)
            .unwrap();
        assert_eq!(clause.params.len(), 1);
        assert_eq!(clause.params[0].as_constant().unwrap().as_int(), Some(1));
    }

    #[test]
    fn inverted_conditions_use_the_negated_opcode() {
        let outcome = parse_ok(
            "x: int = 1;\n\
             if (not x) { }",
        );
        assert!(outcome
            .program
            .global
            .instructions
            .iter()
            .any(|i| i.op == Opcode::Nif));
    }

    #[test]
    fn elif_needs_an_if_directly_before_it() {
        let error = parse("elif (1) { }").unwrap_err();
        assert!(error.to_string().contains("after an if block"));

        // A statement between the arms breaks the chain.
        let error = parse(
            "x: int = 1;\n\
             if (x == 1) { }\n\
             y: int = 2;\n\
             elif (x == 2) { }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("after an if block"));
    }

    #[test]
    fn else_cannot_follow_an_else() {
        let error = parse(
            "x: int = 1;\n\
             if (x == 1) { } else { } else { }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("cannot follow an else block"));
    }

    #[test]
    fn constants_reject_reassignment() {
        let error = parse(
            "const limit: int = 10;\n\
             limit = 11;",
        )
        .unwrap_err();
        assert!(error.to_string().contains("constant"));
    }

    #[test]
    fn redeclaring_at_the_same_depth_is_an_error() {
        let error = parse(
            "x: int = 1;\n\
             x: int = 2;",
        )
        .unwrap_err();
        assert!(error.to_string().contains("already exists"));
    }

    #[test]
    fn deeper_blocks_may_shadow() {
        let outcome = parse_ok(
            "x: int = 1;\n\
             { x: string = \"two\"; }",
        );
        // Both declarations exist; the inner one is a distinct variable.
        assert_eq!(outcome.program.variables.len(), 2);
    }

    #[test]
    fn return_outside_a_function_is_rejected() {
        let error = parse("return 1;").unwrap_err();
        assert!(error.to_string().contains("inside a function"));
    }

    #[test]
    fn non_void_functions_cannot_return_nothing() {
        let error = parse("method: int f() { return; }").unwrap_err();
        assert!(error.to_string().contains("non-void"));
    }

    #[test]
    fn returning_a_call_checks_the_forwarded_type() {
        let outcome = parse_ok(
            "method: int one() { return 1; }\n\
             method: int two() { return one(); }",
        );
        let two = outcome.program.function_table["two"];
        let ops = opcodes(&outcome.program.function(two).instructions);
        assert_eq!(ops.last(), Some(&Opcode::Ret));

        let error = parse(
            "method: string s() { return \"a\"; }\n\
             method: int f() { return s(); }",
        )
        .unwrap_err();
        assert!(error.to_string().contains("Cannot return"));
    }

    #[test]
    fn uppercase_function_names_are_rejected() {
        let error = parse("method: void doThing() { }").unwrap_err();
        assert!(error.to_string().contains("lower case"));
    }

    #[test]
    fn modules_only_hold_functions() {
        let error = parse("module m { x: int = 1; }").unwrap_err();
        assert!(error.to_string().contains("only contain functions"));
    }

    #[test]
    fn modules_do_not_deepen_the_scope() {
        let outcome = parse_ok(
            "module m { method: void f() { x: int = 1; } }\n\
             method: void g() { y: int = 1; }",
        );
        let program = &outcome.program;
        let m = program.module_table["m"];
        let f = program.module(m).functions["f"];
        let g = program.function_table["g"];
        let x = program.function(f).locals["x"];
        let y = program.function(g).locals["y"];
        assert_eq!(program.variable(x).scope, program.variable(y).scope);
    }

    #[test]
    fn generic_variations_are_memoized_per_type_tuple() {
        let outcome = parse_ok(
            "method:<T> T identity(x: T) { return x; }\n\
             a: int = identity<int>(5);\n\
             b: int = identity<int>(6);\n\
             c: string = identity<string>(\"s\");",
        );
        let program = &outcome.program;
        let base = program.function_table["identity"];
        let generics = program.function(base).generics.as_ref().unwrap();
        assert_eq!(generics.variations.len(), 2);

        for (types, variation) in &generics.variations {
            let bound = program.function(*variation).bound_generics.as_ref().unwrap();
            assert_eq!(bound, types);
        }
    }

    #[test]
    fn generic_calls_without_type_arguments_are_rejected() {
        let error = parse(
            "method:<T> T identity(x: T) { return x; }\n\
             a: int = identity(5);",
        )
        .unwrap_err();
        assert!(error.to_string().contains("type argument"));
    }

    #[test]
    fn generic_bodies_are_type_checked_per_instantiation() {
        let error = parse(
            "method:<T> T pick(x: T) { y: int = x; return x; }\n\
             a: string = pick<string>(\"s\");",
        )
        .unwrap_err();
        assert!(error.to_string().contains("Cannot assign"));
        assert!(error
            .notes
            .iter()
            .any(|note| note.contains("instantiating")));
    }

    #[test]
    fn recursion_is_rejected() {
        let error = parse("method: void f() { f(); }").unwrap_err();
        assert!(error.to_string().contains("recursion"));
    }

    #[test]
    fn object_declarations_take_the_next_caret_id() {
        let outcome = parse_ok(
            "obj vec { x: int; optional y: int = 0; }\n\
             obj pair { a: int; b: int; }",
        );
        let program = &outcome.program;
        let vec_id = program.object_table["vec"];
        let pair_id = program.object_table["pair"];
        assert_eq!(program.object(vec_id).type_id, type_ids::TYPE_CARET_START);
        assert_eq!(
            program.object(pair_id).type_id,
            type_ids::TYPE_CARET_START + 1
        );
    }

    #[test]
    fn object_literals_check_against_the_declared_shape() {
        parse_ok(
            "obj vec { x: int; optional y: int = 0; }\n\
             v: vec = {x: 1};",
        );

        let error = parse(
            "obj vec { x: int; optional y: int = 0; }\n\
             v: vec = {y: 2};",
        )
        .unwrap_err();
        assert!(error.to_string().contains("x"));
    }

    #[test]
    fn list_elements_verify_against_the_declared_element_type() {
        let outcome = parse_ok("xs: int[] = [1, 2, 3];");
        let create = &outcome.program.global.instructions[0];
        assert!(matches!(&create.params[1], RbcValue::List(list) if list.values.len() == 3));

        let error = parse("xs: int[] = [1, \"two\"];").unwrap_err();
        assert!(error.to_string().contains("List elements"));
    }

    #[test]
    fn compound_assignment_round_trips_through_a_register() {
        let outcome = parse_ok(
            "x: int = 1;\n\
             x += 2;",
        );
        assert_eq!(
            opcodes(&outcome.program.global.instructions),
            [Opcode::Create, Opcode::Save, Opcode::Math, Opcode::Save],
        );
    }

    #[test]
    fn compound_assignment_requires_an_int_variable() {
        let error = parse(
            "s: string = \"a\";\n\
             s += \"b\";",
        )
        .unwrap_err();
        assert!(error.to_string().contains("'int'"));
    }

    #[test]
    fn path_assignments_save_through_the_access_chain() {
        let outcome = parse_ok(
            "obj vec { x: int; }\n\
             v: vec = {x: 1};\n\
             v.x = 2;",
        );
        let save = outcome
            .program
            .global
            .instructions
            .iter()
            .find(|i| i.op == Opcode::Save)
            .unwrap();
        assert!(matches!(save.params[0], RbcValue::Path(_)));
    }

    #[test]
    fn bodyless_declarations_register_without_code() {
        let outcome = parse_ok("method: void stop() extern;");
        let stop = outcome.program.function_table["stop"];
        let function = outcome.program.function(stop);
        assert!(!function.has_body);
        assert!(function.has_decorator(Decorator::Extern));
        assert!(function.instructions.is_empty());
    }

    #[test]
    fn native_calls_skip_the_argument_teardown() {
        let outcome = parse_ok(
            "method: void msg(m: string) __native__;\n\
             msg(\"hi\");",
        );
        let ops = opcodes(&outcome.program.global.instructions);
        assert!(ops.contains(&Opcode::Call));
        assert!(!ops.contains(&Opcode::Pop));
    }

    #[test]
    fn void_variables_are_rejected() {
        let error = parse("x: void;").unwrap_err();
        assert!(error.to_string().contains("'void'"));
    }

    #[test]
    fn plain_blocks_emit_scope_markers() {
        let outcome = parse_ok("{ x: int = 1; }");
        assert_eq!(
            opcodes(&outcome.program.global.instructions),
            [Opcode::Inc, Opcode::Create, Opcode::Dec],
        );
        assert_eq!(outcome.program.scope_depth, 0);
        assert!(outcome.program.scope_stack.is_empty());
    }

    #[test]
    fn reserved_keywords_report_an_error() {
        let error = parse("while (1) { }").unwrap_err();
        assert!(error.to_string().contains("reserved"));
    }

    #[test]
    fn close_scope_restores_the_enclosing_module() {
        let outcome = parse_ok(
            "module outer { module inner { method: void f() { } } method: void g() { } }",
        );
        let program = &outcome.program;
        let outer = program.module_table["outer"];
        let inner = program.module(outer).children["inner"];
        assert!(program.module(inner).functions.contains_key("f"));
        assert!(program.module(outer).functions.contains_key("g"));
        assert_eq!(program.module(inner).path, ["outer", "inner"]);
        assert_eq!(program.last_scope, ScopeKind::Module);
    }
}
