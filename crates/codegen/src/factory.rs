//! Stateful command emission.
//!
//! The [`CommandFactory`] turns individual byte-code operations into
//! commands while tracking everything that has to stay consistent across a
//! whole program: storage slot assignment, the comparison register pool,
//! the stack of open conditional blocks (every emitted command is wrapped
//! in the guards of the blocks it sits inside), and the parameter
//! variables staged for the pending call.
//!
//! One factory instance lives for the whole compilation; the comparison
//! pool and slot counter deliberately survive across functions since both
//! map onto program-wide runtime structures.

use redscript_parser::ir::{
    AccessPath, ConstantKind, FunctionId, MathOp, Program, RbcValue, RegisterId, VariableId,
};
use redscript_parser::types::type_ids;
use redscript_parser::{Error, ErrorKind};

use crate::command::{Command, CommandKind, Condition};
use crate::error::{CodegenError, CodegenResult};
use crate::templates::{
    self, comparison_objective, comparison_score, operable_objective, operable_score,
    register_path, variable_state, variable_type, variable_value, RETURN_SLOT, RETURN_TYPE_SLOT,
    SCORE_HOLDER, TEMP_OBJECTIVE, TEMP_SLOT,
};

/// Kind of an open conditional block. `Else` and `Elif` invert their
/// comparison register when guarding the commands inside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Else,
    Elif,
}

#[derive(Debug, Clone, Copy)]
struct Block {
    kind: BlockKind,
    comparison: usize,
}

/// One comparison register. `truthy_when_one` records which score value
/// means the condition held; the storage comparison strategy can only
/// observe "the values differed", so its registers carry an inverted sense
/// for equality tests.
#[derive(Debug, Clone, Copy)]
struct ComparisonRegister {
    vacant: bool,
    truthy_when_one: bool,
}

/// Outcome of evaluating one condition clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    /// Known at compile time; no commands were emitted.
    Constant(bool),
    /// Comparison register id holding the runtime outcome.
    Comparison(usize),
}

/// Where a comparison operand lives.
enum Operand {
    /// `<holder> <objective>` of an operable register.
    Score(String),
    /// NBT path under the program storage.
    Storage(String),
    /// Literal text that can be written straight into a command.
    Inline(String),
}

pub struct CommandFactory<'p> {
    pub(crate) program: &'p mut Program,
    namespace: String,
    commands: Vec<Command>,
    blocks: Vec<Block>,
    comparisons: Vec<ComparisonRegister>,
    /// Parameter variables created for the pending call, push order.
    staged: Vec<VariableId>,
    /// Next storage slot; slots mirror indices into the runtime variables
    /// array, so creation order is assignment order.
    slots: u32,
    warnings: Vec<Error>,
}

impl<'p> CommandFactory<'p> {
    pub fn new(program: &'p mut Program, namespace: &str) -> Self {
        CommandFactory {
            program,
            namespace: namespace.to_string(),
            commands: Vec::new(),
            blocks: Vec::new(),
            comparisons: Vec::new(),
            staged: Vec::new(),
            slots: 0,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, kind: ErrorKind) {
        self.warnings.push(Error::new(kind, "", None));
    }

    pub fn take_warnings(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.warnings)
    }

    // -- Emission ----------------------------------------------------------

    /// Wraps `command` in the guards of every open block (innermost first)
    /// and appends it to the current function's stream.
    pub fn add(&mut self, mut command: Command) {
        for block in self.blocks.iter().rev() {
            let sense = self.comparisons[block.comparison].truthy_when_one;
            let invert = match block.kind {
                BlockKind::If => !sense,
                BlockKind::Else | BlockKind::Elif => sense,
            };
            command.conditions.push(Condition::score_matches(
                &comparison_score(block.comparison as u32),
                1,
                invert,
            ));
        }
        self.commands.push(command);
    }

    /// Renders and drains the commands collected for one function.
    pub fn package(&mut self) -> CodegenResult<Vec<String>> {
        if !self.blocks.is_empty() {
            return Err(CodegenError::ByteCode(
                "Unbalanced conditional blocks at end of function. \
                 This error is a bug, flag it on the issue tracker."
                    .into(),
            ));
        }
        if !self.staged.is_empty() {
            return Err(CodegenError::ByteCode(
                "Staged call parameters were never torn down. \
                 This error is a bug, flag it on the issue tracker."
                    .into(),
            ));
        }
        Ok(self.commands.drain(..).map(|cmd| cmd.render()).collect())
    }

    // -- Conditional blocks ------------------------------------------------

    fn reserve_comparison(&mut self) -> usize {
        if let Some(id) = self.comparisons.iter().position(|cmp| cmp.vacant) {
            self.comparisons[id].vacant = false;
            self.comparisons[id].truthy_when_one = true;
            return id;
        }
        self.comparisons.push(ComparisonRegister {
            vacant: false,
            truthy_when_one: true,
        });
        self.comparisons.len() - 1
    }

    pub fn free_comparison(&mut self, id: usize) {
        self.comparisons[id].vacant = true;
    }

    /// Number of comparison registers the program ended up needing.
    pub fn comparison_count(&self) -> usize {
        self.comparisons.len()
    }

    pub fn push_block(&mut self, comparison: usize) {
        self.blocks.push(Block {
            kind: BlockKind::If,
            comparison,
        });
    }

    /// Flips the innermost block into its else form; its guards invert
    /// from here on.
    pub fn rewrite_block_else(&mut self) -> CodegenResult<()> {
        match self.blocks.last_mut() {
            Some(block) => {
                block.kind = BlockKind::Else;
                Ok(())
            }
            None => Err(CodegenError::ByteCode(
                "ELSE without an open conditional block. \
                 This error is a bug, flag it on the issue tracker."
                    .into(),
            )),
        }
    }

    /// Marks the innermost block as a pending elif branch. The marker stays
    /// on the stack (inverting its register) until the chain's end pops it.
    pub fn rewrite_block_elif(&mut self) -> CodegenResult<()> {
        match self.blocks.last_mut() {
            Some(block) => {
                block.kind = BlockKind::Elif;
                Ok(())
            }
            None => Err(CodegenError::ByteCode(
                "ELIF without an open conditional block. \
                 This error is a bug, flag it on the issue tracker."
                    .into(),
            )),
        }
    }

    /// Closes a conditional chain: pops the innermost block, then every
    /// pending elif marker stacked beneath it, freeing their comparison
    /// registers.
    pub fn pop_block(&mut self) -> CodegenResult<()> {
        let Some(block) = self.blocks.pop() else {
            return Err(CodegenError::ByteCode(
                "ENDIF without an open conditional block. \
                 This error is a bug, flag it on the issue tracker."
                    .into(),
            ));
        };
        self.free_comparison(block.comparison);
        while matches!(self.blocks.last(), Some(block) if block.kind == BlockKind::Elif) {
            let marker = self.blocks.pop();
            if let Some(marker) = marker {
                self.free_comparison(marker.comparison);
            }
        }
        Ok(())
    }

    pub fn open_blocks(&self) -> usize {
        self.blocks.len()
    }

    // -- Condition clauses -------------------------------------------------

    /// Evaluates one condition clause. `params` is either a single value
    /// (truthiness test) or `[lhs, op, rhs]`; `invert` comes from the
    /// instruction's negated form.
    pub fn clause(&mut self, params: &[RbcValue], invert: bool) -> CodegenResult<Clause> {
        match params {
            [value] => self.truthiness(value, !invert),
            [lhs, op, rhs] => {
                let Some(op) = op.as_constant().filter(|c| c.kind == ConstantKind::Word) else {
                    return Err(CodegenError::ByteCode(
                        "Malformed comparison operator in byte code. \
                         This error is a bug, flag it on the issue tracker."
                            .into(),
                    ));
                };
                let eq = match op.text.as_str() {
                    "==" => true,
                    "!=" => false,
                    other => {
                        return Err(CodegenError::ByteCode(format!(
                            "Unknown comparison operator '{other}' in byte code. \
                             This error is a bug, flag it on the issue tracker."
                        )))
                    }
                };
                self.comparison(lhs, rhs, eq != invert)
            }
            _ => Err(CodegenError::ByteCode(
                "Invalid byte code parameter count. \
                 This error is a bug, flag it on the issue tracker."
                    .into(),
            )),
        }
    }

    /// Tests whether `value` is non-zero (or zero, when `want_nonzero` is
    /// false).
    fn truthiness(&mut self, value: &RbcValue, want_nonzero: bool) -> CodegenResult<Clause> {
        match self.classify(value)? {
            Operand::Score(score) => {
                let id = self.reserve_comparison();
                let cmp = comparison_score(id as u32);
                self.add(Command::scoreboard(format!("players set {cmp} 0")));
                self.add(
                    Command::scoreboard(format!("players set {cmp} 1"))
                        .guarded(Condition::score_matches(&score, 0, want_nonzero)),
                );
                self.free_value_register(value);
                Ok(Clause::Comparison(id))
            }
            Operand::Storage(path) => {
                // Seeding temp with 0 makes "the copy changed it" mean
                // "the value is neither 0 nor missing".
                let id = self.reserve_comparison();
                self.add(Command::set_storage(TEMP_SLOT, "0"));
                self.add(
                    Command::copy_storage(TEMP_SLOT, &path)
                        .store_success(format!("score {}", comparison_score(id as u32))),
                );
                self.comparisons[id].truthy_when_one = want_nonzero;
                self.free_value_register(value);
                Ok(Clause::Comparison(id))
            }
            Operand::Inline(_) => {
                let constant = value.as_constant().ok_or_else(|| {
                    CodegenError::Unsupported(
                        "Conditions on list or object literals are not supported.".into(),
                    )
                })?;
                let Some(number) = constant.as_int() else {
                    return Err(CodegenError::Unsupported(
                        "Conditions on non-integer constants are not supported.".into(),
                    ));
                };
                Ok(Clause::Constant((number != 0) == want_nonzero))
            }
        }
    }

    /// Emits the comparison `lhs == rhs` (or `!=` when `eq` is false).
    fn comparison(&mut self, lhs: &RbcValue, rhs: &RbcValue, eq: bool) -> CodegenResult<Clause> {
        let left = self.classify(lhs)?;
        let right = self.classify(rhs)?;

        let clause = match (left, right) {
            (Operand::Score(a), Operand::Score(b)) => {
                let id = self.reserve_comparison();
                self.reset_and_set(id, Condition::scores_equal(&a, &b, !eq));
                Clause::Comparison(id)
            }
            (Operand::Score(score), Operand::Inline(text))
            | (Operand::Inline(text), Operand::Score(score)) => {
                if text.parse::<i64>().is_ok() {
                    let id = self.reserve_comparison();
                    self.reset_and_set(id, Condition::score_matches(&score, &text, !eq));
                    Clause::Comparison(id)
                } else {
                    // A score can never equal a non-integer value; route
                    // through storage so the NBT types get to disagree.
                    self.stage_score(&score);
                    self.storage_differs(Command::set_storage(TEMP_SLOT, &text), eq)
                }
            }
            (Operand::Score(score), Operand::Storage(path))
            | (Operand::Storage(path), Operand::Score(score)) => {
                self.stage_score(&score);
                self.storage_differs(Command::copy_storage(TEMP_SLOT, &path), eq)
            }
            (Operand::Storage(a), Operand::Storage(b)) => {
                self.add(Command::copy_storage(TEMP_SLOT, &a));
                self.storage_differs(Command::copy_storage(TEMP_SLOT, &b), eq)
            }
            (Operand::Storage(path), Operand::Inline(text))
            | (Operand::Inline(text), Operand::Storage(path)) => {
                self.add(Command::set_storage(TEMP_SLOT, &text));
                self.storage_differs(Command::copy_storage(TEMP_SLOT, &path), eq)
            }
            (Operand::Inline(a), Operand::Inline(b)) => {
                self.warn(ErrorKind::ByteCode(
                    "Comparing two constant values is not good practice.".into(),
                ));
                Clause::Constant((a == b) == eq)
            }
        };

        self.free_value_register(lhs);
        self.free_value_register(rhs);
        Ok(clause)
    }

    /// Reset-then-conditionally-set pattern shared by the score strategies.
    fn reset_and_set(&mut self, id: usize, condition: Condition) {
        let cmp = comparison_score(id as u32);
        self.add(Command::scoreboard(format!("players set {cmp} 0")));
        self.add(Command::scoreboard(format!("players set {cmp} 1")).guarded(condition));
    }

    /// Copies a score into the temp storage slot as an int.
    fn stage_score(&mut self, score: &str) {
        self.add(Command::get_score(score).store_result_storage(TEMP_SLOT));
    }

    /// Emits the final store-success step of a storage comparison: `temp`
    /// already holds the left value, the closure-described modify brings in
    /// the right one, and success means the two differed.
    fn storage_differs(&mut self, modify: Command, eq: bool) -> Clause {
        let id = self.reserve_comparison();
        self.add(modify.store_success(format!("score {}", comparison_score(id as u32))));
        self.comparisons[id].truthy_when_one = !eq;
        Clause::Comparison(id)
    }

    /// Folds one continuation clause into the chain's accumulator register.
    /// Frees the clause's own register.
    pub fn merge_clause(&mut self, accumulator: usize, clause: usize, or: bool) {
        let acc_sense = self.comparisons[accumulator].truthy_when_one;
        let clause_sense = self.comparisons[clause].truthy_when_one;
        let acc = comparison_score(accumulator as u32);
        let test = comparison_score(clause as u32);

        let (guard_invert, written) = if or {
            // Clause true forces the accumulator true.
            (!clause_sense, if acc_sense { 1 } else { 0 })
        } else {
            // Clause false forces the accumulator false.
            (clause_sense, if acc_sense { 0 } else { 1 })
        };
        self.add(
            Command::scoreboard(format!("players set {acc} {written}"))
                .guarded(Condition::score_matches(&test, 1, guard_invert)),
        );
        self.free_comparison(clause);
    }

    /// Folds a compile-time constant continuation into a runtime
    /// accumulator. `X or true` and `X and false` collapse to the
    /// constant; otherwise the accumulator stands.
    pub fn merge_constant(&mut self, accumulator: usize, truth: bool, or: bool) -> Clause {
        if or == truth {
            self.free_comparison(accumulator);
            Clause::Constant(truth)
        } else {
            Clause::Comparison(accumulator)
        }
    }

    // -- Operand plumbing --------------------------------------------------

    /// Where does this value live, as a comparison operand?
    fn classify(&self, value: &RbcValue) -> CodegenResult<Operand> {
        match value {
            RbcValue::Register(id) => {
                let register = self.program.register(*id);
                if register.operable {
                    Ok(Operand::Score(operable_score(id.as_u32())))
                } else {
                    Ok(Operand::Storage(register_path(id.as_u32())))
                }
            }
            RbcValue::Variable(id) => Ok(Operand::Storage(variable_value(self.slot(*id)?))),
            RbcValue::Path(path) => Ok(Operand::Storage(self.path_text(path)?)),
            _ => match self.inline_text(value) {
                Some(text) => Ok(Operand::Inline(text)),
                None => Err(CodegenError::Unsupported(format!(
                    "A {} cannot be used as a comparison operand.",
                    value.describe()
                ))),
            },
        }
    }

    /// Storage slot of a variable; an unassigned slot means the stream
    /// used a variable before creating it.
    pub(crate) fn slot(&self, id: VariableId) -> CodegenResult<u32> {
        self.program.variable(id).slot.ok_or_else(|| {
            CodegenError::ByteCode(format!(
                "Variable '{}' was used before it was created. \
                 This error is a bug, flag it on the issue tracker.",
                self.program.variable(id).name
            ))
        })
    }

    /// NBT path of an access chain, rooted at the variable's value.
    pub(crate) fn path_text(&self, path: &AccessPath) -> CodegenResult<String> {
        Ok(format!("{}{}", variable_value(self.slot(path.variable)?), path))
    }

    /// Literal command text for values with a compile-time representation:
    /// constants, and list/object literals whose parts are all constant.
    fn inline_text(&self, value: &RbcValue) -> Option<String> {
        match value {
            RbcValue::Constant(constant) => Some(constant.rendered()),
            RbcValue::List(list) => {
                let parts: Option<Vec<String>> =
                    list.values.iter().map(|v| self.inline_text(v)).collect();
                Some(format!("[{}]", parts?.join(", ")))
            }
            RbcValue::Object(id) => {
                let object = self.program.object(*id);
                let mut parts = Vec::with_capacity(object.members.len());
                for (name, member) in &object.members {
                    let value = member.value.as_ref()?;
                    parts.push(format!("{name}: {}", self.inline_text(value)?));
                }
                Some(format!("{{{}}}", parts.join(", ")))
            }
            _ => None,
        }
    }

    /// Registers are single-use temporaries; once a value has been
    /// consumed its register returns to the pool.
    fn free_value_register(&mut self, value: &RbcValue) {
        if let RbcValue::Register(id) = value {
            self.program.register_mut(*id).free();
        }
    }

    // -- Variable lifecycle ------------------------------------------------

    /// Materializes a variable: assigns the next storage slot and appends
    /// its `{v, s, t}` entry, then fills in the initial value.
    pub fn create_variable(
        &mut self,
        id: VariableId,
        value: Option<&RbcValue>,
    ) -> CodegenResult<()> {
        let slot = self.slots;
        self.slots += 1;
        let variable = self.program.variable_mut(id);
        variable.slot = Some(slot);
        let scope = variable.scope;
        let type_tag = variable.declared_type.type_id;

        let entry = |value: &str| variable_state(value, scope, type_tag);

        match value {
            None => self.add(Command::append_value(templates::VARIABLES, &entry("0"))),
            // Lists always materialize element by element so runtime
            // elements and constants take the same shape.
            Some(RbcValue::List(list)) => {
                self.add(Command::append_value(templates::VARIABLES, &entry("[]")));
                let dest = variable_value(slot);
                for element in &list.values {
                    self.append_element(&dest, element)?;
                }
            }
            Some(value) => {
                if let Some(text) = self.inline_text(value) {
                    self.add(Command::append_value(templates::VARIABLES, &entry(&text)));
                } else {
                    self.add(Command::append_value(templates::VARIABLES, &entry("0")));
                    self.store_into(&variable_value(slot), value)?;
                }
            }
        }
        Ok(())
    }

    /// Overwrites an existing variable's value. The type tag keeps whatever
    /// the creation wrote.
    pub fn assign_variable(&mut self, id: VariableId, value: &RbcValue) -> CodegenResult<()> {
        let dest = variable_value(self.slot(id)?);
        self.store_into(&dest, value)
    }

    /// Writes through a member/index chain, e.g. `points[0].x = 5`.
    pub fn assign_path(&mut self, path: &AccessPath, value: &RbcValue) -> CodegenResult<()> {
        let dest = self.path_text(path)?;
        self.store_into(&dest, value)
    }

    /// Writes `value` into an arbitrary program storage path.
    fn store_into(&mut self, dest: &str, value: &RbcValue) -> CodegenResult<()> {
        if let Some(text) = self.inline_text(value) {
            if !matches!(value, RbcValue::List(_)) {
                self.add(Command::set_storage(dest, &text));
                return Ok(());
            }
        }
        match value {
            RbcValue::Register(id) => {
                let id = *id;
                if self.program.register(id).operable {
                    self.add(
                        Command::get_score(&operable_score(id.as_u32()))
                            .store_result_storage(dest),
                    );
                } else {
                    self.add(Command::copy_storage(dest, &register_path(id.as_u32())));
                }
                self.program.register_mut(id).free();
            }
            RbcValue::Variable(id) => {
                let src = variable_value(self.slot(*id)?);
                self.add(Command::copy_storage(dest, &src));
            }
            RbcValue::Path(path) => {
                let src = self.path_text(path)?;
                self.add(Command::copy_storage(dest, &src));
            }
            RbcValue::List(list) => {
                self.add(Command::set_storage(dest, "[]"));
                for element in &list.values {
                    self.append_element(dest, element)?;
                }
            }
            RbcValue::Object(id) => {
                let object = self.program.object(*id).clone();
                self.add(Command::set_storage(dest, "{}"));
                for (name, member) in &object.members {
                    if let Some(value) = &member.value {
                        self.store_into(&format!("{dest}.{name}"), value)?;
                    }
                }
            }
            RbcValue::Constant(_) => {
                // Already handled by the inline path above.
            }
            other => {
                return Err(CodegenError::ByteCode(format!(
                    "A {} cannot be stored. \
                     This error is a bug, flag it on the issue tracker.",
                    other.describe()
                )))
            }
        }
        Ok(())
    }

    /// Appends one list element to the array at `dest`, preserving element
    /// order regardless of where the element value lives.
    fn append_element(&mut self, dest: &str, element: &RbcValue) -> CodegenResult<()> {
        if let Some(text) = self.inline_text(element) {
            self.add(Command::append_value(dest, &text));
            return Ok(());
        }
        match element {
            RbcValue::Register(id) => {
                let id = *id;
                if self.program.register(id).operable {
                    self.add(Command::append_value(dest, "0"));
                    self.add(
                        Command::get_score(&operable_score(id.as_u32()))
                            .store_result_storage(&format!("{dest}[-1]")),
                    );
                } else {
                    self.add(Command::append_storage(dest, &register_path(id.as_u32())));
                }
                self.program.register_mut(id).free();
            }
            RbcValue::Variable(id) => {
                let src = variable_value(self.slot(*id)?);
                self.add(Command::append_storage(dest, &src));
            }
            RbcValue::Path(path) => {
                let src = self.path_text(path)?;
                self.add(Command::append_storage(dest, &src));
            }
            RbcValue::List(list) => {
                self.add(Command::append_value(dest, "[]"));
                let nested = format!("{dest}[-1]");
                for element in &list.values {
                    self.append_element(&nested, element)?;
                }
            }
            RbcValue::Object(id) => {
                let object = self.program.object(*id).clone();
                self.add(Command::append_value(dest, "{}"));
                for (name, member) in &object.members {
                    if let Some(value) = &member.value {
                        self.store_into(&format!("{dest}[-1].{name}"), value)?;
                    }
                }
            }
            other => {
                return Err(CodegenError::ByteCode(format!(
                    "A {} cannot be a list element. \
                     This error is a bug, flag it on the issue tracker.",
                    other.describe()
                )))
            }
        }
        Ok(())
    }

    // -- Registers ---------------------------------------------------------

    /// Writes `value` into a register and marks it occupied.
    pub fn set_register(&mut self, id: RegisterId, value: &RbcValue) -> CodegenResult<()> {
        self.program.register_mut(id).vacant = false;
        if !self.program.register(id).operable {
            return self.store_into(&register_path(id.as_u32()), value);
        }

        let score = operable_score(id.as_u32());
        match value {
            RbcValue::Constant(constant) => {
                self.add(Command::scoreboard(format!(
                    "players set {score} {}",
                    constant.text
                )));
            }
            RbcValue::Register(src) => {
                let src = *src;
                if self.program.register(src).operable {
                    let other = operable_score(src.as_u32());
                    self.add(Command::scoreboard(format!(
                        "players operation {score} = {other}"
                    )));
                } else {
                    self.add(
                        Command::get_storage(&register_path(src.as_u32()))
                            .store_result(format!("score {score}")),
                    );
                }
                self.program.register_mut(src).free();
            }
            RbcValue::Variable(src) => {
                let path = variable_value(self.slot(*src)?);
                self.add(Command::get_storage(&path).store_result(format!("score {score}")));
            }
            RbcValue::Path(path) => {
                let path = self.path_text(path)?;
                self.add(Command::get_storage(&path).store_result(format!("score {score}")));
            }
            other => {
                return Err(CodegenError::Unsupported(format!(
                    "A {} cannot be stored in an operable register.",
                    other.describe()
                )))
            }
        }
        Ok(())
    }

    /// Applies `target <op>= value` in place on an operable register.
    pub fn math(&mut self, target: RegisterId, value: &RbcValue, op: MathOp) -> CodegenResult<()> {
        if !self.program.register(target).operable {
            self.warn(ErrorKind::UnsupportedOperation(
                "Math on non-operable registers is not supported.".into(),
            ));
            return Ok(());
        }
        if matches!(op, MathOp::Xor | MathOp::Pow) {
            return Err(CodegenError::Unsupported(format!(
                "The '{}' operator is only supported between constant values.",
                op.symbol()
            )));
        }

        let score = operable_score(target.as_u32());
        match value {
            RbcValue::Constant(constant) => match op {
                MathOp::Add => {
                    self.add(Command::scoreboard(format!(
                        "players add {score} {}",
                        constant.text
                    )));
                }
                MathOp::Sub => {
                    self.add(Command::scoreboard(format!(
                        "players remove {score} {}",
                        constant.text
                    )));
                }
                // Scoreboards have no immediate operand form for these;
                // stage the constant in a scratch register.
                _ => {
                    let scratch = self.scratch_register(target);
                    let other = operable_score(scratch.as_u32());
                    self.add(Command::scoreboard(format!(
                        "players set {other} {}",
                        constant.text
                    )));
                    self.operation(&score, op, &other);
                    self.program.register_mut(scratch).free();
                }
            },
            RbcValue::Register(src) => {
                let src = *src;
                if !self.program.register(src).operable {
                    return Err(CodegenError::ByteCode(
                        "Math between mixed register classes is not supported. \
                         This error is a bug, flag it on the issue tracker."
                            .into(),
                    ));
                }
                let other = operable_score(src.as_u32());
                self.operation(&score, op, &other);
                self.program.register_mut(src).free();
            }
            RbcValue::Variable(id) => {
                let path = variable_value(self.slot(*id)?);
                self.stage_in_temp_objective(&path);
                self.operation(&score, op, &templates::score(TEMP_OBJECTIVE));
            }
            RbcValue::Path(path) => {
                let path = self.path_text(path)?;
                self.stage_in_temp_objective(&path);
                self.operation(&score, op, &templates::score(TEMP_OBJECTIVE));
            }
            other => {
                return Err(CodegenError::ByteCode(format!(
                    "A {} cannot be a math operand. \
                     This error is a bug, flag it on the issue tracker.",
                    other.describe()
                )))
            }
        }
        Ok(())
    }

    fn operation(&mut self, target: &str, op: MathOp, source: &str) {
        self.add(Command::scoreboard(format!(
            "players operation {target} {}= {source}",
            op.symbol()
        )));
    }

    /// Reads a storage path into the temp objective.
    fn stage_in_temp_objective(&mut self, path: &str) {
        self.add(
            Command::get_storage(path)
                .store_result(format!("score {SCORE_HOLDER} {TEMP_OBJECTIVE}")),
        );
    }

    /// A vacant operable register for staging, never the math target
    /// itself. Grows the pool when every register is live.
    fn scratch_register(&mut self, exclude: RegisterId) -> RegisterId {
        let id = match self.program.free_register_excluding(true, Some(exclude)) {
            Some(id) => id,
            None => self.program.make_register(true, false),
        };
        self.program.register_mut(id).vacant = false;
        id
    }

    // -- Calls -------------------------------------------------------------

    /// Creates one parameter variable holding its argument value ahead of
    /// a call.
    pub fn stage_parameter(
        &mut self,
        parameter: VariableId,
        value: &RbcValue,
    ) -> CodegenResult<()> {
        self.create_variable(parameter, Some(value))?;
        self.staged.push(parameter);
        Ok(())
    }

    /// The `function` command invoking a compiled function by its
    /// namespaced path.
    pub fn invoke(&mut self, id: FunctionId) {
        let name = self.program.compiled_name(id);
        let mut path = self.program.function(id).module_path.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        let body = format!("{}:{path}{name}", self.namespace);
        self.add(Command::new(CommandKind::Function, body));
    }

    /// Tears down the most recently staged parameter after its call. The
    /// parameter keeps its slot index: the callee's body compiles later
    /// and resolves against the layout this call site set up.
    pub fn pop_parameter(&mut self) -> CodegenResult<()> {
        let Some(parameter) = self.staged.pop() else {
            return Err(CodegenError::ByteCode(
                "POP without a staged parameter. \
                 This error is a bug, flag it on the issue tracker."
                    .into(),
            ));
        };
        let slot = self.slot(parameter)?;
        self.add(Command::data(format!(
            "remove storage {} {}",
            templates::PROGRAM_STORAGE,
            templates::variable_entry(slot)
        )));
        self.slots -= 1;
        Ok(())
    }

    // -- Returns -----------------------------------------------------------

    /// Writes the return slots and emits the `return` command. A bare
    /// return signals "no value" with exit code 0, valued returns with 1.
    pub fn return_value(&mut self, value: Option<&RbcValue>) -> CodegenResult<()> {
        let Some(value) = value else {
            self.add(Command::new(CommandKind::Return, "0"));
            return Ok(());
        };

        let type_tag = match value {
            RbcValue::Constant(constant) => constant.kind.type_id(),
            RbcValue::List(_) => type_ids::LIST,
            RbcValue::Object(_) => type_ids::OBJECT,
            RbcValue::Register(id) => {
                if !self.program.register(*id).operable {
                    return Err(CodegenError::Unsupported(
                        "Returning a non-operable register is not supported.".into(),
                    ));
                }
                type_ids::INT
            }
            RbcValue::Variable(id) => {
                // The variable knows its own runtime tag; copy both slots.
                let slot = self.slot(*id)?;
                self.add(Command::copy_storage(RETURN_SLOT, &variable_value(slot)));
                self.add(Command::copy_storage(RETURN_TYPE_SLOT, &variable_type(slot)));
                self.add(Command::new(CommandKind::Return, "1"));
                return Ok(());
            }
            other => {
                return Err(CodegenError::Unsupported(format!(
                    "A {} cannot be returned.",
                    other.describe()
                )))
            }
        };

        self.store_into(RETURN_SLOT, value)?;
        self.add(Command::set_storage(RETURN_TYPE_SLOT, &type_tag.to_string()));
        self.add(Command::new(CommandKind::Return, "1"));
        Ok(())
    }

    /// Copies the return slots into a variable, value and tag both.
    pub fn save_return(&mut self, id: VariableId) -> CodegenResult<()> {
        let slot = self.slot(id)?;
        self.add(Command::copy_storage(&variable_value(slot), RETURN_SLOT));
        self.add(Command::copy_storage(&variable_type(slot), RETURN_TYPE_SLOT));
        Ok(())
    }

    // -- Program initialization --------------------------------------------

    /// Setup commands prepended to the load function: objectives for every
    /// comparison and operable register, the initial program state, and one
    /// storage cell per non-operable register so their indices resolve.
    pub fn prologue(&self) -> Vec<String> {
        let mut commands = Vec::new();
        for id in 0..self.comparisons.len() {
            commands.push(format!(
                "scoreboard objectives add {} dummy",
                comparison_objective(id as u32)
            ));
        }
        for register in &self.program.registers {
            if register.operable {
                commands.push(format!(
                    "scoreboard objectives add {} dummy",
                    operable_objective(register.id.as_u32())
                ));
            }
        }
        commands.push(format!(
            "data merge storage {} {}",
            templates::PROGRAM_STORAGE,
            templates::DEFAULT_PROGRAM_STATE
        ));
        commands.push(format!(
            "scoreboard objectives add {TEMP_OBJECTIVE} dummy \"{TEMP_OBJECTIVE}\""
        ));
        for register in &self.program.registers {
            if !register.operable {
                commands.push(format!(
                    "data modify storage {} {} append value 0",
                    templates::PROGRAM_STORAGE,
                    templates::REGISTERS
                ));
            }
        }
        commands
    }
}
