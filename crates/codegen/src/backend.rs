//! Lowers a parsed program to its datapack functions.
//!
//! Compilation walks every function's instruction stream once, in arrival
//! order, feeding a single [`CommandFactory`] so that storage slots and
//! comparison registers stay program-wide. Conditions whose clauses folded
//! to constants never allocate a comparison register; their dead branches
//! are dropped from the stream entirely.

use std::mem;

use redscript_parser::helpers::hash_hex;
use redscript_parser::ir::{
    ConstantKind, FunctionId, Instruction, MathOp, ModuleId, Opcode, Program, RbcValue, VariableId,
};
use redscript_parser::{Error, ErrorKind};

use crate::error::{CodegenError, CodegenResult};
use crate::factory::{Clause, CommandFactory};
use crate::natives;

/// One compiled function with everything the writer needs to place it.
#[derive(Debug, Clone)]
pub struct McFunction {
    pub name: String,
    pub commands: Vec<String>,
    /// Enclosing module names, outermost first.
    pub module_path: Vec<String>,
    /// Name-hash chain of enclosing functions, innermost first; empty for
    /// top-level functions.
    pub parent_hash: String,
    /// Type-tuple hash of a generic variation, empty otherwise.
    pub generic_hash: String,
}

impl McFunction {
    /// File stem the function is written under. Matches the name used by
    /// `function` commands invoking it.
    pub fn file_name(&self) -> String {
        let mut name = String::new();
        if !self.parent_hash.is_empty() {
            name.push_str(&self.parent_hash);
            name.push('_');
        }
        name.push_str(&self.name);
        if !self.generic_hash.is_empty() {
            name.push_str("_g_");
            name.push_str(&self.generic_hash);
        }
        name
    }
}

/// A fully lowered program, ready to be written out.
#[derive(Debug, Clone, Default)]
pub struct McProgram {
    /// Commands of the load entry: program initialization followed by the
    /// file-level statements.
    pub global: Vec<String>,
    pub functions: Vec<McFunction>,
}

/// Result of a successful compilation. Warnings are diagnostics that did
/// not stop the backend (skipped instructions, questionable comparisons).
#[derive(Debug)]
pub struct CodegenOutcome {
    pub program: McProgram,
    pub warnings: Vec<Error>,
}

/// Compiles the whole program into datapack functions under `namespace`.
pub fn compile(program: &mut Program, namespace: &str) -> CodegenResult<CodegenOutcome> {
    let mut factory = CommandFactory::new(program, namespace);

    let instructions = mem::take(&mut factory.program.global.instructions);
    let body = run(&mut factory, &instructions);
    factory.program.global.instructions = instructions;
    let body = body?;

    let mut functions = Vec::new();
    for id in collect_functions(factory.program) {
        let instructions = mem::take(&mut factory.program.function_mut(id).instructions);
        let commands = run(&mut factory, &instructions);
        factory.program.function_mut(id).instructions = instructions;
        functions.push(describe(factory.program, id, commands?));
    }

    // The initialization prologue needs the final register and comparison
    // counts, so it lands only after every function has compiled.
    let mut global = factory.prologue();
    global.extend(body);

    Ok(CodegenOutcome {
        program: McProgram { global, functions },
        warnings: factory.take_warnings(),
    })
}

/// Fills in the placement metadata for one compiled function.
fn describe(program: &Program, id: FunctionId, commands: Vec<String>) -> McFunction {
    let function = program.function(id);

    let mut chain = Vec::new();
    let mut parent = function.parent;
    while let Some(ancestor) = parent {
        chain.push(hash_hex(&program.function(ancestor).name));
        parent = program.function(ancestor).parent;
    }

    let generic_hash = match &function.bound_generics {
        Some(bound) if function.generics.is_some() => Program::generics_hash(bound),
        _ => String::new(),
    };

    McFunction {
        name: function.name.clone(),
        commands,
        module_path: function.module_path.clone(),
        parent_hash: chain.join("_"),
        generic_hash,
    }
}

/// Every function the program compiles, in a stable order: top-level
/// functions (with their nested children), then the module tree. Generic
/// declarations contribute their instantiated variations instead of
/// themselves; decorator-skipped functions drop out here.
fn collect_functions(program: &Program) -> Vec<FunctionId> {
    let mut ids = Vec::new();
    for id in program.function_table.values() {
        collect_function(program, *id, &mut ids);
    }
    for id in program.module_table.values() {
        collect_module(program, *id, &mut ids);
    }
    ids
}

fn collect_function(program: &Program, id: FunctionId, out: &mut Vec<FunctionId>) {
    let function = program.function(id);
    if function.bound_generics.is_none() {
        if let Some(generics) = &function.generics {
            for variation in generics.variations.values() {
                collect_function(program, *variation, out);
            }
            return;
        }
    }
    if function.skip_compile() {
        return;
    }
    out.push(id);
    for child in function.children.values() {
        collect_function(program, *child, out);
    }
}

fn collect_module(program: &Program, id: ModuleId, out: &mut Vec<FunctionId>) {
    let module = program.module(id);
    for function in module.functions.values() {
        collect_function(program, *function, out);
    }
    for child in module.children.values() {
        collect_module(program, *child, out);
    }
}

/// Lowers one instruction stream to rendered commands.
fn run(factory: &mut CommandFactory, instructions: &[Instruction]) -> CodegenResult<Vec<String>> {
    // Inclusive index ranges dropped by constant-condition pruning. The
    // walk checks membership at every step since ranges are discovered out
    // of order.
    let mut skips: Vec<(usize, usize)> = Vec::new();
    let mut index = 0;

    while index < instructions.len() {
        if let Some(at) = skips
            .iter()
            .position(|(from, to)| *from <= index && index <= *to)
        {
            index = skips[at].1 + 1;
            skips.remove(at);
            continue;
        }

        let instruction = &instructions[index];
        match instruction.op {
            Opcode::Create => {
                let [RbcValue::Variable(id), rest @ ..] = &instruction.params[..] else {
                    return Err(invalid_params(instruction.op));
                };
                factory.create_variable(*id, rest.first())?;
            }
            Opcode::Save => match &instruction.params[..] {
                [RbcValue::Register(id), value] => factory.set_register(*id, value)?,
                [RbcValue::Variable(id), value] => factory.assign_variable(*id, value)?,
                [RbcValue::Path(path), value] => factory.assign_path(path, value)?,
                _ => return Err(invalid_params(instruction.op)),
            },
            Opcode::Math => {
                let [RbcValue::Register(target), value, op] = &instruction.params[..] else {
                    return Err(invalid_params(instruction.op));
                };
                let op = op
                    .as_constant()
                    .and_then(|constant| constant.as_int())
                    .and_then(|id| MathOp::from_id(id as i32))
                    .ok_or_else(|| invalid_params(instruction.op))?;
                factory.math(*target, value, op)?;
            }
            Opcode::If | Opcode::Nif | Opcode::Elif | Opcode::Nelif => {
                handle_condition(factory, instructions, &mut index, &mut skips, instruction.op)?;
            }
            Opcode::Else => factory.rewrite_block_else()?,
            Opcode::EndIf => factory.pop_block()?,
            Opcode::Ret => factory.return_value(instruction.params.first())?,
            Opcode::SaveRet => {
                let [RbcValue::Variable(id)] = &instruction.params[..] else {
                    return Err(invalid_params(instruction.op));
                };
                factory.save_return(*id)?;
            }
            Opcode::Push => {
                // Native callees take their arguments straight from the
                // byte code when the call resolves; only real calls stage
                // parameter variables.
                let callee = resolve_callee(factory.program, &instruction.params)?;
                if !factory.program.function(callee).is_native() {
                    let parameter = resolve_parameter(factory.program, callee, instruction)?;
                    let Some(value) = instruction.params.get(2) else {
                        return Err(invalid_params(Opcode::Push));
                    };
                    factory.stage_parameter(parameter, value)?;
                }
            }
            Opcode::Call => handle_call(factory, instructions, &mut index)?,
            Opcode::Inc | Opcode::Dec => {}
            Opcode::Del
            | Opcode::Eq
            | Opcode::Neq
            | Opcode::Gt
            | Opcode::Lt
            | Opcode::Pop => {
                factory.warn(ErrorKind::ByteCode(format!(
                    "Unimplemented or unknown byte code instruction {}.",
                    instruction.op
                )));
            }
        }
        index += 1;
    }
    factory.package()
}

/// Dispatches a resolved call. Native callees expand at compile time from
/// their argument values; real callees invoke the compiled function and
/// tear the parameters down again through the trailing pops.
fn handle_call(
    factory: &mut CommandFactory,
    instructions: &[Instruction],
    index: &mut usize,
) -> CodegenResult<()> {
    let callee = resolve_callee(factory.program, &instructions[*index].params)?;

    if factory.program.function(callee).is_native() {
        // Arity is checked at parse time, so the nearest pushes are this
        // call's arguments; argument expressions interleave other
        // instructions between them.
        let count = factory.program.function(callee).params.len();
        let mut arguments = Vec::with_capacity(count);
        for push in instructions[..*index]
            .iter()
            .rev()
            .filter(|instruction| instruction.op == Opcode::Push)
            .take(count)
        {
            let Some(value) = push.params.get(2) else {
                return Err(invalid_params(Opcode::Push));
            };
            arguments.push(value.clone());
        }
        arguments.reverse();
        let name = factory.program.function(callee).name.clone();
        return natives::dispatch(factory, &name, &arguments);
    }

    factory.invoke(callee);
    while matches!(
        instructions.get(*index + 1),
        Some(instruction) if instruction.op == Opcode::Pop
    ) {
        *index += 1;
        factory.pop_parameter()?;
    }
    Ok(())
}

/// Finds the callee a call or push addresses: an opaque handle for nested
/// and generic functions, otherwise a name looked up in the owning module
/// or the top-level table.
fn resolve_callee(program: &Program, params: &[RbcValue]) -> CodegenResult<FunctionId> {
    match params.first() {
        Some(RbcValue::Function(id)) => Ok(*id),
        Some(RbcValue::Constant(name)) => {
            let module = params.iter().find_map(|param| match param {
                RbcValue::Module(id) => Some(*id),
                _ => None,
            });
            let found = match module {
                Some(module) => program.module(module).functions.get(&name.text).copied(),
                None => program.function_table.get(&name.text).copied(),
            };
            found.ok_or_else(|| {
                CodegenError::ByteCode(format!(
                    "Unknown function '{}' in byte code. \
                     This error is a bug, flag it on the issue tracker.",
                    name.text
                ))
            })
        }
        _ => Err(invalid_params(Opcode::Call)),
    }
}

/// Matches a push's parameter name against the callee's declaration.
fn resolve_parameter(
    program: &Program,
    callee: FunctionId,
    instruction: &Instruction,
) -> CodegenResult<VariableId> {
    let Some(name) = instruction.params.get(1).and_then(|param| param.as_constant()) else {
        return Err(invalid_params(Opcode::Push));
    };
    program
        .function(callee)
        .params
        .iter()
        .copied()
        .find(|param| program.variable(*param).name == name.text)
        .ok_or_else(|| {
            CodegenError::ByteCode(format!(
                "Function '{}' has no parameter '{}'. \
                 This error is a bug, flag it on the issue tracker.",
                program.function(callee).name,
                name.text
            ))
        })
}

/// Evaluates a conditional instruction and its continuation clauses into
/// one block, or resolves it at compile time when everything folded.
fn handle_condition(
    factory: &mut CommandFactory,
    instructions: &[Instruction],
    index: &mut usize,
    skips: &mut Vec<(usize, usize)>,
    op: Opcode,
) -> CodegenResult<()> {
    let elif = matches!(op, Opcode::Elif | Opcode::Nelif);
    let invert = matches!(op, Opcode::Nif | Opcode::Nelif);

    // The previous branch's block becomes a pending marker whose guards
    // invert from here on; it stays stacked until the chain closes.
    if elif {
        factory.rewrite_block_elif()?;
    }

    let mut accumulator = factory.clause(&instructions[*index].params, invert)?;

    while let Some(next) = instructions.get(*index + 1) {
        let Some(combiner) = continuation_combiner(next) else {
            break;
        };
        let or = combiner == "or";
        let clause_invert = matches!(next.op, Opcode::Nif | Opcode::Nelif);
        *index += 1;

        accumulator = match accumulator {
            // `false and x` / `true or x` are settled; the clause never
            // evaluates.
            Clause::Constant(truth) if truth == or => accumulator,
            Clause::Constant(_) => factory.clause(&next.params[1..], clause_invert)?,
            Clause::Comparison(acc) => match factory.clause(&next.params[1..], clause_invert)? {
                Clause::Constant(truth) => factory.merge_constant(acc, truth, or),
                Clause::Comparison(clause) => {
                    factory.merge_clause(acc, clause, or);
                    Clause::Comparison(acc)
                }
            },
        };
    }

    match accumulator {
        Clause::Comparison(comparison) => {
            factory.push_block(comparison);
            Ok(())
        }
        Clause::Constant(truth) => prune_chain(factory, instructions, index, skips, elif, truth),
    }
}

/// A continuation clause starts with an `and`/`or` word in front of its
/// normal parameters.
fn continuation_combiner(instruction: &Instruction) -> Option<&str> {
    if !matches!(
        instruction.op,
        Opcode::If | Opcode::Nif | Opcode::Elif | Opcode::Nelif
    ) {
        return None;
    }
    let constant = instruction.params.first()?.as_constant()?;
    if constant.kind != ConstantKind::Word {
        return None;
    }
    match constant.text.as_str() {
        "and" | "or" => Some(constant.text.as_str()),
        _ => None,
    }
}

/// Resolves a chain whose condition folded to a constant.
///
/// A true condition emits its body unguarded and drops every later branch;
/// a false condition drops the body and hands control to the next branch.
/// For a pruned `elif` the chain's `EndIf` must still execute, since the
/// earlier branches left pending markers on the block stack.
fn prune_chain(
    factory: &mut CommandFactory,
    instructions: &[Instruction],
    index: &mut usize,
    skips: &mut Vec<(usize, usize)>,
    elif: bool,
    truth: bool,
) -> CodegenResult<()> {
    let here = *index;
    let Some(split) = chain_break(instructions, here) else {
        return Err(missing_endif());
    };

    if truth {
        match instructions[split].op {
            Opcode::EndIf => {
                if !elif {
                    push_skip(skips, split, split);
                }
            }
            _ => {
                let Some(end) = matching_endif(instructions, split) else {
                    return Err(missing_endif());
                };
                push_skip(skips, split, if elif { end - 1 } else { end });
            }
        }
        return Ok(());
    }

    match instructions[split].op {
        Opcode::EndIf => {
            // Dead body. The EndIf runs only when markers need popping.
            *index = if elif { split - 1 } else { split };
            Ok(())
        }
        Opcode::Else => {
            if elif {
                // The ELSE takes over the pending markers.
                *index = split - 1;
            } else {
                // No block was opened; swallow the ELSE and the chain's
                // EndIf so the else body runs unguarded.
                *index = split;
                let Some(end) = matching_endif(instructions, split) else {
                    return Err(missing_endif());
                };
                push_skip(skips, end, end);
            }
            Ok(())
        }
        _ => {
            if elif {
                // The pending marker is in place; the next ELIF evaluates
                // through the normal path.
                *index = split - 1;
                Ok(())
            } else {
                // No block was opened, so the elif restarts the chain as a
                // plain conditional.
                *index = split;
                let op = match instructions[split].op {
                    Opcode::Nelif => Opcode::Nif,
                    _ => Opcode::If,
                };
                handle_condition(factory, instructions, index, skips, op)
            }
        }
    }
}

/// The next branch point of the chain opened at `from`: an `Else`, a
/// fresh `Elif`, or the matching `EndIf`. Continuation clauses and nested
/// chains are stepped over.
fn chain_break(instructions: &[Instruction], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, instruction) in instructions.iter().enumerate().skip(from + 1) {
        if continuation_combiner(instruction).is_some() {
            continue;
        }
        match instruction.op {
            Opcode::If | Opcode::Nif => depth += 1,
            Opcode::EndIf => {
                if depth == 0 {
                    return Some(offset);
                }
                depth -= 1;
            }
            Opcode::Else | Opcode::Elif | Opcode::Nelif => {
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// The `EndIf` closing the chain that `from` belongs to.
fn matching_endif(instructions: &[Instruction], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, instruction) in instructions.iter().enumerate().skip(from + 1) {
        if continuation_combiner(instruction).is_some() {
            continue;
        }
        match instruction.op {
            Opcode::If | Opcode::Nif => depth += 1,
            Opcode::EndIf => {
                if depth == 0 {
                    return Some(offset);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

fn push_skip(skips: &mut Vec<(usize, usize)>, from: usize, to: usize) {
    if from <= to {
        skips.push((from, to));
    }
}

fn invalid_params(op: Opcode) -> CodegenError {
    CodegenError::ByteCode(format!(
        "Invalid byte code parameters for {op}. \
         This error is a bug, flag it on the issue tracker."
    ))
}

fn missing_endif() -> CodegenError {
    CodegenError::ByteCode(
        "A conditional block is missing its ENDIF. \
         This error is a bug, flag it on the issue tracker."
            .into(),
    )
}
