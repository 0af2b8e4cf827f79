//! Handlers for `__native__` functions.
//!
//! A native call never reaches the output as a `function` invocation; its
//! handler expands directly into commands from the call's argument
//! values. The handler table is keyed by the declared function name, so a
//! source declaration like `method: void msg(m: string) __native__;`
//! binds to whatever `msg` does here.

use redscript_parser::ir::{ConstantKind, RbcValue};
use serde_json::{json, Value};

use crate::command::{Command, CommandKind};
use crate::error::{CodegenError, CodegenResult};
use crate::factory::CommandFactory;
use crate::templates::{
    operable_objective, register_path, variable_value, PROGRAM_STORAGE, SCORE_HOLDER,
};

/// Expands the native `name` with the call's argument values, in order.
pub fn dispatch(
    factory: &mut CommandFactory,
    name: &str,
    arguments: &[RbcValue],
) -> CodegenResult<()> {
    match name {
        "msg" => msg(factory, arguments),
        "kill" => kill(factory, arguments),
        _ => Err(CodegenError::NativeImpl(format!(
            "Native function mapping for '{name}' does not exist. \
             This could be due to a version mismatch."
        ))),
    }
}

/// `msg(target, message)`: chat output via `tellraw`. The message renders
/// as a text component, so runtime values read straight from their score
/// or storage location.
fn msg(factory: &mut CommandFactory, arguments: &[RbcValue]) -> CodegenResult<()> {
    let [target, message] = arguments else {
        return Err(arity("msg", 2, arguments.len()));
    };
    let target = selector("msg", target)?;
    let component = component(factory, message)?;
    factory.add(Command::new(
        CommandKind::Tellraw,
        format!("{target} {component}"),
    ));
    Ok(())
}

/// `kill(target)`: removes the selected entities.
fn kill(factory: &mut CommandFactory, arguments: &[RbcValue]) -> CodegenResult<()> {
    let [target] = arguments else {
        return Err(arity("kill", 1, arguments.len()));
    };
    let target = selector("kill", target)?;
    factory.add(Command::new(CommandKind::Kill, target));
    Ok(())
}

/// Entity target of a native, which must be known at compile time: a
/// selector literal or a player name.
fn selector(native: &str, value: &RbcValue) -> CodegenResult<String> {
    match value.as_constant() {
        Some(constant)
            if matches!(constant.kind, ConstantKind::Selector | ConstantKind::Str) =>
        {
            Ok(constant.text.clone())
        }
        _ => Err(CodegenError::NativeImpl(format!(
            "Native function '{native}' needs a selector or player name \
             as its target, not a {}.",
            value.describe()
        ))),
    }
}

/// Text component showing `value` wherever it lives.
fn component(factory: &CommandFactory, value: &RbcValue) -> CodegenResult<Value> {
    match value {
        RbcValue::Constant(constant) => Ok(match constant.kind {
            ConstantKind::Selector => json!({ "selector": constant.text }),
            _ => json!({ "text": constant.text }),
        }),
        RbcValue::Variable(id) => {
            let slot = factory.slot(*id)?;
            Ok(storage_component(&variable_value(slot)))
        }
        RbcValue::Path(path) => Ok(storage_component(&factory.path_text(path)?)),
        RbcValue::Register(id) => {
            if factory.program.register(*id).operable {
                Ok(json!({
                    "score": { "name": SCORE_HOLDER, "objective": operable_objective(id.as_u32()) }
                }))
            } else {
                Ok(storage_component(&register_path(id.as_u32())))
            }
        }
        _ => Err(CodegenError::NativeImpl(format!(
            "Native function 'msg' cannot render a {} as a message.",
            value.describe()
        ))),
    }
}

fn storage_component(path: &str) -> Value {
    json!({ "nbt": path, "storage": PROGRAM_STORAGE })
}

fn arity(native: &str, expected: usize, got: usize) -> CodegenError {
    CodegenError::NativeImpl(format!(
        "Native function '{native}' takes {expected} arguments, got {got}."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use redscript_parser::ir::{Program, RbcConstant};

    fn factory(program: &mut Program) -> CommandFactory<'_> {
        CommandFactory::new(program, "pack")
    }

    fn constant(kind: ConstantKind, text: &str) -> RbcValue {
        RbcValue::Constant(RbcConstant::new(kind, text))
    }

    #[test]
    fn msg_renders_a_tellraw_with_text_component() {
        let mut program = Program::new();
        let mut factory = factory(&mut program);
        dispatch(
            &mut factory,
            "msg",
            &[
                constant(ConstantKind::Selector, "@a"),
                constant(ConstantKind::Str, "hello"),
            ],
        )
        .unwrap();
        let commands = factory.package().unwrap();
        assert_eq!(commands, [r#"tellraw @a {"text":"hello"}"#]);
    }

    #[test]
    fn msg_reads_registers_from_their_score() {
        let mut program = Program::new();
        let register = program.make_register(true, false);
        let mut factory = factory(&mut program);
        dispatch(
            &mut factory,
            "msg",
            &[
                constant(ConstantKind::Selector, "@p"),
                RbcValue::Register(register),
            ],
        )
        .unwrap();
        let commands = factory.package().unwrap();
        assert_eq!(
            commands,
            [r#"tellraw @p {"score":{"name":"_CPU","objective":"r0"}}"#]
        );
    }

    #[test]
    fn kill_takes_exactly_one_selector() {
        let mut program = Program::new();
        let mut factory = factory(&mut program);
        dispatch(&mut factory, "kill", &[constant(ConstantKind::Selector, "@e")]).unwrap();
        let commands = factory.package().unwrap();
        assert_eq!(commands, ["kill @e"]);

        let mut factory = CommandFactory::new(&mut program, "pack");
        let error = dispatch(&mut factory, "kill", &[]).unwrap_err();
        assert!(error.to_string().contains("takes 1 arguments"));
    }

    #[test]
    fn unknown_natives_report_the_mapping_gap() {
        let mut program = Program::new();
        let mut factory = factory(&mut program);
        let error = dispatch(&mut factory, "teleport", &[]).unwrap_err();
        assert!(error.to_string().contains("teleport"));
        assert!(error.to_string().contains("version mismatch"));
    }
}
