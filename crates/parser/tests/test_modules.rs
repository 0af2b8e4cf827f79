//! Integration tests for module declarations and module calls.
//!
//! Covers registration under the module table, `::` access chains,
//! nested modules, local `::name()` calls, and the restrictions on what
//! a module body may contain.

use redscript_parser::ir::{ConstantKind, Opcode, RbcValue};
use redscript_parser::{parse_source, ParseOutcome};

fn parse_ok(source: &str) -> ParseOutcome {
    match parse_source("main.rsc", source) {
        Ok(outcome) => outcome,
        Err(error) => panic!("parse failed: {error}"),
    }
}

fn global_ops(outcome: &ParseOutcome) -> Vec<Opcode> {
    outcome
        .program
        .global
        .instructions
        .iter()
        .map(|instruction| instruction.op)
        .collect()
}

#[test]
fn test_module_functions_register_under_the_module() {
    let outcome = parse_ok(
        r#"
module math {
    method: int double(x: int) {
        return x + x;
    }
}
y: int = math::double(2);
"#,
    );
    let program = &outcome.program;
    let math = program.module_table["math"];
    let double = program.module(math).functions["double"];

    // Module functions are not reachable through the top-level table.
    assert!(!program.function_table.contains_key("double"));
    assert_eq!(program.function(double).module_path, vec!["math".to_string()]);

    assert_eq!(
        global_ops(&outcome),
        vec![
            Opcode::Push,
            Opcode::Call,
            Opcode::Pop,
            Opcode::Create,
            Opcode::SaveRet,
        ]
    );

    // Both the push and the call carry the owning module.
    let push = &program.global.instructions[0];
    assert_eq!(push.params.len(), 4);
    let callee = push.params[0].as_constant().unwrap();
    assert_eq!(callee.kind, ConstantKind::Word);
    assert_eq!(callee.text, "double");
    assert!(matches!(push.params[3], RbcValue::Module(id) if id == math));

    let call = &program.global.instructions[1];
    assert_eq!(call.params.len(), 2);
    assert_eq!(call.params[0].as_constant().unwrap().text, "double");
    assert!(matches!(call.params[1], RbcValue::Module(id) if id == math));
}

#[test]
fn test_modules_hold_only_functions() {
    let error = parse_source("main.rsc", "module m {\n    x: int = 1;\n}\n").unwrap_err();
    assert_eq!(error.kind.message(), "Modules can only contain functions.");
}

#[test]
fn test_module_braces_do_not_deepen_the_scope() {
    let outcome = parse_ok(
        r#"
module m {
    method: void f(a: int) {
    }
}
"#,
    );
    let program = &outcome.program;
    let f = program.module(program.module_table["m"]).functions["f"];
    // Parameters sit at depth one whether or not a module wraps the
    // function.
    assert_eq!(program.variable(program.function(f).params[0]).scope, 1);
}

#[test]
fn test_nested_modules_chain_through_children() {
    let outcome = parse_ok(
        r#"
module world {
    module engine {
        method: void tick() {
        }
    }
}
world::engine::tick();
"#,
    );
    let program = &outcome.program;
    let world = program.module_table["world"];
    let engine = program.module(world).children["engine"];
    assert_eq!(
        program.module(engine).path,
        vec!["world".to_string(), "engine".to_string()]
    );
    assert!(program.module(engine).functions.contains_key("tick"));

    assert_eq!(global_ops(&outcome), vec![Opcode::Call]);
    let call = &program.global.instructions[0];
    assert_eq!(call.params[0].as_constant().unwrap().text, "tick");
    assert!(matches!(call.params[1], RbcValue::Module(id) if id == engine));
}

#[test]
fn test_local_calls_resolve_in_the_current_module() {
    let outcome = parse_ok(
        r#"
module m {
    method: void helper() {
    }
    method: void caller() {
        ::helper();
    }
}
"#,
    );
    let program = &outcome.program;
    let m = program.module_table["m"];
    let caller = program.module(m).functions["caller"];

    let ops: Vec<Opcode> = program
        .function(caller)
        .instructions
        .iter()
        .map(|i| i.op)
        .collect();
    assert_eq!(ops, vec![Opcode::Call]);
    let call = &program.function(caller).instructions[0];
    assert_eq!(call.params[0].as_constant().unwrap().text, "helper");
    assert!(matches!(call.params[1], RbcValue::Module(id) if id == m));
}

#[test]
fn test_unknown_module_members_are_reported() {
    let declaration = r#"
module math {
    method: int double(x: int) {
        return x + x;
    }
}
"#;

    let error =
        parse_source("main.rsc", &format!("{declaration}y: int = math::triple(2);"))
            .unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Unknown function 'triple' in module 'math'."
    );

    let error =
        parse_source("main.rsc", &format!("{declaration}y: int = physics::step();"))
            .unwrap_err();
    assert_eq!(error.kind.message(), "Unknown module name.");
}

#[test]
fn test_module_name_collisions_are_rejected() {
    let error = parse_source("main.rsc", "module m {\n}\nmodule m {\n}\n").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Module already exists with that name."
    );
}

#[test]
fn test_modules_cannot_nest_in_functions() {
    let error = parse_source(
        "main.rsc",
        "method: void f() {\n    module m {\n    }\n}\n",
    )
    .unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Modules are not allowed in a function body."
    );
}

#[test]
fn test_local_access_requires_a_module() {
    let error = parse_source("main.rsc", "::f();").unwrap_err();
    assert_eq!(error.kind.message(), "'::' can only be used inside a module.");
}
