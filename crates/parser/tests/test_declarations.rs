//! Integration tests for variable declarations and assignment.
//!
//! Covers typed declarations and their emitted `CREATE` instructions,
//! constant folding of initializers, optional and union types, list and
//! object literals, constants, shadowing, and compound assignment.

use redscript_parser::ir::{ConstantKind, Opcode, RbcValue};
use redscript_parser::types::type_ids;
use redscript_parser::{parse_source, ParseOutcome};

/// Parses source expected to be valid, panicking with the rendered
/// message otherwise.
fn parse_ok(source: &str) -> ParseOutcome {
    match parse_source("main.rsc", source) {
        Ok(outcome) => outcome,
        Err(error) => panic!("parse failed: {error}"),
    }
}

/// Opcodes of the file-level instruction stream.
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
fn test_constant_initializers_fold_to_one_literal() {
    let outcome = parse_ok("x: int = 2 + 3 * 4;");
    assert_eq!(global_ops(&outcome), vec![Opcode::Create]);

    let program = &outcome.program;
    let create = &program.global.instructions[0];
    let variable = create.params[0].as_variable().unwrap();
    assert_eq!(program.variable(variable).name, "x");
    assert_eq!(program.variable(variable).scope, 0);
    assert!(program.variable(variable).global);
    assert_eq!(create.params[1].as_constant().unwrap().as_int(), Some(14));
}

#[test]
fn test_bare_declarations_create_with_a_default() {
    let outcome = parse_ok("x: int;");
    assert_eq!(global_ops(&outcome), vec![Opcode::Create]);

    let create = &outcome.program.global.instructions[0];
    assert_eq!(create.params.len(), 1);
    let variable = create.params[0].as_variable().unwrap();
    let declared = &outcome.program.variable(variable).declared_type;
    assert_eq!(declared.type_id, type_ids::INT);
}

#[test]
fn test_literals_keep_their_kind() {
    let outcome = parse_ok(
        "s: string = \"hello\"; \
         f: float = 1.5; \
         flag: bool = true;",
    );
    assert_eq!(
        global_ops(&outcome),
        vec![Opcode::Create, Opcode::Create, Opcode::Create]
    );

    let constants: Vec<_> = outcome
        .program
        .global
        .instructions
        .iter()
        .map(|instruction| instruction.params[1].as_constant().unwrap())
        .collect();
    assert_eq!(constants[0].kind, ConstantKind::Str);
    assert_eq!(constants[0].text, "hello");
    assert_eq!(constants[1].kind, ConstantKind::Float);
    assert_eq!(constants[1].text, "1.5");
    // Booleans are scoreboard ints on the target.
    assert_eq!(constants[2].kind, ConstantKind::Int);
    assert_eq!(constants[2].text, "1");
}

#[test]
fn test_optional_types_accept_null_and_plain_values() {
    let outcome = parse_ok("o: int? = null;");
    let create = &outcome.program.global.instructions[0];
    assert_eq!(create.params[1].as_constant().unwrap().kind, ConstantKind::Null);

    parse_ok("p: int? = 3;");
}

#[test]
fn test_union_alternatives_accept_either_side() {
    parse_ok("v: int|string = \"hi\";");
    parse_ok("w: int|string = 3;");

    let error = parse_source("main.rsc", "u: int|string = 1.5;").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Cannot assign a value of type 'float' to 'int|string'."
    );
}

#[test]
fn test_mismatched_initializers_are_rejected() {
    let error = parse_source("main.rsc", "x: int = \"hi\";").unwrap_err();
    assert_eq!(error.code().as_str(), "E0001");
    assert_eq!(
        error.kind.message(),
        "Cannot assign a value of type 'string' to 'int'."
    );
}

#[test]
fn test_void_variables_are_rejected() {
    let error = parse_source("main.rsc", "x: void;").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Variables cannot be declared with type 'void'."
    );
}

#[test]
fn test_redeclaring_at_the_same_depth_is_rejected() {
    let error = parse_source("main.rsc", "x: int = 1; x: int = 2;").unwrap_err();
    assert!(error.kind.message().contains("already exists"));
}

#[test]
fn test_deeper_blocks_may_shadow() {
    let outcome = parse_ok("x: int = 1; { x: string = \"s\"; }");
    assert_eq!(
        global_ops(&outcome),
        vec![Opcode::Create, Opcode::Inc, Opcode::Create, Opcode::Dec]
    );
    assert_eq!(outcome.program.variables[0].scope, 0);
    assert_eq!(outcome.program.variables[1].scope, 1);
}

#[test]
fn test_extra_closing_brace_is_rejected() {
    let error = parse_source("main.rsc", "x: int = 1; }").unwrap_err();
    assert_eq!(error.code().as_str(), "E0001");
    assert_eq!(error.kind.message(), "Unmatched closing bracket.");

    let error = parse_source("main.rsc", "{ x: int = 1; } }").unwrap_err();
    assert_eq!(error.kind.message(), "Unmatched closing bracket.");
}

#[test]
fn test_constants_must_be_typed_initialized_and_fixed() {
    let error = parse_source("main.rsc", "const x = 5;").unwrap_err();
    assert!(error.kind.message().contains("must declare a type"));

    let error = parse_source("main.rsc", "const x: int;").unwrap_err();
    assert!(error.kind.message().contains("must be given a value"));

    let error = parse_source("main.rsc", "const x: int = 1; x = 2;").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Cannot reassign constant variable 'x'."
    );

    let outcome = parse_ok("const x: int = 1;");
    assert!(outcome.program.variables[0].is_const);
}

#[test]
fn test_assignment_overwrites_an_existing_variable() {
    let outcome = parse_ok("x: int = 1; x = 2;");
    assert_eq!(global_ops(&outcome), vec![Opcode::Create, Opcode::Save]);

    let save = &outcome.program.global.instructions[1];
    assert!(save.params[0].as_variable().is_some());
    assert_eq!(save.params[1].as_constant().unwrap().as_int(), Some(2));

    let error = parse_source("main.rsc", "y = 2;").unwrap_err();
    assert_eq!(error.kind.message(), "Unknown variable 'y'.");
}

#[test]
fn test_compound_assignment_stages_through_a_register() {
    let outcome = parse_ok("x: int = 1; x += 2;");
    assert_eq!(
        global_ops(&outcome),
        vec![Opcode::Create, Opcode::Save, Opcode::Math, Opcode::Save]
    );

    let instructions = &outcome.program.global.instructions;
    assert!(instructions[1].params[0].as_register().is_some());
    // The operator rides as an int constant in the third parameter.
    assert_eq!(instructions[2].params[2].as_constant().unwrap().as_int(), Some(0));
    assert!(instructions[3].params[0].as_variable().is_some());

    let error =
        parse_source("main.rsc", "s: string = \"a\"; s += \"b\";").unwrap_err();
    assert!(error
        .kind
        .message()
        .contains("Compound assignment needs an 'int' variable"));
}

#[test]
fn test_lists_declare_with_array_types() {
    let outcome = parse_ok("xs: int[] = [1, 2, 3];");
    assert_eq!(global_ops(&outcome), vec![Opcode::Create]);
    let create = &outcome.program.global.instructions[0];
    assert!(matches!(create.params[1], RbcValue::List(_)));

    let error = parse_source("main.rsc", "xs: int[] = [1, \"two\"];").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "List elements must be 'int', found 'string'."
    );

    let error = parse_source("main.rsc", "n: int = [1];").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Cannot assign a value of type 'int[]' to 'int'."
    );
}

#[test]
fn test_object_literals_check_against_the_declared_shape() {
    let outcome = parse_ok(
        r#"
obj point {
    x: int;
    y: int;
}
p: point = {x: 1, y: 2};
"#,
    );
    assert!(outcome.program.object_table.contains_key("point"));
    assert_eq!(global_ops(&outcome), vec![Opcode::Create]);

    let error = parse_source(
        "main.rsc",
        r#"
obj point {
    x: int;
    y: int;
}
p: point = {x: 1};
"#,
    )
    .unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Missing required member 'y' for object type 'point'."
    );

    let error = parse_source(
        "main.rsc",
        r#"
obj point {
    x: int;
    y: int;
}
p: point = {x: 1, y: 2, z: 3};
"#,
    )
    .unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Object type 'point' has no member 'z'."
    );
}

#[test]
fn test_optional_members_may_be_omitted() {
    parse_ok(
        r#"
obj point {
    x: int;
    optional y: int;
}
p: point = {x: 1};
"#,
    );
}

#[test]
fn test_paths_assign_into_member_storage() {
    let outcome = parse_ok(
        r#"
obj point {
    x: int;
}
p: point = {x: 1};
p.x = 5;
"#,
    );
    assert_eq!(global_ops(&outcome), vec![Opcode::Create, Opcode::Save]);
    let save = &outcome.program.global.instructions[1];
    assert!(matches!(save.params[0], RbcValue::Path(_)));

    let error = parse_source(
        "main.rsc",
        r#"
obj point {
    x: int;
}
p: point = {x: 1};
p.x += 1;
"#,
    )
    .unwrap_err();
    assert_eq!(error.code().as_str(), "E0003");
    assert!(error
        .kind
        .message()
        .contains("Compound assignment is not supported"));
}

#[test]
fn test_reserved_keywords_are_reported() {
    let error = parse_source("main.rsc", "for x in xs { }").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "'for' is reserved and not implemented yet."
    );
}
