//! Integration tests for conditional blocks.
//!
//! Covers comparison and truthiness clauses, `not` inversion, `and`/`or`
//! continuation clauses, chain handling for `elif`/`else`, and the
//! parse-time folding of constant comparisons.

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
fn test_comparisons_lower_to_conditional_blocks() {
    let outcome = parse_ok(
        r#"
x: int = 1;
if (x == 1) {
    x = 2;
}
"#,
    );
    assert_eq!(
        global_ops(&outcome),
        vec![Opcode::Create, Opcode::If, Opcode::Save, Opcode::EndIf]
    );

    let clause = &outcome.program.global.instructions[1];
    assert_eq!(clause.params.len(), 3);
    assert!(matches!(clause.params[0], RbcValue::Variable(_)));
    let op = clause.params[1].as_constant().unwrap();
    assert_eq!(op.kind, ConstantKind::Word);
    assert_eq!(op.text, "==");
    assert_eq!(clause.params[2].as_constant().unwrap().as_int(), Some(1));
}

#[test]
fn test_truthiness_clauses_carry_a_single_value() {
    let outcome = parse_ok("x: int = 1;\nif (x) {\n}\n");
    assert_eq!(
        global_ops(&outcome),
        vec![Opcode::Create, Opcode::If, Opcode::EndIf]
    );
    let clause = &outcome.program.global.instructions[1];
    assert_eq!(clause.params.len(), 1);
    assert!(matches!(clause.params[0], RbcValue::Variable(_)));
}

#[test]
fn test_not_inverts_the_clause_opcode() {
    let outcome = parse_ok(
        r#"
x: int = 1;
if (not x) {
} elif (not x) {
}
"#,
    );
    assert_eq!(
        global_ops(&outcome),
        vec![Opcode::Create, Opcode::Nif, Opcode::Nelif, Opcode::EndIf]
    );
}

#[test]
fn test_else_defers_the_block_end() {
    let outcome = parse_ok(
        r#"
x: int = 1;
if (x == 1) {
} else {
    x = 2;
}
"#,
    );
    assert_eq!(
        global_ops(&outcome),
        vec![
            Opcode::Create,
            Opcode::If,
            Opcode::Else,
            Opcode::Save,
            Opcode::EndIf,
        ]
    );
}

#[test]
fn test_chains_emit_a_single_end() {
    let outcome = parse_ok(
        r#"
x: int = 1;
if (x == 1) {
} elif (x == 2) {
} else {
}
"#,
    );
    assert_eq!(
        global_ops(&outcome),
        vec![
            Opcode::Create,
            Opcode::If,
            Opcode::Elif,
            Opcode::Else,
            Opcode::EndIf,
        ]
    );

    let elif = &outcome.program.global.instructions[2];
    assert_eq!(elif.params.len(), 3);
    assert_eq!(elif.params[1].as_constant().unwrap().text, "==");
}

#[test]
fn test_continuation_clauses_carry_their_combiner() {
    let outcome = parse_ok(
        r#"
x: int = 1;
if (x == 1 and x == 2 or x == 3) {
}
"#,
    );
    // One conditional instruction per clause; the backend folds the
    // marked continuations into the preceding comparison register.
    assert_eq!(
        global_ops(&outcome),
        vec![
            Opcode::Create,
            Opcode::If,
            Opcode::If,
            Opcode::If,
            Opcode::EndIf,
        ]
    );

    let second = &outcome.program.global.instructions[2];
    assert_eq!(second.params.len(), 4);
    let marker = second.params[0].as_constant().unwrap();
    assert_eq!(marker.kind, ConstantKind::Word);
    assert_eq!(marker.text, "and");

    let third = &outcome.program.global.instructions[3];
    assert_eq!(third.params[0].as_constant().unwrap().text, "or");
}

#[test]
fn test_constant_comparisons_fold_at_parse_time() {
    let outcome = parse_ok("if (1 == 1) {\n    x: int = 1;\n}\n");
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(
        outcome.warnings[0].kind.message(),
        "Comparing two constant values is not good practice."
    );
    assert_eq!(
        global_ops(&outcome),
        vec![Opcode::If, Opcode::Create, Opcode::EndIf]
    );
    let clause = &outcome.program.global.instructions[0];
    assert_eq!(clause.params.len(), 1);
    assert_eq!(clause.params[0].as_constant().unwrap().as_int(), Some(1));

    let outcome = parse_ok("if (1 == 2) {\n}\n");
    let clause = &outcome.program.global.instructions[0];
    assert_eq!(clause.params[0].as_constant().unwrap().as_int(), Some(0));

    let outcome = parse_ok("if (1 != 2) {\n}\n");
    let clause = &outcome.program.global.instructions[0];
    assert_eq!(clause.params[0].as_constant().unwrap().as_int(), Some(1));
}

#[test]
fn test_elif_requires_a_preceding_if() {
    let error = parse_source("main.rsc", "x: int = 1;\nelif (x == 1) {\n}\n").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "elif blocks can only be used after an if block."
    );
}

#[test]
fn test_statements_between_arms_break_the_chain() {
    let error = parse_source(
        "main.rsc",
        r#"
x: int = 1;
if (x == 1) {
}
x = 2;
elif (x == 2) {
}
"#,
    )
    .unwrap_err();
    assert_eq!(
        error.kind.message(),
        "elif blocks can only be used after an if block."
    );
}

#[test]
fn test_else_requires_a_preceding_if() {
    let error = parse_source("main.rsc", "else {\n}\n").unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Else and elif blocks can only be used after an if block."
    );
}

#[test]
fn test_else_cannot_follow_an_else() {
    let error = parse_source(
        "main.rsc",
        r#"
x: int = 1;
if (x == 1) {
} else {
} else {
}
"#,
    )
    .unwrap_err();
    assert_eq!(
        error.kind.message(),
        "Else and elif blocks cannot follow an else block."
    );
}
