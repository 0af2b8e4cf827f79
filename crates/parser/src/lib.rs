//! redscript front end: lexer, importer, parser and the RBC intermediate
//! representation.
//!
//! A compilation runs in fixed stages:
//!
//! 1. [`RsConfig::load`] reads the project's `rs.config`.
//! 2. [`preprocess`] lexes the entry file and everything it `use`s,
//!    returning fragments in dependency order.
//! 3. [`Parser::parse`] compiles the fragments directly into a
//!    [`Program`] of stack-machine instructions; there is no syntax tree
//!    in between.
//!
//! The backend crate turns the [`Program`] into datapack functions.
//!
//! ```no_run
//! use redscript_parser::{parse_source, RsConfig};
//!
//! let outcome = parse_source("main.rsc", "x: int = 1 + 2;")?;
//! println!("{}", outcome.program.dump());
//! # Ok::<(), Box<redscript_parser::Error>>(())
//! ```
//!
//! Compilation is fail-fast: the first error aborts and is rendered with
//! its source snippet by [`Report`]. Warnings are collected and do not
//! stop the run.

pub mod config;
pub mod error;
pub mod fragment;
pub mod helpers;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod types;

pub use config::{RsConfig, CONFIG_FILE_NAME};
pub use error::{Error, ErrorKind, ParseResult, Report, ReportConfig};
pub use fragment::{preprocess, ProjectFragment, SOURCE_EXTENSION};
pub use ir::Program;
pub use lexer::tokenize;
pub use parser::{ParseOutcome, Parser};
pub use types::TypeInfo;

/// Parses a single in-memory source string, without imports or a project
/// configuration. Mainly useful for tests and tooling.
pub fn parse_source(file: &str, source: &str) -> ParseResult<ParseOutcome> {
    let tokens = tokenize(file, source)?;
    let fragments = vec![ProjectFragment {
        file: file.to_string(),
        source: source.to_string(),
        tokens,
    }];
    Parser::new(&fragments).parse()
}
