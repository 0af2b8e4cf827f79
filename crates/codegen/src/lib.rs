//! redscript back end: lowers a parsed [`Program`] to datapack commands.
//!
//! [`compile`] walks every function's instruction stream through a
//! [`CommandFactory`], producing an [`McProgram`] of rendered commands;
//! [`write_datapack`] lays that out on disk with its `pack.mcmeta`.
//!
//! ```no_run
//! use redscript_codegen::{compile, write_datapack};
//! use redscript_parser::parse_source;
//! use std::path::Path;
//!
//! let mut outcome = parse_source("main.rsc", "x: int = 1 + 2;")?;
//! let compiled = compile(&mut outcome.program, "pack")?;
//! write_datapack(&compiled.program, Path::new("out"), "pack")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Backend errors are fatal and abort the whole compilation; anything the
//! backend merely skips (unknown instructions, constant comparisons)
//! surfaces as a warning on the [`CodegenOutcome`].
//!
//! [`Program`]: redscript_parser::Program

pub mod backend;
pub mod command;
pub mod error;
pub mod factory;
pub mod natives;
pub mod templates;
pub mod writer;

pub use backend::{compile, CodegenOutcome, McFunction, McProgram};
pub use error::{CodegenError, CodegenResult};
pub use factory::{Clause, CommandFactory};
pub use writer::write_datapack;
