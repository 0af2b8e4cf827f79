//! The compilation pipeline, from `rs.config` to a written datapack.
//!
//! Stages run in a fixed order: configuration, preprocessing, parsing,
//! byte code lowering, datapack layout. The first failing stage renders
//! its diagnostic and stops the run; warnings render as they surface and
//! never do.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use owo_colors::OwoColorize;
use redscript_codegen::templates::DATAPACK_FOLDER;
use redscript_codegen::{compile, write_datapack};
use redscript_parser::error::Severity;
use redscript_parser::helpers::sanitize_path_component;
use redscript_parser::{preprocess, Error, Parser, ProjectFragment, Report, RsConfig};

use crate::cli::Invocation;

/// Marker for a stage that has already rendered its diagnostic.
pub struct Terminated;

pub fn run(invocation: Invocation) -> ExitCode {
    match compile_project(&invocation) {
        Ok(out) => {
            success(&format!("Compiled successfully to {}.", out.display()));
            ExitCode::SUCCESS
        }
        Err(Terminated) => ExitCode::FAILURE,
    }
}

/// Runs every compilation stage and returns the folder the datapack
/// landed in.
pub fn compile_project(invocation: &Invocation) -> Result<PathBuf, Terminated> {
    let config = RsConfig::load(Path::new(".")).map_err(|error| diagnose(&error, &[]))?;

    info("Preprocessing...");
    let fragments = preprocess(&invocation.file, &config).map_err(|error| diagnose(&error, &[]))?;

    if invocation.debug {
        let count: usize = fragments.iter().map(|fragment| fragment.tokens.len()).sum();
        info(&format!("Token Count: {count}"));
        for fragment in &fragments {
            for token in &fragment.tokens {
                eprintln!("{:?} '{}'", token.kind, token.text);
            }
        }
    }

    info("Compiling...");
    let outcome = match Parser::new(&fragments).parse() {
        Ok(outcome) => outcome,
        Err(error) => {
            diagnose(&error, &fragments);
            failure("Program compilation terminated.");
            return Err(Terminated);
        }
    };
    for warning in &outcome.warnings {
        report(warning, &fragments, Severity::Warning);
    }

    let mut program = outcome.program;
    if invocation.debug {
        info("Writing byte code to out.rbc...");
        let listing = program.dump();
        eprint!("{listing}");
        if let Err(io) = fs::write("out.rbc", &listing) {
            failure(&format!("Could not write out.rbc: {io}."));
        }
    }

    let namespace = namespace_for(&config, &invocation.file);
    let lowered = compile(&mut program, &namespace)
        .map_err(|error| diagnose(&error.into_diagnostic(), &fragments))?;
    for warning in &lowered.warnings {
        report(warning, &fragments, Severity::Warning);
    }

    let out = resolve_out(&invocation.out);
    write_datapack(&lowered.program, &out, &namespace)
        .map_err(|error| diagnose(&error.into_diagnostic(), &fragments))?;
    Ok(out)
}

/// Datapack namespace for this run: the configured name (or the entry
/// file's stem), lowercased and reduced to resource location characters.
fn namespace_for(config: &RsConfig, file: &Path) -> String {
    let namespace = sanitize_path_component(&config.namespace_for(file).to_lowercase());
    if namespace.is_empty() {
        "pack".into()
    } else {
        namespace
    }
}

/// Relative output folders land inside the world's datapack folder;
/// absolute paths are taken as given.
fn resolve_out(out: &Path) -> PathBuf {
    if out.is_absolute() {
        out.to_path_buf()
    } else {
        Path::new(DATAPACK_FOLDER).join(out)
    }
}

fn diagnose(error: &Error, fragments: &[ProjectFragment]) -> Terminated {
    report(error, fragments, Severity::Error);
    Terminated
}

/// Renders a diagnostic against the source of the file it points into.
/// Files outside the preprocessed set (the config, a missing import) are
/// re-read from disk so the snippet can still be shown.
fn report(error: &Error, fragments: &[ProjectFragment], severity: Severity) {
    let fragment = fragments.iter().find(|fragment| fragment.file == error.file);
    let fallback = match fragment {
        None if !error.file.is_empty() => fs::read_to_string(&error.file).ok(),
        _ => None,
    };
    let source = fragment
        .map(|fragment| fragment.source.as_str())
        .or(fallback.as_deref());
    eprint!("{}", Report::new(error, source).render(severity));
}

fn info(message: &str) {
    eprintln!("{} {message}", "[INFO]".cyan().bold());
}

fn success(message: &str) {
    eprintln!("{} {message}", "[SUCCESS]".green().bold());
}

fn failure(message: &str) {
    eprintln!("{} {message}", "[ERROR]".red().bold());
}
