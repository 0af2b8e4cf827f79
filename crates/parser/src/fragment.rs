//! Source fragments and `use`-import preprocessing.
//!
//! A compilation works over an ordered list of fragments, one per source
//! file. [`preprocess`] reads the entry file, strips every `use`
//! statement out of its token stream, and recursively loads the imported
//! files first, so the final fragment order guarantees that an import is
//! always parsed before the file importing it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::fs;

use crate::config::RsConfig;
use crate::error::{Error, ErrorKind, ParseResult};
use crate::lexer::{tokenize, Token, TokenKind, Trace};

pub const SOURCE_EXTENSION: &str = "rsc";

/// One lexed source file, with its `use` statements already resolved and
/// removed.
#[derive(Debug)]
pub struct ProjectFragment {
    /// Path as it should appear in diagnostics.
    pub file: String,
    /// Original text, kept for error snippets.
    pub source: String,
    pub tokens: Vec<Token>,
}

/// Reads and lexes `entry` plus everything it transitively imports.
///
/// Fragments come back in dependency order: every imported file appears
/// before its importer, the entry file last. Importing the same file
/// twice anywhere in the graph is an error, including a file importing
/// itself.
pub fn preprocess(entry: &Path, config: &RsConfig) -> ParseResult<Vec<ProjectFragment>> {
    let mut fragments = Vec::new();
    let mut visited = HashSet::new();

    let canonical = fs::canonicalize(entry).map_err(|io| {
        Box::new(Error::new(
            ErrorKind::Syntax(format!("Could not open file: {io}.")),
            &entry.display().to_string(),
            None,
        ))
    })?;
    visited.insert(canonical);

    load_fragment(entry, config, &mut fragments, &mut visited)?;
    Ok(fragments)
}

fn load_fragment(
    path: &Path,
    config: &RsConfig,
    fragments: &mut Vec<ProjectFragment>,
    visited: &mut HashSet<PathBuf>,
) -> ParseResult<()> {
    let file = path.display().to_string();
    let source = fs::read_to_string(path).map_err(|io| {
        Box::new(Error::new(
            ErrorKind::Syntax(format!("Could not read file: {io}.")),
            &file,
            None,
        ))
    })?;
    let tokens = tokenize(&file, &source)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tokens = resolve_imports(tokens, &file, dir, config, fragments, visited)?;
    fragments.push(ProjectFragment {
        file,
        source,
        tokens,
    });
    Ok(())
}

/// Walks a token stream, loading each `use a.b.c;` target and dropping
/// the statement's tokens from the stream.
fn resolve_imports(
    tokens: Vec<Token>,
    file: &str,
    dir: &Path,
    config: &RsConfig,
    fragments: &mut Vec<ProjectFragment>,
    visited: &mut HashSet<PathBuf>,
) -> ParseResult<Vec<Token>> {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut cursor = tokens.into_iter().peekable();

    while let Some(token) = cursor.next() {
        if token.kind != TokenKind::Use {
            kept.push(token);
            continue;
        }

        let use_trace = token.trace;
        let mut parts = Vec::new();
        loop {
            match cursor.next() {
                Some(part) if part.kind == TokenKind::Word => parts.push(part.text),
                Some(other) => {
                    return Err(Error::new(
                        ErrorKind::Syntax("Expected a module path after 'use'.".into()),
                        file,
                        Some(other.trace),
                    )
                    .into());
                }
                None => return Err(eof_error(file, use_trace)),
            }
            match cursor.next() {
                Some(dot) if dot.kind == TokenKind::Dot => continue,
                Some(semi) if semi.kind == TokenKind::Semicolon => break,
                Some(other) => {
                    return Err(Error::new(
                        ErrorKind::Syntax("Expected ';' after import.".into()),
                        file,
                        Some(other.trace),
                    )
                    .into());
                }
                None => return Err(eof_error(file, use_trace)),
            }
        }

        let target = locate_import(&parts, dir, config).ok_or_else(|| {
            Box::new(Error::new(
                ErrorKind::Syntax(format!("Could not find module '{}'.", parts.join("."))),
                file,
                Some(use_trace),
            ))
        })?;
        let canonical = fs::canonicalize(&target).map_err(|io| {
            Box::new(Error::new(
                ErrorKind::Syntax(format!("Could not open '{}': {io}.", target.display())),
                file,
                Some(use_trace),
            ))
        })?;
        if !visited.insert(canonical) {
            return Err(Error::new(
                ErrorKind::AlreadyIncluded(format!(
                    "Module '{}' is imported more than once.",
                    parts.join(".")
                )),
                file,
                Some(use_trace),
            )
            .into());
        }
        load_fragment(&target, config, fragments, visited)?;
    }

    Ok(kept)
}

/// Maps `a.b.c` to `a/b/c.rsc`, first next to the importing file, then
/// under the configured library directory.
fn locate_import(parts: &[String], dir: &Path, config: &RsConfig) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for part in parts {
        relative.push(part);
    }
    let relative = relative.with_extension(SOURCE_EXTENSION);

    let local = dir.join(&relative);
    if local.is_file() {
        return Some(local);
    }
    if let Some(lib) = &config.lib {
        let fallback = lib.join(&relative);
        if fallback.is_file() {
            return Some(fallback);
        }
    }
    None
}

fn eof_error(file: &str, trace: Trace) -> Box<Error> {
    Box::new(Error::new(
        ErrorKind::UnexpectedEof("Import statement is unfinished.".into()),
        file,
        Some(trace),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn single_file_keeps_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "main.rsc", "int x = 1;");
        let fragments = preprocess(&entry, &RsConfig::default()).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].tokens.len(), 5);
    }

    #[test]
    fn imports_come_first_and_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "util.rsc", "int shared = 0;");
        let entry = write(dir.path(), "main.rsc", "use util;\nint x = shared;");
        let fragments = preprocess(&entry, &RsConfig::default()).unwrap();

        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].file.ends_with("util.rsc"));
        assert!(fragments[1].file.ends_with("main.rsc"));
        // No Use token survives in the importer.
        assert!(fragments[1]
            .tokens
            .iter()
            .all(|token| token.kind != TokenKind::Use));
    }

    #[test]
    fn nested_imports_are_post_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "c.rsc", "int c = 0;");
        write(dir.path(), "b.rsc", "use c;\nint b = 0;");
        let entry = write(dir.path(), "a.rsc", "use b;\nint a = 0;");
        let fragments = preprocess(&entry, &RsConfig::default()).unwrap();

        let order: Vec<&str> = fragments
            .iter()
            .map(|fragment| {
                Path::new(&fragment.file)
                    .file_name()
                    .unwrap()
                    .to_str()
                    .unwrap()
            })
            .collect();
        assert_eq!(order, ["c.rsc", "b.rsc", "a.rsc"]);
    }

    #[test]
    fn dotted_paths_map_to_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "std/math.rsc", "int pi = 3;");
        let entry = write(dir.path(), "main.rsc", "use std.math;");
        let fragments = preprocess(&entry, &RsConfig::default()).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].file.contains("math"));
    }

    #[test]
    fn duplicate_import_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "util.rsc", "int u = 0;");
        let entry = write(dir.path(), "main.rsc", "use util;\nuse util;");
        let err = preprocess(&entry, &RsConfig::default()).unwrap_err();
        assert_eq!(err.code().as_str(), "E0004");
    }

    #[test]
    fn self_import_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "main.rsc", "use main;");
        let err = preprocess(&entry, &RsConfig::default()).unwrap_err();
        assert_eq!(err.code().as_str(), "E0004");
    }

    #[test]
    fn lib_directory_is_a_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib/vec.rsc", "int len = 0;");
        let entry = write(dir.path(), "src/main.rsc", "use vec;");
        let config = RsConfig {
            lib: Some(dir.path().join("lib")),
            namespace: None,
        };
        let fragments = preprocess(&entry, &config).unwrap();
        assert_eq!(fragments.len(), 2);
    }

    #[test]
    fn missing_module_is_a_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "main.rsc", "use nowhere;");
        let err = preprocess(&entry, &RsConfig::default()).unwrap_err();
        assert_eq!(err.code().as_str(), "E0001");
    }

    #[test]
    fn unfinished_import_is_eof() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "main.rsc", "use util");
        let err = preprocess(&entry, &RsConfig::default()).unwrap_err();
        assert_eq!(err.code().as_str(), "E0002");
    }
}
