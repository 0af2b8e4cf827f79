//! Project configuration loaded from `rs.config`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, ErrorKind, ParseResult};

pub const CONFIG_FILE_NAME: &str = "rs.config";

/// Per-project settings. All fields are optional; a missing config file
/// behaves like an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RsConfig {
    /// Directory searched for imports that do not resolve next to the
    /// importing file.
    pub lib: Option<PathBuf>,
    /// Datapack namespace. Falls back to the entry file's stem.
    pub namespace: Option<String>,
}

impl RsConfig {
    /// Loads `rs.config` from `dir` if it exists.
    pub fn load(dir: &Path) -> ParseResult<Self> {
        Self::load_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads a config file from an explicit path.
    pub fn load_file(path: &Path) -> ParseResult<Self> {
        if !path.is_file() {
            return Ok(RsConfig::default());
        }
        let file = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|io| {
            Box::new(Error::new(
                ErrorKind::Config(format!("Could not read config: {io}.")),
                &file,
                None,
            ))
        })?;
        serde_json::from_str(&content).map_err(|json| {
            Box::new(
                Error::new(
                    ErrorKind::Config(format!("Malformed config: {json}.")),
                    &file,
                    None,
                )
                .with_note("expected JSON like {\"lib\": \"path\", \"namespace\": \"name\"}"),
            )
        })
    }

    /// The namespace to compile under, given the entry source file.
    pub fn namespace_for(&self, source: &Path) -> String {
        if let Some(namespace) = &self.namespace {
            return namespace.clone();
        }
        source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pack".into())
    }
}
