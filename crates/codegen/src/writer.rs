//! Lays a compiled program out on disk as a datapack.
//!
//! ```text
//! <out>/pack.mcmeta
//! <out>/data/<namespace>/function/<namespace>.mcfunction      (load entry)
//! <out>/data/<namespace>/function/<modules...>/<name>.mcfunction
//! ```
//!
//! The namespace must already be a valid resource location (the driver
//! normalizes it); it is used verbatim so the written paths agree with the
//! `function` commands referencing them.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::backend::McProgram;
use crate::error::CodegenResult;
use crate::templates::{MCMETA_FILE, PACK_DESCRIPTION, PACK_FORMAT};

#[derive(Serialize)]
struct PackMeta {
    pack: Pack,
}

#[derive(Serialize)]
struct Pack {
    pack_format: u32,
    description: &'static str,
}

/// Writes `program` under `out`, replacing any previous output for the
/// same namespace.
pub fn write_datapack(program: &McProgram, out: &Path, namespace: &str) -> CodegenResult<()> {
    fs::create_dir_all(out)?;

    let meta = PackMeta {
        pack: Pack {
            pack_format: PACK_FORMAT,
            description: PACK_DESCRIPTION,
        },
    };
    let meta = serde_json::to_string_pretty(&meta).map_err(io::Error::from)?;
    fs::write(out.join(MCMETA_FILE), meta)?;

    let data = out.join("data").join(namespace);
    if data.exists() {
        fs::remove_dir_all(&data)?;
    }
    let functions = data.join("function");
    fs::create_dir_all(&functions)?;

    write_commands(
        &functions.join(format!("{namespace}.mcfunction")),
        &program.global,
    )?;

    for function in &program.functions {
        let mut dir = functions.clone();
        for module in &function.module_path {
            dir.push(module);
        }
        fs::create_dir_all(&dir)?;
        write_commands(
            &dir.join(format!("{}.mcfunction", function.file_name())),
            &function.commands,
        )?;
    }
    Ok(())
}

fn write_commands(path: &Path, commands: &[String]) -> CodegenResult<()> {
    let mut content = commands.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}
