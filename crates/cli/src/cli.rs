//! Command-line arguments of `rsc`.

use std::path::PathBuf;

use clap::Parser;

pub const USAGE: &str = "Usage: rsc <file> <out> or rsc -f <file> -o <out>";

/// Compiles a redscript source file into a Minecraft datapack.
#[derive(Parser, Debug)]
#[command(name = "rsc", version, about)]
pub struct Cli {
    /// Entry source file
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Folder the datapack is written to
    #[arg(short, long, value_name = "FOLDER")]
    pub out: Option<PathBuf>,

    /// Log the compiled instructions and write them to out.rbc
    #[arg(short, long)]
    pub debug: bool,

    /// `<file> <out>` given without flags
    #[arg(value_name = "ARGS", hide = true)]
    pub positional: Vec<PathBuf>,
}

/// A fully resolved invocation, every required argument present.
#[derive(Debug)]
pub struct Invocation {
    pub file: PathBuf,
    pub out: PathBuf,
    pub debug: bool,
}

impl Cli {
    /// Fills `-f`/`-o` from the positional arguments when the flags are
    /// absent, file first.
    pub fn resolve(self) -> Result<Invocation, &'static str> {
        let mut positional = self.positional.into_iter();
        let file = self.file.or_else(|| positional.next()).ok_or(USAGE)?;
        let out = self.out.or_else(|| positional.next()).ok_or(USAGE)?;
        Ok(Invocation {
            file,
            out,
            debug: self.debug,
        })
    }
}
