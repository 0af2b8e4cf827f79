//! The storage layout every generated command agrees on.
//!
//! Compiled programs keep all mutable state in one storage namespace plus
//! a set of scoreboard objectives:
//!
//! * `redscript:_program variables` holds one `{v, s, t}` entry per live
//!   variable (value, scope depth, type tag), indexed by creation order.
//! * `redscript:_program registers` backs the non-operable registers;
//!   operable registers live in per-register `r<n>` objectives instead so
//!   `scoreboard players operation` can reach them.
//! * `cmp<n>` objectives hold comparison outcomes, `temp` (objective and
//!   storage key both) stages values that have to cross between the two
//!   worlds.

/// Storage namespace all program data lives in.
pub const PROGRAM_STORAGE: &str = "redscript:_program";

/// Fake player every scoreboard value is keyed on.
pub const SCORE_HOLDER: &str = "_CPU";

/// Scratch objective used when a storage value has to enter a scoreboard.
pub const TEMP_OBJECTIVE: &str = "temp";

/// Keys inside [`PROGRAM_STORAGE`].
pub const VARIABLES: &str = "variables";
pub const REGISTERS: &str = "registers";
pub const RETURN_SLOT: &str = "ret";
pub const RETURN_TYPE_SLOT: &str = "ret_type";
pub const TEMP_SLOT: &str = "temp";

/// Initial program state merged on load. `_internal` and `stack` are
/// reserved for runtime bookkeeping and stay empty at compile time.
pub const DEFAULT_PROGRAM_STATE: &str =
    r#"{"variables": [], "registers": [], "_internal": {}, "stack": [], "ret": 0, "temp": 0}"#;

/// Folder a world expects datapacks under; the driver resolves relative
/// output paths against it.
pub const DATAPACK_FOLDER: &str = "datapacks";

pub const MCMETA_FILE: &str = "pack.mcmeta";
pub const PACK_FORMAT: u32 = 48;
pub const PACK_DESCRIPTION: &str = "Compiled by rsc";

/// Objective backing operable register `id`.
pub fn operable_objective(id: u32) -> String {
    format!("r{id}")
}

/// Objective holding the outcome of comparison register `id`.
pub fn comparison_objective(id: u32) -> String {
    format!("cmp{id}")
}

/// A `<holder> <objective>` pair as score-bearing commands expect it.
pub fn score(objective: &str) -> String {
    format!("{SCORE_HOLDER} {objective}")
}

pub fn operable_score(id: u32) -> String {
    score(&operable_objective(id))
}

pub fn comparison_score(id: u32) -> String {
    score(&comparison_objective(id))
}

/// NBT path of a variable's whole `{v, s, t}` entry.
pub fn variable_entry(slot: u32) -> String {
    format!("{VARIABLES}[{slot}]")
}

/// NBT path of a variable's value.
pub fn variable_value(slot: u32) -> String {
    format!("{VARIABLES}[{slot}].v")
}

/// NBT path of a variable's runtime type tag.
pub fn variable_type(slot: u32) -> String {
    format!("{VARIABLES}[{slot}].t")
}

/// NBT path of non-operable register `id`.
pub fn register_path(id: u32) -> String {
    format!("{REGISTERS}[{id}]")
}

/// A fresh `{v, s, t}` entry. `value` must already be rendered (strings
/// quoted, lists bracketed).
pub fn variable_state(value: &str, scope: i32, type_tag: i32) -> String {
    format!(r#"{{"v": {value}, "s": {scope}, "t": {type_tag}}}"#)
}
