//! One generated command, held structured until rendering.
//!
//! Keeping conditions and store clauses out of the body text until the last
//! moment lets the factory wrap a finished command in the guards of every
//! conditional block it sits inside, without re-parsing anything.

use smallvec::SmallVec;
use std::fmt::Write;

use crate::templates::PROGRAM_STORAGE;

/// Root keyword of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Data,
    Scoreboard,
    Function,
    Return,
    Tellraw,
    Kill,
}

impl CommandKind {
    pub fn keyword(self) -> &'static str {
        match self {
            CommandKind::Data => "data",
            CommandKind::Scoreboard => "scoreboard",
            CommandKind::Function => "function",
            CommandKind::Return => "return",
            CommandKind::Tellraw => "tellraw",
            CommandKind::Kill => "kill",
        }
    }
}

/// An `if`/`unless` guard on an `execute` chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Render as `unless` instead of `if`.
    pub invert: bool,
    /// The test after the keyword, e.g. `score _CPU cmp0 matches 1`.
    pub test: String,
}

impl Condition {
    pub fn score_matches(score: &str, value: impl std::fmt::Display, invert: bool) -> Condition {
        Condition {
            invert,
            test: format!("score {score} matches {value}"),
        }
    }

    pub fn scores_equal(lhs: &str, rhs: &str, invert: bool) -> Condition {
        Condition {
            invert,
            test: format!("score {lhs} = {rhs}"),
        }
    }
}

/// A `store result`/`store success` clause on an `execute` chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    /// `store success` rather than `store result`.
    pub success: bool,
    /// Everything after the mode word, e.g. `score _CPU cmp0` or
    /// `storage redscript:_program variables[0].v int 1`.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub body: String,
    pub conditions: SmallVec<[Condition; 2]>,
    pub store: Option<Store>,
}

impl Command {
    pub fn new(kind: CommandKind, body: impl Into<String>) -> Self {
        Command {
            kind,
            body: body.into(),
            conditions: SmallVec::new(),
            store: None,
        }
    }

    /// Storage mutation under the program namespace; `body` starts at the
    /// data subcommand (`modify ...`, `remove ...`, `merge ...`).
    pub fn data(body: impl Into<String>) -> Self {
        Command::new(CommandKind::Data, body)
    }

    pub fn scoreboard(body: impl Into<String>) -> Self {
        Command::new(CommandKind::Scoreboard, body)
    }

    /// `data modify <dest> set from storage <src>`, both under the program
    /// namespace.
    pub fn copy_storage(dest: &str, src: &str) -> Self {
        Command::data(format!(
            "modify storage {PROGRAM_STORAGE} {dest} set from storage {PROGRAM_STORAGE} {src}"
        ))
    }

    /// `data modify <dest> set value <value>`.
    pub fn set_storage(dest: &str, value: &str) -> Self {
        Command::data(format!(
            "modify storage {PROGRAM_STORAGE} {dest} set value {value}"
        ))
    }

    /// `data modify <dest> append value <value>`.
    pub fn append_value(dest: &str, value: &str) -> Self {
        Command::data(format!(
            "modify storage {PROGRAM_STORAGE} {dest} append value {value}"
        ))
    }

    /// `data modify <dest> append from storage <src>`.
    pub fn append_storage(dest: &str, src: &str) -> Self {
        Command::data(format!(
            "modify storage {PROGRAM_STORAGE} {dest} append from storage {PROGRAM_STORAGE} {src}"
        ))
    }

    /// `data get` of a program storage path, for use under `store result`.
    pub fn get_storage(path: &str) -> Self {
        Command::data(format!("get storage {PROGRAM_STORAGE} {path}"))
    }

    /// `scoreboard players get`, for use under `store result`.
    pub fn get_score(score: &str) -> Self {
        Command::scoreboard(format!("players get {score}"))
    }

    pub fn guarded(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn store_result(mut self, target: impl Into<String>) -> Self {
        self.store = Some(Store {
            success: false,
            target: target.into(),
        });
        self
    }

    pub fn store_success(mut self, target: impl Into<String>) -> Self {
        self.store = Some(Store {
            success: true,
            target: target.into(),
        });
        self
    }

    /// Store clause writing into a program storage path as a scaled int.
    pub fn store_result_storage(self, path: &str) -> Self {
        self.store_result(format!("storage {PROGRAM_STORAGE} {path} int 1"))
    }

    /// Final command text. Bare commands render as `<keyword> <body>`;
    /// anything guarded or storing renders through an `execute` chain.
    pub fn render(&self) -> String {
        if self.conditions.is_empty() && self.store.is_none() {
            return format!("{} {}", self.kind.keyword(), self.body);
        }

        let mut out = String::from("execute");
        for condition in &self.conditions {
            let keyword = if condition.invert { "unless" } else { "if" };
            let _ = write!(out, " {keyword} {}", condition.test);
        }
        if let Some(store) = &self.store {
            let mode = if store.success { "success" } else { "result" };
            let _ = write!(out, " store {mode} {}", store.target);
        }
        let _ = write!(out, " run {} {}", self.kind.keyword(), self.body);
        out
    }
}
