//! Fatal error channel for the interpreter.
//!
//! Fatal errors are unrecoverable: they carry a kind from the descriptive
//! taxonomy, a message, and (once attached by the runtime) a snapshot of the
//! document at the moment of failure. They are not catchable from inside a
//! JISP program; the CLI renders them and terminates with a non-zero exit.
//! The recoverable channel — structured error values produced by `test` —
//! lives on the operand stack as plain JSON and never passes through here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Descriptive error taxonomy shared by fatal errors and structured error
/// objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalKind {
    StackUnderflow,
    TypeMismatch,
    InvalidPath,
    NotFound,
    IoError,
    InvalidDirective,
    AssertionFailure,
    TestFailure,
}

impl FatalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatalKind::StackUnderflow => "stack_underflow",
            FatalKind::TypeMismatch => "type_mismatch",
            FatalKind::InvalidPath => "invalid_path",
            FatalKind::NotFound => "not_found",
            FatalKind::IoError => "io_error",
            FatalKind::InvalidDirective => "invalid_directive",
            FatalKind::AssertionFailure => "assertion_failure",
            FatalKind::TestFailure => "test_failure",
        }
    }
}

/// Unrecoverable interpreter error.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct Fatal {
    pub kind: FatalKind,
    pub message: String,
    /// Document state captured when the error crossed the runtime boundary.
    pub snapshot: Option<Value>,
}

impl Fatal {
    pub fn new(kind: FatalKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            snapshot: None,
        }
    }

    /// Attach a state snapshot unless one was already captured deeper down.
    pub fn with_snapshot(mut self, root: &Value) -> Self {
        if self.snapshot.is_none() {
            self.snapshot = Some(root.clone());
        }
        self
    }
}

/// Shorthand constructor used throughout the opcode library.
pub fn fatal(kind: FatalKind, message: impl Into<String>) -> Fatal {
    Fatal::new(kind, message)
}
