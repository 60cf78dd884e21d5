//! # jisp-core
//!
//! Core interpreter for **JISP**: a stack virtual machine whose entire state
//! — instruction stream, operand stack, register file, call-stack mirror,
//! and undo log — lives inside a single mutable JSON document. Executing a
//! program mutates its document in place; the final document is the output.
//!
//! ## Module Roles
//!
//! | Module | Responsibility | Public Entry Points |
//! |---|---|---|
//! | `runtime` | Entrypoint walker, opcode registry, opcode library | [`Vm`], [`Opcodes`], [`Opcode`] |
//! | `doc` | Mutable document, retain count, deep copy | [`Document`], [`deep_copy`] |
//! | `pointer` | RFC 6901 resolution and path encoding | [`pointer::resolve`], [`pointer::path_for_key`] |
//! | `handle` | Path-pinned pointer handles (the JPM stack) | [`PtrHandle`], [`PtrStack`] |
//! | `residual` | Reversible patch log and inverse replay | [`residual::record`], [`residual::perform_undo`] |
//! | `sandbox` | Isolated sub-execution for `test`/`step`/`undo` | [`sandbox::run_program`] |
//! | `reader` | Lenient parsing and multi-value input streams | [`reader::read_value`], [`ValueStream`] |
//! | `error` | Fatal error channel | [`Fatal`], [`FatalKind`] |
//!
//! ## Execution Contract
//!
//! 1. Parse one JSON value (lenient: comments, trailing commas).
//! 2. Run it as a document; only objects with an `entrypoint` array do work.
//! 3. The mutated document is the result. Fatal errors abort with a state
//!    snapshot; they are not catchable from inside a program.
//!
//! ## Hello World
//!
//! ```no_run
//! use jisp_core::run;
//! use serde_json::json;
//!
//! let out = run(json!({
//!     "stack": [],
//!     "entrypoint": [10, 20, {".": "add_two_top"}, "sum", {".": "pop_and_store"}]
//! }))
//! .expect("run");
//! assert_eq!(out["sum"], json!(30));
//! ```

use serde_json::Value;

pub mod doc;
pub mod error;
pub mod handle;
pub mod pointer;
pub mod reader;
pub mod residual;
pub mod runtime;
pub mod sandbox;

pub use doc::{deep_copy, DocRef, Document};
pub use error::{Fatal, FatalKind};
pub use handle::{PtrHandle, PtrStack};
pub use pointer::PointerError;
pub use reader::{ReadError, ValueStream};
pub use runtime::{render, subset_match, Opcode, Opcodes, OutputOptions, Vm};

/// Execute a program document with default output options and return the
/// final document. Documents without an `entrypoint` pass through (plus the
/// bookkeeping fields execution maintains).
pub fn run(program: Value) -> Result<Value, Fatal> {
    run_with_options(program, OutputOptions::default())
}

/// Execute a program document with caller-provided output options.
pub fn run_with_options(program: Value, output: OutputOptions) -> Result<Value, Fatal> {
    let doc = Document::new(program).into_ref();
    doc.borrow_mut().retain();

    let mut vm = Vm::with_options(doc.clone(), output);
    let outcome = vm.run_entrypoint();
    vm.shutdown();

    match outcome {
        Ok(()) => {
            doc.borrow_mut().release();
            let result = deep_copy(doc.borrow().root());
            Ok(result)
        }
        Err(err) => {
            let snapshot = deep_copy(doc.borrow().root());
            Err(err.with_snapshot(&snapshot))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_returns_the_final_document() {
        let out = run(json!({
            "stack": [],
            "entrypoint": [1, 2, {".": "add_two_top"}]
        }))
        .unwrap();
        assert_eq!(out["stack"], json!([3]));
        assert_eq!(out["ref"], json!(0));
    }

    #[test]
    fn scalar_documents_pass_through() {
        assert_eq!(run(json!("hello")).unwrap(), json!("hello"));
        assert_eq!(run(json!(42)).unwrap(), json!(42));
    }

    #[test]
    fn fatal_errors_carry_a_state_snapshot() {
        let err = run(json!({
            "stack": [],
            "entrypoint": [{".": "ptr_release"}]
        }))
        .unwrap_err();
        let snapshot = err.snapshot.expect("snapshot attached");
        assert_eq!(snapshot["stack"], json!([]));
    }
}
