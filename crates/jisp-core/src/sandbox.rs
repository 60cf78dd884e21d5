//! Isolated sub-document execution for `test`, `step`, and `undo`.
//!
//! A sandbox deep-copies the program value into a fresh document, retains it
//! once, runs the requested machinery with its own VM (own pointer stack, own
//! residual), deep-copies the resulting root back to the caller, and releases
//! the sandbox document. Nothing is shared with the parent: no handles cross,
//! no residual bleeds. Sandboxes may recurse.

use serde_json::Value;
use tracing::debug;

use crate::doc::{deep_copy, DocRef, Document};
use crate::error::Fatal;
use crate::residual;
use crate::runtime::{Opcodes, OutputOptions, Vm};

fn sandbox_doc(program: &Value) -> DocRef {
    let doc = Document::new(deep_copy(program)).into_ref();
    doc.borrow_mut().retain();
    doc
}

fn sandbox_result(doc: &DocRef) -> Value {
    let result = deep_copy(doc.borrow().root());
    doc.borrow_mut().release();
    result
}

/// Run a program to completion in a sandbox and return its final document.
pub fn run_program(
    program: &Value,
    opcodes: &Opcodes,
    output: &OutputOptions,
) -> Result<Value, Fatal> {
    debug!("sandbox run");
    let doc = sandbox_doc(program);
    let mut vm = Vm::with_registry(doc.clone(), opcodes.clone(), output.clone());
    let outcome = vm.run_entrypoint();
    vm.shutdown();
    outcome?;
    Ok(sandbox_result(&doc))
}

/// Execute one instruction of the program at its `pc` (default 0), advance
/// `pc`, and return the modified program.
pub fn run_step(
    program: &Value,
    opcodes: &Opcodes,
    output: &OutputOptions,
) -> Result<Value, Fatal> {
    debug!("sandbox step");
    let doc = sandbox_doc(program);

    let (pc, instruction) = {
        let mut d = doc.borrow_mut();
        let obj = d.root_object_mut("step")?;
        let pc = match obj.get("pc").and_then(Value::as_i64) {
            Some(n) => n,
            None => {
                obj.insert("pc".to_string(), Value::from(0));
                0
            }
        };
        let instruction = obj
            .get("entrypoint")
            .and_then(Value::as_array)
            .and_then(|ep| {
                usize::try_from(pc)
                    .ok()
                    .and_then(|i| ep.get(i))
                    .map(deep_copy)
            });
        (pc, instruction)
    };

    if let Some(instruction) = instruction {
        doc.borrow().stack_len("step")?;
        let mut vm = Vm::with_registry(doc.clone(), opcodes.clone(), output.clone());
        let outcome = vm.execute_instruction(&instruction, "/entrypoint", pc as usize);
        vm.shutdown();
        outcome?;
        let mut d = doc.borrow_mut();
        d.root_object_mut("step")?
            .insert("pc".to_string(), Value::from(pc + 1));
    }

    Ok(sandbox_result(&doc))
}

/// Pop the program's last residual entry and apply its inverse; return the
/// modified program.
pub fn run_undo(program: &Value) -> Result<Value, Fatal> {
    debug!("sandbox undo");
    let doc = sandbox_doc(program);
    {
        let mut d = doc.borrow_mut();
        residual::perform_undo(d.root_mut())?;
    }
    Ok(sandbox_result(&doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FatalKind;
    use serde_json::json;

    fn defaults() -> (Opcodes, OutputOptions) {
        (Opcodes::new(), OutputOptions::default())
    }

    #[test]
    fn run_program_is_isolated_from_the_caller_value() {
        let program = json!({"stack": [], "entrypoint": [1, 2, {".": "add_two_top"}]});
        let (ops, out) = defaults();
        let result = run_program(&program, &ops, &out).unwrap();
        assert_eq!(result["stack"], json!([3]));
        // The caller's value is untouched.
        assert_eq!(program["stack"], json!([]));
        // The sandbox retention is visible in the returned state.
        assert_eq!(result["ref"], json!(1));
    }

    #[test]
    fn non_object_programs_round_trip() {
        let (ops, out) = defaults();
        let result = run_program(&json!([1, 2, 3]), &ops, &out).unwrap();
        assert_eq!(result, json!([1, 2, 3]));
    }

    #[test]
    fn step_defaults_pc_and_advances_it() {
        let (ops, out) = defaults();
        let program = json!({"stack": [], "entrypoint": [10, 20]});

        let once = run_step(&program, &ops, &out).unwrap();
        assert_eq!(once["pc"], json!(1));
        assert_eq!(once["stack"], json!([10]));

        let twice = run_step(&once, &ops, &out).unwrap();
        assert_eq!(twice["pc"], json!(2));
        assert_eq!(twice["stack"], json!([10, 20]));
    }

    #[test]
    fn step_past_the_end_leaves_pc_alone() {
        let (ops, out) = defaults();
        let program = json!({"stack": [7], "pc": 5, "entrypoint": [1]});
        let result = run_step(&program, &ops, &out).unwrap();
        assert_eq!(result["pc"], json!(5));
        assert_eq!(result["stack"], json!([7]));
    }

    #[test]
    fn step_without_entrypoint_only_materializes_pc() {
        let (ops, out) = defaults();
        let result = run_step(&json!({"stack": []}), &ops, &out).unwrap();
        assert_eq!(result["pc"], json!(0));
    }

    #[test]
    fn undo_requires_a_residual() {
        let err = run_undo(&json!({"stack": []})).unwrap_err();
        assert_eq!(err.kind, FatalKind::NotFound);
    }

    #[test]
    fn sandboxes_recurse() {
        // A program whose own entrypoint runs `test` in a nested sandbox.
        let (ops, out) = defaults();
        let program = json!({
            "stack": [],
            "entrypoint": [
                {"stack": [], "entrypoint": [1, 1, {".": "add_two_top"}]},
                {"stack": [2]},
                {".": "test"}
            ]
        });
        let result = run_program(&program, &ops, &out).unwrap();
        assert_eq!(result["stack"], json!([]));
    }
}
