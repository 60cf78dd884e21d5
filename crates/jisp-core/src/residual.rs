//! Reversible patch log.
//!
//! While `root["is_reversible"]` is true, every visible edit appends a patch
//! object `{op, path, value?}` to `root["residual"]`. Opcodes that perform
//! several edits collect them into a [`Group`] and commit the whole group as
//! one array entry, so a single undo reverses the opcode as a unit.
//!
//! The inverter is intentionally narrow: it covers exactly the patches the
//! recorder emits for stack-local effects (`add /stack/-`, `remove
//! /stack/<idx>` with a captured value). `replace` and non-stack paths are
//! best-effort no-ops.

use serde_json::{json, Value};

use crate::doc::deep_copy;
use crate::error::{fatal, Fatal, FatalKind};
use crate::pointer::path_for_stack_index;

/// Whether the document requests patch recording.
pub fn is_reversible(root: &Value) -> bool {
    root.as_object()
        .and_then(|o| o.get("is_reversible"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// `root["residual"]` as a mutable array, created on demand. Returns `None`
/// when the root is not an object or a non-array `residual` already occupies
/// the key (user data is never clobbered to make room for the log).
fn residual_array_mut(root: &mut Value) -> Option<&mut Vec<Value>> {
    let obj = root.as_object_mut()?;
    if !obj.contains_key("residual") {
        obj.insert("residual".to_string(), Value::Array(Vec::new()));
    }
    obj.get_mut("residual").and_then(Value::as_array_mut)
}

/// Build a single patch object.
pub fn make_patch(op: &str, path: &str, value: Option<&Value>) -> Value {
    match value {
        Some(v) => json!({"op": op, "path": path, "value": deep_copy(v)}),
        None => json!({"op": op, "path": path}),
    }
}

/// Append one patch entry, subject to the `is_reversible` gate.
pub fn record(root: &mut Value, op: &str, path: &str, value: Option<&Value>) {
    if !is_reversible(root) {
        return;
    }
    let patch = make_patch(op, path, value);
    if let Some(log) = residual_array_mut(root) {
        log.push(patch);
    }
}

/// Record the removal of the current top of stack, capturing its value so
/// the patch can be inverted. Call immediately before popping so the index
/// in the path lines up with the replay.
pub fn log_remove_last(root: &mut Value) {
    if !is_reversible(root) {
        return;
    }
    let Some(stack) = root
        .as_object()
        .and_then(|o| o.get("stack"))
        .and_then(Value::as_array)
    else {
        return;
    };
    let Some(top) = stack.last() else {
        return;
    };
    let path = path_for_stack_index(stack.len() - 1);
    let top = deep_copy(top);
    record(root, "remove", &path, Some(&top));
}

/// Patch collector for multi-edit opcodes. Inactive (all calls pass through
/// to nothing or to single-entry recording) when reversibility is off.
#[derive(Debug)]
pub struct Group {
    patches: Option<Vec<Value>>,
}

impl Group {
    pub fn begin(root: &Value) -> Self {
        Self {
            patches: is_reversible(root).then(Vec::new),
        }
    }

    /// Add a patch to the group, or fall back to direct recording when the
    /// group is inactive.
    pub fn record(&mut self, root: &mut Value, op: &str, path: &str, value: Option<&Value>) {
        match &mut self.patches {
            Some(patches) => patches.push(make_patch(op, path, value)),
            None => record(root, op, path, value),
        }
    }

    /// Append the collected patches as one grouped entry. Dropping a group
    /// without committing discards it, which is exactly what a fatal between
    /// begin and commit requires.
    pub fn commit(self, root: &mut Value) {
        let Some(patches) = self.patches else {
            return;
        };
        if !is_reversible(root) {
            return;
        }
        if let Some(log) = residual_array_mut(root) {
            log.push(Value::Array(patches));
        }
    }
}

/// Pop the last residual entry and apply its inverse. Grouped entries are
/// inverted patch by patch in reverse order.
pub fn perform_undo(root: &mut Value) -> Result<(), Fatal> {
    let entry = {
        let log = root
            .as_object_mut()
            .and_then(|o| o.get_mut("residual"))
            .and_then(Value::as_array_mut)
            .filter(|log| !log.is_empty())
            .ok_or_else(|| {
                fatal(FatalKind::NotFound, "undo: 'residual' is missing or empty")
            })?;
        log.pop().expect("non-empty checked above")
    };

    match entry {
        Value::Object(_) => undo_one_patch(root, &entry),
        Value::Array(group) => {
            for patch in group.iter().rev() {
                if !patch.is_object() {
                    return Err(fatal(
                        FatalKind::TypeMismatch,
                        "undo: grouped residual contains non-object entry",
                    ));
                }
                undo_one_patch(root, patch)?;
            }
            Ok(())
        }
        _ => Err(fatal(
            FatalKind::TypeMismatch,
            "undo: residual entry must be an object or array of objects",
        )),
    }
}

fn undo_one_patch(root: &mut Value, patch: &Value) -> Result<(), Fatal> {
    let op = patch.get("op").and_then(Value::as_str);
    let path = patch.get("path").and_then(Value::as_str);
    let (Some(op), Some(path)) = (op, path) else {
        return Err(fatal(
            FatalKind::TypeMismatch,
            "undo: residual entry must have string 'op' and 'path'",
        ));
    };

    match op {
        // Inverse of a stack append: drop the top. Best effort on an empty
        // or missing stack.
        "add" if path == "/stack/-" => {
            if let Some(stack) = root
                .as_object_mut()
                .and_then(|o| o.get_mut("stack"))
                .and_then(Value::as_array_mut)
            {
                stack.pop();
            }
        }
        // Inverse of a stack removal: re-append the captured value.
        "remove" if path.starts_with("/stack/") => {
            if let Some(value) = patch.get("value") {
                let value = deep_copy(value);
                if let Some(stack) = root
                    .as_object_mut()
                    .and_then(|o| o.get_mut("stack"))
                    .and_then(Value::as_array_mut)
                {
                    stack.push(value);
                }
            }
        }
        // replace and non-stack add/remove are recorded for inspection but
        // not invertible in minimal mode.
        _ => {}
    }
    Ok(())
}
