//! Mutable JSON document model.
//!
//! A [`Document`] owns the JSON tree the interpreter executes against. The
//! retain count lives *inside* the tree as the root field `ref`, so it shows
//! up in state dumps exactly like every other register; the Rust-side
//! allocation is additionally shared through [`DocRef`] so pointer handles
//! can outlive a single borrow.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::error::{fatal, Fatal, FatalKind};

/// Shared handle to a document. Everything that needs to keep a document
/// alive past one call (the VM, pointer handles, sandboxes) holds one.
pub type DocRef = Rc<RefCell<Document>>;

#[derive(Debug)]
pub struct Document {
    root: Value,
}

impl Document {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn into_ref(self) -> DocRef {
        Rc::new(RefCell::new(self))
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    /// Root as an object map, or a fatal naming the failing operation.
    pub fn root_object(&self, ctx: &str) -> Result<&Map<String, Value>, Fatal> {
        self.root
            .as_object()
            .ok_or_else(|| fatal(FatalKind::TypeMismatch, format!("{ctx}: missing object root")))
    }

    pub fn root_object_mut(&mut self, ctx: &str) -> Result<&mut Map<String, Value>, Fatal> {
        self.root
            .as_object_mut()
            .ok_or_else(|| fatal(FatalKind::TypeMismatch, format!("{ctx}: missing object root")))
    }

    /// `root["stack"]` as a mutable array; missing or mistyped is fatal.
    pub fn stack_mut(&mut self, ctx: &str) -> Result<&mut Vec<Value>, Fatal> {
        self.root_object_mut(ctx)?
            .get_mut("stack")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| {
                fatal(
                    FatalKind::TypeMismatch,
                    format!("{ctx}: missing or non-array 'stack'"),
                )
            })
    }

    /// `root["stack"]` as a shared array; missing or mistyped is fatal.
    pub fn stack(&self, ctx: &str) -> Result<&Vec<Value>, Fatal> {
        self.root_object(ctx)?
            .get("stack")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                fatal(
                    FatalKind::TypeMismatch,
                    format!("{ctx}: missing or non-array 'stack'"),
                )
            })
    }

    pub fn stack_len(&self, ctx: &str) -> Result<usize, Fatal> {
        Ok(self.stack(ctx)?.len())
    }

    /// Stack precondition shared by every consuming opcode.
    pub fn require_stack(&self, ctx: &str, required: usize) -> Result<(), Fatal> {
        let len = self.stack_len(ctx)?;
        if len < required {
            return Err(fatal(
                FatalKind::StackUnderflow,
                format!("{ctx}: need at least {required} values on stack"),
            ));
        }
        Ok(())
    }

    /// Current retain count as recorded in the document.
    pub fn ref_count(&self) -> i64 {
        self.root
            .as_object()
            .and_then(|o| o.get("ref"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Increment `root["ref"]`, materializing it at 1 if absent. Non-object
    /// roots carry no retain field and are left untouched.
    pub fn retain(&mut self) {
        if let Some(obj) = self.root.as_object_mut() {
            let cur = obj.get("ref").and_then(Value::as_i64).unwrap_or(0).max(0);
            obj.insert("ref".to_string(), Value::from(cur + 1));
        }
    }

    /// Decrement `root["ref"]`, clamping at zero. The allocation itself is
    /// reclaimed when the last [`DocRef`] clone drops.
    pub fn release(&mut self) {
        if let Some(obj) = self.root.as_object_mut() {
            let cur = obj.get("ref").and_then(Value::as_i64).unwrap_or(0);
            obj.insert("ref".to_string(), Value::from((cur - 1).max(0)));
        }
    }
}

/// Structural copy of a subtree. Named because the spec treats every crossing
/// of a semantic boundary (literal push, sandbox hand-off, heap store) as a
/// deep copy, even though `Value` clones are already structural.
pub fn deep_copy(value: &Value) -> Value {
    value.clone()
}

/// Overwrite an existing node in place with a scalar. Container payloads are
/// refused; the parent keeps its slot, only the slot's contents change.
pub fn scalar_assign(target: &mut Value, value: &Value, ctx: &str) -> Result<(), Fatal> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            *target = value.clone();
            Ok(())
        }
        Value::Array(_) | Value::Object(_) => Err(fatal(
            FatalKind::TypeMismatch,
            format!("{ctx}: value must be a scalar (null, bool, number, or string)"),
        )),
    }
}
