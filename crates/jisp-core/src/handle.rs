//! Pointer handles and the JPM stack.
//!
//! A handle pins a location in a document by (document reference, pointer
//! path) and retains the document for as long as it lives. The path is
//! re-resolved on every use, so a handle can never dangle; if the target is
//! removed the next use reports the path as unresolvable instead of touching
//! freed state.

use serde_json::Value;

use crate::doc::{deep_copy, scalar_assign, DocRef};
use crate::error::{fatal, Fatal, FatalKind};
use crate::pointer::{self, PointerError};

/// Upper bound on live handles; exceeding it is a program bug, not a
/// resource-sizing concern.
pub const PTR_STACK_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct PtrHandle {
    doc: DocRef,
    path: String,
}

impl PtrHandle {
    /// Resolve `path` in `doc` and pin it. Retains the document on success.
    pub fn resolve(doc: &DocRef, path: &str) -> Result<Self, PointerError> {
        {
            let d = doc.borrow();
            pointer::resolve(d.root(), path)?;
        }
        doc.borrow_mut().retain();
        Ok(Self {
            doc: doc.clone(),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Deep copy of the pinned value.
    pub fn get(&self) -> Result<Value, Fatal> {
        let d = self.doc.borrow();
        let target = pointer::resolve(d.root(), &self.path).map_err(|e| {
            fatal(
                FatalKind::InvalidPath,
                format!("ptr_get: handle path '{}' no longer resolves ({e})", self.path),
            )
        })?;
        Ok(deep_copy(target))
    }

    /// In-place scalar overwrite of the pinned value.
    pub fn set_scalar(&self, value: &Value) -> Result<(), Fatal> {
        let mut d = self.doc.borrow_mut();
        let target = pointer::resolve_mut(d.root_mut(), &self.path).map_err(|e| {
            fatal(
                FatalKind::InvalidPath,
                format!("ptr_set: handle path '{}' no longer resolves ({e})", self.path),
            )
        })?;
        scalar_assign(target, value, "ptr_set")
    }

    /// Drop the pin, releasing the document retention.
    pub fn release(self) {
        self.doc.borrow_mut().release();
    }
}

/// Bounded LIFO of live handles, one per VM.
#[derive(Debug, Default)]
pub struct PtrStack {
    entries: Vec<PtrHandle>,
}

impl PtrStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, handle: PtrHandle) -> Result<(), Fatal> {
        if self.entries.len() >= PTR_STACK_CAPACITY {
            return Err(fatal(
                FatalKind::AssertionFailure,
                format!("pointer stack overflow (max {PTR_STACK_CAPACITY})"),
            ));
        }
        self.entries.push(handle);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<PtrHandle, Fatal> {
        self.entries
            .pop()
            .ok_or_else(|| fatal(FatalKind::StackUnderflow, "pointer stack underflow"))
    }

    pub fn peek(&self) -> Result<&PtrHandle, Fatal> {
        self.entries
            .last()
            .ok_or_else(|| fatal(FatalKind::StackUnderflow, "pointer stack underflow (peek)"))
    }

    /// Release every remaining handle, oldest last. Called at VM shutdown.
    pub fn release_all(&mut self) {
        while let Some(handle) = self.entries.pop() {
            handle.release();
        }
    }
}
