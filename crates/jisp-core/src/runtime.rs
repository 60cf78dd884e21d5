//! Entrypoint walker, opcode registry, and the opcode library.
//!
//! The walker reads one instruction at a time from the current frame array,
//! classifies it by JSON shape, and either pushes a deep-copied literal onto
//! the visible operand stack at `/stack` or executes a directive. Directives
//! are objects with a `.` key: a registered opcode name, the name of a root
//! array to expand as a macro, or a nested instruction array.
//!
//! Opcodes are a closed enum dispatched by exhaustive match; the name table
//! is built once and is read-only afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::doc::{deep_copy, scalar_assign, DocRef};
use crate::error::{fatal, Fatal, FatalKind};
use crate::handle::{PtrHandle, PtrStack};
use crate::pointer::{self, PointerError};
use crate::residual::{self, Group};
use crate::sandbox;

/// Output shaping shared by the `print_json` opcode and the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Print a string root unquoted.
    pub raw: bool,
    /// Single-line output instead of pretty printing.
    pub compact: bool,
}

/// Serialize a value according to the output options.
pub fn render(value: &Value, options: &OutputOptions) -> String {
    if options.compact {
        value.to_string()
    } else {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    }
}

/// The built-in operation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    PopAndStore,
    DuplicateTop,
    AddTwoTop,
    PrintJson,
    Undo,
    MapOver,
    Get,
    Set,
    Append,
    PtrNew,
    PtrRelease,
    PtrGet,
    PtrSet,
    Enter,
    Exit,
    Test,
    PrintError,
    Load,
    Store,
    Step,
}

impl Opcode {
    pub const ALL: [Opcode; 20] = [
        Opcode::PopAndStore,
        Opcode::DuplicateTop,
        Opcode::AddTwoTop,
        Opcode::PrintJson,
        Opcode::Undo,
        Opcode::MapOver,
        Opcode::Get,
        Opcode::Set,
        Opcode::Append,
        Opcode::PtrNew,
        Opcode::PtrRelease,
        Opcode::PtrGet,
        Opcode::PtrSet,
        Opcode::Enter,
        Opcode::Exit,
        Opcode::Test,
        Opcode::PrintError,
        Opcode::Load,
        Opcode::Store,
        Opcode::Step,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Opcode::PopAndStore => "pop_and_store",
            Opcode::DuplicateTop => "duplicate_top",
            Opcode::AddTwoTop => "add_two_top",
            Opcode::PrintJson => "print_json",
            Opcode::Undo => "undo",
            Opcode::MapOver => "map_over",
            Opcode::Get => "get",
            Opcode::Set => "set",
            Opcode::Append => "append",
            Opcode::PtrNew => "ptr_new",
            Opcode::PtrRelease => "ptr_release",
            Opcode::PtrGet => "ptr_get",
            Opcode::PtrSet => "ptr_set",
            Opcode::Enter => "enter",
            Opcode::Exit => "exit",
            Opcode::Test => "test",
            Opcode::PrintError => "print_error",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Step => "step",
        }
    }
}

/// Case-sensitive name → opcode table, built once before any program runs.
#[derive(Debug, Clone)]
pub struct Opcodes {
    by_name: HashMap<&'static str, Opcode>,
}

impl Opcodes {
    pub fn new() -> Self {
        let mut by_name = HashMap::with_capacity(Opcode::ALL.len());
        for op in Opcode::ALL {
            by_name.insert(op.name(), op);
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<Opcode> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

impl Default for Opcodes {
    fn default() -> Self {
        Self::new()
    }
}

/// One interpreter instance: the document under execution, its pointer
/// stack, the opcode table, and output options.
pub struct Vm {
    doc: DocRef,
    opcodes: Opcodes,
    ptrs: PtrStack,
    output: OutputOptions,
}

impl Vm {
    pub fn new(doc: DocRef) -> Self {
        Self::with_options(doc, OutputOptions::default())
    }

    pub fn with_options(doc: DocRef, output: OutputOptions) -> Self {
        Self::with_registry(doc, Opcodes::new(), output)
    }

    pub(crate) fn with_registry(doc: DocRef, opcodes: Opcodes, output: OutputOptions) -> Self {
        Self {
            doc,
            opcodes,
            ptrs: PtrStack::new(),
            output,
        }
    }

    pub fn doc(&self) -> &DocRef {
        &self.doc
    }

    pub fn opcodes(&self) -> &Opcodes {
        &self.opcodes
    }

    /// Execute `root["entrypoint"]` if present. Documents without one are a
    /// successful no-op.
    pub fn run_entrypoint(&mut self) -> Result<(), Fatal> {
        let frame = {
            let d = self.doc.borrow();
            d.root()
                .as_object()
                .and_then(|o| o.get("entrypoint"))
                .map(deep_copy)
        };
        match frame {
            Some(Value::Array(items)) => self.walk_frame(&items, "/entrypoint"),
            Some(_) => Err(fatal(
                FatalKind::InvalidDirective,
                "entrypoint must be an array",
            )),
            None => Ok(()),
        }
    }

    /// Release all live pointer handles. Call when the VM is done.
    pub fn shutdown(&mut self) {
        self.ptrs.release_all();
    }

    /// Walk one instruction frame. The frame path is pushed onto
    /// `call_stack` on entry and popped on every exit path.
    pub fn walk_frame(&mut self, frame: &[Value], frame_path: &str) -> Result<(), Fatal> {
        debug!(frame = frame_path, len = frame.len(), "enter frame");
        self.push_call_frame(frame_path);
        let result = self.walk_frame_inner(frame, frame_path);
        self.pop_call_frame();
        result
    }

    fn walk_frame_inner(&mut self, frame: &[Value], frame_path: &str) -> Result<(), Fatal> {
        self.doc.borrow().stack_len("entrypoint")?;
        for (idx, elem) in frame.iter().enumerate() {
            if self.take_exit_interrupt() {
                break;
            }
            self.execute_instruction(elem, frame_path, idx)?;
        }
        Ok(())
    }

    /// Classify and execute a single instruction.
    pub(crate) fn execute_instruction(
        &mut self,
        elem: &Value,
        frame_path: &str,
        idx: usize,
    ) -> Result<(), Fatal> {
        match elem {
            Value::String(_) | Value::Number(_) | Value::Array(_) => self.push_literal(elem),
            Value::Object(obj) => self.execute_directive(obj, elem, frame_path, idx),
            Value::Bool(_) | Value::Null => Err(fatal(
                FatalKind::InvalidDirective,
                "entrypoint element is not a string, number, array, or object",
            )),
        }
    }

    fn execute_directive(
        &mut self,
        obj: &Map<String, Value>,
        elem: &Value,
        frame_path: &str,
        idx: usize,
    ) -> Result<(), Fatal> {
        let Some(dot) = obj.get(".") else {
            return self.push_literal(elem);
        };
        match dot {
            Value::Array(nested) => {
                let nested = nested.clone();
                let path = format!("{frame_path}/{idx}/.");
                self.walk_frame(&nested, &path)
            }
            Value::String(name) => {
                if let Some(op) = self.opcodes.get(name) {
                    trace!(opcode = op.name(), "dispatch");
                    return self.invoke(op);
                }
                let macro_body = {
                    let d = self.doc.borrow();
                    d.root()
                        .as_object()
                        .and_then(|o| o.get(name))
                        .and_then(Value::as_array)
                        .cloned()
                };
                match macro_body {
                    Some(body) => {
                        let path = format!("/{name}");
                        self.walk_frame(&body, &path)
                    }
                    None => self.push_literal(elem),
                }
            }
            _ => Err(fatal(
                FatalKind::InvalidDirective,
                "entrypoint object '.' field must be an array or string",
            )),
        }
    }

    /// Dispatch a single opcode.
    pub fn invoke(&mut self, op: Opcode) -> Result<(), Fatal> {
        match op {
            Opcode::PopAndStore => self.op_pop_and_store(),
            Opcode::DuplicateTop => self.op_duplicate_top(),
            Opcode::AddTwoTop => self.op_add_two_top(),
            Opcode::PrintJson => self.op_print_json(),
            Opcode::Undo => self.op_undo(),
            Opcode::MapOver => self.op_map_over(),
            Opcode::Get => self.op_get(),
            Opcode::Set => self.op_set(),
            Opcode::Append => self.op_append(),
            Opcode::PtrNew => self.op_ptr_new(),
            Opcode::PtrRelease => self.op_ptr_release(),
            Opcode::PtrGet => self.op_ptr_get(),
            Opcode::PtrSet => self.op_ptr_set(),
            Opcode::Enter => self.op_enter(),
            Opcode::Exit => self.op_exit(),
            Opcode::Test => self.op_test(),
            Opcode::PrintError => self.op_print_error(),
            Opcode::Load => self.op_load(),
            Opcode::Store => self.op_store(),
            Opcode::Step => self.op_step(),
        }
    }

    // ── walker plumbing ───────────────────────────────────────────────────

    fn push_call_frame(&mut self, path: &str) {
        let mut d = self.doc.borrow_mut();
        if let Some(obj) = d.root_mut().as_object_mut() {
            let cs = obj
                .entry("call_stack")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(frames) = cs.as_array_mut() {
                frames.push(Value::String(path.to_string()));
            }
        }
    }

    fn pop_call_frame(&mut self) {
        let mut d = self.doc.borrow_mut();
        if let Some(frames) = d
            .root_mut()
            .as_object_mut()
            .and_then(|o| o.get_mut("call_stack"))
            .and_then(Value::as_array_mut)
        {
            frames.pop();
        }
    }

    /// Consume a pending `exit` interrupt, unwinding exactly one frame.
    fn take_exit_interrupt(&mut self) -> bool {
        let mut d = self.doc.borrow_mut();
        let Some(obj) = d.root_mut().as_object_mut() else {
            return false;
        };
        if obj.get("_interrupt_exit").and_then(Value::as_bool) == Some(true) {
            obj.remove("_interrupt_exit");
            return true;
        }
        false
    }

    fn push_literal(&mut self, elem: &Value) -> Result<(), Fatal> {
        let mut d = self.doc.borrow_mut();
        let copy = deep_copy(elem);
        d.stack_mut("entrypoint")?.push(copy);
        residual::record(d.root_mut(), "add", "/stack/-", Some(elem));
        Ok(())
    }

    /// Pop the top of stack, logging the removal as a single residual entry.
    /// Only for pops that cannot fail afterwards; when a shape check or other
    /// fallible work follows, validate against [`Self::peek_top`] (or use
    /// [`Self::pop_checked`]) first so a fatal never strands an
    /// uncompensated patch in the log.
    fn pop_logged(&mut self, ctx: &str) -> Result<Value, Fatal> {
        let mut d = self.doc.borrow_mut();
        residual::log_remove_last(d.root_mut());
        d.stack_mut(ctx)?.pop().ok_or_else(|| {
            fatal(
                FatalKind::StackUnderflow,
                format!("{ctx}: need at least 1 values on stack"),
            )
        })
    }

    /// Pop the top of stack once `check` approves its shape. The removal is
    /// performed and logged only after the check passes; a rejected value
    /// stays on the stack and leaves no residual entry.
    fn pop_checked(
        &mut self,
        ctx: &str,
        message: &str,
        check: impl Fn(&Value) -> bool,
    ) -> Result<Value, Fatal> {
        {
            let d = self.doc.borrow();
            let Some(top) = d.stack(ctx)?.last() else {
                return Err(fatal(
                    FatalKind::StackUnderflow,
                    format!("{ctx}: need at least 1 values on stack"),
                ));
            };
            if !check(top) {
                return Err(fatal(FatalKind::TypeMismatch, format!("{ctx}: {message}")));
            }
        }
        self.pop_logged(ctx)
    }

    /// Deep copy of the top of stack, leaving the stack untouched.
    fn peek_top(&self, ctx: &str) -> Result<Value, Fatal> {
        let d = self.doc.borrow();
        d.stack(ctx)?.last().map(deep_copy).ok_or_else(|| {
            fatal(
                FatalKind::StackUnderflow,
                format!("{ctx}: need at least 1 values on stack"),
            )
        })
    }

    /// Pop the top of stack, logging the removal into a residual group.
    fn pop_grouped(&mut self, ctx: &str, group: &mut Group) -> Result<Value, Fatal> {
        let mut d = self.doc.borrow_mut();
        let len = d.stack_len(ctx)?;
        let Some(index) = len.checked_sub(1) else {
            return Err(fatal(
                FatalKind::StackUnderflow,
                format!("{ctx}: need at least 1 values on stack"),
            ));
        };
        let path = pointer::path_for_stack_index(index);
        let Some(value) = d.stack_mut(ctx)?.pop() else {
            return Err(fatal(
                FatalKind::StackUnderflow,
                format!("{ctx}: need at least 1 values on stack"),
            ));
        };
        group.record(d.root_mut(), "remove", &path, Some(&value));
        Ok(value)
    }

    fn begin_group(&self) -> Group {
        let d = self.doc.borrow();
        Group::begin(d.root())
    }

    fn require_stack(&self, ctx: &str, required: usize) -> Result<(), Fatal> {
        self.doc.borrow().require_stack(ctx, required)
    }

    fn pop_string(&mut self, ctx: &str, what: &str) -> Result<String, Fatal> {
        let message = format!("{what} must be a string");
        match self.pop_checked(ctx, &message, Value::is_string)? {
            Value::String(s) => Ok(s),
            _ => Err(fatal(FatalKind::TypeMismatch, format!("{ctx}: {message}"))),
        }
    }

    fn pop_string_grouped(
        &mut self,
        ctx: &str,
        what: &str,
        group: &mut Group,
    ) -> Result<String, Fatal> {
        match self.pop_grouped(ctx, group)? {
            Value::String(s) => Ok(s),
            _ => Err(fatal(
                FatalKind::TypeMismatch,
                format!("{ctx}: {what} must be a string"),
            )),
        }
    }

    // ── opcode library ────────────────────────────────────────────────────

    /// Stores a value under a key popped from the stack: `[.., V, K]` to
    /// `[..]`, with `root[K] = V`. The patch is an add or replace depending
    /// on whether the key already existed.
    fn op_pop_and_store(&mut self) -> Result<(), Fatal> {
        self.require_stack("pop_and_store", 2)?;
        let key = self.pop_string("pop_and_store", "key")?;
        let value = self.pop_logged("pop_and_store")?;

        let mut d = self.doc.borrow_mut();
        let existed = d.root_object("pop_and_store")?.contains_key(&key);
        let path = pointer::path_for_key(&key);
        let op = if existed { "replace" } else { "add" };
        residual::record(d.root_mut(), op, &path, Some(&value));
        d.root_object_mut("pop_and_store")?.insert(key, value);
        Ok(())
    }

    /// Duplicates the top of stack; the copy is deep.
    fn op_duplicate_top(&mut self) -> Result<(), Fatal> {
        self.require_stack("duplicate_top", 1)?;
        let top = self.pop_logged("duplicate_top")?;
        let dup = deep_copy(&top);

        let mut d = self.doc.borrow_mut();
        residual::record(d.root_mut(), "add", "/stack/-", Some(&top));
        d.stack_mut("duplicate_top")?.push(top);
        residual::record(d.root_mut(), "add", "/stack/-", Some(&dup));
        d.stack_mut("duplicate_top")?.push(dup);
        Ok(())
    }

    /// Pops the two topmost numbers and pushes their sum. The sum stays an
    /// integer when both operands are integers.
    fn op_add_two_top(&mut self) -> Result<(), Fatal> {
        self.require_stack("add_two_top", 2)?;
        let mut group = self.begin_group();
        let b = self.pop_grouped("add_two_top", &mut group)?;
        let a = self.pop_grouped("add_two_top", &mut group)?;

        if !a.is_number() || !b.is_number() {
            return Err(fatal(
                FatalKind::TypeMismatch,
                "add_two_top: operands must be numeric",
            ));
        }
        let sum = match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => match x.checked_add(y) {
                Some(s) => Value::from(s),
                None => Value::from(x as f64 + y as f64),
            },
            _ => {
                let x = a.as_f64().unwrap_or(0.0);
                let y = b.as_f64().unwrap_or(0.0);
                Value::from(x + y)
            }
        };

        let mut d = self.doc.borrow_mut();
        group.record(d.root_mut(), "add", "/stack/-", Some(&sum));
        d.stack_mut("add_two_top")?.push(sum);
        group.commit(d.root_mut());
        Ok(())
    }

    /// `[.., D, F]` to `[.., R]`: runs frame F once per element of D. Each
    /// run must leave exactly one extra value on the stack; those values
    /// become R in order.
    fn op_map_over(&mut self) -> Result<(), Fatal> {
        self.require_stack("map_over", 2)?;
        let mut group = self.begin_group();

        let func = match self.pop_grouped("map_over", &mut group)? {
            Value::Array(items) => items,
            _ => {
                return Err(fatal(
                    FatalKind::TypeMismatch,
                    "map_over: top of stack must be a function array",
                ))
            }
        };
        let data = match self.pop_grouped("map_over", &mut group)? {
            Value::Array(items) => items,
            _ => {
                return Err(fatal(
                    FatalKind::TypeMismatch,
                    "map_over: second item on stack must be a data array",
                ))
            }
        };

        let base_len = self.doc.borrow().stack_len("map_over")?;
        let mut results = Vec::with_capacity(data.len());
        for item in &data {
            {
                let mut d = self.doc.borrow_mut();
                d.stack_mut("map_over")?.push(deep_copy(item));
            }
            self.walk_frame(&func, "/map_over/function")?;

            let mut d = self.doc.borrow_mut();
            let stack = d.stack_mut("map_over")?;
            if stack.len() != base_len + 1 {
                return Err(fatal(
                    FatalKind::AssertionFailure,
                    "map_over: function must consume its argument and produce \
                     exactly one result on the stack",
                ));
            }
            let Some(result) = stack.pop() else {
                return Err(fatal(
                    FatalKind::StackUnderflow,
                    "map_over: function result missing",
                ));
            };
            results.push(result);
        }

        let result = Value::Array(results);
        let mut d = self.doc.borrow_mut();
        group.record(d.root_mut(), "add", "/stack/-", Some(&result));
        d.stack_mut("map_over")?.push(result);
        group.commit(d.root_mut());
        Ok(())
    }

    /// Pops a pointer string and pushes a deep copy of the value it
    /// resolves to.
    fn op_get(&mut self) -> Result<(), Fatal> {
        self.require_stack("get", 1)?;
        let mut group = self.begin_group();
        let path = self.pop_string_grouped("get", "path", &mut group)?;

        let copy = {
            let d = self.doc.borrow();
            let target =
                pointer::resolve(d.root(), &path).map_err(|e| path_fatal("get", &path, e))?;
            deep_copy(target)
        };

        let mut d = self.doc.borrow_mut();
        group.record(d.root_mut(), "add", "/stack/-", Some(&copy));
        d.stack_mut("get")?.push(copy);
        group.commit(d.root_mut());
        Ok(())
    }

    /// Pops `[.., V, P]` and assigns scalar V in place at pointer P.
    fn op_set(&mut self) -> Result<(), Fatal> {
        self.require_stack("set", 2)?;
        let mut group = self.begin_group();
        let path = self.pop_string_grouped("set", "path", &mut group)?;
        let value = self.pop_grouped("set", &mut group)?;

        let mut d = self.doc.borrow_mut();
        let target =
            pointer::resolve_mut(d.root_mut(), &path).map_err(|e| path_fatal("set", &path, e))?;
        scalar_assign(target, &value, "set")?;
        group.record(d.root_mut(), "replace", &path, Some(&value));
        group.commit(d.root_mut());
        Ok(())
    }

    /// Pops `[.., V, P]` and appends a deep copy of V to the array at P.
    fn op_append(&mut self) -> Result<(), Fatal> {
        self.require_stack("append", 2)?;
        let mut group = self.begin_group();
        let path = self.pop_string_grouped("append", "path", &mut group)?;
        let value = self.pop_grouped("append", &mut group)?;

        let mut d = self.doc.borrow_mut();
        let target = pointer::resolve_mut(d.root_mut(), &path)
            .map_err(|e| path_fatal("append", &path, e))?;
        let Some(arr) = target.as_array_mut() else {
            return Err(fatal(
                FatalKind::TypeMismatch,
                "append: path must resolve to an array",
            ));
        };
        arr.push(deep_copy(&value));
        let append_path = pointer::path_for_append(&path);
        group.record(d.root_mut(), "add", &append_path, Some(&value));
        group.commit(d.root_mut());
        Ok(())
    }

    /// Pops a pointer string, resolves it, and pushes a handle onto the
    /// pointer stack. The handle retains the document.
    fn op_ptr_new(&mut self) -> Result<(), Fatal> {
        self.require_stack("ptr_new", 1)?;
        let path = match self.peek_top("ptr_new")? {
            Value::String(s) => s,
            _ => {
                return Err(fatal(
                    FatalKind::TypeMismatch,
                    "ptr_new: path must be a string",
                ))
            }
        };
        let handle =
            PtrHandle::resolve(&self.doc, &path).map_err(|e| path_fatal("ptr_new", &path, e))?;
        self.ptrs.push(handle)?;
        self.pop_logged("ptr_new")?;
        Ok(())
    }

    /// Pop and release the top pointer handle.
    fn op_ptr_release(&mut self) -> Result<(), Fatal> {
        self.ptrs.pop()?.release();
        Ok(())
    }

    /// Pushes a deep copy of the value pinned by the top handle. Peeks, so
    /// the handle stays live.
    fn op_ptr_get(&mut self) -> Result<(), Fatal> {
        self.doc.borrow().stack_len("ptr_get")?;
        let value = self.ptrs.peek()?.get()?;

        let mut d = self.doc.borrow_mut();
        residual::record(d.root_mut(), "add", "/stack/-", Some(&value));
        d.stack_mut("ptr_get")?.push(value);
        Ok(())
    }

    /// Pops a scalar and writes it through the top handle in place. The
    /// write happens against the peeked value; the pop is logged only once
    /// the assignment has succeeded.
    fn op_ptr_set(&mut self) -> Result<(), Fatal> {
        self.require_stack("ptr_set", 1)?;
        let value = self.peek_top("ptr_set")?;
        self.ptrs.peek()?.set_scalar(&value)?;
        self.pop_logged("ptr_set")?;
        Ok(())
    }

    /// Emit the document on stdout. Not a mutation.
    fn op_print_json(&mut self) -> Result<(), Fatal> {
        let d = self.doc.borrow();
        if self.output.raw {
            if let Some(s) = d.root().as_str() {
                println!("{s}");
                return Ok(());
            }
        }
        println!("{}", render(d.root(), &self.output));
        Ok(())
    }

    /// Requests unwinding of exactly one frame; the walker consumes the
    /// flag at its next iteration.
    fn op_exit(&mut self) -> Result<(), Fatal> {
        let mut d = self.doc.borrow_mut();
        if let Some(obj) = d.root_mut().as_object_mut() {
            obj.insert("_interrupt_exit".to_string(), Value::Bool(true));
        }
        Ok(())
    }

    /// Pops a target and walks it as a frame: a pointer string names an
    /// array in the document, an array runs anonymously.
    fn op_enter(&mut self) -> Result<(), Fatal> {
        self.require_stack("enter", 1)?;
        let (frame, frame_path) = match self.peek_top("enter")? {
            Value::String(path) => {
                let frame = {
                    let d = self.doc.borrow();
                    let target = pointer::resolve(d.root(), &path)
                        .map_err(|_| enter_not_an_array(&path))?;
                    target
                        .as_array()
                        .cloned()
                        .ok_or_else(|| enter_not_an_array(&path))?
                };
                (frame, path)
            }
            Value::Array(frame) => (frame, "<anonymous>".to_string()),
            _ => {
                return Err(fatal(
                    FatalKind::TypeMismatch,
                    "enter: top of stack must be a path string or an array",
                ))
            }
        };
        self.pop_logged("enter")?;
        self.walk_frame(&frame, &frame_path)
    }

    /// Pops `[.., Prog, Expect]`, runs Prog in a sandbox, and subset-matches
    /// the final document against Expect. A mismatch pushes a structured
    /// error value; a match pushes nothing.
    fn op_test(&mut self) -> Result<(), Fatal> {
        self.require_stack("test", 2)?;
        let expected = self.pop_logged("test")?;
        let program = self.pop_logged("test")?;

        let actual = sandbox::run_program(&program, &self.opcodes, &self.output)?;
        if subset_match(&expected, &actual) {
            return Ok(());
        }

        let error = json!({
            "error": true,
            "kind": "test_failure",
            "message": "test failed: result mismatch",
            "details": {"expected": expected, "actual": actual},
        });
        let mut d = self.doc.borrow_mut();
        residual::record(d.root_mut(), "add", "/stack/-", Some(&error));
        d.stack_mut("test")?.push(error);
        Ok(())
    }

    /// Pops a structured error object and pretty-prints it.
    fn op_print_error(&mut self) -> Result<(), Fatal> {
        self.require_stack("print_error", 1)?;
        let value = self.pop_logged("print_error")?;
        print_error_pretty(&value);
        Ok(())
    }

    /// Pops a file path, reads and parses it (leniently), pushes the value.
    /// The read happens against the peeked path so an I/O or parse fatal
    /// leaves the stack and the residual log untouched.
    fn op_load(&mut self) -> Result<(), Fatal> {
        self.require_stack("load", 1)?;
        let path = match self.peek_top("load")? {
            Value::String(s) => s,
            _ => {
                return Err(fatal(
                    FatalKind::TypeMismatch,
                    "load: path must be a string",
                ))
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|e| {
            fatal(
                FatalKind::IoError,
                format!("load: failed to read file '{path}': {e}"),
            )
        })?;
        let value = crate::reader::read_value(&text).map_err(|e| {
            fatal(
                FatalKind::IoError,
                format!("load: failed to parse file '{path}': {e}"),
            )
        })?;

        self.pop_logged("load")?;
        let mut d = self.doc.borrow_mut();
        residual::record(d.root_mut(), "add", "/stack/-", Some(&value));
        d.stack_mut("load")?.push(value);
        Ok(())
    }

    /// Pops `[.., V, P]` and writes V as pretty JSON to the file at P. Both
    /// operands are peeked for the write; the pops are logged only after the
    /// file is on disk.
    fn op_store(&mut self) -> Result<(), Fatal> {
        self.require_stack("store", 2)?;
        let path = match self.peek_top("store")? {
            Value::String(s) => s,
            _ => {
                return Err(fatal(
                    FatalKind::TypeMismatch,
                    "store: path must be a string",
                ))
            }
        };
        let value = {
            let d = self.doc.borrow();
            let stack = d.stack("store")?;
            let Some(value) = stack.len().checked_sub(2).and_then(|i| stack.get(i)) else {
                return Err(fatal(
                    FatalKind::StackUnderflow,
                    "store: need at least 2 values on stack",
                ));
            };
            deep_copy(value)
        };

        let mut text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        text.push('\n');
        std::fs::write(&path, text).map_err(|e| {
            fatal(
                FatalKind::IoError,
                format!("store: failed to write file '{path}': {e}"),
            )
        })?;

        self.pop_logged("store")?;
        self.pop_logged("store")?;
        Ok(())
    }

    /// Pops a program object, inverts its last residual entry in a sandbox,
    /// and pushes the modified program.
    fn op_undo(&mut self) -> Result<(), Fatal> {
        self.require_stack("undo", 1)?;
        let program = self.peek_top("undo")?;
        if !program.is_object() {
            return Err(fatal(
                FatalKind::TypeMismatch,
                "undo: top of stack must be a program object",
            ));
        }

        let result = sandbox::run_undo(&program)?;
        self.pop_logged("undo")?;
        let mut d = self.doc.borrow_mut();
        residual::record(d.root_mut(), "add", "/stack/-", Some(&result));
        d.stack_mut("undo")?.push(result);
        Ok(())
    }

    /// Pops a program object, executes the single instruction at its `pc`
    /// (default 0) in a sandbox, advances `pc`, and pushes the result.
    fn op_step(&mut self) -> Result<(), Fatal> {
        self.require_stack("step", 1)?;
        let program = self.peek_top("step")?;
        if !program.is_object() {
            return Err(fatal(
                FatalKind::TypeMismatch,
                "step: top of stack must be a program object",
            ));
        }

        let result = sandbox::run_step(&program, &self.opcodes, &self.output)?;
        self.pop_logged("step")?;
        let mut d = self.doc.borrow_mut();
        residual::record(d.root_mut(), "add", "/stack/-", Some(&result));
        d.stack_mut("step")?.push(result);
        Ok(())
    }
}

fn enter_not_an_array(path: &str) -> Fatal {
    fatal(
        FatalKind::NotFound,
        format!("enter: path '{path}' does not resolve to an array"),
    )
}

/// Map pointer resolution failures onto the fatal taxonomy.
fn path_fatal(ctx: &str, path: &str, err: PointerError) -> Fatal {
    match err {
        PointerError::Invalid => fatal(
            FatalKind::InvalidPath,
            format!("{ctx}: invalid path '{path}'"),
        ),
        _ => fatal(
            FatalKind::NotFound,
            format!("{ctx}: path not found: {path}"),
        ),
    }
}

/// Partial equality used by `test`: every field of `expected` must appear
/// and recursively match in `actual`; extra fields in `actual` are ignored.
/// Arrays and scalars compare strictly.
pub fn subset_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => e
            .iter()
            .all(|(k, v)| a.get(k).is_some_and(|av| subset_match(v, av))),
        (Value::Object(_), _) => false,
        _ => expected == actual,
    }
}

/// Render a structured error object the way `print_error` shows it.
pub fn print_error_pretty(value: &Value) {
    let Some(obj) = value.as_object() else {
        println!("invalid error object");
        return;
    };
    let kind = obj
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = obj.get("message").and_then(Value::as_str).unwrap_or("");

    println!("\n-- {kind} --");
    if !message.is_empty() {
        println!("{message}");
    }

    let Some(details) = obj.get("details") else {
        return;
    };
    let Some(details_obj) = details.as_object() else {
        return;
    };
    let expected = details_obj.get("expected");
    let actual = details_obj.get("actual");
    if expected.is_none() && actual.is_none() {
        println!("Details:");
        println!("{}", pretty(details));
        return;
    }
    if let Some(v) = expected {
        println!("Expected:");
        println!("{}", pretty(v));
    }
    if let Some(v) = actual {
        println!("Actual:");
        println!("{}", pretty(v));
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Document;
    use serde_json::json;

    fn run_doc(program: Value) -> Value {
        try_run_doc(program).expect("program should run")
    }

    fn try_run_doc(program: Value) -> Result<Value, Fatal> {
        let doc = Document::new(program).into_ref();
        doc.borrow_mut().retain();
        let mut vm = Vm::new(doc.clone());
        let outcome = vm.run_entrypoint();
        vm.shutdown();
        if let Err(err) = outcome {
            let snapshot = doc.borrow().root().clone();
            return Err(err.with_snapshot(&snapshot));
        }
        doc.borrow_mut().release();
        let result = doc.borrow().root().clone();
        Ok(result)
    }

    #[test]
    fn arithmetic_store_round_trip() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [10, 20, {".": "add_two_top"}, "temp_sum", {".": "pop_and_store"}]
        }));
        assert_eq!(out["stack"], json!([]));
        assert_eq!(out["temp_sum"], json!(30));
    }

    #[test]
    fn add_two_top_preserves_integerness() {
        let out = run_doc(json!({"stack": [], "entrypoint": [1, 2, {".": "add_two_top"}]}));
        assert_eq!(out["stack"], json!([3]));
        let out = run_doc(json!({"stack": [], "entrypoint": [1.5, 2, {".": "add_two_top"}]}));
        assert_eq!(out["stack"], json!([3.5]));
    }

    #[test]
    fn add_two_top_rejects_non_numbers() {
        let err = try_run_doc(json!({
            "stack": [],
            "entrypoint": ["a", "b", {".": "add_two_top"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
    }

    #[test]
    fn stack_underflow_names_the_opcode() {
        let err = try_run_doc(json!({
            "stack": [1],
            "entrypoint": [{".": "add_two_top"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::StackUnderflow);
        assert!(err.message.contains("add_two_top"));
    }

    #[test]
    fn literal_pushes_are_deep_copies() {
        let out = run_doc(json!({
            "stack": [],
            "xs": [1, 2],
            "entrypoint": ["/xs", {".": "get"}]
        }));
        assert_eq!(out["stack"], json!([[1, 2]]));
        assert_eq!(out["xs"], json!([1, 2]));
    }

    #[test]
    fn duplicate_then_store_then_get_round_trips() {
        let out = run_doc(json!({
            "stack": [{"v": 7}],
            "entrypoint": [
                {".": "duplicate_top"},
                "k", {".": "pop_and_store"},
                "/k", {".": "get"}
            ]
        }));
        assert_eq!(out["stack"], json!([{"v": 7}, {"v": 7}]));
        assert_eq!(out["k"], json!({"v": 7}));
    }

    #[test]
    fn pop_and_store_requires_string_key() {
        let err = try_run_doc(json!({
            "stack": [],
            "entrypoint": [1, 2, {".": "pop_and_store"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
        assert!(err.message.contains("pop_and_store"));
    }

    #[test]
    fn get_on_unresolvable_path_is_fatal() {
        let err = try_run_doc(json!({
            "stack": [],
            "entrypoint": ["/missing", {".": "get"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::NotFound);
    }

    #[test]
    fn set_performs_in_place_scalar_assignment() {
        let out = run_doc(json!({
            "stack": [],
            "target": {"inner": [1, 2, 3]},
            "entrypoint": [99, "/target/inner/1", {".": "set"}]
        }));
        assert_eq!(out["target"], json!({"inner": [1, 99, 3]}));
        assert_eq!(out["stack"], json!([]));
    }

    #[test]
    fn set_refuses_container_values() {
        let err = try_run_doc(json!({
            "stack": [],
            "target": 0,
            "entrypoint": [[1, 2], "/target", {".": "set"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
    }

    #[test]
    fn append_pushes_deep_copy_onto_target_array() {
        let out = run_doc(json!({
            "stack": [],
            "xs": [1],
            "entrypoint": [{"tag": "t"}, "/xs", {".": "append"}]
        }));
        assert_eq!(out["xs"], json!([1, {"tag": "t"}]));
    }

    #[test]
    fn macro_expansion_by_name() {
        let out = run_doc(json!({
            "stack": [],
            "my_macro": [5, 7, {".": "add_two_top"}],
            "entrypoint": [{".": "my_macro"}, "sum", {".": "pop_and_store"}]
        }));
        assert_eq!(out["sum"], json!(12));
    }

    #[test]
    fn opcode_wins_over_macro_of_same_name() {
        // A root array named `get` must not shadow the opcode.
        let out = run_doc(json!({
            "stack": [],
            "get": [1, 2, 3],
            "entrypoint": ["/get", {".": "get"}]
        }));
        assert_eq!(out["stack"], json!([[1, 2, 3]]));
    }

    #[test]
    fn unknown_directive_name_pushes_the_object_literally() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [{".": "no_such_op", "extra": 1}]
        }));
        assert_eq!(out["stack"], json!([{".": "no_such_op", "extra": 1}]));
    }

    #[test]
    fn object_without_dot_is_a_literal() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [{"plain": true}]
        }));
        assert_eq!(out["stack"], json!([{"plain": true}]));
    }

    #[test]
    fn dot_with_invalid_type_is_fatal() {
        let err = try_run_doc(json!({
            "stack": [],
            "entrypoint": [{".": 42}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::InvalidDirective);
    }

    #[test]
    fn bool_and_null_frame_elements_are_fatal() {
        let err = try_run_doc(json!({"stack": [], "entrypoint": [true]})).unwrap_err();
        assert_eq!(err.kind, FatalKind::InvalidDirective);
        let err = try_run_doc(json!({"stack": [], "entrypoint": [null]})).unwrap_err();
        assert_eq!(err.kind, FatalKind::InvalidDirective);
    }

    #[test]
    fn nested_dot_array_runs_as_sub_frame() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [{".": [1, 2, {".": "add_two_top"}]}]
        }));
        assert_eq!(out["stack"], json!([3]));
    }

    #[test]
    fn exit_unwinds_exactly_one_frame() {
        let out = run_doc(json!({
            "stack": [],
            "sub": [1, {".": "exit"}, 2],
            "entrypoint": [{".": "sub"}, 3]
        }));
        // `exit` breaks out of `sub` before pushing 2; the outer frame
        // continues and pushes 3.
        assert_eq!(out["stack"], json!([1, 3]));
        assert!(out.get("_interrupt_exit").is_none());
    }

    #[test]
    fn exit_at_top_of_entrypoint_terminates_cleanly() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [{".": "exit"}, 1]
        }));
        assert_eq!(out["stack"], json!([]));
        assert!(out.get("_interrupt_exit").is_none());
    }

    #[test]
    fn call_stack_is_balanced_after_execution() {
        let out = run_doc(json!({
            "stack": [],
            "m": [1],
            "entrypoint": [{".": "m"}, {".": [2]}]
        }));
        assert_eq!(out["call_stack"], json!([]));
        assert_eq!(out["stack"], json!([1, 2]));
    }

    #[test]
    fn enter_walks_named_and_anonymous_frames() {
        let out = run_doc(json!({
            "stack": [],
            "body": [41, 1, {".": "add_two_top"}],
            "entrypoint": ["/body", {".": "enter"}]
        }));
        assert_eq!(out["stack"], json!([42]));

        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [[7], {".": "enter"}]
        }));
        assert_eq!(out["stack"], json!([7]));
    }

    #[test]
    fn enter_requires_an_array_target() {
        let err = try_run_doc(json!({
            "stack": [],
            "scalar": 1,
            "entrypoint": ["/scalar", {".": "enter"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::NotFound);
    }

    #[test]
    fn ptr_in_place_edit() {
        let out = run_doc(json!({
            "stack": [0, 0, 0],
            "entrypoint": [
                "/stack/1", {".": "ptr_new"},
                99, {".": "ptr_set"},
                {".": "ptr_release"}
            ]
        }));
        assert_eq!(out["stack"], json!([0, 99, 0]));
        assert_eq!(out["ref"], json!(0));
    }

    #[test]
    fn ptr_get_matches_get() {
        let via_ptr = run_doc(json!({
            "stack": [],
            "cfg": {"mode": "fast"},
            "entrypoint": ["/cfg", {".": "ptr_new"}, {".": "ptr_get"}, {".": "ptr_release"}]
        }));
        let via_get = run_doc(json!({
            "stack": [],
            "cfg": {"mode": "fast"},
            "entrypoint": ["/cfg", {".": "get"}]
        }));
        assert_eq!(via_ptr["stack"], via_get["stack"]);
    }

    #[test]
    fn ptr_release_on_empty_stack_is_fatal() {
        let err = try_run_doc(json!({
            "stack": [],
            "entrypoint": [{".": "ptr_release"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::StackUnderflow);
    }

    #[test]
    fn map_over_applies_function_per_element() {
        // Double each element: duplicate then add.
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [
                [1, 2, 3],
                [{".": "duplicate_top"}, {".": "add_two_top"}],
                {".": "map_over"}
            ]
        }));
        assert_eq!(out["stack"], json!([[2, 4, 6]]));
    }

    #[test]
    fn map_over_identity_preserves_input() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [[1, {"k": 2}, [3]], [], {".": "map_over"}]
        }));
        assert_eq!(out["stack"], json!([[1, {"k": 2}, [3]]]));
    }

    #[test]
    fn map_over_stack_discipline_violation_is_fatal() {
        // Function pushes an extra value per element.
        let err = try_run_doc(json!({
            "stack": [],
            "entrypoint": [[1, 2], [5], {".": "map_over"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::AssertionFailure);
    }

    #[test]
    fn subset_match_semantics() {
        assert!(subset_match(&json!({"x": 1}), &json!({"x": 1, "y": 2})));
        assert!(!subset_match(&json!({"x": 2}), &json!({"x": 1})));
        assert!(!subset_match(&json!({"x": 1}), &json!({"y": 1})));
        assert!(subset_match(
            &json!({"a": {"b": 1}}),
            &json!({"a": {"b": 1, "c": 3}})
        ));
        // Arrays compare strictly, element-wise.
        assert!(!subset_match(&json!([1]), &json!([1, 2])));
        assert!(subset_match(&json!([1, 2]), &json!([1, 2])));
        // Type mismatch is never equal.
        assert!(!subset_match(&json!(1), &json!("1")));
    }

    #[test]
    fn test_opcode_pushes_nothing_on_subset_success() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [
                {"stack": [], "x": 1, "y": 2, "entrypoint": []},
                {"x": 1},
                {".": "test"}
            ]
        }));
        assert_eq!(out["stack"], json!([]));
    }

    #[test]
    fn test_opcode_pushes_structured_error_on_mismatch() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [
                {"stack": [], "x": 1, "entrypoint": []},
                {"x": 2},
                {".": "test"}
            ]
        }));
        let err = &out["stack"][0];
        assert_eq!(err["error"], json!(true));
        assert_eq!(err["kind"], json!("test_failure"));
        assert_eq!(err["details"]["expected"], json!({"x": 2}));
        assert_eq!(err["details"]["actual"]["x"], json!(1));
    }

    #[test]
    fn test_opcode_runs_the_program_in_a_sandbox() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [
                {"stack": [], "entrypoint": [1, 2, {".": "add_two_top"}]},
                {"stack": [3]},
                {".": "test"}
            ]
        }));
        // The sandboxed run matched; the caller stack is untouched.
        assert_eq!(out["stack"], json!([]));
    }

    #[test]
    fn reversible_run_records_literal_pushes() {
        let out = run_doc(json!({
            "stack": [],
            "is_reversible": true,
            "entrypoint": [10]
        }));
        assert_eq!(
            out["residual"],
            json!([{"op": "add", "path": "/stack/-", "value": 10}])
        );
    }

    #[test]
    fn grouped_arithmetic_undoes_as_a_unit() {
        // Run add_two_top reversibly, then undo its grouped residual entry.
        let inner = run_doc(json!({
            "stack": [10, 20],
            "is_reversible": true,
            "entrypoint": [{".": "add_two_top"}]
        }));
        assert_eq!(inner["stack"], json!([30]));
        assert_eq!(inner["residual"].as_array().unwrap().len(), 1);

        let outer = run_doc(json!({
            "stack": [],
            "entrypoint": [inner, {".": "undo"}]
        }));
        assert_eq!(outer["stack"][0]["stack"], json!([10, 20]));
        assert_eq!(outer["stack"][0]["residual"], json!([]));
    }

    #[test]
    fn rejected_pop_and_store_key_stays_on_the_stack() {
        let err = try_run_doc(json!({
            "stack": [1, 2],
            "is_reversible": true,
            "entrypoint": [{".": "pop_and_store"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
        let snapshot = err.snapshot.unwrap();
        assert_eq!(snapshot["stack"], json!([1, 2]));
        assert!(snapshot.get("residual").is_none());
    }

    #[test]
    fn rejected_undo_and_step_programs_leave_no_residual_entry() {
        for name in ["undo", "step"] {
            let err = try_run_doc(json!({
                "stack": [5],
                "is_reversible": true,
                "entrypoint": [{".": name}]
            }))
            .unwrap_err();
            assert_eq!(err.kind, FatalKind::TypeMismatch);
            let snapshot = err.snapshot.unwrap();
            assert_eq!(snapshot["stack"], json!([5]));
            assert!(snapshot.get("residual").is_none());
        }
    }

    #[test]
    fn rejected_enter_target_leaves_no_residual_entry() {
        let err = try_run_doc(json!({
            "stack": [7],
            "is_reversible": true,
            "entrypoint": [{".": "enter"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
        let snapshot = err.snapshot.unwrap();
        assert_eq!(snapshot["stack"], json!([7]));
        assert!(snapshot.get("residual").is_none());
    }

    #[test]
    fn unresolvable_ptr_new_leaves_no_residual_entry() {
        let err = try_run_doc(json!({
            "stack": ["/missing"],
            "is_reversible": true,
            "entrypoint": [{".": "ptr_new"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::NotFound);
        let snapshot = err.snapshot.unwrap();
        assert_eq!(snapshot["stack"], json!(["/missing"]));
        assert!(snapshot.get("residual").is_none());
    }

    #[test]
    fn non_scalar_ptr_set_value_leaves_no_residual_entry() {
        let err = try_run_doc(json!({
            "stack": [[1, 2]],
            "x": 0,
            "is_reversible": true,
            "entrypoint": ["/x", {".": "ptr_new"}, {".": "ptr_set"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
        let snapshot = err.snapshot.unwrap();
        // The rejected value is still on the stack; only the literal push of
        // "/x" and ptr_new's own pop made it into the log.
        assert_eq!(snapshot["stack"], json!([[1, 2]]));
        assert_eq!(snapshot["residual"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn rejected_file_paths_leave_no_residual_entry() {
        let err = try_run_doc(json!({
            "stack": [1],
            "is_reversible": true,
            "entrypoint": [{".": "load"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
        assert!(err.snapshot.unwrap().get("residual").is_none());

        let err = try_run_doc(json!({
            "stack": [0, 1],
            "is_reversible": true,
            "entrypoint": [{".": "store"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
        let snapshot = err.snapshot.unwrap();
        assert_eq!(snapshot["stack"], json!([0, 1]));
        assert!(snapshot.get("residual").is_none());
    }

    #[test]
    fn step_advances_pc_one_instruction_at_a_time() {
        let out = run_doc(json!({
            "stack": [],
            "entrypoint": [
                {"stack": [], "entrypoint": [5, 6]},
                {".": "step"}
            ]
        }));
        let stepped = &out["stack"][0];
        assert_eq!(stepped["pc"], json!(1));
        assert_eq!(stepped["stack"], json!([5]));
    }

    #[test]
    fn missing_stack_during_walk_is_fatal() {
        let err = try_run_doc(json!({"entrypoint": [1]})).unwrap_err();
        assert_eq!(err.kind, FatalKind::TypeMismatch);
    }

    #[test]
    fn document_without_entrypoint_is_a_no_op() {
        let out = run_doc(json!({"data": [1, 2, 3]}));
        assert_eq!(out, json!({"data": [1, 2, 3], "ref": 0}));
    }
}
