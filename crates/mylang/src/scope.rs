//! Lexical scopes and stack frames.
//!
//! A [`LexicalScope`] is one link of the chain searched by name lookups:
//! lookup walks parents, mutation writes only to the innermost locals.
//! Scopes live on the heap so closures can keep their defining chain alive.
//!
//! A [`StackFrame`] is the per-call record: it owns the head scope of its
//! chain plus the return-value slot checked after every statement and the
//! catch slot installed by `try`. Frames are pushed and popped strictly
//! LIFO by the evaluator; a mismatch is a fatal interpreter bug.

use crate::{expressions::BlockId, heap::HeapId, intern::StringId, types::dict::OrderedMap, value::Value};

/// One link of the lexical chain, plus the typed side-channels that paired
/// control-flow callables use to communicate (`loop` with `break`/`continue`/
/// `while`, `class` with `init`, `export` with the module loader).
#[derive(Debug)]
pub(crate) struct LexicalScope {
    pub locals: OrderedMap,
    pub parent: Option<HeapId>,
    /// Active loops installed on this scope, innermost last.
    pub loop_stack: Vec<LoopData>,
    /// The class whose body is currently executing in this scope.
    pub current_class: Option<HeapId>,
    /// Heap id of the dict collecting `export`ed names.
    pub export: Option<HeapId>,
}

impl LexicalScope {
    pub fn new(parent: Option<HeapId>) -> Self {
        Self {
            locals: OrderedMap::default(),
            parent,
            loop_stack: Vec::new(),
            current_class: None,
            export: None,
        }
    }
}

/// Flags a running loop shares with `while`, `break` and `continue`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoopData {
    pub broken: bool,
    pub should_continue: bool,
}

/// A per-frame record describing how the next inner throw must be handled.
#[derive(Debug)]
pub(crate) struct CatchSpec {
    /// Key to bind the caught error under in the catch clause's frame.
    pub error_key: Option<Value>,
    /// The catch body: statements of the form `Class1 Class2 ... clause-body`.
    pub catch_body: BlockId,
}

/// Per-call stack frame.
#[derive(Debug)]
pub(crate) struct StackFrame {
    /// Head scope of this frame's lexical chain; the frame's locals are the
    /// scope's locals.
    pub scope: HeapId,
    /// `None` means "no return signalled".
    pub return_value: Option<Value>,
    /// Set by `try`, consumed by the next inner call that raises.
    pub catch_spec: Option<CatchSpec>,
    /// Dynamic context attached to this frame by the `context` builtin.
    pub context: Option<HeapId>,
    /// Callee name, for diagnostics.
    pub name: Option<StringId>,
}

impl StackFrame {
    pub fn new(scope: HeapId, name: Option<StringId>) -> Self {
        Self { scope, return_value: None, catch_spec: None, context: None, name }
    }
}
