//! User-defined functions and bound methods.

use crate::{args::Args, expressions::BlockId, heap::HeapId, value::Value};

/// A function created by `fun`: name, parameter container, body and the
/// lexical scope captured at definition time. The captured scope is set once
/// and never rebinds.
#[derive(Debug)]
pub(crate) struct Function {
    pub name: Value,
    /// Positional entries are parameter names; keyed entries are parameters
    /// with default values.
    pub parameters: Args,
    pub body: BlockId,
    /// Heap id of the scope this function closes over.
    pub closure_scope: HeapId,
}

/// A method bound to a receiver. On call, the receiver is injected as
/// `self` in the callee's locals before parameters bind.
#[derive(Debug)]
pub(crate) struct BoundMethod {
    pub receiver: Value,
    /// Heap id of the underlying `Function`.
    pub function: HeapId,
}

/// A native method bound to its receiver, materialized by attribute access
/// on strings and containers.
#[derive(Debug)]
pub(crate) struct NativeMethod {
    pub receiver: Value,
    pub method: crate::builtins::methods::TypeMethod,
}
