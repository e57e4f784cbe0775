//! Throwable error values.

use crate::{heap::HeapId, value::Value};

/// A value usable as a throwable: a message plus, when thrown through a
/// user-declared subclass, that class's identity. `class: None` means the
/// builtin `Error` class, which is also what host-level failures wrap into
/// before user `catch` clauses see them.
#[derive(Debug)]
pub(crate) struct ErrorObject {
    pub class: Option<HeapId>,
    pub message: Value,
}

impl ErrorObject {
    pub fn new(class: Option<HeapId>, message: Value) -> Self {
        Self { class, message }
    }
}
