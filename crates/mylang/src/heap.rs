//! Arena storage for heap-allocated values.
//!
//! Immediate values (ints, bools, interned strings, ...) live inline in
//! [`Value`](crate::value::Value); everything with identity or interior
//! structure lives here and is addressed by a [`HeapId`]. The arena is owned
//! by a session and freed wholesale when the session ends, so ids stay valid
//! for the whole run and identity equality is id equality.
//!
//! Back-edges that would form cycles (method wrappers to their class, frames
//! to enclosing frames) are stored as plain ids: nothing counts them, so no
//! cycle can keep anything alive beyond the arena itself.

use crate::{
    args::Args,
    scope::LexicalScope,
    types::{Array, ClassObject, Context, ErrorObject, Function, Instance, PathValue},
    types::dict::Dict,
    value::Value,
};

/// Handle to a value stored in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HeapId(u32);

impl HeapId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Data stored in a heap slot.
#[derive(Debug)]
pub(crate) enum HeapData {
    /// A runtime-built string (literals stay interned and never get here).
    Str(String),
    Dict(Dict),
    Args(Args),
    Array(Array),
    Path(PathValue),
    Function(Function),
    BoundMethod(crate::types::BoundMethod),
    NativeMethod(crate::types::NativeMethod),
    Class(ClassObject),
    Instance(Instance),
    /// Explicit indirection created by `ref`: passes the value itself
    /// rather than a key to look up.
    ValueRef(Value),
    Error(ErrorObject),
    /// A lexical scope; heap-allocated so closures can share it.
    Scope(LexicalScope),
    /// A dynamic context created by the `context` builtin.
    Context(Context),
}

/// The arena itself. Allocate-only; slots live until session teardown.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    slots: Vec<HeapData>,
}

impl Heap {
    pub fn new() -> Self {
        Self { slots: Vec::with_capacity(64) }
    }

    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(u32::try_from(self.slots.len()).expect("heap exhausted"));
        self.slots.push(data);
        id
    }

    /// # Panics
    /// Panics on a dangling id; ids are only produced by `allocate`, so this
    /// indicates an interpreter bug.
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.slots[id.index()]
    }

    /// Returns the scope stored at `id`.
    ///
    /// # Panics
    /// Panics if the slot does not hold a scope; scope ids are threaded
    /// through frames and closures and never point at anything else.
    pub fn scope(&self, id: HeapId) -> &LexicalScope {
        match self.get(id) {
            HeapData::Scope(scope) => scope,
            other => panic!("heap slot {id:?} expected a scope, found {other:?}"),
        }
    }

    pub fn scope_mut(&mut self, id: HeapId) -> &mut LexicalScope {
        match self.get_mut(id) {
            HeapData::Scope(scope) => scope,
            other => panic!("heap slot expected a scope, found {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_returns_stable_ids() {
        let mut heap = Heap::new();
        let a = heap.allocate(HeapData::Str("a".to_owned()));
        let b = heap.allocate(HeapData::Str("b".to_owned()));
        assert_ne!(a, b);
        match heap.get(a) {
            HeapData::Str(s) => assert_eq!(s, "a"),
            other => panic!("unexpected slot: {other:?}"),
        }
    }
}
