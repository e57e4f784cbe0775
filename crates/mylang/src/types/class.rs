//! Class objects and instances.
//!
//! A class is created by the `class` builtin: its body executes in the
//! caller's lexical scope and the resulting bindings become the prototype.
//! Calling a class allocates an [`Instance`], binds the initializer as a
//! method on it and invokes it with the call's arguments.
//!
//! Prototype functions are stored unbound; attribute access on an instance
//! wraps them into bound methods at lookup time. Base references and the
//! method-to-class relation are plain ids, which keeps the class graph free
//! of ownership cycles.

use smallvec::SmallVec;

use crate::{
    heap::{Heap, HeapData, HeapId},
    intern::StringId,
    types::dict::{DictKey, OrderedMap},
    value::Value,
};

/// A class value: name, base classes, prototype and optional initializer.
#[derive(Debug)]
pub(crate) struct ClassObject {
    pub name: StringId,
    /// Base classes: heap ids of `ClassObject`s, or the builtin `Error`
    /// type value. Empty means the implicit root object.
    pub bases: SmallVec<[Value; 2]>,
    /// Member name to method/attribute mapping, populated from the class
    /// body's bindings.
    pub prototype: OrderedMap,
    /// Heap id of the initializer `Function`, set by `init` in the body.
    pub initializer: Option<HeapId>,
    /// True when the class descends from the builtin `Error` type and its
    /// instances are throwable.
    pub is_error: bool,
    /// Default message for `error`-declared classes.
    pub error_message: Option<StringId>,
}

impl ClassObject {
    /// Looks a member up on this class or, failing that, its bases
    /// (depth-first, declaration order).
    pub fn lookup_member(&self, key: DictKey, heap: &Heap) -> Option<Value> {
        if let Some(value) = self.prototype.get(&key) {
            return Some(*value);
        }
        for base in &self.bases {
            if let Value::Ref(id) = base
                && let HeapData::Class(base_class) = heap.get(*id)
                && let Some(value) = base_class.lookup_member(key, heap)
            {
                return Some(value);
            }
        }
        None
    }

    /// True when `ancestor` is this class or one of its transitive bases.
    pub fn descends_from(&self, self_id: HeapId, ancestor: HeapId, heap: &Heap) -> bool {
        if self_id == ancestor {
            return true;
        }
        self.bases.iter().any(|base| match base {
            Value::Ref(id) => match heap.get(*id) {
                HeapData::Class(base_class) => base_class.descends_from(*id, ancestor, heap),
                _ => false,
            },
            _ => false,
        })
    }
}

/// A typed object: a class reference (immutable) plus per-instance
/// attributes. Attribute writes land here, never in the prototype.
#[derive(Debug)]
pub(crate) struct Instance {
    pub class: HeapId,
    pub attrs: OrderedMap,
}

impl Instance {
    pub fn new(class: HeapId) -> Self {
        Self { class, attrs: OrderedMap::default() }
    }
}
