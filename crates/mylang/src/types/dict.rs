//! The ordered mapping type and its key projection.
//!
//! Dicts preserve insertion order and look keys up with identity-aware
//! rules: scalars and strings by value, symbols and heap values by
//! identity. The projection lives in [`DictKey`], which is also what scope
//! locals are keyed by - string keys intern, so value-equal strings resolve
//! to the same slot while distinct symbols never collide.

use indexmap::IndexMap;

use crate::{
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StringId, SymbolId},
    value::Value,
};

/// Hashable projection of a value used as a dict or locals key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DictKey {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    /// Floats key by bit pattern; `1` and `1.0` are distinct keys.
    FloatBits(u64),
    Str(StringId),
    Symbol(SymbolId),
    Dots(u32),
    Builtin(crate::builtins::Builtins),
    Block(crate::expressions::BlockId),
    /// Any other heap value: identity keying by slot.
    Ident(HeapId),
}

impl DictKey {
    /// Projects a value into key form. Heap strings are interned so that
    /// value-equal string keys share a slot.
    pub fn from_value(value: Value, heap: &Heap, interns: &mut Interns) -> Self {
        match value {
            Value::Undefined => Self::Undefined,
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Int(i) => Self::Int(i),
            Value::Float(f) => Self::FloatBits(f.to_bits()),
            Value::InternString(id) => Self::Str(id),
            Value::Symbol(id) => Self::Symbol(id),
            Value::Dots(n) => Self::Dots(n),
            Value::Builtin(b) => Self::Builtin(b),
            Value::Block(b) => Self::Block(b),
            Value::Ref(id) => match heap.get(id) {
                HeapData::Str(s) => Self::Str(interns.intern(s)),
                HeapData::ValueRef(inner) => Self::from_value(*inner, heap, interns),
                _ => Self::Ident(id),
            },
        }
    }

    /// Reconstructs the value form of the key.
    pub fn to_value(self) -> Value {
        match self {
            Self::Undefined => Value::Undefined,
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::Int(i),
            Self::FloatBits(bits) => Value::Float(f64::from_bits(bits)),
            Self::Str(id) => Value::InternString(id),
            Self::Symbol(id) => Value::Symbol(id),
            Self::Dots(n) => Value::Dots(n),
            Self::Builtin(b) => Value::Builtin(b),
            Self::Block(b) => Value::Block(b),
            Self::Ident(id) => Value::Ref(id),
        }
    }

}

/// Ordered map used for dict entries, args keys, locals and prototypes.
pub(crate) type OrderedMap = IndexMap<DictKey, Value, ahash::RandomState>;

/// The dict value: an insertion-ordered mapping from value to value.
#[derive(Debug, Default)]
pub(crate) struct Dict {
    entries: OrderedMap,
}

impl Dict {
    pub fn new() -> Self {
        Self { entries: OrderedMap::default() }
    }

    pub fn from_entries(entries: OrderedMap) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: DictKey) -> Option<Value> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: DictKey, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DictKey, Value)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = DictKey> + '_ {
        self.entries.keys().copied()
    }
}

/// A dynamic context: own entries with read-through to the parent context
/// established by an enclosing frame.
#[derive(Debug, Default)]
pub(crate) struct Context {
    pub entries: Dict,
    pub parent: Option<HeapId>,
}

impl Context {
    pub fn new(parent: Option<HeapId>) -> Self {
        Self { entries: Dict::new(), parent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_keys_intern_to_one_slot() {
        let mut heap = Heap::new();
        let mut interns = Interns::new();
        let inline = DictKey::from_value(Value::InternString(interns.intern("k")), &heap, &mut interns);
        let heap_str = Value::Ref(heap.allocate(HeapData::Str("k".to_owned())));
        let built = DictKey::from_value(heap_str, &heap, &mut interns);
        assert_eq!(inline, built);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut dict = Dict::new();
        let mut interns = Interns::new();
        for name in ["c", "a", "b"] {
            dict.insert(DictKey::Str(interns.intern(name)), Value::Int(1));
        }
        let keys: Vec<String> = dict
            .keys()
            .map(|k| match k {
                DictKey::Str(id) => interns.get_str(id).to_owned(),
                other => panic!("unexpected key {other:?}"),
            })
            .collect();
        assert_eq!(keys, ["c", "a", "b"]);
    }
}
