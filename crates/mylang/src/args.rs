//! The call-argument container.
//!
//! `Args` is a dict with an enforced positional/keyed split: positional
//! entries are the gap-free `Int`-keyed prefix `0..n`, keyed entries are
//! everything else, in insertion order. Statements evaluate into an `Args`;
//! keyed-only args dispatch to `set`, anything else to `call`.

use crate::{
    exception_private::{RunError, RunResult},
    types::dict::{Dict, DictKey, OrderedMap},
    value::Value,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct Args {
    positional: Vec<Value>,
    keyed: OrderedMap,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(positional: Vec<Value>, keyed: OrderedMap) -> Self {
        Self { positional, keyed }
    }

    /// Builds args from an arbitrary mapping: `Int` keys become positional
    /// (compacted into a gap-free prefix in key order), all other keys stay
    /// keyed.
    pub fn from_dict(dict: &Dict) -> Self {
        let mut ints: Vec<(i64, Value)> = Vec::new();
        let mut keyed = OrderedMap::default();
        for (key, value) in dict.iter() {
            match key {
                DictKey::Int(i) => ints.push((i, value)),
                other => {
                    keyed.insert(other, value);
                }
            }
        }
        ints.sort_by_key(|&(i, _)| i);
        Self { positional: ints.into_iter().map(|(_, v)| v).collect(), keyed }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyed(&self) -> &OrderedMap {
        &self.keyed
    }

    pub fn push_positional(&mut self, value: Value) {
        self.positional.push(value);
    }

    /// Overwrites an existing positional slot; false when out of range.
    pub fn set_positional(&mut self, index: usize, value: Value) -> bool {
        match self.positional.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn insert_keyed(&mut self, key: DictKey, value: Value) {
        self.keyed.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyed.is_empty()
    }

    pub fn is_keyed_only(&self) -> bool {
        self.positional.is_empty() && !self.keyed.is_empty()
    }

    pub fn is_positional_only(&self) -> bool {
        self.keyed.is_empty()
    }

    /// Splits off the callee specifier, leaving the call's own arguments.
    pub fn split_callee(mut self) -> Option<(Value, Self)> {
        if self.positional.is_empty() {
            return None;
        }
        let callee = self.positional.remove(0);
        Some((callee, self))
    }

    /// Checks that exactly `n` positional arguments and no keyed arguments
    /// were passed.
    pub fn check_exact(&self, name: &str, n: usize) -> RunResult<()> {
        if self.positional.len() == n && self.keyed.is_empty() {
            Ok(())
        } else {
            Err(RunError::arity_exact(name, n, self.len()))
        }
    }

    /// Checks for exactly one positional argument, returning it.
    pub fn get_one(&self, name: &str) -> RunResult<Value> {
        self.check_exact(name, 1)?;
        Ok(self.positional[0])
    }

    /// Checks for zero or one positional argument.
    pub fn get_zero_one(&self, name: &str) -> RunResult<Option<Value>> {
        if !self.keyed.is_empty() || self.positional.len() > 1 {
            return Err(RunError::arity_at_most(name, 1, self.len()));
        }
        Ok(self.positional.first().copied())
    }

    pub fn get_two(&self, name: &str) -> RunResult<(Value, Value)> {
        self.check_exact(name, 2)?;
        Ok((self.positional[0], self.positional[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;
    use crate::intern::Interns;

    #[test]
    fn from_dict_compacts_int_keys() {
        let mut interns = Interns::new();
        let heap = Heap::new();
        let mut dict = Dict::new();
        dict.insert(DictKey::Int(1), Value::Int(11));
        dict.insert(DictKey::from_value(Value::InternString(interns.intern("k")), &heap, &mut interns), Value::Int(5));
        dict.insert(DictKey::Int(0), Value::Int(10));
        let args = Args::from_dict(&dict);
        assert_eq!(args.positional().len(), 2);
        assert!(matches!(args.positional()[0], Value::Int(10)));
        assert!(matches!(args.positional()[1], Value::Int(11)));
        assert_eq!(args.keyed().len(), 1);
    }

    #[test]
    fn keyed_only_detection() {
        let mut interns = Interns::new();
        let mut args = Args::new();
        assert!(!args.is_keyed_only());
        args.insert_keyed(DictKey::Str(interns.intern("k")), Value::Null);
        assert!(args.is_keyed_only());
        args.push_positional(Value::Int(1));
        assert!(!args.is_keyed_only());
    }
}
