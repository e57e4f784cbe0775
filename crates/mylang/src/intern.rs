//! String and symbol interning.
//!
//! All string literals, identifiers and dictionary keys that originate from
//! source text are interned: the interner stores each unique string once and
//! hands out a `StringId`. Two value-equal strings therefore share a single
//! id, which is what makes identity-keyed scope lookups resolve value-equal
//! string keys to the same slot.
//!
//! Symbols are separate: every `symbol` call mints a fresh `SymbolId`, so two
//! symbols with the same name never collide.
//!
//! StringIds are laid out as follows:
//! * `0..count(StaticStrings)` - the static strings, in declaration order
//! * everything above - strings interned at parse time or runtime

use ahash::AHashMap;
use strum::{EnumCount, IntoEnumIterator};

/// Index into the string interner's storage.
///
/// Uses `u32` to save space; ~4 billion unique strings is more than enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StringId(u32);

impl StringId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a unique symbol value.
///
/// The id indexes into the interner's symbol table, which records the
/// symbol's name. Equality of symbols is equality of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SymbolId(u32);

impl SymbolId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// String values known at compile time, pre-interned with stable ids.
///
/// The discriminant of each variant is its `StringId`, so converting is free.
/// Keep this in sync with `Interns::new`, which interns them in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, strum::EnumCount, strum::EnumIter)]
pub(crate) enum StaticStrings {
    #[strum(serialize = "")]
    Empty,
    #[strum(serialize = "else")]
    Else,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "catch")]
    Catch,
    #[strum(serialize = "self")]
    SelfName,
    #[strum(serialize = "init")]
    Init,
    #[strum(serialize = "initializer")]
    Initializer,
    #[strum(serialize = "name")]
    Name,
    #[strum(serialize = "message")]
    Message,
    #[strum(serialize = "base")]
    Base,
    #[strum(serialize = "use_cache")]
    UseCache,
    #[strum(serialize = "<module>")]
    Module,
    #[strum(serialize = "of")]
    Of,
    #[strum(serialize = "obj")]
    Obj,
    #[strum(serialize = "str")]
    StrName,
    #[strum(serialize = "repr")]
    ReprName,
    #[strum(serialize = "parameters")]
    Parameters,
    #[strum(serialize = "body")]
    Body,
}

impl From<StaticStrings> for StringId {
    #[inline]
    fn from(s: StaticStrings) -> Self {
        Self(s as u32)
    }
}

/// Storage for interned strings and symbols.
///
/// Owned by the interpreter session; parse and runtime both intern through
/// the same table so ids are comparable across module boundaries.
#[derive(Debug)]
pub(crate) struct Interns {
    strings: Vec<String>,
    lookup: AHashMap<String, StringId>,
    /// Symbol table: each entry is the symbol's name.
    symbols: Vec<StringId>,
}

impl Interns {
    pub fn new() -> Self {
        let mut interns = Self {
            strings: Vec::with_capacity(StaticStrings::COUNT + 64),
            lookup: AHashMap::with_capacity(StaticStrings::COUNT + 64),
            symbols: Vec::new(),
        };
        for s in StaticStrings::iter() {
            let text: &'static str = s.into();
            let id = interns.intern(text);
            debug_assert_eq!(id, StringId::from(s));
        }
        interns
    }

    /// Interns a string, returning the id of its unique copy.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("intern table overflow"));
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), id);
        id
    }

    /// Returns the string for an id.
    ///
    /// # Panics
    /// Panics on an id not produced by this interner; that is an interpreter
    /// bug, not a user error.
    pub fn get_str(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Mints a fresh symbol with the given name.
    pub fn new_symbol(&mut self, name: StringId) -> SymbolId {
        let id = SymbolId(u32::try_from(self.symbols.len()).expect("symbol table overflow"));
        self.symbols.push(name);
        id
    }

    /// Returns the name a symbol was created with.
    pub fn symbol_name(&self, id: SymbolId) -> StringId {
        self.symbols[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_equal_strings_share_an_id() {
        let mut interns = Interns::new();
        let a = interns.intern("hello");
        let b = interns.intern("hello");
        assert_eq!(a, b);
        assert_eq!(interns.get_str(a), "hello");
    }

    #[test]
    fn static_strings_have_stable_ids() {
        let interns = Interns::new();
        assert_eq!(interns.get_str(StaticStrings::Else.into()), "else");
        assert_eq!(interns.get_str(StaticStrings::SelfName.into()), "self");
        assert_eq!(interns.get_str(StaticStrings::Empty.into()), "");
    }

    #[test]
    fn symbols_with_equal_names_stay_distinct() {
        let mut interns = Interns::new();
        let name = interns.intern("tag");
        let s1 = interns.new_symbol(name);
        let s2 = interns.new_symbol(name);
        assert_ne!(s1, s2);
        assert_eq!(interns.symbol_name(s1), interns.symbol_name(s2));
    }
}
