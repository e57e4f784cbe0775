//! Heap value types and the runtime type table.

pub(crate) mod array;
pub(crate) mod class;
pub(crate) mod dict;
pub(crate) mod error;
pub(crate) mod function;
pub(crate) mod path;

pub(crate) use array::Array;
pub(crate) use class::{ClassObject, Instance};
pub(crate) use dict::{Context, Dict, DictKey};
pub(crate) use error::ErrorObject;
pub(crate) use function::{BoundMethod, Function, NativeMethod};
pub(crate) use path::{PathSeg, PathValue};

/// Runtime type of a value.
///
/// The capitalised names are also exposed in the builtin scope as type
/// values (`Int`, `String`, ...); calling one converts its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::IntoStaticStr)]
pub(crate) enum Type {
    Undefined,
    Null,
    Bool,
    Int,
    Float,
    #[strum(serialize = "String")]
    Str,
    Symbol,
    Dots,
    Path,
    Array,
    Dict,
    Args,
    Block,
    Fun,
    Class,
    Object,
    Ref,
    Error,
}

impl Type {
    /// Type values exposed by name in the builtin scope.
    pub const EXPOSED: &'static [Self] = &[
        Self::Int,
        Self::Float,
        Self::Bool,
        Self::Str,
        Self::Null,
        Self::Undefined,
        Self::Path,
        Self::Dots,
        Self::Array,
        Self::Dict,
        Self::Object,
        Self::Error,
        Self::Symbol,
    ];
}
