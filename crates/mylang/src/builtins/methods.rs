//! Native methods on strings, arrays, dicts and args.
//!
//! Attribute access on a container whose key is not data falls back to this
//! table; a hit materializes a heap-allocated native method bound to its
//! receiver. Dispatch validates the receiver again at call time, so a
//! method value stays safe to pass around.

use crate::{
    args::Args,
    eval::Interp,
    exception_private::{RunError, RunResult},
    heap::HeapData,
    io::PrintWriter,
    types::{Array, Type, dict::DictKey},
    value::{Value, my_eq},
};

/// A method provided natively for a builtin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum TypeMethod {
    // Shared
    Len,
    Contains,
    // String methods
    Upper,
    Lower,
    Trim,
    Split,
    StartsWith,
    EndsWith,
    Replace,
    // Array methods
    Join,
    Reversed,
    Append,
    // Dict methods
    Keys,
    Values,
    Has,
}

impl TypeMethod {
    /// Whether this method exists on the given receiver type.
    fn applies_to(self, ty: Type) -> bool {
        match self {
            Self::Len => matches!(ty, Type::Str | Type::Array | Type::Dict | Type::Args),
            Self::Contains => matches!(ty, Type::Str | Type::Array),
            Self::Upper | Self::Lower | Self::Trim | Self::Split | Self::StartsWith | Self::EndsWith | Self::Replace => {
                ty == Type::Str
            }
            Self::Join | Self::Reversed | Self::Append => ty == Type::Array,
            Self::Keys | Self::Values | Self::Has => ty == Type::Dict,
        }
    }
}

/// Looks a method up by name for a receiver type.
pub(crate) fn lookup(ty: Type, name: &str) -> Option<TypeMethod> {
    let method: TypeMethod = name.parse().ok()?;
    method.applies_to(ty).then_some(method)
}

/// Calls a native method with its bound receiver.
pub(crate) fn call<P: PrintWriter>(
    interp: &mut Interp<P>,
    receiver: Value,
    method: TypeMethod,
    args: &Args,
) -> RunResult<Value> {
    let ty = receiver.type_of(&interp.heap);
    if !method.applies_to(ty) {
        let name: &'static str = method.into();
        return Err(RunError::type_error(format!("{name} is not a method of {ty}")));
    }
    match ty {
        Type::Str => call_str(interp, receiver, method, args),
        Type::Array => call_array(interp, receiver, method, args),
        Type::Dict => call_dict(interp, receiver, method, args),
        Type::Args => call_args_len(interp, receiver, method, args),
        _ => unreachable!("applies_to covers only container and string types"),
    }
}

fn method_name(method: TypeMethod) -> &'static str {
    method.into()
}

fn call_str<P: PrintWriter>(
    interp: &mut Interp<P>,
    receiver: Value,
    method: TypeMethod,
    args: &Args,
) -> RunResult<Value> {
    let text = receiver
        .as_str(&interp.heap, &interp.interns)
        .expect("receiver type checked by the caller")
        .to_owned();
    match method {
        TypeMethod::Len => {
            args.check_exact(method_name(method), 0)?;
            Ok(Value::Int(text.chars().count() as i64))
        }
        TypeMethod::Upper => {
            args.check_exact(method_name(method), 0)?;
            Ok(interp.alloc_str(text.to_uppercase()))
        }
        TypeMethod::Lower => {
            args.check_exact(method_name(method), 0)?;
            Ok(interp.alloc_str(text.to_lowercase()))
        }
        TypeMethod::Trim => {
            args.check_exact(method_name(method), 0)?;
            Ok(interp.alloc_str(text.trim().to_owned()))
        }
        TypeMethod::Split => {
            let separator = args.get_one(method_name(method))?;
            let Some(separator) = separator.as_str(&interp.heap, &interp.interns).map(str::to_owned) else {
                return Err(RunError::type_error("split requires a String separator"));
            };
            if separator.is_empty() {
                return Err(RunError::type_error("split requires a non-empty separator"));
            }
            let parts: Vec<Value> = text
                .split(&separator)
                .map(|part| Value::InternString(interp.interns.intern(part)))
                .collect();
            Ok(Value::Ref(interp.heap.allocate(HeapData::Array(Array::from_vec(parts)))))
        }
        TypeMethod::Contains => {
            let needle = args.get_one(method_name(method))?;
            let Some(needle) = needle.as_str(&interp.heap, &interp.interns) else {
                return Err(RunError::type_error("contains on a String requires a String argument"));
            };
            Ok(Value::Bool(text.contains(needle)))
        }
        TypeMethod::StartsWith => {
            let prefix = args.get_one(method_name(method))?;
            let Some(prefix) = prefix.as_str(&interp.heap, &interp.interns) else {
                return Err(RunError::type_error("starts_with requires a String argument"));
            };
            Ok(Value::Bool(text.starts_with(prefix)))
        }
        TypeMethod::EndsWith => {
            let suffix = args.get_one(method_name(method))?;
            let Some(suffix) = suffix.as_str(&interp.heap, &interp.interns) else {
                return Err(RunError::type_error("ends_with requires a String argument"));
            };
            Ok(Value::Bool(text.ends_with(suffix)))
        }
        TypeMethod::Replace => {
            let (from, to) = args.get_two(method_name(method))?;
            let (Some(from), Some(to)) = (
                from.as_str(&interp.heap, &interp.interns).map(str::to_owned),
                to.as_str(&interp.heap, &interp.interns).map(str::to_owned),
            ) else {
                return Err(RunError::type_error("replace requires String arguments"));
            };
            Ok(interp.alloc_str(text.replace(&from, &to)))
        }
        _ => unreachable!("applies_to restricts string methods"),
    }
}

fn call_array<P: PrintWriter>(
    interp: &mut Interp<P>,
    receiver: Value,
    method: TypeMethod,
    args: &Args,
) -> RunResult<Value> {
    let Value::Ref(id) = receiver else {
        unreachable!("array receivers live on the heap");
    };
    let elements: Vec<Value> = match interp.heap.get(id) {
        HeapData::Array(array) => array.as_slice().to_vec(),
        other => panic!("array receiver slot holds {other:?}"),
    };
    match method {
        TypeMethod::Len => {
            args.check_exact(method_name(method), 0)?;
            Ok(Value::Int(elements.len() as i64))
        }
        TypeMethod::Contains => {
            let needle = args.get_one(method_name(method))?;
            let found = elements.iter().any(|&e| my_eq(e, needle, &interp.heap, &interp.interns));
            Ok(Value::Bool(found))
        }
        TypeMethod::Join => {
            let separator = args.get_one(method_name(method))?;
            let Some(separator) = separator.as_str(&interp.heap, &interp.interns).map(str::to_owned) else {
                return Err(RunError::type_error("join requires a String separator"));
            };
            let mut parts = Vec::with_capacity(elements.len());
            for element in elements {
                parts.push(interp.str_value(element)?);
            }
            Ok(interp.alloc_str(parts.join(&separator)))
        }
        TypeMethod::Reversed => {
            args.check_exact(method_name(method), 0)?;
            let mut reversed = elements;
            reversed.reverse();
            Ok(Value::Ref(interp.heap.allocate(HeapData::Array(Array::from_vec(reversed)))))
        }
        TypeMethod::Append => {
            let value = args.get_one(method_name(method))?;
            let HeapData::Array(array) = interp.heap.get_mut(id) else {
                panic!("array receiver slot changed kind");
            };
            array.append(value);
            Ok(receiver)
        }
        _ => unreachable!("applies_to restricts array methods"),
    }
}

fn call_dict<P: PrintWriter>(
    interp: &mut Interp<P>,
    receiver: Value,
    method: TypeMethod,
    args: &Args,
) -> RunResult<Value> {
    let Value::Ref(id) = receiver else {
        unreachable!("dict receivers live on the heap");
    };
    let entries: Vec<(DictKey, Value)> = match interp.heap.get(id) {
        HeapData::Dict(dict) => dict.iter().collect(),
        HeapData::Context(context) => context.entries.iter().collect(),
        other => panic!("dict receiver slot holds {other:?}"),
    };
    match method {
        TypeMethod::Len => {
            args.check_exact(method_name(method), 0)?;
            Ok(Value::Int(entries.len() as i64))
        }
        TypeMethod::Keys => {
            args.check_exact(method_name(method), 0)?;
            let keys: Vec<Value> = entries.iter().map(|&(k, _)| k.to_value()).collect();
            Ok(Value::Ref(interp.heap.allocate(HeapData::Array(Array::from_vec(keys)))))
        }
        TypeMethod::Values => {
            args.check_exact(method_name(method), 0)?;
            let values: Vec<Value> = entries.iter().map(|&(_, v)| v).collect();
            Ok(Value::Ref(interp.heap.allocate(HeapData::Array(Array::from_vec(values)))))
        }
        TypeMethod::Has => {
            let key = args.get_one(method_name(method))?;
            let k = DictKey::from_value(key, &interp.heap, &mut interp.interns);
            Ok(Value::Bool(entries.iter().any(|&(existing, _)| existing == k)))
        }
        _ => unreachable!("applies_to restricts dict methods"),
    }
}

fn call_args_len<P: PrintWriter>(
    interp: &mut Interp<P>,
    receiver: Value,
    method: TypeMethod,
    args: &Args,
) -> RunResult<Value> {
    let Value::Ref(id) = receiver else {
        unreachable!("args receivers live on the heap");
    };
    let HeapData::Args(inner) = interp.heap.get(id) else {
        panic!("args receiver slot changed kind");
    };
    match method {
        TypeMethod::Len => {
            let len = inner.len() as i64;
            args.check_exact(method_name(method), 0)?;
            Ok(Value::Int(len))
        }
        _ => unreachable!("applies_to restricts args methods"),
    }
}
