//! `echo`, `op`, `export`, `symbol`, `doc`, `context` and `error`.

use std::borrow::Cow;

use smallvec::smallvec;

use crate::{
    args::Args,
    builtins::Builtins,
    eval::Interp,
    exception_private::{RunError, RunResult},
    expressions::Operator,
    heap::{HeapData, HeapId},
    intern::StaticStrings,
    io::PrintWriter,
    types::{ClassObject, Context, Type, dict::{Dict, DictKey}},
    value::Value,
};

/// Writes the str form of each positional argument, space-separated and
/// newline-terminated.
///
/// A leading bare name that resolves to a user callable reads as a call
/// expression: `echo fact 5` echoes the result of `fact 5`.
pub(crate) fn echo<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let mut values: Vec<Value> = args.positional().to_vec();
    if values.len() >= 2
        && let Some(callee) = leading_callable(interp, values[0])
    {
        let rest = Args::from_parts(values[1..].to_vec(), args.keyed().clone());
        let result = interp.invoke(callee, rest)?;
        values = vec![result];
    }
    for (index, &value) in values.iter().enumerate() {
        if index > 0 {
            interp.print.stdout_push(' ');
        }
        let text = interp.str_value(value)?;
        interp.print.stdout_write(Cow::Owned(text));
    }
    interp.print.stdout_push('\n');
    Ok(Value::Undefined)
}

fn leading_callable<P: PrintWriter>(interp: &mut Interp<P>, value: Value) -> Option<Value> {
    let is_key = match value {
        Value::InternString(_) => true,
        Value::Ref(id) => matches!(interp.heap.get(id), HeapData::Path(_)),
        _ => false,
    };
    if !is_key {
        return None;
    }
    let resolved = interp.get_value(value).ok()?;
    let resolved = interp.deref(resolved);
    match resolved {
        Value::Ref(id) => matches!(
            interp.heap.get(id),
            HeapData::Function(_) | HeapData::BoundMethod(_) | HeapData::Class(_)
        )
        .then_some(resolved),
        _ => None,
    }
}

/// `op "+" a b`: applies a named operator.
pub(crate) fn op<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let positional = args.positional();
    let Some(&name_value) = positional.first() else {
        return Err(RunError::arity("op requires an operator name"));
    };
    let Some(name) = name_value.as_str(&interp.heap, &interp.interns) else {
        return Err(RunError::type_error("the operator name must be a String"));
    };
    let Some(operator) = Operator::from_name(name) else {
        return Err(RunError::lookup(format!("unknown operator '{name}'")));
    };
    let rest = Args::from_parts(positional[1..].to_vec(), args.keyed().clone());
    super::call_operator(interp, operator, &rest)
}

/// Appends into the module-scoped export container; positional values must
/// carry their own name (functions, classes, symbols).
pub(crate) fn export<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let scope = interp.current_scope();
    let export_id = match interp.heap.scope(scope).export {
        Some(id) => id,
        None => {
            let id = interp.heap.allocate(HeapData::Dict(Dict::new()));
            interp.heap.scope_mut(scope).export = Some(id);
            id
        }
    };
    for &given in args.positional() {
        // A bare name exports the binding it resolves to, under that name.
        let (key, value) = if let Value::InternString(name) = given {
            (DictKey::Str(name), interp.get_value(given)?)
        } else {
            let Some(key) = value_name(interp, given) else {
                return Err(RunError::type_error(format!(
                    "cannot export {} positionally: it has no name",
                    interp.describe(given)
                )));
            };
            (key, given)
        };
        insert_export(interp, export_id, key, value);
    }
    let keyed: Vec<(DictKey, Value)> = args.keyed().iter().map(|(&k, &v)| (k, v)).collect();
    for (key, value) in keyed {
        insert_export(interp, export_id, key, value);
    }
    Ok(Value::Undefined)
}

fn insert_export<P: PrintWriter>(interp: &mut Interp<P>, export_id: HeapId, key: DictKey, value: Value) {
    let HeapData::Dict(dict) = interp.heap.get_mut(export_id) else {
        panic!("export slot does not hold a dict");
    };
    dict.insert(key, value);
}

fn value_name<P: PrintWriter>(interp: &Interp<P>, value: Value) -> Option<DictKey> {
    match value {
        Value::Symbol(id) => Some(DictKey::Str(interp.interns.symbol_name(id))),
        Value::Ref(id) => match interp.heap.get(id) {
            HeapData::Function(f) => match f.name {
                Value::InternString(name) => Some(DictKey::Str(name)),
                _ => None,
            },
            HeapData::Class(c) => Some(DictKey::Str(c.name)),
            _ => None,
        },
        _ => None,
    }
}

/// `symbol name`: mints a unique symbol and binds it under `name` in the
/// caller's locals.
pub(crate) fn symbol<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let name = args.get_one("symbol")?;
    let value = new_symbol(interp, name)?;
    let key = DictKey::from_value(name, &interp.heap, &mut interp.interns);
    interp.bind_local(key, value);
    Ok(value)
}

/// Shared by `symbol` and the `Symbol` type value (which does not bind).
pub(crate) fn new_symbol<P: PrintWriter>(interp: &mut Interp<P>, name: Value) -> RunResult<Value> {
    let Some(text) = name.as_str(&interp.heap, &interp.interns).map(str::to_owned) else {
        return Err(RunError::type_error("a symbol name must be a String"));
    };
    let name_id = interp.interns.intern(&text);
    Ok(Value::Symbol(interp.interns.new_symbol(name_id)))
}

/// `doc key`: resolves the key and returns the target's documentation.
pub(crate) fn doc<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let key = args.get_one("doc")?;
    let target = interp.get_value(key)?;
    let text = match interp.deref(target) {
        Value::Builtin(Builtins::Function(f)) => f.doc().to_owned(),
        Value::Builtin(Builtins::Type(t)) => format!("The {t} type."),
        Value::Builtin(Builtins::Operator(o)) => format!("Applies the '{}' operator.", o.as_str()),
        Value::Builtin(Builtins::Module(f)) => format!("The {} module function.", f.name()),
        Value::Ref(id) => match interp.heap.get(id) {
            HeapData::Function(f) => {
                let name = f.name;
                interp.str_value(name)?
            }
            HeapData::Class(c) => interp.interns.get_str(c.name).to_owned(),
            _ => String::new(),
        },
        _ => String::new(),
    };
    Ok(interp.alloc_str(text))
}

/// `context key`: finds or creates the dynamic context of the caller's
/// frame (parented to the nearest context down the frame stack) and binds
/// it under `key`.
pub(crate) fn context<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let key = args.get_one("context")?;
    let context_id = match interp.current_frame().context {
        Some(id) => id,
        None => {
            let frames = interp.frames.len();
            let parent = interp.frames[..frames - 1].iter().rev().find_map(|f| f.context);
            let id = interp.heap.allocate(HeapData::Context(Context::new(parent)));
            interp.current_frame_mut().context = Some(id);
            id
        }
    };
    let k = DictKey::from_value(key, &interp.heap, &mut interp.interns);
    interp.bind_local(k, Value::Ref(context_id));
    Ok(Value::Ref(context_id))
}

/// `error Name "message" [base=Class]`: declares an error class with a
/// default message and binds it under `Name`.
pub(crate) fn error<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let positional = args.positional();
    let Some(&name_value) = positional.first() else {
        return Err(RunError::arity("error requires a class name"));
    };
    let Some(name) = name_value.as_str(&interp.heap, &interp.interns).map(str::to_owned) else {
        return Err(RunError::type_error("an error class name must be a String"));
    };
    if positional.len() > 2 {
        return Err(RunError::arity_at_most("error", 2, positional.len()));
    }
    let message_id = match positional.get(1) {
        Some(&message) => match message.as_str(&interp.heap, &interp.interns).map(str::to_owned) {
            Some(text) => Some(interp.interns.intern(&text)),
            None => return Err(RunError::type_error("an error message must be a String")),
        },
        None => None,
    };
    let base = args
        .keyed()
        .get(&DictKey::Str(StaticStrings::Base.into()))
        .copied()
        .unwrap_or(Value::Builtin(Builtins::Type(Type::Error)));
    let base = interp.deref(base);
    let base_ok = match base {
        Value::Builtin(Builtins::Type(Type::Error)) => true,
        Value::Ref(id) => matches!(interp.heap.get(id), HeapData::Class(c) if c.is_error),
        _ => false,
    };
    if !base_ok {
        return Err(RunError::type_error("the base of an error class must be an error class"));
    }
    let name_id = interp.interns.intern(&name);
    let class = ClassObject {
        name: name_id,
        bases: smallvec![base],
        prototype: crate::types::dict::OrderedMap::default(),
        initializer: None,
        is_error: true,
        error_message: message_id,
    };
    let class_id = interp.heap.allocate(HeapData::Class(class));
    interp.bind_local(DictKey::Str(name_id), Value::Ref(class_id));
    Ok(Value::Ref(class_id))
}
