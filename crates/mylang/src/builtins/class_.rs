//! The `class` builtin and its in-body companion `init`.

use smallvec::SmallVec;

use crate::{
    args::Args,
    builtins::{Builtins, expect_block},
    eval::Interp,
    exception_private::{RunError, RunResult},
    heap::{HeapData, HeapId},
    intern::StaticStrings,
    io::PrintWriter,
    types::{ClassObject, Function, Type, dict::DictKey},
    value::Value,
};

/// `class name [is Base1 Base2 ...] body`: runs the body in its own frame
/// chained to the caller's scope; the frame's bindings become the
/// prototype, and the class is bound under `name` in the caller's locals.
pub(crate) fn class<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    if !args.is_positional_only() {
        return Err(RunError::type_error("class arguments must be positional only"));
    }
    let positional = args.positional();
    if positional.len() < 2 {
        return Err(RunError::arity("class requires a name and a body"));
    }
    let name_value = positional[0];
    let Some(name) = name_value.as_str(&interp.heap, &interp.interns).map(str::to_owned) else {
        return Err(RunError::type_error("a class name must be a String"));
    };
    let name_id = interp.interns.intern(&name);
    let body = expect_block(*positional.last().expect("length checked above"), "the class body")?;

    // The body executes in this frame, with names from the caller visible.
    let caller = interp.caller_scope();
    let current = interp.current_scope();
    interp.heap.scope_mut(current).parent = Some(caller);

    let class_id = interp.heap.allocate(HeapData::Class(ClassObject {
        name: name_id,
        bases: SmallVec::new(),
        prototype: crate::types::dict::OrderedMap::default(),
        initializer: None,
        is_error: false,
        error_message: None,
    }));

    let (bases, is_error) = resolve_bases(interp, &positional[1..positional.len() - 1])?;
    {
        let HeapData::Class(class) = interp.heap.get_mut(class_id) else {
            unreachable!("freshly allocated class slot");
        };
        class.bases = bases;
        class.is_error = is_error;
    }

    interp.heap.scope_mut(current).current_class = Some(class_id);
    interp.exec_block(body, None)?;

    let prototype = interp.heap.scope(current).locals.clone();
    let HeapData::Class(class) = interp.heap.get_mut(class_id) else {
        unreachable!("freshly allocated class slot");
    };
    class.prototype = prototype;

    interp.bind_in_caller(DictKey::Str(name_id), Value::Ref(class_id));
    Ok(Value::Ref(class_id))
}

/// Resolves the `is Base1 Base2 ...` clause between the name and the body.
fn resolve_bases<P: PrintWriter>(
    interp: &mut Interp<P>,
    middle: &[Value],
) -> RunResult<(SmallVec<[Value; 2]>, bool)> {
    let mut bases = SmallVec::new();
    let mut is_error = false;
    if middle.is_empty() {
        return Ok((bases, is_error));
    }
    if middle[0].as_str(&interp.heap, &interp.interns) != Some("is") {
        return Err(RunError::type_error("expected 'is' before the base class list"));
    }
    for &base_key in &middle[1..] {
        let base = interp.get_value(base_key)?;
        let base = interp.deref(base);
        match base {
            Value::Builtin(Builtins::Type(Type::Object)) => {}
            Value::Builtin(Builtins::Type(Type::Error)) => {
                is_error = true;
                bases.push(base);
            }
            Value::Ref(id) => match interp.heap.get(id) {
                HeapData::Class(base_class) => {
                    is_error = is_error || base_class.is_error;
                    bases.push(base);
                }
                _ => {
                    return Err(RunError::type_error(format!(
                        "base {} is not a class",
                        interp.describe(base_key)
                    )));
                }
            },
            _ => {
                return Err(RunError::type_error(format!(
                    "base {} is not a class",
                    interp.describe(base_key)
                )));
            }
        }
    }
    Ok((bases, is_error))
}

/// `init p1 p2 ... body`: assigns the initializer of the class whose body
/// is currently executing.
pub(crate) fn init<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let class_id = current_class(interp)
        .ok_or_else(|| RunError::type_error("init is only valid inside a class body"))?;
    let positional = args.positional();
    if positional.is_empty() {
        return Err(RunError::arity("init requires a body"));
    }
    let body = expect_block(*positional.last().expect("checked non-empty"), "the init body")?;
    let parameters = Args::from_parts(positional[..positional.len() - 1].to_vec(), args.keyed().clone());
    let function = Function {
        name: Value::InternString(StaticStrings::Initializer.into()),
        parameters,
        body,
        closure_scope: interp.current_scope(),
    };
    let function_id = interp.heap.allocate(HeapData::Function(function));
    let HeapData::Class(class) = interp.heap.get_mut(class_id) else {
        panic!("current_class slot does not hold a class");
    };
    class.initializer = Some(function_id);
    Ok(Value::Undefined)
}

fn current_class<P: PrintWriter>(interp: &Interp<P>) -> Option<HeapId> {
    let mut scope_id = Some(interp.current_scope());
    while let Some(id) = scope_id {
        let scope = interp.heap.scope(id);
        if let Some(class) = scope.current_class {
            return Some(class);
        }
        scope_id = scope.parent;
    }
    None
}
