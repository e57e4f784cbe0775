//! Control-flow callables.
//!
//! All of these are ordinary values invoked through `call`; none of them
//! receives a fresh stack frame except `for`, so they act on the caller's
//! frame directly. Loops communicate with `while`/`break`/`continue`
//! through loop data installed on the caller's scope; `return` fills the
//! frame's return-value slot; only `throw` uses the error path.

use crate::{
    args::Args,
    builtins::expect_block,
    eval::{Interp, LoopRef},
    exception_private::{RunError, RunResult},
    expressions::Expr,
    heap::{HeapData, HeapId},
    intern::{StaticStrings, StringId},
    io::PrintWriter,
    scope::{CatchSpec, LoopData},
    types::{Type, dict::DictKey},
    value::Value,
};

use super::Builtins;

/// `if cond body` runs the body when the condition is truthy. `if clauses`
/// treats each inner statement as `cond body` (or `else body`, last only)
/// and runs the first clause whose condition holds.
pub(crate) fn if_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    match args.positional() {
        [condition, body] if args.keyed().is_empty() => {
            let body = expect_block(*body, "the if body")?;
            if condition.truthy(&interp.heap, &interp.interns) {
                interp.exec_block(body, None)
            } else {
                Ok(Value::Undefined)
            }
        }
        [clauses] if args.keyed().is_empty() => {
            let clauses = expect_block(*clauses, "the if clause list")?;
            let data = interp.blocks.get(clauses);
            let count = data.statements.len();
            for (index, clause) in data.statements.iter().enumerate() {
                if !clause.args.keyed.is_empty() {
                    return Err(RunError::type_error("an if clause cannot contain assignments"));
                }
                if let [Expr::Literal(Value::InternString(word)), body] = clause.args.positional.as_slice()
                    && *word == StringId::from(StaticStrings::Else)
                {
                    if index + 1 != count {
                        return Err(RunError::type_error("else must be the last clause of an if block"));
                    }
                    let body = interp.eval_expr(body)?;
                    let body = expect_block(body, "the else body")?;
                    return interp.exec_block(body, None);
                }
                let [condition, body] = clause.args.positional.as_slice() else {
                    return Err(RunError::type_error("an if clause must be `condition body`"));
                };
                let condition = interp.eval_expr(condition)?;
                if condition.truthy(&interp.heap, &interp.interns) {
                    let body = interp.eval_expr(body)?;
                    let body = expect_block(body, "the clause body")?;
                    return interp.exec_block(body, None);
                }
            }
            Ok(Value::Undefined)
        }
        _ => Err(RunError::arity_exact("if", 2, args.len())),
    }
}

/// The fallback clause body, runnable on its own.
pub(crate) fn else_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let body = expect_block(args.get_one("else")?, "the else body")?;
    interp.exec_block(body, None)
}

/// Repeats the body until `break`, a failing `while`, or a signalled
/// return. The loop data lives on the caller's scope so the paired
/// callables can find it through the lexical chain.
pub(crate) fn loop_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let body = expect_block(args.get_one("loop")?, "the loop body")?;
    let scope = interp.current_scope();
    let index = {
        let data = interp.heap.scope_mut(scope);
        data.loop_stack.push(LoopData::default());
        data.loop_stack.len() - 1
    };
    let loop_ref = LoopRef { scope, index };
    let result = run_loop(interp, body, loop_ref);
    let data = interp.heap.scope_mut(scope);
    debug_assert_eq!(data.loop_stack.len(), index + 1, "loop stack must pop LIFO");
    data.loop_stack.pop();
    result
}

fn run_loop<P: PrintWriter>(interp: &mut Interp<P>, body: crate::expressions::BlockId, loop_ref: LoopRef) -> RunResult<Value> {
    loop {
        interp.exec_block(body, Some(loop_ref))?;
        let flags = interp.heap.scope(loop_ref.scope).loop_stack[loop_ref.index];
        if flags.broken || interp.current_frame().return_value.is_some() {
            return Ok(Value::Undefined);
        }
        if flags.should_continue {
            interp.heap.scope_mut(loop_ref.scope).loop_stack[loop_ref.index].should_continue = false;
        }
    }
}

/// Finds the nearest enclosing loop's data along the lexical chain.
fn find_loop<P: PrintWriter>(interp: &Interp<P>, what: &str) -> RunResult<(HeapId, usize)> {
    let mut scope_id = Some(interp.current_scope());
    while let Some(id) = scope_id {
        let scope = interp.heap.scope(id);
        if !scope.loop_stack.is_empty() {
            return Ok((id, scope.loop_stack.len() - 1));
        }
        scope_id = scope.parent;
    }
    Err(RunError::generic(format!("{what} is not inside a loop")))
}

pub(crate) fn while_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let condition = args.get_one("while")?;
    let (scope, index) = find_loop(interp, "while")?;
    if !condition.truthy(&interp.heap, &interp.interns) {
        interp.heap.scope_mut(scope).loop_stack[index].broken = true;
    }
    Ok(Value::Undefined)
}

pub(crate) fn break_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    args.check_exact("break", 0)?;
    let (scope, index) = find_loop(interp, "break")?;
    interp.heap.scope_mut(scope).loop_stack[index].broken = true;
    Ok(Value::Undefined)
}

pub(crate) fn continue_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    args.check_exact("continue", 0)?;
    let (scope, index) = find_loop(interp, "continue")?;
    interp.heap.scope_mut(scope).loop_stack[index].should_continue = true;
    Ok(Value::Undefined)
}

/// `for name in iterable body`; runs in its own frame chained to the
/// caller's scope, binding the loop variable in its locals each pass.
pub(crate) fn for_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    if !args.is_positional_only() || args.positional().len() != 4 {
        return Err(RunError::arity("for requires exactly 4 positional arguments"));
    }
    let [variable, keyword, iterable, body] = args.positional() else {
        unreachable!("length checked above");
    };
    if keyword.as_str(&interp.heap, &interp.interns) != Some("in") {
        return Err(RunError::type_error("the second argument to for must be 'in'"));
    }
    let body = expect_block(*body, "the for body")?;
    let caller = interp.caller_scope();
    let current = interp.current_scope();
    interp.heap.scope_mut(current).parent = Some(caller);
    let key = DictKey::from_value(*variable, &interp.heap, &mut interp.interns);
    let items = iterate(interp, *iterable)?;
    for item in items {
        interp.bind_local(key, item);
        interp.exec_block(body, None)?;
        if interp.current_frame().return_value.is_some() {
            break;
        }
    }
    Ok(Value::Undefined)
}

/// Produces the iteration sequence of a value: array elements, dict keys,
/// args positionals, string characters.
pub(crate) fn iterate<P: PrintWriter>(interp: &mut Interp<P>, value: Value) -> RunResult<Vec<Value>> {
    let value = interp.deref(value);
    if let Value::InternString(id) = value {
        let text = interp.interns.get_str(id).to_owned();
        return Ok(chars_of(interp, &text));
    }
    if let Value::Ref(id) = value {
        match interp.heap.get(id) {
            HeapData::Array(array) => return Ok(array.as_slice().to_vec()),
            HeapData::Dict(dict) => return Ok(dict.keys().map(DictKey::to_value).collect()),
            HeapData::Args(args) => return Ok(args.positional().to_vec()),
            HeapData::Str(text) => {
                let text = text.clone();
                return Ok(chars_of(interp, &text));
            }
            _ => {}
        }
    }
    Err(RunError::type_error(format!(
        "a {} value is not iterable",
        value.type_of(&interp.heap)
    )))
}

fn chars_of<P: PrintWriter>(interp: &mut Interp<P>, text: &str) -> Vec<Value> {
    text.chars()
        .map(|c| Value::InternString(interp.interns.intern(&c.to_string())))
        .collect()
}

/// Sets the caller frame's return value; statement walks check the slot
/// after every statement.
pub(crate) fn return_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let value = args.get_zero_one("return")?.unwrap_or(Value::Undefined);
    interp.current_frame_mut().return_value = Some(value);
    Ok(value)
}

/// `try body catch [key] catch-body`: installs the catch specification on
/// the current frame for the duration of the body.
pub(crate) fn try_<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    if !args.is_positional_only() || !(args.positional().len() == 3 || args.positional().len() == 4) {
        return Err(RunError::arity("try requires `body catch [key] catch-body`"));
    }
    let positional = args.positional();
    let body = expect_block(positional[0], "the try body")?;
    if positional[1].as_str(&interp.heap, &interp.interns) != Some("catch") {
        return Err(RunError::type_error("the second argument to try must be 'catch'"));
    }
    let error_key = (positional.len() == 4).then(|| positional[2]);
    let catch_body = expect_block(*positional.last().expect("length checked above"), "the catch body")?;
    validate_catch_body(interp, catch_body)?;

    let saved = interp.current_frame_mut().catch_spec.take();
    interp.current_frame_mut().catch_spec = Some(CatchSpec { error_key, catch_body });
    let result = interp.exec_block(body, None);
    // Whatever is still installed is ours; restore the enclosing spec.
    let ours = interp.current_frame_mut().catch_spec.take();
    interp.current_frame_mut().catch_spec = saved;
    match result {
        // An error that escaped without passing a call boundary (e.g. a
        // failing assignment) still gets matched here.
        Err(error) => match ours {
            Some(spec) => interp.run_catch(&spec, error),
            None => Err(error),
        },
        ok => ok,
    }
}

fn validate_catch_body<P: PrintWriter>(interp: &Interp<P>, catch_body: crate::expressions::BlockId) -> RunResult<()> {
    let data = interp.blocks.get(catch_body);
    for clause in &data.statements {
        if !clause.args.keyed.is_empty() {
            return Err(RunError::type_error("each catch clause must be positional-only"));
        }
        if clause.args.positional.len() < 2 {
            return Err(RunError::type_error("each catch clause must name an error class and a body"));
        }
        if !matches!(clause.args.positional.last(), Some(Expr::Literal(Value::Block(_)))) {
            return Err(RunError::type_error("each catch clause must end with a statement list"));
        }
    }
    Ok(())
}

/// `throw` with no arguments raises a generic error; with an error value it
/// raises it; with an error class and arguments it instantiates the class
/// and raises the result.
pub(crate) fn throw<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    if args.is_empty() {
        let error = crate::types::ErrorObject::new(None, Value::InternString(StaticStrings::Empty.into()));
        return Err(RunError::thrown(interp.heap.allocate(HeapData::Error(error))));
    }
    let first = interp.deref(args.positional().first().copied().ok_or_else(|| {
        RunError::type_error("throw does not accept keyed arguments")
    })?);

    // An error value directly.
    if let Value::Ref(id) = first
        && matches!(interp.heap.get(id), HeapData::Error(_))
    {
        if args.len() != 1 {
            return Err(RunError::type_error("throw does not accept extra arguments after an error value"));
        }
        return Err(RunError::thrown(id));
    }

    // An error class, either as a value or as a key to resolve.
    let class_value = match first {
        v @ Value::Builtin(Builtins::Type(Type::Error)) => v,
        Value::Ref(id) if matches!(interp.heap.get(id), HeapData::Class(_)) => first,
        other => interp.get_value(other)?,
    };
    match interp.deref(class_value) {
        Value::Builtin(Builtins::Type(Type::Error)) => {
            let message = args
                .positional()
                .get(1)
                .copied()
                .unwrap_or(Value::InternString(StaticStrings::Empty.into()));
            let error = crate::types::ErrorObject::new(None, message);
            Err(RunError::thrown(interp.heap.allocate(HeapData::Error(error))))
        }
        Value::Ref(id) if matches!(interp.heap.get(id), HeapData::Class(_)) => {
            let rest = Args::from_parts(args.positional()[1..].to_vec(), args.keyed().clone());
            let instance = interp.instantiate(id, &rest)?;
            match instance {
                Value::Ref(error_id) if matches!(interp.heap.get(error_id), HeapData::Error(_)) => {
                    Err(RunError::thrown(error_id))
                }
                _ => Err(RunError::type_error("throw requires an error class")),
            }
        }
        Value::Ref(id) if matches!(interp.heap.get(id), HeapData::Error(_)) => {
            if args.len() != 1 {
                return Err(RunError::type_error("throw does not accept extra arguments after an error value"));
            }
            Err(RunError::thrown(id))
        }
        other => Err(RunError::type_error(format!(
            "throw requires an error or error class, not {}",
            interp.describe(other)
        ))),
    }
}
