//! The `fun` builtin.

use crate::{
    args::Args,
    builtins::expect_block,
    eval::Interp,
    exception_private::{RunError, RunResult},
    heap::HeapData,
    io::PrintWriter,
    types::{Function, dict::DictKey},
    value::Value,
};

/// `fun name p1 p2 ... body`: builds a function value capturing the
/// caller's lexical scope and binds it under `name` in the caller's locals.
/// Keyed arguments are parameters with default values.
pub(crate) fn fun<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    let positional = args.positional();
    if positional.len() < 2 {
        return Err(RunError::arity("fun requires a name and a body"));
    }
    let name = positional[0];
    let body = expect_block(*positional.last().expect("length checked above"), "the fun body")?;
    let parameters = Args::from_parts(positional[1..positional.len() - 1].to_vec(), args.keyed().clone());
    let closure_scope = interp.current_scope();
    let function = Function { name, parameters, body, closure_scope };
    let value = Value::Ref(interp.heap.allocate(HeapData::Function(function)));
    let key = DictKey::from_value(name, &interp.heap, &mut interp.interns);
    interp.bind_local(key, value);
    Ok(value)
}
