//! Built-in callables, type values and operator values.
//!
//! [`Builtins`] enumerates everything callable that the evaluator itself
//! provides; [`install`] builds the builtin scope every module frame chains
//! to. Each builtin function declares whether it wants a fresh stack frame -
//! most do not, because control-flow primitives act on the caller's frame.

mod class_;
mod flow;
mod func;
pub(crate) mod methods;
mod misc;

use strum::IntoEnumIterator;

use crate::{
    args::Args,
    eval::Interp,
    exception_private::{RunError, RunResult},
    expressions::{BlockId, Operator},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    io::PrintWriter,
    modules::{self, ModuleFunction},
    scope::LexicalScope,
    types::{Type, dict::DictKey},
    value::Value,
};

/// Every callable value the interpreter provides natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Builtins {
    /// A named builtin function (`set`, `if`, `echo`, ...).
    Function(BuiltinFunction),
    /// A type value (`Int`, `String`, `Error`, ...); calling one converts.
    Type(Type),
    /// An operator function (`+`, `==`, `$`, ...).
    Operator(Operator),
    /// A function belonging to a host standard-library module.
    Module(ModuleFunction),
}

impl Builtins {
    pub fn type_of(self) -> Type {
        match self {
            Self::Function(_) | Self::Operator(_) | Self::Module(_) => Type::Fun,
            Self::Type(_) => Type::Class,
        }
    }
}

/// The named builtin functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum BuiltinFunction {
    Set,
    Get,
    Ref,
    /// `ref.of`: wraps a value directly, without a name lookup. Reached as
    /// an attribute of `ref`, never bound by name.
    RefOf,
    Call,
    Op,
    Fun,
    Class,
    Init,
    If,
    Else,
    Loop,
    While,
    Break,
    Continue,
    For,
    Return,
    Try,
    Throw,
    Use,
    Export,
    Echo,
    Symbol,
    Doc,
    Context,
    Ignore,
    Error,
}

impl BuiltinFunction {
    /// Whether `call` should push a fresh stack frame before invoking this
    /// entry. Control-flow primitives opt out to act on the caller's frame.
    pub fn wants_frame(self) -> bool {
        matches!(self, Self::For | Self::Class)
    }

    /// Whether the builtin is bound by name in the builtin scope.
    pub fn exposed(self) -> bool {
        !matches!(self, Self::RefOf)
    }

    /// Documentation string served by `doc`.
    pub fn doc(self) -> &'static str {
        match self {
            Self::Set => "Bind keys to values in the caller's scope; path keys navigate into containers.",
            Self::Get => "Look a key or path up in the caller's lexical scope.",
            Self::Ref => "Look a key up and return a reference to its value.",
            Self::RefOf => "Wrap a value in a reference without a name lookup.",
            Self::Call => "Call a value: the first argument is the callee, the rest are its arguments.",
            Self::Op => "Apply a named operator in Polish notation.",
            Self::Fun => "Define a function: name, parameters, then the body.",
            Self::Class => "Define a class; the body's bindings become the prototype.",
            Self::Init => "Assign the enclosing class's initializer.",
            Self::If => "Run a guarded body, or the first matching clause of a clause list.",
            Self::Else => "Run the fallback clause of an if clause list.",
            Self::Loop => "Repeat a body until broken.",
            Self::While => "Break the enclosing loop when the condition is false.",
            Self::Break => "Break the enclosing loop.",
            Self::Continue => "Skip to the enclosing loop's next pass.",
            Self::For => "Iterate a value, binding each element to a name.",
            Self::Return => "Set the caller frame's return value.",
            Self::Try => "Run a body with a catch specification installed.",
            Self::Throw => "Raise an error value or instantiate and raise an error class.",
            Self::Use => "Load a module, bind it under the source name and return its export.",
            Self::Export => "Add values to the module's export container.",
            Self::Echo => "Write arguments to the output sink.",
            Self::Symbol => "Create a unique symbol and bind it under its name.",
            Self::Doc => "Return the documentation of a value.",
            Self::Context => "Find or create the dynamic context of the caller's frame.",
            Self::Ignore => "Do nothing; ignores all arguments.",
            Self::Error => "Declare an error class and bind it under its name.",
        }
    }
}

/// Operators bound by name in the builtin scope.
const EXPOSED_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Ge,
    Operator::Lt,
    Operator::Le,
    Operator::Add,
    Operator::Sub,
    Operator::Mul,
    Operator::Div,
    Operator::Mod,
    Operator::Not,
    Operator::Get,
    Operator::Ref,
];

/// Builds the builtin scope: named builtins, type values, operator values
/// and the singleton constants.
pub(crate) fn install(heap: &mut Heap, interns: &mut Interns) -> HeapId {
    let mut scope = LexicalScope::new(None);
    for function in BuiltinFunction::iter() {
        if !function.exposed() {
            continue;
        }
        let name: &'static str = function.into();
        scope
            .locals
            .insert(DictKey::Str(interns.intern(name)), Value::Builtin(Builtins::Function(function)));
    }
    for &ty in Type::EXPOSED {
        let name: &'static str = ty.into();
        scope
            .locals
            .insert(DictKey::Str(interns.intern(name)), Value::Builtin(Builtins::Type(ty)));
    }
    for &op in EXPOSED_OPERATORS {
        scope
            .locals
            .insert(DictKey::Str(interns.intern(op.as_str())), Value::Builtin(Builtins::Operator(op)));
    }
    for (name, value) in [
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
        ("null", Value::Null),
        ("undefined", Value::Undefined),
    ] {
        scope.locals.insert(DictKey::Str(interns.intern(name)), value);
    }
    heap.allocate(HeapData::Scope(scope))
}

/// Dispatches a builtin function call. The frame policy has already been
/// applied by the evaluator.
pub(crate) fn dispatch<P: PrintWriter>(
    interp: &mut Interp<P>,
    function: BuiltinFunction,
    args: Args,
) -> RunResult<Value> {
    match function {
        BuiltinFunction::Set => {
            interp.set_values(&args)?;
            Ok(Value::Undefined)
        }
        BuiltinFunction::Get => {
            let key = args.get_one("get")?;
            interp.get_value(key)
        }
        BuiltinFunction::Ref => {
            let key = args.get_one("ref")?;
            interp.make_ref(key)
        }
        BuiltinFunction::RefOf => {
            let value = args.get_one("ref.of")?;
            let value = interp.deref(value);
            Ok(Value::Ref(interp.heap.allocate(HeapData::ValueRef(value))))
        }
        BuiltinFunction::Call => {
            // A single Args or Dict argument is the whole call: `call $a`
            // dispatches with its positional/keyed split.
            if args.positional().len() == 1
                && args.keyed().is_empty()
                && let Value::Ref(id) = args.positional()[0]
            {
                let unpacked = match interp.heap.get(id) {
                    HeapData::Args(inner) => Some(inner.clone()),
                    HeapData::Dict(dict) => Some(Args::from_dict(dict)),
                    _ => None,
                };
                if let Some(unpacked) = unpacked {
                    return interp.call_args(unpacked);
                }
            }
            interp.call_args(args)
        }
        BuiltinFunction::Op => misc::op(interp, &args),
        BuiltinFunction::Fun => func::fun(interp, &args),
        BuiltinFunction::Class => class_::class(interp, &args),
        BuiltinFunction::Init => class_::init(interp, &args),
        BuiltinFunction::If => flow::if_(interp, &args),
        BuiltinFunction::Else => flow::else_(interp, &args),
        BuiltinFunction::Loop => flow::loop_(interp, &args),
        BuiltinFunction::While => flow::while_(interp, &args),
        BuiltinFunction::Break => flow::break_(interp, &args),
        BuiltinFunction::Continue => flow::continue_(interp, &args),
        BuiltinFunction::For => flow::for_(interp, &args),
        BuiltinFunction::Return => flow::return_(interp, &args),
        BuiltinFunction::Try => flow::try_(interp, &args),
        BuiltinFunction::Throw => flow::throw(interp, &args),
        BuiltinFunction::Use => modules::use_module(interp, &args),
        BuiltinFunction::Export => misc::export(interp, &args),
        BuiltinFunction::Echo => misc::echo(interp, &args),
        BuiltinFunction::Symbol => misc::symbol(interp, &args),
        BuiltinFunction::Doc => misc::doc(interp, &args),
        BuiltinFunction::Context => misc::context(interp, &args),
        BuiltinFunction::Ignore => Ok(Value::Undefined),
        BuiltinFunction::Error => misc::error(interp, &args),
    }
}

/// Calling a type value converts the argument.
pub(crate) fn call_type<P: PrintWriter>(interp: &mut Interp<P>, ty: Type, args: &Args) -> RunResult<Value> {
    match ty {
        Type::Int => {
            let value = args.get_one("Int")?;
            match interp.deref(value) {
                v @ Value::Int(_) => Ok(v),
                Value::Float(f) if f.is_finite() => Ok(Value::Int(f as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                other => match other.as_str(&interp.heap, &interp.interns) {
                    Some(text) => text
                        .trim()
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| RunError::type_error(format!("cannot convert {} to Int", interp.describe(other)))),
                    None => Err(RunError::type_error(format!("cannot convert {} to Int", interp.describe(other)))),
                },
            }
        }
        Type::Float => {
            let value = args.get_one("Float")?;
            match interp.deref(value) {
                v @ Value::Float(_) => Ok(v),
                Value::Int(i) => Ok(Value::Float(i as f64)),
                Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(b)))),
                other => match other.as_str(&interp.heap, &interp.interns) {
                    Some(text) => text
                        .trim()
                        .parse::<f64>()
                        .map(Value::Float)
                        .map_err(|_| RunError::type_error(format!("cannot convert {} to Float", interp.describe(other)))),
                    None => Err(RunError::type_error(format!("cannot convert {} to Float", interp.describe(other)))),
                },
            }
        }
        Type::Bool => {
            let value = args.get_one("Bool")?;
            Ok(Value::Bool(value.truthy(&interp.heap, &interp.interns)))
        }
        Type::Str => {
            let value = args.get_one("String")?;
            let text = interp.str_value(value)?;
            Ok(interp.alloc_str(text))
        }
        Type::Array => {
            let Some(value) = args.get_zero_one("Array")? else {
                return Ok(Value::Ref(interp.heap.allocate(HeapData::Array(crate::types::Array::default()))));
            };
            let elements = flow::iterate(interp, value)?;
            Ok(Value::Ref(interp.heap.allocate(HeapData::Array(crate::types::Array::from_vec(elements)))))
        }
        Type::Dict => {
            let Some(value) = args.get_zero_one("Dict")? else {
                return Ok(Value::Ref(interp.heap.allocate(HeapData::Dict(crate::types::dict::Dict::new()))));
            };
            match interp.deref(value) {
                Value::Ref(id) => {
                    let entries = match interp.heap.get(id) {
                        HeapData::Dict(dict) => dict.iter().collect::<Vec<_>>(),
                        HeapData::Args(a) => {
                            let mut entries: Vec<(DictKey, Value)> = a
                                .positional()
                                .iter()
                                .enumerate()
                                .map(|(i, &v)| (DictKey::Int(i as i64), v))
                                .collect();
                            entries.extend(a.keyed().iter().map(|(&k, &v)| (k, v)));
                            entries
                        }
                        _ => return Err(RunError::type_error("Dict requires a Dict or Args argument")),
                    };
                    let mut dict = crate::types::dict::Dict::new();
                    for (key, value) in entries {
                        dict.insert(key, value);
                    }
                    Ok(Value::Ref(interp.heap.allocate(HeapData::Dict(dict))))
                }
                _ => Err(RunError::type_error("Dict requires a Dict or Args argument")),
            }
        }
        Type::Error => {
            let message = args.get_zero_one("Error")?;
            let message = message.unwrap_or(Value::InternString(crate::intern::StaticStrings::Empty.into()));
            let error = crate::types::ErrorObject::new(None, message);
            Ok(Value::Ref(interp.heap.allocate(HeapData::Error(error))))
        }
        Type::Symbol => {
            let name = args.get_one("Symbol")?;
            misc::new_symbol(interp, name)
        }
        other => Err(RunError::type_error(format!("the {other} type is not callable"))),
    }
}

/// Calling an operator value applies it.
pub(crate) fn call_operator<P: PrintWriter>(interp: &mut Interp<P>, op: Operator, args: &Args) -> RunResult<Value> {
    match op {
        Operator::Get => {
            let key = args.get_one("$")?;
            interp.get_value(key)
        }
        Operator::Ref => {
            let key = args.get_one("&")?;
            interp.make_ref(key)
        }
        Operator::Not => {
            let value = args.get_one("!")?;
            interp.apply_unary(Operator::Not, value)
        }
        Operator::Neg => {
            let value = args.get_one("-")?;
            interp.apply_unary(Operator::Neg, value)
        }
        Operator::Sub if args.positional().len() == 1 && args.keyed().is_empty() => {
            interp.apply_unary(Operator::Neg, args.positional()[0])
        }
        binary => {
            let (lhs, rhs) = args.get_two(binary.as_str())?;
            interp.apply_binary(binary, lhs, rhs)
        }
    }
}

/// Checks that a value is a statement-list handle.
pub(crate) fn expect_block(value: Value, what: &str) -> RunResult<BlockId> {
    match value {
        Value::Block(id) => Ok(id),
        _ => Err(RunError::type_error(format!("{what} must be a statement list"))),
    }
}
