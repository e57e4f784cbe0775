//! Public interface for running MyLang code.

use std::path::PathBuf;

use crate::{
    eval::Interp,
    exception_private::{Raised, RunError, RunResult},
    exception_public::Exception,
    heap::HeapData,
    intern::StaticStrings,
    io::PrintWriter,
    parse::parse_module,
    value::Value,
};

/// How deep [`Object`] conversion follows nested containers before falling
/// back to repr text.
const MAX_OBJECT_DEPTH: usize = 8;

/// A detached, host-friendly rendering of a runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Object>),
    Dict(Vec<(Object, Object)>),
    /// Anything without a natural host form (functions, classes, ...),
    /// rendered as its repr.
    Repr(String),
}

/// One-shot convenience: evaluates a module body in a fresh session.
pub fn run_module<P: PrintWriter>(source: &str, name: &str, print: P) -> Result<Object, Exception> {
    Session::new(print).eval(source, name)
}

/// An interpreter session: builtin scope, heap, interner, module cache and
/// a persistent module frame, so consecutive `eval` calls share bindings
/// (which is what the REPL builds on).
///
/// # Example
/// ```
/// use mylang::{CollectStringPrint, Session};
///
/// let mut session = Session::new(CollectStringPrint::default());
/// session.eval("echo (1 + 2)", "example").unwrap();
/// assert_eq!(session.print_mut().output(), "3\n");
/// ```
pub struct Session<P: PrintWriter> {
    interp: Interp<P>,
    debug: bool,
}

impl<P: PrintWriter> Session<P> {
    pub fn new(print: P) -> Self {
        let mut interp = Interp::new(print);
        if let Ok(paths) = std::env::var("MYLANG_PATH") {
            for path in paths.split(':').filter(|p| !p.is_empty()) {
                interp.module_paths.push(PathBuf::from(path));
            }
        }
        let builtins_scope = interp.builtins_scope;
        interp
            .push_frame(Some(builtins_scope), Some(StaticStrings::Module.into()))
            .expect("a fresh frame stack cannot overflow");
        let debug = std::env::var("MYLANG_DEBUG").is_ok_and(|v| v == "1");
        Self { interp, debug }
    }

    /// Parses and executes a module body in the session's root frame.
    pub fn eval(&mut self, source: &str, name: &str) -> Result<Object, Exception> {
        match self.eval_raw(source, name) {
            Ok(value) => Ok(self.to_object(value, 0)),
            Err(error) => Err(self.to_exception(error)),
        }
    }

    /// Reads and executes a file.
    pub fn eval_file(&mut self, path: &std::path::Path) -> Result<Object, Exception> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Exception::new("Error".to_owned(), format!("cannot read {}: {e}", path.display()), Vec::new())
        })?;
        let name = path.display().to_string();
        self.eval(&source, &name)
    }

    /// Access to the output sink, e.g. to collect captured output.
    pub fn print_mut(&mut self) -> &mut P {
        &mut self.interp.print
    }

    /// Adds a root searched for third-party modules, after the working
    /// directory and alongside any `MYLANG_PATH` entries.
    pub fn add_module_path(&mut self, path: impl Into<PathBuf>) {
        self.interp.module_paths.push(path.into());
    }

    pub(crate) fn eval_raw(&mut self, source: &str, _name: &str) -> RunResult<Value> {
        // A previous line's `return` must not stop this one.
        self.interp.current_frame_mut().return_value = None;
        let statements = parse_module(source, &mut self.interp.interns, &mut self.interp.blocks)?;
        if self.debug {
            eprintln!("{statements:#?}");
        }
        let block = self.interp.blocks.alloc(statements);
        self.interp.exec_block(block, None)
    }

    pub(crate) fn repr(&mut self, value: Value) -> String {
        self.interp.repr_value(value).unwrap_or_else(|_| "<value>".to_owned())
    }

    pub(crate) fn to_exception(&mut self, error: RunError) -> Exception {
        match error.raised {
            Raised::Kind { kind, message } => Exception::new(kind.to_string(), message, error.trace),
            Raised::Thrown(id) => {
                let kind = match self.interp.heap.get(id) {
                    HeapData::Error(e) => match e.class {
                        Some(class_id) => match self.interp.heap.get(class_id) {
                            HeapData::Class(c) => self.interp.interns.get_str(c.name).to_owned(),
                            _ => "Error".to_owned(),
                        },
                        None => "Error".to_owned(),
                    },
                    _ => "Error".to_owned(),
                };
                let message = self
                    .interp
                    .str_value(Value::Ref(id))
                    .unwrap_or_else(|_| "<error>".to_owned());
                Exception::new(kind, message, error.trace)
            }
        }
    }

    fn to_object(&mut self, value: Value, depth: usize) -> Object {
        if depth > MAX_OBJECT_DEPTH {
            return Object::Repr(self.repr(value));
        }
        match value {
            Value::Undefined => Object::Undefined,
            Value::Null => Object::Null,
            Value::Bool(b) => Object::Bool(b),
            Value::Int(i) => Object::Int(i),
            Value::Float(f) => Object::Float(f),
            Value::InternString(id) => Object::String(self.interp.interns.get_str(id).to_owned()),
            Value::Ref(id) => match self.interp.heap.get(id) {
                HeapData::Str(s) => Object::String(s.clone()),
                HeapData::Array(array) => {
                    let elements: Vec<Value> = array.as_slice().to_vec();
                    Object::Array(elements.into_iter().map(|e| self.to_object(e, depth + 1)).collect())
                }
                HeapData::Dict(dict) => {
                    let entries: Vec<(Value, Value)> = dict.iter().map(|(k, v)| (k.to_value(), v)).collect();
                    Object::Dict(
                        entries
                            .into_iter()
                            .map(|(k, v)| (self.to_object(k, depth + 1), self.to_object(v, depth + 1)))
                            .collect(),
                    )
                }
                HeapData::ValueRef(referent) => {
                    let referent = *referent;
                    self.to_object(referent, depth + 1)
                }
                _ => Object::Repr(self.repr(value)),
            },
            _ => Object::Repr(self.repr(value)),
        }
    }
}
