//! The module loader behind `use`.
//!
//! Resolution order: a host companion module in the standard library, then
//! an embedded MyLang standard-library source, then a third-party `.my`
//! file next to the working directory (or under a `MYLANG_PATH` root).
//! Exports are cached by `(source, loader kind)`; a cache hit returns the
//! identical export value.
//!
//! A standard-library module may have both halves: the MyLang half runs
//! first, and its export (a dict) is handed to the host companion, which
//! merges its own names into it.

pub(crate) mod io_mod;
pub(crate) mod process_mod;

use std::path::PathBuf;

use crate::{
    args::Args,
    eval::Interp,
    exception_private::{RunError, RunResult},
    heap::{HeapData, HeapId},
    intern::StaticStrings,
    io::PrintWriter,
    parse::parse_module,
    types::{PathSeg, dict::{Dict, DictKey}},
    value::Value,
};

/// Which resolver produced a cached module; part of the cache identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LoaderKind {
    Std,
    ThirdParty,
}

/// A function belonging to a host standard-library module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ModuleFunction {
    Io(io_mod::IoFunction),
    Process(process_mod::ProcessFunction),
}

impl ModuleFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Io(f) => f.name(),
            Self::Process(f) => f.name(),
        }
    }
}

/// Embedded MyLang standard-library sources.
const STDLIB_SOURCES: &[(&str, &str)] = &[
    ("io", include_str!("../../stdlib/io.my")),
    ("util", include_str!("../../stdlib/util.my")),
];

fn stdlib_source(name: &str) -> Option<&'static str> {
    STDLIB_SOURCES.iter().find(|(n, _)| *n == name).map(|(_, src)| *src)
}

fn has_companion(name: &str) -> bool {
    matches!(name, "io" | "process")
}

/// `use source [use_cache=true]`.
pub(crate) fn use_module<P: PrintWriter>(interp: &mut Interp<P>, args: &Args) -> RunResult<Value> {
    if args.positional().len() != 1 {
        return Err(RunError::arity("use requires exactly one positional argument"));
    }
    let source = args.positional()[0];
    let (name, bind_key) = source_name(interp, source)?;

    let use_cache = match args.keyed().get(&DictKey::Str(StaticStrings::UseCache.into())) {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(RunError::type_error("use_cache must be a Bool")),
    };

    let kind = if has_companion(&name) || stdlib_source(&name).is_some() {
        LoaderKind::Std
    } else {
        LoaderKind::ThirdParty
    };

    if use_cache
        && let Some(&cached) = interp.module_cache.get(&(name.clone(), kind))
    {
        interp.bind_local(bind_key, cached);
        return Ok(cached);
    }

    let export = match kind {
        LoaderKind::Std => load_std(interp, &name)?,
        LoaderKind::ThirdParty => load_third_party(interp, &name)?,
    };
    interp.module_cache.insert((name, kind), export);
    interp.bind_local(bind_key, export);
    Ok(export)
}

/// Derives the module name and the key the export binds under. A string
/// source binds under itself; a path source binds under its final segment.
fn source_name<P: PrintWriter>(interp: &mut Interp<P>, source: Value) -> RunResult<(String, DictKey)> {
    if let Some(text) = source.as_str(&interp.heap, &interp.interns) {
        let name = text.to_owned();
        let key = DictKey::Str(interp.interns.intern(&name));
        return Ok((name, key));
    }
    if let Value::Ref(id) = source
        && let HeapData::Path(path) = interp.heap.get(id)
    {
        let mut parts = Vec::new();
        for segment in path.segments() {
            match segment {
                PathSeg::Key(Value::InternString(part)) => parts.push(interp.interns.get_str(*part).to_owned()),
                _ => return Err(RunError::type_error("all parts of a module path must be Strings")),
            }
        }
        let name = parts.join("/");
        let last = parts.last().expect("paths have at least two segments").clone();
        let key = DictKey::Str(interp.interns.intern(&last));
        return Ok((name, key));
    }
    Err(RunError::type_error("use requires a String or Path as the first argument"))
}

fn load_std<P: PrintWriter>(interp: &mut Interp<P>, name: &str) -> RunResult<Value> {
    let mylang_half = match stdlib_source(name) {
        Some(source) => Some(eval_module_source(interp, source, name)?),
        None => None,
    };
    if has_companion(name) {
        match name {
            "io" => io_mod::create(interp, mylang_half),
            "process" => process_mod::create(interp),
            _ => unreachable!("has_companion covers exactly the companion modules"),
        }
    } else {
        Ok(mylang_half.expect("a std module has a source, a companion, or both"))
    }
}

fn load_third_party<P: PrintWriter>(interp: &mut Interp<P>, name: &str) -> RunResult<Value> {
    let file = format!("{name}.my");
    let mut candidates = vec![PathBuf::from(&file)];
    let roots: Vec<PathBuf> = interp.module_paths.clone();
    for root in roots {
        candidates.push(root.join(&file));
    }
    for candidate in candidates {
        if let Ok(source) = std::fs::read_to_string(&candidate) {
            return eval_module_source(interp, &source, name);
        }
    }
    Err(RunError::lookup(format!("module '{name}' not found")))
}

/// Parses and evaluates a module body in a fresh frame over the builtin
/// scope, then applies the export rules: an explicit return value wins,
/// else the `export` container, else a dict copy of the module's locals.
pub(crate) fn eval_module_source<P: PrintWriter>(
    interp: &mut Interp<P>,
    source: &str,
    name: &str,
) -> RunResult<Value> {
    let statements = parse_module(source, &mut interp.interns, &mut interp.blocks)?;
    let block = interp.blocks.alloc(statements);
    let builtins_scope = interp.builtins_scope;
    let name_id = interp.interns.intern(name);
    interp.push_frame(Some(builtins_scope), Some(name_id))?;
    let result = run_module_frame(interp, block);
    interp.pop_frame();
    result.map_err(|mut error| {
        error.push_trace(format!("module '{name}'"));
        error
    })
}

fn run_module_frame<P: PrintWriter>(interp: &mut Interp<P>, block: crate::expressions::BlockId) -> RunResult<Value> {
    interp.exec_block(block, None)?;
    if let Some(value) = interp.current_frame().return_value {
        return Ok(value);
    }
    let scope: HeapId = interp.current_scope();
    if let Some(export_id) = interp.heap.scope(scope).export {
        return Ok(Value::Ref(export_id));
    }
    let locals = interp.heap.scope(scope).locals.clone();
    Ok(Value::Ref(interp.heap.allocate(HeapData::Dict(Dict::from_entries(locals)))))
}

/// Dispatch for host-module functions.
pub(crate) fn call_module_function<P: PrintWriter>(
    interp: &mut Interp<P>,
    function: ModuleFunction,
    args: &Args,
) -> RunResult<Value> {
    match function {
        ModuleFunction::Io(f) => io_mod::call(interp, f, args),
        ModuleFunction::Process(f) => process_mod::call(interp, f, args),
    }
}
