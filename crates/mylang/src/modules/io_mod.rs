//! The host half of the `io` standard-library module.
//!
//! Merges `write` and `read_line` into the export of the MyLang half (which
//! provides `newline` and `tab`); with no MyLang export present it builds a
//! fresh dict.

use std::borrow::Cow;
use std::io::BufRead;

use crate::{
    args::Args,
    builtins::Builtins,
    eval::Interp,
    exception_private::{RunError, RunResult},
    heap::{HeapData, HeapId},
    io::PrintWriter,
    modules::ModuleFunction,
    types::dict::{Dict, DictKey},
    value::Value,
};

/// Functions this module contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum IoFunction {
    Write,
    ReadLine,
}

impl IoFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Write => "io.write",
            Self::ReadLine => "io.read_line",
        }
    }
}

/// Builds the module export, merging into the MyLang half's dict when one
/// exists.
pub(crate) fn create<P: PrintWriter>(interp: &mut Interp<P>, mylang_half: Option<Value>) -> RunResult<Value> {
    let dict_id: HeapId = match mylang_half {
        Some(Value::Ref(id)) if matches!(interp.heap.get(id), HeapData::Dict(_)) => id,
        Some(_) => return Err(RunError::type_error("the io module's MyLang half must export a Dict")),
        None => interp.heap.allocate(HeapData::Dict(Dict::new())),
    };
    for (name, function) in [("write", IoFunction::Write), ("read_line", IoFunction::ReadLine)] {
        let key = DictKey::Str(interp.interns.intern(name));
        let HeapData::Dict(dict) = interp.heap.get_mut(dict_id) else {
            unreachable!("dict slot checked above");
        };
        dict.insert(key, Value::Builtin(Builtins::Module(ModuleFunction::Io(function))));
    }
    Ok(Value::Ref(dict_id))
}

pub(crate) fn call<P: PrintWriter>(interp: &mut Interp<P>, function: IoFunction, args: &Args) -> RunResult<Value> {
    match function {
        IoFunction::Write => {
            for &value in args.positional() {
                let text = interp.str_value(value)?;
                interp.print.stdout_write(Cow::Owned(text));
            }
            Ok(Value::Undefined)
        }
        IoFunction::ReadLine => {
            args.check_exact("read_line", 0)?;
            let mut line = String::new();
            let read = std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| RunError::generic(format!("reading stdin failed: {e}")))?;
            if read == 0 {
                return Ok(Value::Null);
            }
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(interp.alloc_str(line))
        }
    }
}
