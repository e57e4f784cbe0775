//! The `process` standard-library module.

use std::process::Command;

use crate::{
    args::Args,
    builtins::Builtins,
    eval::Interp,
    exception_private::{RunError, RunResult},
    heap::HeapData,
    io::PrintWriter,
    modules::ModuleFunction,
    types::dict::{Dict, DictKey},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ProcessFunction {
    /// Spawns a command and waits for it; a non-zero exit raises.
    Run,
    /// Spawns a command and returns its captured stdout as a String.
    Output,
}

impl ProcessFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Run => "process.run",
            Self::Output => "process.output",
        }
    }
}

pub(crate) fn create<P: PrintWriter>(interp: &mut Interp<P>) -> RunResult<Value> {
    let mut dict = Dict::new();
    for (name, function) in [("run", ProcessFunction::Run), ("output", ProcessFunction::Output)] {
        let key = DictKey::Str(interp.interns.intern(name));
        dict.insert(key, Value::Builtin(Builtins::Module(ModuleFunction::Process(function))));
    }
    Ok(Value::Ref(interp.heap.allocate(HeapData::Dict(dict))))
}

pub(crate) fn call<P: PrintWriter>(
    interp: &mut Interp<P>,
    function: ProcessFunction,
    args: &Args,
) -> RunResult<Value> {
    let argv = collect_argv(interp, args)?;
    let (program, rest) = argv.split_first().expect("collect_argv requires at least one argument");
    match function {
        ProcessFunction::Run => {
            let status = Command::new(program)
                .args(rest)
                .status()
                .map_err(|e| RunError::generic(format!("cannot run {program}: {e}")))?;
            if !status.success() {
                return Err(RunError::generic(format!("{program} exited with {status}")));
            }
            Ok(Value::Undefined)
        }
        ProcessFunction::Output => {
            let output = Command::new(program)
                .args(rest)
                .output()
                .map_err(|e| RunError::generic(format!("cannot run {program}: {e}")))?;
            if !output.status.success() {
                return Err(RunError::generic(format!("{program} exited with {}", output.status)));
            }
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            Ok(interp.alloc_str(stdout))
        }
    }
}

fn collect_argv<P: PrintWriter>(interp: &Interp<P>, args: &Args) -> RunResult<Vec<String>> {
    if !args.is_positional_only() || args.positional().is_empty() {
        return Err(RunError::type_error("process functions take the command as positional Strings"));
    }
    let mut argv = Vec::with_capacity(args.positional().len());
    for &value in args.positional() {
        let Some(text) = value.as_str(&interp.heap, &interp.interns) else {
            return Err(RunError::type_error("all command arguments must be Strings"));
        };
        argv.push(text.to_owned());
    }
    Ok(argv)
}
