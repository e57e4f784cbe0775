#![doc = include_str!("../../../README.md")]

mod args;
mod builtins;
mod eval;
mod exception_private;
mod exception_public;
mod expressions;
mod heap;
mod intern;
mod io;
mod lexer;
mod modules;
mod parse;
mod repl;
mod run;
mod scope;
mod types;
mod value;

pub use crate::{
    exception_public::Exception,
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    repl::{ReplOutcome, ReplSession, run_repl},
    run::{Object, Session, run_module},
};
