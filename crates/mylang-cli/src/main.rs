use std::{env, io::IsTerminal, io::Read as _, path::PathBuf, process::ExitCode};

use mylang::{Session, StdPrint, run_repl};

enum Input {
    File(PathBuf),
    Command(String),
    Stdin,
    Repl,
}

fn parse_args(args: &[String]) -> Result<Input, String> {
    let mut file: Option<PathBuf> = None;
    let mut command: Option<String> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" | "--command" => match iter.next() {
                Some(code) => command = Some(code.clone()),
                None => return Err(format!("{arg} requires an argument")),
            },
            "-h" | "--help" => {
                return Err("usage: mylang [file | -c code]".to_owned());
            }
            other if other.starts_with('-') => return Err(format!("unknown option {other}")),
            other => {
                if file.is_some() {
                    return Err("only one file argument is accepted".to_owned());
                }
                file = Some(PathBuf::from(other));
            }
        }
    }
    Ok(match (command, file) {
        (Some(code), _) => Input::Command(code),
        (None, Some(path)) => Input::File(path),
        (None, None) if !std::io::stdin().is_terminal() => Input::Stdin,
        (None, None) => Input::Repl,
    })
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let input = match parse_args(&args) {
        Ok(input) => input,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let result = match input {
        Input::File(path) => Session::new(StdPrint).eval_file(&path).map(|_| ()),
        Input::Command(code) => Session::new(StdPrint).eval(&code, "<command>").map(|_| ()),
        Input::Stdin => {
            let mut code = String::new();
            if let Err(error) = std::io::stdin().read_to_string(&mut code) {
                eprintln!("error: {error}");
                return ExitCode::FAILURE;
            }
            Session::new(StdPrint).eval(&code, "<stdin>").map(|_| ())
        }
        Input::Repl => {
            run_repl();
            return ExitCode::SUCCESS;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(exception) => {
            eprintln!("{exception}");
            ExitCode::FAILURE
        }
    }
}
