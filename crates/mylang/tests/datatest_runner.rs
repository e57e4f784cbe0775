//! Fixture-driven tests: every `.my` file under `tests/datasets` runs in a
//! fresh session. The file's LAST line is the expectation:
//!
//! - `# Output=text` - captured `echo`/`io.write` output; `\n` escapes
//!   newlines.
//! - `# Return=object` - debug form of the final statement's value.
//! - `# Raise=summary` - the exception summary of an expected failure.

use std::path::Path;

use mylang::{CollectStringPrint, Session};

#[derive(Debug)]
enum Expectation {
    Output(String),
    Return(String),
    Raise(String),
}

fn parse_fixture(content: &str) -> (String, Expectation) {
    let lines: Vec<&str> = content.lines().collect();
    assert!(!lines.is_empty(), "empty fixture file");
    let last = lines.last().expect("checked non-empty");
    let expectation = if let Some(expected) = last.strip_prefix("# Output=") {
        Expectation::Output(expected.replace("\\n", "\n"))
    } else if let Some(expected) = last.strip_prefix("# Return=") {
        Expectation::Return(expected.to_owned())
    } else if let Some(expected) = last.strip_prefix("# Raise=") {
        Expectation::Raise(expected.to_owned())
    } else {
        panic!("fixture must end with an expectation comment, found: {last}");
    };
    let code = lines[..lines.len() - 1].join("\n");
    (code, expectation)
}

fn run_case(path: &Path) -> datatest_stable::Result<()> {
    let content = std::fs::read_to_string(path)?;
    let (code, expectation) = parse_fixture(&content);
    let mut session = Session::new(CollectStringPrint::default());
    let result = session.eval(&code, &path.display().to_string());
    match expectation {
        Expectation::Output(expected) => {
            let value = result.map_err(|e| format!("unexpected error: {e}"))?;
            let output = session.print_mut().output();
            if output != expected {
                return Err(format!("output mismatch:\n  expected: {expected:?}\n  actual:   {output:?}\n  value: {value:?}").into());
            }
        }
        Expectation::Return(expected) => {
            let value = result.map_err(|e| format!("unexpected error: {e}"))?;
            let actual = format!("{value:?}");
            if actual != expected {
                return Err(format!("return mismatch:\n  expected: {expected}\n  actual:   {actual}").into());
            }
        }
        Expectation::Raise(expected) => match result {
            Ok(value) => return Err(format!("expected an error, got {value:?}").into()),
            Err(exception) => {
                let actual = exception.summary();
                if actual != expected {
                    return Err(format!("exception mismatch:\n  expected: {expected}\n  actual:   {actual}").into());
                }
            }
        },
    }
    Ok(())
}

datatest_stable::harness!(run_case, "tests/datasets", r"^.*\.my$");
