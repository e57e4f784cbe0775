//! The REPL session: line buffering and error recovery.
//!
//! Lines accumulate until braces, parens and brackets balance, then the
//! buffer executes against the session's persistent module frame. A
//! non-undefined statement value echoes as repr; on error the buffer is
//! cleared, the diagnostic (with its call context) is reported, and the
//! loop continues. Line editing stays with the terminal.

use std::io::{BufRead, Write as _};

use crate::{
    io::{PrintWriter, StdPrint},
    run::Session,
};

/// Result of feeding one line to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplOutcome {
    /// The input is not a complete statement list yet; keep buffering.
    Incomplete,
    /// Executed; carries the repr of the value when it was not undefined.
    Value(Option<String>),
    /// Executed and failed; the buffer has been cleared.
    Error(String),
}

pub struct ReplSession<P: PrintWriter> {
    session: Session<P>,
    buffer: String,
}

impl<P: PrintWriter> ReplSession<P> {
    pub fn new(print: P) -> Self {
        Self { session: Session::new(print), buffer: String::new() }
    }

    /// True when previous lines are still waiting for their closing
    /// bracket.
    #[must_use]
    pub fn is_buffering(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn push_line(&mut self, line: &str) -> ReplOutcome {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);
        if !is_balanced(&self.buffer) {
            return ReplOutcome::Incomplete;
        }
        let source = std::mem::take(&mut self.buffer);
        match self.session.eval_raw(&source, "<repl>") {
            Ok(value) => {
                if value.is_undefined() {
                    ReplOutcome::Value(None)
                } else {
                    ReplOutcome::Value(Some(self.session.repr(value)))
                }
            }
            Err(error) => {
                let exception = self.session.to_exception(error);
                ReplOutcome::Error(exception.to_string())
            }
        }
    }

    pub fn session_mut(&mut self) -> &mut Session<P> {
        &mut self.session
    }
}

/// Whether every brace, paren and bracket opened in `source` has closed.
/// Strings and comments are skipped; excess closers count as balanced and
/// surface as parse errors instead.
fn is_balanced(source: &str) -> bool {
    let mut depth = 0i64;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '"' | '\'' => {
                let quote = c;
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        chars.next();
                    } else if c == quote {
                        break;
                    }
                }
            }
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0
}

/// Runs the interactive loop on stdin/stdout until end of input.
pub fn run_repl() {
    let mut repl = ReplSession::new(StdPrint);
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        let prompt = if repl.is_buffering() { "... " } else { ">>> " };
        let _ = write!(stdout, "{prompt}");
        let _ = stdout.flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim_end_matches(['\n', '\r']);
        match repl.push_line(line) {
            ReplOutcome::Incomplete => {}
            ReplOutcome::Value(None) => {}
            ReplOutcome::Value(Some(repr)) => println!("{repr}"),
            ReplOutcome::Error(message) => eprintln!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectStringPrint;

    #[test]
    fn balancing_tracks_strings_and_comments() {
        assert!(is_balanced("echo hi"));
        assert!(!is_balanced("fun f {"));
        assert!(is_balanced("fun f { echo \"}\" }"));
        assert!(is_balanced("echo hi # {"));
    }

    #[test]
    fn multi_line_input_buffers_until_closed() {
        let mut repl = ReplSession::new(CollectStringPrint::default());
        assert_eq!(repl.push_line("fun f {"), ReplOutcome::Incomplete);
        assert_eq!(repl.push_line("  return 7"), ReplOutcome::Incomplete);
        assert!(matches!(repl.push_line("}"), ReplOutcome::Value(_)));
        assert_eq!(repl.push_line("echo f()"), ReplOutcome::Value(None));
        assert_eq!(repl.session_mut().print_mut().output(), "7\n");
    }

    #[test]
    fn errors_clear_the_buffer_and_report() {
        let mut repl = ReplSession::new(CollectStringPrint::default());
        let ReplOutcome::Error(message) = repl.push_line("echo $missing") else {
            panic!("expected an error outcome");
        };
        assert!(message.contains("LookupError"));
        assert!(!repl.is_buffering());
        assert!(matches!(repl.push_line("echo ok"), ReplOutcome::Value(None)));
    }

    #[test]
    fn values_echo_as_repr() {
        let mut repl = ReplSession::new(CollectStringPrint::default());
        assert_eq!(repl.push_line("(1 + 2)"), ReplOutcome::Value(Some("3".to_owned())));
    }
}
