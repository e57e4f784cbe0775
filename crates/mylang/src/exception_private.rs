//! Internal error representation and result alias.
//!
//! Every fallible interpreter operation returns [`RunResult`]. A [`RunError`]
//! is either an interpreter-raised kind with a message, or a user error value
//! thrown by `throw`. Call boundaries inspect the caller frame's catch
//! specification and either convert the error into a caught value or let it
//! continue unwinding, collecting a call trace as it goes.
//!
//! Invariant violations (frame-stack mismatch, dangling heap ids) are not
//! errors: they panic, terminating the interpreter.

use crate::heap::HeapId;

/// Result type alias for operations that can produce a runtime error.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// Interpreter-raised error kinds.
///
/// These are kinds, not classes: user-level `catch` sees all of them as the
/// generic `Error`. The string form is what diagnostics print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::IntoStaticStr)]
pub(crate) enum ErrKind {
    /// Malformed source; raised at module boundaries by the parser.
    ParseError,
    /// `get`/attribute access with an absent key.
    LookupError,
    /// Wrong kind of value.
    TypeError,
    /// Wrong argument count for a builtin or user function.
    ArityError,
    /// Division by zero, integer overflow.
    ArithmeticError,
    /// A generic error (also what `throw` with no class produces).
    Error,
}

/// What was raised: an internal kind or a thrown error value.
#[derive(Debug)]
pub(crate) enum Raised {
    Kind { kind: ErrKind, message: String },
    /// Heap id of an `ErrorObject`.
    Thrown(HeapId),
}

/// A runtime error unwinding across call boundaries.
#[derive(Debug)]
pub(crate) struct RunError {
    pub raised: Raised,
    /// Call-site names collected while unwinding, innermost first.
    pub trace: Vec<String>,
}

impl RunError {
    pub fn new(kind: ErrKind, message: impl Into<String>) -> Self {
        Self { raised: Raised::Kind { kind, message: message.into() }, trace: Vec::new() }
    }

    pub fn thrown(error: HeapId) -> Self {
        Self { raised: Raised::Thrown(error), trace: Vec::new() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrKind::ParseError, message)
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(ErrKind::LookupError, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrKind::TypeError, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(ErrKind::ArityError, message)
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::new(ErrKind::ArithmeticError, message)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrKind::Error, message)
    }

    /// Arity helper matching the builtin error message shape.
    pub fn arity_exact(name: &str, expected: usize, got: usize) -> Self {
        Self::arity(format!("{name} takes exactly {expected} argument{} ({got} given)", plural(expected)))
    }

    pub fn arity_at_most(name: &str, expected: usize, got: usize) -> Self {
        Self::arity(format!("{name} takes at most {expected} argument{} ({got} given)", plural(expected)))
    }

    /// Records a call-site name while the error unwinds.
    pub fn push_trace(&mut self, name: impl Into<String>) {
        self.trace.push(name.into());
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_render_like_diagnostics() {
        assert_eq!(ErrKind::LookupError.to_string(), "LookupError");
        assert_eq!(ErrKind::ArityError.to_string(), "ArityError");
    }

    #[test]
    fn arity_message_shape() {
        let err = RunError::arity_exact("get", 1, 3);
        match err.raised {
            Raised::Kind { kind, message } => {
                assert_eq!(kind, ErrKind::ArityError);
                assert_eq!(message, "get takes exactly 1 argument (3 given)");
            }
            Raised::Thrown(_) => panic!("expected a kind error"),
        }
    }
}
