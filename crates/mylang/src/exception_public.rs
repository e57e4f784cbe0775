//! Host-facing exception type.

use std::fmt;

/// An error presented to the embedding host: the kind and message of the
/// failure plus the call context collected while it unwound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    kind: String,
    message: String,
    trace: Vec<String>,
}

impl Exception {
    pub(crate) fn new(kind: String, message: String, trace: Vec<String>) -> Self {
        Self { kind, message, trace }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Call-site names, innermost first.
    #[must_use]
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// One-line form without the trace.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.message.is_empty() {
            self.kind.clone()
        } else {
            format!("{}: {}", self.kind, self.message)
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())?;
        for frame in &self.trace {
            write!(f, "\n  in {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}
