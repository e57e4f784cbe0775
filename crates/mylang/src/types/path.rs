//! Multi-segment lookup/assignment selectors.

use smallvec::SmallVec;

use crate::value::Value;

/// One segment of a path.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PathSeg {
    /// A key segment: a string, int or other scalar value.
    Key(Value),
    /// A run of dots. Leading dots anchor the walk relative to the lexical
    /// scope chain instead of starting with a full chain lookup.
    Dots(u32),
}

/// A path value: an ordered sequence of atoms used by `get`/`set` to
/// navigate nested values. A path always has at least two parts; a single
/// atom is not a path.
#[derive(Debug, Clone)]
pub(crate) struct PathValue {
    segments: SmallVec<[PathSeg; 4]>,
}

impl PathValue {
    /// # Panics
    /// Panics when given fewer than two segments; the parser never produces
    /// a one-atom path.
    pub fn new(segments: SmallVec<[PathSeg; 4]>) -> Self {
        assert!(segments.len() >= 2, "a path requires at least two parts");
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSeg] {
        &self.segments
    }
}
