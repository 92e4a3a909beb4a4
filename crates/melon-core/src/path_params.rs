//! Values captured from the dynamic segments of a route pattern

use smallvec::SmallVec;

/// Captures held inline before spilling to the heap
const INLINE_PARAMS: usize = 4;

/// Named values captured from dynamic path segments, in pattern order
///
/// The router builds a fresh set for every matched request; names are unique
/// within one pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    captures: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room for the parameters of one pattern
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            captures: SmallVec::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, name: String, value: String) {
        self.captures.push((name, value));
    }

    /// The value captured for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// `(name, value)` pairs in pattern order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.captures.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}
