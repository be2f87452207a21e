//! Resolution context.
//!
//! This module provides the [`ResolutionContext`] type that tracks the chain of
//! artifacts being fetched. It detects circular references and bounds the
//! length of reference chains.

use super::ResolveError;

/// Resolution context carries the current reference path and depth limit.
///
/// A context is passed down the fetch call chain. Entering an artifact
/// returns a new context; siblings never see each other's paths, so a
/// dependency shared by two parents is not mistaken for a cycle.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    path: Vec<String>,
    max_depth: usize,
}

impl ResolutionContext {
    /// Creates an empty context with a max depth limit.
    pub fn new(max_depth: usize) -> Self {
        Self {
            path: Vec::new(),
            max_depth,
        }
    }

    /// Creates a new context one level deeper, entering the artifact `key`.
    ///
    /// # Errors
    ///
    /// Returns `CircularReference` if `key` is already on the path and
    /// `MaxDepthExceeded` if following it would exceed the depth limit.
    pub fn enter(&self, key: &str) -> Result<Self, ResolveError> {
        if self.path.iter().any(|k| k == key) {
            let mut cycle = self.path.clone();
            cycle.push(key.to_string());
            return Err(ResolveError::CircularReference(cycle));
        }
        if self.path.len() > self.max_depth {
            return Err(ResolveError::MaxDepthExceeded(self.max_depth));
        }

        let mut path = self.path.clone();
        path.push(key.to_string());
        Ok(Self {
            path,
            max_depth: self.max_depth,
        })
    }

    /// Returns the number of references followed from the root.
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Returns the maximum allowed depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the artifacts entered so far, root first.
    pub fn path(&self) -> &[String] {
        &self.path
    }
}
