//! Validation error types.
//!
//! This module provides [`ValidationError`] for a single schema violation and
//! [`ValidationErrors`] for a non-empty, ordered collection of them.

use std::fmt::{self, Display};

use stillwater::prelude::*;

/// A single schema violation.
///
/// `ValidationError` is deliberately flat:
/// - **description**: Human-readable description of the violation
/// - **context**: Where the violation happened. For JSON Schema this is a
///   JSON pointer rooted at `#` (e.g. `#/time`); for Protobuf it is a
///   free-form note such as a fully qualified message name.
///
/// # Example
///
/// ```rust
/// use schemaguard::ValidationError;
///
/// let error = ValidationError::new("\"time\" is a required property", "#");
///
/// assert_eq!(error.context, "#");
/// assert_eq!(error.to_string(), "#: \"time\" is a required property");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ValidationError {
    /// Human-readable description of the violation.
    pub description: String,
    /// Engine-specific location of the violation.
    pub context: String,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(description: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            context: context.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.description)
        } else {
            write!(f, "{}: {}", self.context, self.description)
        }
    }
}

impl std::error::Error for ValidationError {}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<ValidationError>();
    assert_sync::<ValidationError>();
};

/// A non-empty collection of validation errors.
///
/// `ValidationErrors` wraps a `NonEmptyVec<ValidationError>`, so a failed
/// [`ValidationResult`](crate::ValidationResult) always carries at least one
/// error. Errors keep the order the engine reported them in.
///
/// # Combining Errors
///
/// ```rust
/// use schemaguard::{ValidationError, ValidationErrors};
/// use stillwater::prelude::*;
///
/// let missing = ValidationErrors::single(ValidationError::new("required", "#"));
/// let wrong_type = ValidationErrors::single(ValidationError::new("not a string", "#/time"));
///
/// let combined = missing.combine(wrong_type);
/// assert_eq!(combined.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(NonEmptyVec<ValidationError>);

impl ValidationErrors {
    /// Creates a `ValidationErrors` containing a single error.
    pub fn single(error: ValidationError) -> Self {
        Self(NonEmptyVec::singleton(error))
    }

    /// Creates a `ValidationErrors` from a `Vec`, or `None` if it is empty.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        NonEmptyVec::from_vec(errors).map(Self)
    }

    /// Returns the number of errors in this collection.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the collection is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns an iterator over the contained errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Returns all errors reported at the given context.
    pub fn at_context(&self, context: &str) -> Vec<&ValidationError> {
        self.0.iter().filter(|e| e.context == context).collect()
    }

    /// Returns the first error in the collection.
    pub fn first(&self) -> &ValidationError {
        self.0.head()
    }

    /// Converts this collection into a `Vec<ValidationError>`.
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0.into_vec()
    }
}

impl Semigroup for ValidationErrors {
    fn combine(self, other: Self) -> Self {
        ValidationErrors(self.0.combine(other.0))
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation failed with {} error(s):", self.len())?;
        for (i, error) in self.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = Box<dyn Iterator<Item = &'a ValidationError> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.0.iter())
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<ValidationErrors>();
    assert_sync::<ValidationErrors>();
};
