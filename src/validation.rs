//! Validation outcomes.
//!
//! This module provides [`ValidationResult`], the immutable outcome returned by
//! every validator, and [`ValidateError`], the fatal failures that prevent a
//! result from being produced at all.

use std::fmt::{self, Display};

use stillwater::Validation;

use crate::error::{ValidationError, ValidationErrors};
use crate::resolver::ResolveError;

/// The outcome of validating one payload.
///
/// A result is either a success or carries at least one [`ValidationError`].
/// Success is derived from the error list, so `is_success()` can never
/// disagree with `errors().is_empty()`.
///
/// # Example
///
/// ```rust
/// use schemaguard::{ValidationError, ValidationResult};
///
/// let ok = ValidationResult::from_errors(Vec::new());
/// assert!(ok.is_success());
/// assert_eq!(ok, ValidationResult::SUCCESS);
///
/// let failed = ValidationResult::from_errors(vec![ValidationError::new("required", "#")]);
/// assert!(!failed.is_success());
/// assert_eq!(failed.errors().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    errors: Option<ValidationErrors>,
}

impl ValidationResult {
    /// The shared success result.
    pub const SUCCESS: ValidationResult = ValidationResult { errors: None };

    /// Returns the shared success result.
    pub const fn success() -> Self {
        Self::SUCCESS
    }

    /// Builds a result from the errors reported by an engine.
    ///
    /// An empty list yields a success.
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            errors: ValidationErrors::from_vec(errors),
        }
    }

    /// Builds a failed result holding a single error.
    pub fn single(error: ValidationError) -> Self {
        Self {
            errors: Some(ValidationErrors::single(error)),
        }
    }

    /// Returns true if the payload satisfied the schema.
    pub fn is_success(&self) -> bool {
        self.errors.is_none()
    }

    /// Returns the errors in the order the engine reported them.
    ///
    /// The list is empty exactly when the result is a success.
    pub fn errors(&self) -> Vec<&ValidationError> {
        self.errors
            .as_ref()
            .map(|errors| errors.iter().collect())
            .unwrap_or_default()
    }

    /// Returns the non-empty error collection of a failed result.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        self.errors.as_ref()
    }

    /// Converts into a stillwater `Validation` for applicative composition.
    pub fn into_validation(self) -> Validation<(), ValidationErrors> {
        match self.errors {
            None => Validation::Success(()),
            Some(errors) => Validation::Failure(errors),
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<Vec<ValidationError>> for ValidationResult {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::from_errors(errors)
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.errors {
            None => write!(f, "ValidationResult [ success ]"),
            Some(errors) => {
                write!(f, "ValidationResult [ errors = ")?;
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{{{}}}", error)?;
                }
                write!(f, " ]")
            }
        }
    }
}

/// Fatal failures that prevent a [`ValidationResult`] from being produced.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// `validate_by_artifact_reference` was called on a validator built
    /// without a static artifact reference.
    #[error("an artifact reference must be configured to validate by artifact reference")]
    MissingArtifactReference,

    /// The schema could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The payload could not be converted into the engine's representation.
    #[error("payload could not be decoded: {0}")]
    Payload(#[from] crate::json::PayloadError),

    /// Protobuf bytes could not be decoded as the selected message type.
    #[error("protobuf payload could not be decoded as {type_name}")]
    Decode {
        /// The runtime type name the bytes were decoded as.
        type_name: String,
        /// The underlying wire-format error.
        #[source]
        source: prost::DecodeError,
    },

    /// The resolved Protobuf schema declares no message type to decode into.
    #[error("schema {file} declares no message types")]
    NoMessageType {
        /// Name of the resolved file descriptor.
        file: String,
    },
}
