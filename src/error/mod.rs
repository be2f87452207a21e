//! Error types for validation failures.
//!
//! This module provides the data types that describe schema violations. Fatal
//! errors live next to the operations that raise them: [`ValidateError`]
//! in the validators, [`ResolveError`] in the resolver and
//! [`SchemaParseError`] in the parser module.
//!
//! [`ValidateError`]: crate::ValidateError
//! [`ResolveError`]: crate::ResolveError
//! [`SchemaParseError`]: crate::SchemaParseError

mod validation_error;

pub use validation_error::{ValidationError, ValidationErrors};
