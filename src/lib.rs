//! # Schemaguard
//!
//! Validates JSON and Protobuf payloads against schemas held in an artifact
//! registry, resolving every schema reference before validation.
//!
//! ## Overview
//!
//! A validator resolves the schema for a payload, either from a statically
//! configured [`ArtifactReference`] or from the reference carried in a
//! [`Record`]'s metadata, and reports schema violations as data. Violations
//! never abort validation: they are collected into a [`ValidationResult`].
//! Only failures that prevent a result altogether, such as a schema that
//! cannot be resolved, are returned as a [`ValidateError`].
//!
//! ## Core Types
//!
//! - [`ArtifactRegistry`]: In-memory store of raw schema artifacts and their references
//! - [`SchemaResolver`]: Resolves a reference into a fully parsed schema tree
//! - [`SchemaParser`]: Turns raw schema bytes into an engine-ready schema
//! - [`json::JsonValidator`]: JSON Schema validation with `$ref` support
//! - [`protobuf::ProtobufValidator`]: Protobuf structural validation
//! - [`protobuf::ProtobufCompatibilityValidator`]: Protobuf schema-evolution checks
//!
//! ## Example
//!
//! ```rust
//! use schemaguard::json::JsonValidator;
//! use schemaguard::{Artifact, ArtifactReference, ArtifactRegistry, ResolverConfig};
//! use serde_json::json;
//!
//! let registry = ArtifactRegistry::new();
//! let reference = registry
//!     .register(
//!         ArtifactReference::new("event"),
//!         Artifact::json(r#"{"type": "object", "required": ["message", "time"]}"#),
//!     )
//!     .unwrap();
//!
//! let validator = JsonValidator::from_config(ResolverConfig::new(), registry, Some(reference));
//!
//! let result = validator
//!     .validate_by_artifact_reference(json!({"message": "hello"}))
//!     .unwrap();
//! assert!(!result.is_success());
//! assert_eq!(result.errors()[0].context, "#");
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod json;
pub mod parser;
pub mod protobuf;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod validation;

#[cfg(feature = "loading")]
pub mod loading;

pub use artifact::{ArtifactReference, ArtifactType, Metadata, ParseReferenceError, Record};
pub use config::ResolverConfig;
pub use error::{ValidationError, ValidationErrors};
pub use parser::{SchemaParseError, SchemaParser};
pub use registry::{Artifact, ArtifactReferenceEntry, ArtifactRegistry, RegistryError};
pub use resolver::{
    innermost_message, DefaultSchemaResolver, ProblemDetails, ResolutionContext, ResolveError,
    SchemaResolver,
};
pub use schema::{ParsedSchema, RawSchema, RawSchemaReference};
pub use validation::{ValidateError, ValidationResult};
