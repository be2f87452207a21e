//! JSON payload validation.

use rayon::prelude::*;
use serde_json::Value;
use std::sync::Arc;

use super::parser::{JsonSchema, JsonSchemaParser};
use super::payload::JsonPayload;
use crate::artifact::{ArtifactReference, Record};
use crate::config::ResolverConfig;
use crate::error::ValidationError;
use crate::registry::ArtifactRegistry;
use crate::resolver::{DefaultSchemaResolver, SchemaResolver};
use crate::validation::{ValidateError, ValidationResult};

/// A record holding a JSON payload.
pub type JsonRecord = Record<JsonPayload>;

/// Validates JSON payloads against resolved JSON Schemas.
///
/// # Example
///
/// ```rust
/// use schemaguard::{Artifact, ArtifactReference, ArtifactRegistry, ResolverConfig};
/// use schemaguard::json::JsonValidator;
/// use serde_json::json;
///
/// let registry = ArtifactRegistry::new();
/// registry
///     .register(
///         ArtifactReference::new("event"),
///         Artifact::json(r#"{"type": "object", "required": ["message", "time"]}"#),
///     )
///     .unwrap();
///
/// let validator = JsonValidator::from_config(
///     ResolverConfig::new(),
///     registry,
///     Some(ArtifactReference::new("event")),
/// );
///
/// let result = validator
///     .validate_by_artifact_reference(json!({"message": "hello"}))
///     .unwrap();
/// assert!(!result.is_success());
/// assert_eq!(result.errors()[0].context, "#");
/// ```
pub struct JsonValidator {
    resolver: Arc<dyn SchemaResolver<JsonSchema, JsonPayload>>,
    artifact_reference: Option<ArtifactReference>,
}

impl JsonValidator {
    /// Creates a validator over an existing resolver.
    pub fn new<R>(resolver: R, artifact_reference: Option<ArtifactReference>) -> Self
    where
        R: SchemaResolver<JsonSchema, JsonPayload> + 'static,
    {
        Self {
            resolver: Arc::new(resolver),
            artifact_reference,
        }
    }

    /// Creates a validator backed by a [`DefaultSchemaResolver`].
    ///
    /// Without an explicit reference, the one configured through the
    /// `artifact.*` options is used, if any.
    pub fn from_config(
        config: ResolverConfig,
        registry: ArtifactRegistry,
        artifact_reference: Option<ArtifactReference>,
    ) -> Self {
        let artifact_reference = artifact_reference.or_else(|| config.artifact_reference());
        let resolver = DefaultSchemaResolver::with_config(registry, JsonSchemaParser::new(), config);
        Self::new(resolver, artifact_reference)
    }

    /// Returns the static artifact reference, if configured.
    pub fn artifact_reference(&self) -> Option<&ArtifactReference> {
        self.artifact_reference.as_ref()
    }

    /// Validates a payload against the statically configured artifact.
    ///
    /// # Errors
    ///
    /// Fails with `MissingArtifactReference` when the validator was built
    /// without a static reference, and with `Resolve` or `Payload` when the
    /// schema or payload cannot be loaded.
    pub fn validate_by_artifact_reference(
        &self,
        payload: impl Into<JsonPayload>,
    ) -> Result<ValidationResult, ValidateError> {
        let reference = self
            .artifact_reference
            .as_ref()
            .ok_or(ValidateError::MissingArtifactReference)?;
        let schema = self.resolver.resolve_schema_by_artifact_reference(reference)?;
        Self::validate_parsed(schema.schema(), &payload.into())
    }

    /// Validates a record against the artifact named by its metadata.
    pub fn validate(&self, record: &JsonRecord) -> Result<ValidationResult, ValidateError> {
        let schema = self.resolver.resolve_schema(record)?;
        Self::validate_parsed(schema.schema(), record.payload())
    }

    /// Validates records in parallel, returning outcomes in input order.
    pub fn validate_batch(
        &self,
        records: &[JsonRecord],
    ) -> Vec<Result<ValidationResult, ValidateError>> {
        records.par_iter().map(|record| self.validate(record)).collect()
    }

    /// Validates a payload against an already resolved schema.
    pub fn validate_parsed(
        schema: &JsonSchema,
        payload: &JsonPayload,
    ) -> Result<ValidationResult, ValidateError> {
        let value = payload.as_value()?;
        Ok(Self::validate_value(schema, &value))
    }

    /// Runs the engine and maps each violation, in engine order.
    pub fn validate_value(schema: &JsonSchema, value: &Value) -> ValidationResult {
        let errors: Vec<ValidationError> = schema
            .validator()
            .iter_errors(value)
            .map(|e| ValidationError::new(e.to_string(), format!("#{}", e.instance_path)))
            .collect();

        if !errors.is_empty() {
            log::debug!("JSON payload failed validation with {} error(s)", errors.len());
        }
        ValidationResult::from_errors(errors)
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<JsonValidator>();
    assert_sync::<JsonValidator>();
};
