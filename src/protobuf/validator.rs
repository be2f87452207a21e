//! Structural Protobuf validation.

use prost_reflect::ReflectMessage;
use rayon::prelude::*;
use std::sync::Arc;

use super::decoder::DecoderRegistry;
use super::envelope::select_message;
use super::naming::runtime_type_name;
use super::parser::{ProtobufSchema, ProtobufSchemaParser};
use crate::artifact::{ArtifactReference, Record};
use crate::config::ResolverConfig;
use crate::error::ValidationError;
use crate::registry::ArtifactRegistry;
use crate::resolver::{DefaultSchemaResolver, SchemaResolver};
use crate::validation::{ValidateError, ValidationResult};

/// Validates Protobuf messages by decoding them as the schema's message type.
///
/// A payload passes when its message type is declared by the resolved
/// schema and its bytes decode, through the decoder registry, into that
/// same type.
pub struct ProtobufValidator<M> {
    resolver: Arc<dyn SchemaResolver<ProtobufSchema, M>>,
    artifact_reference: Option<ArtifactReference>,
    decoders: Arc<DecoderRegistry>,
}

impl<M> ProtobufValidator<M>
where
    M: ReflectMessage + 'static,
{
    /// Creates a validator over an existing resolver.
    pub fn new<R>(resolver: R, artifact_reference: Option<ArtifactReference>) -> Self
    where
        R: SchemaResolver<ProtobufSchema, M> + 'static,
    {
        Self {
            resolver: Arc::new(resolver),
            artifact_reference,
            decoders: Arc::new(DecoderRegistry::new()),
        }
    }

    /// Creates a validator backed by a [`DefaultSchemaResolver`].
    pub fn from_config(
        config: ResolverConfig,
        registry: ArtifactRegistry,
        artifact_reference: Option<ArtifactReference>,
    ) -> Self {
        let artifact_reference = artifact_reference.or_else(|| config.artifact_reference());
        let resolver =
            DefaultSchemaResolver::with_config(registry, ProtobufSchemaParser::<M>::new(), config);
        Self::new(resolver, artifact_reference)
    }

    /// Shares a decoder registry, e.g. one pre-populated with typed decoders.
    pub fn with_decoders(mut self, decoders: Arc<DecoderRegistry>) -> Self {
        self.decoders = decoders;
        self
    }

    /// Returns the decoder registry.
    pub fn decoders(&self) -> &Arc<DecoderRegistry> {
        &self.decoders
    }

    /// Validates a message against the statically configured artifact.
    pub fn validate_by_artifact_reference(&self, payload: &M) -> Result<ValidationResult, ValidateError> {
        let reference = self
            .artifact_reference
            .as_ref()
            .ok_or(ValidateError::MissingArtifactReference)?;
        let schema = self.resolver.resolve_schema_by_artifact_reference(reference)?;
        self.validate_parsed(schema.schema(), payload)
    }

    /// Validates a record against the schema its metadata names, or the one
    /// derived from its payload when it carries no reference.
    pub fn validate(&self, record: &Record<M>) -> Result<ValidationResult, ValidateError> {
        let schema = self.resolver.resolve_schema(record)?;
        self.validate_parsed(schema.schema(), record.payload())
    }

    /// Validates records in parallel, returning outcomes in input order.
    pub fn validate_batch(&self, records: &[Record<M>]) -> Vec<Result<ValidationResult, ValidateError>> {
        records.par_iter().map(|record| self.validate(record)).collect()
    }

    /// Validates a message against an already resolved schema.
    pub fn validate_parsed(
        &self,
        schema: &ProtobufSchema,
        payload: &M,
    ) -> Result<ValidationResult, ValidateError> {
        let expected = payload.descriptor();
        let expected_name = expected.full_name();
        let file = schema.file_descriptor();

        if !schema.declares_message(expected_name) {
            return Ok(ValidationResult::single(ValidationError::new(
                format!(
                    "message type {} is missing from schema {}",
                    expected_name,
                    file.name()
                ),
                expected_name,
            )));
        }

        let bytes = payload.encode_to_vec();
        let selection = select_message(file, &bytes).ok_or_else(|| ValidateError::NoMessageType {
            file: file.name().to_string(),
        })?;
        let selected = selection.descriptor;

        let Some(type_name) = runtime_type_name(&selected) else {
            return Ok(ValidationResult::single(ValidationError::new(
                format!(
                    "cannot determine concrete type of {}: set java_outer_classname or java_multiple_files",
                    selected.full_name()
                ),
                selected.full_name(),
            )));
        };

        let decoder = self.decoders.get_or_insert_dynamic(&type_name, &selected);
        let decoded = decoder
            .decode(selection.body)
            .map_err(|source| ValidateError::Decode {
                type_name: type_name.clone(),
                source,
            })?;

        let decoded_name = decoded.descriptor().full_name().to_string();
        if decoded_name == expected_name {
            Ok(ValidationResult::SUCCESS)
        } else {
            log::debug!(
                "payload {} decoded as {} via {}",
                expected_name,
                decoded_name,
                type_name
            );
            Ok(ValidationResult::single(ValidationError::new(
                format!(
                    "payload of type {} does not match schema type {}",
                    expected_name, decoded_name
                ),
                expected_name,
            )))
        }
    }
}
