//! Schema parser abstraction.
//!
//! A [`SchemaParser`] turns raw schema bytes plus already-parsed dependencies
//! into an engine-specific schema handle. Resolvers drive parsers bottom-up:
//! every dependency is parsed before the schema that references it.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::artifact::{ArtifactType, Record};
use crate::schema::ParsedSchema;

/// Builds engine-specific schemas from raw bytes.
pub trait SchemaParser: Send + Sync {
    /// The engine handle produced by this parser.
    type Schema: Send + Sync;
    /// The payload type of records this parser can extract schemas from.
    type Payload;

    /// Returns the artifact type this parser understands.
    fn artifact_type(&self) -> ArtifactType;

    /// Parses raw schema bytes.
    ///
    /// `resolved_references` maps each reference name the schema uses to its
    /// parsed dependency, in declaration order.
    fn parse_schema(
        &self,
        raw_schema: &[u8],
        resolved_references: &IndexMap<String, Arc<ParsedSchema<Self::Schema>>>,
    ) -> Result<Self::Schema, SchemaParseError>;

    /// Derives the schema from the record payload itself.
    fn schema_from_data(
        &self,
        _record: &Record<Self::Payload>,
    ) -> Result<ParsedSchema<Self::Schema>, SchemaParseError> {
        Err(SchemaParseError::Unsupported(self.artifact_type()))
    }

    /// Returns true if [`schema_from_data`](Self::schema_from_data) is supported.
    fn supports_extract_schema_from_data(&self) -> bool {
        false
    }
}

/// Errors that can occur while parsing a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaParseError {
    /// The schema bytes are not valid UTF-8.
    #[error("schema is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The schema bytes are not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON Schema engine rejected the document.
    #[error("invalid JSON Schema: {0}")]
    JsonSchema(String),

    /// A `.proto` file has a syntax error.
    #[error("syntax error in {file}: {source}")]
    ProtoSyntax {
        /// Name of the offending file.
        file: String,
        /// The parser diagnostic.
        #[source]
        source: Box<protox_parse::ParseError>,
    },

    /// A descriptor could not be built even from syntax alone.
    #[error("failed to build descriptor: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    /// A file is absent from the pool it was just added to.
    #[error("file {0} missing after building its descriptor")]
    MissingFile(String),

    /// The parser cannot derive schemas from payloads.
    #[error("{0} parser cannot extract a schema from data")]
    Unsupported(ArtifactType),
}
