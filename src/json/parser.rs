//! JSON Schema parsing.

use indexmap::IndexMap;
use jsonschema::{Draft, Validator};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::references::{flatten_json_references, ReferenceRetriever};
use super::JsonPayload;
use crate::artifact::ArtifactType;
use crate::parser::{SchemaParseError, SchemaParser};
use crate::schema::ParsedSchema;

/// A compiled JSON Schema.
pub struct JsonSchema {
    validator: Validator,
    document: Value,
    id: Option<String>,
}

impl JsonSchema {
    /// Returns the compiled validator.
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Returns the schema document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Returns the declared `$id`, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("id", &self.id)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

/// Parses JSON Schema documents, draft 7 unless configured otherwise.
///
/// Resolved references are flattened into the `$ref` symbol table the engine
/// consults while compiling the root document.
#[derive(Debug, Clone, Copy)]
pub struct JsonSchemaParser {
    draft: Draft,
}

impl JsonSchemaParser {
    /// Creates a draft 7 parser.
    pub fn new() -> Self {
        Self {
            draft: Draft::Draft7,
        }
    }

    /// Sets the draft used when a document declares no `$schema`.
    pub fn with_draft(mut self, draft: Draft) -> Self {
        self.draft = draft;
        self
    }

    /// Compiles a schema document against a prepared retriever.
    pub fn compile(
        &self,
        document: Value,
        retriever: ReferenceRetriever,
    ) -> Result<JsonSchema, SchemaParseError> {
        let validator = jsonschema::options()
            .with_draft(self.draft)
            .with_retriever(retriever)
            .build(&document)
            .map_err(|e| SchemaParseError::JsonSchema(e.to_string()))?;

        let id = document
            .get("$id")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(JsonSchema {
            validator,
            document,
            id,
        })
    }
}

impl Default for JsonSchemaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaParser for JsonSchemaParser {
    type Schema = JsonSchema;
    type Payload = JsonPayload;

    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::Json
    }

    fn parse_schema(
        &self,
        raw_schema: &[u8],
        resolved_references: &IndexMap<String, Arc<ParsedSchema<JsonSchema>>>,
    ) -> Result<JsonSchema, SchemaParseError> {
        let text = std::str::from_utf8(raw_schema)?;
        let document: Value = serde_json::from_str(text)?;

        let documents = flatten_json_references(resolved_references);
        log::trace!("compiling JSON Schema with {} referenced documents", documents.len());

        self.compile(document, ReferenceRetriever::new(documents))
    }
}
