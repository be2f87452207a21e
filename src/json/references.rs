//! `$ref` resolution against resolved schema references.

use indexmap::IndexMap;
use jsonschema::{Retrieve, Uri};
use serde_json::Value;
use std::sync::Arc;

use super::parser::JsonSchema;
use crate::schema::{flatten_references, ParsedSchema};

/// Base URI the engine resolves relative `$ref`s against when the root
/// schema declares no `$id`.
pub const DEFAULT_BASE_URI: &str = "json-schema:///";

/// Flattens resolved JSON references into `identifier -> schema text`.
///
/// A dependency is identified by its own `$id`, or by the reference name its
/// parent used when it declares none. Duplicate identifiers keep the last
/// visited text.
pub fn flatten_json_references(
    references: &IndexMap<String, Arc<ParsedSchema<JsonSchema>>>,
) -> IndexMap<String, String> {
    flatten_references(
        references,
        &|name, schema: &ParsedSchema<JsonSchema>| {
            schema
                .schema()
                .id()
                .map(str::to_string)
                .unwrap_or_else(|| name.to_string())
        },
        &|schema| schema.raw_text().into_owned(),
    )
}

/// Serves `$ref` lookups from a flat symbol table.
///
/// Documents are parsed on retrieval, so malformed dependency text surfaces
/// as a schema build error.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRetriever {
    documents: IndexMap<String, String>,
}

impl ReferenceRetriever {
    /// Creates a retriever over `identifier -> schema text`.
    pub fn new(documents: IndexMap<String, String>) -> Self {
        Self { documents }
    }

    /// Looks up a document by URI, also trying it relative to [`DEFAULT_BASE_URI`].
    pub fn lookup(&self, uri: &str) -> Option<&str> {
        let uri = uri.trim_end_matches('#');
        self.documents
            .get(uri)
            .or_else(|| {
                uri.strip_prefix(DEFAULT_BASE_URI)
                    .and_then(|relative| self.documents.get(relative))
            })
            .map(String::as_str)
    }

    /// Returns true if no documents are available.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Retrieve for ReferenceRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri = uri.as_str();
        log::trace!("retrieving referenced schema {}", uri);
        let text = self
            .lookup(uri)
            .ok_or_else(|| format!("schema '{}' is not among the resolved references", uri))?;
        Ok(serde_json::from_str(text)?)
    }
}
