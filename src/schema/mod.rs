//! Raw and parsed schema representations.
//!
//! A [`RawSchema`] is schema text as fetched from a registry, together with
//! the raw schemas it references. A [`ParsedSchema`] is the engine-specific
//! handle built from it plus the parsed dependencies consumed while building.
//!
//! Both are owned trees: a dependency appearing under two parents is held
//! twice, and a tree can never contain a cycle.

mod flatten;

pub use flatten::flatten_references;

use std::borrow::Cow;
use std::sync::Arc;

/// Schema bytes as fetched, plus the raw schemas they reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSchema {
    content: Arc<[u8]>,
    name: Option<String>,
    references: Vec<RawSchemaReference>,
}

impl RawSchema {
    /// Creates a raw schema without references.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Arc::from(content.into()),
            name: None,
            references: Vec::new(),
        }
    }

    /// Sets the identity of this schema and returns self for chaining.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a named reference and returns self for chaining.
    pub fn with_reference(mut self, name: impl Into<String>, schema: RawSchema) -> Self {
        self.references.push(RawSchemaReference {
            name: name.into(),
            schema,
        });
        self
    }

    /// Returns the schema bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the schema identity, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the references in declaration order.
    pub fn references(&self) -> &[RawSchemaReference] {
        &self.references
    }
}

/// A named edge from a raw schema to one of its dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSchemaReference {
    /// The name the referencing schema uses for the dependency.
    pub name: String,
    /// The dependency itself.
    pub schema: RawSchema,
}

/// A fully resolved, engine-specific schema.
///
/// `S` is the engine handle: a compiled JSON Schema or a linked Protobuf
/// descriptor. `references` holds the dependencies consumed while building
/// `S`, each keyed by the reference name its parent used.
#[derive(Debug)]
pub struct ParsedSchema<S> {
    schema: S,
    raw_schema: Arc<[u8]>,
    reference_name: Option<String>,
    references: Vec<Arc<ParsedSchema<S>>>,
}

impl<S> ParsedSchema<S> {
    /// Creates a parsed schema with no references.
    pub fn new(schema: S, raw_schema: impl Into<Arc<[u8]>>) -> Self {
        Self {
            schema,
            raw_schema: raw_schema.into(),
            reference_name: None,
            references: Vec::new(),
        }
    }

    /// Sets the reference name and returns self for chaining.
    pub fn with_reference_name(mut self, name: impl Into<String>) -> Self {
        self.reference_name = Some(name.into());
        self
    }

    /// Sets the consumed dependencies and returns self for chaining.
    pub fn with_references(mut self, references: Vec<Arc<ParsedSchema<S>>>) -> Self {
        self.references = references;
        self
    }

    /// Returns the engine handle.
    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Returns the raw bytes this schema was built from.
    pub fn raw_schema(&self) -> &[u8] {
        &self.raw_schema
    }

    /// Returns the raw bytes as text, replacing invalid UTF-8.
    pub fn raw_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw_schema)
    }

    /// Returns the name the parent schema used for this one.
    pub fn reference_name(&self) -> Option<&str> {
        self.reference_name.as_deref()
    }

    /// Returns the dependencies consumed while building this schema.
    pub fn references(&self) -> &[Arc<ParsedSchema<S>>] {
        &self.references
    }

    /// Returns true if this schema consumed any dependency.
    pub fn has_references(&self) -> bool {
        !self.references.is_empty()
    }
}
