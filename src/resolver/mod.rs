//! Schema resolution.
//!
//! A [`SchemaResolver`] turns artifact coordinates (or a record carrying
//! them) into a fully resolved [`ParsedSchema`]. The bundled
//! [`DefaultSchemaResolver`] fetches raw artifacts from an
//! [`ArtifactRegistry`], follows their references and parses them bottom-up.

mod context;

pub use context::ResolutionContext;

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use crate::artifact::{ArtifactReference, ArtifactType, Record};
use crate::config::ResolverConfig;
use crate::parser::{SchemaParseError, SchemaParser};
use crate::registry::ArtifactRegistry;
use crate::schema::{ParsedSchema, RawSchema};

/// Resolves schemas for validators.
///
/// `S` is the engine handle and `P` the payload type of the records.
pub trait SchemaResolver<S, P>: Send + Sync {
    /// Resolves the schema stored under the given coordinates.
    fn resolve_schema_by_artifact_reference(
        &self,
        reference: &ArtifactReference,
    ) -> Result<Arc<ParsedSchema<S>>, ResolveError>;

    /// Resolves the schema named by a record's metadata.
    fn resolve_schema(&self, record: &Record<P>) -> Result<Arc<ParsedSchema<S>>, ResolveError>;
}

impl<S, P, R: SchemaResolver<S, P> + ?Sized> SchemaResolver<S, P> for Arc<R> {
    fn resolve_schema_by_artifact_reference(
        &self,
        reference: &ArtifactReference,
    ) -> Result<Arc<ParsedSchema<S>>, ResolveError> {
        (**self).resolve_schema_by_artifact_reference(reference)
    }

    fn resolve_schema(&self, record: &Record<P>) -> Result<Arc<ParsedSchema<S>>, ResolveError> {
        (**self).resolve_schema(record)
    }
}

/// Errors that can occur while resolving a schema.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No artifact is stored under the requested coordinates.
    #[error("artifact {0} not found")]
    NotFound(String),

    /// The record has no artifact reference and the schema cannot be
    /// derived from its payload.
    #[error("record has no artifact reference and {0} schemas cannot be extracted from data")]
    MissingReference(ArtifactType),

    /// An artifact references itself, directly or transitively.
    #[error("circular reference: {}", .0.join(" -> "))]
    CircularReference(Vec<String>),

    /// A reference chain is longer than the configured limit.
    #[error("maximum reference depth {0} exceeded")]
    MaxDepthExceeded(usize),

    /// An artifact holds a different kind of schema than the parser expects.
    #[error("artifact {reference} holds a {actual} schema, expected {expected}")]
    TypeMismatch {
        /// The offending artifact.
        reference: String,
        /// The parser's artifact type.
        expected: ArtifactType,
        /// The stored artifact type.
        actual: ArtifactType,
    },

    /// A schema could not be parsed.
    #[error("failed to parse schema {reference}")]
    Parse {
        /// The schema that failed.
        reference: String,
        /// The parser error.
        #[source]
        source: SchemaParseError,
    },

    /// The registry backend failed.
    #[error("registry request failed")]
    Registry(#[source] Box<dyn Error + Send + Sync>),
}

/// An RFC 7807 problem report returned by a registry backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{title} ({status}): {detail}")]
pub struct ProblemDetails {
    /// Short summary of the problem type.
    pub title: String,
    /// Explanation specific to this occurrence.
    pub detail: String,
    /// HTTP status code.
    pub status: u16,
}

impl ProblemDetails {
    /// Creates a problem report.
    pub fn new(title: impl Into<String>, detail: impl Into<String>, status: u16) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
            status,
        }
    }
}

/// Returns the most specific message in an error chain.
///
/// The `detail` of the first [`ProblemDetails`] found in the chain wins;
/// otherwise the message of the innermost cause is returned.
pub fn innermost_message(error: &(dyn Error + 'static)) -> String {
    let mut current = error;
    loop {
        if let Some(problem) = current.downcast_ref::<ProblemDetails>() {
            return problem.detail.clone();
        }
        match current.source() {
            Some(source) => current = source,
            None => return current.to_string(),
        }
    }
}

/// Resolves schemas from an [`ArtifactRegistry`].
///
/// Resolution happens in two phases. The raw artifact tree is fetched first,
/// rejecting circular references and chains longer than
/// `max-reference-depth`. The tree is then parsed bottom-up so that every
/// dependency is available to the schema that references it. Parsed schemas
/// are cached by artifact coordinates unless `cache-enabled` is false.
///
/// # Example
///
/// ```rust
/// use schemaguard::{Artifact, ArtifactReference, ArtifactRegistry, DefaultSchemaResolver, SchemaResolver};
/// use schemaguard::json::JsonSchemaParser;
///
/// let registry = ArtifactRegistry::new();
/// registry
///     .register(ArtifactReference::new("greeting"), Artifact::json(r#"{"type": "string"}"#))
///     .unwrap();
///
/// let resolver = DefaultSchemaResolver::new(registry, JsonSchemaParser::new());
/// let schema = resolver
///     .resolve_schema_by_artifact_reference(&ArtifactReference::new("greeting"))
///     .unwrap();
/// assert!(!schema.has_references());
/// ```
pub struct DefaultSchemaResolver<P: SchemaParser> {
    registry: ArtifactRegistry,
    parser: P,
    config: ResolverConfig,
    cache: RwLock<HashMap<String, Arc<ParsedSchema<P::Schema>>>>,
}

impl<P: SchemaParser> DefaultSchemaResolver<P> {
    /// Creates a resolver with the default configuration.
    pub fn new(registry: ArtifactRegistry, parser: P) -> Self {
        Self::with_config(registry, parser, ResolverConfig::default())
    }

    /// Creates a resolver with the given configuration.
    pub fn with_config(registry: ArtifactRegistry, parser: P, config: ResolverConfig) -> Self {
        Self {
            registry,
            parser,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the parser.
    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Drops every cached schema.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Fetches the raw artifact tree rooted at `reference`.
    pub fn fetch_raw_schema(&self, reference: &ArtifactReference) -> Result<RawSchema, ResolveError> {
        let context = ResolutionContext::new(self.config.max_reference_depth());
        self.fetch_raw(reference, &context)
    }

    fn fetch_raw(
        &self,
        reference: &ArtifactReference,
        context: &ResolutionContext,
    ) -> Result<RawSchema, ResolveError> {
        let context = context.enter(&reference.key())?;
        log::trace!("fetching {} at depth {}", reference, context.depth());

        let artifact = self
            .registry
            .get(reference)
            .ok_or_else(|| ResolveError::NotFound(reference.to_string()))?;

        let expected = self.parser.artifact_type();
        if artifact.artifact_type() != expected {
            return Err(ResolveError::TypeMismatch {
                reference: reference.to_string(),
                expected,
                actual: artifact.artifact_type(),
            });
        }

        let mut raw = RawSchema::new(artifact.content()).with_name(reference.artifact_id.clone());
        for entry in artifact.references() {
            let dependency = self.fetch_raw(&entry.reference, &context)?;
            raw = raw.with_reference(entry.name.clone(), dependency);
        }
        Ok(raw)
    }

    fn parse_raw(
        &self,
        raw: &RawSchema,
        reference_name: Option<&str>,
    ) -> Result<ParsedSchema<P::Schema>, ResolveError> {
        let mut resolved = IndexMap::new();
        for dependency in raw.references() {
            let parsed = self.parse_raw(&dependency.schema, Some(&dependency.name))?;
            resolved.insert(dependency.name.clone(), Arc::new(parsed));
        }

        let label = reference_name.or(raw.name()).unwrap_or("<anonymous>");
        let schema = self
            .parser
            .parse_schema(raw.content(), &resolved)
            .map_err(|source| ResolveError::Parse {
                reference: label.to_string(),
                source,
            })?;

        let mut parsed = ParsedSchema::new(schema, raw.content())
            .with_references(resolved.into_values().collect());
        if let Some(name) = reference_name {
            parsed = parsed.with_reference_name(name);
        }
        Ok(parsed)
    }
}

impl<P: SchemaParser> SchemaResolver<P::Schema, P::Payload> for DefaultSchemaResolver<P> {
    fn resolve_schema_by_artifact_reference(
        &self,
        reference: &ArtifactReference,
    ) -> Result<Arc<ParsedSchema<P::Schema>>, ResolveError> {
        let key = reference.key();
        let cache_enabled = self.config.cache_enabled();
        if cache_enabled {
            if let Some(schema) = self.cache.read().get(&key) {
                log::trace!("schema cache hit for {}", key);
                return Ok(Arc::clone(schema));
            }
        }

        log::debug!("resolving {} schema {}", self.parser.artifact_type(), reference);
        let raw = self.fetch_raw_schema(reference)?;
        let parsed = Arc::new(self.parse_raw(&raw, None)?);

        if cache_enabled {
            self.cache.write().insert(key, Arc::clone(&parsed));
        }
        Ok(parsed)
    }

    fn resolve_schema(
        &self,
        record: &Record<P::Payload>,
    ) -> Result<Arc<ParsedSchema<P::Schema>>, ResolveError> {
        if let Some(reference) = record.artifact_reference() {
            return self.resolve_schema_by_artifact_reference(reference);
        }

        if !self.parser.supports_extract_schema_from_data() {
            return Err(ResolveError::MissingReference(self.parser.artifact_type()));
        }

        log::debug!("extracting {} schema from record data", self.parser.artifact_type());
        self.parser
            .schema_from_data(record)
            .map(Arc::new)
            .map_err(|source| ResolveError::Parse {
                reference: "<record data>".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Artifact;

    #[test]
    fn test_innermost_message_prefers_problem_details() {
        let problem = ProblemDetails::new("Not Found", "No artifact with ID 'orders'", 404);
        let error = ResolveError::Registry(Box::new(problem));
        assert_eq!(innermost_message(&error), "No artifact with ID 'orders'");
    }

    #[test]
    fn test_innermost_message_walks_sources() {
        let error = ResolveError::Parse {
            reference: "x".into(),
            source: SchemaParseError::JsonSchema("bad keyword".into()),
        };
        assert_eq!(innermost_message(&error), "invalid JSON Schema: bad keyword");
    }

    #[test]
    fn test_innermost_message_without_source() {
        let error = ResolveError::NotFound("default:x".into());
        assert_eq!(innermost_message(&error), "artifact default:x not found");
    }

    struct EchoParser;

    impl SchemaParser for EchoParser {
        type Schema = String;
        type Payload = ();

        fn artifact_type(&self) -> ArtifactType {
            ArtifactType::Json
        }

        fn parse_schema(
            &self,
            raw_schema: &[u8],
            resolved_references: &IndexMap<String, Arc<ParsedSchema<String>>>,
        ) -> Result<String, SchemaParseError> {
            let own = std::str::from_utf8(raw_schema)?;
            let deps: Vec<&str> = resolved_references
                .values()
                .map(|d| d.schema().as_str())
                .collect();
            Ok(format!("{}[{}]", own, deps.join(",")))
        }
    }

    #[test]
    fn test_dependencies_parse_before_dependents() {
        let registry = ArtifactRegistry::new();
        registry
            .register(ArtifactReference::new("leaf"), Artifact::json("leaf"))
            .unwrap();
        registry
            .register(
                ArtifactReference::new("root"),
                Artifact::json("root").with_reference("leaf.json", ArtifactReference::new("leaf")),
            )
            .unwrap();

        let resolver = DefaultSchemaResolver::new(registry, EchoParser);
        let parsed = resolver
            .resolve_schema_by_artifact_reference(&ArtifactReference::new("root"))
            .unwrap();

        assert_eq!(parsed.schema(), "root[leaf[]]");
        assert_eq!(parsed.references()[0].reference_name(), Some("leaf.json"));
    }

    #[test]
    fn test_cache_returns_same_schema() {
        let registry = ArtifactRegistry::new();
        registry
            .register(ArtifactReference::new("a"), Artifact::json("a"))
            .unwrap();
        let resolver = DefaultSchemaResolver::new(registry, EchoParser);

        let reference = ArtifactReference::new("a");
        let first = resolver.resolve_schema_by_artifact_reference(&reference).unwrap();
        let second = resolver.resolve_schema_by_artifact_reference(&reference).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_type_mismatch() {
        let registry = ArtifactRegistry::new();
        registry
            .register(ArtifactReference::new("p"), Artifact::protobuf("syntax = \"proto3\";"))
            .unwrap();
        let resolver = DefaultSchemaResolver::new(registry, EchoParser);

        let result = resolver.resolve_schema_by_artifact_reference(&ArtifactReference::new("p"));
        assert!(matches!(result, Err(ResolveError::TypeMismatch { .. })));
    }

    #[test]
    fn test_record_without_reference() {
        let resolver = DefaultSchemaResolver::new(ArtifactRegistry::new(), EchoParser);
        let result = resolver.resolve_schema(&Record::without_metadata(()));
        assert!(matches!(
            result,
            Err(ResolveError::MissingReference(ArtifactType::Json))
        ));
    }
}
