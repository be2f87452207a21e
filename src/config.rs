//! Resolver configuration.
//!
//! Configuration is an opaque, ordered map of option names to JSON values.
//! Validators pass it through untouched; the options below are the ones the
//! bundled [`DefaultSchemaResolver`](crate::DefaultSchemaResolver) understands.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::ArtifactReference;

/// Maximum nesting of schema references followed while resolving.
pub const MAX_REFERENCE_DEPTH: &str = "max-reference-depth";
/// Whether parsed schemas are cached by artifact coordinates.
pub const CACHE_ENABLED: &str = "cache-enabled";
/// Group of the statically configured artifact.
pub const ARTIFACT_GROUP_ID: &str = "artifact.group-id";
/// Identifier of the statically configured artifact.
pub const ARTIFACT_ID: &str = "artifact.artifact-id";
/// Version of the statically configured artifact.
pub const ARTIFACT_VERSION: &str = "artifact.version";

/// Default for [`MAX_REFERENCE_DEPTH`].
pub const DEFAULT_MAX_REFERENCE_DEPTH: usize = 100;

/// Opaque configuration for a schema resolver.
///
/// # Example
///
/// ```rust
/// use schemaguard::config::{self, ResolverConfig};
/// use serde_json::json;
///
/// let config = ResolverConfig::new()
///     .with(config::MAX_REFERENCE_DEPTH, json!(16))
///     .with(config::CACHE_ENABLED, json!(false));
///
/// assert_eq!(config.max_reference_depth(), 16);
/// assert!(!config.cache_enabled());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolverConfig {
    options: IndexMap<String, Value>,
}

impl ResolverConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option and returns self for chaining.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    /// Sets an option in place.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.options.insert(name.into(), value);
    }

    /// Returns the raw value of an option.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Returns an option as a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(Value::as_str)
    }

    /// Returns an option as an unsigned integer, accepting numeric strings.
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        match self.options.get(name)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns an option as a boolean, accepting `"true"`/`"false"` strings.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.options.get(name)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Iterates over all options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Maximum reference depth, defaulting to [`DEFAULT_MAX_REFERENCE_DEPTH`].
    pub fn max_reference_depth(&self) -> usize {
        self.get_u64(MAX_REFERENCE_DEPTH)
            .and_then(|d| usize::try_from(d).ok())
            .unwrap_or(DEFAULT_MAX_REFERENCE_DEPTH)
    }

    /// Whether parsed schemas are cached; enabled by default.
    pub fn cache_enabled(&self) -> bool {
        self.get_bool(CACHE_ENABLED).unwrap_or(true)
    }

    /// Reads a statically configured artifact reference, if one is present.
    pub fn artifact_reference(&self) -> Option<ArtifactReference> {
        let artifact_id = self.get_str(ARTIFACT_ID)?;
        let mut reference = ArtifactReference::new(artifact_id);
        if let Some(group_id) = self.get_str(ARTIFACT_GROUP_ID) {
            reference = reference.with_group_id(group_id);
        }
        if let Some(version) = self.get_str(ARTIFACT_VERSION) {
            reference = reference.with_version(version);
        }
        Some(reference)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ResolverConfig {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
