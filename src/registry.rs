//! In-memory artifact registry.
//!
//! This module provides the [`ArtifactRegistry`] type that stores raw schema
//! artifacts by coordinates, together with the named references each artifact
//! declares on other artifacts.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::artifact::{ArtifactReference, ArtifactType};

/// A raw schema artifact as stored in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    artifact_type: ArtifactType,
    content: Arc<[u8]>,
    references: Vec<ArtifactReferenceEntry>,
}

/// A named reference from one artifact to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReferenceEntry {
    /// The name the referencing schema uses, e.g. an import path or `$ref` URI.
    pub name: String,
    /// Coordinates of the referenced artifact.
    pub reference: ArtifactReference,
}

impl Artifact {
    /// Creates an artifact without references.
    pub fn new(artifact_type: ArtifactType, content: impl Into<Vec<u8>>) -> Self {
        Self {
            artifact_type,
            content: Arc::from(content.into()),
            references: Vec::new(),
        }
    }

    /// Creates a JSON Schema artifact.
    pub fn json(content: impl Into<Vec<u8>>) -> Self {
        Self::new(ArtifactType::Json, content)
    }

    /// Creates a Protobuf artifact.
    pub fn protobuf(content: impl Into<Vec<u8>>) -> Self {
        Self::new(ArtifactType::Protobuf, content)
    }

    /// Adds a named reference and returns self for chaining.
    pub fn with_reference(mut self, name: impl Into<String>, reference: ArtifactReference) -> Self {
        self.references.push(ArtifactReferenceEntry {
            name: name.into(),
            reference,
        });
        self
    }

    /// Returns the artifact type.
    pub fn artifact_type(&self) -> ArtifactType {
        self.artifact_type
    }

    /// Returns the raw content.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the shared raw content.
    pub fn shared_content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }

    /// Returns the declared references in order.
    pub fn references(&self) -> &[ArtifactReferenceEntry] {
        &self.references
    }
}

#[derive(Default)]
struct Store {
    // "group:artifact" -> version -> artifact, in registration order
    versions: HashMap<String, IndexMap<String, Arc<Artifact>>>,
    global_ids: HashMap<i64, (String, String)>,
    next_global_id: i64,
}

/// A thread-safe registry of schema artifacts.
///
/// # Thread Safety
///
/// The registry uses `Arc<RwLock<...>>` for thread-safe access:
/// - Multiple threads can resolve concurrently (read-only access)
/// - Registration operations are serialized (write access)
///
/// Clones share the same underlying store.
///
/// # Example
///
/// ```rust
/// use schemaguard::{Artifact, ArtifactReference, ArtifactRegistry};
///
/// let registry = ArtifactRegistry::new();
/// let stored = registry
///     .register(ArtifactReference::new("orders"), Artifact::json(r#"{"type": "object"}"#))
///     .unwrap();
///
/// assert_eq!(stored.version.as_deref(), Some("1"));
/// assert!(registry.get(&ArtifactReference::new("orders")).is_some());
/// ```
#[derive(Clone, Default)]
pub struct ArtifactRegistry {
    store: Arc<RwLock<Store>>,
}

impl ArtifactRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an artifact under the given coordinates.
    ///
    /// Without a version the next free numeric version is assigned. The
    /// returned reference carries the stored version and a fresh global id.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateArtifact` if the version is taken.
    pub fn register(
        &self,
        reference: ArtifactReference,
        artifact: Artifact,
    ) -> Result<ArtifactReference, RegistryError> {
        let coordinates = coordinates(&reference);
        let mut store = self.store.write();

        let versions = store.versions.entry(coordinates.clone()).or_default();
        let version = match &reference.version {
            Some(version) if versions.contains_key(version) => {
                return Err(RegistryError::DuplicateArtifact(format!(
                    "{}:{}",
                    coordinates, version
                )));
            }
            Some(version) => version.clone(),
            None => {
                let mut next = versions.len() + 1;
                while versions.contains_key(&next.to_string()) {
                    next += 1;
                }
                next.to_string()
            }
        };
        versions.insert(version.clone(), Arc::new(artifact));

        store.next_global_id += 1;
        let global_id = store.next_global_id;
        store
            .global_ids
            .insert(global_id, (coordinates, version.clone()));

        log::debug!("registered artifact {} version {}", reference, version);

        Ok(ArtifactReference {
            version: Some(version),
            global_id: Some(global_id),
            ..reference
        })
    }

    /// Retrieves an artifact.
    ///
    /// A global id takes precedence over coordinates; a missing version
    /// selects the most recently registered one.
    pub fn get(&self, reference: &ArtifactReference) -> Option<Arc<Artifact>> {
        let store = self.store.read();
        let (coordinates, version) = match reference.global_id {
            Some(global_id) => {
                let (coordinates, version) = store.global_ids.get(&global_id)?;
                (coordinates.clone(), Some(version.as_str()))
            }
            None => (coordinates(reference), reference.version.as_deref()),
        };

        let versions = store.versions.get(&coordinates)?;
        match version {
            Some(version) => versions.get(version).cloned(),
            None => versions.last().map(|(_, artifact)| Arc::clone(artifact)),
        }
    }

    /// Retrieves an artifact, failing if it is not registered.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::ArtifactNotFound` if nothing matches.
    pub fn fetch(&self, reference: &ArtifactReference) -> Result<Arc<Artifact>, RegistryError> {
        self.get(reference)
            .ok_or_else(|| RegistryError::ArtifactNotFound(reference.to_string()))
    }

    /// Returns the number of stored artifact versions.
    pub fn len(&self) -> usize {
        self.store.read().versions.values().map(IndexMap::len).sum()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lists references whose targets are not registered.
    ///
    /// Call after all artifacts are registered to check reference integrity.
    pub fn unresolved_references(&self) -> Vec<String> {
        let mut all_refs = Vec::new();
        {
            let store = self.store.read();
            for versions in store.versions.values() {
                for artifact in versions.values() {
                    all_refs.extend(artifact.references.iter().map(|r| r.reference.clone()));
                }
            }
        }

        let mut unresolved: Vec<String> = all_refs
            .into_iter()
            .filter(|reference| self.get(reference).is_none())
            .map(|reference| reference.to_string())
            .collect();
        unresolved.sort();
        unresolved.dedup();
        unresolved
    }
}

fn coordinates(reference: &ArtifactReference) -> String {
    format!("{}:{}", reference.group_or_default(), reference.artifact_id)
}

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Attempted to register a version that already exists.
    #[error("artifact '{0}' already registered")]
    DuplicateArtifact(String),

    /// Attempted to fetch an artifact that doesn't exist.
    #[error("artifact '{0}' not found")]
    ArtifactNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_versions_and_global_ids() {
        let registry = ArtifactRegistry::new();
        let first = registry
            .register(ArtifactReference::new("a"), Artifact::json("{}"))
            .unwrap();
        let second = registry
            .register(ArtifactReference::new("a"), Artifact::json("{\"type\":\"string\"}"))
            .unwrap();

        assert_eq!(first.version.as_deref(), Some("1"));
        assert_eq!(second.version.as_deref(), Some("2"));
        assert_ne!(first.global_id, second.global_id);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_latest_version_is_default() {
        let registry = ArtifactRegistry::new();
        registry
            .register(ArtifactReference::new("a"), Artifact::json("{}"))
            .unwrap();
        registry
            .register(ArtifactReference::new("a"), Artifact::json("true"))
            .unwrap();

        let latest = registry.get(&ArtifactReference::new("a")).unwrap();
        assert_eq!(latest.content(), b"true");

        let first = registry
            .get(&ArtifactReference::new("a").with_version("1"))
            .unwrap();
        assert_eq!(first.content(), b"{}");
    }

    #[test]
    fn test_lookup_by_global_id() {
        let registry = ArtifactRegistry::new();
        let stored = registry
            .register(
                ArtifactReference::new("a").with_group_id("g"),
                Artifact::protobuf("syntax = \"proto3\";"),
            )
            .unwrap();

        let by_id = ArtifactReference::new("ignored").with_global_id(stored.global_id.unwrap());
        let artifact = registry.get(&by_id).unwrap();
        assert_eq!(artifact.artifact_type(), ArtifactType::Protobuf);
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let registry = ArtifactRegistry::new();
        let reference = ArtifactReference::new("a").with_version("1.0");
        registry
            .register(reference.clone(), Artifact::json("{}"))
            .unwrap();

        let result = registry.register(reference, Artifact::json("{}"));
        assert!(matches!(result, Err(RegistryError::DuplicateArtifact(_))));
    }

    #[test]
    fn test_fetch_missing() {
        let registry = ArtifactRegistry::new();
        let result = registry.fetch(&ArtifactReference::new("nope"));
        assert!(matches!(result, Err(RegistryError::ArtifactNotFound(_))));
    }

    #[test]
    fn test_unresolved_references() {
        let registry = ArtifactRegistry::new();
        registry
            .register(
                ArtifactReference::new("root"),
                Artifact::json("{}").with_reference("dep.json", ArtifactReference::new("dep")),
            )
            .unwrap();

        assert_eq!(registry.unresolved_references(), vec!["default:dep"]);

        registry
            .register(ArtifactReference::new("dep"), Artifact::json("{}"))
            .unwrap();
        assert!(registry.unresolved_references().is_empty());
    }

    #[test]
    fn test_clones_share_store() {
        let registry = ArtifactRegistry::new();
        let clone = registry.clone();
        clone
            .register(ArtifactReference::new("a"), Artifact::json("{}"))
            .unwrap();
        assert!(!registry.is_empty());
    }
}
