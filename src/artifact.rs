//! Artifact coordinates and records.
//!
//! An [`ArtifactReference`] identifies a schema in a registry. A [`Record`]
//! pairs a payload with the [`Metadata`] naming the schema it must satisfy.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Group used when an artifact reference does not name one.
pub const DEFAULT_GROUP: &str = "default";

/// The kind of schema an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactType {
    /// A JSON Schema document.
    Json,
    /// A textual `.proto` definition.
    Protobuf,
}

impl Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactType::Json => write!(f, "JSON"),
            ArtifactType::Protobuf => write!(f, "PROTOBUF"),
        }
    }
}

/// Coordinates of a schema artifact in a registry.
///
/// Only `artifact_id` is mandatory. An absent group means [`DEFAULT_GROUP`]
/// and an absent version means the latest version.
///
/// # Example
///
/// ```rust
/// use schemaguard::ArtifactReference;
///
/// let reference = ArtifactReference::new("orders")
///     .with_group_id("shop")
///     .with_version("2");
///
/// assert_eq!(reference.to_string(), "shop:orders:2");
/// assert_eq!("shop:orders:2".parse::<ArtifactReference>().unwrap(), reference);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReference {
    /// Group the artifact belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Identifier of the artifact within its group.
    pub artifact_id: String,
    /// Version of the artifact; `None` selects the latest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Registry-wide identifier of a specific version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<i64>,
    /// Identifier of the artifact content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<i64>,
}

impl ArtifactReference {
    /// Creates a reference to the latest version of an artifact in the default group.
    pub fn new(artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: None,
            artifact_id: artifact_id.into(),
            version: None,
            global_id: None,
            content_id: None,
        }
    }

    /// Sets the group and returns self for chaining.
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Sets the version and returns self for chaining.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the global id and returns self for chaining.
    pub fn with_global_id(mut self, global_id: i64) -> Self {
        self.global_id = Some(global_id);
        self
    }

    /// Sets the content id and returns self for chaining.
    pub fn with_content_id(mut self, content_id: i64) -> Self {
        self.content_id = Some(content_id);
        self
    }

    /// Returns the group, falling back to [`DEFAULT_GROUP`].
    pub fn group_or_default(&self) -> &str {
        self.group_id.as_deref().unwrap_or(DEFAULT_GROUP)
    }

    /// Returns the key used to store and cache this artifact.
    ///
    /// Global ids identify a version on their own and take precedence over
    /// the `group:artifact:version` coordinates.
    pub fn key(&self) -> String {
        match self.global_id {
            Some(global_id) => format!("globalId:{}", global_id),
            None => format!(
                "{}:{}:{}",
                self.group_or_default(),
                self.artifact_id,
                self.version.as_deref().unwrap_or("latest")
            ),
        }
    }
}

impl Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_or_default(), self.artifact_id)?;
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        if let Some(global_id) = self.global_id {
            write!(f, " (globalId {})", global_id)?;
        }
        Ok(())
    }
}

/// Error returned when parsing an [`ArtifactReference`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid artifact reference '{0}': expected [group:]artifact[:version]")]
pub struct ParseReferenceError(String);

impl FromStr for ArtifactReference {
    type Err = ParseReferenceError;

    /// Parses `artifact`, `group:artifact` or `group:artifact:version`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(ParseReferenceError(s.to_string()));
        }
        match parts.as_slice() {
            [artifact] => Ok(ArtifactReference::new(*artifact)),
            [group, artifact] => Ok(ArtifactReference::new(*artifact).with_group_id(*group)),
            [group, artifact, version] => Ok(ArtifactReference::new(*artifact)
                .with_group_id(*group)
                .with_version(*version)),
            _ => Err(ParseReferenceError(s.to_string())),
        }
    }
}

/// Metadata attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    artifact_reference: ArtifactReference,
}

impl Metadata {
    /// Creates metadata pointing at the given artifact.
    pub fn new(artifact_reference: ArtifactReference) -> Self {
        Self { artifact_reference }
    }

    /// Returns the artifact the record must be validated against.
    pub fn artifact_reference(&self) -> &ArtifactReference {
        &self.artifact_reference
    }
}

/// A payload plus the metadata identifying its schema.
///
/// Records are ephemeral: one per validation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<P> {
    payload: P,
    metadata: Option<Metadata>,
}

impl<P> Record<P> {
    /// Creates a record for a payload validated against the given artifact.
    pub fn new(payload: P, metadata: Metadata) -> Self {
        Self {
            payload,
            metadata: Some(metadata),
        }
    }

    /// Creates a record without metadata.
    ///
    /// Such records can only be resolved by parsers able to extract a schema
    /// from the payload itself.
    pub fn without_metadata(payload: P) -> Self {
        Self {
            payload,
            metadata: None,
        }
    }

    /// Returns the payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Returns the metadata, if any.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Returns the artifact reference carried by the metadata, if any.
    pub fn artifact_reference(&self) -> Option<&ArtifactReference> {
        self.metadata.as_ref().map(Metadata::artifact_reference)
    }

    /// Consumes the record, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }
}
