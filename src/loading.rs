//! Artifact loading from a directory.
//!
//! Loads `*.json` and `*.proto` files into an [`ArtifactRegistry`]:
//! - each file is registered with its file name as artifact id
//! - `import` statements and relative `$ref` file references become
//!   artifact references, so dependent schemas resolve through the registry
//! - failures are accumulated; every loadable file is still registered
//!
//! Filesystem access goes through the [`FileSystem`] trait so loading can be
//! tested without touching disk.

use prost_reflect::DescriptorPool;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::artifact::{ArtifactReference, ArtifactType};
use crate::parser::SchemaParseError;
use crate::protobuf::parse_proto;
use crate::registry::{Artifact, ArtifactRegistry, RegistryError};

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// The error type for filesystem operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reads the contents of a file as a string.
    fn read_file(&self, path: &Path) -> Result<String, Self::Error>;

    /// Lists all entries in a directory.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, Self::Error>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    type Error = std::io::Error;

    fn read_file(&self, path: &Path) -> Result<String, Self::Error> {
        std::fs::read_to_string(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, Self::Error> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }
}

/// Errors that can occur while loading artifacts.
#[derive(Debug, thiserror::Error)]
pub enum SchemaLoadError {
    /// IO error reading a file or directory
    #[error("IO error reading {0}: {1}")]
    Io(PathBuf, Box<dyn std::error::Error + Send + Sync>),

    /// The file is not valid JSON
    #[error("Parse error in {0}: {1}")]
    Json(PathBuf, serde_json::Error),

    /// The file is not valid `.proto` syntax
    #[error("Parse error in {0}: {1}")]
    Proto(PathBuf, SchemaParseError),

    /// The file name is not valid UTF-8
    #[error("Invalid filename: {0}")]
    InvalidFileName(PathBuf),

    /// The registry rejected the artifact
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Multiple errors occurred
    #[error("Multiple errors: {0:?}")]
    Multiple(Vec<SchemaLoadError>),
}

impl ArtifactRegistry {
    /// Loads every `.json` and `.proto` file in a directory.
    ///
    /// Files are registered in name order under the default group. Other
    /// entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SchemaLoadError::Io` if the directory cannot be listed, or
    /// `SchemaLoadError::Multiple` holding every per-file failure.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use schemaguard::ArtifactRegistry;
    /// use schemaguard::loading::StdFileSystem;
    ///
    /// let registry = ArtifactRegistry::new();
    /// registry.load_dir("./schemas", &StdFileSystem)?;
    /// # Ok::<(), schemaguard::loading::SchemaLoadError>(())
    /// ```
    pub fn load_dir<Fs: FileSystem>(
        &self,
        path: impl AsRef<Path>,
        fs: &Fs,
    ) -> Result<Vec<ArtifactReference>, SchemaLoadError> {
        let path = path.as_ref();
        let mut files = fs
            .read_dir(path)
            .map_err(|e| SchemaLoadError::Io(path.to_path_buf(), Box::new(e)))?;
        files.sort();

        let mut loaded = Vec::new();
        let mut errors = Vec::new();

        for file in files {
            let artifact_type = match file.extension().and_then(|s| s.to_str()) {
                Some("json") => ArtifactType::Json,
                Some("proto") => ArtifactType::Protobuf,
                _ => continue,
            };
            match self.load_artifact_file(&file, artifact_type, fs) {
                Ok(reference) => loaded.push(reference),
                Err(e) => {
                    log::warn!("skipping {}: {}", file.display(), e);
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            log::debug!("loaded {} artifacts from {}", loaded.len(), path.display());
            Ok(loaded)
        } else {
            Err(SchemaLoadError::Multiple(errors))
        }
    }

    fn load_artifact_file<Fs: FileSystem>(
        &self,
        path: &Path,
        artifact_type: ArtifactType,
        fs: &Fs,
    ) -> Result<ArtifactReference, SchemaLoadError> {
        let content = fs
            .read_file(path)
            .map_err(|e| SchemaLoadError::Io(path.to_path_buf(), Box::new(e)))?;

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SchemaLoadError::InvalidFileName(path.to_path_buf()))?;

        let dependencies: Vec<String> = match artifact_type {
            ArtifactType::Json => {
                let json: Value = serde_json::from_str(&content)
                    .map_err(|e| SchemaLoadError::Json(path.to_path_buf(), e))?;
                let mut refs = BTreeSet::new();
                collect_file_refs(&json, &mut refs);
                refs.into_iter().collect()
            }
            // Well-known imports are linked from the global pool, not the registry.
            ArtifactType::Protobuf => parse_proto(name, &content)
                .map_err(|e| SchemaLoadError::Proto(path.to_path_buf(), e))?
                .dependency
                .into_iter()
                .filter(|d| DescriptorPool::global().get_file_by_name(d).is_none())
                .collect(),
        };

        let artifact = dependencies.into_iter().fold(
            Artifact::new(artifact_type, content.into_bytes()),
            |artifact, dependency| {
                let reference = ArtifactReference::new(dependency.clone());
                artifact.with_reference(dependency, reference)
            },
        );

        Ok(self.register(ArtifactReference::new(name), artifact)?)
    }
}

// Collects the file part of every `$ref` that points at another document.
fn collect_file_refs(value: &Value, refs: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", Value::String(target)) => {
                        if let Some(file) = file_ref(target) {
                            refs.insert(file.to_string());
                        }
                    }
                    _ => collect_file_refs(child, refs),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_file_refs(item, refs);
            }
        }
        _ => {}
    }
}

fn file_ref(target: &str) -> Option<&str> {
    let file = target.split('#').next().unwrap_or_default();
    if file.is_empty() || file.contains("://") || file.starts_with("urn:") {
        None
    } else {
        Some(file)
    }
}
