use std::collections::BTreeSet;
use std::sync::Arc;

use semver::Version;
use serde_json::Value;

use crate::migrations::MigrationError;

/// Opaque attachment carried next to the manifest.
///
/// Content is reference counted so that steps can hand the bundle from one
/// version to the next without copying attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    pub path: String,
    pub content: Arc<[u8]>,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// A manifest and its file bundle at a known schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationProject {
    manifest: Value,
    version: Version,
    files: Vec<ProjectFile>,
}

impl MigrationProject {
    /// Wraps a manifest, reading its schema version from `metadata.version`.
    pub fn new(manifest: Value, files: Vec<ProjectFile>) -> Result<Self, MigrationError> {
        let version = read_version(&manifest)?;
        Ok(Self {
            manifest,
            version,
            files,
        })
    }

    pub fn manifest(&self) -> &Value {
        &self.manifest
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn files(&self) -> &[ProjectFile] {
        &self.files
    }

    pub fn into_parts(self) -> (Value, Vec<ProjectFile>) {
        (self.manifest, self.files)
    }

    pub fn id(&self) -> Option<&str> {
        self.manifest
            .pointer("/metadata/id")
            .and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.manifest
            .pointer("/metadata/name")
            .and_then(Value::as_str)
    }

    pub(crate) fn file_paths(&self) -> BTreeSet<&str> {
        self.files.iter().map(|file| file.path.as_str()).collect()
    }
}

fn read_version(manifest: &Value) -> Result<Version, MigrationError> {
    let raw = manifest
        .pointer("/metadata/version")
        .ok_or_else(|| MigrationError::InvalidManifest("metadata.version is missing".into()))?;
    let raw = raw
        .as_str()
        .ok_or_else(|| MigrationError::InvalidManifest("metadata.version is not a string".into()))?;
    Version::parse(raw.trim()).map_err(|err| {
        MigrationError::InvalidManifest(format!("metadata.version {raw:?} is not a semantic version: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_version_from_metadata() {
        let project = MigrationProject::new(
            json!({ "metadata": { "id": "p1", "name": "Roads", "version": "0.6.0" } }),
            vec![ProjectFile::new("layer/a.json", b"{}".to_vec())],
        )
        .expect("valid manifest");
        assert_eq!(project.version(), &Version::new(0, 6, 0));
        assert_eq!(project.id(), Some("p1"));
        assert_eq!(project.name(), Some("Roads"));
        assert_eq!(project.files()[0].len(), 2);
    }

    #[test]
    fn missing_version_is_rejected() {
        let err = MigrationProject::new(json!({ "metadata": {} }), vec![]).unwrap_err();
        assert_eq!(err.code(), "MIGRATION/INVALID_MANIFEST");
    }

    #[test]
    fn non_semver_version_is_rejected() {
        let err =
            MigrationProject::new(json!({ "metadata": { "version": "1.2" } }), vec![]).unwrap_err();
        assert!(err.to_string().contains("not a semantic version"));
    }
}
