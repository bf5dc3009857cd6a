use async_trait::async_trait;
use semver::Version;
use serde_json::Value;
use tracing::warn;

use super::support::{layer_metadata_mut, layers_mut, next_project, LayerType};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

/// WMS layers accept several equivalent server URLs.
pub struct FromV120ToV130 {
    target: Version,
}

impl FromV120ToV130 {
    pub fn new() -> Self {
        Self {
            target: Version::new(1, 3, 0),
        }
    }
}

impl Default for FromV120ToV130 {
    fn default() -> Self {
        Self::new()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl MigrationStep for FromV120ToV130 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        _settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        for layer in layers_mut(&mut manifest) {
            if LayerType::of(layer) != Some(LayerType::Wms) {
                continue;
            }
            let metadata = layer_metadata_mut(layer, &self.target)?;
            let url = metadata.remove("remoteUrl");
            let urls = metadata
                .entry("remoteUrls")
                .or_insert_with(|| Value::Array(Vec::new()))
                .as_array_mut()
                .ok_or_else(|| MigrationError::Shape {
                    step: self.target.clone(),
                    path: "layers[].metadata.remoteUrls".into(),
                    reason: "expected an array".into(),
                })?;
            match url {
                Some(url @ Value::String(_)) if !urls.contains(&url) => urls.insert(0, url),
                Some(Value::String(_)) | Some(Value::Null) | None => {}
                Some(other) => {
                    warn!(
                        target: "abc_migrate",
                        event = "remote_url_dropped",
                        step = %self.target,
                        kind = value_kind(&other)
                    );
                }
            }
        }

        next_project(manifest, project.files(), &self.target)
    }
}
