use async_trait::async_trait;
use semver::Version;
use serde::Serialize;
use serde_json::Value;

use super::support::{container_list_mut, next_project, serialize};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SharedViewLayerV090 {
    layer_id: String,
    visible: bool,
}

/// Shared views reference layers as `{ layerId, visible }` instead of bare
/// identifiers.
pub struct FromV080ToV090 {
    target: Version,
}

impl FromV080ToV090 {
    pub fn new() -> Self {
        Self {
            target: Version::new(0, 9, 0),
        }
    }

    fn convert_layers(&self, view: &mut Value) -> Result<(), MigrationError> {
        let Some(layers) = view.get_mut("layers") else {
            return Ok(());
        };
        let Some(entries) = layers.as_array_mut() else {
            return Err(MigrationError::Shape {
                step: self.target.clone(),
                path: "sharedViews.list[].layers".into(),
                reason: "expected an array".into(),
            });
        };
        for entry in entries.iter_mut() {
            if let Value::String(layer_id) = entry {
                let next = SharedViewLayerV090 {
                    layer_id: std::mem::take(layer_id),
                    visible: true,
                };
                *entry = serialize(&next, "sharedViews.list[].layers[]", &self.target)?;
            }
        }
        Ok(())
    }
}

impl Default for FromV080ToV090 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationStep for FromV080ToV090 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        _settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        if let Some(views) = container_list_mut(&mut manifest, "sharedViews", &self.target)? {
            for view in views.iter_mut() {
                self.convert_layers(view)?;
            }
        }
        next_project(manifest, project.files(), &self.target)
    }
}
