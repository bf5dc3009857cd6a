use async_trait::async_trait;
use semver::Version;
use serde_json::Value;

use super::support::{layer_metadata_mut, layers_mut, next_project, LayerType};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

const MODEL_RENAMES: &[(&str, &str)] = &[
    ("OSM", "OpenStreetMap"),
    ("STAMEN_TONER", "StamenToner"),
    ("STAMEN_TONER_LITE", "StamenTonerLite"),
    ("STAMEN_TERRAIN", "StamenTerrain"),
    ("STAMEN_WATERCOLOR", "StamenWatercolor"),
];

/// Renames predefined base map models to their current identifiers.
pub struct FromV070ToV080 {
    target: Version,
}

impl FromV070ToV080 {
    pub fn new() -> Self {
        Self {
            target: Version::new(0, 8, 0),
        }
    }
}

impl Default for FromV070ToV080 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationStep for FromV070ToV080 {
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
            if LayerType::of(layer) != Some(LayerType::Predefined) {
                continue;
            }
            let metadata = layer_metadata_mut(layer, &self.target)?;
            let renamed = metadata
                .get("model")
                .and_then(Value::as_str)
                .and_then(|model| MODEL_RENAMES.iter().find(|(old, _)| *old == model))
                .map(|(_, new)| *new);
            if let Some(model) = renamed {
                metadata.insert("model".into(), Value::String(model.into()));
            }
        }

        next_project(manifest, project.files(), &self.target)
    }
}
