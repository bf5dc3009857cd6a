use async_trait::async_trait;
use semver::Version;
use serde_json::{Number, Value};

use super::support::{layer_metadata_mut, layers_mut, next_project};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

/// Layer opacity moves from a percentage to a fraction.
pub struct FromV090ToV100 {
    target: Version,
}

impl FromV090ToV100 {
    pub fn new() -> Self {
        Self {
            target: Version::new(1, 0, 0),
        }
    }
}

impl Default for FromV090ToV100 {
    fn default() -> Self {
        Self::new()
    }
}

fn percent_to_fraction(percent: f64) -> f64 {
    (percent / 100.0).clamp(0.0, 1.0)
}

#[async_trait]
impl MigrationStep for FromV090ToV100 {
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
            let metadata = layer_metadata_mut(layer, &self.target)?;
            let Some(opacity) = metadata.get("opacity").and_then(Value::as_f64) else {
                continue;
            };
            let fraction = Number::from_f64(percent_to_fraction(opacity)).ok_or_else(|| {
                MigrationError::Shape {
                    step: self.target.clone(),
                    path: "layers[].metadata.opacity".into(),
                    reason: "opacity is not a finite number".into(),
                }
            })?;
            metadata.insert("opacity".into(), Value::Number(fraction));
        }

        next_project(manifest, project.files(), &self.target)
    }
}
