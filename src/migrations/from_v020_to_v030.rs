use async_trait::async_trait;
use semver::Version;
use serde_json::{json, Value};

use super::support::{metadata_mut, next_project, root_mut};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

/// Adds project visibility and the shared views container.
pub struct FromV020ToV030 {
    target: Version,
}

impl FromV020ToV030 {
    pub fn new() -> Self {
        Self {
            target: Version::new(0, 3, 0),
        }
    }
}

impl Default for FromV020ToV030 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationStep for FromV020ToV030 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        _settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        metadata_mut(&mut manifest, &self.target)?
            .entry("public")
            .or_insert(Value::Bool(false));
        root_mut(&mut manifest, &self.target)?
            .entry("sharedViews")
            .or_insert_with(|| {
                json!({
                    "fullscreen": false,
                    "mapDimensions": { "width": 800, "height": 600 },
                    "list": []
                })
            });

        next_project(manifest, project.files(), &self.target)
    }
}
