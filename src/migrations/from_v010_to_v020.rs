use async_trait::async_trait;
use semver::Version;
use serde_json::{json, Value};

use super::support::{metadata_mut, next_project, root_mut};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

/// Moves `metadata.projection` into a top level `view` descriptor.
pub struct FromV010ToV020 {
    target: Version,
}

impl FromV010ToV020 {
    pub fn new() -> Self {
        Self {
            target: Version::new(0, 2, 0),
        }
    }
}

impl Default for FromV010ToV020 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationStep for FromV010ToV020 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        _settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        let projection = metadata_mut(&mut manifest, &self.target)?
            .remove("projection")
            .unwrap_or_else(|| json!({ "name": "EPSG:3857" }));

        let root = root_mut(&mut manifest, &self.target)?;
        match root.get_mut("view").and_then(Value::as_object_mut) {
            Some(view) => {
                view.entry("projection").or_insert(projection);
            }
            None => {
                root.insert(
                    "view".into(),
                    json!({ "center": [0, 0], "resolution": 1000, "projection": projection }),
                );
            }
        }

        next_project(manifest, project.files(), &self.target)
    }
}
