use async_trait::async_trait;
use semver::Version;
use serde_json::Value;

use super::support::{container_list_mut, next_project};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

const NEW_FIELDS: &[&str] = &["scale", "northArrow"];

/// Layouts and shared views gain optional scale and north arrow slots.
pub struct FromV100ToV110 {
    target: Version,
}

impl FromV100ToV110 {
    pub fn new() -> Self {
        Self {
            target: Version::new(1, 1, 0),
        }
    }

    fn add_slots(&self, container: &str, manifest: &mut Value) -> Result<(), MigrationError> {
        let Some(list) = container_list_mut(manifest, container, &self.target)? else {
            return Ok(());
        };
        for entry in list.iter_mut() {
            let object = entry.as_object_mut().ok_or_else(|| MigrationError::Shape {
                step: self.target.clone(),
                path: format!("{container}.list[]"),
                reason: "expected an object".into(),
            })?;
            for field in NEW_FIELDS {
                object.entry(*field).or_insert(Value::Null);
            }
        }
        Ok(())
    }
}

impl Default for FromV100ToV110 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationStep for FromV100ToV110 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        _settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        self.add_slots("layouts", &mut manifest)?;
        self.add_slots("sharedViews", &mut manifest)?;
        next_project(manifest, project.files(), &self.target)
    }
}
