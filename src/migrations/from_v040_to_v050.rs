use async_trait::async_trait;
use semver::Version;

use super::support::{layer_metadata_mut, layers_mut, next_project, LayerType};
use super::{MigrationError, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

/// Renames XYZ layer `url` to `remoteUrl`, matching WMS layers.
pub struct FromV040ToV050 {
    target: Version,
}

impl FromV040ToV050 {
    pub fn new() -> Self {
        Self {
            target: Version::new(0, 5, 0),
        }
    }
}

impl Default for FromV040ToV050 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationStep for FromV040ToV050 {
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
            if LayerType::of(layer) != Some(LayerType::Xyz) {
                continue;
            }
            let metadata = layer_metadata_mut(layer, &self.target)?;
            if let Some(url) = metadata.remove("url") {
                metadata.entry("remoteUrl").or_insert(url);
            }
        }

        next_project(manifest, project.files(), &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn renames_xyz_url_only() {
        let project = MigrationProject::new(
            json!({
                "metadata": { "version": "0.4.0" },
                "layers": [
                    { "type": "Xyz", "metadata": { "id": "x", "url": "https://tiles/{z}/{x}/{y}.png" } },
                    { "type": "Wms", "metadata": { "id": "w", "url": "kept", "remoteUrl": "https://wms" } }
                ]
            }),
            vec![],
        )
        .unwrap();
        let migrated = FromV040ToV050::new()
            .migrate(&project, &MigrationSettings::default())
            .await
            .unwrap();
        let layers = &migrated.manifest()["layers"];
        assert_eq!(layers[0]["metadata"], json!({ "id": "x", "remoteUrl": "https://tiles/{z}/{x}/{y}.png" }));
        assert_eq!(layers[1]["metadata"]["url"], "kept");
    }
}
