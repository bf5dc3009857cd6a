use async_trait::async_trait;
use semver::Version;
use serde_json::Value;
use tracing::info;

use super::support::{layer_metadata_mut, layers_mut, next_project, LayerType};
use super::{MigrationError, MigrationServices, MigrationSettings, MigrationStep};
use crate::project::MigrationProject;

/// Base map providers that stopped serving tiles.
const DISCONTINUED_MODELS: &[&str] = &[
    "StamenToner",
    "StamenTonerLite",
    "StamenTerrain",
    "StamenWatercolor",
];
const DEFAULT_MODEL: &str = "OpenStreetMap";

/// Replaces discontinued base maps with OpenStreetMap and tells the user
/// once.
pub struct FromV130ToV140 {
    target: Version,
    services: MigrationServices,
}

impl FromV130ToV140 {
    pub fn new(services: MigrationServices) -> Self {
        Self {
            target: Version::new(1, 4, 0),
            services,
        }
    }
}

#[async_trait]
impl MigrationStep for FromV130ToV140 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        let mut replaced = 0usize;
        for layer in layers_mut(&mut manifest) {
            if LayerType::of(layer) != Some(LayerType::Predefined) {
                continue;
            }
            let metadata = layer_metadata_mut(layer, &self.target)?;
            let discontinued = metadata
                .get("model")
                .and_then(Value::as_str)
                .map_or(false, |model| DISCONTINUED_MODELS.contains(&model));
            if discontinued {
                metadata.insert("model".into(), Value::String(DEFAULT_MODEL.into()));
                replaced += 1;
            }
        }

        if replaced > 0 {
            info!(
                target: "abc_migrate",
                event = "basemap_replaced",
                layers = replaced,
                model = DEFAULT_MODEL,
                notified = !settings.silent
            );
            if !settings.silent {
                let translator = &self.services.translator;
                self.services
                    .modal
                    .warning(
                        &translator.translate("migration.deprecated_basemap.title"),
                        &translator.translate("migration.deprecated_basemap.message"),
                    )
                    .await;
            }
        }

        next_project(manifest, project.files(), &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Catalog;
    use crate::legacy_crypto::{KdfParams, PassphraseCipher};
    use crate::modal::StaticModal;
    use serde_json::json;
    use std::sync::Arc;

    fn step(modal: Arc<StaticModal>) -> FromV130ToV140 {
        FromV130ToV140::new(MigrationServices {
            modal,
            cipher: Arc::new(PassphraseCipher::new(KdfParams::for_test())),
            translator: Arc::new(Catalog::default()),
        })
    }

    fn project(models: &[&str]) -> MigrationProject {
        let layers: Vec<Value> = models
            .iter()
            .map(|model| json!({ "type": "Predefined", "metadata": { "model": model } }))
            .collect();
        MigrationProject::new(
            json!({ "metadata": { "version": "1.3.0" }, "layers": layers }),
            vec![],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn warns_once_for_many_layers() {
        let modal = Arc::new(StaticModal::default());
        let migrated = step(modal.clone())
            .migrate(
                &project(&["StamenToner", "StamenWatercolor", "OpenStreetMap"]),
                &MigrationSettings::default(),
            )
            .await
            .unwrap();
        let models: Vec<_> = migrated.manifest()["layers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|layer| layer["metadata"]["model"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(models, vec![DEFAULT_MODEL; 3]);
        assert_eq!(modal.warning_count(), 1);
    }

    #[tokio::test]
    async fn silent_mode_replaces_without_warning() {
        let modal = Arc::new(StaticModal::default());
        let migrated = step(modal.clone())
            .migrate(&project(&["StamenTerrain"]), &MigrationSettings { silent: true })
            .await
            .unwrap();
        assert_eq!(migrated.manifest()["layers"][0]["metadata"]["model"], DEFAULT_MODEL);
        assert_eq!(modal.warning_count(), 0);
    }

    #[tokio::test]
    async fn no_warning_when_nothing_changes() {
        let modal = Arc::new(StaticModal::default());
        step(modal.clone())
            .migrate(&project(&["OpenStreetMap"]), &MigrationSettings::default())
            .await
            .unwrap();
        assert_eq!(modal.warning_count(), 0);
    }
}
