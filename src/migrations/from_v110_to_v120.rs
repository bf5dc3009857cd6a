use async_trait::async_trait;
use semver::Version;
use serde_json::Value;
use tracing::info;

use super::support::{metadata_mut, next_project};
use super::{MigrationError, MigrationServices, MigrationSettings, MigrationStep};
use crate::legacy_crypto::{
    extract_witness, is_encrypted, manifest_contains_credentials, protected_pointers,
};
use crate::project::MigrationProject;

/// Removes project passwords: every encrypted value is decrypted with the
/// password the user enters one last time.
pub struct FromV110ToV120 {
    target: Version,
    services: MigrationServices,
}

impl FromV110ToV120 {
    pub fn new(services: MigrationServices) -> Self {
        Self {
            target: Version::new(1, 2, 0),
            services,
        }
    }

    async fn ask_password(
        &self,
        witness: &str,
        settings: &MigrationSettings,
    ) -> Result<String, MigrationError> {
        if settings.silent {
            return Err(MigrationError::InteractionRequired {
                step: self.target.clone(),
            });
        }
        let translator = &self.services.translator;
        let answer = self
            .services
            .modal
            .prompt_password(
                &translator.translate("migration.credentials.decrypt.title"),
                &translator.translate("migration.credentials.decrypt.message"),
                Some(witness),
            )
            .await;
        let password = answer
            .password()
            .ok_or_else(|| MigrationError::PasswordCanceled {
                step: self.target.clone(),
            })?
            .to_string();

        self.services
            .cipher
            .decrypt(witness, &password)
            .map_err(|err| MigrationError::crypto(&self.target, err))?;
        Ok(password)
    }
}

#[async_trait]
impl MigrationStep for FromV110ToV120 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();

        if manifest_contains_credentials(&manifest) {
            let witness = extract_witness(&manifest).ok_or_else(|| MigrationError::MissingWitness {
                step: self.target.clone(),
            })?;
            let password = self.ask_password(&witness, settings).await?;

            let mut decrypted = 0usize;
            for pointer in protected_pointers(&manifest) {
                if let Some(Value::String(value)) = manifest.pointer_mut(&pointer) {
                    if !is_encrypted(value) {
                        continue;
                    }
                    *value = self
                        .services
                        .cipher
                        .decrypt(value, &password)
                        .map_err(|err| MigrationError::crypto(&self.target, err))?;
                    decrypted += 1;
                }
            }
            info!(
                target: "abc_migrate",
                event = "credentials_decrypted",
                values = decrypted,
                project_id = project.id().unwrap_or_default()
            );
        }

        metadata_mut(&mut manifest, &self.target)?.remove("containsCredentials");
        next_project(manifest, project.files(), &self.target)
    }
}
