use async_trait::async_trait;
use semver::Version;
use serde_json::Value;
use tracing::info;

use super::support::{metadata_mut, next_project};
use super::{MigrationError, MigrationServices, MigrationSettings, MigrationStep};
use crate::legacy_crypto::{extract_witness, is_encrypted, protected_pointers};
use crate::project::MigrationProject;

/// Encrypts remote URLs and service credentials with a project password.
///
/// Values already carrying the encryption prefix are left as they are, so a
/// project whose protected values are all encrypted migrates without a
/// prompt.
pub struct FromV050ToV060 {
    target: Version,
    services: MigrationServices,
}

impl FromV050ToV060 {
    pub fn new(services: MigrationServices) -> Self {
        Self {
            target: Version::new(0, 6, 0),
            services,
        }
    }

    async fn ask_password(
        &self,
        witness: Option<&str>,
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
                &translator.translate("migration.credentials.encrypt.title"),
                &translator.translate("migration.credentials.encrypt.message"),
                witness,
            )
            .await;
        let password = answer
            .password()
            .ok_or_else(|| MigrationError::PasswordCanceled {
                step: self.target.clone(),
            })?
            .to_string();

        // Values encrypted earlier must stay readable with the same password.
        if let Some(witness) = witness {
            self.services
                .cipher
                .decrypt(witness, &password)
                .map_err(|err| MigrationError::crypto(&self.target, err))?;
        }
        Ok(password)
    }
}

#[async_trait]
impl MigrationStep for FromV050ToV060 {
    fn target_version(&self) -> &Version {
        &self.target
    }

    async fn migrate(
        &self,
        project: &MigrationProject,
        settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError> {
        let mut manifest = project.manifest().clone();
        let pointers = protected_pointers(&manifest);
        let plain: Vec<&String> = pointers
            .iter()
            .filter(|pointer| {
                manifest
                    .pointer(pointer)
                    .and_then(Value::as_str)
                    .map_or(false, |value| !is_encrypted(value))
            })
            .collect();

        if !plain.is_empty() {
            let witness = extract_witness(&manifest);
            let password = self.ask_password(witness.as_deref(), settings).await?;
            for pointer in &plain {
                if let Some(Value::String(value)) = manifest.pointer_mut(pointer) {
                    *value = self
                        .services
                        .cipher
                        .encrypt(value, &password)
                        .map_err(|err| MigrationError::crypto(&self.target, err))?;
                }
            }
            info!(
                target: "abc_migrate",
                event = "credentials_encrypted",
                values = plain.len(),
                project_id = project.id().unwrap_or_default()
            );
        }

        metadata_mut(&mut manifest, &self.target)?
            .insert("containsCredentials".into(), Value::Bool(!pointers.is_empty()));

        next_project(manifest, project.files(), &self.target)
    }
}
