//! Versioned project manifest migrations.
//!
//! Each step moves a manifest from "version < target" to "version == target".
//! [`MigrationChain`] runs the steps in ascending target order, re-checking
//! every predicate against the manifest produced so far, so a project several
//! versions behind walks through each intermediate schema exactly once.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use semver::Version;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::i18n::Translate;
use crate::legacy_crypto::{CryptoError, LegacyCipher};
use crate::modal::ModalService;
use crate::project::MigrationProject;

mod from_v010_to_v020;
mod from_v020_to_v030;
mod from_v030_to_v040;
mod from_v040_to_v050;
mod from_v050_to_v060;
mod from_v060_to_v070;
mod from_v070_to_v080;
mod from_v080_to_v090;
mod from_v090_to_v100;
mod from_v100_to_v110;
mod from_v110_to_v120;
mod from_v120_to_v130;
mod from_v130_to_v140;
pub(crate) mod support;

pub use from_v010_to_v020::FromV010ToV020;
pub use from_v020_to_v030::FromV020ToV030;
pub use from_v030_to_v040::FromV030ToV040;
pub use from_v040_to_v050::FromV040ToV050;
pub use from_v050_to_v060::FromV050ToV060;
pub use from_v060_to_v070::FromV060ToV070;
pub use from_v070_to_v080::FromV070ToV080;
pub use from_v080_to_v090::FromV080ToV090;
pub use from_v090_to_v100::FromV090ToV100;
pub use from_v100_to_v110::FromV100ToV110;
pub use from_v110_to_v120::FromV110ToV120;
pub use from_v120_to_v130::FromV120ToV130;
pub use from_v130_to_v140::FromV130ToV140;

pub const OLDEST_SUPPORTED_VERSION: Version = Version::new(0, 1, 0);
pub const CURRENT_VERSION: Version = Version::new(1, 4, 0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationSettings {
    /// Forbid prompts and warning dialogs. Steps that need a password fail.
    pub silent: bool,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("migration to {step} requires user interaction but silent mode is enabled")]
    InteractionRequired { step: Version },
    #[error("password prompt was canceled during migration to {step}")]
    PasswordCanceled { step: Version },
    #[error("wrong password for project credentials")]
    WrongPassword { step: Version },
    #[error("project declares credentials but no encrypted value can serve as witness")]
    MissingWitness { step: Version },
    #[error("legacy cipher failure during migration to {step}: {source}")]
    Crypto {
        step: Version,
        #[source]
        source: CryptoError,
    },
    #[error("migration to {step} produced version {actual}")]
    VersionMismatch { step: Version, actual: Version },
    #[error("migration to {step} changed the file bundle")]
    FilesChanged { step: Version },
    #[error("unexpected shape at {path} during migration to {step}: {reason}")]
    Shape {
        step: Version,
        path: String,
        reason: String,
    },
}

impl MigrationError {
    pub const WRONG_PASSWORD_CODE: &'static str = "MIGRATION/WRONG_PASSWORD";

    pub fn code(&self) -> &'static str {
        match self {
            MigrationError::InvalidManifest(_) => "MIGRATION/INVALID_MANIFEST",
            MigrationError::InteractionRequired { .. } => "MIGRATION/INTERACTION_REQUIRED",
            MigrationError::PasswordCanceled { .. } => "MIGRATION/PASSWORD_CANCELED",
            MigrationError::WrongPassword { .. } => Self::WRONG_PASSWORD_CODE,
            MigrationError::MissingWitness { .. } => "MIGRATION/MISSING_WITNESS",
            MigrationError::Crypto { .. } => "MIGRATION/CRYPTO",
            MigrationError::VersionMismatch { .. } => "MIGRATION/VERSION_MISMATCH",
            MigrationError::FilesChanged { .. } => "MIGRATION/FILES_CHANGED",
            MigrationError::Shape { .. } => "MIGRATION/SHAPE",
        }
    }

    /// Target version of the step that failed, when a step failed.
    pub fn step(&self) -> Option<&Version> {
        match self {
            MigrationError::InvalidManifest(_) => None,
            MigrationError::InteractionRequired { step }
            | MigrationError::PasswordCanceled { step }
            | MigrationError::WrongPassword { step }
            | MigrationError::MissingWitness { step }
            | MigrationError::Crypto { step, .. }
            | MigrationError::VersionMismatch { step, .. }
            | MigrationError::FilesChanged { step }
            | MigrationError::Shape { step, .. } => Some(step),
        }
    }

    pub fn is_wrong_password(&self) -> bool {
        matches!(self, MigrationError::WrongPassword { .. })
    }

    pub(crate) fn crypto(step: &Version, source: CryptoError) -> Self {
        match source {
            CryptoError::WrongPassword => MigrationError::WrongPassword { step: step.clone() },
            source => MigrationError::Crypto {
                step: step.clone(),
                source,
            },
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("migration chain has no steps")]
    Empty,
    #[error("migration step {next} is listed after {previous}; targets must strictly increase")]
    OutOfOrder { previous: Version, next: Version },
}

#[async_trait]
pub trait MigrationStep: Send + Sync {
    fn target_version(&self) -> &Version;

    /// True iff the project is older than this step's target.
    fn interested_by(&self, project: &MigrationProject) -> bool {
        project.version() < self.target_version()
    }

    /// Whether this step may add, drop or rename bundle files.
    fn rewrites_files(&self) -> bool {
        false
    }

    /// Returns a new project at [`MigrationStep::target_version`]. The input
    /// is never modified.
    async fn migrate(
        &self,
        project: &MigrationProject,
        settings: &MigrationSettings,
    ) -> Result<MigrationProject, MigrationError>;
}

/// Collaborators injected into the steps that talk to the user or decrypt
/// legacy values.
#[derive(Clone)]
pub struct MigrationServices {
    pub modal: Arc<dyn ModalService>,
    pub cipher: Arc<dyn LegacyCipher>,
    pub translator: Arc<dyn Translate>,
}

/// All shipped steps, oldest target first.
pub fn default_steps(services: &MigrationServices) -> Vec<Box<dyn MigrationStep>> {
    vec![
        Box::new(FromV010ToV020::new()),
        Box::new(FromV020ToV030::new()),
        Box::new(FromV030ToV040::new()),
        Box::new(FromV040ToV050::new()),
        Box::new(FromV050ToV060::new(services.clone())),
        Box::new(FromV060ToV070::new()),
        Box::new(FromV070ToV080::new()),
        Box::new(FromV080ToV090::new()),
        Box::new(FromV090ToV100::new()),
        Box::new(FromV100ToV110::new()),
        Box::new(FromV110ToV120::new(services.clone())),
        Box::new(FromV120ToV130::new()),
        Box::new(FromV130ToV140::new(services.clone())),
    ]
}

pub struct MigrationChain {
    steps: Vec<Box<dyn MigrationStep>>,
}

impl std::fmt::Debug for MigrationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationChain")
            .field("targets", &self.targets())
            .finish()
    }
}

impl MigrationChain {
    /// Builds a chain, rejecting empty lists and targets that do not
    /// strictly increase.
    pub fn new(steps: Vec<Box<dyn MigrationStep>>) -> Result<Self, ChainError> {
        if steps.is_empty() {
            return Err(ChainError::Empty);
        }
        for pair in steps.windows(2) {
            let previous = pair[0].target_version();
            let next = pair[1].target_version();
            if next <= previous {
                return Err(ChainError::OutOfOrder {
                    previous: previous.clone(),
                    next: next.clone(),
                });
            }
        }
        Ok(Self { steps })
    }

    pub fn with_defaults(services: &MigrationServices) -> Result<Self, ChainError> {
        Self::new(default_steps(services))
    }

    pub fn targets(&self) -> Vec<&Version> {
        self.steps.iter().map(|step| step.target_version()).collect()
    }

    /// Target of the last step: the version every migrated project ends at.
    pub fn current_version(&self) -> &Version {
        // `new` rejects empty chains.
        self.steps[self.steps.len() - 1].target_version()
    }

    /// Targets of the steps `update` would run for this project.
    pub fn pending(&self, project: &MigrationProject) -> Vec<&Version> {
        self.steps
            .iter()
            .map(|step| step.target_version())
            .filter(|target| project.version() < *target)
            .collect()
    }

    /// Runs every interested step in order. The first failure aborts the
    /// run and nothing partial is returned.
    pub async fn update(
        &self,
        project: &MigrationProject,
        silent: bool,
    ) -> Result<MigrationProject, MigrationError> {
        let settings = MigrationSettings { silent };
        let started = Instant::now();
        let from = project.version().clone();
        let mut current: Cow<'_, MigrationProject> = Cow::Borrowed(project);
        let mut applied = 0usize;

        for step in &self.steps {
            let target = step.target_version();
            if !step.interested_by(&current) {
                debug!(
                    target: "abc_migrate",
                    event = "migration_skip",
                    version = %current.version(),
                    step = %target
                );
                continue;
            }

            info!(
                target: "abc_migrate",
                event = "migration_step_start",
                from = %current.version(),
                to = %target,
                silent
            );
            let next = match step.migrate(&current, &settings).await {
                Ok(next) => next,
                Err(err) => {
                    error!(
                        target: "abc_migrate",
                        event = "migration_failed",
                        step = %target,
                        code = err.code(),
                        error = %err
                    );
                    return Err(err);
                }
            };

            if next.version() != target {
                return Err(MigrationError::VersionMismatch {
                    step: target.clone(),
                    actual: next.version().clone(),
                });
            }
            if !step.rewrites_files() && next.file_paths() != current.file_paths() {
                return Err(MigrationError::FilesChanged {
                    step: target.clone(),
                });
            }

            debug!(
                target: "abc_migrate",
                event = "migration_step_done",
                version = %target,
                files = next.files().len()
            );
            current = Cow::Owned(next);
            applied += 1;
        }

        info!(
            target: "abc_migrate",
            event = "migration_complete",
            from = %from,
            to = %current.version(),
            steps = applied,
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(current.into_owned())
    }
}
