//! Schema migrations for Abc-Map project documents.
//!
//! A project is a JSON manifest plus a bundle of opaque files. Projects saved
//! by older releases are brought to [`migrations::CURRENT_VERSION`] by a
//! [`MigrationChain`] of version-to-version steps, some of which ask the user
//! for the password protecting legacy credentials.

pub mod archive;
pub mod error;
pub mod i18n;
pub mod legacy_crypto;
pub mod logging;
pub mod migrations;
pub mod modal;
pub mod project;
pub mod schema;

pub use error::{AppError, AppResult};
pub use logging::init_logging;
pub use migrations::{
    default_steps, ChainError, MigrationChain, MigrationError, MigrationServices,
    MigrationSettings, MigrationStep, CURRENT_VERSION, OLDEST_SUPPORTED_VERSION,
};
pub use project::{MigrationProject, ProjectFile};
