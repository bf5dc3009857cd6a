//! Project archives on disk: a zip holding `project.json` and the bundle
//! files next to it.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::project::{MigrationProject, ProjectFile};
use crate::{AppError, AppResult};

pub const MANIFEST_ENTRY: &str = "project.json";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDigest {
    pub path: String,
    pub size: usize,
    pub sha256: String,
}

/// Upper bounds applied while inflating an archive. Sizes declared in zip
/// headers are not trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    pub max_entry_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            max_entry_bytes: 256 * 1024 * 1024,
            max_total_bytes: 1024 * 1024 * 1024,
        }
    }
}

const MAX_PREALLOCATED_BYTES: u64 = 8 * 1024 * 1024;

pub fn read_project(path: &Path) -> AppResult<MigrationProject> {
    read_project_with_limits(path, ReadLimits::default())
}

pub fn read_project_with_limits(path: &Path, limits: ReadLimits) -> AppResult<MigrationProject> {
    let file = File::open(path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "archive_open")
            .with_context("path", path.display().to_string())
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| map_zip_error(err, "archive_read"))?;

    let mut manifest: Option<Value> = None;
    let mut files = Vec::new();
    let mut total: u64 = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| map_zip_error(err, "archive_entry"))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let budget = limits
            .max_entry_bytes
            .min(limits.max_total_bytes.saturating_sub(total));
        let mut content =
            Vec::with_capacity(entry.size().min(budget).min(MAX_PREALLOCATED_BYTES) as usize);
        (&mut entry)
            .take(budget.saturating_add(1))
            .read_to_end(&mut content)
            .map_err(|err| {
                AppError::from(err)
                    .with_context("operation", "archive_entry_read")
                    .with_context("entry", name.clone())
            })?;
        if content.len() as u64 > budget {
            return Err(AppError::new(
                "ARCHIVE/TOO_LARGE",
                "Archive entry exceeds the allowed uncompressed size",
            )
            .with_context("entry", name)
            .with_context("max_entry_bytes", limits.max_entry_bytes.to_string())
            .with_context("max_total_bytes", limits.max_total_bytes.to_string())
            .with_context("path", path.display().to_string()));
        }
        total += content.len() as u64;

        if name == MANIFEST_ENTRY {
            let value = serde_json::from_slice(&content)
                .map_err(|err| AppError::from(err).with_context("entry", MANIFEST_ENTRY))?;
            manifest = Some(value);
        } else {
            files.push(ProjectFile::new(name, content));
        }
    }

    let manifest = manifest.ok_or_else(|| {
        AppError::new("ARCHIVE/MISSING_MANIFEST", "Archive has no project manifest")
            .with_context("entry", MANIFEST_ENTRY)
            .with_context("path", path.display().to_string())
    })?;
    let project = MigrationProject::new(manifest, files)
        .map_err(|err| AppError::from(err).with_context("path", path.display().to_string()))?;
    debug!(
        target: "abc_migrate",
        event = "archive_read",
        path = %path.display(),
        version = %project.version(),
        files = project.files().len()
    );
    Ok(project)
}

/// Writes the project next to `path` and renames it into place, so a failed
/// write never truncates an existing archive.
pub fn write_project(path: &Path, project: &MigrationProject) -> AppResult<()> {
    let tmp_path = tmp_path_for(path);
    if let Err(err) = write_archive(&tmp_path, project) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    fs::rename(&tmp_path, path).map_err(|err| {
        let _ = fs::remove_file(&tmp_path);
        AppError::from(err)
            .with_context("operation", "archive_rename")
            .with_context("path", path.display().to_string())
    })?;
    info!(
        target: "abc_migrate",
        event = "archive_written",
        path = %path.display(),
        version = %project.version(),
        files = project.files().len()
    );
    Ok(())
}

fn write_archive(path: &Path, project: &MigrationProject) -> AppResult<()> {
    let file = File::create(path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "archive_create")
            .with_context("path", path.display().to_string())
    })?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = serde_json::to_vec_pretty(project.manifest()).map_err(AppError::from)?;
    writer
        .start_file(MANIFEST_ENTRY, options)
        .map_err(|err| map_zip_error(err, "archive_manifest_entry"))?;
    writer
        .write_all(&manifest)
        .map_err(|err| AppError::from(err).with_context("operation", "archive_manifest_write"))?;

    for bundle_file in project.files() {
        writer
            .start_file(bundle_file.path.as_str(), options)
            .map_err(|err| {
                map_zip_error(err, "archive_file_entry").with_context("entry", bundle_file.path.clone())
            })?;
        writer.write_all(&bundle_file.content).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "archive_file_write")
                .with_context("entry", bundle_file.path.clone())
        })?;
    }

    let mut file = writer
        .finish()
        .map_err(|err| map_zip_error(err, "archive_finish"))?;
    file.flush()
        .map_err(|err| AppError::from(err).with_context("operation", "archive_flush"))?;
    Ok(())
}

pub fn file_digests(project: &MigrationProject) -> Vec<FileDigest> {
    project
        .files()
        .iter()
        .map(|file| FileDigest {
            path: file.path.clone(),
            size: file.len(),
            sha256: format!("{:x}", Sha256::digest(&file.content)),
        })
        .collect()
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{TMP_SUFFIX}"));
    path.with_file_name(name)
}

fn map_zip_error(err: ZipError, operation: &'static str) -> AppError {
    AppError::from(err).with_context("operation", operation)
}
