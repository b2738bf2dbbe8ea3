use bytes::Bytes;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::domain::{ArchiveEntry, FixtureSpec};
use crate::error::FixtureError;

/// File part ready to attach to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixturePayload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Scratch directory owned by a single build; removed when dropped.
struct FixtureWorkspace {
    dir: TempDir,
}

impl FixtureWorkspace {
    fn create_in(root: &Path) -> Result<Self, FixtureError> {
        let dir = tempfile::Builder::new()
            .prefix("qaprobe-fixture-")
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    fn file_path(&self, name: &str) -> Result<PathBuf, FixtureError> {
        let file_name = Path::new(name)
            .file_name()
            .filter(|file_name| file_name.len() == name.len())
            .ok_or_else(|| FixtureError::InvalidName {
                name: name.to_string(),
            })?;
        Ok(self.dir.path().join(file_name))
    }
}

/// Materializes the file part for a fixture. `InlineLiteral` yields no file.
pub fn build(spec: &FixtureSpec) -> Result<Option<FixturePayload>, FixtureError> {
    build_in(spec, &std::env::temp_dir())
}

fn build_in(spec: &FixtureSpec, root: &Path) -> Result<Option<FixturePayload>, FixtureError> {
    match spec {
        FixtureSpec::Text { name, content } => {
            validate_name(name)?;
            Ok(Some(FixturePayload {
                filename: name.clone(),
                bytes: Bytes::copy_from_slice(content.as_bytes()),
            }))
        }
        FixtureSpec::Archive { name, entries } => build_archive(name, entries, root).map(Some),
        FixtureSpec::InlineLiteral => Ok(None),
    }
}

fn validate_name(name: &str) -> Result<(), FixtureError> {
    if name.trim().is_empty() {
        return Err(FixtureError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn validate_entries(archive: &str, entries: &[ArchiveEntry]) -> Result<(), FixtureError> {
    if entries.is_empty() {
        return Err(FixtureError::EmptyArchive {
            name: archive.to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        validate_name(&entry.name)?;
        if !seen.insert(entry.name.as_str()) {
            return Err(FixtureError::DuplicateEntry {
                archive: archive.to_string(),
                entry: entry.name.clone(),
            });
        }
    }
    Ok(())
}

fn build_archive(
    name: &str,
    entries: &[ArchiveEntry],
    root: &Path,
) -> Result<FixturePayload, FixtureError> {
    validate_name(name)?;
    validate_entries(name, entries)?;

    let workspace = FixtureWorkspace::create_in(root)?;
    let path = workspace.file_path(name)?;

    // Fixed timestamps keep the archive bytes identical across runs.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut writer = ZipWriter::new(File::create(&path)?);
    for entry in entries {
        writer.start_file(entry.name.as_str(), options)?;
        writer.write_all(entry.content.as_bytes())?;
    }
    writer.finish()?.sync_all()?;

    let bytes = fs::read(&path)?;
    tracing::debug!(archive = name, entries = entries.len(), size = bytes.len(), "built archive fixture");

    Ok(FixturePayload {
        filename: name.to_string(),
        bytes: Bytes::from(bytes),
    })
}
