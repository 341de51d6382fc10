//! JSON snapshot persistence
//!
//! The snapshot is written to a temporary file next to the target and then
//! renamed over it, so readers see either the previous snapshot or the new
//! one, never a partial file.

use crate::output::{StorageError, StorageResult};
use crate::product::Snapshot;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Indentation of the pretty-printed snapshot
const INDENT: &[u8] = b"    ";

/// Sole writer of the snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the snapshot file with `snapshot`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The new snapshot is in place
    /// * `Err(StorageError)` - Nothing was replaced; any previous snapshot is intact
    pub fn save(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let json = to_pretty_json(snapshot)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut file = NamedTempFile::new_in(&dir)?;
        file.write_all(&json)?;
        // Temp files are created owner-only; readers expect the snapshot's usual mode
        if let Some(permissions) = snapshot_permissions(&self.path) {
            file.as_file().set_permissions(permissions)?;
        }
        file.flush()?;
        file.as_file().sync_all()?;

        file.persist(&self.path)
            .map_err(|e| StorageError::Persist {
                path: self.path.clone(),
                source: e.error,
            })?;

        // Make the rename itself durable
        if let Ok(parent) = fs::File::open(&dir) {
            if let Err(e) = parent.sync_all() {
                tracing::debug!("Failed to sync {}: {}", dir.display(), e);
            }
        }

        tracing::debug!(
            "Wrote snapshot of {} records to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Reads the current snapshot back
    pub fn load(&self) -> StorageResult<Snapshot> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Mode for a fresh snapshot: the replaced file's, or `0o644` for a new one
fn snapshot_permissions(target: &Path) -> Option<fs::Permissions> {
    match fs::metadata(target) {
        Ok(metadata) if metadata.is_file() => Some(metadata.permissions()),
        _ => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Serializes a snapshot as a JSON array indented by four spaces
pub fn to_pretty_json(snapshot: &Snapshot) -> StorageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    snapshot.serialize(&mut serializer)?;
    Ok(buffer)
}
