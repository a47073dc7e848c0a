//! Backup-and-Write Guard
//!
//! The only place that replaces published JSON files. Every write follows the
//! same ordered sequence:
//!
//! 1. Compare old and new content structurally; equal content is a no-op
//!    (no write, no backup, mtime untouched)
//! 2. Write the pre-image to `<path><suffix>` and sync it
//! 3. Write the new content to a temporary sibling and sync it
//! 4. Rename the temporary file over `path`
//!
//! Backup files never end in `.json`, and [`is_backup_file`] lets discovery
//! filter them out, so they are never processed as data.

use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EtlError, EtlResult};

/// Suffix appended to the primary path for the pre-image copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupSuffix {
    /// Conversion and critical fixes
    Backup,
    /// Naming-convention rewrites
    Naming,
    /// Schema compliance rewrites
    Schema,
    /// Field migration into extensions
    FieldMigration,
}

impl BackupSuffix {
    pub const ALL: [BackupSuffix; 4] = [
        BackupSuffix::Backup,
        BackupSuffix::Naming,
        BackupSuffix::Schema,
        BackupSuffix::FieldMigration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackupSuffix::Backup => ".backup",
            BackupSuffix::Naming => ".naming_backup",
            BackupSuffix::Schema => ".schema_backup",
            BackupSuffix::FieldMigration => ".field_migration_backup",
        }
    }

    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(self.as_str());
        PathBuf::from(name)
    }
}

/// Result of a guarded write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Content structurally equal; nothing written
    Unchanged,
    /// File did not exist before
    Created,
    /// File replaced; pre-image kept at `backup`
    Written { backup: PathBuf },
}

impl WriteOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, WriteOutcome::Unchanged)
    }

    pub fn backup(&self) -> Option<&Path> {
        match self {
            WriteOutcome::Written { backup } => Some(backup),
            _ => None,
        }
    }
}

/// True for any file name ending in one of the backup suffixes
pub fn is_backup_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    BackupSuffix::ALL.iter().any(|s| name.ends_with(s.as_str()))
}

/// Read and parse a JSON file
pub fn read_json(path: &Path) -> EtlResult<Value> {
    let content = fs::read_to_string(path).map_err(|e| daoip_common::Error::at_path(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Serialize with two-space indentation and a trailing newline
pub fn to_pretty_json(value: &Value) -> EtlResult<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

/// Write `new` to `path` unless it structurally equals `old`.
///
/// `old` is the caller's view of the current content (`None` when the caller
/// found no file). When the file exists its raw bytes are the backup, so even
/// an unparseable pre-image is preserved verbatim.
pub fn write_json_guarded(
    path: &Path,
    old: Option<&Value>,
    new: &Value,
    suffix: BackupSuffix,
) -> EtlResult<WriteOutcome> {
    if old == Some(new) {
        debug!(path = %path.display(), "Content unchanged, skipping write");
        return Ok(WriteOutcome::Unchanged);
    }

    let outcome = if path.exists() {
        let backup = suffix.backup_path(path);
        let raw = fs::read(path).map_err(|e| daoip_common::Error::at_path(path, e))?;
        write_synced(&backup, &raw)?;
        WriteOutcome::Written { backup }
    } else if let Some(old) = old {
        let backup = suffix.backup_path(path);
        write_synced(&backup, to_pretty_json(old)?.as_bytes())?;
        WriteOutcome::Written { backup }
    } else {
        WriteOutcome::Created
    };

    replace_atomically(path, to_pretty_json(new)?.as_bytes())?;

    match &outcome {
        WriteOutcome::Written { backup } => info!(
            path = %path.display(),
            backup = %backup.display(),
            "Updated file"
        ),
        _ => info!(path = %path.display(), "Created file"),
    }
    Ok(outcome)
}

/// Read `path`, apply `transform` to a copy, and write it back through the guard.
///
/// The transform works on a copy, so the pre-image is intact for comparison.
pub fn update_json_file<T, F>(path: &Path, suffix: BackupSuffix, transform: F) -> EtlResult<(WriteOutcome, T)>
where
    F: FnOnce(&mut Value) -> T,
{
    let old = read_json(path)?;
    let mut new = old.clone();
    let result = transform(&mut new);
    let outcome = write_json_guarded(path, Some(&old), &new, suffix)?;
    Ok((outcome, result))
}

fn write_synced(path: &Path, bytes: &[u8]) -> EtlResult<()> {
    let mut file = File::create(path).map_err(|e| daoip_common::Error::at_path(path, e))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn replace_atomically(path: &Path, bytes: &[u8]) -> EtlResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| daoip_common::Error::at_path(parent, e))?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    write_synced(&tmp, bytes)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        EtlError::from(daoip_common::Error::at_path(path, e))
    })
}
