//! Collect-and-continue runners
//!
//! Runs a document transform over every data file of a system (or of every
//! system under the data root). A file that cannot be read, parsed or written
//! is recorded as a failure and the batch moves on to the next file.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::discovery::{list_data_files, list_systems, system_name, MAPPING_FILE};
use crate::error::EtlResult;
use crate::fixes::{fix_document, FixCounts};
use crate::guard::{update_json_file, BackupSuffix, WriteOutcome};
use crate::lock::SystemLock;
use crate::mapping::FieldMapping;
use crate::migrate::{migrate_document, MigrationStats};

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    Updated { backup: Option<PathBuf> },
    Unchanged,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Counters for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub backups_created: usize,
    pub failures: usize,
    pub files: Vec<FileOutcome>,
}

impl BatchSummary {
    /// Record the result of one guarded write
    pub fn record(&mut self, path: &Path, result: &EtlResult<WriteOutcome>) {
        let status = match result {
            Ok(WriteOutcome::Unchanged) => {
                self.processed += 1;
                self.unchanged += 1;
                FileStatus::Unchanged
            }
            Ok(outcome) => {
                self.processed += 1;
                self.updated += 1;
                let backup = outcome.backup().map(Path::to_path_buf);
                if backup.is_some() {
                    self.backups_created += 1;
                }
                FileStatus::Updated { backup }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "File failed, continuing");
                self.failures += 1;
                FileStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        self.files.push(FileOutcome {
            path: path.to_path_buf(),
            status,
        });
    }

    /// Record a failure that happened before any file was touched
    pub fn record_failure(&mut self, path: &Path, error: impl ToString) {
        self.failures += 1;
        self.files.push(FileOutcome {
            path: path.to_path_buf(),
            status: FileStatus::Failed {
                error: error.to_string(),
            },
        });
    }

    pub fn merge(&mut self, other: BatchSummary) {
        self.processed += other.processed;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.backups_created += other.backups_created;
        self.failures += other.failures;
        self.files.extend(other.files);
    }

    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }
}

/// Extension prefix for a system: its mapping's prefix, else the directory name
pub fn extension_prefix_for(system_dir: &Path) -> String {
    let mapping_path = system_dir.join(MAPPING_FILE);
    if mapping_path.exists() {
        match FieldMapping::load(&mapping_path) {
            Ok(mapping) => return mapping.extension_prefix().to_string(),
            Err(e) => warn!(path = %mapping_path.display(), error = %e, "Ignoring unusable field mapping"),
        }
    }
    system_name(system_dir)
}

/// Apply `transform` to every data file of a system under the system lock
fn run_system<T, F>(system_dir: &Path, suffix: BackupSuffix, mut transform: F) -> EtlResult<(BatchSummary, Vec<T>)>
where
    F: FnMut(&mut serde_json::Value) -> T,
{
    let files = list_data_files(system_dir)?;
    let _lock = SystemLock::acquire(system_dir)?;

    let mut summary = BatchSummary::default();
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let result = update_json_file(&path, suffix, &mut transform);
        let outcome = result.map(|(outcome, value)| {
            results.push(value);
            outcome
        });
        summary.record(&path, &outcome);
    }
    Ok((summary, results))
}

/// Migrate non-standard fields into extensions for every file of a system
pub fn migrate_system(system_dir: &Path) -> EtlResult<(BatchSummary, MigrationStats)> {
    let prefix = extension_prefix_for(system_dir);
    info!(system = %system_dir.display(), prefix = %prefix, "Migrating fields to extensions");

    let (summary, per_file) = run_system(system_dir, BackupSuffix::FieldMigration, |doc| {
        migrate_document(doc, &prefix)
    })?;

    let mut total = MigrationStats::default();
    for stats in per_file {
        total.pools_migrated += stats.pools_migrated;
        total.applications_migrated += stats.applications_migrated;
        total.total_applications += stats.total_applications;
        total.extension_values_pruned += stats.extension_values_pruned;
        total.entities_skipped += stats.entities_skipped;
    }
    Ok((summary, total))
}

/// Apply the critical-issue fixes to every file of a system
pub fn fix_system(system_dir: &Path) -> EtlResult<(BatchSummary, FixCounts)> {
    info!(system = %system_dir.display(), "Applying critical fixes");

    let (summary, per_file) = run_system(system_dir, BackupSuffix::Backup, fix_document)?;
    let mut counts = FixCounts::default();
    for file_counts in per_file {
        counts += file_counts;
    }
    Ok((summary, counts))
}

/// Per-system result of a whole-tree run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemFixResult {
    pub system: String,
    pub summary: BatchSummary,
    pub counts: FixCounts,
}

/// Fix every system under the data root; a failing system does not stop the rest
pub fn fix_all(data_root: &Path) -> EtlResult<Vec<SystemFixResult>> {
    let systems = list_systems(data_root)?;
    let mut results = Vec::with_capacity(systems.len());

    for system_dir in systems {
        let system = system_name(&system_dir);
        let (summary, counts) = match fix_system(&system_dir) {
            Ok(result) => result,
            Err(e) => {
                let mut summary = BatchSummary::default();
                summary.record_failure(&system_dir, &e);
                (summary, FixCounts::default())
            }
        };
        results.push(SystemFixResult {
            system,
            summary,
            counts,
        });
    }
    Ok(results)
}
