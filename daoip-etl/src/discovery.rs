//! Data file discovery
//!
//! A data root holds one directory per grant system; each system directory
//! holds the published `*.json` documents next to generated artifacts
//! (backups, quality reports, temp files) that must never be processed as
//! data.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{EtlError, EtlResult};
use crate::guard::is_backup_file;

/// Per-system quality report
pub const REPORT_FILE: &str = "data_quality_report.json";

/// Cross-system quality report at the data root
pub const COMPREHENSIVE_REPORT_FILE: &str = "comprehensive_data_quality_report.json";

/// Field mapping kept next to a system's data
pub const MAPPING_FILE: &str = "field_mapping.toml";

/// Grant pool index of a system
pub const POOL_INDEX_FILE: &str = "grants_pool.json";

/// Suffix of per-pool application files
pub const APPLICATIONS_FILE_SUFFIX: &str = "_applications_uri.json";

/// Report files written by the validator
pub fn is_report_file(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(REPORT_FILE) | Some(COMPREHENSIVE_REPORT_FILE)
    )
}

/// True for `*.json` files that hold grant data
pub fn is_data_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
        && !is_backup_file(path)
        && !is_report_file(path)
        && !is_hidden(path)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn is_hidden_entry(entry: &DirEntry) -> bool {
    entry.depth() > 0 && is_hidden(entry.path())
}

/// Grant system directories directly under the data root, sorted by name
pub fn list_systems(data_root: &Path) -> EtlResult<Vec<PathBuf>> {
    if !data_root.is_dir() {
        return Err(EtlError::NotFound(data_root.to_path_buf()));
    }

    let mut systems = Vec::new();
    for entry in WalkDir::new(data_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden_entry(e))
    {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => systems.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => tracing::warn!("Error accessing entry: {}", e),
        }
    }
    Ok(systems)
}

/// Data files at the top level of a system directory, sorted by name
pub fn list_data_files(system_dir: &Path) -> EtlResult<Vec<PathBuf>> {
    if !system_dir.is_dir() {
        return Err(EtlError::NotFound(system_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(system_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_data_file(entry.path()) => {
                files.push(entry.into_path())
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Error accessing entry: {}", e),
        }
    }

    tracing::debug!(
        "Discovered {} data files in {}",
        files.len(),
        system_dir.display()
    );
    Ok(files)
}

/// Name of a system directory (last path component)
pub fn system_name(system_dir: &Path) -> String {
    system_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| system_dir.display().to_string())
}

/// Source layout of a funder directory: a mapping TOML plus `uploads/*.csv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunderLayout {
    pub mapping: PathBuf,
    pub csv_files: Vec<PathBuf>,
}

/// Check that a funder directory holds a mapping TOML and CSV uploads
pub fn check_funder_layout(funder_dir: &Path) -> EtlResult<FunderLayout> {
    if !funder_dir.is_dir() {
        return Err(EtlError::NotFound(funder_dir.to_path_buf()));
    }

    let mapping = files_with_extension(funder_dir, "toml")
        .into_iter()
        .next()
        .ok_or_else(|| EtlError::Mapping(format!("No mapping TOML found in {}", funder_dir.display())))?;

    let uploads = funder_dir.join("uploads");
    if !uploads.is_dir() {
        return Err(EtlError::NotFound(uploads));
    }

    let csv_files = files_with_extension(&uploads, "csv");
    if csv_files.is_empty() {
        return Err(EtlError::source_error(uploads, "No CSV files found"));
    }

    Ok(FunderLayout { mapping, csv_files })
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|p| p.extension().is_some_and(|ext| ext == extension))
        .collect()
}
