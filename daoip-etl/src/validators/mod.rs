//! Quality Validator
//!
//! Walks every data file of a grant system, applies the rules in [`rules`],
//! and produces a [`QualityReport`] with a linear-penalty score. The report is
//! written to `data_quality_report.json` inside the system directory.
//!
//! Validation findings are data, never errors: only an unreachable system
//! directory or an unwritable report fails.

pub mod comprehensive;
pub mod report;
pub mod rules;

pub use comprehensive::{save_comprehensive_report, validate_all, ComprehensiveReport};
pub use report::{FileResult, IssueCategory, Issues, QualityBand, QualityReport, ScoringPolicy, Statistics};

use daoip_common::time::{now, to_iso_seconds};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::discovery::{list_data_files, system_name, MAPPING_FILE, REPORT_FILE};
use crate::error::{EtlError, EtlResult};
use crate::guard::to_pretty_json;

/// Validate one grant system directory
pub fn validate_system(system_dir: &Path, policy: &ScoringPolicy) -> EtlResult<QualityReport> {
    if !system_dir.is_dir() {
        return Err(EtlError::NotFound(system_dir.to_path_buf()));
    }

    let mut issues = Issues::default();
    let mut statistics = Statistics::default();
    let mut per_file_results = Vec::new();

    for path in list_data_files(system_dir)? {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let document = match read_document(&path) {
            Ok(document) => document,
            Err(error) => {
                warn!(path = %path.display(), %error, "Skipping unreadable data file");
                statistics.files_failed += 1;
                per_file_results.push(FileResult::failed(file, error));
                continue;
            }
        };

        let critical_before = issues.critical.len();
        let counts = rules::check_document(&document, &mut issues);

        statistics.files_processed += 1;
        statistics.total_grant_pools += counts.grant_pools;
        statistics.total_applications += counts.applications;
        statistics.valid_applications += counts.valid_applications;

        per_file_results.push(FileResult {
            file,
            valid: issues.critical.len() == critical_before,
            grant_pools_count: counts.grant_pools,
            applications_count: counts.applications,
            error: None,
        });
    }

    let quality_score = policy.score(&issues);
    debug!(
        system = %system_dir.display(),
        score = quality_score,
        issues = issues.total(),
        "Validated grant system"
    );

    Ok(QualityReport {
        system_name: system_name(system_dir),
        timestamp: to_iso_seconds(&now()),
        quality_score,
        statistics,
        issues,
        per_file_results,
        field_mapping: load_field_mapping(system_dir),
    })
}

/// Write the report to `<system_dir>/data_quality_report.json`
pub fn save_report(system_dir: &Path, report: &QualityReport) -> EtlResult<PathBuf> {
    let path = system_dir.join(REPORT_FILE);
    let value = serde_json::to_value(report)?;
    std::fs::write(&path, to_pretty_json(&value)?)
        .map_err(|e| daoip_common::Error::at_path(&path, e))?;
    Ok(path)
}

fn read_document(path: &Path) -> Result<Value, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("File read error: {e}"))?;
    serde_json::from_str(&content).map_err(|e| format!("JSON decode error: {e}"))
}

/// The system's field mapping as JSON, when present and parseable
fn load_field_mapping(system_dir: &Path) -> Option<Value> {
    let path = system_dir.join(MAPPING_FILE);
    let content = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<toml::Value>(&content) {
        Ok(mapping) => serde_json::to_value(mapping).ok(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Field mapping is not valid TOML, omitting from report");
            None
        }
    }
}
