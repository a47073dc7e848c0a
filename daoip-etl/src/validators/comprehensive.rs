//! Cross-system quality report

use daoip_common::time::{now, to_iso_seconds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use super::report::{Issues, QualityBand, QualityReport, ScoringPolicy};
use super::{save_report, validate_system};
use crate::discovery::{list_systems, system_name, COMPREHENSIVE_REPORT_FILE};
use crate::error::EtlResult;
use crate::guard::to_pretty_json;

/// Validation outcome of one system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SystemOutcome {
    Success { report: QualityReport },
    Error { error: String },
}

/// System names grouped by score band
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemsByQuality {
    pub excellent: Vec<String>,
    pub good: Vec<String>,
    pub fair: Vec<String>,
    pub poor: Vec<String>,
}

impl SystemsByQuality {
    pub fn add(&mut self, band: QualityBand, system: impl Into<String>) {
        let list = match band {
            QualityBand::Excellent => &mut self.excellent,
            QualityBand::Good => &mut self.good,
            QualityBand::Fair => &mut self.fair,
            QualityBand::Poor => &mut self.poor,
        };
        list.push(system.into());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub successful_validations: usize,
    pub failed_validations: usize,
    pub total_applications: usize,
    pub total_grant_pools: usize,
    pub total_files: usize,
    pub files_failed: usize,
    pub average_quality_score: f64,
    pub systems_by_quality: SystemsByQuality,
}

/// Report written to `<data_root>/comprehensive_data_quality_report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub timestamp: String,
    pub total_systems: usize,
    pub systems: BTreeMap<String, SystemOutcome>,
    pub summary: Summary,
    pub global_issues: Issues,
}

impl ComprehensiveReport {
    pub fn new() -> Self {
        Self {
            timestamp: to_iso_seconds(&now()),
            total_systems: 0,
            systems: BTreeMap::new(),
            summary: Summary::default(),
            global_issues: Issues::default(),
        }
    }

    /// Fold one system outcome into the aggregate
    pub fn record(&mut self, system: &str, outcome: SystemOutcome) {
        self.total_systems += 1;
        match &outcome {
            SystemOutcome::Success { report } => {
                let summary = &mut self.summary;
                summary.successful_validations += 1;
                summary.total_applications += report.statistics.total_applications;
                summary.total_grant_pools += report.statistics.total_grant_pools;
                summary.total_files += report.statistics.files_processed;
                summary.files_failed += report.statistics.files_failed;
                summary.systems_by_quality.add(report.band(), system);
                self.global_issues.extend_prefixed(system, &report.issues);
            }
            SystemOutcome::Error { .. } => self.summary.failed_validations += 1,
        }
        self.systems.insert(system.to_string(), outcome);
        self.summary.average_quality_score = self.average_score();
    }

    fn average_score(&self) -> f64 {
        let scores: Vec<u32> = self
            .systems
            .values()
            .filter_map(|o| match o {
                SystemOutcome::Success { report } => Some(report.quality_score),
                SystemOutcome::Error { .. } => None,
            })
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64
        }
    }

    /// A system could not be validated, or a data file could not be read
    pub fn has_failures(&self) -> bool {
        self.summary.failed_validations > 0 || self.summary.files_failed > 0
    }
}

impl Default for ComprehensiveReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate every system under the data root, saving each system report
pub fn validate_all(data_root: &Path, policy: &ScoringPolicy) -> EtlResult<ComprehensiveReport> {
    let systems = list_systems(data_root)?;
    info!("Validating {} grant systems", systems.len());

    let mut report = ComprehensiveReport::new();
    for system_dir in systems {
        let system = system_name(&system_dir);
        let outcome = match validate_system(&system_dir, policy)
            .and_then(|r| save_report(&system_dir, &r).map(|_| r))
        {
            Ok(system_report) => SystemOutcome::Success {
                report: system_report,
            },
            Err(e) => {
                error!(system = %system, error = %e, "Validation failed");
                SystemOutcome::Error {
                    error: e.to_string(),
                }
            }
        };
        report.record(&system, outcome);
    }

    Ok(report)
}

/// Write the comprehensive report to the data root
pub fn save_comprehensive_report(data_root: &Path, report: &ComprehensiveReport) -> EtlResult<PathBuf> {
    let path = data_root.join(COMPREHENSIVE_REPORT_FILE);
    let value = serde_json::to_value(report)?;
    std::fs::write(&path, to_pretty_json(&value)?)
        .map_err(|e| daoip_common::Error::at_path(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::report::{FileResult, Statistics};

    fn report_with_score(system: &str, score: u32, critical: &[&str]) -> QualityReport {
        QualityReport {
            system_name: system.to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            quality_score: score,
            statistics: Statistics {
                files_processed: 2,
                total_applications: 10,
                total_grant_pools: 1,
                ..Statistics::default()
            },
            issues: Issues {
                critical: critical.iter().map(|s| s.to_string()).collect(),
                ..Issues::default()
            },
            per_file_results: vec![FileResult::new("a.json")],
            field_mapping: None,
        }
    }

    #[test]
    fn test_record_aggregates_and_bands() {
        let mut report = ComprehensiveReport::new();
        report.record("celo", SystemOutcome::Success { report: report_with_score("celo", 95, &[]) });
        report.record(
            "stellar",
            SystemOutcome::Success { report: report_with_score("stellar", 60, &["bad date"]) },
        );
        report.record("broken", SystemOutcome::Error { error: "IO error".into() });

        assert_eq!(report.total_systems, 3);
        assert_eq!(report.summary.successful_validations, 2);
        assert_eq!(report.summary.failed_validations, 1);
        assert_eq!(report.summary.total_applications, 20);
        assert_eq!(report.summary.total_files, 4);
        assert_eq!(report.summary.average_quality_score, 77.5);
        assert_eq!(report.summary.systems_by_quality.excellent, vec!["celo"]);
        assert_eq!(report.summary.systems_by_quality.fair, vec!["stellar"]);
        assert_eq!(report.global_issues.critical, vec!["[stellar] bad date"]);
        assert!(report.has_failures());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(SystemOutcome::Error { error: "x".into() }).unwrap();
        assert_eq!(value, serde_json::json!({"status": "error", "error": "x"}));
    }
}
