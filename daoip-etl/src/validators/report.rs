//! Quality report types and scoring

use daoip_common::config::QualityConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCategory {
    /// Required data missing or wrong in a way consumers cannot tolerate
    Critical,
    /// Naming-convention drift
    Schema,
    /// Placeholders, malformed URLs, wrong value types
    DataQuality,
    /// Soft signals
    Warning,
}

/// Categorized issue lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issues {
    pub critical: Vec<String>,
    pub schema: Vec<String>,
    pub data_quality: Vec<String>,
    pub warnings: Vec<String>,
}

impl Issues {
    pub fn push(&mut self, category: IssueCategory, message: impl Into<String>) {
        self.list_mut(category).push(message.into());
    }

    pub fn list(&self, category: IssueCategory) -> &[String] {
        match category {
            IssueCategory::Critical => &self.critical,
            IssueCategory::Schema => &self.schema,
            IssueCategory::DataQuality => &self.data_quality,
            IssueCategory::Warning => &self.warnings,
        }
    }

    fn list_mut(&mut self, category: IssueCategory) -> &mut Vec<String> {
        match category {
            IssueCategory::Critical => &mut self.critical,
            IssueCategory::Schema => &mut self.schema,
            IssueCategory::DataQuality => &mut self.data_quality,
            IssueCategory::Warning => &mut self.warnings,
        }
    }

    pub fn total(&self) -> usize {
        self.critical.len() + self.schema.len() + self.data_quality.len() + self.warnings.len()
    }

    /// Append another set with every message prefixed by `[<system>]`
    pub fn extend_prefixed(&mut self, system: &str, other: &Issues) {
        for category in [
            IssueCategory::Critical,
            IssueCategory::Schema,
            IssueCategory::DataQuality,
            IssueCategory::Warning,
        ] {
            let target = self.list_mut(category);
            target.extend(other.list(category).iter().map(|m| format!("[{system}] {m}")));
        }
    }
}

/// Per-system counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub files_processed: usize,
    pub files_failed: usize,
    pub total_grant_pools: usize,
    pub total_applications: usize,
    pub valid_applications: usize,
}

/// Outcome for one validated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub file: String,
    pub valid: bool,
    pub grant_pools_count: usize,
    pub applications_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            valid: true,
            grant_pools_count: 0,
            applications_count: 0,
            error: None,
        }
    }

    pub fn failed(file: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Self::new(file)
        }
    }
}

/// Quality report of one grant system, persisted as `data_quality_report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub system_name: String,
    pub timestamp: String,
    pub quality_score: u32,
    pub statistics: Statistics,
    pub issues: Issues,
    pub per_file_results: Vec<FileResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_mapping: Option<Value>,
}

impl QualityReport {
    pub fn band(&self) -> QualityBand {
        QualityBand::from_score(self.quality_score)
    }
}

/// Score band used by the comprehensive report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityBand {
    /// `excellent ≥ 90`, `good ≥ 70`, `fair ≥ 50`, `poor < 50`
    pub fn from_score(score: u32) -> Self {
        match score {
            90.. => QualityBand::Excellent,
            70..=89 => QualityBand::Good,
            50..=69 => QualityBand::Fair,
            _ => QualityBand::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityBand::Excellent => "excellent",
            QualityBand::Good => "good",
            QualityBand::Fair => "fair",
            QualityBand::Poor => "poor",
        }
    }
}

/// Linear penalty scoring: `max(0, 100 - penalty × issues)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub penalty_per_issue: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::from(&QualityConfig::default())
    }
}

impl From<&QualityConfig> for ScoringPolicy {
    fn from(config: &QualityConfig) -> Self {
        Self {
            penalty_per_issue: config.penalty_per_issue,
        }
    }
}

impl ScoringPolicy {
    pub fn score(&self, issues: &Issues) -> u32 {
        let count = u32::try_from(issues.total()).unwrap_or(u32::MAX);
        100u32.saturating_sub(self.penalty_per_issue.saturating_mul(count))
    }
}
