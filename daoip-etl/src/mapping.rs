//! Versioned field-mapping configuration
//!
//! A mapping tells the converter which source column feeds which DAOIP-5
//! field, how to parse it, and which grant system / pool the rows belong to.
//! Mappings are TOML files kept next to the source data, so supporting a new
//! funder is a config change rather than a new converter.
//!
//! # Example
//! ```toml
//! version = 1
//! system = "celo"
//! system_name = "Celo"
//! system_type = "Foundation"
//!
//! [pool]
//! id = "mint_growth"
//!
//! [[columns]]
//! source = "Submission / Project"
//! target = "projectName"
//! required = true
//!
//! [[columns]]
//! source = "Total Awarded (USD)"
//! target = "fundsApprovedInUSD"
//! kind = "currency"
//!
//! [status_map]
//! Passed = "Awarded"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EtlError, EtlResult};

/// Only mapping version understood by this build
pub const MAPPING_VERSION: u32 = 1;

/// Target naming the source of the application id
pub const APPLICATION_ID_TARGET: &str = "applicationId";

/// Application fields the converter generates; no column may target them
pub const RESERVED_TARGETS: &[&str] = &["type", "id", "grantPoolId", "projectId", "extensions"];

/// Target that only a currency column may feed
const FUNDS_PAID_TARGET: &str = "fundsPaid";

/// System names and pool ids become path segments: ASCII letters, digits, `-` and `_`
fn is_safe_segment(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Complete field mapping for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub version: u32,

    /// Grant system namespace (`daoip-5:<system>:...`, output directory name)
    pub system: String,

    /// Document `name`; defaults to `system`
    #[serde(default)]
    pub system_name: Option<String>,

    /// Document `type`
    #[serde(default = "default_system_type")]
    pub system_type: String,

    /// Prefix for relocated extension keys; defaults to `system`
    #[serde(default)]
    pub extension_prefix: Option<String>,

    /// Overrides the pipeline-wide default `createdAt`
    #[serde(default)]
    pub default_created_at: Option<String>,

    #[serde(default)]
    pub source: SourceSpec,

    pub pool: PoolSpec,

    #[serde(default)]
    pub columns: Vec<ColumnMapping>,

    /// Source status value -> canonical status
    #[serde(default)]
    pub status_map: BTreeMap<String, String>,
}

/// Source file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub format: SourceFormat,

    /// JSON only: dotted path to the array of records (e.g. `data.rounds`)
    #[serde(default)]
    pub records: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Csv,
    Json,
}

/// Which pool the rows belong to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSpec {
    /// Fixed pool id for every row
    #[serde(default)]
    pub id: Option<String>,

    /// Column holding the pool name per row (slugified with `_` separators)
    #[serde(default)]
    pub column: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// One source column -> target field rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Column header, or dotted path for JSON sources
    pub source: String,

    /// Schema field name or free extension name
    pub target: String,

    #[serde(default)]
    pub kind: ValueKind,

    /// Skip the row when this column is empty
    #[serde(default)]
    pub required: bool,

    /// Currency columns feeding `fundsPaid`
    #[serde(default)]
    pub denomination: Option<String>,

    /// Text longer than this is cut and suffixed with `...`
    #[serde(default)]
    pub max_length: Option<usize>,
}

/// How a raw cell is parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Text,
    Currency,
    Percentage,
    Date,
    Boolean,
    Status,
    Url,
}

fn default_system_type() -> String {
    "DAO".to_string()
}

impl FieldMapping {
    /// Load and validate a mapping file
    pub fn load(path: &Path) -> EtlResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EtlError::Mapping(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a mapping from TOML text
    pub fn from_toml(content: &str) -> EtlResult<Self> {
        let mapping: FieldMapping = toml::from_str(content)
            .map_err(|e| EtlError::Mapping(format!("Failed to parse mapping: {}", e)))?;
        mapping.validate()?;
        Ok(mapping)
    }

    /// Check internal consistency
    pub fn validate(&self) -> EtlResult<()> {
        if self.version != MAPPING_VERSION {
            return Err(EtlError::Mapping(format!(
                "Unsupported mapping version {} (expected {})",
                self.version, MAPPING_VERSION
            )));
        }

        if !is_safe_segment(&self.system) {
            return Err(EtlError::Mapping(format!(
                "Invalid system name '{}'",
                self.system
            )));
        }

        match (&self.pool.id, &self.pool.column) {
            (Some(_), Some(_)) => {
                return Err(EtlError::Mapping(
                    "[pool] must set either `id` or `column`, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(EtlError::Mapping(
                    "[pool] must set `id` or `column`".to_string(),
                ))
            }
            _ => {}
        }

        if let Some(id) = &self.pool.id {
            if !is_safe_segment(id) {
                return Err(EtlError::Mapping(format!("Invalid pool id '{}'", id)));
            }
        }

        if self.source.format == SourceFormat::Csv && self.source.records.is_some() {
            return Err(EtlError::Mapping(
                "[source] `records` only applies to json sources".to_string(),
            ));
        }

        if self.columns.is_empty() {
            return Err(EtlError::Mapping("No [[columns]] defined".to_string()));
        }

        for column in &self.columns {
            if column.target.trim().is_empty() {
                return Err(EtlError::Mapping(format!(
                    "Column '{}' has an empty target",
                    column.source
                )));
            }
            if RESERVED_TARGETS.contains(&column.target.as_str()) {
                return Err(EtlError::Mapping(format!(
                    "Column '{}' targets generated field '{}'",
                    column.source, column.target
                )));
            }
            if column.target == FUNDS_PAID_TARGET && column.kind != ValueKind::Currency {
                return Err(EtlError::Mapping(format!(
                    "Column '{}' targets fundsPaid but is not a currency column",
                    column.source
                )));
            }
            if column.max_length == Some(0) {
                return Err(EtlError::Mapping(format!(
                    "Column '{}' has max_length 0",
                    column.source
                )));
            }
            if column.denomination.is_some() && column.kind != ValueKind::Currency {
                return Err(EtlError::Mapping(format!(
                    "Column '{}' sets a denomination but is not a currency column",
                    column.source
                )));
            }
        }

        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.system_name.as_deref().unwrap_or(&self.system)
    }

    pub fn extension_prefix(&self) -> &str {
        self.extension_prefix.as_deref().unwrap_or(&self.system)
    }

    /// Translate a source status through `status_map`.
    ///
    /// Exact match first, then case-insensitive; unmapped values pass through.
    pub fn map_status(&self, raw: &str) -> String {
        if let Some(mapped) = self.status_map.get(raw) {
            return mapped.clone();
        }
        self.status_map
            .iter()
            .find(|(from, _)| from.eq_ignore_ascii_case(raw))
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        version = 1
        system = "celo"

        [pool]
        id = "mint_growth"

        [[columns]]
        source = "Project"
        target = "projectName"
    "#;

    #[test]
    fn test_minimal_mapping_defaults() {
        let mapping = FieldMapping::from_toml(MINIMAL).unwrap();
        assert_eq!(mapping.display_name(), "celo");
        assert_eq!(mapping.extension_prefix(), "celo");
        assert_eq!(mapping.system_type, "DAO");
        assert_eq!(mapping.source.format, SourceFormat::Csv);
        assert_eq!(mapping.columns[0].kind, ValueKind::Text);
        assert!(!mapping.columns[0].required);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = FieldMapping::from_toml(&MINIMAL.replace("version = 1", "version = 2")).unwrap_err();
        assert!(err.to_string().contains("Unsupported mapping version 2"));
    }

    #[test]
    fn test_rejects_pool_with_id_and_column() {
        let toml = MINIMAL.replace("id = \"mint_growth\"", "id = \"a\"\ncolumn = \"Pool\"");
        assert!(FieldMapping::from_toml(&toml).is_err());
    }

    #[test]
    fn test_rejects_denomination_on_text_column() {
        let toml = format!(
            "{MINIMAL}\n[[columns]]\nsource = \"Paid\"\ntarget = \"fundsPaid\"\ndenomination = \"XLM\"\n"
        );
        let err = FieldMapping::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("not a currency column"));
    }

    #[test]
    fn test_rejects_system_with_separator() {
        for system in ["ce:lo", "..", ".", "a/b", "a\\\\b", ""] {
            let toml = MINIMAL.replace("system = \"celo\"", &format!("system = \"{system}\""));
            assert!(FieldMapping::from_toml(&toml).is_err(), "accepted system '{system}'");
        }
    }

    #[test]
    fn test_rejects_pool_id_that_leaves_system_dir() {
        for id in ["../../escaped", "..", "a/b", "a\\\\b", "x:y", " "] {
            let toml = MINIMAL.replace("id = \"mint_growth\"", &format!("id = \"{id}\""));
            assert!(FieldMapping::from_toml(&toml).is_err(), "accepted pool id '{id}'");
        }
        let toml = MINIMAL.replace("id = \"mint_growth\"", "id = \"scf-38_b\"");
        assert!(FieldMapping::from_toml(&toml).is_ok());
    }

    #[test]
    fn test_rejects_generated_targets() {
        for target in RESERVED_TARGETS {
            let toml = format!("{MINIMAL}\n[[columns]]\nsource = \"Ref\"\ntarget = \"{target}\"\n");
            let err = FieldMapping::from_toml(&toml).unwrap_err();
            assert!(err.to_string().contains("generated field"), "accepted target '{target}'");
        }
    }

    #[test]
    fn test_funds_paid_requires_currency_column() {
        let text = format!("{MINIMAL}\n[[columns]]\nsource = \"Paid\"\ntarget = \"fundsPaid\"\n");
        assert!(FieldMapping::from_toml(&text).is_err());

        let currency = format!("{text}kind = \"currency\"\n");
        assert!(FieldMapping::from_toml(&currency).is_ok());
    }

    #[test]
    fn test_status_map_lookup() {
        let toml = format!("{MINIMAL}\n[status_map]\nPassed = \"Awarded\"\nFailed = \"Rejected\"\n");
        let mapping = FieldMapping::from_toml(&toml).unwrap();
        assert_eq!(mapping.map_status("Passed"), "Awarded");
        assert_eq!(mapping.map_status("passed"), "Awarded");
        assert_eq!(mapping.map_status("Withdrawn"), "Withdrawn");
    }
}
