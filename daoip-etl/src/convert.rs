//! Record conversion
//!
//! Turns source records into DAOIP-5 documents:
//!
//! - Phase 1: parse each mapped cell with its value parser
//! - Phase 2: assemble a typed [`GrantApplication`] with canonical ids
//! - Phase 3: relocate non-standard fields into `extensions`, prune empties
//! - Phase 4: group applications per pool and write one document per pool,
//!   plus the system's `grants_pool.json` index, through the write guard

use daoip_common::config::PipelineConfig;
use daoip_common::extensions::prune_entity;
use daoip_common::ids::{slugify_or, IdScheme};
use daoip_common::model::{FundAmount, GrantApplication, GrantPool, GrantSystemDocument};
use daoip_common::schema::{APPLICATIONS_KEY, POOLS_KEY};
use daoip_common::values::{
    clean_value, parse_boolean, parse_currency, parse_date, parse_percentage,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::discovery::{APPLICATIONS_FILE_SUFFIX, POOL_INDEX_FILE};
use crate::error::EtlResult;
use crate::fixes::fix_root_key;
use crate::guard::{read_json, write_json_guarded, BackupSuffix, WriteOutcome};
use crate::lock::SystemLock;
use crate::mapping::{ColumnMapping, FieldMapping, ValueKind, APPLICATION_ID_TARGET};
use crate::migrate::FieldMigrator;
use crate::source::{load_records, SourceRecord};

const DEFAULT_DENOMINATION: &str = "USD";

/// Builds applications from records according to one mapping
pub struct RecordConverter<'a> {
    mapping: &'a FieldMapping,
    ids: IdScheme,
    default_created_at: String,
    migrator: FieldMigrator,
}

/// One converted row
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledApplication {
    pub pool_id: String,
    pub pool_name: String,
    pub application: GrantApplication,
}

impl<'a> RecordConverter<'a> {
    pub fn new(mapping: &'a FieldMapping, pipeline: &PipelineConfig) -> Self {
        let default_created_at = mapping
            .default_created_at
            .clone()
            .unwrap_or_else(|| pipeline.default_created_at.clone());
        Self {
            mapping,
            ids: IdScheme::new(&mapping.system),
            default_created_at,
            migrator: FieldMigrator::for_applications(mapping.extension_prefix()),
        }
    }

    pub fn ids(&self) -> &IdScheme {
        &self.ids
    }

    /// Pool id and display name for a record; `None` when the pool column is
    /// empty or its value has nothing to build an id from
    pub fn resolve_pool(&self, record: &SourceRecord) -> Option<(String, String)> {
        let pool = &self.mapping.pool;
        if let Some(id) = &pool.id {
            let name = pool.name.clone().unwrap_or_else(|| id.clone());
            return Some((id.clone(), name));
        }

        let column = pool.column.as_deref()?;
        let raw = record.text(column)?;
        let name = clean_value(&raw)?.to_string();
        let id = slugify_or(&name, "").replace('-', "_");
        if id.is_empty() {
            warn!(position = record.position, pool = %name, "Pool name has no id characters");
            return None;
        }
        Some((id, pool.name.clone().unwrap_or(name)))
    }

    /// Application id: the `applicationId` column, else the row position
    pub fn application_id(&self, record: &SourceRecord) -> String {
        let position = record.position.to_string();
        let column = self
            .mapping
            .columns
            .iter()
            .find(|c| c.target == APPLICATION_ID_TARGET);

        let Some(raw) = column.and_then(|c| record.text(&c.source)) else {
            return position;
        };
        match clean_value(&raw) {
            Some(id) if id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') => {
                id.to_string()
            }
            Some(id) => slugify_or(id, &position),
            None => position,
        }
    }

    /// Parse one mapped cell; `None` means "no value"
    fn parse_cell(&self, column: &ColumnMapping, record: &SourceRecord) -> Option<Value> {
        let raw = record.get(&column.source)?;

        if raw.is_array() || raw.is_object() {
            if column.kind == ValueKind::Text {
                return Some(raw.clone());
            }
            warn!(column = %column.source, "Nested value in a typed column, ignoring");
            return None;
        }

        let text = record.text(&column.source)?;
        match column.kind {
            ValueKind::Text => {
                clean_value(&text).map(|t| Value::String(truncate(t, column.max_length)))
            }
            ValueKind::Url => clean_value(&text).map(|t| Value::String(t.to_string())),
            ValueKind::Currency => {
                let amount = match raw.as_f64() {
                    Some(amount) => Some(amount),
                    None => parse_currency(&text),
                };
                Some(amount.map_or(Value::Null, |a| json!(a)))
            }
            ValueKind::Percentage => Some(json!(raw.as_f64().unwrap_or_else(|| parse_percentage(&text)))),
            ValueKind::Date => {
                clean_value(&text).map(|t| Value::String(parse_date(t, &self.default_created_at)))
            }
            ValueKind::Boolean => raw
                .as_bool()
                .or_else(|| parse_boolean(&text))
                .map(Value::Bool),
            ValueKind::Status => {
                clean_value(&text).map(|t| Value::String(self.mapping.map_status(t)))
            }
        }
    }

    /// Assemble a typed application; `None` when the row must be skipped
    pub fn assemble(&self, record: &SourceRecord) -> Option<AssembledApplication> {
        let Some((pool_id, pool_name)) = self.resolve_pool(record) else {
            warn!(position = record.position, "Row has no pool, skipping");
            return None;
        };
        let app_id = self.application_id(record);

        let mut cells = Vec::with_capacity(self.mapping.columns.len());
        for column in &self.mapping.columns {
            let value = self.parse_cell(column, record);
            if column.required && value.as_ref().map_or(true, Value::is_null) {
                warn!(
                    position = record.position,
                    column = %column.source,
                    "Required column is empty, skipping row"
                );
                return None;
            }
            if let Some(value) = value {
                cells.push((column, value));
            }
        }

        let project_name = cells
            .iter()
            .find(|(c, _)| c.target == "projectName")
            .and_then(|(_, v)| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Project-{app_id}"));

        let created_at = cells
            .iter()
            .find(|(c, _)| c.target == "createdAt")
            .and_then(|(_, v)| v.as_str())
            .map(|raw| parse_date(raw, &self.default_created_at))
            .unwrap_or_else(|| self.default_created_at.clone());

        let slug = slugify_or(&project_name, &format!("application-{app_id}"));
        let mut app = GrantApplication::new(
            self.ids.application(&pool_id, &app_id),
            self.ids.grant_pool(&pool_id),
            self.ids.project(&slug),
            project_name,
            created_at,
        );
        app.grant_pool_name = Some(pool_name.clone());

        for (column, value) in cells {
            apply_cell(&mut app, column, value);
        }

        Some(AssembledApplication {
            pool_id,
            pool_name,
            application: app,
        })
    }

    /// Serialize, migrate and prune an assembled application
    pub fn finalize(&self, application: &GrantApplication) -> EtlResult<Value> {
        let mut value = serde_json::to_value(application)?;
        self.migrator.migrate(&mut value);
        if let Some(map) = value.as_object_mut() {
            prune_entity(map);
        }
        Ok(value)
    }
}

fn apply_cell(app: &mut GrantApplication, column: &ColumnMapping, value: Value) {
    match (column.target.as_str(), value) {
        (APPLICATION_ID_TARGET, _) | ("projectName", _) | ("createdAt", _) => {}
        ("fundsPaid", value) if column.kind == ValueKind::Currency => {
            if let Some(amount) = value.as_f64().filter(|a| *a > 0.0) {
                let denomination = column.denomination.as_deref().unwrap_or(DEFAULT_DENOMINATION);
                app.funds_paid.push(FundAmount::new(amount, denomination));
            }
        }
        ("fundsApprovedInUSD", value) => app.funds_approved_in_usd = value.as_f64(),
        ("status", Value::String(s)) => app.status = Some(s),
        ("description", Value::String(s)) => app.description = Some(s),
        ("contentURI", Value::String(s)) => app.content_uri = Some(s),
        ("projectsURI", Value::String(s)) => app.projects_uri = Some(s),
        ("grantPoolName", Value::String(s)) => app.grant_pool_name = Some(s),
        (_, Value::Null) => {}
        (target, value) => {
            app.other.insert(target.to_string(), value);
        }
    }
}

fn truncate(text: &str, max_length: Option<usize>) -> String {
    match max_length {
        Some(max) if text.chars().count() > max => {
            let mut cut: String = text.chars().take(max).collect();
            cut.push_str("...");
            cut
        }
        _ => text.to_string(),
    }
}

/// Applications of one pool, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct PoolBatch {
    pub pool_id: String,
    pub pool_name: String,
    pub applications: Vec<Value>,
}

/// All pools built from one source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionBatch {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub pools: BTreeMap<String, PoolBatch>,
}

impl ConversionBatch {
    pub fn application_count(&self) -> usize {
        self.pools.values().map(|p| p.applications.len()).sum()
    }
}

/// Convert records into per-pool application lists
pub fn build_batch(
    mapping: &FieldMapping,
    records: &[SourceRecord],
    pipeline: &PipelineConfig,
) -> EtlResult<ConversionBatch> {
    // Mappings built in code skip the checks `FieldMapping::load` runs
    mapping.validate()?;
    let converter = RecordConverter::new(mapping, pipeline);
    let mut batch = ConversionBatch {
        rows_read: records.len(),
        ..ConversionBatch::default()
    };
    let mut seen: HashSet<String> = HashSet::new();

    for record in records {
        let Some(assembled) = converter.assemble(record) else {
            batch.rows_skipped += 1;
            continue;
        };

        if !seen.insert(assembled.application.id.clone()) {
            warn!(id = %assembled.application.id, "Duplicate application id, skipping row");
            batch.rows_skipped += 1;
            continue;
        }

        let value = converter.finalize(&assembled.application)?;
        batch
            .pools
            .entry(assembled.pool_id.clone())
            .or_insert_with(|| PoolBatch {
                pool_id: assembled.pool_id,
                pool_name: assembled.pool_name,
                applications: Vec::new(),
            })
            .applications
            .push(value);
    }

    debug!(
        rows = batch.rows_read,
        skipped = batch.rows_skipped,
        pools = batch.pools.len(),
        "Built conversion batch"
    );
    Ok(batch)
}

/// Grant system document holding one pool and its applications
pub fn pool_document(mapping: &FieldMapping, pool: &PoolBatch) -> EtlResult<Value> {
    let ids = IdScheme::new(&mapping.system);
    let mut document = GrantSystemDocument::new(mapping.display_name(), &mapping.system_type);
    document
        .grant_pools
        .push(GrantPool::new(ids.grant_pool(&pool.pool_id), &pool.pool_name));

    let mut value = document.to_value()?;
    if let Some(pool_value) = value[POOLS_KEY].get_mut(0).and_then(Value::as_object_mut) {
        pool_value.insert(
            APPLICATIONS_KEY.to_string(),
            Value::Array(pool.applications.clone()),
        );
    }
    Ok(value)
}

/// Pool index entry for `grants_pool.json`
pub fn index_entry(mapping: &FieldMapping, pool: &PoolBatch, pipeline: &PipelineConfig) -> GrantPool {
    let ids = IdScheme::new(&mapping.system);
    let mut entry = GrantPool::new(ids.grant_pool(&pool.pool_id), &pool.pool_name);
    entry.description = Some(
        mapping
            .pool
            .description
            .clone()
            .unwrap_or_else(|| format!("Grants pool for {}.", pool.pool_name)),
    );
    entry.is_open = Some(false);
    entry.applications_uri = pipeline.applications_uri_base.as_ref().map(|base| {
        format!(
            "{}/{}/{}{}",
            base.trim_end_matches('/'),
            mapping.system,
            pool.pool_id,
            APPLICATIONS_FILE_SUFFIX
        )
    });
    entry.required_credentials = pipeline.required_credentials.clone();
    entry
}

/// Merge pool entries into the system's `grants_pool.json`.
///
/// Existing pools are kept; an entry with the same id has the generated
/// fields overlaid and keeps any fields it already had.
pub fn update_pool_index(
    system_dir: &Path,
    mapping: &FieldMapping,
    entries: &[GrantPool],
) -> EtlResult<(PathBuf, WriteOutcome)> {
    let path = system_dir.join(POOL_INDEX_FILE);
    let existing = read_existing(&path);

    let mut document = match existing.clone() {
        Some(doc @ Value::Object(_)) => doc,
        _ => GrantSystemDocument::new(mapping.display_name(), &mapping.system_type).to_value()?,
    };
    fix_root_key(&mut document);

    if !document[POOLS_KEY].is_array() {
        document[POOLS_KEY] = Value::Array(Vec::new());
    }

    if let Some(pools) = document[POOLS_KEY].as_array_mut() {
        for entry in entries {
            let Value::Object(generated) = serde_json::to_value(entry)? else {
                continue;
            };
            let slot = pools
                .iter_mut()
                .find(|p| p.get("id").and_then(Value::as_str) == Some(entry.id.as_str()));
            match slot {
                Some(Value::Object(current)) => current.extend(generated),
                Some(other) => *other = Value::Object(generated),
                None => pools.push(Value::Object(generated)),
            }
        }
    }

    let outcome = write_json_guarded(&path, existing.as_ref(), &document, BackupSuffix::Backup)?;
    Ok((path, outcome))
}

/// Current content of a file, `None` when absent or unparseable
fn read_existing(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    match read_json(path) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Existing file unreadable, it will be replaced");
            None
        }
    }
}

/// Outcome of a full conversion run
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    pub system: String,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub applications: usize,
    pub files: Vec<(PathBuf, WriteOutcome)>,
    pub index: (PathBuf, WriteOutcome),
}

impl ConversionSummary {
    pub fn files_changed(&self) -> usize {
        self.files
            .iter()
            .chain(std::iter::once(&self.index))
            .filter(|(_, o)| o.changed())
            .count()
    }

    pub fn backups_created(&self) -> usize {
        self.files
            .iter()
            .chain(std::iter::once(&self.index))
            .filter(|(_, o)| o.backup().is_some())
            .count()
    }
}

/// Run the full pipeline for one source file into `<data_root>/<system>/`
pub fn convert(
    mapping: &FieldMapping,
    input: &Path,
    data_root: &Path,
    pipeline: &PipelineConfig,
) -> EtlResult<ConversionSummary> {
    info!(system = %mapping.system, input = %input.display(), "Converting source");

    let records = load_records(mapping, input)?;
    let batch = build_batch(mapping, &records, pipeline)?;

    let system_dir = data_root.join(&mapping.system);
    let _lock = SystemLock::acquire(&system_dir)?;

    let mut files = Vec::with_capacity(batch.pools.len());
    let mut entries = Vec::with_capacity(batch.pools.len());
    for pool in batch.pools.values() {
        let path = system_dir.join(format!("{}{}", pool.pool_id, APPLICATIONS_FILE_SUFFIX));
        let document = pool_document(mapping, pool)?;
        let existing = read_existing(&path);
        let outcome = write_json_guarded(&path, existing.as_ref(), &document, BackupSuffix::Backup)?;
        files.push((path, outcome));
        entries.push(index_entry(mapping, pool, pipeline));
    }

    let index = update_pool_index(&system_dir, mapping, &entries)?;

    Ok(ConversionSummary {
        system: mapping.system.clone(),
        rows_read: batch.rows_read,
        rows_skipped: batch.rows_skipped,
        applications: batch.application_count(),
        files,
        index,
    })
}
