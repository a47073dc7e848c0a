//! Record sources
//!
//! Both input formats are reduced to a list of [`SourceRecord`]s: a position
//! (1-based, stable across re-runs of the same file) and a JSON object of
//! fields. CSV rows become flat string maps; JSON records keep their nesting
//! and are addressed with dotted paths (`metadata.website`).

use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{EtlError, EtlResult};
use crate::mapping::{FieldMapping, SourceFormat};

/// One input row
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// 1-based position in the source
    pub position: usize,
    pub fields: Map<String, Value>,
}

impl SourceRecord {
    pub fn new(position: usize, fields: Map<String, Value>) -> Self {
        Self { position, fields }
    }

    /// Look up a field by exact key, then by dotted path
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(key) {
            return Some(value);
        }
        if !key.contains('.') {
            return None;
        }
        let mut parts = key.split('.');
        let first = parts.next()?;
        parts.try_fold(self.fields.get(first)?, |current, part| current.get(part))
    }

    /// Field rendered as text (`None` for missing, null and nested values)
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Read CSV rows from a file
pub fn read_csv(path: &Path) -> EtlResult<Vec<SourceRecord>> {
    let file = std::fs::File::open(path).map_err(|e| EtlError::source_error(path, e))?;
    read_csv_from(file).map_err(|e| match e {
        EtlError::Source { message, .. } => EtlError::source_error(path, message),
        other => other,
    })
}

/// Read CSV rows from any reader.
///
/// Headers are trimmed and a UTF-8 BOM on the first header is dropped. Rows
/// that fail to decode are skipped with a warning; their position is still
/// consumed so later rows keep stable ids.
pub fn read_csv_from<R: Read>(reader: R) -> EtlResult<Vec<SourceRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| EtlError::source_error("<csv>", e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (index, row) in csv_reader.records().enumerate() {
        let position = index + 1;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(position, error = %e, "Skipping unreadable CSV row");
                continue;
            }
        };

        let fields: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.clone(), Value::String(cell.to_string())))
            .collect();
        records.push(SourceRecord::new(position, fields));
    }

    debug!(rows = records.len(), "Read CSV records");
    Ok(records)
}

/// Extract records from a parsed JSON document.
///
/// With a `records` path (`data.rounds`) the array at that path is used;
/// without one the document itself must be an array. Non-object entries are
/// skipped with a warning.
pub fn records_from_json(document: &Value, records_path: Option<&str>) -> EtlResult<Vec<SourceRecord>> {
    let mut target = document;
    if let Some(path) = records_path {
        for part in path.split('.').filter(|p| !p.is_empty()) {
            target = target.get(part).ok_or_else(|| {
                EtlError::Mapping(format!("Records path '{}' not found (missing '{}')", path, part))
            })?;
        }
    }

    let Value::Array(items) = target else {
        return Err(EtlError::Mapping(format!(
            "Records path '{}' does not point at an array",
            records_path.unwrap_or("<root>")
        )));
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Object(fields) => records.push(SourceRecord::new(index + 1, fields.clone())),
            other => warn!(position = index + 1, kind = json_kind(other), "Skipping non-object JSON record"),
        }
    }
    Ok(records)
}

/// Read JSON records from a file
pub fn read_json_records(path: &Path, records_path: Option<&str>) -> EtlResult<Vec<SourceRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| EtlError::source_error(path, e))?;
    let document: Value =
        serde_json::from_str(&content).map_err(|e| EtlError::source_error(path, e))?;
    records_from_json(&document, records_path)
}

/// Load records using the format declared in the mapping
pub fn load_records(mapping: &FieldMapping, path: &Path) -> EtlResult<Vec<SourceRecord>> {
    if !path.exists() {
        return Err(EtlError::NotFound(path.to_path_buf()));
    }
    match mapping.source.format {
        SourceFormat::Csv => read_csv(path),
        SourceFormat::Json => read_json_records(path, mapping.source.records.as_deref()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
