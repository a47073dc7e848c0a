//! Validation rules
//!
//! Each rule is a predicate over one document, entity or field that records
//! findings into an [`Issues`] set. Rules never fail; malformed input is
//! itself a finding.

use daoip_common::extensions::is_empty_placeholder;
use daoip_common::schema::{
    APPLICATIONS_KEY, APPLICATION_DATE_FIELDS, APPLICATION_URL_FIELDS, EXTENSIONS_KEY,
    FUND_LIST_FIELDS, LEGACY_POOLS_KEY, PLACEHOLDER_PROJECT_IDS, PLACEHOLDER_PROJECT_NAMES,
    PLACEHOLDER_URLS, POOLS_KEY, REQUIRED_APPLICATION_FIELDS,
};
use daoip_common::time::is_iso8601;
use serde_json::Value;
use url::Url;

use super::report::{IssueCategory, Issues};
use crate::migrate::pools;

const UNKNOWN_MARKER: &str = "Unknown";

/// Counts for one validated document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentCounts {
    pub grant_pools: usize,
    pub applications: usize,
    pub valid_applications: usize,
}

/// Root key naming drift
pub fn check_schema_consistency(document: &Value, issues: &mut Issues) -> bool {
    if document.get(LEGACY_POOLS_KEY).is_some() && document.get(POOLS_KEY).is_none() {
        issues.push(
            IssueCategory::Schema,
            "Uses 'grant_pools' instead of 'grantPools' at root level",
        );
        return false;
    }
    true
}

/// Validate a whole grant system document
pub fn check_document(document: &Value, issues: &mut Issues) -> DocumentCounts {
    let mut counts = DocumentCounts::default();

    if !document.is_object() {
        issues.push(IssueCategory::Critical, "Document root is not a JSON object");
        return counts;
    }
    check_schema_consistency(document, issues);

    let Some(pool_list) = pools(document) else {
        issues.push(IssueCategory::Warning, "Document has no grant pools array");
        return counts;
    };

    for (pool_index, pool) in pool_list.iter().enumerate() {
        counts.grant_pools += 1;
        let Some(pool_map) = pool.as_object() else {
            issues.push(
                IssueCategory::Critical,
                format!("Grant pool at index {pool_index} is not an object"),
            );
            continue;
        };
        let pool_label = pool_map
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        check_extension_placeholders(pool, &format!("grant pool {pool_label}"), issues);

        let Some(applications) = pool_map.get(APPLICATIONS_KEY).and_then(Value::as_array) else {
            continue;
        };
        for (app_index, app) in applications.iter().enumerate() {
            counts.applications += 1;
            if app.is_object() {
                if check_application(app, issues) {
                    counts.valid_applications += 1;
                }
            } else {
                issues.push(
                    IssueCategory::Critical,
                    format!("Application {app_index} in grant pool {pool_label} is not an object"),
                );
            }
        }
    }

    counts
}

/// Validate one application; `true` when it has no critical issue
pub fn check_application(app: &Value, issues: &mut Issues) -> bool {
    let critical_before = issues.critical.len();
    let app_id = app.get("id").and_then(Value::as_str).unwrap_or("unknown");

    for field in REQUIRED_APPLICATION_FIELDS {
        if app.get(*field).map_or(true, Value::is_null) {
            issues.push(
                IssueCategory::Critical,
                format!("Missing required field '{field}' in application {app_id}"),
            );
        }
    }

    check_placeholders(app, app_id, issues);

    for field in APPLICATION_DATE_FIELDS {
        if let Some(value) = app.get(*field) {
            check_date(value, &format!("application {app_id} {field}"), issues);
        }
    }

    for field in APPLICATION_URL_FIELDS {
        if let Some(value) = app.get(*field) {
            check_url(value, &format!("application {app_id} {field}"), issues);
        }
    }

    check_funds(app, app_id, issues);
    check_extension_placeholders(app, &format!("application {app_id}"), issues);

    issues.critical.len() == critical_before
}

fn check_placeholders(app: &Value, app_id: &str, issues: &mut Issues) {
    if let Some(name) = app.get("projectName").and_then(Value::as_str) {
        if PLACEHOLDER_PROJECT_NAMES.contains(&name) {
            issues.push(
                IssueCategory::DataQuality,
                format!("Placeholder project name in application {app_id}: {name}"),
            );
        }
    }

    if let Some(project_id) = app.get("projectId").and_then(Value::as_str) {
        let slug = project_id.rsplit(':').next().unwrap_or(project_id);
        if PLACEHOLDER_PROJECT_IDS.contains(&project_id) || PLACEHOLDER_PROJECT_IDS.contains(&slug) {
            issues.push(
                IssueCategory::DataQuality,
                format!("Placeholder project ID in application {app_id}: {project_id}"),
            );
        }
    }
}

/// Null and empty dates are acceptable; anything else must be ISO-8601
pub fn check_date(value: &Value, label: &str, issues: &mut Issues) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) if s.is_empty() || is_iso8601(s) => true,
        other => {
            let shown = other.as_str().map_or_else(|| other.to_string(), str::to_string);
            issues.push(
                IssueCategory::Critical,
                format!("Invalid date format in {label}: {shown}"),
            );
            false
        }
    }
}

/// Null and empty URLs are acceptable; placeholders and scheme/host-less URLs are not
pub fn check_url(value: &Value, label: &str, issues: &mut Issues) -> bool {
    let url = match value {
        Value::Null => return true,
        Value::String(s) if s.is_empty() => return true,
        Value::String(s) => s,
        other => {
            issues.push(
                IssueCategory::DataQuality,
                format!("Invalid URL format in {label}: {other}"),
            );
            return false;
        }
    };

    if PLACEHOLDER_URLS.contains(&url.as_str()) {
        issues.push(
            IssueCategory::DataQuality,
            format!("Placeholder URL in {label}: {url}"),
        );
        return false;
    }

    let well_formed = Url::parse(url)
        .map(|parsed| !parsed.scheme().is_empty() && parsed.has_host())
        .unwrap_or(false);
    if !well_formed {
        issues.push(
            IssueCategory::DataQuality,
            format!("Invalid URL format in {label}: {url}"),
        );
    }
    well_formed
}

fn check_funds(app: &Value, app_id: &str, issues: &mut Issues) {
    for field in FUND_LIST_FIELDS {
        let Some(funds) = app.get(*field).and_then(Value::as_array) else {
            continue;
        };
        for (i, fund) in funds.iter().enumerate() {
            let Some(amount) = fund.get("amount") else {
                continue;
            };
            match amount {
                Value::Null | Value::Number(_) => {}
                Value::String(s) if s == UNKNOWN_MARKER => issues.push(
                    IssueCategory::Critical,
                    format!(
                        "String 'Unknown' found in {field}[{i}].amount for application {app_id} - should be null"
                    ),
                ),
                other => issues.push(
                    IssueCategory::DataQuality,
                    format!(
                        "Invalid amount type in {field}[{i}] for application {app_id}: {}",
                        json_type_name(other)
                    ),
                ),
            }
        }
    }
}

fn check_extension_placeholders(entity: &Value, label: &str, issues: &mut Issues) {
    let Some(extensions) = entity.get(EXTENSIONS_KEY).and_then(Value::as_object) else {
        return;
    };
    for (key, value) in extensions {
        if is_empty_placeholder(value) {
            issues.push(
                IssueCategory::Warning,
                format!("Empty extension value '{key}' in {label}"),
            );
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_app() -> Value {
        json!({
            "type": "GrantApplication",
            "id": "daoip-5:celo:grantPool:p:grantApplication:1",
            "grantPoolId": "daoip-5:celo:grantPool:p",
            "projectId": "daoip-5:celo:project:acme",
            "projectName": "Acme",
            "createdAt": "2024-01-01T00:00:00Z",
            "contentURI": "https://acme.io/proposal",
            "fundsApproved": [{"amount": 10.0, "denomination": "USD"}]
        })
    }

    #[test]
    fn test_valid_application_has_no_issues() {
        let mut issues = Issues::default();
        assert!(check_application(&valid_app(), &mut issues));
        assert_eq!(issues.total(), 0);
    }

    #[test]
    fn test_missing_required_fields_are_critical() {
        let mut app = valid_app();
        app.as_object_mut().unwrap().remove("projectName");
        app["createdAt"] = Value::Null;

        let mut issues = Issues::default();
        assert!(!check_application(&app, &mut issues));
        assert_eq!(issues.critical.len(), 2);
        assert!(issues.critical[0].contains("'projectName'"));
    }

    #[test]
    fn test_unknown_amount_is_critical() {
        let mut app = valid_app();
        app["fundsApproved"] = json!([{"amount": "Unknown"}, {"amount": "12"}]);

        let mut issues = Issues::default();
        assert!(!check_application(&app, &mut issues));
        assert_eq!(issues.critical.len(), 1);
        assert_eq!(issues.data_quality.len(), 1);
        assert!(issues.data_quality[0].contains("string"));
    }

    #[test]
    fn test_date_formats() {
        let mut issues = Issues::default();
        assert!(check_date(&json!("2024-01-01T00:00:00Z"), "d", &mut issues));
        assert!(check_date(&json!("2024-01-01T00:00:00.000Z"), "d", &mut issues));
        assert!(check_date(&json!(null), "d", &mut issues));
        assert!(!check_date(&json!("12/01/2024"), "d", &mut issues));
        assert!(!check_date(&json!(20240101), "d", &mut issues));
        assert_eq!(issues.critical.len(), 2);
    }

    #[test]
    fn test_url_rules() {
        let mut issues = Issues::default();
        assert!(check_url(&json!("https://a.io/x"), "u", &mut issues));
        assert!(check_url(&json!(""), "u", &mut issues));
        assert!(!check_url(&json!("URL not available"), "u", &mut issues));
        assert!(!check_url(&json!("www.example.com"), "u", &mut issues));
        assert!(!check_url(&json!("mailto:a@b.c"), "u", &mut issues));
        assert_eq!(issues.data_quality.len(), 3);
        assert!(issues.data_quality[0].starts_with("Placeholder URL"));
    }

    #[test]
    fn test_placeholder_project_values() {
        let mut app = valid_app();
        app["projectName"] = json!("Unnamed Project");
        app["projectId"] = json!("daoip-5:celo:project:unknown-project");

        let mut issues = Issues::default();
        assert!(check_application(&app, &mut issues));
        assert_eq!(issues.data_quality.len(), 2);
    }

    #[test]
    fn test_document_level_checks() {
        let doc = json!({
            "grant_pools": [{
                "id": "p",
                "extensions": {"celo.email": ""},
                "applications": [valid_app(), "junk"]
            }]
        });

        let mut issues = Issues::default();
        let counts = check_document(&doc, &mut issues);
        assert_eq!(counts.grant_pools, 1);
        assert_eq!(counts.applications, 2);
        assert_eq!(counts.valid_applications, 1);
        assert_eq!(issues.schema.len(), 1);
        assert_eq!(issues.critical.len(), 1);
        assert_eq!(issues.warnings.len(), 1);
    }

    #[test]
    fn test_document_without_pools_warns() {
        let mut issues = Issues::default();
        let counts = check_document(&json!({"name": "x"}), &mut issues);
        assert_eq!(counts, DocumentCounts::default());
        assert_eq!(issues.warnings, vec!["Document has no grant pools array"]);
    }
}
