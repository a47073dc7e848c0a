//! Critical-issue fixer
//!
//! Repairs the findings the validator reports as critical or schema issues in
//! already-published files. Fixes run in a fixed order:
//!
//! 1. Root `grant_pools` renamed to `grantPools` (only when the canonical key is absent)
//! 2. `amount` / `denomination` equal to `"Unknown"` replaced with null, anywhere
//! 3. Application `createdAt`, `updatedAt`, `closeDate` normalised to ISO-8601
//! 4. Legacy `daoip5:` ids rewritten to `daoip-5:`
//! 5. Empty extension values pruned

use daoip_common::extensions::prune_entity;
use daoip_common::ids::upgrade_legacy_id;
use daoip_common::schema::{APPLICATIONS_KEY, APPLICATION_DATE_FIELDS, LEGACY_POOLS_KEY, POOLS_KEY};
use daoip_common::time::is_iso8601;
use daoip_common::values::try_parse_date;
use serde::Serialize;
use serde_json::Value;
use std::ops::AddAssign;
use tracing::debug;

use crate::migrate::pools_mut;

const UNKNOWN_MARKER: &str = "Unknown";

/// Count of each fix applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixCounts {
    pub schema_fixes: usize,
    pub unknown_amount_fixes: usize,
    pub date_fixes: usize,
    pub id_namespace_fixes: usize,
    pub extension_values_pruned: usize,
}

impl FixCounts {
    pub fn total(&self) -> usize {
        self.schema_fixes
            + self.unknown_amount_fixes
            + self.date_fixes
            + self.id_namespace_fixes
            + self.extension_values_pruned
    }
}

impl AddAssign for FixCounts {
    fn add_assign(&mut self, other: Self) {
        self.schema_fixes += other.schema_fixes;
        self.unknown_amount_fixes += other.unknown_amount_fixes;
        self.date_fixes += other.date_fixes;
        self.id_namespace_fixes += other.id_namespace_fixes;
        self.extension_values_pruned += other.extension_values_pruned;
    }
}

/// Apply every fix to a document in place
pub fn fix_document(document: &mut Value) -> FixCounts {
    let mut counts = FixCounts {
        schema_fixes: fix_root_key(document),
        unknown_amount_fixes: fix_unknown_amounts(document),
        ..FixCounts::default()
    };
    counts.date_fixes = fix_application_dates(document);
    counts.id_namespace_fixes = fix_legacy_ids(document);
    counts.extension_values_pruned = prune_extensions(document);

    debug!(total = counts.total(), "Applied document fixes");
    counts
}

/// Rename the legacy root key; returns 1 when renamed
pub fn fix_root_key(document: &mut Value) -> usize {
    let Some(root) = document.as_object_mut() else {
        return 0;
    };
    if root.contains_key(POOLS_KEY) {
        return 0;
    }
    match root.remove(LEGACY_POOLS_KEY) {
        Some(pools) => {
            root.insert(POOLS_KEY.to_string(), pools);
            1
        }
        None => 0,
    }
}

/// Replace `"Unknown"` amounts and denominations with null, recursively
pub fn fix_unknown_amounts(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let mut fixed = 0;
            for (key, child) in map.iter_mut() {
                let is_marker = matches!(&*child, Value::String(s) if s.as_str() == UNKNOWN_MARKER);
                if is_marker && (key == "amount" || key == "denomination") {
                    *child = Value::Null;
                    fixed += 1;
                } else {
                    fixed += fix_unknown_amounts(child);
                }
            }
            fixed
        }
        Value::Array(items) => items.iter_mut().map(fix_unknown_amounts).sum(),
        _ => 0,
    }
}

/// Normalise application date fields that are parseable but not yet ISO-8601
pub fn fix_application_dates(document: &mut Value) -> usize {
    let mut fixed = 0;
    for app in applications_mut(document) {
        let Some(app) = app.as_object_mut() else {
            continue;
        };
        for field in APPLICATION_DATE_FIELDS {
            let Some(Value::String(raw)) = app.get(*field) else {
                continue;
            };
            if raw.is_empty() || is_iso8601(raw) {
                continue;
            }
            if let Some(normalised) = try_parse_date(raw) {
                app.insert(field.to_string(), Value::String(normalised));
                fixed += 1;
            }
        }
    }
    fixed
}

/// Rewrite `daoip5:` ids in keys named `id` or ending in `Id`, recursively
pub fn fix_legacy_ids(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let mut fixed = 0;
            for (key, child) in map.iter_mut() {
                if is_id_key(key) {
                    if let Value::String(s) = child {
                        if let Some(upgraded) = upgrade_legacy_id(s) {
                            *s = upgraded;
                            fixed += 1;
                            continue;
                        }
                    }
                }
                fixed += fix_legacy_ids(child);
            }
            fixed
        }
        Value::Array(items) => items.iter_mut().map(fix_legacy_ids).sum(),
        _ => 0,
    }
}

fn is_id_key(key: &str) -> bool {
    key == "id" || key.ends_with("Id")
}

/// Prune empty extension values on every pool and application
pub fn prune_extensions(document: &mut Value) -> usize {
    let Some(pools) = pools_mut(document) else {
        return 0;
    };
    let mut pruned = 0;
    for pool in pools.iter_mut() {
        let Some(pool) = pool.as_object_mut() else {
            continue;
        };
        pruned += prune_entity(pool);
        if let Some(Value::Array(apps)) = pool.get_mut(APPLICATIONS_KEY) {
            pruned += apps
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .map(prune_entity)
                .sum::<usize>();
        }
    }
    pruned
}

fn applications_mut(document: &mut Value) -> impl Iterator<Item = &mut Value> {
    pools_mut(document)
        .into_iter()
        .flat_map(|pools| pools.iter_mut())
        .filter_map(|pool| pool.get_mut(APPLICATIONS_KEY)?.as_array_mut())
        .flat_map(|apps| apps.iter_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_document() -> Value {
        json!({
            "@context": "http://www.daostar.org/schemas",
            "name": "Stellar",
            "type": "Foundation",
            "grant_pools": [{
                "type": "GrantPool",
                "id": "daoip5:stellar:grantPool:scf_1",
                "name": "SCF #1",
                "applications": [{
                    "type": "GrantApplication",
                    "id": "daoip5:stellar:grantPool:scf_1:grantApplication:1",
                    "grantPoolId": "daoip5:stellar:grantPool:scf_1",
                    "projectName": "Acme",
                    "createdAt": "12/01/2024",
                    "updatedAt": "not a date",
                    "fundsApproved": [{"amount": "Unknown", "denomination": "Unknown"}],
                    "extensions": {"stellar.email": "", "stellar.region": "EU"}
                }]
            }]
        })
    }

    #[test]
    fn test_fix_document_applies_all_fixes() {
        let mut doc = legacy_document();
        let counts = fix_document(&mut doc);

        assert_eq!(counts.schema_fixes, 1);
        assert_eq!(counts.unknown_amount_fixes, 2);
        assert_eq!(counts.date_fixes, 1);
        assert_eq!(counts.id_namespace_fixes, 3);
        assert_eq!(counts.extension_values_pruned, 1);

        assert!(doc.get("grant_pools").is_none());
        let app = &doc["grantPools"][0]["applications"][0];
        assert_eq!(app["createdAt"], "2024-12-01T00:00:00Z");
        assert_eq!(app["updatedAt"], "not a date");
        assert_eq!(app["fundsApproved"][0], json!({"amount": null, "denomination": null}));
        assert_eq!(app["id"], "daoip-5:stellar:grantPool:scf_1:grantApplication:1");
        assert_eq!(app["extensions"], json!({"stellar.region": "EU"}));
    }

    #[test]
    fn test_fix_document_is_idempotent() {
        let mut doc = legacy_document();
        fix_document(&mut doc);
        let once = doc.clone();
        let counts = fix_document(&mut doc);
        assert_eq!(counts.total(), 0);
        assert_eq!(doc, once);
    }

    #[test]
    fn test_root_key_kept_when_both_present() {
        let mut doc = json!({"grantPools": [], "grant_pools": [{"id": "x"}]});
        assert_eq!(fix_root_key(&mut doc), 0);
        assert!(doc.get("grant_pools").is_some());
    }

    #[test]
    fn test_unknown_only_replaced_for_amount_keys() {
        let mut doc = json!({"status": "Unknown", "payouts": [{"amount": "Unknown"}]});
        assert_eq!(fix_unknown_amounts(&mut doc), 1);
        assert_eq!(doc["status"], "Unknown");
    }

    #[test]
    fn test_legacy_ids_only_on_id_keys() {
        let mut doc = json!({"projectId": "daoip5:x:project:a", "description": "daoip5:x"});
        assert_eq!(fix_legacy_ids(&mut doc), 1);
        assert_eq!(doc["projectId"], "daoip-5:x:project:a");
        assert_eq!(doc["description"], "daoip5:x");
    }
}
