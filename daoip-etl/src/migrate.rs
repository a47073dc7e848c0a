//! Field Classifier / Migrator
//!
//! Partitions an entity's keys into standard schema fields and everything
//! else, relocating the latter into the namespaced `extensions` bag.
//!
//! A second pass over an already-migrated entity finds no non-standard keys
//! and reports `false`, so the migration is idempotent.

use daoip_common::extensions::{namespaced_key, prune_entity};
use daoip_common::schema::{
    APPLICATIONS_KEY, APPLICATION_FIELDS, EXTENSIONS_KEY, LEGACY_POOLS_KEY, POOLS_KEY, POOL_FIELDS,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Moves non-standard fields of one entity type into `extensions`
#[derive(Debug, Clone)]
pub struct FieldMigrator {
    allow_list: &'static [&'static str],
    prefix: String,
}

impl FieldMigrator {
    pub fn new(allow_list: &'static [&'static str], prefix: impl Into<String>) -> Self {
        Self {
            allow_list,
            prefix: prefix.into(),
        }
    }

    /// Migrator for GrantApplication entities
    pub fn for_applications(prefix: impl Into<String>) -> Self {
        Self::new(APPLICATION_FIELDS, prefix)
    }

    /// Migrator for GrantPool entities (`applications` stays in place)
    pub fn for_pools(prefix: impl Into<String>) -> Self {
        Self::new(POOL_FIELDS, prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Keys of `entity` outside the allow-list, in key order
    pub fn non_standard_fields(&self, entity: &Map<String, Value>) -> Vec<String> {
        entity
            .keys()
            .filter(|key| !self.allow_list.contains(&key.as_str()))
            .cloned()
            .collect()
    }

    /// Migrate one entity in place.
    ///
    /// Returns whether the entity changed, decided by structural comparison
    /// against its pre-image. Non-object entities are skipped with a warning.
    pub fn migrate(&self, entity: &mut Value) -> bool {
        let Value::Object(map) = entity else {
            warn!("Skipping non-object entity during field migration");
            return false;
        };

        let non_standard = self.non_standard_fields(map);
        if non_standard.is_empty() {
            return false;
        }

        let pre_image = map.clone();
        let mut extensions = take_extensions(map, &self.prefix);

        for field in non_standard {
            let Some(value) = map.remove(&field) else {
                continue;
            };
            let key = namespaced_key(&self.prefix, &field);
            if let Some(existing) = extensions.get(&key) {
                if existing != &value {
                    warn!(key = %key, "Extension key already present, top-level value wins");
                }
            }
            extensions.insert(key, value);
        }

        map.insert(EXTENSIONS_KEY.to_string(), Value::Object(extensions));
        *map != pre_image
    }
}

/// Remove and return the entity's extension bag, always as an object.
///
/// A non-object `extensions` value is kept under `<prefix>.extensions`.
fn take_extensions(map: &mut Map<String, Value>, prefix: &str) -> Map<String, Value> {
    match map.remove(EXTENSIONS_KEY) {
        Some(Value::Object(existing)) => existing,
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            warn!("Non-object extensions value preserved under a namespaced key");
            let mut wrapped = Map::new();
            wrapped.insert(namespaced_key(prefix, EXTENSIONS_KEY), other);
            wrapped
        }
    }
}

/// Counters for one document migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    pub pools_migrated: usize,
    pub applications_migrated: usize,
    pub total_applications: usize,
    pub extension_values_pruned: usize,
    pub entities_skipped: usize,
}

impl MigrationStats {
    pub fn modified(&self) -> bool {
        self.pools_migrated > 0 || self.applications_migrated > 0 || self.extension_values_pruned > 0
    }
}

/// Migrate every pool and application of a grant system document.
///
/// Empty extension values are pruned afterwards so nothing empty is persisted.
pub fn migrate_document(document: &mut Value, prefix: &str) -> MigrationStats {
    let pool_migrator = FieldMigrator::for_pools(prefix);
    let app_migrator = FieldMigrator::for_applications(prefix);
    let mut stats = MigrationStats::default();

    let Some(pools) = pools_mut(document) else {
        debug!("Document has no pools array, nothing to migrate");
        return stats;
    };

    for pool in pools.iter_mut() {
        if !pool.is_object() {
            stats.entities_skipped += 1;
        }
        if pool_migrator.migrate(pool) {
            stats.pools_migrated += 1;
        }

        let Some(pool_map) = pool.as_object_mut() else {
            continue;
        };
        stats.extension_values_pruned += prune_entity(pool_map);

        let Some(Value::Array(applications)) = pool_map.get_mut(APPLICATIONS_KEY) else {
            continue;
        };
        for app in applications.iter_mut() {
            stats.total_applications += 1;
            if !app.is_object() {
                stats.entities_skipped += 1;
            }
            if app_migrator.migrate(app) {
                stats.applications_migrated += 1;
            }
            if let Some(app_map) = app.as_object_mut() {
                stats.extension_values_pruned += prune_entity(app_map);
            }
        }
    }

    stats
}

/// Pools array under the canonical key, falling back to the legacy key
pub(crate) fn pools_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
    let root = document.as_object_mut()?;
    let key = if root.contains_key(POOLS_KEY) {
        POOLS_KEY
    } else {
        LEGACY_POOLS_KEY
    };
    root.get_mut(key)?.as_array_mut()
}

/// Read-only counterpart of [`pools_mut`]
pub(crate) fn pools(document: &Value) -> Option<&Vec<Value>> {
    document
        .get(POOLS_KEY)
        .or_else(|| document.get(LEGACY_POOLS_KEY))?
        .as_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_entity_is_unchanged() {
        let migrator = FieldMigrator::for_applications("celo");
        let mut app = json!({"type": "GrantApplication", "id": "x", "projectName": "A"});
        let before = app.clone();
        assert!(!migrator.migrate(&mut app));
        assert_eq!(app, before);
    }

    #[test]
    fn test_no_data_loss_on_migration() {
        let migrator = FieldMigrator::for_applications("celo");
        let mut app = json!({"id": "x", "teamSize": {"devs": 3}, "extensions": {"x": 1}});
        assert!(migrator.migrate(&mut app));
        assert_eq!(
            app,
            json!({"id": "x", "extensions": {"x": 1, "celo.teamSize": {"devs": 3}}})
        );
    }

    #[test]
    fn test_migration_is_idempotent() {
        let migrator = FieldMigrator::for_applications("stellar");
        let mut app = json!({"id": "x", "region": "EU", "awardType": "grant", "website": "https://a.io"});
        assert!(migrator.migrate(&mut app));
        let once = app.clone();
        assert!(!migrator.migrate(&mut app));
        assert_eq!(app, once);
    }

    #[test]
    fn test_already_prefixed_key_not_double_prefixed() {
        let migrator = FieldMigrator::for_applications("celo");
        let mut app = json!({"id": "x", "celo.region": "Africa"});
        migrator.migrate(&mut app);
        assert_eq!(app["extensions"], json!({"celo.region": "Africa"}));
    }

    #[test]
    fn test_top_level_value_wins_on_collision() {
        let migrator = FieldMigrator::for_applications("celo");
        let mut app = json!({"id": "x", "region": "new", "extensions": {"celo.region": "old"}});
        migrator.migrate(&mut app);
        assert_eq!(app["extensions"]["celo.region"], "new");
    }

    #[test]
    fn test_non_object_entity_skipped() {
        let migrator = FieldMigrator::for_applications("celo");
        let mut row = json!(["not", "an", "entity"]);
        assert!(!migrator.migrate(&mut row));
    }

    #[test]
    fn test_non_object_extensions_preserved() {
        let migrator = FieldMigrator::for_applications("celo");
        let mut app = json!({"id": "x", "extensions": "legacy", "region": "EU"});
        assert!(migrator.migrate(&mut app));
        assert_eq!(
            app["extensions"],
            json!({"celo.extensions": "legacy", "celo.region": "EU"})
        );
    }

    #[test]
    fn test_migrate_document_covers_pools_and_applications() {
        let mut doc = json!({
            "@context": "http://www.daostar.org/schemas",
            "name": "Celo",
            "type": "Foundation",
            "grantPools": [{
                "type": "GrantPool",
                "id": "p",
                "name": "P",
                "roundNumber": 3,
                "applications": [
                    {"id": "a1", "region": "EU", "email": ""},
                    {"id": "a2"},
                    "garbage"
                ]
            }]
        });

        let stats = migrate_document(&mut doc, "celo");
        assert_eq!(stats.pools_migrated, 1);
        assert_eq!(stats.applications_migrated, 1);
        assert_eq!(stats.total_applications, 3);
        assert_eq!(stats.entities_skipped, 1);
        assert_eq!(stats.extension_values_pruned, 1);

        let pool = &doc["grantPools"][0];
        assert_eq!(pool["extensions"]["celo.roundNumber"], 3);
        assert!(pool["applications"].is_array());
        assert_eq!(pool["applications"][0]["extensions"], json!({"celo.region": "EU"}));

        let second = migrate_document(&mut doc, "celo");
        assert!(!second.modified());
    }
}
