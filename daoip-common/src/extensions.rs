//! Extension bag helpers
//!
//! Extensions are a flat map of namespaced keys (`stellar.teamMembers`,
//! `org.stellar.communityfund.awardType`) to arbitrary JSON. Empty values are
//! pruned before anything is persisted.

use serde_json::{Map, Value};

use crate::schema::EXTENSIONS_KEY;

/// Build `<prefix>.<field>`, leaving already-namespaced fields alone
pub fn namespaced_key(prefix: &str, field: &str) -> String {
    if prefix.is_empty() || field.starts_with(&format!("{prefix}.")) {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

/// True for `null`, blank strings and `"N/A"`
pub fn is_empty_placeholder(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a")
        }
        _ => false,
    }
}

/// Remove empty placeholder values from an extension map.
///
/// Returns the number of keys removed.
pub fn prune(extensions: &mut Map<String, Value>) -> usize {
    let before = extensions.len();
    extensions.retain(|_, value| !is_empty_placeholder(value));
    before - extensions.len()
}

/// Prune the `extensions` bag of an entity, dropping the bag if it ends up empty
pub fn prune_entity(entity: &mut Map<String, Value>) -> usize {
    let Some(Value::Object(extensions)) = entity.get_mut(EXTENSIONS_KEY) else {
        return 0;
    };
    let removed = prune(extensions);
    if extensions.is_empty() {
        entity.remove(EXTENSIONS_KEY);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(namespaced_key("celo", "region"), "celo.region");
        assert_eq!(namespaced_key("celo", "celo.region"), "celo.region");
        assert_eq!(namespaced_key("", "region"), "region");
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_empty_placeholder(&json!(null)));
        assert!(is_empty_placeholder(&json!("")));
        assert!(is_empty_placeholder(&json!("  ")));
        assert!(is_empty_placeholder(&json!("N/A")));
        assert!(is_empty_placeholder(&json!("n/a")));
        assert!(!is_empty_placeholder(&json!(0)));
        assert!(!is_empty_placeholder(&json!(false)));
        assert!(!is_empty_placeholder(&json!([])));
        assert!(!is_empty_placeholder(&json!("Africa")));
    }

    #[test]
    fn test_prune_removes_only_placeholders() {
        let mut ext = json!({
            "celo.region": "Africa",
            "celo.email": "",
            "celo.logo": null,
            "celo.notes": "N/A",
            "celo.count": 0
        });
        let removed = prune(ext.as_object_mut().unwrap());
        assert_eq!(removed, 3);
        assert_eq!(ext, json!({"celo.region": "Africa", "celo.count": 0}));
    }

    #[test]
    fn test_prune_entity_drops_empty_bag() {
        let mut app = json!({"id": "x", "extensions": {"celo.email": ""}});
        let removed = prune_entity(app.as_object_mut().unwrap());
        assert_eq!(removed, 1);
        assert_eq!(app, json!({"id": "x"}));
    }
}
