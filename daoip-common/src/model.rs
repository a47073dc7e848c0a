//! Typed DAOIP-5 documents
//!
//! These types are what the converter builds. Tools that rewrite published
//! files (migration, fixes, validation) work on `serde_json::Value` instead,
//! because they must cope with whatever shape is on disk.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{CONTEXT_URL, GRANT_APPLICATION_TYPE, GRANT_POOL_TYPE};

/// Namespaced extension bag
pub type Extensions = Map<String, Value>;

/// Root document of a grant system file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantSystemDocument {
    #[serde(rename = "@context")]
    pub context: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "grantPools", default)]
    pub grant_pools: Vec<GrantPool>,
}

impl GrantSystemDocument {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            context: CONTEXT_URL.to_string(),
            name: name.into(),
            kind: kind.into(),
            grant_pools: Vec::new(),
        }
    }

    /// Serialize to a JSON value (keys sorted, so structural comparison is stable)
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// One funding round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantPool {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "isOpen", default, skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,
    #[serde(rename = "applicationsURI", default, skip_serializing_if = "Option::is_none")]
    pub applications_uri: Option<String>,
    #[serde(rename = "requiredCredentials", default, skip_serializing_if = "Vec::is_empty")]
    pub required_credentials: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<Vec<GrantApplication>>,
}

impl GrantPool {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: GRANT_POOL_TYPE.to_string(),
            id: id.into(),
            name: name.into(),
            description: None,
            is_open: None,
            applications_uri: None,
            required_credentials: Vec::new(),
            extensions: Map::new(),
            applications: None,
        }
    }
}

/// `{amount, denomination}` pair used by fund lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundAmount {
    pub amount: Option<f64>,
    pub denomination: Option<String>,
}

impl FundAmount {
    pub fn new(amount: f64, denomination: impl Into<String>) -> Self {
        Self {
            amount: Some(amount),
            denomination: Some(denomination.into()),
        }
    }
}

/// One project's submission to a pool
///
/// `other` holds mapped fields outside the schema. They serialize at the top
/// level until the migrator relocates them into `extensions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantApplication {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(rename = "grantPoolId")]
    pub grant_pool_id: String,
    #[serde(rename = "grantPoolName", default, skip_serializing_if = "Option::is_none")]
    pub grant_pool_name: Option<String>,
    #[serde(rename = "projectsURI", default, skip_serializing_if = "Option::is_none")]
    pub projects_uri: Option<String>,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "contentURI", default, skip_serializing_if = "Option::is_none")]
    pub content_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "fundsApprovedInUSD", default, skip_serializing_if = "Option::is_none")]
    pub funds_approved_in_usd: Option<f64>,
    #[serde(rename = "fundsPaid", default, skip_serializing_if = "Vec::is_empty")]
    pub funds_paid: Vec<FundAmount>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Extensions,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl GrantApplication {
    pub fn new(
        id: impl Into<String>,
        grant_pool_id: impl Into<String>,
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            kind: GRANT_APPLICATION_TYPE.to_string(),
            id: id.into(),
            grant_pool_id: grant_pool_id.into(),
            grant_pool_name: None,
            projects_uri: None,
            project_id: project_id.into(),
            project_name: project_name.into(),
            created_at: created_at.into(),
            content_uri: None,
            description: None,
            status: None,
            funds_approved_in_usd: None,
            funds_paid: Vec::new(),
            extensions: Map::new(),
            other: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_application_serializes_schema_names() {
        let mut app = GrantApplication::new(
            "daoip-5:celo:grantPool:p:grantApplication:1",
            "daoip-5:celo:grantPool:p",
            "daoip-5:celo:project:acme",
            "Acme",
            "2024-01-01T00:00:00Z",
        );
        app.funds_approved_in_usd = Some(10.0);
        app.funds_paid.push(FundAmount::new(5.0, "USD"));

        let value = serde_json::to_value(&app).unwrap();
        assert_eq!(value["type"], "GrantApplication");
        assert_eq!(value["grantPoolId"], "daoip-5:celo:grantPool:p");
        assert_eq!(value["fundsApprovedInUSD"], 10.0);
        assert_eq!(value["fundsPaid"], json!([{"amount": 5.0, "denomination": "USD"}]));
        // Unset optionals are omitted
        assert!(value.get("contentURI").is_none());
        assert!(value.get("extensions").is_none());
    }

    #[test]
    fn test_application_other_fields_flatten_to_top_level() {
        let mut app = GrantApplication::new("a", "p", "x", "X", "2024-01-01T00:00:00Z");
        app.other.insert("teamMembers".into(), json!("alice, bob"));

        let value = serde_json::to_value(&app).unwrap();
        assert_eq!(value["teamMembers"], "alice, bob");

        let back: GrantApplication = serde_json::from_value(value).unwrap();
        assert_eq!(back, app);
    }

    #[test]
    fn test_document_uses_canonical_root_key() {
        let mut doc = GrantSystemDocument::new("Celo", "Foundation");
        doc.grant_pools.push(GrantPool::new("daoip-5:celo:grantPool:p", "p"));

        let value = doc.to_value().unwrap();
        assert_eq!(value["@context"], CONTEXT_URL);
        assert!(value.get("grantPools").is_some());
        assert!(value.get("grant_pools").is_none());
        assert_eq!(value["grantPools"][0]["type"], "GrantPool");
    }
}
