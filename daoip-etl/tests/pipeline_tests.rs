//! End-to-end pipeline tests: convert, migrate, fix and validate a data root

use daoip_common::config::PipelineConfig;
use daoip_etl::batch::{fix_system, migrate_system};
use daoip_etl::convert::convert;
use daoip_etl::guard::WriteOutcome;
use daoip_etl::validators::{validate_system, ScoringPolicy};
use daoip_etl::FieldMapping;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CELO_MAPPING: &str = r#"
version = 1
system = "celo"
system_name = "Celo"
system_type = "Foundation"

[pool]
id = "mint_growth"
name = "Mint Growth"

[[columns]]
source = "ID"
target = "applicationId"

[[columns]]
source = "Submission / Project"
target = "projectName"
required = true

[[columns]]
source = "Total Awarded (USD)"
target = "fundsApprovedInUSD"
kind = "currency"

[[columns]]
source = "Status"
target = "status"
kind = "status"

[[columns]]
source = "Region"
target = "region"

[status_map]
Passed = "Awarded"
"#;

const CELO_CSV: &str = "\u{feff}ID,Submission / Project,Total Awarded (USD),Status,Region\n\
7,Acme DApp,\"$1,000.00\",Passed,LATAM\n\
8,,\"$50\",Passed,\n";

fn read(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn setup() -> (TempDir, FieldMapping, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("celo.csv");
    fs::write(&input, CELO_CSV).unwrap();
    let mapping = FieldMapping::from_toml(CELO_MAPPING).unwrap();
    (dir, mapping, input)
}

#[test]
fn test_convert_writes_canonical_documents() {
    let (dir, mapping, input) = setup();
    let data_root = dir.path().join("json");

    let summary = convert(&mapping, &input, &data_root, &PipelineConfig::default()).unwrap();
    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.applications, 1);
    assert_eq!(summary.files_changed(), 2);
    assert_eq!(summary.backups_created(), 0);

    let doc = read(&data_root.join("celo").join("mint_growth_applications_uri.json"));
    assert_eq!(doc["name"], "Celo");
    let pool = &doc["grantPools"][0];
    assert_eq!(pool["id"], "daoip-5:celo:grantPool:mint_growth");

    let app = &pool["applications"][0];
    assert_eq!(app["id"], "daoip-5:celo:grantPool:mint_growth:grantApplication:7");
    assert_eq!(app["grantPoolId"], "daoip-5:celo:grantPool:mint_growth");
    assert_eq!(app["projectId"], "daoip-5:celo:project:acme-dapp");
    assert_eq!(app["projectName"], "Acme DApp");
    assert_eq!(app["fundsApprovedInUSD"], json!(1000.0));
    assert_eq!(app["status"], "Awarded");
    assert_eq!(app["extensions"], json!({"celo.region": "LATAM"}));
    assert!(app.get("region").is_none());

    let index = read(&data_root.join("celo").join("grants_pool.json"));
    let entries = index["grantPools"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "daoip-5:celo:grantPool:mint_growth");
    assert_eq!(entries[0]["isOpen"], json!(false));
    assert!(!data_root.join("celo").join(".daoip.lock").exists());
}

#[test]
fn test_rerun_is_a_no_op() {
    let (dir, mapping, input) = setup();
    let data_root = dir.path().join("json");
    let pipeline = PipelineConfig::default();

    convert(&mapping, &input, &data_root, &pipeline).unwrap();
    let second = convert(&mapping, &input, &data_root, &pipeline).unwrap();

    assert_eq!(second.files_changed(), 0);
    assert_eq!(second.backups_created(), 0);
    assert!(second.files.iter().all(|(_, o)| *o == WriteOutcome::Unchanged));
    assert_eq!(second.index.1, WriteOutcome::Unchanged);

    let backups = fs::read_dir(data_root.join("celo"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().contains("backup"))
        .count();
    assert_eq!(backups, 0);
}

#[test]
fn test_index_keeps_hand_edited_pools() {
    let (dir, mapping, input) = setup();
    let data_root = dir.path().join("json");
    let system_dir = data_root.join("celo");
    fs::create_dir_all(&system_dir).unwrap();
    fs::write(
        system_dir.join("grants_pool.json"),
        serde_json::to_string_pretty(&json!({
            "@context": "http://www.daostar.org/schemas",
            "name": "Celo",
            "type": "Foundation",
            "grantPools": [
                {"type": "GrantPool", "id": "daoip-5:celo:grantPool:season_1", "name": "Season 1"},
                {"type": "GrantPool", "id": "daoip-5:celo:grantPool:mint_growth", "name": "Mint Growth", "email": "grants@celo.org"}
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    let summary = convert(&mapping, &input, &data_root, &PipelineConfig::default()).unwrap();
    assert!(summary.index.1.backup().is_some());

    let index = read(&system_dir.join("grants_pool.json"));
    let entries = index["grantPools"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "Season 1");
    assert_eq!(entries[1]["email"], "grants@celo.org");
    assert_eq!(entries[1]["description"], "Grants pool for Mint Growth.");
}

#[test]
fn test_converted_output_is_stable_under_migrate_and_fix() {
    let (dir, mapping, input) = setup();
    let data_root = dir.path().join("json");
    convert(&mapping, &input, &data_root, &PipelineConfig::default()).unwrap();
    let system_dir = data_root.join("celo");

    let (migrated, _) = migrate_system(&system_dir).unwrap();
    assert_eq!(migrated.processed, 2);
    assert_eq!(migrated.updated, 0);

    let (fixed, counts) = fix_system(&system_dir).unwrap();
    assert_eq!(fixed.updated, 0);
    assert_eq!(counts.total(), 0);

    let report = validate_system(&system_dir, &ScoringPolicy::default()).unwrap();
    assert!(report.issues.critical.is_empty());
    assert_eq!(report.statistics.total_applications, 1);
    assert_eq!(report.statistics.valid_applications, 1);
    assert_eq!(report.statistics.files_processed, 2);
}

#[test]
fn test_fix_then_validate_clears_critical_issues() {
    let dir = TempDir::new().unwrap();
    let system_dir = dir.path().join("stellar");
    fs::create_dir(&system_dir).unwrap();
    let path = system_dir.join("scf_1_applications_uri.json");
    let original = json!({
        "name": "Stellar",
        "type": "Foundation",
        "grant_pools": [{
            "type": "GrantPool",
            "id": "daoip5:stellar:grantPool:scf_1",
            "name": "SCF 1",
            "applications": [{
                "type": "GrantApplication",
                "id": "daoip5:stellar:grantPool:scf_1:grantApplication:1",
                "grantPoolId": "daoip5:stellar:grantPool:scf_1",
                "projectName": "Acme",
                "createdAt": "2024-03-05",
                "fundsApproved": [{"amount": "Unknown", "denomination": "Unknown"}]
            }]
        }]
    });
    fs::write(&path, serde_json::to_string_pretty(&original).unwrap()).unwrap();

    let before = validate_system(&system_dir, &ScoringPolicy::default()).unwrap();
    assert!(!before.issues.critical.is_empty());
    assert!(!before.issues.schema.is_empty());

    let (summary, counts) = fix_system(&system_dir).unwrap();
    assert_eq!(summary.backups_created, 1);
    assert_eq!(counts.schema_fixes, 1);
    assert_eq!(counts.unknown_amount_fixes, 2);
    assert_eq!(counts.date_fixes, 1);
    assert_eq!(read(&system_dir.join("scf_1_applications_uri.json.backup")), original);

    let after = validate_system(&system_dir, &ScoringPolicy::default()).unwrap();
    assert!(after.issues.critical.is_empty());
    assert!(after.issues.schema.is_empty());
    assert!(after.quality_score > before.quality_score);

    let fixed = read(&path);
    let app = &fixed["grantPools"][0]["applications"][0];
    assert_eq!(app["createdAt"], "2024-03-05T00:00:00Z");
    assert_eq!(app["id"], "daoip-5:stellar:grantPool:scf_1:grantApplication:1");
    assert_eq!(app["fundsApproved"][0]["amount"], Value::Null);
}
