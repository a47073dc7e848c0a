//! daoip-etl - DAOIP-5 grant data pipeline
//!
//! Converts funder exports into DAOIP-5 JSON, migrates non-standard fields,
//! fixes critical issues and produces data quality reports.
//!
//! Log level precedence: `RUST_LOG` > `--log-level` > config `logging.level` > info

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daoip_common::config::{self, TomlConfig};
use daoip_etl::batch::{self, BatchSummary, FileStatus};
use daoip_etl::convert;
use daoip_etl::discovery::{check_funder_layout, list_systems};
use daoip_etl::mapping::FieldMapping;
use daoip_etl::validators::{
    self, save_comprehensive_report, validate_all, ComprehensiveReport, IssueCategory,
    QualityReport, ScoringPolicy,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for daoip-etl
#[derive(Parser, Debug)]
#[command(name = "daoip-etl")]
#[command(about = "Convert, normalise and validate DAOIP-5 grant data")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "DAOIP_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the published JSON tree (one directory per grant system)
    #[arg(long, global = true, env = "DAOIP_DATA_ROOT")]
    data_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one source file using a field mapping
    Convert {
        /// Field mapping TOML
        #[arg(long)]
        mapping: PathBuf,

        /// CSV or JSON source file
        #[arg(long)]
        input: PathBuf,
    },

    /// Move non-standard fields of a grant system into extensions
    Migrate {
        /// Grant system directory name (or path)
        system: String,
    },

    /// Apply critical fixes to a grant system, or to every system with `all`
    Fix {
        #[arg(default_value = "all")]
        target: String,
    },

    /// Validate one grant system and write its report
    Validate {
        /// Grant system directory name (or path)
        system: String,
    },

    /// Validate every grant system and write the comprehensive report
    ValidateAll,

    /// Validate everything, fix everything, validate again
    FullCheck,

    /// Check that a funder source directory has a mapping and CSV uploads
    Check {
        funder_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the requested command; `Ok(false)` means it completed with failures
fn run(cli: Cli) -> Result<bool> {
    let config_path = config::locate_config_file(cli.config.as_deref());
    let config = match &config_path {
        Some(path) if path.exists() => config::load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        _ => TomlConfig::default(),
    };

    init_tracing(cli.log_level.as_deref().unwrap_or(&config.logging.level));

    match &config_path {
        Some(path) if path.exists() => info!("Loaded configuration from {}", path.display()),
        Some(path) => warn!("Config file {} not found, using built-in defaults", path.display()),
        None => info!("No config file found, using built-in defaults"),
    }

    let data_root = config::resolve_data_root(cli.data_root.as_deref(), &config);
    info!("Data root: {}", data_root.display());

    let policy = ScoringPolicy::from(&config.quality);

    match cli.command {
        Command::Convert { mapping, input } => run_convert(&mapping, &input, &data_root, &config),
        Command::Migrate { system } => run_migrate(&system_dir(&data_root, &system)),
        Command::Fix { target } => run_fix(&data_root, &target),
        Command::Validate { system } => run_validate(&system_dir(&data_root, &system), &policy),
        Command::ValidateAll => run_validate_all(&data_root, &policy),
        Command::FullCheck => run_full_check(&data_root, &policy),
        Command::Check { funder_dir } => run_check(&funder_dir),
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

/// A bare name is a directory under the data root; anything with a separator is a path
fn system_dir(data_root: &Path, system: &str) -> PathBuf {
    let as_path = Path::new(system);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        as_path.to_path_buf()
    } else {
        data_root.join(system)
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_convert(mapping_path: &Path, input: &Path, data_root: &Path, config: &TomlConfig) -> Result<bool> {
    let mapping = FieldMapping::load(mapping_path)
        .with_context(|| format!("Invalid mapping {}", mapping_path.display()))?;

    println!("📊 Converting {} for {}", input.display(), mapping.display_name());
    let summary = convert::convert(&mapping, input, data_root, &config.pipeline)
        .with_context(|| format!("Conversion of {} failed", input.display()))?;

    for (path, outcome) in summary.files.iter().chain(std::iter::once(&summary.index)) {
        let name = file_label(path);
        match outcome.backup() {
            Some(backup) => println!("  ✓ Updated {} (backup: {})", name, file_label(backup)),
            None if outcome.changed() => println!("  ✓ Created {}", name),
            None => println!("  ℹ No changes: {}", name),
        }
    }

    println!("\n📊 Conversion Summary:");
    println!("   Rows read: {}", summary.rows_read);
    println!("   Rows skipped: {}", summary.rows_skipped);
    println!("   Applications: {}", summary.applications);
    println!("   Files changed: {}", summary.files_changed());
    println!("   Backups created: {}", summary.backups_created());
    Ok(true)
}

fn run_migrate(system_dir: &Path) -> Result<bool> {
    println!("🚀 Migrating fields to extensions: {}", system_dir.display());
    let (summary, stats) = batch::migrate_system(system_dir)
        .with_context(|| format!("Migration of {} failed", system_dir.display()))?;

    print_file_lines(&summary);
    println!("\n📊 Field Migration Summary:");
    print_batch_summary(&summary);
    println!("   Pools migrated: {}", stats.pools_migrated);
    println!(
        "   Applications migrated: {}/{}",
        stats.applications_migrated, stats.total_applications
    );
    println!("   Empty extension values pruned: {}", stats.extension_values_pruned);
    if stats.entities_skipped > 0 {
        println!("   Malformed entities skipped: {}", stats.entities_skipped);
    }
    Ok(!summary.has_failures())
}

fn run_fix(data_root: &Path, target: &str) -> Result<bool> {
    if target == "all" {
        println!("🔧 Applying critical fixes to all systems...");
        let results = batch::fix_all(data_root)
            .with_context(|| format!("Cannot list systems in {}", data_root.display()))?;

        let mut overall = BatchSummary::default();
        for result in results {
            println!("\n🔧 {}", result.system);
            print_file_lines(&result.summary);
            print_fix_counts(&result.counts);
            overall.merge(result.summary);
        }
        println!("\n📊 All systems:");
        print_batch_summary(&overall);
        return Ok(!overall.has_failures());
    }

    let system_dir = system_dir(data_root, target);
    println!("🔧 Applying critical fixes to: {}", system_dir.display());
    let (summary, counts) = batch::fix_system(&system_dir)
        .with_context(|| format!("Fixing {} failed", system_dir.display()))?;

    print_file_lines(&summary);
    println!("\n📊 Fixes Applied:");
    print_batch_summary(&summary);
    print_fix_counts(&counts);
    Ok(!summary.has_failures())
}

fn run_validate(system_dir: &Path, policy: &ScoringPolicy) -> Result<bool> {
    println!("🔍 Validating data quality for: {}", system_dir.display());
    let report = validators::validate_system(system_dir, policy)
        .with_context(|| format!("Validation of {} failed", system_dir.display()))?;
    let path = validators::save_report(system_dir, &report)?;
    println!("✓ Report saved to: {}", path.display());

    print_quality_report(&report);
    Ok(report.statistics.files_failed == 0)
}

fn run_validate_all(data_root: &Path, policy: &ScoringPolicy) -> Result<bool> {
    let report = validate_all(data_root, policy)
        .with_context(|| format!("Cannot validate systems in {}", data_root.display()))?;
    let path = save_comprehensive_report(data_root, &report)?;
    println!("\n📄 Comprehensive report saved to: {}", path.display());

    print_comprehensive_summary(&report);
    Ok(!report.has_failures())
}

fn run_full_check(data_root: &Path, policy: &ScoringPolicy) -> Result<bool> {
    println!("🚀 Running full data quality pipeline...");
    let systems = list_systems(data_root)
        .with_context(|| format!("Cannot list systems in {}", data_root.display()))?;
    info!("Full check over {} systems", systems.len());

    // Phase 1: baseline validation
    let baseline_ok = run_validate_all(data_root, policy)?;

    // Phase 2: fixes
    let fixes_ok = run_fix(data_root, "all")?;

    // Phase 3: re-validate after fixes
    let final_ok = run_validate_all(data_root, policy)?;

    if !baseline_ok && final_ok {
        println!("\n✓ Fixes resolved all hard failures");
    }
    Ok(fixes_ok && final_ok)
}

fn run_check(funder_dir: &Path) -> Result<bool> {
    match check_funder_layout(funder_dir) {
        Ok(layout) => {
            println!("✓ Valid structure found in {}", funder_dir.display());
            println!("   Mapping file: {}", file_label(&layout.mapping));
            println!("   CSV files: {} found", layout.csv_files.len());
            Ok(true)
        }
        Err(e) => {
            println!("✗ {}", e);
            Ok(false)
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_file_lines(summary: &BatchSummary) {
    for file in &summary.files {
        let name = file_label(&file.path);
        match &file.status {
            FileStatus::Updated { backup: Some(backup) } => {
                println!("  ✓ Updated {} (backup: {})", name, file_label(backup))
            }
            FileStatus::Updated { backup: None } => println!("  ✓ Created {}", name),
            FileStatus::Unchanged => println!("  ℹ No changes: {}", name),
            FileStatus::Failed { error } => println!("  ✗ {}: {}", name, error),
        }
    }
}

fn print_batch_summary(summary: &BatchSummary) {
    println!("   Files processed: {}", summary.processed);
    println!("   Updated: {}", summary.updated);
    println!("   Unchanged: {}", summary.unchanged);
    println!("   Backups created: {}", summary.backups_created);
    if summary.failures > 0 {
        println!("   Failures: {}", summary.failures);
    }
}

fn print_fix_counts(counts: &daoip_etl::fixes::FixCounts) {
    println!("   Schema fixes: {}", counts.schema_fixes);
    println!("   Date fixes: {}", counts.date_fixes);
    println!("   Unknown amount fixes: {}", counts.unknown_amount_fixes);
    println!("   Id namespace fixes: {}", counts.id_namespace_fixes);
    println!("   Empty extension values pruned: {}", counts.extension_values_pruned);
}

fn print_quality_report(report: &QualityReport) {
    let stats = &report.statistics;
    println!("\n📊 Validation Summary:");
    println!("   Quality Score: {}/100 ({})", report.quality_score, report.band().as_str());
    println!("   Files Processed: {}", stats.files_processed);
    if stats.files_failed > 0 {
        println!("   Files Failed: {}", stats.files_failed);
    }
    println!("   Total Applications: {}", stats.total_applications);
    println!("   Valid Applications: {}", stats.valid_applications);
    println!("   Critical Issues: {}", report.issues.critical.len());
    println!("   Schema Issues: {}", report.issues.schema.len());
    println!("   Data Quality Issues: {}", report.issues.data_quality.len());
    println!("   Warnings: {}", report.issues.warnings.len());

    let critical = report.issues.list(IssueCategory::Critical);
    if !critical.is_empty() {
        println!("\n🚨 Critical Issues:");
        for issue in critical.iter().take(5) {
            println!("   - {}", issue);
        }
        if critical.len() > 5 {
            println!("   ... and {} more", critical.len() - 5);
        }
    }
}

fn print_comprehensive_summary(report: &ComprehensiveReport) {
    let summary = &report.summary;
    println!("\n🎯 Comprehensive Validation Summary");
    println!("{}", "=".repeat(50));
    println!("Total Systems: {}", report.total_systems);
    println!("Successful Validations: {}", summary.successful_validations);
    println!("Failed Validations: {}", summary.failed_validations);
    println!("Average Quality Score: {:.1}/100", summary.average_quality_score);

    println!("\n📊 Aggregated Statistics:");
    println!("   Total Applications: {}", summary.total_applications);
    println!("   Total Grant Pools: {}", summary.total_grant_pools);
    println!("   Total Files: {}", summary.total_files);
    if summary.files_failed > 0 {
        println!("   Unreadable Files: {}", summary.files_failed);
    }

    println!("\n🏆 Systems by Quality:");
    let bands = &summary.systems_by_quality;
    for (label, systems) in [
        ("Excellent", &bands.excellent),
        ("Good", &bands.good),
        ("Fair", &bands.fair),
        ("Poor", &bands.poor),
    ] {
        if !systems.is_empty() {
            println!("   {}: {}", label, systems.join(", "));
        }
    }

    println!("\n⚠️  Global Issues Summary:");
    for (label, category) in [
        ("Critical", IssueCategory::Critical),
        ("Schema", IssueCategory::Schema),
        ("Data Quality", IssueCategory::DataQuality),
        ("Warnings", IssueCategory::Warning),
    ] {
        let issues = report.global_issues.list(category);
        if issues.is_empty() {
            continue;
        }
        println!("   {}: {} issues", label, issues.len());
        for issue in issues.iter().take(3) {
            println!("     - {}", issue);
        }
        if issues.len() > 3 {
            println!("     ... and {} more", issues.len() - 3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["daoip-etl", "--data-root", "/tmp/json", "fix"]).unwrap();
        assert_eq!(cli.data_root, Some(PathBuf::from("/tmp/json")));
        assert!(matches!(cli.command, Command::Fix { ref target } if target == "all"));

        let cli = Cli::try_parse_from([
            "daoip-etl",
            "convert",
            "--mapping",
            "m.toml",
            "--input",
            "in.csv",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Convert { .. }));

        assert!(Cli::try_parse_from(["daoip-etl", "validate-all"]).is_ok());
        assert!(Cli::try_parse_from(["daoip-etl", "full-check"]).is_ok());
        assert!(Cli::try_parse_from(["daoip-etl", "validate"]).is_err());
    }

    #[test]
    fn test_system_dir_resolution() {
        let root = Path::new("/data/json");
        assert_eq!(system_dir(root, "celo"), PathBuf::from("/data/json/celo"));
        assert_eq!(system_dir(root, "/other/celo"), PathBuf::from("/other/celo"));
        assert_eq!(system_dir(root, "rel/celo"), PathBuf::from("rel/celo"));
    }
}
