//! DAOIP-5 schema constants
//!
//! Key names, entity type tags, and the allow-lists that decide which fields
//! stay at the top level of an entity and which belong in `extensions`.

/// JSON-LD context written at the root of every document
pub const CONTEXT_URL: &str = "http://www.daostar.org/schemas";

pub const CONTEXT_KEY: &str = "@context";
pub const POOLS_KEY: &str = "grantPools";
/// Root key used by older converters; flagged as schema drift
pub const LEGACY_POOLS_KEY: &str = "grant_pools";
pub const APPLICATIONS_KEY: &str = "applications";
pub const EXTENSIONS_KEY: &str = "extensions";

pub const GRANT_POOL_TYPE: &str = "GrantPool";
pub const GRANT_APPLICATION_TYPE: &str = "GrantApplication";

/// Fields a GrantApplication may carry at the top level.
///
/// The DAOIP-5 application fields plus the handful of descriptive fields the
/// published datasets already use at top level.
pub const APPLICATION_FIELDS: &[&str] = &[
    // DAOIP-5 GrantApplication
    "type",
    "id",
    "grantPoolsURI",
    "grantPoolId",
    "grantPoolName",
    "projectsURI",
    "projectId",
    "projectName",
    "createdAt",
    "updatedAt",
    "closeDate",
    "contentURI",
    "discussionsTo",
    "licenseURI",
    "isInactive",
    "applicationCompletionRate",
    "socials",
    "fundsAsked",
    "fundsAskedInUSD",
    "fundsApproved",
    "fundsApprovedInUSD",
    "payoutAddress",
    "status",
    "payouts",
    "extensions",
    // Accepted descriptive fields
    "@context",
    "name",
    "description",
    "title",
    "fundsPaid",
    "mostRecentPaymentDate",
    "latestTranche",
    "awardType",
    "category",
    "completionPercentage",
];

/// Fields a GrantPool may carry at the top level
pub const POOL_FIELDS: &[&str] = &[
    "type",
    "id",
    "name",
    "description",
    "grantFundingMechanism",
    "isOpen",
    "closeDate",
    "applicationsURI",
    "governanceURI",
    "attestationIssuersURI",
    "requiredCredentials",
    "totalGrantPoolSize",
    "email",
    "image",
    "coverImage",
    "extensions",
    "applications",
];

/// Application fields that must be present and non-null
pub const REQUIRED_APPLICATION_FIELDS: &[&str] =
    &["type", "id", "grantPoolId", "projectName", "createdAt"];

/// Application date fields normalised to ISO-8601
pub const APPLICATION_DATE_FIELDS: &[&str] = &["createdAt", "updatedAt", "closeDate"];

/// Application fields expected to hold URLs
pub const APPLICATION_URL_FIELDS: &[&str] = &["projectsURI", "contentURI"];

/// Application fields holding `[{amount, denomination}]` lists
pub const FUND_LIST_FIELDS: &[&str] = &["fundsAsked", "fundsApproved"];

/// Placeholder project names left behind by older converters
pub const PLACEHOLDER_PROJECT_NAMES: &[&str] = &["Unnamed Project", "Unknown", ""];

/// Placeholder project ids left behind by older converters
pub const PLACEHOLDER_PROJECT_IDS: &[&str] = &["unknown-project", "Unknown", ""];

/// Placeholder URL strings left behind by older converters
pub const PLACEHOLDER_URLS: &[&str] = &[
    "URL not available",
    "Content URL not available",
    "not available",
];

pub fn is_application_field(name: &str) -> bool {
    APPLICATION_FIELDS.contains(&name)
}

pub fn is_pool_field(name: &str) -> bool {
    POOL_FIELDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields_are_standard() {
        for field in REQUIRED_APPLICATION_FIELDS {
            assert!(is_application_field(field), "{field} missing from allow-list");
        }
    }

    #[test]
    fn test_checked_fields_survive_migration() {
        for field in APPLICATION_DATE_FIELDS.iter().chain(APPLICATION_URL_FIELDS) {
            assert!(is_application_field(field), "{field} missing from allow-list");
        }
    }

    #[test]
    fn test_extensions_always_allowed() {
        assert!(is_application_field(EXTENSIONS_KEY));
        assert!(is_pool_field(EXTENSIONS_KEY));
        assert!(is_pool_field(APPLICATIONS_KEY));
    }

    #[test]
    fn test_non_standard_fields_rejected() {
        assert!(!is_application_field("teamMembers"));
        assert!(!is_pool_field("roundName"));
    }
}
