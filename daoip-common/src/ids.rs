//! Canonical id and slug generation
//!
//! Ids are colon-joined URNs under the `daoip-5` namespace:
//!
//! ```text
//! daoip-5:<system>:grantPool:<poolId>
//! daoip-5:<system>:grantPool:<poolId>:grantApplication:<appId>
//! daoip-5:<system>:project:<slug>
//! ```
//!
//! Every function here is pure: the same input always yields the same output,
//! which is what makes pipeline re-runs a no-op.

use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical id namespace
pub const NAMESPACE: &str = "daoip-5";

/// Namespace used by older published files
pub const LEGACY_NAMESPACE: &str = "daoip5";

/// Slug used when a name has no usable characters
pub const UNKNOWN_PROJECT_SLUG: &str = "unknown-project";

const POOL_SEGMENT: &str = "grantPool";
const APPLICATION_SEGMENT: &str = "grantApplication";
const PROJECT_SEGMENT: &str = "project";

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static HYPHEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Turn a display name into a lowercase, hyphenated slug.
///
/// Falls back to `"unknown-project"` when nothing survives normalisation.
///
/// # Examples
///
/// ```
/// use daoip_common::ids::slugify;
///
/// assert_eq!(slugify("My Project!! "), "my-project");
/// assert_eq!(slugify("Acme DApp"), "acme-dapp");
/// assert_eq!(slugify("!!!"), "unknown-project");
/// ```
pub fn slugify(name: &str) -> String {
    slugify_or(name, UNKNOWN_PROJECT_SLUG)
}

/// Like [`slugify`] but with a caller-chosen fallback
pub fn slugify_or(name: &str, fallback: &str) -> String {
    let lowered = name.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    let hyphenated = WHITESPACE_RUN.replace_all(kept.trim(), "-");
    let collapsed = HYPHEN_RUN.replace_all(&hyphenated, "-");
    let slug = collapsed.trim_matches('-');

    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug.to_string()
    }
}

/// Id composer bound to one grant system
///
/// # Examples
///
/// ```
/// use daoip_common::ids::IdScheme;
///
/// let ids = IdScheme::new("celo");
/// assert_eq!(ids.grant_pool("mint_growth"), "daoip-5:celo:grantPool:mint_growth");
/// assert_eq!(
///     ids.application("mint_growth", "7"),
///     "daoip-5:celo:grantPool:mint_growth:grantApplication:7"
/// );
/// assert_eq!(ids.project("acme-dapp"), "daoip-5:celo:project:acme-dapp");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdScheme {
    system: String,
}

impl IdScheme {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }

    /// Grant system this scheme composes ids for
    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn grant_pool(&self, pool_id: &str) -> String {
        compose(&[NAMESPACE, &self.system, POOL_SEGMENT, pool_id])
    }

    pub fn application(&self, pool_id: &str, app_id: &str) -> String {
        compose(&[
            NAMESPACE,
            &self.system,
            POOL_SEGMENT,
            pool_id,
            APPLICATION_SEGMENT,
            app_id,
        ])
    }

    pub fn project(&self, slug: &str) -> String {
        compose(&[NAMESPACE, &self.system, PROJECT_SEGMENT, slug])
    }
}

fn compose(segments: &[&str]) -> String {
    segments.join(":")
}

/// Rewrite a legacy `daoip5:` id to the canonical `daoip-5:` namespace.
///
/// Returns `None` when the value is not a legacy id.
pub fn upgrade_legacy_id(value: &str) -> Option<String> {
    value
        .strip_prefix(LEGACY_NAMESPACE)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(|rest| format!("{NAMESPACE}:{rest}"))
}
