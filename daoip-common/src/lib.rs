//! # DAOIP-5 Common Library
//!
//! Shared code for the DAOIP-5 grant-data tooling including:
//! - Value parsers for currency, percentage, date and boolean cells
//! - Canonical id and slug generation
//! - Schema constants and standard-field allow-lists
//! - Typed grant system / pool / application documents
//! - Extension bag helpers
//! - Configuration loading

pub mod config;
pub mod error;
pub mod extensions;
pub mod ids;
pub mod model;
pub mod schema;
pub mod time;
pub mod values;

pub use error::{Error, Result};
pub use model::{FundAmount, GrantApplication, GrantPool, GrantSystemDocument};
