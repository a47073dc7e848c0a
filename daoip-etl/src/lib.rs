//! # DAOIP-5 ETL pipeline
//!
//! Converts funder exports into DAOIP-5 documents and keeps the published
//! JSON tree healthy:
//! - `convert`: source records to grant system documents via a field mapping
//! - `migrate`: non-standard fields relocated into namespaced extensions
//! - `fixes`: repairs for critical validation findings
//! - `validators`: quality reports per system and across systems
//!
//! Every write to the published tree goes through [`guard`].

pub mod batch;
pub mod convert;
pub mod discovery;
pub mod error;
pub mod fixes;
pub mod guard;
pub mod lock;
pub mod mapping;
pub mod migrate;
pub mod source;
pub mod validators;

pub use error::{EtlError, EtlResult};
pub use mapping::FieldMapping;
