//! lm-core - Core library for Lendmill
//!
//! This crate provides the shared types, environment-driven configuration,
//! validation rules, and enrichment business rules used across all Lendmill
//! components. It has no database dependency; everything here is pure.

pub mod config;
pub mod enrich;
pub mod error;
pub mod record;
pub mod validate;

pub use config::{EtlConfig, RunMode, WarehouseConfig};
pub use enrich::{CreditTier, TermCategory};
pub use error::{CoreError, CoreResult};
pub use record::Record;
pub use validate::{ErrorKind, Severity, ValidationError};
