//! scholar-core: Schema registry, shared scoring types, configuration, and
//! error handling for Scholar.
//!
//! This crate provides the foundation used by every other Scholar crate:
//! - The [`SchemaRegistry`] of entity kinds, relationship kinds and property aliases
//! - Scoring types ([`CentralityVector`], [`ConfidenceScore`], [`EvidenceCategory`])
//! - [`Settings`] loading from `scholar.toml` and `SCHOLAR__*` environment variables
//! - The top-level [`ScholarError`]

pub mod config;
pub mod error;
pub mod schema;
pub mod types;

pub use config::Settings;
pub use error::ScholarError;
pub use schema::{SchemaDefinition, SchemaRegistry};
pub use types::{CentralityVector, ConfidenceLevel, ConfidenceScore, EvidenceCategory, WorkId};
