//! scholar-cypher: Read-only, schema-validated Cypher for Scholar.
//!
//! Two entry points produce a [`ValidationOutcome`]:
//! - [`Validator::validate`] for Cypher text written by an agent
//! - [`PlanCompiler::compile`] for a typed [`QueryPlan`]
//!
//! An accepted query is canonical text that is guaranteed read-only, uses
//! only kinds and properties known to the [`SchemaRegistry`](scholar_core::SchemaRegistry),
//! and carries a bounded result limit.

pub mod compiler;
pub mod error;
pub mod lexer;
pub mod normalize;
pub mod outcome;
pub mod plan;
pub mod validator;

pub use compiler::{compile, PlanCompiler};
pub use error::{ErrorKind, QueryError};
pub use normalize::{Normalized, Normalizer};
pub use outcome::{AliasRewrite, Rejection, ResultLimit, RewriteKind, ValidatedQuery, ValidationOutcome};
pub use plan::{
    AggregateFunction, Aggregation, Direction, Filter, FilterOp, FilterValue, MatchPattern,
    OrderBy, QueryPlan, SortDirection,
};
pub use validator::{is_read_only_procedure, validate, Validator, DEFAULT_MAX_RESULT_LIMIT};
