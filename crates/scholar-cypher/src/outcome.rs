//! Validation results.
//!
//! A query is either fully accepted or fully rejected; there is no partial
//! state. [`ValidatedQuery`] has no public constructor, so holding one is
//! proof the text went through the validator.

use serde::Serialize;
use thiserror::Error;

use crate::error::{ErrorKind, QueryError};

/// The effective result-size bound of an accepted query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultLimit {
    /// A literal bound, already at or below the ceiling.
    Literal(u64),
    /// `LIMIT $name`; clamped to the ceiling when parameters are bound.
    Parameter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteKind {
    Relationship,
    Property,
    /// An inferred relationship expanded into the path it stands for.
    Inferred,
}

/// One alias replaced by its canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRewrite {
    pub kind: RewriteKind,
    pub from: String,
    pub to: String,
    /// Byte offset of the alias in the submitted text.
    pub offset: usize,
}

/// Canonical, read-only, schema-consistent query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedQuery {
    query: String,
    limit: Option<ResultLimit>,
    clamped: bool,
    limit_injected: bool,
    max_result_limit: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    limit_parameters: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rewrites: Vec<AliasRewrite>,
}

impl ValidatedQuery {
    pub(crate) fn new(
        query: String,
        limit: Option<ResultLimit>,
        clamped: bool,
        limit_injected: bool,
        max_result_limit: u64,
        limit_parameters: Vec<String>,
        rewrites: Vec<AliasRewrite>,
    ) -> Self {
        Self {
            query,
            limit,
            clamped,
            limit_injected,
            max_result_limit,
            limit_parameters,
            rewrites,
        }
    }

    pub fn text(&self) -> &str {
        &self.query
    }

    /// Limit of the last query part. Set on every accepted query; a part
    /// ending in `CALL ... YIELD` gets a bounded RETURN of its columns.
    pub fn limit(&self) -> Option<&ResultLimit> {
        self.limit.as_ref()
    }

    /// A literal limit above the ceiling was lowered.
    pub fn clamped(&self) -> bool {
        self.clamped
    }

    /// No limit was present and the ceiling was appended.
    pub fn limit_injected(&self) -> bool {
        self.limit_injected
    }

    pub fn max_result_limit(&self) -> u64 {
        self.max_result_limit
    }

    /// Parameter names used as `LIMIT` values anywhere in the query.
    pub fn limit_parameters(&self) -> &[String] {
        &self.limit_parameters
    }

    pub fn rewrites(&self) -> &[AliasRewrite] {
        &self.rewrites
    }

    pub fn into_text(self) -> String {
        self.query
    }
}

/// A refused query: kind, message, and the token that caused it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{error_kind}: {message}")]
pub struct Rejection {
    pub error_kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offending_token: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl From<QueryError> for Rejection {
    fn from(err: QueryError) -> Self {
        Self {
            error_kind: err.kind(),
            message: err.to_string(),
            offending_token: err.offending_token().map(str::to_string),
            suggestions: err.suggestions().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Accepted(ValidatedQuery),
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn accepted(&self) -> Option<&ValidatedQuery> {
        match self {
            Self::Accepted(q) => Some(q),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(r) => Some(r),
        }
    }

    pub fn into_result(self) -> Result<ValidatedQuery, Rejection> {
        match self {
            Self::Accepted(q) => Ok(q),
            Self::Rejected(r) => Err(r),
        }
    }
}

impl From<Result<ValidatedQuery, QueryError>> for ValidationOutcome {
    fn from(result: Result<ValidatedQuery, QueryError>) -> Self {
        match result {
            Ok(q) => Self::Accepted(q),
            Err(e) => Self::Rejected(e.into()),
        }
    }
}
