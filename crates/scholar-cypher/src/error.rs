use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serializable tag for a rejection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SafetyViolation,
    UnknownLabel,
    UnknownRelationshipType,
    UnknownProperty,
    MalformedQuery,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SafetyViolation => "SafetyViolation",
            Self::UnknownLabel => "UnknownLabel",
            Self::UnknownRelationshipType => "UnknownRelationshipType",
            Self::UnknownProperty => "UnknownProperty",
            Self::MalformedQuery => "MalformedQuery",
        };
        f.write_str(s)
    }
}

/// Why a query or plan was refused. Every variant is fatal and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{message}")]
    SafetyViolation { message: String, token: String },

    #[error("Unknown label `{token}`")]
    UnknownLabel { token: String, suggestions: Vec<String> },

    #[error("Unknown relationship type `{token}`")]
    UnknownRelationshipType { token: String, suggestions: Vec<String> },

    #[error("Unknown property `{token}`{}", .entity_kind.as_ref().map(|k| format!(" on {k}")).unwrap_or_default())]
    UnknownProperty {
        token: String,
        entity_kind: Option<String>,
        suggestions: Vec<String>,
    },

    #[error("Malformed query: {message}")]
    MalformedQuery { message: String, token: Option<String> },
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SafetyViolation { .. } => ErrorKind::SafetyViolation,
            Self::UnknownLabel { .. } => ErrorKind::UnknownLabel,
            Self::UnknownRelationshipType { .. } => ErrorKind::UnknownRelationshipType,
            Self::UnknownProperty { .. } => ErrorKind::UnknownProperty,
            Self::MalformedQuery { .. } => ErrorKind::MalformedQuery,
        }
    }

    pub fn offending_token(&self) -> Option<&str> {
        match self {
            Self::SafetyViolation { token, .. }
            | Self::UnknownLabel { token, .. }
            | Self::UnknownRelationshipType { token, .. }
            | Self::UnknownProperty { token, .. } => Some(token),
            Self::MalformedQuery { token, .. } => token.as_deref(),
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::UnknownLabel { suggestions, .. }
            | Self::UnknownRelationshipType { suggestions, .. }
            | Self::UnknownProperty { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    pub(crate) fn malformed(message: impl Into<String>, token: Option<&str>) -> Self {
        Self::MalformedQuery {
            message: message.into(),
            token: token.map(str::to_string),
        }
    }

    pub(crate) fn safety(message: impl Into<String>, token: &str) -> Self {
        Self::SafetyViolation {
            message: message.into(),
            token: token.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
