//! Error types for the scholar-rank crate.

use thiserror::Error;

use scholar_cypher::{QueryError, Rejection};
use scholar_graph::GraphError;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Query rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Target work not found: {selector}")]
    TargetNotFound { selector: String },

    #[error("Unexpected row shape from {query}: {reason}")]
    Decode { query: &'static str, reason: String },

    #[error("Empty search keyword for {query}")]
    EmptyKeyword { query: String },
}

impl From<QueryError> for DiscoveryError {
    fn from(e: QueryError) -> Self {
        Self::Rejected(Rejection::from(e))
    }
}

impl DiscoveryError {
    /// Only transport failures and timeouts are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Graph(e) => e.is_retryable(),
            Self::Rejected(_)
            | Self::TargetNotFound { .. }
            | Self::Decode { .. }
            | Self::EmptyKeyword { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
