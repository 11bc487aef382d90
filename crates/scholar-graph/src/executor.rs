//! Execution traits and query parameters.
//!
//! [`QueryExecutor`] is the only way query text reaches the database, and it
//! accepts nothing but a [`ValidatedQuery`]. [`ProjectionAdmin`] covers the
//! fixed graph-projection lifecycle calls, which the validator would refuse.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scholar_cypher::ValidatedQuery;

use crate::client::GraphError;

/// One result row: column name → value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrList(Vec<String>),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        Self::StrList(v)
    }
}

/// Named parameters for a validated query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parameters as they will be sent with `query`.
    ///
    /// Every parameter used as a `LIMIT` is bound to an integer in
    /// `[0, ceiling]`: larger values are capped, whole floats converted, and
    /// a missing or non-numeric value replaced by the ceiling.
    pub fn bound_for(&self, query: &ValidatedQuery) -> QueryParams {
        let ceiling = i64::try_from(query.max_result_limit()).unwrap_or(i64::MAX);
        let mut bound = self.clone();
        for name in query.limit_parameters() {
            let limit = match bound.0.get(name) {
                Some(ParamValue::Int(v)) if *v > ceiling => {
                    tracing::info!(parameter = %name, requested = *v, ceiling, "Result limit clamped");
                    ceiling
                }
                Some(ParamValue::Int(v)) => (*v).max(0),
                Some(ParamValue::Float(v)) if v.is_finite() => (v.trunc() as i64).clamp(0, ceiling),
                Some(other) => {
                    tracing::warn!(parameter = %name, value = ?other, ceiling, "Non-integer result limit replaced");
                    ceiling
                }
                None => ceiling,
            };
            bound.0.insert(name.clone(), ParamValue::Int(limit));
        }
        bound
    }
}

/// Executes validated, read-only queries.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `query` with `params`, giving up after `timeout`.
    ///
    /// Dropping the returned future cancels the call; queries are read-only,
    /// so cancellation leaves nothing to roll back.
    async fn execute(
        &self,
        query: &ValidatedQuery,
        params: &QueryParams,
        timeout: Duration,
    ) -> Result<Vec<Row>, GraphError>;
}

/// Lifecycle of a named in-memory graph projection.
#[async_trait]
pub trait ProjectionAdmin: Send + Sync {
    async fn projection_exists(&self, name: &str) -> Result<bool, GraphError>;

    async fn create_projection(&self, name: &str) -> Result<(), GraphError>;

    /// Returns whether a projection was actually dropped.
    async fn drop_projection(&self, name: &str) -> Result<bool, GraphError>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    async fn execute(
        &self,
        query: &ValidatedQuery,
        params: &QueryParams,
        timeout: Duration,
    ) -> Result<Vec<Row>, GraphError> {
        (**self).execute(query, params, timeout).await
    }
}

#[async_trait]
impl<T: ProjectionAdmin + ?Sized> ProjectionAdmin for Arc<T> {
    async fn projection_exists(&self, name: &str) -> Result<bool, GraphError> {
        (**self).projection_exists(name).await
    }

    async fn create_projection(&self, name: &str) -> Result<(), GraphError> {
        (**self).create_projection(name).await
    }

    async fn drop_projection(&self, name: &str) -> Result<bool, GraphError> {
        (**self).drop_projection(name).await
    }
}
