//! scholar-graph: Neo4j execution boundary for Scholar.
//!
//! Only [`ValidatedQuery`](scholar_cypher::ValidatedQuery) values are ever
//! executed. Projection lifecycle calls use fixed statements built from the
//! schema registry.

pub mod client;
pub mod executor;
pub mod projection;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use executor::{ParamValue, ProjectionAdmin, QueryExecutor, QueryParams, Row};
pub use projection::ProjectionHandle;
