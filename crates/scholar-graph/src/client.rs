//! Neo4j connection management and the validated-query client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};

use scholar_core::config::Neo4jSettings;
use scholar_core::SchemaRegistry;
use scholar_cypher::lexer::render_identifier;
use scholar_cypher::ValidatedQuery;

use crate::executor::{ParamValue, ProjectionAdmin, QueryExecutor, QueryParams, Row};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// Transport failures and timeouts are worth another attempt; query
    /// errors reported by the server are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Query(e) => matches!(
                e,
                neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError
            ),
            Self::Serialization(_) => false,
        }
    }
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&Neo4jSettings::default())
    }
}

impl From<&Neo4jSettings> for GraphConfig {
    fn from(settings: &Neo4jSettings) -> Self {
        Self {
            uri: settings.uri.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            database: settings.database.clone(),
            max_connections: settings.max_connections,
            fetch_size: settings.fetch_size,
        }
    }
}

/// Thread-safe Neo4j client with connection pooling.
///
/// Arbitrary text never reaches the driver through this type: reads go
/// through [`QueryExecutor`] with a [`ValidatedQuery`], and the only other
/// statements are the fixed projection calls behind [`ProjectionAdmin`].
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
    projection: ProjectionTemplate,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let neo_config = builder
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, database = ?config.database, "Connected to Neo4j");
        Ok(Self {
            graph,
            projection: ProjectionTemplate::from_registry(SchemaRegistry::global()),
        })
    }

    /// Use the kinds of `registry` when creating projections.
    pub fn with_schema(mut self, registry: &SchemaRegistry) -> Self {
        self.projection = ProjectionTemplate::from_registry(registry);
        self
    }

    async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }
}

#[async_trait]
impl QueryExecutor for GraphClient {
    async fn execute(
        &self,
        query: &ValidatedQuery,
        params: &QueryParams,
        timeout: Duration,
    ) -> Result<Vec<Row>, GraphError> {
        let bound = params.bound_for(query);
        let started = Instant::now();

        let rows = tokio::time::timeout(timeout, self.query_rows(to_query(query.text(), &bound)))
            .await
            .map_err(|_| GraphError::Timeout(timeout))??;

        let rows = rows
            .iter()
            .map(|row| {
                row.to::<Row>()
                    .map_err(|e| GraphError::Serialization(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(rows)
    }
}

#[async_trait]
impl ProjectionAdmin for GraphClient {
    async fn projection_exists(&self, name: &str) -> Result<bool, GraphError> {
        let q = neo4rs::query("CALL gds.graph.exists($name) YIELD exists RETURN exists")
            .param("name", name);
        match self.query_one(q).await? {
            Some(row) => row
                .get::<bool>("exists")
                .map_err(|e| GraphError::Serialization(e.to_string())),
            None => Ok(false),
        }
    }

    async fn create_projection(&self, name: &str) -> Result<(), GraphError> {
        let q = neo4rs::query(&self.projection.create_statement()).param("name", name);
        let row = self.query_one(q).await?;
        let nodes = row
            .as_ref()
            .and_then(|r| r.get::<i64>("nodeCount").ok())
            .unwrap_or(0);
        let relationships = row
            .as_ref()
            .and_then(|r| r.get::<i64>("relationshipCount").ok())
            .unwrap_or(0);
        tracing::info!(projection = %name, nodes, relationships, "Graph projection created");
        Ok(())
    }

    async fn drop_projection(&self, name: &str) -> Result<bool, GraphError> {
        let q = neo4rs::query("CALL gds.graph.drop($name, false) YIELD graphName RETURN graphName")
            .param("name", name);
        let dropped = self.query_one(q).await?.is_some();
        if dropped {
            tracing::info!(projection = %name, "Graph projection dropped");
        }
        Ok(dropped)
    }
}

fn to_query(text: &str, params: &QueryParams) -> Query {
    params
        .iter()
        .fold(neo4rs::query(text), |q, (name, value)| match value {
            ParamValue::Bool(v) => q.param(name, *v),
            ParamValue::Int(v) => q.param(name, *v),
            ParamValue::Float(v) => q.param(name, *v),
            ParamValue::Str(v) => q.param(name, v.as_str()),
            ParamValue::StrList(v) => q.param(name, v.clone()),
        })
}

/// Node labels and relationship types included in a projection. Every
/// relationship is projected undirected.
#[derive(Debug, Clone, PartialEq)]
struct ProjectionTemplate {
    labels: Vec<String>,
    relationships: Vec<String>,
}

impl ProjectionTemplate {
    fn from_registry(registry: &SchemaRegistry) -> Self {
        Self {
            labels: registry.entity_kinds().map(str::to_string).collect(),
            relationships: registry.relationship_kinds().map(str::to_string).collect(),
        }
    }

    fn create_statement(&self) -> String {
        let labels = self
            .labels
            .iter()
            .map(|l| format!("'{}'", l.replace('\'', "\\'")))
            .collect::<Vec<_>>()
            .join(", ");
        let relationships = self
            .relationships
            .iter()
            .map(|r| format!("{}: {{orientation: 'UNDIRECTED'}}", render_identifier(r)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CALL gds.graph.project($name, [{labels}], {{{relationships}}}) \
             YIELD graphName, nodeCount, relationshipCount \
             RETURN graphName, nodeCount, relationshipCount"
        )
    }
}
