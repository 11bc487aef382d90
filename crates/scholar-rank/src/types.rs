//! Request and response types for query and discovery operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scholar_core::{CentralityVector, ConfidenceLevel, ConfidenceScore, WorkId};
use scholar_cypher::{QueryPlan, ValidatedQuery};
use scholar_graph::{QueryParams, Row};

use crate::evidence::Evidence;

/// Query intent from the calling agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryInput {
    /// Cypher text written by the agent.
    Text(String),
    /// Typed intent to compile.
    Plan(QueryPlan),
}

/// A query to validate and run, e.g. `{"text": "MATCH ...", "params": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(flatten)]
    pub input: QueryInput,
    #[serde(default)]
    pub params: QueryParams,
}

/// Rows from a validated query, with the query that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: ValidatedQuery,
    pub rows: Vec<Row>,
    pub computation_ms: u64,
}

/// How the target work is identified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelector {
    WorkId(String),
    /// First work (by title) whose title contains the keyword.
    TitleKeyword(String),
}

impl std::fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkId(id) => write!(f, "id {id}"),
            Self::TitleKeyword(kw) => write!(f, "title containing {kw:?}"),
        }
    }
}

/// Request to discover works related to a target work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub target: TargetSelector,
    /// Maximum candidates returned (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Drop candidates scoring below this.
    #[serde(default)]
    pub min_score: Option<f64>,
}

fn default_limit() -> usize {
    20
}

impl DiscoveryRequest {
    pub fn for_work(work_id: impl Into<String>) -> Self {
        Self {
            target: TargetSelector::WorkId(work_id.into()),
            limit: default_limit(),
            min_score: None,
        }
    }

    pub fn for_title(keyword: impl Into<String>) -> Self {
        Self {
            target: TargetSelector::TitleKeyword(keyword.into()),
            limit: default_limit(),
            min_score: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// The resolved target work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetWork {
    pub work_id: WorkId,
    pub title: Option<String>,
    pub award_number: Option<String>,
    pub community_id: Option<i64>,
}

/// One scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub work_id: WorkId,
    pub title: Option<String>,
    pub evidence: Evidence,
    pub evidence_strength: f64,
    pub centrality: CentralityVector,
    pub same_community: bool,
    pub network_confidence: ConfidenceScore,
    pub score: ConfidenceScore,
    pub level: ConfidenceLevel,
}

/// Complete result of a discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub id: Uuid,
    pub target: TargetWork,
    pub candidates: Vec<RankedCandidate>,
    /// Candidates considered before truncation.
    pub total_candidates: usize,
    pub projection: String,
    pub computed_at: DateTime<Utc>,
    pub computation_ms: u64,
}

/// Author-to-author relationship to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRelation {
    /// Authors of the same work.
    Coauthorship,
    /// Authors whose works share a topic.
    SharedTopics,
    /// Authors linked only through a common coauthor.
    IndirectCollaboration,
}

impl AuthorRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coauthorship => "coauthorship",
            Self::SharedTopics => "shared_topics",
            Self::IndirectCollaboration => "indirect_collaboration",
        }
    }
}

impl std::fmt::Display for AuthorRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pair of related authors.
///
/// `via` holds what connects them: shared work titles, shared topic names,
/// or the bridging coauthors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorLink {
    pub author: Option<String>,
    pub other: Option<String>,
    pub strength: u64,
    #[serde(default)]
    pub via: Vec<String>,
}

/// An author and the distinct coauthors they have written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorCount {
    pub author: Option<String>,
    pub collaborator_count: u64,
    #[serde(default)]
    pub collaborators: Vec<String>,
}

/// Entry point for finding works without a target work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkQuery {
    /// Award number, matched against award, funding and grant fields.
    Award(String),
    /// Keyword contained in an author's name.
    Author(String),
    /// Keyword contained in a topic's name or description.
    Topic(String),
}

impl WorkQuery {
    pub fn keyword(&self) -> &str {
        match self {
            Self::Award(k) | Self::Author(k) | Self::Topic(k) => k,
        }
    }
}

impl std::fmt::Display for WorkQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Award(k) => write!(f, "award {k:?}"),
            Self::Author(k) => write!(f, "author {k:?}"),
            Self::Topic(k) => write!(f, "topic {k:?}"),
        }
    }
}

/// A work found by a [`WorkQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkMatch {
    pub work_id: WorkId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    /// The award, author, topic or collaborator that led to the work.
    #[serde(default)]
    pub via: Option<String>,
    /// Connection strength, for related-topic matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<u64>,
}

/// Works matching a [`WorkQuery`] directly, and works one hop away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkDiscovery {
    pub id: Uuid,
    pub query: WorkQuery,
    pub direct: Vec<WorkMatch>,
    /// Shared-funding, collaborator or related-topic works.
    pub related: Vec<WorkMatch>,
    pub computed_at: DateTime<Utc>,
    pub computation_ms: u64,
}

/// A work inside a detected community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMember {
    pub work_id: WorkId,
    pub title: Option<String>,
}

/// One Louvain community of works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub community_id: i64,
    pub size: usize,
    /// The first few members, by work id.
    pub works: Vec<CommunityMember>,
}

/// Communities over the projection, largest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityReport {
    pub id: Uuid,
    pub projection: String,
    pub communities: Vec<Community>,
    pub total_communities: usize,
    pub total_works: usize,
    pub largest_community_size: usize,
    pub computed_at: DateTime<Utc>,
    pub computation_ms: u64,
}
