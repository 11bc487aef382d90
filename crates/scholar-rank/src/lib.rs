//! scholar-rank: Relationship discovery for the Scholar research graph.
//!
//! For a target work, fetches per-category relationship evidence and
//! centrality signals through the validated execution boundary, then fuses
//! them into one bounded, deterministic ranking.

pub mod error;
pub mod evidence;
pub mod fetch;
pub mod retry;
pub mod scoring;
pub mod types;

pub use error::DiscoveryError;
pub use evidence::{CandidateEvidence, CategoryEvidence, Evidence, EvidenceTable};
pub use retry::RetryPolicy;
pub use scoring::ScoringConfig;
pub use types::{
    AuthorLink, AuthorRelation, CollaboratorCount, Community, CommunityMember, CommunityReport,
    DiscoveryRequest, DiscoveryResult, QueryInput, QueryRequest, QueryResponse, RankedCandidate,
    TargetSelector, TargetWork, WorkDiscovery, WorkMatch, WorkQuery,
};

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use chrono::Utc;
use scholar_core::{CentralityVector, EvidenceCategory, SchemaRegistry, Settings, WorkId};
use scholar_cypher::{PlanCompiler, QueryPlan, ValidatedQuery, ValidationOutcome, Validator};
use scholar_graph::{ProjectionAdmin, ProjectionHandle, QueryExecutor, QueryParams, Row};
use uuid::Uuid;

use crate::fetch::{CentralityMetric, CommunityRow, EvidenceRow, MemberRow, MetricRow, TargetRow};

/// Members listed per community in a [`CommunityReport`].
const COMMUNITY_SAMPLE: usize = 5;

/// Validates, executes and ranks on top of a graph backend.
pub struct DiscoveryEngine<B> {
    backend: B,
    registry: &'static SchemaRegistry,
    max_result_limit: u64,
    timeout: Duration,
    retry: RetryPolicy,
    candidate_limit: u64,
    projection: ProjectionHandle,
    scoring: ScoringConfig,
}

impl<B> DiscoveryEngine<B>
where
    B: QueryExecutor + ProjectionAdmin,
{
    /// Create an engine with default settings and the process-wide schema.
    pub fn new(backend: B) -> Self {
        Self::from_settings(backend, &Settings::default(), SchemaRegistry::global())
    }

    pub fn from_settings(backend: B, settings: &Settings, registry: &'static SchemaRegistry) -> Self {
        Self {
            backend,
            registry,
            max_result_limit: settings.query.max_result_limit,
            timeout: settings.query.timeout(),
            retry: RetryPolicy::from_settings(&settings.query),
            candidate_limit: settings.discovery.candidate_limit,
            projection: ProjectionHandle::new(settings.discovery.projection_name.clone()),
            scoring: ScoringConfig::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn projection(&self) -> &ProjectionHandle {
        &self.projection
    }

    pub fn validator(&self) -> Validator<'static> {
        Validator::new(self.registry).with_max_result_limit(self.max_result_limit)
    }

    /// Validate agent-written Cypher.
    pub fn validate(&self, text: &str) -> ValidationOutcome {
        self.validator().validate(text)
    }

    /// Compile a typed plan.
    pub fn compile(&self, plan: &QueryPlan) -> ValidationOutcome {
        PlanCompiler::new(self.validator()).compile(plan)
    }

    /// Create the centrality projection unless it already exists.
    pub async fn ensure_projection(&self) -> error::Result<()> {
        self.retry
            .run("ensure_projection", || self.projection.ensure(&self.backend))
            .await?;
        Ok(())
    }

    /// Drop the centrality projection. Returns whether one existed.
    pub async fn drop_projection(&self) -> error::Result<bool> {
        Ok(self.projection.drop_projection(&self.backend).await?)
    }

    /// Execute an accepted query, retrying transport failures.
    pub async fn execute(
        &self,
        query: &ValidatedQuery,
        params: &QueryParams,
    ) -> error::Result<Vec<Row>> {
        let timeout = self.timeout;
        let rows = self
            .retry
            .run("execute", || self.backend.execute(query, params, timeout))
            .await?;
        Ok(rows)
    }

    /// Validate or compile `input`, then execute it. Rejections are returned
    /// without touching the graph.
    pub async fn run_query(
        &self,
        input: &QueryInput,
        params: &QueryParams,
    ) -> error::Result<QueryResponse> {
        let start = Instant::now();
        let outcome = match input {
            QueryInput::Text(text) => self.validate(text),
            QueryInput::Plan(plan) => self.compile(plan),
        };
        let query = outcome.into_result()?;
        let rows = self.execute(&query, params).await?;
        Ok(QueryResponse {
            query,
            rows,
            computation_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn fetch(&self, template: &str, params: &QueryParams) -> error::Result<Vec<Row>> {
        let query = self.validator().check(template)?;
        self.execute(&query, params).await
    }

    /// Find and rank works related to the request's target.
    ///
    /// Orchestrates: resolve target → ensure projection → evidence per
    /// category → centrality and communities → score → rank → truncate.
    pub async fn discover_related(
        &self,
        request: DiscoveryRequest,
    ) -> error::Result<DiscoveryResult> {
        let start = Instant::now();
        let mut target = self.resolve_target(&request.target).await?;
        tracing::info!(target = %target.work_id, "Discovering related works");

        self.ensure_projection().await?;

        let mut table = self.gather_evidence(&target).await?;
        table.remove(&target.work_id);
        let total_candidates = table.len();

        let mut ids: Vec<WorkId> = table.work_ids().cloned().collect();
        ids.push(target.work_id.clone());
        let mut centrality = if table.is_empty() {
            HashMap::new()
        } else {
            self.fetch_centrality(&ids).await?
        };
        target.community_id = centrality
            .remove(&target.work_id)
            .and_then(|c| c.community_id);

        let candidates = table.into_candidates();
        let vectors: Vec<CentralityVector> = candidates
            .iter()
            .map(|c| centrality.get(&c.work_id).cloned().unwrap_or_default())
            .collect();
        let network = scoring::network_confidence(&vectors, target.community_id, &self.scoring);

        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .zip(vectors)
            .zip(network)
            .map(|((candidate, centrality), network_confidence)| {
                let evidence_strength = candidate.evidence.aggregate_strength();
                let score =
                    scoring::composite_score(network_confidence, evidence_strength, &self.scoring);
                RankedCandidate {
                    same_community: scoring::same_community(
                        centrality.community_id,
                        target.community_id,
                    ),
                    work_id: candidate.work_id,
                    title: candidate.title,
                    evidence: candidate.evidence,
                    evidence_strength,
                    centrality,
                    network_confidence,
                    score,
                    level: score.level(),
                }
            })
            .filter(|c| request.min_score.map_or(true, |min| c.score.value() >= min))
            .collect();
        ranked.sort_by(|a, b| scoring::rank_order((a.score, &a.work_id), (b.score, &b.work_id)));
        ranked.truncate(request.limit);

        let computation_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            target = %target.work_id,
            candidates = total_candidates,
            returned = ranked.len(),
            top_score = ranked.first().map(|c| c.score.value()).unwrap_or(0.0),
            computation_ms,
            "Discovery complete"
        );

        Ok(DiscoveryResult {
            id: Uuid::new_v4(),
            target,
            candidates: ranked,
            total_candidates,
            projection: self.projection.name().to_string(),
            computed_at: Utc::now(),
            computation_ms,
        })
    }

    /// Author pairs linked by `relation`, strongest first.
    ///
    /// `keyword` narrows the first author by name (or, for shared topics,
    /// the topic by name). Without it, coauthor and shared-topic pairs must
    /// be connected more than once.
    pub async fn author_relations(
        &self,
        relation: AuthorRelation,
        keyword: Option<&str>,
        limit: usize,
    ) -> error::Result<Vec<AuthorLink>> {
        let params = QueryParams::new()
            .with("keyword", keyword.unwrap_or_default())
            .with("limit", clamp_limit(limit));
        let rows = self.fetch(fetch::relation_query(relation), &params).await?;
        let links = fetch::decode::<AuthorLink>(relation.as_str(), rows)?;
        tracing::info!(%relation, links = links.len(), "Author relations fetched");
        Ok(links)
    }

    /// Authors with at least `min_collaborators` distinct coauthors.
    pub async fn collaboration_networks(
        &self,
        min_collaborators: u64,
        limit: usize,
    ) -> error::Result<Vec<CollaboratorCount>> {
        let params = QueryParams::new()
            .with("min_collaborators", i64::try_from(min_collaborators).unwrap_or(i64::MAX))
            .with("limit", clamp_limit(limit));
        let rows = self.fetch(fetch::COLLABORATION_NETWORKS, &params).await?;
        fetch::decode("collaboration_networks", rows)
    }

    /// Works matching `query`, plus works one hop away from those.
    pub async fn discover_works(
        &self,
        query: WorkQuery,
        limit: usize,
    ) -> error::Result<WorkDiscovery> {
        let start = Instant::now();
        if query.keyword().trim().is_empty() {
            return Err(DiscoveryError::EmptyKeyword {
                query: query.to_string(),
            });
        }
        let (direct, related) = fetch::work_queries(&query);
        let params = QueryParams::new()
            .with("keyword", query.keyword())
            .with("limit", clamp_limit(limit));

        let params = &params;
        let (direct, related) = tokio::try_join!(
            async move { fetch::decode::<WorkMatch>("works_direct", self.fetch(direct, params).await?) },
            async move { fetch::decode::<WorkMatch>("works_related", self.fetch(related, params).await?) },
        )?;

        let computation_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            %query,
            direct = direct.len(),
            related = related.len(),
            computation_ms,
            "Work discovery complete"
        );
        Ok(WorkDiscovery {
            id: Uuid::new_v4(),
            query,
            direct,
            related,
            computed_at: Utc::now(),
            computation_ms,
        })
    }

    /// Louvain communities of works over the projection, largest first.
    pub async fn detect_communities(&self) -> error::Result<CommunityReport> {
        let start = Instant::now();
        self.ensure_projection().await?;

        let params = QueryParams::new()
            .with("graph_name", self.projection.name())
            .with("limit", i64::try_from(self.max_result_limit).unwrap_or(i64::MAX));
        let rows = self.fetch(fetch::COMMUNITY_DETECTION, &params).await?;
        let members = fetch::decode::<MemberRow>("community_detection", rows)?;
        let total_works = members.len();

        let mut grouped: BTreeMap<i64, Vec<CommunityMember>> = BTreeMap::new();
        for row in members {
            grouped.entry(row.community_id).or_default().push(CommunityMember {
                work_id: WorkId(row.work_id),
                title: row.title,
            });
        }
        let mut communities: Vec<Community> = grouped
            .into_iter()
            .map(|(community_id, mut works)| {
                works.sort_by(|a, b| a.work_id.cmp(&b.work_id));
                let size = works.len();
                works.truncate(COMMUNITY_SAMPLE);
                Community {
                    community_id,
                    size,
                    works,
                }
            })
            .collect();
        communities.sort_by(|a, b| b.size.cmp(&a.size).then(a.community_id.cmp(&b.community_id)));

        let computation_ms = start.elapsed().as_millis() as u64;
        let largest_community_size = communities.first().map_or(0, |c| c.size);
        tracing::info!(
            communities = communities.len(),
            works = total_works,
            largest = largest_community_size,
            computation_ms,
            "Community detection complete"
        );
        Ok(CommunityReport {
            id: Uuid::new_v4(),
            projection: self.projection.name().to_string(),
            total_communities: communities.len(),
            total_works,
            largest_community_size,
            communities,
            computed_at: Utc::now(),
            computation_ms,
        })
    }

    async fn resolve_target(&self, selector: &TargetSelector) -> error::Result<TargetWork> {
        let (template, params) = match selector {
            TargetSelector::WorkId(id) => (
                fetch::TARGET_BY_ID,
                QueryParams::new().with("work_id", id.as_str()),
            ),
            TargetSelector::TitleKeyword(kw) => (
                fetch::TARGET_BY_TITLE,
                QueryParams::new().with("title_keyword", kw.as_str()),
            ),
        };
        let rows = self.fetch(template, &params).await?;
        let row = fetch::decode::<TargetRow>("target", rows)?
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::TargetNotFound {
                selector: selector.to_string(),
            })?;
        Ok(TargetWork {
            work_id: WorkId(row.work_id),
            title: row.title,
            award_number: row.award_number,
            community_id: None,
        })
    }

    async fn gather_evidence(&self, target: &TargetWork) -> error::Result<EvidenceTable> {
        let params = QueryParams::new()
            .with("work_id", target.work_id.as_str())
            .with("limit", i64::try_from(self.candidate_limit).unwrap_or(i64::MAX));

        let params = &params;
        let category = move |c: EvidenceCategory| {
            async move {
                // No award on the target means no award evidence to look for.
                if c == EvidenceCategory::SharedAward && target.award_number.is_none() {
                    return Ok(Vec::new());
                }
                let rows = self.fetch(fetch::evidence_query(c), params).await?;
                fetch::decode::<EvidenceRow>(c.as_str(), rows)
            }
        };
        let (authors, topics, award, explicit) = tokio::try_join!(
            category(EvidenceCategory::SharedAuthors),
            category(EvidenceCategory::SharedTopics),
            category(EvidenceCategory::SharedAward),
            category(EvidenceCategory::ExplicitRelation),
        )?;

        let mut table = EvidenceTable::new();
        for (c, rows) in [
            (EvidenceCategory::SharedAuthors, authors),
            (EvidenceCategory::SharedTopics, topics),
            (EvidenceCategory::SharedAward, award),
            (EvidenceCategory::ExplicitRelation, explicit),
        ] {
            tracing::debug!(category = %c, rows = rows.len(), "Evidence fetched");
            for row in rows {
                table.record(c, WorkId(row.work_id), row.title, row.shared);
            }
        }
        Ok(table)
    }

    async fn fetch_centrality(
        &self,
        ids: &[WorkId],
    ) -> error::Result<HashMap<WorkId, CentralityVector>> {
        let params = QueryParams::new()
            .with("graph_name", self.projection.name())
            .with(
                "work_ids",
                ids.iter().map(|id| id.as_str().to_string()).collect::<Vec<_>>(),
            )
            .with("limit", i64::try_from(ids.len()).unwrap_or(i64::MAX));

        let mut vectors: HashMap<WorkId, CentralityVector> = HashMap::new();
        for metric in CentralityMetric::ALL {
            let rows = self.fetch(&metric.query(), &params).await?;
            for row in fetch::decode::<MetricRow>(metric.procedure(), rows)? {
                let entry = vectors.entry(WorkId(row.work_id)).or_default();
                let score = row.score.unwrap_or(0.0);
                match metric {
                    CentralityMetric::Degree => entry.degree = score,
                    CentralityMetric::Betweenness => entry.betweenness = score,
                    CentralityMetric::Closeness => entry.closeness = score,
                    CentralityMetric::PageRank => entry.pagerank = score,
                }
            }
        }

        let rows = self.fetch(fetch::COMMUNITIES, &params).await?;
        for row in fetch::decode::<CommunityRow>("communities", rows)? {
            vectors.entry(WorkId(row.work_id)).or_default().community_id = row.community_id;
        }
        Ok(vectors)
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
