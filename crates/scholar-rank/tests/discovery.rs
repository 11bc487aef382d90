//! Discovery engine tests against an in-memory graph backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use scholar_core::{ConfidenceScore, EvidenceCategory, SchemaRegistry, Settings};
use scholar_cypher::{ErrorKind, ValidatedQuery};
use scholar_graph::{GraphError, ParamValue, ProjectionAdmin, QueryExecutor, QueryParams, Row};
use scholar_rank::{
    AuthorRelation, DiscoveryEngine, DiscoveryError, DiscoveryRequest, QueryInput, RetryPolicy,
    WorkQuery,
};

/// Answers queries by the first registered fragment the query text contains.
#[derive(Default)]
struct MockGraph {
    responses: Vec<(&'static str, Vec<Row>)>,
    failures: Mutex<VecDeque<GraphError>>,
    executed: Mutex<Vec<(String, QueryParams)>>,
    projection: AtomicBool,
    creations: AtomicUsize,
}

impl MockGraph {
    fn respond(mut self, fragment: &'static str, rows: Vec<serde_json::Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        self.responses.push((fragment, rows));
        self
    }

    fn fail_next(self, error: GraphError) -> Self {
        self.failures.lock().unwrap().push_back(error);
        self
    }

    fn executed(&self) -> Vec<(String, QueryParams)> {
        self.executed.lock().unwrap().clone()
    }

    fn executed_matching(&self, fragment: &str) -> Vec<QueryParams> {
        self.executed()
            .into_iter()
            .filter(|(text, _)| text.contains(fragment))
            .map(|(_, params)| params)
            .collect()
    }
}

#[async_trait]
impl QueryExecutor for MockGraph {
    async fn execute(
        &self,
        query: &ValidatedQuery,
        params: &QueryParams,
        _timeout: Duration,
    ) -> Result<Vec<Row>, GraphError> {
        self.executed
            .lock()
            .unwrap()
            .push((query.text().to_string(), params.bound_for(query)));
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self
            .responses
            .iter()
            .find(|(fragment, _)| query.text().contains(fragment))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProjectionAdmin for MockGraph {
    async fn projection_exists(&self, _name: &str) -> Result<bool, GraphError> {
        Ok(self.projection.load(Ordering::SeqCst))
    }

    async fn create_projection(&self, _name: &str) -> Result<(), GraphError> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        self.projection.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn drop_projection(&self, _name: &str) -> Result<bool, GraphError> {
        Ok(self.projection.swap(false, Ordering::SeqCst))
    }
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    }
}

fn engine(graph: MockGraph) -> DiscoveryEngine<MockGraph> {
    DiscoveryEngine::from_settings(graph, &Settings::default(), SchemaRegistry::global())
        .with_retry_policy(fast_retries())
}

/// Target W1 with three candidates:
/// - W2 shares 3 authors and the target's community
/// - W3 shares 1 author, other community
/// - W4 shares 2 topics and the funding award, other community
fn research_graph() -> MockGraph {
    MockGraph::default()
        .respond(
            "MATCH (w:Work {id:",
            vec![json!({"work_id": "W1", "title": "Healthcare AI", "award_number": "NSF-1"})],
        )
        .respond(
            "w.title CONTAINS",
            vec![json!({"work_id": "W1", "title": "Healthcare AI", "award_number": "NSF-1"})],
        )
        .respond(
            "count(DISTINCT author)",
            vec![
                json!({"work_id": "W2", "title": "Clinical ML", "shared": 3}),
                json!({"work_id": "W3", "title": "Hospital Logistics", "shared": 1}),
            ],
        )
        .respond(
            "count(DISTINCT topic)",
            vec![
                json!({"work_id": "W4", "title": "Care Networks", "shared": 2}),
                json!({"work_id": "W1", "title": "Healthcare AI", "shared": 9}),
            ],
        )
        .respond(
            "1 AS shared",
            vec![json!({"work_id": "W4", "title": "Care Networks", "shared": 1})],
        )
        .respond(
            "gds.degree.stream",
            vec![
                json!({"work_id": "W1", "score": 5.0}),
                json!({"work_id": "W2", "score": 4.0}),
                json!({"work_id": "W3", "score": 1.0}),
                json!({"work_id": "W4", "score": 2.0}),
            ],
        )
        .respond(
            "gds.betweenness.stream",
            vec![
                json!({"work_id": "W2", "score": 2.0}),
                json!({"work_id": "W3", "score": 0.0}),
                json!({"work_id": "W4", "score": 1.0}),
            ],
        )
        .respond(
            "gds.closeness.stream",
            vec![
                json!({"work_id": "W2", "score": 0.5}),
                json!({"work_id": "W3", "score": 0.3}),
                json!({"work_id": "W4", "score": 0.4}),
            ],
        )
        .respond(
            "gds.pageRank.stream",
            vec![
                json!({"work_id": "W2", "score": 1.5}),
                json!({"work_id": "W3", "score": 0.5}),
                json!({"work_id": "W4", "score": 1.0}),
            ],
        )
        .respond(
            "gds.louvain.stream",
            vec![
                json!({"work_id": "W1", "community_id": 7}),
                json!({"work_id": "W2", "community_id": 7}),
                json!({"work_id": "W3", "community_id": 9}),
                json!({"work_id": "W4", "community_id": 9}),
            ],
        )
}

#[tokio::test]
async fn discovery_ranks_by_composite_score() {
    let engine = engine(research_graph());
    let result = engine
        .discover_related(DiscoveryRequest::for_work("W1"))
        .await
        .unwrap();

    assert_eq!(result.target.work_id.as_str(), "W1");
    assert_eq!(result.target.community_id, Some(7));
    assert_eq!(result.total_candidates, 3);
    assert_eq!(result.projection, "research_graph");

    let order: Vec<&str> = result.candidates.iter().map(|c| c.work_id.as_str()).collect();
    assert_eq!(order, ["W2", "W4", "W3"]);

    let w2 = &result.candidates[0];
    assert!(w2.same_community);
    assert_eq!(w2.network_confidence, ConfidenceScore::MAX);
    assert_eq!(w2.evidence.count(EvidenceCategory::SharedAuthors), 3);
    assert!((w2.score.value() - 0.6).abs() < 1e-9);

    let w4 = &result.candidates[1];
    assert_eq!(w4.evidence.count(EvidenceCategory::SharedTopics), 2);
    assert_eq!(w4.evidence.count(EvidenceCategory::SharedAward), 1);
    assert!(!w4.same_community);

    for c in &result.candidates {
        assert!((0.0..=1.0).contains(&c.score.value()));
        assert_eq!(c.level, c.score.level());
    }
}

#[tokio::test]
async fn shared_authors_and_community_beat_weaker_candidate() {
    let engine = engine(research_graph());
    let result = engine
        .discover_related(DiscoveryRequest::for_title("Healthcare"))
        .await
        .unwrap();

    let score = |id: &str| {
        result
            .candidates
            .iter()
            .find(|c| c.work_id.as_str() == id)
            .map(|c| c.score)
            .unwrap()
    };
    assert!(score("W2") > score("W3"));
}

#[tokio::test]
async fn discovery_binds_bounded_parameters() {
    let engine = engine(research_graph());
    engine
        .discover_related(DiscoveryRequest::for_work("W1").with_limit(2))
        .await
        .unwrap();
    let graph = engine.backend();

    let authors = graph.executed_matching("count(DISTINCT author)");
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].get("work_id"), Some(&ParamValue::Str("W1".into())));
    assert_eq!(authors[0].get("limit"), Some(&ParamValue::Int(50)));

    let degree = graph.executed_matching("gds.degree.stream");
    assert_eq!(
        degree[0].get("graph_name"),
        Some(&ParamValue::Str("research_graph".into()))
    );
    match degree[0].get("work_ids") {
        Some(ParamValue::StrList(ids)) => {
            assert_eq!(ids.len(), 4);
            assert!(ids.contains(&"W1".to_string()));
        }
        other => panic!("unexpected work_ids: {other:?}"),
    }
    assert_eq!(degree[0].get("limit"), Some(&ParamValue::Int(4)));
}

#[tokio::test]
async fn limit_truncates_after_ranking() {
    let engine = engine(research_graph());
    let result = engine
        .discover_related(DiscoveryRequest::for_work("W1").with_limit(1))
        .await
        .unwrap();
    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.candidates[0].work_id.as_str(), "W2");
    assert_eq!(result.total_candidates, 3);
}

#[tokio::test]
async fn missing_award_skips_award_query() {
    let graph = MockGraph::default().respond(
        "MATCH (w:Work {id:",
        vec![json!({"work_id": "W9", "title": "Unfunded", "award_number": null})],
    );
    let engine = engine(graph);
    let result = engine
        .discover_related(DiscoveryRequest::for_work("W9"))
        .await
        .unwrap();

    assert!(result.candidates.is_empty());
    let graph = engine.backend();
    assert!(graph.executed_matching("1 AS shared").is_empty());
    assert_eq!(graph.executed_matching("count(DISTINCT author)").len(), 1);
    assert!(graph.executed_matching("gds.degree.stream").is_empty());
}

#[tokio::test]
async fn unknown_target_is_reported() {
    let engine = engine(MockGraph::default());
    let err = engine
        .discover_related(DiscoveryRequest::for_title("Nothing Matches"))
        .await
        .unwrap_err();
    match err {
        DiscoveryError::TargetNotFound { selector } => assert!(selector.contains("Nothing Matches")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn projection_is_created_once_across_runs() {
    let engine = engine(research_graph());
    engine.discover_related(DiscoveryRequest::for_work("W1")).await.unwrap();
    engine.discover_related(DiscoveryRequest::for_work("W1")).await.unwrap();
    assert_eq!(engine.backend().creations.load(Ordering::SeqCst), 1);
    assert!(engine.projection().is_ready());

    assert!(engine.drop_projection().await.unwrap());
    assert!(!engine.projection().is_ready());
}

#[tokio::test]
async fn rejected_query_never_reaches_the_graph() {
    let engine = engine(MockGraph::default());
    let err = engine
        .run_query(
            &QueryInput::Text("MATCH (w:Work) DETACH DELETE w RETURN count(w)".into()),
            &QueryParams::new(),
        )
        .await
        .unwrap_err();

    match &err {
        DiscoveryError::Rejected(r) => assert_eq!(r.error_kind, ErrorKind::SafetyViolation),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_retryable());
    assert!(engine.backend().executed().is_empty());
}

#[tokio::test]
async fn timeouts_are_retried() {
    let graph = research_graph()
        .fail_next(GraphError::Timeout(Duration::from_millis(10)))
        .fail_next(GraphError::Connection("reset".into()));
    let engine = engine(graph);

    let response = engine
        .run_query(
            &QueryInput::Text("MATCH (w:Work) WHERE w.title CONTAINS $kw RETURN w.id AS work_id".into()),
            &QueryParams::new().with("kw", "Health"),
        )
        .await
        .unwrap();

    assert_eq!(response.rows.len(), 1);
    assert!(response.query.limit_injected());
    assert_eq!(engine.backend().executed().len(), 3);
}

#[tokio::test]
async fn query_errors_are_not_retried() {
    let graph = MockGraph::default().fail_next(GraphError::Serialization("bad".into()));
    let engine = engine(graph);

    let err = engine
        .run_query(
            &QueryInput::Text("MATCH (w:Work) RETURN w.id".into()),
            &QueryParams::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Graph(GraphError::Serialization(_))));
    assert_eq!(engine.backend().executed().len(), 1);
}

#[tokio::test]
async fn plan_queries_are_compiled_then_run() {
    let graph = MockGraph::default().respond(
        "WORK_AUTHORED_BY",
        vec![json!({"a.display_name": "Ada", "b.title": "Healthcare AI"})],
    );
    let engine = engine(graph);
    let plan = serde_json::from_value(json!({
        "match": {
            "source_kind": "Author",
            "relationship_kind": "WROTE",
            "target_kind": "Work"
        },
        "filters": [{"field": "title", "operator": "CONTAINS", "value": "Healthcare"}],
        "return_fields": ["a.display_name", "b.title"],
        "limit": 100000
    }))
    .unwrap();

    let response = engine
        .run_query(&QueryInput::Plan(plan), &QueryParams::new())
        .await
        .unwrap();
    assert!(response.query.clamped());
    assert!(response.query.text().contains("[:WORK_AUTHORED_BY]"));
    assert_eq!(response.rows.len(), 1);
}

#[tokio::test]
async fn coauthor_pairs_without_keyword_match_everyone() {
    let graph = MockGraph::default().respond(
        "count(DISTINCT w) AS strength",
        vec![json!({
            "author": "Ada Lovelace",
            "other": "Charles Babbage",
            "strength": 2,
            "via": ["Notes", "Engine"]
        })],
    );
    let engine = engine(graph);
    let links = engine
        .author_relations(AuthorRelation::Coauthorship, None, 10)
        .await
        .unwrap();

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].other.as_deref(), Some("Charles Babbage"));
    assert_eq!(links[0].strength, 2);
    assert_eq!(links[0].via, ["Notes", "Engine"]);

    let params = engine.backend().executed_matching("count(DISTINCT w) AS strength");
    assert_eq!(params[0].get("keyword"), Some(&ParamValue::Str(String::new())));
    assert_eq!(params[0].get("limit"), Some(&ParamValue::Int(10)));
}

#[tokio::test]
async fn indirect_collaboration_excludes_direct_coauthors() {
    let engine = engine(MockGraph::default());
    let links = engine
        .author_relations(AuthorRelation::IndirectCollaboration, Some("Ada"), 100_000)
        .await
        .unwrap();
    assert!(links.is_empty());

    let executed = engine.backend().executed();
    assert_eq!(executed.len(), 1);
    let (text, params) = &executed[0];
    assert!(text.contains("NOT EXISTS { MATCH (a1)-[:WORK_AUTHORED_BY]->(:Work)<-[:WORK_AUTHORED_BY]-(a2) }"));
    assert!(text.contains("collect(DISTINCT bridge.name) AS via"));
    assert_eq!(params.get("keyword"), Some(&ParamValue::Str("Ada".into())));
    assert_eq!(params.get("limit"), Some(&ParamValue::Int(500)));
}

#[tokio::test]
async fn shared_topic_pairs_filter_on_topic_name() {
    let engine = engine(MockGraph::default());
    engine
        .author_relations(AuthorRelation::SharedTopics, Some("Genomics"), 5)
        .await
        .unwrap();
    let params = engine.backend().executed_matching("t.display_name CONTAINS $keyword");
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].get("keyword"), Some(&ParamValue::Str("Genomics".into())));
}

#[tokio::test]
async fn collaboration_networks_respect_minimum() {
    let graph = MockGraph::default().respond(
        "collaborator_count >= $min_collaborators",
        vec![json!({"author": "Ada", "collaborator_count": 3, "collaborators": ["B", "C", "D"]})],
    );
    let engine = engine(graph);
    let authors = engine.collaboration_networks(3, 20).await.unwrap();
    assert_eq!(authors[0].collaborator_count, 3);
    assert_eq!(authors[0].collaborators.len(), 3);

    let params = engine.backend().executed_matching("collaborator_count >=");
    assert_eq!(params[0].get("min_collaborators"), Some(&ParamValue::Int(3)));
}

#[tokio::test]
async fn works_by_award_include_shared_funding() {
    let graph = MockGraph::default()
        .respond(
            "w.grants CONTAINS $keyword",
            vec![json!({
                "work_id": "W1",
                "title": "Healthcare AI",
                "publication_date": "2021-04-01",
                "via": "NSF-1"
            })],
        )
        .respond(
            "related.award_number AS via",
            vec![json!({"work_id": "W4", "title": "Care Networks", "publication_date": null, "via": "NSF-1"})],
        );
    let engine = engine(graph);
    let result = engine
        .discover_works(WorkQuery::Award("NSF-1".into()), 20)
        .await
        .unwrap();

    assert_eq!(result.query, WorkQuery::Award("NSF-1".into()));
    assert_eq!(result.direct.len(), 1);
    assert_eq!(result.direct[0].work_id.as_str(), "W1");
    assert_eq!(result.direct[0].publication_date.as_deref(), Some("2021-04-01"));
    assert_eq!(result.related[0].work_id.as_str(), "W4");
    assert!(result.related[0].strength.is_none());

    let graph = engine.backend();
    assert_eq!(graph.executed().len(), 2);
    for (_, params) in graph.executed() {
        assert_eq!(params.get("keyword"), Some(&ParamValue::Str("NSF-1".into())));
    }
}

#[tokio::test]
async fn works_by_topic_rank_related_topics_by_strength() {
    let graph = MockGraph::default().respond(
        "count(DISTINCT shared) AS strength",
        vec![json!({
            "work_id": "W7",
            "title": "Sequencing at Scale",
            "publication_date": "2019",
            "via": "Bioinformatics",
            "strength": 4
        })],
    );
    let engine = engine(graph);
    let result = engine
        .discover_works(WorkQuery::Topic("Genomics".into()), 20)
        .await
        .unwrap();
    assert!(result.direct.is_empty());
    assert_eq!(result.related[0].strength, Some(4));
    assert_eq!(result.related[0].via.as_deref(), Some("Bioinformatics"));
    assert_eq!(engine.backend().executed_matching("topic.description CONTAINS").len(), 1);
}

#[tokio::test]
async fn works_by_author_reach_collaborator_works() {
    let engine = engine(MockGraph::default());
    engine
        .discover_works(WorkQuery::Author("Lovelace".into()), 20)
        .await
        .unwrap();
    let graph = engine.backend();
    assert_eq!(graph.executed_matching("author.name AS via").len(), 1);
    assert_eq!(graph.executed_matching("collaborator.name AS via").len(), 1);
}

#[tokio::test]
async fn blank_work_keyword_is_refused_before_the_graph() {
    let engine = engine(MockGraph::default());
    let err = engine
        .discover_works(WorkQuery::Award("  ".into()), 20)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::EmptyKeyword { .. }));
    assert!(!err.is_retryable());
    assert!(engine.backend().executed().is_empty());
}

#[tokio::test]
async fn communities_grouped_largest_first() {
    let mut rows: Vec<serde_json::Value> = (1..=7)
        .rev()
        .map(|i| json!({"work_id": format!("W{i}"), "title": format!("Work {i}"), "community_id": 3}))
        .collect();
    rows.extend([
        json!({"work_id": "W8", "title": null, "community_id": 8}),
        json!({"work_id": "W9", "title": "Nine", "community_id": 8}),
        json!({"work_id": "W10", "title": "Ten", "community_id": 1}),
        json!({"work_id": "W11", "title": "Eleven", "community_id": 1}),
    ]);
    let engine = engine(MockGraph::default().respond("node.title AS title", rows));

    let report = engine.detect_communities().await.unwrap();
    assert_eq!(report.projection, "research_graph");
    assert_eq!(report.total_communities, 3);
    assert_eq!(report.total_works, 11);
    assert_eq!(report.largest_community_size, 7);

    let ids: Vec<i64> = report.communities.iter().map(|c| c.community_id).collect();
    assert_eq!(ids, [3, 1, 8]);
    let largest = &report.communities[0];
    assert_eq!(largest.size, 7);
    let sample: Vec<&str> = largest.works.iter().map(|w| w.work_id.as_str()).collect();
    assert_eq!(sample, ["W1", "W2", "W3", "W4", "W5"]);

    let graph = engine.backend();
    assert_eq!(graph.creations.load(Ordering::SeqCst), 1);
    let params = graph.executed_matching("node.title AS title");
    assert_eq!(params[0].get("limit"), Some(&ParamValue::Int(500)));
}
