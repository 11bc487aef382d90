//! Discovery query templates and row decoding.
//!
//! Templates are plain Cypher text and pass through the validator like any
//! agent query before they reach the graph.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use scholar_core::EvidenceCategory;
use scholar_graph::Row;

use crate::error::{DiscoveryError, Result};
use crate::types::{AuthorRelation, WorkQuery};

pub const TARGET_BY_ID: &str = "\
MATCH (w:Work {id: $work_id}) \
RETURN w.id AS work_id, w.title AS title, w.award_number AS award_number \
LIMIT 1";

pub const TARGET_BY_TITLE: &str = "\
MATCH (w:Work) WHERE w.title CONTAINS $title_keyword \
RETURN w.id AS work_id, w.title AS title, w.award_number AS award_number \
ORDER BY w.title, w.id LIMIT 1";

pub const SHARED_AUTHORS: &str = "\
MATCH (target:Work {id: $work_id})<-[:WORK_AUTHORED_BY]-(author:Author)-[:WORK_AUTHORED_BY]->(related:Work) \
WHERE related <> target \
RETURN related.id AS work_id, related.title AS title, count(DISTINCT author) AS shared \
ORDER BY shared DESC, work_id LIMIT $limit";

pub const SHARED_TOPICS: &str = "\
MATCH (target:Work {id: $work_id})-[:WORK_HAS_TOPIC]->(topic:Topic)<-[:WORK_HAS_TOPIC]-(related:Work) \
WHERE related <> target \
RETURN related.id AS work_id, related.title AS title, count(DISTINCT topic) AS shared \
ORDER BY shared DESC, work_id LIMIT $limit";

pub const SHARED_AWARD: &str = "\
MATCH (target:Work {id: $work_id}), (related:Work) \
WHERE related <> target AND target.award_number IS NOT NULL \
AND (related.award_number = target.award_number OR related.funding_info CONTAINS target.award_number) \
RETURN related.id AS work_id, related.title AS title, 1 AS shared \
ORDER BY work_id LIMIT $limit";

pub const EXPLICIT_RELATION: &str = "\
MATCH (target:Work {id: $work_id})-[:RELATED_TO]-(related:Work) \
WHERE related <> target \
RETURN related.id AS work_id, related.title AS title, count(*) AS shared \
ORDER BY work_id LIMIT $limit";

pub const COMMUNITIES: &str = "\
CALL gds.louvain.stream($graph_name) YIELD nodeId, communityId \
WITH gds.util.asNode(nodeId) AS node, communityId \
WHERE node:Work AND node.id IN $work_ids \
RETURN node.id AS work_id, communityId AS community_id LIMIT $limit";

// ── Author relationships ─────────────────────────────────────────
//
// `$keyword` filters on a name; an empty keyword matches everyone, and then
// only pairs connected more than once are kept.

pub const COAUTHORSHIP: &str = "\
MATCH (a1:Author)-[:WORK_AUTHORED_BY]->(w:Work)<-[:WORK_AUTHORED_BY]-(a2:Author) \
WHERE a1 <> a2 AND a1.name CONTAINS $keyword \
WITH a1, a2, count(DISTINCT w) AS strength, collect(DISTINCT w.title) AS via \
WHERE $keyword <> '' OR strength > 1 \
RETURN a1.name AS author, a2.name AS other, strength, via \
ORDER BY strength DESC, author, other LIMIT $limit";

pub const SHARED_TOPIC_AUTHORS: &str = "\
MATCH (a1:Author)-[:WORK_AUTHORED_BY]->(w1:Work)-[:WORK_HAS_TOPIC]->(t:Topic)<-[:WORK_HAS_TOPIC]-(w2:Work)<-[:WORK_AUTHORED_BY]-(a2:Author) \
WHERE a1 <> a2 AND t.display_name CONTAINS $keyword \
WITH a1, a2, count(DISTINCT t) AS strength, collect(DISTINCT t.display_name) AS via \
WHERE $keyword <> '' OR strength > 1 \
RETURN a1.name AS author, a2.name AS other, strength, via \
ORDER BY strength DESC, author, other LIMIT $limit";

pub const INDIRECT_COLLABORATION: &str = "\
MATCH (a1:Author)-[:WORK_AUTHORED_BY]->(:Work)<-[:WORK_AUTHORED_BY]-(bridge:Author)-[:WORK_AUTHORED_BY]->(:Work)<-[:WORK_AUTHORED_BY]-(a2:Author) \
WHERE a1 <> a2 AND a1 <> bridge AND a2 <> bridge AND a1.name CONTAINS $keyword \
AND NOT EXISTS { MATCH (a1)-[:WORK_AUTHORED_BY]->(:Work)<-[:WORK_AUTHORED_BY]-(a2) } \
WITH a1, a2, count(*) AS strength, collect(DISTINCT bridge.name) AS via \
RETURN a1.name AS author, a2.name AS other, strength, via \
ORDER BY strength DESC, author, other LIMIT $limit";

pub const COLLABORATION_NETWORKS: &str = "\
MATCH (a:Author)-[:WORK_AUTHORED_BY]->(:Work)<-[:WORK_AUTHORED_BY]-(coauthor:Author) \
WHERE a <> coauthor \
WITH a, count(DISTINCT coauthor) AS collaborator_count, collect(DISTINCT coauthor.name) AS collaborators \
WHERE collaborator_count >= $min_collaborators \
RETURN a.name AS author, collaborator_count, collaborators \
ORDER BY collaborator_count DESC, author LIMIT $limit";

/// Template for one author relationship.
pub fn relation_query(relation: AuthorRelation) -> &'static str {
    match relation {
        AuthorRelation::Coauthorship => COAUTHORSHIP,
        AuthorRelation::SharedTopics => SHARED_TOPIC_AUTHORS,
        AuthorRelation::IndirectCollaboration => INDIRECT_COLLABORATION,
    }
}

// ── Work discovery ───────────────────────────────────────────────

pub const WORKS_BY_AWARD: &str = "\
MATCH (w:Work) \
WHERE w.award_number = $keyword OR w.funding_info CONTAINS $keyword OR w.grants CONTAINS $keyword \
RETURN w.id AS work_id, w.title AS title, toString(w.publication_date) AS publication_date, w.award_number AS via \
ORDER BY publication_date DESC, work_id LIMIT $limit";

pub const WORKS_SHARING_FUNDING: &str = "\
MATCH (target:Work), (related:Work) \
WHERE (target.award_number = $keyword OR target.funding_info CONTAINS $keyword) AND target <> related \
AND (related.award_number = target.award_number OR related.funding_info CONTAINS target.award_number OR target.funding_info CONTAINS related.award_number) \
RETURN DISTINCT related.id AS work_id, related.title AS title, toString(related.publication_date) AS publication_date, related.award_number AS via \
ORDER BY title, work_id LIMIT $limit";

pub const WORKS_BY_AUTHOR: &str = "\
MATCH (author:Author)-[:WORK_AUTHORED_BY]->(w:Work) \
WHERE author.name CONTAINS $keyword \
RETURN w.id AS work_id, w.title AS title, toString(w.publication_date) AS publication_date, author.name AS via \
ORDER BY publication_date DESC, work_id LIMIT $limit";

pub const WORKS_BY_COLLABORATORS: &str = "\
MATCH (author:Author)-[:WORK_AUTHORED_BY]->(shared:Work)<-[:WORK_AUTHORED_BY]-(collaborator:Author)-[:WORK_AUTHORED_BY]->(w:Work) \
WHERE author.name CONTAINS $keyword AND author <> collaborator AND shared <> w \
RETURN DISTINCT w.id AS work_id, w.title AS title, toString(w.publication_date) AS publication_date, collaborator.name AS via \
ORDER BY via, title, work_id LIMIT $limit";

pub const WORKS_BY_TOPIC: &str = "\
MATCH (topic:Topic)<-[:WORK_HAS_TOPIC]-(w:Work) \
WHERE topic.display_name CONTAINS $keyword OR topic.description CONTAINS $keyword \
RETURN w.id AS work_id, w.title AS title, toString(w.publication_date) AS publication_date, topic.display_name AS via \
ORDER BY via, title, work_id LIMIT $limit";

pub const WORKS_BY_RELATED_TOPICS: &str = "\
MATCH (target:Topic)<-[:WORK_HAS_TOPIC]-(shared:Work)-[:WORK_HAS_TOPIC]->(related:Topic) \
WHERE target.display_name CONTAINS $keyword AND target <> related \
WITH related, count(DISTINCT shared) AS strength \
MATCH (related)<-[:WORK_HAS_TOPIC]-(w:Work) \
RETURN w.id AS work_id, w.title AS title, toString(w.publication_date) AS publication_date, related.display_name AS via, strength \
ORDER BY strength DESC, via, title, work_id LIMIT $limit";

/// Direct and one-hop templates for a work query.
pub fn work_queries(query: &WorkQuery) -> (&'static str, &'static str) {
    match query {
        WorkQuery::Award(_) => (WORKS_BY_AWARD, WORKS_SHARING_FUNDING),
        WorkQuery::Author(_) => (WORKS_BY_AUTHOR, WORKS_BY_COLLABORATORS),
        WorkQuery::Topic(_) => (WORKS_BY_TOPIC, WORKS_BY_RELATED_TOPICS),
    }
}

pub const COMMUNITY_DETECTION: &str = "\
CALL gds.louvain.stream($graph_name) YIELD nodeId, communityId \
WITH gds.util.asNode(nodeId) AS node, communityId \
WHERE node:Work \
RETURN node.id AS work_id, node.title AS title, communityId AS community_id \
ORDER BY community_id, work_id LIMIT $limit";

/// Template for the candidates of one evidence category.
pub fn evidence_query(category: EvidenceCategory) -> &'static str {
    match category {
        EvidenceCategory::SharedAuthors => SHARED_AUTHORS,
        EvidenceCategory::SharedTopics => SHARED_TOPICS,
        EvidenceCategory::SharedAward => SHARED_AWARD,
        EvidenceCategory::ExplicitRelation => EXPLICIT_RELATION,
    }
}

/// Centrality algorithms run over the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralityMetric {
    Degree,
    Betweenness,
    Closeness,
    PageRank,
}

impl CentralityMetric {
    pub const ALL: [CentralityMetric; 4] = [
        Self::Degree,
        Self::Betweenness,
        Self::Closeness,
        Self::PageRank,
    ];

    pub fn procedure(self) -> &'static str {
        match self {
            Self::Degree => "gds.degree.stream",
            Self::Betweenness => "gds.betweenness.stream",
            Self::Closeness => "gds.closeness.stream",
            Self::PageRank => "gds.pageRank.stream",
        }
    }

    pub fn query(self) -> String {
        format!(
            "CALL {}($graph_name) YIELD nodeId, score \
             WITH gds.util.asNode(nodeId) AS node, score \
             WHERE node:Work AND node.id IN $work_ids \
             RETURN node.id AS work_id, score LIMIT $limit",
            self.procedure()
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TargetRow {
    pub work_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub award_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvidenceRow {
    pub work_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub shared: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetricRow {
    pub work_id: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommunityRow {
    pub work_id: String,
    #[serde(default)]
    pub community_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberRow {
    pub work_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub community_id: i64,
}

/// Decode rows into `T`, naming `query` in the error.
pub(crate) fn decode<T: DeserializeOwned>(query: &'static str, rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| {
                DiscoveryError::Decode {
                    query,
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::SchemaRegistry;
    use scholar_cypher::{ResultLimit, Validator};

    fn check(text: &str) -> scholar_cypher::ValidatedQuery {
        Validator::new(&SchemaRegistry::research())
            .check(text)
            .unwrap_or_else(|e| panic!("{text}\n{e}"))
    }

    #[test]
    fn test_templates_are_canonical() {
        let templates = [
            TARGET_BY_ID,
            TARGET_BY_TITLE,
            SHARED_AUTHORS,
            SHARED_TOPICS,
            SHARED_AWARD,
            EXPLICIT_RELATION,
            COMMUNITIES,
            COAUTHORSHIP,
            SHARED_TOPIC_AUTHORS,
            INDIRECT_COLLABORATION,
            COLLABORATION_NETWORKS,
            WORKS_BY_AWARD,
            WORKS_SHARING_FUNDING,
            WORKS_BY_AUTHOR,
            WORKS_BY_COLLABORATORS,
            WORKS_BY_TOPIC,
            WORKS_BY_RELATED_TOPICS,
            COMMUNITY_DETECTION,
        ];
        for text in templates {
            let q = check(text);
            assert_eq!(q.text(), text);
            assert!(q.rewrites().is_empty(), "{text}");
            assert!(!q.limit_injected(), "{text}");
        }
    }

    #[test]
    fn test_centrality_templates_validate() {
        for metric in CentralityMetric::ALL {
            let text = metric.query();
            let q = check(&text);
            assert_eq!(q.limit(), Some(&ResultLimit::Parameter("limit".into())));
            assert!(q.text().starts_with(&format!("CALL {}(", metric.procedure())));
        }
    }

    #[test]
    fn test_inferred_relationship_matches_coauthorship_template() {
        let q = check(
            "MATCH (a1:Author)-[:COLLABORATED_WITH]->(a2:Author) \
             WHERE a1 <> a2 AND a1.name CONTAINS $keyword \
             RETURN a1.name AS author, a2.name AS other LIMIT $limit",
        );
        let pattern = &COAUTHORSHIP[..COAUTHORSHIP.find(" WHERE").unwrap()];
        assert!(q.text().replace("(:Work)", "(w:Work)").starts_with(pattern));
    }

    #[test]
    fn test_decode_rows() {
        let rows = vec![
            serde_json::json!({"work_id": "W2", "title": "Two", "shared": 3}),
            serde_json::json!({"work_id": "W3", "title": null, "shared": 1}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        let decoded: Vec<EvidenceRow> = decode("shared_authors", rows).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].shared, 3);
        assert!(decoded[1].title.is_none());

        let bad = vec![serde_json::json!({"title": "x"}).as_object().cloned().unwrap()];
        let err = decode::<EvidenceRow>("shared_authors", bad).unwrap_err();
        assert!(matches!(err, DiscoveryError::Decode { query: "shared_authors", .. }));
    }
}
