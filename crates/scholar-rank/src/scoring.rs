//! Network confidence scoring.
//!
//! Each centrality metric is min-max normalized across the candidate set,
//! then combined:
//!
//! `network = clip(bonus × (0.2·degree + 0.3·betweenness + 0.2·closeness + 0.3·pagerank))`
//!
//! where `bonus` is 1.1 for candidates in the target's community. The
//! ranking score blends this with evidence strength.

use std::cmp::Ordering;

use scholar_core::{CentralityVector, ConfidenceScore, WorkId};

/// Scoring weights. Fixed; the only way to obtain one is [`Default`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    degree_weight: f64,
    betweenness_weight: f64,
    closeness_weight: f64,
    pagerank_weight: f64,
    /// Multiplier for candidates sharing the target's community.
    community_bonus: f64,
    /// Share of network confidence in the composite score.
    network_weight: f64,
    /// Share of evidence strength in the composite score.
    evidence_weight: f64,
}

impl ScoringConfig {
    pub const DEGREE_WEIGHT: f64 = 0.2;
    pub const BETWEENNESS_WEIGHT: f64 = 0.3;
    pub const CLOSENESS_WEIGHT: f64 = 0.2;
    pub const PAGERANK_WEIGHT: f64 = 0.3;
    pub const COMMUNITY_BONUS: f64 = 1.1;
    pub const NETWORK_WEIGHT: f64 = 0.5;
    pub const EVIDENCE_WEIGHT: f64 = 0.5;
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            degree_weight: Self::DEGREE_WEIGHT,
            betweenness_weight: Self::BETWEENNESS_WEIGHT,
            closeness_weight: Self::CLOSENESS_WEIGHT,
            pagerank_weight: Self::PAGERANK_WEIGHT,
            community_bonus: Self::COMMUNITY_BONUS,
            network_weight: Self::NETWORK_WEIGHT,
            evidence_weight: Self::EVIDENCE_WEIGHT,
        }
    }
}

/// Non-finite or negative raw values count as 0.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Min-max normalize `values` to `[0, 1]`. Zero variance maps every value to 0.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let clean: Vec<f64> = values.iter().copied().map(sanitize).collect();
    let min = clean.iter().copied().fold(f64::INFINITY, f64::min);
    let max = clean.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !(range.is_finite() && range > 0.0) {
        return vec![0.0; clean.len()];
    }
    clean.iter().map(|v| ((v - min) / range).clamp(0.0, 1.0)).collect()
}

/// Network confidence for every vector in `candidates`, in input order.
///
/// Each score depends only on the set of vectors, not their order.
pub fn network_confidence(
    candidates: &[CentralityVector],
    target_community: Option<i64>,
    config: &ScoringConfig,
) -> Vec<ConfidenceScore> {
    let metric = |f: fn(&CentralityVector) -> f64| {
        normalize(&candidates.iter().map(f).collect::<Vec<_>>())
    };
    let degree = metric(|c| c.degree);
    let betweenness = metric(|c| c.betweenness);
    let closeness = metric(|c| c.closeness);
    let pagerank = metric(|c| c.pagerank);

    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let raw = config.degree_weight * degree[i]
                + config.betweenness_weight * betweenness[i]
                + config.closeness_weight * closeness[i]
                + config.pagerank_weight * pagerank[i];
            let bonus = if same_community(c.community_id, target_community) {
                config.community_bonus
            } else {
                1.0
            };
            ConfidenceScore::clipped(raw * bonus)
        })
        .collect()
}

/// Both sides known and equal.
pub fn same_community(candidate: Option<i64>, target: Option<i64>) -> bool {
    matches!((candidate, target), (Some(a), Some(b)) if a == b)
}

/// Blend network confidence with aggregate evidence strength.
pub fn composite_score(
    network: ConfidenceScore,
    evidence_strength: f64,
    config: &ScoringConfig,
) -> ConfidenceScore {
    let evidence = ConfidenceScore::clipped(evidence_strength).value();
    ConfidenceScore::clipped(config.network_weight * network.value() + config.evidence_weight * evidence)
}

/// Ranking order: higher score first, then ascending work id.
pub fn rank_order(a: (ConfidenceScore, &WorkId), b: (ConfidenceScore, &WorkId)) -> Ordering {
    b.0.value()
        .total_cmp(&a.0.value())
        .then_with(|| a.1.cmp(b.1))
}
