//! Property tests for evidence aggregation and network confidence.

use proptest::prelude::*;
use proptest::sample::select;

use scholar_core::{CentralityVector, EvidenceCategory, WorkId};
use scholar_rank::evidence::{saturation, strength, Evidence};
use scholar_rank::scoring::{composite_score, network_confidence, rank_order, ScoringConfig};

fn metric() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => 0.0f64..1_000.0,
        1 => Just(0.0),
        1 => Just(1e12),
    ]
}

fn centrality() -> impl Strategy<Value = CentralityVector> {
    (metric(), metric(), metric(), metric(), prop::option::of(0i64..4)).prop_map(
        |(degree, betweenness, closeness, pagerank, community_id)| CentralityVector {
            degree,
            betweenness,
            closeness,
            pagerank,
            community_id,
        },
    )
}

fn category() -> impl Strategy<Value = EvidenceCategory> {
    select(EvidenceCategory::ALL.to_vec())
}

proptest! {
    #[test]
    fn scores_are_bounded(
        set in prop::collection::vec(centrality(), 0..24),
        community in prop::option::of(0i64..4),
    ) {
        let scores = network_confidence(&set, community, &ScoringConfig::default());
        prop_assert_eq!(scores.len(), set.len());
        for s in scores {
            prop_assert!((0.0..=1.0).contains(&s.value()));
        }
    }

    #[test]
    fn scoring_is_deterministic(
        set in prop::collection::vec(centrality(), 1..24),
        community in prop::option::of(0i64..4),
    ) {
        let config = ScoringConfig::default();
        let first = network_confidence(&set, community, &config);
        let second = network_confidence(&set, community, &config);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn scoring_is_order_independent(
        (set, order) in prop::collection::vec(centrality(), 1..24).prop_flat_map(|set| {
            let n = set.len();
            (Just(set), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        }),
        community in prop::option::of(0i64..4),
    ) {
        let config = ScoringConfig::default();
        let original = network_confidence(&set, community, &config);
        let permuted: Vec<CentralityVector> = order.iter().map(|&i| set[i].clone()).collect();
        let shuffled = network_confidence(&permuted, community, &config);
        for (pos, &i) in order.iter().enumerate() {
            prop_assert_eq!(shuffled[pos], original[i]);
        }
    }

    #[test]
    fn strength_is_monotonic_and_saturates(c in category(), a in 0u64..50, b in 0u64..50) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(strength(c, lo) <= strength(c, hi));
        prop_assert!((0.0..=1.0).contains(&strength(c, hi)));
        if hi >= saturation(c) {
            prop_assert_eq!(strength(c, hi), 1.0);
        }
    }

    #[test]
    fn aggregate_strength_is_monotonic(
        counts in prop::collection::vec((category(), 0u64..10), 0..8),
        c in category(),
        extra in 1u64..10,
    ) {
        let base = Evidence::from_counts(counts);
        let more = base.clone().with_count(c, base.count(c) + extra);
        prop_assert!(base.aggregate_strength() <= more.aggregate_strength());
        prop_assert!((0.0..=1.0).contains(&more.aggregate_strength()));
    }

    #[test]
    fn ranking_is_a_total_order(
        scores in prop::collection::vec((0.0f64..=1.0, "[A-Z][0-9]{1,3}"), 0..20),
    ) {
        let mut items: Vec<(scholar_core::ConfidenceScore, WorkId)> = scores
            .into_iter()
            .map(|(s, id)| (scholar_core::ConfidenceScore::clipped(s), WorkId(id)))
            .collect();
        items.sort_by(|a, b| rank_order((a.0, &a.1), (b.0, &b.1)));
        for pair in items.windows(2) {
            prop_assert!(pair[0].0.value() >= pair[1].0.value());
            if pair[0].0 == pair[1].0 {
                prop_assert!(pair[0].1 <= pair[1].1);
            }
        }
    }
}

#[test]
fn stronger_evidence_in_shared_community_wins() {
    let config = ScoringConfig::default();
    let target_community = Some(1);
    let a = CentralityVector {
        degree: 3.0,
        betweenness: 1.0,
        closeness: 0.5,
        pagerank: 0.8,
        community_id: Some(1),
    };
    let b = CentralityVector {
        community_id: Some(2),
        ..a.clone()
    };

    let network = network_confidence(&[a, b], target_community, &config);
    let a_evidence = Evidence::new().with_count(EvidenceCategory::SharedAuthors, 3);
    let b_evidence = Evidence::new().with_count(EvidenceCategory::SharedAuthors, 1);

    let a_score = composite_score(network[0], a_evidence.aggregate_strength(), &config);
    let b_score = composite_score(network[1], b_evidence.aggregate_strength(), &config);
    assert!(a_score > b_score, "{a_score} <= {b_score}");
}

#[test]
fn community_bonus_reorders_close_candidates() {
    let config = ScoringConfig::default();
    let uniform = |value: f64, community_id: Option<i64>| CentralityVector {
        degree: value,
        betweenness: value,
        closeness: value,
        pagerank: value,
        community_id,
    };
    // Normalised against the 0 and 10 extremes, A sits at 0.9 and B at 0.96.
    let set = [
        uniform(0.0, None),
        uniform(10.0, Some(2)),
        uniform(9.6, Some(2)),
        uniform(9.0, Some(1)),
    ];
    let ids = [WorkId::from("C"), WorkId::from("D"), WorkId::from("B"), WorkId::from("A")];
    let evidence = Evidence::new()
        .with_count(EvidenceCategory::SharedTopics, 2)
        .aggregate_strength();

    let ranking = |target: Option<i64>| -> Vec<WorkId> {
        let network = network_confidence(&set, target, &config);
        let mut scored: Vec<_> = network
            .iter()
            .zip(&ids)
            .map(|(n, id)| (composite_score(*n, evidence, &config), id.clone()))
            .collect();
        scored.sort_by(|a, b| rank_order((a.0, &a.1), (b.0, &b.1)));
        scored.into_iter().map(|(_, id)| id).collect()
    };

    let without = ranking(None);
    let with = ranking(Some(1));
    let position = |order: &[WorkId], id: &str| order.iter().position(|w| w.0 == id);

    assert!(position(&without, "B") < position(&without, "A"), "{without:?}");
    assert!(position(&with, "A") < position(&with, "B"), "{with:?}");
    assert_eq!(with[0], WorkId::from("D"));

    let network = network_confidence(&set, Some(1), &config);
    assert!((network[3].value() - 0.99).abs() < 1e-9);
    assert!((network[2].value() - 0.96).abs() < 1e-9);
}
