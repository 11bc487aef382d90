//! Relationship evidence aggregation.
//!
//! Each category's strength is `min(1, count / saturation)`. Categories are
//! independent: a missing category never lowers another's strength.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use scholar_core::{EvidenceCategory, WorkId};

/// Count at which a category's strength reaches 1.0.
pub fn saturation(category: EvidenceCategory) -> u64 {
    match category {
        EvidenceCategory::SharedAuthors => 3,
        EvidenceCategory::SharedTopics => 5,
        EvidenceCategory::SharedAward => 1,
        EvidenceCategory::ExplicitRelation => 1,
    }
}

/// Weight of a category in [`Evidence::aggregate_strength`]. A stored
/// relation counts double.
pub fn weight(category: EvidenceCategory) -> f64 {
    match category {
        EvidenceCategory::ExplicitRelation => 2.0,
        _ => 1.0,
    }
}

/// Strength of `count` pieces of evidence in `category`.
pub fn strength(category: EvidenceCategory, count: u64) -> f64 {
    (count as f64 / saturation(category) as f64).min(1.0)
}

/// Raw count and derived strength for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEvidence {
    pub count: u64,
    pub strength: f64,
}

/// Evidence for one candidate, keyed by category in reporting order.
///
/// Every category is always present, with a zero count when nothing was
/// observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evidence(BTreeMap<EvidenceCategory, CategoryEvidence>);

impl Default for Evidence {
    fn default() -> Self {
        Self(
            EvidenceCategory::ALL
                .iter()
                .map(|&c| (c, CategoryEvidence::default()))
                .collect(),
        )
    }
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw counts. Later counts for the same category win.
    pub fn from_counts(counts: impl IntoIterator<Item = (EvidenceCategory, u64)>) -> Self {
        let mut evidence = Self::new();
        for (category, count) in counts {
            evidence.set_count(category, count);
        }
        evidence
    }

    pub fn with_count(mut self, category: EvidenceCategory, count: u64) -> Self {
        self.set_count(category, count);
        self
    }

    pub fn set_count(&mut self, category: EvidenceCategory, count: u64) {
        self.0.insert(
            category,
            CategoryEvidence {
                count,
                strength: strength(category, count),
            },
        );
    }

    pub fn count(&self, category: EvidenceCategory) -> u64 {
        self.0.get(&category).map_or(0, |e| e.count)
    }

    pub fn strength(&self, category: EvidenceCategory) -> f64 {
        self.0.get(&category).map_or(0.0, |e| e.strength)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EvidenceCategory, &CategoryEvidence)> {
        self.0.iter().map(|(c, e)| (*c, e))
    }

    /// True when no category has any evidence.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|e| e.count == 0)
    }

    /// Weighted mean of category strengths, in `[0, 1]`.
    pub fn aggregate_strength(&self) -> f64 {
        let total: f64 = EvidenceCategory::ALL.iter().map(|&c| weight(c)).sum();
        let weighted: f64 = EvidenceCategory::ALL
            .iter()
            .map(|&c| weight(c) * self.strength(c))
            .sum();
        (weighted / total).clamp(0.0, 1.0)
    }
}

/// A candidate work and the evidence linking it to the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvidence {
    pub work_id: WorkId,
    pub title: Option<String>,
    pub evidence: Evidence,
}

/// Evidence gathered per candidate across category queries.
#[derive(Debug, Clone, Default)]
pub struct EvidenceTable {
    candidates: BTreeMap<WorkId, CandidateEvidence>,
}

impl EvidenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` for `work_id` in `category`.
    ///
    /// A count of zero still registers the candidate. Repeated records for
    /// the same category are summed.
    pub fn record(
        &mut self,
        category: EvidenceCategory,
        work_id: WorkId,
        title: Option<String>,
        count: u64,
    ) {
        let entry = self
            .candidates
            .entry(work_id.clone())
            .or_insert_with(|| CandidateEvidence {
                work_id,
                title: None,
                evidence: Evidence::new(),
            });
        if entry.title.is_none() {
            entry.title = title;
        }
        let total = entry.evidence.count(category).saturating_add(count);
        entry.evidence.set_count(category, total);
    }

    /// Drop a candidate, e.g. the target itself.
    pub fn remove(&mut self, work_id: &WorkId) {
        self.candidates.remove(work_id);
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn work_ids(&self) -> impl Iterator<Item = &WorkId> {
        self.candidates.keys()
    }

    pub fn into_candidates(self) -> Vec<CandidateEvidence> {
        self.candidates.into_values().collect()
    }
}
