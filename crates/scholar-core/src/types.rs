//! Shared scoring types for relationship discovery.
//!
//! These are per-request values: built from graph rows, scored, ranked, and
//! discarded once the response is returned.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────

/// The `id` property of a `Work` node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct WorkId(pub String);

impl WorkId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Evidence ─────────────────────────────────────────────────────

/// One independent kind of shared attribute between two works.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    SharedAuthors,
    SharedTopics,
    SharedAward,
    ExplicitRelation,
}

impl EvidenceCategory {
    /// All categories in reporting order.
    pub const ALL: [EvidenceCategory; 4] = [
        Self::SharedAuthors,
        Self::SharedTopics,
        Self::SharedAward,
        Self::ExplicitRelation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SharedAuthors => "shared_authors",
            Self::SharedTopics => "shared_topics",
            Self::SharedAward => "shared_award",
            Self::ExplicitRelation => "explicit_relation",
        }
    }
}

impl fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Centrality ───────────────────────────────────────────────────

/// Raw centrality and community signals for one node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CentralityVector {
    #[serde(default)]
    pub degree: f64,
    #[serde(default)]
    pub betweenness: f64,
    #[serde(default)]
    pub closeness: f64,
    #[serde(default)]
    pub pagerank: f64,
    #[serde(default)]
    pub community_id: Option<i64>,
}

// ── Confidence ───────────────────────────────────────────────────

/// A score guaranteed to lie in `[0.0, 1.0]`.
///
/// Non-finite input collapses to 0.0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, PartialOrd)]
#[serde(try_from = "f64", into = "f64")]
pub struct ConfidenceScore(f64);

impl ConfidenceScore {
    pub const ZERO: ConfidenceScore = ConfidenceScore(0.0);
    pub const MAX: ConfidenceScore = ConfidenceScore(1.0);

    /// Clip `value` into `[0, 1]`.
    pub fn clipped(value: f64) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 1.0))
        } else {
            Self(0.0)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn level(self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.0)
    }
}

impl TryFrom<f64> for ConfidenceScore {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("confidence score {value} outside [0, 1]"))
        }
    }
}

impl From<ConfidenceScore> for f64 {
    fn from(score: ConfidenceScore) -> f64 {
        score.0
    }
}

impl fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Human-readable bucket for a confidence score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfidenceLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::VeryHigh
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.4 {
            Self::Moderate
        } else if score >= 0.2 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "Very Low",
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clipping() {
        assert_eq!(ConfidenceScore::clipped(1.3).value(), 1.0);
        assert_eq!(ConfidenceScore::clipped(-0.2).value(), 0.0);
        assert_eq!(ConfidenceScore::clipped(f64::NAN).value(), 0.0);
        assert_eq!(ConfidenceScore::clipped(0.42).value(), 0.42);
    }

    #[test]
    fn test_confidence_levels() {
        assert_eq!(ConfidenceScore::clipped(0.85).level(), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceScore::clipped(0.6).level(), ConfidenceLevel::High);
        assert_eq!(ConfidenceScore::clipped(0.45).level(), ConfidenceLevel::Moderate);
        assert_eq!(ConfidenceScore::clipped(0.2).level(), ConfidenceLevel::Low);
        assert_eq!(ConfidenceScore::clipped(0.05).level(), ConfidenceLevel::VeryLow);
    }

    #[test]
    fn test_confidence_serde_rejects_out_of_range() {
        let ok: ConfidenceScore = serde_json::from_str("0.5").unwrap();
        assert_eq!(ok.value(), 0.5);
        assert!(serde_json::from_str::<ConfidenceScore>("1.5").is_err());
        assert_eq!(
            serde_json::to_string(&ConfidenceLevel::VeryHigh).unwrap(),
            "\"Very High\""
        );
    }

    #[test]
    fn test_evidence_category_names() {
        let names: Vec<&str> = EvidenceCategory::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec!["shared_authors", "shared_topics", "shared_award", "explicit_relation"]
        );
        assert_eq!(
            serde_json::to_string(&EvidenceCategory::SharedAward).unwrap(),
            "\"shared_award\""
        );
    }
}
