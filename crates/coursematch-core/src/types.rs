use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque identifier of a course, assigned by whoever collected the catalog.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(String);

impl CourseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CourseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CourseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Distance function used by a vector index.
///
/// The two metrics rank in opposite directions and must never be mixed:
/// squared Euclidean is a distance (lower is better), cosine is a similarity
/// (higher is better).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared L2 distance, reported unrooted. Lower is better.
    #[default]
    SquaredEuclidean,
    /// Cosine similarity in [-1, 1]. Higher is better.
    Cosine,
}

impl Metric {
    /// Order two scores so that the better one sorts first.
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        match self {
            Metric::SquaredEuclidean => a.total_cmp(&b),
            Metric::Cosine => b.total_cmp(&a),
        }
    }

    /// Returns true if score `a` is strictly better than score `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Whether larger scores are better under this metric.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::Cosine)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::SquaredEuclidean => f.write_str("squared_euclidean"),
            Metric::Cosine => f.write_str("cosine"),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A single course as supplied by the catalog collector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: CourseId,
    pub title: String,
    /// Text that gets embedded: usually the description, sometimes the title.
    pub text: String,
    /// Free-form attributes such as link, specialization or price tier.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CourseRecord {
    pub fn new(id: impl Into<CourseId>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Builder-style helper to attach a metadata attribute.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The course page link, if the collector recorded one.
    pub fn link(&self) -> Option<&str> {
        self.metadata.get("link").map(String::as_str)
    }
}

/// An embedding paired with the course it represents.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub id: CourseId,
    pub vector: Vec<f32>,
}

impl IndexEntry {
    pub fn new(id: impl Into<CourseId>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
        }
    }
}

/// The outcome of a recommendation: the resolved course plus its raw score.
///
/// `score` is exactly what the index computed under `metric`; interpreting
/// its magnitude (e.g. a "no good match" threshold) is up to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub course: CourseRecord,
    pub score: f64,
    pub metric: Metric,
}
