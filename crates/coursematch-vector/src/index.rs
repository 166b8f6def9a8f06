//! Read-only vector index with exact brute-force search.
//!
//! Catalogs from a single site hold tens to a few hundred courses, so an
//! O(n) scan per query is both exact and fast enough. Callers go through the
//! [`VectorIndex`] trait so an approximate structure can replace
//! [`FlatIndex`] later without touching them.

use coursematch_core::error::{CourseMatchError, Result};
use coursematch_core::types::{CourseId, IndexEntry, Metric};

/// A single hit returned from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: CourseId,
    /// Raw score under the index metric.
    pub score: f64,
}

/// Nearest-neighbor lookup over a fixed set of vectors.
///
/// Implementations are immutable once built, so `search` may be called
/// concurrently without locking.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    fn metric(&self) -> Metric;

    /// Dimension shared by every indexed vector.
    fn dimensions(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the `min(k, len)` best entries for `query`, best first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;
}

/// Exact index that scores every entry on each query.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    metric: Metric,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Build an index over `entries`, keeping their order for tie-breaks.
    ///
    /// Fails if `entries` is empty or if any vector's length differs from
    /// the first one.
    pub fn build(entries: Vec<IndexEntry>, metric: Metric) -> Result<Self> {
        let dimensions = match entries.first() {
            Some(first) => first.vector.len(),
            None => return Err(CourseMatchError::EmptyCorpus),
        };
        if dimensions == 0 {
            return Err(CourseMatchError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimensions) {
            return Err(CourseMatchError::DimensionMismatch {
                expected: dimensions,
                actual: bad.vector.len(),
            });
        }

        Ok(Self {
            metric,
            dimensions,
            entries,
        })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

impl VectorIndex for FlatIndex {
    fn metric(&self) -> Metric {
        self.metric
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(CourseMatchError::InvalidQuery(
                "result count must be at least 1".to_string(),
            ));
        }
        if query.len() != self.dimensions {
            return Err(CourseMatchError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, score(self.metric, query, &entry.vector)))
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| self.metric.compare(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| SearchHit {
                id: self.entries[pos].id.clone(),
                score,
            })
            .collect())
    }
}

fn score(metric: Metric, a: &[f32], b: &[f32]) -> f64 {
    match metric {
        Metric::SquaredEuclidean => squared_euclidean(a, b),
        Metric::Cosine => cosine_similarity(a, b),
    }
}

/// Squared L2 distance. Callers must pass equal-length slices.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum()
}

/// Cosine similarity. Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
