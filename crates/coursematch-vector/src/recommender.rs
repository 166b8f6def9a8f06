//! Course recommender: corpus -> embeddings -> index -> best match.
//!
//! The recommender is either `Unready` (nothing built) or `Ready` (holding an
//! [`IndexSnapshot`]). A snapshot bundles the corpus, the index built over it
//! and the model that produced the vectors, so ids always resolve against
//! the exact corpus they were indexed from.
//!
//! Rebuilding is copy-and-swap: the new snapshot is built completely before
//! it replaces the old one, and requests pin the snapshot they started with.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use coursematch_core::config::IndexConfig;
use coursematch_core::corpus::CorpusStore;
use coursematch_core::error::{CourseMatchError, Result};
use coursematch_core::types::{IndexEntry, MatchResult, Metric};

use crate::embedder::TextEmbedder;
use crate::index::{FlatIndex, VectorIndex};

/// Everything one built index needs to answer queries consistently.
#[derive(Debug)]
pub struct IndexSnapshot {
    id: Uuid,
    built_at: DateTime<Utc>,
    model: String,
    corpus: Arc<CorpusStore>,
    index: Box<dyn VectorIndex>,
}

impl IndexSnapshot {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Model whose vectors populate this index. Queries must use it too.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn metric(&self) -> Metric {
        self.index.metric()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    /// Search with an already-embedded query and resolve hits to courses.
    pub fn matches(&self, query_vector: &[f32], k: usize) -> Result<Vec<MatchResult>> {
        let hits = self.index.search(query_vector, k)?;
        let metric = self.index.metric();

        hits.into_iter()
            .map(|hit| match self.corpus.get(&hit.id) {
                Some(course) => Ok(MatchResult {
                    course: course.clone(),
                    score: hit.score,
                    metric,
                }),
                None => {
                    error!(
                        snapshot = %self.id,
                        course_id = %hit.id,
                        "Index returned an id missing from its corpus"
                    );
                    Err(CourseMatchError::InternalConsistency(format!(
                        "course '{}' is indexed but absent from snapshot {}",
                        hit.id, self.id
                    )))
                }
            })
            .collect()
    }
}

/// Observable lifecycle state of a [`Recommender`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RecommenderState {
    Unready,
    Ready {
        snapshot_id: Uuid,
        model: String,
        courses: usize,
    },
}

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub snapshot_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub model: String,
    pub metric: Metric,
    pub courses: usize,
    /// Distinct texts actually sent to the provider.
    pub unique_texts: usize,
    pub dimensions: usize,
}

/// Per-caller preferences, owned by the caller rather than the recommender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Model the caller expects the index to use. `None` accepts any.
    pub model: Option<String>,
    /// How many recommendations to return.
    pub top_k: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            model: None,
            top_k: 1,
        }
    }
}

/// Answers "which course best matches this text".
pub struct Recommender {
    embedder: TextEmbedder,
    metric: Metric,
    build_concurrency: usize,
    default_top_k: usize,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("embedder", &self.embedder)
            .field("metric", &self.metric)
            .field("build_concurrency", &self.build_concurrency)
            .field("default_top_k", &self.default_top_k)
            .finish()
    }
}

impl Recommender {
    /// Create an unready recommender with squared Euclidean ranking.
    pub fn new(embedder: TextEmbedder) -> Self {
        Self::from_config(embedder, &IndexConfig::default())
    }

    pub fn from_config(embedder: TextEmbedder, config: &IndexConfig) -> Self {
        Self {
            embedder,
            metric: config.metric,
            build_concurrency: config.build_concurrency.max(1),
            default_top_k: config.default_top_k.max(1),
            current: RwLock::new(None),
        }
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_build_concurrency(mut self, concurrency: usize) -> Self {
        self.build_concurrency = concurrency.max(1);
        self
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn embedder(&self) -> &TextEmbedder {
        &self.embedder
    }

    pub fn state(&self) -> RecommenderState {
        match self.current_snapshot() {
            Some(snapshot) => RecommenderState::Ready {
                snapshot_id: snapshot.id,
                model: snapshot.model.clone(),
                courses: snapshot.corpus.len(),
            },
            None => RecommenderState::Unready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.current_snapshot().is_some()
    }

    /// Pin the current snapshot, failing with `NotReady` before the first build.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        self.current_snapshot().ok_or(CourseMatchError::NotReady)
    }

    fn current_snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Embed `corpus` with `model` and make the resulting index current.
    ///
    /// The previous snapshot keeps serving until the new one is complete; if
    /// the build fails the previous snapshot stays in place.
    pub async fn build(&self, corpus: CorpusStore, model: &str) -> Result<BuildReport> {
        if model.trim().is_empty() {
            return Err(CourseMatchError::Config(
                "embedding model must not be empty".to_string(),
            ));
        }

        let texts = corpus.unique_texts();
        let unique_texts = texts.len();
        info!(
            courses = corpus.len(),
            unique_texts,
            model,
            metric = %self.metric,
            "Building course index"
        );

        let vectors = self
            .embedder
            .embed_many(&texts, model, self.build_concurrency)
            .await?;

        let entries = corpus
            .iter()
            .map(|course| match vectors.get(&course.text) {
                Some(vector) => Ok(IndexEntry::new(course.id.clone(), vector.clone())),
                None => Err(CourseMatchError::InternalConsistency(format!(
                    "no embedding produced for course '{}'",
                    course.id
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let index = FlatIndex::build(entries, self.metric)?;
        let snapshot = Arc::new(IndexSnapshot {
            id: Uuid::new_v4(),
            built_at: Utc::now(),
            model: model.to_string(),
            corpus: Arc::new(corpus),
            index: Box::new(index),
        });

        let report = BuildReport {
            snapshot_id: snapshot.id,
            built_at: snapshot.built_at,
            model: snapshot.model.clone(),
            metric: snapshot.metric(),
            courses: snapshot.corpus.len(),
            unique_texts,
            dimensions: snapshot.dimensions(),
        };

        self.swap(snapshot);
        info!(
            snapshot = %report.snapshot_id,
            courses = report.courses,
            dimensions = report.dimensions,
            "Course index is live"
        );
        Ok(report)
    }

    fn swap(&self, snapshot: Arc<IndexSnapshot>) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(snapshot);
    }

    /// Best single course for `query`.
    pub async fn recommend(&self, query: &str) -> Result<MatchResult> {
        let snapshot = self.prepare(query)?;
        self.best_of(&snapshot, query).await
    }

    /// Best single course, asserting the index was built with `model`.
    pub async fn recommend_with_model(&self, query: &str, model: &str) -> Result<MatchResult> {
        let snapshot = self.prepare(query)?;
        ensure_model(&snapshot, model)?;
        self.best_of(&snapshot, query).await
    }

    /// Top `k` courses for `query`, best first.
    pub async fn recommend_top(&self, query: &str, k: usize) -> Result<Vec<MatchResult>> {
        let snapshot = self.prepare(query)?;
        self.search_in(&snapshot, query, k).await
    }

    /// Recommendations shaped by a caller-owned [`Session`].
    pub async fn recommend_for(&self, session: &Session, query: &str) -> Result<Vec<MatchResult>> {
        let snapshot = self.prepare(query)?;
        if let Some(model) = session.model.as_deref() {
            ensure_model(&snapshot, model)?;
        }
        self.search_in(&snapshot, query, session.top_k).await
    }

    /// Validate the query and pin the snapshot the request will use.
    fn prepare(&self, query: &str) -> Result<Arc<IndexSnapshot>> {
        if query.trim().is_empty() {
            return Err(CourseMatchError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        self.snapshot()
    }

    async fn best_of(&self, snapshot: &IndexSnapshot, query: &str) -> Result<MatchResult> {
        self.search_in(snapshot, query, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CourseMatchError::InternalConsistency(format!(
                    "snapshot {} returned no results",
                    snapshot.id
                ))
            })
    }

    async fn search_in(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        k: usize,
    ) -> Result<Vec<MatchResult>> {
        if k == 0 {
            return Err(CourseMatchError::InvalidQuery(
                "result count must be at least 1".to_string(),
            ));
        }
        let vector = self.embedder.embed(query, &snapshot.model).await?;
        let results = snapshot.matches(&vector, k)?;
        debug!(
            snapshot = %snapshot.id,
            k,
            best = results.first().map(|m| m.course.id.as_str()),
            "Query answered"
        );
        Ok(results)
    }
}

fn ensure_model(snapshot: &IndexSnapshot, requested: &str) -> Result<()> {
    if snapshot.model != requested {
        return Err(CourseMatchError::ModelMismatch {
            indexed: snapshot.model.clone(),
            requested: requested.to_string(),
        });
    }
    Ok(())
}
