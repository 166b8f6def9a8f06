//! CourseMatch Vector crate - embedding providers, retrying embedder,
//! flat vector index and the course recommender.
//!
//! Provides an embedding provider trait with OpenAI-compatible and mock
//! implementations, a rate-limit-aware [`TextEmbedder`] in front of it, an
//! exact nearest-neighbor index, and the [`Recommender`] that ties a course
//! corpus to an index snapshot.

pub mod embedder;
pub mod embedding;
pub mod index;
pub mod openai;
pub mod recommender;
pub mod retry;

pub use embedder::TextEmbedder;
pub use embedding::{DynEmbeddingProvider, EmbeddingProvider, MockEmbedding, ProviderError};
pub use index::{FlatIndex, SearchHit, VectorIndex};
pub use openai::OpenAiProvider;
pub use recommender::{BuildReport, IndexSnapshot, Recommender, RecommenderState, Session};
pub use retry::{RateLimitGate, RetryPolicy};
