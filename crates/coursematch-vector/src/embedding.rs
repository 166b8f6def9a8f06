//! Embedding provider trait and the offline mock implementation.
//!
//! A provider performs exactly one attempt per call and reports failures as
//! [`ProviderError`] so that the retry layer in [`crate::embedder`] can tell
//! throttling apart from hard failures.
//!
//! - `OpenAiProvider` (see [`crate::openai`]) talks to an OpenAI-compatible
//!   HTTP endpoint. This is the production backend.
//! - `MockEmbedding` feature-hashes words into a fixed-size vector, for tests
//!   and offline runs.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single provider attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The provider asked us to slow down. Retryable.
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    /// Server-suggested wait, if the provider sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// A remote or local service that turns text into an embedding vector.
///
/// Vectors from different models are not comparable, so the model is part of
/// every request rather than hidden inside the provider.
pub trait EmbeddingProvider: Send + Sync {
    /// Perform one embedding attempt for `text` with `model`.
    fn embed(
        &self,
        text: &str,
        model: &str,
    ) -> impl Future<Output = Result<Vec<f32>, ProviderError>> + Send;

    /// Short human-readable name used in logs.
    fn name(&self) -> &str;
}

/// Object-safe version of [`EmbeddingProvider`] for dynamic dispatch.
///
/// `EmbeddingProvider::embed` returns `impl Future`, which is not
/// object-safe. This trait boxes the future so that
/// `Arc<dyn DynEmbeddingProvider>` can be stored without generics.
pub trait DynEmbeddingProvider: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
        model: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, ProviderError>> + Send + 'a>>;

    fn provider_name(&self) -> &str;
}

impl<T: EmbeddingProvider> DynEmbeddingProvider for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
        model: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, ProviderError>> + Send + 'a>> {
        Box::pin(self.embed(text, model))
    }

    fn provider_name(&self) -> &str {
        EmbeddingProvider::name(self)
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic bag-of-words vectors
// ---------------------------------------------------------------------------

/// Default vector size of [`MockEmbedding`].
pub const MOCK_DIMENSIONS: usize = 256;

/// Mock provider producing deterministic, L2-normalized bag-of-words vectors.
///
/// Each lower-cased word is hashed (together with the model name) into one
/// bucket with a +1/-1 sign. Texts that share words end up close together,
/// and the same text embedded under two model names yields unrelated
/// vectors, just like a real provider would.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(MOCK_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn hash_to_vector(&self, text: &str, model: &str) -> Vec<f32> {
        let mut result = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            model.hash(&mut hasher);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            result[bucket] += sign;
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::Malformed("cannot embed empty text".to_string()));
        }
        Ok(self.hash_to_vector(text, model))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
