//! Retrying, rate-limit-aware front end for an [`EmbeddingProvider`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error, warn};

use coursematch_core::error::{CourseMatchError, EmbeddingError, Result};

use crate::embedding::{DynEmbeddingProvider, EmbeddingProvider, ProviderError};
use crate::retry::{RateLimitGate, RetryPolicy};

/// Default timeout applied to every individual provider attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Validates input, bounds each attempt with a timeout and retries
/// rate-limited attempts with exponential backoff.
///
/// Clones share the same provider and the same [`RateLimitGate`], so a
/// throttling signal seen by one clone pauses all of them.
#[derive(Clone)]
pub struct TextEmbedder {
    provider: Arc<dyn DynEmbeddingProvider>,
    policy: RetryPolicy,
    gate: RateLimitGate,
    attempt_timeout: Duration,
}

impl std::fmt::Debug for TextEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEmbedder")
            .field("provider", &self.provider.provider_name())
            .field("policy", &self.policy)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl TextEmbedder {
    pub fn new(provider: impl EmbeddingProvider + 'static) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    pub fn from_arc(provider: Arc<dyn DynEmbeddingProvider>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            gate: RateLimitGate::new(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn gate(&self) -> &RateLimitGate {
        &self.gate
    }

    /// Embed one text with `model`.
    ///
    /// Blank text is rejected before the provider is contacted.
    pub async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput.into());
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut failures = 0u32;

        loop {
            self.gate.wait_ready().await;
            debug!(
                provider = self.provider.provider_name(),
                model,
                attempt = failures + 1,
                "Requesting embedding"
            );

            let outcome = match tokio::time::timeout(
                self.attempt_timeout,
                self.provider.embed_boxed(text, model),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.attempt_timeout)),
            };

            let err = match outcome {
                Ok(vector) => return Ok(validate(vector)?),
                Err(err) => err,
            };

            if !self.policy.should_retry(&err) {
                warn!(provider = self.provider.provider_name(), error = %err, "Embedding failed");
                return Err(EmbeddingError::Provider(err.to_string()).into());
            }

            let delay = self.policy.delay_for(failures, &err);
            failures += 1;
            if err.is_rate_limited() {
                self.gate.pause_for(delay);
            }

            if failures >= max_attempts {
                error!(
                    provider = self.provider.provider_name(),
                    attempts = failures,
                    error = %err,
                    "Embedding retries exhausted"
                );
                return Err(EmbeddingError::RetriesExhausted {
                    attempts: failures,
                    last: err.to_string(),
                }
                .into());
            }

            warn!(
                provider = self.provider.provider_name(),
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Provider asked to back off, retrying"
            );
            if !err.is_rate_limited() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Embed many texts, calling the provider once per distinct text.
    ///
    /// At most `concurrency` calls are in flight. The first failure aborts
    /// the whole batch.
    pub async fn embed_many(
        &self,
        texts: &[&str],
        model: &str,
        concurrency: usize,
    ) -> Result<HashMap<String, Vec<f32>>> {
        let mut seen = HashSet::with_capacity(texts.len());
        let unique: Vec<&str> = texts.iter().copied().filter(|t| seen.insert(*t)).collect();

        debug!(
            requested = texts.len(),
            unique = unique.len(),
            concurrency,
            "Embedding batch"
        );

        stream::iter(unique)
            .map(|text| async move {
                let vector = self.embed(text, model).await?;
                Ok::<_, CourseMatchError>((text.to_string(), vector))
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await
    }
}

fn validate(vector: Vec<f32>) -> std::result::Result<Vec<f32>, EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::Malformed(
            "provider returned an empty vector".to_string(),
        ));
    }
    if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::Malformed(format!(
            "component {} is not a finite number",
            pos
        )));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tokio::time::Instant;

    use crate::embedding::MockEmbedding;
    use crate::retry::rate_limits_and_timeouts;

    const MODEL: &str = "test-model";

    /// Replays a fixed script of outcomes and records when each call happened.
    struct ScriptedProvider {
        script: Mutex<Vec<std::result::Result<Vec<f32>, ProviderError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedProvider {
        fn new(mut script: Vec<std::result::Result<Vec<f32>, ProviderError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn always_rate_limited() -> Self {
            Self::new(Vec::new())
        }
    }

    impl EmbeddingProvider for ScriptedProvider {
        async fn embed(
            &self,
            _text: &str,
            _model: &str,
        ) -> std::result::Result<Vec<f32>, ProviderError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(ProviderError::RateLimited { retry_after: None }))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Counts calls per distinct text.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl EmbeddingProvider for CountingProvider {
        async fn embed(
            &self,
            text: &str,
            _model: &str,
        ) -> std::result::Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(100),
            Duration::from_secs(60),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_embed_success() {
        let embedder = TextEmbedder::new(MockEmbedding::with_dimensions(16));
        let vec = embedder.embed("learn sql", MODEL).await.unwrap();
        assert_eq!(vec.len(), 16);
        assert_eq!(embedder.provider_name(), "mock");
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_provider_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![1.0])]));
        let embedder = TextEmbedder::from_arc(provider.clone());

        for text in ["", "   ", "\n\t"] {
            let err = embedder.embed(text, MODEL).await.unwrap_err();
            assert!(matches!(
                err,
                CourseMatchError::Embedding(EmbeddingError::EmptyInput)
            ));
        }
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limit() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::RateLimited { retry_after: None }),
            Err(ProviderError::RateLimited { retry_after: None }),
            Ok(vec![0.5, 0.5]),
        ]));
        let embedder = TextEmbedder::from_arc(provider.clone()).with_retry_policy(fast_policy(5));

        let vec = embedder.embed("hello", MODEL).await.unwrap();
        assert_eq!(vec, vec![0.5, 0.5]);
        assert_eq!(provider.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_geometrically_then_gives_up() {
        let provider = Arc::new(ScriptedProvider::always_rate_limited());
        let embedder = TextEmbedder::from_arc(provider.clone()).with_retry_policy(fast_policy(5));

        let err = embedder.embed("hello", MODEL).await.unwrap_err();
        match &err {
            CourseMatchError::Embedding(EmbeddingError::RetriesExhausted { attempts, .. }) => {
                assert_eq!(*attempts, 5)
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert!(err.to_string().contains("retries exhausted"));

        let calls = provider.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 5);

        let gaps: Vec<u128> = calls
            .windows(2)
            .map(|w| w[1].duration_since(w[0]).as_millis())
            .collect();
        let expected = [100u128, 200, 400, 800];
        for (gap, want) in gaps.iter().zip(expected) {
            assert!(
                gap.abs_diff(want) <= 5,
                "gap {gap}ms, expected about {want}ms (all gaps: {gaps:?})"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_immediately() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Http {
            status: 401,
            body: "invalid api key".into(),
        })]));
        let embedder = TextEmbedder::from_arc(provider.clone()).with_retry_policy(fast_policy(5));

        let err = embedder.embed("hello", MODEL).await.unwrap_err();
        match err {
            CourseMatchError::Embedding(EmbeddingError::Provider(msg)) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("invalid api key"));
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    struct SlowProvider;

    impl EmbeddingProvider for SlowProvider {
        async fn embed(
            &self,
            _text: &str,
            _model: &str,
        ) -> std::result::Result<Vec<f32>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(vec![1.0])
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_fatal_by_default() {
        let embedder = TextEmbedder::new(SlowProvider)
            .with_retry_policy(fast_policy(3))
            .with_attempt_timeout(Duration::from_secs(1));

        let started = Instant::now();
        let err = embedder.embed("hello", MODEL).await.unwrap_err();
        assert!(matches!(
            err,
            CourseMatchError::Embedding(EmbeddingError::Provider(ref m)) if m.contains("timed out")
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_retried_with_custom_predicate() {
        let embedder = TextEmbedder::new(SlowProvider)
            .with_retry_policy(fast_policy(3).with_predicate(rate_limits_and_timeouts))
            .with_attempt_timeout(Duration::from_secs(1));

        let err = embedder.embed("hello", MODEL).await.unwrap_err();
        assert!(matches!(
            err,
            CourseMatchError::Embedding(EmbeddingError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_vectors_rejected() {
        let embedder = TextEmbedder::new(ScriptedProvider::new(vec![Ok(Vec::new())]));
        let err = embedder.embed("hello", MODEL).await.unwrap_err();
        assert!(matches!(
            err,
            CourseMatchError::Embedding(EmbeddingError::Malformed(_))
        ));

        let embedder = TextEmbedder::new(ScriptedProvider::new(vec![Ok(vec![1.0, f32::NAN])]));
        let err = embedder.embed("hello", MODEL).await.unwrap_err();
        assert!(matches!(
            err,
            CourseMatchError::Embedding(EmbeddingError::Malformed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_honored() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(2)),
            }),
            Ok(vec![1.0]),
        ]));
        let embedder = TextEmbedder::from_arc(provider.clone()).with_retry_policy(fast_policy(5));

        embedder.embed("hello", MODEL).await.unwrap();
        let calls = provider.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].duration_since(calls[0]) >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_wait_on_shared_gate() {
        let embedder = TextEmbedder::new(MockEmbedding::new());
        let sibling = embedder.clone();

        embedder.gate().pause_for(Duration::from_secs(1));
        assert!(sibling.gate().is_paused());

        let started = Instant::now();
        sibling.embed("hello", MODEL).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_embed_many_dedups_and_bounds_concurrency() {
        let provider = Arc::new(CountingProvider::default());
        let embedder = TextEmbedder::from_arc(provider.clone());

        let texts = ["a", "bb", "a", "ccc", "bb", "dddd", "eeeee"];
        let vectors = embedder.embed_many(&texts, MODEL, 2).await.unwrap();

        assert_eq!(vectors.len(), 5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
        assert!(provider.peak_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(vectors["ccc"], vec![3.0, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_many_fails_on_first_error() {
        let embedder = TextEmbedder::new(MockEmbedding::new());
        let err = embedder
            .embed_many(&["valid text", "  "], MODEL, 4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CourseMatchError::Embedding(EmbeddingError::EmptyInput)
        ));
    }
}
