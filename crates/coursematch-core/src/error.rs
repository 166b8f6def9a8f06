use thiserror::Error;

/// Top-level error type for the course matching engine.
///
/// Recoverable variants (`InvalidQuery`, `Embedding`, `EmptyCorpus`) are the
/// ones a presentation layer can turn into a "try again" message. Everything
/// else signals a configuration or consistency bug and must never be papered
/// over with a default recommendation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseMatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid course record: {0}")]
    InvalidCourse(String),

    #[error("Duplicate course id: {0}")]
    DuplicateCourse(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model mismatch: index built with '{indexed}', requested '{requested}'")]
    ModelMismatch { indexed: String, requested: String },

    #[error("Corpus is empty")]
    EmptyCorpus,

    #[error("Recommender is not ready: no index has been built")]
    NotReady,

    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CourseMatchError {
    /// True for errors the end user can recover from by retrying or
    /// rephrasing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CourseMatchError::InvalidQuery(_)
                | CourseMatchError::Embedding(_)
                | CourseMatchError::EmptyCorpus
        )
    }

    /// True for errors that indicate a programming or configuration bug.
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}

/// Failure to turn a piece of text into an embedding vector.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed embedding: {0}")]
    Malformed(String),
}

impl From<toml::de::Error> for CourseMatchError {
    fn from(err: toml::de::Error) -> Self {
        CourseMatchError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CourseMatchError {
    fn from(err: toml::ser::Error) -> Self {
        CourseMatchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CourseMatchError {
    fn from(err: serde_json::Error) -> Self {
        CourseMatchError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for course matching operations.
pub type Result<T> = std::result::Result<T, CourseMatchError>;
