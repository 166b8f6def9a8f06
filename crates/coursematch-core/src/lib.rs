pub mod config;
pub mod corpus;
pub mod error;
pub mod types;

pub use config::CourseMatchConfig;
pub use corpus::CorpusStore;
pub use error::{CourseMatchError, EmbeddingError, Result};
pub use types::*;
