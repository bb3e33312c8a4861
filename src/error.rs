//! Error taxonomy for the retrieval pipeline.
//!
//! Every component propagates failures to its caller with the original
//! cause attached; nothing is retried or swallowed inside the pipeline.
//! The interactive loop reports a failure and keeps accepting queries;
//! the pipeline holds no state across queries, so one failure does not
//! poison the next.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Error classes surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Connection, authentication, or cluster-topology failure in the
    /// storage layer. Never retried automatically; the failed operation
    /// aborts the containing pipeline step.
    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed statement or schema mismatch (unknown column, wrong
    /// type, vector dimension mismatch). Surfaced immediately.
    #[error("query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An embedding or generation model could not be acquired. Fatal to
    /// the component that needed it; no partial operation proceeds.
    #[error("model unavailable: {model}: {message}")]
    ModelUnavailable { model: String, message: String },

    /// Empty query text, document set, or chunk set. Rejected before any
    /// backend call is made.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Runtime fault talking to the embedding or generation backend.
    #[error("backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub fn storage(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RagError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn query(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RagError::Query {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn query_msg(message: impl Into<String>) -> Self {
        RagError::Query {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RagError::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn backend_msg(message: impl Into<String>) -> Self {
        RagError::Backend {
            message: message.into(),
            source: None,
        }
    }
}
