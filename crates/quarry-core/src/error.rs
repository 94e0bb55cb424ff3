//! Error types for quarry-core.
//!
//! Every failure a query can produce is a [`RetrievalError`]. Empty result
//! sets are not errors; they come back as an empty [`QueryResult`].
//!
//! [`QueryResult`]: crate::search::QueryResult

use crate::storage::StoreError;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors returned by the retrieval core.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// A required input for the selected query mode is missing or invalid.
    ///
    /// Raised before any scoring work starts.
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// The embedding provider failed. Passed through unchanged.
    #[error("Embedding provider error: {0}")]
    Embedding(#[from] EmbeddingError),
    /// The corpus provider failed. Passed through unchanged.
    #[error("Corpus provider error: {0}")]
    Store(#[from] StoreError),
    /// Retrieval configuration was rejected.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl RetrievalError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        RetrievalError::Precondition(msg.into())
    }
}

/// Errors raised by an [`EmbeddingProvider`](crate::embedding::EmbeddingProvider).
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// The provider call itself failed (network, model, quota...)
    #[error("Embedding request failed: {0}")]
    RequestFailed(String),
    /// The provider returned a different number of vectors than inputs
    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// Number of inputs sent
        expected: usize,
        /// Number of vectors returned
        actual: usize,
    },
    /// The provider cannot embed this kind of content
    #[error("Unsupported content kind: {0}")]
    Unsupported(&'static str),
}

/// Errors raised when validating [`RetrievalConfig`](crate::config::RetrievalConfig)
/// or [`Bm25Params`](crate::search::keyword::Bm25Params).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// BM25 `k1` must be finite and non-negative
    #[error("BM25 k1 must be finite and >= 0, got {0}")]
    InvalidK1(f32),
    /// BM25 `b` must lie in [0, 1]
    #[error("BM25 b must be within [0, 1], got {0}")]
    InvalidB(f32),
    /// Fusion weight must lie in [0, 1]
    #[error("alpha must be within [0, 1], got {0}")]
    InvalidAlpha(f32),
    /// Prefetch multiplier must be at least 1
    #[error("prefetch multiplier must be >= 1, got {0}")]
    InvalidPrefetchMultiplier(usize),
    /// Default top-k must be at least 1
    #[error("default top_k must be >= 1")]
    InvalidTopK,
}
