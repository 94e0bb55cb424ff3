//! # Quarry Core
//!
//! Hybrid lexical/semantic retrieval over pluggable corpus and embedding providers.
//!
//! The crate owns the scoring side of retrieval only. Parsing, chunking,
//! embedding models and persistence live behind the [`storage::CorpusProvider`]
//! and [`embedding::EmbeddingProvider`] traits.
//!
//! ## Modules
//!
//! - [`search`] - BM25 lexical index, vector scorer, RRF fusion and the query dispatcher
//! - [`storage`] - Corpus provider trait and an in-memory reference store
//! - [`embedding`] - Embedding provider trait and content-kind dispatch
//! - [`config`] - Default constants and the explicit [`config::RetrievalConfig`]
//! - [`error`] - Error types surfaced by queries

pub mod config;
pub mod embedding;
pub mod error;
pub mod search;
pub mod storage;

pub use config::RetrievalConfig;
pub use error::{ConfigError, EmbeddingError, Result, RetrievalError};
