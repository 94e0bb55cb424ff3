//! Hybrid search combining vector similarity and BM25 keyword matching.
//!
//! # Components
//!
//! - [`KeywordIndex`]: in-memory BM25 over a text corpus, with a
//!   version-keyed [`KeywordIndexCache`]
//! - [`VectorScorer`]: exhaustive similarity ranking over candidate embeddings
//! - [`fusion`]: weighted Reciprocal Rank Fusion with rank-only scoring
//! - [`HybridRetriever`]: the dispatcher that picks scorers per [`QueryMode`]
//! - [`Retriever`]: embeds query [`Content`] and hands it to the dispatcher
//!
//! # Query modes
//!
//! | mode      | requires          | runs                          |
//! |-----------|-------------------|-------------------------------|
//! | `default` | embedding         | vector scorer                 |
//! | `bm25`    | text              | BM25 index                    |
//! | `hybrid`  | text + embedding  | both, fused with RRF          |
//!
//! # Example
//!
//! ```ignore
//! let store = InMemoryCorpusStore::new();
//! store.insert_with_embedding(Node::text("a", "the cat sat"), vec![1.0, 0.0])?;
//!
//! let retriever = HybridRetriever::new(store, RetrievalConfig::default())?;
//! let descriptor = retriever
//!     .descriptor(QueryMode::Hybrid)
//!     .text("cat")
//!     .embedding(vec![1.0, 0.0])
//!     .build();
//! let result = retriever.query(&descriptor).await?;
//! ```

pub mod engine;
pub mod filter;
pub mod fusion;
pub mod keyword;
pub mod tokenizer;
pub mod types;
pub mod vector;

pub use engine::{HybridRetriever, QueryPlan, Retriever};
pub use filter::{FilterCondition, MetadataFilter};
pub use fusion::{combine_results, prefetch_size, rrf, FusedResult, ResultSource, RRF_K};
pub use keyword::{Bm25Params, KeywordIndex, KeywordIndexCache};
pub use tokenizer::tokenize;
pub use types::{
    Content, DocId, ImageRef, Metadata, MetadataValue, Node, QueryDescriptor,
    QueryDescriptorBuilder, QueryMode, QueryResult, ScoredResult,
};
pub use vector::{cosine_similarity, DistanceMetric, VectorScorer};
