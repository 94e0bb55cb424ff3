//! End-to-end tests for the retrieval pipeline.
//!
//! These tests go through the public API only:
//! 1. Corpus: `InMemoryCorpusStore` holding nodes and embeddings
//! 2. Query: descriptor → dispatcher → BM25 / vector scorer → RRF fusion → nodes
//!
//! Run with: `cargo test -p quarry-core --test retrieval_tests`

use async_trait::async_trait;
use quarry_core::search::{
    combine_results, rrf, Bm25Params, Content, DocId, FilterCondition, HybridRetriever,
    KeywordIndex, MetadataFilter, Node, QueryDescriptor, QueryMode, Retriever, ScoredResult,
    RRF_K,
};
use quarry_core::storage::{CorpusProvider, InMemoryCorpusStore, StoreError};
use quarry_core::{EmbeddingError, RetrievalConfig, RetrievalError};
use std::cell::Cell;
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

/// Two-document corpus: "1" is about a cat, "2" about a dog.
fn pet_store() -> InMemoryCorpusStore {
    let store = InMemoryCorpusStore::new();
    store
        .insert_with_embedding(Node::text("1", "the cat is on the mat"), vec![1.0, 0.0])
        .unwrap();
    store
        .insert_with_embedding(Node::text("2", "the dog is in the house"), vec![0.0, 1.0])
        .unwrap();
    store
}

fn pet_retriever() -> HybridRetriever<InMemoryCorpusStore> {
    HybridRetriever::new(pet_store(), RetrievalConfig::default()).unwrap()
}

/// Small mixed corpus tagged with a `kind` field.
fn library_store() -> InMemoryCorpusStore {
    let docs = [
        ("rust-book", "ownership borrowing and lifetimes in rust", vec![0.9, 0.1, 0.0], "book"),
        ("rust-async", "async rust with tokio runtimes and futures", vec![0.8, 0.2, 0.1], "blog"),
        ("bm25-paper", "probabilistic relevance framework bm25 and beyond", vec![0.0, 0.9, 0.3], "paper"),
        ("rrf-paper", "reciprocal rank fusion outperforms condorcet", vec![0.1, 0.8, 0.5], "paper"),
        ("hnsw-paper", "hierarchical navigable small world graphs for nearest neighbor search", vec![0.2, 0.3, 0.9], "paper"),
        ("cookbook", "recipes for bread pasta and rust colored tomato sauce", vec![0.3, 0.0, 0.0], "book"),
    ];

    let store = InMemoryCorpusStore::new();
    for (id, text, embedding, kind) in docs {
        store
            .insert_with_embedding(Node::text(id, text).with_metadata("kind", kind), embedding)
            .unwrap();
    }
    store
}

/// Embeds by keyword so tests can predict the vector side.
struct KeywordEmbedder;

#[async_trait(?Send)]
impl quarry_core::embedding::EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                if text.contains("cat") {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect())
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_bm25_scenario_dog() {
    let retriever = pet_retriever();
    let descriptor = QueryDescriptor::builder(QueryMode::Bm25)
        .text("dog")
        .top_k(1)
        .build();

    let result = retriever.query(&descriptor).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.ids[0].as_str(), "2");
    assert!(result.scores[0] > 0.0);
}

#[tokio::test]
async fn test_hybrid_scenario_cat() {
    let retriever = pet_retriever();
    let descriptor = QueryDescriptor::builder(QueryMode::Hybrid)
        .text("cat")
        .embedding(vec![1.0, 0.0])
        .alpha(0.5)
        .top_k(1)
        .build();

    let result = retriever.query(&descriptor).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.ids[0].as_str(), "1");
    assert!(result.scores[0] > 0.0);
    // Rank 1 on both sides
    assert!((result.scores[0] - rrf(1, RRF_K)).abs() < 1e-6);
}

#[test]
fn test_fusion_scenario_symmetric_ranks() {
    let vector = vec![ScoredResult::new("a", 0.9), ScoredResult::new("b", 0.7)];
    let lexical = vec![ScoredResult::new("b", 12.0), ScoredResult::new("a", 3.0)];

    let fused = combine_results(&vector, &lexical, 0.5, 10);

    assert_eq!(fused.len(), 2);
    assert!((fused[0].score - fused[1].score).abs() < 1e-9);
    let expected = 0.5 * rrf(1, RRF_K) + 0.5 * rrf(2, RRF_K);
    assert!((fused[0].score - expected).abs() < 1e-6);
    assert!((fused[0].score - 0.01626).abs() < 2e-4);
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Provider that records whether the vector side was ever consulted.
struct WatchedStore {
    inner: InMemoryCorpusStore,
    embeddings_requested: Cell<bool>,
}

#[async_trait(?Send)]
impl CorpusProvider for WatchedStore {
    async fn corpus_version(&self) -> Result<u64, StoreError> {
        self.inner.corpus_version().await
    }

    async fn text_corpus(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(DocId, String)>, StoreError> {
        self.inner.text_corpus(filter).await
    }

    async fn embeddings(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(DocId, Vec<f32>)>, StoreError> {
        self.embeddings_requested.set(true);
        self.inner.embeddings(filter).await
    }

    async fn get_nodes(&self, ids: &[DocId]) -> Result<Vec<Node>, StoreError> {
        self.inner.get_nodes(ids).await
    }
}

#[tokio::test]
async fn test_hybrid_without_embedding_is_precondition_error() {
    let store = WatchedStore {
        inner: pet_store(),
        embeddings_requested: Cell::new(false),
    };
    let retriever = HybridRetriever::new(store, RetrievalConfig::default()).unwrap();
    let descriptor = QueryDescriptor::builder(QueryMode::Hybrid)
        .text("cat")
        .build();

    let err = retriever.query(&descriptor).await.unwrap_err();

    assert!(matches!(err, RetrievalError::Precondition(_)));
    assert!(err.to_string().contains("embedding"));
    assert!(!retriever.store().embeddings_requested.get());
}

#[tokio::test]
async fn test_bm25_never_touches_embeddings() {
    let store = WatchedStore {
        inner: pet_store(),
        embeddings_requested: Cell::new(false),
    };
    let retriever = HybridRetriever::new(store, RetrievalConfig::default()).unwrap();
    let descriptor = QueryDescriptor::builder(QueryMode::Bm25)
        .text("cat")
        .embedding(vec![0.0, 1.0])
        .build();

    let result = retriever.query(&descriptor).await.unwrap();
    assert_eq!(result.ids[0].as_str(), "1");
    assert!(!retriever.store().embeddings_requested.get());
}

#[tokio::test]
async fn test_result_shape_same_across_modes() {
    let retriever = pet_retriever();

    for mode in [QueryMode::Default, QueryMode::Bm25, QueryMode::Hybrid] {
        let descriptor = QueryDescriptor::builder(mode)
            .text("cat")
            .embedding(vec![1.0, 0.0])
            .build();
        let result = retriever.query(&descriptor).await.unwrap();

        assert_eq!(result.ids.len(), result.scores.len(), "{mode}");
        let nodes = result.nodes.as_ref().unwrap();
        assert_eq!(nodes.len(), result.ids.len(), "{mode}");
        for (node, id) in nodes.iter().zip(&result.ids) {
            assert_eq!(&node.id, id);
        }
        assert_eq!(result.ids[0].as_str(), "1", "{mode}");
    }
}

#[tokio::test]
async fn test_empty_corpus_returns_empty_results() {
    let retriever =
        HybridRetriever::new(InMemoryCorpusStore::new(), RetrievalConfig::default()).unwrap();

    for mode in [QueryMode::Default, QueryMode::Bm25, QueryMode::Hybrid] {
        let descriptor = QueryDescriptor::builder(mode)
            .text("anything")
            .embedding(vec![1.0, 0.0])
            .build();
        let result = retriever.query(&descriptor).await.unwrap();
        assert!(result.is_empty(), "{mode}");
    }
}

#[tokio::test]
async fn test_unknown_terms_are_not_errors() {
    let retriever = pet_retriever();
    let descriptor = QueryDescriptor::builder(QueryMode::Bm25)
        .text("zebra giraffe")
        .build();

    let result = retriever.query(&descriptor).await.unwrap();
    assert!(result.is_empty());
}

// ============================================================================
// Filters, caching, configuration
// ============================================================================

#[tokio::test]
async fn test_filtered_hybrid_query() {
    let retriever = HybridRetriever::new(library_store(), RetrievalConfig::default()).unwrap();
    let filter = MetadataFilter::new()
        .must(FilterCondition::eq("kind", "paper"))
        .must_not(FilterCondition::contains("kind", "draft"));
    let descriptor = retriever
        .descriptor(QueryMode::Hybrid)
        .text("rank fusion")
        .embedding(vec![0.1, 0.8, 0.5])
        .filters(filter)
        .build();

    let result = retriever.query(&descriptor).await.unwrap();

    assert_eq!(result.ids[0].as_str(), "rrf-paper");
    for node in result.nodes.unwrap() {
        assert!(node.id.as_str().ends_with("-paper"));
    }
}

#[tokio::test]
async fn test_cached_index_matches_fresh_build() {
    let store = Arc::new(library_store());
    let cached = HybridRetriever::new(Arc::clone(&store), RetrievalConfig::default()).unwrap();
    let uncached = HybridRetriever::new(
        Arc::clone(&store),
        RetrievalConfig::builder()
            .cache_keyword_index(false)
            .build()
            .unwrap(),
    )
    .unwrap();

    let descriptor = QueryDescriptor::builder(QueryMode::Bm25)
        .text("rust async search")
        .build();

    let first = cached.query(&descriptor).await.unwrap();
    assert_eq!(first, uncached.query(&descriptor).await.unwrap());

    store
        .insert(Node::text("rust-search", "search engines written in rust"))
        .unwrap();

    let after_insert = cached.query(&descriptor).await.unwrap();
    assert_eq!(after_insert, uncached.query(&descriptor).await.unwrap());
    assert!(after_insert.ids.iter().any(|id| id.as_str() == "rust-search"));

    // Same scores as building the index by hand
    let corpus = store.text_corpus(None).await.unwrap();
    let index = KeywordIndex::build(corpus, Bm25Params::default());
    let expected = index.search("rust async search", 10);
    let expected_ids: Vec<&DocId> = expected.iter().map(|r| &r.id).collect();
    let got_ids: Vec<&DocId> = after_insert.ids.iter().collect();
    assert_eq!(got_ids, expected_ids);
}

#[tokio::test]
async fn test_overwritten_node_loses_old_embedding() {
    let store = Arc::new(pet_store());
    let retriever = HybridRetriever::new(Arc::clone(&store), RetrievalConfig::default()).unwrap();
    let descriptor = QueryDescriptor::builder(QueryMode::Default)
        .embedding(vec![1.0, 0.0])
        .build();

    let before = retriever.query(&descriptor).await.unwrap();
    assert_eq!(before.ids[0].as_str(), "1");

    store
        .insert(Node::text("1", "replaced text without a vector"))
        .unwrap();

    let after = retriever.query(&descriptor).await.unwrap();
    assert!(after.ids.iter().all(|id| id.as_str() != "1"));
    assert_eq!(after.ids.len(), 1);
}

#[tokio::test]
async fn test_prefetch_widens_candidate_pool() {
    // "deep" is rank 5 on each side and only the lexical docs mention the needle
    let store = InMemoryCorpusStore::new();
    for i in 0..4 {
        store
            .insert_with_embedding(
                Node::text(format!("v{i}"), "unrelated filler"),
                vec![1.0, 0.01 * i as f32],
            )
            .unwrap();
        store
            .insert(Node::text(
                format!("l{i}"),
                format!("needle {}", "needle ".repeat(4 - i)),
            ))
            .unwrap();
    }
    store
        .insert_with_embedding(Node::text("deep", "needle plus many other words here"), vec![0.7, 0.7])
        .unwrap();
    let retriever = HybridRetriever::new(store, RetrievalConfig::default()).unwrap();

    let narrow = retriever
        .descriptor(QueryMode::Hybrid)
        .text("needle")
        .embedding(vec![1.0, 0.0])
        .top_k(1)
        .prefetch(1)
        .build();
    // Default multiplier: 5 candidates per side
    let wide = retriever
        .descriptor(QueryMode::Hybrid)
        .text("needle")
        .embedding(vec![1.0, 0.0])
        .top_k(1)
        .build();

    let narrow = retriever.query(&narrow).await.unwrap();
    let wide = retriever.query(&wide).await.unwrap();

    assert_ne!(narrow.ids[0].as_str(), "deep");
    assert_eq!(wide.ids[0].as_str(), "deep");
}

#[tokio::test]
async fn test_config_from_json() {
    let config: RetrievalConfig =
        serde_json::from_str(r#"{"default_top_k": 1, "bm25": {"k1": 1.2}}"#).unwrap();
    let retriever = HybridRetriever::new(pet_store(), config).unwrap();

    let descriptor = retriever.descriptor(QueryMode::Bm25).text("the").build();
    let result = retriever.query(&descriptor).await.unwrap();
    assert_eq!(result.len(), 1);
}

// ============================================================================
// Retriever layer
// ============================================================================

#[tokio::test]
async fn test_retriever_text_query_all_modes() {
    let retriever = Retriever::new(pet_retriever(), KeywordEmbedder);

    for mode in [QueryMode::Default, QueryMode::Bm25, QueryMode::Hybrid] {
        let result = retriever
            .retrieve(&Content::text("cat"), mode)
            .await
            .unwrap();
        assert_eq!(result.ids[0].as_str(), "1", "{mode}");
    }
}

#[tokio::test]
async fn test_retriever_image_needs_image_support() {
    let retriever = Retriever::new(pet_retriever(), KeywordEmbedder);

    let err = retriever
        .retrieve(&Content::image("https://example.com/cat.jpg"), QueryMode::Default)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Embedding(EmbeddingError::Unsupported(_))
    ));

    let err = retriever
        .retrieve(&Content::image("https://example.com/cat.jpg"), QueryMode::Hybrid)
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Precondition(_)));
}
