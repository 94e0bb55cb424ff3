// HybridRetriever - dispatches a query to the vector scorer, the BM25 index, or both

use super::filter::MetadataFilter;
use super::fusion::combine_results;
use super::keyword::{KeywordIndex, KeywordIndexCache};
use super::types::{
    Content, DocId, Node, QueryDescriptor, QueryDescriptorBuilder, QueryMode, QueryResult,
    ScoredResult,
};
use super::vector::VectorScorer;
use crate::config::RetrievalConfig;
use crate::embedding::{embed_content, EmbeddingProvider};
use crate::error::{Result, RetrievalError};
use crate::storage::CorpusProvider;
use instant::Instant;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A validated query, borrowed from its [`QueryDescriptor`].
///
/// Holding a plan means every input the mode needs is present, so scoring
/// can start without further checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryPlan<'a> {
    /// `default` mode: vector similarity only
    Vector { embedding: &'a [f32], top_k: usize },
    /// `bm25` mode: lexical only. Any embedding on the descriptor is ignored.
    Lexical { text: &'a str, top_k: usize },
    /// `hybrid` mode: both sides fetch `prefetch` candidates, then fuse to `top_k`
    Hybrid {
        text: &'a str,
        embedding: &'a [f32],
        prefetch: usize,
        top_k: usize,
        alpha: f32,
    },
}

impl<'a> QueryPlan<'a> {
    /// Validates `descriptor` and picks the scorers to run.
    ///
    /// # Errors
    ///
    /// Returns `RetrievalError::Precondition` if:
    /// - `top_k` or `prefetch` is 0
    /// - `alpha` is not a finite value in [0, 1]
    /// - the mode needs query text and none is set
    /// - the mode needs a query embedding and none (or an empty one) is set
    pub fn from_descriptor(descriptor: &'a QueryDescriptor) -> Result<Self> {
        let mode = descriptor.mode;
        if descriptor.top_k == 0 {
            return Err(RetrievalError::precondition("top_k must be greater than 0"));
        }
        if descriptor.prefetch == 0 {
            return Err(RetrievalError::precondition(
                "prefetch must be greater than 0",
            ));
        }
        let alpha = descriptor.alpha;
        if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
            return Err(RetrievalError::precondition(format!(
                "alpha must be within [0, 1], got {alpha}"
            )));
        }

        let text = move || {
            descriptor.query_text.as_deref().ok_or_else(|| {
                RetrievalError::precondition(format!("{mode} mode requires query text"))
            })
        };
        let embedding = move || match descriptor.query_embedding.as_deref() {
            Some(embedding) if !embedding.is_empty() => Ok(embedding),
            Some(_) => Err(RetrievalError::precondition(format!(
                "{mode} mode requires a non-empty query embedding"
            ))),
            None => Err(RetrievalError::precondition(format!(
                "{mode} mode requires a query embedding"
            ))),
        };

        let plan = match mode {
            QueryMode::Default => QueryPlan::Vector {
                embedding: embedding()?,
                top_k: descriptor.top_k,
            },
            QueryMode::Bm25 => QueryPlan::Lexical {
                text: text()?,
                top_k: descriptor.top_k,
            },
            QueryMode::Hybrid => QueryPlan::Hybrid {
                text: text()?,
                embedding: embedding()?,
                prefetch: descriptor.prefetch.max(descriptor.top_k),
                top_k: descriptor.top_k,
                alpha,
            },
        };
        Ok(plan)
    }

    pub fn mode(&self) -> QueryMode {
        match self {
            QueryPlan::Vector { .. } => QueryMode::Default,
            QueryPlan::Lexical { .. } => QueryMode::Bm25,
            QueryPlan::Hybrid { .. } => QueryMode::Hybrid,
        }
    }
}

/// Query dispatcher over a [`CorpusProvider`].
///
/// Owns the vector scorer and the cached BM25 index; the corpus itself stays
/// with the provider and is read fresh on every query. The lexical index is
/// rebuilt only when the provider reports a new corpus version.
pub struct HybridRetriever<C: CorpusProvider> {
    /// Document source
    store: C,
    /// Settings, validated at construction
    config: RetrievalConfig,
    /// Brute-force vector scorer
    scorer: VectorScorer,
    /// Lexical index keyed by corpus version, when caching is enabled
    keyword_cache: Option<KeywordIndexCache>,
}

impl<C: CorpusProvider> HybridRetriever<C> {
    /// Creates a retriever over `store`.
    ///
    /// # Errors
    ///
    /// Returns `RetrievalError::Config` if `config` fails validation.
    pub fn new(store: C, config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        let keyword_cache = config
            .cache_keyword_index
            .then(|| KeywordIndexCache::new(config.bm25));
        Ok(Self {
            store,
            scorer: VectorScorer::new(config.metric),
            keyword_cache,
            config,
        })
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Descriptor builder seeded with this retriever's defaults.
    pub fn descriptor(&self, mode: QueryMode) -> QueryDescriptorBuilder {
        QueryDescriptor::builder_with_config(mode, &self.config)
    }

    /// Runs a query.
    ///
    /// Single-mode queries fetch `top_k` results from their scorer. Hybrid
    /// queries fetch `prefetch` candidates from both sides concurrently and
    /// fuse them with weighted RRF. The result has the same shape in every mode.
    ///
    /// # Errors
    ///
    /// - `RetrievalError::Precondition` if the descriptor is invalid for its mode.
    ///   Nothing is fetched or scored in that case.
    /// - `RetrievalError::Store` if the corpus provider fails. In hybrid mode a
    ///   failure on either side fails the whole query.
    #[must_use = "Query results should be used or errors handled"]
    #[instrument(skip_all, fields(mode = %descriptor.mode, top_k = descriptor.top_k))]
    pub async fn query(&self, descriptor: &QueryDescriptor) -> Result<QueryResult> {
        let plan = QueryPlan::from_descriptor(descriptor)?;
        let filter = descriptor.filters.as_ref().filter(|f| !f.is_empty());
        let start = Instant::now();

        let ranked: Vec<(DocId, f32)> = match plan {
            QueryPlan::Vector { embedding, top_k } => self
                .vector_search(embedding, filter, top_k)
                .await?
                .into_iter()
                .map(|r| (r.id, r.score))
                .collect(),
            QueryPlan::Lexical { text, top_k } => self
                .lexical_search(text, filter, top_k)
                .await?
                .into_iter()
                .map(|r| (r.id, r.score))
                .collect(),
            QueryPlan::Hybrid {
                text,
                embedding,
                prefetch,
                top_k,
                alpha,
            } => {
                let (vector_results, lexical_results) = tokio::try_join!(
                    self.vector_search(embedding, filter, prefetch),
                    self.lexical_search(text, filter, prefetch),
                )?;
                debug!(
                    vector = vector_results.len(),
                    lexical = lexical_results.len(),
                    prefetch,
                    "Fusing candidate lists"
                );
                combine_results(&vector_results, &lexical_results, alpha, top_k)
                    .into_iter()
                    .map(|r| (r.id, r.score))
                    .collect()
            }
        };

        let result = if descriptor.include_nodes {
            self.with_nodes(ranked).await?
        } else {
            let (ids, scores) = ranked.into_iter().unzip();
            QueryResult {
                ids,
                scores,
                nodes: None,
            }
        };

        debug!(
            results = result.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Query complete"
        );
        Ok(result)
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredResult>> {
        let candidates = self.store.embeddings(filter).await?;
        let results = self.scorer.score(embedding, &candidates, limit)?;
        debug!(
            candidates = candidates.len(),
            results = results.len(),
            "Vector search"
        );
        Ok(results)
    }

    async fn lexical_search(
        &self,
        text: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredResult>> {
        let index = self.keyword_index(filter).await?;
        let results = index.search(text, limit);
        debug!(
            documents = index.document_count(),
            results = results.len(),
            "Keyword search"
        );
        Ok(results)
    }

    /// Index for the current corpus snapshot.
    ///
    /// Filtered queries see a different corpus than the cached one, so they
    /// always get a fresh index over the admitted documents.
    async fn keyword_index(&self, filter: Option<&MetadataFilter>) -> Result<Arc<KeywordIndex>> {
        match (&self.keyword_cache, filter) {
            (Some(cache), None) => {
                let version = self.store.corpus_version().await?;
                if let Some(index) = cache.get(version) {
                    return Ok(index);
                }
                let corpus = self.store.text_corpus(None).await?;
                Ok(cache.rebuild(version, corpus))
            }
            _ => {
                let corpus = self.store.text_corpus(filter).await?;
                Ok(Arc::new(KeywordIndex::build(corpus, self.config.bm25)))
            }
        }
    }

    /// Attaches node payloads, dropping ids the provider no longer has.
    async fn with_nodes(&self, ranked: Vec<(DocId, f32)>) -> Result<QueryResult> {
        let ids: Vec<DocId> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let mut by_id: HashMap<DocId, Node> = self
            .store
            .get_nodes(&ids)
            .await?
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();

        let mut result = QueryResult {
            ids: Vec::with_capacity(ranked.len()),
            scores: Vec::with_capacity(ranked.len()),
            nodes: Some(Vec::with_capacity(ranked.len())),
        };
        for (id, score) in ranked {
            if let Some(node) = by_id.remove(&id) {
                result.ids.push(id);
                result.scores.push(score);
                if let Some(nodes) = result.nodes.as_mut() {
                    nodes.push(node);
                }
            }
        }
        Ok(result)
    }
}

/// Retriever layer: turns query content into a descriptor and runs it.
///
/// Text queries are embedded through [`EmbeddingProvider::embed`], image
/// queries through [`EmbeddingProvider::embed_images`]. Embedding happens only
/// when the mode scores against an embedding.
pub struct Retriever<C: CorpusProvider, E: EmbeddingProvider> {
    engine: HybridRetriever<C>,
    embedder: E,
}

impl<C: CorpusProvider, E: EmbeddingProvider> Retriever<C, E> {
    pub fn new(engine: HybridRetriever<C>, embedder: E) -> Self {
        Self { engine, embedder }
    }

    pub fn engine(&self) -> &HybridRetriever<C> {
        &self.engine
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Retrieves with the engine's default descriptor settings for `mode`.
    pub async fn retrieve(&self, query: &Content, mode: QueryMode) -> Result<QueryResult> {
        self.retrieve_with(query, self.engine.descriptor(mode)).await
    }

    /// Retrieves with caller-supplied descriptor settings.
    ///
    /// Text and embedding already set on `builder` are overwritten from `query`.
    ///
    /// # Errors
    ///
    /// - `RetrievalError::Precondition` for an image query in a mode that
    ///   needs query text. The embedding provider is not called.
    /// - `RetrievalError::Embedding` if the provider fails.
    /// - Anything [`HybridRetriever::query`] returns.
    #[instrument(skip_all, fields(mode = %builder.mode()))]
    pub async fn retrieve_with(
        &self,
        query: &Content,
        builder: QueryDescriptorBuilder,
    ) -> Result<QueryResult> {
        let mode = builder.mode();
        let mut builder = builder;

        match query {
            Content::Text { text } => builder = builder.text(text.clone()),
            Content::Image { .. } if mode.needs_text() => {
                return Err(RetrievalError::precondition(format!(
                    "{mode} mode requires query text, got an image query"
                )));
            }
            Content::Image { .. } => {}
        }

        if mode.needs_embedding() {
            let embedding = embed_content(&self.embedder, query).await?;
            builder = builder.embedding(embedding);
        }

        self.engine.query(&builder.build()).await
    }
}
