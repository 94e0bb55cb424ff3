//! BM25 lexical index over a corpus snapshot.
//!
//! The index is a pure function of the `(DocId, text)` pairs it was built
//! from. It never mutates or persists the corpus; when the corpus changes the
//! caller builds a new index (or lets [`KeywordIndexCache`] do it per corpus
//! version).
//!
//! # Algorithm
//!
//! For query term `t` and document `d`:
//!
//! ```text
//! idf(t)     = ln((N - df(t) + 0.5) / (df(t) + 0.5) + 1)
//! score(t,d) = idf(t) * tf(t,d) * (k1 + 1) / (tf(t,d) + k1 * (1 - b + b * |d| / avgdl))
//! ```
//!
//! A document's score is the sum over the distinct query terms found in the
//! vocabulary. Terms outside the vocabulary contribute nothing.
//!
//! # Usage
//!
//! ```
//! use quarry_core::search::keyword::{Bm25Params, KeywordIndex};
//! use quarry_core::search::DocId;
//!
//! let corpus = vec![
//!     (DocId::from("1"), "the cat is on the mat"),
//!     (DocId::from("2"), "the dog is in the house"),
//! ];
//! let index = KeywordIndex::build(corpus, Bm25Params::default());
//!
//! let results = index.search("dog", 1);
//! assert_eq!(results[0].id.as_str(), "2");
//! ```

use super::tokenizer::tokenize;
use super::types::{rank_and_truncate, DocId, ScoredResult};
use crate::config::{DEFAULT_BM25_B, DEFAULT_BM25_K1};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument};

/// BM25 tuning parameters.
///
/// `k1 = 0` reduces term frequency to (near-)binary presence and `b = 0`
/// disables length normalization. Both are ordinary values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f32,
    /// Length normalization strength, in [0, 1]
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_BM25_K1,
            b: DEFAULT_BM25_B,
        }
    }
}

impl Bm25Params {
    pub fn new(k1: f32, b: f32) -> Result<Self, ConfigError> {
        let params = Self { k1, b };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(ConfigError::InvalidK1(self.k1));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(ConfigError::InvalidB(self.b));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    /// Position in `KeywordIndex::doc_ids`
    doc: usize,
    term_frequency: u32,
}

/// Term statistics for one corpus snapshot.
///
/// # Thread Safety
///
/// Read-only after [`build`](Self::build), so any number of queries may
/// search the same index in parallel.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    params: Bm25Params,
    doc_ids: Vec<DocId>,
    doc_lengths: Vec<usize>,
    positions: HashMap<DocId, usize>,
    /// term -> postings, ordered by document position
    postings: HashMap<String, Vec<Posting>>,
    average_doc_length: f32,
}

impl KeywordIndex {
    /// Builds term statistics for `corpus`.
    ///
    /// If an id appears more than once, the last text wins.
    #[instrument(skip_all)]
    pub fn build<I, T>(corpus: I, params: Bm25Params) -> Self
    where
        I: IntoIterator<Item = (DocId, T)>,
        T: AsRef<str>,
    {
        let mut doc_ids: Vec<DocId> = Vec::new();
        let mut doc_tokens: Vec<Vec<String>> = Vec::new();
        let mut positions: HashMap<DocId, usize> = HashMap::new();

        for (id, text) in corpus {
            let tokens = tokenize(text.as_ref());
            match positions.get(&id) {
                Some(&pos) => doc_tokens[pos] = tokens,
                None => {
                    positions.insert(id.clone(), doc_ids.len());
                    doc_ids.push(id);
                    doc_tokens.push(tokens);
                }
            }
        }

        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(doc_tokens.len());

        for (doc, tokens) in doc_tokens.into_iter().enumerate() {
            doc_lengths.push(tokens.len());

            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            for (term, term_frequency) in term_freqs {
                postings.entry(term).or_default().push(Posting {
                    doc,
                    term_frequency,
                });
            }
        }

        let total_length: usize = doc_lengths.iter().sum();
        let average_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            total_length as f32 / doc_lengths.len() as f32
        };

        debug!(
            documents = doc_ids.len(),
            vocabulary = postings.len(),
            average_doc_length,
            "Built BM25 term statistics"
        );

        Self {
            params,
            doc_ids,
            doc_lengths,
            positions,
            postings,
            average_doc_length,
        }
    }

    /// Scores every document against `query`.
    ///
    /// Returns up to `top_k` results with positive score, descending, ties
    /// broken by ascending id. An empty query, an empty corpus or a query
    /// with no known terms yields an empty vector.
    #[instrument(skip_all, fields(query_len = query.len(), top_k))]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredResult> {
        if top_k == 0 || self.doc_ids.is_empty() {
            return Vec::new();
        }

        let mut terms = tokenize(query);
        terms.sort_unstable();
        terms.dedup();

        let n = self.doc_ids.len() as f32;
        let Bm25Params { k1, b } = self.params;
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = idf(n, postings.len() as f32);

            for posting in postings {
                let tf = posting.term_frequency as f32;
                let dl = self.doc_lengths[posting.doc] as f32;
                let norm = 1.0 - b + b * dl / self.average_doc_length;
                let term_score = idf * tf * (k1 + 1.0) / (tf + k1 * norm);
                *scores.entry(posting.doc).or_insert(0.0) += term_score;
            }
        }

        let mut results: Vec<ScoredResult> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(doc, score)| ScoredResult {
                id: self.doc_ids[doc].clone(),
                score,
            })
            .collect();
        rank_and_truncate(&mut results, top_k);
        results
    }

    /// Returns the number of indexed documents.
    pub fn document_count(&self) -> usize {
        self.doc_ids.len()
    }

    /// True when the index was built from an empty corpus.
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Mean token length across the corpus, 0 for an empty corpus.
    pub fn average_document_length(&self) -> f32 {
        self.average_doc_length
    }

    /// Number of documents containing `term` (already tokenized form).
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    /// Occurrences of `term` in document `id`.
    pub fn term_frequency(&self, id: &DocId, term: &str) -> u32 {
        let (Some(&doc), Some(postings)) = (self.positions.get(id), self.postings.get(term)) else {
            return 0;
        };
        postings
            .binary_search_by_key(&doc, |p| p.doc)
            .map_or(0, |i| postings[i].term_frequency)
    }

    /// Token length of document `id`, if indexed.
    pub fn document_length(&self, id: &DocId) -> Option<usize> {
        self.positions.get(id).map(|&doc| self.doc_lengths[doc])
    }

    /// Number of distinct terms with at least one posting.
    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    /// Parameters the index was built with.
    pub fn params(&self) -> Bm25Params {
        self.params
    }
}

fn idf(document_count: f32, document_frequency: f32) -> f32 {
    ((document_count - document_frequency + 0.5) / (document_frequency + 0.5) + 1.0).ln()
}

struct CachedIndex {
    version: u64,
    index: Arc<KeywordIndex>,
}

/// Holds the most recently built [`KeywordIndex`], keyed by corpus version.
///
/// Readers get an `Arc` snapshot and keep searching it even if a newer
/// version is installed meanwhile. New indexes are built outside the lock and
/// swapped in whole, so a reader never sees a half-built index.
pub struct KeywordIndexCache {
    params: Bm25Params,
    slot: RwLock<Option<CachedIndex>>,
}

impl KeywordIndexCache {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            slot: RwLock::new(None),
        }
    }

    /// Returns the cached index if it was built from `version`.
    pub fn get(&self, version: u64) -> Option<Arc<KeywordIndex>> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(cached) if cached.version == version => {
                debug!(version, "BM25 index cache hit");
                Some(Arc::clone(&cached.index))
            }
            _ => None,
        }
    }

    /// Builds an index for `version` from `corpus` and installs it.
    ///
    /// An index for a newer version already in place is left untouched; the
    /// freshly built one is still returned to the caller.
    pub fn rebuild<I, T>(&self, version: u64, corpus: I) -> Arc<KeywordIndex>
    where
        I: IntoIterator<Item = (DocId, T)>,
        T: AsRef<str>,
    {
        let index = Arc::new(KeywordIndex::build(corpus, self.params));
        info!(
            version,
            documents = index.document_count(),
            "Rebuilt BM25 index"
        );

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        let stale = slot
            .as_ref()
            .map_or(true, |cached| cached.version <= version);
        if stale {
            *slot = Some(CachedIndex {
                version,
                index: Arc::clone(&index),
            });
        }
        index
    }

    /// Drops the cached index.
    pub fn invalidate(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn cached_version(&self) -> Option<u64> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|cached| cached.version)
    }

    /// Parameters used for every index this cache builds.
    pub fn params(&self) -> Bm25Params {
        self.params
    }
}
