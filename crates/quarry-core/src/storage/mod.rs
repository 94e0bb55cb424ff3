//! Corpus provider abstraction.
//!
//! The retrieval core never owns documents. It asks a [`CorpusProvider`] for
//! the current text corpus, the embeddings of candidate documents and, after
//! ranking, the node payloads of the winning ids.
//!
//! # Implementations
//!
//! - [`InMemoryCorpusStore`] - reference provider backed by in-process maps
//! - Vector database adapters live outside this crate and translate
//!   [`MetadataFilter`] into their native filter language

mod memory;

pub use memory::InMemoryCorpusStore;

use crate::search::filter::MetadataFilter;
use crate::search::types::{DocId, Node};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur in a corpus provider.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Requested collection or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected or failed the request
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Source of documents for a query.
///
/// Every call receives the same [`MetadataFilter`] the caller put on the
/// query descriptor, unchanged. Implementations must return only documents
/// the filter admits.
///
/// # Corpus version
///
/// [`corpus_version`](CorpusProvider::corpus_version) must change whenever the
/// text corpus changes. The lexical index cache is keyed on it, so a provider
/// that reports a stale version will be searched with a stale index.
#[async_trait::async_trait(?Send)]
pub trait CorpusProvider {
    /// Monotonic version of the text corpus.
    async fn corpus_version(&self) -> Result<u64, StoreError>;

    /// `(id, text)` pairs for every text document admitted by `filter`.
    ///
    /// Non-text documents are skipped.
    async fn text_corpus(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(DocId, String)>, StoreError>;

    /// `(id, embedding)` pairs for every embedded document admitted by `filter`.
    async fn embeddings(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(DocId, Vec<f32>)>, StoreError>;

    /// Node payloads for `ids`, in the same order. Unknown ids are skipped.
    async fn get_nodes(&self, ids: &[DocId]) -> Result<Vec<Node>, StoreError>;
}

macro_rules! forward_corpus_provider {
    ($ptr:ident) => {
        #[async_trait::async_trait(?Send)]
        impl<C: CorpusProvider + ?Sized> CorpusProvider for $ptr<C> {
            async fn corpus_version(&self) -> Result<u64, StoreError> {
                (**self).corpus_version().await
            }

            async fn text_corpus(
                &self,
                filter: Option<&MetadataFilter>,
            ) -> Result<Vec<(DocId, String)>, StoreError> {
                (**self).text_corpus(filter).await
            }

            async fn embeddings(
                &self,
                filter: Option<&MetadataFilter>,
            ) -> Result<Vec<(DocId, Vec<f32>)>, StoreError> {
                (**self).embeddings(filter).await
            }

            async fn get_nodes(&self, ids: &[DocId]) -> Result<Vec<Node>, StoreError> {
                (**self).get_nodes(ids).await
            }
        }
    };
}

forward_corpus_provider!(Arc);
forward_corpus_provider!(Rc);
