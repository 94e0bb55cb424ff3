//! In-memory corpus provider.

use super::{CorpusProvider, StoreError};
use crate::search::filter::MetadataFilter;
use crate::search::types::{DocId, Node};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Corpus store holding nodes and embeddings in ordered maps.
///
/// Every insert or remove bumps the corpus version, which invalidates any
/// cached lexical index built from an earlier snapshot. Filters are evaluated
/// with [`MetadataFilter::matches`] before anything is handed to a scorer.
#[derive(Default)]
pub struct InMemoryCorpusStore {
    nodes: RwLock<BTreeMap<DocId, Node>>,
    embeddings: RwLock<BTreeMap<DocId, Vec<f32>>>,
    version: AtomicU64,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::DatabaseError(format!("Lock poisoned: {}", e))
}

impl InMemoryCorpusStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a node without an embedding.
    ///
    /// Overwrites an existing node with the same id and drops its old
    /// embedding, so the replaced text is never scored against a stale vector.
    pub fn insert(&self, node: Node) -> Result<(), StoreError> {
        self.put(node, None)
    }

    /// Stores a node together with its embedding, replacing both on overwrite.
    pub fn insert_with_embedding(&self, node: Node, embedding: Vec<f32>) -> Result<(), StoreError> {
        self.put(node, Some(embedding))
    }

    fn put(&self, node: Node, embedding: Option<Vec<f32>>) -> Result<(), StoreError> {
        {
            let mut nodes = self.nodes.write().map_err(poisoned)?;
            let mut embeddings = self.embeddings.write().map_err(poisoned)?;
            match embedding {
                Some(embedding) => {
                    embeddings.insert(node.id.clone(), embedding);
                }
                None => {
                    embeddings.remove(&node.id);
                }
            }
            nodes.insert(node.id.clone(), node);
        }
        self.bump();
        Ok(())
    }

    /// Removes a node and its embedding. Returns whether the node existed.
    pub fn remove(&self, id: &DocId) -> Result<bool, StoreError> {
        let existed = {
            let mut nodes = self.nodes.write().map_err(poisoned)?;
            nodes.remove(id).is_some()
        };
        {
            let mut embeddings = self.embeddings.write().map_err(poisoned)?;
            embeddings.remove(id);
        }
        self.bump();
        Ok(existed)
    }

    /// Removes everything.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.nodes.write().map_err(poisoned)?.clear();
        self.embeddings.write().map_err(poisoned)?.clear();
        self.bump();
        Ok(())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.nodes.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Current corpus version without going through the async trait.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    fn admitted(node: &Node, filter: Option<&MetadataFilter>) -> bool {
        filter.map_or(true, |f| f.matches(&node.metadata))
    }
}

#[async_trait::async_trait(?Send)]
impl CorpusProvider for InMemoryCorpusStore {
    async fn corpus_version(&self) -> Result<u64, StoreError> {
        Ok(self.version())
    }

    async fn text_corpus(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(DocId, String)>, StoreError> {
        let nodes = self.nodes.read().map_err(poisoned)?;
        Ok(nodes
            .values()
            .filter(|node| Self::admitted(node, filter))
            .filter_map(|node| {
                node.content
                    .as_text()
                    .map(|text| (node.id.clone(), text.to_string()))
            })
            .collect())
    }

    async fn embeddings(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(DocId, Vec<f32>)>, StoreError> {
        let nodes = self.nodes.read().map_err(poisoned)?;
        let embeddings = self.embeddings.read().map_err(poisoned)?;
        Ok(embeddings
            .iter()
            .filter(|(id, _)| {
                nodes
                    .get(*id)
                    .is_some_and(|node| Self::admitted(node, filter))
            })
            .map(|(id, embedding)| (id.clone(), embedding.clone()))
            .collect())
    }

    async fn get_nodes(&self, ids: &[DocId]) -> Result<Vec<Node>, StoreError> {
        let nodes = self.nodes.read().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }
}
