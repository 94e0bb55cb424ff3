use super::filter::MetadataFilter;
use crate::config::RetrievalConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Document identifier as assigned by the corpus provider.
///
/// Ordering is lexicographic and is the tie-break for equal scores in every
/// ranked list this crate produces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single entry of a ranked list.
///
/// Scores from different scorers live on different scales (cosine in
/// [-1, 1], BM25 unbounded) and are never compared with each other.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub id: DocId,
    pub score: f32,
}

impl ScoredResult {
    pub fn new(id: impl Into<DocId>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Sorts descending by score, breaking ties by ascending id, then truncates.
pub(crate) fn rank_and_truncate(results: &mut Vec<ScoredResult>, top_k: usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(top_k);
}

/// Reference to an image held by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Location of the image (path, URL, object key)
    pub uri: String,
    /// MIME type if known
    pub mime_type: Option<String>,
}

/// Content of a node, one case per modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
    Image { image: ImageRef },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn image(uri: impl Into<String>) -> Self {
        Content::Image {
            image: ImageRef {
                uri: uri.into(),
                mime_type: None,
            },
        }
    }

    /// Text visible to the lexical index. Images have none.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            Content::Image { .. } => None,
        }
    }
}

/// A typed metadata value attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Numeric view used by range filters.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Float(f) => Some(*f),
            MetadataValue::Bool(_) | MetadataValue::Text(_) => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Integer(i)
    }
}

impl From<f64> for MetadataValue {
    fn from(f: f64) -> Self {
        MetadataValue::Float(f)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

/// Node metadata, ordered by key so debug output is stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Document payload returned alongside fused ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: DocId,
    pub content: Content,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Node {
    pub fn text(id: impl Into<DocId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Content::text(text),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Which scorer(s) a query runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Vector similarity only
    #[default]
    Default,
    /// BM25 only
    Bm25,
    /// Both, merged by Reciprocal Rank Fusion
    Hybrid,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Default => "default",
            QueryMode::Bm25 => "bm25",
            QueryMode::Hybrid => "hybrid",
        }
    }

    /// Whether this mode scores against the query text.
    pub fn needs_text(&self) -> bool {
        matches!(self, QueryMode::Bm25 | QueryMode::Hybrid)
    }

    /// Whether this mode scores against the query embedding.
    pub fn needs_embedding(&self) -> bool {
        matches!(self, QueryMode::Default | QueryMode::Hybrid)
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(QueryMode::Default),
            "bm25" => Ok(QueryMode::Bm25),
            "hybrid" => Ok(QueryMode::Hybrid),
            other => Err(format!("unknown query mode: {other}")),
        }
    }
}

/// Everything needed to run one query.
///
/// Build with [`QueryDescriptor::builder`]; fields are public so backends and
/// tests can inspect them, but validation happens in the dispatcher, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub mode: QueryMode,
    pub query_text: Option<String>,
    pub query_embedding: Option<Vec<f32>>,
    pub top_k: usize,
    /// Candidates requested from each side before fusion
    pub prefetch: usize,
    /// Vector-side weight in [0, 1]
    pub alpha: f32,
    pub filters: Option<MetadataFilter>,
    /// Attach node payloads to the result
    pub include_nodes: bool,
}

impl QueryDescriptor {
    /// Starts a descriptor for `mode` using the crate defaults.
    pub fn builder(mode: QueryMode) -> QueryDescriptorBuilder {
        Self::builder_with_config(mode, &RetrievalConfig::default())
    }

    /// Starts a descriptor for `mode` with defaults taken from `config`.
    pub fn builder_with_config(mode: QueryMode, config: &RetrievalConfig) -> QueryDescriptorBuilder {
        QueryDescriptorBuilder {
            mode,
            query_text: None,
            query_embedding: None,
            top_k: config.default_top_k,
            prefetch: None,
            prefetch_multiplier: config.prefetch_multiplier,
            alpha: config.default_alpha,
            filters: None,
            include_nodes: true,
        }
    }
}

/// Builder for [`QueryDescriptor`].
#[derive(Debug, Clone)]
pub struct QueryDescriptorBuilder {
    mode: QueryMode,
    query_text: Option<String>,
    query_embedding: Option<Vec<f32>>,
    top_k: usize,
    prefetch: Option<usize>,
    prefetch_multiplier: usize,
    alpha: f32,
    filters: Option<MetadataFilter>,
    include_nodes: bool,
}

impl QueryDescriptorBuilder {
    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.query_text = Some(text.into());
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.query_embedding = Some(embedding);
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Overrides the prefetch size derived from the multiplier.
    pub fn prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = Some(prefetch);
        self
    }

    pub fn prefetch_multiplier(mut self, multiplier: usize) -> Self {
        self.prefetch_multiplier = multiplier;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn filters(mut self, filters: MetadataFilter) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn include_nodes(mut self, include: bool) -> Self {
        self.include_nodes = include;
        self
    }

    pub fn build(self) -> QueryDescriptor {
        let prefetch = self
            .prefetch
            .unwrap_or_else(|| super::fusion::prefetch_size(self.top_k, self.prefetch_multiplier));
        QueryDescriptor {
            mode: self.mode,
            query_text: self.query_text,
            query_embedding: self.query_embedding,
            top_k: self.top_k,
            prefetch,
            alpha: self.alpha,
            filters: self.filters,
            include_nodes: self.include_nodes,
        }
    }
}

/// Result of a query, same shape for every mode.
///
/// `ids` and `scores` are parallel; `nodes`, when present, is parallel too.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub ids: Vec<DocId>,
    pub scores: Vec<f32>,
    pub nodes: Option<Vec<Node>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates `(id, score)` pairs in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocId, f32)> + '_ {
        self.ids.iter().zip(self.scores.iter().copied())
    }
}
