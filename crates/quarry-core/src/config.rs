//! Retrieval configuration.
//!
//! Default constants plus [`RetrievalConfig`], the explicit settings value
//! handed to [`HybridRetriever`](crate::search::HybridRetriever) and
//! [`QueryDescriptor`](crate::search::QueryDescriptor) builders. There is no
//! process-wide settings object: callers own the config and pass it in.
//!
//! # Usage
//!
//! ```
//! use quarry_core::config::RetrievalConfig;
//!
//! let config = RetrievalConfig::builder()
//!     .prefetch_multiplier(8)
//!     .default_alpha(0.7)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.prefetch_multiplier, 8);
//! ```

use crate::error::ConfigError;
use crate::search::keyword::Bm25Params;
use crate::search::vector::DistanceMetric;
use serde::{Deserialize, Serialize};

// =============================================================================
// BM25
// =============================================================================

/// Default BM25 term-frequency saturation.
pub const DEFAULT_BM25_K1: f32 = 1.5;

/// Default BM25 length normalization strength.
pub const DEFAULT_BM25_B: f32 = 0.75;

// =============================================================================
// Fusion
// =============================================================================

/// Reciprocal Rank Fusion constant.
///
/// Fixed at 60, the value from Cormack, Clarke & Buettcher (SIGIR 2009)
/// used by most production search engines. Not user-tunable.
pub const RRF_K: usize = 60;

/// Default blend weight between the vector (alpha) and lexical (1 - alpha) ranks.
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Each side of a hybrid query fetches `multiplier * top_k` candidates before fusion.
pub const DEFAULT_PREFETCH_MULTIPLIER: usize = 5;

/// Result count used when a descriptor does not set one.
pub const DEFAULT_TOP_K: usize = 10;

/// Explicit retrieval settings.
///
/// Deserializable with every field optional, so partial config files merge
/// onto the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// BM25 parameters used when (re)building the lexical index
    pub bm25: Bm25Params,
    /// Hybrid prefetch multiplier (see [`prefetch_size`](crate::search::fusion::prefetch_size))
    pub prefetch_multiplier: usize,
    /// Blend weight applied when a hybrid descriptor does not set one
    pub default_alpha: f32,
    /// Result count applied when a descriptor does not set one
    pub default_top_k: usize,
    /// Similarity used by the vector scorer
    pub metric: DistanceMetric,
    /// Keep the lexical index between queries, keyed by corpus version
    pub cache_keyword_index: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            prefetch_multiplier: DEFAULT_PREFETCH_MULTIPLIER,
            default_alpha: DEFAULT_ALPHA,
            default_top_k: DEFAULT_TOP_K,
            metric: DistanceMetric::Cosine,
            cache_keyword_index: true,
        }
    }
}

impl RetrievalConfig {
    /// Starts a builder seeded with the defaults.
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder {
            config: Self::default(),
        }
    }

    /// Checks every field, returning the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bm25.validate()?;
        if self.prefetch_multiplier == 0 {
            return Err(ConfigError::InvalidPrefetchMultiplier(
                self.prefetch_multiplier,
            ));
        }
        if !(0.0..=1.0).contains(&self.default_alpha) {
            return Err(ConfigError::InvalidAlpha(self.default_alpha));
        }
        if self.default_top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        Ok(())
    }
}

/// Builder for [`RetrievalConfig`].
#[derive(Debug, Clone)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    pub fn bm25(mut self, params: Bm25Params) -> Self {
        self.config.bm25 = params;
        self
    }

    pub fn prefetch_multiplier(mut self, multiplier: usize) -> Self {
        self.config.prefetch_multiplier = multiplier;
        self
    }

    pub fn default_alpha(mut self, alpha: f32) -> Self {
        self.config.default_alpha = alpha;
        self
    }

    pub fn default_top_k(mut self, top_k: usize) -> Self {
        self.config.default_top_k = top_k;
        self
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    pub fn cache_keyword_index(mut self, enabled: bool) -> Self {
        self.config.cache_keyword_index = enabled;
        self
    }

    /// Validates and returns the config.
    pub fn build(self) -> Result<RetrievalConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RetrievalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bm25.k1, DEFAULT_BM25_K1);
        assert_eq!(config.bm25.b, DEFAULT_BM25_B);
        assert_eq!(config.prefetch_multiplier, 5);
        assert_eq!(config.default_alpha, 0.5);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert_eq!(
            RetrievalConfig::builder().default_alpha(1.5).build(),
            Err(ConfigError::InvalidAlpha(1.5))
        );
        assert_eq!(
            RetrievalConfig::builder().prefetch_multiplier(0).build(),
            Err(ConfigError::InvalidPrefetchMultiplier(0))
        );
        assert_eq!(
            RetrievalConfig::builder().default_top_k(0).build(),
            Err(ConfigError::InvalidTopK)
        );
        assert_eq!(
            RetrievalConfig::builder()
                .bm25(Bm25Params { k1: -1.0, b: 0.75 })
                .build(),
            Err(ConfigError::InvalidK1(-1.0))
        );
    }

    #[test]
    fn test_partial_json_merges_onto_defaults() {
        let json = r#"{ "prefetch_multiplier": 3, "bm25": { "k1": 1.2 }, "metric": "dot_product" }"#;
        let config: RetrievalConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.prefetch_multiplier, 3);
        assert_eq!(config.bm25.k1, 1.2);
        assert_eq!(config.bm25.b, DEFAULT_BM25_B);
        assert_eq!(config.metric, DistanceMetric::DotProduct);
        assert_eq!(config.default_alpha, DEFAULT_ALPHA);
        assert!(config.cache_keyword_index);
    }

    #[test]
    fn test_rrf_k_is_sixty() {
        let k = RRF_K;
        assert_eq!(k, 60);
    }
}
