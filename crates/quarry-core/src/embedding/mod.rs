//! Embedding provider abstraction.
//!
//! Models are out of scope for this crate: callers plug in whatever produces
//! vectors (a local model, a remote API) through [`EmbeddingProvider`]. The
//! retriever only needs the query side; document embeddings arrive through
//! the [`CorpusProvider`](crate::storage::CorpusProvider).

use crate::error::EmbeddingError;
use crate::search::types::{Content, ImageRef};
use async_trait::async_trait;
use tracing::instrument;

/// Produces embeddings for text and, optionally, images.
///
/// # Examples
///
/// ```ignore
/// struct RemoteEmbedder { client: HttpClient }
///
/// #[async_trait(?Send)]
/// impl EmbeddingProvider for RemoteEmbedder {
///     async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
///         self.client.embed(texts).await
///             .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait EmbeddingProvider {
    /// Embeds a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a batch of images. Text-only providers keep the default.
    async fn embed_images(&self, images: &[ImageRef]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let _ = images;
        Err(EmbeddingError::Unsupported("image"))
    }
}

/// Embeds a single piece of query content, dispatching on its kind.
///
/// # Errors
///
/// Passes provider errors through. Returns `EmbeddingError::CountMismatch`
/// when the provider does not return exactly one vector.
#[instrument(skip_all, fields(kind = content_kind(content)))]
pub async fn embed_content<E>(provider: &E, content: &Content) -> Result<Vec<f32>, EmbeddingError>
where
    E: EmbeddingProvider + ?Sized,
{
    let mut vectors = match content {
        Content::Text { text } => provider.embed(std::slice::from_ref(text)).await?,
        Content::Image { image } => provider.embed_images(std::slice::from_ref(image)).await?,
    };

    if vectors.len() != 1 {
        return Err(EmbeddingError::CountMismatch {
            expected: 1,
            actual: vectors.len(),
        });
    }
    Ok(vectors.remove(0))
}

fn content_kind(content: &Content) -> &'static str {
    match content {
        Content::Text { .. } => "text",
        Content::Image { .. } => "image",
    }
}
