//! Embedding backend trait and result types.

use async_trait::async_trait;

/// Component value of placeholder vectors.
pub const PLACEHOLDER_VALUE: f32 = 0.1;

/// One embedding, tagged with whether the remote API actually produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Computed(Vec<f32>),
    /// Constant vector substituted after a failed request.
    Placeholder(Vec<f32>),
}

impl Embedding {
    pub fn placeholder(dimension: usize) -> Self {
        Embedding::Placeholder(vec![PLACEHOLDER_VALUE; dimension])
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Embedding::Placeholder(_))
    }

    pub fn values(&self) -> &[f32] {
        match self {
            Embedding::Computed(v) | Embedding::Placeholder(v) => v,
        }
    }

    pub fn into_values(self) -> Vec<f32> {
        match self {
            Embedding::Computed(v) | Embedding::Placeholder(v) => v,
        }
    }
}

/// Embeddings for a batch of texts, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingBatch {
    pub embeddings: Vec<Embedding>,
}

impl EmbeddingBatch {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Number of placeholder vectors in the batch.
    pub fn degraded(&self) -> usize {
        self.embeddings.iter().filter(|e| e.is_placeholder()).count()
    }

    pub fn extend(&mut self, other: EmbeddingBatch) {
        self.embeddings.extend(other.embeddings);
    }
}

impl IntoIterator for EmbeddingBatch {
    type Item = Embedding;
    type IntoIter = std::vec::IntoIter<Embedding>;

    fn into_iter(self) -> Self::IntoIter {
        self.embeddings.into_iter()
    }
}

/// Trait for embedding backends.
#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    /// Embed a batch of texts. Never fails: unavailable vectors come back as
    /// [`Embedding::Placeholder`].
    async fn embed_documents(&self, texts: &[String]) -> EmbeddingBatch;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Embedding {
        self.embed_documents(&[text.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| Embedding::placeholder(self.dimension()))
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Model identifier, for logs and status output.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_shape() {
        let e = Embedding::placeholder(4);
        assert!(e.is_placeholder());
        assert_eq!(e.values(), &[0.1, 0.1, 0.1, 0.1]);
    }

    #[test]
    fn test_batch_degraded_count() {
        let mut batch = EmbeddingBatch {
            embeddings: vec![Embedding::Computed(vec![1.0, 0.0])],
        };
        batch.extend(EmbeddingBatch {
            embeddings: vec![Embedding::placeholder(2), Embedding::placeholder(2)],
        });
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.degraded(), 2);
        let first = batch.into_iter().next().unwrap();
        assert_eq!(first.into_values(), vec![1.0, 0.0]);
    }
}
