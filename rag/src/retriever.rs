//! Embeds a query, runs hybrid search, and optionally reranks (component C4).

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use vantage_core::EmbeddingModel;

use crate::error::Result;
use crate::hybrid::{HybridHit, HybridStore, SparseEmbeddingModel, SparseWeights};
use crate::types::Metadata;

/// Scores a batch of `(query, candidate_text)` pairs, highest relevance last
/// or first according to the implementation's own convention — callers sort
/// by the returned score, descending.
pub trait Reranker: Send + Sync {
    fn rerank(
        &self,
        query: &str,
        candidates: &[(String, String)],
    ) -> impl std::future::Future<Output = Result<Vec<f32>>> + Send;
}

/// Bounds placed on retrieval: embedding concurrency (shared with ingestion,
/// to cap total concurrent calls to a GPU-bound embedding backend) and
/// reranker concurrency (a single cross-encoder instance processes one batch
/// at a time).
pub struct RetrieverConfig {
    pub embedding_semaphore: Arc<Semaphore>,
    pub rerank_lock: Arc<Mutex<()>>,
}

impl RetrieverConfig {
    #[must_use]
    pub fn new(max_concurrent_embeddings: usize) -> Self {
        Self {
            embedding_semaphore: Arc::new(Semaphore::new(max_concurrent_embeddings.max(1))),
            rerank_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// A retrieved chunk with its combined (or reranked) score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Embeds a query (dense + sparse) and queries a [`HybridStore`], optionally
/// reranking the results with a cross-encoder.
pub struct Retriever<D, S> {
    store: Arc<HybridStore>,
    dense_embedder: D,
    sparse_embedder: S,
    config: RetrieverConfig,
}

impl<D, S> Retriever<D, S>
where
    D: EmbeddingModel + Send + Sync,
    S: SparseEmbeddingModel + Send + Sync,
{
    #[must_use]
    pub fn new(store: Arc<HybridStore>, dense_embedder: D, sparse_embedder: S, config: RetrieverConfig) -> Self {
        Self { store, dense_embedder, sparse_embedder, config }
    }

    /// Retrieves the top `n_results` chunks for `query`.
    ///
    /// 1. Embed the query (dense + sparse) under the shared embedding semaphore.
    /// 2. Query the hybrid store for `3 * n_results` if `reranker` is set, else `n_results`,
    ///    scoped by `filter_metadata` (applied inside the store, before truncation).
    /// 3. If empty, refresh the store client and retry once (tolerates eventual
    ///    visibility of a concurrent writer's recent commit).
    /// 4. If a reranker is given, score `(query, text)` pairs under the rerank
    ///    lock and return the top `n_results` by rerank score; otherwise return
    ///    the top `n_results` by hybrid score.
    pub async fn retrieve(
        &self,
        query: &str,
        n_results: usize,
        filter_metadata: Option<&Metadata>,
        dense_weight: f32,
        sparse_weight: f32,
        reranker: Option<&dyn Reranker>,
    ) -> Result<Vec<RetrievedChunk>> {
        let fetch_n = if reranker.is_some() { n_results.saturating_mul(3) } else { n_results };

        let (dense_vec, sparse_vec) = self.embed_query(query).await?;

        let mut hits = self.store.query(&dense_vec, &sparse_vec, fetch_n, filter_metadata, dense_weight, sparse_weight)?;
        if hits.is_empty() {
            self.store.refresh_client()?;
            hits = self.store.query(&dense_vec, &sparse_vec, fetch_n, filter_metadata, dense_weight, sparse_weight)?;
        }

        let Some(reranker) = reranker else {
            hits.truncate(n_results);
            return Ok(hits.into_iter().map(RetrievedChunk::from).collect());
        };

        let _guard = self.config.rerank_lock.lock().await;
        let candidates: Vec<(String, String)> = hits.iter().map(|h| (query.to_string(), h.text.clone())).collect();
        let scores = reranker.rerank(query, &candidates).await?;

        let mut scored: Vec<(HybridHit, f32)> = hits.into_iter().zip(scores).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n_results);
        Ok(scored
            .into_iter()
            .map(|(hit, score)| RetrievedChunk { id: hit.id, text: hit.text, metadata: hit.metadata, score })
            .collect())
    }

    async fn embed_query(&self, query: &str) -> Result<(Vec<f32>, SparseWeights)> {
        let _permit = self
            .config
            .embedding_semaphore
            .acquire()
            .await
            .expect("embedding semaphore never closed");
        let dense = self
            .dense_embedder
            .embed(query)
            .await
            .map_err(crate::error::RagError::Embedding)?;
        let sparse = self.sparse_embedder.embed_sparse(query).await.map_err(crate::error::RagError::Embedding)?;
        Ok((dense, sparse))
    }
}

impl From<HybridHit> for RetrievedChunk {
    fn from(hit: HybridHit) -> Self {
        Self { id: hit.id, text: hit.text, metadata: hit.metadata, score: hit.score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hybrid::{HybridChunk, HybridEmbeddings};
    use crate::types::Chunk;
    use std::time::Duration;

    struct MockDense;
    impl EmbeddingModel for MockDense {
        fn dim(&self) -> usize {
            4
        }
        async fn embed(&self, _text: &str) -> vantage_core::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
    }

    struct MockSparse;
    impl SparseEmbeddingModel for MockSparse {
        async fn embed_sparse(&self, _text: &str) -> anyhow::Result<SparseWeights> {
            let mut weights = SparseWeights::new();
            weights.insert(1, 1.0);
            Ok(weights)
        }
    }

    #[tokio::test]
    async fn retrieve_returns_hits_without_reranker() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HybridStore::open(dir.path(), 4, Duration::from_secs(1)).unwrap());
        let mut sparse = SparseWeights::new();
        sparse.insert(1, 1.0);
        store
            .add_chunks(vec![HybridChunk {
                chunk: Chunk::new("doc1_0", "alpha", "doc1", 0, 0),
                embeddings: HybridEmbeddings { dense: vec![1.0, 0.0, 0.0, 0.0], sparse },
            }])
            .unwrap();

        let retriever = Retriever::new(store, MockDense, MockSparse, RetrieverConfig::new(4));
        let hits = retriever.retrieve("alpha", 5, None, 0.5, 0.5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "doc1_0");
    }

    #[tokio::test]
    async fn retrieve_scopes_by_filter_metadata_before_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HybridStore::open(dir.path(), 4, Duration::from_secs(1)).unwrap());

        let mut other = Chunk::new("other_0", "alpha", "doc1", 0, 0);
        other.metadata.insert("document_group_id".to_string(), "other".to_string());
        let mut mine = Chunk::new("mine_0", "alpha variant", "doc2", 0, 1);
        mine.metadata.insert("document_group_id".to_string(), "mine".to_string());

        store
            .add_chunks(vec![
                HybridChunk {
                    chunk: other,
                    embeddings: HybridEmbeddings { dense: vec![1.0, 0.0, 0.0, 0.0], sparse: SparseWeights::new() },
                },
                HybridChunk {
                    chunk: mine,
                    embeddings: HybridEmbeddings { dense: vec![0.9, 0.1, 0.0, 0.0], sparse: SparseWeights::new() },
                },
            ])
            .unwrap();

        let retriever = Retriever::new(store, MockDense, MockSparse, RetrieverConfig::new(4));
        let mut filter = Metadata::new();
        filter.insert("document_group_id".to_string(), "mine".to_string());
        let hits = retriever.retrieve("alpha", 1, Some(&filter), 1.0, 0.0, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "mine_0");
    }
}
