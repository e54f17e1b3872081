//! Dual dense+sparse collection vector store (component C3).
//!
//! Builds on [`crate::index::HnswIndex`] and [`crate::persistence::RedbPersistence`]
//! the way [`crate::store::RagStore`] combines a single index with persistence, but
//! keeps two parallel collections addressed by the same chunk id
//! `{doc_id}_{chunk_id}`: a dense collection searched by an HNSW approximate
//! nearest-neighbor index, and a sparse collection — a fixed `SPARSE_DIM`-wide
//! lexical vector per chunk — searched by brute-force dot product, since an ANN
//! index buys nothing for a flat, mostly-zero lexical vector.
//!
//! Concurrent access is serialized with an advisory file lock (`fs2`) against a
//! sidecar `store.lock` file: shared for queries, exclusive for writes, polled
//! every 100ms up to a configured timeout.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{RagError, Result};
use crate::index::{HnswIndex, VectorIndex, matches_filter};
use crate::persistence::{Persistence, RedbPersistence};
use crate::types::{Chunk, IndexEntry, Metadata, SearchResult};

/// Width of the scattered sparse lexical vector. Sparse token ids beyond this
/// range are dropped; every embedder in this stack maps into it.
pub const SPARSE_DIM: usize = 30_000;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `{token_id: weight}` sparse embedding as reported by the embedder interface.
pub type SparseWeights = BTreeMap<u32, f32>;

/// Produces a sparse lexical embedding for a piece of text, mirroring
/// [`vantage_core::EmbeddingModel`]'s shape but returning a `{token_id: weight}`
/// map instead of a dense vector. There is no dense/sparse split in
/// `vantage-core` itself, since most embedding backends are dense-only; this
/// trait covers the SPLADE-style backends that back the sparse collection.
pub trait SparseEmbeddingModel: Send + Sync {
    /// Converts text to a sparse `{token_id: weight}` embedding.
    fn embed_sparse(&self, text: &str) -> impl std::future::Future<Output = anyhow::Result<SparseWeights>> + Send;
}

/// Scatters a `{token_id: weight}` map into a fixed [`SPARSE_DIM`]-wide vector.
/// Token ids at or beyond `SPARSE_DIM` are dropped rather than panicking, since
/// the embedder's vocabulary is external and not guaranteed to fit.
#[must_use]
pub fn scatter_sparse(weights: &SparseWeights) -> Vec<f32> {
    let mut vector = vec![0.0f32; SPARSE_DIM];
    for (&token_id, &weight) in weights {
        if let Some(slot) = vector.get_mut(token_id as usize) {
            *slot = weight;
        }
    }
    vector
}

/// One chunk's dual embeddings, as produced by the embedder interface.
#[derive(Debug, Clone)]
pub struct HybridEmbeddings {
    pub dense: Vec<f32>,
    pub sparse: SparseWeights,
}

/// A chunk plus its dual embeddings, ready to be added to a [`HybridStore`].
#[derive(Debug, Clone)]
pub struct HybridChunk {
    pub chunk: Chunk,
    pub embeddings: HybridEmbeddings,
}

/// A hit from [`HybridStore::query`]: the combined score plus the chunk.
#[derive(Debug, Clone)]
pub struct HybridHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Advisory exclusive/shared lock guard around a sidecar `store.lock` file.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn open(directory: &Path) -> Result<Self> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join("store.lock");
        let file = OpenOptions::new().create(true).write(true).open(&path)?;
        Ok(Self { file })
    }

    fn acquire_shared(&self, timeout: Duration, directory: &Path) -> Result<()> {
        self.poll_until_locked(timeout, directory, |f| f.try_lock_shared())
    }

    fn acquire_exclusive(&self, timeout: Duration, directory: &Path) -> Result<()> {
        self.poll_until_locked(timeout, directory, |f| f.try_lock_exclusive())
    }

    fn poll_until_locked(
        &self,
        timeout: Duration,
        directory: &Path,
        try_lock: impl Fn(&File) -> std::io::Result<()>,
    ) -> Result<()> {
        let started = Instant::now();
        loop {
            if try_lock(&self.file).is_ok() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(RagError::LockTimeout(directory.to_path_buf()));
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Dense collection: an HNSW index backed by its own `.redb` persistence file.
pub struct DenseCollection {
    index: HnswIndex,
    persistence: RedbPersistence,
}

impl DenseCollection {
    fn open(directory: &Path, dimension: usize) -> Result<Self> {
        let persistence = RedbPersistence::new(directory.join("dense.redb"))?;
        let index = HnswIndex::new(dimension);
        index.load(persistence.load()?)?;
        Ok(Self { index, persistence })
    }

    fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        self.index.insert(chunk, embedding)?;
        self.persistence.save(&self.index.entries())
    }

    fn search(&self, query: &[f32], n_fetch: usize, filter_metadata: Option<&Metadata>) -> Result<Vec<SearchResult>> {
        self.index.search(query, n_fetch, 0.0, filter_metadata)
    }

    /// Re-opens persisted entries, discarding the in-memory index built so far.
    /// Used to observe writes made by a different process/writer.
    fn refresh(&self) -> Result<()> {
        self.index.clear();
        self.index.load(self.persistence.load()?)
    }
}

/// Sparse collection: a flat, brute-force-scanned set of [`SPARSE_DIM`]-wide
/// vectors, scored by dot product. No ANN structure — unnecessary for a flat,
/// high-dimensional lexical vector, and brute force over a few thousand chunks
/// is fast enough.
pub struct SparseCollection {
    entries: std::sync::RwLock<Vec<IndexEntry>>,
    persistence: RedbPersistence,
}

impl SparseCollection {
    fn open(directory: &Path) -> Result<Self> {
        let persistence = RedbPersistence::new(directory.join("sparse.redb"))?;
        let entries = persistence.load()?;
        Ok(Self {
            entries: std::sync::RwLock::new(entries),
            persistence,
        })
    }

    fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        let mut guard = self.entries.write().expect("sparse collection lock poisoned");
        guard.retain(|e| e.chunk.id != chunk.id);
        guard.push(IndexEntry::new(chunk, embedding));
        self.persistence.save(&guard)
    }

    fn contains_hash(&self, hash: u64) -> bool {
        self.entries
            .read()
            .expect("sparse collection lock poisoned")
            .iter()
            .any(|e| e.chunk.content_hash == hash)
    }

    fn search(&self, query: &[f32], n_fetch: usize, filter_metadata: Option<&Metadata>) -> Vec<SearchResult> {
        let guard = self.entries.read().expect("sparse collection lock poisoned");
        let mut scored: Vec<SearchResult> = guard
            .iter()
            .filter(|entry| matches_filter(&entry.chunk.metadata, filter_metadata))
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: dot(query, &entry.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n_fetch);
        scored
    }

    fn refresh(&self) -> Result<()> {
        let loaded = self.persistence.load()?;
        *self.entries.write().expect("sparse collection lock poisoned") = loaded;
        Ok(())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// The hybrid dense+sparse vector store (component C3).
///
/// Both collections persist to their own `.redb` file inside `directory`; an
/// advisory lock file in the same directory serializes concurrent writers.
pub struct HybridStore {
    directory: PathBuf,
    dense: DenseCollection,
    sparse: SparseCollection,
    lock_timeout: Duration,
}

impl HybridStore {
    /// Opens (or creates) a hybrid store rooted at `directory`.
    pub fn open(directory: impl Into<PathBuf>, dense_dimension: usize, lock_timeout: Duration) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            dense: DenseCollection::open(&directory, dense_dimension)?,
            sparse: SparseCollection::open(&directory)?,
            directory,
            lock_timeout,
        })
    }

    /// Adds chunks to both collections under an exclusive lock. Metadata
    /// values that are lists/dicts are expected already serialized by the
    /// caller (ingestion-side concern); `None` is represented as an absent key.
    pub fn add_chunks(&self, chunks: Vec<HybridChunk>) -> Result<()> {
        let lock = StoreLock::open(&self.directory)?;
        lock.acquire_exclusive(self.lock_timeout, &self.directory)?;

        for HybridChunk { chunk, embeddings } in chunks {
            if self.sparse.contains_hash(chunk.content_hash) {
                continue;
            }
            let sparse_vector = scatter_sparse(&embeddings.sparse);
            self.dense.insert(chunk.clone(), embeddings.dense)?;
            self.sparse.insert(chunk, sparse_vector)?;
        }
        Ok(())
    }

    /// Runs both collections independently with `n_fetch = 2 * n_results`,
    /// converts distance to similarity, unions results by id, and scores by
    /// `dense_weight * s_d + sparse_weight * s_s`.
    ///
    /// `filter_metadata`, when set, is pushed down into both collections and
    /// applied before the `n_fetch`/`n_results` truncation, so a scoped query
    /// (e.g. by `document_group_id`) still returns up to `n_results` in-scope
    /// hits instead of filtering an already-truncated global top-N.
    pub fn query(
        &self,
        dense_vec: &[f32],
        sparse_vec: &SparseWeights,
        n_results: usize,
        filter_metadata: Option<&Metadata>,
        dense_weight: f32,
        sparse_weight: f32,
    ) -> Result<Vec<HybridHit>> {
        let lock = StoreLock::open(&self.directory)?;
        lock.acquire_shared(self.lock_timeout, &self.directory)?;

        let n_fetch = n_results.saturating_mul(2).max(1);
        let dense_hits = self.dense.search(dense_vec, n_fetch, filter_metadata)?;
        let sparse_query = scatter_sparse(sparse_vec);
        let sparse_hits = self.sparse.search(&sparse_query, n_fetch, filter_metadata);

        let mut combined: BTreeMap<String, (Chunk, f32)> = BTreeMap::new();
        for hit in dense_hits {
            let similarity = hit.score;
            combined.insert(hit.chunk.id.clone(), (hit.chunk, dense_weight * similarity));
        }
        for hit in sparse_hits {
            let similarity = hit.score;
            combined
                .entry(hit.chunk.id.clone())
                .and_modify(|(_, score)| *score += sparse_weight * similarity)
                .or_insert_with(|| (hit.chunk, sparse_weight * similarity));
        }

        let mut ranked: Vec<HybridHit> = combined
            .into_values()
            .map(|(chunk, score)| HybridHit {
                id: chunk.id,
                text: chunk.text,
                metadata: chunk.metadata,
                score,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(n_results);
        Ok(ranked)
    }

    /// Forces both collections to re-read their persisted entries, so this
    /// handle observes writes made by a different writer (e.g. a separate
    /// ingestion process).
    pub fn refresh_client(&self) -> Result<()> {
        self.dense.refresh()?;
        self.sparse.refresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk::new(id, text, "doc1", 0, 0)
    }

    #[test]
    fn scatter_drops_out_of_range_token_ids() {
        let mut weights = SparseWeights::new();
        weights.insert(5, 0.5);
        weights.insert(SPARSE_DIM as u32 + 10, 0.9);
        let vector = scatter_sparse(&weights);
        assert_eq!(vector.len(), SPARSE_DIM);
        assert_eq!(vector[5], 0.5);
    }

    #[test]
    fn add_and_query_combines_dense_and_sparse_scores() {
        let dir = tempfile::tempdir().unwrap();
        let store = HybridStore::open(dir.path(), 4, Duration::from_secs(1)).unwrap();

        let mut sparse_a = SparseWeights::new();
        sparse_a.insert(1, 1.0);
        store
            .add_chunks(vec![HybridChunk {
                chunk: chunk("doc1_0", "alpha"),
                embeddings: HybridEmbeddings { dense: vec![1.0, 0.0, 0.0, 0.0], sparse: sparse_a },
            }])
            .unwrap();

        let mut query_sparse = SparseWeights::new();
        query_sparse.insert(1, 1.0);
        let hits = store
            .query(&[1.0, 0.0, 0.0, 0.0], &query_sparse, 5, None, 0.5, 0.5)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "doc1_0");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn refresh_observes_writes_from_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        {
            let writer = HybridStore::open(dir.path(), 4, Duration::from_secs(1)).unwrap();
            writer
                .add_chunks(vec![HybridChunk {
                    chunk: chunk("doc1_0", "alpha"),
                    embeddings: HybridEmbeddings { dense: vec![1.0, 0.0, 0.0, 0.0], sparse: SparseWeights::new() },
                }])
                .unwrap();
        }

        let reader = HybridStore::open(dir.path(), 4, Duration::from_secs(1)).unwrap();
        reader.refresh_client().unwrap();
        let hits = reader.query(&[1.0, 0.0, 0.0, 0.0], &SparseWeights::new(), 5, None, 1.0, 0.0).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn filter_metadata_is_applied_before_truncation_not_after() {
        let dir = tempfile::tempdir().unwrap();
        let store = HybridStore::open(dir.path(), 4, Duration::from_secs(1)).unwrap();

        let mut other_group = chunk("other_0", "alpha");
        other_group.metadata.insert("document_group_id".to_string(), "other".to_string());
        let mut own_group = chunk("own_0", "alpha variant");
        own_group.metadata.insert("document_group_id".to_string(), "mine".to_string());

        store
            .add_chunks(vec![
                HybridChunk {
                    chunk: other_group,
                    embeddings: HybridEmbeddings { dense: vec![1.0, 0.0, 0.0, 0.0], sparse: SparseWeights::new() },
                },
                HybridChunk {
                    chunk: own_group,
                    embeddings: HybridEmbeddings { dense: vec![0.9, 0.1, 0.0, 0.0], sparse: SparseWeights::new() },
                },
            ])
            .unwrap();

        let mut filter = Metadata::new();
        filter.insert("document_group_id".to_string(), "mine".to_string());

        // n_results = 1 would truncate to the higher-ranked "other" chunk if
        // the filter were applied after truncation instead of before it.
        let hits = store
            .query(&[1.0, 0.0, 0.0, 0.0], &SparseWeights::new(), 1, Some(&filter), 1.0, 0.0)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "own_0");
    }
}
