//! Vector index implementations for RAG.
//!
//! This module provides the [`VectorIndex`] trait and the [`HnswIndex`]
//! implementation for efficient approximate nearest neighbor search.

mod hnsw;

pub use hnsw::HnswIndex;

use crate::error::Result;
use crate::types::{Chunk, IndexEntry, Metadata, SearchResult};

/// Returns `true` when every key/value pair in `filter` is present and equal
/// in `metadata`. `None` (no filter) always matches.
#[must_use]
pub fn matches_filter(metadata: &Metadata, filter: Option<&Metadata>) -> bool {
    match filter {
        None => true,
        Some(filter) => filter.iter().all(|(k, v)| metadata.get(k) == Some(v)),
    }
}

/// Trait for vector index implementations.
///
/// A vector index stores chunks with their embedding vectors and supports
/// efficient similarity search.
pub trait VectorIndex: Send + Sync {
    /// Inserts or updates a chunk with its embedding vector.
    ///
    /// If a chunk with the same ID already exists, it will be replaced.
    fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()>;

    /// Removes a chunk by its ID.
    ///
    /// Returns `true` if a chunk was removed, `false` if not found.
    fn remove(&self, chunk_id: &str) -> bool;

    /// Searches for the most similar chunks to the query vector.
    ///
    /// `filter_metadata`, when set, is applied to candidates *before* the
    /// `top_k` truncation so a scoped search over a small subset of the
    /// index still returns up to `top_k` in-scope hits instead of whatever
    /// survives filtering an already-truncated top-`top_k` global result.
    ///
    /// # Arguments
    /// * `query` - The query embedding vector
    /// * `top_k` - Maximum number of results to return
    /// * `threshold` - Minimum similarity score (0.0 to 1.0 for cosine)
    /// * `filter_metadata` - Optional required key/value metadata match
    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f32,
        filter_metadata: Option<&Metadata>,
    ) -> Result<Vec<SearchResult>>;

    /// Returns the embedding dimension.
    fn dimension(&self) -> usize;

    /// Returns the number of indexed chunks.
    fn len(&self) -> usize;

    /// Returns `true` if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries from the index.
    fn clear(&self);

    /// Returns an iterator over all index entries.
    fn entries(&self) -> Vec<IndexEntry>;

    /// Loads entries into the index, replacing existing content.
    fn load(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Checks if a content hash already exists in the index.
    fn contains_hash(&self, hash: u64) -> bool;
}
