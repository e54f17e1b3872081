//! Hybrid retrieval: query preparation, a dual dense+sparse vector store,
//! and a retriever that ties the two together with optional reranking.
//!
//! Ingestion (turning source documents into `(text, embeddings, metadata)`
//! chunks) is treated as an external, black-box pipeline — this crate picks
//! up at the chunk boundary. It provides:
//!
//! - **HNSW indexing** for fast approximate nearest neighbor search over the
//!   dense collection, plus a flat dot-product sparse collection
//! - **Persistence** backends (redb embedded database, rkyv binary) behind a
//!   shared [`persistence::Persistence`] trait
//! - **Query preparation** (zero-shot rewrite, sub-query, step-back)
//!
//! # Architecture
//!
//! - [`query_preparer`] - Query rewriting techniques
//! - [`hybrid`] - Dense + sparse collections backing the vector store
//! - [`index`] - Vector index implementations (HNSW)
//! - [`persistence`] - Storage backends
//! - [`retriever`] - Embeds, searches, optionally reranks

pub mod error;
pub mod hybrid;
pub mod index;
pub mod persistence;
pub mod query_preparer;
pub mod retriever;
pub mod types;

// Re-exports for convenience
pub use error::{RagError, Result};
pub use hybrid::{
    HybridChunk, HybridEmbeddings, HybridHit, HybridStore, SparseEmbeddingModel, SparseWeights, SPARSE_DIM,
};
pub use index::{HnswIndex, VectorIndex};
pub use persistence::{Persistence, RedbPersistence, RkyvPersistence};
pub use query_preparer::{PreparedQuery, QueryPreparer, QueryTechnique};
pub use retriever::{Retriever, RetrieverConfig};
pub use types::{Chunk, IndexEntry, Metadata, SearchResult};

