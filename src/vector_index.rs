//! The vector index seam: embedding plus similarity search over chunks.
//!
//! The indexer is the only caller of the write methods
//! ([`VectorIndex::add_chunks`], [`VectorIndex::clear`]) and holds the
//! index's [`VectorIndex::write_lock`] while it calls them; retrievers only
//! read.

use std::{collections::HashSet, path::Path, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    document::Chunk,
    error::{Error, Result},
    fingerprint::ContentId,
    vector_db::VectorDb,
};

/// Turns text into dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text; the output has one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Storage and similarity search for indexed chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Identities of every document with chunks in the index.
    async fn existing_identities(&self) -> Result<HashSet<ContentId>>;

    /// Embed and store one batch of chunks.
    async fn add_chunks(&self, batch: &[Chunk]) -> Result<()>;

    /// Embed `text` and return the `k` most similar chunks.
    async fn query_by_text(&self, text: &str, k: usize) -> Result<Vec<Chunk>>;

    /// Return the `k` chunks most similar to `vector`.
    async fn query_by_embedding(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Chunk>>;

    /// Full scan of every stored chunk, in a stable order.
    async fn all_documents(&self) -> Result<Vec<Chunk>>;

    /// Remove everything. Only used for full rebuilds.
    async fn clear(&self) -> Result<()>;

    /// Lock shared by every writer of this index. An indexing run holds it
    /// from the existing-identity check until its last batch is written.
    fn write_lock(&self) -> &Mutex<()>;
}

/// A [`VectorIndex`] backed by a local redb store.
pub struct LocalVectorIndex {
    db: VectorDb,
    embedder: Arc<dyn Embedder>,
    writer: Mutex<()>,
}

impl LocalVectorIndex {
    pub fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Ok(Self::new(VectorDb::open(path)?, embedder))
    }

    pub fn new(db: VectorDb, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            db,
            embedder,
            writer: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &VectorDb {
        &self.db
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn existing_identities(&self) -> Result<HashSet<ContentId>> {
        self.db.parent_ids()
    }

    async fn add_chunks(&self, batch: &[Chunk]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> =
            batch.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(Error::unavailable(
                "embedder",
                format!(
                    "returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                ),
            ));
        }

        let entries: Vec<(Chunk, Vec<f32>)> =
            batch.iter().cloned().zip(vectors).collect();
        let inserted = self.db.insert_batch(&entries)?;
        tracing::debug!(inserted, requested = batch.len(), "stored chunks");
        Ok(())
    }

    async fn query_by_text(&self, text: &str, k: usize) -> Result<Vec<Chunk>> {
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        let Some(vector) = vectors.pop() else {
            return Err(Error::unavailable("embedder", "empty response"));
        };
        self.query_by_embedding(&vector, k).await
    }

    async fn query_by_embedding(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Chunk>> {
        Ok(self
            .db
            .nearest(vector, k)?
            .into_iter()
            .map(|(chunk, _score)| chunk)
            .collect())
    }

    async fn all_documents(&self) -> Result<Vec<Chunk>> {
        self.db.all_chunks()
    }

    async fn clear(&self) -> Result<()> {
        self.db.clear()
    }

    fn write_lock(&self) -> &Mutex<()> {
        &self.writer
    }
}

impl std::fmt::Debug for LocalVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalVectorIndex")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}
