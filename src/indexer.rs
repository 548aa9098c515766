//! Incremental indexing.
//!
//! Every document is identified by a fingerprint of its bytes. A run reads
//! the whole corpus, asks the vector index which identities it already
//! has, and chunks and embeds only the documents it has never seen. An
//! edited note gets a new identity and is indexed as new content; the
//! chunks under its old identity stay in the index as orphans until the
//! next full rebuild.

use std::{collections::HashSet, sync::Arc};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    chunking::{ChunkingConfig, split_document},
    corpus::CorpusSource,
    document::{Chunk, Document},
    error::{Error, Result},
    vector_index::VectorIndex,
};

/// Default number of chunks written to the vector index per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Summary of one indexing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Documents produced by the corpus source, including unreadable ones.
    pub scanned: usize,
    /// Documents that were chunked and written.
    pub added: usize,
    /// Documents already indexed, duplicated in this run, or blank.
    pub skipped: usize,
    /// Documents that could not be read or decoded.
    pub failed: usize,
    /// Chunks written.
    pub chunks: usize,
    /// Stored identities that no current document has any more.
    pub orphaned: usize,
}

impl IndexReport {
    pub fn is_up_to_date(&self) -> bool {
        self.added == 0
    }
}

/// The write path into a [`VectorIndex`].
///
/// A run holds the index's [`VectorIndex::write_lock`], so runs are
/// serialized even across `Indexer`s sharing one index.
pub struct Indexer {
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        Ok(Self {
            index,
            chunking,
            batch_size,
        })
    }

    /// Bring the index up to date with `corpus`.
    pub async fn reindex(
        &self,
        corpus: &dyn CorpusSource,
    ) -> Result<IndexReport> {
        let _guard = self.index.write_lock().lock().await;
        self.reindex_locked(corpus).await
    }

    /// Drop everything in the index, then index `corpus` from scratch.
    pub async fn rebuild(
        &self,
        corpus: &dyn CorpusSource,
    ) -> Result<IndexReport> {
        let _guard = self.index.write_lock().lock().await;
        tracing::info!("clearing vector index for rebuild");
        self.index.clear().await?;
        self.reindex_locked(corpus).await
    }

    async fn reindex_locked(
        &self,
        corpus: &dyn CorpusSource,
    ) -> Result<IndexReport> {
        let existing = self.index.existing_identities().await?;
        tracing::debug!(existing = existing.len(), "loaded indexed identities");

        let mut report = IndexReport::default();
        let mut current = HashSet::new();
        let mut delta = Vec::new();

        for item in corpus.documents()? {
            report.scanned += 1;

            let doc = match item.and_then(Document::parse) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable document");
                    report.failed += 1;
                    continue;
                }
            };

            let first_sighting = current.insert(doc.identity);
            if !first_sighting || existing.contains(&doc.identity) {
                report.skipped += 1;
                continue;
            }
            // Blank notes produce no chunks and would never show up as
            // existing, so they are skipped rather than counted as added.
            if doc.content.trim().is_empty() {
                tracing::debug!(source = %doc.source, "skipping blank document");
                report.skipped += 1;
                continue;
            }

            delta.push(doc);
        }

        report.added = delta.len();
        report.orphaned = existing.difference(&current).count();

        let chunks: Vec<Chunk> = delta
            .par_iter()
            .flat_map_iter(|doc| split_document(doc, &self.chunking))
            .collect();

        self.write_batches(&chunks).await?;
        report.chunks = chunks.len();

        tracing::info!(
            scanned = report.scanned,
            added = report.added,
            skipped = report.skipped,
            failed = report.failed,
            chunks = report.chunks,
            orphaned = report.orphaned,
            "indexing finished"
        );
        Ok(report)
    }

    /// Write batches one at a time. The first failure stops the run; the
    /// batches before it stay written.
    async fn write_batches(&self, chunks: &[Chunk]) -> Result<()> {
        let total = chunks.len().div_ceil(self.batch_size);
        for (written, batch) in chunks.chunks(self.batch_size).enumerate() {
            if let Err(e) = self.index.add_chunks(batch).await {
                return Err(Error::BatchWrite {
                    written,
                    total,
                    reason: e.to_string(),
                });
            }
            tracing::debug!(
                batch = written + 1,
                total,
                size = batch.len(),
                "wrote batch"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("chunking", &self.chunking)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
