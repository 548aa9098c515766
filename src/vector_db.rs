use std::{collections::HashSet, path::Path};

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
};

use crate::{document::Chunk, error::Result, fingerprint::ContentId};

/// Chunk records keyed by insertion sequence number.
const CHUNKS: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
/// Embeddings keyed by the same sequence number as their chunk.
const EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("embeddings");
/// Chunk identity (hex) -> sequence number.
const CHUNK_KEYS: TableDefinition<&str, u64> =
    TableDefinition::new("chunk_keys");
/// Parent document identity (hex) -> number of stored chunks.
const PARENTS: TableDefinition<&str, u64> = TableDefinition::new("parents");

/// Header size: 4 bytes embedding dimension.
const HEADER_SIZE: usize = 4;

/// Persistent store for indexed chunks and their embeddings.
///
/// Binary format per embedding entry:
/// - 4 bytes: dimension D (u32 LE)
/// - D * 4 bytes: f32 LE values
///
/// Chunk records are JSON. Sequence numbers increase monotonically, so
/// iterating by key yields chunks in insertion order.
pub struct VectorDb {
    db: Database,
}

impl VectorDb {
    /// Open or create a store at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use vaultrag::vector_db::VectorDb;
    ///
    /// let db = VectorDb::open(&tmp.path().join("vectors.redb")).unwrap();
    /// assert_eq!(db.chunk_count().unwrap(), 0);
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.open_table(CHUNKS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.open_table(CHUNK_KEYS)?;
        txn.open_table(PARENTS)?;
        txn.commit()?;
        Ok(())
    }

    /// Store a batch of chunks with their embeddings in one transaction.
    ///
    /// Chunks whose identity is already stored are left untouched. Returns
    /// the number of chunks actually inserted.
    pub fn insert_batch(&self, entries: &[(Chunk, Vec<f32>)]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin_write()?;
        let mut inserted = 0;
        {
            let mut chunks = txn.open_table(CHUNKS)?;
            let mut embeddings = txn.open_table(EMBEDDINGS)?;
            let mut keys = txn.open_table(CHUNK_KEYS)?;
            let mut parents = txn.open_table(PARENTS)?;

            let mut next = chunks.last()?.map(|(k, _)| k.value() + 1).unwrap_or(0);

            for (chunk, vector) in entries {
                let chunk_hex = chunk.identity.to_hex();
                if keys.get(chunk_hex.as_str())?.is_some() {
                    continue;
                }

                let record = serde_json::to_vec(chunk)?;
                chunks.insert(next, record.as_slice())?;
                embeddings.insert(next, encode_vector(vector).as_slice())?;
                keys.insert(chunk_hex.as_str(), next)?;

                let parent_hex = chunk.parent.to_hex();
                let count = parents
                    .get(parent_hex.as_str())?
                    .map(|v| v.value())
                    .unwrap_or(0);
                parents.insert(parent_hex.as_str(), count + 1)?;

                next += 1;
                inserted += 1;
            }
        }
        txn.commit()?;
        Ok(inserted)
    }

    /// Identities of every document that has at least one stored chunk.
    pub fn parent_ids(&self) -> Result<HashSet<ContentId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PARENTS)?;
        let mut ids = HashSet::new();
        for entry in table.iter()? {
            let (k, _) = entry?;
            if let Some(id) = ContentId::from_hex(k.value()) {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    /// Every stored chunk, in insertion order.
    pub fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CHUNKS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    /// Brute-force cosine nearest neighbours.
    ///
    /// Returns at most `k` chunks by descending similarity; equal scores
    /// keep insertion order. Entries whose dimension differs from the
    /// query are ignored.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read()?;
        let embeddings = txn.open_table(EMBEDDINGS)?;

        let mut scored: Vec<(u64, f32)> = Vec::new();
        let mut mismatched = 0usize;
        for entry in embeddings.iter()? {
            let (key, value) = entry?;
            match decode_vector(value.value()) {
                Some(vector) if vector.len() == query.len() => {
                    scored.push((key.value(), cosine(query, &vector)));
                }
                _ => mismatched += 1,
            }
        }
        if mismatched > 0 {
            tracing::warn!(
                mismatched,
                "skipped embeddings with unexpected dimension"
            );
        }

        // Stable sort: ties keep key (insertion) order.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        let chunks = txn.open_table(CHUNKS)?;
        let mut result = Vec::with_capacity(scored.len());
        for (key, score) in scored {
            if let Some(record) = chunks.get(key)? {
                result.push((serde_json::from_slice(record.value())?, score));
            }
        }
        Ok(result)
    }

    pub fn chunk_count(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CHUNKS)?;
        Ok(table.len()?)
    }

    pub fn document_count(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PARENTS)?;
        Ok(table.len()?)
    }

    /// Drop every stored chunk and embedding.
    pub fn clear(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.delete_table(CHUNKS)?;
        txn.delete_table(EMBEDDINGS)?;
        txn.delete_table(CHUNK_KEYS)?;
        txn.delete_table(PARENTS)?;
        txn.commit()?;
        self.ensure_tables()
    }
}

impl std::fmt::Debug for VectorDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorDb").finish_non_exhaustive()
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes =
        Vec::with_capacity(HEADER_SIZE + std::mem::size_of_val(vector));
    bytes.extend_from_slice(&(vector.len() as u32).to_le_bytes());
    bytes.extend_from_slice(bytemuck::cast_slice(vector));
    bytes
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    let header: [u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
    let dimension = u32::from_le_bytes(header) as usize;
    let body = &bytes[HEADER_SIZE..];
    if body.len() != dimension * 4 {
        return None;
    }
    // redb values carry no alignment guarantee, so copy rather than cast.
    Some(bytemuck::pod_collect_to_vec(body))
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
