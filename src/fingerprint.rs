//! Content fingerprints used as document identity.
//!
//! A [`ContentId`] is the BLAKE3 digest of a document's raw bytes. Two
//! documents with the same bytes share an identity; editing a single byte
//! yields a new one. Chunk identities are derived from their parent's
//! identity and position so that all chunks of a document move together.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of the short hex form used for display.
const SHORT_LEN: usize = 8;

/// A stable content identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId([u8; 32]);

/// Compute the identity of a byte string.
///
/// # Examples
///
/// ```
/// use vaultrag::fingerprint::fingerprint;
///
/// let a = fingerprint(b"apple pie recipe");
/// let b = fingerprint(b"apple pie recipe");
/// assert_eq!(a, b);
/// assert_ne!(a, fingerprint(b"apple pie recipes"));
/// ```
pub fn fingerprint(bytes: &[u8]) -> ContentId {
    ContentId(*blake3::hash(bytes).as_bytes())
}

impl ContentId {
    /// Derive the identity of the `index`-th chunk of a document.
    pub fn derive_chunk(&self, index: usize) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.0);
        hasher.update(&(index as u64).to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Full lowercase hex form (64 chars).
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// Parse the full hex form produced by [`ContentId::to_hex`].
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex)
            .ok()
            .map(|hash| Self(*hash.as_bytes()))
    }

    /// Short hex prefix for human display.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_LEN);
        hex
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.short())
    }
}

impl std::fmt::Debug for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentId({})", self.short())
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid content id: {hex}"))
        })
    }
}
