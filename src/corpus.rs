//! Corpus sources: where the indexer gets the current set of notes from.

use std::path::{Path, PathBuf};

use crate::{
    document::RawDocument,
    error::{Error, Result},
    walker,
};

/// Lazily produced, restartable sequence of raw documents.
pub type DocumentIter<'a> =
    Box<dyn Iterator<Item = Result<RawDocument>> + Send + 'a>;

/// Produces the current corpus snapshot.
///
/// Each call to [`CorpusSource::documents`] starts a fresh enumeration. An
/// `Err` item means that one document could not be read; the caller
/// decides whether to skip it. An `Err` from `documents` itself means the
/// corpus could not be enumerated at all.
pub trait CorpusSource: Send + Sync {
    fn documents(&self) -> Result<DocumentIter<'_>>;
}

/// A directory tree of notes.
#[derive(Debug, Clone)]
pub struct VaultSource {
    root: PathBuf,
}

impl VaultSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CorpusSource for VaultSource {
    fn documents(&self) -> Result<DocumentIter<'_>> {
        if !self.root.is_dir() {
            return Err(Error::Config(format!(
                "vault path is not a directory: {}",
                self.root.display()
            )));
        }

        let files = walker::discover_files(&self.root)?;
        tracing::debug!(count = files.len(), "discovered vault files");

        Ok(Box::new(files.into_iter().map(move |file| {
            let source = self.root.join(&file.relative_path);
            let bytes =
                std::fs::read(&file.absolute_path).map_err(|e| Error::Parse {
                    source_path: source.to_string_lossy().to_string(),
                    reason: e.to_string(),
                })?;
            Ok(RawDocument { bytes, source })
        })))
    }
}

/// An in-memory snapshot, mostly useful for tests and embedding callers.
impl CorpusSource for Vec<RawDocument> {
    fn documents(&self) -> Result<DocumentIter<'_>> {
        Ok(Box::new(self.iter().cloned().map(Ok::<_, Error>)))
    }
}
