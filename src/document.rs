//! Documents and the chunks they are split into.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    fingerprint::{ContentId, fingerprint},
};

/// Source marker for synthetic documents produced by web fallback.
pub const WEB_SOURCE: &str = "web";

/// Raw bytes of a note as produced by a corpus source.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub source: PathBuf,
}

/// A parsed note with its content identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub identity: ContentId,
    pub source: String,
    pub title: String,
    /// Targets of `[[wiki links]]`, in order of appearance.
    pub links: Vec<String>,
}

/// A bounded slice of a [`Document`]; the unit that is embedded and indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    /// Derived from `parent` and `index`.
    pub identity: ContentId,
    pub parent: ContentId,
    pub index: usize,
    pub source: String,
    pub title: String,
    pub links: Vec<String>,
}

impl Document {
    /// Parse a raw note. The identity is computed over the raw bytes, so
    /// it changes whenever the file changes.
    pub fn parse(raw: RawDocument) -> Result<Self> {
        let identity = fingerprint(&raw.bytes);
        let source = raw.source.to_string_lossy().to_string();
        let content =
            String::from_utf8(raw.bytes).map_err(|e| Error::Parse {
                source_path: source.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            links: extract_links(&content),
            title: title_for(&raw.source),
            content,
            identity,
            source,
        })
    }

    /// Wrap a web search result as a synthetic document.
    pub fn web(text: String) -> Self {
        Self {
            identity: fingerprint(text.as_bytes()),
            content: text,
            source: WEB_SOURCE.to_string(),
            title: "Web".to_string(),
            links: Vec::new(),
        }
    }

    /// Build the `index`-th chunk of this document from a slice of its text.
    pub fn chunk(&self, index: usize, content: String) -> Chunk {
        Chunk {
            content,
            identity: self.identity.derive_chunk(index),
            parent: self.identity,
            index,
            source: self.source.clone(),
            title: self.title.clone(),
            links: self.links.clone(),
        }
    }

    /// The whole document as a single chunk.
    pub fn whole(self) -> Chunk {
        let content = self.content.clone();
        self.chunk(0, content)
    }
}

impl Chunk {
    pub fn is_web(&self) -> bool {
        self.source == WEB_SOURCE
    }
}

fn title_for(source: &Path) -> String {
    source
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| source.to_string_lossy().to_string())
}

/// Extract `[[target]]` and `[[target|alias]]` link targets.
pub fn extract_links(content: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            break;
        };
        let inner = &after[..end];
        let target = inner.split('|').next().unwrap_or("").trim();
        if !target.is_empty() {
            links.push(target.to_string());
        }
        rest = &after[end + 2..];
    }

    links
}
