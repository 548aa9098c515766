//! Retrievers and fusion.
//!
//! A [`Retriever`] is one of three tagged variants sharing a single
//! capability, `search(query, k)`. Fusion composes other retrievers, so
//! hybrid search is just a `Fusion` over a `Keyword` and a `Vector`.

use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::future::{self, BoxFuture, FutureExt};

use crate::{
    document::Chunk,
    error::{Error, Result},
    keyword_index::KeywordIndex,
    vector_index::VectorIndex,
};

/// Default per-retriever timeout inside a fusion.
pub const DEFAULT_RETRIEVER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub enum Retriever {
    Keyword(Arc<KeywordIndex>),
    Vector(Arc<dyn VectorIndex>),
    Fusion(Arc<FusionRetriever>),
}

impl Retriever {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Keyword(_) => "keyword",
            Self::Vector(_) => "vector",
            Self::Fusion(_) => "fusion",
        }
    }

    /// Return chunks relevant to `query`. Keyword and vector retrievers
    /// return at most `k`; a fusion returns the merged output of its
    /// members without a further cap.
    pub fn search<'a>(
        &'a self,
        query: &'a str,
        k: usize,
    ) -> BoxFuture<'a, Result<Vec<Chunk>>> {
        match self {
            Self::Keyword(index) => {
                future::ready(index.search(query, k)).boxed()
            }
            Self::Vector(index) => index.query_by_text(query, k),
            Self::Fusion(fusion) => fusion.search(query, k).boxed(),
        }
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword(index) => {
                f.debug_tuple("Keyword").field(index).finish()
            }
            Self::Vector(_) => f.write_str("Vector"),
            Self::Fusion(fusion) => {
                f.debug_tuple("Fusion").field(fusion).finish()
            }
        }
    }
}

/// Runs several retrievers concurrently and merges their output.
///
/// Members are queried in parallel, each under its own timeout. A member
/// that fails or times out contributes nothing; the others are unaffected.
/// Results are concatenated in member order and deduplicated by identity,
/// first occurrence winning.
///
/// Weights are carried for configuration purposes only and do not affect
/// the order of the merged results.
#[derive(Debug)]
pub struct FusionRetriever {
    members: Vec<(Retriever, f32)>,
    timeout: Duration,
}

impl FusionRetriever {
    pub fn new(members: Vec<(Retriever, f32)>) -> Self {
        Self {
            members,
            timeout: DEFAULT_RETRIEVER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn weights(&self) -> Vec<f32> {
        self.members.iter().map(|(_, w)| *w).collect()
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        tracing::debug!(
            members = self.members.len(),
            weights = ?self.weights(),
            "fusion search (weights not applied to ranking)"
        );

        let timeout = self.timeout;
        let runs = self.members.iter().map(|(retriever, _)| {
            let kind = retriever.kind();
            let retriever = retriever.clone();
            let query = query.to_string();
            let handle =
                tokio::spawn(async move { retriever.search(&query, k).await });
            let abort = handle.abort_handle();

            async move {
                match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(join)) => Err(Error::unavailable(kind, join)),
                    Err(_) => {
                        abort.abort();
                        Err(Error::Timeout {
                            collaborator: kind,
                            after: timeout,
                        })
                    }
                }
            }
        });
        let outcomes = future::join_all(runs).await;

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for ((retriever, _), outcome) in self.members.iter().zip(outcomes) {
            match outcome {
                Ok(chunks) => {
                    for chunk in chunks {
                        if seen.insert(chunk.identity) {
                            merged.push(chunk);
                        }
                    }
                }
                Err(e) => tracing::warn!(
                    retriever = retriever.kind(),
                    error = %e,
                    "retriever failed, continuing without it"
                ),
            }
        }

        Ok(merged)
    }
}
