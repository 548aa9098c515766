//! Per-query retrieval strategy selection with fallbacks.
//!
//! A query is first answered with the configured [`Strategy`]. If that
//! fails, a direct vector query is tried instead; the failed strategy is
//! never retried. If the final local result is empty and web fallback is
//! enabled, a single web search result stands in for local passages.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    document::{Chunk, Document},
    error::{Error, Result},
    keyword_index::KeywordIndex,
    retriever::{DEFAULT_RETRIEVER_TIMEOUT, FusionRetriever, Retriever},
    vector_index::VectorIndex,
    web_search::WebSearch,
};

/// Weight given to each hybrid member when none is configured.
const DEFAULT_WEIGHT: f32 = 0.5;

/// A language model that completes a prompt in one shot.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Query the vector index with the raw question.
    Vector,
    /// Keyword and vector results fused together.
    #[default]
    Hybrid,
    /// Search with a generated hypothetical answer instead of the question.
    Hyde,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
            Self::Hyde => "hyde",
        })
    }
}

/// Strategies to try, in order, when `selected` is configured.
pub fn fallback_chain(selected: Strategy) -> Vec<Strategy> {
    if selected == Strategy::Vector {
        vec![Strategy::Vector]
    } else {
        vec![selected, Strategy::Vector]
    }
}

/// Prompt used to generate a hypothetical answer passage.
pub fn hyde_prompt(question: &str) -> String {
    format!("Write a passage that answers: {question}")
}

/// Query-time knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub strategy: Strategy,
    pub web_fallback: bool,
    /// Keyword weight, then vector weight. Not applied to ranking.
    pub weights: Vec<f32>,
    pub retriever_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            strategy: Strategy::default(),
            web_fallback: true,
            weights: vec![DEFAULT_WEIGHT, DEFAULT_WEIGHT],
            retriever_timeout: DEFAULT_RETRIEVER_TIMEOUT,
        }
    }
}

/// The outcome of one strategy attempt.
#[derive(Debug)]
pub enum Attempt {
    Succeeded {
        strategy: Strategy,
        chunks: Vec<Chunk>,
    },
    Failed {
        strategy: Strategy,
        error: Error,
    },
}

/// Passages retrieved for a query and where they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    /// The strategy that produced the local result.
    pub strategy: Strategy,
    /// True when `chunks` is the web fallback rather than local content.
    pub from_web: bool,
    pub chunks: Vec<Chunk>,
}

pub struct RetrievalEngine {
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    web: Arc<dyn WebSearch>,
    settings: RetrievalSettings,
}

impl RetrievalEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        web: Arc<dyn WebSearch>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            index,
            generator,
            web,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Retrieve passages for `query` using the configured strategy.
    ///
    /// Only fails when the last strategy in the fallback chain fails too.
    /// An empty result is not an error.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        tracing::info!(strategy = %self.settings.strategy, "retrieving");

        let mut last_error = None;
        let mut found = None;
        for strategy in fallback_chain(self.settings.strategy) {
            match self.attempt(strategy, query).await {
                Attempt::Succeeded { strategy, chunks } => {
                    found = Some((strategy, chunks));
                    break;
                }
                Attempt::Failed { strategy, error } => {
                    tracing::warn!(
                        %strategy,
                        error = %error,
                        "retrieval strategy failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        let (strategy, chunks) = match (found, last_error) {
            (Some(found), _) => found,
            (None, Some(error)) => return Err(error),
            (None, None) => (self.settings.strategy, Vec::new()),
        };

        if !chunks.is_empty() || !self.settings.web_fallback {
            return Ok(Retrieval {
                strategy,
                from_web: false,
                chunks,
            });
        }

        let chunks = self.web_fallback(query).await;
        Ok(Retrieval {
            strategy,
            from_web: !chunks.is_empty(),
            chunks,
        })
    }

    /// Run one strategy and tag the outcome.
    pub async fn attempt(&self, strategy: Strategy, query: &str) -> Attempt {
        match self.run(strategy, query).await {
            Ok(chunks) => Attempt::Succeeded { strategy, chunks },
            Err(error) => Attempt::Failed { strategy, error },
        }
    }

    async fn run(&self, strategy: Strategy, query: &str) -> Result<Vec<Chunk>> {
        let k = self.settings.top_k;
        match strategy {
            Strategy::Vector => self.index.query_by_text(query, k).await,
            Strategy::Hybrid => self.hybrid(query, k).await,
            Strategy::Hyde => {
                let passage =
                    self.generator.complete(&hyde_prompt(query)).await?;
                tracing::debug!(
                    chars = passage.len(),
                    "generated hypothetical passage"
                );
                self.index.query_by_text(&passage, k).await
            }
        }
    }

    /// Fuse keyword and vector results. The keyword index is rebuilt
    /// from a full scan every time.
    async fn hybrid(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let corpus = self.index.all_documents().await?;
        let keyword = KeywordIndex::build(corpus)?;

        let weight = |i: usize| {
            self.settings.weights.get(i).copied().unwrap_or(DEFAULT_WEIGHT)
        };
        let fusion = FusionRetriever::new(vec![
            (Retriever::Keyword(Arc::new(keyword)), weight(0)),
            (Retriever::Vector(self.index.clone()), weight(1)),
        ])
        .with_timeout(self.settings.retriever_timeout);

        fusion.search(query, k).await
    }

    async fn web_fallback(&self, query: &str) -> Vec<Chunk> {
        tracing::info!("no local results, falling back to web search");
        match self.web.search(query).await {
            Ok(text) => vec![Document::web(text).whole()],
            Err(e) => {
                tracing::warn!(error = %e, "web search failed");
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{testing::*, *};
    use crate::{
        document::RawDocument,
        vector_index::testing::{Behavior, FakeIndex, local_index},
    };

    fn chunk(name: &str, text: &str) -> Chunk {
        Document::parse(RawDocument {
            bytes: text.as_bytes().to_vec(),
            source: PathBuf::from(name),
        })
        .unwrap()
        .whole()
    }

    fn settings(strategy: Strategy, web_fallback: bool) -> RetrievalSettings {
        RetrievalSettings {
            top_k: 1,
            strategy,
            web_fallback,
            ..RetrievalSettings::default()
        }
    }

    fn engine(
        index: Arc<dyn VectorIndex>,
        generator: Option<&str>,
        web: Arc<CountingWeb>,
        settings: RetrievalSettings,
    ) -> RetrievalEngine {
        RetrievalEngine::new(
            index,
            Arc::new(ScriptedGenerator(generator.map(str::to_string))),
            web,
            settings,
        )
    }

    async fn fruit_index() -> (tempfile::TempDir, Arc<dyn VectorIndex>) {
        let (tmp, index) = local_index();
        index
            .add_chunks(&[
                chunk("a.md", "apple pie recipe"),
                chunk("b.md", "banana bread recipe"),
            ])
            .await
            .unwrap();
        let index: Arc<dyn VectorIndex> = index;
        (tmp, index)
    }

    #[test]
    fn chain_always_ends_with_vector() {
        assert_eq!(fallback_chain(Strategy::Vector), vec![Strategy::Vector]);
        assert_eq!(
            fallback_chain(Strategy::Hybrid),
            vec![Strategy::Hybrid, Strategy::Vector]
        );
        assert_eq!(
            fallback_chain(Strategy::Hyde),
            vec![Strategy::Hyde, Strategy::Vector]
        );
    }

    #[test]
    fn strategy_names_are_lowercase() {
        let parsed: Strategy = serde_json::from_str("\"hyde\"").unwrap();
        assert_eq!(parsed, Strategy::Hyde);
        assert_eq!(Strategy::Hybrid.to_string(), "hybrid");
    }

    #[tokio::test]
    async fn vector_strategy_finds_apple() {
        let (_tmp, index) = fruit_index().await;
        let web = Arc::new(CountingWeb::new(None));
        let engine =
            engine(index, None, web, settings(Strategy::Vector, false));

        let result = engine.retrieve("apple").await.unwrap();
        assert_eq!(result.strategy, Strategy::Vector);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].title, "a.md");
    }

    #[tokio::test]
    async fn hybrid_merges_keyword_and_vector() {
        let (_tmp, index) = fruit_index().await;
        let web = Arc::new(CountingWeb::new(None));
        let engine =
            engine(index, None, web, settings(Strategy::Hybrid, false));

        let result = engine.retrieve("banana").await.unwrap();
        assert_eq!(result.strategy, Strategy::Hybrid);
        assert_eq!(result.chunks[0].title, "b.md");
        let ids: std::collections::HashSet<_> =
            result.chunks.iter().map(|c| c.identity).collect();
        assert_eq!(ids.len(), result.chunks.len());
    }

    #[tokio::test]
    async fn hyde_searches_with_generated_passage() {
        let (_tmp, index) = fruit_index().await;
        let web = Arc::new(CountingWeb::new(None));
        let engine = engine(
            index,
            Some("a banana bread recipe"),
            web,
            settings(Strategy::Hyde, false),
        );

        let result = engine.retrieve("what can I bake?").await.unwrap();
        assert_eq!(result.strategy, Strategy::Hyde);
        assert_eq!(result.chunks[0].title, "b.md");
    }

    #[tokio::test]
    async fn failed_hyde_equals_direct_vector_query() {
        let (_tmp, index) = fruit_index().await;
        let direct = index.query_by_text("apple", 1).await.unwrap();
        let web = Arc::new(CountingWeb::new(None));
        let engine =
            engine(index, None, web, settings(Strategy::Hyde, false));

        let result = engine.retrieve("apple").await.unwrap();
        assert_eq!(result.strategy, Strategy::Vector);
        assert_eq!(result.chunks, direct);
    }

    #[tokio::test]
    async fn error_surfaces_when_vector_fallback_fails_too() {
        let index = Arc::new(FakeIndex::new(Behavior::Fail));
        let web = Arc::new(CountingWeb::new(Some("web text")));
        let engine = engine(
            index.clone(),
            None,
            web.clone(),
            settings(Strategy::Hyde, true),
        );

        let err = engine.retrieve("q").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
        assert_eq!(index.query_count(), 1, "vector tried exactly once");
        assert_eq!(web.calls(), 0);
    }

    #[tokio::test]
    async fn empty_result_stays_empty_without_web_fallback() {
        let index = Arc::new(FakeIndex::new(Behavior::Answer(Vec::new())));
        let web = Arc::new(CountingWeb::new(Some("web text")));
        let engine =
            engine(index, None, web.clone(), settings(Strategy::Vector, false));

        let result = engine.retrieve("q").await.unwrap();
        assert!(result.chunks.is_empty());
        assert!(!result.from_web);
        assert_eq!(web.calls(), 0);
    }

    #[tokio::test]
    async fn empty_result_replaced_by_one_web_document() {
        let index = Arc::new(FakeIndex::new(Behavior::Answer(Vec::new())));
        let web = Arc::new(CountingWeb::new(Some("web text")));
        let engine =
            engine(index, None, web.clone(), settings(Strategy::Vector, true));

        let result = engine.retrieve("q").await.unwrap();
        assert!(result.from_web);
        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].is_web());
        assert_eq!(result.chunks[0].content, "web text");
        assert_eq!(web.calls(), 1);
    }

    #[tokio::test]
    async fn blank_web_text_is_still_one_web_document() {
        let index = Arc::new(FakeIndex::new(Behavior::Answer(Vec::new())));
        let web = Arc::new(CountingWeb::new(Some("  ")));
        let engine =
            engine(index, None, web.clone(), settings(Strategy::Vector, true));

        let result = engine.retrieve("q").await.unwrap();
        assert!(result.from_web);
        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].is_web());
        assert_eq!(web.calls(), 1);
    }

    #[tokio::test]
    async fn web_failure_yields_empty_result() {
        let index = Arc::new(FakeIndex::new(Behavior::Answer(Vec::new())));
        let web = Arc::new(CountingWeb::new(None));
        let engine =
            engine(index, None, web.clone(), settings(Strategy::Vector, true));

        let result = engine.retrieve("q").await.unwrap();
        assert!(result.chunks.is_empty());
        assert_eq!(web.calls(), 1);
    }

    #[tokio::test]
    async fn local_results_skip_web() {
        let (_tmp, index) = fruit_index().await;
        let web = Arc::new(CountingWeb::new(Some("web text")));
        let engine =
            engine(index, None, web.clone(), settings(Strategy::Vector, true));

        let result = engine.retrieve("apple").await.unwrap();
        assert!(!result.from_web);
        assert_eq!(web.calls(), 0);
    }
}
