//! vaultrag - question answering over a local notes vault.
//!
//! vaultrag indexes a directory of markdown and text notes into a local
//! vector store, re-embedding only notes whose bytes changed since the last
//! run. Queries are answered with one of three retrieval strategies
//! (plain vector search, keyword + vector fusion, or search with a
//! generated hypothetical answer), falling back to a direct vector query
//! when the chosen strategy fails and to a web search when the vault has
//! nothing relevant.
//!
//! Embeddings and generation come from a local
//! [Ollama](https://ollama.com) server; keyword ranking uses
//! [Tantivy](https://github.com/quickwit-oss/tantivy).
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vaultrag::{
//!     Config, DataDir, Indexer, LocalVectorIndex, OllamaClient,
//!     RetrievalEngine, VaultSource, web_search::DuckDuckGoSearch,
//! };
//!
//! # async fn run() -> vaultrag::Result<()> {
//! let data_dir = DataDir::resolve(None)?;
//! let config = Config::load(&data_dir.config_file())?;
//! let ollama = Arc::new(OllamaClient::new(
//!     &config.system.ollama_url,
//!     &config.system.llm_model,
//!     &config.system.embed_model,
//!     config.request_timeout(),
//! )?);
//! let index =
//!     Arc::new(LocalVectorIndex::open(&data_dir.vector_db(), ollama.clone())?);
//!
//! let indexer =
//!     Indexer::new(index.clone(), config.chunking()?, config.system.batch_size)?;
//! let report = indexer.reindex(&VaultSource::new(&config.system.vault_path)).await?;
//! println!("added {} of {} notes", report.added, report.scanned);
//!
//! let engine = RetrievalEngine::new(
//!     index,
//!     ollama,
//!     Arc::new(DuckDuckGoSearch::new(config.request_timeout())?),
//!     config.retrieval_settings(),
//! );
//! for chunk in engine.retrieve("how do I bake bread?").await?.chunks {
//!     println!("{}: {}", chunk.title, chunk.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod answer;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod data_dir;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod indexer;
pub mod keyword_index;
pub mod ollama;
pub mod retriever;
pub mod strategy;
pub mod text_util;
pub mod vector_db;
pub mod vector_index;
pub mod walker;
pub mod web_search;

pub use config::Config;
pub use corpus::{CorpusSource, VaultSource};
pub use data_dir::DataDir;
pub use document::{Chunk, Document, RawDocument};
pub use error::{Error, Result};
pub use fingerprint::{ContentId, fingerprint};
pub use indexer::{IndexReport, Indexer};
pub use ollama::OllamaClient;
pub use retriever::{FusionRetriever, Retriever};
pub use strategy::{RetrievalEngine, RetrievalSettings, Strategy};
pub use vector_index::{Embedder, LocalVectorIndex, VectorIndex};
