//! `config.toml` loading, environment overrides and validation.
//!
//! Every field has a default, so a missing file or a file that only sets a
//! few keys is valid:
//!
//! ```toml
//! [system]
//! vault_path = "~/notes"
//! chunk_size = 800
//!
//! [retrieval]
//! strategy = "hyde"
//! web_fallback = false
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
    error::{Error, Result},
    indexer::DEFAULT_BATCH_SIZE,
    ollama::{DEFAULT_BASE_URL, DEFAULT_EMBED_MODEL, DEFAULT_LLM_MODEL},
    strategy::{RetrievalSettings, Strategy},
};

/// Overrides `system.vault_path`.
pub const VAULT_PATH_ENV: &str = "VAULTRAG_VAULT_PATH";
/// Overrides `system.ollama_url`.
pub const OLLAMA_URL_ENV: &str = "VAULTRAG_OLLAMA_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub system: SystemConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub vault_path: PathBuf,
    pub ollama_url: String,
    pub llm_model: String,
    pub embed_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub request_timeout_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            vault_path: PathBuf::from("./vault"),
            ollama_url: DEFAULT_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub strategy: Strategy,
    pub web_fallback: bool,
    pub retriever_weights: Vec<f32>,
    pub retriever_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let settings = RetrievalSettings::default();
        Self {
            top_k: settings.top_k,
            strategy: settings.strategy,
            web_fallback: settings.web_fallback,
            retriever_weights: settings.weights,
            retriever_timeout_secs: settings.retriever_timeout.as_secs(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not
    /// exist. Environment overrides are not applied here.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `VAULTRAG_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(vault) = lookup(VAULT_PATH_ENV).filter(|v| !v.is_empty()) {
            self.system.vault_path = PathBuf::from(vault);
        }
        if let Some(url) = lookup(OLLAMA_URL_ENV).filter(|v| !v.is_empty()) {
            self.system.ollama_url = url;
        }
    }

    /// Reject configurations no operation could run with.
    pub fn validate(&self) -> Result<()> {
        self.chunking()?;

        let fail = |msg: String| Err(Error::Config(msg));
        if self.system.batch_size == 0 {
            return fail("system.batch_size must be at least 1".into());
        }
        if self.system.request_timeout_secs == 0 {
            return fail("system.request_timeout_secs must be at least 1".into());
        }
        if self.retrieval.top_k == 0 {
            return fail("retrieval.top_k must be at least 1".into());
        }
        if self.retrieval.retriever_timeout_secs == 0 {
            return fail(
                "retrieval.retriever_timeout_secs must be at least 1".into(),
            );
        }
        if let Some(w) = self
            .retrieval
            .retriever_weights
            .iter()
            .find(|w| !w.is_finite() || **w < 0.0)
        {
            return fail(format!(
                "retrieval.retriever_weights must be finite and non-negative, got {w}"
            ));
        }
        Ok(())
    }

    pub fn chunking(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.system.chunk_size, self.system.chunk_overlap)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.system.request_timeout_secs)
    }

    pub fn retrieval_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            top_k: self.retrieval.top_k,
            strategy: self.retrieval.strategy,
            web_fallback: self.retrieval.web_fallback,
            weights: self.retrieval.retriever_weights.clone(),
            retriever_timeout: Duration::from_secs(
                self.retrieval.retriever_timeout_secs,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.system.chunk_size, 1000);
        assert_eq!(config.system.chunk_overlap, 200);
        assert_eq!(config.system.batch_size, 100);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.strategy, Strategy::Hybrid);
        assert!(config.retrieval.web_fallback);
        assert_eq!(config.retrieval.retriever_weights, vec![0.5, 0.5]);
    }

    #[test]
    fn missing_file_means_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[system]\nchunk_size = 500\n\n[retrieval]\nstrategy = \"hyde\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.system.chunk_size, 500);
        assert_eq!(config.system.chunk_overlap, 200);
        assert_eq!(config.retrieval.strategy, Strategy::Hyde);
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err =
            Config::from_toml("[retrieval]\nstrategy = \"magic\"\n").unwrap_err();
        assert!(matches!(err, Error::TomlDe(_)));
    }

    #[test]
    fn overlap_not_below_size_is_config_error() {
        let config =
            Config::from_toml("[system]\nchunk_size = 100\nchunk_overlap = 100\n")
                .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_values_are_config_errors() {
        for toml in [
            "[retrieval]\ntop_k = 0\n",
            "[system]\nbatch_size = 0\n",
            "[system]\nrequest_timeout_secs = 0\n",
            "[retrieval]\nretriever_timeout_secs = 0\n",
        ] {
            let config = Config::from_toml(toml).unwrap();
            assert!(
                matches!(config.validate(), Err(Error::Config(_))),
                "{toml} should be rejected"
            );
        }
    }

    #[test]
    fn negative_weight_is_config_error() {
        let config =
            Config::from_toml("[retrieval]\nretriever_weights = [0.5, -1.0]\n")
                .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [
            (VAULT_PATH_ENV, "/srv/notes"),
            (OLLAMA_URL_ENV, "http://gpu-box:11434"),
        ]
        .into();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.system.vault_path, PathBuf::from("/srv/notes"));
        assert_eq!(config.system.ollama_url, "http://gpu-box:11434");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn retrieval_settings_mirror_config() {
        let config = Config::from_toml(
            "[retrieval]\ntop_k = 3\nweb_fallback = false\nretriever_timeout_secs = 7\n",
        )
        .unwrap();
        let settings = config.retrieval_settings();
        assert_eq!(settings.top_k, 3);
        assert!(!settings.web_fallback);
        assert_eq!(settings.retriever_timeout, Duration::from_secs(7));
    }
}
