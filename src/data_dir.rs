//! Where vaultrag keeps its config file and vector store.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Overrides the data directory when `--data-dir` is not given.
pub const DATA_DIR_ENV: &str = "VAULTRAG_DATA_DIR";

const CONFIG_FILE: &str = "config.toml";
const VECTOR_DB_FILE: &str = "vectors.redb";

/// The resolved data directory. It exists on disk once resolved.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve and create the data directory: `--data-dir`, then
    /// `VAULTRAG_DATA_DIR`, then `$XDG_DATA_HOME/vaultrag`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::resolve_with(explicit, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => match lookup(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
                Some(val) => PathBuf::from(val),
                None => xdg_data_home()?,
            },
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;
        tracing::debug!(data_dir = %root.display(), "resolved data directory");

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn vector_db(&self) -> PathBuf {
        self.root.join(VECTOR_DB_FILE)
    }

    /// Whether an index has been written here yet.
    pub fn has_index(&self) -> bool {
        self.vector_db().is_file()
    }
}

fn xdg_data_home() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix("vaultrag")
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn explicit_path_wins_over_env() {
        let tmp = tempfile::tempdir().unwrap();
        let other = tmp.path().join("from-env");
        let env = other.to_string_lossy().to_string();

        let dir =
            DataDir::resolve_with(Some(tmp.path()), |_| Some(env.clone()))
                .unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.config_file(), tmp.path().join("config.toml"));
        assert_eq!(dir.vector_db(), tmp.path().join("vectors.redb"));
        assert!(!other.exists());
    }

    #[test]
    fn env_path_is_used_and_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let env = nested.to_string_lossy().to_string();

        let dir = DataDir::resolve_with(None, |key| {
            (key == DATA_DIR_ENV).then(|| env.clone())
        })
        .unwrap();

        assert_eq!(dir.root(), nested);
        assert!(dir.root().is_dir());
    }

    #[test]
    fn fresh_directory_has_no_index() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve_with(Some(tmp.path()), no_env).unwrap();
        assert!(!dir.has_index());

        std::fs::write(dir.vector_db(), b"").unwrap();
        assert!(dir.has_index());
    }

    #[test]
    fn uncreatable_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, "not a directory").unwrap();

        let err = DataDir::resolve_with(Some(&file.join("sub")), no_env)
            .unwrap_err();
        assert!(matches!(err, Error::DataDir(_)));
    }
}
