use std::{path::PathBuf, time::Duration};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("keyword index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("{collaborator} timed out after {after:?}")]
    Timeout {
        collaborator: &'static str,
        after: Duration,
    },

    #[error("failed to parse {source_path}: {reason}")]
    Parse { source_path: String, reason: String },

    #[error("indexing aborted after {written}/{total} batches: {reason}")]
    BatchWrite {
        written: usize,
        total: usize,
        reason: String,
    },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    pub(crate) fn unavailable(
        collaborator: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Unavailable {
            collaborator,
            reason: reason.to_string(),
        }
    }
}
