use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrafmonError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to bind ingest listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error("Initial load of persisted totals failed: {0}")]
    InitialLoad(#[source] Box<TrafmonError>),

    #[error("Failed to write snapshot file {path}: {source}")]
    SnapshotFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TrafmonError {
    /// Errors that must stop the daemon instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrafmonError::Bind { .. } | TrafmonError::InitialLoad(_) | TrafmonError::Configuration(_)
        )
    }
}
