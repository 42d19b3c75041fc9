use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("failed to reach the metrics endpoint: {0}")]
    SourceUnavailable(String),

    #[error("remote sink credentials rejected or misconfigured: {0}")]
    RemoteAuthError(String),

    #[error("failed to append to the local history: {0}")]
    LocalWriteError(String),

    #[error("failed to append to the remote history: {0}")]
    RemoteWriteError(String),

    #[error("failed to persist deduplication state: {0}")]
    PersistenceError(String),
}
