use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    /// Idempotent-setup conflict: the group is already present on the log.
    /// Callers performing initialization treat this as success.
    #[error("consumer group '{group}' already exists on '{log}'")]
    GroupExists { log: String, group: String },

    /// A pooled command connection could not be obtained.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// A dedicated connection (e.g. a subscription) could not be established
    /// or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// The bus accepted the connection but the command itself failed.
    #[error("command failed: {0}")]
    Command(String),
}

pub type Result<T> = std::result::Result<T, BusError>;
