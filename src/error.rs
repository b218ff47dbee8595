use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write to {} failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv write to {} failed: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Terminal failures of an acquisition session. Each one is reported to the
/// host exactly once, followed by `SessionEvent::Finished`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to connect to {0}")]
    Connection(String),
    #[error("Failed to open output file: {}", path.display())]
    RecordOpen {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
    #[error("Failed to open event file: {}", path.display())]
    EventOpen {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
    #[error("Error in acquisition thread: {0}")]
    Runtime(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown instrument: {0:?}")]
    UnknownInstrument(String),
}
