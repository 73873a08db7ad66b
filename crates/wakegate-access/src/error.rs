use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("allow-list file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse allow-list file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode allow-list: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("player not on the allow-list: {0}")]
    UnknownPlayer(String),

    #[error("{0} is not an operator")]
    NotOperator(String),

    #[error("invalid player uuid: {0}")]
    InvalidUuid(String),
}

pub type AccessResult<T> = Result<T, AccessError>;
