//! Error types for each failure domain.
//!
//! None of these cross the [`LabelEngine`](crate::engine::LabelEngine) boundary.
//! They are logged where they occur and the failing step is dropped.

use std::path::PathBuf;

use thiserror::Error;

/// Payload decoding errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid label json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("label payload has no identifier")]
    MissingId,
}

/// Label file errors.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("label file io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("label file {path} is not valid: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, source: DecodeError) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }
}

/// Replication transport errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("replication unavailable: {0}")]
    Unavailable(String),

    #[error("only the host may write broadcast values")]
    NotHost,

    #[error("no active session")]
    NoSession,

    #[error("transport failure: {0}")]
    Backend(String),
}
