//! Error types shared by the API client, controller and export code.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally before any request was made.
    #[error("{0}")]
    Validation(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("could not decode server response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no active session")]
    NoActiveSession,
}

impl From<ureq::Error> for ClientError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => ClientError::Status(code),
            other => ClientError::Transport(other.to_string()),
        }
    }
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}
