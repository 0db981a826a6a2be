//! Error types for staging

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StagingError {
    #[error("source not found: {0}")]
    NotFound(String),

    #[error("cannot read {origin}: {reason}")]
    Unreadable { origin: String, reason: String },

    #[error("cannot write {destination}: {reason}")]
    Unwritable { destination: String, reason: String },

    #[error("no object store bound for {0}")]
    NoObjectStore(String),

    #[error("invalid stage point: {0}")]
    InvalidStagePoint(String),

    #[error("remote store error: {0}")]
    Remote(String),
}

pub type StagingResult<T> = std::result::Result<T, StagingError>;

impl StagingError {
    pub fn unreadable(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreadable {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unwritable(destination: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unwritable {
            destination: destination.into(),
            reason: reason.to_string(),
        }
    }

    /// Map an I/O failure while reading `origin`, keeping "not found" distinct.
    pub fn from_read(origin: impl Into<String>, err: std::io::Error) -> Self {
        let origin = origin.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(origin)
        } else {
            Self::unreadable(origin, err)
        }
    }
}
