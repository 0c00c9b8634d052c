use std::io;
use std::path::PathBuf;

use crate::types::ErrorKind;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("command execution failed: {0}")]
    Command(#[from] io::Error),

    #[error("gpg failed ({kind}, exit status {exit_code}): {message}")]
    Gpg {
        kind: ErrorKind,
        exit_code: i32,
        message: String,
    },

    #[error("invalid key ID '{keyid}': {reason}")]
    InvalidKeyId { keyid: String, reason: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("failed to capture stdin of subprocess")]
    StdinCaptureFailed,
}

impl Error {
    /// Maps this error onto the stable [`ErrorKind`] taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Gpg { kind, .. } => *kind,
            Self::InvalidKeyId { .. } | Self::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::Command(_) | Self::Timeout(_) | Self::StdinCaptureFailed => ErrorKind::Unknown,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
