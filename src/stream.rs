//! Input handling for subprocess stdin.
//!
//! Callers hand operations either raw text (armored keys, plaintext,
//! ciphertext) or the path of a file holding it. [`Source::resolve`] tells
//! the two apart the same way for every operation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;
use tracing::debug;

use crate::error::{Error, Result};

/// Values longer than this are never treated as file paths.
pub const FILE_NAME_LENGTH_LIMIT: usize = 200;

/// Input destined for the subprocess.
pub enum Source {
    /// An already open stream.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
    /// A file on disk.
    Path(PathBuf),
    /// In-memory text or bytes.
    Text(Vec<u8>),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader(_) => f.write_str("Reader(..)"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Text(bytes) => write!(f, "Text({} bytes)", bytes.len()),
        }
    }
}

impl Source {
    /// Decides whether `value` names an existing regular file or is raw text.
    ///
    /// A permission error while probing the path is returned; any other
    /// probe failure means the value is text.
    pub async fn resolve(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        if value.is_empty() || value.len() > FILE_NAME_LENGTH_LIMIT {
            return Ok(Self::Text(value.into_bytes()));
        }

        match tokio::fs::metadata(&value).await {
            Ok(meta) if meta.is_file() => {
                debug!(path = %value, "input resolved to file");
                Ok(Self::Path(PathBuf::from(value)))
            }
            Ok(_) => Ok(Self::Text(value.into_bytes())),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(e.into()),
            Err(_) => Ok(Self::Text(value.into_bytes())),
        }
    }

    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }

    /// Opens the source as a readable stream.
    pub async fn into_reader(self) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        match self {
            Self::Reader(reader) => Ok(reader),
            Self::Text(bytes) => Ok(Box::new(io::Cursor::new(bytes))),
            Self::Path(path) => match tokio::fs::File::open(&path).await {
                Ok(file) => Ok(Box::new(file)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::FileNotFound(path)),
                Err(e) => Err(e.into()),
            },
        }
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Self::Text(text.into_bytes())
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Text(bytes)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::io::AsyncReadExt;

    async fn read_all(source: Source) -> Vec<u8> {
        let mut reader = source.into_reader().await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file contents").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let source = Source::resolve(path.clone()).await.unwrap();
        assert_eq!(source.path(), Some(Path::new(&path)));
        assert_eq!(read_all(source).await, b"file contents");
    }

    #[tokio::test]
    async fn test_resolve_text() {
        let source = Source::resolve("-----BEGIN PGP MESSAGE-----").await.unwrap();
        assert!(source.path().is_none());
        assert_eq!(read_all(source).await, b"-----BEGIN PGP MESSAGE-----");
    }

    #[tokio::test]
    async fn test_resolve_directory_is_text() {
        let dir = tempfile::tempdir().unwrap();
        let value = dir.path().to_string_lossy().to_string();
        let source = Source::resolve(value).await.unwrap();
        assert!(source.path().is_none());
    }

    #[tokio::test]
    async fn test_long_value_is_text() {
        let value = "a".repeat(FILE_NAME_LENGTH_LIMIT + 1);
        let source = Source::resolve(value.clone()).await.unwrap();
        assert_eq!(read_all(source).await, value.as_bytes());
    }

    #[tokio::test]
    async fn test_missing_path_fails_to_open() {
        let source = Source::from(PathBuf::from("/nonexistent/input.asc"));
        let err = source.into_reader().await.err().unwrap();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_reader_passthrough() {
        let source = Source::reader(io::Cursor::new(b"streamed".to_vec()));
        assert_eq!(read_all(source).await, b"streamed");
    }

    #[test]
    fn test_debug_hides_text() {
        let source = Source::from("secret".to_string());
        assert_eq!(format!("{source:?}"), "Text(6 bytes)");
    }
}
