//! Error types for the compress module.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while compressing a file remotely.
///
/// Every variant carries the file path so a failure can be diagnosed
/// without halting the batch.
#[derive(Debug, Error)]
pub enum CompressError {
    /// Failed to read or overwrite the local file.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file being compressed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Network-level failure talking to the service.
    #[error("network error compressing {path}: {source}")]
    Network {
        /// The file being compressed.
        path: PathBuf,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status} from compression service for {path}")]
    HttpStatus {
        /// The file being compressed.
        path: PathBuf,
        /// The HTTP status code.
        status: u16,
    },

    /// The service accepted the request but rejected the image.
    #[error("compression service rejected {path}: {message}")]
    Rejected {
        /// The file being compressed.
        path: PathBuf,
        /// The service's error message.
        message: String,
    },

    /// The service's response body could not be decoded.
    #[error("unexpected response compressing {path}: {source}")]
    Decode {
        /// The file being compressed.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

impl CompressError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a network error.
    pub fn network(path: impl Into<PathBuf>, source: reqwest::Error) -> Self {
        Self::Network {
            path: path.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(path: impl Into<PathBuf>, status: u16) -> Self {
        Self::HttpStatus {
            path: path.into(),
            status,
        }
    }

    /// Creates a service-rejection error.
    pub fn rejected(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Rejected {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(path: impl Into<PathBuf>, source: reqwest::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display() {
        let error = CompressError::http_status("/tmp/a.png", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("/tmp/a.png"), "Expected path in: {msg}");
    }

    #[test]
    fn test_rejected_display() {
        let error = CompressError::rejected("/tmp/a.png", "Request is invalid");
        let msg = error.to_string();
        assert!(msg.contains("rejected"));
        assert!(msg.contains("Request is invalid"));
    }

    #[test]
    fn test_io_display() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error = CompressError::io("/tmp/a.png", io_error);
        assert!(error.to_string().contains("/tmp/a.png"));
    }
}
