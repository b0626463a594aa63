//! Storage seam between the spooler core and concrete drivers.

use std::path::PathBuf;
use std::{fmt, io, thread};

use thiserror::Error;

use crate::job::{CopyJob, ProcessJob};

/// Result type for backend driver operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors produced by storage backend drivers.
#[derive(Debug, Error)]
pub enum BackendError {
    /// IO failure while staging or storing an object.
    #[error("backend io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The remote store rejected or failed an operation.
    #[error("backend remote failure")]
    Remote {
        /// Operation that triggered the remote failure.
        operation: &'static str,
        /// Endpoint the operation targeted.
        endpoint: String,
        /// HTTP status reported by the store, when one was received.
        status: Option<u16>,
        /// Static or transport-supplied failure detail.
        detail: String,
    },
    /// The driver description string is unusable.
    #[error("invalid backend description")]
    InvalidDescription {
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value.
        value: String,
    },
}

impl BackendError {
    /// Build an [`BackendError::Io`] variant.
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Nonzero status code surfaced through the completion callback.
    #[must_use]
    pub fn return_code(&self) -> i32 {
        match self {
            Self::Io { source, .. } => source.raw_os_error().unwrap_or(1),
            Self::Remote { status, .. } => (*status).map_or(2, i32::from),
            Self::InvalidDescription { .. } => 3,
        }
    }
}

/// SHA-256 digest identifying stored object content.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap a raw SHA-256 digest.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Relative content-addressed object location.
    ///
    /// The first hex byte becomes a fan-out directory:
    /// `"ab/cdef…<suffix>"`.
    #[must_use]
    pub fn object_path(&self, suffix: &str) -> String {
        let hex = self.to_string();
        format!("{}/{}{suffix}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

/// Pluggable driver performing the storage operation encoded by a job.
///
/// One driver value is shared by every worker thread in the pool, so
/// implementations must tolerate concurrent calls. A wedged driver call
/// blocks its worker indefinitely; the spooler imposes no deadline.
pub trait StorageBackend: Send + Sync + 'static {
    /// Short driver name used in log output.
    fn kind_name(&self) -> &'static str;

    /// Store a verbatim copy of `job.source` at `job.destination`.
    ///
    /// # Errors
    ///
    /// Returns the driver failure whose [`BackendError::return_code`] the
    /// completion callback will surface.
    fn copy(&self, job: &CopyJob) -> BackendResult<()>;

    /// Compress and content-address `job.source` under `job.target_dir`.
    ///
    /// # Errors
    ///
    /// Returns the driver failure whose [`BackendError::return_code`] the
    /// completion callback will surface.
    fn process(&self, job: &ProcessJob) -> BackendResult<ContentDigest>;

    /// Number of worker threads the driver wants serving its queue.
    fn worker_count(&self) -> usize {
        thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_formats_as_lowercase_hex() {
        let mut bytes = [0_u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let digest = ContentDigest::new(bytes);
        let hex = digest.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("ab"));
        assert!(hex.ends_with("01"));
    }

    #[test]
    fn object_path_fans_out_on_the_first_byte() {
        let digest = ContentDigest::new([0xcd; 32]);
        let path = digest.object_path(".data");
        assert!(path.starts_with("cd/"));
        assert!(path.ends_with(".data"));
        assert_eq!(path.len(), 2 + 1 + 62 + 5);
    }

    #[test]
    fn return_codes_are_never_zero() {
        let io_error = BackendError::io("test.op", "/tmp/x", io::Error::other("boom"));
        assert_ne!(io_error.return_code(), 0);

        let remote = BackendError::Remote {
            operation: "test.put",
            endpoint: "http://store/x".to_string(),
            status: Some(503),
            detail: "unavailable".to_string(),
        };
        assert_eq!(remote.return_code(), 503);

        let description = BackendError::InvalidDescription {
            reason: "empty",
            value: String::new(),
        };
        assert_ne!(description.return_code(), 0);
    }
}
