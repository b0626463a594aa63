//! # Design
//!
//! - Structured, constant-message errors for definition parsing and pool
//!   bring-up; these are fatal and no spooler is produced.
//! - Per-job failures never travel through this type; they surface as
//!   nonzero return codes on the completion callback.

use std::io;

use thiserror::Error;

use crate::backend::BackendError;

/// Result type for spooler construction and configuration.
pub type SpoolerResult<T> = Result<T, SpoolerError>;

/// Fatal errors raised while parsing a definition or bringing up a pool.
#[derive(Debug, Error)]
pub enum SpoolerError {
    /// The definition string does not match the expected grammar.
    #[error("invalid spooler definition")]
    InvalidDefinition {
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending input.
        value: String,
    },
    /// The driver token does not name a known backend.
    #[error("unknown spooler driver")]
    UnknownDriver {
        /// Driver token found in the definition.
        name: String,
    },
    /// A worker thread could not be spawned.
    #[error("failed to spawn spooler worker")]
    SpawnWorker {
        /// Underlying spawn error.
        source: io::Error,
    },
    /// The selected backend driver could not be constructed.
    #[error("failed to construct backend driver")]
    Backend(#[from] BackendError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn backend_errors_convert_and_keep_their_source() {
        let backend = BackendError::InvalidDescription {
            reason: "empty",
            value: String::new(),
        };
        let error = SpoolerError::from(backend);
        assert!(matches!(error, SpoolerError::Backend(_)));
        assert!(error.source().is_some());
    }
}
