//! Parsed, immutable spooler configuration.

use crate::error::{SpoolerError, SpoolerResult};

/// Backend driver selected by a definition string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Local-filesystem storage.
    Local,
    /// Riak-style HTTP key-value storage.
    Riak,
}

impl DriverKind {
    /// Driver token as it appears in definition strings.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Riak => "riak",
        }
    }
}

/// Immutable configuration parsed from a raw definition string.
///
/// The grammar is `"<driver>:<description>,<outPipe>,<inPipe>"` where
/// `<driver>` selects a [`DriverKind`] and `<description>` is the
/// driver-specific connection string (it may be empty and may itself contain
/// `:`). The two pipe components are legacy IPC endpoints retained as opaque
/// strings. The capacity bound is supplied by the caller, never parsed.
#[derive(Debug, Clone)]
pub struct SpoolerDefinition {
    driver: DriverKind,
    description: String,
    paths_pipe: String,
    digests_pipe: String,
    max_pending_jobs: usize,
}

impl SpoolerDefinition {
    /// Parse a raw definition string together with the queue capacity bound.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolerError::InvalidDefinition`] when the component grammar
    /// is violated or the capacity bound is zero, and
    /// [`SpoolerError::UnknownDriver`] for unrecognised driver tokens.
    pub fn parse(raw: &str, max_pending_jobs: usize) -> SpoolerResult<Self> {
        if max_pending_jobs == 0 {
            return Err(SpoolerError::InvalidDefinition {
                reason: "max_pending_jobs must be at least one",
                value: raw.to_string(),
            });
        }

        let components: Vec<&str> = raw.split(',').collect();
        let [upstream, paths_pipe, digests_pipe] = components.as_slice() else {
            return Err(SpoolerError::InvalidDefinition {
                reason: "expected a driver component and two pipe components",
                value: raw.to_string(),
            });
        };

        let Some((driver_token, description)) = upstream.split_once(':') else {
            return Err(SpoolerError::InvalidDefinition {
                reason: "driver component carries no description",
                value: (*upstream).to_string(),
            });
        };

        let driver = match driver_token {
            "local" => DriverKind::Local,
            "riak" => DriverKind::Riak,
            other => {
                return Err(SpoolerError::UnknownDriver {
                    name: other.to_string(),
                });
            }
        };

        Ok(Self {
            driver,
            description: description.to_string(),
            paths_pipe: (*paths_pipe).to_string(),
            digests_pipe: (*digests_pipe).to_string(),
            max_pending_jobs,
        })
    }

    /// Backend driver selected by the definition.
    #[must_use]
    pub const fn driver(&self) -> DriverKind {
        self.driver
    }

    /// Driver-specific connection string.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Legacy outbound pipe endpoint, retained verbatim.
    #[must_use]
    pub fn paths_pipe(&self) -> &str {
        &self.paths_pipe
    }

    /// Legacy inbound pipe endpoint, retained verbatim.
    #[must_use]
    pub fn digests_pipe(&self) -> &str {
        &self.digests_pipe
    }

    /// Upper bound on jobs held in the queue at any time.
    #[must_use]
    pub const fn max_pending_jobs(&self) -> usize {
        self.max_pending_jobs
    }
}
