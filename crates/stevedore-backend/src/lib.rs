#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Storage backend drivers for the stevedore spooler.
//!
//! [`construct`] is the front door: it parses a definition string, selects
//! the matching driver and hands back a running [`Spooler`] bound to it.
//! [`object_probe`] answers the narrower question of whether an object
//! already exists in a backend, for the drivers that can be probed directly.

mod codec;
pub mod local;
pub mod riak;

pub use local::LocalBackend;
pub use riak::RiakBackend;

use std::sync::Arc;

use tracing::debug;

use stevedore_spooler::{DriverKind, Spooler, SpoolerDefinition, SpoolerResult, StorageBackend};

/// Parse `raw` and bring up a running spooler bound to the selected driver.
///
/// # Errors
///
/// Configuration errors (grammar violations, unknown drivers, unusable
/// driver descriptions) and worker-spawn failures are fatal: no spooler is
/// produced.
pub fn construct(raw: &str, max_pending_jobs: usize) -> SpoolerResult<Spooler> {
    let definition = SpoolerDefinition::parse(raw, max_pending_jobs)?;
    let backend: Arc<dyn StorageBackend> = match definition.driver() {
        DriverKind::Local => Arc::new(LocalBackend::new(definition.description())?),
        DriverKind::Riak => Arc::new(RiakBackend::new(definition.description())?),
    };
    debug!(driver = definition.driver().token(), "constructing spooler");
    Spooler::new(definition, backend)
}

/// Existence probe over a backend that supports direct object lookups.
pub struct LocalProbe {
    backend: LocalBackend,
}

impl LocalProbe {
    /// Whether an object already exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.backend.contains(path)
    }
}

/// Build an existence probe from a definition string.
///
/// Only the local driver supports probing. Malformed definitions and
/// non-probeable drivers yield `None` rather than an error; callers treat
/// "no prober available" as an answerless lookup.
#[must_use]
pub fn object_probe(raw: &str) -> Option<LocalProbe> {
    let upstream = raw.split(',').next().unwrap_or(raw);
    let (driver, description) = upstream.split_once(':')?;
    if driver != DriverKind::Local.token() {
        return None;
    }
    LocalBackend::new(description)
        .ok()
        .map(|backend| LocalProbe { backend })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_probe_recognises_local_definitions() {
        let probe = object_probe("local:/tmp/stevedore-store,out,in");
        assert!(probe.is_some());
    }

    #[test]
    fn object_probe_rejects_other_drivers_and_noise() {
        assert!(object_probe("riak:http://riak:8098/riak/data,out,in").is_none());
        assert!(object_probe("nonsense").is_none());
        assert!(object_probe("local:,out,in").is_none());
    }
}
