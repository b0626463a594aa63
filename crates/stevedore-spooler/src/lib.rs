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

//! Concurrent upload dispatcher for the stevedore publishing pipeline.
//!
//! The spooler accepts units of work (copy a file into the backing store, or
//! compress and content-address it) and drives them through a fixed pool of
//! worker threads onto a pluggable [`StorageBackend`]. Jobs flow through a
//! bounded FIFO queue: producers block once the queue is at capacity, keeping
//! memory bounded no matter how fast the publishing process submits. Per-job
//! outcomes are reported asynchronously through a registered
//! [`SpoolerCallback`], and a transaction ends by scheduling one termination
//! job per worker, draining the pool deterministically.

pub mod backend;
pub mod definition;
pub mod error;
pub mod job;
mod queue;
pub mod spooler;

pub use backend::{BackendError, BackendResult, ContentDigest, StorageBackend};
pub use definition::{DriverKind, SpoolerDefinition};
pub use error::{SpoolerError, SpoolerResult};
pub use job::{CopyJob, Job, JobOutcome, ProcessJob};
pub use spooler::{Spooler, SpoolerCallback};
