//! Scriptable stand-ins for the storage seam and the completion callback.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use stevedore_spooler::{
    BackendError, BackendResult, ContentDigest, CopyJob, ProcessJob, SpoolerCallback,
    StorageBackend,
};

/// Digest reported by [`StubBackend`] for every successful process job.
const STUB_DIGEST: ContentDigest = ContentDigest::new([0xab; 32]);

/// Scriptable [`StorageBackend`] that records every executed job.
///
/// The worker count is explicit so tests control pool sizes, and an optional
/// per-job delay makes queue saturation observable.
pub struct StubBackend {
    workers: usize,
    delay: Option<Duration>,
    failure_status: Option<u16>,
    executed: Mutex<Vec<String>>,
    moved: Mutex<Vec<PathBuf>>,
}

impl StubBackend {
    /// Stub whose operations all succeed.
    #[must_use]
    pub fn succeeding(workers: usize) -> Self {
        Self {
            workers,
            delay: None,
            failure_status: None,
            executed: Mutex::new(Vec::new()),
            moved: Mutex::new(Vec::new()),
        }
    }

    /// Stub whose operations all fail with the given status code.
    #[must_use]
    pub fn failing(workers: usize, status: u16) -> Self {
        Self {
            failure_status: Some(status),
            ..Self::succeeding(workers)
        }
    }

    /// Sleep for `delay` inside every operation.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Source paths of executed jobs, in execution order.
    ///
    /// # Panics
    ///
    /// Panics if the execution log mutex is poisoned.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().expect("execution log poisoned").clone()
    }

    /// Source paths of jobs executed with move semantics.
    ///
    /// # Panics
    ///
    /// Panics if the move log mutex is poisoned.
    #[must_use]
    pub fn moved(&self) -> Vec<PathBuf> {
        self.moved.lock().expect("move log poisoned").clone()
    }

    fn run(&self, operation: &'static str, source: &Path, move_source: bool) -> BackendResult<()> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.executed
            .lock()
            .expect("execution log poisoned")
            .push(source.display().to_string());
        if move_source {
            self.moved
                .lock()
                .expect("move log poisoned")
                .push(source.to_path_buf());
        }
        match self.failure_status {
            None => Ok(()),
            Some(status) => Err(BackendError::Remote {
                operation,
                endpoint: "stub".to_string(),
                status: Some(status),
                detail: "scripted failure".to_string(),
            }),
        }
    }
}

impl StorageBackend for StubBackend {
    fn kind_name(&self) -> &'static str {
        "stub"
    }

    fn copy(&self, job: &CopyJob) -> BackendResult<()> {
        self.run("stub.copy", &job.source, job.move_source)
    }

    fn process(&self, job: &ProcessJob) -> BackendResult<ContentDigest> {
        self.run("stub.process", &job.source, job.move_source)?;
        Ok(STUB_DIGEST)
    }

    fn worker_count(&self) -> usize {
        self.workers
    }
}

/// One completion report observed by a [`RecordingCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    /// A copy job was reported.
    Copy {
        /// Source path carried by the job.
        source: PathBuf,
        /// Reported status code.
        code: i32,
    },
    /// A process job was reported.
    Process {
        /// Source path carried by the job.
        source: PathBuf,
        /// Reported status code.
        code: i32,
        /// Reported content digest, present on success.
        digest: Option<ContentDigest>,
    },
}

/// [`SpoolerCallback`] that appends every report to an in-memory log.
#[derive(Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingCallback {
    /// Shareable recording callback.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reports observed so far, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if the event log mutex is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events.lock().expect("event log poisoned").clone()
    }
}

impl SpoolerCallback for RecordingCallback {
    fn copy_finished(&self, source: &Path, code: i32) {
        self.events
            .lock()
            .expect("event log poisoned")
            .push(CallbackEvent::Copy {
                source: source.to_path_buf(),
                code,
            });
    }

    fn process_finished(&self, source: &Path, code: i32, digest: Option<&ContentDigest>) {
        self.events
            .lock()
            .expect("event log poisoned")
            .push(CallbackEvent::Process {
                source: source.to_path_buf(),
                code,
                digest: digest.cloned(),
            });
    }
}
