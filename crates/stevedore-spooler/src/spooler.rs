//! Dispatcher owning the bounded job queue and the worker pool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{ContentDigest, StorageBackend};
use crate::definition::SpoolerDefinition;
use crate::error::{SpoolerError, SpoolerResult};
use crate::job::{CopyJob, Job, JobOutcome, ProcessJob};
use crate::queue::JobQueue;

/// Receives per-job completion reports.
///
/// Reports arrive on worker threads, never on the submitting thread, so
/// implementations must be thread-safe. Termination jobs produce no report.
pub trait SpoolerCallback: Send + Sync + 'static {
    /// A copy job finished; `code` is zero on success.
    fn copy_finished(&self, source: &Path, code: i32);

    /// A process job finished; `digest` is present only on success.
    fn process_finished(&self, source: &Path, code: i32, digest: Option<&ContentDigest>);
}

struct DrainLatch {
    gate: Mutex<()>,
    all_done: Condvar,
}

struct Shared {
    definition: SpoolerDefinition,
    backend: Arc<dyn StorageBackend>,
    queue: JobQueue,
    callback: RwLock<Option<Arc<dyn SpoolerCallback>>>,
    pending: AtomicUsize,
    failed: AtomicUsize,
    terminated_workers: AtomicUsize,
    worker_count: usize,
    drain: DrainLatch,
}

impl Shared {
    fn schedule(&self, job: Job) {
        debug!(job = %job.describe(), "scheduling job into the queue");
        // Raise the pending count before the job becomes visible so a fast
        // worker can never drive it below zero.
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.queue.push(job);
    }

    fn on_job_finished(&self, job: &Job, outcome: &JobOutcome) {
        if outcome.is_success() {
            debug!(job = %job.describe(), "job succeeded");
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
            warn!(job = %job.describe(), code = outcome.code, "job failed");
        }

        self.invoke_callback(job, outcome);

        if matches!(job, Job::Termination) {
            let terminated = self.terminated_workers.fetch_add(1, Ordering::SeqCst) + 1;
            if terminated == self.worker_count {
                info!(workers = terminated, "worker pool fully drained");
            }
        }

        let remaining = self.pending.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            drop(lock_ignoring_poison(&self.drain.gate));
            self.drain.all_done.notify_all();
        }
    }

    fn invoke_callback(&self, job: &Job, outcome: &JobOutcome) {
        let registered = match self.callback.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let Some(callback) = registered else {
            return;
        };
        match job {
            Job::Copy(copy) => callback.copy_finished(&copy.source, outcome.code),
            Job::Process(process) => {
                callback.process_finished(&process.source, outcome.code, outcome.digest.as_ref());
            }
            Job::Termination => {}
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = shared.queue.pop();
        debug!(job = %job.describe(), "acquired job from the queue");
        match &job {
            Job::Termination => {
                shared.on_job_finished(&job, &JobOutcome::success(None));
                break;
            }
            Job::Copy(copy) => {
                let outcome = match shared.backend.copy(copy) {
                    Ok(()) => JobOutcome::success(None),
                    Err(error) => {
                        debug!(job = %job.describe(), error = %error, "backend copy failed");
                        JobOutcome::failure(error.return_code())
                    }
                };
                shared.on_job_finished(&job, &outcome);
            }
            Job::Process(process) => {
                let outcome = match shared.backend.process(process) {
                    Ok(digest) => JobOutcome::success(Some(digest)),
                    Err(error) => {
                        debug!(job = %job.describe(), error = %error, "backend process failed");
                        JobOutcome::failure(error.return_code())
                    }
                };
                shared.on_job_finished(&job, &outcome);
            }
        }
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Concurrent job dispatcher driving uploads through a fixed worker pool.
///
/// Submissions enqueue onto a bounded FIFO shared with the workers; producers
/// block while the queue is at capacity, which caps memory use regardless of
/// submission rate. [`Spooler::end_of_transaction`] schedules exactly one
/// termination job per worker; FIFO order guarantees each worker consumes its
/// termination only after everything submitted earlier has been dequeued.
pub struct Spooler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    transaction_ended: AtomicBool,
    move_source: AtomicBool,
}

impl Spooler {
    /// Bring up a dispatcher bound to the given backend driver: allocate the
    /// shared queue and spawn one worker thread per driver-advertised slot.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolerError::SpawnWorker`] when a worker thread cannot be
    /// created; workers spawned before the failure are shut down again before
    /// the partially built pool is discarded.
    pub fn new(
        definition: SpoolerDefinition,
        backend: Arc<dyn StorageBackend>,
    ) -> SpoolerResult<Self> {
        let worker_count = backend.worker_count().max(1);
        let shared = Arc::new(Shared {
            queue: JobQueue::new(definition.max_pending_jobs()),
            backend,
            callback: RwLock::new(None),
            pending: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            terminated_workers: AtomicUsize::new(0),
            worker_count,
            drain: DrainLatch {
                gate: Mutex::new(()),
                all_done: Condvar::new(),
            },
            definition,
        });

        info!(
            driver = shared.backend.kind_name(),
            workers = worker_count,
            capacity = shared.definition.max_pending_jobs(),
            "initialising spooler backend"
        );

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("spool-worker-{index}"))
                .spawn(move || worker_loop(&worker_shared));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    warn!(error = %source, "failed to spawn spooler worker");
                    abort_spawn(&shared, workers);
                    return Err(SpoolerError::SpawnWorker { source });
                }
            }
        }

        Ok(Self {
            shared,
            workers,
            transaction_ended: AtomicBool::new(false),
            move_source: AtomicBool::new(false),
        })
    }

    /// Submit a verbatim copy of `source` to the backend path `destination`.
    ///
    /// Blocks while the job queue is at capacity.
    ///
    /// # Panics
    ///
    /// Panics if called after [`Spooler::end_of_transaction`].
    pub fn copy(&self, source: impl Into<PathBuf>, destination: impl Into<String>) {
        assert!(
            !self.transaction_ended.load(Ordering::SeqCst),
            "copy submitted after end of transaction"
        );
        self.shared.schedule(Job::Copy(CopyJob {
            id: Uuid::new_v4(),
            source: source.into(),
            destination: destination.into(),
            move_source: self.move_source.load(Ordering::SeqCst),
        }));
    }

    /// Submit a compress-and-content-address upload of `source` into the
    /// backend directory `target_dir`, naming the object with `suffix`.
    ///
    /// Blocks while the job queue is at capacity.
    ///
    /// # Panics
    ///
    /// Panics if called after [`Spooler::end_of_transaction`].
    pub fn process(
        &self,
        source: impl Into<PathBuf>,
        target_dir: impl Into<String>,
        suffix: impl Into<String>,
    ) {
        assert!(
            !self.transaction_ended.load(Ordering::SeqCst),
            "process submitted after end of transaction"
        );
        self.shared.schedule(Job::Process(ProcessJob {
            id: Uuid::new_v4(),
            source: source.into(),
            target_dir: target_dir.into(),
            suffix: suffix.into(),
            move_source: self.move_source.load(Ordering::SeqCst),
        }));
    }

    /// Toggle move semantics for subsequently submitted jobs.
    pub fn set_move_mode(&self, enabled: bool) {
        self.move_source.store(enabled, Ordering::SeqCst);
    }

    /// Register the completion callback.
    ///
    /// Registration is expected before the first submission; swapping the
    /// callback while jobs are in flight is a discipline violation.
    ///
    /// # Panics
    ///
    /// Panics if a callback is already registered.
    pub fn set_callback(&self, callback: Arc<dyn SpoolerCallback>) {
        let mut slot = match self.shared.callback.write() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        assert!(slot.is_none(), "spooler callback already registered");
        *slot = Some(callback);
    }

    /// Release the registered callback, if any.
    pub fn unset_callback(&self) {
        let mut slot = match self.shared.callback.write() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = None;
    }

    /// Finish the transaction by scheduling one termination job per worker.
    ///
    /// The queue is FIFO, so every termination job is dequeued only after all
    /// jobs submitted before this call. Further submissions are rejected.
    ///
    /// # Panics
    ///
    /// Panics when called a second time.
    pub fn end_of_transaction(&self) {
        assert!(
            !self.transaction_ended.swap(true, Ordering::SeqCst),
            "end of transaction signalled twice"
        );
        info!(
            workers = self.shared.worker_count,
            "ending spooler transaction"
        );
        for _ in 0..self.shared.worker_count {
            self.shared.schedule(Job::Termination);
        }
    }

    /// Block until every submitted job has been executed and reported.
    ///
    /// Termination jobs count as pending work, so after
    /// [`Spooler::end_of_transaction`] this also waits for the pool to drain.
    pub fn wait_for_upload(&self) {
        debug!("waiting for all jobs to be finished");
        let mut gate = lock_ignoring_poison(&self.shared.drain.gate);
        while self.shared.pending.load(Ordering::SeqCst) > 0 {
            gate = match self.shared.drain.all_done.wait(gate) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        drop(gate);
        debug!("all jobs are finished");
    }

    /// Jobs submitted but not yet reported.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Cumulative count of failed jobs.
    #[must_use]
    pub fn failed_jobs(&self) -> usize {
        self.shared.failed.load(Ordering::SeqCst)
    }

    /// Workers that have consumed their termination job.
    #[must_use]
    pub fn terminated_workers(&self) -> usize {
        self.shared.terminated_workers.load(Ordering::SeqCst)
    }

    /// Fixed number of worker threads serving the queue.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.worker_count
    }

    /// Definition this spooler was constructed from.
    #[must_use]
    pub fn definition(&self) -> &SpoolerDefinition {
        &self.shared.definition
    }
}

impl Drop for Spooler {
    fn drop(&mut self) {
        if !self.transaction_ended.load(Ordering::SeqCst) {
            warn!("spooler dropped with a live pool; worker threads detached");
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("spooler worker panicked before shutdown");
            }
        }
        info!("spooler backend terminated");
    }
}

fn abort_spawn(shared: &Shared, workers: Vec<JoinHandle<()>>) {
    for _ in &workers {
        shared.schedule(Job::Termination);
    }
    for handle in workers {
        if handle.join().is_err() {
            warn!("spooler worker panicked during aborted start-up");
        }
    }
}
