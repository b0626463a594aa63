//! Bounded FIFO job queue shared by producers and the worker pool.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::job::Job;

/// Queue length below which blocked producers are woken again.
const fn wake_threshold(capacity: usize) -> usize {
    capacity / 2 + 1
}

/// Monitor guarding the shared job buffer.
///
/// Producers block in [`JobQueue::push`] while the buffer is at capacity and
/// workers block in [`JobQueue::pop`] while it is empty. Jobs leave in exactly
/// the order they entered, which is what lets termination jobs drain the pool
/// only after everything submitted before them.
pub(crate) struct JobQueue {
    capacity: usize,
    buffer: Mutex<VecDeque<Job>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl JobQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Append a job, waiting while the buffer is at capacity.
    pub(crate) fn push(&self, job: Job) {
        let mut buffer = self.lock_buffer();
        while buffer.len() >= self.capacity {
            buffer = Self::wait(&self.not_full, buffer);
        }
        buffer.push_back(job);
        drop(buffer);
        self.not_empty.notify_all();
    }

    /// Remove and return the oldest job, waiting while the buffer is empty.
    pub(crate) fn pop(&self) -> Job {
        let mut buffer = self.lock_buffer();
        let job = loop {
            if let Some(job) = buffer.pop_front() {
                break job;
            }
            buffer = Self::wait(&self.not_empty, buffer);
        };

        // Wake one producer once a fair amount of space has opened up.
        if buffer.len() < wake_threshold(self.capacity) {
            self.not_full.notify_one();
        }
        drop(buffer);
        job
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn len(&self) -> usize {
        self.lock_buffer().len()
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<Job>> {
        match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn wait<'a>(
        condition: &Condvar,
        guard: MutexGuard<'a, VecDeque<Job>>,
    ) -> MutexGuard<'a, VecDeque<Job>> {
        match condition.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::CopyJob;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;
    use uuid::Uuid;

    fn copy_job(label: &str) -> Job {
        Job::Copy(CopyJob {
            id: Uuid::new_v4(),
            source: PathBuf::from(format!("/stage/{label}")),
            destination: label.to_string(),
            move_source: false,
        })
    }

    fn destination(job: &Job) -> String {
        match job {
            Job::Copy(copy) => copy.destination.clone(),
            Job::Process(_) | Job::Termination => panic!("expected a copy job"),
        }
    }

    #[test]
    fn jobs_leave_in_submission_order() {
        let queue = JobQueue::new(8);
        for label in ["first", "second", "third"] {
            queue.push(copy_job(label));
        }
        assert_eq!(destination(&queue.pop()), "first");
        assert_eq!(destination(&queue.pop()), "second");
        assert_eq!(destination(&queue.pop()), "third");
    }

    #[test]
    fn size_never_exceeds_capacity_under_concurrent_producers() {
        const CAPACITY: usize = 3;
        const PRODUCERS: usize = 4;
        const JOBS_PER_PRODUCER: usize = 25;

        let queue = Arc::new(JobQueue::new(CAPACITY));
        let mut producers = Vec::new();
        for producer in 0..PRODUCERS {
            let queue = Arc::clone(&queue);
            producers.push(thread::spawn(move || {
                for index in 0..JOBS_PER_PRODUCER {
                    queue.push(copy_job(&format!("{producer}-{index}")));
                }
            }));
        }

        for _ in 0..PRODUCERS * JOBS_PER_PRODUCER {
            assert!(queue.len() <= CAPACITY, "queue grew past its bound");
            let _ = queue.pop();
            thread::sleep(Duration::from_micros(200));
        }
        for producer in producers {
            producer.join().expect("producer should not panic");
        }
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn blocked_producer_resumes_once_the_queue_drains() {
        let queue = Arc::new(JobQueue::new(1));
        queue.push(copy_job("occupying"));

        let finished = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                queue.push(copy_job("waiting"));
                finished.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(
            !finished.load(Ordering::SeqCst),
            "producer should be parked while the queue is full"
        );

        assert_eq!(destination(&queue.pop()), "occupying");
        producer.join().expect("producer should not panic");
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(destination(&queue.pop()), "waiting");
    }
}
