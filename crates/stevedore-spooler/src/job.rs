//! Units of work flowing through the job queue.

use std::path::PathBuf;

use uuid::Uuid;

use crate::backend::ContentDigest;

/// Payload of a verbatim copy into the backend.
#[derive(Debug, Clone)]
pub struct CopyJob {
    /// Identifier used in log output and staging-file names.
    pub id: Uuid,
    /// Local file to upload.
    pub source: PathBuf,
    /// Backend object path receiving the copy.
    pub destination: String,
    /// Remove the source file after a successful store.
    pub move_source: bool,
}

/// Payload of a compress-and-content-address upload.
#[derive(Debug, Clone)]
pub struct ProcessJob {
    /// Identifier used in log output and staging-file names.
    pub id: Uuid,
    /// Local file to compress and store.
    pub source: PathBuf,
    /// Backend directory receiving the content-addressed object.
    pub target_dir: String,
    /// Suffix appended to the stored object name.
    pub suffix: String,
    /// Remove the source file after a successful store.
    pub move_source: bool,
}

/// A unit of submitted work.
///
/// A job is created by a submission call, enqueued exactly once, executed by
/// exactly one worker and never re-enqueued; its outcome travels to the
/// dispatcher as a separate [`JobOutcome`] value.
#[derive(Debug)]
pub enum Job {
    /// Verbatim copy of a local file into the backend.
    Copy(CopyJob),
    /// Compress, content-address and store a local file.
    Process(ProcessJob),
    /// Control signal instructing exactly one worker to exit its loop.
    Termination,
}

impl Job {
    /// Human-readable identity for log output.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Copy(job) => format!("copy {} -> {}", job.source.display(), job.destination),
            Self::Process(job) => {
                format!("process {} -> {}", job.source.display(), job.target_dir)
            }
            Self::Termination => "terminate worker".to_string(),
        }
    }
}

/// Outcome of one executed job, produced by the worker that ran it.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Backend status code; zero on success.
    pub code: i32,
    /// Digest of the stored object; present for successful process jobs.
    pub digest: Option<ContentDigest>,
}

impl JobOutcome {
    /// Successful outcome, optionally carrying a content digest.
    #[must_use]
    pub const fn success(digest: Option<ContentDigest>) -> Self {
        Self { code: 0, digest }
    }

    /// Failed outcome carrying the backend's nonzero status code.
    #[must_use]
    pub const fn failure(code: i32) -> Self {
        Self { code, digest: None }
    }

    /// Whether the backend reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_names_the_operation_and_paths() {
        let job = Job::Copy(CopyJob {
            id: Uuid::new_v4(),
            source: PathBuf::from("/stage/a"),
            destination: "published/a".to_string(),
            move_source: false,
        });
        assert_eq!(job.describe(), "copy /stage/a -> published/a");
        assert_eq!(Job::Termination.describe(), "terminate worker");
    }

    #[test]
    fn outcome_constructors_fix_the_success_flag() {
        assert!(JobOutcome::success(None).is_success());
        let failed = JobOutcome::failure(13);
        assert!(!failed.is_success());
        assert_eq!(failed.code, 13);
        assert!(failed.digest.is_none());
    }
}
