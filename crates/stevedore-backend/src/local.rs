//! Local-filesystem storage driver.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::debug;

use stevedore_spooler::{
    BackendError, BackendResult, ContentDigest, CopyJob, ProcessJob, StorageBackend,
};

use crate::codec;

/// Stores objects under a root directory on the local filesystem.
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Build a driver rooted at the directory named by `description`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidDescription`] when the description is
    /// empty.
    pub fn new(description: &str) -> BackendResult<Self> {
        if description.trim().is_empty() {
            return Err(BackendError::InvalidDescription {
                reason: "storage root cannot be empty",
                value: description.to_string(),
            });
        }
        Ok(Self {
            root: PathBuf::from(description),
        })
    }

    /// Whether an object already exists at `path` under the storage root.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }

    fn prepare_parent(target: &Path) -> BackendResult<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| BackendError::io("local.create_parent", parent, error))?;
        }
        Ok(())
    }

    fn remove_source(source: &Path) -> BackendResult<()> {
        fs::remove_file(source)
            .map_err(|error| BackendError::io("local.remove_source", source, error))
    }
}

impl StorageBackend for LocalBackend {
    fn kind_name(&self) -> &'static str {
        "local"
    }

    fn copy(&self, job: &CopyJob) -> BackendResult<()> {
        let destination = self.root.join(&job.destination);
        Self::prepare_parent(&destination)?;

        if job.move_source {
            // Rename when source and store share a filesystem, otherwise fall
            // back to copy-then-remove.
            if fs::rename(&job.source, &destination).is_ok() {
                return Ok(());
            }
            fs::copy(&job.source, &destination)
                .map_err(|error| BackendError::io("local.copy", &destination, error))?;
            return Self::remove_source(&job.source);
        }

        fs::copy(&job.source, &destination)
            .map_err(|error| BackendError::io("local.copy", &destination, error))?;
        Ok(())
    }

    fn process(&self, job: &ProcessJob) -> BackendResult<ContentDigest> {
        let target_dir = self.root.join(&job.target_dir);
        fs::create_dir_all(&target_dir)
            .map_err(|error| BackendError::io("local.create_target_dir", &target_dir, error))?;

        // Compress into a staging file first; the object only appears under
        // its content-addressed name once the stream is complete.
        let staging = target_dir.join(format!(".upload.{}", job.id));
        let output = File::create(&staging)
            .map_err(|error| BackendError::io("local.create_staging", &staging, error))?;
        let digest = match codec::compress_file_into(&job.source, output) {
            Ok((_, digest)) => digest,
            Err(error) => {
                let _ = fs::remove_file(&staging);
                return Err(error);
            }
        };

        let object = target_dir.join(digest.object_path(&job.suffix));
        if let Err(error) = Self::prepare_parent(&object) {
            let _ = fs::remove_file(&staging);
            return Err(error);
        }
        if let Err(error) = fs::rename(&staging, &object) {
            let _ = fs::remove_file(&staging);
            return Err(BackendError::io("local.place_object", &object, error));
        }

        if job.move_source {
            Self::remove_source(&job.source)?;
        }

        debug!(object = %object.display(), "stored content-addressed object");
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use flate2::read::ZlibDecoder;
    use std::io::Read;
    use uuid::Uuid;

    fn copy_job(source: &Path, destination: &str, move_source: bool) -> CopyJob {
        CopyJob {
            id: Uuid::new_v4(),
            source: source.to_path_buf(),
            destination: destination.to_string(),
            move_source,
        }
    }

    fn process_job(source: &Path, target_dir: &str, suffix: &str) -> ProcessJob {
        ProcessJob {
            id: Uuid::new_v4(),
            source: source.to_path_buf(),
            target_dir: target_dir.to_string(),
            suffix: suffix.to_string(),
            move_source: false,
        }
    }

    #[test]
    fn copy_places_the_bytes_and_keeps_the_source() -> Result<()> {
        let store = tempfile::tempdir()?;
        let stage = tempfile::tempdir()?;
        let source = stage.path().join("a.bin");
        fs::write(&source, b"copied bytes")?;

        let backend = LocalBackend::new(&store.path().display().to_string())?;
        backend.copy(&copy_job(&source, "published/a/a.bin", false))?;

        let stored = fs::read(store.path().join("published/a/a.bin"))?;
        assert_eq!(stored, b"copied bytes");
        assert!(source.exists());
        Ok(())
    }

    #[test]
    fn move_semantics_remove_the_source() -> Result<()> {
        let store = tempfile::tempdir()?;
        let stage = tempfile::tempdir()?;
        let source = stage.path().join("b.bin");
        fs::write(&source, b"moved bytes")?;

        let backend = LocalBackend::new(&store.path().display().to_string())?;
        backend.copy(&copy_job(&source, "published/b.bin", true))?;

        assert_eq!(fs::read(store.path().join("published/b.bin"))?, b"moved bytes");
        assert!(!source.exists());
        Ok(())
    }

    #[test]
    fn process_stores_a_content_addressed_object() -> Result<()> {
        let store = tempfile::tempdir()?;
        let stage = tempfile::tempdir()?;
        let source = stage.path().join("payload");
        fs::write(&source, b"compress and address me")?;

        let backend = LocalBackend::new(&store.path().display().to_string())?;
        let digest = backend.process(&process_job(&source, "objects", ".data"))?;

        let object = store
            .path()
            .join("objects")
            .join(digest.object_path(".data"));
        assert!(object.exists(), "object should sit at its digest path");

        let mut decoded = Vec::new();
        ZlibDecoder::new(fs::read(&object)?.as_slice()).read_to_end(&mut decoded)?;
        assert_eq!(decoded, b"compress and address me");

        let leftovers: Vec<_> = fs::read_dir(store.path().join("objects"))?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".upload."))
            .collect();
        assert!(leftovers.is_empty(), "staging files must not survive");
        Ok(())
    }

    #[test]
    fn identical_content_yields_identical_digests() -> Result<()> {
        let store = tempfile::tempdir()?;
        let stage = tempfile::tempdir()?;
        let first = stage.path().join("one");
        let second = stage.path().join("two");
        fs::write(&first, b"same bytes")?;
        fs::write(&second, b"same bytes")?;

        let backend = LocalBackend::new(&store.path().display().to_string())?;
        let digest_one = backend.process(&process_job(&first, "objects", ""))?;
        let digest_two = backend.process(&process_job(&second, "objects", ""))?;
        assert_eq!(digest_one, digest_two);
        Ok(())
    }

    #[test]
    fn process_failure_surfaces_a_nonzero_code() -> Result<()> {
        let store = tempfile::tempdir()?;
        let backend = LocalBackend::new(&store.path().display().to_string())?;
        let missing = store.path().join("missing-source");

        let error = backend
            .process(&process_job(&missing, "objects", ".data"))
            .expect_err("missing source must fail");
        assert_ne!(error.return_code(), 0);
        Ok(())
    }

    #[test]
    fn contains_answers_for_present_and_absent_objects() -> Result<()> {
        let store = tempfile::tempdir()?;
        fs::create_dir_all(store.path().join("published"))?;
        fs::write(store.path().join("published/here"), b"x")?;

        let backend = LocalBackend::new(&store.path().display().to_string())?;
        assert!(backend.contains("published/here"));
        assert!(!backend.contains("published/elsewhere"));
        Ok(())
    }

    #[test]
    fn empty_description_is_rejected() {
        let error = LocalBackend::new("  ").expect_err("blank root must fail");
        assert!(matches!(error, BackendError::InvalidDescription { .. }));
    }
}
