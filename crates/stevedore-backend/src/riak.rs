//! Riak-style HTTP key-value storage driver.

use std::fs;
use std::path::Path;

use reqwest::Url;
use reqwest::blocking::Client;
use tracing::debug;

use stevedore_spooler::{
    BackendError, BackendResult, ContentDigest, CopyJob, ProcessJob, StorageBackend,
};

use crate::codec;

/// Stores objects as values in a Riak-style key-value store.
///
/// The driver description is the base URL of the bucket; object paths become
/// percent-encoded key segments beneath it. Requests carry no deadline; a
/// wedged store blocks its worker, like every other backend call.
#[derive(Debug)]
pub struct RiakBackend {
    base: Url,
    client: Client,
}

impl RiakBackend {
    /// Build a driver storing objects under the base URL in `description`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidDescription`] when the description is
    /// not an absolute `http`/`https` URL, and [`BackendError::Remote`] when
    /// the HTTP client cannot be initialised.
    pub fn new(description: &str) -> BackendResult<Self> {
        let base = Url::parse(description).map_err(|error| BackendError::InvalidDescription {
            reason: "upstream is not a valid URL",
            value: format!("{description}: {error}"),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(BackendError::InvalidDescription {
                reason: "upstream URL must use http or https",
                value: description.to_string(),
            });
        }
        let client = Client::builder()
            .build()
            .map_err(|error| BackendError::Remote {
                operation: "riak.client",
                endpoint: description.to_string(),
                status: None,
                detail: error.to_string(),
            })?;
        Ok(Self { base, client })
    }

    fn object_url(&self, key: &str) -> BackendResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments =
                url.path_segments_mut()
                    .map_err(|()| BackendError::InvalidDescription {
                        reason: "upstream URL cannot carry object keys",
                        value: self.base.to_string(),
                    })?;
            segments.pop_if_empty();
            segments.extend(key.split('/').filter(|segment| !segment.is_empty()));
        }
        Ok(url)
    }

    fn put(&self, operation: &'static str, key: &str, body: Vec<u8>) -> BackendResult<()> {
        let url = self.object_url(key)?;
        debug!(endpoint = %url, bytes = body.len(), "storing object in key-value store");
        let response = self
            .client
            .put(url.clone())
            .body(body)
            .send()
            .map_err(|error| BackendError::Remote {
                operation,
                endpoint: url.to_string(),
                status: error.status().map(|status| status.as_u16()),
                detail: error.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(BackendError::Remote {
            operation,
            endpoint: url.to_string(),
            status: Some(status.as_u16()),
            detail: status
                .canonical_reason()
                .unwrap_or("request rejected")
                .to_string(),
        })
    }

    fn remove_source(source: &Path) -> BackendResult<()> {
        fs::remove_file(source)
            .map_err(|error| BackendError::io("riak.remove_source", source, error))
    }
}

impl StorageBackend for RiakBackend {
    fn kind_name(&self) -> &'static str {
        "riak"
    }

    fn copy(&self, job: &CopyJob) -> BackendResult<()> {
        let bytes = fs::read(&job.source)
            .map_err(|error| BackendError::io("riak.read_source", &job.source, error))?;
        self.put("riak.copy", &job.destination, bytes)?;
        if job.move_source {
            Self::remove_source(&job.source)?;
        }
        Ok(())
    }

    fn process(&self, job: &ProcessJob) -> BackendResult<ContentDigest> {
        let (compressed, digest) = codec::compress_file_into(&job.source, Vec::new())?;
        let key = format!(
            "{}/{}",
            job.target_dir.trim_end_matches('/'),
            digest.object_path(&job.suffix)
        );
        self.put("riak.process", &key, compressed)?;
        if job.move_source {
            Self::remove_source(&job.source)?;
        }
        Ok(digest)
    }
}
