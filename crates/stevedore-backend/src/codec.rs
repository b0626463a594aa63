//! Zlib + SHA-256 pipeline shared by the storage drivers.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use sha2::{Digest, Sha256};
use stevedore_spooler::{BackendError, BackendResult, ContentDigest};

/// Writer adaptor hashing every byte it forwards.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> (W, ContentDigest) {
        (self.inner, ContentDigest::new(self.hasher.finalize().into()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Compress `source` into `output`, returning the writer together with the
/// digest of the compressed byte stream.
pub(crate) fn compress_file_into<W: Write>(
    source: &Path,
    output: W,
) -> BackendResult<(W, ContentDigest)> {
    let mut input =
        File::open(source).map_err(|error| BackendError::io("codec.open_source", source, error))?;
    let mut encoder = ZlibEncoder::new(HashingWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)
        .map_err(|error| BackendError::io("codec.compress", source, error))?;
    let writer = encoder
        .finish()
        .map_err(|error| BackendError::io("codec.finish", source, error))?;
    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn compressed_stream_round_trips_and_digest_covers_it() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("payload");
        std::fs::write(&source, b"stevedore codec payload")?;

        let (compressed, digest) = compress_file_into(&source, Vec::new())?;

        let mut decoded = Vec::new();
        ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut decoded)?;
        assert_eq!(decoded, b"stevedore codec payload");

        let independent = ContentDigest::new(Sha256::digest(&compressed).into());
        assert_eq!(digest, independent);
        Ok(())
    }

    #[test]
    fn missing_source_reports_an_io_failure() {
        let error = compress_file_into(Path::new("/definitely/missing"), Vec::new())
            .expect_err("missing source must fail");
        assert!(matches!(error, BackendError::Io { .. }));
        assert_ne!(error.return_code(), 0);
    }
}
