use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::trace;

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Future returned by [`ChunkSource::slice`].
pub type ReadFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Chunk arithmetic
// ---------------------------------------------------------------------------

/// Replaces a zero chunk size with [`DEFAULT_CHUNK_SIZE`].
pub fn effective_chunk_size(chunk_size: usize) -> usize {
    if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    }
}

/// Number of chunks needed to cover `size` bytes: `ceil(size / chunk_size)`.
pub fn chunk_count(size: u64, chunk_size: usize) -> u64 {
    size.div_ceil(effective_chunk_size(chunk_size) as u64)
}

/// Clips `[offset, offset + len)` to a `size`-byte source.
fn clip(offset: u64, len: usize, size: u64) -> Result<usize, TransferError> {
    if offset > size {
        return Err(TransferError::OutOfRange { offset, size });
    }
    let end = offset.saturating_add(len as u64).min(size);
    Ok((end - offset) as usize)
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// ChunkSource
// ---------------------------------------------------------------------------

/// An immutable byte source of known length that can be read in sub-ranges.
///
/// Sources do not buffer: every call to [`slice`](Self::slice) reads the
/// requested range afresh.
pub trait ChunkSource: Send + Sync {
    /// Display name of the source (usually the file name).
    fn name(&self) -> &str;

    /// Total length in bytes.
    fn size(&self) -> u64;

    /// Reads `[offset, min(offset + len, size))`.
    ///
    /// An offset equal to `size` yields an empty buffer; anything beyond it
    /// is [`TransferError::OutOfRange`].
    fn slice(&self, offset: u64, len: usize) -> ReadFuture<'_>;
}

/// A source backed by shared in-memory bytes.
#[derive(Debug, Clone)]
pub struct MemoryBlob {
    name: String,
    data: Arc<[u8]>,
}

impl MemoryBlob {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ChunkSource for MemoryBlob {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn slice(&self, offset: u64, len: usize) -> ReadFuture<'_> {
        Box::pin(async move {
            let n = clip(offset, len, self.size())?;
            let start = offset as usize;
            Ok(self.data[start..start + n].to_vec())
        })
    }
}

/// A source backed by a file on disk.
///
/// The size is captured when the blob is opened; the file must not change
/// while an upload is running.
#[derive(Debug, Clone)]
pub struct FileBlob {
    name: String,
    path: PathBuf,
    size: u64,
}

impl FileBlob {
    /// Opens `path` and records its current size.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self {
            name,
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }
}

impl ChunkSource for FileBlob {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn slice(&self, offset: u64, len: usize) -> ReadFuture<'_> {
        Box::pin(async move {
            let n = clip(offset, len, self.size)?;
            let mut buf = vec![0u8; n];
            if n == 0 {
                return Ok(buf);
            }

            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut buf).await?;

            trace!(path = %self.path.display(), offset, len = n, "read slice");
            Ok(buf)
        })
    }
}
