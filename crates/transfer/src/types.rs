use serde::{Deserialize, Serialize};

use crate::chunked::chunk_count;

/// Position of one chunk within its upload.
///
/// `size` is the byte length of the whole source, not of the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSpec {
    /// Zero-based chunk index.
    pub index: u64,
    /// Number of chunks in the upload: `ceil(size / chunk_size)`.
    pub total: u64,
    /// Total source size in bytes.
    pub size: u64,
}

impl ChunkSpec {
    /// Creates the spec for the first chunk of a `size`-byte source.
    pub fn first(size: u64, chunk_size: usize) -> Self {
        Self {
            index: 0,
            total: chunk_count(size, chunk_size),
            size,
        }
    }

    /// Percentage of the upload done once this chunk is acknowledged.
    ///
    /// An upload with no chunks counts as fully done.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.index + 1) as f64 * 100.0 / self.total as f64
    }
}
