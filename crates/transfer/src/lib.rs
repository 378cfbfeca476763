//! Fixed-size chunk slicing for large file uploads, plus the store that
//! receives those chunks on the other end.

mod chunked;
mod store;
mod types;
mod validation;

pub use chunked::{
    ChunkSource, FileBlob, MemoryBlob, ReadFuture, checksum_bytes, chunk_count,
    effective_chunk_size,
};
pub use store::{ChunkStore, MetaPart, UploadMeta};
pub use types::ChunkSpec;
pub use validation::validate_upload_name;

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Extra bytes a [`ChunkStore`] accepts on top of the client chunk size.
pub const CHUNK_SIZE_SLACK: usize = 512 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid upload name: {0}")]
    InvalidName(String),

    #[error("offset {offset} is past the end of a {size}-byte source")]
    OutOfRange { offset: u64, size: u64 },

    #[error("chunk of {len} bytes exceeds the {max}-byte limit")]
    ChunkTooLarge { len: usize, max: usize },

    #[error("chunk {got} arrived out of order (expected {expected})")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("no upload metadata for {0}")]
    MetaMissing(String),
}
