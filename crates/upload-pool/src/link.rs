//! Transport seam between sessions and whatever carries chunks.
//!
//! Callers implement [`ChunkLink`] on top of their actual transport (an
//! HTTP client, a socket, a local store). Keeping it a trait keeps the
//! session logic testable with mocks.

use std::future::Future;
use std::pin::Pin;

use uploadme_transfer::ChunkSpec;

use crate::error::UploadError;
use crate::types::SessionId;

/// Describes the file a chunk belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub id: SessionId,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

/// Future returned by [`ChunkLink::send_chunk`].
pub type AckFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, UploadError>> + Send + 'a>>;

/// Delivers chunks and reports whether each one was accepted.
pub trait ChunkLink: Send + Sync {
    /// Sends one chunk.
    ///
    /// Resolves `Ok(true)` when the receiver acknowledged the chunk,
    /// `Ok(false)` when it rejected it, and `Err` when the exchange itself
    /// failed. The session never retries either way.
    fn send_chunk<'a>(
        &'a self,
        source: &'a SourceInfo,
        data: &'a [u8],
        spec: ChunkSpec,
    ) -> AckFuture<'a>;
}
