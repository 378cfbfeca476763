//! Chunked upload engine with admission control.
//!
//! Each submitted file becomes a [`TransferSession`] that reads one chunk,
//! hands it to a [`ChunkLink`] and waits for the acknowledgment before
//! reading the next. An [`UploadPool`] bounds how many sessions run at once
//! and starts queued files in submission order as slots free up.
//!
//! The crate has no transport of its own: callers supply the `ChunkLink`.

pub mod error;
pub mod filter;
pub mod link;
pub mod pool;
pub mod session;
pub mod types;

use std::time::Duration;

pub use error::UploadError;
pub use filter::{ContentFilter, detect_content_type};
pub use link::{AckFuture, ChunkLink, SourceInfo};
pub use pool::UploadPool;
pub use session::TransferSession;
pub use types::{PoolConfig, SessionId, SessionState, UploadEvent, UploadOptions};

/// Default number of files uploading at the same time.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Default time a link may take to acknowledge one chunk.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);
