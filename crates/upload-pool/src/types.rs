//! Data types shared by sessions and the pool.

use std::fmt;
use std::time::Duration;

use uploadme_transfer::DEFAULT_CHUNK_SIZE;

use crate::{DEFAULT_ACK_TIMEOUT, DEFAULT_CONCURRENCY_LIMIT};

/// Identifier of one accepted submission, unique within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upload-{}", self.0)
    }
}

/// Lifecycle of a [`TransferSession`](crate::TransferSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Reading,
    AwaitingAck,
    Completed,
    Failed,
}

impl SessionState {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Per-file options supplied at submission.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Overrides the pool chunk size for this file.
    pub chunk_size: Option<usize>,
    /// MIME type of the file. Detected from the name when absent.
    pub content_type: Option<String>,
}

/// Pool construction parameters.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Bytes per chunk.
    pub chunk_size: usize,
    /// Maximum number of files uploading simultaneously.
    pub concurrency_limit: usize,
    /// Longest wait for a single chunk acknowledgment. `None` waits forever.
    pub ack_timeout: Option<Duration>,
    /// Accepted MIME types. Empty accepts everything.
    pub allowed_content_types: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            ack_timeout: Some(DEFAULT_ACK_TIMEOUT),
            allowed_content_types: Vec::new(),
        }
    }
}

/// Notification emitted while uploads progress.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// No slot was free; the file waits in the queue.
    Queued { id: SessionId, name: String },
    /// The session took a slot and begins reading.
    Started {
        id: SessionId,
        name: String,
        total_chunks: u64,
    },
    /// A chunk was acknowledged.
    Progress { id: SessionId, percent: f64 },
    /// All chunks were acknowledged.
    Completed { id: SessionId },
    /// The session ended early.
    Failed { id: SessionId, error: String },
}

impl UploadEvent {
    /// The session this event belongs to.
    pub fn id(&self) -> SessionId {
        match self {
            Self::Queued { id, .. }
            | Self::Started { id, .. }
            | Self::Progress { id, .. }
            | Self::Completed { id }
            | Self::Failed { id, .. } => *id,
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
