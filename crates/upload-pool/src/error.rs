//! Upload error types.

use std::time::Duration;

use uploadme_transfer::TransferError;

/// Errors that end an upload.
///
/// Every variant except [`Unsupported`](Self::Unsupported) is terminal for a
/// running session and is reported through [`UploadEvent::Failed`](crate::UploadEvent::Failed).
/// None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("read error: {0}")]
    Read(#[from] TransferError),

    #[error("chunk {index} rejected")]
    AckRejected { index: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("chunk {index} not acknowledged within {timeout:?}")]
    AckTimeout { index: u64, timeout: Duration },

    #[error("unsupported content type: {0}")]
    Unsupported(String),

    #[error("cancelled")]
    Cancelled,
}
