//! Per-file upload session.
//!
//! A session walks its source front to back: read a chunk, hand it to the
//! link, wait for the acknowledgment, advance. At most one chunk per file is
//! ever outstanding.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uploadme_transfer::{ChunkSource, ChunkSpec, TransferError, effective_chunk_size};

use crate::error::UploadError;
use crate::link::{ChunkLink, SourceInfo};
use crate::types::{SessionId, SessionState, UploadEvent};

/// Drives one file's chunks from the first read to a terminal state.
pub struct TransferSession {
    info: SourceInfo,
    source: Arc<dyn ChunkSource>,
    chunk_size: usize,
    cursor: u64,
    spec: ChunkSpec,
    state: SessionState,
}

impl TransferSession {
    /// Creates an idle session. A `chunk_size` of 0 selects the default.
    pub fn new(
        id: SessionId,
        source: Arc<dyn ChunkSource>,
        content_type: String,
        chunk_size: usize,
    ) -> Self {
        let chunk_size = effective_chunk_size(chunk_size);
        let size = source.size();
        Self {
            info: SourceInfo {
                id,
                name: source.name().to_string(),
                size,
                content_type,
            },
            source,
            chunk_size,
            cursor: 0,
            spec: ChunkSpec::first(size, chunk_size),
            state: SessionState::Idle,
        }
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes acknowledged so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Spec of the current (or last) chunk.
    pub fn spec(&self) -> ChunkSpec {
        self.spec
    }

    /// Runs the session to completion.
    ///
    /// Emits one [`UploadEvent::Progress`] per acknowledged chunk. Sending
    /// the terminal event is up to the caller.
    ///
    /// `cancel` and `ack_timeout` are checked at each suspension point.
    pub async fn run(
        &mut self,
        link: &dyn ChunkLink,
        events: &UnboundedSender<UploadEvent>,
        cancel: &CancellationToken,
        ack_timeout: Option<Duration>,
    ) -> Result<(), UploadError> {
        debug_assert_eq!(self.state, SessionState::Idle, "session run twice");

        let result = self.drive(link, events, cancel, ack_timeout).await;
        self.set_state(if result.is_ok() {
            SessionState::Completed
        } else {
            SessionState::Failed
        });
        result
    }

    async fn drive(
        &mut self,
        link: &dyn ChunkLink,
        events: &UnboundedSender<UploadEvent>,
        cancel: &CancellationToken,
        ack_timeout: Option<Duration>,
    ) -> Result<(), UploadError> {
        self.cursor = 0;
        self.spec = ChunkSpec::first(self.info.size, self.chunk_size);

        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        if self.info.size == 0 {
            return Ok(());
        }

        loop {
            self.set_state(SessionState::Reading);
            let data = self.read_chunk(cancel).await?;

            self.set_state(SessionState::AwaitingAck);
            self.await_ack(link, &data, cancel, ack_timeout).await?;

            self.cursor += data.len() as u64;
            debug!(
                id = %self.info.id,
                index = self.spec.index,
                total = self.spec.total,
                len = data.len(),
                cursor = self.cursor,
                "chunk acknowledged"
            );
            let _ = events.send(UploadEvent::Progress {
                id: self.info.id,
                percent: self.spec.percent(),
            });

            if self.cursor >= self.info.size {
                return Ok(());
            }
            self.spec.index += 1;
        }
    }

    async fn read_chunk(&self, cancel: &CancellationToken) -> Result<Vec<u8>, UploadError> {
        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            read = self.source.slice(self.cursor, self.chunk_size) => read?,
        };

        if data.is_empty() {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended at byte {} of {}",
                    self.cursor, self.info.size
                ),
            ))
            .into());
        }
        Ok(data)
    }

    async fn await_ack(
        &self,
        link: &dyn ChunkLink,
        data: &[u8],
        cancel: &CancellationToken,
        ack_timeout: Option<Duration>,
    ) -> Result<(), UploadError> {
        let index = self.spec.index;
        let send = link.send_chunk(&self.info, data, self.spec);
        let bounded = async {
            match ack_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, send).await {
                    Ok(acked) => acked,
                    Err(_) => Err(UploadError::AckTimeout { index, timeout }),
                },
                None => send.await,
            }
        };

        let acked = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            acked = bounded => acked?,
        };

        if acked {
            Ok(())
        } else {
            Err(UploadError::AckRejected { index })
        }
    }

    fn set_state(&mut self, state: SessionState) {
        trace!(id = %self.info.id, from = ?self.state, to = ?state, "session state");
        self.state = state;
    }
}
