//! Bounded worker pool for upload sessions.
//!
//! At most `concurrency_limit` sessions run at once. Further submissions
//! wait in a FIFO queue; when a session ends, its worker takes the head of
//! the queue instead of giving the slot back.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uploadme_transfer::ChunkSource;

use crate::error::UploadError;
use crate::filter::{ContentFilter, detect_content_type};
use crate::link::ChunkLink;
use crate::session::TransferSession;
use crate::types::{PoolConfig, SessionId, UploadEvent, UploadOptions};

/// A submission waiting for a slot.
struct Job {
    id: SessionId,
    source: Arc<dyn ChunkSource>,
    content_type: String,
    chunk_size: usize,
}

struct PoolState {
    active: usize,
    queue: VecDeque<Job>,
}

struct PoolInner {
    config: PoolConfig,
    filter: ContentFilter,
    link: Arc<dyn ChunkLink>,
    state: Mutex<PoolState>,
    next_id: AtomicU64,
    events_tx: mpsc::UnboundedSender<UploadEvent>,
    idle: Notify,
    cancel: CancellationToken,
}

/// Admission controller for chunked uploads.
///
/// Must be used from within a tokio runtime: admitted sessions run on
/// spawned tasks.
pub struct UploadPool {
    inner: Arc<PoolInner>,
    events_rx: Option<mpsc::UnboundedReceiver<UploadEvent>>,
}

impl UploadPool {
    /// Creates a pool that sends chunks through `link`.
    ///
    /// A `concurrency_limit` of 0 is raised to 1.
    pub fn new(mut config: PoolConfig, link: Arc<dyn ChunkLink>) -> Self {
        if config.concurrency_limit == 0 {
            warn!("concurrency limit 0 would never admit a file; using 1");
            config.concurrency_limit = 1;
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let filter = ContentFilter::new(&config.allowed_content_types);

        Self {
            inner: Arc::new(PoolInner {
                config,
                filter,
                link,
                state: Mutex::new(PoolState {
                    active: 0,
                    queue: VecDeque::new(),
                }),
                next_id: AtomicU64::new(1),
                events_tx,
                idle: Notify::new(),
                cancel: CancellationToken::new(),
            }),
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Token that cancels every running and queued session when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Maximum number of sessions running at once.
    pub fn limit(&self) -> usize {
        self.inner.config.concurrency_limit
    }

    /// Number of sessions currently holding a slot.
    pub fn active_count(&self) -> usize {
        self.inner.lock_state().active
    }

    /// Number of submissions waiting for a slot.
    pub fn queued_count(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Returns `true` when nothing is running or queued.
    pub fn is_idle(&self) -> bool {
        self.inner.lock_state().is_idle()
    }

    /// Waits until every submitted file has reached a terminal state.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Submits a file for upload.
    ///
    /// Starts it right away when a slot is free, otherwise queues it behind
    /// earlier submissions. Files whose content type is not allowed are
    /// rejected here and never take a slot.
    pub fn submit(
        &self,
        source: Arc<dyn ChunkSource>,
        options: UploadOptions,
    ) -> Result<SessionId, UploadError> {
        let content_type = options
            .content_type
            .unwrap_or_else(|| detect_content_type(source.name()).to_string());

        if let Err(e) = self.inner.filter.check(&content_type) {
            warn!(name = source.name(), content_type = %content_type, "upload ignored");
            return Err(e);
        }

        let id = SessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let name = source.name().to_string();
        let job = Job {
            id,
            source,
            content_type,
            chunk_size: options.chunk_size.unwrap_or(self.inner.config.chunk_size),
        };

        let admitted = {
            let mut state = self.inner.lock_state();
            if state.active < self.inner.config.concurrency_limit {
                state.active += 1;
                Some(job)
            } else {
                state.queue.push_back(job);
                None
            }
        };

        match admitted {
            Some(job) => {
                debug!(%id, name = %name, "slot free, starting");
                tokio::spawn(run_worker(Arc::clone(&self.inner), job));
            }
            None => {
                debug!(%id, name = %name, "pool full, queued");
                let _ = self.inner.events_tx.send(UploadEvent::Queued { id, name });
            }
        }

        Ok(id)
    }
}

impl PoolState {
    fn is_idle(&self) -> bool {
        self.active == 0 && self.queue.is_empty()
    }
}

impl PoolInner {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Frees the slot held by a finished session, or hands it straight to
    /// the oldest queued job.
    fn finish_slot(&self) -> Option<Job> {
        let mut state = self.lock_state();
        match state.queue.pop_front() {
            Some(next) => Some(next),
            None => {
                state.active -= 1;
                if state.is_idle() {
                    self.idle.notify_waiters();
                }
                None
            }
        }
    }

    /// Runs one job and emits its single terminal event.
    async fn run_job(&self, job: Job) {
        let Job {
            id,
            source,
            content_type,
            chunk_size,
        } = job;

        let mut session = TransferSession::new(id, source, content_type, chunk_size);
        let name = session.info().name.clone();
        let _ = self.events_tx.send(UploadEvent::Started {
            id,
            name: name.clone(),
            total_chunks: session.spec().total,
        });
        info!(%id, name = %name, size = session.info().size, "upload started");

        let run = session.run(
            self.link.as_ref(),
            &self.events_tx,
            &self.cancel,
            self.config.ack_timeout,
        );
        let result = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(UploadError::Transport("chunk link panicked".into())),
        };

        match result {
            Ok(()) => {
                info!(%id, name = %name, "upload completed");
                let _ = self.events_tx.send(UploadEvent::Completed { id });
            }
            Err(e) => {
                warn!(%id, name = %name, error = %e, "upload failed");
                let _ = self.events_tx.send(UploadEvent::Failed {
                    id,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Runs jobs on one slot until the queue is empty.
async fn run_worker(inner: Arc<PoolInner>, mut job: Job) {
    loop {
        inner.run_job(job).await;
        match inner.finish_slot() {
            Some(next) => {
                debug!(id = %next.id, "promoting queued upload");
                job = next;
            }
            None => break,
        }
    }
}
