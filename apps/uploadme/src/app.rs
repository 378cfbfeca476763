//! Application orchestrator: wires the store, link and pool together.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use uploadme_pool::{ChunkLink, UploadError, UploadEvent, UploadOptions, UploadPool};
use uploadme_transfer::{CHUNK_SIZE_SLACK, ChunkSource, ChunkStore, FileBlob, effective_chunk_size};

use crate::config::Config;
use crate::link::StoreLink;

/// Outcome of one uploader run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub completed: usize,
    /// Includes `cancelled`.
    pub failed: usize,
    pub cancelled: usize,
    /// Files never submitted: unreadable, refused by the content filter, or
    /// sharing a name with an earlier file.
    pub skipped: usize,
}

impl Summary {
    pub fn all_ok(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

fn open_store(config: &Config) -> Arc<ChunkStore> {
    let max_chunk = effective_chunk_size(config.chunk_size) + CHUNK_SIZE_SLACK;
    Arc::new(ChunkStore::new(&config.store_dir, max_chunk))
}

/// Uploads `files` and waits for them all to finish. Ctrl-C cancels.
pub async fn run(config: Config, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("SIGINT received, cancelling uploads");
        } else {
            std::future::pending::<()>().await;
        }
    };

    let summary = upload_files(&config, files, shutdown).await?;
    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        cancelled = summary.cancelled,
        skipped = summary.skipped,
        "uploads finished"
    );

    list(&config)?;

    if !summary.all_ok() {
        anyhow::bail!(
            "{} upload(s) failed, {} file(s) skipped",
            summary.failed,
            summary.skipped
        );
    }
    Ok(())
}

/// Prints every completed upload in the store.
pub fn list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config);
    let names = store
        .completed_uploads()
        .with_context(|| format!("reading {}", store.root().display()))?;
    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// Submits every file to a fresh pool and waits until all reach a terminal
/// state, or until `shutdown` resolves and the remaining ones are cancelled.
pub async fn upload_files(
    config: &Config,
    files: Vec<PathBuf>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<Summary> {
    let link: Arc<dyn ChunkLink> = Arc::new(StoreLink::new(open_store(config)));
    upload_via(config, link, files, shutdown).await
}

async fn upload_via(
    config: &Config,
    link: Arc<dyn ChunkLink>,
    files: Vec<PathBuf>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<Summary> {
    let mut pool = UploadPool::new(config.to_pool_config(), link);
    let events = pool.take_events().context("pool events already taken")?;
    let reporter = tokio::spawn(report_events(events));

    let mut skipped = 0;
    let mut names = HashSet::new();
    for path in files {
        let blob = match FileBlob::open(&path).await {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read file");
                skipped += 1;
                continue;
            }
        };
        // Uploads are stored by file name alone.
        if !names.insert(blob.name().to_string()) {
            tracing::warn!(path = %path.display(), name = blob.name(), "duplicate file name, skipping");
            skipped += 1;
            continue;
        }
        let source: Arc<dyn ChunkSource> = Arc::new(blob);
        match pool.submit(source, UploadOptions::default()) {
            Ok(id) => tracing::debug!(%id, path = %path.display(), "submitted"),
            Err(UploadError::Unsupported(content_type)) => {
                tracing::warn!(path = %path.display(), %content_type, "file type not allowed");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tokio::select! {
        _ = pool.wait_idle() => {}
        _ = shutdown => {
            pool.cancel_token().cancel();
            pool.wait_idle().await;
        }
    }

    // The event channel closes once the pool and its workers are gone.
    drop(pool);
    let mut summary = reporter.await.context("event reporter panicked")?;
    summary.skipped = skipped;
    Ok(summary)
}

async fn report_events(mut events: mpsc::UnboundedReceiver<UploadEvent>) -> Summary {
    let cancelled = UploadError::Cancelled.to_string();
    let mut summary = Summary::default();
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Queued { id, name } => {
                tracing::info!(%id, name = %name, "waiting for a free slot");
            }
            UploadEvent::Started {
                id,
                name,
                total_chunks,
            } => {
                tracing::info!(%id, name = %name, total_chunks, "uploading");
            }
            UploadEvent::Progress { id, percent } => {
                tracing::info!(%id, "{percent:.1}%");
            }
            UploadEvent::Completed { id } => {
                tracing::info!(%id, "done");
                summary.completed += 1;
            }
            UploadEvent::Failed { id, error } if error == cancelled => {
                tracing::warn!(%id, "upload cancelled");
                summary.failed += 1;
                summary.cancelled += 1;
            }
            UploadEvent::Failed { id, error } => {
                tracing::error!(%id, error = %error, "upload failed");
                summary.failed += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use uploadme_pool::{AckFuture, SourceInfo};
    use uploadme_transfer::ChunkSpec;

    fn test_config(store_dir: PathBuf) -> Config {
        Config {
            chunk_size: 4,
            concurrency_limit: 2,
            ack_timeout_secs: 5,
            allowed_types: vec!["audio/wav".into()],
            store_dir,
        }
    }

    #[tokio::test]
    async fn uploads_files_into_store() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let config = test_config(dst.path().to_path_buf());

        let mut files = Vec::new();
        for (name, len) in [("a.wav", 10usize), ("b.wav", 4), ("c.wav", 0)] {
            let path = src.path().join(name);
            std::fs::write(&path, vec![7u8; len]).unwrap();
            files.push(path);
        }

        let summary = upload_files(&config, files, std::future::pending())
            .await
            .unwrap();
        assert_eq!(summary.completed, 3);
        assert!(summary.all_ok());

        let store = ChunkStore::new(dst.path(), 4);
        assert_eq!(
            store.completed_uploads().unwrap(),
            vec!["a.wav".to_string(), "b.wav".to_string()]
        );
        let meta = store.meta("a.wav").unwrap();
        assert_eq!(meta.part_count, 3);
        assert_eq!(meta.received_bytes(), 10);
        assert_eq!(std::fs::read(dst.path().join("a.wav.2")).unwrap(), vec![7u8; 2]);
    }

    #[tokio::test]
    async fn disallowed_and_missing_files_are_skipped() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let config = test_config(dst.path().to_path_buf());

        let png = src.path().join("cover.png");
        std::fs::write(&png, b"png").unwrap();
        let wav = src.path().join("ok.wav");
        std::fs::write(&wav, b"wave").unwrap();
        let missing = src.path().join("gone.wav");

        let summary = upload_files(&config, vec![png, missing, wav], std::future::pending())
            .await
            .unwrap();
        assert_eq!(
            summary,
            Summary {
                completed: 1,
                failed: 0,
                cancelled: 0,
                skipped: 2
            }
        );
        assert!(!summary.all_ok());
    }

    /// Acknowledges nothing, ever.
    struct StalledLink;

    impl ChunkLink for StalledLink {
        fn send_chunk<'a>(
            &'a self,
            _source: &'a SourceInfo,
            _data: &'a [u8],
            _spec: ChunkSpec,
        ) -> AckFuture<'a> {
            Box::pin(std::future::pending::<Result<bool, UploadError>>())
        }
    }

    #[tokio::test]
    async fn shutdown_cancels_remaining_uploads() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let config = Config {
            concurrency_limit: 1,
            ack_timeout_secs: 0,
            ..test_config(dst.path().to_path_buf())
        };

        let mut files = Vec::new();
        for name in ["first.wav", "second.wav"] {
            let path = src.path().join(name);
            std::fs::write(&path, vec![1u8; 64]).unwrap();
            files.push(path);
        }

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let upload = tokio::spawn(async move {
            let shutdown = async {
                let _ = stop_rx.await;
            };
            upload_via(&config, Arc::new(StalledLink), files, shutdown).await
        });
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
        stop_tx.send(()).unwrap();

        let summary = tokio::time::timeout(std::time::Duration::from_secs(5), upload)
            .await
            .expect("shutdown did not cancel the stalled uploads")
            .unwrap()
            .unwrap();
        assert_eq!(
            summary,
            Summary {
                completed: 0,
                failed: 2,
                cancelled: 2,
                skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn same_file_name_is_uploaded_once() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let config = test_config(dst.path().to_path_buf());

        let mut files = Vec::new();
        for (dir, byte) in [("d1", b'A'), ("d2", b'B')] {
            let dir = src.path().join(dir);
            std::fs::create_dir(&dir).unwrap();
            let path = dir.join("a.wav");
            std::fs::write(&path, vec![byte; 40]).unwrap();
            files.push(path);
        }

        let summary = upload_files(&config, files, std::future::pending())
            .await
            .unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 1);

        let store = ChunkStore::new(dst.path(), 4);
        assert_eq!(store.completed_uploads().unwrap(), vec!["a.wav".to_string()]);
        for index in 0..10 {
            let part = std::fs::read(dst.path().join(format!("a.wav.{index}"))).unwrap();
            assert_eq!(part, vec![b'A'; 4], "part {index}");
        }
    }

    #[test]
    fn list_on_empty_store() {
        let dst = tempfile::tempdir().unwrap();
        let config = test_config(dst.path().join("never-created"));
        list(&config).unwrap();
    }
}
