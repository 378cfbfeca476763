//! [`ChunkLink`] that delivers chunks into a local [`ChunkStore`].

use std::sync::Arc;

use uploadme_pool::{AckFuture, ChunkLink, SourceInfo, UploadError};
use uploadme_transfer::{ChunkSpec, ChunkStore};

/// Acknowledges a chunk once the store has written it.
pub struct StoreLink {
    store: Arc<ChunkStore>,
}

impl StoreLink {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self { store }
    }
}

impl ChunkLink for StoreLink {
    fn send_chunk<'a>(
        &'a self,
        source: &'a SourceInfo,
        data: &'a [u8],
        spec: ChunkSpec,
    ) -> AckFuture<'a> {
        Box::pin(async move {
            let store = Arc::clone(&self.store);
            let name = source.name.clone();
            let data = data.to_vec();

            let written =
                tokio::task::spawn_blocking(move || store.accept_chunk(&name, spec, &data))
                    .await
                    .map_err(|e| UploadError::Transport(format!("store task failed: {e}")))?;

            match written {
                Ok(meta) => {
                    tracing::debug!(
                        id = %source.id,
                        index = spec.index,
                        received = meta.received_bytes(),
                        "chunk stored"
                    );
                    Ok(true)
                }
                Err(e) => {
                    tracing::warn!(id = %source.id, index = spec.index, error = %e, "chunk refused");
                    Ok(false)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uploadme_pool::SessionId;

    fn info(name: &str, size: u64) -> SourceInfo {
        SourceInfo {
            id: SessionId(1),
            name: name.into(),
            size,
            content_type: "audio/wav".into(),
        }
    }

    #[tokio::test]
    async fn stores_sequential_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(ChunkStore::new(tmp.path(), 16));
        let link = StoreLink::new(Arc::clone(&store));
        let source = info("take.wav", 6);

        let mut spec = ChunkSpec::first(6, 4);
        assert!(link.send_chunk(&source, b"abcd", spec).await.unwrap());
        spec.index = 1;
        assert!(link.send_chunk(&source, b"ef", spec).await.unwrap());

        assert_eq!(store.completed_uploads().unwrap(), vec!["take.wav"]);
    }

    #[tokio::test]
    async fn out_of_order_chunk_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(ChunkStore::new(tmp.path(), 16));
        let link = StoreLink::new(store);
        let source = info("take.wav", 12);

        let mut spec = ChunkSpec::first(12, 4);
        spec.index = 1;
        assert!(!link.send_chunk(&source, b"abcd", spec).await.unwrap());
    }

    #[tokio::test]
    async fn bad_name_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let link = StoreLink::new(Arc::new(ChunkStore::new(tmp.path(), 16)));
        let source = info("../escape.wav", 4);

        let spec = ChunkSpec::first(4, 4);
        assert!(!link.send_chunk(&source, b"abcd", spec).await.unwrap());
    }
}
