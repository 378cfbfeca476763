use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunked::checksum_bytes;
use crate::types::ChunkSpec;
use crate::{TransferError, validate_upload_name};

const META_SUFFIX: &str = ".json";

/// One stored part of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPart {
    pub size: u64,
    /// SHA-256 hex digest of the part as received.
    pub checksum: String,
}

/// Metadata record kept next to the parts of one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMeta {
    pub name: String,
    pub part_count: u64,
    #[serde(default)]
    pub parts: Vec<MetaPart>,
}

impl UploadMeta {
    /// Returns `true` once every announced part has been stored.
    pub fn is_complete(&self) -> bool {
        self.parts.len() as u64 == self.part_count
    }

    /// Sum of all stored part sizes.
    pub fn received_bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }
}

/// Receives upload chunks and persists them as numbered part files.
///
/// Layout under `root`:
/// - `<name>.<index>`: raw bytes of each part
/// - `<name>.json`: [`UploadMeta`] for the upload
pub struct ChunkStore {
    root: PathBuf,
    max_chunk_size: usize,
    /// Serializes record updates across concurrent writers.
    writes: Mutex<()>,
}

impl ChunkStore {
    /// Creates a store rooted at `root` that refuses chunks larger than
    /// `max_chunk_size` bytes.
    pub fn new(root: &Path, max_chunk_size: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            max_chunk_size,
            writes: Mutex::new(()),
        }
    }

    /// Returns the store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores one chunk and returns the updated metadata.
    ///
    /// Index 0 starts a fresh record (discarding any earlier one with the
    /// same name); later indexes must follow the stored parts exactly.
    pub fn accept_chunk(
        &self,
        name: &str,
        spec: ChunkSpec,
        data: &[u8],
    ) -> Result<UploadMeta, TransferError> {
        validate_upload_name(name)?;

        if data.len() > self.max_chunk_size {
            return Err(TransferError::ChunkTooLarge {
                len: data.len(),
                max: self.max_chunk_size,
            });
        }

        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        std::fs::create_dir_all(&self.root)?;

        let mut meta = if spec.index == 0 {
            self.remove_parts_from(name, spec.total)?;
            UploadMeta {
                name: name.to_string(),
                part_count: spec.total,
                parts: Vec::new(),
            }
        } else {
            self.meta(name)?
        };

        let expected = meta.parts.len() as u64;
        if spec.index != expected {
            return Err(TransferError::OutOfOrder {
                expected,
                got: spec.index,
            });
        }

        let part_path = self.part_path(name, spec.index);
        if part_path.exists() {
            std::fs::remove_file(&part_path)?;
        }
        std::fs::write(&part_path, data)?;

        meta.parts.push(MetaPart {
            size: data.len() as u64,
            checksum: checksum_bytes(data),
        });
        std::fs::write(self.meta_path(name), serde_json::to_vec(&meta)?)?;

        debug!(
            name,
            index = spec.index,
            total = spec.total,
            len = data.len(),
            "stored chunk"
        );
        if meta.is_complete() {
            info!(name, bytes = meta.received_bytes(), "upload complete");
        }

        Ok(meta)
    }

    /// Loads the metadata record for `name`.
    pub fn meta(&self, name: &str) -> Result<UploadMeta, TransferError> {
        validate_upload_name(name)?;
        let path = self.meta_path(name);
        let content = match std::fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::MetaMissing(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&content)?)
    }

    /// Lists the names of uploads whose parts are all stored, sorted.
    ///
    /// A missing root directory means nothing has been uploaded yet.
    pub fn completed_uploads(&self) -> Result<Vec<String>, TransferError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.eq_ignore_ascii_case(".ds_store") {
                continue;
            }
            let Some(name) = file_name.strip_suffix(META_SUFFIX) else {
                continue;
            };

            let content = std::fs::read(entry.path())?;
            let meta: UploadMeta = serde_json::from_slice(&content)?;
            if meta.is_complete() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Deletes part files of `name` whose index is `from` or higher.
    fn remove_parts_from(&self, name: &str, from: u64) -> Result<(), TransferError> {
        let prefix = format!("{name}.");
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(index) = file_name
                .to_str()
                .and_then(|f| f.strip_prefix(&prefix))
                .and_then(|i| i.parse::<u64>().ok())
            else {
                continue;
            };
            if index >= from {
                std::fs::remove_file(entry.path())?;
                debug!(name, index, "removed stale part");
            }
        }
        Ok(())
    }

    fn part_path(&self, name: &str, index: u64) -> PathBuf {
        self.root.join(format!("{name}.{index}"))
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{META_SUFFIX}"))
    }
}
