//! Uploader configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/uploadme/uploadme.toml`
//! - Windows: `%APPDATA%/uploadme/uploadme.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uploadme_pool::{DEFAULT_CONCURRENCY_LIMIT, PoolConfig};
use uploadme_transfer::DEFAULT_CHUNK_SIZE;

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Bytes per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Files uploading at the same time.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Seconds to wait for each chunk acknowledgment (0 = wait forever).
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,

    /// Accepted MIME types. Empty accepts everything.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,

    /// Directory the chunk store writes into.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_ack_timeout_secs() -> u64 {
    30
}

fn default_allowed_types() -> Vec<String> {
    vec!["audio/wav".into(), "audio/mp3".into()]
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./files")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            concurrency_limit: default_concurrency_limit(),
            ack_timeout_secs: default_ack_timeout_secs(),
            allowed_types: default_allowed_types(),
            store_dir: default_store_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the platform path), creating a
    /// default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration read");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn ack_timeout(&self) -> Option<Duration> {
        (self.ack_timeout_secs > 0).then(|| Duration::from_secs(self.ack_timeout_secs))
    }

    /// Pool settings derived from this configuration.
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig {
            chunk_size: self.chunk_size,
            concurrency_limit: self.concurrency_limit,
            ack_timeout: self.ack_timeout(),
            allowed_content_types: self.allowed_types.clone(),
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("uploadme").join("uploadme.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("uploadme")
            .join("uploadme.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.ack_timeout_secs, 30);
        assert_eq!(config.allowed_types, vec!["audio/wav", "audio/mp3"]);
        assert_eq!(config.store_dir, PathBuf::from("./files"));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: Config = toml::from_str("concurrency_limit = 2").unwrap();
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.allowed_types.len(), 2);
    }

    #[test]
    fn zero_timeout_disables() {
        let config = Config {
            ack_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.ack_timeout(), None);
        assert_eq!(
            Config::default().ack_timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn pool_config_mirrors_fields() {
        let config = Config {
            chunk_size: 4096,
            concurrency_limit: 8,
            ack_timeout_secs: 5,
            allowed_types: vec![],
            store_dir: PathBuf::from("/srv/files"),
        };
        let pool = config.to_pool_config();
        assert_eq!(pool.chunk_size, 4096);
        assert_eq!(pool.concurrency_limit, 8);
        assert_eq!(pool.ack_timeout, Some(Duration::from_secs(5)));
        assert!(pool.allowed_content_types.is_empty());
    }

    #[test]
    fn load_creates_default_then_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("uploadme.toml");

        let created = Config::load(Some(&path)).unwrap();
        assert_eq!(created, Config::default());
        assert!(path.exists());

        let custom = Config {
            chunk_size: 512,
            ..Config::default()
        };
        custom.save_to(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), custom);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("uploadme.toml");
        std::fs::write(&path, "chunk_size = \"big\"").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("uploadme"));
    }
}
