//! Configuration module for Stratus.
//!
//! Typed configuration structs mapping to the YAML configuration file, with
//! loading, defaults and validation. The server binary loads this once at
//! boot; nothing re-reads configuration at runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Top-level configuration for the Stratus data plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub object_store: ObjectStoreConfig,
    pub transfer: TransferConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:8080`.
    pub bind: String,
    /// Per-owner request budget for the governor middleware.
    pub requests_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            requests_per_minute: 600,
        }
    }
}

/// Metadata store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stratus.db"),
        }
    }
}

/// S3-compatible object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// Endpoint URL, e.g. `http://127.0.0.1:9000` for MinIO.
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Bucket holding user file content and upload chunks.
    pub file_bucket: String,
    /// Bucket holding user assets (avatars); untouched by the data plane.
    pub user_bucket: String,
    /// Lifetime of presigned upload URLs, seconds.
    pub presign_put_ttl_secs: u64,
    /// Lifetime of presigned download links, seconds.
    pub download_link_ttl_secs: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            file_bucket: "cloud-file".to_string(),
            user_bucket: "cloud-user".to_string(),
            presign_put_ttl_secs: 3600,
            download_link_ttl_secs: 24 * 3600,
        }
    }
}

/// Streaming transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Process-wide egress budget shared by all download streams.
    pub global_bytes_per_sec: u64,
    /// Upper bound on an in-memory ZIP assembly.
    pub zip_max_bytes: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            global_bytes_per_sec: 100 * MIB,
            zip_max_bytes: 256 * MIB,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.transfer.global_bytes_per_sec == 0 {
            anyhow::bail!("transfer.global_bytes_per_sec must be positive");
        }
        if self.object_store.file_bucket.is_empty() {
            anyhow::bail!("object_store.file_bucket must be set");
        }
        if self.server.requests_per_minute == 0 {
            anyhow::bail!("server.requests_per_minute must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.object_store.file_bucket, "cloud-file");
        assert_eq!(config.object_store.presign_put_ttl_secs, 3600);
        assert_eq!(config.transfer.global_bytes_per_sec, 100 * MIB);
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "server:\n  bind: 0.0.0.0:9999\nobject_store:\n  file_bucket: my-files\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9999");
        assert_eq!(config.object_store.file_bucket, "my-files");
        // untouched sections keep their defaults
        assert_eq!(config.database.path, PathBuf::from("stratus.db"));
    }

    #[test]
    fn test_load_rejects_zero_global_rate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "transfer:\n  global_bytes_per_sec: 0\n").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = Config::load_or_default(Path::new("/definitely/not/here.yml"));
        assert_eq!(config.server.requests_per_minute, 600);
    }
}
