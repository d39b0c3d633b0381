//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Object storage configuration.
    pub storage: StorageSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Emit logs as JSON lines instead of human readable text.
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Apply pending migrations on startup.
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_auto_migrate() -> bool {
    true
}

/// Which object storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// S3-compatible endpoint (MinIO, R2, AWS S3).
    #[default]
    S3,
    /// Local filesystem (development only).
    Local,
}

/// Object storage configuration.
#[derive(Clone, Deserialize)]
pub struct StorageSettings {
    /// Backend kind.
    #[serde(default)]
    pub provider: StorageKind,
    /// S3 endpoint URL.
    #[serde(default)]
    pub endpoint: String,
    /// S3 access key.
    #[serde(default)]
    pub access_key: String,
    /// S3 secret key.
    #[serde(default)]
    pub secret_key: String,
    /// Bucket holding every uploaded object.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Signing region. S3-compatible servers usually accept any fixed value.
    #[serde(default = "default_region")]
    pub region: String,
    /// Root directory for the local provider.
    #[serde(default = "default_root")]
    pub root: String,
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Lifetime of share links in seconds.
    #[serde(default = "default_share_link_ttl")]
    pub share_link_ttl_secs: u64,
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("root", &self.root)
            .field("max_file_size", &self.max_file_size)
            .field("share_link_ttl_secs", &self.share_link_ttl_secs)
            .finish()
    }
}

fn default_bucket() -> String {
    "blink-files".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_root() -> String {
    "./storage".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_share_link_ttl() -> u64 {
    3600 // 1 hour
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Later sources override earlier ones: `config/default`, then
    /// `config/{RUN_MODE}`, then `BLINK__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("BLINK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_env() {
        temp_env::with_vars(
            [
                ("BLINK__DATABASE__URL", Some("sqlite::memory:")),
                ("BLINK__STORAGE__ENDPOINT", Some("http://localhost:9000")),
                ("BLINK__STORAGE__ACCESS_KEY", Some("minioadmin")),
                ("BLINK__STORAGE__SECRET_KEY", Some("minioadmin")),
                ("BLINK__STORAGE__BUCKET", Some("uploads")),
                ("BLINK__SERVER__PORT", Some("9090")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.database.url, "sqlite::memory:");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.storage.provider, StorageKind::S3);
                assert_eq!(config.storage.endpoint, "http://localhost:9000");
                assert_eq!(config.storage.bucket, "uploads");
                assert_eq!(config.storage.region, "us-east-1");
                assert_eq!(config.storage.share_link_ttl_secs, 3600);
            },
        );
    }

    #[test]
    fn test_local_provider_from_env() {
        temp_env::with_vars(
            [
                ("BLINK__DATABASE__URL", Some("sqlite::memory:")),
                ("BLINK__STORAGE__PROVIDER", Some("local")),
                ("BLINK__STORAGE__ROOT", Some("/tmp/blink")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.storage.provider, StorageKind::Local);
                assert_eq!(config.storage.root, "/tmp/blink");
                assert_eq!(config.storage.bucket, "blink-files");
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars_unset(["BLINK__DATABASE__URL"], || {
            assert!(AppConfig::load().is_err());
        });
    }

    #[test]
    fn test_secret_key_redacted_in_debug() {
        temp_env::with_vars(
            [
                ("BLINK__DATABASE__URL", Some("sqlite::memory:")),
                ("BLINK__STORAGE__SECRET_KEY", Some("super-secret-value")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                let debug = format!("{:?}", config.storage);
                assert!(!debug.contains("super-secret-value"));
                assert!(debug.contains("[REDACTED]"));
            },
        );
    }
}
