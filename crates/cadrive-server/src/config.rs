//! Configuration management for the drive server

use anyhow::{Context, Result};
use cadrive::DriveConfig;
use serde::Deserialize;
use std::str::FromStr;

/// Catalog backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    MongoDB,
    Memory,
}

impl FromStr for CatalogBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(CatalogBackend::MongoDB),
            "memory" | "mem" => Ok(CatalogBackend::Memory),
            _ => Err(format!("Unknown catalog backend: {}", s)),
        }
    }
}

/// Object storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" | "minio" => Ok(StorageBackend::S3),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub catalog_backend: CatalogBackend,

    /// MongoDB URL (default: mongodb://localhost:27017)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Database name (default: cadrive)
    #[serde(default = "default_database_name")]
    pub database_name: String,

    #[serde(default)]
    pub storage_backend: StorageBackend,

    /// S3 API endpoint (default: http://localhost:9000)
    #[serde(default = "default_s3_endpoint")]
    pub s3_endpoint: String,

    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    #[serde(default)]
    pub s3_access_key: String,

    #[serde(default)]
    pub s3_secret_key: String,

    /// Receives client notifications as JSON POSTs (optional)
    pub notify_webhook_url: Option<String>,

    /// CORS allowed origins (comma-separated). Any origin when unset.
    pub cors_allowed_origins: Option<String>,

    /// Drive feature settings, `[drive]` table in TOML
    #[serde(default)]
    pub drive: DriveConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database_name() -> String {
    "cadrive".to_string()
}

fn default_s3_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn parse_number<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => anyhow::bail!("Invalid {} '{}': expected a number", name, raw),
        },
        None => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup, starting from defaults
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.apply_overrides(&var)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let mut config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        config.apply_overrides(&|key: &str| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, var: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("CADRIVE_HOST") {
            self.host = host;
        }
        if let Some(port) = parse_number("CADRIVE_PORT", var("CADRIVE_PORT"))? {
            self.port = port;
        }
        if let Some(backend) = var("CATALOG_BACKEND") {
            self.catalog_backend = backend
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Invalid CATALOG_BACKEND: {}", e))?;
        }
        if let Some(url) = var("MONGODB_URL").or_else(|| var("DATABASE_URL")) {
            self.database_url = url;
        }
        if let Some(name) = var("MONGODB_DATABASE").or_else(|| var("DATABASE_NAME")) {
            self.database_name = name;
        }
        if let Some(backend) = var("STORAGE_BACKEND") {
            self.storage_backend = backend
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Invalid STORAGE_BACKEND: {}", e))?;
        }
        if let Some(endpoint) = var("S3_ENDPOINT") {
            self.s3_endpoint = endpoint;
        }
        if let Some(region) = var("S3_REGION") {
            self.s3_region = region;
        }
        if let Some(key) = var("S3_ACCESS_KEY") {
            self.s3_access_key = key;
        }
        if let Some(secret) = var("S3_SECRET_KEY") {
            self.s3_secret_key = secret;
        }
        if let Some(url) = var("NOTIFY_WEBHOOK_URL").filter(|s| !s.trim().is_empty()) {
            self.notify_webhook_url = Some(url);
        }
        if let Some(origins) = var("CORS_ALLOWED_ORIGINS") {
            self.cors_allowed_origins = Some(origins);
        }

        if let Some(endpoint) = var("STORAGE_PUBLIC_ENDPOINT") {
            self.drive.public_endpoint = endpoint;
        }
        if let Some(prefix) = var("BUCKET_PREFIX") {
            self.drive.bucket_prefix = prefix;
        }
        if let Some(days) = parse_number("RETENTION_DAYS", var("RETENTION_DAYS"))? {
            self.drive.retention_days = days;
        }
        if let Some(mb) = parse_number::<usize>("MAX_UPLOAD_MB", var("MAX_UPLOAD_MB"))? {
            self.drive.max_upload_bytes = match mb.checked_mul(1024 * 1024) {
                Some(bytes) => bytes,
                None => anyhow::bail!("Invalid MAX_UPLOAD_MB '{}': too large", mb),
            };
        }
        if let Some(tz) = var("DRIVE_TIMEZONE") {
            self.drive.timezone = tz;
        }
        if let Some(schedule) = var("PURGE_SCHEDULE") {
            self.drive.purge_schedule = schedule;
        }
        if let Some(schedule) = var("ROLLOVER_SCHEDULE") {
            self.drive.rollover_schedule = schedule;
        }

        self.drive
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid drive configuration: {}", e))
    }

    /// Parsed CORS origins; empty means any origin
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            catalog_backend: CatalogBackend::default(),
            database_url: default_database_url(),
            database_name: default_database_name(),
            storage_backend: StorageBackend::default(),
            s3_endpoint: default_s3_endpoint(),
            s3_region: default_s3_region(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
            notify_webhook_url: None,
            cors_allowed_origins: None,
            drive: DriveConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.catalog_backend, CatalogBackend::MongoDB);
        assert_eq!(config.storage_backend, StorageBackend::S3);
        assert_eq!(config.drive.retention_days, 90);
        assert!(config.cors_origins().is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CADRIVE_PORT", "9090"),
            ("CATALOG_BACKEND", "memory"),
            ("STORAGE_BACKEND", "minio"),
            ("MAX_UPLOAD_MB", "10"),
            ("RETENTION_DAYS", "30"),
            ("BUCKET_PREFIX", "practice-"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.catalog_backend, CatalogBackend::Memory);
        assert_eq!(config.storage_backend, StorageBackend::S3);
        assert_eq!(config.drive.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.drive.retention_days, 30);
        assert_eq!(config.drive.bucket_prefix, "practice-");
        assert_eq!(
            config.cors_origins(),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        assert!(Config::from_lookup(lookup(&[("CATALOG_BACKEND", "sqlite")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CADRIVE_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DRIVE_TIMEZONE", "Nowhere/City")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PURGE_SCHEDULE", "every night")])).is_err());
    }

    #[test]
    fn test_oversized_upload_limit_is_rejected() {
        let huge = usize::MAX.to_string();
        let err = Config::from_lookup(lookup(&[("MAX_UPLOAD_MB", huge.as_str())])).unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_MB"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
port = 7000
catalog_backend = "memory"
storage_backend = "memory"
notify_webhook_url = "http://hooks.local/notify"

[drive]
bucket_prefix = "vault-"
retention_days = 45
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.catalog_backend, CatalogBackend::Memory);
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(
            config.notify_webhook_url.as_deref(),
            Some("http://hooks.local/notify")
        );
        assert_eq!(config.drive.bucket_prefix, "vault-");
        assert_eq!(config.drive.retention_days, 45);
        assert_eq!(config.drive.timezone, "Asia/Kolkata");
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "port = \"not a port\"").unwrap();
        assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
    }
}
