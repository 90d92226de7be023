use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

/// All runtime configuration, read from the environment exactly once at
/// startup and passed down by reference. Handlers never touch `env::var`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_root: PathBuf,
    /// Secret the identity layer signs bearer tokens with.
    pub auth_secret: String,
    /// Secret for capability-token signatures; independent of auth_secret.
    pub share_secret: String,
    pub share_ttl_secs: i64,
    pub reader_group: String,
    pub uploader_group: String,
    pub admin_group: String,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let auth_secret = env::var("AUTH_SECRET").context("AUTH_SECRET must be set")?;
        let share_secret =
            env::var("SHARE_TOKEN_SECRET").context("SHARE_TOKEN_SECRET must be set")?;
        if auth_secret.is_empty() || share_secret.is_empty() {
            bail!("AUTH_SECRET and SHARE_TOKEN_SECRET must be non-empty");
        }

        let share_ttl_secs = env::var("SHARE_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(crate::file_operations::share_token::DEFAULT_TTL_SECS);
        if share_ttl_secs <= 0 {
            bail!("SHARE_TOKEN_TTL_SECS must be positive");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(3000),
            storage_root: env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "./filehub_data".to_string())
                .into(),
            auth_secret,
            share_secret,
            share_ttl_secs,
            reader_group: env::var("READER_GROUP")
                .unwrap_or_else(|_| "storage-readers".to_string()),
            uploader_group: env::var("UPLOADER_GROUP")
                .unwrap_or_else(|_| "storage-uploaders".to_string()),
            admin_group: env::var("ADMIN_GROUP")
                .unwrap_or_else(|_| "storage-admins".to_string()),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1024 * 1024 * 1024),
        })
    }

    /// Fixed configuration for unit and integration tests.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            storage_root: PathBuf::from("."),
            auth_secret: "test-auth-secret".to_string(),
            share_secret: "test-share-secret".to_string(),
            share_ttl_secs: 300,
            reader_group: "storage-readers".to_string(),
            uploader_group: "storage-uploaders".to_string(),
            admin_group: "storage-admins".to_string(),
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}
