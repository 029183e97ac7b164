//! Configuration module
//!
//! Environment-driven configuration for the processing pipeline and its
//! collaborators (database, storage, media tools, classification API,
//! realtime transport). Executable locations for the media tools are explicit
//! configuration values injected at construction, never process-wide globals.

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const DB_MAX_CONNECTIONS: u32 = 20;
const DB_TIMEOUT_SECS: u64 = 30;
const PRESIGN_EXPIRY_SECS: u64 = 900;
const MODERATION_MAX_ATTEMPTS: u32 = 3;
const MODERATION_RETRY_DELAY_SECS: u64 = 10;
const REALTIME_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    // Database
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    /// Lifetime of presigned read URLs handed to the media tools.
    pub presign_expiry_secs: u64,
    // Media tools
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    // Classification API; absence of the key selects the mock client.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub moderation_max_attempts: u32,
    pub moderation_retry_delay_secs: u64,
    // Realtime transport
    pub realtime_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .map(|s| {
                StorageBackend::from_str(&s).map_err(|e| anyhow::anyhow!("STORAGE_BACKEND: {}", e))
            })
            .transpose()?;

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());

        Ok(Self {
            environment,
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            db_timeout_seconds: env_parse("DB_TIMEOUT_SECONDS", DB_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok().or(env::var("AWS_REGION").ok()),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            presign_expiry_secs: env_parse("PRESIGN_EXPIRY_SECS", PRESIGN_EXPIRY_SECS),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            gemini_api_key,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            moderation_max_attempts: env_parse(
                "MODERATION_MAX_ATTEMPTS",
                MODERATION_MAX_ATTEMPTS,
            ),
            moderation_retry_delay_secs: env_parse(
                "MODERATION_RETRY_DELAY_SECS",
                MODERATION_RETRY_DELAY_SECS,
            ),
            realtime_channel_capacity: env_parse(
                "REALTIME_CHANNEL_CAPACITY",
                REALTIME_CHANNEL_CAPACITY,
            ),
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            Some(StorageBackend::S3) => {
                if self.s3_bucket.is_none() {
                    anyhow::bail!("S3_BUCKET must be set when STORAGE_BACKEND=s3");
                }
                if self.s3_region.is_none() {
                    anyhow::bail!("S3_REGION or AWS_REGION must be set when STORAGE_BACKEND=s3");
                }
            }
            Some(StorageBackend::Local) => {
                if self.local_storage_path.is_none() {
                    anyhow::bail!("LOCAL_STORAGE_PATH must be set when STORAGE_BACKEND=local");
                }
                if self.local_storage_base_url.is_none() {
                    anyhow::bail!("LOCAL_STORAGE_BASE_URL must be set when STORAGE_BACKEND=local");
                }
            }
            None => {}
        }

        if self.moderation_max_attempts == 0 {
            anyhow::bail!("MODERATION_MAX_ATTEMPTS must be at least 1");
        }

        Ok(())
    }
}

fn env_parse<T: FromStr + Copy>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
