use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the video upload pipeline
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Staging ceiling for a single upload in bytes (default: 1 GiB)
    pub max_upload_size: u64,

    /// JWT signing secret
    pub jwt_secret: String,

    /// Expected `iss` claim on access tokens (default: "tubely-access")
    pub jwt_issuer: String,

    /// Target bucket for processed videos
    pub s3_bucket: String,

    /// Bucket region, also used to build public URLs (default: "us-east-1")
    pub s3_region: String,

    /// Custom S3 endpoint (MinIO, localstack). Path-style addressing when set.
    pub s3_endpoint: Option<String>,

    /// SQLite connection string for the video metadata store
    pub database_url: String,

    pub ffprobe_path: String,
    pub ffmpeg_path: String,

    /// Deadline applied to every external media tool invocation (default: 300s)
    pub media_tool_timeout_secs: u64,

    /// Scratch directory for staged and processed files (default: system temp dir)
    pub temp_dir: Option<PathBuf>,

    /// Declared media types the upload endpoint accepts (default: video/mp4)
    pub allowed_media_types: Vec<String>,

    /// Delete the already-uploaded object when the metadata write fails (default: false)
    pub delete_orphans_on_persist_failure: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 1 << 30, // 1 GiB
            jwt_secret: "secret".to_string(),
            jwt_issuer: "tubely-access".to_string(),
            s3_bucket: "tubely-videos".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            database_url: "sqlite://tubely.db?mode=rwc".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            media_tool_timeout_secs: 300,
            temp_dir: None,
            allowed_media_types: vec!["video/mp4".to_string()],
            delete_orphans_on_persist_failure: false,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            jwt_issuer: env::var("JWT_ISSUER").unwrap_or(default.jwt_issuer),

            s3_bucket: env::var("S3_BUCKET").unwrap_or(default.s3_bucket),

            s3_region: env::var("S3_REGION").unwrap_or(default.s3_region),

            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(default.ffprobe_path),

            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(default.ffmpeg_path),

            media_tool_timeout_secs: env::var("MEDIA_TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.media_tool_timeout_secs),

            temp_dir: env::var("UPLOAD_TEMP_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),

            allowed_media_types: env::var("ALLOWED_MEDIA_TYPES")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_media_types),

            delete_orphans_on_persist_failure: env::var("DELETE_ORPHANS_ON_PERSIST_FAILURE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.delete_orphans_on_persist_failure),
        }
    }

    /// Create config for development (in-memory database, short tool deadline)
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            media_tool_timeout_secs: 60,
            ..Self::default()
        }
    }

    pub fn media_tool_timeout(&self) -> Duration {
        Duration::from_secs(self.media_tool_timeout_secs)
    }

    pub fn is_media_type_allowed(&self, media_type: &str) -> bool {
        self.allowed_media_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }

    /// Public URL of an object in the configured bucket.
    ///
    /// Existing records store URLs in exactly this shape, so it must not change.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.s3_bucket, self.s3_region, key
        )
    }
}
