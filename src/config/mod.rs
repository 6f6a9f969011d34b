use crate::services::audio_format::AudioFormat;
use crate::services::extraction::DeliveryMode;
use std::env;
use std::path::PathBuf;

/// Which object-store adapter the service talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3-compatible endpoint (MinIO in production)
    S3,
    /// Objects resolved under `minio_data_path/<bucket>/<key>` on the local filesystem
    Local,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "s3" | "minio" => Some(Self::S3),
            "local" | "fs" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Runtime configuration for the extraction service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: "0.0.0.0")
    pub host: String,

    /// Bind port (default: 8888)
    pub port: u16,

    /// Object store adapter (default: S3)
    pub storage_backend: StorageBackend,

    /// MinIO / S3 endpoint (default: "http://127.0.0.1:9000")
    pub minio_endpoint: String,

    pub minio_access_key: String,

    pub minio_secret_key: String,

    /// Region sent to the S3 endpoint (default: "us-east-1")
    pub minio_region: String,

    /// Root of the MinIO data directory, used by the local backend
    pub minio_data_path: PathBuf,

    /// Format used when a request omits `audio_format` (default: mp3)
    pub default_audio_format: AudioFormat,

    /// Bucket used when a request omits `bucket_name` (default: "videos")
    pub default_bucket_name: String,

    /// ffmpeg binary used for both concatenation and transcoding
    pub ffmpeg_path: PathBuf,

    /// Parent directory for per-request staging areas (default: OS temp dir)
    pub staging_root: PathBuf,

    /// Read size per chunk when streaming (default: 64 KiB)
    pub stream_chunk_size: usize,

    /// Read size per chunk when accumulating a whole buffer (default: 8 MiB)
    pub buffer_chunk_size: usize,

    /// Delivery mode when a request does not pick one (default: stream)
    pub delivery_mode: DeliveryMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
            storage_backend: StorageBackend::S3,
            minio_endpoint: "http://127.0.0.1:9000".to_string(),
            minio_access_key: "minioadmin".to_string(),
            minio_secret_key: "minioadmin".to_string(),
            minio_region: "us-east-1".to_string(),
            minio_data_path: PathBuf::from("./data"),
            default_audio_format: AudioFormat::Mp3,
            default_bucket_name: "videos".to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            staging_root: env::temp_dir(),
            stream_chunk_size: 64 * 1024,       // 64 KiB
            buffer_chunk_size: 8 * 1024 * 1024, // 8 MiB
            delivery_mode: DeliveryMode::Stream,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            host: env::var("HOST").unwrap_or(default.host),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|v| StorageBackend::parse(&v))
                .unwrap_or(default.storage_backend),

            minio_endpoint: env::var("MINIO_ENDPOINT").unwrap_or(default.minio_endpoint),

            minio_access_key: env::var("MINIO_ACCESS_KEY").unwrap_or(default.minio_access_key),

            minio_secret_key: env::var("MINIO_SECRET_KEY").unwrap_or(default.minio_secret_key),

            minio_region: env::var("MINIO_REGION").unwrap_or(default.minio_region),

            minio_data_path: env::var("MINIO_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.minio_data_path),

            default_audio_format: match env::var("DEFAULT_AUDIO_FORMAT") {
                Ok(v) => v.parse().unwrap_or_else(|_| {
                    tracing::warn!(
                        "DEFAULT_AUDIO_FORMAT '{}' is not supported, falling back to {}",
                        v,
                        default.default_audio_format
                    );
                    default.default_audio_format
                }),
                Err(_) => default.default_audio_format,
            },

            default_bucket_name: env::var("DEFAULT_BUCKET_NAME")
                .unwrap_or(default.default_bucket_name),

            ffmpeg_path: env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.ffmpeg_path),

            staging_root: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_root),

            stream_chunk_size: env::var("STREAM_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(default.stream_chunk_size),

            buffer_chunk_size: env::var("BUFFER_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(default.buffer_chunk_size),

            delivery_mode: env::var("DELIVERY_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.delivery_mode),
        }
    }

    /// Local development preset: filesystem-backed store under `./data`
    pub fn development() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            storage_backend: StorageBackend::Local,
            ..Self::default()
        }
    }
}
