use crate::config::{AppConfig, StorageBackend};
use crate::services::storage::{LocalStorageService, S3StorageService, StorageService};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_storage(config: &AppConfig) -> Arc<dyn StorageService> {
    match config.storage_backend {
        StorageBackend::Local => {
            info!(
                "📁 Local Storage: {}",
                config.minio_data_path.display()
            );
            if !config.minio_data_path.is_dir() {
                warn!(
                    "⚠️  MINIO_DATA_PATH {} is not a directory, every lookup will miss",
                    config.minio_data_path.display()
                );
            }
            Arc::new(LocalStorageService::new(&config.minio_data_path))
        }
        StorageBackend::S3 => {
            info!(
                "☁️  S3 Storage: {} (default bucket: {})",
                config.minio_endpoint, config.default_bucket_name
            );

            let aws_config = aws_config::from_env()
                .endpoint_url(&config.minio_endpoint)
                .region(Region::new(config.minio_region.clone()))
                .credentials_provider(aws_sdk_s3::config::Credentials::new(
                    config.minio_access_key.clone(),
                    config.minio_secret_key.clone(),
                    None,
                    None,
                    "static",
                ))
                .load()
                .await;

            let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build();

            let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

            // Surface a misconfigured default bucket at startup rather than on the first request
            match s3_client
                .head_bucket()
                .bucket(&config.default_bucket_name)
                .send()
                .await
            {
                Ok(_) => info!("✅ Bucket '{}' is reachable", config.default_bucket_name),
                Err(e) => warn!(
                    "⚠️  Bucket '{}' is not reachable yet: {}",
                    config.default_bucket_name, e
                ),
            }

            Arc::new(S3StorageService::new(s3_client))
        }
    }
}
