use crate::config::UploadConfig;
use crate::services::storage::S3ObjectStore;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

/// Builds the S3 client from the ambient AWS credential chain.
///
/// The bucket is expected to exist already.
pub async fn setup_storage(config: &UploadConfig) -> Arc<S3ObjectStore> {
    info!(
        "☁️  S3 Storage: bucket={} region={} endpoint={}",
        config.s3_bucket,
        config.s3_region,
        config.s3_endpoint.as_deref().unwrap_or("aws")
    );

    let mut loader = aws_config::from_env().region(Region::new(config.s3_region.clone()));
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Arc::new(S3ObjectStore::new(s3_client, config.s3_bucket.clone()))
}
