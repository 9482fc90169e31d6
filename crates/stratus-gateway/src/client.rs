//! S3 client construction
//!
//! Builds an `aws_sdk_s3::Client` from the object-store section of the
//! configuration. Path-style addressing is forced so that bucket names never
//! have to resolve as DNS labels against MinIO-style endpoints.

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;

use stratus_core::config::ObjectStoreConfig;

/// Builds an S3 client for the configured endpoint.
pub fn build_client(config: &ObjectStoreConfig) -> Client {
    let credentials = Credentials::from_keys(
        config.access_key.clone(),
        config.secret_key.clone(),
        None,
    );

    let s3_config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .endpoint_url(&config.endpoint)
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();

    Client::from_conf(s3_config)
}
