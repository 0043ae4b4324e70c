//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, MinIO, and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file.

use crate::backend::{BoxAsyncBufRead, ObjectPageStream};
use crate::error::{ErrorKind, Result};
use crate::{ObjectInfo, StorageBackend, validate_prefix};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig, timeout::TimeoutConfig},
    error::DisplayErrorContext,
    primitives::DateTime,
    types::Object,
};
use std::time::Duration;
use time::OffsetDateTime;

/// S3 caps `max-keys` at 1000 regardless of what is requested.
const MAX_PAGE_SIZE: usize = 1000;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(300);
/// 1 initial attempt + 2 retries.
const MAX_ATTEMPTS: u32 = 3;

/// S3-compatible storage backend.
///
/// Reads objects from an S3 bucket, optionally under a key prefix. All keys
/// are relative to the configured prefix (if any). The wrapped [`Client`] is
/// a cheap handle over a shared connection pool, so one backend can serve
/// any number of concurrent scans.
///
/// # Examples
///
/// ```no_run
/// use logsift_storage::backend::S3Backend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "archive",
///     "my-log-bucket",
///     Some("services/payouts".to_string()),
///     "us-east-1",
///     None::<String>,
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    /// Normalized root prefix, always ending in `/` when set.
    prefix: Option<String>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Credentials::new(key_id, key_secret, None, None, "logsift-config");
        let timeouts = TimeoutConfig::builder().connect_timeout(CONNECT_TIMEOUT).read_timeout(READ_TIMEOUT).build();
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
            .timeout_config(timeouts)
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::from_client(name, Client::from_conf(config_builder.build()), bucket, prefix)
    }

    /// Wrap an already configured client.
    pub fn from_client(
        name: impl Into<String>,
        client: Client,
        bucket: impl Into<String>,
        prefix: Option<String>,
    ) -> Result<Self> {
        let prefix = match prefix {
            Some(prefix) => Some(validate_prefix(&prefix)?).filter(|p| !p.is_empty()).map(|p| match p.ends_with('/') {
                true => p,
                false => format!("{p}/"),
            }),
            None => None,
        };
        Ok(Self { name: name.into(), client, bucket: bucket.into(), prefix })
    }

    /// Construct the full S3 key from a relative key or prefix.
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{}", key.trim_start_matches('/')),
            None => key.to_string(),
        }
    }

    /// Strip the configured prefix from an S3 key to get the relative key.
    fn relative_key<'k>(&self, key: &'k str) -> &'k str {
        match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str()).unwrap_or(key),
            None => key,
        }
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos()).ok()
    }

    fn object_info(&self, object: &Object) -> Option<ObjectInfo> {
        let key = object.key()?;
        let size = object.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0);
        let modified = object.last_modified().and_then(Self::parse_datetime);
        Some(ObjectInfo::new(self.relative_key(key), size, modified))
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_pages<'a>(&'a self, prefix: &'a str, page_size: usize) -> ObjectPageStream<'a> {
        let full_prefix = self.full_key(prefix);
        let page_size = i32::try_from(page_size.clamp(1, MAX_PAGE_SIZE)).unwrap_or(1000);
        Box::pin(stream! {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .into_paginator()
                .page_size(page_size)
                .send();
            while let Some(page) = pages.next().await {
                match page {
                    Ok(output) => {
                        yield Ok(output.contents().iter().filter_map(|object| self.object_info(object)).collect());
                    },
                    Err(err) => {
                        let message = DisplayErrorContext(&err).to_string();
                        tracing::debug!(
                            backend = %self.name,
                            prefix = %full_prefix,
                            error = %message,
                            "S3 listing failed"
                        );
                        yield Err(exn::Exn::from(ErrorKind::Network(message)));
                        return;
                    },
                }
            }
        })
    }

    async fn reader(&self, key: &str) -> Result<BoxAsyncBufRead> {
        let full_key = self.full_key(key);
        let output = match self.client.get_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    exn::bail!(ErrorKind::NotFound(key.to_string()));
                }
                exn::bail!(ErrorKind::Network(DisplayErrorContext(&err).to_string()));
            },
        };
        Ok(Box::pin(output.body.into_async_read()))
    }
}
