//! Startup bucket provisioning.
//!
//! Runs once before the server accepts requests: check whether the configured
//! bucket exists, create it if absent, and fail startup on anything else.

use std::future::Future;
use std::path::PathBuf;

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use tracing::info;

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;

/// Outcome of [`ensure_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    /// The bucket was already present.
    AlreadyExists,
    /// The bucket was created by this call.
    Created,
}

/// Bucket existence check and creation.
pub trait BucketProvisioner: Send + Sync {
    /// Bucket this provisioner manages.
    fn bucket(&self) -> &str;

    /// Returns `Ok(false)` only when the backend reports the bucket absent.
    fn bucket_exists(&self) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Create the bucket.
    fn create_bucket(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Make sure the configured bucket exists. Idempotent.
///
/// # Errors
///
/// Returns an error if the existence check fails for a reason other than
/// "not found", or if creation fails.
pub async fn ensure_bucket<P: BucketProvisioner>(
    provisioner: &P,
) -> Result<BucketStatus, StorageError> {
    if provisioner.bucket_exists().await? {
        info!(bucket = %provisioner.bucket(), "Bucket already exists");
        return Ok(BucketStatus::AlreadyExists);
    }

    provisioner.create_bucket().await?;
    info!(bucket = %provisioner.bucket(), "Bucket created");
    Ok(BucketStatus::Created)
}

/// S3 bucket provisioner backed by the AWS SDK.
pub struct S3BucketProvisioner {
    client: Client,
    bucket: String,
}

impl S3BucketProvisioner {
    /// Build a client with static credentials, a fixed signing region and
    /// path-style addressing.
    #[must_use]
    pub fn new(
        endpoint: &str,
        bucket: impl Into<String>,
        access_key_id: &str,
        secret_access_key: &str,
        region: &str,
    ) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "blink-static",
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: bucket.into(),
        }
    }
}

impl BucketProvisioner for S3BucketProvisioner {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                // Some S3-compatible servers answer HEAD with a bare 404 that
                // the SDK does not model as NotFound.
                let modeled = err
                    .as_service_error()
                    .is_some_and(HeadBucketError::is_not_found);
                let status = err.raw_response().map(|r| r.status().as_u16());
                if modeled || status == Some(404) {
                    Ok(false)
                } else {
                    Err(StorageError::operation(
                        DisplayErrorContext(&err).to_string(),
                    ))
                }
            }
        }
    }

    async fn create_bucket(&self) -> Result<(), StorageError> {
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| StorageError::operation(DisplayErrorContext(&err).to_string()))
    }
}

/// Local filesystem "bucket": the root directory.
pub struct LocalFsProvisioner {
    root: PathBuf,
    label: String,
}

impl LocalFsProvisioner {
    /// Manage the directory at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let label = root.display().to_string();
        Self { root, label }
    }
}

impl BucketProvisioner for LocalFsProvisioner {
    fn bucket(&self) -> &str {
        &self.label
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        tokio::fs::try_exists(&self.root)
            .await
            .map_err(|e| StorageError::operation(e.to_string()))
    }

    async fn create_bucket(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::operation(e.to_string()))
    }
}

/// Provisioner matching a [`StorageConfig`].
pub enum Provisioner {
    /// S3-compatible endpoint.
    S3(S3BucketProvisioner),
    /// Local directory.
    LocalFs(LocalFsProvisioner),
}

impl Provisioner {
    /// Select the provisioner for the configured provider.
    #[must_use]
    pub fn for_config(config: &StorageConfig) -> Self {
        match &config.provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => Self::S3(S3BucketProvisioner::new(
                endpoint,
                bucket.clone(),
                access_key_id,
                secret_access_key,
                region,
            )),
            StorageProvider::LocalFs { root } => Self::LocalFs(LocalFsProvisioner::new(root)),
        }
    }
}

impl BucketProvisioner for Provisioner {
    fn bucket(&self) -> &str {
        match self {
            Self::S3(p) => p.bucket(),
            Self::LocalFs(p) => p.bucket(),
        }
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        match self {
            Self::S3(p) => p.bucket_exists().await,
            Self::LocalFs(p) => p.bucket_exists().await,
        }
    }

    async fn create_bucket(&self) -> Result<(), StorageError> {
        match self {
            Self::S3(p) => p.create_bucket().await,
            Self::LocalFs(p) => p.create_bucket().await,
        }
    }
}
