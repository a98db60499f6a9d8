//! AWS provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("InvalidBucketName: {0}")]
    InvalidBucketName(String),

    #[error("BucketAlreadyExists: {0}")]
    BucketAlreadyExists(String),

    #[error("NoSuchBucket: {0}")]
    NoSuchBucket(String),

    #[error("BucketNotEmpty: {0}")]
    BucketNotEmpty(String),

    #[error("BadDigest: {0}")]
    BadDigest(String),

    #[error("MalformedPolicy: {0}")]
    MalformedPolicy(String),

    #[error("InvalidOriginAccessIdentity: {0}")]
    InvalidOriginAccessIdentity(String),

    #[error("CloudFrontOriginAccessIdentityInUse: {0}")]
    OriginAccessIdentityInUse(String),

    #[error("InvalidViewerCertificate: {0}")]
    InvalidViewerCertificate(String),

    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    #[error("NoSuchResource: {0}")]
    NoSuchResource(String),

    #[error("Unsupported resource type: {0}")]
    UnsupportedResource(String),

    #[error("Injected failure: {0}")]
    InjectedFailure(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] sitestack_cloud::CloudError),
}

impl From<AwsError> for sitestack_cloud::CloudError {
    fn from(e: AwsError) -> Self {
        match e {
            AwsError::CloudError(inner) => inner,
            other => sitestack_cloud::CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
