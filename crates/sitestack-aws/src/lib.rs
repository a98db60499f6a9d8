//! SiteStack AWS Provider
//!
//! Typed declarations for the S3 and CloudFront resources of a static site,
//! and an offline provider realizing them in memory.
//!
//! ## Resources
//!
//! | type | schema | attributes |
//! |---|---|---|
//! | `s3-bucket` | [`BucketProps`] | `id`, `arn`, `website_endpoint`, `bucket_domain_name`, `region` |
//! | `s3-object` | [`BucketObjectProps`] | `id`, `bucket`, `key`, `etag`, `content_type` |
//! | `cloudfront-oai` | [`OriginAccessIdentityProps`] | `id`, `iam_arn`, `cloudfront_access_identity_path` |
//! | `cloudfront-distribution` | [`DistributionProps`] | `id`, `arn`, `domain_name`, `hosted_zone_id`, `status` |
//! | `s3-bucket-policy` | [`BucketPolicyProps`] | `id`, `policy` |

pub mod error;
pub mod offline;
pub mod policy;
pub mod resources;

pub use error::{AwsError, Result};
pub use offline::{DistributionStatus, OfflineAwsProvider, StoredObject};
pub use policy::{Effect, PolicyDocument, Principal, Statement};
pub use resources::*;
