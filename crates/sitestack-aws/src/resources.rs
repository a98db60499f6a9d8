//! AWS resource schemas
//!
//! Each schema is generic over its string value type: declared with
//! [`Input`] (which may reference other resources) and parsed back with
//! `String` once every reference has resolved.

use crate::policy::PolicyDocument;
use serde::{Deserialize, Serialize};
use sitestack_cloud::Input;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const PROVIDER: &str = "aws";

pub const BUCKET: &str = "s3-bucket";
pub const BUCKET_OBJECT: &str = "s3-object";
pub const BUCKET_POLICY: &str = "s3-bucket-policy";
pub const ORIGIN_ACCESS_IDENTITY: &str = "cloudfront-oai";
pub const DISTRIBUTION: &str = "cloudfront-distribution";

/// JSON pointer of the certificate ARN inside a distribution config
pub const ACM_CERTIFICATE_ARN_POINTER: &str = "/viewer_certificate/acm_certificate_arn";

/// JSON pointer of the local body path inside an object config
pub const OBJECT_SOURCE_POINTER: &str = "/source";

/// S3 bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketProps {
    pub website: WebsiteConfig,
    pub acl: CannedAcl,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteConfig {
    pub index_document: String,
    pub error_document: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    Private,
    PublicRead,
}

/// Object stored in a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketObjectProps<V = Input> {
    /// Bucket name
    pub bucket: V,
    pub key: String,
    pub content_type: String,
    /// Local file uploaded as the object body
    pub source: PathBuf,
    /// SHA-256 hex digest of the body
    pub etag: String,
}

/// CloudFront origin access identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginAccessIdentityProps {
    pub comment: String,
}

/// Policy attached to a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketPolicyProps<V = Input> {
    /// Bucket name
    pub bucket: V,
    /// Id of the identity the policy grants read access to
    pub origin_access_identity: V,
    pub policy: PolicyDocument<V>,
}

/// CloudFront distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionProps<V = Input> {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub origins: Vec<Origin<V>>,
    pub default_cache_behavior: DefaultCacheBehavior<V>,
    pub price_class: PriceClass,
    pub restrictions: Restrictions,
    pub viewer_certificate: ViewerCertificate,
    #[serde(default)]
    pub custom_error_responses: Vec<CustomErrorResponse>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin<V = Input> {
    pub origin_id: V,
    pub domain_name: V,
    pub s3_origin_config: S3OriginConfig<V>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3OriginConfig<V = Input> {
    /// `origin-access-identity/cloudfront/<id>`
    pub origin_access_identity: V,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultCacheBehavior<V = Input> {
    pub target_origin_id: V,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: Vec<HttpMethod>,
    pub cached_methods: Vec<HttpMethod>,
    pub forwarded_values: ForwardedValues,
    pub min_ttl: u64,
    pub default_ttl: u64,
    pub max_ttl: u64,
    pub compress: bool,
}

impl<V> DefaultCacheBehavior<V> {
    /// HTTPS-only static content: GET/HEAD/OPTIONS, one hour default TTL,
    /// one day maximum, compressed
    pub fn static_site(target_origin_id: V) -> Self {
        Self {
            target_origin_id,
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            allowed_methods: vec![HttpMethod::Get, HttpMethod::Head, HttpMethod::Options],
            cached_methods: vec![HttpMethod::Get, HttpMethod::Head],
            forwarded_values: ForwardedValues {
                query_string: false,
                cookies: CookiePreference {
                    forward: CookieForwarding::Nothing,
                },
            },
            min_ttl: 0,
            default_ttl: 3600,
            max_ttl: 86400,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    AllowAll,
    HttpsOnly,
    RedirectToHttps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Options,
    Put,
    Post,
    Patch,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedValues {
    pub query_string: bool,
    pub cookies: CookiePreference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookiePreference {
    pub forward: CookieForwarding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CookieForwarding {
    #[serde(rename = "none")]
    Nothing,
    #[serde(rename = "whitelist")]
    Whitelist,
    #[serde(rename = "all")]
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceClass {
    #[serde(rename = "PriceClass_100")]
    PriceClass100,
    #[serde(rename = "PriceClass_200")]
    PriceClass200,
    #[serde(rename = "PriceClass_All")]
    PriceClassAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restrictions {
    pub geo_restriction: GeoRestriction,
}

impl Restrictions {
    pub fn none() -> Self {
        Self {
            geo_restriction: GeoRestriction {
                restriction_type: GeoRestrictionType::None,
                locations: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRestriction {
    pub restriction_type: GeoRestrictionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoRestrictionType {
    None,
    Whitelist,
    Blacklist,
}

/// TLS certificate presented to viewers
///
/// Either the CloudFront default certificate or an ACM certificate, never
/// both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewerCertificate {
    CloudfrontDefault,
    Acm {
        acm_certificate_arn: String,
        ssl_support_method: SslSupportMethod,
    },
}

impl ViewerCertificate {
    pub fn acm(certificate_arn: impl Into<String>) -> Self {
        ViewerCertificate::Acm {
            acm_certificate_arn: certificate_arn.into(),
            ssl_support_method: SslSupportMethod::SniOnly,
        }
    }

    pub fn cloudfront_default_certificate(&self) -> bool {
        matches!(self, ViewerCertificate::CloudfrontDefault)
    }

    pub fn acm_certificate_arn(&self) -> Option<&str> {
        match self {
            ViewerCertificate::CloudfrontDefault => None,
            ViewerCertificate::Acm {
                acm_certificate_arn,
                ..
            } => Some(acm_certificate_arn.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslSupportMethod {
    SniOnly,
    Vip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomErrorResponse {
    pub error_code: u16,
    pub response_code: u16,
    pub response_page_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_site_cache_behavior() {
        let behavior = DefaultCacheBehavior::static_site(Input::get_att("s3-bucket:b", "arn"));
        let value = serde_json::to_value(&behavior).unwrap();

        assert_eq!(value["viewer_protocol_policy"], json!("redirect-to-https"));
        assert_eq!(value["allowed_methods"], json!(["GET", "HEAD", "OPTIONS"]));
        assert_eq!(value["cached_methods"], json!(["GET", "HEAD"]));
        assert_eq!(value["forwarded_values"]["cookies"]["forward"], json!("none"));
        assert_eq!(value["min_ttl"], json!(0));
        assert_eq!(value["default_ttl"], json!(3600));
        assert_eq!(value["max_ttl"], json!(86400));
        assert_eq!(value["compress"], json!(true));
    }

    #[test]
    fn test_viewer_certificate_serialization() {
        let default = serde_json::to_value(ViewerCertificate::CloudfrontDefault).unwrap();
        assert_eq!(default, json!({"kind": "cloudfront_default"}));

        let acm = ViewerCertificate::acm("arn:aws:acm:us-east-1:123:certificate/abc");
        let value = serde_json::to_value(&acm).unwrap();
        assert_eq!(
            value.pointer("/acm_certificate_arn"),
            Some(&json!("arn:aws:acm:us-east-1:123:certificate/abc"))
        );
        assert_eq!(value["ssl_support_method"], json!("sni-only"));
        assert!(!acm.cloudfront_default_certificate());
        assert!(acm.acm_certificate_arn().is_some());
    }

    #[test]
    fn test_price_class_and_geo_restriction() {
        assert_eq!(
            serde_json::to_value(PriceClass::PriceClass100).unwrap(),
            json!("PriceClass_100")
        );
        assert_eq!(
            serde_json::to_value(Restrictions::none()).unwrap(),
            json!({"geo_restriction": {"restriction_type": "none"}})
        );
    }
}
