//! リソース宣言
//!
//! サイト設定とアセットから、バケット・オブジェクト・OAI・バケットポリシー・
//! CloudFront ディストリビューションの宣言を組み立てます。リソース間の値の
//! 受け渡しはすべて属性参照で表し、実際の値は各リソースの作成後に解決されます。
//!
//! ```text
//! s3-object:* ──► s3-bucket ◄── s3-bucket-policy ──► cloudfront-oai
//!                    ▲                                     ▲
//!                    └────── cloudfront-distribution ──────┘
//! ```

use crate::assets::AssetSet;
use crate::config::{DomainConfig, SiteConfiguration};
use crate::error::Result;
use sitestack_aws::{
    ACM_CERTIFICATE_ARN_POINTER, BUCKET, BUCKET_OBJECT, BUCKET_POLICY, BucketObjectProps,
    BucketPolicyProps, BucketProps, CannedAcl, CustomErrorResponse, DISTRIBUTION,
    DefaultCacheBehavior, DistributionProps, OBJECT_SOURCE_POINTER, ORIGIN_ACCESS_IDENTITY,
    Origin, OriginAccessIdentityProps, PROVIDER, PolicyDocument, PriceClass, Restrictions,
    S3OriginConfig, ViewerCertificate, WebsiteConfig,
};
use sitestack_cloud::{AttrRef, Input, ResourceConfig, ResourceSet};
use std::collections::BTreeMap;

/// 管理元を示すタグの値
pub const MANAGED_BY: &str = "SiteStack";

/// スタックを構成するリソースのキー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackKeys {
    pub bucket: String,
    pub identity: String,
    pub policy: String,
    pub distribution: String,
}

impl StackKeys {
    /// ドメイン名から論理名を決める (`<domain>-bucket` など)
    pub fn for_domain(domain: &DomainConfig) -> Self {
        let name = domain.name();
        Self {
            bucket: format!("{}:{}-bucket", BUCKET, name),
            identity: format!("{}:{}-oai", ORIGIN_ACCESS_IDENTITY, name),
            policy: format!("{}:{}-bucket-policy", BUCKET_POLICY, name),
            distribution: format!("{}:{}-cdn", DISTRIBUTION, name),
        }
    }

    pub fn object(relative_path: &str) -> String {
        format!("{}:{}", BUCKET_OBJECT, relative_path)
    }
}

/// 宣言済みのスタック
#[derive(Debug, Clone)]
pub struct SiteStack {
    pub keys: StackKeys,
    pub resources: ResourceSet,
}

impl SiteStack {
    /// 設定とアセットからリソースを宣言する
    pub fn declare(config: &SiteConfiguration, assets: &AssetSet) -> Result<Self> {
        config.validate()?;

        let domain = config.domain.name();
        let keys = StackKeys::for_domain(&config.domain);
        let mut resources = ResourceSet::new();

        if assets.get(&config.index_document).is_none() {
            tracing::warn!(document = %config.index_document, "Index document not found in site directory");
        }
        if assets.get(&config.error_document).is_none() {
            tracing::warn!(document = %config.error_document, "Error document not found in site directory");
        }

        let bucket_key = resources.add(declare_bucket(config, domain)?);
        for asset in assets.iter() {
            let props = BucketObjectProps::<Input> {
                bucket: Input::get_att(&bucket_key, "id"),
                key: asset.relative_path.clone(),
                content_type: asset.content_type.to_string(),
                source: asset.source.clone(),
                etag: asset.digest(),
            };
            resources.add(
                ResourceConfig::new(
                    BUCKET_OBJECT,
                    &asset.relative_path,
                    PROVIDER,
                    serde_json::to_value(props)?,
                )
                .with_local(OBJECT_SOURCE_POINTER),
            );
        }

        let identity_key = resources.add(ResourceConfig::new(
            ORIGIN_ACCESS_IDENTITY,
            format!("{}-oai", domain),
            PROVIDER,
            serde_json::to_value(OriginAccessIdentityProps {
                comment: format!("OAI for {}", config.project),
            })?,
        ));

        let policy = BucketPolicyProps::<Input> {
            bucket: Input::get_att(&bucket_key, "id"),
            origin_access_identity: Input::get_att(&identity_key, "id"),
            policy: PolicyDocument::<Input>::grant_get_object(
                &AttrRef::new(&identity_key, "iam_arn"),
                &AttrRef::new(&bucket_key, "arn"),
            ),
        };
        resources.add(ResourceConfig::new(
            BUCKET_POLICY,
            format!("{}-bucket-policy", domain),
            PROVIDER,
            serde_json::to_value(policy)?,
        ));

        resources.add(declare_distribution(config, domain, &bucket_key, &identity_key)?);

        debug_assert_eq!(keys.bucket, bucket_key);
        debug_assert_eq!(keys.identity, identity_key);
        tracing::debug!(resources = resources.len(), "Declared site stack");

        Ok(Self { keys, resources })
    }

    /// アセットに対応するオブジェクトのキー
    pub fn object_keys(&self) -> Vec<String> {
        self.resources
            .by_type(BUCKET_OBJECT)
            .into_iter()
            .map(|r| r.key())
            .collect()
    }
}

fn declare_bucket(config: &SiteConfiguration, domain: &str) -> Result<ResourceConfig> {
    let props = BucketProps {
        website: WebsiteConfig {
            index_document: config.index_document.clone(),
            error_document: config.error_document.clone(),
        },
        acl: CannedAcl::Private,
        tags: BTreeMap::from([
            ("Project".to_string(), config.project.clone()),
            ("ManagedBy".to_string(), MANAGED_BY.to_string()),
        ]),
    };
    Ok(ResourceConfig::new(
        BUCKET,
        format!("{}-bucket", domain),
        PROVIDER,
        serde_json::to_value(props)?,
    ))
}

fn declare_distribution(
    config: &SiteConfiguration,
    domain: &str,
    bucket_key: &str,
    identity_key: &str,
) -> Result<ResourceConfig> {
    let (aliases, viewer_certificate) = match &config.domain {
        DomainConfig::Default => (Vec::new(), ViewerCertificate::CloudfrontDefault),
        DomainConfig::Custom {
            domain,
            certificate_arn,
        } => (
            vec![domain.clone()],
            ViewerCertificate::acm(certificate_arn.expose()),
        ),
    };
    let sensitive = viewer_certificate.acm_certificate_arn().is_some();

    let props = DistributionProps::<Input> {
        enabled: true,
        aliases,
        origins: vec![Origin {
            origin_id: Input::get_att(bucket_key, "arn"),
            domain_name: Input::get_att(bucket_key, "website_endpoint"),
            s3_origin_config: S3OriginConfig {
                origin_access_identity: Input::get_att(
                    identity_key,
                    "cloudfront_access_identity_path",
                ),
            },
        }],
        default_cache_behavior: DefaultCacheBehavior::static_site(Input::get_att(
            bucket_key, "arn",
        )),
        price_class: PriceClass::PriceClass100,
        restrictions: Restrictions::none(),
        viewer_certificate,
        custom_error_responses: vec![CustomErrorResponse {
            error_code: 404,
            response_code: 404,
            response_page_path: format!("/{}", config.error_document),
        }],
        tags: BTreeMap::from([("Project".to_string(), config.project.clone())]),
    };

    let mut resource = ResourceConfig::new(
        DISTRIBUTION,
        format!("{}-cdn", domain),
        PROVIDER,
        serde_json::to_value(props)?,
    );
    if sensitive {
        resource = resource.with_sensitive(ACM_CERTIFICATE_ARN_POINTER);
    }
    Ok(resource)
}
