//! デプロイ結果の出力値

use crate::config::DomainConfig;
use crate::error::Result;
use crate::stack::StackKeys;
use serde::{Deserialize, Serialize};
use sitestack_cloud::{AttrRef, CloudError, GlobalState};

/// 運用者・後続ツール向けに公開する値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutputs {
    pub bucket_name: String,
    pub bucket_website_endpoint: String,
    pub cdn_domain: String,
    pub website_url: String,
    /// HTTPS を経由しない直接のエンドポイント（診断用）
    pub s3_website_url: String,
}

impl DeploymentOutputs {
    /// 作成済みリソースの属性から出力値を組み立てる
    pub fn from_state(domain: &DomainConfig, state: &GlobalState) -> Result<Self> {
        let keys = StackKeys::for_domain(domain);
        let attribute = |resource: &str, attribute: &str| -> Result<String> {
            let reference = AttrRef::new(resource, attribute);
            state.attribute(&reference).ok_or_else(|| {
                CloudError::AttributeResolution(format!("{} has not been realized", reference))
                    .into()
            })
        };

        let bucket_name = attribute(&keys.bucket, "id")?;
        let bucket_website_endpoint = attribute(&keys.bucket, "website_endpoint")?;
        let cdn_domain = attribute(&keys.distribution, "domain_name")?;

        let website_url = match domain {
            DomainConfig::Default => format!("https://{}", cdn_domain),
            DomainConfig::Custom { domain, .. } => format!("https://{}", domain),
        };
        let s3_website_url = format!("http://{}", bucket_website_endpoint);

        Ok(Self {
            bucket_name,
            bucket_website_endpoint,
            cdn_domain,
            website_url,
            s3_website_url,
        })
    }
}
