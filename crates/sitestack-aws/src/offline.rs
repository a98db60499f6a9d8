//! Offline AWS provider
//!
//! Realizes S3 and CloudFront declarations in memory with the same
//! attribute shapes AWS returns (bucket ARNs, website endpoints, OAI
//! principals, distribution domains) and the same rejections for invalid
//! requests. Used for previews, local dry runs and tests; nothing leaves the
//! process.

use crate::error::{AwsError, Result};
use crate::policy::PolicyDocument;
use crate::resources::{
    BUCKET, BUCKET_OBJECT, BUCKET_POLICY, BucketObjectProps, BucketPolicyProps, BucketProps,
    DISTRIBUTION, DistributionProps, ORIGIN_ACCESS_IDENTITY, OriginAccessIdentityProps, PROVIDER,
    ViewerCertificate,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sitestack_cloud::{
    Attributes, AuthStatus, CloudProvider, GlobalState, ResolvedResource, ResourceState,
};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::RwLock;

const DEFAULT_ACCOUNT_ID: &str = "000000000000";
const OAI_PATH_PREFIX: &str = "origin-access-identity/cloudfront/";
const OAI_PRINCIPAL_PREFIX: &str = "arn:aws:iam::cloudfront:user/CloudFront Origin Access Identity ";
/// Route 53 hosted zone of every CloudFront distribution
const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// Object as stored in a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub size: usize,
    pub etag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionStatus {
    InProgress,
    Deployed,
}

impl std::fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionStatus::InProgress => write!(f, "InProgress"),
            DistributionStatus::Deployed => write!(f, "Deployed"),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredDistribution {
    status: DistributionStatus,
    domain_name: String,
    oai_id: String,
}

#[derive(Debug, Default)]
struct Store {
    buckets: BTreeSet<String>,
    objects: BTreeMap<(String, String), StoredObject>,
    identities: BTreeSet<String>,
    distributions: BTreeMap<String, StoredDistribution>,
    policies: BTreeMap<String, PolicyDocument<String>>,
    mutations: usize,
    fail_on: BTreeSet<String>,
}

/// In-memory AWS provider
pub struct OfflineAwsProvider {
    region: String,
    account_id: String,
    distribution_delay: Duration,
    store: RwLock<Store>,
}

impl OfflineAwsProvider {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            distribution_delay: Duration::ZERO,
            store: RwLock::new(Store::default()),
        }
    }

    /// Simulate CloudFront's propagation time
    pub fn with_distribution_delay(mut self, delay: Duration) -> Self {
        self.distribution_delay = delay;
        self
    }

    /// Make every request for `resource_key` fail
    pub async fn inject_failure(&self, resource_key: impl Into<String>) {
        self.store.write().await.fail_on.insert(resource_key.into());
    }

    pub async fn clear_failures(&self) {
        self.store.write().await.fail_on.clear();
    }

    /// Number of successful create/update/delete calls so far
    pub async fn mutation_count(&self) -> usize {
        self.store.read().await.mutations
    }

    pub async fn bucket_names(&self) -> Vec<String> {
        self.store.read().await.buckets.iter().cloned().collect()
    }

    /// Keys of the objects stored in a bucket
    pub async fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.store
            .read()
            .await
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.store
            .read()
            .await
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn bucket_policy(&self, bucket: &str) -> Option<PolicyDocument<String>> {
        self.store.read().await.policies.get(bucket).cloned()
    }

    pub async fn distribution_status(&self, id: &str) -> Option<DistributionStatus> {
        self.store
            .read()
            .await
            .distributions
            .get(id)
            .map(|d| d.status)
    }

    pub async fn distribution_domain(&self, id: &str) -> Option<String> {
        self.store
            .read()
            .await
            .distributions
            .get(id)
            .map(|d| d.domain_name.clone())
    }

    fn bucket_arn(name: &str) -> String {
        format!("arn:aws:s3:::{}", name)
    }

    fn website_endpoint(&self, name: &str) -> String {
        format!("{}.s3-website-{}.amazonaws.com", name, self.region)
    }

    /// Deterministic pseudo-random suffix for physical names
    fn suffix(&self, seed: &str) -> String {
        let digest = Sha256::digest(format!("{}/{}/{}", self.account_id, self.region, seed));
        hex::encode(digest)
    }

    async fn check_injected(&self, key: &str) -> Result<()> {
        if self.store.read().await.fail_on.contains(key) {
            return Err(AwsError::InjectedFailure(key.to_string()));
        }
        Ok(())
    }

    async fn put_bucket(
        &self,
        resource: &ResolvedResource,
        current: Option<&ResourceState>,
    ) -> Result<Attributes> {
        resource.parse::<BucketProps>()?;
        let name = match current {
            Some(current) => current.id.clone(),
            None => format!("{}-{}", resource.id, &self.suffix(&resource.key)[..7]),
        };
        validate_bucket_name(&name)?;

        let mut store = self.store.write().await;
        if current.is_none() && store.buckets.contains(&name) {
            return Err(AwsError::BucketAlreadyExists(name));
        }
        store.buckets.insert(name.clone());
        store.mutations += 1;

        Ok(attributes([
            ("id", name.clone()),
            ("arn", Self::bucket_arn(&name)),
            ("bucket_domain_name", format!("{}.s3.amazonaws.com", name)),
            ("website_endpoint", self.website_endpoint(&name)),
            ("region", self.region.clone()),
        ]))
    }

    async fn put_object(
        &self,
        resource: &ResolvedResource,
        current: Option<&ResourceState>,
    ) -> Result<Attributes> {
        let props: BucketObjectProps<String> = resource.parse()?;

        if !self.store.read().await.buckets.contains(&props.bucket) {
            return Err(AwsError::NoSuchBucket(props.bucket));
        }

        let body = tokio::fs::read(&props.source).await?;
        let etag = hex::encode(Sha256::digest(&body));
        if etag != props.etag {
            return Err(AwsError::BadDigest(format!(
                "{} changed since it was scanned",
                props.source.display()
            )));
        }

        let mut store = self.store.write().await;
        // An object that moved to another bucket or key is a replacement
        if let Some(current) = current {
            let previous = (
                current.get_attribute::<String>("bucket").unwrap_or_default(),
                current.get_attribute::<String>("key").unwrap_or_default(),
            );
            if (previous.0 != props.bucket || previous.1 != props.key)
                && store.objects.remove(&previous).is_some()
            {
                tracing::debug!(bucket = %previous.0, key = %previous.1, "Removed replaced object");
            }
        }
        store.objects.insert(
            (props.bucket.clone(), props.key.clone()),
            StoredObject {
                content_type: props.content_type.clone(),
                size: body.len(),
                etag: etag.clone(),
            },
        );
        store.mutations += 1;

        Ok(attributes([
            ("id", format!("{}/{}", props.bucket, props.key)),
            ("bucket", props.bucket),
            ("key", props.key),
            ("etag", etag),
            ("content_type", props.content_type),
            ("size", body.len().to_string()),
        ]))
    }

    async fn put_identity(
        &self,
        resource: &ResolvedResource,
        current: Option<&ResourceState>,
    ) -> Result<Attributes> {
        resource.parse::<OriginAccessIdentityProps>()?;
        let id = match current {
            Some(current) => current.id.clone(),
            None => format!("E{}", self.suffix(&resource.key)[..13].to_uppercase()),
        };

        let mut store = self.store.write().await;
        store.identities.insert(id.clone());
        store.mutations += 1;

        Ok(attributes([
            ("id", id.clone()),
            ("iam_arn", format!("{}{}", OAI_PRINCIPAL_PREFIX, id)),
            (
                "cloudfront_access_identity_path",
                format!("{}{}", OAI_PATH_PREFIX, id),
            ),
        ]))
    }

    async fn put_distribution(
        &self,
        resource: &ResolvedResource,
        current: Option<&ResourceState>,
    ) -> Result<Attributes> {
        let props: DistributionProps<String> = resource.parse()?;
        validate_viewer_certificate(&props)?;

        let behavior = &props.default_cache_behavior;
        if !(behavior.min_ttl <= behavior.default_ttl && behavior.default_ttl <= behavior.max_ttl)
        {
            return Err(AwsError::InvalidArgument(
                "TTLs must satisfy min <= default <= max".to_string(),
            ));
        }
        if let Some(page) = props
            .custom_error_responses
            .iter()
            .find(|r| !r.response_page_path.starts_with('/'))
        {
            return Err(AwsError::InvalidArgument(format!(
                "response page path must start with '/': {}",
                page.response_page_path
            )));
        }

        let [origin] = props.origins.as_slice() else {
            return Err(AwsError::InvalidArgument(format!(
                "expected exactly one origin, found {}",
                props.origins.len()
            )));
        };
        if behavior.target_origin_id != origin.origin_id {
            return Err(AwsError::InvalidArgument(format!(
                "default cache behavior targets unknown origin {}",
                behavior.target_origin_id
            )));
        }
        let oai_id = origin
            .s3_origin_config
            .origin_access_identity
            .strip_prefix(OAI_PATH_PREFIX)
            .map(str::to_string)
            .ok_or_else(|| {
                AwsError::InvalidOriginAccessIdentity(
                    origin.s3_origin_config.origin_access_identity.clone(),
                )
            })?;

        let id = match current {
            Some(current) => current.id.clone(),
            None => format!("E{}", self.suffix(&format!("{}#cdn", resource.key))[..13].to_uppercase()),
        };
        let domain_name = format!(
            "d{}.cloudfront.net",
            &self.suffix(&format!("{}#domain", resource.key))[..13]
        );

        {
            let mut store = self.store.write().await;
            if !store.identities.contains(&oai_id) {
                return Err(AwsError::InvalidOriginAccessIdentity(oai_id));
            }
            let known_origin = store
                .buckets
                .iter()
                .any(|b| self.website_endpoint(b) == origin.domain_name);
            if !known_origin {
                return Err(AwsError::InvalidArgument(format!(
                    "origin {} is not a bucket website endpoint",
                    origin.domain_name
                )));
            }
            store.distributions.insert(
                id.clone(),
                StoredDistribution {
                    status: DistributionStatus::InProgress,
                    domain_name: domain_name.clone(),
                    oai_id: oai_id.clone(),
                },
            );
        }

        // Edge propagation; the lock is not held while waiting
        if !self.distribution_delay.is_zero() {
            tracing::debug!(distribution = %id, "Waiting for distribution to deploy");
            tokio::time::sleep(self.distribution_delay).await;
        }

        let mut store = self.store.write().await;
        if let Some(distribution) = store.distributions.get_mut(&id) {
            distribution.status = DistributionStatus::Deployed;
        }
        store.mutations += 1;

        Ok(attributes([
            ("id", id.clone()),
            (
                "arn",
                format!("arn:aws:cloudfront::{}:distribution/{}", self.account_id, id),
            ),
            ("domain_name", domain_name),
            ("hosted_zone_id", CLOUDFRONT_HOSTED_ZONE_ID.to_string()),
            ("status", DistributionStatus::Deployed.to_string()),
            ("origin_access_identity", oai_id),
        ]))
    }

    async fn put_policy(&self, resource: &ResolvedResource) -> Result<Attributes> {
        let props: BucketPolicyProps<String> = resource.parse()?;

        let mut store = self.store.write().await;
        if !store.buckets.contains(&props.bucket) {
            return Err(AwsError::NoSuchBucket(props.bucket));
        }
        if !store.identities.contains(&props.origin_access_identity) {
            return Err(AwsError::InvalidOriginAccessIdentity(
                props.origin_access_identity,
            ));
        }
        props.policy.validate_read_only(
            &Self::bucket_arn(&props.bucket),
            &format!("{}{}", OAI_PRINCIPAL_PREFIX, props.origin_access_identity),
        )?;

        let policy = props.policy.to_json()?;
        store.policies.insert(props.bucket.clone(), props.policy);
        store.mutations += 1;

        Ok(attributes([("id", props.bucket), ("policy", policy)]))
    }

    /// Rebuild the store from resources recorded in state
    async fn import(&self, state: &GlobalState) -> Result<()> {
        let mut store = self.store.write().await;
        let mut imported = 0;
        for (_, resource) in state.get_provider_resources(PROVIDER) {
            let text = |key: &str| resource.get_attribute::<String>(key).unwrap_or_default();
            match resource.resource_type.as_str() {
                BUCKET => {
                    store.buckets.insert(resource.id.clone());
                }
                BUCKET_OBJECT => {
                    store.objects.insert(
                        (text("bucket"), text("key")),
                        StoredObject {
                            content_type: text("content_type"),
                            size: text("size").parse().unwrap_or_default(),
                            etag: text("etag"),
                        },
                    );
                }
                ORIGIN_ACCESS_IDENTITY => {
                    store.identities.insert(resource.id.clone());
                }
                DISTRIBUTION => {
                    store.distributions.insert(
                        resource.id.clone(),
                        StoredDistribution {
                            status: DistributionStatus::Deployed,
                            domain_name: text("domain_name"),
                            oai_id: text("origin_access_identity"),
                        },
                    );
                }
                BUCKET_POLICY => {
                    let policy: PolicyDocument<String> = serde_json::from_str(&text("policy"))?;
                    store.policies.insert(resource.id.clone(), policy);
                }
                other => return Err(AwsError::UnsupportedResource(other.to_string())),
            }
            imported += 1;
        }
        tracing::debug!(resources = imported, "Imported recorded resources");
        Ok(())
    }

    async fn put(
        &self,
        resource: &ResolvedResource,
        current: Option<&ResourceState>,
    ) -> Result<Attributes> {
        self.check_injected(&resource.key).await?;
        match resource.resource_type.as_str() {
            BUCKET => self.put_bucket(resource, current).await,
            BUCKET_OBJECT => self.put_object(resource, current).await,
            ORIGIN_ACCESS_IDENTITY => self.put_identity(resource, current).await,
            DISTRIBUTION => self.put_distribution(resource, current).await,
            BUCKET_POLICY => self.put_policy(resource).await,
            other => Err(AwsError::UnsupportedResource(other.to_string())),
        }
    }

    async fn remove(&self, current: &ResourceState) -> Result<()> {
        self.check_injected(&format!("{}:{}", current.resource_type, current.name))
            .await?;

        let mut store = self.store.write().await;
        match current.resource_type.as_str() {
            BUCKET => {
                if store.objects.keys().any(|(b, _)| *b == current.id) {
                    return Err(AwsError::BucketNotEmpty(current.id.clone()));
                }
                store.policies.remove(&current.id);
                if !store.buckets.remove(&current.id) {
                    return Err(AwsError::NoSuchBucket(current.id.clone()));
                }
            }
            BUCKET_OBJECT => {
                let bucket: String = current.get_attribute("bucket").unwrap_or_default();
                let key: String = current.get_attribute("key").unwrap_or_default();
                store
                    .objects
                    .remove(&(bucket, key))
                    .ok_or_else(|| AwsError::NoSuchResource(current.id.clone()))?;
            }
            ORIGIN_ACCESS_IDENTITY => {
                if store.distributions.values().any(|d| d.oai_id == current.id) {
                    return Err(AwsError::OriginAccessIdentityInUse(current.id.clone()));
                }
                if !store.identities.remove(&current.id) {
                    return Err(AwsError::NoSuchResource(current.id.clone()));
                }
            }
            DISTRIBUTION => {
                store
                    .distributions
                    .remove(&current.id)
                    .ok_or_else(|| AwsError::NoSuchResource(current.id.clone()))?;
            }
            BUCKET_POLICY => {
                store
                    .policies
                    .remove(&current.id)
                    .ok_or_else(|| AwsError::NoSuchResource(current.id.clone()))?;
            }
            other => return Err(AwsError::UnsupportedResource(other.to_string())),
        }
        store.mutations += 1;
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for OfflineAwsProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn display_name(&self) -> &str {
        "AWS (offline)"
    }

    async fn check_auth(&self) -> sitestack_cloud::Result<AuthStatus> {
        Ok(AuthStatus::ok(format!(
            "offline account {} ({})",
            self.account_id, self.region
        )))
    }

    async fn create(&self, resource: &ResolvedResource) -> sitestack_cloud::Result<Attributes> {
        Ok(self.put(resource, None).await?)
    }

    async fn update(
        &self,
        resource: &ResolvedResource,
        current: &ResourceState,
    ) -> sitestack_cloud::Result<Attributes> {
        Ok(self.put(resource, Some(current)).await?)
    }

    async fn delete(&self, current: &ResourceState) -> sitestack_cloud::Result<()> {
        Ok(self.remove(current).await?)
    }

    async fn import_state(&self, state: &GlobalState) -> sitestack_cloud::Result<()> {
        Ok(self.import(state).await?)
    }
}

fn attributes<const N: usize>(pairs: [(&str, String); N]) -> Attributes {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
        .collect()
}

fn validate_bucket_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if !(3..=63).contains(&name.len()) || !valid_chars || !valid_edges || name.contains("..") {
        return Err(AwsError::InvalidBucketName(name.to_string()));
    }
    Ok(())
}

/// Aliases require an ACM certificate; the default certificate serves only
/// the `*.cloudfront.net` domain
fn validate_viewer_certificate(props: &DistributionProps<String>) -> Result<()> {
    match &props.viewer_certificate {
        ViewerCertificate::CloudfrontDefault if !props.aliases.is_empty() => {
            Err(AwsError::InvalidViewerCertificate(
                "aliases require an ACM certificate".to_string(),
            ))
        }
        ViewerCertificate::Acm { .. } if props.aliases.is_empty() => {
            Err(AwsError::InvalidViewerCertificate(
                "an ACM certificate requires at least one alias".to_string(),
            ))
        }
        ViewerCertificate::Acm {
            acm_certificate_arn,
            ..
        } if !acm_certificate_arn.starts_with("arn:") => Err(AwsError::InvalidViewerCertificate(
            "certificate is not an ARN".to_string(),
        )),
        _ => Ok(()),
    }
}
