//! Resource declarations and the cloud provider trait

use crate::error::Result;
use crate::input;
use crate::state::{GlobalState, ResourceState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Placeholder written in place of sensitive values
pub const REDACTED: &str = "***";

/// Realized attributes of a resource (ARN, endpoint, access path, ...)
pub type Attributes = HashMap<String, serde_json::Value>;

/// Cloud provider abstraction trait
///
/// A provider is the backend that turns one resolved declaration into a
/// real resource. Ordering, diffing and state are the engine's job; a
/// provider only creates, updates and deletes single resources and reports
/// failures verbatim.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "aws")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Create a resource and return its realized attributes
    async fn create(&self, resource: &ResolvedResource) -> Result<Attributes>;

    /// Bring an existing resource in line with its declaration
    async fn update(
        &self,
        resource: &ResolvedResource,
        current: &ResourceState,
    ) -> Result<Attributes>;

    /// Delete a previously realized resource
    async fn delete(&self, current: &ResourceState) -> Result<()>;

    /// Adopt resources recorded by an earlier run
    ///
    /// Called before planning. Providers talking to a live API have nothing
    /// to do here.
    async fn import_state(&self, _state: &GlobalState) -> Result<()> {
        Ok(())
    }
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Set of resources to be managed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    /// Resources indexed by key (type:id)
    pub resources: BTreeMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource and return its key for use in references
    pub fn add(&mut self, resource: ResourceConfig) -> String {
        let key = resource.key();
        self.resources.insert(key.clone(), resource);
        key
    }

    pub fn get(&self, resource_type: &str, id: &str) -> Option<&ResourceConfig> {
        self.resources.get(&format!("{}:{}", resource_type, id))
    }

    pub fn get_by_key(&self, key: &str) -> Option<&ResourceConfig> {
        self.resources.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceConfig> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }
}

/// Declaration of a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "s3-bucket", "cloudfront-distribution")
    pub resource_type: String,

    /// Logical resource identifier
    pub id: String,

    /// Provider name
    pub provider: String,

    /// Resource-specific configuration, may contain attribute references
    pub config: serde_json::Value,

    /// Explicit dependencies (resource keys) in addition to references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// JSON pointers into `config` whose values must never be displayed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive: Vec<String>,

    /// JSON pointers into `config` to values that only hold on this machine
    /// (local file paths); they take no part in change detection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local: Vec<String>,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            provider: provider.into(),
            config,
            depends_on: Vec::new(),
            sensitive: Vec::new(),
            local: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, key: impl Into<String>) -> Self {
        self.depends_on.push(key.into());
        self
    }

    pub fn with_sensitive(mut self, pointer: impl Into<String>) -> Self {
        self.sensitive.push(pointer.into());
        self
    }

    pub fn with_local(mut self, pointer: impl Into<String>) -> Self {
        self.local.push(pointer.into());
        self
    }

    /// Get the full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Keys of every resource this one waits on
    pub fn dependencies(&self) -> Result<BTreeSet<String>> {
        let mut deps: BTreeSet<String> = input::references(&self.config)?
            .into_iter()
            .map(|r| r.resource)
            .collect();
        deps.extend(self.depends_on.iter().cloned());
        Ok(deps)
    }

    /// Content digest of the declaration
    ///
    /// References are hashed symbolically, so the digest is known before any
    /// dependency has been realized. Values under `local` are left out.
    pub fn digest(&self) -> Result<String> {
        let mut depends_on = self.depends_on.clone();
        depends_on.sort();
        let config = replace_at(&self.config, &self.local, serde_json::Value::Null);
        let canonical = serde_json::to_vec(&(&self.resource_type, &config, &depends_on))?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }

    /// Configuration with every sensitive value replaced by [`REDACTED`]
    pub fn redacted_config(&self) -> serde_json::Value {
        redact(&self.config, &self.sensitive)
    }
}

/// Replace the values at `pointers` with [`REDACTED`]
pub fn redact(config: &serde_json::Value, pointers: &[String]) -> serde_json::Value {
    replace_at(config, pointers, serde_json::Value::String(REDACTED.to_string()))
}

fn replace_at(
    config: &serde_json::Value,
    pointers: &[String],
    with: serde_json::Value,
) -> serde_json::Value {
    let mut config = config.clone();
    for pointer in pointers {
        if let Some(v) = config.pointer_mut(pointer) {
            *v = with.clone();
        }
    }
    config
}

/// A declaration whose references have all been substituted
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// Resource key (type:id)
    pub key: String,

    pub resource_type: String,

    /// Logical resource identifier
    pub id: String,

    /// Fully resolved configuration
    pub config: serde_json::Value,
}

impl ResolvedResource {
    /// Deserialize the resolved configuration into a typed schema
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.config.clone())?)
    }
}
