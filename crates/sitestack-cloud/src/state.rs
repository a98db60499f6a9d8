//! State management for cloud resources
//!
//! Manages the `.sitestack/state.json` file which records every realized
//! resource, its declaration digest and its attributes. This is the prior
//! state that makes repeated deployments idempotent.

use crate::error::{CloudError, Result};
use crate::input::AttrRef;
use crate::provider::Attributes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".sitestack";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// A lock older than this is assumed to belong to a crashed process
const LOCK_STALE_AFTER_MINUTES: i64 = 60;

/// Global state containing every realized resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by key (type:id)
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get resources for a specific provider
    pub fn get_provider_resources(&self, provider: &str) -> Vec<(&String, &ResourceState)> {
        self.resources
            .iter()
            .filter(|(_, r)| r.provider == provider)
            .collect()
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, key: String, state: ResourceState) {
        self.resources.insert(key, state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, key: &str) -> Option<ResourceState> {
        let result = self.resources.remove(key);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Get a resource by key
    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    /// Look up a realized attribute as a string
    pub fn attribute(&self, reference: &AttrRef) -> Option<String> {
        self.resources
            .get(&reference.resource)
            .and_then(|r| r.attributes.get(&reference.attribute))
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-specific resource ID (bucket name, distribution id, ...)
    pub id: String,

    /// Logical resource identifier from the declaration
    pub name: String,

    /// Resource type
    pub resource_type: String,

    /// Provider that realized this resource
    pub provider: String,

    /// Current status
    pub status: ResourceStatus,

    /// Digest of the declaration this resource was realized from
    pub digest: String,

    /// Keys of the resources this one depended on when realized
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Resource attributes (ARN, endpoint, access path, ...)
    pub attributes: Attributes,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            provider: String::new(),
            status: ResourceStatus::Unknown,
            digest: String::new(),
            depends_on: Vec::new(),
            attributes: Attributes::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}


/// Status of a recorded resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Realized and matching the recorded digest
    Available,
    /// Recorded without confirmation from the provider
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Available => write!(f, "available"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reads and writes the state directory of one project
pub struct StateManager {
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn file(&self, name: &str) -> PathBuf {
        self.state_dir().join(name)
    }

    pub fn state_path(&self) -> PathBuf {
        self.file(STATE_FILE)
    }

    /// Load the recorded state, or an empty one on the first run
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state file yet, starting from empty state");
                return Ok(GlobalState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: GlobalState = serde_json::from_str(&content)
            .map_err(|e| CloudError::StateError(format!("{}: {}", path.display(), e)))?;
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "state file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(resources = state.resources.len(), "Loaded state");
        Ok(state)
    }

    /// Replace the state file atomically; the previous file becomes the backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        fs::create_dir_all(self.state_dir()).await?;

        let tmp = self.file(STATE_TMP);
        fs::write(&tmp, serde_json::to_vec_pretty(state)?).await?;

        let path = self.state_path();
        if fs::try_exists(&path).await? {
            fs::copy(&path, self.file(STATE_BACKUP)).await?;
        }
        fs::rename(&tmp, &path).await?;

        tracing::debug!(resources = state.resources.len(), "Saved state");
        Ok(())
    }

    /// Take the project lock
    ///
    /// Fails with [`CloudError::LockError`] while another process holds a
    /// fresh lock. A stale lock is replaced.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(self.state_dir()).await?;

        let path = self.file(LOCK_FILE);
        let info = LockInfo::current();
        let content = serde_json::to_vec_pretty(&info)?;

        // second attempt only after removing a stale lock
        for _ in 0..2 {
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match created {
                Ok(mut file) => {
                    file.write_all(&content).await?;
                    file.flush().await?;
                    tracing::debug!(pid = info.pid, "Acquired state lock");
                    return Ok(StateLock {
                        path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    match read_lock(&path).await? {
                        Some(holder) if !holder.is_stale() => {
                            return Err(CloudError::LockError(format!(
                                "state is locked by {} (pid {}) since {}",
                                holder.holder, holder.pid, holder.acquired_at
                            )));
                        }
                        Some(holder) => {
                            tracing::warn!(holder = %holder.holder, pid = holder.pid, "Removing stale state lock");
                        }
                        None => {
                            tracing::warn!(path = %path.display(), "Removing unreadable stale state lock");
                        }
                    }
                    fs::remove_file(&path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CloudError::LockError(format!(
            "could not create {}",
            path.display()
        )))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        is_stale(self.acquired_at)
    }
}

fn is_stale(since: DateTime<Utc>) -> bool {
    Utc::now().signed_duration_since(since).num_minutes() >= LOCK_STALE_AFTER_MINUTES
}

/// Holder recorded in an existing lock file
///
/// A lock file that does not parse (a holder that crashed before writing
/// it) is `None` once its modification time is stale, and a `LockError`
/// naming the file before that.
async fn read_lock(path: &Path) -> Result<Option<LockInfo>> {
    let content = fs::read(path).await?;
    if let Ok(holder) = serde_json::from_slice::<LockInfo>(&content) {
        return Ok(Some(holder));
    }

    let modified: DateTime<Utc> = fs::metadata(path).await?.modified()?.into();
    if is_stale(modified) {
        return Ok(None);
    }
    Err(CloudError::LockError(format!(
        "{} is unreadable; remove it if no other deployment is running",
        path.display()
    )))
}

/// Held project lock, removed on release or drop
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Released state lock");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bucket() -> ResourceState {
        ResourceState::new("site-bucket-1a2b3c4", "site-bucket", "s3-bucket")
            .with_status(ResourceStatus::Available)
            .with_provider("aws")
            .with_digest("abc")
            .with_attribute("arn", serde_json::json!("arn:aws:s3:::site-bucket-1a2b3c4"))
    }

    #[tokio::test]
    async fn test_round_trip_keeps_digest_and_attributes() {
        let dir = tempdir().unwrap();
        let manager = StateManager::new(dir.path());

        let mut state = GlobalState::new();
        state.set_resource("s3-bucket:site-bucket".to_string(), bucket());
        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.get_resource("s3-bucket:site-bucket").unwrap().digest, "abc");
        assert_eq!(
            loaded.attribute(&AttrRef::new("s3-bucket:site-bucket", "arn")),
            Some("arn:aws:s3:::site-bucket-1a2b3c4".to_string())
        );
        assert_eq!(loaded.get_provider_resources("aws").len(), 1);
        assert!(!dir.path().join(".sitestack/state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_first_run_has_empty_state() {
        let dir = tempdir().unwrap();
        let state = StateManager::new(dir.path()).load().await.unwrap();
        assert!(state.resources.is_empty());
        assert!(!dir.path().join(".sitestack").exists());
    }

    #[tokio::test]
    async fn test_backup_holds_previous_state() {
        let dir = tempdir().unwrap();
        let manager = StateManager::new(dir.path());

        let mut state = GlobalState::new();
        state.set_resource("s3-bucket:site-bucket".to_string(), bucket());
        manager.save(&state).await.unwrap();
        manager.save(&GlobalState::new()).await.unwrap();

        let backup = std::fs::read_to_string(dir.path().join(".sitestack/state.json.backup")).unwrap();
        assert!(backup.contains("site-bucket-1a2b3c4"));
        assert!(manager.load().await.unwrap().resources.is_empty());
    }

    #[tokio::test]
    async fn test_newer_state_version_is_rejected() {
        let dir = tempdir().unwrap();
        let manager = StateManager::new(dir.path());

        let mut state = GlobalState::new();
        state.version = STATE_VERSION + 1;
        manager.save(&state).await.unwrap();

        assert!(matches!(
            manager.load().await,
            Err(CloudError::StateError(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_state_names_the_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".sitestack")).unwrap();
        std::fs::write(dir.path().join(".sitestack/state.json"), "{not json").unwrap();

        let err = StateManager::new(dir.path()).load().await.unwrap_err();
        assert!(matches!(err, CloudError::StateError(ref msg) if msg.contains("state.json")));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let dir = tempdir().unwrap();
        let manager = StateManager::new(dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));

        lock.release().await.unwrap();
        let again = manager.acquire_lock().await.unwrap();
        drop(again);
        assert!(!dir.path().join(".sitestack/lock.json").exists());
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".sitestack")).unwrap();
        let stale = LockInfo {
            holder: "crashed".to_string(),
            pid: 1,
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(
            dir.path().join(".sitestack/lock.json"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let lock = StateManager::new(dir.path()).acquire_lock().await.unwrap();
        let content = std::fs::read_to_string(dir.path().join(".sitestack/lock.json")).unwrap();
        assert!(!content.contains("crashed"));
        lock.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_lock_file_names_the_file_until_stale() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".sitestack")).unwrap();
        let path = dir.path().join(".sitestack/lock.json");
        std::fs::write(&path, "").unwrap();
        let manager = StateManager::new(dir.path());

        let err = manager.acquire_lock().await.unwrap_err();
        assert!(matches!(err, CloudError::LockError(ref msg) if msg.contains("lock.json")));

        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(2 * 3600))
            .unwrap();
        let lock = manager.acquire_lock().await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("acquired_at"));
        lock.release().await.unwrap();
    }
}
