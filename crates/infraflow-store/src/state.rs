//! Store state and its on-disk representation
//!
//! `StoreState` holds every record the store knows about. It is kept in
//! memory behind a mutex and, for file-backed stores, written to
//! `.infraflow/state.json` after each mutation.

use crate::error::{Result, StoreError};
use crate::model::{
    Bundle, BundleId, DatabaseInfra, DatabaseInfraOffering, Host, HostAttr, Instance,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".infraflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TEMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// All records held by a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Bundles indexed by plan id
    pub bundles: BTreeMap<String, Vec<Bundle>>,

    pub infras: HashMap<Uuid, DatabaseInfra>,
    pub infra_offerings: HashMap<Uuid, DatabaseInfraOffering>,
    pub hosts: HashMap<Uuid, Host>,
    pub host_attrs: HashMap<Uuid, HostAttr>,

    /// Instances in creation order
    pub instances: Vec<Instance>,

    /// Last used bundle per plan
    pub plan_cursors: HashMap<String, BundleId>,

    /// Last used bundle per infrastructure
    pub infra_cursors: HashMap<Uuid, BundleId>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            bundles: BTreeMap::new(),
            infras: HashMap::new(),
            infra_offerings: HashMap::new(),
            hosts: HashMap::new(),
            host_attrs: HashMap::new(),
            instances: Vec::new(),
            plan_cursors: HashMap::new(),
            infra_cursors: HashMap::new(),
        }
    }
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Replace the bundles registered for a plan
    pub fn register_bundles(&mut self, plan_id: &str, mut bundles: Vec<Bundle>) {
        bundles.sort_by(|a, b| a.id.cmp(&b.id));
        self.bundles.insert(plan_id.to_string(), bundles);
        self.touch();
    }

    pub fn active_bundles(&self, plan_id: &str) -> Vec<Bundle> {
        let mut active: Vec<Bundle> = self
            .bundles
            .get(plan_id)
            .map(|b| b.iter().filter(|b| b.is_active).cloned().collect())
            .unwrap_or_default();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }

    pub fn save_host(&mut self, host: &Host) {
        self.hosts.insert(host.id, host.clone());
        self.touch();
    }

    pub fn get_host(&self, id: Uuid) -> Result<Host> {
        self.hosts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("host", id))
    }

    pub fn delete_host(&mut self, id: Uuid) -> Result<()> {
        if !self.hosts.contains_key(&id) {
            return Err(StoreError::not_found("host", id));
        }
        if self.instances.iter().any(|i| i.host_id == id) {
            return Err(StoreError::Conflict(format!(
                "host {} is still referenced by instances",
                id
            )));
        }
        if self.host_attrs.values().any(|a| a.host_id == id) {
            return Err(StoreError::Conflict(format!(
                "host {} still has cloud attributes",
                id
            )));
        }
        self.hosts.remove(&id);
        self.touch();
        Ok(())
    }

    pub fn save_host_attr(&mut self, attr: &HostAttr) -> Result<()> {
        if !self.hosts.contains_key(&attr.host_id) {
            return Err(StoreError::not_found("host", attr.host_id));
        }
        self.host_attrs.insert(attr.id, attr.clone());
        self.touch();
        Ok(())
    }

    pub fn host_attr_for(&self, host_id: Uuid) -> Option<HostAttr> {
        self.host_attrs
            .values()
            .find(|a| a.host_id == host_id)
            .cloned()
    }

    pub fn delete_host_attr(&mut self, id: Uuid) -> Result<()> {
        self.host_attrs
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("host attribute", id))?;
        self.touch();
        Ok(())
    }

    pub fn save_instance(&mut self, instance: &Instance) -> Result<()> {
        if !self.hosts.contains_key(&instance.host_id) {
            return Err(StoreError::not_found("host", instance.host_id));
        }
        match self.instances.iter_mut().find(|i| i.id == instance.id) {
            Some(existing) => *existing = instance.clone(),
            None => self.instances.push(instance.clone()),
        }
        self.touch();
        Ok(())
    }

    pub fn delete_instance(&mut self, id: Uuid) -> Result<()> {
        let before = self.instances.len();
        self.instances.retain(|i| i.id != id);
        if self.instances.len() == before {
            return Err(StoreError::not_found("instance", id));
        }
        self.touch();
        Ok(())
    }

    pub fn instances_for_infra(&self, infra_id: Uuid) -> Vec<Instance> {
        self.instances
            .iter()
            .filter(|i| i.infra_id == infra_id)
            .cloned()
            .collect()
    }

    pub fn count_instances_on_host(&self, host_id: Uuid) -> usize {
        self.instances.iter().filter(|i| i.host_id == host_id).count()
    }

    pub fn save_infra(&mut self, infra: &DatabaseInfra) {
        self.infras.insert(infra.id, infra.clone());
        self.touch();
    }

    pub fn get_infra(&self, id: Uuid) -> Result<DatabaseInfra> {
        self.infras
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("database infra", id))
    }

    pub fn find_infra_by_name(&self, name: &str) -> Option<DatabaseInfra> {
        self.infras.values().find(|i| i.name == name).cloned()
    }

    fn infra_mut(&mut self, id: Uuid) -> Result<&mut DatabaseInfra> {
        self.infras
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("database infra", id))
    }

    pub fn increment_last_vm_created(&mut self, infra_id: Uuid) -> Result<u32> {
        let infra = self.infra_mut(infra_id)?;
        infra.last_vm_created += 1;
        let value = infra.last_vm_created;
        self.touch();
        Ok(value)
    }

    pub fn set_infra_endpoint(&mut self, infra_id: Uuid, endpoint: &str) -> Result<()> {
        self.infra_mut(infra_id)?.endpoint = Some(endpoint.to_string());
        self.touch();
        Ok(())
    }

    pub fn infra_offering(&self, infra_id: Uuid) -> Option<DatabaseInfraOffering> {
        self.infra_offerings.get(&infra_id).cloned()
    }

    pub fn create_infra_offering_if_absent(&mut self, assignment: &DatabaseInfraOffering) -> bool {
        if self.infra_offerings.contains_key(&assignment.infra_id) {
            return false;
        }
        self.infra_offerings
            .insert(assignment.infra_id, assignment.clone());
        self.touch();
        true
    }

    pub fn delete_infra_offering(&mut self, infra_id: Uuid) -> Result<()> {
        self.infra_offerings
            .remove(&infra_id)
            .ok_or_else(|| StoreError::not_found("database infra offering", infra_id))?;
        self.touch();
        Ok(())
    }

    pub fn advance_bundle_cursor(
        &mut self,
        plan_id: &str,
        infra_id: Uuid,
        pick: impl FnOnce(Option<&str>) -> BundleId,
    ) -> BundleId {
        let last = self
            .infra_cursors
            .get(&infra_id)
            .or_else(|| self.plan_cursors.get(plan_id))
            .map(String::as_str);
        let next = pick(last);

        self.infra_cursors.insert(infra_id, next.clone());
        self.plan_cursors.insert(plan_id.to_string(), next.clone());
        self.touch();
        next
    }
}

/// State manager for reading/writing the state file
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    /// Get the state directory path
    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn temp_path(&self) -> PathBuf {
        self.state_dir().join(STATE_TEMP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    ///
    /// Falls back to the backup when the state file is missing or unreadable,
    /// and only starts empty when neither exists.
    pub async fn load(&self) -> Result<StoreState> {
        let path = self.state_path();
        let backup = self.backup_path();

        let state = match read_state(&path).await {
            Ok(Some(state)) => state,
            Ok(None) if !backup.exists() => {
                tracing::debug!("State file not found, returning empty state");
                return Ok(StoreState::new());
            }
            Ok(None) | Err(StoreError::Json(_)) if backup.exists() => {
                tracing::warn!(
                    "State file {} missing or corrupt, loading backup",
                    path.display()
                );
                read_state(&backup).await?.ok_or_else(|| {
                    StoreError::StateError(format!("backup {} vanished", backup.display()))
                })?
            }
            Ok(None) => return Ok(StoreState::new()),
            Err(e) => return Err(e),
        };

        if state.version > STATE_VERSION {
            return Err(StoreError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(
            "Loaded state with {} hosts and {} instances",
            state.hosts.len(),
            state.instances.len()
        );
        Ok(state)
    }

    /// Save the state
    ///
    /// The new content goes to a temporary file that is renamed over the
    /// state file, so a failed write leaves the previous state in place.
    /// The previous state is copied to the backup first.
    pub async fn save(&self, state: &StoreState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let temp = self.temp_path();

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&temp, content).await?;

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    ///
    /// The lock file is created with `create_new`, so exactly one caller wins
    /// even when several race for it. A lock older than an hour is treated as
    /// abandoned: it is removed and creation is attempted once more.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&lock_info)?;

        for _ in 0..2 {
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await;

            match created {
                Ok(mut file) => {
                    file.write_all(content.as_bytes()).await?;
                    file.sync_all().await?;
                    tracing::debug!("Acquired state lock");
                    return Ok(StateLock {
                        lock_path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    remove_stale_lock(&lock_path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::LockError(format!(
            "{} is contended",
            lock_path.display()
        )))
    }
}

/// Read a state file, `None` when it does not exist
async fn read_state(path: &Path) -> Result<Option<StoreState>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove the lock at `lock_path` if its holder abandoned it
///
/// Fails with `LockError` while the lock is held.
async fn remove_stale_lock(lock_path: &Path) -> Result<()> {
    let content = match fs::read_to_string(lock_path).await {
        Ok(content) => content,
        // Released in the meantime
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    // An empty or partial file belongs to a holder still writing it
    let Ok(lock_info) = serde_json::from_str::<LockInfo>(&content) else {
        return Err(StoreError::LockError(
            "State lock is being acquired by another process".to_string(),
        ));
    };

    let age = Utc::now().signed_duration_since(lock_info.acquired_at);
    if age.num_hours() < 1 {
        return Err(StoreError::LockError(format!(
            "State is locked by {} since {}",
            lock_info.holder, lock_info.acquired_at
        )));
    }

    tracing::warn!("Removing stale lock from {}", lock_info.holder);
    match fs::remove_file(lock_path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
