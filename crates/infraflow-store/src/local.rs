//! Local resource store
//!
//! Keeps every record in one `StoreState` guarded by a mutex. Each trait call
//! takes the mutex for its whole read-modify-write, which makes the shared
//! cursors and counters safe for concurrent provisioning runs within one
//! process. A store opened on a project directory also persists the state
//! file after each mutation and holds the state lock until it is closed, so
//! a second process cannot interleave with it. A mutation whose save fails
//! is not applied.

use crate::error::Result;
use crate::model::{
    Bundle, BundleId, DatabaseInfra, DatabaseInfraOffering, Host, HostAttr, Instance,
};
use crate::state::{StateLock, StateManager, StoreState};
use crate::store::{BundlePicker, ResourceStore};
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::Mutex;
use uuid::Uuid;

struct Persistence {
    manager: StateManager,
    lock: StateLock,
}

/// Resource store backed by memory and, optionally, a state file
pub struct StateStore {
    state: Mutex<StoreState>,
    persistence: Option<Persistence>,
}

impl StateStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(StoreState::new()),
            persistence: None,
        }
    }

    /// Open the state file under `project_root`, taking the state lock
    pub async fn open(project_root: impl AsRef<Path>) -> Result<Self> {
        let manager = StateManager::new(project_root);
        let lock = manager.acquire_lock().await?;
        let state = manager.load().await?;

        Ok(Self {
            state: Mutex::new(state),
            persistence: Some(Persistence { manager, lock }),
        })
    }

    /// Release the state lock
    pub async fn close(self) -> Result<()> {
        if let Some(persistence) = self.persistence {
            persistence.lock.release().await?;
        }
        Ok(())
    }

    /// Replace the bundles registered for a plan
    pub async fn register_bundles(&self, plan_id: &str, bundles: Vec<Bundle>) -> Result<()> {
        self.mutate(|state| {
            state.register_bundles(plan_id, bundles);
            Ok(())
        })
        .await
    }

    /// Find an infrastructure by name
    pub async fn find_infra_by_name(&self, name: &str) -> Option<DatabaseInfra> {
        self.state.lock().await.find_infra_by_name(name)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    async fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Apply `f` to the state
    ///
    /// A file-backed store applies it to a copy and only installs the copy
    /// once it is on disk, so memory never runs ahead of the state file.
    async fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock().await;
        let Some(persistence) = &self.persistence else {
            return f(&mut state);
        };

        let mut next = state.clone();
        let value = f(&mut next)?;
        persistence.manager.save(&next).await?;
        *state = next;
        Ok(value)
    }
}

#[async_trait]
impl ResourceStore for StateStore {
    async fn active_bundles(&self, plan_id: &str) -> Result<Vec<Bundle>> {
        Ok(self.read(|s| s.active_bundles(plan_id)).await)
    }

    async fn save_host(&self, host: &Host) -> Result<()> {
        self.mutate(|s| {
            s.save_host(host);
            Ok(())
        })
        .await
    }

    async fn get_host(&self, id: Uuid) -> Result<Host> {
        self.read(|s| s.get_host(id)).await
    }

    async fn delete_host(&self, id: Uuid) -> Result<()> {
        self.mutate(|s| s.delete_host(id)).await
    }

    async fn save_host_attr(&self, attr: &HostAttr) -> Result<()> {
        self.mutate(|s| s.save_host_attr(attr)).await
    }

    async fn host_attr_for(&self, host_id: Uuid) -> Result<Option<HostAttr>> {
        Ok(self.read(|s| s.host_attr_for(host_id)).await)
    }

    async fn delete_host_attr(&self, id: Uuid) -> Result<()> {
        self.mutate(|s| s.delete_host_attr(id)).await
    }

    async fn save_instance(&self, instance: &Instance) -> Result<()> {
        self.mutate(|s| s.save_instance(instance)).await
    }

    async fn delete_instance(&self, id: Uuid) -> Result<()> {
        self.mutate(|s| s.delete_instance(id)).await
    }

    async fn instances_for_infra(&self, infra_id: Uuid) -> Result<Vec<Instance>> {
        Ok(self.read(|s| s.instances_for_infra(infra_id)).await)
    }

    async fn count_instances_on_host(&self, host_id: Uuid) -> Result<usize> {
        Ok(self.read(|s| s.count_instances_on_host(host_id)).await)
    }

    async fn save_infra(&self, infra: &DatabaseInfra) -> Result<()> {
        self.mutate(|s| {
            s.save_infra(infra);
            Ok(())
        })
        .await
    }

    async fn get_infra(&self, id: Uuid) -> Result<DatabaseInfra> {
        self.read(|s| s.get_infra(id)).await
    }

    async fn increment_last_vm_created(&self, infra_id: Uuid) -> Result<u32> {
        self.mutate(|s| s.increment_last_vm_created(infra_id)).await
    }

    async fn set_infra_endpoint(&self, infra_id: Uuid, endpoint: &str) -> Result<()> {
        self.mutate(|s| s.set_infra_endpoint(infra_id, endpoint))
            .await
    }

    async fn infra_offering(&self, infra_id: Uuid) -> Result<Option<DatabaseInfraOffering>> {
        Ok(self.read(|s| s.infra_offering(infra_id)).await)
    }

    async fn create_infra_offering_if_absent(
        &self,
        assignment: &DatabaseInfraOffering,
    ) -> Result<bool> {
        self.mutate(|s| Ok(s.create_infra_offering_if_absent(assignment)))
            .await
    }

    async fn delete_infra_offering(&self, infra_id: Uuid) -> Result<()> {
        self.mutate(|s| s.delete_infra_offering(infra_id)).await
    }

    async fn advance_bundle_cursor(
        &self,
        plan_id: &str,
        infra_id: Uuid,
        pick: &BundlePicker<'_>,
    ) -> Result<BundleId> {
        self.mutate(|s| Ok(s.advance_bundle_cursor(plan_id, infra_id, pick)))
            .await
    }
}
