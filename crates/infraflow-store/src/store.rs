//! Resource store trait definition

use crate::error::Result;
use crate::model::{
    Bundle, BundleId, DatabaseInfra, DatabaseInfraOffering, Host, HostAttr, Instance,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Chooses the next bundle given the last recorded one
pub type BundlePicker<'a> = dyn Fn(Option<&str>) -> BundleId + Send + Sync + 'a;

/// Durable store for infrastructure metadata
///
/// Records written through this trait are owned by the provisioning run that
/// created them until it completes or compensates. The bundle cursors and the
/// `last_vm_created` counter are shared across runs, so implementations must
/// apply `advance_bundle_cursor` and `increment_last_vm_created` as atomic
/// read-modify-write operations.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Active bundles registered for a plan, ordered by id
    async fn active_bundles(&self, plan_id: &str) -> Result<Vec<Bundle>>;

    async fn save_host(&self, host: &Host) -> Result<()>;
    async fn get_host(&self, id: Uuid) -> Result<Host>;

    /// Delete a host; fails while instances or attributes still reference it
    async fn delete_host(&self, id: Uuid) -> Result<()>;

    async fn save_host_attr(&self, attr: &HostAttr) -> Result<()>;
    async fn host_attr_for(&self, host_id: Uuid) -> Result<Option<HostAttr>>;
    async fn delete_host_attr(&self, id: Uuid) -> Result<()>;

    async fn save_instance(&self, instance: &Instance) -> Result<()>;
    async fn delete_instance(&self, id: Uuid) -> Result<()>;

    /// Instances of an infrastructure in creation order
    async fn instances_for_infra(&self, infra_id: Uuid) -> Result<Vec<Instance>>;
    async fn count_instances_on_host(&self, host_id: Uuid) -> Result<usize>;

    async fn save_infra(&self, infra: &DatabaseInfra) -> Result<()>;
    async fn get_infra(&self, id: Uuid) -> Result<DatabaseInfra>;

    /// Atomically increment `last_vm_created` and return the new value
    async fn increment_last_vm_created(&self, infra_id: Uuid) -> Result<u32>;
    async fn set_infra_endpoint(&self, infra_id: Uuid, endpoint: &str) -> Result<()>;

    async fn infra_offering(&self, infra_id: Uuid) -> Result<Option<DatabaseInfraOffering>>;

    /// Create the assignment unless one already exists; returns whether it was created
    async fn create_infra_offering_if_absent(
        &self,
        assignment: &DatabaseInfraOffering,
    ) -> Result<bool>;
    async fn delete_infra_offering(&self, infra_id: Uuid) -> Result<()>;

    /// Atomically pick the next bundle and record it as the last used one
    ///
    /// `pick` receives the infra's last used bundle, falling back to the plan's
    /// when the infra has none. The picked id is written to both cursors.
    async fn advance_bundle_cursor(
        &self,
        plan_id: &str,
        infra_id: Uuid,
        pick: &BundlePicker<'_>,
    ) -> Result<BundleId>;
}
