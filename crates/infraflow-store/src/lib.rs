//! InfraFlow resource store
//!
//! Durable records for the database infrastructure being provisioned (hosts,
//! their cloud attributes, instances, offering assignments) and the shared
//! bundle-rotation cursors. The workflow only talks to the `ResourceStore`
//! trait; `StateStore` is the bundled implementation, either purely in
//! memory or backed by `.infraflow/state.json`.

pub mod error;
pub mod local;
pub mod model;
pub mod state;
pub mod store;

// Re-exports
pub use error::{Result, StoreError};
pub use local::StateStore;
pub use model::{
    Bundle, BundleId, DatabaseInfra, DatabaseInfraOffering, Environment, Host, HostAttr,
    Instance, InstanceRole, Offering, OfferingId, Plan, PlanError,
};
pub use state::{StateLock, StateManager, StoreState};
pub use store::{BundlePicker, ResourceStore};
