//! InfraFlow core
//!
//! Reversible provisioning of database infrastructure. A `Workflow` runs an
//! ordered list of `Step`s against one `WorkflowContext`; if any step fails,
//! the steps that were started are undone in reverse order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Workflow                          │
//! │   apply: step 0 → step 1 → ... → step n                  │
//! │   undo:  step k → ... → step 0   (on failure at step k)  │
//! └───────────────────────────┬─────────────────────────────┘
//!                             │ WorkflowContext
//!                ┌────────────▼────────────┐
//!                │  CreateVirtualMachines  │
//!                └──┬─────────┬─────────┬──┘
//!                   │         │         │
//!        ┌──────────▼──┐ ┌────▼─────┐ ┌─▼──────────────┐
//!        │BundleAllocator│ │ Topology │ │ CloudProvider  │
//!        │OfferingTiers │ │  Policy  │ │ ResourceStore  │
//!        └─────────────┘ └──────────┘ └────────────────┘
//! ```

pub mod allocator;
pub mod context;
pub mod error;
pub mod offering;
pub mod runner;
pub mod step;
pub mod steps;
pub mod topology;

// Re-exports
pub use allocator::{BundleAllocator, next_bundle};
pub use context::{CancelToken, ErrorCollector, VmNames, WorkflowContext};
pub use error::{AllocationError, ErrorCode, FaultKind, StepFault};
pub use offering::{OfferingTiers, ensure_infra_offering};
pub use runner::{RunOutcome, RunState, Workflow};
pub use step::{Step, StepResult};
pub use steps::CreateVirtualMachines;
pub use topology::{InstanceSpec, OfferingTier, Placement, SentinelTopology, TopologyPolicy};
