//! InfraFlow Cloud Infrastructure
//!
//! This crate provides the cloud provider abstraction used by the
//! provisioning workflow. A provider only has to know how to deploy and
//! destroy a single virtual machine; placement decisions (bundle, offering)
//! are made by the workflow before the provider is called.
//!
//! # Supported Providers
//!
//! - **CloudStack**: virtual machines (via the `cmk` CLI), see
//!   `infraflow-cloud-cloudstack`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            infraflow-core (workflow)            │
//! │        CreateVirtualMachines apply/undo         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                infraflow-cloud                  │
//! │  trait CloudProvider {                          │
//! │      deploy_virtual_machine / destroy_...       │
//! │  }                                              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │   cloudstack   │
//!           │    provider    │
//!           └────────────────┘
//! ```

pub mod error;
pub mod provider;

// Re-exports
pub use error::{CloudError, Result};
pub use provider::{AuthStatus, CloudProvider, DeployRequest, DeployTarget, Nic, VmDescriptor};
