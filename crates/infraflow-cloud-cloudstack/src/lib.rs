//! CloudStack provider for InfraFlow
//!
//! This crate implements the CloudProvider trait for Apache CloudStack,
//! enabling InfraFlow to deploy and destroy the virtual machines that back
//! a database infrastructure.
//!
//! # Requirements
//!
//! - `cmk` (CloudMonkey) must be installed
//! - API keys are managed through a cmk profile; the profile name comes from
//!   the cloud credential of the target environment
//!
//! # Example
//!
//! ```ignore
//! use infraflow_cloud::CloudProvider;
//! use infraflow_cloud_cloudstack::CloudStackProvider;
//!
//! let provider = CloudStackProvider::new("dev");
//!
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod cmk;
pub mod error;
pub mod provider;

pub use cmk::{Cmk, DeployVirtualMachineConfig, VirtualMachineInfo};
pub use error::{CloudStackError, Result};
pub use provider::CloudStackProvider;
