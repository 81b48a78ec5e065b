//! Cloud provider trait definition

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cloud provider abstraction trait
///
/// The provisioning workflow treats the provider as an opaque RPC boundary:
/// it asks for one virtual machine at a time and destroys them one at a time
/// during compensation. Timeouts and retries belong to the caller.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "cloudstack")
    fn name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Deploy a new virtual machine
    async fn deploy_virtual_machine(&self, request: &DeployRequest) -> Result<VmDescriptor>;

    /// Destroy a virtual machine by its provider-side id
    async fn destroy_virtual_machine(
        &self,
        project_id: &str,
        environment: &str,
        vm_id: &str,
    ) -> Result<()>;
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

/// Where a virtual machine is placed (derived from a plan bundle)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTarget {
    pub zone_id: String,
    pub template_id: String,
    pub network_id: String,
}

/// Parameters for a single virtual machine deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Provider-side service offering id (compute tier)
    pub offering_id: String,

    /// Placement derived from the allocated bundle
    pub target: DeployTarget,

    /// Project the virtual machine is billed to
    pub project_id: String,

    /// Requested virtual machine name
    pub vm_name: String,

    /// Optional affinity group
    pub affinity_group_id: Option<String>,
}

/// Network interface of a deployed virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nic {
    pub ip_address: Option<String>,
}

/// Virtual machine as reported by the provider after deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmDescriptor {
    /// Provider-side virtual machine id
    pub id: String,

    /// Virtual machine name
    pub name: String,

    /// Network interfaces, primary first
    pub nics: Vec<Nic>,
}

impl VmDescriptor {
    /// Address of the primary network interface
    pub fn primary_address(&self) -> Result<&str> {
        self.nics
            .first()
            .and_then(|nic| nic.ip_address.as_deref())
            .ok_or_else(|| {
                CloudError::InvalidResponse(format!(
                    "virtual machine {} has no address on its primary interface",
                    self.id
                ))
            })
    }
}
