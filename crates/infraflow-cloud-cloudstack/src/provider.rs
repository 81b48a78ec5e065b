//! CloudStack provider implementation

use crate::cmk::{Cmk, DeployVirtualMachineConfig, VirtualMachineInfo};
use crate::error::CloudStackError;
use async_trait::async_trait;
use infraflow_cloud::{AuthStatus, CloudProvider, DeployRequest, Nic, VmDescriptor};

/// CloudStack provider
pub struct CloudStackProvider {
    cmk: Cmk,
}

impl CloudStackProvider {
    /// Create a provider that talks to CloudStack through the given cmk profile
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            cmk: Cmk::new(profile),
        }
    }
}

impl From<VirtualMachineInfo> for VmDescriptor {
    fn from(info: VirtualMachineInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            nics: info
                .nic
                .into_iter()
                .map(|n| Nic {
                    ip_address: n.ip_address,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl CloudProvider for CloudStackProvider {
    fn name(&self) -> &str {
        "cloudstack"
    }

    async fn check_auth(&self) -> infraflow_cloud::Result<AuthStatus> {
        match self.cmk.check_auth().await {
            Ok(capabilities) => {
                let version = capabilities
                    .cloudstack_version
                    .unwrap_or_else(|| "unknown version".to_string());
                Ok(AuthStatus::ok(format!(
                    "profile {} (CloudStack {})",
                    self.cmk.profile(),
                    version
                )))
            }
            Err(CloudStackError::CmkNotFound) => Ok(AuthStatus::failed("cmk is not installed")),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn deploy_virtual_machine(
        &self,
        request: &DeployRequest,
    ) -> infraflow_cloud::Result<VmDescriptor> {
        tracing::info!(
            "Deploying virtual machine {} (offering {}, zone {})",
            request.vm_name,
            request.offering_id,
            request.target.zone_id
        );

        let config = DeployVirtualMachineConfig {
            name: request.vm_name.clone(),
            service_offering_id: request.offering_id.clone(),
            zone_id: request.target.zone_id.clone(),
            template_id: request.target.template_id.clone(),
            network_id: request.target.network_id.clone(),
            project_id: request.project_id.clone(),
            affinity_group_id: request.affinity_group_id.clone(),
        };

        let vm = self.cmk.deploy_virtual_machine(&config).await?;
        if !vm.is_running() {
            tracing::warn!(
                "Virtual machine {} deployed in state {}",
                vm.id,
                vm.state.as_deref().unwrap_or("unknown")
            );
        }
        Ok(vm.into())
    }

    async fn destroy_virtual_machine(
        &self,
        project_id: &str,
        environment: &str,
        vm_id: &str,
    ) -> infraflow_cloud::Result<()> {
        tracing::info!(
            "Destroying virtual machine {} (project {}, environment {})",
            vm_id,
            project_id,
            environment
        );

        self.cmk.destroy_virtual_machine(vm_id).await?;
        Ok(())
    }
}
