//! Virtual machine creation and instance wiring

use crate::allocator::BundleAllocator;
use crate::context::WorkflowContext;
use crate::error::{FaultKind, StepFault};
use crate::offering::{OfferingTiers, ensure_infra_offering};
use crate::step::{Step, StepResult};
use crate::topology::TopologyPolicy;
use async_trait::async_trait;
use infraflow_cloud::{CloudError, CloudProvider, DeployRequest, DeployTarget};
use infraflow_config::{CredentialStore, CredentialType};
use infraflow_store::{Bundle, Host, HostAttr, Instance, ResourceStore, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Deploys one VM per requested name and wires instances onto them
pub struct CreateVirtualMachines {
    store: Arc<dyn ResourceStore>,
    provider: Arc<dyn CloudProvider>,
    credentials: Arc<dyn CredentialStore>,
    topology: Arc<dyn TopologyPolicy>,
}

impl CreateVirtualMachines {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        provider: Arc<dyn CloudProvider>,
        credentials: Arc<dyn CredentialStore>,
        topology: Arc<dyn TopologyPolicy>,
    ) -> Self {
        Self {
            store,
            provider,
            credentials,
            topology,
        }
    }

    fn check_request(ctx: &WorkflowContext) -> StepResult {
        if ctx.qt == 0 {
            return Err(StepFault::precondition("no virtual machines requested"));
        }
        if ctx.qt != ctx.names.vms.len() {
            return Err(StepFault::precondition(format!(
                "qt is {} but {} names were given",
                ctx.qt,
                ctx.names.vms.len()
            )));
        }
        if ctx.names.vms.iter().any(|n| n.trim().is_empty()) {
            return Err(StepFault::precondition("virtual machine names must not be blank"));
        }
        Ok(())
    }

    async fn destroy_vm(&self, project_id: &str, environment: &str, vm_id: &str) -> StepResult {
        match self
            .provider
            .destroy_virtual_machine(project_id, environment, vm_id)
            .await
        {
            Ok(()) => {
                tracing::info!("Virtual machine {} destroyed", vm_id);
                Ok(())
            }
            Err(CloudError::ResourceNotFound(_)) => {
                tracing::warn!("Virtual machine {} already gone", vm_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Tear down one instance, and its host and VM once nothing else uses them
    ///
    /// Stops at the first fault, leaving the remaining records of this
    /// instance in place.
    async fn undo_instance(
        &self,
        instance: &Instance,
        project_id: &str,
        environment: &str,
        destroyed: &mut HashSet<String>,
    ) -> StepResult {
        if self.store.count_instances_on_host(instance.host_id).await? > 1 {
            self.store.delete_instance(instance.id).await?;
            tracing::info!("Instance {} deleted", instance.endpoint());
            return Ok(());
        }

        if let Some(attr) = self.store.host_attr_for(instance.host_id).await? {
            self.store.delete_host_attr(attr.id).await?;
            destroyed.insert(attr.vm_id.clone());
            self.destroy_vm(project_id, environment, &attr.vm_id).await?;
        }

        self.store.delete_instance(instance.id).await?;
        tracing::info!("Instance {} deleted", instance.endpoint());

        self.store.delete_host(instance.host_id).await?;
        tracing::info!("Host {} deleted", instance.host_id);
        Ok(())
    }

    async fn delete_host_with_attr(&self, host_id: Uuid) -> Result<Option<HostAttr>, StoreError> {
        let attr = self.store.host_attr_for(host_id).await?;
        if let Some(attr) = &attr {
            self.store.delete_host_attr(attr.id).await?;
        }
        self.store.delete_host(host_id).await?;
        tracing::info!("Host {} deleted", host_id);
        Ok(attr)
    }
}

#[async_trait]
impl Step for CreateVirtualMachines {
    fn name(&self) -> &str {
        "create_virtual_machines"
    }

    async fn apply(&self, ctx: &mut WorkflowContext) -> StepResult {
        Self::check_request(ctx)?;

        let environment = ctx.environment.name.clone();
        let cloud_credentials = self
            .credentials
            .get_credentials_for(&environment, CredentialType::Cloud)?;
        let vm_credentials = self
            .credentials
            .get_credentials_for(&environment, CredentialType::Vm)?;
        let affinity_group_id = cloud_credentials
            .parameter("affinity_group_id")
            .map(str::to_string);

        let bundles = self.store.active_bundles(&ctx.plan.id).await?;
        ctx.plan.validate_min_bundles(&ctx.environment, bundles.len())?;
        let tiers = OfferingTiers::from_plan(&ctx.plan)?;

        let allocator = BundleAllocator::new(self.store.as_ref());
        let infra_id = ctx.databaseinfra.id;
        let total = ctx.qt;
        let names = ctx.names.vms.clone();
        let mut previous: Option<Bundle> = None;

        for (index, vm_name) in names.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                return Err(StepFault::cancelled());
            }

            let bundle = allocator
                .allocate(&ctx.plan.id, infra_id, previous.as_ref(), &bundles)
                .await?;
            let placement = self.topology.placement(index, total);
            let offering = tiers.offering(placement.tier).clone();

            if ensure_infra_offering(self.store.as_ref(), infra_id, &offering).await? {
                ctx.infra_offering_created = true;
            }

            tracing::debug!(
                "Deploying new vm {} with bundle {} and offering {}",
                vm_name,
                bundle.id,
                offering.id
            );

            let vm = self
                .provider
                .deploy_virtual_machine(&DeployRequest {
                    offering_id: offering.service_offering_id.clone(),
                    target: DeployTarget {
                        zone_id: bundle.zone_id.clone(),
                        template_id: bundle.template_id.clone(),
                        network_id: bundle.network_id.clone(),
                    },
                    project_id: cloud_credentials.project.clone(),
                    vm_name: vm_name.clone(),
                    affinity_group_id: affinity_group_id.clone(),
                })
                .await?;

            tracing::debug!("New virtual machine: {:?}", vm);
            ctx.vms_id.push(vm.id.clone());

            let mut host = Host::new(vm.primary_address()?, offering.id.clone());
            host.cloud_portal_host = true;
            host.user = vm_credentials.user.clone();
            host.password = vm_credentials.password.clone();
            self.store.save_host(&host).await?;
            tracing::info!("Host {} created", host.address);
            ctx.hosts.push(host.clone());

            let attr = HostAttr {
                id: Uuid::new_v4(),
                host_id: host.id,
                vm_id: vm.id.clone(),
                vm_user: vm_credentials.user.clone(),
                vm_password: vm_credentials.password.clone(),
                bundle_id: bundle.id.clone(),
            };
            if let Err(e) = self.store.save_host_attr(&attr).await {
                // Keep hosts and attributes paired in the context
                self.store.delete_host(host.id).await?;
                ctx.hosts.pop();
                return Err(e.into());
            }
            ctx.databaseinfraattr.push(attr);

            ctx.databaseinfra.last_vm_created =
                self.store.increment_last_vm_created(infra_id).await?;

            for spec in &placement.instances {
                let instance = Instance::new(&ctx.databaseinfra, &host, spec.role, spec.port);
                self.store.save_instance(&instance).await?;
                tracing::info!("Instance {} ({}) created", instance.endpoint(), instance.role);
                ctx.instances.push(instance);
            }

            if let Some(role) = placement.endpoint_role {
                let endpoint = ctx
                    .instances
                    .iter()
                    .rev()
                    .find(|i| i.host_id == host.id && i.role == role)
                    .map(Instance::endpoint)
                    .ok_or_else(|| {
                        StepFault::precondition(format!(
                            "topology names {} as endpoint but placed no such instance",
                            role
                        ))
                    })?;

                tracing::info!("Updating databaseinfra endpoint to {}", endpoint);
                self.store.set_infra_endpoint(infra_id, &endpoint).await?;
                ctx.databaseinfra.endpoint = Some(endpoint);
            }

            previous = Some(bundle);
        }

        Ok(())
    }

    async fn undo(&self, ctx: &mut WorkflowContext) -> StepResult {
        tracing::info!("Compensating virtual machines of infra {}", ctx.databaseinfra.name);

        let environment = ctx.environment.name.clone();
        let cloud_credentials = self
            .credentials
            .get_credentials_for(&environment, CredentialType::Cloud)?;
        let project_id = cloud_credentials.project.as_str();

        let mut destroyed: HashSet<String> = HashSet::new();
        let mut visited_hosts: HashSet<Uuid> = HashSet::new();
        let mut faults: Vec<StepFault> = Vec::new();

        if ctx.instances.is_empty() {
            for vm_id in &ctx.vms_id {
                destroyed.insert(vm_id.clone());
                if let Err(fault) = self.destroy_vm(project_id, &environment, vm_id).await {
                    faults.push(fault);
                }
            }

            for host in &ctx.hosts {
                visited_hosts.insert(host.id);
                if let Err(e) = self.delete_host_with_attr(host.id).await {
                    faults.push(e.into());
                }
            }
        } else {
            for instance in ctx.instances.iter().rev() {
                visited_hosts.insert(instance.host_id);
                if let Err(fault) = self
                    .undo_instance(instance, project_id, &environment, &mut destroyed)
                    .await
                {
                    faults.push(fault);
                }
            }
        }

        // Hosts that never got an instance wired
        for host in ctx.hosts.iter().filter(|h| !visited_hosts.contains(&h.id)) {
            let attr = match self.delete_host_with_attr(host.id).await {
                Ok(attr) => attr,
                Err(e) => {
                    faults.push(e.into());
                    continue;
                }
            };
            if let Some(attr) = attr {
                if destroyed.insert(attr.vm_id.clone()) {
                    if let Err(fault) = self.destroy_vm(project_id, &environment, &attr.vm_id).await
                    {
                        faults.push(fault);
                    }
                }
            }
        }

        // VMs created without a host record
        for vm_id in &ctx.vms_id {
            if destroyed.insert(vm_id.clone()) {
                if let Err(fault) = self.destroy_vm(project_id, &environment, vm_id).await {
                    faults.push(fault);
                }
            }
        }

        if ctx.infra_offering_created {
            match self.store.delete_infra_offering(ctx.databaseinfra.id).await {
                Ok(()) => {
                    tracing::info!("Offering assignment of infra {} deleted", ctx.databaseinfra.id)
                }
                Err(e) => faults.push(e.into()),
            }
        }

        if faults.is_empty() {
            return Ok(());
        }
        for fault in &faults {
            tracing::warn!("Compensation left behind: {}", fault);
        }
        Err(StepFault::new(
            FaultKind::Rollback,
            faults
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        ))
    }
}
