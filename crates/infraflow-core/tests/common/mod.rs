use async_trait::async_trait;
use infraflow_cloud::{
    AuthStatus, CloudError, CloudProvider, DeployRequest, Nic, VmDescriptor,
};
use infraflow_config::{Credential, CredentialType};
use infraflow_core::{CancelToken, CreateVirtualMachines, SentinelTopology, WorkflowContext};
use infraflow_store::{
    Bundle, DatabaseInfra, Environment, Offering, Plan, ResourceStore, StateStore,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const PLAN_ID: &str = "redis-ha";
pub const ENVIRONMENT: &str = "dev";

/// Cloud provider double that hands out sequential VMs and records calls
#[derive(Default)]
pub struct FakeProvider {
    pub deployed: Mutex<Vec<DeployRequest>>,
    pub destroyed: Mutex<Vec<String>>,

    /// 1-based deploy call that fails
    pub fail_deploy_at: Option<usize>,

    /// Deploy succeeds but the VM comes back without an address
    pub no_address_at: Option<usize>,

    pub fail_destroy: bool,

    /// Only this VM refuses to be destroyed
    pub fail_destroy_of: Option<String>,
    pub destroy_reports_missing: bool,

    /// Cancel this token once the given number of deploys succeeded
    pub cancel_after: Option<(usize, CancelToken)>,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(call: usize) -> Self {
        Self {
            fail_deploy_at: Some(call),
            ..Self::default()
        }
    }

    pub fn deployed(&self) -> Vec<DeployRequest> {
        self.deployed.lock().unwrap().clone()
    }

    pub fn deployed_bundle_zones(&self) -> Vec<String> {
        self.deployed()
            .into_iter()
            .map(|r| r.target.zone_id)
            .collect()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn check_auth(&self) -> infraflow_cloud::Result<AuthStatus> {
        Ok(AuthStatus::ok("fake"))
    }

    async fn deploy_virtual_machine(
        &self,
        request: &DeployRequest,
    ) -> infraflow_cloud::Result<VmDescriptor> {
        let call = {
            let mut deployed = self.deployed.lock().unwrap();
            deployed.push(request.clone());
            deployed.len()
        };

        if self.fail_deploy_at == Some(call) {
            return Err(CloudError::ApiError("insufficient capacity".to_string()));
        }

        if let Some((after, token)) = &self.cancel_after {
            if call == *after {
                token.cancel();
            }
        }

        let ip_address = if self.no_address_at == Some(call) {
            None
        } else {
            Some(format!("10.0.0.{}", call))
        };

        Ok(VmDescriptor {
            id: format!("vm-{}", call),
            name: request.vm_name.clone(),
            nics: vec![Nic { ip_address }],
        })
    }

    async fn destroy_virtual_machine(
        &self,
        _project_id: &str,
        _environment: &str,
        vm_id: &str,
    ) -> infraflow_cloud::Result<()> {
        if self.fail_destroy || self.fail_destroy_of.as_deref() == Some(vm_id) {
            return Err(CloudError::ApiError(format!("cannot destroy {}", vm_id)));
        }
        self.destroyed.lock().unwrap().push(vm_id.to_string());
        if self.destroy_reports_missing {
            return Err(CloudError::ResourceNotFound(vm_id.to_string()));
        }
        Ok(())
    }
}

pub fn offering(id: &str, cpus: u32) -> Offering {
    Offering {
        id: id.to_string(),
        name: id.to_string(),
        service_offering_id: format!("so-{}", id),
        cpus,
        memory_mb: cpus * 1024,
    }
}

pub fn plan() -> Plan {
    Plan {
        id: PLAN_ID.to_string(),
        name: "Redis HA".to_string(),
        offerings: vec![offering("small", 1), offering("large", 4)],
    }
}

pub fn bundle(id: &str) -> Bundle {
    Bundle {
        id: id.to_string(),
        name: id.to_string(),
        zone_id: format!("zone-{}", id),
        template_id: "redis-template".to_string(),
        network_id: "net-1".to_string(),
        is_active: true,
    }
}

pub fn credentials() -> Vec<Credential> {
    vec![
        Credential {
            environment: ENVIRONMENT.to_string(),
            credential_type: CredentialType::Cloud,
            user: "api".to_string(),
            password: "secret".to_string(),
            project: "project-1".to_string(),
            endpoint: "dev".to_string(),
            parameters: HashMap::from([(
                "affinity_group_id".to_string(),
                "ag-1".to_string(),
            )]),
        },
        Credential {
            environment: ENVIRONMENT.to_string(),
            credential_type: CredentialType::Vm,
            user: "redis".to_string(),
            password: "vm-secret".to_string(),
            project: String::new(),
            endpoint: String::new(),
            parameters: HashMap::new(),
        },
    ]
}

/// Store with the given bundles registered for the test plan
pub async fn store_with_bundles(ids: &[&str]) -> Arc<StateStore> {
    let store = StateStore::in_memory();
    store
        .register_bundles(PLAN_ID, ids.iter().map(|id| bundle(id)).collect())
        .await
        .unwrap();
    Arc::new(store)
}

/// Fresh infra saved in `store` and a context requesting `vms`
pub async fn context(store: &StateStore, name: &str, vms: &[&str]) -> WorkflowContext {
    let infra = DatabaseInfra::new(name, PLAN_ID, ENVIRONMENT);
    store.save_infra(&infra).await.unwrap();

    WorkflowContext::new(
        Environment::new(ENVIRONMENT),
        plan(),
        infra,
        vms.iter().map(|v| v.to_string()).collect(),
    )
}

pub fn step(store: Arc<StateStore>, provider: Arc<FakeProvider>) -> CreateVirtualMachines {
    CreateVirtualMachines::new(
        store,
        provider,
        Arc::new(credentials()),
        Arc::new(SentinelTopology::default()),
    )
}
