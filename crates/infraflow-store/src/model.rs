//! Infrastructure metadata records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type BundleId = String;
pub type OfferingId = String;

/// Deployment environment (dev, prod, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,

    /// Minimum number of active bundles a plan needs in this environment
    #[serde(default = "default_min_bundles")]
    pub min_bundles: usize,
}

fn default_min_bundles() -> usize {
    1
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_bundles: default_min_bundles(),
        }
    }
}

/// Compute tier descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub id: OfferingId,
    pub name: String,

    /// Provider-side service offering id
    pub service_offering_id: String,
    pub cpus: u32,
    pub memory_mb: u32,
}

impl Offering {
    fn capacity(&self) -> (u32, u32) {
        (self.cpus, self.memory_mb)
    }
}

/// Placement unit within a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: BundleId,
    pub name: String,
    pub zone_id: String,
    pub template_id: String,
    pub network_id: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan {0} has no offerings configured")]
    NoOfferings(String),

    #[error(
        "plan {plan} needs at least {required} active bundles in {environment}, found {active}"
    )]
    NotEnoughBundles {
        plan: String,
        environment: String,
        required: usize,
        active: usize,
    },
}

/// Deployment template: the offerings a database infrastructure may use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub offerings: Vec<Offering>,
}

impl Plan {
    /// Highest-capacity offering of the plan
    pub fn stronger_offering(&self) -> Result<&Offering, PlanError> {
        self.offerings
            .iter()
            .max_by_key(|o| o.capacity())
            .ok_or_else(|| PlanError::NoOfferings(self.name.clone()))
    }

    /// Lowest-capacity offering of the plan
    pub fn weaker_offering(&self) -> Result<&Offering, PlanError> {
        self.offerings
            .iter()
            .min_by_key(|o| o.capacity())
            .ok_or_else(|| PlanError::NoOfferings(self.name.clone()))
    }

    pub fn validate_min_bundles(
        &self,
        environment: &Environment,
        active: usize,
    ) -> Result<(), PlanError> {
        if active < environment.min_bundles {
            return Err(PlanError::NotEnoughBundles {
                plan: self.name.clone(),
                environment: environment.name.clone(),
                required: environment.min_bundles,
                active,
            });
        }
        Ok(())
    }
}

/// Logical database cluster being built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfra {
    pub id: Uuid,
    pub name: String,
    pub plan_id: String,
    pub environment: String,
    pub last_vm_created: u32,
    pub endpoint: Option<String>,
}

impl DatabaseInfra {
    pub fn new(
        name: impl Into<String>,
        plan_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            plan_id: plan_id.into(),
            environment: environment.into(),
            last_vm_created: 0,
            endpoint: None,
        }
    }
}

/// The single offering assigned to an infrastructure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfraOffering {
    pub infra_id: Uuid,
    pub offering_id: OfferingId,
}

/// Cloud-assigned compute node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: Uuid,
    pub address: String,
    pub hostname: String,
    pub offering_id: OfferingId,
    pub user: String,
    pub password: String,

    /// Created through the cloud provider (as opposed to registered by hand)
    pub cloud_portal_host: bool,
    pub created_at: DateTime<Utc>,
}

impl Host {
    pub fn new(address: impl Into<String>, offering_id: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            id: Uuid::new_v4(),
            hostname: address.clone(),
            address,
            offering_id: offering_id.into(),
            user: String::new(),
            password: String::new(),
            cloud_portal_host: false,
            created_at: Utc::now(),
        }
    }
}

/// Cloud-specific attributes of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAttr {
    pub id: Uuid,
    pub host_id: Uuid,
    pub vm_id: String,
    pub vm_user: String,
    pub vm_password: String,
    pub bundle_id: BundleId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceRole {
    /// Data-bearing database process
    PrimaryData,
    /// Coordination/quorum process (e.g. a sentinel)
    TopologyCoordinator,
}

impl std::fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceRole::PrimaryData => write!(f, "primary_data"),
            InstanceRole::TopologyCoordinator => write!(f, "topology_coordinator"),
        }
    }
}

/// Running database process bound to one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: Uuid,
    pub infra_id: Uuid,
    pub host_id: Uuid,
    pub address: String,
    pub port: u16,
    pub role: InstanceRole,
    pub is_active: bool,
}

impl Instance {
    pub fn new(infra: &DatabaseInfra, host: &Host, role: InstanceRole, port: u16) -> Self {
        Self {
            id: Uuid::new_v4(),
            infra_id: infra.id,
            host_id: host.id,
            address: host.address.clone(),
            port,
            role,
            is_active: true,
        }
    }

    /// `address:port` connection string
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
