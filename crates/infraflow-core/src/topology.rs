//! Topology policy: which tier and which instances each VM gets

use infraflow_store::InstanceRole;
use serde::{Deserialize, Serialize};

/// Compute tier chosen for a VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingTier {
    /// Highest-capacity offering of the plan
    Strong,
    /// Lowest-capacity offering of the plan
    Weak,
}

/// An instance to create on a freshly deployed host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceSpec {
    pub role: InstanceRole,
    pub port: u16,
}

/// What a VM at a given position receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub tier: OfferingTier,

    /// Instances to wire on the VM, in creation order
    pub instances: Vec<InstanceSpec>,

    /// Role of the instance on this VM that becomes the infra endpoint
    pub endpoint_role: Option<InstanceRole>,
}

/// Maps a VM's position in the requested set to its placement
pub trait TopologyPolicy: Send + Sync {
    fn placement(&self, index: usize, total: usize) -> Placement;
}

/// Replicated key-value store guarded by sentinel-style coordinators
///
/// | index | tier   | instances                         |
/// |-------|--------|-----------------------------------|
/// | 0, 1  | strong | primary, plus coordinator if total > 1 |
/// | 2     | weak   | coordinator                       |
/// | 3..   | strong | coordinator                       |
///
/// A single-VM deployment has no coordinator: its primary is the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentinelTopology {
    pub primary_port: u16,
    pub coordinator_port: u16,
}

impl Default for SentinelTopology {
    fn default() -> Self {
        Self {
            primary_port: 6379,
            coordinator_port: 26379,
        }
    }
}

impl TopologyPolicy for SentinelTopology {
    fn placement(&self, index: usize, total: usize) -> Placement {
        let tier = if index == 2 {
            OfferingTier::Weak
        } else {
            OfferingTier::Strong
        };

        let mut instances = Vec::new();
        if index < 2 {
            instances.push(InstanceSpec {
                role: InstanceRole::PrimaryData,
                port: self.primary_port,
            });
        }

        let endpoint_role = if total == 1 {
            Some(InstanceRole::PrimaryData)
        } else {
            instances.push(InstanceSpec {
                role: InstanceRole::TopologyCoordinator,
                port: self.coordinator_port,
            });
            None
        };

        Placement {
            tier,
            instances,
            endpoint_role,
        }
    }
}
