//! Run-scoped state shared by all steps of one provisioning run

use crate::error::{ErrorCode, FaultKind, StepFault};
use infraflow_store::{DatabaseInfra, Environment, Host, HostAttr, Instance, Plan};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Names requested for the run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNames {
    /// Virtual machine names, in creation order
    pub vms: Vec<String>,
}

/// Accumulated faults of a run, as parallel lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCollector {
    pub error_codes: Vec<ErrorCode>,
    pub traceback: Vec<String>,
    pub faults: Vec<FaultKind>,
}

impl ErrorCollector {
    pub fn record(&mut self, step: &str, fault: &StepFault) {
        self.error_codes.push(ErrorCode::ProvisionFailed);
        self.faults.push(fault.kind);
        self.traceback.push(format!("{}: {}", step, fault));
    }

    pub fn is_empty(&self) -> bool {
        self.error_codes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.error_codes.len()
    }
}

/// Cooperative cancellation flag shared between the caller and a run
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Mutable state threaded through every step of a provisioning run
///
/// Inputs (`environment`, `plan`, `databaseinfra`, `names`, `qt`) are set by
/// the caller. Steps only ever append to the output lists, so after a failure
/// they describe exactly what was persisted and compensation can rely on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub environment: Environment,
    pub plan: Plan,
    pub databaseinfra: DatabaseInfra,
    pub names: VmNames,

    /// Total number of virtual machines requested
    pub qt: usize,

    pub hosts: Vec<Host>,
    pub instances: Vec<Instance>,
    pub vms_id: Vec<String>,
    pub databaseinfraattr: Vec<HostAttr>,

    /// Whether this run created the infra's offering assignment
    pub infra_offering_created: bool,

    pub exceptions: ErrorCollector,

    #[serde(skip)]
    pub cancel: CancelToken,
}

impl WorkflowContext {
    pub fn new(
        environment: Environment,
        plan: Plan,
        databaseinfra: DatabaseInfra,
        vms: Vec<String>,
    ) -> Self {
        let qt = vms.len();
        Self {
            environment,
            plan,
            databaseinfra,
            names: VmNames { vms },
            qt,
            hosts: Vec::new(),
            instances: Vec::new(),
            vms_id: Vec::new(),
            databaseinfraattr: Vec::new(),
            infra_offering_created: false,
            exceptions: ErrorCollector::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Check the structural invariants between the output lists
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.hosts.len() != self.databaseinfraattr.len() {
            return Err(format!(
                "{} hosts but {} cloud attribute records",
                self.hosts.len(),
                self.databaseinfraattr.len()
            ));
        }
        if self.vms_id.len() < self.hosts.len() || self.vms_id.len() > self.hosts.len() + 1 {
            return Err(format!(
                "{} virtual machines recorded for {} hosts",
                self.vms_id.len(),
                self.hosts.len()
            ));
        }
        for instance in &self.instances {
            if !self.hosts.iter().any(|h| h.id == instance.host_id) {
                return Err(format!(
                    "instance {} references host {} outside the run",
                    instance.id, instance.host_id
                ));
            }
        }
        Ok(())
    }
}
