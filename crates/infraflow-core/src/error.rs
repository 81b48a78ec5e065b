//! Step faults and error codes

use infraflow_cloud::CloudError;
use infraflow_config::ConfigError;
use infraflow_store::{PlanError, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code attached to every fault surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "E_PROVISION_FAILED")]
    ProvisionFailed,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::ProvisionFailed => write!(f, "E_PROVISION_FAILED"),
        }
    }
}

/// Classification of a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Required input missing or inconsistent; nothing was touched
    Precondition,
    /// No usable bundle or offering for the plan
    Allocation,
    /// The cloud provider rejected a call
    Provider,
    /// The resource store rejected a read or write
    Persistence,
    /// Any fault raised while compensating
    Rollback,
    /// The run was cancelled
    Cancelled,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Precondition => write!(f, "precondition"),
            FaultKind::Allocation => write!(f, "allocation"),
            FaultKind::Provider => write!(f, "provider"),
            FaultKind::Persistence => write!(f, "persistence"),
            FaultKind::Rollback => write!(f, "rollback"),
            FaultKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure reported by a step's `apply` or `undo`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} fault: {detail}")]
pub struct StepFault {
    pub kind: FaultKind,
    pub detail: String,
}

impl StepFault {
    pub fn new(kind: FaultKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn precondition(detail: impl Into<String>) -> Self {
        Self::new(FaultKind::Precondition, detail)
    }

    pub fn cancelled() -> Self {
        Self::new(FaultKind::Cancelled, "run cancelled")
    }

    /// Reclassify a fault raised during compensation
    pub fn into_rollback(self) -> Self {
        if self.kind == FaultKind::Rollback {
            return self;
        }
        Self::new(FaultKind::Rollback, format!("{}: {}", self.kind, self.detail))
    }
}

/// Bundle allocation errors
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("plan {0} has no active bundle")]
    NoActiveBundle(String),

    #[error("store returned bundle {0} outside the active set")]
    UnknownBundle(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AllocationError> for StepFault {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Store(e) => e.into(),
            other => StepFault::new(FaultKind::Allocation, other.to_string()),
        }
    }
}

impl From<StoreError> for StepFault {
    fn from(err: StoreError) -> Self {
        StepFault::new(FaultKind::Persistence, err.to_string())
    }
}

impl From<CloudError> for StepFault {
    fn from(err: CloudError) -> Self {
        StepFault::new(FaultKind::Provider, err.to_string())
    }
}

impl From<PlanError> for StepFault {
    fn from(err: PlanError) -> Self {
        StepFault::new(FaultKind::Allocation, err.to_string())
    }
}

impl From<ConfigError> for StepFault {
    fn from(err: ConfigError) -> Self {
        StepFault::new(FaultKind::Precondition, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_name() {
        assert_eq!(ErrorCode::ProvisionFailed.to_string(), "E_PROVISION_FAILED");
    }

    #[test]
    fn test_into_rollback_keeps_original_kind_in_detail() {
        let fault = StepFault::new(FaultKind::Provider, "destroy failed").into_rollback();
        assert_eq!(fault.kind, FaultKind::Rollback);
        assert_eq!(fault.detail, "provider: destroy failed");

        let again = fault.clone().into_rollback();
        assert_eq!(again, fault);
    }

    #[test]
    fn test_conversions_classify_faults() {
        let fault: StepFault = AllocationError::NoActiveBundle("redis".to_string()).into();
        assert_eq!(fault.kind, FaultKind::Allocation);

        let fault: StepFault = StoreError::Conflict("busy".to_string()).into();
        assert_eq!(fault.kind, FaultKind::Persistence);

        let fault: StepFault = AllocationError::Store(StoreError::Conflict("x".into())).into();
        assert_eq!(fault.kind, FaultKind::Persistence);

        let fault: StepFault = CloudError::ApiError("quota".to_string()).into();
        assert_eq!(fault.kind, FaultKind::Provider);
    }
}
