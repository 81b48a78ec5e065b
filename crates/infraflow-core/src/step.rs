//! Step contract

use crate::context::WorkflowContext;
use crate::error::StepFault;
use async_trait::async_trait;

pub type StepResult = Result<(), StepFault>;

/// A reversible unit of provisioning work
///
/// `apply` performs the forward work and records everything it persisted in
/// the context before returning. `undo` compensates using only what the
/// context records, so it must tolerate an `apply` that stopped partway.
#[async_trait]
pub trait Step: Send + Sync {
    /// Step name used in logs and error traces
    fn name(&self) -> &str;

    async fn apply(&self, ctx: &mut WorkflowContext) -> StepResult;

    async fn undo(&self, ctx: &mut WorkflowContext) -> StepResult;
}
