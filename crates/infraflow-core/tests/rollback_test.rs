mod common;

use async_trait::async_trait;
use common::{FakeProvider, context, credentials, step, store_with_bundles};
use infraflow_core::{
    CancelToken, CreateVirtualMachines, ErrorCode, FaultKind, InstanceSpec, OfferingTier,
    Placement, RunState, Step, StepFault, StepResult, TopologyPolicy, Workflow, WorkflowContext,
};
use infraflow_store::{DatabaseInfraOffering, InstanceRole, ResourceStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn test_deploy_failure_compensates_earlier_vms() {
    let store = store_with_bundles(&["b1"]).await;
    let provider = Arc::new(FakeProvider::failing_at(3));
    let mut ctx = context(&store, "cache", &["a", "b", "c"]).await;

    let outcome = Workflow::new("provision")
        .step(step(store.clone(), provider.clone()))
        .run(&mut ctx)
        .await;

    assert_eq!(outcome.state, RunState::RolledBack);
    assert!(outcome.undo_failures.is_empty());
    assert_eq!(outcome.errors.error_codes, vec![ErrorCode::ProvisionFailed]);
    assert_eq!(outcome.errors.faults, vec![FaultKind::Provider]);
    assert!(outcome.errors.traceback[0].contains("insufficient capacity"));

    // Nothing was created for "c"; "b" is torn down before "a"
    assert_eq!(provider.deployed().len(), 3);
    assert_eq!(provider.destroyed(), vec!["vm-2", "vm-1"]);

    let state = store.snapshot().await;
    assert!(state.hosts.is_empty());
    assert!(state.host_attrs.is_empty());
    assert!(state.instances.is_empty());
    assert!(state.infra_offerings.is_empty());
}

#[tokio::test]
async fn test_rollback_keeps_preexisting_offering_assignment() {
    let store = store_with_bundles(&["b1"]).await;
    let provider = Arc::new(FakeProvider::failing_at(1));
    let mut ctx = context(&store, "cache", &["a"]).await;
    store
        .create_infra_offering_if_absent(&DatabaseInfraOffering {
            infra_id: ctx.databaseinfra.id,
            offering_id: "large".to_string(),
        })
        .await
        .unwrap();

    let outcome = Workflow::new("provision")
        .step(step(store.clone(), provider.clone()))
        .run(&mut ctx)
        .await;

    assert_eq!(outcome.state, RunState::RolledBack);
    assert!(!ctx.infra_offering_created);
    assert!(
        store
            .infra_offering(ctx.databaseinfra.id)
            .await
            .unwrap()
            .is_some()
    );
}

/// Wires both instances on the first VM and nothing on the others
struct FirstHostOnly;

impl TopologyPolicy for FirstHostOnly {
    fn placement(&self, index: usize, _total: usize) -> Placement {
        let instances = if index == 0 {
            vec![
                InstanceSpec {
                    role: InstanceRole::PrimaryData,
                    port: 6379,
                },
                InstanceSpec {
                    role: InstanceRole::TopologyCoordinator,
                    port: 26379,
                },
            ]
        } else {
            Vec::new()
        };

        Placement {
            tier: OfferingTier::Strong,
            instances,
            endpoint_role: None,
        }
    }
}

#[tokio::test]
async fn test_undo_shared_host_and_hosts_without_instances() {
    let store = store_with_bundles(&["b1"]).await;
    let provider = Arc::new(FakeProvider::new());
    let mut ctx = context(&store, "cache", &["h0", "h1", "h2"]).await;

    let step = CreateVirtualMachines::new(
        store.clone(),
        provider.clone(),
        Arc::new(credentials()),
        Arc::new(FirstHostOnly),
    );
    step.apply(&mut ctx).await.unwrap();
    assert_eq!(ctx.instances.len(), 2);
    assert_eq!(store.count_instances_on_host(ctx.hosts[0].id).await.unwrap(), 2);

    step.undo(&mut ctx).await.unwrap();

    // h0 goes once its last instance is removed, then h1 and h2
    assert_eq!(provider.destroyed(), vec!["vm-1", "vm-2", "vm-3"]);
    let state = store.snapshot().await;
    assert!(state.instances.is_empty());
    assert!(state.hosts.is_empty());
    assert!(state.host_attrs.is_empty());
}

#[tokio::test]
async fn test_vm_without_address_is_still_destroyed() {
    let store = store_with_bundles(&["b1"]).await;
    let provider = Arc::new(FakeProvider {
        no_address_at: Some(2),
        ..FakeProvider::default()
    });
    let mut ctx = context(&store, "cache", &["a", "b"]).await;

    let outcome = Workflow::new("provision")
        .step(step(store.clone(), provider.clone()))
        .run(&mut ctx)
        .await;

    assert_eq!(outcome.errors.faults, vec![FaultKind::Provider]);
    assert_eq!(ctx.vms_id.len(), 2);
    assert_eq!(ctx.hosts.len(), 1);
    assert_eq!(provider.destroyed(), vec!["vm-1", "vm-2"]);
    assert!(store.snapshot().await.hosts.is_empty());
}

#[tokio::test]
async fn test_vm_already_gone_counts_as_destroyed() {
    let store = store_with_bundles(&["b1"]).await;
    let provider = Arc::new(FakeProvider {
        fail_deploy_at: Some(2),
        destroy_reports_missing: true,
        ..FakeProvider::default()
    });
    let mut ctx = context(&store, "cache", &["a", "b"]).await;

    let outcome = Workflow::new("provision")
        .step(step(store.clone(), provider.clone()))
        .run(&mut ctx)
        .await;

    assert_eq!(outcome.state, RunState::RolledBack);
    assert!(outcome.undo_failures.is_empty());
    assert!(store.snapshot().await.hosts.is_empty());
}

#[tokio::test]
async fn test_cancellation_between_vms() {
    let store = store_with_bundles(&["b1"]).await;
    let token = CancelToken::new();
    let provider = Arc::new(FakeProvider {
        cancel_after: Some((1, token.clone())),
        ..FakeProvider::default()
    });
    let mut ctx = context(&store, "cache", &["a", "b", "c"])
        .await
        .with_cancel_token(token);

    let outcome = Workflow::new("provision")
        .step(step(store.clone(), provider.clone()))
        .run(&mut ctx)
        .await;

    assert_eq!(outcome.state, RunState::RolledBack);
    assert_eq!(outcome.errors.faults, vec![FaultKind::Cancelled]);
    assert_eq!(provider.deployed().len(), 1);
    assert_eq!(provider.destroyed(), vec!["vm-1"]);
    assert!(store.snapshot().await.instances.is_empty());
}

/// Counts how often it was undone
struct Marker {
    undone: Arc<AtomicUsize>,
}

#[async_trait]
impl Step for Marker {
    fn name(&self) -> &str {
        "marker"
    }

    async fn apply(&self, _ctx: &mut WorkflowContext) -> StepResult {
        Ok(())
    }

    async fn undo(&self, _ctx: &mut WorkflowContext) -> StepResult {
        self.undone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Fail;

#[async_trait]
impl Step for Fail {
    fn name(&self) -> &str {
        "fail"
    }

    async fn apply(&self, _ctx: &mut WorkflowContext) -> StepResult {
        Err(StepFault::new(FaultKind::Provider, "downstream failure"))
    }

    async fn undo(&self, _ctx: &mut WorkflowContext) -> StepResult {
        Ok(())
    }
}

#[tokio::test]
async fn test_undo_fault_is_recorded_and_compensation_continues() {
    let store = store_with_bundles(&["b1"]).await;
    let provider = Arc::new(FakeProvider {
        fail_destroy: true,
        ..FakeProvider::default()
    });
    let undone = Arc::new(AtomicUsize::new(0));
    let mut ctx = context(&store, "cache", &["a"]).await;

    let outcome = Workflow::new("provision")
        .step(Marker {
            undone: undone.clone(),
        })
        .step(step(store.clone(), provider.clone()))
        .step(Fail)
        .run(&mut ctx)
        .await;

    assert_eq!(outcome.state, RunState::RolledBack);
    assert_eq!(outcome.failed_step.as_deref(), Some("fail"));
    assert_eq!(outcome.undo_failures, vec!["create_virtual_machines"]);
    assert_eq!(
        outcome.errors.faults,
        vec![FaultKind::Provider, FaultKind::Rollback]
    );
    assert_eq!(outcome.errors.error_codes.len(), 2);
    assert_eq!(undone.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undo_continues_past_a_vm_that_cannot_be_destroyed() {
    let store = store_with_bundles(&["b1", "b2", "b3"]).await;
    let provider = Arc::new(FakeProvider {
        fail_destroy_of: Some("vm-2".to_string()),
        ..FakeProvider::default()
    });
    let mut ctx = context(&store, "cache", &["a", "b", "c"]).await;

    let step = step(store.clone(), provider.clone());
    step.apply(&mut ctx).await.unwrap();

    let fault = step.undo(&mut ctx).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::Rollback);
    assert!(fault.detail.contains("vm-2"));

    // vm-1 is still torn down after vm-2 failed
    assert_eq!(provider.destroyed(), vec!["vm-3", "vm-1"]);

    // Teardown of vm-2 stopped after its attribute record, so its host and
    // primary instance remain
    let state = store.snapshot().await;
    assert_eq!(state.hosts.len(), 1);
    assert_eq!(state.instances.len(), 1);
    assert!(state.host_attrs.is_empty());
    assert_eq!(state.instances[0].role, InstanceRole::PrimaryData);
    assert!(state.infra_offerings.is_empty());
}
