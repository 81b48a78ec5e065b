use colored::Colorize;
use infraflow_cloud_cloudstack::CloudStackProvider;
use infraflow_config::{CredentialStore, CredentialType};
use infraflow_core::{
    CancelToken, CreateVirtualMachines, RunOutcome, SentinelTopology, Workflow, WorkflowContext,
};
use infraflow_store::{DatabaseInfra, ResourceStore, StateStore};
use std::path::Path;
use std::sync::Arc;

pub async fn handle(
    env: &str,
    plan_id: &str,
    infra_name: &str,
    vms: Vec<String>,
    report: Option<&Path>,
) -> anyhow::Result<bool> {
    println!("{}", "Starting provisioning...".blue().bold());

    let settings = infraflow_config::load_settings()?;
    let environment = settings.environment(env)?.clone();
    let plan_settings = settings.plan(plan_id)?;
    let cloud = settings.get_credentials_for(env, CredentialType::Cloud)?;

    println!("Environment: {}", environment.name.cyan());
    println!("Plan: {}", plan_settings.plan.name.cyan());
    println!("Virtual machines: {}", vms.join(", ").cyan());

    let project_root = std::env::current_dir()?;
    let store = Arc::new(StateStore::open(&project_root).await?);
    store
        .register_bundles(plan_id, plan_settings.bundles.clone())
        .await?;

    let infra = match store.find_infra_by_name(infra_name).await {
        Some(infra) => {
            if infra.plan_id != plan_id || infra.environment != env {
                anyhow::bail!(
                    "infra '{}' already exists with plan '{}' in '{}'",
                    infra.name,
                    infra.plan_id,
                    infra.environment
                );
            }
            println!("Infra: {} (existing)", infra.name.cyan());
            infra
        }
        None => {
            let infra = DatabaseInfra::new(infra_name, plan_id, env);
            store.save_infra(&infra).await?;
            println!("Infra: {} (new)", infra.name.cyan());
            infra
        }
    };

    let topology = SentinelTopology {
        primary_port: settings.topology.primary_port,
        coordinator_port: settings.topology.coordinator_port,
    };
    let step = CreateVirtualMachines::new(
        store.clone(),
        Arc::new(CloudStackProvider::new(cloud.endpoint.clone())),
        Arc::new(settings.credentials.clone()),
        Arc::new(topology),
    );
    let workflow = Workflow::new("provision").step(step);

    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, rolling back after the current operation");
            signal_token.cancel();
        }
    });

    let mut ctx = WorkflowContext::new(environment, plan_settings.plan.clone(), infra, vms)
        .with_cancel_token(cancel);

    println!();
    let outcome = workflow.run(&mut ctx).await;
    signal_task.abort();

    print_summary(workflow.name(), &ctx, &outcome);

    if let Some(path) = report {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "outcome": &outcome,
            "context": &ctx,
        }))?;
        std::fs::write(path, json)?;
        println!("Report: {}", path.display().to_string().cyan());
    }

    drop(workflow);
    if let Ok(store) = Arc::try_unwrap(store) {
        store.close().await?;
    }

    Ok(outcome.is_completed())
}

fn print_summary(workflow: &str, ctx: &WorkflowContext, outcome: &RunOutcome) {
    println!();
    if outcome.is_completed() {
        println!("{}", "✓ Provisioning completed".green().bold());
        println!();
        println!("{}", format!("Hosts ({}):", ctx.hosts.len()).bold());
        for (host, attr) in ctx.hosts.iter().zip(&ctx.databaseinfraattr) {
            println!(
                "  • {} (vm {}, bundle {}, offering {})",
                host.address.cyan(),
                attr.vm_id,
                attr.bundle_id,
                host.offering_id
            );
        }
        println!("{}", format!("Instances ({}):", ctx.instances.len()).bold());
        for instance in &ctx.instances {
            println!("  • {} {}", instance.endpoint().cyan(), instance.role);
        }
        if let Some(endpoint) = &ctx.databaseinfra.endpoint {
            println!("Endpoint: {}", endpoint.green());
        }
        return;
    }

    println!(
        "{}",
        format!(
            "✗ Workflow {} failed at step {}",
            workflow,
            outcome.failed_step.as_deref().unwrap_or("-")
        )
        .red()
        .bold()
    );
    for (code, line) in outcome
        .errors
        .error_codes
        .iter()
        .zip(&outcome.errors.traceback)
    {
        println!("  {} {}", code.to_string().red(), line);
    }
    if outcome.undo_failures.is_empty() {
        println!("{}", "All created resources were rolled back".yellow());
    } else {
        println!(
            "{}",
            format!(
                "Rollback incomplete for: {}",
                outcome.undo_failures.join(", ")
            )
            .red()
        );
    }
}
