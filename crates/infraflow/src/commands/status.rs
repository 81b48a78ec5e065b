use colored::Colorize;
use infraflow_store::{ResourceStore, StateStore};

pub async fn handle() -> anyhow::Result<()> {
    let project_root = std::env::current_dir()?;
    let store = StateStore::open(&project_root).await?;
    let state = store.snapshot().await;

    if state.infras.is_empty() {
        println!("{}", "No infrastructure recorded yet".yellow());
        store.close().await?;
        return Ok(());
    }

    let mut infras: Vec<_> = state.infras.values().collect();
    infras.sort_by(|a, b| a.name.cmp(&b.name));

    for infra in infras {
        let instances = store.instances_for_infra(infra.id).await?;

        println!(
            "{} ({} / {})",
            infra.name.cyan().bold(),
            infra.plan_id,
            infra.environment
        );
        println!("  VMs created: {}", infra.last_vm_created);
        if let Some(endpoint) = &infra.endpoint {
            println!("  Endpoint: {}", endpoint.green());
        }
        if let Some(cursor) = state.infra_cursors.get(&infra.id) {
            println!("  Last bundle: {}", cursor);
        }
        for instance in instances {
            let host = store.get_host(instance.host_id).await?;
            println!(
                "  • {} {} (offering {})",
                instance.endpoint(),
                instance.role,
                host.offering_id
            );
        }
    }

    store.close().await?;
    Ok(())
}
