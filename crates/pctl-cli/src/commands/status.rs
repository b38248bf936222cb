use std::path::Path;

use pctl_core::Config;

/// List the containers belonging to the configured stack.
pub async fn status() -> anyhow::Result<()> {
    let config = Config::load(Path::new("."))?;
    config.validate()?;

    let client = super::connect(&config)?;
    let containers = client
        .stack_containers(config.environment_id, &config.stack_name)
        .await?;

    if containers.is_empty() {
        println!("No containers found for stack '{}'", config.stack_name);
        return Ok(());
    }

    println!("Containers in stack '{}':", config.stack_name);
    for container in &containers {
        println!(
            "  {:<40} {:<10} {}",
            container.display_name(),
            container.state,
            container.status
        );
    }

    Ok(())
}
