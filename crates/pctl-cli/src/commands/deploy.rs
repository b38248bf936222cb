use std::path::Path;

use pctl_core::Config;

/// Create a new stack from the (possibly transformed) compose file.
pub async fn deploy() -> anyhow::Result<()> {
    let config = Config::load(Path::new("."))?;
    config.validate()?;

    super::print_config_summary(&config);

    let (compose_content, _) = super::resolve_compose_content(&config, false).await?;

    let client = super::connect(&config)?;

    println!("Checking if stack already exists...");
    if client
        .get_stack(&config.stack_name, config.environment_id)
        .await?
        .is_some()
    {
        anyhow::bail!(
            "stack '{}' already exists in environment {} — run `pctl redeploy` to update it",
            config.stack_name,
            config.environment_id
        );
    }

    println!("Creating new stack...");
    let stack = client
        .create_stack(&config.stack_name, &compose_content, config.environment_id)
        .await?;

    println!();
    println!("✓ Stack deployed successfully!");
    println!("  ID: {}", stack.id);
    println!("  Name: {}", stack.name);
    println!("  Environment ID: {}", stack.environment_id);
    println!();
    println!("Use `pctl redeploy` to update this stack.");

    Ok(())
}
