use std::path::Path;

use pctl_core::Config;

/// Rebuild changed services and update the existing stack in place.
pub async fn redeploy(force_build: bool) -> anyhow::Result<()> {
    let config = Config::load(Path::new("."))?;
    config.validate()?;

    super::print_config_summary(&config);

    let (compose_content, built) = super::resolve_compose_content(&config, force_build).await?;

    let client = super::connect(&config)?;

    println!("Checking if stack exists...");
    let Some(stack) = client
        .get_stack(&config.stack_name, config.environment_id)
        .await?
    else {
        anyhow::bail!(
            "stack '{}' not found in environment {} — run `pctl deploy` to create it",
            config.stack_name,
            config.environment_id
        );
    };
    println!("  Found existing stack with ID: {}", stack.id);

    // Images we just built are already on the engine; only pull when
    // the compose file references registry images untouched by us.
    let pull_images = !built;

    println!("Updating stack...");
    client
        .update_stack(stack.id, &compose_content, pull_images, config.environment_id)
        .await?;

    println!();
    println!("✓ Stack redeployed successfully!");

    Ok(())
}
