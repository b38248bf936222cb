mod deploy;
mod init;
mod redeploy;
mod status;

pub use deploy::deploy;
pub use init::init;
pub use redeploy::redeploy;
pub use status::status;

use std::path::Path;
use std::sync::Arc;

use pctl_build::{BuildOrchestrator, StyledLogger};
use pctl_compose::ComposeFile;
use pctl_compose::parser::validate_build_contexts;
use pctl_core::Config;
use pctl_portainer::PortainerClient;

pub(crate) fn connect(config: &Config) -> anyhow::Result<PortainerClient> {
    Ok(PortainerClient::new(
        &config.portainer_url,
        &config.api_token,
        config.skip_tls_verify,
    )?)
}

pub(crate) fn print_config_summary(config: &Config) {
    println!("Loading configuration...");
    println!("  Environment ID: {}", config.environment_id);
    println!("  Stack Name: {}", config.stack_name);
    println!("  Compose File: {}", config.compose_file);
    println!();
}

/// Read the compose file and, when it contains build directives, run
/// the build pipeline and rewrite them into image references.
///
/// Returns the compose content to hand to Portainer and whether any
/// builds ran.
pub(crate) async fn resolve_compose_content(
    config: &Config,
    force_build: bool,
) -> anyhow::Result<(String, bool)> {
    let compose_path = Path::new(&config.compose_file);
    let content = pctl_compose::read_compose_file(compose_path)?;
    let compose = ComposeFile::parse(&content)?;

    if !compose.has_build_directives() {
        println!("No build directives found, using compose file as-is");
        return Ok((content, false));
    }

    let mut build_config = config.build_config();
    if force_build {
        // CLI override on top of the configured value.
        build_config.force_build = true;
        println!("Force rebuild enabled: force_build=true (no-cache)");
    }
    build_config.validate()?;

    println!("Build directives detected, processing builds...");

    let base_dir = match compose_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let services = compose.find_services_with_build(base_dir)?;
    validate_build_contexts(&services)?;

    let client = connect(config)?;
    let logger = Arc::new(StyledLogger::new("BUILD"));
    let orchestrator = BuildOrchestrator::new(
        client,
        build_config,
        config.environment_id,
        &config.stack_name,
        logger,
    );

    let image_tags = orchestrator.build_services(services).await?;
    tracing::debug!(services = image_tags.len(), "builds finished");

    let result = pctl_compose::transform(&content, &image_tags)?;
    println!("✓ Build completed and compose file transformed");
    Ok((result.transformed_content, true))
}
