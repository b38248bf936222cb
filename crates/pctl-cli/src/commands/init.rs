use std::path::Path;

use pctl_core::config::CONFIG_FILE_NAME;

const DEFAULT_CONFIG: &str = r#"# pctl configuration
portainer_url: https://portainer.example.com:9443
api_token: ""
environment_id: 0
stack_name: ""
compose_file: docker-compose.yml
skip_tls_verify: true

# Optional build settings for services with a `build:` directive.
#build:
#  mode: remote-build        # remote-build | load
#  parallel: auto            # auto | positive integer
#  tag_format: "pctl-{{stack}}-{{service}}:{{hash}}"
#  platforms: [linux/amd64]  # load mode only
#  extra_build_args: {}
#  force_build: false
#  warn_threshold_mb: 50
"#;

/// Write a commented default `pctl.yml` into the working directory.
pub fn init(force: bool) -> anyhow::Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);
    if path.exists() && !force {
        anyhow::bail!("{CONFIG_FILE_NAME} already exists — pass --force to overwrite it");
    }

    std::fs::write(path, DEFAULT_CONFIG)?;

    println!("Wrote {CONFIG_FILE_NAME}");
    println!("Fill in portainer_url, api_token, environment_id and stack_name,");
    println!("then run `pctl deploy`.");
    Ok(())
}
