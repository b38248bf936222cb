use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Name of the configuration file, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "pctl.yml";

/// Build mode: build the context on the remote engine.
pub const BUILD_MODE_REMOTE: &str = "remote-build";
/// Build mode: build locally, upload the image archive.
pub const BUILD_MODE_LOAD: &str = "load";
/// Parallelism derived from the remote engine's CPU count.
pub const BUILD_PARALLEL_AUTO: &str = "auto";

pub const DEFAULT_TAG_FORMAT: &str = "pctl-{{stack}}-{{service}}:{{hash}}";
pub const DEFAULT_WARN_THRESHOLD_MB: i64 = 50;

/// pctl.yml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portainer_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub environment_id: i64,
    #[serde(default)]
    pub stack_name: String,
    #[serde(default = "default_compose_file")]
    pub compose_file: String,
    #[serde(default = "default_skip_tls_verify")]
    pub skip_tls_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
}

/// `build:` section of pctl.yml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// `remote-build` or `load`
    #[serde(default = "default_build_mode")]
    pub mode: String,
    /// `auto` or a positive integer
    #[serde(default = "default_build_parallel")]
    pub parallel: String,
    /// Tag template with `{{stack}}`, `{{service}}`, `{{hash}}`, `{{timestamp}}`
    #[serde(default = "default_tag_format")]
    pub tag_format: String,
    /// Target platforms for load-mode local builds
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    /// Global build-argument overrides, merged over per-service args
    #[serde(default)]
    pub extra_build_args: HashMap<String, String>,
    /// Rebuild even when the content hash is unchanged
    #[serde(default)]
    pub force_build: bool,
    /// Warn when the build context exceeds this many megabytes
    #[serde(default = "default_warn_threshold_mb")]
    pub warn_threshold_mb: i64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: default_build_mode(),
            parallel: default_build_parallel(),
            tag_format: default_tag_format(),
            platforms: default_platforms(),
            extra_build_args: HashMap::new(),
            force_build: false,
            warn_threshold_mb: default_warn_threshold_mb(),
        }
    }
}

impl Config {
    /// Load from `pctl.yml` in the given directory.
    pub fn load(dir: &Path) -> crate::Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(crate::Error::ConfigNotFound { path: config_path });
        }

        let content =
            std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigRead {
                path: config_path.clone(),
                source: e,
            })?;

        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?;
        tracing::debug!(path = %config_path.display(), "loaded configuration");
        Ok(config)
    }

    /// Write to `pctl.yml` in the given directory.
    pub fn save(&self, dir: &Path) -> crate::Result<()> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let content = serde_yaml::to_string(self)
            .map_err(|e| crate::Error::ConfigSerialize { source: e })?;
        std::fs::write(&config_path, content).map_err(|e| crate::Error::ConfigWrite {
            path: config_path,
            source: e,
        })
    }

    /// Check that every required field is present, and that the build
    /// section (when given) is well-formed.
    pub fn validate(&self) -> crate::Result<()> {
        if self.portainer_url.is_empty() {
            return Err(crate::Error::MissingField("portainer_url"));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::MissingField("api_token"));
        }
        if self.environment_id == 0 {
            return Err(crate::Error::MissingField("environment_id"));
        }
        if self.stack_name.is_empty() {
            return Err(crate::Error::MissingField("stack_name"));
        }
        if self.compose_file.is_empty() {
            return Err(crate::Error::MissingField("compose_file"));
        }

        if let Some(build) = &self.build {
            build.validate()?;
        }

        Ok(())
    }

    /// Build configuration with defaults filled in for missing fields.
    pub fn build_config(&self) -> BuildConfig {
        let Some(build) = &self.build else {
            return BuildConfig::default();
        };

        let mut build = build.clone();
        if build.mode.is_empty() {
            build.mode = default_build_mode();
        }
        if build.parallel.is_empty() {
            build.parallel = default_build_parallel();
        }
        if build.tag_format.is_empty() {
            build.tag_format = default_tag_format();
        }
        if build.platforms.is_empty() {
            build.platforms = default_platforms();
        }
        if build.warn_threshold_mb == 0 {
            build.warn_threshold_mb = default_warn_threshold_mb();
        }
        build
    }
}

impl BuildConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.mode != BUILD_MODE_REMOTE && self.mode != BUILD_MODE_LOAD {
            return Err(crate::Error::InvalidBuildMode {
                mode: self.mode.clone(),
            });
        }

        // "auto" aside, anything unparseable degrades to sequential at
        // run time; only the values that are always wrong are rejected.
        if self.parallel != BUILD_PARALLEL_AUTO
            && (self.parallel.is_empty() || self.parallel == "0")
        {
            return Err(crate::Error::InvalidParallel {
                value: self.parallel.clone(),
            });
        }

        if self.warn_threshold_mb < 0 {
            return Err(crate::Error::NegativeWarnThreshold(self.warn_threshold_mb));
        }

        Ok(())
    }
}

fn default_compose_file() -> String {
    "docker-compose.yml".to_owned()
}

fn default_skip_tls_verify() -> bool {
    // Self-hosted Portainer instances commonly run on self-signed certs.
    true
}

fn default_build_mode() -> String {
    BUILD_MODE_REMOTE.to_owned()
}

fn default_build_parallel() -> String {
    BUILD_PARALLEL_AUTO.to_owned()
}

fn default_tag_format() -> String {
    DEFAULT_TAG_FORMAT.to_owned()
}

fn default_platforms() -> Vec<String> {
    vec!["linux/amd64".to_owned()]
}

fn default_warn_threshold_mb() -> i64 {
    DEFAULT_WARN_THRESHOLD_MB
}
