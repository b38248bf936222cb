use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::ComposeError;

/// A `build:` directive attached to a compose service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildDirective {
    /// Build context, relative to the compose file unless absolute.
    pub context: String,
    /// Dockerfile path relative to the context.
    pub dockerfile: String,
    pub args: HashMap<String, String>,
    pub target: Option<String>,
    pub cache_from: Vec<String>,
}

/// Build information for one service, with the context resolved to an
/// absolute path.
#[derive(Debug, Clone)]
pub struct ServiceBuildInfo {
    pub service_name: String,
    pub build: BuildDirective,
    pub context_path: PathBuf,
}

/// A parsed compose document.
///
/// The YAML tree is kept whole so that a later transformation
/// re-serializes everything it does not touch.
#[derive(Debug, Clone)]
pub struct ComposeFile {
    doc: Value,
}

/// Read a compose file from disk.
pub fn read_compose_file(path: &Path) -> Result<String, ComposeError> {
    std::fs::read_to_string(path).map_err(|e| ComposeError::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

impl ComposeFile {
    pub fn parse(content: &str) -> Result<Self, ComposeError> {
        let doc: Value =
            serde_yaml::from_str(content).map_err(|e| ComposeError::Parse { source: e })?;
        if !doc.is_mapping() {
            return Err(ComposeError::NotAMapping);
        }
        Ok(Self { doc })
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }

    fn services(&self) -> Option<&Mapping> {
        self.doc.get("services").and_then(Value::as_mapping)
    }

    /// Whether any service carries a `build:` key.
    pub fn has_build_directives(&self) -> bool {
        self.services()
            .map(|services| {
                services
                    .values()
                    .any(|service| service.get("build").is_some())
            })
            .unwrap_or(false)
    }

    /// Extract build information for every service with a `build:` key,
    /// resolving each context against `base_dir`.
    ///
    /// Both compose forms are understood: the string shorthand
    /// (`build: ./dir`) and the mapping form with `context`,
    /// `dockerfile`, `args`, `target` and `cache_from` keys.
    pub fn find_services_with_build(
        &self,
        base_dir: &Path,
    ) -> Result<Vec<ServiceBuildInfo>, ComposeError> {
        let Some(services) = self.services() else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for (name, service) in services {
            let Some(service_name) = name.as_str().map(str::to_owned) else {
                continue;
            };

            let Some(build_value) = service.get("build") else {
                continue;
            };

            let build = extract_build_directive(&service_name, build_value)?;
            let context_path = resolve_context(base_dir, &build.context);
            found.push(ServiceBuildInfo {
                service_name,
                build,
                context_path,
            });
        }

        tracing::debug!(count = found.len(), "services with build directives");
        Ok(found)
    }
}

/// Check that every resolved build context is an existing directory.
pub fn validate_build_contexts(services: &[ServiceBuildInfo]) -> Result<(), ComposeError> {
    for info in services {
        if !info.context_path.is_dir() {
            return Err(ComposeError::ContextNotADirectory {
                service: info.service_name.clone(),
                path: info.context_path.clone(),
            });
        }
    }
    Ok(())
}

fn extract_build_directive(
    service_name: &str,
    build_value: &Value,
) -> Result<BuildDirective, ComposeError> {
    let mut directive = if let Some(context) = build_value.as_str() {
        // build: ./path
        BuildDirective {
            context: context.to_owned(),
            ..Default::default()
        }
    } else if build_value.is_mapping() {
        // build: { context: ..., dockerfile: ..., ... }
        let mut directive = BuildDirective::default();

        if let Some(context) = build_value.get("context").and_then(Value::as_str) {
            directive.context = context.to_owned();
        }
        if let Some(dockerfile) = build_value.get("dockerfile").and_then(Value::as_str) {
            directive.dockerfile = dockerfile.to_owned();
        }
        if let Some(args) = build_value.get("args").and_then(Value::as_mapping) {
            for (key, value) in args {
                let (Some(key), Some(value)) = (key.as_str(), value.as_str()) else {
                    continue;
                };
                directive.args.insert(key.to_owned(), value.to_owned());
            }
        }
        if let Some(target) = build_value.get("target").and_then(Value::as_str) {
            directive.target = Some(target.to_owned());
        }
        if let Some(cache_from) = build_value.get("cache_from").and_then(Value::as_sequence) {
            directive.cache_from = cache_from
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect();
        }

        directive
    } else {
        return Err(ComposeError::InvalidService(service_name.to_owned()));
    };

    if directive.context.is_empty() {
        directive.context = ".".to_owned();
    }
    if directive.dockerfile.is_empty() {
        directive.dockerfile = "Dockerfile".to_owned();
    }

    Ok(directive)
}

fn resolve_context(base_dir: &Path, context: &str) -> PathBuf {
    let context_path = Path::new(context);
    let joined = if context_path.is_absolute() {
        context_path.to_path_buf()
    } else {
        base_dir.join(context_path)
    };
    // Normalization only; the path does not need to exist yet.
    std::path::absolute(&joined).unwrap_or(joined)
}
