use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("failed to read compose file {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse compose file")]
    Parse { source: serde_yaml::Error },

    #[error("compose file is not a mapping at the top level")]
    NotAMapping,

    #[error("service '{0}' is not a valid service definition")]
    InvalidService(String),

    #[error("service '{service}' has a build directive without a context")]
    MissingContext { service: String },

    #[error("build context for service '{service}' is not a directory: {path}")]
    ContextNotADirectory { service: String, path: PathBuf },

    #[error("service '{0}' not found in compose file")]
    ServiceNotFound(String),

    #[error("failed to serialize transformed compose file")]
    Serialize { source: serde_yaml::Error },
}
