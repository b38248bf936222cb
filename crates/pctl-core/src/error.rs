use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration file {path} not found — run `pctl init` to create it")]
    ConfigNotFound { path: PathBuf },

    #[error("failed to read configuration file {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to write configuration file {path}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize configuration")]
    ConfigSerialize { source: serde_yaml::Error },

    #[error("{0} is required in pctl.yml")]
    MissingField(&'static str),

    #[error("invalid build mode '{mode}', must be 'remote-build' or 'load'")]
    InvalidBuildMode { mode: String },

    #[error("invalid parallel value '{value}', must be 'auto' or a positive integer")]
    InvalidParallel { value: String },

    #[error("warn_threshold_mb must be non-negative, got {0}")]
    NegativeWarnThreshold(i64),
}
