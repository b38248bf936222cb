use std::collections::HashMap;

use crate::error::ApiError;
use crate::stream::ByteStream;

/// Options for a remote image build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub tag: String,
    /// Dockerfile path relative to the context root.
    pub dockerfile: String,
    pub build_args: HashMap<String, String>,
    /// Build stage to stop at.
    pub target: Option<String>,
    pub no_cache: bool,
}

/// Remote engine operations the build orchestrator depends on.
///
/// Production code uses [`crate::PortainerClient`]; orchestrator tests
/// substitute an in-memory double.
#[allow(async_fn_in_trait)]
pub trait BuildEngine: Send + Sync {
    /// Whether an image with the given tag exists on the environment's
    /// engine.
    async fn image_exists(&self, env_id: i64, tag: &str) -> Result<bool, ApiError>;

    /// Build an image on the remote engine from a streamed tar context,
    /// forwarding every emitted output line.
    async fn build_image(
        &self,
        env_id: i64,
        context: ByteStream,
        options: &BuildOptions,
        on_line: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<(), ApiError>;

    /// Upload a locally built image archive to the remote engine,
    /// forwarding progress lines.
    async fn load_image(
        &self,
        env_id: i64,
        image: ByteStream,
        on_line: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<(), ApiError>;

    /// Raw `docker info` of the environment's engine. Only the numeric
    /// `NCPU` field is consumed today.
    async fn host_info(&self, env_id: i64)
    -> Result<serde_json::Map<String, serde_json::Value>, ApiError>;
}
