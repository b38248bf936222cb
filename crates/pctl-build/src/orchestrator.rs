use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::Semaphore;

use pctl_compose::ServiceBuildInfo;
use pctl_core::BuildConfig;
use pctl_core::config::{BUILD_MODE_LOAD, BUILD_MODE_REMOTE, BUILD_PARALLEL_AUTO};
use pctl_portainer::{ApiError, BuildEngine, BuildOptions, ByteStream};

use crate::context::{ContextArchiver, ContextError, PIPE_DEPTH};
use crate::hasher::{ContentHasher, HashError};
use crate::logger::BuildLogger;
use crate::tag::{TagError, TagGenerator, validate_template};

/// Build execution strategy, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Stream the context to the remote engine and build there.
    RemoteBuild,
    /// Build locally with buildx, upload the image archive.
    Load,
}

impl BuildMode {
    pub fn parse(mode: &str) -> Result<Self, OrchestratorError> {
        match mode {
            BUILD_MODE_REMOTE => Ok(Self::RemoteBuild),
            BUILD_MODE_LOAD => Ok(Self::Load),
            other => Err(OrchestratorError::UnsupportedMode(other.to_owned())),
        }
    }
}

/// Why one service's build failed.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to generate content hash: {0}")]
    Hash(#[from] HashError),

    #[error("failed to create context archive: {0}")]
    Context(#[from] ContextError),

    #[error("remote build failed: {0}")]
    RemoteBuild(#[source] ApiError),

    #[error("local build failed: {0}")]
    LocalBuild(#[source] io::Error),

    #[error("failed to load image: {0}")]
    Load(#[source] ApiError),

    #[error("build task interrupted")]
    Interrupted,
}

/// Result of building a single service. Written once by its own task,
/// consumed only by the aggregation step.
#[derive(Debug)]
pub struct BuildResult {
    pub service_name: String,
    /// Empty on failure.
    pub image_tag: String,
    pub success: bool,
    pub error: Option<BuildError>,
}

impl BuildResult {
    fn ok(service_name: String, image_tag: String) -> Self {
        Self {
            service_name,
            image_tag,
            success: true,
            error: None,
        }
    }

    fn failed(service_name: String, error: BuildError) -> Self {
        Self {
            service_name,
            image_tag: String::new(),
            success: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("unsupported build mode: {0}")]
    UnsupportedMode(String),

    #[error("invalid tag format: {0}")]
    InvalidTagTemplate(#[from] TagError),

    #[error("build failed for {failed} service(s): {first}")]
    BuildsFailed { failed: usize, first: BuildError },
}

/// Coordinates the build of every service with a build directive.
///
/// Generic over the remote engine so tests can substitute a double for
/// the network; the logger is an explicit shared instance, not global
/// state.
pub struct BuildOrchestrator<E, L> {
    client: E,
    config: BuildConfig,
    env_id: i64,
    stack_name: String,
    logger: Arc<L>,
}

impl<E, L> BuildOrchestrator<E, L>
where
    E: BuildEngine,
    L: BuildLogger + 'static,
{
    pub fn new(
        client: E,
        config: BuildConfig,
        env_id: i64,
        stack_name: &str,
        logger: Arc<L>,
    ) -> Self {
        Self {
            client,
            config,
            env_id,
            stack_name: stack_name.to_owned(),
            logger,
        }
    }

    /// Build every given service and return the service-name → image-tag
    /// map, but only when all of them succeeded.
    ///
    /// Any failure makes the whole run fail with an aggregate error and
    /// discards the tags of the services that did succeed; the sibling
    /// builds still run to completion first. Empty input is an empty
    /// map.
    pub async fn build_services(
        &self,
        services: Vec<ServiceBuildInfo>,
    ) -> Result<HashMap<String, String>, OrchestratorError> {
        if services.is_empty() {
            return Ok(HashMap::new());
        }

        // Configuration problems are fatal before any build starts.
        let mode = BuildMode::parse(&self.config.mode)?;
        validate_template(&self.config.tag_format)?;

        self.logger.info(&format!(
            "Building {} service(s) with build directives",
            services.len()
        ));

        let parallel = self.parallelism().await;
        self.logger.info(&format!("Using parallelism: {parallel}"));

        // Every service task starts immediately; the gate only rations
        // the build/upload section, so hashing, tag generation and the
        // existence probe run eagerly.
        let gate = Semaphore::new(parallel);
        let mut running: FuturesUnordered<_> = services
            .into_iter()
            .map(|service| self.build_service(service, mode, &gate))
            .collect();

        let mut image_tags = HashMap::new();
        let mut failed = 0usize;
        let mut first_error: Option<BuildError> = None;

        // Results arrive in completion order; a failure never cancels
        // the services still in flight.
        while let Some(result) = running.next().await {
            if result.success {
                self.logger.info(&format!(
                    "✓ Built {} -> {}",
                    result.service_name, result.image_tag
                ));
                image_tags.insert(result.service_name, result.image_tag);
            } else {
                let error = result.error.unwrap_or(BuildError::Interrupted);
                self.logger.error(&format!(
                    "✗ Failed to build {}: {error}",
                    result.service_name
                ));
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }

        if failed > 0 {
            let first = first_error.unwrap_or(BuildError::Interrupted);
            return Err(OrchestratorError::BuildsFailed { failed, first });
        }

        self.logger.info(&format!(
            "Successfully built {} service(s)",
            image_tags.len()
        ));
        Ok(image_tags)
    }

    async fn build_service(
        &self,
        service: ServiceBuildInfo,
        mode: BuildMode,
        gate: &Semaphore,
    ) -> BuildResult {
        let service_name = service.service_name.clone();
        self.logger.service(&service_name, "Starting build...");

        // Hashing is plain file IO; run it on the blocking pool so all
        // services hash concurrently without stalling the runtime.
        let hash = {
            let context_path = service.context_path.clone();
            let dockerfile = service.build.dockerfile.clone();
            let args = service.build.args.clone();
            let handle = tokio::task::spawn_blocking(move || {
                ContentHasher::new().hash_build_context(&context_path, &dockerfile, &args)
            });
            match handle.await {
                Ok(Ok(hash)) => hash,
                Ok(Err(err)) => {
                    return BuildResult::failed(service_name, BuildError::Hash(err));
                }
                Err(_) => return BuildResult::failed(service_name, BuildError::Interrupted),
            }
        };

        let generator = TagGenerator::new(&self.stack_name, &self.config.tag_format);
        let image_tag = generator.generate(&service_name, &hash);

        if !self.config.force_build {
            match self.client.image_exists(self.env_id, &image_tag).await {
                Ok(true) => {
                    self.logger.service(
                        &service_name,
                        &format!("No changes detected; skipping build (image: {image_tag})"),
                    );
                    return BuildResult::ok(service_name, image_tag);
                }
                Ok(false) => {}
                Err(err) => {
                    // A failed probe is not fatal: assume the image is
                    // absent and build it.
                    self.logger.warn(&format!(
                        "Could not check if image exists for {service_name}: {err}"
                    ));
                }
            }
        }

        if self.config.force_build {
            self.logger.service(
                &service_name,
                "Force rebuild requested; rebuilding service (no-cache)",
            );
        } else {
            self.logger
                .service(&service_name, "Changes detected; triggering build");
        }

        // Only the build/upload section holds a permit.
        let _permit = match gate.acquire().await {
            Ok(permit) => permit,
            // The gate is never closed while tasks are running.
            Err(_) => return BuildResult::failed(service_name, BuildError::Interrupted),
        };

        match mode {
            BuildMode::RemoteBuild => self.build_remote(&service, image_tag).await,
            BuildMode::Load => self.build_load(&service, image_tag).await,
        }
    }

    /// Build the service on the remote engine from a streamed context.
    async fn build_remote(&self, service: &ServiceBuildInfo, image_tag: String) -> BuildResult {
        let service_name = service.service_name.clone();
        self.logger
            .service(&service_name, "Building on remote engine...");

        let archiver = ContextArchiver::new(self.config.warn_threshold_mb);

        // Advisory size warning; estimation failures are not fatal here
        // because the archive stream will surface them anyway.
        if let Ok(size) = archiver.estimate_size(&service.context_path) {
            if archiver.exceeds_threshold(size) {
                self.logger.warn(&format!(
                    "Build context for {service_name} is {} MB, above the {} MB warning threshold",
                    size / (1024 * 1024),
                    self.config.warn_threshold_mb
                ));
            }
        }

        let context = match archiver.stream(&service.context_path) {
            Ok(stream) => stream,
            Err(err) => return BuildResult::failed(service_name, BuildError::Context(err)),
        };

        // Per-service args first; the global overrides win collisions.
        let mut build_args = service.build.args.clone();
        for (key, value) in &self.config.extra_build_args {
            build_args.insert(key.clone(), value.clone());
        }

        let options = BuildOptions {
            tag: image_tag.clone(),
            dockerfile: service.build.dockerfile.clone(),
            build_args,
            target: service.build.target.clone(),
            // Force rebuild implies no cache reuse.
            no_cache: self.config.force_build,
        };

        let logger = Arc::clone(&self.logger);
        let log_name = service_name.clone();
        let on_line = move |line: &str| logger.service(&log_name, line);

        match self
            .client
            .build_image(self.env_id, context, &options, &on_line)
            .await
        {
            Ok(()) => BuildResult::ok(service_name, image_tag),
            Err(err) => BuildResult::failed(service_name, BuildError::RemoteBuild(err)),
        }
    }

    /// Build the service locally and upload the exported image archive.
    async fn build_load(&self, service: &ServiceBuildInfo, image_tag: String) -> BuildResult {
        let service_name = service.service_name.clone();
        self.logger.service(&service_name, "Building locally...");

        let image = match self.spawn_local_build(service, &image_tag) {
            Ok(stream) => stream,
            Err(err) => return BuildResult::failed(service_name, BuildError::LocalBuild(err)),
        };

        self.logger
            .service(&service_name, "Loading image to remote engine...");
        let logger = Arc::clone(&self.logger);
        let log_name = service_name.clone();
        let on_line = move |line: &str| logger.service(&log_name, line);

        match self.client.load_image(self.env_id, image, &on_line).await {
            Ok(()) => BuildResult::ok(service_name, image_tag),
            Err(err) => BuildResult::failed(service_name, BuildError::Load(err)),
        }
    }

    /// Run `docker buildx build` with the image archive on stdout.
    ///
    /// Progress lines from stderr go to the per-service log; the tar
    /// stream flows into the returned pipe. A nonzero exit terminates
    /// the pipe with an error, so the consuming upload fails.
    fn spawn_local_build(
        &self,
        service: &ServiceBuildInfo,
        image_tag: &str,
    ) -> io::Result<ByteStream> {
        let mut cmd = tokio::process::Command::new("docker");
        cmd.args(["buildx", "build"]);
        for platform in &self.config.platforms {
            cmd.args(["--platform", platform]);
        }
        // Image archive on stdout, progress on stderr, so the tar
        // stream stays clean.
        cmd.args(["--output", "type=docker,dest=-"]);
        cmd.args(["--progress", "plain"]);
        cmd.args(["-t", image_tag]);
        if self.config.force_build {
            cmd.arg("--no-cache");
        }
        for (key, value) in &service.build.args {
            cmd.args(["--build-arg", &format!("{key}={value}")]);
        }
        for (key, value) in &self.config.extra_build_args {
            cmd.args(["--build-arg", &format!("{key}={value}")]);
        }
        if let Some(target) = service.build.target.as_deref() {
            if !target.is_empty() {
                cmd.args(["--target", target]);
            }
        }
        cmd.arg(&service.context_path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let Some(stdout) = child.stdout.take() else {
            return Err(io::Error::other("buildx stdout was not captured"));
        };
        let Some(stderr) = child.stderr.take() else {
            return Err(io::Error::other("buildx stderr was not captured"));
        };

        let logger = Arc::clone(&self.logger);
        let log_name = service.service_name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                logger.service(&log_name, &line);
            }
        });

        let (sender, stream) = ByteStream::channel(PIPE_DEPTH);
        tokio::spawn(async move {
            let mut stdout = stdout;
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if !sender.send(Bytes::copy_from_slice(&buf[..n])).await {
                            // Consumer gone; let the child run into the
                            // broken pipe and reap it.
                            let _ = child.wait().await;
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = child.wait().await;
                        sender.fail(err).await;
                        return;
                    }
                }
            }
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    sender
                        .fail(io::Error::other(format!(
                            "docker buildx build failed: {status}"
                        )))
                        .await;
                }
                Err(err) => sender.fail(err).await,
            }
        });

        Ok(stream)
    }

    /// Number of concurrent build permits for this run.
    async fn parallelism(&self) -> usize {
        if self.config.parallel == BUILD_PARALLEL_AUTO {
            return match self.client.host_info(self.env_id).await {
                Ok(info) => match info.get("NCPU").and_then(serde_json::Value::as_f64) {
                    Some(ncpu) if ncpu >= 1.0 => (ncpu as usize).saturating_sub(1).max(1),
                    // Host info without a usable CPU count.
                    _ => local_parallelism(),
                },
                // Unreachable host info falls back to the local CPU
                // count.
                Err(_) => local_parallelism(),
            };
        }

        // Explicit value; anything non-numeric degrades to sequential.
        match self.config.parallel.parse::<i64>() {
            Ok(n) => n.max(1) as usize,
            Err(_) => 1,
        }
    }
}

fn local_parallelism() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.saturating_sub(1).max(1)
}
