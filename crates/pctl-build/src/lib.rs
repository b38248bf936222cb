//! Build orchestration for pctl.
//!
//! # Build pipeline
//!
//! ```text
//! pctl redeploy
//!   1. Hash        ── SHA-256 over Dockerfile + args + context files
//!   2. Tag         ── tag_format template → pctl-{{stack}}-{{service}}:{{hash}}
//!   3. Skip check  ── image with that tag already on the engine?
//!   4. Build       ── remote-build: stream tar context to the engine
//!                     load: docker buildx locally, upload the archive
//!   5. Aggregate   ── all services succeed, or the whole run fails
//! ```
//!
//! Steps 1–3 run eagerly for every service; step 4 is admitted through a
//! semaphore sized by the `parallel` setting. A single failing service
//! never interrupts its siblings, but any failure discards the run's
//! results and surfaces one aggregate error.

pub mod context;
pub mod hasher;
pub mod logger;
pub mod orchestrator;
pub mod tag;

pub use context::{ContextArchiver, ContextError, IgnorePatterns};
pub use hasher::{ContentHasher, HashError};
pub use logger::{BuildLogger, StyledLogger};
pub use orchestrator::{BuildError, BuildMode, BuildOrchestrator, BuildResult, OrchestratorError};
pub use tag::{TagError, TagGenerator, validate_tag, validate_template};
