//! Portainer API access for pctl.
//!
//! The build orchestrator only depends on the [`BuildEngine`] trait;
//! [`PortainerClient`] implements it against Portainer's Docker proxy
//! endpoints and also carries the stack create/update/query calls the
//! CLI uses. [`ByteStream`] is the bounded pipe through which build
//! contexts and image archives flow into request bodies.

pub mod api;
pub mod client;
pub mod error;
pub mod stream;
pub mod types;

pub use api::{BuildEngine, BuildOptions};
pub use client::PortainerClient;
pub use error::ApiError;
pub use stream::{ByteStream, ByteStreamSender};
pub use types::{Container, Stack};
