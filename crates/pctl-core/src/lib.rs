//! Core types and configuration for pctl.
//!
//! This crate defines the `pctl.yml` schema ([`Config`], [`BuildConfig`])
//! and shared error types.

pub mod config;
pub mod error;

pub use config::{BuildConfig, Config};
pub use error::{Error, Result};
