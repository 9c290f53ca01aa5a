//! Core types and configuration for runway.
//!
//! This crate defines the `runway.toml` schema ([`RunwayConfig`]),
//! deployment environment resolution ([`Environment`]), the names of every
//! provisioned resource ([`ResourceNames`]), and shared error types.

pub mod config;
pub mod environment;
pub mod error;
pub mod image;
pub mod naming;

pub use config::{
    BuildConfig, LockConfig, ProjectConfig, PublishStrategy, RunwayConfig, ServiceConfig,
};
pub use environment::Environment;
pub use error::{Error, Result};
pub use image::ImageRef;
pub use naming::ResourceNames;

/// Path the hosting platform probes for liveness.
pub const HEALTH_CHECK_PATH: &str = "/health";

/// Tag every published image is pushed under.
pub const IMAGE_TAG: &str = "latest";
