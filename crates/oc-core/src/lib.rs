//! Core support crate for oxidized-maxwell
//!
//! This crate provides the error types, configuration, and logging
//! infrastructure shared by the shader and video crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{ConfigError, MemoryError, PipelineError, Result, ShaderError};
