//! Core utilities for the presentation layer.
//!
//! This crate provides foundational types shared by every other crate:
//! - Error types and result aliases
//! - Logging initialization
//! - Configuration loading

mod config;
mod error;
mod logging;

pub use config::{MAX_FRAMES_IN_FLIGHT, PresentConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_LOG_FILTER, init_logging, init_logging_with_filter};
