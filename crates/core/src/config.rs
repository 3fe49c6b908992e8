//! Application configuration.
//!
//! Configuration is read from a TOML file. Every field has a default, so a
//! partial file (or none at all) yields a usable configuration.
//!
//! ```toml
//! frames_in_flight = 2
//! enable_validation = true
//! log_filter = "info,presenter_frame=debug"
//!
//! [window]
//! width = 1280
//! height = 720
//! title = "Presenter"
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Upper bound accepted for `frames_in_flight`.
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

/// Initial window settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Presenter".to_string(),
        }
    }
}

/// Top-level configuration for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    pub window: WindowConfig,
    /// Number of frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Request the Khronos validation layer.
    pub enable_validation: bool,
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log_filter: Option<String>,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            frames_in_flight: 2,
            enable_validation: cfg!(debug_assertions),
            log_filter: None,
        }
    }
}

impl PresentConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not valid TOML for this schema
    /// or if a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or [`Error::Config`]
    /// if it cannot be parsed or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads a configuration file, falling back to defaults when it does not exist.
    ///
    /// A file that exists but is invalid is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Checks that every value is within the supported range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(Error::Config(format!(
                "frames_in_flight must be between 1 and {}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            )));
        }
        Ok(())
    }
}
