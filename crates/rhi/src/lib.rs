//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides the Vulkan pieces the presentation layer is built on,
//! using the `ash` crate:
//! - Instance, physical device and logical device creation
//! - Surface capability queries and swapchain negotiation
//! - Fences and semaphores
//! - Command pools for per-frame recording
//! - The [`SwapchainDevice`](device::SwapchainDevice) seam through which the
//!   frame protocol talks to the driver

mod error;

pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::prelude::VkResult;
pub use ash::vk;
