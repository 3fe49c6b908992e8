//! Surface capability queries.
//!
//! A [`SurfaceSupport`] snapshot is taken every time a swapchain is negotiated,
//! since capabilities (most importantly the current extent) change as the
//! window is resized.

use ash::vk;
use tracing::debug;

use crate::error::RhiResult;

/// Everything a surface reports about what swapchains it accepts.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Image count bounds, extents, transforms and supported usage flags
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space combinations
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Queries surface support for a physical device.
    ///
    /// # Arguments
    ///
    /// * `physical_device` - The physical device to query
    /// * `surface` - The surface to query against
    /// * `surface_loader` - The surface extension loader
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Surface support: {} formats, {} present modes, image count: {}-{}, current extent {}x{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            },
            capabilities.current_extent.width,
            capabilities.current_extent.height,
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// Returns true if swapchain images may be created with all of `usage`.
    #[inline]
    pub fn supports_usage(&self, usage: vk::ImageUsageFlags) -> bool {
        self.capabilities.supported_usage_flags.contains(usage)
    }
}
