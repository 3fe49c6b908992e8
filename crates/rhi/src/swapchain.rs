//! Swapchain parameter negotiation.
//!
//! This module turns a [`SurfaceSupport`] snapshot and the window's framebuffer
//! size into a [`SwapchainDesc`], the full set of parameters a swapchain is
//! created with. The selection rules are fixed:
//!
//! - Format: `B8G8R8A8_SRGB` with `SRGB_NONLINEAR`, else the first reported format
//! - Present mode: `MAILBOX`, then `IMMEDIATE`, then `FIFO`
//! - Extent: the surface's current extent, unless it is the `u32::MAX` sentinel,
//!   in which case the framebuffer size is clamped into the surface bounds
//! - Image count: one above the minimum, capped by the maximum when one exists
//! - Sharing: `EXCLUSIVE` for a single queue family, `CONCURRENT` otherwise
//!
//! Negotiation is pure, so the same inputs always produce the same description.
//! Creating the swapchain from a description is left to a
//! [`SwapchainDevice`](crate::device::SwapchainDevice).
//!
//! # Example
//!
//! ```
//! use presenter_rhi::surface::SurfaceSupport;
//! use presenter_rhi::swapchain::SwapchainDesc;
//! use presenter_rhi::vk;
//!
//! let support = SurfaceSupport {
//!     capabilities: vk::SurfaceCapabilitiesKHR {
//!         min_image_count: 2,
//!         current_extent: vk::Extent2D { width: 800, height: 600 },
//!         ..Default::default()
//!     },
//!     formats: vec![vk::SurfaceFormatKHR {
//!         format: vk::Format::B8G8R8A8_SRGB,
//!         color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
//!     }],
//!     present_modes: vec![vk::PresentModeKHR::FIFO],
//! };
//!
//! let desc = SwapchainDesc::negotiate(
//!     vk::SurfaceKHR::null(),
//!     &support,
//!     vk::Extent2D { width: 800, height: 600 },
//!     &[0],
//! )
//! .unwrap();
//! assert_eq!(desc.image_count, 3);
//! assert_eq!(desc.sharing_mode, vk::SharingMode::EXCLUSIVE);
//! ```

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::surface::SurfaceSupport;

/// Preferred swapchain format.
pub const PREFERRED_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

/// Preferred swapchain color space.
pub const PREFERRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// Sentinel reported in `current_extent` when the surface size is decided by the swapchain.
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Present modes in order of preference.
const PRESENT_MODE_PRIORITY: [vk::PresentModeKHR; 3] = [
    vk::PresentModeKHR::MAILBOX,
    vk::PresentModeKHR::IMMEDIATE,
    vk::PresentModeKHR::FIFO,
];

/// Negotiated swapchain parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainDesc {
    /// Surface the swapchain presents to
    pub surface: vk::SurfaceKHR,
    /// Image format
    pub format: vk::Format,
    /// Image color space
    pub color_space: vk::ColorSpaceKHR,
    /// Present mode
    pub present_mode: vk::PresentModeKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Minimum number of images requested from the driver
    pub image_count: u32,
    /// Image usage flags
    pub image_usage: vk::ImageUsageFlags,
    /// Image sharing mode
    pub sharing_mode: vk::SharingMode,
    /// Queue families sharing the images; empty when exclusive
    pub queue_family_indices: Vec<u32>,
    /// Transform applied on presentation
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainDesc {
    /// Negotiates swapchain parameters against the current surface support.
    ///
    /// # Arguments
    ///
    /// * `surface` - The surface the swapchain will present to
    /// * `support` - A fresh capability snapshot for that surface
    /// * `framebuffer` - The window's framebuffer size in pixels
    /// * `queue_families` - Unique queue families that will touch the images
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoSurfaceFormats`] if the surface reports no formats.
    pub fn negotiate(
        surface: vk::SurfaceKHR,
        support: &SurfaceSupport,
        framebuffer: vk::Extent2D,
        queue_families: &[u32],
    ) -> RhiResult<Self> {
        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, framebuffer);
        let image_count = determine_image_count(&support.capabilities);
        let (sharing_mode, queue_family_indices) = choose_sharing_mode(queue_families);
        let image_usage = choose_image_usage(support);

        let desc = Self {
            surface,
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode,
            extent,
            image_count,
            image_usage,
            sharing_mode,
            queue_family_indices,
            pre_transform: support.capabilities.current_transform,
        };

        info!(
            "Negotiated swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
            desc.extent.width,
            desc.extent.height,
            desc.format,
            desc.color_space,
            desc.present_mode,
            desc.image_count
        );

        Ok(desc)
    }

    /// Builds the create info for this description.
    ///
    /// The swapchain is always created from scratch; the previous swapchain is
    /// destroyed before a new one is negotiated.
    pub fn create_info(&self) -> vk::SwapchainCreateInfoKHR<'_> {
        vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(self.image_count)
            .image_format(self.format)
            .image_color_space(self.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(self.image_usage)
            .image_sharing_mode(self.sharing_mode)
            .queue_family_indices(&self.queue_family_indices)
            .pre_transform(self.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null())
    }
}

/// Chooses the surface format.
///
/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR and otherwise takes the first
/// format the surface reports.
///
/// # Errors
///
/// Returns [`RhiError::NoSurfaceFormats`] if `formats` is empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    let first = formats.first().ok_or(RhiError::NoSurfaceFormats)?;

    let preferred = formats
        .iter()
        .find(|f| f.format == PREFERRED_FORMAT && f.color_space == PREFERRED_COLOR_SPACE);

    match preferred {
        Some(&format) => {
            debug!("Selected preferred surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
            Ok(format)
        }
        None => {
            warn!(
                "Preferred surface format unavailable, using {:?} / {:?}",
                first.format, first.color_space
            );
            Ok(*first)
        }
    }
}

/// Chooses the present mode by fixed priority: MAILBOX, IMMEDIATE, FIFO.
///
/// FIFO is always available, so it is returned when neither of the others is.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mode = PRESENT_MODE_PRIORITY
        .into_iter()
        .find(|mode| present_modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO);

    debug!("Selected {:?} present mode", mode);
    mode
}

/// Chooses the swapchain extent.
///
/// Uses the surface's current extent verbatim unless its width is the
/// [`UNDEFINED_EXTENT`] sentinel. In that case the framebuffer size is clamped
/// component-wise into `[min_image_extent, max_image_extent]`.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != UNDEFINED_EXTENT {
        debug!(
            "Using current surface extent: {}x{}",
            capabilities.current_extent.width, capabilities.current_extent.height
        );
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: framebuffer.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Calculated extent: {}x{} (framebuffer: {}x{}, min: {}x{}, max: {}x{})",
        extent.width,
        extent.height,
        framebuffer.width,
        framebuffer.height,
        capabilities.min_image_extent.width,
        capabilities.min_image_extent.height,
        capabilities.max_image_extent.width,
        capabilities.max_image_extent.height
    );

    extent
}

/// Determines the number of swapchain images to request.
///
/// One more than the minimum, capped by the maximum when `max_image_count > 0`.
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    // 0 means there is no maximum
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Chooses how swapchain images are shared between queue families.
///
/// Duplicate family indices are ignored.
pub fn choose_sharing_mode(queue_families: &[u32]) -> (vk::SharingMode, Vec<u32>) {
    let mut unique = Vec::with_capacity(queue_families.len());
    for &family in queue_families {
        if !unique.contains(&family) {
            unique.push(family);
        }
    }

    if unique.len() > 1 {
        debug!("Using CONCURRENT sharing mode across queue families {:?}", unique);
        (vk::SharingMode::CONCURRENT, unique)
    } else {
        debug!("Using EXCLUSIVE sharing mode");
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    }
}

/// Chooses image usage: color attachment, plus transfer source when the
/// surface allows it so presented images can be read back.
pub fn choose_image_usage(support: &SurfaceSupport) -> vk::ImageUsageFlags {
    let mut usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
    if support.supports_usage(vk::ImageUsageFlags::TRANSFER_SRC) {
        usage |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    usage
}

/// Creates one 2D color view per swapchain image.
///
/// # Errors
///
/// Returns an error if any view fails to be created. Views created before the
/// failure are destroyed.
pub fn create_image_views(
    device: &ash::Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                destroy_image_views(device, &mut image_views);
                return Err(RhiError::Swapchain(format!(
                    "Failed to create image view {}: {:?}",
                    i, e
                )));
            }
        }
    }

    debug!("Created {} swapchain image views", image_views.len());
    Ok(image_views)
}

/// Destroys image views created by [`create_image_views`] and clears the list.
pub fn destroy_image_views(device: &ash::Device, image_views: &mut Vec<vk::ImageView>) {
    for view in image_views.drain(..) {
        unsafe { device.destroy_image_view(view, None) };
    }
}
