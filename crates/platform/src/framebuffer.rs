//! Framebuffer size source used while recreating the swapchain.

use ash::vk;

/// Something that reports the drawable size of a window.
///
/// Swapchain recreation polls [`framebuffer_size`](Self::framebuffer_size) and
/// calls [`wait_events`](Self::wait_events) for as long as either dimension is
/// zero, which is how a minimized window presents itself.
pub trait FramebufferSource {
    /// Current drawable size in physical pixels.
    fn framebuffer_size(&self) -> vk::Extent2D;

    /// Blocks until the platform has had a chance to deliver window events.
    fn wait_events(&self);
}

/// Returns true if either dimension is zero.
#[inline]
pub fn is_zero_sized(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}
