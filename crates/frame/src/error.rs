//! Frame protocol error types.

use ash::vk;
use presenter_rhi::RhiError;
use thiserror::Error;

/// Errors raised while driving the acquire, submit and present protocol.
///
/// Stale and suboptimal swapchains are handled internally through
/// recreation and never surface as errors.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Device, fence or negotiation failure
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Image acquisition failed for a reason other than staleness
    #[error("Failed to acquire swapchain image: {0}")]
    Acquire(vk::Result),

    /// Presentation failed for a reason other than staleness
    #[error("Failed to present swapchain image: {0}")]
    Present(vk::Result),

    /// Nobody answered a resource request
    #[error("Resource manager did not provide a {0}")]
    ResourceUnavailable(&'static str),

    /// The swapchain service has not been initialized
    #[error("Swapchain service is not initialized")]
    NotInitialized,

    /// No swapchain answered a current-swapchain request
    #[error("No swapchain is available")]
    NoSwapchain,

    /// An event was dispatched to a listener that was already running
    #[error("Re-entrant dispatch of {0}")]
    ReentrantDispatch(&'static str),

    /// The driver returned an image index the swapchain does not have
    #[error("Acquired image index {index} but the swapchain has {count} images")]
    ImageIndexOutOfRange { index: u32, count: usize },

    /// A frame-in-flight slot outside the configured ring was used
    #[error("Frame slot {slot} is outside the {frames_in_flight} frames in flight")]
    FrameSlotOutOfRange { slot: usize, frames_in_flight: usize },

    /// Acquire kept reporting a stale swapchain after recreation
    #[error("Swapchain stayed out of date after {0} recreation attempts")]
    PersistentlyStale(usize),
}

/// Result type alias for frame protocol operations.
pub type FrameResult<T> = std::result::Result<T, FrameError>;
