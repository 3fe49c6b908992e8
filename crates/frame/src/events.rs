//! Events exchanged between the frame loop, the swapchain service, the
//! presentation submitter, the render component and the resource manager.
//!
//! | Event | Emitted by | Handled by |
//! |---|---|---|
//! | [`PrepareNextFrame`] | frame loop | [`SwapchainService`](crate::service::SwapchainService) |
//! | [`RenderSubmissionComplete`] | render component | [`PresentationSubmitter`](crate::presentation::PresentationSubmitter) |
//! | [`RequestCurrentSwapchain`] | anyone | [`SwapchainService`](crate::service::SwapchainService) |
//! | [`ResourceRequest`] | [`Swapchain`](crate::swapchain::Swapchain) | [`SyncObjectManager`](crate::resources::SyncObjectManager) |
//! | [`SwapchainInvalidated`] | [`PresentationSubmitter`](crate::presentation::PresentationSubmitter) | [`SwapchainService`](crate::service::SwapchainService) |

use std::sync::Arc;

use ash::vk;
use presenter_rhi::device::SwapchainDevice;

use crate::frame_tracker::SharedFrameTracker;
use crate::recreate::RecreationTrigger;

/// Start of a frame: advance the frame-in-flight slot and acquire an image.
///
/// On return the tracker holds the new slot and target image index, and the
/// windowing context holds the slot's acquire semaphore and fence.
pub struct PrepareNextFrame {
    pub tracker: SharedFrameTracker,
}

/// GPU work for a frame has been submitted; the image can be presented once
/// `done_semaphore` signals.
pub struct RenderSubmissionComplete {
    pub device: Arc<dyn SwapchainDevice>,
    pub done_semaphore: vk::Semaphore,
    pub image_index: u32,
}

/// Everything a consumer needs to know about the live swapchain.
///
/// Snapshots go stale on recreation; request a new one every frame. Compare
/// `generation` rather than `handle` to detect a recreation, since a destroyed
/// handle value can come back from the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainSnapshot {
    pub handle: vk::SwapchainKHR,
    pub generation: u64,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
}

/// Synchronous query for the current swapchain.
///
/// `swapchain` is left `None` when no swapchain exists.
#[derive(Debug, Default)]
pub struct RequestCurrentSwapchain {
    pub swapchain: Option<SwapchainSnapshot>,
}

impl RequestCurrentSwapchain {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Request for a synchronization object from the resource manager.
///
/// The manager owns what it hands out; the requester only borrows the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRequest {
    Fence {
        /// Create the fence already signaled
        signaled: bool,
        handle: Option<vk::Fence>,
    },
    Semaphore {
        /// Create a timeline rather than a binary semaphore
        timeline: bool,
        handle: Option<vk::Semaphore>,
    },
}

impl ResourceRequest {
    pub fn fence(signaled: bool) -> Self {
        Self::Fence {
            signaled,
            handle: None,
        }
    }

    pub fn semaphore(timeline: bool) -> Self {
        Self::Semaphore {
            timeline,
            handle: None,
        }
    }

    /// Human-readable name of the requested kind, for errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fence { .. } => "fence",
            Self::Semaphore { .. } => "semaphore",
        }
    }
}

/// The swapchain no longer matches the surface and must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInvalidated {
    pub trigger: RecreationTrigger,
}
