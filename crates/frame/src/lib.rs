//! Frame pacing and presentation on top of a Vulkan swapchain.
//!
//! This crate provides:
//! - A synchronous typed [`EventBus`] the frame components talk through
//! - The [`Swapchain`] with per-slot fences and acquire semaphores
//! - The [`SwapchainService`] that advances frames and acquires images
//! - The [`PresentationSubmitter`] that presents rendered images
//! - Swapchain recreation for resizes, minimization and stale swapchains
//! - The [`SyncObjectManager`] that owns the sync objects handed out
//!
//! # Frame flow
//!
//! ```text
//! frame loop      --PrepareNextFrame-------->  SwapchainService (acquire)
//! renderer        --RenderSubmissionComplete->  PresentationSubmitter (present)
//! submitter       --SwapchainInvalidated----->  SwapchainService (recreate)
//! Swapchain       --ResourceRequest---------->  SyncObjectManager
//! ```

pub mod bus;
pub mod context;
mod error;
pub mod events;
pub mod frame_tracker;
pub mod presentation;
pub mod recreate;
pub mod resources;
pub mod service;
pub mod swapchain;

pub use bus::{EventBus, Subscription, SubscriptionId};
pub use context::{CurrentFrameSyncInfo, WindowingContext};
pub use error::{FrameError, FrameResult};
pub use events::{
    PrepareNextFrame, RenderSubmissionComplete, RequestCurrentSwapchain, ResourceRequest,
    SwapchainInvalidated, SwapchainSnapshot,
};
pub use frame_tracker::{
    CurrentFrame, FrameTracker, FrameTrackerSetup, SharedFrameTracker, next_frame_in_flight,
};
pub use presentation::PresentationSubmitter;
pub use recreate::{RecreationReport, RecreationState, RecreationTrigger};
pub use resources::SyncObjectManager;
pub use service::{MAX_ACQUIRE_ATTEMPTS, SwapchainService};
pub use swapchain::{AcquireOutcome, FENCE_TIMEOUT, Swapchain};

/// Frames in flight used when nothing else is configured.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;
