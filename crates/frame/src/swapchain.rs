//! Swapchain ownership and image acquisition.
//!
//! # Overview
//!
//! A [`Swapchain`] owns the driver swapchain and its images, and borrows one
//! signaled fence and one binary semaphore per frame-in-flight slot from the
//! resource manager. Acquisition for slot `i` follows a fixed order:
//!
//! 1. Wait on slot `i`'s fence, so the GPU is done with the slot's last frame.
//! 2. Acquire an image, signaling slot `i`'s acquire semaphore.
//! 3. If another slot still renders into that image, wait on its fence too.
//! 4. Record slot `i` as the image's owner and reset slot `i`'s fence.
//! 5. Publish the semaphore and fence to the [`WindowingContext`].
//!
//! An out-of-date swapchain is reported as [`AcquireOutcome::Stale`] before any
//! state is touched, so the slot fence stays signaled and the caller can
//! recreate and retry without deadlocking.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;
use presenter_platform::is_zero_sized;
use presenter_rhi::RhiError;
use presenter_rhi::device::SwapchainDevice;
use presenter_rhi::swapchain::SwapchainDesc;
use tracing::{debug, info, trace, warn};

use crate::bus::EventBus;
use crate::context::{CurrentFrameSyncInfo, WindowingContext};
use crate::error::{FrameError, FrameResult};
use crate::events::{ResourceRequest, SwapchainSnapshot};
use crate::recreate::wait_for_drawable_area;

/// Timeout for fence waits in the acquire path.
///
/// Frames never give up on the GPU; a hung device surfaces as device loss.
pub const FENCE_TIMEOUT: u64 = u64::MAX;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Result of [`Swapchain::acquire_next_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired for the slot.
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface; nothing was acquired.
    Stale,
}

/// A swapchain plus the per-slot objects used to pace frames.
pub struct Swapchain {
    device: Arc<dyn SwapchainDevice>,
    context: Rc<WindowingContext>,
    handle: vk::SwapchainKHR,
    /// Unique per built handle; handle values may be reused by the driver
    generation: u64,
    desc: SwapchainDesc,
    images: Vec<vk::Image>,
    /// One per slot, created signaled
    in_flight_fences: Vec<vk::Fence>,
    /// One per slot, binary
    acquire_semaphores: Vec<vk::Semaphore>,
    /// Slot that last acquired each image, if any
    images_in_flight: Vec<Option<usize>>,
}

impl Swapchain {
    /// Creates the swapchain for the context's surface.
    ///
    /// Requests a signaled fence and a binary semaphore per slot over `bus`,
    /// then negotiates against a fresh surface snapshot. Blocks while the
    /// window has no drawable area.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::ResourceUnavailable`] if a sync object request
    /// goes unanswered, or the device error if negotiation or creation fails.
    pub fn create(
        device: Arc<dyn SwapchainDevice>,
        context: Rc<WindowingContext>,
        bus: &EventBus,
        frames_in_flight: usize,
    ) -> FrameResult<Self> {
        let frames_in_flight = frames_in_flight.max(1);

        let mut in_flight_fences = Vec::with_capacity(frames_in_flight);
        let mut acquire_semaphores = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            in_flight_fences.push(request_fence(bus)?);
            acquire_semaphores.push(request_semaphore(bus)?);
        }
        debug!(
            "Obtained sync objects for {} frame(s) in flight",
            frames_in_flight
        );

        let polls = wait_for_drawable_area(context.window());
        if polls > 0 {
            debug!("Waited {} poll(s) for a drawable area", polls);
        }

        let (handle, desc, images) = build(device.as_ref(), &context)?;

        info!(
            "Swapchain created: {} images, {} frames in flight",
            images.len(),
            frames_in_flight
        );

        Ok(Self {
            device,
            context,
            handle,
            generation: next_generation(),
            desc,
            images_in_flight: vec![None; images.len()],
            images,
            in_flight_fences,
            acquire_semaphores,
        })
    }

    /// Acquires the next image for frame-in-flight slot `slot`.
    ///
    /// # Errors
    ///
    /// Fence failures are returned as [`RhiError::FenceWait`] or
    /// [`RhiError::FenceReset`]; acquisition failures other than staleness as
    /// [`FrameError::Acquire`].
    pub fn acquire_next_image(&mut self, slot: usize) -> FrameResult<AcquireOutcome> {
        let frames_in_flight = self.in_flight_fences.len();
        let (Some(&fence), Some(&semaphore)) = (
            self.in_flight_fences.get(slot),
            self.acquire_semaphores.get(slot),
        ) else {
            return Err(FrameError::FrameSlotOutOfRange {
                slot,
                frames_in_flight,
            });
        };

        self.device
            .wait_for_fence(fence, FENCE_TIMEOUT)
            .map_err(RhiError::FenceWait)?;

        let (image_index, suboptimal) =
            match self.device.acquire_next_image(self.handle, semaphore) {
                Ok(acquired) => acquired,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("Swapchain out of date during acquire (slot {})", slot);
                    return Ok(AcquireOutcome::Stale);
                }
                Err(e) => return Err(FrameError::Acquire(e)),
            };

        let count = self.images_in_flight.len();
        let owner = self
            .images_in_flight
            .get_mut(image_index as usize)
            .ok_or(FrameError::ImageIndexOutOfRange {
                index: image_index,
                count,
            })?;

        if let Some(previous) = *owner
            && previous != slot
        {
            trace!(
                "Image {} still owned by slot {}, waiting before reuse",
                image_index, previous
            );
            self.device
                .wait_for_fence(self.in_flight_fences[previous], FENCE_TIMEOUT)
                .map_err(RhiError::FenceWait)?;
        }
        *owner = Some(slot);

        self.device
            .reset_fence(fence)
            .map_err(RhiError::FenceReset)?;

        self.context.publish_sync_info(CurrentFrameSyncInfo {
            acquire_semaphore: Some(semaphore),
            image_fence: Some(fence),
        });

        if suboptimal {
            debug!("Acquired image {} from a suboptimal swapchain", image_index);
        }

        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        })
    }

    /// Destroys the swapchain handle. Slot fences and semaphores are kept.
    ///
    /// The caller must have waited for the device to go idle.
    pub(crate) fn release(&mut self) {
        if self.handle != vk::SwapchainKHR::null() {
            self.device.destroy_swapchain(self.handle);
            self.handle = vk::SwapchainKHR::null();
            debug!("Swapchain handle destroyed");
        }
        self.images.clear();
        self.images_in_flight.clear();
    }

    /// Creates a new swapchain handle for the current surface state.
    ///
    /// No image is owned by any slot afterwards.
    pub(crate) fn rebuild(&mut self) -> FrameResult<()> {
        if self.handle != vk::SwapchainKHR::null() {
            warn!("Rebuilding over a live swapchain; releasing it first");
            self.release();
        }

        let (handle, desc, images) = build(self.device.as_ref(), &self.context)?;
        self.handle = handle;
        self.generation = next_generation();
        self.desc = desc;
        self.images_in_flight = vec![None; images.len()];
        self.images = images;
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Identifies the current handle; changes whenever the swapchain is
    /// created or rebuilt.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn desc(&self) -> &SwapchainDesc {
        &self.desc
    }

    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.in_flight_fences.len()
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn SwapchainDevice> {
        &self.device
    }

    #[inline]
    pub fn context(&self) -> &Rc<WindowingContext> {
        &self.context
    }

    pub fn in_flight_fence(&self, slot: usize) -> Option<vk::Fence> {
        self.in_flight_fences.get(slot).copied()
    }

    pub fn acquire_semaphore(&self, slot: usize) -> Option<vk::Semaphore> {
        self.acquire_semaphores.get(slot).copied()
    }

    /// Slot that last acquired `image_index`, if any.
    pub fn image_owner(&self, image_index: u32) -> Option<usize> {
        self.images_in_flight
            .get(image_index as usize)
            .copied()
            .flatten()
    }

    pub fn snapshot(&self) -> SwapchainSnapshot {
        SwapchainSnapshot {
            handle: self.handle,
            generation: self.generation,
            format: self.desc.format,
            extent: self.desc.extent,
            images: self.images.clone(),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("handle", &self.handle)
            .field("generation", &self.generation)
            .field("extent", &self.desc.extent)
            .field("images", &self.images.len())
            .field("frames_in_flight", &self.in_flight_fences.len())
            .finish()
    }
}

fn build(
    device: &dyn SwapchainDevice,
    context: &WindowingContext,
) -> FrameResult<(vk::SwapchainKHR, SwapchainDesc, Vec<vk::Image>)> {
    let surface = context.surface();
    let support = device.surface_support(surface)?;
    let framebuffer = context.framebuffer_size();
    if is_zero_sized(framebuffer) {
        warn!(
            "Building swapchain for a {}x{} framebuffer",
            framebuffer.width, framebuffer.height
        );
    }

    let desc = SwapchainDesc::negotiate(
        surface,
        &support,
        framebuffer,
        &device.queue_family_indices(),
    )?;

    let handle = device.create_swapchain(&desc)?;
    let images = match device.swapchain_images(handle) {
        Ok(images) => images,
        Err(e) => {
            device.destroy_swapchain(handle);
            return Err(e.into());
        }
    };

    Ok((handle, desc, images))
}

fn request_fence(bus: &EventBus) -> FrameResult<vk::Fence> {
    let mut request = ResourceRequest::fence(true);
    bus.emit(&mut request)?;
    match request {
        ResourceRequest::Fence {
            handle: Some(fence),
            ..
        } => Ok(fence),
        other => Err(FrameError::ResourceUnavailable(other.kind())),
    }
}

fn request_semaphore(bus: &EventBus) -> FrameResult<vk::Semaphore> {
    let mut request = ResourceRequest::semaphore(false);
    bus.emit(&mut request)?;
    match request {
        ResourceRequest::Semaphore {
            handle: Some(semaphore),
            ..
        } => Ok(semaphore),
        other => Err(FrameError::ResourceUnavailable(other.kind())),
    }
}
