//! Presents rendered images and reports when the swapchain needs rebuilding.

use std::rc::{Rc, Weak};

use ash::vk;
use tracing::{debug, trace};

use crate::bus::{EventBus, Subscription};
use crate::context::WindowingContext;
use crate::error::{FrameError, FrameResult};
use crate::events::{RenderSubmissionComplete, RequestCurrentSwapchain, SwapchainInvalidated};
use crate::recreate::RecreationTrigger;

/// Listens for [`RenderSubmissionComplete`] and queues the image for
/// presentation.
///
/// The swapchain is looked up through [`RequestCurrentSwapchain`] on every
/// present. A stale or suboptimal swapchain, or a pending window resize, is
/// reported as [`SwapchainInvalidated`] right after presenting.
#[derive(Debug, Default)]
pub struct PresentationSubmitter {
    subscription: Option<Subscription>,
}

impl PresentationSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to [`RenderSubmissionComplete`] on `bus`, replacing any
    /// earlier registration.
    pub fn register(&mut self, bus: &Rc<EventBus>, context: Rc<WindowingContext>) {
        let weak: Weak<EventBus> = Rc::downgrade(bus);
        self.subscription = Some(bus.subscribe(move |event: &mut RenderSubmissionComplete| {
            let bus = weak.upgrade().ok_or(FrameError::NotInitialized)?;
            if let Some(trigger) = present(&bus, &context, event)? {
                debug!("Presentation requested recreation ({:?})", trigger);
                bus.emit(&mut SwapchainInvalidated { trigger })?;
            }
            Ok(())
        }));
    }

    pub fn unregister(&mut self) {
        self.subscription = None;
    }

    pub fn is_registered(&self) -> bool {
        self.subscription.is_some()
    }
}

/// Presents `event.image_index` and returns the recreation it calls for.
fn present(
    bus: &EventBus,
    context: &WindowingContext,
    event: &RenderSubmissionComplete,
) -> FrameResult<Option<RecreationTrigger>> {
    let mut request = RequestCurrentSwapchain::new();
    bus.emit(&mut request)?;
    let swapchain = request.swapchain.ok_or(FrameError::NoSwapchain)?;

    let result = event.device.queue_present(
        swapchain.handle,
        event.image_index,
        event.done_semaphore,
    );
    trace!("Presented image {}: {:?}", event.image_index, result);

    let resized = context.take_framebuffer_resized();
    match result {
        Ok(false) if resized => Ok(Some(RecreationTrigger::Resized)),
        Ok(false) => Ok(None),
        Ok(true) => Ok(Some(RecreationTrigger::Suboptimal)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Some(RecreationTrigger::OutOfDate)),
        Err(e) => Err(FrameError::Present(e)),
    }
}
