//! Swapchain service: owns the swapchain and drives it from bus events.
//!
//! The service answers three events:
//!
//! - [`PrepareNextFrame`]: advance the frame-in-flight slot and acquire an
//!   image, recreating the swapchain first if a recreation is pending and
//!   again whenever acquisition reports it stale.
//! - [`RequestCurrentSwapchain`]: fill in a snapshot of the live swapchain.
//! - [`SwapchainInvalidated`]: recreate immediately.
//!
//! # Example
//!
//! ```no_run
//! # use std::rc::Rc;
//! # use std::sync::Arc;
//! # use presenter_frame::{EventBus, FrameTracker, PrepareNextFrame, SwapchainService, WindowingContext};
//! # fn example(
//! #     device: Arc<dyn presenter_rhi::device::SwapchainDevice>,
//! #     context: Rc<WindowingContext>,
//! # ) -> presenter_frame::FrameResult<()> {
//! let bus = EventBus::new();
//! let mut service = SwapchainService::new(device, context);
//! service.init(&bus, 2)?;
//!
//! let setup = service.tracker_setup().ok_or(presenter_frame::FrameError::NotInitialized)?;
//! let tracker = FrameTracker::shared(setup);
//! bus.emit(&mut PrepareNextFrame { tracker: tracker.clone() })?;
//!
//! service.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use presenter_rhi::RhiError;
use presenter_rhi::device::SwapchainDevice;
use tracing::{debug, error, info, warn};

use crate::bus::{EventBus, Subscription};
use crate::context::{CurrentFrameSyncInfo, WindowingContext};
use crate::error::{FrameError, FrameResult};
use crate::events::{
    PrepareNextFrame, RequestCurrentSwapchain, SwapchainInvalidated, SwapchainSnapshot,
};
use crate::frame_tracker::{FrameTrackerSetup, next_frame_in_flight};
use crate::recreate::{RecreationReport, RecreationTrigger, recreate_swapchain};
use crate::swapchain::{AcquireOutcome, Swapchain};

/// Acquisitions attempted per frame before a stale swapchain is fatal.
pub const MAX_ACQUIRE_ATTEMPTS: usize = 3;

#[derive(Default)]
struct ServiceState {
    swapchain: Option<Swapchain>,
    /// Recreation to run before the next acquire
    pending: Option<RecreationTrigger>,
    last_report: Option<RecreationReport>,
}

impl ServiceState {
    fn recreate(&mut self, trigger: RecreationTrigger) -> FrameResult<()> {
        let swapchain = self.swapchain.as_mut().ok_or(FrameError::NotInitialized)?;
        let report = recreate_swapchain(swapchain, trigger)?;
        if report.zero_size_polls > 0 {
            debug!(
                "Recreation waited {} poll(s) for a drawable area",
                report.zero_size_polls
            );
        }
        self.pending = None;
        self.last_report = Some(report);
        Ok(())
    }

    fn prepare_next_frame(
        &mut self,
        context: &WindowingContext,
        event: &mut PrepareNextFrame,
    ) -> FrameResult<()> {
        // One recreation covers both a pending trigger and a resize.
        let resized = context.take_framebuffer_resized();
        if let Some(trigger) = self
            .pending
            .or(resized.then_some(RecreationTrigger::Resized))
        {
            self.recreate(trigger)?;
        }

        let mut tracker = event
            .tracker
            .try_borrow_mut()
            .map_err(|_| FrameError::ReentrantDispatch("FrameTracker"))?;

        let frames_in_flight = self
            .swapchain
            .as_ref()
            .ok_or(FrameError::NotInitialized)?
            .frames_in_flight();
        let slot = next_frame_in_flight(
            tracker.current().frame_in_flight_index(),
            frames_in_flight,
        );
        tracker.current_mut().set_frame_in_flight_index(slot);
        tracker.trigger_increment_for_current_frame();

        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            let swapchain = self.swapchain.as_mut().ok_or(FrameError::NotInitialized)?;
            match swapchain.acquire_next_image(slot)? {
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                } => {
                    if suboptimal {
                        self.pending = Some(RecreationTrigger::Suboptimal);
                    }
                    tracker.current_mut().set_final_target_image_index(image_index);
                    tracker.set_unique_target_images(swapchain.image_count());
                    return Ok(());
                }
                AcquireOutcome::Stale => {
                    debug!(
                        "Acquire attempt {} of {} found a stale swapchain",
                        attempt, MAX_ACQUIRE_ATTEMPTS
                    );
                    self.recreate(RecreationTrigger::OutOfDate)?;
                }
            }
        }

        Err(FrameError::PersistentlyStale(MAX_ACQUIRE_ATTEMPTS))
    }
}

/// Owns the swapchain and serves the frame protocol events.
pub struct SwapchainService {
    device: Arc<dyn SwapchainDevice>,
    context: Rc<WindowingContext>,
    state: Rc<RefCell<ServiceState>>,
    subscriptions: Vec<Subscription>,
}

impl SwapchainService {
    pub fn new(device: Arc<dyn SwapchainDevice>, context: Rc<WindowingContext>) -> Self {
        Self {
            device,
            context,
            state: Rc::new(RefCell::new(ServiceState::default())),
            subscriptions: Vec::new(),
        }
    }

    /// Creates the swapchain and subscribes to the frame events.
    ///
    /// Calling `init` on an initialized service does nothing.
    ///
    /// # Errors
    ///
    /// Returns the swapchain creation error; the service stays uninitialized.
    pub fn init(&mut self, bus: &Rc<EventBus>, frames_in_flight: usize) -> FrameResult<()> {
        if self.is_initialized() {
            warn!("Swapchain service is already initialized");
            return Ok(());
        }

        let swapchain = Swapchain::create(
            self.device.clone(),
            self.context.clone(),
            bus,
            frames_in_flight,
        )?;
        {
            let mut state = self.state.borrow_mut();
            state.swapchain = Some(swapchain);
            state.pending = None;
        }

        let state = self.state.clone();
        let context = self.context.clone();
        self.subscriptions
            .push(bus.subscribe(move |event: &mut PrepareNextFrame| {
                borrow_state(&state)?.prepare_next_frame(&context, event)
            }));

        let state = self.state.clone();
        self.subscriptions
            .push(bus.subscribe(move |request: &mut RequestCurrentSwapchain| {
                let state = state
                    .try_borrow()
                    .map_err(|_| FrameError::ReentrantDispatch("RequestCurrentSwapchain"))?;
                request.swapchain = state.swapchain.as_ref().map(Swapchain::snapshot);
                Ok(())
            }));

        let state = self.state.clone();
        self.subscriptions
            .push(bus.subscribe(move |event: &mut SwapchainInvalidated| {
                borrow_state(&state)?.recreate(event.trigger)
            }));

        info!("Swapchain service initialized");
        Ok(())
    }

    /// Waits for the device to idle, destroys the swapchain and unsubscribes.
    ///
    /// Safe to call repeatedly; an uninitialized service is left untouched.
    pub fn shutdown(&mut self) -> FrameResult<()> {
        self.subscriptions.clear();

        let swapchain = self.state.borrow_mut().swapchain.take();
        let Some(swapchain) = swapchain else {
            return Ok(());
        };

        let idle = self.device.wait_idle().map_err(RhiError::from);
        drop(swapchain);
        self.context.publish_sync_info(CurrentFrameSyncInfo::default());
        info!("Swapchain service shut down");
        idle.map_err(FrameError::from)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().swapchain.is_some()
    }

    /// Tracker parameters for the live swapchain.
    pub fn tracker_setup(&self) -> Option<FrameTrackerSetup> {
        self.state
            .borrow()
            .swapchain
            .as_ref()
            .map(|swapchain| FrameTrackerSetup {
                frames_in_flight: swapchain.frames_in_flight(),
                unique_target_images: swapchain.image_count(),
            })
    }

    pub fn current_swapchain(&self) -> Option<SwapchainSnapshot> {
        self.state
            .borrow()
            .swapchain
            .as_ref()
            .map(Swapchain::snapshot)
    }

    /// Schedules a recreation before the next acquire.
    pub fn request_recreation(&self, trigger: RecreationTrigger) {
        self.state.borrow_mut().pending = Some(trigger);
    }

    pub fn pending_recreation(&self) -> Option<RecreationTrigger> {
        self.state.borrow().pending
    }

    /// Report of the most recent recreation, if any happened.
    pub fn last_recreation(&self) -> Option<RecreationReport> {
        self.state.borrow().last_report.clone()
    }
}

impl Drop for SwapchainService {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Swapchain service shutdown failed: {}", e);
        }
    }
}

fn borrow_state(
    state: &RefCell<ServiceState>,
) -> FrameResult<std::cell::RefMut<'_, ServiceState>> {
    state
        .try_borrow_mut()
        .map_err(|_| FrameError::ReentrantDispatch("SwapchainService"))
}
