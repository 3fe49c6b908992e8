//! Presentation results and the recreations they trigger.

mod common;

use std::sync::Arc;

use ash::vk::{self, Handle};
use presenter_frame::{
    FrameError, FrameTracker, PrepareNextFrame, PresentationSubmitter, RecreationTrigger,
    RenderSubmissionComplete, SharedFrameTracker, SwapchainService,
};

use common::Harness;

struct Setup {
    harness: Harness,
    service: SwapchainService,
    submitter: PresentationSubmitter,
    tracker: SharedFrameTracker,
}

fn setup() -> Setup {
    let harness = Harness::new();
    let mut service = SwapchainService::new(harness.device(), harness.context.clone());
    service.init(&harness.bus, 2).expect("service init");
    let mut submitter = PresentationSubmitter::new();
    submitter.register(&harness.bus, harness.context.clone());
    let tracker = FrameTracker::shared(service.tracker_setup().expect("tracker setup"));
    Setup {
        harness,
        service,
        submitter,
        tracker,
    }
}

const DONE: u64 = 77;

/// Runs one frame: prepare, then report the submission for presentation.
fn frame(setup: &Setup) -> Result<usize, FrameError> {
    setup.harness.bus.emit(&mut PrepareNextFrame {
        tracker: setup.tracker.clone(),
    })?;
    let image_index = setup.tracker.borrow().current().final_target_image_index();
    setup.harness.bus.emit(&mut RenderSubmissionComplete {
        device: setup.harness.device(),
        done_semaphore: vk::Semaphore::from_raw(DONE),
        image_index,
    })
}

#[test]
fn test_successful_present_uses_current_swapchain() {
    let setup = setup();
    assert!(setup.submitter.is_registered());

    frame(&setup).unwrap();
    frame(&setup).unwrap();

    let presents = setup.harness.device.presents.borrow();
    assert_eq!(presents.len(), 2);
    assert_eq!(presents[0], (vk::SwapchainKHR::from_raw(1), 0, vk::Semaphore::from_raw(DONE)));
    assert_eq!(presents[1].1, 1);
    assert_eq!(setup.harness.device.created_count(), 1);
    assert!(setup.service.last_recreation().is_none());
}

#[test]
fn test_suboptimal_present_recreates_immediately() {
    let setup = setup();
    setup.harness.device.script_present([Ok(true)]);

    frame(&setup).unwrap();
    assert_eq!(setup.harness.device.created_count(), 2);
    assert_eq!(
        setup.service.last_recreation().map(|r| r.trigger),
        Some(RecreationTrigger::Suboptimal)
    );

    // The next present targets the new swapchain.
    frame(&setup).unwrap();
    let presents = setup.harness.device.presents.borrow();
    assert_eq!(presents[1].0.as_raw(), 2);
}

#[test]
fn test_out_of_date_present_recreates() {
    let setup = setup();
    setup
        .harness
        .device
        .script_present([Err(vk::Result::ERROR_OUT_OF_DATE_KHR)]);

    frame(&setup).unwrap();
    assert_eq!(
        setup.service.last_recreation().map(|r| r.trigger),
        Some(RecreationTrigger::OutOfDate)
    );
    assert_eq!(setup.harness.device.live_count(), 1);
}

#[test]
fn test_resize_flag_recreates_after_successful_present() {
    let setup = setup();
    setup.harness.device.script_acquire([Ok((0, false))]);

    setup.harness.bus.emit(&mut PrepareNextFrame {
        tracker: setup.tracker.clone(),
    })
    .unwrap();
    setup.harness.window.set_size(1280, 720);
    setup.harness.context.set_framebuffer_resized();

    setup
        .harness
        .bus
        .emit(&mut RenderSubmissionComplete {
            device: setup.harness.device(),
            done_semaphore: vk::Semaphore::from_raw(DONE),
            image_index: 0,
        })
        .unwrap();

    assert!(!setup.harness.context.is_framebuffer_resized());
    assert_eq!(
        setup.service.last_recreation().map(|r| r.trigger),
        Some(RecreationTrigger::Resized)
    );
    assert_eq!(
        setup.service.current_swapchain().map(|s| s.extent),
        Some(vk::Extent2D {
            width: 1280,
            height: 720
        })
    );
}

#[test]
fn test_hard_present_failure_reaches_emitter() {
    let setup = setup();
    setup
        .harness
        .device
        .script_present([Err(vk::Result::ERROR_DEVICE_LOST)]);

    assert!(matches!(
        frame(&setup),
        Err(FrameError::Present(vk::Result::ERROR_DEVICE_LOST))
    ));
    assert_eq!(setup.harness.device.created_count(), 1);
}

#[test]
fn test_present_without_swapchain_fails() {
    let mut setup = setup();
    setup.service.shutdown().unwrap();

    let result = setup.harness.bus.emit(&mut RenderSubmissionComplete {
        device: setup.harness.device(),
        done_semaphore: vk::Semaphore::from_raw(DONE),
        image_index: 0,
    });
    assert!(matches!(result, Err(FrameError::NoSwapchain)));
    assert!(setup.harness.device.presents.borrow().is_empty());
}

#[test]
fn test_unregistered_submitter_ignores_submissions() {
    let mut setup = setup();
    setup.submitter.unregister();

    assert_eq!(frame(&setup).unwrap(), 0);
    assert!(setup.harness.device.presents.borrow().is_empty());
}

#[test]
fn test_submitter_does_not_touch_tracker() {
    let setup = setup();
    setup.harness.device.script_present([Ok(true)]);

    setup.harness.bus.emit(&mut PrepareNextFrame {
        tracker: setup.tracker.clone(),
    })
    .unwrap();
    let before = *setup.tracker.borrow().current();

    let device: Arc<dyn presenter_rhi::device::SwapchainDevice> = setup.harness.device();
    setup
        .harness
        .bus
        .emit(&mut RenderSubmissionComplete {
            device,
            done_semaphore: vk::Semaphore::from_raw(DONE),
            image_index: before.final_target_image_index(),
        })
        .unwrap();

    assert_eq!(*setup.tracker.borrow().current(), before);
}
