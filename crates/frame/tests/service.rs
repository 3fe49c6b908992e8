//! Swapchain service lifecycle and frame preparation.

mod common;

use ash::vk::{self, Handle};
use presenter_frame::{
    FrameError, FrameTracker, MAX_ACQUIRE_ATTEMPTS, PrepareNextFrame, RecreationTrigger,
    RequestCurrentSwapchain, SharedFrameTracker, SwapchainInvalidated, SwapchainService,
};

use common::Harness;

fn start(harness: &Harness, frames_in_flight: usize) -> (SwapchainService, SharedFrameTracker) {
    let mut service = SwapchainService::new(harness.device(), harness.context.clone());
    service
        .init(&harness.bus, frames_in_flight)
        .expect("service init");
    let setup = service.tracker_setup().expect("tracker setup");
    (service, FrameTracker::shared(setup))
}

fn prepare(harness: &Harness, tracker: &SharedFrameTracker) -> Result<usize, FrameError> {
    harness.bus.emit(&mut PrepareNextFrame {
        tracker: tracker.clone(),
    })
}

#[test]
fn test_tracker_setup_matches_swapchain() {
    let harness = Harness::new();
    let (service, tracker) = start(&harness, 3);

    let setup = *tracker.borrow().setup();
    assert_eq!(setup.frames_in_flight, 3);
    assert_eq!(setup.unique_target_images, 3);
    assert!(service.is_initialized());
}

#[test]
fn test_frame_in_flight_index_is_frame_count_mod_max() {
    for frames_in_flight in 1..=3 {
        let harness = Harness::new();
        let (_service, tracker) = start(&harness, frames_in_flight);

        for _ in 0..10 {
            assert_eq!(prepare(&harness, &tracker).unwrap(), 1);
            let current = *tracker.borrow().current();
            assert_eq!(
                current.frame_in_flight_index() as u64,
                current.frame_count() % frames_in_flight as u64
            );
        }
        assert_eq!(tracker.borrow().current().frame_count(), 10);
    }
}

#[test]
fn test_prepare_stores_acquired_image_and_publishes_sync() {
    let harness = Harness::new();
    let (_service, tracker) = start(&harness, 2);

    harness.device.script_acquire([Ok((2, false))]);
    prepare(&harness, &tracker).unwrap();

    let current = *tracker.borrow().current();
    assert_eq!(current.frame_in_flight_index(), 1);
    assert_eq!(current.final_target_image_index(), 2);

    let (_, semaphore) = harness.device.acquires.borrow()[0];
    let sync = harness.context.sync_info();
    assert_eq!(sync.acquire_semaphore, Some(semaphore));
    assert_eq!(
        sync.image_fence,
        harness.device.fence_resets.borrow().last().copied()
    );
}

#[test]
fn test_stale_acquire_recreates_and_retries() {
    let harness = Harness::new();
    let (service, tracker) = start(&harness, 2);

    harness
        .device
        .script_acquire([Err(vk::Result::ERROR_OUT_OF_DATE_KHR), Ok((1, false))]);
    prepare(&harness, &tracker).unwrap();

    assert_eq!(harness.device.created_count(), 2);
    assert_eq!(harness.device.live_count(), 1);
    assert_eq!(tracker.borrow().current().final_target_image_index(), 1);

    let acquires = harness.device.acquires.borrow();
    assert_eq!(acquires.len(), 2);
    assert_eq!(acquires[0].0.as_raw(), 1);
    assert_eq!(acquires[1].0.as_raw(), 2);
    // Both attempts belong to the same slot.
    assert_eq!(acquires[0].1, acquires[1].1);

    let report = service.last_recreation().expect("recreation report");
    assert_eq!(report.trigger, RecreationTrigger::OutOfDate);
}

#[test]
fn test_persistently_stale_swapchain_is_fatal() {
    let harness = Harness::new();
    let (_service, tracker) = start(&harness, 2);

    harness.device.script_acquire(
        std::iter::repeat_with(|| Err(vk::Result::ERROR_OUT_OF_DATE_KHR))
            .take(MAX_ACQUIRE_ATTEMPTS),
    );
    assert!(matches!(
        prepare(&harness, &tracker),
        Err(FrameError::PersistentlyStale(MAX_ACQUIRE_ATTEMPTS))
    ));
    assert_eq!(harness.device.live_count(), 1);
}

#[test]
fn test_suboptimal_acquire_defers_recreation() {
    let harness = Harness::new();
    let (service, tracker) = start(&harness, 2);

    harness.device.script_acquire([Ok((0, true))]);
    prepare(&harness, &tracker).unwrap();
    assert_eq!(harness.device.created_count(), 1);
    assert_eq!(
        service.pending_recreation(),
        Some(RecreationTrigger::Suboptimal)
    );

    prepare(&harness, &tracker).unwrap();
    assert_eq!(harness.device.created_count(), 2);
    assert_eq!(service.pending_recreation(), None);
    assert_eq!(
        service.last_recreation().map(|r| r.trigger),
        Some(RecreationTrigger::Suboptimal)
    );
}

#[test]
fn test_resize_flag_recreates_before_acquire() {
    let harness = Harness::new();
    let (service, tracker) = start(&harness, 2);

    harness.window.set_size(1920, 1080);
    harness.context.set_framebuffer_resized();
    prepare(&harness, &tracker).unwrap();

    assert!(!harness.context.is_framebuffer_resized());
    let snapshot = service.current_swapchain().expect("swapchain");
    assert_eq!(
        snapshot.extent,
        vk::Extent2D {
            width: 1920,
            height: 1080
        }
    );
    assert_eq!(
        service.last_recreation().map(|r| r.trigger),
        Some(RecreationTrigger::Resized)
    );
}

#[test]
fn test_requested_recreation() {
    let harness = Harness::new();
    let (service, tracker) = start(&harness, 2);

    service.request_recreation(RecreationTrigger::Requested);
    prepare(&harness, &tracker).unwrap();
    assert_eq!(harness.device.created_count(), 2);
}

#[test]
fn test_invalidated_event_recreates_immediately() {
    let harness = Harness::new();
    let (service, _tracker) = start(&harness, 2);

    harness
        .bus
        .emit(&mut SwapchainInvalidated {
            trigger: RecreationTrigger::OutOfDate,
        })
        .unwrap();

    assert_eq!(harness.device.created_count(), 2);
    assert_eq!(service.current_swapchain().map(|s| s.handle.as_raw()), Some(2));
}

#[test]
fn test_invalidated_swapchain_gets_new_generation_when_handle_is_reused() {
    let harness = Harness::new();
    harness.device.reuse_handles.set(true);
    let (service, _tracker) = start(&harness, 2);
    let before = service.current_swapchain().expect("swapchain");

    harness
        .bus
        .emit(&mut SwapchainInvalidated {
            trigger: RecreationTrigger::OutOfDate,
        })
        .unwrap();

    let after = service.current_swapchain().expect("swapchain");
    assert_eq!(harness.device.created_count(), 2);
    assert_eq!(after.handle, before.handle);
    assert_ne!(after, before);
    assert_ne!(after.generation, before.generation);
}

#[test]
fn test_generation_differs_across_reinit() {
    let harness = Harness::new();
    harness.device.reuse_handles.set(true);
    let mut service = SwapchainService::new(harness.device(), harness.context.clone());

    service.init(&harness.bus, 2).unwrap();
    let first = service.current_swapchain().expect("swapchain");
    service.shutdown().unwrap();
    service.init(&harness.bus, 2).unwrap();
    let second = service.current_swapchain().expect("swapchain");

    assert_eq!(first.handle, second.handle);
    assert_ne!(first.generation, second.generation);
}

#[test]
fn test_pending_recreation_absorbs_resize() {
    let harness = Harness::new();
    let (service, tracker) = start(&harness, 2);

    service.request_recreation(RecreationTrigger::Requested);
    harness.window.set_size(1024, 768);
    harness.context.set_framebuffer_resized();

    prepare(&harness, &tracker).unwrap();
    prepare(&harness, &tracker).unwrap();

    assert_eq!(harness.device.created_count(), 2);
    assert!(!harness.context.is_framebuffer_resized());
    assert_eq!(
        service.current_swapchain().map(|s| s.extent),
        Some(vk::Extent2D {
            width: 1024,
            height: 768
        })
    );
    assert_eq!(
        service.last_recreation().map(|r| r.trigger),
        Some(RecreationTrigger::Requested)
    );
}

#[test]
fn test_request_current_swapchain() {
    let harness = Harness::new();
    let (mut service, _tracker) = start(&harness, 2);

    let mut request = RequestCurrentSwapchain::new();
    harness.bus.emit(&mut request).unwrap();
    let snapshot = request.swapchain.expect("snapshot");
    assert_eq!(snapshot.handle.as_raw(), 1);
    assert_eq!(snapshot.format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(snapshot.images.len(), 3);

    service.shutdown().unwrap();
    let mut request = RequestCurrentSwapchain::new();
    assert_eq!(harness.bus.emit(&mut request).unwrap(), 0);
    assert!(request.swapchain.is_none());
}

#[test]
fn test_init_shutdown_can_repeat() {
    let harness = Harness::new();
    let mut service = SwapchainService::new(harness.device(), harness.context.clone());

    for round in 1..=3 {
        service.init(&harness.bus, 2).unwrap();
        assert_eq!(harness.bus.subscriber_count::<PrepareNextFrame>(), 1);
        assert_eq!(harness.device.live_count(), 1);

        service.shutdown().unwrap();
        service.shutdown().unwrap();
        assert_eq!(harness.bus.subscriber_count::<PrepareNextFrame>(), 0);
        assert_eq!(harness.bus.subscriber_count::<SwapchainInvalidated>(), 0);
        assert_eq!(harness.device.live_count(), 0);
        assert_eq!(harness.device.created_count(), round);
    }
    assert!(harness.device.idle_waits.get() >= 3);
}

#[test]
fn test_init_twice_keeps_one_swapchain() {
    let harness = Harness::new();
    let (mut service, _tracker) = start(&harness, 2);

    service.init(&harness.bus, 2).unwrap();
    assert_eq!(harness.device.created_count(), 1);
    assert_eq!(harness.bus.subscriber_count::<PrepareNextFrame>(), 1);
}

#[test]
fn test_prepare_after_shutdown_has_no_listener() {
    let harness = Harness::new();
    let (mut service, tracker) = start(&harness, 2);
    service.shutdown().unwrap();

    assert_eq!(prepare(&harness, &tracker).unwrap(), 0);
    assert_eq!(tracker.borrow().current().frame_count(), 0);
}

#[test]
fn test_dropping_service_destroys_swapchain() {
    let harness = Harness::new();
    let (service, _tracker) = start(&harness, 2);
    drop(service);

    assert_eq!(harness.device.live_count(), 0);
    assert_eq!(harness.bus.subscriber_count::<RequestCurrentSwapchain>(), 0);
}

#[test]
fn test_tracker_borrowed_elsewhere_is_reported() {
    let harness = Harness::new();
    let (_service, tracker) = start(&harness, 2);

    let _held = tracker.borrow_mut();
    assert!(matches!(
        prepare(&harness, &tracker),
        Err(FrameError::ReentrantDispatch(_))
    ));
}
