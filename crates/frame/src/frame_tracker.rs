//! Frame-in-flight bookkeeping.
//!
//! The frame loop owns the tracker; the swapchain service is the only writer
//! of the slot and target image indices, everyone else reads them.

use std::cell::RefCell;
use std::rc::Rc;

/// Tracker shared between the frame loop and event listeners.
pub type SharedFrameTracker = Rc<RefCell<FrameTracker>>;

/// Fixed parameters of a frame tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTrackerSetup {
    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Number of swapchain images frames are rendered into
    pub unique_target_images: usize,
}

/// Indices describing the frame being prepared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentFrame {
    frame_in_flight_index: usize,
    final_target_image_index: u32,
    frame_count: u64,
}

impl CurrentFrame {
    /// Slot in `[0, frames_in_flight)` whose fence and semaphore this frame uses.
    #[inline]
    pub fn frame_in_flight_index(&self) -> usize {
        self.frame_in_flight_index
    }

    /// Swapchain image acquired for this frame.
    #[inline]
    pub fn final_target_image_index(&self) -> u32 {
        self.final_target_image_index
    }

    /// Number of frames prepared so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn set_frame_in_flight_index(&mut self, index: usize) {
        self.frame_in_flight_index = index;
    }

    pub fn set_final_target_image_index(&mut self, index: u32) {
        self.final_target_image_index = index;
    }
}

/// Owns the frame counters for one presentation target.
#[derive(Debug, Clone)]
pub struct FrameTracker {
    setup: FrameTrackerSetup,
    current: CurrentFrame,
}

impl FrameTracker {
    pub fn new(setup: FrameTrackerSetup) -> Self {
        Self {
            setup,
            current: CurrentFrame::default(),
        }
    }

    /// Wraps a new tracker for sharing through events.
    pub fn shared(setup: FrameTrackerSetup) -> SharedFrameTracker {
        Rc::new(RefCell::new(Self::new(setup)))
    }

    #[inline]
    pub fn setup(&self) -> &FrameTrackerSetup {
        &self.setup
    }

    #[inline]
    pub fn current(&self) -> &CurrentFrame {
        &self.current
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut CurrentFrame {
        &mut self.current
    }

    /// Advances the generic per-frame counter.
    pub fn trigger_increment_for_current_frame(&mut self) {
        self.current.frame_count += 1;
    }

    /// Updates the image count after the swapchain was rebuilt.
    pub fn set_unique_target_images(&mut self, count: usize) {
        self.setup.unique_target_images = count;
    }
}

/// Slot that follows `current` in a ring of `frames_in_flight` slots.
///
/// A ring of zero slots is treated as a ring of one.
#[inline]
pub fn next_frame_in_flight(current: usize, frames_in_flight: usize) -> usize {
    (current + 1) % frames_in_flight.max(1)
}
