//! Swapchain recreation state machine.
//!
//! Recreation always walks the same path:
//!
//! ```text
//! Normal -> WaitNonZeroFramebuffer -> DeviceIdle -> Destroyed -> Recreated -> Normal
//! ```
//!
//! While the window has no drawable area (minimized) the machine stays in
//! `WaitNonZeroFramebuffer`, yielding to the platform between polls. The old
//! swapchain is destroyed before the new one is created, so at most one
//! swapchain exists for the surface at any time.

use presenter_platform::{FramebufferSource, is_zero_sized};
use presenter_rhi::RhiError;
use presenter_rhi::swapchain::SwapchainDesc;
use tracing::{debug, info};

use crate::error::FrameResult;
use crate::swapchain::Swapchain;

/// Stage of a swapchain recreation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecreationState {
    #[default]
    Normal,
    WaitNonZeroFramebuffer,
    DeviceIdle,
    Destroyed,
    Recreated,
}

impl RecreationState {
    /// Stage that follows `self` once its work is done.
    pub fn next(self) -> Self {
        match self {
            Self::Normal => Self::WaitNonZeroFramebuffer,
            Self::WaitNonZeroFramebuffer => Self::DeviceIdle,
            Self::DeviceIdle => Self::Destroyed,
            Self::Destroyed => Self::Recreated,
            Self::Recreated => Self::Normal,
        }
    }
}

/// Why a swapchain is being recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreationTrigger {
    /// Acquire or present returned `ERROR_OUT_OF_DATE_KHR`
    OutOfDate,
    /// Acquire or present reported a suboptimal swapchain
    Suboptimal,
    /// The window reported a framebuffer resize
    Resized,
    /// Requested by the application
    Requested,
}

/// Outcome of one recreation.
#[derive(Debug, Clone)]
pub struct RecreationReport {
    pub trigger: RecreationTrigger,
    /// Framebuffer polls spent waiting for a drawable area
    pub zero_size_polls: u32,
    pub old_desc: SwapchainDesc,
    pub new_desc: SwapchainDesc,
}

impl RecreationReport {
    /// Whether the negotiated parameters changed.
    pub fn changed(&self) -> bool {
        self.old_desc != self.new_desc
    }
}

/// Blocks until `window` reports a non-zero framebuffer.
///
/// Returns how many times it had to wait.
pub fn wait_for_drawable_area(window: &dyn FramebufferSource) -> u32 {
    let mut polls = 0;
    while is_zero_sized(window.framebuffer_size()) {
        window.wait_events();
        polls += 1;
    }
    polls
}

/// Rebuilds `swapchain` against the current surface and framebuffer.
///
/// On success the swapchain is usable again and no image is owned by any
/// frame slot; the slot fences and semaphores are reused. On error the
/// swapchain may be left without a handle.
pub fn recreate_swapchain(
    swapchain: &mut Swapchain,
    trigger: RecreationTrigger,
) -> FrameResult<RecreationReport> {
    let old_desc = swapchain.desc().clone();
    let mut state = RecreationState::Normal.next();
    let mut zero_size_polls = 0;
    debug!("Recreating swapchain ({:?})", trigger);

    while state != RecreationState::Normal {
        match state {
            RecreationState::WaitNonZeroFramebuffer => {
                zero_size_polls = wait_for_drawable_area(swapchain.context().window());
            }
            RecreationState::DeviceIdle => {
                swapchain.device().wait_idle().map_err(RhiError::from)?;
            }
            RecreationState::Destroyed => swapchain.release(),
            RecreationState::Recreated => swapchain.rebuild()?,
            RecreationState::Normal => {}
        }
        debug!("Recreation reached {:?}", state);
        state = state.next();
    }

    let new_desc = swapchain.desc().clone();
    info!(
        "Swapchain recreated ({:?}): {}x{} -> {}x{}, {} images",
        trigger,
        old_desc.extent.width,
        old_desc.extent.height,
        new_desc.extent.width,
        new_desc.extent.height,
        swapchain.image_count()
    );

    Ok(RecreationReport {
        trigger,
        zero_size_polls,
        old_desc,
        new_desc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_state_sequence() {
        let mut state = RecreationState::Normal;
        let mut visited = Vec::new();
        loop {
            state = state.next();
            visited.push(state);
            if state == RecreationState::Normal {
                break;
            }
        }
        assert_eq!(
            visited,
            vec![
                RecreationState::WaitNonZeroFramebuffer,
                RecreationState::DeviceIdle,
                RecreationState::Destroyed,
                RecreationState::Recreated,
                RecreationState::Normal,
            ]
        );
    }

    struct ScriptedWindow {
        sizes: RefCell<Vec<(u32, u32)>>,
        waits: Cell<u32>,
    }

    impl FramebufferSource for ScriptedWindow {
        fn framebuffer_size(&self) -> vk::Extent2D {
            let sizes = self.sizes.borrow();
            let (width, height) = sizes.first().copied().unwrap_or((800, 600));
            vk::Extent2D { width, height }
        }

        fn wait_events(&self) {
            self.waits.set(self.waits.get() + 1);
            let mut sizes = self.sizes.borrow_mut();
            if !sizes.is_empty() {
                sizes.remove(0);
            }
        }
    }

    #[test]
    fn test_wait_for_drawable_area_polls_until_non_zero() {
        let window = ScriptedWindow {
            sizes: RefCell::new(vec![(0, 0), (800, 0), (0, 600), (800, 600)]),
            waits: Cell::new(0),
        };
        assert_eq!(wait_for_drawable_area(&window), 3);
        assert_eq!(window.waits.get(), 3);
    }

    #[test]
    fn test_wait_for_drawable_area_returns_immediately() {
        let window = ScriptedWindow {
            sizes: RefCell::new(vec![(1, 1)]),
            waits: Cell::new(0),
        };
        assert_eq!(wait_for_drawable_area(&window), 0);
        assert_eq!(window.waits.get(), 0);
    }
}
