//! Per-window state shared by the frame components.

use std::cell::{Cell, Ref, RefCell, RefMut};

use ash::vk;
use presenter_platform::{FramebufferSource, InputState};

/// Synchronization objects of the frame being rendered.
///
/// The renderer waits on `acquire_semaphore` before writing the target image
/// and signals `image_fence` when its submission completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentFrameSyncInfo {
    pub acquire_semaphore: Option<vk::Semaphore>,
    pub image_fence: Option<vk::Fence>,
}

/// Shared windowing context: surface, window, input and the current frame's
/// sync objects.
///
/// Only the swapchain writes [`sync_info`](Self::sync_info).
pub struct WindowingContext {
    surface: vk::SurfaceKHR,
    window: Box<dyn FramebufferSource>,
    sync_info: Cell<CurrentFrameSyncInfo>,
    framebuffer_resized: Cell<bool>,
    input: RefCell<InputState>,
}

impl WindowingContext {
    pub fn new(surface: vk::SurfaceKHR, window: Box<dyn FramebufferSource>) -> Self {
        Self {
            surface,
            window,
            sync_info: Cell::new(CurrentFrameSyncInfo::default()),
            framebuffer_resized: Cell::new(false),
            input: RefCell::new(InputState::new()),
        }
    }

    #[inline]
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    #[inline]
    pub fn window(&self) -> &dyn FramebufferSource {
        self.window.as_ref()
    }

    /// Current framebuffer size of the window.
    pub fn framebuffer_size(&self) -> vk::Extent2D {
        self.window.framebuffer_size()
    }

    pub fn publish_sync_info(&self, info: CurrentFrameSyncInfo) {
        self.sync_info.set(info);
    }

    #[inline]
    pub fn sync_info(&self) -> CurrentFrameSyncInfo {
        self.sync_info.get()
    }

    /// Records that the window reported a resize since the last frame.
    pub fn set_framebuffer_resized(&self) {
        self.framebuffer_resized.set(true);
    }

    #[inline]
    pub fn is_framebuffer_resized(&self) -> bool {
        self.framebuffer_resized.get()
    }

    /// Clears the resize flag and returns its previous value.
    pub fn take_framebuffer_resized(&self) -> bool {
        self.framebuffer_resized.replace(false)
    }

    pub fn input(&self) -> Ref<'_, InputState> {
        self.input.borrow()
    }

    pub fn input_mut(&self) -> RefMut<'_, InputState> {
        self.input.borrow_mut()
    }
}

impl std::fmt::Debug for WindowingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowingContext")
            .field("surface", &self.surface)
            .field("sync_info", &self.sync_info.get())
            .field("framebuffer_resized", &self.framebuffer_resized.get())
            .finish_non_exhaustive()
    }
}
