//! Scripted stand-ins for the driver and the window.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use presenter_frame::{EventBus, ResourceRequest, Subscription, WindowingContext};
use presenter_platform::FramebufferSource;
use presenter_rhi::RhiResult;
use presenter_rhi::device::SwapchainDevice;
use presenter_rhi::surface::SurfaceSupport;
use presenter_rhi::swapchain::SwapchainDesc;

/// Surface whose extent follows the window, bounded to `[1, 4096]`.
pub fn default_support() -> SurfaceSupport {
    SurfaceSupport {
        capabilities: vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_SRC,
            ..Default::default()
        },
        formats: vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ],
        present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
    }
}

/// Driver double. Acquire and present follow their scripts first, then fall
/// back to round-robin images and plain success.
pub struct FakeDevice {
    pub support: RefCell<SurfaceSupport>,
    pub families: Vec<u32>,
    next_swapchain: Cell<u64>,
    image_count: Cell<u32>,
    next_image: Cell<u32>,
    pub acquire_script: RefCell<VecDeque<VkResult<(u32, bool)>>>,
    pub present_script: RefCell<VecDeque<VkResult<bool>>>,
    pub fence_wait_error: Cell<Option<vk::Result>>,
    pub fence_reset_error: Cell<Option<vk::Result>>,
    /// Hand out the lowest raw handle not currently live, like drivers that
    /// recycle destroyed handles
    pub reuse_handles: Cell<bool>,
    /// Ordered record of swapchain lifetime and idle calls
    pub log: RefCell<Vec<String>>,
    pub live_swapchains: RefCell<Vec<vk::SwapchainKHR>>,
    pub created: RefCell<Vec<SwapchainDesc>>,
    pub acquires: RefCell<Vec<(vk::SwapchainKHR, vk::Semaphore)>>,
    pub presents: RefCell<Vec<(vk::SwapchainKHR, u32, vk::Semaphore)>>,
    pub fence_waits: RefCell<Vec<vk::Fence>>,
    pub fence_resets: RefCell<Vec<vk::Fence>>,
    pub idle_waits: Cell<u32>,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            support: RefCell::new(default_support()),
            families: vec![0],
            next_swapchain: Cell::new(1),
            image_count: Cell::new(0),
            next_image: Cell::new(0),
            acquire_script: RefCell::new(VecDeque::new()),
            present_script: RefCell::new(VecDeque::new()),
            fence_wait_error: Cell::new(None),
            fence_reset_error: Cell::new(None),
            reuse_handles: Cell::new(false),
            log: RefCell::new(Vec::new()),
            live_swapchains: RefCell::new(Vec::new()),
            created: RefCell::new(Vec::new()),
            acquires: RefCell::new(Vec::new()),
            presents: RefCell::new(Vec::new()),
            fence_waits: RefCell::new(Vec::new()),
            fence_resets: RefCell::new(Vec::new()),
            idle_waits: Cell::new(0),
        })
    }

    pub fn script_acquire(&self, results: impl IntoIterator<Item = VkResult<(u32, bool)>>) {
        self.acquire_script.borrow_mut().extend(results);
    }

    pub fn script_present(&self, results: impl IntoIterator<Item = VkResult<bool>>) {
        self.present_script.borrow_mut().extend(results);
    }

    pub fn created_count(&self) -> usize {
        self.created.borrow().len()
    }

    pub fn live_count(&self) -> usize {
        self.live_swapchains.borrow().len()
    }

    pub fn clear_fence_log(&self) {
        self.fence_waits.borrow_mut().clear();
        self.fence_resets.borrow_mut().clear();
    }
}

impl SwapchainDevice for FakeDevice {
    fn surface_support(&self, _surface: vk::SurfaceKHR) -> RhiResult<SurfaceSupport> {
        Ok(self.support.borrow().clone())
    }

    fn queue_family_indices(&self) -> Vec<u32> {
        self.families.clone()
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> RhiResult<vk::SwapchainKHR> {
        let raw = if self.reuse_handles.get() {
            let live = self.live_swapchains.borrow();
            (1..)
                .find(|&raw| !live.contains(&vk::SwapchainKHR::from_raw(raw)))
                .unwrap_or(1)
        } else {
            let raw = self.next_swapchain.get();
            self.next_swapchain.set(raw + 1);
            raw
        };
        let handle = vk::SwapchainKHR::from_raw(raw);

        self.image_count.set(desc.image_count);
        self.next_image.set(0);
        self.created.borrow_mut().push(desc.clone());
        self.live_swapchains.borrow_mut().push(handle);
        self.log.borrow_mut().push(format!("create {}", raw));
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>> {
        Ok((0..u64::from(self.image_count.get()))
            .map(|i| vk::Image::from_raw(swapchain.as_raw() * 100 + i))
            .collect())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.live_swapchains.borrow_mut().retain(|&s| s != swapchain);
        self.log
            .borrow_mut()
            .push(format!("destroy {}", swapchain.as_raw()));
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.acquires.borrow_mut().push((swapchain, signal));
        if let Some(result) = self.acquire_script.borrow_mut().pop_front() {
            return result;
        }
        let image = self.next_image.get();
        self.next_image
            .set((image + 1) % self.image_count.get().max(1));
        Ok((image, false))
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        self.presents
            .borrow_mut()
            .push((swapchain, image_index, wait));
        self.present_script
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(false))
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        self.fence_waits.borrow_mut().push(fence);
        match self.fence_wait_error.get() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.fence_resets.borrow_mut().push(fence);
        match self.fence_reset_error.get() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.idle_waits.set(self.idle_waits.get() + 1);
        self.log.borrow_mut().push("idle".to_string());
        Ok(())
    }
}

/// Window double whose size changes only when events are waited for.
pub struct FakeWindow {
    size: Cell<(u32, u32)>,
    queued: RefCell<VecDeque<(u32, u32)>>,
    pub waits: Cell<u32>,
}

impl FakeWindow {
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            size: Cell::new((width, height)),
            queued: RefCell::new(VecDeque::new()),
            waits: Cell::new(0),
        })
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }

    /// Sizes delivered one per `wait_events` call.
    pub fn queue_sizes(&self, sizes: impl IntoIterator<Item = (u32, u32)>) {
        self.queued.borrow_mut().extend(sizes);
    }
}

/// Lets a test keep a handle on the window the context owns.
pub struct SharedWindow(pub Rc<FakeWindow>);

impl FramebufferSource for SharedWindow {
    fn framebuffer_size(&self) -> vk::Extent2D {
        let (width, height) = self.0.size.get();
        vk::Extent2D { width, height }
    }

    fn wait_events(&self) {
        self.0.waits.set(self.0.waits.get() + 1);
        if let Some(size) = self.0.queued.borrow_mut().pop_front() {
            self.0.size.set(size);
        }
    }
}

pub const FENCE_BASE: u64 = 1_000;
pub const SEMAPHORE_BASE: u64 = 2_000;

/// Hands out fresh raw handles for every resource request.
pub fn register_resources(bus: &Rc<EventBus>) -> (Subscription, Rc<Cell<u64>>) {
    let served = Rc::new(Cell::new(0u64));
    let counter = served.clone();
    let subscription = bus.subscribe(move |request: &mut ResourceRequest| {
        let n = counter.get();
        counter.set(n + 1);
        match request {
            ResourceRequest::Fence { handle, .. } => {
                *handle = Some(vk::Fence::from_raw(FENCE_BASE + n));
            }
            ResourceRequest::Semaphore { handle, .. } => {
                *handle = Some(vk::Semaphore::from_raw(SEMAPHORE_BASE + n));
            }
        }
        Ok(())
    });
    (subscription, served)
}

/// Bus, context and doubles wired together.
pub struct Harness {
    pub device: Arc<FakeDevice>,
    pub window: Rc<FakeWindow>,
    pub context: Rc<WindowingContext>,
    pub bus: Rc<EventBus>,
    pub resources: Subscription,
    pub served: Rc<Cell<u64>>,
}

impl Harness {
    pub fn new() -> Self {
        let device = FakeDevice::new();
        let window = FakeWindow::new(800, 600);
        let context = Rc::new(WindowingContext::new(
            vk::SurfaceKHR::from_raw(42),
            Box::new(SharedWindow(window.clone())),
        ));
        let bus = EventBus::new();
        let (resources, served) = register_resources(&bus);
        Self {
            device,
            window,
            context,
            bus,
            resources,
            served,
        }
    }

    pub fn device(&self) -> Arc<dyn SwapchainDevice> {
        self.device.clone()
    }
}
