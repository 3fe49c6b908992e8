//! Presenter demo
//!
//! Opens a window and drives the presentation layer with a clear pass. Each
//! redraw emits `PrepareNextFrame`, clears the acquired image and hands it to
//! the presentation submitter. Resize and minimize the window to exercise
//! swapchain recreation; press R to force one and Escape to quit.
//!
//! Settings are read from `presenter.toml` in the working directory when it
//! exists.

mod clear_pass;

use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window as WinitWindow, WindowId};

use presenter_core::PresentConfig;
use presenter_frame::{
    EventBus, FrameTracker, PrepareNextFrame, PresentationSubmitter, RecreationTrigger,
    SharedFrameTracker, SwapchainService, SyncObjectManager, WindowingContext,
};
use presenter_platform::{Surface, Window, is_zero_sized};
use presenter_rhi::device::Device;
use presenter_rhi::instance::Instance;
use presenter_rhi::physical_device::select_physical_device;

use clear_pass::ClearPass;

const CONFIG_PATH: &str = "presenter.toml";

/// Everything that lives as long as the window.
///
/// Fields drop in declaration order: GPU consumers first, then the device,
/// the surface, the window and finally the instance.
struct Presenter {
    clear_pass: ClearPass,
    submitter: PresentationSubmitter,
    service: SwapchainService,
    resources: SyncObjectManager,
    tracker: SharedFrameTracker,
    bus: Rc<EventBus>,
    _device: Arc<Device>,
    _surface: Surface,
    context: Rc<WindowingContext>,
    instance: Instance,
}

impl Presenter {
    fn new(event_loop: &ActiveEventLoop, config: &PresentConfig) -> Result<(Self, Arc<WinitWindow>)> {
        let window = Window::new(event_loop, &config.window)?;
        let extensions = window.required_extensions()?;
        let instance = Instance::new(c"Presenter", &extensions, config.enable_validation)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let gpu = select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        info!("Using {} ({})", gpu.device_name(), gpu.device_type_name());
        let device = Device::new(&instance, &gpu)?;

        let winit_window = window.inner_arc();
        let context = Rc::new(WindowingContext::new(surface.handle(), Box::new(window)));
        let bus = EventBus::new();

        let mut resources = SyncObjectManager::new(device.clone());
        resources.register(&bus);

        let mut service = SwapchainService::new(device.clone(), context.clone());
        service.init(&bus, config.frames_in_flight)?;

        let mut submitter = PresentationSubmitter::new();
        submitter.register(&bus, context.clone());

        let setup = service
            .tracker_setup()
            .ok_or_else(|| anyhow!("swapchain service did not initialize"))?;
        let tracker = FrameTracker::shared(setup);
        let clear_pass = ClearPass::new(device.clone(), setup.frames_in_flight)?;

        info!(
            "Presenter ready: {} frames in flight, {} swapchain images",
            setup.frames_in_flight, setup.unique_target_images
        );

        Ok((
            Self {
                clear_pass,
                submitter,
                service,
                resources,
                tracker,
                bus,
                _device: device,
                _surface: surface,
                context,
                instance,
            },
            winit_window,
        ))
    }

    fn draw_frame(&mut self) -> Result<()> {
        // Nothing can be presented to a minimized window.
        if is_zero_sized(self.context.framebuffer_size()) {
            return Ok(());
        }

        self.bus.emit(&mut PrepareNextFrame {
            tracker: self.tracker.clone(),
        })?;

        let tracker = self.tracker.borrow();
        self.clear_pass.render(&self.bus, &self.context, &tracker)?;
        Ok(())
    }

    fn handle_input(&mut self, event_loop: &ActiveEventLoop) {
        let input = self.context.input();
        if input.is_key_just_pressed(KeyCode::Escape) {
            info!("Escape pressed, shutting down");
            event_loop.exit();
        }
        if input.is_key_just_pressed(KeyCode::KeyR) {
            info!("Swapchain recreation requested");
            self.service.request_recreation(RecreationTrigger::Requested);
        }
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        self.submitter.unregister();
        if let Err(e) = self.service.shutdown() {
            error!("Failed to shut down swapchain service: {}", e);
        }
        self.resources.unregister();
        info!(
            "Released presenter ({} fences, {} semaphores, validation {})",
            self.resources.fence_count(),
            self.resources.semaphore_count(),
            self.instance.has_validation()
        );
    }
}

struct App {
    config: PresentConfig,
    window: Option<Arc<WinitWindow>>,
    presenter: Option<Presenter>,
}

impl App {
    fn new(config: PresentConfig) -> Self {
        Self {
            config,
            window: None,
            presenter: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.presenter.is_some() {
            return;
        }
        match Presenter::new(event_loop, &self.config) {
            Ok((presenter, window)) => {
                info!("Initialization complete, entering main loop");
                self.presenter = Some(presenter);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to initialize presenter: {:?}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };

        if presenter.context.input_mut().handle_event(&event) {
            presenter.handle_input(event_loop);
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                info!("Window resized to {}x{}", size.width, size.height);
                presenter.context.set_framebuffer_resized();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = presenter.draw_frame() {
                    error!("Frame failed: {:?}", e);
                    event_loop.exit();
                }
                presenter.context.input_mut().end_frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Tear down while the window still exists.
        self.presenter = None;
        self.window = None;
    }
}

fn main() -> Result<()> {
    let config = PresentConfig::load_or_default(CONFIG_PATH);
    let filter = config
        .as_ref()
        .ok()
        .and_then(|c| c.log_filter.clone())
        .unwrap_or_else(|| presenter_core::DEFAULT_LOG_FILTER.to_string());
    presenter_core::init_logging_with_filter(&filter);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring {}: {}", CONFIG_PATH, e);
            PresentConfig::default()
        }
    };
    info!("Starting presenter");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
