//! Demo render component: clears the acquired image to a cycling colour.
//!
//! The pass only talks to the presentation layer through the bus and the
//! windowing context. Every frame it looks up the current swapchain, records
//! into its slot's command buffer, submits with the slot's fence and acquire
//! semaphore, and hands the image over for presentation.

use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};
use ash::vk;
use tracing::{debug, info};

use presenter_frame::{
    EventBus, FrameTracker, RenderSubmissionComplete, RequestCurrentSwapchain, SwapchainSnapshot,
    WindowingContext,
};
use presenter_rhi::command::CommandPool;
use presenter_rhi::device::{Device, SwapchainDevice};
use presenter_rhi::swapchain::{create_image_views, destroy_image_views};
use presenter_rhi::sync::Semaphore;

/// Per-swapchain render targets, rebuilt whenever the swapchain changes.
struct Targets {
    generation: u64,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    /// Signaled when rendering into the matching image is done
    render_done: Vec<Semaphore>,
}

pub struct ClearPass {
    device: Arc<Device>,
    // Buffers are freed with the pool.
    _pool: CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    targets: Option<Targets>,
}

impl ClearPass {
    pub fn new(device: Arc<Device>, frames_in_flight: usize) -> Result<Self> {
        let family = device
            .queue_families()
            .graphics_family
            .ok_or_else(|| anyhow!("device has no graphics queue family"))?;
        let pool = CommandPool::new(device.clone(), family)?;
        let command_buffers = pool.allocate_command_buffers(frames_in_flight as u32)?;

        info!(
            "Clear pass ready with {} command buffer(s)",
            command_buffers.len()
        );

        Ok(Self {
            device,
            _pool: pool,
            command_buffers,
            targets: None,
        })
    }

    /// Records and submits the clear for the frame described by `tracker`,
    /// then emits [`RenderSubmissionComplete`].
    pub fn render(
        &mut self,
        bus: &EventBus,
        context: &WindowingContext,
        tracker: &FrameTracker,
    ) -> Result<()> {
        let mut request = RequestCurrentSwapchain::new();
        bus.emit(&mut request)?;
        let swapchain = request
            .swapchain
            .ok_or_else(|| anyhow!("no swapchain to render into"))?;
        self.ensure_targets(&swapchain)?;

        let frame = tracker.current();
        let slot = frame.frame_in_flight_index();
        let image_index = frame.final_target_image_index();
        let cmd = *self
            .command_buffers
            .get(slot)
            .ok_or_else(|| anyhow!("no command buffer for frame slot {}", slot))?;

        let targets = self
            .targets
            .as_ref()
            .ok_or_else(|| anyhow!("render targets missing"))?;
        let image = *targets
            .images
            .get(image_index as usize)
            .ok_or_else(|| anyhow!("swapchain has no image {}", image_index))?;
        let view = targets.views[image_index as usize];
        let done_semaphore = targets.render_done[image_index as usize].handle();

        self.record(
            cmd,
            image,
            view,
            targets.extent,
            clear_color(frame.frame_count()),
        )?;

        let sync = context.sync_info();
        let acquire_semaphore = sync
            .acquire_semaphore
            .context("no acquire semaphore published for this frame")?;
        let fence = sync
            .image_fence
            .context("no fence published for this frame")?;

        let wait_semaphores = [acquire_semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [done_semaphore];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the buffer was recorded above, the fence was reset by the
        // acquire for this slot and the semaphores belong to this frame.
        unsafe { self.device.submit_graphics(&[submit_info], fence)? };

        let device: Arc<dyn SwapchainDevice> = self.device.clone();
        bus.emit(&mut RenderSubmissionComplete {
            device,
            done_semaphore,
            image_index,
        })?;
        Ok(())
    }

    fn ensure_targets(&mut self, swapchain: &SwapchainSnapshot) -> Result<()> {
        if self
            .targets
            .as_ref()
            .is_some_and(|targets| targets.generation == swapchain.generation)
        {
            return Ok(());
        }

        // A new generation means the swapchain was recreated after a device idle.
        self.release_targets();

        let views = create_image_views(self.device.handle(), &swapchain.images, swapchain.format)?;
        let render_done = swapchain
            .images
            .iter()
            .map(|_| Semaphore::new(self.device.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Render targets rebuilt: {}x{}, {} images",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.images.len()
        );

        self.targets = Some(Targets {
            generation: swapchain.generation,
            extent: swapchain.extent,
            images: swapchain.images.clone(),
            views,
            render_done,
        });
        Ok(())
    }

    fn release_targets(&mut self) {
        if let Some(mut targets) = self.targets.take() {
            destroy_image_views(self.device.handle(), &mut targets.views);
        }
    }

    fn record(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        view: vk::ImageView,
        extent: vk::Extent2D,
        color: [f32; 4],
    ) -> Result<()> {
        let device = self.device.handle();

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin_info)?;
        }

        transition(
            device,
            cmd,
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));

        unsafe {
            device.cmd_begin_rendering(cmd, &rendering_info);
            device.cmd_end_rendering(cmd);
        }

        transition(
            device,
            cmd,
            image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );

        unsafe { device.end_command_buffer(cmd)? };
        Ok(())
    }
}

impl Drop for ClearPass {
    fn drop(&mut self) {
        self.release_targets();
    }
}

fn transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let (src_stage, src_access, dst_stage, dst_access) =
        if new_layout == vk::ImageLayout::PRESENT_SRC_KHR {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::AccessFlags::empty(),
            )
        } else {
            // Wait on the acquire semaphore's stage before the first write.
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::empty(),
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
        };

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .level_count(1)
                .layer_count(1),
        )
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

/// Slowly cycling colour, one full turn every 600 frames.
fn clear_color(frame_count: u64) -> [f32; 4] {
    let phase = (frame_count % 600) as f32 / 600.0 * std::f32::consts::TAU;
    let third = std::f32::consts::TAU / 3.0;
    [
        0.5 + 0.4 * phase.sin(),
        0.5 + 0.4 * (phase + third).sin(),
        0.5 + 0.4 * (phase + 2.0 * third).sin(),
        1.0,
    ]
}
