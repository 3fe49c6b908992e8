//! Platform layer for the presentation stack.
//!
//! This crate provides:
//! - Window management via winit
//! - Vulkan surface creation and ownership
//! - Keyboard and mouse state
//! - The [`FramebufferSource`] trait swapchain recreation polls

mod framebuffer;
mod input;
mod window;

pub use framebuffer::{FramebufferSource, is_zero_sized};
pub use input::{InputState, KeyCode, MouseButton};
pub use window::{MINIMIZED_POLL_INTERVAL, Surface, Window, get_required_extensions};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
