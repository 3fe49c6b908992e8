//! Keyboard and mouse state owned by the windowing context.
//!
//! Window events are folded into an [`InputState`] as they arrive; consumers
//! poll it once per frame and call [`InputState::end_frame`] afterwards.

use std::collections::HashSet;

use winit::event::{ElementState, WindowEvent};
use winit::keyboard::PhysicalKey;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            winit::event::MouseButton::Back => MouseButton::Other(3),
            winit::event::MouseButton::Forward => MouseButton::Other(4),
            winit::event::MouseButton::Other(id) => MouseButton::Other(id),
        }
    }
}

/// Current keyboard and mouse state.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    /// Keys whose press arrived since the last `end_frame`
    just_pressed_keys: HashSet<KeyCode>,
    pressed_buttons: HashSet<MouseButton>,
    cursor_position: (f64, f64),
}

impl InputState {
    /// Create an empty input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a window event into the state.
    ///
    /// Returns true if the event was an input event.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.set_key(key, event.state);
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.set_button((*button).into(), *state);
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_position = (position.x, position.y);
                true
            }
            WindowEvent::Focused(false) => {
                // Releases are not delivered to unfocused windows
                self.pressed_keys.clear();
                self.pressed_buttons.clear();
                false
            }
            _ => false,
        }
    }

    /// Records a key transition.
    pub fn set_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if self.pressed_keys.insert(key) {
                    self.just_pressed_keys.insert(key);
                }
            }
            ElementState::Released => {
                self.pressed_keys.remove(&key);
            }
        }
    }

    /// Records a mouse button transition.
    pub fn set_button(&mut self, button: MouseButton, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.pressed_buttons.insert(button);
            }
            ElementState::Released => {
                self.pressed_buttons.remove(&button);
            }
        }
    }

    /// Clears per-frame state. Call once the frame has consumed its input.
    pub fn end_frame(&mut self) {
        self.just_pressed_keys.clear();
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// True only on the first frame a key is held.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Cursor position in physical pixels.
    pub fn cursor_position(&self) -> (f64, f64) {
        self.cursor_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_and_release() {
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyR, ElementState::Pressed);
        assert!(input.is_key_pressed(KeyCode::KeyR));
        assert!(input.is_key_just_pressed(KeyCode::KeyR));

        input.end_frame();
        assert!(input.is_key_pressed(KeyCode::KeyR));
        assert!(!input.is_key_just_pressed(KeyCode::KeyR));

        input.set_key(KeyCode::KeyR, ElementState::Released);
        assert!(!input.is_key_pressed(KeyCode::KeyR));
    }

    #[test]
    fn test_repeated_press_is_not_just_pressed_again() {
        let mut input = InputState::new();
        input.set_key(KeyCode::Escape, ElementState::Pressed);
        input.end_frame();
        // Key repeat delivers another press while held
        input.set_key(KeyCode::Escape, ElementState::Pressed);
        assert!(!input.is_key_just_pressed(KeyCode::Escape));
    }

    #[test]
    fn test_mouse_buttons() {
        let mut input = InputState::new();
        input.set_button(MouseButton::Left, ElementState::Pressed);
        assert!(input.is_mouse_pressed(MouseButton::Left));
        assert!(!input.is_mouse_pressed(MouseButton::Right));
        input.set_button(MouseButton::Left, ElementState::Released);
        assert!(!input.is_mouse_pressed(MouseButton::Left));
    }

    #[test]
    fn test_focus_loss_clears_held_state() {
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, ElementState::Pressed);
        input.set_button(MouseButton::Right, ElementState::Pressed);

        assert!(!input.handle_event(&WindowEvent::Focused(false)));
        assert!(!input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_mouse_pressed(MouseButton::Right));
    }

    #[test]
    fn test_mouse_button_conversion() {
        assert_eq!(
            MouseButton::from(winit::event::MouseButton::Middle),
            MouseButton::Middle
        );
        assert_eq!(
            MouseButton::from(winit::event::MouseButton::Other(7)),
            MouseButton::Other(7)
        );
    }
}
