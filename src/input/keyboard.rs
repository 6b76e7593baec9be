//! Keyboard state seen by the router

use log::debug;

use crate::input::Modifiers;

/// Keyboard state
#[derive(Debug, Default)]
pub struct Keyboard {
    /// Currently pressed keys (keycodes)
    pressed_keys: Vec<u32>,
    /// Keys whose press triggered a binding; their release is not forwarded
    swallowed: Vec<u32>,
    /// Modifier state from the most recent key event
    modifiers: Modifiers,
}

impl Keyboard {
    /// Create a new keyboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a key press
    pub fn key_press(&mut self, keycode: u32) -> bool {
        if !self.pressed_keys.contains(&keycode) {
            self.pressed_keys.push(keycode);
            debug!("Key pressed: {}", keycode);
            true
        } else {
            false // Key already pressed (repeat)
        }
    }

    /// Handle a key release
    pub fn key_release(&mut self, keycode: u32) -> bool {
        if let Some(idx) = self.pressed_keys.iter().position(|&k| k == keycode) {
            self.pressed_keys.remove(idx);
            debug!("Key released: {}", keycode);
            true
        } else {
            false
        }
    }

    /// Mark a pressed key as consumed by a binding
    pub fn swallow(&mut self, keycode: u32) {
        if !self.swallowed.contains(&keycode) {
            self.swallowed.push(keycode);
        }
    }

    /// Forget a swallowed key, returning whether it was swallowed
    pub fn take_swallowed(&mut self, keycode: u32) -> bool {
        match self.swallowed.iter().position(|&k| k == keycode) {
            Some(idx) => {
                self.swallowed.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Update modifier state
    pub fn update_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    /// Get current modifier state
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Get currently pressed keys
    pub fn pressed_keys(&self) -> &[u32] {
        &self.pressed_keys
    }
}
