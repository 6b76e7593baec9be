//! Pointer (mouse/trackpad) and touch state seen by the router

use std::collections::HashMap;

use log::debug;

use crate::shell::SurfaceId;

/// Pointer state
#[derive(Debug, Default)]
pub struct Pointer {
    /// Position in global layout coordinates
    position: (f64, f64),
    /// Currently pressed buttons
    pressed_buttons: Vec<u32>,
    /// Buttons whose press triggered a binding; their release is not forwarded
    swallowed: Vec<u32>,
    /// Touch slots and the surface each one landed on
    touch_points: HashMap<i32, SurfaceId>,
}

impl Pointer {
    /// Create a new pointer
    pub fn new() -> Self {
        Self::default()
    }

    /// Update pointer position
    pub fn motion(&mut self, x: f64, y: f64) {
        self.position = (x, y);
    }

    /// Get current position
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Handle a button press
    pub fn button_press(&mut self, button: u32) -> bool {
        if !self.pressed_buttons.contains(&button) {
            self.pressed_buttons.push(button);
            debug!("Button pressed: {:#x}", button);
            true
        } else {
            false
        }
    }

    /// Handle a button release
    pub fn button_release(&mut self, button: u32) -> bool {
        if let Some(idx) = self.pressed_buttons.iter().position(|&b| b == button) {
            self.pressed_buttons.remove(idx);
            debug!("Button released: {:#x}", button);
            true
        } else {
            false
        }
    }

    /// Get currently pressed buttons
    pub fn pressed_buttons(&self) -> &[u32] {
        &self.pressed_buttons
    }

    /// Check if any button is pressed
    pub fn has_button_pressed(&self) -> bool {
        !self.pressed_buttons.is_empty()
    }

    /// Mark a button as consumed by a binding
    pub fn swallow(&mut self, button: u32) {
        if !self.swallowed.contains(&button) {
            self.swallowed.push(button);
        }
    }

    /// Forget a swallowed button, returning whether it was swallowed
    pub fn take_swallowed(&mut self, button: u32) -> bool {
        match self.swallowed.iter().position(|&b| b == button) {
            Some(idx) => {
                self.swallowed.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Pin a touch slot to the surface it went down on
    pub fn touch_down(&mut self, slot: i32, surface: SurfaceId) {
        self.touch_points.insert(slot, surface);
    }

    /// Surface a touch slot is pinned to
    pub fn touch_target(&self, slot: i32) -> Option<SurfaceId> {
        self.touch_points.get(&slot).copied()
    }

    /// Release a touch slot
    pub fn touch_up(&mut self, slot: i32) -> Option<SurfaceId> {
        self.touch_points.remove(&slot)
    }

    /// Release every touch slot, returning the surfaces that had one
    pub fn touch_cancel(&mut self) -> Vec<SurfaceId> {
        let mut surfaces: Vec<SurfaceId> = self.touch_points.drain().map(|(_, id)| id).collect();
        surfaces.sort();
        surfaces.dedup();
        surfaces
    }

    /// Drop touch slots pinned to a surface that went away
    pub fn forget_surface(&mut self, surface: SurfaceId) {
        self.touch_points.retain(|_, id| *id != surface);
    }
}
