//! Raw input events delivered by the provider, and the events forwarded to
//! clients after routing

use crate::input::Modifiers;

/// Key state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
}

/// Pointer button state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    Pressed,
}

/// A key event, already translated by the provider's keymap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Timestamp in milliseconds
    pub time: u32,
    /// Evdev keycode
    pub keycode: u32,
    /// Keysym produced by the key under the current layout
    pub keysym: u32,
    /// Effective modifiers when the event happened
    pub modifiers: Modifiers,
    pub state: KeyState,
}

/// Absolute pointer motion in global layout coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerMotionEvent {
    pub time: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerButtonEvent {
    pub time: u32,
    /// Linux input event code (`BTN_LEFT`, ...)
    pub button: u32,
    pub state: ButtonState,
}

/// Scroll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerAxisEvent {
    pub time: u32,
    pub horizontal: f64,
    pub vertical: f64,
}

/// Touch events; coordinates are global when routed and surface-local when
/// forwarded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
    Down { slot: i32, time: u32, x: f64, y: f64 },
    Motion { slot: i32, time: u32, x: f64, y: f64 },
    Up { slot: i32, time: u32 },
    Cancel,
}

/// Input from the provider's devices
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    PointerMotion(PointerMotionEvent),
    PointerButton(PointerButtonEvent),
    PointerAxis(PointerAxisEvent),
    Touch(TouchEvent),
}

/// Pointer event forwarded to a surface, in surface-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Motion { time: u32, x: f64, y: f64 },
    Button { time: u32, button: u32, state: ButtonState },
    Axis { time: u32, horizontal: f64, vertical: f64 },
}
