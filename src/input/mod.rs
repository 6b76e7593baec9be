//! Input handling module
//!
//! This module provides keybindings, keyboard/pointer state and the router
//! that decides where each input event goes.

pub mod event;
pub mod keybinding;
pub mod keyboard;
pub mod pointer;
pub mod router;

pub use event::{
    ButtonState, InputEvent, KeyEvent, KeyState, PointerAxisEvent, PointerButtonEvent,
    PointerEvent, PointerMotionEvent, TouchEvent,
};
pub use keybinding::{buttons, Action, ChordError, KeyChord, Keybinding, KeybindingSet, Modifiers, Trigger};
pub use keyboard::Keyboard;
pub use pointer::Pointer;
pub use router::{Dispatch, InputRouter, RouteContext};
