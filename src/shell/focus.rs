//! Keyboard focus and pointer grab
//!
//! The single source of truth for which surface receives keyboard input and
//! which surface holds the pointer grab. Every transition runs synchronously
//! with the event that triggered it and reports what changed, so the caller
//! can forward the change to the primitives provider.

use std::collections::HashMap;

use log::debug;
use serde::Deserialize;

use crate::error::{Result, ShellError};
use crate::shell::{OutputId, Surface, SurfaceId, SurfaceStack};

/// Keyboard focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyboardFocus {
    #[default]
    Unfocused,
    Focused(SurfaceId),
}

impl KeyboardFocus {
    pub fn surface(&self) -> Option<SurfaceId> {
        match self {
            KeyboardFocus::Unfocused => None,
            KeyboardFocus::Focused(id) => Some(*id),
        }
    }
}

/// Pointer grab state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerGrab {
    #[default]
    Free,
    Grabbed(SurfaceId),
}

impl PointerGrab {
    pub fn surface(&self) -> Option<SurfaceId> {
        match self {
            PointerGrab::Free => None,
            PointerGrab::Grabbed(id) => Some(*id),
        }
    }
}

/// Result of a keyboard focus transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusChange {
    /// Previously focused surface
    pub old: Option<SurfaceId>,
    /// Newly focused surface
    pub new: Option<SurfaceId>,
}

/// Result of a pointer grab transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabChange {
    pub old: Option<SurfaceId>,
    pub new: Option<SurfaceId>,
}

/// When a newly mapped surface takes focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusOnMap {
    /// Only when nothing holds focus
    #[default]
    WhenUnfocused,
    /// Every focusable surface takes focus when it maps
    Always,
}

/// Keyboard focus and pointer grab
#[derive(Debug, Default)]
pub struct FocusState {
    keyboard: KeyboardFocus,
    grab: PointerGrab,
    /// Last surface focused on each output
    last_focus: HashMap<OutputId, SurfaceId>,
    policy: FocusOnMap,
}

impl FocusState {
    /// Create an unfocused, ungrabbed state
    pub fn new(policy: FocusOnMap) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn keyboard(&self) -> KeyboardFocus {
        self.keyboard
    }

    pub fn grab(&self) -> PointerGrab {
        self.grab
    }

    /// The surface holding keyboard focus
    pub fn focused(&self) -> Option<SurfaceId> {
        self.keyboard.surface()
    }

    /// The surface holding the pointer grab
    pub fn grabbed(&self) -> Option<SurfaceId> {
        self.grab.surface()
    }

    /// Last surface focused on an output
    pub fn last_focus(&self, output: OutputId) -> Option<SurfaceId> {
        self.last_focus.get(&output).copied()
    }

    /// A surface was just mapped
    pub fn on_map(&mut self, surface: &Surface) -> Option<FocusChange> {
        if !surface.focusable {
            return None;
        }
        match (self.keyboard, self.policy) {
            (KeyboardFocus::Unfocused, _) | (_, FocusOnMap::Always) => {
                self.set_focus(Some(surface), surface.id)
            }
            _ => None,
        }
    }

    /// Explicit focus request (activation, keybinding, client request)
    pub fn request_focus(&mut self, stack: &SurfaceStack, id: SurfaceId) -> Result<Option<FocusChange>> {
        let surface = stack.get(id).ok_or(ShellError::UnknownSurface(id))?;
        if !surface.focusable {
            return Err(ShellError::NotFocusable(id));
        }
        Ok(self.set_focus(Some(surface), id))
    }

    /// A surface was unmapped; `stack` must no longer contain it.
    ///
    /// Focus moves to the topmost focusable surface of the same output and a
    /// grab held by the surface is released.
    pub fn on_unmap(
        &mut self,
        stack: &SurfaceStack,
        removed: &Surface,
    ) -> (Option<FocusChange>, Option<GrabChange>) {
        self.last_focus.retain(|_, id| *id != removed.id);

        let grab = if self.grabbed() == Some(removed.id) {
            self.set_grab(PointerGrab::Free)
        } else {
            None
        };

        let focus = if self.focused() == Some(removed.id) {
            match stack.topmost_focusable(removed.output) {
                Some(next) => self.set_focus(stack.get(next), next),
                None => self.unfocus(),
            }
        } else {
            None
        };

        (focus, grab)
    }

    /// Pointer button pressed over `id`.
    ///
    /// With focus-follows-click the surface takes keyboard focus; a surface
    /// that declares grab-on-click takes the pointer grab either way.
    pub fn on_button_press(
        &mut self,
        stack: &SurfaceStack,
        id: SurfaceId,
        follow_click: bool,
    ) -> (Option<FocusChange>, Option<GrabChange>) {
        let Some(surface) = stack.get(id) else {
            return (None, None);
        };
        let focus = if follow_click && surface.focusable {
            self.set_focus(Some(surface), id)
        } else {
            None
        };
        let grab = if surface.grab_on_click {
            self.set_grab(PointerGrab::Grabbed(id))
        } else {
            None
        };
        (focus, grab)
    }

    /// Every pointer button has been released
    pub fn on_buttons_released(&mut self) -> Option<GrabChange> {
        self.set_grab(PointerGrab::Free)
    }

    /// An output went away (or was disabled) and its surfaces moved to
    /// `fallback`; `stack` already reflects the move.
    pub fn on_output_removed(
        &mut self,
        stack: &SurfaceStack,
        removed: OutputId,
        fallback: Option<OutputId>,
    ) -> Option<FocusChange> {
        self.last_focus.remove(&removed);
        if let Some(surface) = self.focused().and_then(|id| stack.get(id)) {
            // Focus survived the move; remember it on its new output
            self.last_focus.insert(surface.output, surface.id);
            return None;
        }
        match fallback.and_then(|output| self.restore_target(stack, output)) {
            Some(next) => self.set_focus(stack.get(next), next),
            None => self.unfocus(),
        }
    }

    /// Focus an output: its last focused surface, else its topmost
    /// focusable surface. Focus is unchanged if the output has neither.
    pub fn focus_output(&mut self, stack: &SurfaceStack, output: OutputId) -> Option<FocusChange> {
        let target = self.restore_target(stack, output)?;
        self.set_focus(stack.get(target), target)
    }

    /// Focus the next focusable surface below the focused one on `output`,
    /// wrapping around to the top.
    pub fn cycle(&mut self, stack: &SurfaceStack, output: OutputId) -> Option<FocusChange> {
        let candidates: Vec<SurfaceId> = stack
            .visible_order(output)
            .into_iter()
            .filter(|id| stack.is_focusable(*id))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let next = match self
            .focused()
            .and_then(|current| candidates.iter().position(|id| *id == current))
        {
            Some(index) => candidates[(index + 1) % candidates.len()],
            None => candidates[0],
        };
        self.set_focus(stack.get(next), next)
    }

    /// Drop focus and grab, e.g. on shutdown
    pub fn clear(&mut self) -> (Option<FocusChange>, Option<GrabChange>) {
        self.last_focus.clear();
        (self.unfocus(), self.set_grab(PointerGrab::Free))
    }

    /// Focus and grab only name surfaces present in `stack`
    pub fn is_consistent(&self, stack: &SurfaceStack) -> bool {
        let focus_ok = self.focused().map_or(true, |id| stack.is_focusable(id));
        let grab_ok = self.grabbed().map_or(true, |id| stack.contains(id));
        focus_ok && grab_ok
    }

    fn restore_target(&self, stack: &SurfaceStack, output: OutputId) -> Option<SurfaceId> {
        self.last_focus(output)
            .filter(|id| stack.get(*id).is_some_and(|s| s.focusable && s.output == output))
            .or_else(|| stack.topmost_focusable(output))
    }

    fn set_focus(&mut self, surface: Option<&Surface>, id: SurfaceId) -> Option<FocusChange> {
        if let Some(surface) = surface {
            self.last_focus.insert(surface.output, id);
        }
        let old = self.focused();
        if old == Some(id) {
            return None;
        }
        self.keyboard = KeyboardFocus::Focused(id);
        debug!("Keyboard focus {:?} -> {:?}", old, id);
        Some(FocusChange { old, new: Some(id) })
    }

    fn unfocus(&mut self) -> Option<FocusChange> {
        let old = self.focused()?;
        self.keyboard = KeyboardFocus::Unfocused;
        debug!("Keyboard focus {:?} -> none", old);
        Some(FocusChange { old: Some(old), new: None })
    }

    fn set_grab(&mut self, grab: PointerGrab) -> Option<GrabChange> {
        if self.grab == grab {
            return None;
        }
        let old = self.grabbed();
        self.grab = grab;
        debug!("Pointer grab {:?} -> {:?}", old, grab);
        Some(GrabChange {
            old,
            new: grab.surface(),
        })
    }
}
