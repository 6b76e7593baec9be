//! Input routing
//!
//! Decides, for every raw input event, whether it triggers a keybinding,
//! goes to a client surface (and which one), or is dropped. Focus and grab
//! transitions caused by the event are applied to the shell's
//! [`FocusState`] and reported back in the [`Dispatch`].

use log::{debug, trace};

use crate::input::{
    Action, ButtonState, InputEvent, KeyEvent, KeyState, Keyboard, KeybindingSet, Pointer,
    PointerAxisEvent, PointerButtonEvent, PointerEvent, PointerMotionEvent, TouchEvent, Trigger,
};
use crate::shell::{
    FocusChange, FocusState, GrabChange, OutputRegistry, Rect, SurfaceId, SurfaceStack,
};

/// Shell state an event is routed against
pub struct RouteContext<'a> {
    pub stack: &'a SurfaceStack,
    pub outputs: &'a OutputRegistry,
    pub focus: &'a mut FocusState,
}

/// Outcome of routing one event
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A binding matched; the event goes nowhere else
    Action(Action),
    /// Deliver a key to the focused surface
    Key { surface: SurfaceId, event: KeyEvent },
    /// Deliver a pointer event to a surface
    Pointer {
        surface: SurfaceId,
        event: PointerEvent,
        focus: Option<FocusChange>,
        grab: Option<GrabChange>,
    },
    /// Deliver a touch event to a surface
    Touch {
        surface: SurfaceId,
        event: TouchEvent,
        focus: Option<FocusChange>,
    },
    /// Cancel the touch sequences of these surfaces
    TouchCancel(Vec<SurfaceId>),
    /// Nobody gets the event
    Dropped,
}

/// Routes input between keybindings and client surfaces
#[derive(Debug)]
pub struct InputRouter {
    bindings: KeybindingSet,
    keyboard: Keyboard,
    pointer: Pointer,
    focus_follows_click: bool,
}

impl InputRouter {
    pub fn new(bindings: KeybindingSet, focus_follows_click: bool) -> Self {
        Self {
            bindings,
            keyboard: Keyboard::new(),
            pointer: Pointer::new(),
            focus_follows_click,
        }
    }

    pub fn bindings(&self) -> &KeybindingSet {
        &self.bindings
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    /// Route a single event
    pub fn route(&mut self, event: InputEvent, ctx: RouteContext<'_>) -> Dispatch {
        let dispatch = match event {
            InputEvent::Key(event) => self.route_key(event, ctx),
            InputEvent::PointerMotion(event) => self.route_motion(event, ctx),
            InputEvent::PointerButton(event) => self.route_button(event, ctx),
            InputEvent::PointerAxis(event) => self.route_axis(event, ctx),
            InputEvent::Touch(event) => self.route_touch(event, ctx),
        };
        trace!("Routed {:?} -> {:?}", event, dispatch);
        dispatch
    }

    /// A surface was unmapped
    pub fn forget_surface(&mut self, surface: SurfaceId) {
        self.pointer.forget_surface(surface);
    }

    fn route_key(&mut self, event: KeyEvent, ctx: RouteContext<'_>) -> Dispatch {
        self.keyboard.update_modifiers(event.modifiers);

        match event.state {
            KeyState::Pressed => {
                self.keyboard.key_press(event.keycode);
                if let Some(action) = self
                    .bindings
                    .lookup(event.modifiers, Trigger::Keysym(event.keysym))
                {
                    debug!("Key {} triggers {:?}", event.keycode, action);
                    self.keyboard.swallow(event.keycode);
                    return Dispatch::Action(action.clone());
                }
            }
            KeyState::Released => {
                self.keyboard.key_release(event.keycode);
                if self.keyboard.take_swallowed(event.keycode) {
                    return Dispatch::Dropped;
                }
            }
        }

        match ctx.focus.focused() {
            Some(surface) => Dispatch::Key { surface, event },
            None => Dispatch::Dropped,
        }
    }

    fn route_motion(&mut self, event: PointerMotionEvent, ctx: RouteContext<'_>) -> Dispatch {
        self.pointer.motion(event.x, event.y);

        let target = match grab_holder(&ctx) {
            Some(holder) => local_point(&ctx, holder, event.x, event.y),
            None => hit_test(&ctx, event.x, event.y),
        };
        match target {
            Some((surface, x, y)) => Dispatch::Pointer {
                surface,
                event: PointerEvent::Motion {
                    time: event.time,
                    x,
                    y,
                },
                focus: None,
                grab: None,
            },
            None => Dispatch::Dropped,
        }
    }

    fn route_button(&mut self, event: PointerButtonEvent, ctx: RouteContext<'_>) -> Dispatch {
        let forwarded = PointerEvent::Button {
            time: event.time,
            button: event.button,
            state: event.state,
        };

        match event.state {
            ButtonState::Pressed => self.button_press(event.button, forwarded, ctx),
            ButtonState::Released => self.button_release(event.button, forwarded, ctx),
        }
    }

    fn button_press(&mut self, button: u32, forwarded: PointerEvent, ctx: RouteContext<'_>) -> Dispatch {
        if let Some(action) = self
            .bindings
            .lookup(self.keyboard.modifiers(), Trigger::Button(button))
        {
            debug!("Button {:#x} triggers {:?}", button, action);
            self.pointer.swallow(button);
            return Dispatch::Action(action.clone());
        }
        self.pointer.button_press(button);

        if let Some(holder) = grab_holder(&ctx) {
            return Dispatch::Pointer {
                surface: holder,
                event: forwarded,
                focus: None,
                grab: None,
            };
        }

        let (x, y) = self.pointer.position();
        let Some((surface, _, _)) = hit_test(&ctx, x, y) else {
            return Dispatch::Dropped;
        };
        let (focus, grab) = ctx
            .focus
            .on_button_press(ctx.stack, surface, self.focus_follows_click);
        Dispatch::Pointer {
            surface,
            event: forwarded,
            focus,
            grab,
        }
    }

    fn button_release(&mut self, button: u32, forwarded: PointerEvent, ctx: RouteContext<'_>) -> Dispatch {
        if self.pointer.take_swallowed(button) {
            return Dispatch::Dropped;
        }
        self.pointer.button_release(button);

        if let Some(holder) = grab_holder(&ctx) {
            let grab = if self.pointer.has_button_pressed() {
                None
            } else {
                ctx.focus.on_buttons_released()
            };
            return Dispatch::Pointer {
                surface: holder,
                event: forwarded,
                focus: None,
                grab,
            };
        }

        let (x, y) = self.pointer.position();
        match hit_test(&ctx, x, y) {
            Some((surface, _, _)) => Dispatch::Pointer {
                surface,
                event: forwarded,
                focus: None,
                grab: None,
            },
            None => Dispatch::Dropped,
        }
    }

    fn route_axis(&mut self, event: PointerAxisEvent, ctx: RouteContext<'_>) -> Dispatch {
        let surface = match grab_holder(&ctx) {
            Some(holder) => Some(holder),
            None => {
                let (x, y) = self.pointer.position();
                hit_test(&ctx, x, y).map(|(surface, _, _)| surface)
            }
        };
        match surface {
            Some(surface) => Dispatch::Pointer {
                surface,
                event: PointerEvent::Axis {
                    time: event.time,
                    horizontal: event.horizontal,
                    vertical: event.vertical,
                },
                focus: None,
                grab: None,
            },
            None => Dispatch::Dropped,
        }
    }

    fn route_touch(&mut self, event: TouchEvent, ctx: RouteContext<'_>) -> Dispatch {
        match event {
            TouchEvent::Down { slot, time, x, y } => {
                let Some((surface, lx, ly)) = hit_test(&ctx, x, y) else {
                    return Dispatch::Dropped;
                };
                self.pointer.touch_down(slot, surface);
                let focus = if self.focus_follows_click && ctx.stack.is_focusable(surface) {
                    ctx.focus.request_focus(ctx.stack, surface).ok().flatten()
                } else {
                    None
                };
                Dispatch::Touch {
                    surface,
                    event: TouchEvent::Down {
                        slot,
                        time,
                        x: lx,
                        y: ly,
                    },
                    focus,
                }
            }
            TouchEvent::Motion { slot, time, x, y } => {
                let target = self
                    .pointer
                    .touch_target(slot)
                    .and_then(|surface| local_point(&ctx, surface, x, y));
                match target {
                    Some((surface, lx, ly)) => Dispatch::Touch {
                        surface,
                        event: TouchEvent::Motion {
                            slot,
                            time,
                            x: lx,
                            y: ly,
                        },
                        focus: None,
                    },
                    None => Dispatch::Dropped,
                }
            }
            TouchEvent::Up { slot, time } => match self.pointer.touch_up(slot) {
                Some(surface) if ctx.stack.contains(surface) => Dispatch::Touch {
                    surface,
                    event: TouchEvent::Up { slot, time },
                    focus: None,
                },
                _ => Dispatch::Dropped,
            },
            TouchEvent::Cancel => {
                let surfaces: Vec<SurfaceId> = self
                    .pointer
                    .touch_cancel()
                    .into_iter()
                    .filter(|surface| ctx.stack.contains(*surface))
                    .collect();
                if surfaces.is_empty() {
                    Dispatch::Dropped
                } else {
                    Dispatch::TouchCancel(surfaces)
                }
            }
        }
    }
}

/// Surface holding the pointer grab, if it is still mapped
fn grab_holder(ctx: &RouteContext<'_>) -> Option<SurfaceId> {
    ctx.focus.grabbed().filter(|id| ctx.stack.contains(*id))
}

/// Global bounds of a surface
fn global_rect(ctx: &RouteContext<'_>, surface: SurfaceId) -> Option<Rect> {
    let surface = ctx.stack.get(surface)?;
    let output = ctx.outputs.get(surface.output)?;
    Some(surface.geometry.translate(output.x, output.y))
}

/// Convert a global point into a surface's local coordinates
fn local_point(ctx: &RouteContext<'_>, surface: SurfaceId, x: f64, y: f64) -> Option<(SurfaceId, f64, f64)> {
    let rect = global_rect(ctx, surface)?;
    Some((surface, x - rect.x as f64, y - rect.y as f64))
}

/// Topmost surface under a global point, with the point in its local
/// coordinates
fn hit_test(ctx: &RouteContext<'_>, x: f64, y: f64) -> Option<(SurfaceId, f64, f64)> {
    let output = ctx.outputs.output_at(x, y)?;
    ctx.stack
        .visible_order(output)
        .into_iter()
        .find(|id| global_rect(ctx, *id).is_some_and(|rect| rect.contains(x, y)))
        .and_then(|id| local_point(ctx, id, x, y))
}
