//! Backend module
//!
//! The shell drives a primitives provider through the [`Backend`] trait:
//! - [`Backend`]: commands the shell issues (focus, grab, stacking, geometry,
//!   input delivery)
//! - [`HeadlessBackend`]: output-only provider that records every command
//! - Event loop integration with calloop

pub mod event_loop;

pub use event_loop::EventLoop;

use log::trace;

use crate::input::{KeyEvent, PointerEvent, TouchEvent};
use crate::shell::{OutputDescriptor, Rect, SurfaceId};

/// Commands the shell sends to the primitives provider
pub trait Backend {
    /// Outputs present right now
    fn outputs(&self) -> Vec<OutputDescriptor>;

    /// Give keyboard focus to a surface, or to nobody
    fn set_focus(&mut self, surface: Option<SurfaceId>);

    /// Give the pointer grab to a surface, or release it
    fn set_grab(&mut self, surface: Option<SurfaceId>);

    /// Restack a surface on top of its layer
    fn raise(&mut self, surface: SurfaceId);

    /// Restack a surface at the bottom of its layer
    fn lower(&mut self, surface: SurfaceId);

    /// Move/resize a surface; `geometry` is relative to its output
    fn set_geometry(&mut self, surface: SurfaceId, geometry: Rect);

    fn forward_key(&mut self, surface: SurfaceId, event: KeyEvent);

    fn forward_pointer(&mut self, surface: SurfaceId, event: PointerEvent);

    fn forward_touch(&mut self, surface: SurfaceId, event: TouchEvent);

    /// Ask the owning client to close a surface
    fn close(&mut self, surface: SurfaceId);
}

/// A command issued to the [`HeadlessBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetFocus(Option<SurfaceId>),
    SetGrab(Option<SurfaceId>),
    Raise(SurfaceId),
    Lower(SurfaceId),
    SetGeometry(SurfaceId, Rect),
    ForwardKey(SurfaceId, KeyEvent),
    ForwardPointer(SurfaceId, PointerEvent),
    ForwardTouch(SurfaceId, TouchEvent),
    Close(SurfaceId),
}

/// Provider without a display: a fixed set of outputs and a command log
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    outputs: Vec<OutputDescriptor>,
    commands: Vec<Command>,
}

impl HeadlessBackend {
    pub fn new(outputs: Vec<OutputDescriptor>) -> Self {
        Self {
            outputs,
            commands: Vec::new(),
        }
    }

    /// Commands issued so far
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    fn record(&mut self, command: Command) {
        trace!("Headless backend: {:?}", command);
        self.commands.push(command);
    }
}

impl Backend for HeadlessBackend {
    fn outputs(&self) -> Vec<OutputDescriptor> {
        self.outputs.clone()
    }

    fn set_focus(&mut self, surface: Option<SurfaceId>) {
        self.record(Command::SetFocus(surface));
    }

    fn set_grab(&mut self, surface: Option<SurfaceId>) {
        self.record(Command::SetGrab(surface));
    }

    fn raise(&mut self, surface: SurfaceId) {
        self.record(Command::Raise(surface));
    }

    fn lower(&mut self, surface: SurfaceId) {
        self.record(Command::Lower(surface));
    }

    fn set_geometry(&mut self, surface: SurfaceId, geometry: Rect) {
        self.record(Command::SetGeometry(surface, geometry));
    }

    fn forward_key(&mut self, surface: SurfaceId, event: KeyEvent) {
        self.record(Command::ForwardKey(surface, event));
    }

    fn forward_pointer(&mut self, surface: SurfaceId, event: PointerEvent) {
        self.record(Command::ForwardPointer(surface, event));
    }

    fn forward_touch(&mut self, surface: SurfaceId, event: TouchEvent) {
        self.record(Command::ForwardTouch(surface, event));
    }

    fn close(&mut self, surface: SurfaceId) {
        self.record(Command::Close(surface));
    }
}
