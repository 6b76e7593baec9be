//! Events the provider feeds into the shell

use crate::input::InputEvent;
use crate::shell::{OutputDescriptor, OutputId, PlacementRequest, SurfaceDescriptor, SurfaceId};

/// Everything the shell reacts to, delivered one at a time in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    /// An output was plugged in
    OutputAdded(OutputDescriptor),
    /// Mode, scale, transform or enabled state of a known output changed
    OutputChanged(OutputDescriptor),
    /// An output was unplugged
    OutputRemoved(OutputId),
    /// A client surface became visible
    SurfaceMapped(SurfaceDescriptor),
    /// A client surface went away
    SurfaceUnmapped(SurfaceId),
    /// Keyboard, pointer or touch input
    Input(InputEvent),
    /// A layer-shell surface committed new placement state
    LayerShellRequest(PlacementRequest),
    /// A client asked for a surface to be focused
    ActivationRequest(SurfaceId),
}
