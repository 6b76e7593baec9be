//! Shell core
//!
//! Output tracking and layout, window stacking, keyboard focus and pointer
//! grab, layer-shell placement, and the [`Shell`] orchestrator that wires
//! them together.

pub mod event;
pub mod focus;
pub mod geometry;
pub mod layer_shell;
pub mod output;
pub mod state;
pub mod surface;

pub use event::ShellEvent;
pub use focus::{FocusChange, FocusOnMap, FocusState, GrabChange, KeyboardFocus, PointerGrab};
pub use geometry::Rect;
pub use layer_shell::{Anchor, Edge, Margins, PlacementRequest, PlacementResolver};
pub use output::{Output, OutputDescriptor, OutputId, OutputLayout, OutputRegistry, OutputTransform};
pub use state::{Shell, WindowPlacement};
pub use surface::{ClientId, Layer, Surface, SurfaceDescriptor, SurfaceId, SurfaceStack};
