//! Surface stacking
//!
//! This module tracks mapped surfaces and their z-order. Each output keeps
//! one bottom-to-top list per layer; the layers themselves are always
//! composited in the fixed order background < bottom < normal < top < overlay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::error::{Result, ShellError};
use crate::shell::{OutputId, Rect};

/// Unique identifier for surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        SurfaceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle of the client owning a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClientId(pub u64);

/// Stacking layer, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Layer {
    /// Wallpapers; never part of the visible order
    Background,
    /// Layer-shell surfaces below windows
    Bottom,
    /// Ordinary toplevel windows
    #[default]
    Normal,
    /// Layer-shell surfaces above windows (bars, panels)
    Top,
    /// Above everything (lock screens, notifications)
    Overlay,
}

impl Layer {
    fn slot(self) -> Option<usize> {
        match self {
            Layer::Background => None,
            Layer::Bottom => Some(0),
            Layer::Normal => Some(1),
            Layer::Top => Some(2),
            Layer::Overlay => Some(3),
        }
    }
}

/// What the primitives provider reports when a surface is mapped
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDescriptor {
    pub id: SurfaceId,
    pub client: ClientId,
    pub layer: Layer,
    pub output: OutputId,
    /// Requested geometry, relative to the output
    pub geometry: Rect,
    /// Can take keyboard focus
    pub focusable: bool,
    /// Takes the pointer grab when clicked
    pub grab_on_click: bool,
}

/// A mapped surface
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    /// Unique identifier
    pub id: SurfaceId,
    /// Owning client
    pub client: ClientId,
    /// Stacking layer
    pub layer: Layer,
    /// Output the surface lives on
    pub output: OutputId,
    /// Geometry relative to the output
    pub geometry: Rect,
    pub focusable: bool,
    pub grab_on_click: bool,
}

impl From<SurfaceDescriptor> for Surface {
    fn from(descriptor: SurfaceDescriptor) -> Self {
        Self {
            id: descriptor.id,
            client: descriptor.client,
            layer: descriptor.layer,
            output: descriptor.output,
            geometry: descriptor.geometry,
            focusable: descriptor.focusable,
            grab_on_click: descriptor.grab_on_click,
        }
    }
}

/// Z-order of one output
#[derive(Debug, Default)]
struct OutputStack {
    /// Background surfaces, bottom to top
    background: Vec<SurfaceId>,
    /// One list per stacked layer, bottom to top
    layers: [Vec<SurfaceId>; 4],
}

impl OutputStack {
    fn list_mut(&mut self, layer: Layer) -> &mut Vec<SurfaceId> {
        match layer.slot() {
            Some(slot) => &mut self.layers[slot],
            None => &mut self.background,
        }
    }

    fn push(&mut self, layer: Layer, id: SurfaceId) {
        self.list_mut(layer).push(id);
    }

    fn remove(&mut self, layer: Layer, id: SurfaceId) {
        self.list_mut(layer).retain(|s| *s != id);
    }

    fn is_empty(&self) -> bool {
        self.background.is_empty() && self.layers.iter().all(Vec::is_empty)
    }
}

/// Stack of all mapped surfaces
#[derive(Debug, Default)]
pub struct SurfaceStack {
    surfaces: HashMap<SurfaceId, Surface>,
    stacks: HashMap<OutputId, OutputStack>,
}

impl SurfaceStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a surface on top of its layer
    pub fn map(&mut self, surface: Surface) -> Result<()> {
        if self.surfaces.contains_key(&surface.id) {
            return Err(ShellError::SurfaceExists(surface.id));
        }
        debug!(
            "Mapped {:?} on {:?} ({:?}) at {:?}",
            surface.id, surface.output, surface.layer, surface.geometry
        );
        self.stacks
            .entry(surface.output)
            .or_default()
            .push(surface.layer, surface.id);
        self.surfaces.insert(surface.id, surface);
        Ok(())
    }

    /// Unmap a surface, returning its last state
    pub fn unmap(&mut self, id: SurfaceId) -> Result<Surface> {
        let surface = self
            .surfaces
            .remove(&id)
            .ok_or(ShellError::UnknownSurface(id))?;
        self.detach(&surface);
        debug!("Unmapped {:?}", id);
        Ok(surface)
    }

    /// Move a surface to the top of its own layer
    pub fn raise(&mut self, id: SurfaceId) -> Result<()> {
        let surface = self.get(id).ok_or(ShellError::UnknownSurface(id))?;
        let (layer, output) = (surface.layer, surface.output);
        let stack = self.stacks.entry(output).or_default();
        let list = stack.list_mut(layer);
        list.retain(|s| *s != id);
        list.push(id);
        Ok(())
    }

    /// Move a surface to the bottom of its own layer
    pub fn lower(&mut self, id: SurfaceId) -> Result<()> {
        let surface = self.get(id).ok_or(ShellError::UnknownSurface(id))?;
        let (layer, output) = (surface.layer, surface.output);
        let stack = self.stacks.entry(output).or_default();
        let list = stack.list_mut(layer);
        list.retain(|s| *s != id);
        list.insert(0, id);
        Ok(())
    }

    /// Re-home a surface on another output, on top of its layer.
    ///
    /// The relative position is kept when it still fits, otherwise the
    /// surface is pushed back inside `output_size`. Returns the new geometry.
    pub fn move_to_output(
        &mut self,
        id: SurfaceId,
        output: OutputId,
        output_size: (u32, u32),
    ) -> Result<Rect> {
        let surface = self
            .surfaces
            .get(&id)
            .cloned()
            .ok_or(ShellError::UnknownSurface(id))?;
        self.detach(&surface);

        let bounds = Rect::from_size(output_size.0, output_size.1);
        let geometry = surface.geometry.clamp_within(&bounds);
        self.stacks
            .entry(output)
            .or_default()
            .push(surface.layer, id);
        if let Some(surface) = self.surfaces.get_mut(&id) {
            surface.output = output;
            surface.geometry = geometry;
        }
        debug!("Moved {:?} to {:?} at {:?}", id, output, geometry);
        Ok(geometry)
    }

    /// Replace a surface's output-relative geometry
    pub fn set_geometry(&mut self, id: SurfaceId, geometry: Rect) -> Result<()> {
        let surface = self
            .surfaces
            .get_mut(&id)
            .ok_or(ShellError::UnknownSurface(id))?;
        surface.geometry = geometry;
        Ok(())
    }

    /// Non-background surfaces of an output, topmost first
    pub fn visible_order(&self, output: OutputId) -> Vec<SurfaceId> {
        let Some(stack) = self.stacks.get(&output) else {
            return Vec::new();
        };
        stack
            .layers
            .iter()
            .rev()
            .flat_map(|list| list.iter().rev().copied())
            .collect()
    }

    /// Background surfaces of an output, bottom to top
    pub fn background_surfaces(&self, output: OutputId) -> Vec<SurfaceId> {
        self.stacks
            .get(&output)
            .map(|stack| stack.background.clone())
            .unwrap_or_default()
    }

    /// Every surface on an output, backgrounds included
    pub fn surfaces_on(&self, output: OutputId) -> Vec<SurfaceId> {
        let mut ids = self.background_surfaces(output);
        ids.extend(self.visible_order(output).into_iter().rev());
        ids
    }

    /// Topmost surface of an output that can take keyboard focus
    pub fn topmost_focusable(&self, output: OutputId) -> Option<SurfaceId> {
        self.visible_order(output)
            .into_iter()
            .find(|id| self.is_focusable(*id))
    }

    /// Whether a surface is mapped and focusable
    pub fn is_focusable(&self, id: SurfaceId) -> bool {
        self.get(id).is_some_and(|s| s.focusable)
    }

    /// Get a surface by ID
    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    /// Get all surfaces
    pub fn iter(&self) -> impl Iterator<Item = (&SurfaceId, &Surface)> {
        self.surfaces.iter()
    }

    /// Get count of surfaces
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Drop every surface
    pub fn clear(&mut self) {
        self.surfaces.clear();
        self.stacks.clear();
    }

    fn detach(&mut self, surface: &Surface) {
        if let Some(stack) = self.stacks.get_mut(&surface.output) {
            stack.remove(surface.layer, surface.id);
            if stack.is_empty() {
                self.stacks.remove(&surface.output);
            }
        }
    }
}
