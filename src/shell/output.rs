//! Output/display registry
//!
//! This module tracks connected displays, their logical geometry and
//! their arrangement in the global layout space.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};

use crate::error::{Result, ShellError};
use crate::shell::Rect;

/// Unique identifier for outputs
///
/// Ids are handed out by the primitives provider, which owns the
/// underlying display objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u64);

impl OutputId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        OutputId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Output transform (rotation/flip)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTransform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

impl OutputTransform {
    /// Whether the transform swaps width and height
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self,
            OutputTransform::Rotate90
                | OutputTransform::Rotate270
                | OutputTransform::Flipped90
                | OutputTransform::Flipped270
        )
    }
}

/// What the primitives provider reports about an output
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDescriptor {
    /// Provider-assigned identifier
    pub id: OutputId,
    /// Connector name (e.g., "HDMI-A-1")
    pub name: String,
    /// Manufacturer name
    pub make: String,
    /// Model name
    pub model: String,
    /// Current mode width in pixels
    pub width: u32,
    /// Current mode height in pixels
    pub height: u32,
    /// Refresh rate in mHz (e.g., 60000 for 60Hz)
    pub refresh: u32,
    /// Scale factor
    pub scale: f64,
    /// Transform applied to output
    pub transform: OutputTransform,
    /// Whether the output is enabled
    pub enabled: bool,
}

impl OutputDescriptor {
    /// Create an enabled descriptor with a fresh id and the given mode
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: OutputId::next(),
            name: name.into(),
            make: String::new(),
            model: String::new(),
            width,
            height,
            refresh: 60000,
            scale: 1.0,
            transform: OutputTransform::Normal,
            enabled: true,
        }
    }
}

/// A display output (monitor)
#[derive(Debug, Clone)]
pub struct Output {
    /// Unique identifier
    pub id: OutputId,
    /// Output name (e.g., "eDP-1")
    pub name: String,
    pub make: String,
    pub model: String,
    /// Mode size in pixels
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
    /// Scale factor
    pub scale: f64,
    /// Transform applied to output
    pub transform: OutputTransform,
    /// Enabled outputs take part in layout, hit-testing and reassignment
    pub enabled: bool,
    /// Position in global coordinate space
    pub x: i32,
    pub y: i32,
}

impl Output {
    fn from_descriptor(descriptor: OutputDescriptor) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name,
            make: descriptor.make,
            model: descriptor.model,
            width: descriptor.width,
            height: descriptor.height,
            refresh: descriptor.refresh,
            scale: descriptor.scale,
            transform: descriptor.transform,
            enabled: descriptor.enabled,
            x: 0,
            y: 0,
        }
    }

    fn apply(&mut self, descriptor: OutputDescriptor) {
        let (x, y) = (self.x, self.y);
        *self = Self::from_descriptor(descriptor);
        self.x = x;
        self.y = y;
    }

    /// Size in logical pixels after transform and scale
    pub fn logical_size(&self) -> (u32, u32) {
        let (width, height) = if self.transform.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        (
            (width as f64 / scale).round() as u32,
            (height as f64 / scale).round() as u32,
        )
    }

    /// Logical rectangle in the global layout space
    pub fn geometry(&self) -> Rect {
        let (width, height) = self.logical_size();
        Rect::new(self.x, self.y, width, height)
    }
}

/// Output arrangement policy
///
/// Outputs named here are pinned at their position; every other output is
/// appended to the right of the rightmost enabled output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputLayout {
    explicit: HashMap<String, (i32, i32)>,
}

impl OutputLayout {
    /// Append every output to the right of the previous ones
    pub fn append_right() -> Self {
        Self::default()
    }

    /// Pin an output by connector name
    pub fn with_position(mut self, name: impl Into<String>, x: i32, y: i32) -> Self {
        self.explicit.insert(name.into(), (x, y));
        self
    }

    /// Explicit position for a connector, if any
    pub fn position_of(&self, name: &str) -> Option<(i32, i32)> {
        self.explicit.get(name).copied()
    }
}

/// Registry of all outputs
#[derive(Debug)]
pub struct OutputRegistry {
    outputs: HashMap<OutputId, Output>,
    /// Registration order
    order: Vec<OutputId>,
    layout: OutputLayout,
    /// Outputs whose geometry changed since the last `take_changes`
    changed: Vec<OutputId>,
}

impl OutputRegistry {
    /// Create an empty registry using the append-right policy
    pub fn new() -> Self {
        Self::with_layout(OutputLayout::append_right())
    }

    /// Create an empty registry with an explicit layout policy
    pub fn with_layout(layout: OutputLayout) -> Self {
        Self {
            outputs: HashMap::new(),
            order: Vec::new(),
            layout,
            changed: Vec::new(),
        }
    }

    /// Register a new output and place it in the layout
    pub fn add_output(&mut self, descriptor: OutputDescriptor) -> Result<OutputId> {
        let id = descriptor.id;
        if self.outputs.contains_key(&id) {
            return Err(ShellError::OutputExists(id));
        }

        info!(
            "Output {:?} ({}) added: {}x{} @ {}",
            id, descriptor.name, descriptor.width, descriptor.height, descriptor.scale
        );
        self.outputs.insert(id, Output::from_descriptor(descriptor));
        self.order.push(id);
        self.relayout();
        self.mark_changed(id);
        Ok(id)
    }

    /// Apply a mode/scale/transform/enable change reported by the provider
    pub fn update_output(&mut self, id: OutputId, descriptor: OutputDescriptor) -> Result<()> {
        let output = self
            .outputs
            .get_mut(&id)
            .ok_or(ShellError::UnknownOutput(id))?;
        let before = output.geometry();
        output.apply(OutputDescriptor { id, ..descriptor });
        let after = output.geometry();
        debug!("Output {:?} updated: {:?} -> {:?}", id, before, after);

        self.relayout();
        if before != after {
            self.mark_changed(id);
        }
        Ok(())
    }

    /// Remove an output; the remaining outputs are re-laid out
    pub fn remove_output(&mut self, id: OutputId) -> Result<Output> {
        let output = self
            .outputs
            .remove(&id)
            .ok_or(ShellError::UnknownOutput(id))?;
        self.order.retain(|o| *o != id);
        self.changed.retain(|o| *o != id);
        info!("Output {:?} ({}) removed", id, output.name);
        self.relayout();
        Ok(output)
    }

    /// All outputs in registration order
    pub fn list_outputs(&self) -> Vec<&Output> {
        self.order
            .iter()
            .filter_map(|id| self.outputs.get(id))
            .collect()
    }

    /// Logical geometry of an output in the global layout space
    pub fn output_geometry(&self, id: OutputId) -> Result<Rect> {
        self.get(id)
            .map(Output::geometry)
            .ok_or(ShellError::UnknownOutput(id))
    }

    /// Get an output by ID
    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn contains(&self, id: OutputId) -> bool {
        self.outputs.contains_key(&id)
    }

    /// Whether an output exists and is enabled
    pub fn is_enabled(&self, id: OutputId) -> bool {
        self.get(id).is_some_and(|o| o.enabled)
    }

    /// Enabled outputs in registration order
    pub fn enabled(&self) -> impl Iterator<Item = &Output> {
        self.order
            .iter()
            .filter_map(|id| self.outputs.get(id))
            .filter(|o| o.enabled)
    }

    /// The enabled output that comes after `id` in registration order,
    /// wrapping around. Never returns `id` itself.
    pub fn enabled_after(&self, id: OutputId) -> Option<OutputId> {
        let start = self.order.iter().position(|o| *o == id)?;
        self.next_enabled_from(start + 1, Some(id))
    }

    /// Where to send the surfaces of an output that is going away.
    ///
    /// Same as [`enabled_after`](Self::enabled_after), but an unknown id
    /// falls back to the first enabled output.
    pub fn fallback_for(&self, id: OutputId) -> Option<OutputId> {
        self.enabled_after(id)
            .or_else(|| self.next_enabled_from(0, Some(id)))
    }

    fn next_enabled_from(&self, start: usize, skip: Option<OutputId>) -> Option<OutputId> {
        let len = self.order.len();
        (0..len)
            .map(|offset| self.order[(start + offset) % len])
            .filter(|candidate| Some(*candidate) != skip)
            .find(|candidate| self.is_enabled(*candidate))
    }

    /// The enabled output containing a point in global coordinates
    pub fn output_at(&self, x: f64, y: f64) -> Option<OutputId> {
        self.enabled()
            .find(|o| o.geometry().contains(x, y))
            .map(|o| o.id)
    }

    /// Drain the outputs-changed notifications
    pub fn take_changes(&mut self) -> Vec<OutputId> {
        std::mem::take(&mut self.changed)
    }

    /// Get count of outputs
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    fn mark_changed(&mut self, id: OutputId) {
        if !self.changed.contains(&id) {
            self.changed.push(id);
        }
    }

    /// Recompute every enabled output's position.
    ///
    /// Pinned outputs go first; the rest are appended left to right in
    /// registration order.
    fn relayout(&mut self) {
        let mut placed: Vec<(OutputId, (i32, i32))> = Vec::new();
        let mut rightmost: Option<i32> = None;

        for id in &self.order {
            let output = &self.outputs[id];
            if !output.enabled {
                continue;
            }
            if let Some(position) = self.layout.position_of(&output.name) {
                let right = position.0.saturating_add_unsigned(output.logical_size().0);
                rightmost = Some(rightmost.map_or(right, |r| r.max(right)));
                placed.push((*id, position));
            }
        }

        for id in &self.order {
            let output = &self.outputs[id];
            if !output.enabled || self.layout.position_of(&output.name).is_some() {
                continue;
            }
            let x = rightmost.unwrap_or(0);
            rightmost = Some(x.saturating_add_unsigned(output.logical_size().0));
            placed.push((*id, (x, 0)));
        }

        for (id, (x, y)) in placed {
            let Some(output) = self.outputs.get_mut(&id) else {
                continue;
            };
            if (output.x, output.y) != (x, y) {
                debug!("Output {:?} moved to ({}, {})", id, x, y);
                output.x = x;
                output.y = y;
                self.mark_changed(id);
            }
        }
    }
}

impl Default for OutputRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_id_unique() {
        let id1 = OutputId::next();
        let id2 = OutputId::next();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_logical_size_uses_scale_and_transform() {
        let mut descriptor = OutputDescriptor::new("eDP-1", 2560, 1600);
        descriptor.scale = 2.0;
        descriptor.transform = OutputTransform::Rotate90;

        let mut registry = OutputRegistry::new();
        let id = registry.add_output(descriptor).unwrap();
        assert_eq!(registry.output_geometry(id).unwrap(), Rect::new(0, 0, 800, 1280));
    }

    #[test]
    fn test_append_right() {
        let mut registry = OutputRegistry::new();
        let a = registry
            .add_output(OutputDescriptor::new("DP-1", 1920, 1080))
            .unwrap();
        let b = registry
            .add_output(OutputDescriptor::new("DP-2", 1280, 1024))
            .unwrap();
        let c = registry
            .add_output(OutputDescriptor::new("DP-3", 800, 600))
            .unwrap();

        assert_eq!(registry.output_geometry(a).unwrap().x, 0);
        assert_eq!(registry.output_geometry(b).unwrap().x, 1920);
        assert_eq!(registry.output_geometry(c).unwrap().x, 3200);

        // Removing the middle output closes the gap
        registry.take_changes();
        registry.remove_output(b).unwrap();
        assert_eq!(registry.output_geometry(c).unwrap().x, 1920);
        assert_eq!(registry.take_changes(), vec![c]);
    }

    #[test]
    fn test_explicit_layout() {
        let layout = OutputLayout::append_right().with_position("HDMI-A-1", 0, -1080);
        let mut registry = OutputRegistry::with_layout(layout);
        let laptop = registry
            .add_output(OutputDescriptor::new("eDP-1", 1920, 1080))
            .unwrap();
        let external = registry
            .add_output(OutputDescriptor::new("HDMI-A-1", 1920, 1080))
            .unwrap();

        assert_eq!(
            registry.output_geometry(external).unwrap(),
            Rect::new(0, -1080, 1920, 1080)
        );
        // The auto-placed laptop panel sits right of the pinned output
        assert_eq!(registry.output_geometry(laptop).unwrap().x, 1920);
        assert_eq!(registry.output_at(100.0, -500.0), Some(external));
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut registry = OutputRegistry::new();
        let descriptor = OutputDescriptor::new("DP-1", 1920, 1080);
        let id = registry.add_output(descriptor.clone()).unwrap();
        assert_eq!(
            registry.add_output(descriptor),
            Err(ShellError::OutputExists(id))
        );

        let stale = OutputId::next();
        assert_eq!(
            registry.output_geometry(stale),
            Err(ShellError::UnknownOutput(stale))
        );
        assert!(registry.remove_output(stale).is_err());
    }

    #[test]
    fn test_fallback_skips_disabled_and_wraps() {
        let mut registry = OutputRegistry::new();
        let a = registry
            .add_output(OutputDescriptor::new("DP-1", 1920, 1080))
            .unwrap();
        let mut disabled = OutputDescriptor::new("DP-2", 1920, 1080);
        disabled.enabled = false;
        let b = registry.add_output(disabled).unwrap();
        let c = registry
            .add_output(OutputDescriptor::new("DP-3", 1920, 1080))
            .unwrap();

        assert_eq!(registry.fallback_for(a), Some(c));
        assert_eq!(registry.fallback_for(c), Some(a));
        assert_eq!(registry.fallback_for(b), Some(c));

        registry.remove_output(c).unwrap();
        assert_eq!(registry.fallback_for(c), Some(a));
        assert_eq!(registry.fallback_for(a), None);
    }

    #[test]
    fn test_update_output_reports_change() {
        let mut registry = OutputRegistry::new();
        let a = registry
            .add_output(OutputDescriptor::new("DP-1", 1920, 1080))
            .unwrap();
        let b = registry
            .add_output(OutputDescriptor::new("DP-2", 1920, 1080))
            .unwrap();
        registry.take_changes();

        let mut descriptor = OutputDescriptor::new("DP-1", 2560, 1440);
        descriptor.id = a;
        registry.update_output(a, descriptor).unwrap();

        let changes = registry.take_changes();
        assert!(changes.contains(&a));
        assert!(changes.contains(&b));
        assert_eq!(registry.output_geometry(b).unwrap().x, 2560);
    }
}
