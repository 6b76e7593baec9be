//! Layer-shell placement
//!
//! Resolves anchor/margin/exclusive-zone requests of shell surfaces (bars,
//! panels, lock screens) into output-relative geometry. Placements are kept
//! per output in arrival order: each request is laid out against the output
//! minus the exclusive zones of the placements that arrived before it.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::error::{Result, ShellError};
use crate::shell::{OutputId, Rect, SurfaceId};

// Edge anchoring for layer surfaces
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Anchor: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

/// Output edge an exclusive zone is reserved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

/// Margins from the anchored edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl Margins {
    pub const fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    fn on(&self, edge: Edge) -> i32 {
        match edge {
            Edge::Top => self.top,
            Edge::Bottom => self.bottom,
            Edge::Left => self.left,
            Edge::Right => self.right,
        }
    }
}

/// A layer-shell placement request, sent on every layer surface commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementRequest {
    pub surface: SurfaceId,
    pub output: OutputId,
    pub anchor: Anchor,
    pub margin: Margins,
    /// `> 0` reserves space, `0` respects other zones, `< 0` ignores them
    pub exclusive_zone: i32,
    /// Desired size; `0` on an axis stretches between the anchored edges
    pub size: (u32, u32),
}

impl PlacementRequest {
    /// Edge the exclusive zone applies to.
    ///
    /// Only a single edge, or an edge plus both perpendicular edges,
    /// reserves space. Corner and centered anchors never do.
    pub fn exclusive_edge(&self) -> Option<Edge> {
        let horizontal = Anchor::LEFT | Anchor::RIGHT;
        let vertical = Anchor::TOP | Anchor::BOTTOM;
        let anchor = self.anchor;

        if anchor == Anchor::TOP || anchor == Anchor::TOP | horizontal {
            Some(Edge::Top)
        } else if anchor == Anchor::BOTTOM || anchor == Anchor::BOTTOM | horizontal {
            Some(Edge::Bottom)
        } else if anchor == Anchor::LEFT || anchor == Anchor::LEFT | vertical {
            Some(Edge::Left)
        } else if anchor == Anchor::RIGHT || anchor == Anchor::RIGHT | vertical {
            Some(Edge::Right)
        } else {
            None
        }
    }

    /// Compute the geometry inside `area`, clamped to `bounds`
    fn place(&self, area: Rect, bounds: Rect) -> Rect {
        let m = self.margin;
        let horizontal = (self.anchor.contains(Anchor::LEFT), self.anchor.contains(Anchor::RIGHT));
        let vertical = (self.anchor.contains(Anchor::TOP), self.anchor.contains(Anchor::BOTTOM));

        let width = extent(self.size.0, horizontal, area.width, m.left, m.right);
        let height = extent(self.size.1, vertical, area.height, m.top, m.bottom);
        let x = offset(area.x, area.width, width, horizontal, m.left, m.right);
        let y = offset(area.y, area.height, height, vertical, m.top, m.bottom);

        Rect::new(x, y, width, height).clamp_within(&bounds)
    }

    /// The strip reserved along `edge`, measured from the output edge
    fn zone_strip(&self, edge: Edge, geometry: Rect, bounds: Rect) -> Rect {
        let depth = match edge {
            Edge::Top | Edge::Bottom => bounds.height,
            Edge::Left | Edge::Right => bounds.width,
        };
        let thickness = (i64::from(self.exclusive_zone) + i64::from(self.margin.on(edge)))
            .clamp(0, i64::from(depth)) as u32;
        match edge {
            Edge::Top => Rect::new(geometry.x, bounds.y, geometry.width, thickness),
            Edge::Bottom => Rect::new(
                geometry.x,
                bounds.bottom().saturating_sub_unsigned(thickness),
                geometry.width,
                thickness,
            ),
            Edge::Left => Rect::new(bounds.x, geometry.y, thickness, geometry.height),
            Edge::Right => Rect::new(
                bounds.right().saturating_sub_unsigned(thickness),
                geometry.y,
                thickness,
                geometry.height,
            ),
        }
    }
}

/// Size along one axis; `0` between two anchored edges stretches across
/// `span` minus the margins
fn extent(requested: u32, anchored: (bool, bool), span: u32, before: i32, after: i32) -> u32 {
    if requested != 0 || anchored != (true, true) {
        return requested;
    }
    let free = i64::from(span) - i64::from(before) - i64::from(after);
    free.clamp(0, i64::from(span)) as u32
}

/// Start of a `size`-long segment placed inside `span` starting at `start`
fn offset(start: i32, span: u32, size: u32, anchored: (bool, bool), before: i32, after: i32) -> i32 {
    let (start, span, size) = (i64::from(start), i64::from(span), i64::from(size));
    let (before, after) = (i64::from(before), i64::from(after));
    let position = match anchored {
        (true, false) => start + before,
        (false, true) => start + span - size - after,
        (true, true) => start + before + (span - before - after - size) / 2,
        (false, false) => start + (span - size) / 2,
    };
    position.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// A resolved placement
#[derive(Debug, Clone)]
struct Placement {
    request: PlacementRequest,
    geometry: Rect,
    zone: Option<(Edge, Rect)>,
}

/// Outcome of re-resolving one placement
pub type Reflowed = (SurfaceId, Result<Rect>);

/// Resolver for layer-shell placements
#[derive(Debug, Default)]
pub struct PlacementResolver {
    /// Placements per output, in arrival order
    outputs: HashMap<OutputId, Vec<Placement>>,
    /// Surfaces whose last request was rejected
    rejected: HashSet<SurfaceId>,
}

impl PlacementResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a request against an output of `output_size`.
    ///
    /// A surface that already has a placement on this output keeps its
    /// arrival slot, so re-resolving an unchanged request yields the same
    /// geometry. On conflict the surface loses any placement it had.
    pub fn resolve(&mut self, request: PlacementRequest, output_size: (u32, u32)) -> Result<Rect> {
        let surface = request.surface;
        let output = request.output;

        // A surface moving to another output gives up its old slot
        if self.output_of(surface).is_some_and(|o| o != output) {
            self.remove(surface);
        }

        let bounds = Rect::from_size(output_size.0, output_size.1);
        let placements = self.outputs.entry(output).or_default();
        let slot = placements.iter().position(|p| p.request.surface == surface);
        let earlier = &placements[..slot.unwrap_or(placements.len())];

        let area = if request.exclusive_zone < 0 {
            bounds
        } else {
            usable_area(bounds, earlier)
        };
        let geometry = request.place(area, bounds);

        let zone = match request.exclusive_edge() {
            Some(edge) if request.exclusive_zone > 0 => {
                Some((edge, request.zone_strip(edge, geometry, bounds)))
            }
            _ => None,
        };

        if let Some((edge, strip)) = zone {
            let conflict = placements
                .iter()
                .filter(|p| p.request.surface != surface)
                .filter_map(|p| p.zone)
                .any(|(other_edge, other)| other_edge == edge && other.overlaps(&strip));
            if conflict {
                warn!(
                    "Rejected placement of {:?}: {:?} zone overlaps on {:?}",
                    surface, edge, output
                );
                if let Some(index) = slot {
                    placements.remove(index);
                }
                self.rejected.insert(surface);
                return Err(ShellError::PlacementConflict {
                    surface,
                    output,
                    edge,
                });
            }
        }

        debug!("Placed {:?} on {:?} at {:?}", surface, output, geometry);
        let placement = Placement {
            request,
            geometry,
            zone,
        };
        match slot {
            Some(index) => placements[index] = placement,
            None => placements.push(placement),
        }
        self.rejected.remove(&surface);
        Ok(geometry)
    }

    /// Re-resolve every placement of an output in arrival order.
    ///
    /// Placements that no longer fit are dropped and reported as errors.
    pub fn reflow(&mut self, output: OutputId, output_size: (u32, u32)) -> Vec<Reflowed> {
        let Some(placements) = self.outputs.remove(&output) else {
            return Vec::new();
        };
        placements
            .into_iter()
            .map(|p| {
                let surface = p.request.surface;
                (surface, self.resolve(p.request, output_size))
            })
            .collect()
    }

    /// Move every placement of `from` to the end of `to`'s arrival order
    pub fn retarget(&mut self, from: OutputId, to: OutputId, output_size: (u32, u32)) -> Vec<Reflowed> {
        let Some(placements) = self.outputs.remove(&from) else {
            return Vec::new();
        };
        placements
            .into_iter()
            .map(|p| {
                let surface = p.request.surface;
                let request = PlacementRequest {
                    output: to,
                    ..p.request
                };
                (surface, self.resolve(request, output_size))
            })
            .collect()
    }

    /// Drop every placement of an output, returning the affected surfaces
    pub fn drop_output(&mut self, output: OutputId) -> Vec<SurfaceId> {
        self.outputs
            .remove(&output)
            .map(|placements| placements.into_iter().map(|p| p.request.surface).collect())
            .unwrap_or_default()
    }

    /// Forget a surface, freeing its exclusive zone.
    ///
    /// Returns the output it was placed on; that output should be reflowed.
    pub fn remove(&mut self, surface: SurfaceId) -> Option<OutputId> {
        self.rejected.remove(&surface);
        let output = self.output_of(surface)?;
        if let Some(placements) = self.outputs.get_mut(&output) {
            placements.retain(|p| p.request.surface != surface);
            if placements.is_empty() {
                self.outputs.remove(&output);
            }
        }
        Some(output)
    }

    /// Output a surface is placed on
    pub fn output_of(&self, surface: SurfaceId) -> Option<OutputId> {
        self.outputs
            .iter()
            .find(|(_, placements)| placements.iter().any(|p| p.request.surface == surface))
            .map(|(output, _)| *output)
    }

    /// Resolved geometry of a surface
    pub fn geometry_of(&self, surface: SurfaceId) -> Option<Rect> {
        self.outputs
            .values()
            .flatten()
            .find(|p| p.request.surface == surface)
            .map(|p| p.geometry)
    }

    /// Whether the surface's last request was rejected
    pub fn is_rejected(&self, surface: SurfaceId) -> bool {
        self.rejected.contains(&surface)
    }

    /// Area of an output left after every exclusive zone
    pub fn usable_area(&self, output: OutputId, output_size: (u32, u32)) -> Rect {
        let bounds = Rect::from_size(output_size.0, output_size.1);
        match self.outputs.get(&output) {
            Some(placements) => usable_area(bounds, placements),
            None => bounds,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Drop all placements
    pub fn clear(&mut self) {
        self.outputs.clear();
        self.rejected.clear();
    }
}

/// `bounds` minus the exclusive zones of `placements`
fn usable_area(bounds: Rect, placements: &[Placement]) -> Rect {
    let (mut left, mut top, mut right, mut bottom) =
        (bounds.x, bounds.y, bounds.right(), bounds.bottom());
    for (edge, strip) in placements.iter().filter_map(|p| p.zone) {
        match edge {
            Edge::Top => top = top.max(strip.bottom()),
            Edge::Bottom => bottom = bottom.min(strip.y),
            Edge::Left => left = left.max(strip.right()),
            Edge::Right => right = right.min(strip.x),
        }
    }
    Rect::new(
        left,
        top,
        (right - left).max(0) as u32,
        (bottom - top).max(0) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUT: OutputId = OutputId(1);
    const SIZE: (u32, u32) = (1920, 1080);

    fn request(surface: u64, anchor: Anchor, size: (u32, u32), zone: i32) -> PlacementRequest {
        PlacementRequest {
            surface: SurfaceId(surface),
            output: OUT,
            anchor,
            margin: Margins::default(),
            exclusive_zone: zone,
            size,
        }
    }

    fn top_bar(surface: u64, height: u32) -> PlacementRequest {
        request(surface, Anchor::TOP | Anchor::LEFT | Anchor::RIGHT, (0, height), height as i32)
    }

    fn bottom_bar(surface: u64, height: u32) -> PlacementRequest {
        request(surface, Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT, (0, height), height as i32)
    }

    #[test]
    fn test_exclusive_edge() {
        assert_eq!(top_bar(1, 30).exclusive_edge(), Some(Edge::Top));
        assert_eq!(request(1, Anchor::LEFT, (0, 0), 0).exclusive_edge(), Some(Edge::Left));
        assert_eq!(
            request(1, Anchor::RIGHT | Anchor::TOP | Anchor::BOTTOM, (0, 0), 0).exclusive_edge(),
            Some(Edge::Right)
        );
        assert_eq!(request(1, Anchor::TOP | Anchor::LEFT, (0, 0), 0).exclusive_edge(), None);
        assert_eq!(request(1, Anchor::all(), (0, 0), 0).exclusive_edge(), None);
    }

    #[test]
    fn test_nine_reference_positions() {
        let mut resolver = PlacementResolver::new();
        let cases = [
            (Anchor::TOP | Anchor::LEFT, (0, 0)),
            (Anchor::TOP, (860, 0)),
            (Anchor::TOP | Anchor::RIGHT, (1720, 0)),
            (Anchor::LEFT, (0, 490)),
            (Anchor::empty(), (860, 490)),
            (Anchor::RIGHT, (1720, 490)),
            (Anchor::BOTTOM | Anchor::LEFT, (0, 980)),
            (Anchor::BOTTOM, (860, 980)),
            (Anchor::BOTTOM | Anchor::RIGHT, (1720, 980)),
        ];
        for (index, (anchor, (x, y))) in cases.into_iter().enumerate() {
            let geometry = resolver
                .resolve(request(index as u64, anchor, (200, 100), 0), SIZE)
                .unwrap();
            assert_eq!(geometry, Rect::new(x, y, 200, 100), "anchor {:?}", anchor);
        }
    }

    #[test]
    fn test_margins_and_stretch() {
        let mut resolver = PlacementResolver::new();
        let mut panel = top_bar(1, 40);
        panel.margin = Margins::new(5, 10, 0, 10);
        let geometry = resolver.resolve(panel, SIZE).unwrap();
        assert_eq!(geometry, Rect::new(10, 5, 1900, 40));

        // The zone strip includes the top margin
        let below = resolver
            .resolve(request(2, Anchor::TOP, (100, 100), 0), SIZE)
            .unwrap();
        assert_eq!(below.y, 45);
    }

    #[test]
    fn test_same_edge_overlap_conflicts() {
        let mut resolver = PlacementResolver::new();
        resolver.resolve(top_bar(1, 30), SIZE).unwrap();

        let result = resolver.resolve(top_bar(2, 20), SIZE);
        assert_eq!(
            result,
            Err(ShellError::PlacementConflict {
                surface: SurfaceId(2),
                output: OUT,
                edge: Edge::Top,
            })
        );
        assert!(resolver.is_rejected(SurfaceId(2)));
        assert!(resolver.geometry_of(SurfaceId(2)).is_none());
    }

    #[test]
    fn test_different_edges_share_the_output() {
        let mut resolver = PlacementResolver::new();
        let bar = resolver.resolve(top_bar(1, 30), SIZE).unwrap();
        let dock = resolver
            .resolve(
                request(2, Anchor::LEFT | Anchor::TOP | Anchor::BOTTOM, (64, 0), 64),
                SIZE,
            )
            .unwrap();

        assert_eq!(bar, Rect::new(0, 0, 1920, 30));
        // The dock is laid out below the bar
        assert_eq!(dock, Rect::new(0, 30, 64, 1050));
        assert_eq!(resolver.usable_area(OUT, SIZE), Rect::new(64, 30, 1856, 1050));
    }

    #[test]
    fn test_negative_zone_ignores_reservations() {
        let mut resolver = PlacementResolver::new();
        resolver.resolve(top_bar(1, 30), SIZE).unwrap();
        let lock = resolver
            .resolve(request(2, Anchor::all(), (0, 0), -1), SIZE)
            .unwrap();
        assert_eq!(lock, Rect::from_size(1920, 1080));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut resolver = PlacementResolver::new();
        resolver.resolve(top_bar(1, 30), SIZE).unwrap();
        let first = resolver.resolve(bottom_bar(2, 30), SIZE).unwrap();
        let second = resolver.resolve(bottom_bar(2, 30), SIZE).unwrap();
        assert_eq!(first, second);

        let again = resolver.resolve(top_bar(1, 30), SIZE).unwrap();
        assert_eq!(again, Rect::new(0, 0, 1920, 30));
    }

    #[test]
    fn test_extreme_values_stay_inside_output() {
        let bounds = Rect::from_size(SIZE.0, SIZE.1);
        let margins = [
            Margins::new(i32::MAX, i32::MAX, 0, i32::MAX),
            Margins::new(i32::MIN, i32::MIN, i32::MIN, i32::MIN),
            Margins::new(i32::MAX, i32::MIN, i32::MAX, i32::MIN),
        ];
        let mut surface = 0;
        for anchor in (0..16).map(Anchor::from_bits_truncate) {
            for margin in margins {
                for (size, zone) in [((0, 0), i32::MAX), ((u32::MAX, u32::MAX), i32::MIN), ((0, 30), 30)] {
                    surface += 1;
                    let mut resolver = PlacementResolver::new();
                    let mut extreme = request(surface, anchor, size, zone);
                    extreme.margin = margin;

                    let geometry = resolver.resolve(extreme, SIZE).unwrap();
                    assert!(geometry.x >= 0 && geometry.y >= 0, "{:?}", geometry);
                    assert!(geometry.right() <= bounds.right(), "{:?}", geometry);
                    assert!(geometry.bottom() <= bounds.bottom(), "{:?}", geometry);

                    let usable = resolver.usable_area(OUT, SIZE);
                    assert!(usable.right() <= bounds.right() && usable.bottom() <= bounds.bottom());
                }
            }
        }
    }

    #[test]
    fn test_huge_zone_reserves_at_most_the_output() {
        let mut resolver = PlacementResolver::new();
        let mut bar = top_bar(1, 30);
        bar.exclusive_zone = i32::MAX;
        bar.margin = Margins::new(i32::MAX, 0, 0, 0);
        resolver.resolve(bar, SIZE).unwrap();

        assert_eq!(resolver.usable_area(OUT, SIZE), Rect::new(0, 1080, 1920, 0));
    }

    #[test]
    fn test_never_exceeds_output() {
        let mut resolver = PlacementResolver::new();
        let mut huge = request(1, Anchor::BOTTOM | Anchor::RIGHT, (4000, 3000), 0);
        huge.margin = Margins::new(0, -50, -50, 0);
        let geometry = resolver.resolve(huge, SIZE).unwrap();
        assert_eq!(geometry, Rect::from_size(1920, 1080));
    }

    #[test]
    fn test_remove_frees_zone_and_reflow() {
        let mut resolver = PlacementResolver::new();
        resolver.resolve(top_bar(1, 30), SIZE).unwrap();
        resolver
            .resolve(request(2, Anchor::TOP, (100, 100), 0), SIZE)
            .unwrap();

        assert_eq!(resolver.remove(SurfaceId(1)), Some(OUT));
        let reflowed = resolver.reflow(OUT, SIZE);
        assert_eq!(reflowed.len(), 1);
        assert_eq!(reflowed[0].0, SurfaceId(2));
        assert_eq!(reflowed[0].1, Ok(Rect::new(910, 0, 100, 100)));

        // Output resized
        let reflowed = resolver.reflow(OUT, (1280, 720));
        assert_eq!(reflowed[0].1, Ok(Rect::new(590, 0, 100, 100)));
    }

    #[test]
    fn test_retarget_keeps_arrival_order() {
        let mut resolver = PlacementResolver::new();
        let other = OutputId(2);
        resolver.resolve(top_bar(1, 30), SIZE).unwrap();
        let mut occupied = top_bar(3, 25);
        occupied.output = other;
        resolver.resolve(occupied, SIZE).unwrap();

        let moved = resolver.retarget(OUT, other, SIZE);
        assert!(matches!(
            moved[0].1,
            Err(ShellError::PlacementConflict { .. })
        ));
        assert!(resolver.output_of(SurfaceId(1)).is_none());
        assert_eq!(resolver.output_of(SurfaceId(3)), Some(other));
    }
}
