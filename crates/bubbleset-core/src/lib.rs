//! bubbleset-core: Pure group-contour overlay generator (sans-IO).
//!
//! Draws a smooth region around each group of points in a chart frame,
//! bridging members that sit far apart, through:
//! group by key -> minimum spanning tree -> energy field -> isolines ->
//! screen-space rings -> render surface.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! records and hands tagged paths to a caller-supplied
//! [`RenderSurface`]. SVG serialization lives in `bubbleset-export`.

pub mod contour;
pub mod diagnostics;
pub mod field;
pub mod group;
pub mod mst;
pub mod overlay;
pub mod project;
pub mod types;

pub use contour::{ContourExtractor, ContourExtractorKind};
pub use field::EnergyGrid;
pub use group::{Group, group_by_key, sanitize_key};
pub use overlay::{
    ColorLookup, Disposal, GroupOverlay, OVERLAY_TAG, OverlayFrame, OverlayManager, OverlayPath,
    RenderSurface, group_tag,
};
pub use project::{LinearScale, LogScale, Projector, Scale};
pub use types::{Dimensions, Edge, OverlayConfig, OverlayError, Point, Polyline, Ring};

/// Everything computed for one group: its spanning tree, its energy
/// field and the contour rings in screen coordinates.
#[derive(Debug, Clone)]
pub struct GroupContours {
    /// Spanning-tree edges, `max(0, n - 1)` of them.
    pub edges: Vec<Edge>,
    /// The group's energy field.
    pub grid: EnergyGrid,
    /// Isolines at `config.threshold`, scaled to pixels.
    pub rings: Vec<Ring>,
}

/// Run the contour pipeline for one group of screen-space points.
///
/// # Pipeline steps
///
/// 1. Euclidean minimum spanning tree (Prim, first point first)
/// 2. Energy field: point falloffs plus thinner falloffs along tree edges
/// 3. Isoline extraction at the threshold (pluggable strategy)
/// 4. Scale rings from grid-index space to pixels
///
/// An empty group yields no edges and no rings. A field that never
/// exceeds the threshold yields no rings; that is not an error.
///
/// # Errors
///
/// Returns [`OverlayError::InvalidConfig`] if `config` fails validation.
/// Returns [`OverlayError::GridTooLarge`] if the grid for `dimensions`
/// exceeds `config.max_grid_cells`.
pub fn build_group_contours(
    points: &[Point],
    dimensions: Dimensions,
    config: &OverlayConfig,
) -> Result<GroupContours, OverlayError> {
    config.validate()?;
    field::checked_grid_size(dimensions, config)?;
    Ok(contours_unchecked(points, dimensions, config))
}

/// [`build_group_contours`] without the config and size checks.
pub(crate) fn contours_unchecked(
    points: &[Point],
    dimensions: Dimensions,
    config: &OverlayConfig,
) -> GroupContours {
    contours_staged(points, dimensions, config, |_| {})
}

/// A step of the contour pipeline, reported as it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    SpanningTree,
    Field,
    Contour,
}

/// The contour pipeline, calling `finished` after each [`Stage`].
pub(crate) fn contours_staged<F: FnMut(Stage)>(
    points: &[Point],
    dimensions: Dimensions,
    config: &OverlayConfig,
    mut finished: F,
) -> GroupContours {
    // 1. Spanning tree.
    let edges = mst::minimum_spanning_tree(points);
    finished(Stage::SpanningTree);

    // 2. Energy field.
    let grid = field::energy_field_unchecked(points, &edges, dimensions, config);
    finished(Stage::Field);

    // 3 + 4. Isolines, scaled to screen space.
    let rings = config
        .contour_extractor
        .extract(&grid, config.threshold)
        .into_iter()
        .map(|ring| ring.scaled(config.grid_resolution))
        .collect();
    finished(Stage::Contour);

    GroupContours { edges, grid, rings }
}
