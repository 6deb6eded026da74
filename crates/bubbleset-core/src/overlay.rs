//! Overlay lifecycle: turn one frame of records into tagged contour
//! paths on a caller-owned render surface, and hand back a handle that
//! removes them again.
//!
//! Every update clears all geometry carrying [`OVERLAY_TAG`] before
//! drawing, so the surface always shows exactly the groups of the most
//! recent frame. No state is kept between updates; the surface itself
//! is the only record of what is drawn.

use std::collections::HashMap;

use crate::group::{DEFAULT_GROUP_KEY, group_by_key, sanitize_key};
use crate::project::Projector;
use crate::types::{Dimensions, OverlayConfig, OverlayError, Point, Ring};
use crate::{GroupContours, field};

/// Tag carried by every path this module draws.
pub const OVERLAY_TAG: &str = "bubble-overlay";

/// Categorical palette used when the caller supplies no color lookup.
pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Tag identifying the paths of one group: `bubble-overlay-<sanitized key>`.
#[must_use]
pub fn group_tag(key: &str) -> String {
    format!("{OVERLAY_TAG}-{}", sanitize_key(key))
}

/// One filled contour ring as handed to a render surface.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPath {
    /// [`OVERLAY_TAG`] followed by the group tag.
    pub tags: Vec<String>,
    /// Unsanitized group key.
    pub group_key: String,
    /// Ring in screen coordinates.
    pub ring: Ring,
    pub fill: String,
    pub fill_opacity: f64,
    pub stroke: String,
    pub stroke_width: f64,
}

impl OverlayPath {
    /// Whether the path carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A display surface that can hold tagged overlay paths.
pub trait RenderSurface {
    /// Add a path on top of everything already drawn.
    fn add_path(&mut self, path: OverlayPath);

    /// Remove every element carrying `tag`, returning how many were
    /// removed. Removing a tag that is not present is a no-op.
    fn remove_tagged(&mut self, tag: &str) -> usize;
}

/// Color for a group key.
pub trait ColorLookup {
    fn color(&self, key: &str) -> String;
}

impl<F> ColorLookup for F
where
    F: Fn(&str) -> String,
{
    fn color(&self, key: &str) -> String {
        self(key)
    }
}

/// Everything the overlay needs to know about one frame.
pub struct OverlayFrame<'a, T> {
    /// All records of the frame.
    pub records: &'a [T],
    /// Raw `(x, y)` data values of a record, before projection.
    pub values: &'a dyn Fn(&T) -> (f64, f64),
    /// Group key of a record. `None` puts every record in one group.
    pub group_key: Option<&'a dyn Fn(&T) -> String>,
    /// The chart's current coordinate mapping.
    pub projector: Projector<'a>,
    /// Chart size in pixels.
    pub dimensions: Dimensions,
    /// Group colors. `None` falls back to [`CATEGORY10`], one slot per
    /// render tag in order of first appearance.
    pub colors: Option<&'a dyn ColorLookup>,
    /// Fill opacity. `None` uses the configured default.
    pub opacity: Option<f64>,
}

impl<'a, T> OverlayFrame<'a, T> {
    /// A frame with a single group, default colors and default opacity.
    #[must_use]
    pub const fn new(
        records: &'a [T],
        values: &'a dyn Fn(&T) -> (f64, f64),
        projector: Projector<'a>,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            records,
            values,
            group_key: None,
            projector,
            dimensions,
            colors: None,
            opacity: None,
        }
    }

    /// Group records with `key`.
    #[must_use]
    pub const fn with_group_key(mut self, key: &'a dyn Fn(&T) -> String) -> Self {
        self.group_key = Some(key);
        self
    }

    /// Color groups with `colors`.
    #[must_use]
    pub const fn with_colors(mut self, colors: &'a dyn ColorLookup) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Override the fill opacity.
    #[must_use]
    pub const fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Screen-space points grouped by key, in order of first appearance.
    #[must_use]
    pub fn grouped_points(&self) -> Vec<(String, Vec<Point>)> {
        let key = |record: &&T| {
            self.group_key
                .map_or_else(|| DEFAULT_GROUP_KEY.to_string(), |f| f(*record))
        };
        group_by_key(self.records.iter(), key)
            .into_iter()
            .map(|group| {
                let points = group
                    .members
                    .into_iter()
                    .map(|record| {
                        let (x, y) = (self.values)(record);
                        self.projector.project(x, y)
                    })
                    .collect();
                (group.key, points)
            })
            .collect()
    }
}

/// Fully computed overlay of one group, ready to draw.
#[derive(Debug, Clone)]
pub struct GroupOverlay {
    /// Group key as produced by the key function.
    pub key: String,
    /// Render tag, see [`group_tag`].
    pub tag: String,
    /// Resolved group color.
    pub color: String,
    /// Resolved fill opacity: the frame's override or the configured
    /// default.
    pub fill_opacity: f64,
    /// Projected member positions.
    pub points: Vec<Point>,
    /// Spanning tree, energy field and screen-space rings.
    pub contours: GroupContours,
}

/// Removes the geometry drawn by one [`OverlayManager::update`] call.
///
/// The surface is owned by the caller, so it is passed in when the
/// handle is used rather than captured.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping a Disposal leaves its overlays on the surface"]
pub struct Disposal {
    tags: Vec<String>,
}

impl Disposal {
    /// Group tags this handle will remove.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Remove every path tagged with one of this update's group tags.
    /// Returns the number of elements removed.
    pub fn dispose<S: RenderSurface + ?Sized>(self, surface: &mut S) -> usize {
        self.tags
            .iter()
            .map(|tag| surface.remove_tagged(tag))
            .sum()
    }
}

/// Draws bubble set overlays for successive frames.
#[derive(Debug, Clone, Default)]
pub struct OverlayManager {
    config: OverlayConfig,
}

impl OverlayManager {
    /// Create a manager after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::InvalidConfig`] if `config` fails
    /// [`OverlayConfig::validate`].
    pub fn new(config: OverlayConfig) -> Result<Self, OverlayError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Compute the overlay of every group in `frame` without drawing.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::InvalidConfig`] for an opacity outside
    /// `[0, 1]` and [`OverlayError::GridTooLarge`] if the chart exceeds
    /// the cell budget.
    pub fn build<T>(&self, frame: &OverlayFrame<'_, T>) -> Result<Vec<GroupOverlay>, OverlayError> {
        self.build_groups(frame, |points| {
            crate::contours_unchecked(points, frame.dimensions, &self.config)
        })
    }

    /// Shared body of [`build`](Self::build): validates, groups and
    /// colors, delegating the contour pipeline of each group to
    /// `compute`.
    pub(crate) fn build_groups<T, F>(
        &self,
        frame: &OverlayFrame<'_, T>,
        mut compute: F,
    ) -> Result<Vec<GroupOverlay>, OverlayError>
    where
        F: FnMut(&[Point]) -> GroupContours,
    {
        self.config.validate()?;
        if let Some(opacity) = frame.opacity
            && !(0.0..=1.0).contains(&opacity)
        {
            return Err(OverlayError::InvalidConfig(format!(
                "opacity must be within [0, 1], got {opacity}"
            )));
        }
        field::checked_grid_size(frame.dimensions, &self.config)?;

        let opacity = frame.opacity.unwrap_or(self.config.fill_opacity);
        // Palette slot per render tag, in order of first appearance.
        let mut slots: HashMap<String, usize> = HashMap::new();
        let overlays = frame
            .grouped_points()
            .into_iter()
            .map(|(key, points)| {
                let tag = group_tag(&key);
                let next = slots.len();
                let slot = *slots.entry(tag.clone()).or_insert(next);
                if slot != next {
                    tracing::warn!(%key, %tag, "group key collides with another after sanitization");
                }
                let color = frame.colors.map_or_else(
                    || CATEGORY10[slot % CATEGORY10.len()].to_string(),
                    |c| c.color(&key),
                );
                let contours = compute(&points);
                tracing::debug!(
                    %key,
                    points = points.len(),
                    edges = contours.edges.len(),
                    cols = contours.grid.cols(),
                    rows = contours.grid.rows(),
                    rings = contours.rings.len(),
                    "group overlay built"
                );
                GroupOverlay {
                    key,
                    tag,
                    color,
                    fill_opacity: opacity,
                    points,
                    contours,
                }
            })
            .collect();

        Ok(overlays)
    }

    /// Replace whatever overlay is on `surface` with the overlay of
    /// `frame`.
    ///
    /// All geometry is computed before the surface is touched, so on
    /// error the previous frame stays intact. Groups whose field never
    /// crosses the threshold draw nothing but are still covered by the
    /// returned [`Disposal`].
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    pub fn update<T, S: RenderSurface + ?Sized>(
        &self,
        surface: &mut S,
        frame: &OverlayFrame<'_, T>,
    ) -> Result<Disposal, OverlayError> {
        let overlays = self.build(frame)?;
        Ok(self.draw(surface, overlays))
    }

    /// Replace whatever overlay is on `surface` with already built
    /// `overlays`, e.g. the ones returned by
    /// [`build_with_diagnostics`](crate::diagnostics::build_with_diagnostics).
    pub fn draw<S: RenderSurface + ?Sized>(
        &self,
        surface: &mut S,
        overlays: Vec<GroupOverlay>,
    ) -> Disposal {
        let span = tracing::debug_span!("overlay_update", groups = overlays.len());
        let _enter = span.enter();

        let removed = surface.remove_tagged(OVERLAY_TAG);
        tracing::trace!(removed, "cleared previous overlay");

        let mut tags = Vec::with_capacity(overlays.len());
        for overlay in overlays {
            for ring in overlay.contours.rings {
                surface.add_path(OverlayPath {
                    tags: vec![OVERLAY_TAG.to_string(), overlay.tag.clone()],
                    group_key: overlay.key.clone(),
                    ring,
                    fill: overlay.color.clone(),
                    fill_opacity: overlay.fill_opacity,
                    stroke: overlay.color.clone(),
                    stroke_width: self.config.stroke_width,
                });
            }
            tags.push(overlay.tag);
        }

        Disposal { tags }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::project::LinearScale;

    /// In-memory surface recording paths in draw order.
    #[derive(Default)]
    struct RecordingSurface {
        paths: Vec<OverlayPath>,
    }

    impl RenderSurface for RecordingSurface {
        fn add_path(&mut self, path: OverlayPath) {
            self.paths.push(path);
        }

        fn remove_tagged(&mut self, tag: &str) -> usize {
            let before = self.paths.len();
            self.paths.retain(|p| !p.has_tag(tag));
            before - self.paths.len()
        }
    }

    impl RecordingSurface {
        fn tags(&self) -> Vec<String> {
            let mut tags: Vec<String> = self.paths.iter().map(|p| p.tags[1].clone()).collect();
            tags.sort();
            tags.dedup();
            tags
        }
    }

    #[derive(Debug, Clone)]
    struct Record {
        x: f64,
        y: f64,
        group: &'static str,
    }

    const DIMS: Dimensions = Dimensions {
        width: 200,
        height: 200,
    };

    /// Identity scales: data values are pixels.
    fn identity() -> LinearScale {
        LinearScale {
            domain: (0.0, 200.0),
            range: (0.0, 200.0),
        }
    }

    fn values(r: &Record) -> (f64, f64) {
        (r.x, r.y)
    }

    fn key(r: &Record) -> String {
        r.group.to_string()
    }

    fn records() -> Vec<Record> {
        vec![
            Record { x: 40.0, y: 40.0, group: "compiled manual" },
            Record { x: 160.0, y: 40.0, group: "jit-gc" },
            Record { x: 60.0, y: 50.0, group: "compiled manual" },
            Record { x: 150.0, y: 150.0, group: "jit-gc" },
        ]
    }

    #[test]
    fn update_draws_each_group_under_its_tag() {
        let scale = identity();
        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key);
        let manager = OverlayManager::default();
        let mut surface = RecordingSurface::default();

        let disposal = manager.update(&mut surface, &frame).unwrap();

        assert_eq!(
            surface.tags(),
            ["bubble-overlay-compiled_manual", "bubble-overlay-jit-gc"]
        );
        assert_eq!(
            disposal.tags(),
            ["bubble-overlay-compiled_manual", "bubble-overlay-jit-gc"]
        );
        for path in &surface.paths {
            assert_eq!(path.tags[0], OVERLAY_TAG);
            assert!((path.fill_opacity - 0.3).abs() < f64::EPSILON);
            assert!((path.stroke_width - 2.0).abs() < f64::EPSILON);
            assert_eq!(path.fill, path.stroke);
        }
    }

    #[test]
    fn default_colors_follow_group_order() {
        let scale = identity();
        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key);
        let overlays = OverlayManager::default().build(&frame).unwrap();
        assert_eq!(overlays[0].color, CATEGORY10[0]);
        assert_eq!(overlays[1].color, CATEGORY10[1]);
    }

    #[test]
    fn keys_sharing_a_tag_share_a_default_color() {
        let scale = identity();
        let records = vec![
            Record { x: 40.0, y: 40.0, group: "compiled manual" },
            Record { x: 100.0, y: 100.0, group: "compiled/manual" },
            Record { x: 160.0, y: 160.0, group: "jit-gc" },
        ];
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key);
        let overlays = OverlayManager::default().build(&frame).unwrap();

        assert_eq!(overlays.len(), 3);
        assert_eq!(overlays[0].tag, overlays[1].tag);
        assert_eq!(overlays[0].color, CATEGORY10[0]);
        assert_eq!(overlays[1].color, CATEGORY10[0]);
        assert_eq!(overlays[2].color, CATEGORY10[1]);
    }

    #[test]
    fn draw_matches_update_for_built_overlays() {
        let scale = identity();
        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key)
            .with_opacity(0.45);
        let manager = OverlayManager::default();

        let mut updated = RecordingSurface::default();
        let from_update = manager.update(&mut updated, &frame).unwrap();

        let mut drawn = RecordingSurface::default();
        let overlays = manager.build(&frame).unwrap();
        assert!(overlays.iter().all(|o| (o.fill_opacity - 0.45).abs() < f64::EPSILON));
        let from_draw = manager.draw(&mut drawn, overlays);

        assert_eq!(from_update, from_draw);
        assert_eq!(updated.paths, drawn.paths);
    }

    #[test]
    fn color_lookup_and_opacity_are_applied() {
        let scale = identity();
        let records = records();
        let colors = |k: &str| if k == "jit-gc" { "red".to_string() } else { "blue".to_string() };
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key)
            .with_colors(&colors)
            .with_opacity(0.6);
        let mut surface = RecordingSurface::default();
        let _disposal = OverlayManager::default().update(&mut surface, &frame).unwrap();

        assert!(!surface.paths.is_empty());
        for path in &surface.paths {
            let expected = if path.group_key == "jit-gc" { "red" } else { "blue" };
            assert_eq!(path.fill, expected);
            assert!((path.fill_opacity - 0.6).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn missing_key_function_uses_single_default_group() {
        let scale = identity();
        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS);
        let mut surface = RecordingSurface::default();
        let disposal = OverlayManager::default().update(&mut surface, &frame).unwrap();
        assert_eq!(disposal.tags(), ["bubble-overlay-default"]);
        assert!(surface.paths.iter().all(|p| p.group_key == "default"));
    }

    #[test]
    fn repeated_update_replaces_instead_of_duplicating() {
        let scale = identity();
        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key);
        let manager = OverlayManager::default();

        let mut once = RecordingSurface::default();
        let _first = manager.update(&mut once, &frame).unwrap();

        let mut twice = RecordingSurface::default();
        let _first = manager.update(&mut twice, &frame).unwrap();
        let _second = manager.update(&mut twice, &frame).unwrap();

        assert_eq!(once.paths, twice.paths);
    }

    #[test]
    fn update_drops_groups_missing_from_new_frame() {
        let scale = identity();
        let projector = Projector::new(&scale, &scale);
        let manager = OverlayManager::default();
        let mut surface = RecordingSurface::default();

        let all = records();
        let frame = OverlayFrame::new(&all, &values, projector, DIMS).with_group_key(&key);
        let _first = manager.update(&mut surface, &frame).unwrap();

        let only_jit: Vec<Record> = all.into_iter().filter(|r| r.group == "jit-gc").collect();
        let frame = OverlayFrame::new(&only_jit, &values, projector, DIMS).with_group_key(&key);
        let _second = manager.update(&mut surface, &frame).unwrap();

        assert_eq!(surface.tags(), ["bubble-overlay-jit-gc"]);
    }

    #[test]
    fn disposal_removes_everything_it_drew() {
        let scale = identity();
        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key);
        // Something else the chart drew; the overlay must leave it alone.
        let axis = OverlayPath {
            tags: vec!["chart-axis".to_string()],
            group_key: String::new(),
            ring: Ring::new(crate::Polyline::new(vec![]), false),
            fill: "none".to_string(),
            fill_opacity: 1.0,
            stroke: "black".to_string(),
            stroke_width: 1.0,
        };
        let mut surface = RecordingSurface {
            paths: vec![axis.clone()],
        };

        let disposal = OverlayManager::default().update(&mut surface, &frame).unwrap();
        let drawn = surface.paths.len() - 1;
        assert!(drawn > 0);

        assert_eq!(disposal.dispose(&mut surface), drawn);
        assert_eq!(surface.paths, [axis]);
    }

    #[test]
    fn empty_frame_clears_surface_and_disposes_nothing() {
        let scale = identity();
        let manager = OverlayManager::default();
        let mut surface = RecordingSurface::default();

        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key);
        let _first = manager.update(&mut surface, &frame).unwrap();

        let empty: Vec<Record> = Vec::new();
        let frame = OverlayFrame::new(&empty, &values, Projector::new(&scale, &scale), DIMS);
        let disposal = manager.update(&mut surface, &frame).unwrap();

        assert!(surface.paths.is_empty());
        assert!(disposal.tags().is_empty());
        assert_eq!(disposal.dispose(&mut surface), 0);
    }

    #[test]
    fn error_leaves_previous_frame_intact() {
        let scale = identity();
        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_group_key(&key);
        let manager = OverlayManager::default();
        let mut surface = RecordingSurface::default();
        let _first = manager.update(&mut surface, &frame).unwrap();
        let before = surface.paths.clone();

        let huge = Dimensions {
            width: 100_000,
            height: 100_000,
        };
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), huge);
        let result = manager.update(&mut surface, &frame);

        assert!(matches!(result, Err(OverlayError::GridTooLarge { .. })));
        assert_eq!(surface.paths, before);
    }

    #[test]
    fn invalid_opacity_is_rejected() {
        let scale = identity();
        let records = records();
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS)
            .with_opacity(-0.1);
        assert!(matches!(
            OverlayManager::default().build(&frame),
            Err(OverlayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn manager_rejects_invalid_config() {
        let config = OverlayConfig {
            threshold: -1.0,
            ..OverlayConfig::default()
        };
        assert!(OverlayManager::new(config).is_err());
    }

    #[test]
    fn points_are_clamped_into_the_chart() {
        let scale = identity();
        let records = vec![Record {
            x: -50.0,
            y: 500.0,
            group: "a",
        }];
        let frame = OverlayFrame::new(&records, &values, Projector::new(&scale, &scale), DIMS);
        let grouped = frame.grouped_points();
        assert_eq!(grouped[0].1, [Point::new(0.0, 200.0)]);
    }
}
