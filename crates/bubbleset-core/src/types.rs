//! Shared types for the bubble set overlay generator.

use geo::{Area, Contains};
use serde::{Deserialize, Serialize};

use crate::contour::ContourExtractorKind;

/// A 2D point in screen (pixel) coordinates, or in grid-index
/// coordinates for contours that have not been scaled yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            t.mul_add(other.x - self.x, self.x),
            t.mul_add(other.y - self.y, self.y),
        )
    }

    /// Multiply both coordinates by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// An undirected spanning-tree edge between two members of one group.
///
/// `p` is the endpoint that was already in the tree when the edge was
/// chosen, `q` the one it brought in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub p: Point,
    pub q: Point,
}

impl Edge {
    /// Euclidean length of the edge.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.p.distance(self.q)
    }
}

/// A sequence of connected points forming a path segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// One isoline produced by contour extraction.
///
/// Closed rings repeat their first point as the last point. Open rings
/// start and end on the grid boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    /// Vertices in traversal order.
    pub polyline: Polyline,
    /// Whether the isoline closes on itself.
    pub closed: bool,
}

impl Ring {
    /// Create a ring from its vertices.
    #[must_use]
    pub const fn new(polyline: Polyline, closed: bool) -> Self {
        Self { polyline, closed }
    }

    /// Vertices in traversal order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        self.polyline.points()
    }

    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.polyline.len()
    }

    /// Returns `true` if the ring has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.polyline.is_empty()
    }

    /// Copy of this ring with every coordinate multiplied by `factor`.
    ///
    /// Grid-index rings become screen-space rings when scaled by the grid
    /// resolution.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let points = self.points().iter().map(|p| p.scaled(factor)).collect();
        Self::new(Polyline::new(points), self.closed)
    }

    /// Whether `point` lies strictly inside the ring.
    ///
    /// Open rings are treated as implicitly closed by a straight segment
    /// between their endpoints, which is how a filled path renders them.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        self.to_polygon()
            .contains(&geo::Point::new(point.x, point.y))
    }

    /// Unsigned area enclosed by the ring (implicitly closed).
    #[must_use]
    pub fn area(&self) -> f64 {
        self.to_polygon().unsigned_area()
    }

    fn to_polygon(&self) -> geo::Polygon<f64> {
        let coords: Vec<geo::Coord<f64>> = self
            .points()
            .iter()
            .map(|p| geo::Coord { x: p.x, y: p.y })
            .collect();
        geo::Polygon::new(geo::LineString::from(coords), Vec::new())
    }
}

/// Chart dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Tunable constants of the overlay generator.
///
/// Defaults are the constants the survey chart has always used. Use
/// [`validate`](Self::validate) before building anything from a config
/// that came from user input; [`OverlayManager`](crate::OverlayManager)
/// validates on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Grid cell size in pixels. Lower values give finer contours at
    /// quadratic cost.
    pub grid_resolution: f64,

    /// Falloff radius in pixels of the energy deposited by each point.
    pub point_radius: f64,

    /// Falloff radius in pixels of the energy deposited along each
    /// spanning-tree edge.
    pub edge_radius: f64,

    /// Energy level the isolines are drawn at.
    pub threshold: f64,

    /// Fill opacity of rendered overlays (0.0 to 1.0).
    pub fill_opacity: f64,

    /// Stroke width of rendered overlays in pixels.
    pub stroke_width: f64,

    /// Which contour extraction strategy to use.
    pub contour_extractor: ContourExtractorKind,

    /// Upper bound on `cols * rows` for a single energy grid.
    pub max_grid_cells: usize,
}

impl OverlayConfig {
    pub const DEFAULT_GRID_RESOLUTION: f64 = 5.0;
    pub const DEFAULT_POINT_RADIUS: f64 = 50.0;
    pub const DEFAULT_EDGE_RADIUS: f64 = Self::DEFAULT_POINT_RADIUS / 2.0;
    pub const DEFAULT_THRESHOLD: f64 = 0.5;
    pub const DEFAULT_FILL_OPACITY: f64 = 0.3;
    pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
    pub const DEFAULT_MAX_GRID_CELLS: usize = 4_000_000;

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::InvalidConfig`] naming the first field
    /// that is out of range.
    pub fn validate(&self) -> Result<(), OverlayError> {
        let positive = [
            ("grid_resolution", self.grid_resolution),
            ("point_radius", self.point_radius),
            ("edge_radius", self.edge_radius),
            ("threshold", self.threshold),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(OverlayError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.fill_opacity) {
            return Err(OverlayError::InvalidConfig(format!(
                "fill_opacity must be within [0, 1], got {}",
                self.fill_opacity
            )));
        }
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(OverlayError::InvalidConfig(format!(
                "stroke_width must be finite and non-negative, got {}",
                self.stroke_width
            )));
        }
        if self.max_grid_cells == 0 {
            return Err(OverlayError::InvalidConfig(
                "max_grid_cells must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            grid_resolution: Self::DEFAULT_GRID_RESOLUTION,
            point_radius: Self::DEFAULT_POINT_RADIUS,
            edge_radius: Self::DEFAULT_EDGE_RADIUS,
            threshold: Self::DEFAULT_THRESHOLD,
            fill_opacity: Self::DEFAULT_FILL_OPACITY,
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            contour_extractor: ContourExtractorKind::default(),
            max_grid_cells: Self::DEFAULT_MAX_GRID_CELLS,
        }
    }
}

/// Errors that can occur while building or rendering overlays.
///
/// Degenerate geometry (empty groups, single points, duplicate
/// coordinates) is never an error; it yields empty geometry instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum OverlayError {
    /// Overlay configuration is invalid.
    #[error("invalid overlay configuration: {0}")]
    InvalidConfig(String),

    /// The chart is too large for the configured grid cell budget.
    #[error("energy grid of {cols}x{rows} cells exceeds the limit of {max_cells} cells")]
    GridTooLarge {
        cols: usize,
        rows: usize,
        max_cells: usize,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance_squared() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_distance_to_self_is_zero() {
        let p = Point::new(7.0, 11.0);
        assert!((p.distance(p)).abs() < f64::EPSILON);
    }

    #[test]
    fn point_lerp_endpoints_and_midpoint() {
        let a = Point::new(10.0, 10.0);
        let b = Point::new(20.0, 30.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Point::new(15.0, 20.0));
    }

    #[test]
    fn edge_length() {
        let e = Edge {
            p: Point::new(10.0, 10.0),
            q: Point::new(10.0, 100.0),
        };
        assert!((e.length() - 90.0).abs() < f64::EPSILON);
    }

    // --- Ring tests ---

    fn unit_square(closed: bool) -> Ring {
        let mut points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        if closed {
            points.push(Point::new(0.0, 0.0));
        }
        Ring::new(Polyline::new(points), closed)
    }

    #[test]
    fn ring_contains_interior_point() {
        let ring = unit_square(true);
        assert!(ring.contains(Point::new(5.0, 5.0)));
        assert!(!ring.contains(Point::new(15.0, 5.0)));
    }

    #[test]
    fn open_ring_is_implicitly_closed() {
        let ring = unit_square(false);
        assert!(ring.contains(Point::new(5.0, 5.0)));
        assert!((ring.area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn ring_scaled_multiplies_coordinates() {
        let ring = unit_square(true).scaled(5.0);
        assert_eq!(ring.points()[2], Point::new(50.0, 50.0));
        assert!(ring.closed);
        assert!((ring.area() - 2500.0).abs() < 1e-9);
    }

    // --- OverlayConfig tests ---

    #[test]
    fn overlay_config_defaults() {
        let config = OverlayConfig::default();
        assert!((config.grid_resolution - 5.0).abs() < f64::EPSILON);
        assert!((config.point_radius - 50.0).abs() < f64::EPSILON);
        assert!((config.edge_radius - 25.0).abs() < f64::EPSILON);
        assert!((config.threshold - 0.5).abs() < f64::EPSILON);
        assert!((config.fill_opacity - 0.3).abs() < f64::EPSILON);
        assert!((config.stroke_width - 2.0).abs() < f64::EPSILON);
        assert_eq!(
            config.contour_extractor,
            ContourExtractorKind::ClosedMarchingSquares
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_resolution() {
        let config = OverlayConfig {
            grid_resolution: 0.0,
            ..OverlayConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, OverlayError::InvalidConfig(ref msg) if msg.contains("grid_resolution")),
            "unexpected error: {err}",
        );
    }

    #[test]
    fn validate_rejects_nan_radius() {
        let config = OverlayConfig {
            edge_radius: f64::NAN,
            ..OverlayConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(OverlayError::InvalidConfig(ref msg)) if msg.contains("edge_radius")
        ));
    }

    #[test]
    fn validate_rejects_opacity_out_of_range() {
        let config = OverlayConfig {
            fill_opacity: 1.5,
            ..OverlayConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(OverlayError::InvalidConfig(ref msg)) if msg.contains("fill_opacity")
        ));
    }

    #[test]
    fn validate_rejects_zero_cell_budget() {
        let config = OverlayConfig {
            max_grid_cells: 0,
            ..OverlayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlay_config_deserializes_partial_json() {
        let config: OverlayConfig =
            serde_json::from_str(r#"{"grid_resolution": 2.5, "contour_extractor": "MarchingSquares"}"#)
                .unwrap();
        assert!((config.grid_resolution - 2.5).abs() < f64::EPSILON);
        assert!((config.point_radius - 50.0).abs() < f64::EPSILON);
        assert_eq!(
            config.contour_extractor,
            ContourExtractorKind::MarchingSquares
        );
    }

    // --- OverlayError tests ---

    #[test]
    fn error_invalid_config_display() {
        let err = OverlayError::InvalidConfig("threshold must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "invalid overlay configuration: threshold must be positive",
        );
    }

    #[test]
    fn error_grid_too_large_display() {
        let err = OverlayError::GridTooLarge {
            cols: 4000,
            rows: 3000,
            max_cells: 1_000_000,
        };
        assert_eq!(
            err.to_string(),
            "energy grid of 4000x3000 cells exceeds the limit of 1000000 cells",
        );
    }

    #[test]
    fn overlay_error_serde_round_trip() {
        let err = OverlayError::GridTooLarge {
            cols: 10,
            rows: 20,
            max_cells: 100,
        };
        let json = serde_json::to_string(&err).unwrap();
        let deserialized: OverlayError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }
}
