//! Point projection: data values to screen-space points.
//!
//! The chart layer owns the scales; this module only defines the narrow
//! interface the overlay needs and two common scale shapes.

use crate::types::Point;

/// A mapping from a data domain to a pixel range.
pub trait Scale {
    /// Inclusive data domain `(lo, hi)`; either order is accepted.
    fn domain(&self) -> (f64, f64);

    /// Map a value to pixels. Values outside the domain extrapolate.
    fn map(&self, value: f64) -> f64;

    /// Map a value after clamping it into the domain.
    fn map_clamped(&self, value: f64) -> f64 {
        let (a, b) = self.domain();
        self.map(value.clamp(a.min(b), a.max(b)))
    }
}

/// Linear interpolation from `domain` to `range`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl Scale for LinearScale {
    fn domain(&self) -> (f64, f64) {
        self.domain
    }

    fn map(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 {
            return r0;
        }
        ((value - d0) / span).mul_add(r1 - r0, r0)
    }
}

/// Logarithmic interpolation from `domain` to `range`.
///
/// The domain must be strictly positive; values are clamped to a tiny
/// positive floor before taking the logarithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl Scale for LogScale {
    fn domain(&self) -> (f64, f64) {
        self.domain
    }

    fn map(&self, value: f64) -> f64 {
        let ln = |v: f64| v.max(f64::MIN_POSITIVE).ln();
        let (d0, d1) = (ln(self.domain.0), ln(self.domain.1));
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 {
            return r0;
        }
        ((ln(value) - d0) / span).mul_add(r1 - r0, r0)
    }
}

/// Projects `(x_value, y_value)` pairs through a pair of scales.
#[derive(Clone, Copy)]
pub struct Projector<'a> {
    pub x: &'a dyn Scale,
    pub y: &'a dyn Scale,
}

impl<'a> Projector<'a> {
    /// Create a projector from a horizontal and a vertical scale.
    #[must_use]
    pub const fn new(x: &'a dyn Scale, y: &'a dyn Scale) -> Self {
        Self { x, y }
    }

    /// Screen position of a data pair, each value clamped into its
    /// scale's domain first.
    #[must_use]
    pub fn project(&self, x_value: f64, y_value: f64) -> Point {
        Point::new(self.x.map_clamped(x_value), self.y.map_clamped(y_value))
    }
}

impl std::fmt::Debug for Projector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("x_domain", &self.x.domain())
            .field("y_domain", &self.y.domain())
            .finish()
    }
}
