//! Contour extraction: isolines of an energy grid at a single threshold.
//!
//! This module defines the [`ContourExtractor`] trait for pluggable
//! extraction algorithms and the [`ContourExtractorKind`] enum for
//! selecting one at runtime. Both shipped strategies are marching
//! squares; they differ only in how the grid boundary is treated.
//!
//! # Conventions
//!
//! - Cell `(col, row)` is sampled at grid coordinate
//!   `(col + 0.5, row + 0.5)`, so multiplying ring coordinates by the
//!   grid resolution lands samples on pixel cell centers.
//! - A sample is inside when its value is strictly greater than the
//!   threshold. An all-zero grid therefore never yields a ring.
//! - Crossings are linearly interpolated along grid edges.
//! - Saddle cells are resolved by the mean of their four corners.
//! - Open contours are returned first, then closed rings, each in
//!   row-major order of discovery. Closed rings repeat their first
//!   point as the last one.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::field::EnergyGrid;
use crate::types::{Point, Polyline, Ring};

/// Selects which contour extraction algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourExtractorKind {
    /// Plain marching squares over the grid samples.
    ///
    /// Level sets inside the grid come out as closed rings; where a
    /// region runs into the grid boundary the isoline stops there and
    /// comes out open. Suits bare isolines rather than fills.
    MarchingSquares,

    /// Marching squares over the grid surrounded by a below-threshold
    /// border.
    ///
    /// Every ring closes. Regions touching the boundary are closed along
    /// the grid edge itself, which suits filled rendering.
    #[default]
    ClosedMarchingSquares,
}

/// Trait for contour extraction strategies.
///
/// Input: an energy grid and a threshold.
/// Output: zero or more rings in grid-index coordinates. Output must be
/// deterministic for a given input.
pub trait ContourExtractor {
    /// Extract the isolines of `grid` at `threshold`.
    fn extract(&self, grid: &EnergyGrid, threshold: f64) -> Vec<Ring>;
}

impl ContourExtractor for ContourExtractorKind {
    fn extract(&self, grid: &EnergyGrid, threshold: f64) -> Vec<Ring> {
        match *self {
            Self::MarchingSquares => {
                marching_squares(grid.values(), grid.cols(), grid.rows(), threshold)
            }
            Self::ClosedMarchingSquares => {
                closed_marching_squares(grid.values(), grid.cols(), grid.rows(), threshold)
            }
        }
    }
}

/// Isolines of a row-major `cols x rows` field at `threshold`.
///
/// Returns no rings if `values.len() != cols * rows`.
#[must_use]
pub fn marching_squares(values: &[f64], cols: usize, rows: usize, threshold: f64) -> Vec<Ring> {
    Field::new(values, cols, rows, threshold, false).map_or_else(Vec::new, |f| f.trace())
}

/// Like [`marching_squares`] but with the field padded by a
/// below-threshold border, so every ring is closed.
#[must_use]
pub fn closed_marching_squares(
    values: &[f64],
    cols: usize,
    rows: usize,
    threshold: f64,
) -> Vec<Ring> {
    Field::new(values, cols, rows, threshold, true).map_or_else(Vec::new, |f| f.trace())
}

/// A grid edge between two adjacent samples.
///
/// Horizontal edges join `(x, y)` and `(x + 1, y)`; vertical edges join
/// `(x, y)` and `(x, y + 1)`. Indices may be `-1` or `cols`/`rows` on
/// a padded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
struct GridEdge {
    horizontal: bool,
    x: i64,
    y: i64,
}

impl GridEdge {
    const fn horizontal(x: i64, y: i64) -> Self {
        Self {
            horizontal: true,
            x,
            y,
        }
    }

    const fn vertical(x: i64, y: i64) -> Self {
        Self {
            horizontal: false,
            x,
            y,
        }
    }

    const fn far_end(self) -> (i64, i64) {
        if self.horizontal {
            (self.x + 1, self.y)
        } else {
            (self.x, self.y + 1)
        }
    }
}

/// Borrowed view of the field being contoured.
struct Field<'a> {
    values: &'a [f64],
    cols: i64,
    rows: i64,
    threshold: f64,
    padded: bool,
}

impl<'a> Field<'a> {
    fn new(
        values: &'a [f64],
        cols: usize,
        rows: usize,
        threshold: f64,
        padded: bool,
    ) -> Option<Self> {
        if values.len() != cols.checked_mul(rows)? {
            return None;
        }
        Some(Self {
            values,
            cols: i64::try_from(cols).ok()?,
            rows: i64::try_from(rows).ok()?,
            threshold,
            padded,
        })
    }

    /// Sample value, or `None` outside the grid.
    fn sample(&self, x: i64, y: i64) -> Option<f64> {
        if x < 0 || y < 0 || x >= self.cols || y >= self.rows {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = (y * self.cols + x) as usize;
        self.values.get(idx).copied()
    }

    fn inside(&self, x: i64, y: i64) -> bool {
        self.sample(x, y).is_some_and(|v| v > self.threshold)
    }

    /// Interpolated crossing position on `edge`, in grid coordinates.
    fn position(&self, edge: GridEdge) -> Point {
        let (bx, by) = edge.far_end();
        let t = match (self.sample(edge.x, edge.y), self.sample(bx, by)) {
            (Some(a), Some(b)) => {
                let t = (self.threshold - a) / (b - a);
                if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 }
            }
            // Against the padding the crossing sits on the grid boundary.
            _ => 0.5,
        };
        #[allow(clippy::cast_precision_loss)]
        let start = Point::new(edge.x as f64 + 0.5, edge.y as f64 + 0.5);
        #[allow(clippy::cast_precision_loss)]
        let end = Point::new(bx as f64 + 0.5, by as f64 + 0.5);
        start.lerp(end, t)
    }

    /// Directed isoline segments, one or two per cell, in row-major cell
    /// order.
    ///
    /// Walking a cell's boundary clockwise (top, right, bottom, left),
    /// an edge going from an inside corner to an outside one is an exit,
    /// the reverse an entry. Every segment runs from an entry to an
    /// exit. A crossing shared by two cells is an exit in one and an
    /// entry in the other, so segments chain up head to tail.
    fn segments(&self) -> Vec<(GridEdge, GridEdge)> {
        let (lo, x_hi, y_hi) = if self.padded {
            (-1, self.cols, self.rows)
        } else {
            (0, self.cols - 1, self.rows - 1)
        };

        let mut segments = Vec::new();
        for y in lo..y_hi {
            for x in lo..x_hi {
                let tl = self.inside(x, y);
                let tr = self.inside(x + 1, y);
                let br = self.inside(x + 1, y + 1);
                let bl = self.inside(x, y + 1);

                let sides = [
                    (GridEdge::horizontal(x, y), tl, tr),
                    (GridEdge::vertical(x + 1, y), tr, br),
                    (GridEdge::horizontal(x, y + 1), br, bl),
                    (GridEdge::vertical(x, y), bl, tl),
                ];

                let mut crossings = [(GridEdge::default(), false); 4];
                let mut count = 0;
                for (edge, from_inside, to_inside) in sides {
                    if from_inside != to_inside {
                        crossings[count] = (edge, to_inside);
                        count += 1;
                    }
                }

                match count {
                    2 => {
                        let (entry, exit) = if crossings[0].1 {
                            (crossings[0].0, crossings[1].0)
                        } else {
                            (crossings[1].0, crossings[0].0)
                        };
                        segments.push((entry, exit));
                    }
                    4 => {
                        // Saddle: entries and exits alternate around the
                        // cell. When the center is inside, the inside
                        // corners join and the contour cuts off the
                        // outside ones instead.
                        let center = [(x, y), (x + 1, y), (x + 1, y + 1), (x, y + 1)]
                            .iter()
                            .map(|&(sx, sy)| self.sample(sx, sy).unwrap_or(f64::NEG_INFINITY))
                            .sum::<f64>()
                            / 4.0;
                        let offset = if center > self.threshold { 3 } else { 1 };
                        for i in 0..4 {
                            if crossings[i].1 {
                                segments.push((crossings[i].0, crossings[(i + offset) % 4].0));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        segments
    }

    /// Chain segments into rings.
    fn trace(&self) -> Vec<Ring> {
        let segments = self.segments();
        if segments.is_empty() {
            return Vec::new();
        }

        let by_start: HashMap<GridEdge, usize> = segments
            .iter()
            .enumerate()
            .map(|(i, &(start, _))| (start, i))
            .collect();
        let ends: HashSet<GridEdge> = segments.iter().map(|&(_, end)| end).collect();
        let mut used = vec![false; segments.len()];
        let mut rings = Vec::new();

        // Open contours begin at a crossing no other segment ends on.
        for i in 0..segments.len() {
            if !used[i] && !ends.contains(&segments[i].0) {
                let points = self.follow(i, &segments, &by_start, &mut used);
                rings.push(Ring::new(Polyline::new(points), false));
            }
        }

        // Whatever remains forms cycles.
        for i in 0..segments.len() {
            if !used[i] {
                let points = self.follow(i, &segments, &by_start, &mut used);
                rings.push(Ring::new(Polyline::new(points), true));
            }
        }

        rings
    }

    fn follow(
        &self,
        start: usize,
        segments: &[(GridEdge, GridEdge)],
        by_start: &HashMap<GridEdge, usize>,
        used: &mut [bool],
    ) -> Vec<Point> {
        let mut points = vec![self.position(segments[start].0)];
        let mut current = start;
        loop {
            used[current] = true;
            let end = segments[current].1;
            points.push(self.position(end));
            match by_start.get(&end) {
                Some(&next) if !used[next] => current = next,
                _ => break,
            }
        }
        points
    }
}
