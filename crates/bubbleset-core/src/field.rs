//! Energy field: a scalar grid whose high values mark the territory of a
//! group.
//!
//! Every point deposits a linear (tent) falloff of height 1 and radius
//! `point_radius`. Every spanning-tree edge is sampled at steps of one
//! grid cell and each sample deposits a thinner falloff of radius
//! `edge_radius`, so the field stays connected along the tree. Deposits
//! are purely additive: overlapping contributions may push cells above
//! 1.0, which only matters relative to the contour threshold.
//!
//! Cells outside a deposit's radius receive exactly zero, so each
//! deposit only visits the window of cells its radius can reach. The
//! result is identical to scanning the whole grid per deposit.

use image::GrayImage;

use crate::types::{Dimensions, Edge, OverlayConfig, OverlayError, Point};

/// Grid size `(cols, rows)` covering `dimensions` with square cells of
/// `resolution` pixels (partial cells at the far edges count).
#[must_use]
pub fn grid_size(dimensions: Dimensions, resolution: f64) -> (usize, usize) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cells = |extent: u32| (f64::from(extent) / resolution).ceil().max(0.0) as usize;
    (cells(dimensions.width), cells(dimensions.height))
}

/// Grid size for `dimensions`, checked against `config.max_grid_cells`.
///
/// # Errors
///
/// Returns [`OverlayError::GridTooLarge`] when `cols * rows` exceeds the
/// configured budget.
pub fn checked_grid_size(
    dimensions: Dimensions,
    config: &OverlayConfig,
) -> Result<(usize, usize), OverlayError> {
    let (cols, rows) = grid_size(dimensions, config.grid_resolution);
    match cols.checked_mul(rows) {
        Some(cells) if cells <= config.max_grid_cells => Ok((cols, rows)),
        _ => Err(OverlayError::GridTooLarge {
            cols,
            rows,
            max_cells: config.max_grid_cells,
        }),
    }
}

/// A row-major grid of energy values.
///
/// Cell `(col, row)` covers the pixels from `(col * R, row * R)` to
/// `((col + 1) * R, (row + 1) * R)` and is sampled at its center.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGrid {
    cols: usize,
    rows: usize,
    resolution: f64,
    values: Vec<f64>,
}

impl EnergyGrid {
    /// An all-zero grid covering `dimensions`. Callers check the size
    /// with [`checked_grid_size`] first.
    #[must_use]
    pub(crate) fn new(dimensions: Dimensions, resolution: f64) -> Self {
        let (cols, rows) = grid_size(dimensions, resolution);
        Self::with_size(cols, rows, resolution)
    }

    /// An all-zero grid of explicit size.
    #[must_use]
    pub(crate) fn with_size(cols: usize, rows: usize, resolution: f64) -> Self {
        Self {
            cols,
            rows,
            resolution,
            values: vec![0.0; cols * rows],
        }
    }

    /// Build a grid from existing row-major values.
    ///
    /// Returns `None` if `values.len() != cols * rows`.
    #[must_use]
    pub fn from_values(cols: usize, rows: usize, resolution: f64, values: Vec<f64>) -> Option<Self> {
        (Some(values.len()) == cols.checked_mul(rows)).then_some(Self {
            cols,
            rows,
            resolution,
            values,
        })
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Cell size in pixels.
    #[must_use]
    pub const fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Row-major cell values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `(col, row)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col < self.cols && row < self.rows {
            Some(self.values[row * self.cols + col])
        } else {
            None
        }
    }

    /// Pixel position of the center of cell `(col, row)`.
    #[must_use]
    pub fn cell_center(&self, col: usize, row: usize) -> Point {
        #[allow(clippy::cast_precision_loss)]
        let (c, r) = (col as f64, row as f64);
        let half = self.resolution / 2.0;
        Point::new(
            c.mul_add(self.resolution, half),
            r.mul_add(self.resolution, half),
        )
    }

    /// Largest value in the grid (0.0 for an empty grid).
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Add a tent falloff of height 1 centred on `center`.
    ///
    /// Each cell whose center lies strictly within `radius` gains
    /// `(radius - dist) / radius`.
    pub fn deposit(&mut self, center: Point, radius: f64) {
        let (col_lo, col_hi) = self.window(center.x, radius, self.cols);
        let (row_lo, row_hi) = self.window(center.y, radius, self.rows);

        for row in row_lo..row_hi {
            for col in col_lo..col_hi {
                let dist = self.cell_center(col, row).distance(center);
                if dist < radius {
                    self.values[row * self.cols + col] += (radius - dist) / radius;
                }
            }
        }
    }

    /// Deposit falloffs along `edge`, sampled every grid cell.
    ///
    /// The edge is split into `ceil(length / R)` steps and a deposit is
    /// made at both endpoints and every step between. A zero-length edge
    /// deposits nothing (its endpoint already carries a point deposit).
    /// Returns the number of deposits made.
    pub fn deposit_edge(&mut self, edge: &Edge, radius: f64) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = (edge.length() / self.resolution).ceil().max(0.0) as usize;
        if steps == 0 {
            return 0;
        }
        #[allow(clippy::cast_precision_loss)]
        let step_count = steps as f64;
        for i in 0..=steps {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 / step_count;
            self.deposit(edge.p.lerp(edge.q, t), radius);
        }
        steps + 1
    }

    /// Normalize the grid to an 8-bit grayscale heatmap, one pixel per
    /// cell, with the peak value mapped to white.
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        let peak = self.max_value();
        let width = u32::try_from(self.cols).unwrap_or(0);
        let height = u32::try_from(self.rows).unwrap_or(0);
        GrayImage::from_fn(width, height, |x, y| {
            let value = self.values[y as usize * self.cols + x as usize];
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let level = if peak > 0.0 {
                (value / peak * 255.0).round().clamp(0.0, 255.0) as u8
            } else {
                0
            };
            image::Luma([level])
        })
    }

    /// Half-open index range of cells along one axis whose centers may
    /// lie within `radius` of `coord`.
    fn window(&self, coord: f64, radius: f64, len: usize) -> (usize, usize) {
        #[allow(clippy::cast_precision_loss)]
        let len_f = len as f64;
        let lo = ((coord - radius) / self.resolution - 1.0).floor().clamp(0.0, len_f);
        let hi = ((coord + radius) / self.resolution + 1.0).ceil().clamp(0.0, len_f);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bounds = (lo as usize, hi as usize);
        if bounds.0 < bounds.1 { bounds } else { (0, 0) }
    }
}

/// Build the energy field of one group.
///
/// `edges` are the group's spanning-tree edges from
/// [`minimum_spanning_tree`](crate::mst::minimum_spanning_tree).
///
/// # Errors
///
/// Returns [`OverlayError::GridTooLarge`] if the grid for `dimensions`
/// exceeds `config.max_grid_cells`.
pub fn build_energy_field(
    points: &[Point],
    edges: &[Edge],
    dimensions: Dimensions,
    config: &OverlayConfig,
) -> Result<EnergyGrid, OverlayError> {
    checked_grid_size(dimensions, config)?;
    Ok(energy_field_unchecked(points, edges, dimensions, config))
}

/// [`build_energy_field`] for a size already checked.
pub(crate) fn energy_field_unchecked(
    points: &[Point],
    edges: &[Edge],
    dimensions: Dimensions,
    config: &OverlayConfig,
) -> EnergyGrid {
    let mut grid = EnergyGrid::new(dimensions, config.grid_resolution);

    for &point in points {
        grid.deposit(point, config.point_radius);
    }

    let samples: usize = edges
        .iter()
        .map(|edge| grid.deposit_edge(edge, config.edge_radius))
        .sum();
    tracing::trace!(
        points = points.len(),
        edges = edges.len(),
        edge_samples = samples,
        "energy field deposited"
    );

    grid
}
