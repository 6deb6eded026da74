//! Overlay diagnostics: timing, counts, and other metrics for each group.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning (radii, resolution, threshold) and for comparing
//! contour extractors. [`build_with_diagnostics`] produces exactly the
//! same overlays as [`OverlayManager::build`] and collects metrics
//! alongside.
//!
//! Duration measurements use [`std::time::Duration`]. Timestamps come
//! from a caller-supplied [`Clock`] so this crate never reads the system
//! time itself.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Stage;
use crate::overlay::{GroupOverlay, OverlayFrame, OverlayManager};
use crate::types::OverlayError;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// An opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from one overlay build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayDiagnostics {
    /// One entry per group, in group order.
    pub groups: Vec<GroupDiagnostics>,
    /// Total wall-clock duration of the build (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all groups.
    pub summary: OverlaySummary,
}

/// Metrics and stage timings for a single group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDiagnostics {
    /// Group key as produced by the key function.
    pub key: String,
    /// Number of records in the group.
    pub point_count: usize,
    /// Spanning-tree edges.
    pub edge_count: usize,
    /// Energy grid columns.
    pub cols: usize,
    /// Energy grid rows.
    pub rows: usize,
    /// Highest energy of any cell.
    pub peak_energy: f64,
    /// Rings extracted at the threshold.
    pub ring_count: usize,
    /// Total vertices across all rings.
    pub vertex_count: usize,
    /// Rings that stop at the grid boundary.
    pub open_rings: usize,
    /// Rings that close on themselves.
    pub closed_rings: usize,
    /// Spanning tree stage (seconds).
    #[serde(with = "duration_serde")]
    pub mst_duration: Duration,
    /// Energy field stage (seconds).
    #[serde(with = "duration_serde")]
    pub field_duration: Duration,
    /// Contour extraction and scaling stage (seconds).
    #[serde(with = "duration_serde")]
    pub contour_duration: Duration,
}

impl GroupDiagnostics {
    /// Sum of the three stage durations.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.mst_duration + self.field_duration + self.contour_duration
    }
}

/// High-level summary counts for the whole frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySummary {
    /// Chart width in pixels.
    pub width: u32,
    /// Chart height in pixels.
    pub height: u32,
    /// Records across all groups.
    pub point_count: usize,
    /// Number of groups.
    pub group_count: usize,
    /// Rings across all groups.
    pub ring_count: usize,
    /// Ring vertices across all groups.
    pub vertex_count: usize,
}

impl OverlayDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Overlay Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Chart: {}x{} ({} points in {} groups)",
            self.summary.width, self.summary.height, self.summary.point_count, self.summary.group_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<28} {:>10} {:>10} {:>10} {:>9}  {}",
            "Group", "MST", "Field", "Contour", "% Total", "Details"
        ));
        lines.push("-".repeat(100));

        let total_ms = duration_ms(self.total_duration);
        for group in &self.groups {
            let pct = if total_ms > 0.0 {
                duration_ms(group.duration()) / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "{:<28} {:>8.3}ms {:>8.3}ms {:>8.3}ms {pct:>8.1}%  {}",
                group.key,
                duration_ms(group.mst_duration),
                duration_ms(group.field_duration),
                duration_ms(group.contour_duration),
                format_details(group),
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Rings: {}  |  Ring vertices: {}",
            self.summary.ring_count, self.summary.vertex_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format group metrics into a compact detail string.
fn format_details(group: &GroupDiagnostics) -> String {
    format!(
        "{} pts, {} edges, {}x{} grid, peak={:.2}, {} rings ({} open, {} closed), {} verts",
        group.point_count,
        group.edge_count,
        group.cols,
        group.rows,
        group.peak_energy,
        group.ring_count,
        group.open_rings,
        group.closed_rings,
        group.vertex_count,
    )
}

/// Build the overlay of `frame` like [`OverlayManager::build`], timing
/// each stage of each group with `clock`.
///
/// # Errors
///
/// Same as [`OverlayManager::build`].
pub fn build_with_diagnostics<T, C: Clock>(
    manager: &OverlayManager,
    frame: &OverlayFrame<'_, T>,
    clock: &C,
) -> Result<(Vec<GroupOverlay>, OverlayDiagnostics), OverlayError> {
    let start = clock.now();
    let config = manager.config();
    let mut timings = Vec::new();

    let overlays = manager.build_groups(frame, |points| {
        let mut stage_durations = [Duration::ZERO; 3];
        let mut t = clock.now();
        let contours = crate::contours_staged(points, frame.dimensions, config, |stage| {
            let slot = match stage {
                Stage::SpanningTree => 0,
                Stage::Field => 1,
                Stage::Contour => 2,
            };
            stage_durations[slot] = clock.elapsed(&t);
            t = clock.now();
        });
        let [mst_duration, field_duration, contour_duration] = stage_durations;
        timings.push((mst_duration, field_duration, contour_duration));
        contours
    })?;

    let groups: Vec<GroupDiagnostics> = overlays
        .iter()
        .zip(timings)
        .map(|(overlay, (mst_duration, field_duration, contour_duration))| {
            group_diagnostics(overlay, mst_duration, field_duration, contour_duration)
        })
        .collect();

    let summary = OverlaySummary {
        width: frame.dimensions.width,
        height: frame.dimensions.height,
        point_count: groups.iter().map(|g| g.point_count).sum(),
        group_count: groups.len(),
        ring_count: groups.iter().map(|g| g.ring_count).sum(),
        vertex_count: groups.iter().map(|g| g.vertex_count).sum(),
    };

    let diagnostics = OverlayDiagnostics {
        groups,
        total_duration: clock.elapsed(&start),
        summary,
    };
    Ok((overlays, diagnostics))
}

fn group_diagnostics(
    overlay: &GroupOverlay,
    mst_duration: Duration,
    field_duration: Duration,
    contour_duration: Duration,
) -> GroupDiagnostics {
    let rings = &overlay.contours.rings;
    let closed_rings = rings.iter().filter(|r| r.closed).count();
    GroupDiagnostics {
        key: overlay.key.clone(),
        point_count: overlay.points.len(),
        edge_count: overlay.contours.edges.len(),
        cols: overlay.contours.grid.cols(),
        rows: overlay.contours.grid.rows(),
        peak_energy: overlay.contours.grid.max_value(),
        ring_count: rings.len(),
        vertex_count: rings.iter().map(crate::Ring::len).sum(),
        open_rings: rings.len() - closed_rings,
        closed_rings,
        mst_duration,
        field_duration,
        contour_duration,
    }
}
