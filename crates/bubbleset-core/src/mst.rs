//! Euclidean minimum spanning tree over the members of one group.
//!
//! The tree's edges are later rasterized into the energy field so that
//! spatially separated members of a group end up inside one contour.
//!
//! # Algorithm
//!
//! Prim's algorithm on the complete graph, weighted by squared Euclidean
//! distance (only the ordering of weights matters, so the square root is
//! skipped). Each step scans every `(visited, unvisited)` pair and takes
//! the globally cheapest one. That is O(n^2) per step, which is fine for
//! the tens of points a group holds per frame.
//!
//! # Determinism
//!
//! The tree starts at the first input point. Ties are broken by scan
//! order: visited points in the order they joined the tree, unvisited
//! points in input order, and only a strictly smaller weight replaces the
//! current best. Identical input therefore always yields an identical
//! edge sequence, which tests rely on.

use crate::types::{Edge, Point};

/// Index pairs `(tree_member, newcomer)` of the spanning tree, in the
/// order Prim's algorithm selects them.
///
/// Returns `max(0, n - 1)` pairs. Duplicate coordinates are allowed and
/// simply produce zero-weight pairs.
#[must_use]
pub fn spanning_tree_indices(points: &[Point]) -> Vec<(usize, usize)> {
    let n = points.len();
    if n <= 1 {
        return Vec::new();
    }

    let mut visited: Vec<usize> = Vec::with_capacity(n);
    visited.push(0);
    let mut unvisited: Vec<usize> = (1..n).collect();
    let mut pairs = Vec::with_capacity(n - 1);

    while !unvisited.is_empty() {
        let mut best: Option<(f64, usize, usize)> = None;

        for &vi in &visited {
            for (slot, &ui) in unvisited.iter().enumerate() {
                let weight = points[vi].distance_squared(points[ui]);
                if best.is_none_or(|(best_weight, _, _)| weight < best_weight) {
                    best = Some((weight, vi, slot));
                }
            }
        }

        // Both sets are non-empty here, so `best` is always set.
        let (_, from, slot) = best.unwrap_or((f64::NAN, visited[0], 0));
        let to = unvisited.remove(slot);
        visited.push(to);
        pairs.push((from, to));
    }

    pairs
}

/// Edges of the Euclidean minimum spanning tree over `points`.
///
/// Each [`Edge`] has the tree-side endpoint as `p` and the newly added
/// endpoint as `q`. A group of zero or one points needs no bridging and
/// yields no edges.
#[must_use]
pub fn minimum_spanning_tree(points: &[Point]) -> Vec<Edge> {
    spanning_tree_indices(points)
        .into_iter()
        .map(|(from, to)| Edge {
            p: points[from],
            q: points[to],
        })
        .collect()
}
