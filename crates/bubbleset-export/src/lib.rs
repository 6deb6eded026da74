//! bubbleset-export: Pure SVG serialization for bubble set overlays (sans-IO)
//!
//! Provides [`SvgSurface`], an in-memory [`RenderSurface`] that holds
//! tagged overlay paths and plain chart elements and serializes them to
//! an SVG document string.
//!
//! [`RenderSurface`]: bubbleset_core::RenderSurface

pub mod svg;

pub use svg::{SvgMetadata, SvgSurface, build_path_data, to_svg};
