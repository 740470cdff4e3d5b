//! Overlay rendering: regions, track markers, ids and search circles.
//!
//! This module provides:
//! - `Palette` - deterministic per-id colors
//! - `OverlayRenderer` - draws a `RegionSet` and a `Snapshot` onto frame copies
//! - `primitives` - thick lines, circles, polygons, text and alpha blending

mod color;
mod renderer;
pub mod primitives;

pub use color::{Palette, BLACK, GREEN, RED, WHITE};
pub use renderer::{default_region_colors, DrawHook, DrawOptions, OverlayRenderer, OverlayStyle};
