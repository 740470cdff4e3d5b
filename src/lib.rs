//! # norfair-roi - Region gating and overlays around a norfair tracker
//!
//! A thin layer around a norfair-style multi-object tracker. The tracker itself
//! (filtering, matching, track lifecycle) stays external and is reached through
//! the [`TrackerBackend`] trait; this crate adds:
//!
//! - Region-of-interest gating of detections before they reach the tracker
//! - A columnar [`Snapshot`] of active tracks after every update, flagging
//!   tracks refreshed by a detection versus coasting on prediction
//! - Overlay rendering of regions, ids, points, boxes and search circles
//! - Persistence of the tracker's construction parameters
//!
//! ## Example
//!
//! ```rust,ignore
//! use norfair_roi::{RawDetections, Region, RegionKind, RegionSet, RoiTracker};
//!
//! let regions = RegionSet::from_regions([Region::new(
//!     "roi_left",
//!     RegionKind::Inclusion,
//!     vec![[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]],
//! )?]);
//!
//! let mut tracker = RoiTracker::new(my_backend)?.with_regions(regions);
//! let raw = RawDetections::new(vec![[100.0, 100.0], [1800.0, 100.0]])?;
//! let snapshot = tracker.update_detections(&frame, raw, 1)?;
//! let annotated = tracker.draw(&frame, &Default::default())?;
//! ```

// Public modules
pub mod backend;
pub mod config;
pub mod detection;
pub mod drawing;
pub mod geometry;
pub mod region;
pub mod snapshot;
pub mod tracker;

// Re-exports for convenience
pub use backend::{TrackView, TrackerBackend};
pub use config::TrackerConfig;
pub use detection::{Detection, IntoPointArray, RawDetections};
pub use drawing::{DrawOptions, OverlayRenderer, OverlayStyle, Palette};
pub use geometry::{FrameSize, GeometryGate};
pub use region::{Region, RegionKind, RegionSet};
pub use snapshot::{RowExtras, Snapshot, SnapshotRow};
pub use tracker::RoiTracker;

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur while gating, projecting or drawing.
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("points must be convertible to a numeric array: {0}")]
        NotNumeric(String),

        #[error("Length mismatch: {field} has length {len} but points has length {expected}")]
        LengthMismatch {
            field: &'static str,
            len: usize,
            expected: usize,
        },

        #[error("All columns must have the same length: {column} has {len}, expected {expected}")]
        ColumnLengthMismatch {
            column: String,
            len: usize,
            expected: usize,
        },

        #[error("Unexpected point format at index {index}: expected 2 or 4 coordinates, got {len}")]
        MalformedPoint { index: usize, len: usize },

        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid region {name:?}: {reason}")]
        InvalidRegion { name: String, reason: String },

        /// Raised by [`TrackerBackend`](crate::TrackerBackend) implementations
        /// when the wrapped tracker rejects an update.
        #[error("Tracker backend error: {0}")]
        Backend(String),

        #[error("Serialization error: {0}")]
        Serialization(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for norfair-roi operations
    pub type Result<T> = std::result::Result<T, Error>;
}
