//! Contract with the external tracker.
//!
//! The tracker owns filtering, matching and track lifecycle. This crate only
//! feeds it detections and reads back its active tracks, so both sides are
//! expressed as traits and the tracker is held by composition.

use nalgebra::DMatrix;

use crate::{Detection, Result, TrackerConfig};

/// Read-only view of one track maintained by the external tracker.
pub trait TrackView {
    /// Permanent instance id.
    fn id(&self) -> i32;

    /// Frames since first detection.
    fn age(&self) -> i32;

    /// Class label, for multi-class tracking.
    fn label(&self) -> Option<&str>;

    /// Most recent matched detection.
    fn last_detection(&self) -> Option<&Detection>;

    /// Current state estimate (position), 1x2 for points or 2x2 for boxes.
    fn estimate(&self) -> &DMatrix<f64>;

    /// Remaining frames before the track is considered dead. Grows on
    /// matched detections and decays otherwise.
    fn hit_counter(&self) -> i32;
}

/// An external multi-object tracker.
pub trait TrackerBackend {
    type Track: TrackView;

    /// Advance the tracker by one step with this frame's detections.
    fn update(&mut self, detections: Vec<Detection>, period: i32) -> Result<()>;

    /// Tracks that are currently active (initialized and alive).
    fn active_tracks(&self) -> Vec<&Self::Track>;

    /// Parameters the tracker was constructed with.
    fn config(&self) -> &TrackerConfig;

    /// Maximum match distance, also the radius of the search neighborhood
    /// drawn around coasting tracks.
    fn distance_threshold(&self) -> f64 {
        self.config().distance_threshold
    }
}

impl<B: TrackerBackend + ?Sized> TrackerBackend for &mut B {
    type Track = B::Track;

    fn update(&mut self, detections: Vec<Detection>, period: i32) -> Result<()> {
        (**self).update(detections, period)
    }

    fn active_tracks(&self) -> Vec<&Self::Track> {
        (**self).active_tracks()
    }

    fn config(&self) -> &TrackerConfig {
        (**self).config()
    }

    fn distance_threshold(&self) -> f64 {
        (**self).distance_threshold()
    }
}
