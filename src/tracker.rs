//! Caller-facing tracker: gate, update, project, draw.

use std::fmt;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use nalgebra::DMatrix;
use tracing::debug;

use crate::backend::TrackerBackend;
use crate::drawing::{DrawOptions, OverlayRenderer, OverlayStyle, Palette};
use crate::geometry::{FrameSize, GeometryGate};
use crate::region::RegionSet;
use crate::snapshot::{ProjectionHook, RowExtras, Snapshot};
use crate::{Detection, RawDetections, Result};

/// Name recorded in saved config file names.
const CONFIG_NAME: &str = "RoiTracker";

/// Wraps an external tracker with region gating, snapshots and overlays.
///
/// Every update is paired with a snapshot refresh, so the snapshot returned by
/// (and stored after) an update always reflects that update.
pub struct RoiTracker<B: TrackerBackend> {
    backend: B,
    gate: GeometryGate,
    renderer: OverlayRenderer,
    snapshot: Snapshot,
    projection_hook: Option<Box<ProjectionHook<'static, B::Track>>>,
}

impl<B: TrackerBackend> fmt::Debug for RoiTracker<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoiTracker")
            .field("config", self.backend.config())
            .field("regions", self.gate.regions())
            .field("snapshot", &self.snapshot)
            .field("projection_hook", &self.projection_hook.as_ref().map(|_| "<ProjectionHook>"))
            .finish()
    }
}

impl<B: TrackerBackend> RoiTracker<B> {
    /// Wrap `backend`, rejecting invalid construction parameters.
    pub fn new(backend: B) -> Result<Self> {
        backend.config().validate()?;
        let snapshot = Snapshot::empty(backend.distance_threshold());

        Ok(Self {
            backend,
            gate: GeometryGate::default(),
            renderer: OverlayRenderer::default(),
            snapshot,
            projection_hook: None,
        })
    }

    pub fn with_regions(mut self, regions: RegionSet) -> Self {
        self.set_regions(regions);
        self
    }

    /// Replace the regions used for gating and drawing.
    pub fn set_regions(&mut self, regions: RegionSet) {
        self.renderer.set_regions(regions.clone());
        self.gate = GeometryGate::new(regions);
    }

    pub fn with_region_colors<S: Into<String>>(mut self, colors: impl IntoIterator<Item = (S, Rgb<u8>)>) -> Self {
        self.renderer = self.renderer.with_region_colors(colors);
        self
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.renderer = self.renderer.with_style(style);
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.renderer = self.renderer.with_palette(palette);
        self
    }

    /// Hook run once per active track while the snapshot is rebuilt.
    pub fn set_projection_hook(
        &mut self,
        hook: impl FnMut(&B::Track, &Snapshot, &mut RowExtras) + 'static,
    ) {
        self.projection_hook = Some(Box::new(hook));
    }

    pub fn clear_projection_hook(&mut self) {
        self.projection_hook = None;
    }

    /// Hook run once per track after its built-in drawing.
    pub fn set_draw_hook(&mut self, hook: impl FnMut(&mut RgbImage, &Snapshot, usize) + 'static) {
        self.renderer.set_hook(hook);
    }

    /// Validate, gate and adapt raw detections, update the tracker and return
    /// the fresh snapshot.
    ///
    /// # Arguments
    /// * `frame` - The frame (or its size) the detections come from
    /// * `raw` - Points (N x 2 or N x 4) and optional per-detection columns
    /// * `period` - Frame period passed to the tracker
    ///
    /// # Errors
    /// Fails before touching the tracker when a column length disagrees with
    /// the point count or a point has neither 2 nor 4 coordinates.
    pub fn update_detections(
        &mut self,
        frame: impl Into<FrameSize>,
        raw: RawDetections,
        period: i32,
    ) -> Result<&Snapshot> {
        raw.validate()?;

        let input_points = raw.points().clone();
        let gated = self.gate.filter(frame.into(), raw)?;
        let detections = gated.into_detections()?;

        self.update(detections, input_points, period)
    }

    /// Update the tracker with ready-made detections and return the fresh
    /// snapshot. `input_points` is recorded in the snapshot as-is.
    pub fn update(
        &mut self,
        detections: Vec<Detection>,
        input_points: DMatrix<f64>,
        period: i32,
    ) -> Result<&Snapshot> {
        debug!(detections = detections.len(), period, "updating tracker");
        self.backend.update(detections, period)?;

        let next = Snapshot::project(
            &self.snapshot,
            self.backend.active_tracks(),
            self.backend.distance_threshold(),
            input_points,
            self.projection_hook.as_deref_mut(),
        );
        self.snapshot = next;

        Ok(&self.snapshot)
    }

    /// Annotated copy of `frame` for the current snapshot.
    pub fn draw(&mut self, frame: &RgbImage, opts: &DrawOptions) -> Result<RgbImage> {
        self.renderer.render(frame, &self.snapshot, opts)
    }

    /// Save the tracker's construction parameters under
    /// `dst/tracker_config/`.
    pub fn save_config(&self, dst: impl AsRef<Path>) -> Result<PathBuf> {
        self.backend.config().save(dst, CONFIG_NAME)
    }

    /// Snapshot of the last update.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn regions(&self) -> &RegionSet {
        self.gate.regions()
    }

    pub fn gate(&self) -> &GeometryGate {
        &self.gate
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut OverlayRenderer {
        &mut self.renderer
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the wrapped tracker. Changes made here are only
    /// reflected in the snapshot after the next update.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TrackView;
    use crate::{Error, TrackerConfig};

    #[derive(Debug)]
    struct EchoTrack {
        id: i32,
        detection: Detection,
    }

    impl TrackView for EchoTrack {
        fn id(&self) -> i32 {
            self.id
        }
        fn age(&self) -> i32 {
            0
        }
        fn label(&self) -> Option<&str> {
            self.detection.label.as_deref()
        }
        fn last_detection(&self) -> Option<&Detection> {
            Some(&self.detection)
        }
        fn estimate(&self) -> &DMatrix<f64> {
            &self.detection.points
        }
        fn hit_counter(&self) -> i32 {
            1
        }
    }

    /// Turns every detection of the last update into a track.
    struct EchoBackend {
        config: TrackerConfig,
        updates: usize,
        tracks: Vec<EchoTrack>,
        fail_next: bool,
    }

    impl EchoBackend {
        fn new() -> Self {
            Self {
                config: TrackerConfig::new("euclidean", 30.0),
                updates: 0,
                tracks: Vec::new(),
                fail_next: false,
            }
        }
    }

    impl TrackerBackend for EchoBackend {
        type Track = EchoTrack;

        fn update(&mut self, detections: Vec<Detection>, _period: i32) -> Result<()> {
            if std::mem::take(&mut self.fail_next) {
                return Err(Error::Backend("tracker rejected update".to_string()));
            }
            self.updates += 1;
            self.tracks = detections
                .into_iter()
                .enumerate()
                .map(|(i, detection)| EchoTrack { id: i as i32, detection })
                .collect();
            Ok(())
        }

        fn active_tracks(&self) -> Vec<&EchoTrack> {
            self.tracks.iter().collect()
        }

        fn config(&self) -> &TrackerConfig {
            &self.config
        }
    }

    fn left_half() -> RegionSet {
        RegionSet::from_named([("roi", vec![[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]])]).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut backend = EchoBackend::new();
        backend.config.initialization_delay = Some(99);
        assert!(matches!(RoiTracker::new(backend), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_length_mismatch_leaves_tracker_untouched() {
        let mut tracker = RoiTracker::new(EchoBackend::new()).unwrap();
        let raw = RawDetections::new(vec![[1.0, 1.0], [2.0, 2.0]])
            .unwrap()
            .embeddings(vec![vec![0.0]]);

        let err = tracker.update_detections(FrameSize::new(100, 100), raw, 1).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { field: "embedding", len: 1, expected: 2 }));
        assert_eq!(tracker.backend().updates, 0);
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn test_update_detections_gates_before_backend() {
        let mut tracker = RoiTracker::new(EchoBackend::new()).unwrap().with_regions(left_half());
        let raw = RawDetections::new(vec![[100.0, 100.0], [1800.0, 100.0]])
            .unwrap()
            .labels(["kept", "dropped"]);
        let snapshot = tracker.update_detections(FrameSize::new(1920, 1080), raw, 1).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.labels(), &[Some("kept".to_string())]);
        assert_eq!(snapshot.input_points().nrows(), 2);
        assert_eq!(snapshot.distance_threshold(), 30.0);
    }

    #[test]
    fn test_malformed_width_rejected_before_backend() {
        let mut tracker = RoiTracker::new(EchoBackend::new()).unwrap();
        let raw = RawDetections::new(vec![[1.0, 2.0, 3.0]]).unwrap();

        let err = tracker.update_detections(FrameSize::new(64, 64), raw, 1).unwrap_err();
        assert!(matches!(err, Error::MalformedPoint { index: 0, len: 3 }));
        assert_eq!(tracker.backend().updates, 0);
    }

    #[test]
    fn test_box_detections_reshaped_for_backend() {
        let mut tracker = RoiTracker::new(EchoBackend::new()).unwrap();
        let raw = RawDetections::new(vec![[10.0, 10.0, 30.0, 30.0]]).unwrap();
        tracker.update_detections(FrameSize::new(64, 64), raw, 1).unwrap();

        let track = &tracker.backend().tracks[0];
        assert_eq!(track.detection.points.shape(), (2, 2));
        assert_eq!(track.detection.representative_point().unwrap(), [20.0, 20.0]);
        assert_eq!(tracker.snapshot().last_det_boxes(), &[Some([10.0, 10.0, 30.0, 30.0])]);
    }

    #[test]
    fn test_projection_hook_runs_on_every_update() {
        let mut tracker = RoiTracker::new(EchoBackend::new()).unwrap();
        tracker.set_projection_hook(|track: &EchoTrack, _snapshot: &Snapshot, extras: &mut RowExtras| {
            extras.insert("x", track.detection.points[(0, 0)]);
        });

        let raw = RawDetections::new(vec![[4.0, 5.0], [6.0, 7.0]]).unwrap();
        let snapshot = tracker.update_detections(FrameSize::new(64, 64), raw, 1).unwrap();
        assert_eq!(snapshot.extra("x").unwrap(), &[serde_json::json!(4.0), serde_json::json!(6.0)]);

        let snapshot = tracker.update(Vec::new(), DMatrix::zeros(0, 2), 1).unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn test_backend_error_keeps_previous_snapshot() {
        let mut tracker = RoiTracker::new(EchoBackend::new()).unwrap();
        let raw = RawDetections::new(vec![[4.0, 5.0]]).unwrap();
        tracker.update_detections(FrameSize::new(64, 64), raw, 1).unwrap();
        let before = tracker.snapshot().clone();

        tracker.backend_mut().fail_next = true;
        let raw = RawDetections::new(vec![[4.0, 5.0], [9.0, 9.0]]).unwrap();
        let err = tracker.update_detections(FrameSize::new(64, 64), raw, 1).unwrap_err();

        assert!(matches!(err, Error::Backend(_)));
        assert_eq!(tracker.snapshot(), &before);

        let snapshot = tracker.update(Vec::new(), DMatrix::zeros(0, 2), 1).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_borrowed_backend() {
        let mut backend = EchoBackend::new();
        {
            let mut tracker = RoiTracker::new(&mut backend).unwrap();
            let raw = RawDetections::new(vec![[4.0, 5.0]]).unwrap();
            tracker.update_detections(FrameSize::new(64, 64), raw, 1).unwrap();
        }
        assert_eq!(backend.updates, 1);
        assert_eq!(backend.tracks.len(), 1);
    }

    #[test]
    fn test_save_config() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = RoiTracker::new(EchoBackend::new()).unwrap();
        let path = tracker.save_config(dir.path()).unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().contains("tracker_config"));
    }
}
