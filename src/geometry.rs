//! Region-of-interest gating of detections.
//!
//! Detections are reduced to a representative point (the point itself, or the
//! center of a box) and kept only when that point lies strictly inside at least
//! one inclusion region scaled to the frame's pixel size.

use image::GenericImageView;
use tracing::debug;

use crate::detection::{to_row_major_vec, RawDetections};
use crate::region::RegionSet;
use crate::{Error, Result};

/// Pixel dimensions of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Largest of width and height.
    pub fn max_dim(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl<I: GenericImageView> From<&I> for FrameSize {
    fn from(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }
}

/// Representative point of a detection given as 2 (point) or 4 (box corners)
/// coordinates. `index` is only used to report malformed input.
pub fn representative_point(coords: &[f64], index: usize) -> Result<[f64; 2]> {
    match *coords {
        [x, y] => Ok([x, y]),
        [x1, y1, x2, y2] => Ok([(x2 - x1) / 2.0 + x1, (y2 - y1) / 2.0 + y1]),
        _ => Err(Error::MalformedPoint { index, len: coords.len() }),
    }
}

/// Strict point-in-polygon test (even-odd rule). Points on an edge or vertex
/// are outside. The polygon may be given open or closed.
pub fn point_in_polygon(point: [f64; 2], polygon: &[[f64; 2]]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let [px, py] = point;
    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let [xi, yi] = polygon[i];
        let [xj, yj] = polygon[j];

        if on_segment(point, polygon[j], polygon[i]) {
            return false;
        }

        if (yi > py) != (yj > py) {
            let x_cross = (xj - xi) * (py - yi) / (yj - yi) + xi;
            if px < x_cross {
                inside = !inside;
            }
        }

        j = i;
    }

    inside
}

fn on_segment(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> bool {
    let cross = (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]);
    let scale = (b[0] - a[0]).abs().max((b[1] - a[1]).abs()).max(1.0);
    if cross.abs() > f64::EPSILON * scale * 16.0 {
        return false;
    }

    p[0] >= a[0].min(b[0]) && p[0] <= a[0].max(b[0]) && p[1] >= a[1].min(b[1]) && p[1] <= a[1].max(b[1])
}

/// Close a polygon by repeating its first vertex if needed.
pub fn close_polygon(mut polygon: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    if let (Some(&first), Some(&last)) = (polygon.first(), polygon.last()) {
        if first != last {
            polygon.push(first);
        }
    }
    polygon
}

/// Filters detections against the inclusion regions of a [`RegionSet`].
#[derive(Debug, Clone, Default)]
pub struct GeometryGate {
    regions: RegionSet,
}

impl GeometryGate {
    pub fn new(regions: RegionSet) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    /// Whether the gate filters anything at all.
    pub fn is_active(&self) -> bool {
        self.regions.has_inclusion()
    }

    /// Inclusion polygons scaled to pixels and closed.
    fn pixel_polygons(&self, frame: FrameSize) -> Vec<Vec<[f64; 2]>> {
        let (w, h) = (frame.width as f64, frame.height as f64);
        self.regions
            .inclusion()
            .map(|region| close_polygon(region.to_pixels(w, h)))
            .collect()
    }

    /// One keep/drop decision per detection row (rows of 2 or 4 coordinates).
    pub fn keep_mask(&self, frame: FrameSize, points: &[Vec<f64>]) -> Result<Vec<bool>> {
        if !self.is_active() {
            return Ok(vec![true; points.len()]);
        }

        let polygons = self.pixel_polygons(frame);
        points
            .iter()
            .enumerate()
            .map(|(i, coords)| {
                let center = representative_point(coords, i)?;
                Ok(polygons.iter().any(|polygon| point_in_polygon(center, polygon)))
            })
            .collect()
    }

    /// Gate a batch of raw detections. Returns the batch unchanged when no
    /// inclusion region is configured.
    pub fn filter(&self, frame: FrameSize, batch: RawDetections) -> Result<RawDetections> {
        if !self.is_active() {
            return Ok(batch);
        }

        let rows: Vec<Vec<f64>> = batch
            .points()
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect();
        let mask = self.keep_mask(frame, &rows)?;
        let kept = batch.retain_rows(&mask);

        debug!(
            total = batch.len(),
            kept = kept.len(),
            "gated detections against inclusion regions"
        );
        Ok(kept)
    }

    /// Whether a single detection matrix (1x2 point or 2x2 box) passes the gate.
    pub fn contains(&self, frame: FrameSize, points: &nalgebra::DMatrix<f64>) -> Result<bool> {
        let mask = self.keep_mask(frame, &[to_row_major_vec(points)])?;
        Ok(mask[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{Region, RegionKind};
    use proptest::prelude::*;

    fn left_half() -> RegionSet {
        RegionSet::from_regions([Region::new(
            "roi",
            RegionKind::Inclusion,
            vec![[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]],
        )
        .unwrap()])
    }

    const HD: FrameSize = FrameSize { width: 1920, height: 1080 };

    #[test]
    fn test_representative_point() {
        assert_eq!(representative_point(&[3.0, 4.0], 0).unwrap(), [3.0, 4.0]);
        assert_eq!(representative_point(&[10.0, 10.0, 30.0, 30.0], 0).unwrap(), [20.0, 20.0]);
        assert!(matches!(
            representative_point(&[1.0, 2.0, 3.0], 7),
            Err(Error::MalformedPoint { index: 7, len: 3 })
        ));
    }

    #[test]
    fn test_point_in_polygon_strict() {
        let square = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        assert!(point_in_polygon([5.0, 5.0], &square));
        assert!(!point_in_polygon([15.0, 5.0], &square));
        assert!(!point_in_polygon([10.0, 5.0], &square));
        assert!(!point_in_polygon([0.0, 0.0], &square));
        assert!(point_in_polygon([5.0, 5.0], &close_polygon(square.to_vec())));
    }

    #[test]
    fn test_point_in_concave_polygon() {
        // U shape opening upwards
        let u = [[0.0, 0.0], [9.0, 0.0], [9.0, 9.0], [6.0, 9.0], [6.0, 3.0], [3.0, 3.0], [3.0, 9.0], [0.0, 9.0]];
        assert!(point_in_polygon([1.0, 6.0], &u));
        assert!(!point_in_polygon([4.5, 6.0], &u));
        assert!(point_in_polygon([4.5, 1.0], &u));
    }

    #[test]
    fn test_gate_left_half_scenario() {
        let gate = GeometryGate::new(left_half());
        let raw = RawDetections::new(vec![[100.0, 100.0], [1800.0, 100.0]]).unwrap();

        let kept = gate.filter(HD, raw).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.points()[(0, 0)], 100.0);
    }

    #[test]
    fn test_gate_uses_box_center() {
        let gate = GeometryGate::new(left_half());
        // box straddles the boundary, center at x = 950 (inside)
        let raw = RawDetections::new(vec![[900.0, 10.0, 1000.0, 30.0], [940.0, 10.0, 1100.0, 30.0]]).unwrap();

        let kept = gate.filter(HD, raw).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.points()[(0, 0)], 900.0);
    }

    #[test]
    fn test_gate_ignores_exclusion_regions() {
        let regions = RegionSet::from_named([("roni", vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]])]).unwrap();
        let gate = GeometryGate::new(regions);
        assert!(!gate.is_active());

        let raw = RawDetections::new(vec![[5000.0, 5000.0]]).unwrap();
        assert_eq!(gate.filter(HD, raw.clone()).unwrap(), raw);
    }

    #[test]
    fn test_gate_any_inclusion_region() {
        let regions = RegionSet::from_named([
            ("roi_left", vec![[0.0, 0.0], [0.1, 0.0], [0.1, 1.0], [0.0, 1.0]]),
            ("roi_right", vec![[0.9, 0.0], [1.0, 0.0], [1.0, 1.0], [0.9, 1.0]]),
        ])
        .unwrap();
        let gate = GeometryGate::new(regions);

        let mask = gate
            .keep_mask(HD, &[vec![50.0, 500.0], vec![960.0, 500.0], vec![1900.0, 500.0]])
            .unwrap();
        assert_eq!(mask, vec![true, false, true]);
    }

    #[test]
    fn test_gate_contains_single_detection() {
        let gate = GeometryGate::new(left_half());
        let hd = FrameSize::new(1920, 1080);

        let point = nalgebra::DMatrix::from_row_slice(1, 2, &[100.0, 100.0]);
        let far_box = nalgebra::DMatrix::from_row_slice(2, 2, &[1700.0, 10.0, 1900.0, 50.0]);
        assert!(gate.contains(hd, &point).unwrap());
        assert!(!gate.contains(hd, &far_box).unwrap());

        let open = GeometryGate::default();
        assert!(open.contains(hd, &far_box).unwrap());
    }

    #[test]
    fn test_gate_reports_malformed_index() {
        let gate = GeometryGate::new(left_half());
        let err = gate.keep_mask(HD, &[vec![1.0, 1.0], vec![1.0, 1.0, 1.0]]).unwrap_err();
        assert!(matches!(err, Error::MalformedPoint { index: 1, len: 3 }));
    }

    proptest! {
        #[test]
        fn prop_gate_without_regions_is_identity(
            rows in prop::collection::vec(prop::array::uniform2(-1e4f64..1e4), 0..32),
            w in 1u32..4096,
            h in 1u32..4096,
        ) {
            let raw = RawDetections::new(rows.clone()).unwrap();
            let gate = GeometryGate::default();
            prop_assert_eq!(gate.filter(FrameSize::new(w, h), raw.clone()).unwrap(), raw);
        }

        #[test]
        fn prop_gate_keeps_inside_drops_outside(x in 0.0f64..1920.0, y in 1.0f64..1079.0) {
            prop_assume!((x - 960.0).abs() > 1e-6 && x > 1e-6);
            let gate = GeometryGate::new(left_half());
            let mask = gate.keep_mask(HD, &[vec![x, y]]).unwrap();
            prop_assert_eq!(mask[0], x < 960.0);
        }
    }
}
