//! Gating and projection benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::DMatrix;

use norfair_roi::{
    Detection, FrameSize, GeometryGate, RawDetections, RegionSet, Snapshot, TrackView,
};

struct BenchTrack {
    id: i32,
    hit_counter: i32,
    detection: Detection,
}

impl TrackView for BenchTrack {
    fn id(&self) -> i32 {
        self.id
    }
    fn age(&self) -> i32 {
        0
    }
    fn label(&self) -> Option<&str> {
        None
    }
    fn last_detection(&self) -> Option<&Detection> {
        Some(&self.detection)
    }
    fn estimate(&self) -> &DMatrix<f64> {
        &self.detection.points
    }
    fn hit_counter(&self) -> i32 {
        self.hit_counter
    }
}

/// Boxes spread over a 1920x1080 frame.
fn create_test_boxes(n: usize) -> Vec<[f64; 4]> {
    (0..n)
        .map(|i| {
            let x = (i * 37 % 1870) as f64;
            let y = (i * 53 % 1030) as f64;
            [x, y, x + 50.0, y + 50.0]
        })
        .collect()
}

fn create_test_regions() -> RegionSet {
    RegionSet::from_named([
        ("roi_left", vec![[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]]),
        ("roi_star", vec![[0.7, 0.1], [0.75, 0.4], [0.95, 0.45], [0.75, 0.5], [0.7, 0.9], [0.65, 0.5]]),
        ("roni_center", vec![[0.4, 0.4], [0.6, 0.4], [0.6, 0.6], [0.4, 0.6]]),
    ])
    .expect("valid regions")
}

fn benchmark_gate_filter(c: &mut Criterion, n: usize) {
    let gate = GeometryGate::new(create_test_regions());
    let frame = FrameSize::new(1920, 1080);
    let raw = RawDetections::new(create_test_boxes(n)).expect("valid boxes");

    c.bench_function(&format!("gate_filter_{}_boxes", n), |b| {
        b.iter(|| gate.filter(frame, black_box(raw.clone())).expect("gated"))
    });
}

fn benchmark_gate_filter_100(c: &mut Criterion) {
    benchmark_gate_filter(c, 100);
}

fn benchmark_gate_filter_1000(c: &mut Criterion) {
    benchmark_gate_filter(c, 1000);
}

fn benchmark_snapshot_projection_100_tracks(c: &mut Criterion) {
    let tracks: Vec<BenchTrack> = create_test_boxes(100)
        .into_iter()
        .enumerate()
        .map(|(i, b)| BenchTrack {
            id: i as i32,
            hit_counter: (i % 15) as i32,
            detection: Detection::from_slice(&b, 2, 2).expect("valid detection"),
        })
        .collect();
    let previous = Snapshot::project(&Snapshot::empty(50.0), &tracks, 50.0, DMatrix::zeros(0, 2), None);

    c.bench_function("snapshot_projection_100_tracks", |b| {
        b.iter(|| {
            Snapshot::project(
                black_box(&previous),
                &tracks,
                50.0,
                DMatrix::zeros(0, 2),
                None,
            )
        })
    });
}

criterion_group!(
    benches,
    benchmark_gate_filter_100,
    benchmark_gate_filter_1000,
    benchmark_snapshot_projection_100_tracks,
);
criterion_main!(benches);
