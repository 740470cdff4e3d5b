//! Columnar snapshot of the tracker's active tracks.
//!
//! A [`Snapshot`] is rebuilt from scratch after every tracker update. The
//! previous snapshot is only consulted to derive the freshness flag: a track is
//! fresh when it is new, or when its hit counter did not drop since the last
//! snapshot (it was matched to a detection rather than carried by prediction).

use std::collections::{BTreeMap, HashMap};

use nalgebra::DMatrix;
use serde_json::{Map, Value};
use tracing::debug;

use crate::backend::TrackView;
use crate::detection::to_row_major_vec;
use crate::{Error, Result};

/// Per-track hook run during projection, after the track's row was appended.
pub type ProjectionHook<'a, T> = dyn FnMut(&T, &Snapshot, &mut RowExtras) + 'a;

/// Extra named values a [`ProjectionHook`] attaches to the current row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowExtras {
    values: BTreeMap<String, Value>,
}

impl RowExtras {
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Point-in-time projection over all active tracks, one row per track.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    ids: Vec<i32>,
    ages: Vec<i32>,
    labels: Vec<Option<String>>,
    last_det_data: Vec<Option<Value>>,
    last_det_points: Vec<Option<DMatrix<f64>>>,
    last_det_boxes: Vec<Option<[f64; 4]>>,
    estimates: Vec<DMatrix<f64>>,
    hit_counters: Vec<i32>,
    is_fresh: Vec<bool>,
    extra: BTreeMap<String, Vec<Value>>,
    distance_threshold: f64,
    input_points: DMatrix<f64>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            ages: Vec::new(),
            labels: Vec::new(),
            last_det_data: Vec::new(),
            last_det_points: Vec::new(),
            last_det_boxes: Vec::new(),
            estimates: Vec::new(),
            hit_counters: Vec::new(),
            is_fresh: Vec::new(),
            extra: BTreeMap::new(),
            distance_threshold: 0.0,
            input_points: DMatrix::zeros(0, 2),
        }
    }
}

/// Borrowed view of one snapshot row.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRow<'a> {
    pub id: i32,
    pub age: i32,
    pub label: Option<&'a str>,
    pub last_det_data: Option<&'a Value>,
    pub last_det_points: Option<&'a DMatrix<f64>>,
    pub last_det_box: Option<[f64; 4]>,
    pub estimate: &'a DMatrix<f64>,
    pub hit_counter: i32,
    pub is_fresh: bool,
}

impl Snapshot {
    /// Empty snapshot carrying the tracker's distance threshold.
    pub fn empty(distance_threshold: f64) -> Self {
        Self {
            distance_threshold,
            ..Self::default()
        }
    }

    /// Project the active tracks into a new snapshot.
    ///
    /// # Arguments
    /// * `previous` - Snapshot of the preceding step, used for freshness
    /// * `tracks` - Active tracks, in the tracker's order
    /// * `distance_threshold` - Tracker's match threshold, kept for drawing
    /// * `input_points` - Raw detection points submitted with this step
    /// * `hook` - Optional per-track hook adding extra columns
    pub fn project<'t, T, I>(
        previous: &Snapshot,
        tracks: I,
        distance_threshold: f64,
        input_points: DMatrix<f64>,
        mut hook: Option<&mut ProjectionHook<'_, T>>,
    ) -> Snapshot
    where
        T: TrackView + 't,
        I: IntoIterator<Item = &'t T>,
    {
        let previous_hits: HashMap<i32, i32> = previous
            .ids
            .iter()
            .copied()
            .zip(previous.hit_counters.iter().copied())
            .collect();

        let mut snapshot = Snapshot {
            distance_threshold,
            input_points,
            ..Snapshot::default()
        };

        for track in tracks {
            let id = track.id();
            let hit_counter = track.hit_counter();
            let is_fresh = previous_hits
                .get(&id)
                .map_or(true, |&previous_hit| hit_counter >= previous_hit);

            let detection = track.last_detection();
            let data = detection.and_then(|d| d.data.clone());
            let last_box = data
                .as_ref()
                .and_then(boxes_from_data)
                .or_else(|| detection.and_then(|d| d.as_box()));

            snapshot.ids.push(id);
            snapshot.ages.push(track.age());
            snapshot.labels.push(track.label().map(str::to_string));
            snapshot.last_det_data.push(data);
            snapshot.last_det_points.push(detection.map(|d| d.points.clone()));
            snapshot.last_det_boxes.push(last_box);
            snapshot.estimates.push(track.estimate().clone());
            snapshot.hit_counters.push(hit_counter);
            snapshot.is_fresh.push(is_fresh);

            if let Some(hook) = hook.as_deref_mut() {
                let mut extras = RowExtras::default();
                hook(track, &snapshot, &mut extras);
                snapshot.push_extras(extras);
            } else if !snapshot.extra.is_empty() {
                snapshot.push_extras(RowExtras::default());
            }
        }

        debug!(
            tracks = snapshot.len(),
            coasting = snapshot.is_fresh.iter().filter(|&&fresh| !fresh).count(),
            "projected tracker snapshot"
        );
        snapshot
    }

    // Append one row of extras, padding with nulls so every extra column
    // stays as long as the snapshot.
    fn push_extras(&mut self, extras: RowExtras) {
        let rows = self.len();
        for (column, value) in extras.values {
            self.extra
                .entry(column)
                .or_insert_with(|| vec![Value::Null; rows - 1])
                .push(value);
        }
        for values in self.extra.values_mut() {
            if values.len() < rows {
                values.push(Value::Null);
            }
        }
    }

    /// Number of active tracks.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    pub fn ages(&self) -> &[i32] {
        &self.ages
    }

    pub fn labels(&self) -> &[Option<String>] {
        &self.labels
    }

    pub fn last_det_data(&self) -> &[Option<Value>] {
        &self.last_det_data
    }

    pub fn last_det_points(&self) -> &[Option<DMatrix<f64>>] {
        &self.last_det_points
    }

    pub fn last_det_boxes(&self) -> &[Option<[f64; 4]>] {
        &self.last_det_boxes
    }

    pub fn estimates(&self) -> &[DMatrix<f64>] {
        &self.estimates
    }

    pub fn hit_counters(&self) -> &[i32] {
        &self.hit_counters
    }

    pub fn is_fresh(&self) -> &[bool] {
        &self.is_fresh
    }

    /// Extra column added by a projection hook.
    pub fn extra(&self, column: &str) -> Option<&[Value]> {
        self.extra.get(column).map(Vec::as_slice)
    }

    pub fn extra_columns(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(String::as_str)
    }

    pub fn distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    /// Raw detection points submitted with the step that produced this snapshot.
    pub fn input_points(&self) -> &DMatrix<f64> {
        &self.input_points
    }

    /// Row index of a track id.
    pub fn index_of(&self, id: i32) -> Option<usize> {
        self.ids.iter().position(|&i| i == id)
    }

    pub fn row(&self, index: usize) -> Option<SnapshotRow<'_>> {
        if index >= self.len() {
            return None;
        }

        Some(SnapshotRow {
            id: self.ids[index],
            age: self.ages[index],
            label: self.labels[index].as_deref(),
            last_det_data: self.last_det_data[index].as_ref(),
            last_det_points: self.last_det_points[index].as_ref(),
            last_det_box: self.last_det_boxes[index],
            estimate: &self.estimates[index],
            hit_counter: self.hit_counters[index],
            is_fresh: self.is_fresh[index],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = SnapshotRow<'_>> {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Ids of tracks refreshed by a detection this step.
    pub fn fresh_ids(&self) -> Vec<i32> {
        self.rows().filter(|r| r.is_fresh).map(|r| r.id).collect()
    }

    /// Ids of tracks carried forward by prediction only.
    pub fn coasting_ids(&self) -> Vec<i32> {
        self.rows().filter(|r| !r.is_fresh).map(|r| r.id).collect()
    }

    /// Whether every column has one entry per active track.
    pub fn is_consistent(&self) -> bool {
        let n = self.len();
        let fixed = [
            self.ages.len(),
            self.labels.len(),
            self.last_det_data.len(),
            self.last_det_points.len(),
            self.last_det_boxes.len(),
            self.estimates.len(),
            self.hit_counters.len(),
            self.is_fresh.len(),
        ];
        fixed
            .into_iter()
            .chain(self.extra.values().map(Vec::len))
            .all(|len| len == n)
    }

    /// Row-wise records, one JSON object per active track.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        let matrix = |m: &DMatrix<f64>| Value::from(to_row_major_vec(m));

        self.rows()
            .enumerate()
            .map(|(i, row)| {
                let mut record = Map::new();
                record.insert("id".into(), row.id.into());
                record.insert("age".into(), row.age.into());
                record.insert("label".into(), row.label.into());
                record.insert("hit_counter".into(), row.hit_counter.into());
                record.insert("is_fresh".into(), row.is_fresh.into());
                record.insert("estimate".into(), matrix(row.estimate));
                record.insert(
                    "last_det_points".into(),
                    row.last_det_points.map_or(Value::Null, matrix),
                );
                record.insert(
                    "last_det_box".into(),
                    row.last_det_box.map_or(Value::Null, |b| Value::from(b.to_vec())),
                );
                record.insert(
                    "last_det_data".into(),
                    row.last_det_data.cloned().unwrap_or(Value::Null),
                );
                for (column, values) in &self.extra {
                    record.insert(column.clone(), values[i].clone());
                }
                record
            })
            .collect()
    }
}

/// Read a bounding box from detection data: `{"boxes": [x1, y1, x2, y2]}` or
/// `{"boxes": [[x1, y1], [x2, y2]]}`.
pub fn boxes_from_data(data: &Value) -> Option<[f64; 4]> {
    let boxes = data.get("boxes")?.as_array()?;
    let flat: Vec<f64> = boxes
        .iter()
        .flat_map(|v| match v {
            Value::Array(pair) => pair.iter().map(Value::as_f64).collect::<Vec<_>>(),
            other => vec![other.as_f64()],
        })
        .collect::<Option<Vec<_>>>()?;

    match flat.as_slice() {
        &[x1, y1, x2, y2] => Some([x1, y1, x2, y2]),
        _ => None,
    }
}

/// Convert named columns into row-wise records.
///
/// `records_from_columns(&[("x", [1, 2]), ("y", [3, 4])])` yields
/// `[{"x": 1, "y": 3}, {"x": 2, "y": 4}]`.
pub fn records_from_columns(columns: &[(&str, Vec<Value>)]) -> Result<Vec<Map<String, Value>>> {
    let Some((_, first)) = columns.first() else {
        return Ok(Vec::new());
    };
    let expected = first.len();

    if let Some((name, values)) = columns.iter().find(|(_, values)| values.len() != expected) {
        return Err(Error::ColumnLengthMismatch {
            column: name.to_string(),
            len: values.len(),
            expected,
        });
    }

    Ok((0..expected)
        .map(|i| {
            columns
                .iter()
                .map(|(name, values)| (name.to_string(), values[i].clone()))
                .collect()
        })
        .collect())
}
