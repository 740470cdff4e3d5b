//! Detections handed to the tracker, and the raw columnar batch they are
//! built from.

use nalgebra::DMatrix;
use serde_json::Value;

use crate::geometry::representative_point;
use crate::{Error, Result};

/// A detection to be tracked.
///
/// Points are either a single `[x, y]` row or two box corners
/// `[[x1, y1], [x2, y2]]` (top-left, bottom-right).
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Detection points (n_points x 2).
    pub points: DMatrix<f64>,

    /// Optional confidence score.
    pub score: Option<f64>,

    /// Optional class label for multi-class tracking.
    pub label: Option<String>,

    /// Optional embedding vector for re-identification.
    pub embedding: Option<Vec<f64>>,

    /// Optional opaque user data. A `"boxes"` entry is read back as the
    /// bounding box column of the snapshot.
    pub data: Option<Value>,
}

impl Detection {
    /// Create a new detection with the given points.
    ///
    /// # Arguments
    /// * `points` - Detection points (n_points x 2)
    pub fn new(points: DMatrix<f64>) -> Result<Self> {
        let (rows, cols) = points.shape();
        if rows == 0 || cols != 2 {
            return Err(Error::NotNumeric(format!(
                "detection points must have shape (n_points, 2), got ({}, {})",
                rows, cols
            )));
        }

        Ok(Self {
            points,
            score: None,
            label: None,
            embedding: None,
            data: None,
        })
    }

    /// Create a detection from a flat slice of points in row-major order.
    pub fn from_slice(points: &[f64], n_points: usize, n_dims: usize) -> Result<Self> {
        if points.len() != n_points * n_dims {
            return Err(Error::NotNumeric(format!(
                "points slice length {} doesn't match {}x{}",
                points.len(),
                n_points,
                n_dims
            )));
        }

        Self::new(DMatrix::from_row_slice(n_points, n_dims, points))
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f64>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Get the number of points in this detection.
    pub fn num_points(&self) -> usize {
        self.points.nrows()
    }

    /// Get the dimensionality of points.
    pub fn num_dims(&self) -> usize {
        self.points.ncols()
    }

    /// Points flattened in row-major order (`[x, y]` or `[x1, y1, x2, y2]`).
    pub fn coords(&self) -> Vec<f64> {
        to_row_major_vec(&self.points)
    }

    /// The point itself, or the center of a box.
    pub fn representative_point(&self) -> Result<[f64; 2]> {
        representative_point(&self.coords(), 0)
    }

    /// Box corners `[x1, y1, x2, y2]` when this detection is a box.
    pub fn as_box(&self) -> Option<[f64; 4]> {
        match self.coords().as_slice() {
            &[x1, y1, x2, y2] => Some([x1, y1, x2, y2]),
            _ => None,
        }
    }
}

/// Flatten a matrix in row-major order.
pub(crate) fn to_row_major_vec(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.transpose().as_slice().to_vec()
}

/// Conversion of caller-supplied points into an `N x D` numeric matrix.
///
/// Ragged input (rows of different lengths) cannot form a matrix and is
/// rejected with [`Error::NotNumeric`].
pub trait IntoPointArray {
    fn into_point_array(self) -> Result<DMatrix<f64>>;
}

impl IntoPointArray for DMatrix<f64> {
    fn into_point_array(self) -> Result<DMatrix<f64>> {
        Ok(self)
    }
}

impl IntoPointArray for &DMatrix<f64> {
    fn into_point_array(self) -> Result<DMatrix<f64>> {
        Ok(self.clone())
    }
}

impl IntoPointArray for &[Vec<f64>] {
    fn into_point_array(self) -> Result<DMatrix<f64>> {
        let Some(first) = self.first() else {
            return Ok(DMatrix::zeros(0, 2));
        };

        let cols = first.len();
        if let Some((index, row)) = self.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(Error::NotNumeric(format!(
                "row {} has {} values but row 0 has {}",
                index,
                row.len(),
                cols
            )));
        }

        let flat: Vec<f64> = self.iter().flatten().copied().collect();
        Ok(DMatrix::from_row_slice(self.len(), cols, &flat))
    }
}

impl IntoPointArray for Vec<Vec<f64>> {
    fn into_point_array(self) -> Result<DMatrix<f64>> {
        self.as_slice().into_point_array()
    }
}

impl<const D: usize> IntoPointArray for &[[f64; D]] {
    fn into_point_array(self) -> Result<DMatrix<f64>> {
        let flat: Vec<f64> = self.iter().flatten().copied().collect();
        Ok(DMatrix::from_row_slice(self.len(), D, &flat))
    }
}

impl<const D: usize> IntoPointArray for Vec<[f64; D]> {
    fn into_point_array(self) -> Result<DMatrix<f64>> {
        self.as_slice().into_point_array()
    }
}

/// A frame's worth of raw detections in columnar form.
///
/// `points` is `N x 2` (points) or `N x 4` (boxes as `x1, y1, x2, y2`); each
/// optional column must hold exactly `N` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetections {
    points: DMatrix<f64>,
    scores: Option<Vec<f64>>,
    data: Option<Vec<Value>>,
    labels: Option<Vec<String>>,
    embeddings: Option<Vec<Vec<f64>>>,
}

impl RawDetections {
    /// Create a batch from anything convertible to a point matrix.
    pub fn new(points: impl IntoPointArray) -> Result<Self> {
        Ok(Self {
            points: points.into_point_array()?,
            scores: None,
            data: None,
            labels: None,
            embeddings: None,
        })
    }

    pub fn scores(mut self, scores: Vec<f64>) -> Self {
        self.scores = Some(scores);
        self
    }

    pub fn data(mut self, data: Vec<Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn embeddings(mut self, embeddings: Vec<Vec<f64>>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub fn points(&self) -> &DMatrix<f64> {
        &self.points
    }

    pub fn score_column(&self) -> Option<&[f64]> {
        self.scores.as_deref()
    }

    pub fn data_column(&self) -> Option<&[Value]> {
        self.data.as_deref()
    }

    pub fn label_column(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    pub fn embedding_column(&self) -> Option<&[Vec<f64>]> {
        self.embeddings.as_deref()
    }

    /// Number of detections (rows of `points`).
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every supplied column has one entry per point.
    pub fn validate(&self) -> Result<()> {
        let expected = self.len();
        let columns = [
            ("scores", self.scores.as_ref().map(Vec::len)),
            ("data", self.data.as_ref().map(Vec::len)),
            ("label", self.labels.as_ref().map(Vec::len)),
            ("embedding", self.embeddings.as_ref().map(Vec::len)),
        ];

        for (field, len) in columns {
            match len {
                Some(len) if len != expected => {
                    return Err(Error::LengthMismatch { field, len, expected });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Keep the rows whose mask entry is `true`, filtering every column in
    /// lockstep and preserving order.
    pub fn retain_rows(&self, mask: &[bool]) -> Self {
        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();

        fn pick<T: Clone>(column: &Option<Vec<T>>, keep: &[usize]) -> Option<Vec<T>> {
            column.as_ref().map(|values| keep.iter().map(|&i| values[i].clone()).collect())
        }

        Self {
            points: self.points.select_rows(keep.iter()),
            scores: pick(&self.scores, &keep),
            data: pick(&self.data, &keep),
            labels: pick(&self.labels, &keep),
            embeddings: pick(&self.embeddings, &keep),
        }
    }

    /// Build one [`Detection`] per row. Box rows are reshaped into two
    /// corners, point rows stay a single point.
    pub fn into_detections(self) -> Result<Vec<Detection>> {
        self.validate()?;

        let cols = self.points.ncols();
        let mut detections = Vec::with_capacity(self.len());

        for (i, row) in self.points.row_iter().enumerate() {
            let coords: Vec<f64> = row.iter().copied().collect();
            let points = match cols {
                2 => DMatrix::from_row_slice(1, 2, &coords),
                4 => DMatrix::from_row_slice(2, 2, &coords),
                len => return Err(Error::MalformedPoint { index: i, len }),
            };

            detections.push(Detection {
                points,
                score: self.scores.as_ref().map(|s| s[i]),
                label: self.labels.as_ref().map(|l| l[i].clone()),
                embedding: self.embeddings.as_ref().map(|e| e[i].clone()),
                data: self.data.as_ref().map(|d| d[i].clone()),
            });
        }

        Ok(detections)
    }
}
