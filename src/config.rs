//! Tracker construction parameters and their persistence.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

/// Directory (under the chosen destination) that receives saved configs.
pub const CONFIG_DIR: &str = "tracker_config";

/// Timestamp format used in saved config file names.
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y-%H%M%S";

/// Construction parameters of the external tracker.
///
/// Functions and factories are recorded by name; the document is only written,
/// never read back to build a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Name of the distance function used for matching.
    pub distance_function: String,

    /// Maximum distance threshold for valid matches.
    pub distance_threshold: f64,

    /// Maximum hit counter value (frames to keep object alive without detections).
    pub hit_counter_max: i32,

    /// Frames before an object becomes "initialized"; `None` means
    /// `hit_counter_max / 2`.
    pub initialization_delay: Option<i32>,

    /// Maximum hit counter for individual points.
    pub pointwise_hit_counter_max: i32,

    /// Minimum score for a detection point to be considered.
    pub detection_threshold: f64,

    /// Name of the filter factory.
    pub filter_factory: String,

    /// Number of past detections to store for re-identification.
    pub past_detections_length: usize,

    /// Optional distance function name for re-identification.
    pub reid_distance_function: Option<String>,

    /// Distance threshold for re-identification.
    pub reid_distance_threshold: f64,

    /// Maximum hit counter for re-identification phase.
    pub reid_hit_counter_max: Option<i32>,
}

impl TrackerConfig {
    /// Create a configuration with norfair's defaults.
    ///
    /// # Arguments
    /// * `distance_function` - Name of the distance function for matching
    /// * `distance_threshold` - Maximum match distance
    pub fn new(distance_function: impl Into<String>, distance_threshold: f64) -> Self {
        Self {
            distance_function: distance_function.into(),
            distance_threshold,
            hit_counter_max: 15,
            initialization_delay: None,
            pointwise_hit_counter_max: 4,
            detection_threshold: 0.0,
            filter_factory: "OptimizedKalmanFilterFactory".to_string(),
            past_detections_length: 4,
            reid_distance_function: None,
            reid_distance_threshold: 0.0,
            reid_hit_counter_max: None,
        }
    }

    /// Initialization delay after applying the `hit_counter_max / 2` default.
    pub fn effective_initialization_delay(&self) -> i32 {
        self.initialization_delay.unwrap_or(self.hit_counter_max / 2)
    }

    /// Reject parameter combinations the tracker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "distance_threshold must be positive and finite, got {}",
                self.distance_threshold
            )));
        }

        if self.hit_counter_max <= 0 {
            return Err(Error::InvalidConfig(
                "hit_counter_max must be positive".to_string(),
            ));
        }

        let delay = self.effective_initialization_delay();
        if delay < 0 {
            return Err(Error::InvalidConfig(
                "initialization_delay must be non-negative".to_string(),
            ));
        }

        if delay >= self.hit_counter_max {
            return Err(Error::InvalidConfig(
                "initialization_delay must be less than hit_counter_max".to_string(),
            ));
        }

        if self.pointwise_hit_counter_max <= 0 {
            return Err(Error::InvalidConfig(
                "pointwise_hit_counter_max must be positive".to_string(),
            ));
        }

        if matches!(self.reid_hit_counter_max, Some(max) if max < 0) {
            return Err(Error::InvalidConfig(
                "reid_hit_counter_max must be non-negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Write this configuration as pretty JSON to
    /// `dst/tracker_config/<name> <timestamp>.json` and return the path.
    pub fn save(&self, dst: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
        let stamp = Local::now().format(TIMESTAMP_FORMAT);
        let path = dst
            .as_ref()
            .join(CONFIG_DIR)
            .join(format!("{} {}.json", name, stamp));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(fs::File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;

        info!(path = %path.display(), "saved tracker config");
        Ok(path)
    }
}
