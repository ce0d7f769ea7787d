//! Loader configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use netprof_aggregate::AggregateConfig;
use netprof_core::names::DEFAULT_ENGINE_SOCKET_NAME;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};

/// Frame duration assumed when no marker pair gives one (30 Hz).
pub const DEFAULT_FRAME_DELTA: f32 = 1.0 / 30.0;

/// Tokens decoded between cancellation and progress polls.
pub const DEFAULT_POLL_INTERVAL: usize = 256;

/// Settings for loading a capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Stop decoding once this many minutes have passed since the first
    /// frame marker. `None` decodes the whole capture.
    pub max_capture_minutes: Option<f32>,
    /// Socket name whose sends count as engine traffic.
    pub engine_socket_name: String,
    /// Delta time for frames with no marker pair to measure.
    pub fallback_frame_delta: f32,
    /// Tokens between cancellation and progress polls.
    pub poll_interval: usize,
    /// Fold large aggregation ranges in parallel.
    pub parallel_aggregation: bool,
    /// Ranges shorter than this are aggregated sequentially.
    pub min_parallel_frames: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        let aggregate = AggregateConfig::default();
        Self {
            max_capture_minutes: None,
            engine_socket_name: DEFAULT_ENGINE_SOCKET_NAME.to_string(),
            fallback_frame_delta: DEFAULT_FRAME_DELTA,
            poll_interval: DEFAULT_POLL_INTERVAL,
            parallel_aggregation: aggregate.parallel,
            min_parallel_frames: aggregate.min_parallel_frames,
        }
    }
}

// Intermediate structs for the on-disk JSON layout
#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonConfig {
    loader: JsonLoader,
    aggregation: JsonAggregation,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonLoader {
    max_capture_minutes: Option<f32>,
    engine_socket_name: String,
    fallback_frame_delta: f32,
    poll_interval: usize,
}

impl Default for JsonLoader {
    fn default() -> Self {
        let defaults = LoadConfig::default();
        Self {
            max_capture_minutes: defaults.max_capture_minutes,
            engine_socket_name: defaults.engine_socket_name,
            fallback_frame_delta: defaults.fallback_frame_delta,
            poll_interval: defaults.poll_interval,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonAggregation {
    parallel: bool,
    min_parallel_frames: usize,
}

impl Default for JsonAggregation {
    fn default() -> Self {
        let defaults = AggregateConfig::default();
        Self {
            parallel: defaults.parallel,
            min_parallel_frames: defaults.min_parallel_frames,
        }
    }
}

impl LoadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits decoding to the first `minutes` of the capture.
    #[must_use]
    pub fn with_max_capture_minutes(mut self, minutes: f32) -> Self {
        self.max_capture_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn with_engine_socket_name(mut self, name: impl Into<String>) -> Self {
        self.engine_socket_name = name.into();
        self
    }

    #[must_use]
    pub fn with_fallback_frame_delta(mut self, seconds: f32) -> Self {
        self.fallback_frame_delta = seconds;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, tokens: usize) -> Self {
        self.poll_interval = tokens;
        self
    }

    #[must_use]
    pub fn with_parallel_aggregation(mut self, parallel: bool) -> Self {
        self.parallel_aggregation = parallel;
        self
    }

    #[must_use]
    pub fn with_min_parallel_frames(mut self, frames: usize) -> Self {
        self.min_parallel_frames = frames;
        self
    }

    /// Aggregation settings derived from this configuration.
    #[must_use]
    pub fn aggregate_config(&self) -> AggregateConfig {
        AggregateConfig::new()
            .with_parallel(self.parallel_aggregation)
            .with_min_parallel_frames(self.min_parallel_frames)
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the JSON is malformed,
    /// or a value is out of range.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DecodeError::Config(format!("{}: {e}", path.display())))?;
        let json_config: JsonConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| DecodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_config(json_config)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig =
            serde_json::from_str(json).map_err(|e| DecodeError::Config(e.to_string()))?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self> {
        let loaded = Self {
            max_capture_minutes: config.loader.max_capture_minutes,
            engine_socket_name: config.loader.engine_socket_name,
            fallback_frame_delta: config.loader.fallback_frame_delta,
            poll_interval: config.loader.poll_interval,
            parallel_aggregation: config.aggregation.parallel,
            min_parallel_frames: config.aggregation.min_parallel_frames,
        };
        loaded.validate()?;
        Ok(loaded)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    /// Returns [`DecodeError::Config`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        if let Some(minutes) = self.max_capture_minutes {
            if !minutes.is_finite() || minutes <= 0.0 {
                return Err(DecodeError::Config(format!(
                    "max_capture_minutes must be positive, got {minutes}"
                )));
            }
        }
        if self.engine_socket_name.is_empty() {
            return Err(DecodeError::Config(
                "engine_socket_name must not be empty".to_string(),
            ));
        }
        if !self.fallback_frame_delta.is_finite() || self.fallback_frame_delta <= 0.0 {
            return Err(DecodeError::Config(format!(
                "fallback_frame_delta must be positive, got {}",
                self.fallback_frame_delta
            )));
        }
        if self.poll_interval == 0 {
            return Err(DecodeError::Config(
                "poll_interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
