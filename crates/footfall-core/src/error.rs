use thiserror::Error;

use crate::time::TimeIndex;

/// Top-level error type for footfall.
#[derive(Debug, Error)]
pub enum FootfallError {
    /// Malformed or missing required input field. Aborts the load.
    #[error("data integrity error in {source_name} (row {row}): {message}")]
    DataIntegrity {
        source_name: String,
        /// 1-based data row, 0 for header-level problems.
        row: usize,
        message: String,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// The map raster does not match the configured coordinate space.
    #[error("map image is {actual:?} but configured map is {expected:?}")]
    MapMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Two heatmap grids with different shapes were merged.
    #[error("cannot merge heatmap grids of shape {left:?} and {right:?}")]
    GridMismatch {
        left: (usize, usize, u32),
        right: (usize, usize, u32),
    },

    /// Result store error.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FootfallError {
    /// Shorthand for a [`FootfallError::DataIntegrity`] error.
    pub fn integrity(source_name: &str, row: usize, message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            source_name: source_name.to_string(),
            row,
            message: message.into(),
        }
    }
}

/// Pipeline stage that observed an out-of-bounds point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsStage {
    /// Estimated position was clamped into the map.
    Estimation,
    /// Point fell outside the heatmap grid and was discarded.
    Aggregation,
}

/// Non-fatal, per-point degradation reported alongside a stage's result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    /// A reading referenced a ward that is not in the ward set; the reading was dropped.
    #[error("reading for device {device_id} at {timestamp} references unknown ward {ward_id}")]
    UnknownWard {
        device_id: String,
        ward_id: String,
        timestamp: TimeIndex,
    },

    /// All readings at this timestamp carried zero total weight.
    #[error("insufficient signal for device {device_id} at {timestamp}")]
    InsufficientSignal {
        device_id: String,
        timestamp: TimeIndex,
    },

    /// A point landed outside the map or grid.
    #[error("{stage:?} point ({x:.1}, {y:.1}) for device {device_id} at {timestamp} is out of bounds")]
    OutOfBounds {
        stage: BoundsStage,
        device_id: String,
        timestamp: TimeIndex,
        x: f64,
        y: f64,
    },
}

impl Warning {
    /// Short label used when summarizing warnings by class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownWard { .. } => "unknown_ward",
            Self::InsufficientSignal { .. } => "insufficient_signal",
            Self::OutOfBounds {
                stage: BoundsStage::Estimation,
                ..
            } => "clamped_estimate",
            Self::OutOfBounds {
                stage: BoundsStage::Aggregation,
                ..
            } => "discarded_point",
        }
    }
}

/// Count warnings per [`Warning::kind`], sorted by kind.
pub fn summarize_warnings(warnings: &[Warning]) -> Vec<(&'static str, usize)> {
    let mut counts = std::collections::BTreeMap::new();
    for w in warnings {
        *counts.entry(w.kind()).or_insert(0usize) += 1;
    }
    counts.into_iter().collect()
}
