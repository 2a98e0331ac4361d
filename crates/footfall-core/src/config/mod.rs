mod defaults;

#[cfg(test)]
mod tests;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::FootfallError;
use crate::time::SLOT_SECS;
use crate::types::MapBounds;
use defaults::*;

/// Top-level footfall configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub footfall: FootfallConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub smoother: SmootherConfig,
    #[serde(default)]
    pub heatmap: HeatmapConfig,
    #[serde(default)]
    pub zones: ZonesConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootfallConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Working directory for logs and the result database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for FootfallConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Input file locations, relative to `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_root")]
    pub root: String,
    #[serde(default = "default_wards_file")]
    pub wards_file: String,
    #[serde(default = "default_signals_dir")]
    pub signals_dir: String,
    /// File name template; `{date}` is replaced by `YYYY-MM-DD`.
    #[serde(default = "default_signals_pattern")]
    pub signals_pattern: String,
    #[serde(default = "default_day_file")]
    pub day_file: String,
    #[serde(default = "default_map_image")]
    pub map_image: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: default_data_root(),
            wards_file: default_wards_file(),
            signals_dir: default_signals_dir(),
            signals_pattern: default_signals_pattern(),
            day_file: default_day_file(),
            map_image: default_map_image(),
        }
    }
}

impl DataConfig {
    fn root_path(&self) -> PathBuf {
        PathBuf::from(shellexpand(&self.root))
    }

    pub fn wards_path(&self) -> PathBuf {
        self.root_path().join(&self.wards_file)
    }

    pub fn signals_dir_path(&self) -> PathBuf {
        self.root_path().join(&self.signals_dir)
    }

    pub fn signals_file_name(&self, date: NaiveDate) -> String {
        self.signals_pattern
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
    }

    pub fn signals_path(&self, date: NaiveDate) -> PathBuf {
        self.signals_dir_path().join(self.signals_file_name(date))
    }

    pub fn day_path(&self) -> PathBuf {
        self.root_path().join(&self.day_file)
    }

    pub fn map_image_path(&self) -> PathBuf {
        self.root_path().join(&self.map_image)
    }
}

/// Map raster dimensions (pixels). The core never rescales this space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_map_width")]
    pub width: u32,
    #[serde(default = "default_map_height")]
    pub height: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_map_width(),
            height: default_map_height(),
        }
    }
}

impl MapConfig {
    pub fn bounds(&self) -> MapBounds {
        MapBounds::new(self.width, self.height)
    }
}

/// RSSI to weight transfer function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum WeightModel {
    /// `10^(rssi / scale_db)`; with `scale_db = 10` this is received power in mW.
    Power {
        #[serde(default = "default_scale_db")]
        scale_db: f64,
    },
    /// Inverse-square of the log-distance path loss distance estimate.
    PathLoss {
        #[serde(default = "default_rssi_at_1m")]
        rssi_at_1m: f64,
        #[serde(default = "default_path_loss_exponent")]
        path_loss_exponent: f64,
    },
    /// `max(rssi - floor_dbm, 0)`.
    Linear { floor_dbm: f64 },
}

impl Default for WeightModel {
    fn default() -> Self {
        Self::Power {
            scale_db: default_scale_db(),
        }
    }
}

/// Position estimation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Lowest accepted RSSI (inclusive).
    #[serde(default = "default_rssi_min")]
    pub rssi_min: f64,
    /// Upper RSSI bound (exclusive); readings must be negative.
    #[serde(default = "default_rssi_max")]
    pub rssi_max: f64,
    #[serde(default)]
    pub weight: WeightModel,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            rssi_min: default_rssi_min(),
            rssi_max: default_rssi_max(),
            weight: WeightModel::default(),
        }
    }
}

impl EstimatorConfig {
    /// Whether an RSSI value lies in the accepted domain.
    pub fn accepts_rssi(&self, rssi: f64) -> bool {
        rssi.is_finite() && rssi >= self.rssi_min && rssi < self.rssi_max
    }
}

/// What the smoother does with invalid entries and missing slots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapMode {
    /// Keep invalid entries invalid; never synthesize missing slots.
    #[default]
    Drop,
    /// Hold the last smoothed value across invalid entries and short gaps.
    CarryForward,
}

/// Trajectory smoothing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmootherConfig {
    /// EMA factor in (0, 1]; 1 disables smoothing.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub gap_policy: GapMode,
    /// Longest run of missing slots filled under `carry_forward`.
    #[serde(default = "default_max_fill_slots")]
    pub max_fill_slots: u32,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            gap_policy: GapMode::default(),
            max_fill_slots: default_max_fill_slots(),
        }
    }
}

/// How each heatmap point is weighted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMode {
    #[default]
    Count,
    /// Seconds until the device's next point, capped at `max_dwell_secs`.
    Dwell,
}

/// Heatmap aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapConfig {
    /// Cell edge in map pixels (integer downsample factor).
    #[serde(default = "default_cell_size")]
    pub cell_size: u32,
    #[serde(default)]
    pub weighting: WeightingMode,
    #[serde(default = "default_max_dwell_secs")]
    pub max_dwell_secs: u32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            weighting: WeightingMode::default(),
            max_dwell_secs: default_max_dwell_secs(),
        }
    }
}

/// Zone analytics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesConfig {
    /// A device counts as a zone visitor once it stayed at least this long.
    #[serde(default = "default_min_dwell_minutes")]
    pub min_dwell_minutes: f64,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            min_dwell_minutes: default_min_dwell_minutes(),
        }
    }
}

/// Result database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Config {
    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), FootfallError> {
        let alpha = self.smoother.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(FootfallError::Config(format!(
                "smoother.alpha must be in (0, 1], got {alpha}"
            )));
        }
        if self.map.width == 0 || self.map.height == 0 {
            return Err(FootfallError::Config(format!(
                "map dimensions must be positive, got {}x{}",
                self.map.width, self.map.height
            )));
        }
        if self.heatmap.cell_size == 0 {
            return Err(FootfallError::Config(
                "heatmap.cell_size must be at least 1".into(),
            ));
        }
        if self.heatmap.max_dwell_secs < SLOT_SECS {
            return Err(FootfallError::Config(format!(
                "heatmap.max_dwell_secs must be at least one slot ({SLOT_SECS}s)"
            )));
        }
        let min_dwell = self.zones.min_dwell_minutes;
        if !(min_dwell.is_finite() && min_dwell >= 0.0) {
            return Err(FootfallError::Config(format!(
                "zones.min_dwell_minutes must be a non-negative number, got {min_dwell}"
            )));
        }

        let est = &self.estimator;
        if !(est.rssi_min.is_finite() && est.rssi_max.is_finite())
            || est.rssi_min >= est.rssi_max
            || est.rssi_max > 0.0
        {
            return Err(FootfallError::Config(format!(
                "estimator RSSI domain [{}, {}) is invalid",
                est.rssi_min, est.rssi_max
            )));
        }
        match est.weight {
            WeightModel::Power { scale_db } if !(scale_db > 0.0) => Err(FootfallError::Config(
                format!("power weight scale_db must be positive, got {scale_db}"),
            )),
            WeightModel::PathLoss {
                path_loss_exponent, ..
            } if !(path_loss_exponent > 0.0) => Err(FootfallError::Config(format!(
                "path_loss_exponent must be positive, got {path_loss_exponent}"
            ))),
            WeightModel::Linear { floor_dbm } if !(floor_dbm <= est.rssi_min) => {
                Err(FootfallError::Config(format!(
                    "linear floor_dbm ({floor_dbm}) must not exceed rssi_min ({})",
                    est.rssi_min
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, FootfallError> {
    let path = Path::new(path);
    if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| FootfallError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| FootfallError::Config(format!("failed to parse config: {}", e)))?;

    config.validate()?;
    Ok(config)
}
