//! Value types flowing through the localization pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Warning;
use crate::time::TimeIndex;

/// A fixed S-Ward sensor in map pixel coordinates (origin top-left, y down).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ward {
    pub ward_id: String,
    pub x: f64,
    pub y: f64,
    /// Store zone the ward belongs to, if the metadata names one.
    #[serde(default)]
    pub zone: Option<String>,
}

impl Ward {
    pub fn new(ward_id: &str, x: f64, y: f64) -> Self {
        Self {
            ward_id: ward_id.to_string(),
            x,
            y,
            zone: None,
        }
    }

    pub fn with_zone(mut self, zone: &str) -> Self {
        self.zone = Some(zone.to_string());
        self
    }

    /// Squared pixel distance to a point.
    pub fn distance_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

/// One RSSI observation of a device by a ward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub device_id: String,
    pub ward_id: String,
    /// Received signal strength in dBm (negative).
    pub rssi: f64,
    pub timestamp: TimeIndex,
}

impl SignalReading {
    pub fn new(device_id: &str, ward_id: &str, rssi: f64, timestamp: TimeIndex) -> Self {
        Self {
            device_id: device_id.to_string(),
            ward_id: ward_id.to_string(),
            rssi,
            timestamp,
        }
    }
}

/// An estimated or smoothed device location at one timestamp.
///
/// `valid == false` marks a timestamp where no position could be computed;
/// its coordinates are meaningless and set to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePosition {
    pub device_id: String,
    pub timestamp: TimeIndex,
    pub x: f64,
    pub y: f64,
    pub valid: bool,
}

impl DevicePosition {
    pub fn located(device_id: &str, timestamp: TimeIndex, x: f64, y: f64) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp,
            x,
            y,
            valid: true,
        }
    }

    pub fn invalid(device_id: &str, timestamp: TimeIndex) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp,
            x: 0.0,
            y: 0.0,
            valid: false,
        }
    }
}

/// Time-ordered positions of one device on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub device_id: String,
    pub date: NaiveDate,
    pub positions: Vec<DevicePosition>,
}

impl Trajectory {
    pub fn new(device_id: &str, date: NaiveDate, positions: Vec<DevicePosition>) -> Self {
        Self {
            device_id: device_id.to_string(),
            date,
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn valid_positions(&self) -> impl Iterator<Item = &DevicePosition> {
        self.positions.iter().filter(|p| p.valid)
    }

    /// True when timestamps are strictly increasing (hence unique).
    pub fn is_time_ordered(&self) -> bool {
        self.positions
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    }
}

/// Map raster dimensions in pixels; valid coordinates are `[0, width-1] x [0, height-1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBounds {
    pub width: u32,
    pub height: u32,
}

impl MapBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn max_x(&self) -> f64 {
        f64::from(self.width.saturating_sub(1))
    }

    pub fn max_y(&self) -> f64 {
        f64::from(self.height.saturating_sub(1))
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.max_x()).contains(&x) && (0.0..=self.max_y()).contains(&y)
    }

    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (x.clamp(0.0, self.max_x()), y.clamp(0.0, self.max_y()))
    }
}

/// Passthrough day metadata attached to a day's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayContext {
    pub date: NaiveDate,
    pub weekday: String,
    pub holiday: bool,
    pub weather: String,
}

/// Everything loaded for one date: wards, validated readings, and load warnings.
#[derive(Debug, Clone)]
pub struct DayLoad {
    pub date: NaiveDate,
    pub context: Option<DayContext>,
    pub wards: Vec<Ward>,
    pub readings: Vec<SignalReading>,
    pub warnings: Vec<Warning>,
}

/// Device platform guessed from the MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    Ios,
    Android,
}

/// Locally-administered MAC prefixes produced by iOS address randomization.
const IOS_MAC_PREFIXES: [&str; 4] = ["02:", "06:", "0A:", "0E:"];

impl DevicePlatform {
    pub fn from_device_id(device_id: &str) -> Self {
        let upper = device_id.to_ascii_uppercase();
        if IOS_MAC_PREFIXES.iter().any(|p| upper.starts_with(p)) {
            Self::Ios
        } else {
            Self::Android
        }
    }
}

impl fmt::Display for DevicePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ios => write!(f, "iOS"),
            Self::Android => write!(f, "Android"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_mac_prefix() {
        assert_eq!(DevicePlatform::from_device_id("02:11:22:33:44:55"), DevicePlatform::Ios);
        assert_eq!(DevicePlatform::from_device_id("0a:11:22:33:44:55"), DevicePlatform::Ios);
        assert_eq!(
            DevicePlatform::from_device_id("A4:11:22:33:44:55"),
            DevicePlatform::Android
        );
    }

    #[test]
    fn test_bounds_clamp_and_contains() {
        let b = MapBounds::new(100, 50);
        assert!(b.contains(0.0, 0.0));
        assert!(b.contains(99.0, 49.0));
        assert!(!b.contains(99.5, 10.0));
        assert_eq!(b.clamp(-3.0, 70.0), (0.0, 49.0));
    }

    #[test]
    fn test_trajectory_ordering_check() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let ordered = Trajectory::new(
            "d",
            date,
            vec![
                DevicePosition::located("d", TimeIndex::new(1), 0.0, 0.0),
                DevicePosition::invalid("d", TimeIndex::new(2)),
            ],
        );
        assert!(ordered.is_time_ordered());
        assert_eq!(ordered.valid_positions().count(), 1);

        let duplicated = Trajectory::new(
            "d",
            date,
            vec![
                DevicePosition::located("d", TimeIndex::new(2), 0.0, 0.0),
                DevicePosition::located("d", TimeIndex::new(2), 1.0, 0.0),
            ],
        );
        assert!(!duplicated.is_time_ordered());
    }
}
