//! # footfall-locate
//!
//! Localization pipeline for footfall. Converts S-Ward RSSI readings into
//! weighted-centroid position estimates, smooths each device's trajectory with
//! an exponential moving average, and aggregates trajectories into heatmap
//! grids and zone traffic. Devices are processed in parallel; each device's
//! timeline is processed strictly in order.

pub mod estimator;
pub mod flow;
pub mod heatmap;
pub mod smoother;
pub mod weight;
pub mod zones;

use chrono::NaiveDate;
use footfall_core::config::{Config, ZonesConfig};
use footfall_core::error::{summarize_warnings, FootfallError, Warning};
use footfall_core::time::TimeWindow;
use footfall_core::types::{DayContext, DayLoad, DevicePlatform, Trajectory};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use estimator::{group_by_device, index_wards, PositionEstimator};
use flow::{SlotCount, ZoneDwell, ZoneOccupancy, ZoneTransition, ZoneVisitors};
use heatmap::{HeatmapGrid, HeatmapStats, TrajectoryAggregator};
use smoother::TrajectorySmoother;
use zones::{zone_tracks, zone_traffic, ZoneMap, ZoneTraffic};

/// Heatmap restricted to one named time window.
#[derive(Debug, Clone)]
pub struct WindowHeatmap {
    pub window: TimeWindow,
    pub grid: HeatmapGrid,
}

/// Everything produced for one processed day.
#[derive(Debug, Clone)]
pub struct DayReport {
    pub date: NaiveDate,
    pub context: Option<DayContext>,
    /// Raw weighted-centroid estimates, one trajectory per device.
    pub estimates: Vec<Trajectory>,
    /// Smoothed trajectories, same device order as `estimates`.
    pub trajectories: Vec<Trajectory>,
    /// Whole-day heatmap.
    pub heatmap: HeatmapGrid,
    pub windows: Vec<WindowHeatmap>,
    pub zones: Vec<ZoneTraffic>,
    /// Devices with a valid position per slot.
    pub occupancy: Vec<SlotCount>,
    pub zone_occupancy: Vec<ZoneOccupancy>,
    pub zone_dwell: Vec<ZoneDwell>,
    pub zone_visitors: Vec<ZoneVisitors>,
    pub transitions: Vec<ZoneTransition>,
    pub platforms: BTreeMap<DevicePlatform, usize>,
    /// Load, estimation, and aggregation warnings, in that order.
    pub warnings: Vec<Warning>,
}

/// Serializable digest of a [`DayReport`].
#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub context: Option<DayContext>,
    pub devices: usize,
    pub positions: usize,
    pub valid_positions: usize,
    pub platforms: BTreeMap<DevicePlatform, usize>,
    pub heatmap: HeatmapStats,
    pub windows: BTreeMap<String, HeatmapStats>,
    pub zones: Vec<ZoneTraffic>,
    pub peak_occupancy: Option<SlotCount>,
    pub zone_visitors: Vec<ZoneVisitors>,
    pub transitions: Vec<ZoneTransition>,
    pub warnings: BTreeMap<String, usize>,
}

impl DayReport {
    pub fn window(&self, window: TimeWindow) -> Option<&HeatmapGrid> {
        self.windows
            .iter()
            .find(|w| w.window == window)
            .map(|w| &w.grid)
    }

    pub fn summary(&self) -> DaySummary {
        DaySummary {
            date: self.date,
            context: self.context.clone(),
            devices: self.trajectories.len(),
            positions: self.trajectories.iter().map(Trajectory::len).sum(),
            valid_positions: self
                .trajectories
                .iter()
                .map(|t| t.valid_positions().count())
                .sum(),
            platforms: self.platforms.clone(),
            heatmap: self.heatmap.stats(),
            windows: self
                .windows
                .iter()
                .map(|w| (w.window.to_string(), w.grid.stats()))
                .collect(),
            zones: self.zones.clone(),
            peak_occupancy: flow::peak(&self.occupancy),
            zone_visitors: self.zone_visitors.clone(),
            transitions: self.transitions.clone(),
            warnings: summarize_warnings(&self.warnings)
                .into_iter()
                .map(|(k, n)| (k.to_string(), n))
                .collect(),
        }
    }
}

/// Day pipeline: estimation, smoothing, aggregation.
pub struct LocateEngine {
    estimator: PositionEstimator,
    smoother: TrajectorySmoother,
    aggregator: TrajectoryAggregator,
    min_dwell_minutes: f64,
}

impl LocateEngine {
    pub fn new(
        estimator: PositionEstimator,
        smoother: TrajectorySmoother,
        aggregator: TrajectoryAggregator,
    ) -> Self {
        Self {
            estimator,
            smoother,
            aggregator,
            min_dwell_minutes: ZonesConfig::default().min_dwell_minutes,
        }
    }

    /// Minimum zone dwell for a device to count as a qualified visitor.
    pub fn with_min_dwell(mut self, minutes: f64) -> Self {
        self.min_dwell_minutes = minutes;
        self
    }

    /// Build every stage from configuration.
    pub fn from_config(config: &Config) -> Result<Self, FootfallError> {
        config.validate()?;
        Ok(Self::new(
            PositionEstimator::from_config(config),
            TrajectorySmoother::from_config(&config.smoother)?,
            TrajectoryAggregator::from_config(config),
        )
        .with_min_dwell(config.zones.min_dwell_minutes))
    }

    /// Process one loaded day.
    pub fn process_day(&self, day: &DayLoad) -> DayReport {
        let wards = index_wards(&day.wards);

        let per_device: Vec<(Trajectory, Trajectory, Vec<Warning>)> =
            group_by_device(&day.readings)
                .into_par_iter()
                .map(|(device_id, readings)| {
                    let (raw, warnings) =
                        self.estimator
                            .estimate_device(device_id, day.date, &readings, &wards);
                    let smoothed = self.smoother.smooth(&raw);
                    (raw, smoothed, warnings)
                })
                .collect();

        let mut warnings = day.warnings.clone();
        let mut estimates = Vec::with_capacity(per_device.len());
        let mut trajectories = Vec::with_capacity(per_device.len());
        for (raw, smoothed, w) in per_device {
            estimates.push(raw);
            trajectories.push(smoothed);
            warnings.extend(w);
        }

        let (heatmap, agg_warnings) = self.aggregator.aggregate(&trajectories);
        warnings.extend(agg_warnings);
        // Window grids are subsets of the whole-day grid; their discards are
        // already reported above.
        let windows = TimeWindow::ALL
            .iter()
            .map(|&window| WindowHeatmap {
                window,
                grid: self.aggregator.aggregate_window(&trajectories, window).0,
            })
            .collect();

        let zone_map = ZoneMap::from_wards(&day.wards);
        let tracks = zone_tracks(&trajectories, &zone_map);
        let zones = zone_traffic(&tracks, &zone_map);
        let zone_dwell = flow::zone_dwell(&tracks);
        let zone_visitors = flow::zone_visitors(&zone_dwell, &zone_map, self.min_dwell_minutes);
        let zone_occupancy = flow::zone_occupancy(&tracks, &zone_map);
        let transitions = flow::zone_transitions(&tracks);
        let occupancy = flow::occupancy(&trajectories);

        let mut platforms = BTreeMap::new();
        for t in &trajectories {
            *platforms
                .entry(DevicePlatform::from_device_id(&t.device_id))
                .or_insert(0) += 1;
        }

        for w in &warnings {
            debug!("{w}");
        }
        for (kind, count) in summarize_warnings(&warnings) {
            warn!("{}: {count} {kind} warning(s)", day.date);
        }
        info!(
            "{}: processed {} readings into {} trajectories",
            day.date,
            day.readings.len(),
            trajectories.len()
        );

        DayReport {
            date: day.date,
            context: day.context.clone(),
            estimates,
            trajectories,
            heatmap,
            windows,
            zones,
            occupancy,
            zone_occupancy,
            zone_dwell,
            zone_visitors,
            transitions,
            platforms,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use footfall_core::config::{GapMode, WeightModel};
    use footfall_core::time::TimeIndex;
    use footfall_core::types::{SignalReading, Ward};

    fn day(readings: Vec<SignalReading>) -> DayLoad {
        DayLoad {
            date: NaiveDate::from_ymd_opt(2025, 10, 4).unwrap(),
            context: None,
            wards: vec![
                Ward::new("A", 0.0, 0.0).with_zone("Entrance"),
                Ward::new("B", 100.0, 0.0).with_zone("Entrance"),
                Ward::new("C", 300.0, 300.0).with_zone("Checkout"),
            ],
            readings,
            warnings: Vec::new(),
        }
    }

    fn morning(offset: u32) -> TimeIndex {
        TimeIndex::new(TimeWindow::Morning.bounds().0.get() + offset)
    }

    #[test]
    fn test_process_day_end_to_end() {
        let readings = vec![
            SignalReading::new("02:aa:bb:cc:dd:ee", "A", -40.0, morning(1)),
            SignalReading::new("02:aa:bb:cc:dd:ee", "B", -70.0, morning(1)),
            SignalReading::new("02:aa:bb:cc:dd:ee", "C", -45.0, morning(2)),
            SignalReading::new("a4:00:00:00:00:01", "C", -50.0, morning(1)),
        ];
        let engine = LocateEngine::from_config(&Config::default()).unwrap();
        let report = engine.process_day(&day(readings));

        assert_eq!(report.trajectories.len(), 2);
        assert_eq!(report.estimates.len(), 2);
        assert!(report.warnings.is_empty());
        for t in &report.trajectories {
            assert!(t.is_time_ordered());
        }
        assert_eq!(report.heatmap.stats().total, 3);
        assert_eq!(
            report.window(TimeWindow::Morning).map(|g| g.stats().total),
            Some(3)
        );
        assert_eq!(
            report.window(TimeWindow::Evening).map(|g| g.stats().total),
            Some(0)
        );
        assert_eq!(report.platforms.get(&DevicePlatform::Ios), Some(&1));
        assert_eq!(report.platforms.get(&DevicePlatform::Android), Some(&1));

        let summary = report.summary();
        assert_eq!(summary.devices, 2);
        assert_eq!(summary.valid_positions, 3);
        let entrance = summary.zones.iter().find(|z| z.zone == "Entrance").unwrap();
        assert_eq!(entrance.devices, 1);
        assert_eq!(
            summary.peak_occupancy,
            Some(SlotCount {
                timestamp: morning(1),
                devices: 2
            })
        );
        assert_eq!(report.zone_occupancy.len(), 2);
        assert_eq!(summary.zone_visitors.len(), 2);
        // Both of the iOS device's samples stay near the entrance wards.
        assert!(summary.transitions.is_empty());
    }

    #[test]
    fn test_insufficient_signal_carries_through_report() {
        let mut config = Config::default();
        config.estimator.weight = WeightModel::Linear { floor_dbm: -127.0 };
        config.smoother.gap_policy = GapMode::Drop;
        let engine = LocateEngine::from_config(&config).unwrap();
        let readings = vec![
            SignalReading::new("dev", "A", -60.0, morning(1)),
            SignalReading::new("dev", "A", -127.0, morning(2)),
        ];
        let report = engine.process_day(&day(readings));
        let t = &report.trajectories[0];
        assert_eq!(t.len(), 2);
        assert!(!t.positions[1].valid);
        assert_eq!(report.summary().warnings.get("insufficient_signal"), Some(&1));
    }

    #[test]
    fn test_device_order_does_not_change_heatmap() {
        let mut readings = vec![
            SignalReading::new("x", "A", -50.0, morning(3)),
            SignalReading::new("y", "B", -55.0, morning(3)),
            SignalReading::new("z", "C", -60.0, morning(4)),
            SignalReading::new("x", "C", -70.0, morning(5)),
        ];
        let engine = LocateEngine::from_config(&Config::default()).unwrap();
        let forward = engine.process_day(&day(readings.clone()));
        readings.reverse();
        let backward = engine.process_day(&day(readings));
        assert_eq!(forward.heatmap, backward.heatmap);
    }

    #[test]
    fn test_from_config_rejects_invalid_alpha() {
        let mut config = Config::default();
        config.smoother.alpha = 0.0;
        assert!(LocateEngine::from_config(&config).is_err());
    }

    #[test]
    fn test_zone_flow_in_report() {
        let readings = vec![
            SignalReading::new("dev", "A", -40.0, morning(1)),
            SignalReading::new("dev", "C", -40.0, morning(10)),
            SignalReading::new("dev", "C", -40.0, morning(20)),
        ];
        let mut config = Config::default();
        config.smoother.alpha = 1.0;
        config.zones.min_dwell_minutes = 0.0;
        let engine = LocateEngine::from_config(&config).unwrap();
        let report = engine.process_day(&day(readings));

        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].from, "Entrance");
        assert_eq!(report.transitions[0].to, "Checkout");

        let checkout = report
            .zone_dwell
            .iter()
            .find(|d| d.zone == "Checkout")
            .unwrap();
        assert_eq!((checkout.first_seen, checkout.last_seen), (morning(10), morning(20)));
        let visitors: Vec<usize> = report.zone_visitors.iter().map(|v| v.qualified).collect();
        assert_eq!(visitors, vec![1, 1]);
    }
}
