//! Weighted-centroid position estimation.
//!
//! Readings are bucketed per device, then per timestamp in chronological
//! order. Each bucket becomes exactly one [`DevicePosition`]: the
//! weight-averaged position of the contributing wards, or an invalid entry
//! when the bucket carries no usable weight.

use chrono::NaiveDate;
use footfall_core::config::Config;
use footfall_core::error::{BoundsStage, Warning};
use footfall_core::time::TimeIndex;
use footfall_core::types::{DevicePosition, MapBounds, SignalReading, Trajectory, Ward};
use std::collections::{BTreeMap, HashMap};

use crate::weight::WeightFunction;

/// Ward lookup by id.
pub type WardIndex<'a> = HashMap<&'a str, &'a Ward>;

pub fn index_wards(wards: &[Ward]) -> WardIndex<'_> {
    wards.iter().map(|w| (w.ward_id.as_str(), w)).collect()
}

/// Bucket readings by device id (sorted), keeping input order inside each bucket.
pub fn group_by_device(readings: &[SignalReading]) -> Vec<(&str, Vec<&SignalReading>)> {
    let mut groups: BTreeMap<&str, Vec<&SignalReading>> = BTreeMap::new();
    for r in readings {
        groups.entry(r.device_id.as_str()).or_default().push(r);
    }
    groups.into_iter().collect()
}

/// Weighted average of `(x, y, weight)` points.
///
/// Returns `None` when the total weight is zero or not finite. A single
/// positive-weight point is returned as-is so its coordinates survive exactly.
pub fn weighted_centroid(points: &[(f64, f64, f64)]) -> Option<(f64, f64)> {
    if let [(x, y, w)] = points {
        return (*w > 0.0 && w.is_finite()).then_some((*x, *y));
    }

    let (mut sx, mut sy, mut total) = (0.0, 0.0, 0.0);
    for &(x, y, w) in points {
        sx += w * x;
        sy += w * y;
        total += w;
    }
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }
    Some((sx / total, sy / total))
}

/// Converts one device's readings into a raw (unsmoothed) trajectory.
pub struct PositionEstimator {
    weight: Box<dyn WeightFunction>,
    bounds: MapBounds,
}

impl PositionEstimator {
    pub fn new(weight: Box<dyn WeightFunction>, bounds: MapBounds) -> Self {
        Self { weight, bounds }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Box::new(config.estimator.weight.clone()),
            config.map.bounds(),
        )
    }

    /// Estimate one position per distinct timestamp of `device_id`.
    ///
    /// Readings belonging to other devices are ignored. Unknown wards are
    /// skipped with a warning; a timestamp left without weight is emitted
    /// as invalid; an estimate outside the map is clamped.
    pub fn estimate_device(
        &self,
        device_id: &str,
        date: NaiveDate,
        readings: &[&SignalReading],
        wards: &WardIndex<'_>,
    ) -> (Trajectory, Vec<Warning>) {
        let mut warnings = Vec::new();

        let mut by_time: BTreeMap<TimeIndex, Vec<&SignalReading>> = BTreeMap::new();
        for r in readings.iter().filter(|r| r.device_id == device_id) {
            by_time.entry(r.timestamp).or_default().push(r);
        }

        let mut positions = Vec::with_capacity(by_time.len());
        for (timestamp, group) in by_time {
            let mut points = Vec::with_capacity(group.len());
            for r in group {
                match wards.get(r.ward_id.as_str()) {
                    Some(ward) => points.push((ward.x, ward.y, self.weight.weight(r.rssi))),
                    None => warnings.push(Warning::UnknownWard {
                        device_id: device_id.to_string(),
                        ward_id: r.ward_id.clone(),
                        timestamp,
                    }),
                }
            }

            let Some((x, y)) = weighted_centroid(&points) else {
                warnings.push(Warning::InsufficientSignal {
                    device_id: device_id.to_string(),
                    timestamp,
                });
                positions.push(DevicePosition::invalid(device_id, timestamp));
                continue;
            };

            let (cx, cy) = if self.bounds.contains(x, y) {
                (x, y)
            } else {
                warnings.push(Warning::OutOfBounds {
                    stage: BoundsStage::Estimation,
                    device_id: device_id.to_string(),
                    timestamp,
                    x,
                    y,
                });
                self.bounds.clamp(x, y)
            };
            positions.push(DevicePosition::located(device_id, timestamp, cx, cy));
        }

        (Trajectory::new(device_id, date, positions), warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::WeightFn;
    use footfall_core::config::WeightModel;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
    }

    fn estimator() -> PositionEstimator {
        PositionEstimator::new(
            Box::new(WeightModel::Power { scale_db: 10.0 }),
            MapBounds::new(696, 509),
        )
    }

    fn wards() -> Vec<Ward> {
        vec![
            Ward::new("A", 0.0, 0.0),
            Ward::new("B", 100.0, 0.0),
            Ward::new("C", 50.0, 80.0),
        ]
    }

    #[test]
    fn test_stronger_ward_pulls_centroid() {
        let wards = wards();
        let index = index_wards(&wards);
        let t = TimeIndex::new(100);
        let readings = [
            SignalReading::new("dev", "A", -40.0, t),
            SignalReading::new("dev", "B", -70.0, t),
        ];
        let refs: Vec<&SignalReading> = readings.iter().collect();
        let (traj, warnings) = estimator().estimate_device("dev", date(), &refs, &index);

        assert!(warnings.is_empty());
        assert_eq!(traj.len(), 1);
        let p = &traj.positions[0];
        assert!(p.valid);
        assert!(p.x > 0.0 && p.x < 50.0, "x = {}", p.x);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_single_reading_lands_on_ward_exactly() {
        let wards = vec![Ward::new("W", 123.456, 78.9)];
        let index = index_wards(&wards);
        for rssi in [-30.0, -77.7, -120.0] {
            let r = SignalReading::new("dev", "W", rssi, TimeIndex::new(5));
            let (traj, _) = estimator().estimate_device("dev", date(), &[&r], &index);
            let p = &traj.positions[0];
            assert_eq!((p.x, p.y), (123.456, 78.9));
        }
    }

    #[test]
    fn test_centroid_invariant_under_weight_scaling() {
        let base = [(0.0, 0.0, 0.2), (100.0, 10.0, 0.5), (40.0, 90.0, 0.3)];
        let (x0, y0) = weighted_centroid(&base).unwrap();
        for k in [1e-6, 3.0, 1e6] {
            let scaled: Vec<_> = base.iter().map(|&(x, y, w)| (x, y, w * k)).collect();
            let (x, y) = weighted_centroid(&scaled).unwrap();
            assert!((x - x0).abs() < 1e-9 && (y - y0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_weight_marks_invalid_and_keeps_length() {
        let wards = wards();
        let index = index_wards(&wards);
        let est = PositionEstimator::new(
            Box::new(WeightModel::Linear { floor_dbm: -100.0 }),
            MapBounds::new(696, 509),
        );
        let readings = [
            SignalReading::new("dev", "A", -60.0, TimeIndex::new(1)),
            SignalReading::new("dev", "A", -100.0, TimeIndex::new(2)),
            SignalReading::new("dev", "B", -100.0, TimeIndex::new(2)),
            SignalReading::new("dev", "C", -50.0, TimeIndex::new(3)),
        ];
        let refs: Vec<&SignalReading> = readings.iter().collect();
        let (traj, warnings) = est.estimate_device("dev", date(), &refs, &index);

        assert_eq!(traj.len(), 3);
        assert!(traj.positions[0].valid);
        assert!(!traj.positions[1].valid);
        assert!(traj.positions[2].valid);
        assert_eq!(
            warnings,
            vec![Warning::InsufficientSignal {
                device_id: "dev".into(),
                timestamp: TimeIndex::new(2),
            }]
        );
    }

    #[test]
    fn test_out_of_map_estimate_is_clamped_with_warning() {
        let wards = vec![Ward::new("far", 900.0, -20.0)];
        let index = index_wards(&wards);
        let r = SignalReading::new("dev", "far", -50.0, TimeIndex::new(9));
        let (traj, warnings) = estimator().estimate_device("dev", date(), &[&r], &index);

        let p = &traj.positions[0];
        assert!(p.valid);
        assert_eq!((p.x, p.y), (695.0, 0.0));
        assert!(matches!(
            warnings.as_slice(),
            [Warning::OutOfBounds {
                stage: BoundsStage::Estimation,
                ..
            }]
        ));
    }

    #[test]
    fn test_unknown_ward_is_skipped() {
        let wards = wards();
        let index = index_wards(&wards);
        let t = TimeIndex::new(4);
        let readings = [
            SignalReading::new("dev", "ghost", -30.0, t),
            SignalReading::new("dev", "C", -60.0, t),
        ];
        let refs: Vec<&SignalReading> = readings.iter().collect();
        let (traj, warnings) = estimator().estimate_device("dev", date(), &refs, &index);
        assert_eq!((traj.positions[0].x, traj.positions[0].y), (50.0, 80.0));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind(), "unknown_ward");
    }

    #[test]
    fn test_output_is_chronological_and_unique() {
        let wards = wards();
        let readings = vec![
            SignalReading::new("b", "A", -50.0, TimeIndex::new(30)),
            SignalReading::new("a", "B", -50.0, TimeIndex::new(20)),
            SignalReading::new("b", "C", -50.0, TimeIndex::new(10)),
            SignalReading::new("b", "A", -60.0, TimeIndex::new(30)),
            SignalReading::new("a", "C", -50.0, TimeIndex::new(5)),
        ];
        let index = index_wards(&wards);
        let est = estimator();
        let mut trajs = Vec::new();
        for (device_id, group) in group_by_device(&readings) {
            let (t, warnings) = est.estimate_device(device_id, date(), &group, &index);
            assert!(warnings.is_empty());
            trajs.push(t);
        }

        let ids: Vec<&str> = trajs.iter().map(|t| t.device_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        for t in &trajs {
            assert!(t.is_time_ordered());
        }
        assert_eq!(trajs[1].len(), 2, "two readings at t=30 form one entry");
    }

    #[test]
    fn test_custom_weight_function_is_used() {
        let wards = wards();
        let index = index_wards(&wards);
        // Equal weights regardless of RSSI: plain centroid.
        let est = PositionEstimator::new(Box::new(WeightFn(|_| 1.0)), MapBounds::new(696, 509));
        let t = TimeIndex::new(1);
        let readings = [
            SignalReading::new("dev", "A", -40.0, t),
            SignalReading::new("dev", "B", -90.0, t),
        ];
        let refs: Vec<&SignalReading> = readings.iter().collect();
        let (traj, _) = est.estimate_device("dev", date(), &refs, &index);
        assert_eq!(traj.positions[0].x, 50.0);
    }
}
