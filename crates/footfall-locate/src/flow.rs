//! Time-resolved traffic: devices present per slot, per-zone occupancy,
//! zone dwell, and zone-to-zone transitions.

use footfall_core::time::{TimeIndex, SLOT_SECS};
use footfall_core::types::Trajectory;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::zones::{ZoneMap, ZoneTrack};

/// Devices with a valid position in one time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCount {
    pub timestamp: TimeIndex,
    pub devices: usize,
}

/// Occupancy series of one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneOccupancy {
    pub zone: String,
    pub series: Vec<SlotCount>,
}

/// Span of one device's presence in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDwell {
    pub zone: String,
    pub device_id: String,
    pub first_seen: TimeIndex,
    pub last_seen: TimeIndex,
    pub samples: usize,
}

impl ZoneDwell {
    /// `last_seen - first_seen`, in minutes.
    pub fn minutes(&self) -> f64 {
        f64::from(self.first_seen.slots_until(self.last_seen) * SLOT_SECS) / 60.0
    }
}

/// Qualified visitors of one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneVisitors {
    pub zone: String,
    /// Distinct devices seen in the zone at all.
    pub devices: usize,
    /// Devices whose dwell reached the minimum.
    pub qualified: usize,
    /// Mean dwell of qualified devices; 0 when there are none.
    pub avg_dwell_minutes: f64,
}

/// Count of consecutive samples where a device moved from one zone to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneTransition {
    pub from: String,
    pub to: String,
    pub count: usize,
}

fn to_series(counts: BTreeMap<TimeIndex, usize>) -> Vec<SlotCount> {
    counts
        .into_iter()
        .map(|(timestamp, devices)| SlotCount { timestamp, devices })
        .collect()
}

/// Devices with a valid position per slot, in time order. Slots without any
/// device are absent.
pub fn occupancy(trajectories: &[Trajectory]) -> Vec<SlotCount> {
    let mut counts: BTreeMap<TimeIndex, usize> = BTreeMap::new();
    for t in trajectories {
        for p in t.valid_positions() {
            *counts.entry(p.timestamp).or_insert(0) += 1;
        }
    }
    to_series(counts)
}

/// Busiest slot; the earliest one wins ties.
pub fn peak(series: &[SlotCount]) -> Option<SlotCount> {
    series
        .iter()
        .copied()
        .reduce(|best, s| if s.devices > best.devices { s } else { best })
}

/// Devices per slot in each zone. Every zone is listed, empty ones with an
/// empty series.
pub fn zone_occupancy(tracks: &[ZoneTrack<'_>], zones: &ZoneMap) -> Vec<ZoneOccupancy> {
    let mut acc: BTreeMap<&str, BTreeMap<TimeIndex, usize>> =
        zones.zone_names().map(|z| (z, BTreeMap::new())).collect();
    for track in tracks {
        for &(t, zone) in &track.visits {
            if let Some(series) = acc.get_mut(zone) {
                *series.entry(t).or_insert(0) += 1;
            }
        }
    }
    acc.into_iter()
        .map(|(zone, counts)| ZoneOccupancy {
            zone: zone.to_string(),
            series: to_series(counts),
        })
        .collect()
}

/// First and last sighting of every device in every zone it visited,
/// ordered by zone then device.
pub fn zone_dwell(tracks: &[ZoneTrack<'_>]) -> Vec<ZoneDwell> {
    let mut spans: BTreeMap<(&str, &str), (TimeIndex, TimeIndex, usize)> = BTreeMap::new();
    for track in tracks {
        for &(t, zone) in &track.visits {
            spans
                .entry((zone, track.device_id))
                .and_modify(|(first, last, n)| {
                    *first = (*first).min(t);
                    *last = (*last).max(t);
                    *n += 1;
                })
                .or_insert((t, t, 1));
        }
    }
    spans
        .into_iter()
        .map(|((zone, device_id), (first_seen, last_seen, samples))| ZoneDwell {
            zone: zone.to_string(),
            device_id: device_id.to_string(),
            first_seen,
            last_seen,
            samples,
        })
        .collect()
}

/// Devices per zone whose dwell is at least `min_dwell_minutes`, with their
/// mean dwell.
pub fn zone_visitors(
    dwell: &[ZoneDwell],
    zones: &ZoneMap,
    min_dwell_minutes: f64,
) -> Vec<ZoneVisitors> {
    let mut acc: BTreeMap<&str, (usize, Vec<f64>)> =
        zones.zone_names().map(|z| (z, (0, Vec::new()))).collect();
    for d in dwell {
        if let Some((devices, qualified)) = acc.get_mut(d.zone.as_str()) {
            *devices += 1;
            let minutes = d.minutes();
            if minutes >= min_dwell_minutes {
                qualified.push(minutes);
            }
        }
    }
    acc.into_iter()
        .map(|(zone, (devices, qualified))| {
            let avg_dwell_minutes = if qualified.is_empty() {
                0.0
            } else {
                qualified.iter().sum::<f64>() / qualified.len() as f64
            };
            ZoneVisitors {
                zone: zone.to_string(),
                devices,
                qualified: qualified.len(),
                avg_dwell_minutes,
            }
        })
        .collect()
}

/// Zone changes between consecutive zoned samples of each device. Staying in
/// the same zone is not a transition. Sorted by count, busiest first.
pub fn zone_transitions(tracks: &[ZoneTrack<'_>]) -> Vec<ZoneTransition> {
    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for track in tracks {
        for pair in track.visits.windows(2) {
            let (from, to) = (pair[0].1, pair[1].1);
            if from != to {
                *counts.entry((from, to)).or_insert(0) += 1;
            }
        }
    }
    let mut out: Vec<ZoneTransition> = counts
        .into_iter()
        .map(|((from, to), count)| ZoneTransition {
            from: from.to_string(),
            to: to.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.from.cmp(&b.from))
            .then_with(|| a.to.cmp(&b.to))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::zone_tracks;
    use chrono::NaiveDate;
    use footfall_core::types::{DevicePosition, Ward};

    // Entrance at x=0, Bakery at x=100, Checkout at x=200.
    fn zones() -> ZoneMap {
        ZoneMap::from_wards(&[
            Ward::new("e", 0.0, 0.0).with_zone("Entrance"),
            Ward::new("b", 100.0, 0.0).with_zone("Bakery"),
            Ward::new("c", 200.0, 0.0).with_zone("Checkout"),
        ])
    }

    /// Trajectory visiting the given x positions at the given slots.
    fn walk(device: &str, steps: &[(u32, f64)]) -> Trajectory {
        Trajectory::new(
            device,
            NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            steps
                .iter()
                .map(|&(t, x)| DevicePosition::located(device, TimeIndex::new(t), x, 0.0))
                .collect(),
        )
    }

    fn day() -> Vec<Trajectory> {
        vec![
            // Entrance -> Bakery for 2 minutes -> Checkout.
            walk("a", &[(10, 0.0), (11, 100.0), (23, 100.0), (24, 200.0)]),
            // Entrance -> Bakery briefly -> Entrance.
            walk("b", &[(10, 0.0), (11, 100.0), (12, 0.0)]),
        ]
    }

    #[test]
    fn test_occupancy_counts_valid_positions_per_slot() {
        let mut trajectories = day();
        trajectories[1]
            .positions
            .push(DevicePosition::invalid("b", TimeIndex::new(13)));
        let series = occupancy(&trajectories);
        let at = |t: u32| series.iter().find(|s| s.timestamp.get() == t).map(|s| s.devices);
        assert_eq!(at(10), Some(2));
        assert_eq!(at(12), Some(1));
        assert_eq!(at(13), None);
        assert!(series.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(
            peak(&series),
            Some(SlotCount {
                timestamp: TimeIndex::new(10),
                devices: 2
            })
        );
        assert_eq!(peak(&[]), None);
    }

    #[test]
    fn test_zone_occupancy_lists_every_zone() {
        let zones = zones();
        let trajectories = day();
        let tracks = zone_tracks(&trajectories, &zones);
        let per_zone = zone_occupancy(&tracks, &zones);
        let names: Vec<&str> = per_zone.iter().map(|z| z.zone.as_str()).collect();
        assert_eq!(names, vec!["Bakery", "Checkout", "Entrance"]);

        let bakery = &per_zone[0].series;
        assert_eq!(
            bakery[0],
            SlotCount {
                timestamp: TimeIndex::new(11),
                devices: 2
            }
        );
        assert_eq!(per_zone[1].series.len(), 1);
    }

    #[test]
    fn test_zone_dwell_and_qualified_visitors() {
        let zones = zones();
        let trajectories = day();
        let tracks = zone_tracks(&trajectories, &zones);
        let dwell = zone_dwell(&tracks);

        let a_bakery = dwell
            .iter()
            .find(|d| d.zone == "Bakery" && d.device_id == "a")
            .unwrap();
        assert_eq!(a_bakery.samples, 2);
        assert!((a_bakery.minutes() - 2.0).abs() < 1e-12);

        let visitors = zone_visitors(&dwell, &zones, 1.0);
        let bakery = visitors.iter().find(|v| v.zone == "Bakery").unwrap();
        assert_eq!(bakery.devices, 2);
        assert_eq!(bakery.qualified, 1);
        assert!((bakery.avg_dwell_minutes - 2.0).abs() < 1e-12);

        let checkout = visitors.iter().find(|v| v.zone == "Checkout").unwrap();
        assert_eq!((checkout.devices, checkout.qualified), (1, 0));
        assert_eq!(checkout.avg_dwell_minutes, 0.0);

        // With no minimum every device qualifies.
        let all = zone_visitors(&dwell, &zones, 0.0);
        assert!(all.iter().all(|v| v.qualified == v.devices));
    }

    #[test]
    fn test_transitions_skip_same_zone_steps() {
        let zones = zones();
        let trajectories = day();
        let tracks = zone_tracks(&trajectories, &zones);
        let transitions = zone_transitions(&tracks);
        assert_eq!(
            transitions,
            vec![
                ZoneTransition {
                    from: "Entrance".into(),
                    to: "Bakery".into(),
                    count: 2
                },
                ZoneTransition {
                    from: "Bakery".into(),
                    to: "Checkout".into(),
                    count: 1
                },
                ZoneTransition {
                    from: "Bakery".into(),
                    to: "Entrance".into(),
                    count: 1
                },
            ]
        );
        assert!(transitions.iter().all(|t| t.from != t.to));
    }
}
