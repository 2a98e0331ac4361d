//! Store zones: wards grouped by their zone label, and per-zone traffic.

use footfall_core::time::TimeIndex;
use footfall_core::types::{Trajectory, Ward};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Wards grouped by zone name.
#[derive(Debug, Clone, Default)]
pub struct ZoneMap {
    zones: BTreeMap<String, Vec<Ward>>,
}

impl ZoneMap {
    /// Group wards by zone. Wards without a zone are left out.
    pub fn from_wards(wards: &[Ward]) -> Self {
        let mut zones: BTreeMap<String, Vec<Ward>> = BTreeMap::new();
        for ward in wards {
            if let Some(zone) = &ward.zone {
                zones.entry(zone.clone()).or_default().push(ward.clone());
            }
        }
        Self { zones }
    }

    pub fn zone_names(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// Zone of the ward nearest to `(x, y)`.
    pub fn zone_at(&self, x: f64, y: f64) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (zone, wards) in &self.zones {
            for ward in wards {
                let d = ward.distance_sq(x, y);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((zone.as_str(), d));
                }
            }
        }
        best.map(|(zone, _)| zone)
    }
}

/// One device's valid positions labelled with their zone, in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTrack<'a> {
    pub device_id: &'a str,
    pub visits: Vec<(TimeIndex, &'a str)>,
}

/// Attribute every valid position to the zone of its nearest ward.
/// Devices are labelled in parallel; output keeps trajectory order.
pub fn zone_tracks<'a>(trajectories: &'a [Trajectory], zones: &'a ZoneMap) -> Vec<ZoneTrack<'a>> {
    trajectories
        .par_iter()
        .map(|t| ZoneTrack {
            device_id: t.device_id.as_str(),
            visits: t
                .valid_positions()
                .filter_map(|p| zones.zone_at(p.x, p.y).map(|z| (p.timestamp, z)))
                .collect(),
        })
        .collect()
}

/// Traffic attributed to one zone over a set of trajectories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneTraffic {
    pub zone: String,
    /// Distinct devices seen in the zone.
    pub devices: usize,
    /// Valid position samples attributed to the zone.
    pub samples: usize,
}

/// Devices and samples per zone. Zones without traffic report zero counts.
pub fn zone_traffic(tracks: &[ZoneTrack<'_>], zones: &ZoneMap) -> Vec<ZoneTraffic> {
    let mut acc: BTreeMap<&str, (BTreeSet<&str>, usize)> = zones
        .zone_names()
        .map(|z| (z, (BTreeSet::new(), 0)))
        .collect();

    for track in tracks {
        for &(_, zone) in &track.visits {
            if let Some((devices, samples)) = acc.get_mut(zone) {
                devices.insert(track.device_id);
                *samples += 1;
            }
        }
    }

    acc.into_iter()
        .map(|(zone, (devices, samples))| ZoneTraffic {
            zone: zone.to_string(),
            devices: devices.len(),
            samples,
        })
        .collect()
}
