//! Exponential moving average over a device's time-ordered positions.
//!
//! `s_t = alpha * raw_t + (1 - alpha) * s_{t-1}`, seeded by the first valid
//! entry. The fold is strictly sequential per device.

use footfall_core::config::{GapMode, SmootherConfig};
use footfall_core::error::FootfallError;
use footfall_core::time::TimeIndex;
use footfall_core::types::{DevicePosition, Trajectory};

/// Handling of invalid entries and missing time slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPolicy {
    /// Invalid entries stay invalid and do not touch the smoothed state.
    /// Missing slots are not synthesized, so output length equals input length.
    Drop,
    /// Invalid entries after the first valid one repeat the last smoothed
    /// value. Runs of up to `max_fill_slots` missing slots between two
    /// entries are filled with the same carried value.
    CarryForward { max_fill_slots: u32 },
}

/// EMA smoother with an explicit gap policy.
#[derive(Debug, Clone)]
pub struct TrajectorySmoother {
    alpha: f64,
    policy: GapPolicy,
}

impl TrajectorySmoother {
    /// Create a smoother; `alpha` must be in (0, 1].
    pub fn new(alpha: f64, policy: GapPolicy) -> Result<Self, FootfallError> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(FootfallError::Config(format!(
                "smoothing factor must be in (0, 1], got {alpha}"
            )));
        }
        Ok(Self { alpha, policy })
    }

    pub fn from_config(config: &SmootherConfig) -> Result<Self, FootfallError> {
        let policy = match config.gap_policy {
            GapMode::Drop => GapPolicy::Drop,
            GapMode::CarryForward => GapPolicy::CarryForward {
                max_fill_slots: config.max_fill_slots,
            },
        };
        Self::new(config.alpha, policy)
    }

    /// Smooth a raw trajectory into a new one.
    pub fn smooth(&self, raw: &Trajectory) -> Trajectory {
        Trajectory::new(
            &raw.device_id,
            raw.date,
            self.smooth_positions(&raw.device_id, &raw.positions),
        )
    }

    /// Smooth a time-ordered position sequence.
    pub fn smooth_positions(&self, device_id: &str, raw: &[DevicePosition]) -> Vec<DevicePosition> {
        let mut out = Vec::with_capacity(raw.len());
        let mut state: Option<(f64, f64)> = None;
        let mut prev: Option<TimeIndex> = None;

        for p in raw {
            if let (GapPolicy::CarryForward { max_fill_slots }, Some(prev_t), Some((sx, sy))) =
                (self.policy, prev, state)
            {
                let missing = prev_t.slots_until(p.timestamp).saturating_sub(1);
                if missing > 0 && missing <= max_fill_slots {
                    let mut t = prev_t;
                    for _ in 0..missing {
                        t = t.next();
                        out.push(DevicePosition::located(device_id, t, sx, sy));
                    }
                }
            }
            prev = Some(p.timestamp);

            if p.valid {
                let (sx, sy) = match state {
                    None => (p.x, p.y),
                    Some((sx, sy)) => (
                        self.alpha * p.x + (1.0 - self.alpha) * sx,
                        self.alpha * p.y + (1.0 - self.alpha) * sy,
                    ),
                };
                state = Some((sx, sy));
                out.push(DevicePosition::located(device_id, p.timestamp, sx, sy));
                continue;
            }

            match (self.policy, state) {
                (GapPolicy::CarryForward { .. }, Some((sx, sy))) => {
                    out.push(DevicePosition::located(device_id, p.timestamp, sx, sy));
                }
                _ => out.push(DevicePosition::invalid(device_id, p.timestamp)),
            }
        }
        out
    }
}
