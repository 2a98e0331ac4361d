//! Density aggregation of trajectories onto a map-aligned grid.
//!
//! Cells hold integer weights (point counts or dwell seconds) so partial
//! grids merge exactly, whatever order the trajectories are processed in.

use footfall_core::config::{Config, WeightingMode};
use footfall_core::error::{BoundsStage, FootfallError, Warning};
use footfall_core::time::{TimeWindow, SLOT_SECS};
use footfall_core::types::{MapBounds, Trajectory};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// 2D density accumulator, row-major, `cell_size` map pixels per cell edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapGrid {
    width: usize,
    height: usize,
    cell_size: u32,
    cells: Vec<u64>,
}

/// Summary figures of a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapStats {
    pub max: u64,
    pub total: u64,
    pub active_cells: usize,
    /// Mean over non-zero cells.
    pub mean_active: f64,
}

/// One grid cell and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotspot {
    pub col: usize,
    pub row: usize,
    pub value: u64,
}

impl HeatmapGrid {
    pub fn new(width: usize, height: usize, cell_size: u32) -> Self {
        Self {
            width,
            height,
            cell_size,
            cells: vec![0; width * height],
        }
    }

    /// Grid covering the whole map, downsampled by `cell_size`.
    pub fn for_map(bounds: MapBounds, cell_size: u32) -> Self {
        let cell = cell_size.max(1);
        Self::new(
            bounds.width.div_ceil(cell) as usize,
            bounds.height.div_ceil(cell) as usize,
            cell,
        )
    }

    /// Rebuild a grid from stored cells.
    pub fn from_cells(
        width: usize,
        height: usize,
        cell_size: u32,
        cells: Vec<u64>,
    ) -> Result<Self, FootfallError> {
        if cells.len() != width * height {
            return Err(FootfallError::Store(format!(
                "heatmap has {} cells, expected {width}x{height}",
                cells.len()
            )));
        }
        Ok(Self {
            width,
            height,
            cell_size,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn cells(&self) -> &[u64] {
        &self.cells
    }

    /// `(width, height, cell_size)`.
    pub fn shape(&self) -> (usize, usize, u32) {
        (self.width, self.height, self.cell_size)
    }

    pub fn get(&self, col: usize, row: usize) -> u64 {
        if col < self.width && row < self.height {
            self.cells[row * self.width + col]
        } else {
            0
        }
    }

    /// Cell containing pixel `(x, y)`, or `None` outside the grid.
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return None;
        }
        let cell = f64::from(self.cell_size);
        let col = (x / cell).floor() as usize;
        let row = (y / cell).floor() as usize;
        (col < self.width && row < self.height).then_some((col, row))
    }

    /// Add `amount` to the cell holding `(x, y)`. Returns false if out of grid.
    pub fn add(&mut self, x: f64, y: f64, amount: u64) -> bool {
        match self.cell_of(x, y) {
            Some((col, row)) => {
                self.cells[row * self.width + col] += amount;
                true
            }
            None => false,
        }
    }

    /// Sum another grid of identical shape into this one.
    pub fn merge(&mut self, other: &HeatmapGrid) -> Result<(), FootfallError> {
        if self.shape() != other.shape() {
            return Err(FootfallError::GridMismatch {
                left: self.shape(),
                right: other.shape(),
            });
        }
        self.absorb(other);
        Ok(())
    }

    fn absorb(&mut self, other: &HeatmapGrid) {
        for (a, b) in self.cells.iter_mut().zip(&other.cells) {
            *a += b;
        }
    }

    pub fn stats(&self) -> HeatmapStats {
        let mut stats = HeatmapStats {
            max: 0,
            total: 0,
            active_cells: 0,
            mean_active: 0.0,
        };
        for &v in &self.cells {
            if v > 0 {
                stats.active_cells += 1;
                stats.total += v;
                stats.max = stats.max.max(v);
            }
        }
        if stats.active_cells > 0 {
            stats.mean_active = stats.total as f64 / stats.active_cells as f64;
        }
        stats
    }

    /// The `n` highest cells, ties broken by row-major position.
    pub fn hotspots(&self, n: usize) -> Vec<Hotspot> {
        let mut spots: Vec<Hotspot> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0)
            .map(|(i, &value)| Hotspot {
                col: i % self.width,
                row: i / self.width,
                value,
            })
            .collect();
        spots.sort_by(|a, b| {
            b.value
                .cmp(&a.value)
                .then(a.row.cmp(&b.row))
                .then(a.col.cmp(&b.col))
        });
        spots.truncate(n);
        spots
    }
}

/// Per-point contribution to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Every valid position adds 1.
    Count,
    /// Every valid position adds the seconds until the device's next entry,
    /// capped at `max_dwell_secs`; the final entry adds one slot.
    Dwell { max_dwell_secs: u32 },
}

/// Builds heatmap grids from smoothed trajectories.
#[derive(Debug, Clone)]
pub struct TrajectoryAggregator {
    bounds: MapBounds,
    cell_size: u32,
    weighting: Weighting,
}

impl TrajectoryAggregator {
    pub fn new(bounds: MapBounds, cell_size: u32, weighting: Weighting) -> Self {
        Self {
            bounds,
            cell_size: cell_size.max(1),
            weighting,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let weighting = match config.heatmap.weighting {
            WeightingMode::Count => Weighting::Count,
            WeightingMode::Dwell => Weighting::Dwell {
                max_dwell_secs: config.heatmap.max_dwell_secs,
            },
        };
        Self::new(config.map.bounds(), config.heatmap.cell_size, weighting)
    }

    pub fn empty_grid(&self) -> HeatmapGrid {
        HeatmapGrid::for_map(self.bounds, self.cell_size)
    }

    /// Add one trajectory's valid points (optionally only those inside
    /// `window`) to `grid`. Out-of-grid points are discarded with a warning.
    pub fn accumulate(
        &self,
        grid: &mut HeatmapGrid,
        trajectory: &Trajectory,
        window: Option<TimeWindow>,
        warnings: &mut Vec<Warning>,
    ) {
        let positions = &trajectory.positions;
        for (i, p) in positions.iter().enumerate() {
            if !p.valid || window.is_some_and(|w| !w.contains(p.timestamp)) {
                continue;
            }
            let amount = match self.weighting {
                Weighting::Count => 1,
                Weighting::Dwell { max_dwell_secs } => {
                    let secs = positions
                        .get(i + 1)
                        .map(|next| p.timestamp.slots_until(next.timestamp) * SLOT_SECS)
                        .unwrap_or(SLOT_SECS);
                    u64::from(secs.min(max_dwell_secs))
                }
            };
            if !grid.add(p.x, p.y, amount) {
                warnings.push(Warning::OutOfBounds {
                    stage: BoundsStage::Aggregation,
                    device_id: p.device_id.clone(),
                    timestamp: p.timestamp,
                    x: p.x,
                    y: p.y,
                });
            }
        }
    }

    /// Aggregate every trajectory into one grid, using per-worker partial
    /// grids summed afterwards.
    pub fn aggregate(&self, trajectories: &[Trajectory]) -> (HeatmapGrid, Vec<Warning>) {
        self.aggregate_filtered(trajectories, None)
    }

    /// Aggregate only points inside a named time window.
    pub fn aggregate_window(
        &self,
        trajectories: &[Trajectory],
        window: TimeWindow,
    ) -> (HeatmapGrid, Vec<Warning>) {
        self.aggregate_filtered(trajectories, Some(window))
    }

    fn aggregate_filtered(
        &self,
        trajectories: &[Trajectory],
        window: Option<TimeWindow>,
    ) -> (HeatmapGrid, Vec<Warning>) {
        trajectories
            .par_iter()
            .fold(
                || (self.empty_grid(), Vec::new()),
                |(mut grid, mut warnings), t| {
                    self.accumulate(&mut grid, t, window, &mut warnings);
                    (grid, warnings)
                },
            )
            .reduce(
                || (self.empty_grid(), Vec::new()),
                |(mut left, mut lw), (right, rw)| {
                    left.absorb(&right);
                    lw.extend(rw);
                    (left, lw)
                },
            )
    }
}
