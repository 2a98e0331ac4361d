//! Smoothed trajectory reads.

use super::ResultStore;
use chrono::NaiveDate;
use footfall_core::error::FootfallError;
use footfall_core::time::TimeIndex;
use footfall_core::types::{DevicePosition, Trajectory};

type PositionRow = (String, i64, f64, f64, bool);

impl ResultStore {
    /// Trajectories of the latest run for `date`, ordered by device id.
    /// `None` when the date was never processed.
    pub async fn load_trajectories(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Vec<Trajectory>>, FootfallError> {
        let Some(run_id) = self.latest_run_id(date).await? else {
            return Ok(None);
        };

        let rows: Vec<PositionRow> = sqlx::query_as(
            "SELECT device_id, time_index, x, y, valid FROM positions \
             WHERE run_id = ? ORDER BY device_id, time_index",
        )
        .bind(&run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FootfallError::Store(format!("load positions failed: {e}")))?;

        let mut trajectories: Vec<Trajectory> = Vec::new();
        for (device_id, time_index, x, y, valid) in rows {
            let timestamp = u32::try_from(time_index)
                .map(TimeIndex::new)
                .map_err(|_| FootfallError::Store(format!("bad stored time index {time_index}")))?;
            let position = DevicePosition {
                device_id: device_id.clone(),
                timestamp,
                x,
                y,
                valid,
            };
            match trajectories.last_mut() {
                Some(t) if t.device_id == device_id => t.positions.push(position),
                _ => trajectories.push(Trajectory::new(&device_id, date, vec![position])),
            }
        }
        Ok(Some(trajectories))
    }
}
