//! Heatmap grid reads.

use super::{ResultStore, DAY_SCOPE};
use chrono::NaiveDate;
use footfall_core::error::FootfallError;
use footfall_core::time::TimeWindow;
use footfall_locate::heatmap::HeatmapGrid;

impl ResultStore {
    /// Heatmap of the latest run for `date`. `window == None` is the whole day.
    pub async fn load_heatmap(
        &self,
        date: NaiveDate,
        window: Option<TimeWindow>,
    ) -> Result<Option<HeatmapGrid>, FootfallError> {
        let Some(run_id) = self.latest_run_id(date).await? else {
            return Ok(None);
        };
        let scope = window.map_or(DAY_SCOPE, TimeWindow::as_str);

        let row: Option<(i64, i64, i64, String)> = sqlx::query_as(
            "SELECT width, height, cell_size, cells FROM heatmaps \
             WHERE run_id = ? AND scope = ?",
        )
        .bind(&run_id)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FootfallError::Store(format!("load heatmap failed: {e}")))?;

        let Some((width, height, cell_size, cells)) = row else {
            return Ok(None);
        };
        let cells: Vec<u64> = serde_json::from_str(&cells)?;
        HeatmapGrid::from_cells(width as usize, height as usize, cell_size as u32, cells).map(Some)
    }
}
