//! Run bookkeeping: saving a processed day and finding the latest run.

use super::{ResultStore, DAY_SCOPE};
use chrono::NaiveDate;
use footfall_core::error::FootfallError;
use footfall_locate::heatmap::HeatmapGrid;
use footfall_locate::DayReport;
use footfall_core::types::DevicePosition;
use sqlx::{QueryBuilder, Sqlite, Transaction};
use uuid::Uuid;

/// One stored pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub id: String,
    pub date: NaiveDate,
    pub devices: i64,
    pub positions: i64,
    pub warnings: i64,
    pub created_at: String,
}

/// Rows per multi-row position insert (6 binds each, under SQLite's bind limit).
const POSITION_BATCH: usize = 1000;

type RunRow = (String, String, i64, i64, i64, String);

fn parse_date(raw: &str) -> Result<NaiveDate, FootfallError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| FootfallError::Store(format!("bad stored date '{raw}': {e}")))
}

impl ResultStore {
    /// Persist a processed day. Returns the new run id.
    pub async fn save_day(&self, report: &DayReport) -> Result<String, FootfallError> {
        let id = Uuid::new_v4().to_string();
        let date = report.date.to_string();
        let summary = report.summary();
        let summary_json = serde_json::to_string(&summary)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FootfallError::Store(format!("begin failed: {e}")))?;

        sqlx::query(
            "INSERT INTO runs (id, date, devices, positions, warnings, summary) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&date)
        .bind(summary.devices as i64)
        .bind(summary.positions as i64)
        .bind(report.warnings.len() as i64)
        .bind(&summary_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| FootfallError::Store(format!("insert run failed: {e}")))?;

        let positions: Vec<&DevicePosition> = report
            .trajectories
            .iter()
            .flat_map(|t| &t.positions)
            .collect();
        for chunk in positions.chunks(POSITION_BATCH) {
            let mut insert = QueryBuilder::<Sqlite>::new(
                "INSERT INTO positions (run_id, device_id, time_index, x, y, valid) ",
            );
            insert.push_values(chunk, |mut row, p| {
                row.push_bind(id.as_str())
                    .push_bind(p.device_id.as_str())
                    .push_bind(i64::from(p.timestamp.get()))
                    .push_bind(p.x)
                    .push_bind(p.y)
                    .push_bind(p.valid);
            });
            insert
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| FootfallError::Store(format!("insert positions failed: {e}")))?;
        }

        insert_grid(&mut tx, &id, DAY_SCOPE, &report.heatmap).await?;
        for w in &report.windows {
            insert_grid(&mut tx, &id, w.window.as_str(), &w.grid).await?;
        }

        tx.commit()
            .await
            .map_err(|e| FootfallError::Store(format!("commit failed: {e}")))?;

        tracing::info!(
            "saved run {id} for {date}: {} devices, {} positions",
            summary.devices,
            summary.positions
        );
        Ok(id)
    }

    /// Most recent run for `date`.
    pub async fn latest_run(&self, date: NaiveDate) -> Result<Option<RunInfo>, FootfallError> {
        let row: Option<RunRow> = sqlx::query_as(
            "SELECT id, date, devices, positions, warnings, created_at FROM runs \
             WHERE date = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FootfallError::Store(format!("latest run lookup failed: {e}")))?;

        row.map(|(id, date, devices, positions, warnings, created_at)| {
            Ok(RunInfo {
                id,
                date: parse_date(&date)?,
                devices,
                positions,
                warnings,
                created_at,
            })
        })
        .transpose()
    }

    pub(super) async fn latest_run_id(
        &self,
        date: NaiveDate,
    ) -> Result<Option<String>, FootfallError> {
        Ok(self.latest_run(date).await?.map(|r| r.id))
    }

    /// Stored summary of the latest run for `date`, as JSON.
    pub async fn load_summary(
        &self,
        date: NaiveDate,
    ) -> Result<Option<serde_json::Value>, FootfallError> {
        let Some(run_id) = self.latest_run_id(date).await? else {
            return Ok(None);
        };
        let (raw,): (String,) = sqlx::query_as("SELECT summary FROM runs WHERE id = ?")
            .bind(&run_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FootfallError::Store(format!("summary lookup failed: {e}")))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Dates with at least one stored run, newest first.
    pub async fn processed_dates(&self) -> Result<Vec<NaiveDate>, FootfallError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT date FROM runs ORDER BY date DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| FootfallError::Store(format!("processed dates failed: {e}")))?;
        rows.iter().map(|(d,)| parse_date(d)).collect()
    }

    /// Number of stored runs across all dates.
    pub async fn run_count(&self) -> Result<i64, FootfallError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM runs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FootfallError::Store(format!("run count failed: {e}")))?;
        Ok(count)
    }
}

async fn insert_grid(
    tx: &mut Transaction<'_, Sqlite>,
    run_id: &str,
    scope: &str,
    grid: &HeatmapGrid,
) -> Result<(), FootfallError> {
    let cells = serde_json::to_string(grid.cells())?;
    sqlx::query(
        "INSERT INTO heatmaps (run_id, scope, width, height, cell_size, cells) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(run_id)
    .bind(scope)
    .bind(grid.width() as i64)
    .bind(grid.height() as i64)
    .bind(grid.cell_size() as i64)
    .bind(&cells)
    .execute(&mut **tx)
    .await
    .map_err(|e| FootfallError::Store(format!("insert heatmap '{scope}' failed: {e}")))?;
    Ok(())
}
