//! CSV-backed signal repository.
//!
//! Loads the static ward table, the per-date raw signal table, and the day
//! metadata table. Schema problems abort the load with
//! [`FootfallError::DataIntegrity`]; readings that reference an unknown ward
//! are dropped and reported as warnings.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use footfall_core::config::{Config, DataConfig, EstimatorConfig};
use footfall_core::error::{FootfallError, Warning};
use footfall_core::time::TimeIndex;
use footfall_core::types::{DayContext, DayLoad, MapBounds, SignalReading, Ward};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

const WARD_ID_COLUMNS: &[&str] = &["ward_id", "name", "sward_name"];
const ZONE_COLUMNS: &[&str] = &["zone", "description"];
const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time_index"];
const DEVICE_COLUMNS: &[&str] = &["device_id", "mac_address", "mac"];
const READING_WARD_COLUMNS: &[&str] = &["ward_id", "sward_name", "sward"];

/// Loads one day's inputs from the configured data root.
#[derive(Debug, Clone)]
pub struct SignalRepository {
    data: DataConfig,
    bounds: MapBounds,
    estimator: EstimatorConfig,
}

impl SignalRepository {
    pub fn new(config: &Config) -> Self {
        Self {
            data: config.data.clone(),
            bounds: config.map.bounds(),
            estimator: config.estimator.clone(),
        }
    }

    /// Load and validate the ward table.
    pub async fn load_wards(&self) -> Result<Vec<Ward>, FootfallError> {
        let path = self.data.wards_path();
        let (name, bytes) = read_source(&path).await?;
        let wards = parse_wards(&name, &bytes, self.bounds)?;
        info!("loaded {} wards from {}", wards.len(), path.display());
        Ok(wards)
    }

    /// Day metadata for `date`, if the metadata file exists and lists it.
    pub async fn load_day_context(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DayContext>, FootfallError> {
        let path = self.data.day_path();
        if !path.exists() {
            return Ok(None);
        }
        let (name, bytes) = read_source(&path).await?;
        Ok(parse_day_contexts(&name, &bytes)?
            .into_iter()
            .find(|c| c.date == date))
    }

    /// Load wards, readings, and context for one date.
    pub async fn load_day(&self, date: NaiveDate) -> Result<DayLoad, FootfallError> {
        let wards = self.load_wards().await?;
        let path = self.data.signals_path(date);
        let (name, bytes) = read_source(&path).await?;
        let (readings, warnings) = parse_readings(&name, &bytes, &wards, &self.estimator)?;
        // Day metadata is context only; it never blocks the signal load.
        let context = match self.load_day_context(date).await {
            Ok(context) => context,
            Err(e) => {
                warn!("{date}: ignoring day metadata: {e}");
                None
            }
        };

        if !warnings.is_empty() {
            warn!(
                "{date}: dropped {} readings referencing unknown wards",
                warnings.len()
            );
        }
        info!("{date}: loaded {} readings from {}", readings.len(), path.display());

        Ok(DayLoad {
            date,
            context,
            wards,
            readings,
            warnings,
        })
    }

    /// Dates with a signal file, newest first. Falls back to the dates listed
    /// in the day metadata file when no signal files are present.
    pub async fn available_dates(&self) -> Result<Vec<NaiveDate>, FootfallError> {
        let mut dates = Vec::new();
        let dir = self.data.signals_dir_path();
        if dir.exists() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if let Some(date) = entry
                    .file_name()
                    .to_str()
                    .and_then(|n| date_from_file_name(&self.data.signals_pattern, n))
                {
                    dates.push(date);
                }
            }
        }

        if dates.is_empty() && self.data.day_path().exists() {
            let (name, bytes) = read_source(&self.data.day_path()).await?;
            dates = parse_day_contexts(&name, &bytes)?
                .into_iter()
                .map(|c| c.date)
                .collect();
        }

        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        Ok(dates)
    }

    /// Check the map raster against the configured coordinate space.
    ///
    /// Returns the image dimensions, or `None` when no map image is present.
    pub fn verify_map_image(&self) -> Result<Option<(u32, u32)>, FootfallError> {
        let path = self.data.map_image_path();
        if !path.exists() {
            warn!("map image not found at {}, skipping size check", path.display());
            return Ok(None);
        }
        let actual = image::image_dimensions(&path).map_err(|e| {
            FootfallError::integrity(&path.display().to_string(), 0, e.to_string())
        })?;
        check_map_dimensions(self.bounds, actual)?;
        Ok(Some(actual))
    }
}

/// The core never rescales: a raster of any other size is a consistency error.
pub fn check_map_dimensions(bounds: MapBounds, actual: (u32, u32)) -> Result<(), FootfallError> {
    let expected = (bounds.width, bounds.height);
    if actual != expected {
        return Err(FootfallError::MapMismatch { expected, actual });
    }
    Ok(())
}

async fn read_source(path: &Path) -> Result<(String, Vec<u8>), FootfallError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok((name, bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FootfallError::integrity(
            &name,
            0,
            format!("file not found: {}", path.display()),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Extract the date from a file name built from `pattern` (`{date}` placeholder).
/// Only `YYYY-MM-DD` dates match.
pub fn date_from_file_name(pattern: &str, file_name: &str) -> Option<NaiveDate> {
    let (prefix, suffix) = pattern.split_once("{date}")?;
    let middle = file_name.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if middle.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(middle, "%Y-%m-%d").ok()
}

/// Header lookup over a CSV table.
struct Columns<'a> {
    source: &'a str,
    index: HashMap<String, usize>,
}

impl<'a> Columns<'a> {
    fn new(source: &'a str, headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
            .collect();
        Self { source, index }
    }

    fn optional(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.index.get(*n).copied())
    }

    fn required(&self, names: &[&str]) -> Result<usize, FootfallError> {
        self.optional(names).ok_or_else(|| {
            FootfallError::integrity(
                self.source,
                0,
                format!("missing required column '{}'", names.join("' / '")),
            )
        })
    }

    fn field<'r>(
        &self,
        record: &'r StringRecord,
        row: usize,
        col: usize,
        what: &str,
    ) -> Result<&'r str, FootfallError> {
        record
            .get(col)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| FootfallError::integrity(self.source, row, format!("missing {what}")))
    }

    fn number(
        &self,
        record: &StringRecord,
        row: usize,
        col: usize,
        what: &str,
    ) -> Result<f64, FootfallError> {
        let raw = self.field(record, row, col, what)?;
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                FootfallError::integrity(self.source, row, format!("{what} '{raw}' is not a number"))
            })
    }
}

fn reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    ReaderBuilder::new().trim(Trim::All).from_reader(bytes)
}

fn record_at(
    source: &str,
    row: usize,
    record: Result<StringRecord, csv::Error>,
) -> Result<StringRecord, FootfallError> {
    record.map_err(|e| FootfallError::integrity(source, row, e.to_string()))
}

/// Parse the ward table: unique ids, coordinates inside the map.
pub fn parse_wards(
    source: &str,
    bytes: &[u8],
    bounds: MapBounds,
) -> Result<Vec<Ward>, FootfallError> {
    let mut rdr = reader(bytes);
    let headers = rdr.headers()?.clone();
    let cols = Columns::new(source, &headers);
    let id_col = cols.required(WARD_ID_COLUMNS)?;
    let x_col = cols.required(&["x"])?;
    let y_col = cols.required(&["y"])?;
    let zone_col = cols.optional(ZONE_COLUMNS);

    let mut seen = HashSet::new();
    let mut wards = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let row = i + 1;
        let record = record_at(source, row, record)?;
        let ward_id = cols.field(&record, row, id_col, "ward id")?;
        let x = cols.number(&record, row, x_col, "x")?;
        let y = cols.number(&record, row, y_col, "y")?;

        if !seen.insert(ward_id.to_string()) {
            return Err(FootfallError::integrity(
                source,
                row,
                format!("duplicate ward id '{ward_id}'"),
            ));
        }
        if !bounds.contains(x, y) {
            return Err(FootfallError::integrity(
                source,
                row,
                format!(
                    "ward '{ward_id}' at ({x}, {y}) lies outside the {}x{} map",
                    bounds.width, bounds.height
                ),
            ));
        }

        let mut ward = Ward::new(ward_id, x, y);
        if let Some(zone) = zone_col
            .and_then(|c| record.get(c))
            .filter(|z| !z.is_empty())
        {
            ward = ward.with_zone(zone);
        }
        wards.push(ward);
    }

    if wards.is_empty() {
        return Err(FootfallError::integrity(source, 0, "ward table is empty"));
    }
    Ok(wards)
}

/// Parse a raw signal table against a ward set.
pub fn parse_readings(
    source: &str,
    bytes: &[u8],
    wards: &[Ward],
    estimator: &EstimatorConfig,
) -> Result<(Vec<SignalReading>, Vec<Warning>), FootfallError> {
    let known: HashSet<&str> = wards.iter().map(|w| w.ward_id.as_str()).collect();

    let mut rdr = reader(bytes);
    let headers = rdr.headers()?.clone();
    let cols = Columns::new(source, &headers);
    let ts_col = cols.required(TIMESTAMP_COLUMNS)?;
    let device_col = cols.required(DEVICE_COLUMNS)?;
    let ward_col = cols.required(READING_WARD_COLUMNS)?;
    let rssi_col = cols.required(&["rssi"])?;

    let mut readings = Vec::new();
    let mut warnings = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let row = i + 1;
        let record = record_at(source, row, record)?;
        let raw_ts = cols.field(&record, row, ts_col, "timestamp")?;
        let timestamp = TimeIndex::parse(raw_ts)
            .map_err(|e| FootfallError::integrity(source, row, e))?;
        let device_id = cols.field(&record, row, device_col, "device id")?;
        let ward_id = cols.field(&record, row, ward_col, "ward id")?;
        let rssi = cols.number(&record, row, rssi_col, "rssi")?;

        if !estimator.accepts_rssi(rssi) {
            return Err(FootfallError::integrity(
                source,
                row,
                format!(
                    "rssi {rssi} outside [{}, {})",
                    estimator.rssi_min, estimator.rssi_max
                ),
            ));
        }

        if !known.contains(ward_id) {
            warnings.push(Warning::UnknownWard {
                device_id: device_id.to_string(),
                ward_id: ward_id.to_string(),
                timestamp,
            });
            continue;
        }
        readings.push(SignalReading::new(device_id, ward_id, rssi, timestamp));
    }
    Ok((readings, warnings))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Parse the day metadata table.
///
/// A missing column fails the whole table. Rows that cannot be parsed only
/// lose their own day: they are skipped with a warning.
pub fn parse_day_contexts(source: &str, bytes: &[u8]) -> Result<Vec<DayContext>, FootfallError> {
    let mut rdr = reader(bytes);
    let headers = rdr.headers()?.clone();
    let cols = Columns::new(source, &headers);
    let layout = DayColumns {
        date: cols.required(&["date"])?,
        weekday: cols.required(&["weekday"])?,
        holiday: cols.required(&["holiday", "holiday_flag"])?,
        weather: cols.required(&["weather"])?,
    };

    let mut days = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let row = i + 1;
        match record_at(source, row, record).and_then(|r| parse_day_row(&cols, &layout, &r, row)) {
            Ok(day) => days.push(day),
            Err(e) => warn!("skipping day metadata row: {e}"),
        }
    }
    Ok(days)
}

struct DayColumns {
    date: usize,
    weekday: usize,
    holiday: usize,
    weather: usize,
}

fn parse_day_row(
    cols: &Columns<'_>,
    layout: &DayColumns,
    record: &StringRecord,
    row: usize,
) -> Result<DayContext, FootfallError> {
    let raw_date = cols.field(record, row, layout.date, "date")?;
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
        FootfallError::integrity(cols.source, row, format!("date '{raw_date}' is not YYYY-MM-DD"))
    })?;
    let raw_holiday = cols.field(record, row, layout.holiday, "holiday flag")?;
    let holiday = parse_flag(raw_holiday).ok_or_else(|| {
        FootfallError::integrity(
            cols.source,
            row,
            format!("holiday flag '{raw_holiday}' is not a boolean"),
        )
    })?;
    Ok(DayContext {
        date,
        weekday: cols.field(record, row, layout.weekday, "weekday")?.to_string(),
        holiday,
        weather: cols.field(record, row, layout.weather, "weather")?.to_string(),
    })
}
