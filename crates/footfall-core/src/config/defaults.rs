//! Serde default values for configuration fields.

pub(super) fn default_name() -> String {
    "footfall".to_string()
}
pub(super) fn default_data_dir() -> String {
    "~/.footfall".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_data_root() -> String {
    "Data".to_string()
}
pub(super) fn default_wards_file() -> String {
    "SWard_description/swards.csv".to_string()
}
pub(super) fn default_signals_dir() -> String {
    "Signals".to_string()
}
pub(super) fn default_signals_pattern() -> String {
    "signals_{date}.csv".to_string()
}
pub(super) fn default_day_file() -> String {
    "Day_description/Day_Weather.csv".to_string()
}
pub(super) fn default_map_image() -> String {
    "Map/map_image.png".to_string()
}
pub(super) fn default_map_width() -> u32 {
    696
}
pub(super) fn default_map_height() -> u32 {
    509
}
pub(super) fn default_rssi_min() -> f64 {
    -127.0
}
pub(super) fn default_rssi_max() -> f64 {
    0.0
}
pub(super) fn default_scale_db() -> f64 {
    10.0
}
pub(super) fn default_rssi_at_1m() -> f64 {
    -45.0
}
pub(super) fn default_path_loss_exponent() -> f64 {
    2.5
}
pub(super) fn default_alpha() -> f64 {
    0.3
}
pub(super) fn default_max_fill_slots() -> u32 {
    6
}
pub(super) fn default_cell_size() -> u32 {
    1
}
pub(super) fn default_max_dwell_secs() -> u32 {
    60
}
pub(super) fn default_min_dwell_minutes() -> f64 {
    1.0
}
pub(super) fn default_db_path() -> String {
    "~/.footfall/data/results.db".to_string()
}
