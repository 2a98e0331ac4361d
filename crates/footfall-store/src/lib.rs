//! # footfall-store
//!
//! Input side and output side of footfall: the CSV-backed signal repository
//! that loads and validates a day's readings, and the SQLite-backed result
//! store that keeps processed days.

pub mod repository;
pub mod store;

pub use repository::SignalRepository;
pub use store::ResultStore;
