//! # footfall-core
//!
//! Core types, configuration, and error handling shared by the footfall
//! ingestion, localization, and persistence crates.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::shellexpand;
