//! Data loaders that feed base series.
//!
//! The engine trusts its upstream collaborator to mutate a
//! [`chart_engine::BaseSeries`] and raise notifications with correct
//! bounds; this crate provides that collaborator for CSV files.

pub mod csv_loader;

pub use csv_loader::CsvLoader;
