//! Order Line Migrate Library
//!
//! Moves an order database from the item-per-unit model to the line-per-product
//! model on PostgreSQL, MySQL/MariaDB and SQLite.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod data;
pub mod db;
pub mod errors;
pub mod migrator;
pub mod sql;

pub use data::{run_data_migration, AggregationStrategy, DataMigrationOptions, MigrationReport};
pub use migrator::Migrator;
