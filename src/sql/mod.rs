//! Dual-dialect SQL execution.

pub mod dialect;
pub mod params;
pub mod runner;

pub use dialect::{postgres_to_mysql, Dialect};
pub use params::{bind_named, Params};
pub use runner::QueryRunner;
