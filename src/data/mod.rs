//! Data migration from the item-level order model to the line-level model.
//!
//! Runs once against a pristine legacy dataset, after the structural step and
//! before cleanup. Every sub-step shares the caller's connection or
//! transaction; nothing here commits or rolls back.

mod catalog;
mod order_lines;
mod references;
mod regions;
mod stock;
mod stock_movements;

use std::future::Future;
use std::time::Instant;

use metrics::histogram;
use sea_orm::{ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

use crate::sql::QueryRunner;

pub use order_lines::{Adjustment, LegacyItem, LineAggregate};
pub use stock_movements::{plan_consolidation, ConsolidationPlan, ItemMovement, MovementType};

const STEP_DURATION: &str = "order_line_migrate.step_duration_seconds";

/// How order-line aggregates are derived from legacy order items.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AggregationStrategy {
    /// Bulk statement, except where the engine lacks the JSON primitives.
    #[default]
    Auto,
    /// One correlated `UPDATE` for all lines.
    Bulk,
    /// One read and one write per line.
    RowByRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMigrationOptions {
    /// Language assigned to the translations created for promotions and payment methods.
    pub language_code: String,
    pub stock_location_name: String,
    pub aggregation: AggregationStrategy,
}

impl Default for DataMigrationOptions {
    fn default() -> Self {
        Self {
            language_code: "en".to_string(),
            stock_location_name: "Default Stock Location".to_string(),
            aggregation: AggregationStrategy::Auto,
        }
    }
}

/// Movement consolidation outcome for one movement type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MovementCounts {
    pub kept: u64,
    pub deleted: u64,
}

/// What the data migration wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub promotion_translations: u64,
    pub payment_method_translations: u64,
    pub stock_location_id: i32,
    pub stock_location_channels: u64,
    pub stock_movements_located: u64,
    pub stock_levels: u64,
    pub variant_prices: u64,
    pub aggregation: Option<AggregationStrategy>,
    pub order_lines: u64,
    pub cancellations: MovementCounts,
    pub releases: MovementCounts,
    pub refund_lines: u64,
    pub fulfillment_lines: u64,
    pub order_fulfillments: u64,
    pub modification_lines: u64,
    pub regions: u64,
    pub region_translations: u64,
    pub zone_members: u64,
}

/// Runs the complete data migration on `conn`.
///
/// `schema` selects a non-default PostgreSQL schema for the session; other
/// engines ignore it. The first failing statement aborts the run and its
/// driver error is returned unchanged.
pub async fn run_data_migration<C: ConnectionTrait>(
    conn: &C,
    schema: Option<&str>,
    options: &DataMigrationOptions,
) -> Result<MigrationReport, DbErr> {
    let runner = QueryRunner::new(conn);
    let mut report = MigrationReport::default();
    info!(dialect = %runner.dialect(), "starting order data migration");

    if let Some(schema) = schema {
        runner.set_search_path(schema).await?;
    }

    let translations = step(
        "catalog_translations",
        catalog::migrate_translations(&runner, &options.language_code),
    )
    .await?;
    report.promotion_translations = translations.promotions;
    report.payment_method_translations = translations.payment_methods;

    step("channel_currencies", catalog::migrate_channel_currencies(&runner)).await?;

    let stock = step(
        "stock_locations",
        stock::create_default_location(&runner, &options.stock_location_name),
    )
    .await?;
    report.stock_location_id = stock.location_id;
    report.stock_location_channels = stock.channels;
    report.stock_movements_located = stock.movements;
    report.stock_levels = stock.levels;

    report.variant_prices = step("variant_prices", catalog::migrate_variant_prices(&runner)).await?;

    let (strategy, lines) = step(
        "order_lines",
        order_lines::aggregate(&runner, options.aggregation),
    )
    .await?;
    report.aggregation = Some(strategy);
    report.order_lines = lines;

    report.cancellations = step(
        "cancellations",
        stock_movements::consolidate(&runner, MovementType::Cancellation),
    )
    .await?;
    report.releases = step(
        "releases",
        stock_movements::consolidate(&runner, MovementType::Release),
    )
    .await?;

    let refs = step("references", references::build(&runner)).await?;
    report.refund_lines = refs.refund_lines;
    report.fulfillment_lines = refs.fulfillment_lines;
    report.order_fulfillments = refs.order_fulfillments;
    report.modification_lines = refs.modification_lines;

    let regions = step("regions", regions::migrate(&runner)).await?;
    report.regions = regions.regions;
    report.region_translations = regions.translations;
    report.zone_members = regions.zone_members;

    info!(?report, "order data migration complete");
    Ok(report)
}

async fn step<T, F>(name: &'static str, fut: F) -> Result<T, DbErr>
where
    F: Future<Output = Result<T, DbErr>>,
{
    let started = Instant::now();
    let result = fut.instrument(info_span!("data_step", step = name)).await;
    let elapsed = started.elapsed().as_secs_f64();
    histogram!(STEP_DURATION, elapsed, "step" => name);
    match &result {
        Ok(_) => info!(step = name, elapsed_secs = elapsed, "step complete"),
        Err(err) => tracing::error!(step = name, error = %err, "step failed"),
    }
    result
}
