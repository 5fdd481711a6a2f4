use sea_orm_migration::prelude::*;
use tracing::info;

use crate::data::run_data_migration;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20230327_000002_v2_data"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let settings = super::data_step_settings();
        let report = run_data_migration(
            manager.get_connection(),
            settings.schema.as_deref(),
            &settings.options,
        )
        .await?;
        info!(
            order_lines = report.order_lines,
            stock_location_id = report.stock_location_id,
            regions = report.regions,
            "data step applied"
        );
        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Err(DbErr::Migration(
            "the order data migration is irreversible; restore from a backup".to_owned(),
        ))
    }
}
