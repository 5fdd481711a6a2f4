//! Default stock location and per-location stock levels.

use sea_orm::{ConnectionTrait, DbErr};
use tracing::info;

use crate::sql::{Params, QueryRunner};

pub(crate) struct StockOutcome {
    pub location_id: i32,
    pub channels: u64,
    pub movements: u64,
    pub levels: u64,
}

/// Creates the single default location and attaches every channel, stock
/// movement and variant stock figure to it.
pub(crate) async fn create_default_location<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
    name: &str,
) -> Result<StockOutcome, DbErr> {
    let location_id = insert_location(runner, name).await?;
    info!(location_id, name, "default stock location created");

    let params = Params::new().bind("locationId", location_id);

    let channels = runner
        .execute(
            r#"INSERT INTO "stock_location_channels_channel" ("stockLocationId", "channelId")
               SELECT :locationId, "id" FROM "channel""#,
            &params,
            true,
        )
        .await?
        .rows_affected();

    let movements = runner
        .execute(
            r#"UPDATE "stock_movement" SET "stockLocationId" = :locationId"#,
            &params,
            true,
        )
        .await?
        .rows_affected();

    let levels = runner
        .execute(
            r#"INSERT INTO "stock_level" ("createdAt", "updatedAt", "productVariantId", "stockLocationId", "stockOnHand", "stockAllocated")
               SELECT "createdAt", "updatedAt", "id", :locationId, "stockOnHand", "stockAllocated" FROM "product_variant""#,
            &params,
            true,
        )
        .await?
        .rows_affected();

    info!(channels, movements, levels, "stock data attached to default location");
    Ok(StockOutcome {
        location_id,
        channels,
        movements,
        levels,
    })
}

async fn insert_location<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
    name: &str,
) -> Result<i32, DbErr> {
    let params = Params::new().bind("name", name);

    if runner.dialect().supports_returning() {
        let row = runner
            .query(
                r#"INSERT INTO "stock_location" ("createdAt", "updatedAt", "name", "description")
                   VALUES (DEFAULT, DEFAULT, :name, '') RETURNING "id""#,
                &params,
                true,
            )
            .await?
            .into_iter()
            .next()
            .ok_or(DbErr::RecordNotInserted)?;
        return row.try_get::<i32>("", "id");
    }

    let result = runner
        .execute(
            r#"INSERT INTO "stock_location" ("createdAt", "updatedAt", "name", "description")
               VALUES (CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, :name, '')"#,
            &params,
            true,
        )
        .await?;
    let id = result.last_insert_id();
    i32::try_from(id).map_err(|_| DbErr::Custom(format!("stock location id {id} out of range")))
}
