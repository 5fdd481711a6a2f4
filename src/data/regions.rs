//! Countries become regions with their ids preserved.

use sea_orm::{ConnectionTrait, DbErr};
use tracing::{debug, info};

use crate::sql::{Dialect, Params, QueryRunner};

pub(crate) struct RegionCounts {
    pub regions: u64,
    pub translations: u64,
    pub zone_members: u64,
}

pub(crate) async fn migrate<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
) -> Result<RegionCounts, DbErr> {
    let regions = runner
        .execute(
            r#"INSERT INTO "region" ("createdAt", "updatedAt", "code", "type", "enabled", "id", "discriminator")
               SELECT "createdAt", "updatedAt", "code", :type, "enabled", "id", :discriminator FROM "country""#,
            &Params::new()
                .bind("type", "country")
                .bind("discriminator", "Country"),
            true,
        )
        .await?
        .rows_affected();

    let translations = runner
        .execute(
            r#"INSERT INTO "region_translation" ("createdAt", "updatedAt", "languageCode", "id", "name", "baseId")
               SELECT "createdAt", "updatedAt", "languageCode", "id", "name", "baseId" FROM "country_translation""#,
            &Params::new(),
            true,
        )
        .await?
        .rows_affected();

    // Ids are preserved, so zone membership only changes column.
    let zone_members = runner
        .execute(
            r#"INSERT INTO "zone_members_region" ("zoneId", "regionId")
               SELECT "zoneId", "countryId" FROM "zone_members_country""#,
            &Params::new(),
            true,
        )
        .await?
        .rows_affected();

    if runner.dialect() == Dialect::Postgres {
        for table in ["region", "region_translation"] {
            advance_sequence(runner, table).await?;
        }
    }

    info!(regions, translations, zone_members, "countries copied to regions");
    Ok(RegionCounts {
        regions,
        translations,
        zone_members,
    })
}

/// Explicit-id inserts leave a serial sequence behind; move it past the copied ids.
async fn advance_sequence<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
    table: &str,
) -> Result<(), DbErr> {
    let sql = format!(
        r#"SELECT setval(pg_get_serial_sequence(:table, 'id'), COALESCE(MAX("id"), 0) + 1, false) FROM {}"#,
        runner.dialect().quote_ident(table)
    );
    runner
        .query(&sql, &Params::new().bind("table", table), false)
        .await?;
    debug!(table, "sequence advanced");
    Ok(())
}
