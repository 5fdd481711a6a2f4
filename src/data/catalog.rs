//! Catalog entities that became translatable or multi-currency.

use sea_orm::{ConnectionTrait, DbErr};
use tracing::info;

use crate::sql::{Params, QueryRunner};

pub(crate) struct TranslationCounts {
    pub promotions: u64,
    pub payment_methods: u64,
}

/// Moves promotion and payment method names into their translation tables.
pub(crate) async fn migrate_translations<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
    language_code: &str,
) -> Result<TranslationCounts, DbErr> {
    let params = Params::new().bind("languageCode", language_code);

    let promotions = runner
        .execute(
            r#"INSERT INTO "promotion_translation" ("createdAt", "updatedAt", "languageCode", "name", "description", "baseId")
               SELECT "createdAt", "updatedAt", :languageCode, "name", '', "id" FROM "promotion""#,
            &params,
            true,
        )
        .await?
        .rows_affected();

    let payment_methods = runner
        .execute(
            r#"INSERT INTO "payment_method_translation" ("createdAt", "updatedAt", "languageCode", "name", "description", "baseId")
               SELECT "createdAt", "updatedAt", :languageCode, "name", COALESCE("description", ''), "id" FROM "payment_method""#,
            &params,
            true,
        )
        .await?
        .rows_affected();

    info!(promotions, payment_methods, language_code, "translations created");
    Ok(TranslationCounts {
        promotions,
        payment_methods,
    })
}

/// Channel currency becomes the default currency; the available
/// language/currency lists are seeded from the defaults.
pub(crate) async fn migrate_channel_currencies<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
) -> Result<(), DbErr> {
    let none = Params::new();
    for sql in [
        r#"UPDATE "channel" SET "defaultCurrencyCode" = "currencyCode""#,
        r#"UPDATE "channel" SET "availableLanguageCodes" = COALESCE("defaultLanguageCode", '')"#,
        r#"UPDATE "channel" SET "availableCurrencyCodes" = COALESCE("defaultCurrencyCode", '')"#,
    ] {
        runner.execute(sql, &none, true).await?;
    }
    Ok(())
}

/// Each price takes the default currency of the channel it belongs to.
pub(crate) async fn migrate_variant_prices<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
) -> Result<u64, DbErr> {
    let updated = runner
        .execute(
            r#"UPDATE "product_variant_price" SET "currencyCode" =
               (SELECT "defaultCurrencyCode" FROM "channel" WHERE "channel"."id" = "product_variant_price"."channelId")"#,
            &Params::new(),
            true,
        )
        .await?
        .rows_affected();
    Ok(updated)
}
