//! Order-line aggregation.
//!
//! Every order line takes its quantities from the count of its legacy items
//! and its price, tax and adjustment data from a representative item: the
//! earliest non-cancelled item, or the earliest item when all are cancelled.
//! Ties on `createdAt` are broken by id. Adjustment amounts were spread across
//! item rows and are multiplied back up by the total item count.

use sea_orm::{ConnectionTrait, DbErr, FromQueryResult};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use tracing::{debug, info};

use super::AggregationStrategy;
use crate::sql::{postgres_to_mysql, Dialect, Params, QueryRunner};

const REPRESENTATIVE: &str = r#"(SELECT "r"."id" FROM "order_item" AS "r" WHERE "r"."lineId" = "order_line"."id" ORDER BY "r"."cancelled" ASC, "r"."createdAt" ASC, "r"."id" ASC LIMIT 1)"#;
const ITEM_COUNT: &str =
    r#"(SELECT COUNT(*) FROM "order_item" AS "c" WHERE "c"."lineId" = "order_line"."id")"#;

/// One entry of the legacy `adjustments` JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Adjustment {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub adjustment_source: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Number>,
}

impl Adjustment {
    /// Returns a copy with `amount` multiplied by `factor`.
    pub fn scaled(&self, factor: i64) -> Self {
        Self {
            amount: self.amount.as_ref().and_then(|amount| scale(amount, factor)),
            ..self.clone()
        }
    }
}

fn scale(amount: &Number, factor: i64) -> Option<Number> {
    amount
        .as_i64()
        .and_then(|value| value.checked_mul(factor))
        .map(Number::from)
        .or_else(|| amount.as_f64().and_then(|value| Number::from_f64(value * factor as f64)))
}

/// A legacy order item as read by the row-by-row path.
#[derive(Debug, Clone, Default, PartialEq, FromQueryResult)]
pub struct LegacyItem {
    pub id: i32,
    pub cancelled: bool,
    pub adjustments: Option<String>,
    pub tax_lines: Option<String>,
    pub list_price: Option<i32>,
    pub list_price_includes_tax: Option<bool>,
    pub initial_list_price: Option<i32>,
}

/// Line-level values derived from a line's items.
#[derive(Debug, Clone, PartialEq)]
pub struct LineAggregate {
    pub quantity: i32,
    pub order_placed_quantity: i32,
    pub list_price_includes_tax: bool,
    pub adjustments: Vec<Adjustment>,
    pub tax_lines: String,
    pub initial_list_price: i32,
    pub list_price: i32,
}

impl LineAggregate {
    /// Aggregates the items of one line.
    ///
    /// `items` are expected in creation order; the representative is the
    /// first non-cancelled one, falling back to the first item.
    pub fn from_items(items: &[LegacyItem]) -> Result<Self, DbErr> {
        let quantity = items.iter().filter(|item| !item.cancelled).count();
        let placed = items.len();
        let representative = items.iter().find(|item| !item.cancelled).or(items.first());

        let Some(item) = representative else {
            return Ok(Self::empty());
        };

        let factor = i64::try_from(placed).map_err(|_| too_many(placed))?;
        let adjustments = match item.adjustments.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str::<Vec<Adjustment>>(raw)
                .map_err(|err| {
                    DbErr::Json(format!("order item {} has malformed adjustments: {err}", item.id))
                })?
                .iter()
                .map(|adjustment| adjustment.scaled(factor))
                .collect(),
        };

        Ok(Self {
            quantity: i32::try_from(quantity).map_err(|_| too_many(quantity))?,
            order_placed_quantity: i32::try_from(placed).map_err(|_| too_many(placed))?,
            list_price_includes_tax: item.list_price_includes_tax.unwrap_or(false),
            adjustments,
            tax_lines: item.tax_lines.clone().unwrap_or_else(|| "[]".to_string()),
            initial_list_price: item.initial_list_price.unwrap_or(0),
            list_price: item.list_price.unwrap_or(0),
        })
    }

    /// Values for a line without items: fully cancelled.
    pub fn empty() -> Self {
        Self {
            quantity: 0,
            order_placed_quantity: 0,
            list_price_includes_tax: false,
            adjustments: Vec::new(),
            tax_lines: "[]".to_string(),
            initial_list_price: 0,
            list_price: 0,
        }
    }

    fn adjustments_json(&self) -> Result<String, DbErr> {
        serde_json::to_string(&self.adjustments).map_err(|err| DbErr::Json(err.to_string()))
    }
}

fn too_many(count: usize) -> DbErr {
    DbErr::Custom(format!("order line has {count} items, more than fit a quantity column"))
}

#[derive(Debug, FromQueryResult)]
struct LineId {
    id: i32,
}

/// Runs the aggregation and returns the strategy used and the number of lines.
pub(crate) async fn aggregate<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
    requested: AggregationStrategy,
) -> Result<(AggregationStrategy, u64), DbErr> {
    let strategy = resolve_strategy(runner, requested).await?;
    let lines = count_lines(runner).await?;
    info!(lines, %strategy, "transferring order item data to order lines");

    match strategy {
        AggregationStrategy::RowByRow => row_by_row(runner).await?,
        AggregationStrategy::Auto | AggregationStrategy::Bulk => {
            runner
                .execute(&bulk_statement(runner.dialect()), &Params::new(), false)
                .await?;
        }
    }
    Ok((strategy, lines))
}

async fn resolve_strategy<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
    requested: AggregationStrategy,
) -> Result<AggregationStrategy, DbErr> {
    if requested != AggregationStrategy::Auto {
        return Ok(requested);
    }
    if runner.dialect() != Dialect::Mysql {
        return Ok(AggregationStrategy::Bulk);
    }
    let version = runner
        .query(r#"SELECT VERSION() AS "version""#, &Params::new(), true)
        .await?
        .first()
        .map(|row| row.try_get::<String>("", "version"))
        .transpose()?
        .unwrap_or_default();
    debug!(%version, "detected server version");
    Ok(if is_mariadb(&version) {
        AggregationStrategy::RowByRow
    } else {
        AggregationStrategy::Bulk
    })
}

/// MariaDB reports itself as e.g. `10.6.12-MariaDB-1:10.6.12+maria~ubu2004`.
pub(crate) fn is_mariadb(version: &str) -> bool {
    version.to_ascii_lowercase().contains("mariadb")
}

async fn count_lines<C: ConnectionTrait>(runner: &QueryRunner<'_, C>) -> Result<u64, DbErr> {
    let count = runner
        .query(r#"SELECT COUNT(*) AS "count" FROM "order_line""#, &Params::new(), true)
        .await?
        .first()
        .map(|row| row.try_get::<i64>("", "count"))
        .transpose()?
        .unwrap_or(0);
    Ok(u64::try_from(count).unwrap_or(0))
}

async fn row_by_row<C: ConnectionTrait>(runner: &QueryRunner<'_, C>) -> Result<(), DbErr> {
    let lines: Vec<LineId> = runner
        .query_as(r#"SELECT "id" FROM "order_line" ORDER BY "id""#, &Params::new(), true)
        .await?;

    for line in lines {
        let items: Vec<LegacyItem> = runner
            .query_as(
                r#"SELECT "id", "cancelled", "adjustments", "taxLines" AS "tax_lines", "listPrice" AS "list_price",
                          "listPriceIncludesTax" AS "list_price_includes_tax", "initialListPrice" AS "initial_list_price"
                   FROM "order_item" WHERE "lineId" = :lineId
                   ORDER BY "cancelled" ASC, "createdAt" ASC, "id" ASC"#,
                &Params::new().bind("lineId", line.id),
                true,
            )
            .await?;
        let aggregate = LineAggregate::from_items(&items)?;

        let params = Params::new()
            .bind("lineId", line.id)
            .bind("quantity", aggregate.quantity)
            .bind("orderPlacedQuantity", aggregate.order_placed_quantity)
            .bind("listPriceIncludesTax", aggregate.list_price_includes_tax)
            .bind("adjustments", aggregate.adjustments_json()?)
            .bind("taxLines", aggregate.tax_lines.clone())
            .bind("initialListPrice", aggregate.initial_list_price)
            .bind("listPrice", aggregate.list_price);
        runner
            .execute(
                r#"UPDATE "order_line" SET "quantity" = :quantity, "orderPlacedQuantity" = :orderPlacedQuantity,
                       "listPriceIncludesTax" = :listPriceIncludesTax, "adjustments" = :adjustments,
                       "taxLines" = :taxLines, "initialListPrice" = :initialListPrice, "listPrice" = :listPrice
                   WHERE "id" = :lineId"#,
                &params,
                true,
            )
            .await?;
    }
    Ok(())
}

/// The single-statement aggregation for `dialect`.
///
/// Scalar columns share one reference-dialect form; the adjustments column
/// needs each engine's own JSON functions.
pub(crate) fn bulk_statement(dialect: Dialect) -> String {
    let scalar = |column: &str, fallback: &str| {
        dialect
            .translate(&format!(
                r#""{column}" = COALESCE((SELECT "i"."{column}" FROM "order_item" AS "i" WHERE "i"."id" = {REPRESENTATIVE}), {fallback})"#
            ))
            .into_owned()
    };

    let assignments = [
        dialect
            .translate(r#""quantity" = (SELECT COUNT(*) FROM "order_item" AS "c" WHERE "c"."lineId" = "order_line"."id" AND NOT "c"."cancelled")"#)
            .into_owned(),
        dialect
            .translate(&format!(r#""orderPlacedQuantity" = {ITEM_COUNT}"#))
            .into_owned(),
        scalar("listPriceIncludesTax", "false"),
        adjustments_assignment(dialect),
        scalar("taxLines", "'[]'"),
        scalar("initialListPrice", "0"),
        scalar("listPrice", "0"),
    ];

    format!(
        "UPDATE {} SET {}",
        dialect.quote_ident("order_line"),
        assignments.join(", ")
    )
}

/// Blank adjustments count as none, as in [`LineAggregate::from_items`].
/// MySQL keeps integer amounts integral and scales the rest as doubles.
fn adjustments_assignment(dialect: Dialect) -> String {
    match dialect {
        Dialect::Postgres => format!(
            r#""adjustments" = COALESCE((SELECT json_agg(json_build_object('type', "adj"->>'type', 'adjustmentSource', "adj"->>'adjustmentSource', 'description', "adj"->>'description', 'amount', ("adj"->>'amount')::numeric * {ITEM_COUNT}))::text FROM "order_item" AS "i" CROSS JOIN jsonb_array_elements(NULLIF(TRIM("i"."adjustments"), '')::jsonb) AS "adj" WHERE "i"."id" = {REPRESENTATIVE}), '[]')"#
        ),
        Dialect::Mysql => format!(
            r#"`adjustments` = COALESCE((SELECT JSON_ARRAYAGG(JSON_OBJECT('type', `adj`.`type`, 'adjustmentSource', `adj`.`adjustmentSource`, 'description', `adj`.`description`, 'amount', CASE JSON_TYPE(`adj`.`amount`) WHEN 'NULL' THEN NULL WHEN 'INTEGER' THEN CAST(CAST(`adj`.`amount` AS SIGNED) * {count} AS JSON) ELSE CAST(CAST(`adj`.`amount` AS DOUBLE) * {count} AS JSON) END)) FROM `order_item` AS `i` CROSS JOIN JSON_TABLE(NULLIF(TRIM(`i`.`adjustments`), ''), '$[*]' COLUMNS (`type` VARCHAR(255) PATH '$.type', `adjustmentSource` VARCHAR(255) PATH '$.adjustmentSource', `description` TEXT PATH '$.description', `amount` JSON PATH '$.amount')) AS `adj` WHERE `i`.`id` = {representative}), '[]')"#,
            count = postgres_to_mysql(ITEM_COUNT),
            representative = postgres_to_mysql(REPRESENTATIVE),
        ),
        Dialect::Sqlite => format!(
            r#""adjustments" = COALESCE((SELECT json_group_array(json_object('type', json_extract("adj"."value", '$.type'), 'adjustmentSource', json_extract("adj"."value", '$.adjustmentSource'), 'description', json_extract("adj"."value", '$.description'), 'amount', json_extract("adj"."value", '$.amount') * {ITEM_COUNT})) FROM "order_item" AS "i", json_each(NULLIF(TRIM("i"."adjustments"), '')) AS "adj" WHERE "i"."id" = {REPRESENTATIVE}), '[]')"#
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::bind_named;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use serde_json::json;

    fn item(id: i32, cancelled: bool) -> LegacyItem {
        LegacyItem {
            id,
            cancelled,
            adjustments: Some(
                json!([{"type": "PROMOTION", "adjustmentSource": "PROMOTION:1", "description": "10% off", "amount": -150}])
                    .to_string(),
            ),
            tax_lines: Some(r#"[{"description":"VAT","taxRate":20}]"#.to_string()),
            list_price: Some(1000 + id),
            list_price_includes_tax: Some(true),
            initial_list_price: Some(1000),
        }
    }

    #[test]
    fn counts_placed_and_live_items() {
        let aggregate = LineAggregate::from_items(&[item(1, false), item(2, true), item(3, false)]).unwrap();
        assert_eq!(aggregate.quantity, 2);
        assert_eq!(aggregate.order_placed_quantity, 3);
        assert_eq!(aggregate.list_price, 1001);
        assert!(aggregate.list_price_includes_tax);
    }

    #[test]
    fn representative_skips_cancelled_items() {
        let aggregate = LineAggregate::from_items(&[item(1, true), item(2, false)]).unwrap();
        assert_eq!(aggregate.list_price, 1002);
    }

    #[test]
    fn fully_cancelled_line_uses_first_item() {
        let aggregate = LineAggregate::from_items(&[item(4, true), item(5, true)]).unwrap();
        assert_eq!(aggregate.quantity, 0);
        assert_eq!(aggregate.order_placed_quantity, 2);
        assert_eq!(aggregate.list_price, 1004);
    }

    #[test]
    fn line_without_items_gets_defaults() {
        let aggregate = LineAggregate::from_items(&[]).unwrap();
        assert_eq!(aggregate, LineAggregate::empty());
        assert_eq!(aggregate.adjustments_json().unwrap(), "[]");
    }

    #[test]
    fn adjustments_scale_by_item_count() {
        let aggregate = LineAggregate::from_items(&[item(1, false), item(2, false), item(3, true)]).unwrap();
        assert_eq!(aggregate.adjustments.len(), 1);
        assert_eq!(aggregate.adjustments[0].amount, Some(Number::from(-450)));
        let written: serde_json::Value =
            serde_json::from_str(&aggregate.adjustments_json().unwrap()).unwrap();
        assert_eq!(
            written,
            json!([{"type": "PROMOTION", "adjustmentSource": "PROMOTION:1", "description": "10% off", "amount": -450}])
        );
    }

    #[test]
    fn missing_scalars_default() {
        let bare = LegacyItem {
            id: 9,
            ..LegacyItem::default()
        };
        let aggregate = LineAggregate::from_items(&[bare]).unwrap();
        assert_eq!(aggregate.tax_lines, "[]");
        assert_eq!(aggregate.list_price, 0);
        assert!(!aggregate.list_price_includes_tax);
        assert!(aggregate.adjustments.is_empty());
    }

    #[test]
    fn fractional_and_absent_amounts() {
        let half = Adjustment {
            amount: Number::from_f64(1.5),
            ..Adjustment::default()
        };
        assert_eq!(half.scaled(2).amount.and_then(|n| n.as_f64()), Some(3.0));
        assert_eq!(Adjustment::default().scaled(3).amount, None);
    }

    #[test]
    fn malformed_adjustments_are_reported() {
        let broken = LegacyItem {
            id: 3,
            adjustments: Some("{not json".to_string()),
            ..LegacyItem::default()
        };
        assert_matches!(LineAggregate::from_items(&[broken]), Err(DbErr::Json(msg)) if msg.contains("order item 3"));
    }

    #[test]
    fn mariadb_detection() {
        assert!(is_mariadb("10.6.12-MariaDB-1:10.6.12+maria~ubu2004"));
        assert!(!is_mariadb("8.0.36"));
    }

    #[test]
    fn bulk_statements_bind_without_parameters() {
        for dialect in [Dialect::Postgres, Dialect::Mysql, Dialect::Sqlite] {
            let sql = bulk_statement(dialect);
            let (bound, values) = bind_named(dialect, &sql, &Params::new()).unwrap();
            assert_eq!(bound, sql);
            assert!(values.is_empty());
        }
    }

    #[test]
    fn mysql_bulk_statement_is_backtick_quoted() {
        let sql = bulk_statement(Dialect::Mysql);
        assert!(!sql.contains('"'));
        assert!(sql.starts_with("UPDATE `order_line` SET `quantity`"));
        assert!(sql.contains("JSON_TABLE"));
        assert!(bulk_statement(Dialect::Postgres).contains("jsonb_array_elements"));
        assert!(bulk_statement(Dialect::Sqlite).contains("json_each"));
    }

    #[test]
    fn blank_adjustments_are_empty_on_every_path() {
        for raw in ["", "   "] {
            let blank = LegacyItem {
                id: 11,
                adjustments: Some(raw.to_string()),
                ..LegacyItem::default()
            };
            let aggregate = LineAggregate::from_items(&[blank]).unwrap();
            assert_eq!(aggregate.adjustments_json().unwrap(), "[]");
        }
        for dialect in [Dialect::Postgres, Dialect::Mysql, Dialect::Sqlite] {
            let adjustments = dialect.translate(r#"NULLIF(TRIM("i"."adjustments"), '')"#);
            assert!(bulk_statement(dialect).contains(adjustments.as_ref()), "{dialect}");
        }
    }

    #[test]
    fn mysql_amounts_keep_their_json_number_kind() {
        let sql = bulk_statement(Dialect::Mysql);
        assert!(!sql.contains("BIGINT"));
        assert!(sql.contains("`amount` JSON PATH '$.amount'"));
        assert!(sql.contains("WHEN 'INTEGER' THEN CAST(CAST(`adj`.`amount` AS SIGNED)"));
        assert!(sql.contains("ELSE CAST(CAST(`adj`.`amount` AS DOUBLE)"));
    }

    proptest! {
        #[test]
        fn quantities_match_item_counts(flags in proptest::collection::vec(any::<bool>(), 0..40), amount in -10_000i64..10_000) {
            let items: Vec<LegacyItem> = flags
                .iter()
                .enumerate()
                .map(|(i, cancelled)| LegacyItem {
                    id: i as i32 + 1,
                    cancelled: *cancelled,
                    adjustments: Some(json!([{"type": "DISTRIBUTED_ORDER_PROMOTION", "amount": amount}]).to_string()),
                    ..LegacyItem::default()
                })
                .collect();
            let aggregate = LineAggregate::from_items(&items).unwrap();
            prop_assert_eq!(aggregate.quantity as usize, flags.iter().filter(|c| !**c).count());
            prop_assert_eq!(aggregate.order_placed_quantity as usize, flags.len());
            if !flags.is_empty() {
                prop_assert_eq!(aggregate.adjustments[0].amount.as_ref().and_then(|n| n.as_i64()), Some(amount * flags.len() as i64));
            }
        }
    }
}
