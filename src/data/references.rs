//! Item-level refund, fulfillment and modification links become
//! `order_line_reference` rows.

use sea_orm::{ConnectionTrait, DbErr};
use tracing::info;

use crate::sql::{Params, QueryRunner};

/// Discriminator values of `order_line_reference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum ReferenceKind {
    RefundLine,
    FulfillmentLine,
    OrderModificationLine,
}

pub(crate) struct ReferenceCounts {
    pub refund_lines: u64,
    pub fulfillment_lines: u64,
    pub order_fulfillments: u64,
    pub modification_lines: u64,
}

pub(crate) async fn build<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
) -> Result<ReferenceCounts, DbErr> {
    let refund_lines = insert(
        runner,
        ReferenceKind::RefundLine,
        r#"INSERT INTO "order_line_reference" ("createdAt", "updatedAt", "orderLineId", "discriminator", "quantity", "refundId")
           SELECT MIN("oi"."createdAt"), MAX("oi"."updatedAt"), "ol"."id", :discriminator, COUNT("oi"."id"), "oi"."refundId"
           FROM "order_line" AS "ol"
           INNER JOIN "order_item" AS "oi" ON "oi"."lineId" = "ol"."id"
           WHERE "oi"."refundId" IS NOT NULL
           GROUP BY "oi"."refundId", "ol"."id""#,
    )
    .await?;

    let fulfillment_lines = insert(
        runner,
        ReferenceKind::FulfillmentLine,
        r#"INSERT INTO "order_line_reference" ("createdAt", "updatedAt", "orderLineId", "discriminator", "quantity", "fulfillmentId")
           SELECT "f"."createdAt", "f"."updatedAt", "ol"."id", :discriminator, COUNT("oif"."fulfillmentId"), "f"."id"
           FROM "order_line" AS "ol"
           INNER JOIN "order_item" AS "oi" ON "oi"."lineId" = "ol"."id"
           INNER JOIN "order_item_fulfillments_fulfillment" AS "oif" ON "oif"."orderItemId" = "oi"."id"
           INNER JOIN "fulfillment" AS "f" ON "oif"."fulfillmentId" = "f"."id"
           GROUP BY "ol"."id", "f"."id", "f"."createdAt", "f"."updatedAt""#,
    )
    .await?;

    // Orders used to reach their fulfillments only through items.
    let order_fulfillments = insert(
        runner,
        ReferenceKind::FulfillmentLine,
        r#"INSERT INTO "order_fulfillments_fulfillment" ("orderId", "fulfillmentId")
           SELECT DISTINCT "ol"."orderId", "olr"."fulfillmentId"
           FROM "order_line" AS "ol"
           INNER JOIN "order_line_reference" AS "olr" ON "olr"."orderLineId" = "ol"."id"
           WHERE "olr"."discriminator" = :discriminator"#,
    )
    .await?;

    let modification_lines = insert(
        runner,
        ReferenceKind::OrderModificationLine,
        r#"INSERT INTO "order_line_reference" ("createdAt", "updatedAt", "orderLineId", "discriminator", "quantity", "modificationId")
           SELECT "om"."createdAt", "om"."updatedAt", "ol"."id", :discriminator, COUNT("omoi"."orderModificationId"), "om"."id"
           FROM "order_line" AS "ol"
           INNER JOIN "order_item" AS "oi" ON "oi"."lineId" = "ol"."id"
           INNER JOIN "order_modification_order_items_order_item" AS "omoi" ON "omoi"."orderItemId" = "oi"."id"
           INNER JOIN "order_modification" AS "om" ON "omoi"."orderModificationId" = "om"."id"
           GROUP BY "ol"."id", "om"."id", "om"."createdAt", "om"."updatedAt""#,
    )
    .await?;

    info!(
        refund_lines,
        fulfillment_lines, order_fulfillments, modification_lines, "order line references created"
    );
    Ok(ReferenceCounts {
        refund_lines,
        fulfillment_lines,
        order_fulfillments,
        modification_lines,
    })
}

async fn insert<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
    kind: ReferenceKind,
    sql: &str,
) -> Result<u64, DbErr> {
    let params = Params::new().bind("discriminator", kind.to_string());
    Ok(runner.execute(sql, &params, true).await?.rows_affected())
}
