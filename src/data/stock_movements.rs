//! Consolidation of per-item stock movements into per-line movements.

use std::collections::{HashMap, HashSet};

use sea_orm::{ConnectionTrait, DbErr, FromQueryResult};
use tracing::info;

use super::MovementCounts;
use crate::sql::{Params, QueryRunner};

/// Legacy movement types that were recorded once per order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Cancellation,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromQueryResult)]
pub struct ItemMovement {
    pub id: i32,
    pub order_line_id: i32,
}

/// Keep/delete decisions for one movement type.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConsolidationPlan {
    /// `(movement id, order line id, quantity)` for the surviving row of each line.
    pub keep: Vec<(i32, i32, i32)>,
    pub delete: Vec<i32>,
}

/// Keeps the first movement seen for each line, with the line's movement count
/// as its quantity, and deletes the rest.
pub fn plan_consolidation(movements: &[ItemMovement]) -> ConsolidationPlan {
    let mut counts: HashMap<i32, i32> = HashMap::new();
    for movement in movements {
        *counts.entry(movement.order_line_id).or_default() += 1;
    }

    let mut seen = HashSet::new();
    let mut plan = ConsolidationPlan::default();
    for movement in movements {
        if seen.insert(movement.order_line_id) {
            let quantity = counts.get(&movement.order_line_id).copied().unwrap_or(1);
            plan.keep.push((movement.id, movement.order_line_id, quantity));
        } else {
            plan.delete.push(movement.id);
        }
    }
    plan
}

pub(crate) async fn consolidate<C: ConnectionTrait>(
    runner: &QueryRunner<'_, C>,
    movement_type: MovementType,
) -> Result<MovementCounts, DbErr> {
    let movements: Vec<ItemMovement> = runner
        .query_as(
            r#"SELECT "sm"."id" AS "id", "oi"."lineId" AS "order_line_id"
               FROM "stock_movement" AS "sm"
               INNER JOIN "order_item" AS "oi" ON "sm"."orderItemId" = "oi"."id"
               WHERE "sm"."type" = :type
               ORDER BY "sm"."id""#,
            &Params::new().bind("type", movement_type.to_string()),
            true,
        )
        .await?;
    info!(%movement_type, movements = movements.len(), "consolidating stock movements");

    let plan = plan_consolidation(&movements);

    for &(id, order_line_id, quantity) in &plan.keep {
        runner
            .execute(
                r#"UPDATE "stock_movement" SET "orderLineId" = :orderLineId, "quantity" = :quantity WHERE "id" = :id"#,
                &Params::new()
                    .bind("orderLineId", order_line_id)
                    .bind("quantity", quantity)
                    .bind("id", id),
                true,
            )
            .await?;
    }
    for &id in &plan.delete {
        runner
            .execute(
                r#"DELETE FROM "stock_movement" WHERE "id" = :id"#,
                &Params::new().bind("id", id),
                true,
            )
            .await?;
    }

    Ok(MovementCounts {
        kept: plan.keep.len() as u64,
        deleted: plan.delete.len() as u64,
    })
}
