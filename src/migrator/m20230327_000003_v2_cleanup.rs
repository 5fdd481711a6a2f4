use sea_orm_migration::prelude::*;

use super::idens::{
    Channel, OrderItem, OrderItemFulfillmentsFulfillment, OrderModificationOrderItemsOrderItem,
    PaymentMethod, ProductVariant, Promotion, StockMovement,
};

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20230327_000003_v2_cleanup"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let columns: [(DynIden, DynIden); 7] = [
            (Channel::Table.into_iden(), Channel::CurrencyCode.into_iden()),
            (ProductVariant::Table.into_iden(), ProductVariant::StockOnHand.into_iden()),
            (ProductVariant::Table.into_iden(), ProductVariant::StockAllocated.into_iden()),
            (Promotion::Table.into_iden(), Promotion::Name.into_iden()),
            (PaymentMethod::Table.into_iden(), PaymentMethod::Name.into_iden()),
            (PaymentMethod::Table.into_iden(), PaymentMethod::Description.into_iden()),
            (StockMovement::Table.into_iden(), StockMovement::OrderItemId.into_iden()),
        ];
        for (table, column) in columns {
            manager
                .alter_table(Table::alter().table(table).drop_column(column).to_owned())
                .await?;
        }

        // Join tables first; they reference order_item.
        manager
            .drop_table(
                Table::drop()
                    .table(OrderItemFulfillmentsFulfillment::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(OrderModificationOrderItemsOrderItem::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItem::Table).to_owned())
            .await
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Err(DbErr::Migration(
            "dropped legacy order columns and tables cannot be restored; restore from a backup"
                .to_owned(),
        ))
    }
}
