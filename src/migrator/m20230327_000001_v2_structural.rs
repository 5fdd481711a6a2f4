use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

use super::idens::{
    Channel, Common, Fulfillment, Order, OrderItem, OrderLine, OrderModification, PaymentMethod,
    ProductVariant, ProductVariantPrice, Promotion, Refund, StockMovement, Zone,
};

/// Foreign key from `stock_movement.orderItemId` to `order_item` in the legacy schema.
const LEGACY_MOVEMENT_ITEM_FK: &str = "FK_cbb0990e398bf7713aebdd38482";
const MOVEMENT_LOCATION_FK: &str = "FK_stock_movement_stock_location";

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20230327_000001_v2_structural"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sqlite = manager.get_database_backend() == DbBackend::Sqlite;

        // The column goes away in cleanup, after the data step has read it.
        if !sqlite {
            manager
                .drop_foreign_key(
                    ForeignKey::drop()
                        .name(LEGACY_MOVEMENT_ITEM_FK)
                        .table(StockMovement::Table)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(StockLocation::Table)
                    .if_not_exists()
                    .col(id())
                    .col(created_at())
                    .col(updated_at())
                    .col(ColumnDef::new(StockLocation::Name).string().not_null())
                    .col(ColumnDef::new(StockLocation::Description).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockLevel::Table)
                    .if_not_exists()
                    .col(id())
                    .col(created_at())
                    .col(updated_at())
                    .col(ColumnDef::new(StockLevel::StockOnHand).integer().not_null())
                    .col(ColumnDef::new(StockLevel::StockAllocated).integer().not_null())
                    .col(ColumnDef::new(StockLevel::ProductVariantId).integer().not_null())
                    .col(ColumnDef::new(StockLevel::StockLocationId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_stock_level_product_variant")
                            .from(StockLevel::Table, StockLevel::ProductVariantId)
                            .to(ProductVariant::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_stock_level_stock_location")
                            .from(StockLevel::Table, StockLevel::StockLocationId)
                            .to(StockLocation::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("IDX_stock_level_variant_location")
                    .table(StockLevel::Table)
                    .col(StockLevel::ProductVariantId)
                    .col(StockLevel::StockLocationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderLineReference::Table)
                    .if_not_exists()
                    .col(id())
                    .col(created_at())
                    .col(updated_at())
                    .col(ColumnDef::new(OrderLineReference::Quantity).integer().not_null())
                    .col(ColumnDef::new(OrderLineReference::FulfillmentId).integer().null())
                    .col(ColumnDef::new(OrderLineReference::ModificationId).integer().null())
                    .col(ColumnDef::new(OrderLineReference::OrderLineId).integer().not_null())
                    .col(ColumnDef::new(OrderLineReference::RefundId).integer().null())
                    .col(ColumnDef::new(OrderLineReference::Discriminator).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_order_line_reference_order_line")
                            .from(OrderLineReference::Table, OrderLineReference::OrderLineId)
                            .to(OrderLine::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_order_line_reference_fulfillment")
                            .from(OrderLineReference::Table, OrderLineReference::FulfillmentId)
                            .to(Fulfillment::Table, Common::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_order_line_reference_modification")
                            .from(OrderLineReference::Table, OrderLineReference::ModificationId)
                            .to(OrderModification::Table, Common::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_order_line_reference_refund")
                            .from(OrderLineReference::Table, OrderLineReference::RefundId)
                            .to(Refund::Table, Common::Id),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("IDX_order_line_reference_order_line", OrderLineReference::OrderLineId),
            ("IDX_order_line_reference_refund", OrderLineReference::RefundId),
            ("IDX_order_line_reference_fulfillment", OrderLineReference::FulfillmentId),
            ("IDX_order_line_reference_modification", OrderLineReference::ModificationId),
            ("IDX_order_line_reference_discriminator", OrderLineReference::Discriminator),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(OrderLineReference::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        create_translation_table(manager, PromotionTranslation::Table, Promotion::Table, true).await?;
        create_translation_table(
            manager,
            PaymentMethodTranslation::Table,
            PaymentMethod::Table,
            true,
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockLocationChannelsChannel::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockLocationChannelsChannel::StockLocationId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockLocationChannelsChannel::ChannelId)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(StockLocationChannelsChannel::StockLocationId)
                            .col(StockLocationChannelsChannel::ChannelId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_stock_location_channels_stock_location")
                            .from(
                                StockLocationChannelsChannel::Table,
                                StockLocationChannelsChannel::StockLocationId,
                            )
                            .to(StockLocation::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_stock_location_channels_channel")
                            .from(
                                StockLocationChannelsChannel::Table,
                                StockLocationChannelsChannel::ChannelId,
                            )
                            .to(Channel::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderFulfillmentsFulfillment::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OrderFulfillmentsFulfillment::OrderId).integer().not_null())
                    .col(
                        ColumnDef::new(OrderFulfillmentsFulfillment::FulfillmentId)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(OrderFulfillmentsFulfillment::OrderId)
                            .col(OrderFulfillmentsFulfillment::FulfillmentId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_order_fulfillments_order")
                            .from(
                                OrderFulfillmentsFulfillment::Table,
                                OrderFulfillmentsFulfillment::OrderId,
                            )
                            .to(Order::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_order_fulfillments_fulfillment")
                            .from(
                                OrderFulfillmentsFulfillment::Table,
                                OrderFulfillmentsFulfillment::FulfillmentId,
                            )
                            .to(Fulfillment::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Region::Table)
                    .if_not_exists()
                    .col(id())
                    .col(created_at())
                    .col(updated_at())
                    .col(ColumnDef::new(Region::Code).string().not_null())
                    .col(ColumnDef::new(Region::Type).string().not_null())
                    .col(ColumnDef::new(Region::Enabled).boolean().not_null())
                    .col(ColumnDef::new(Region::ParentId).integer().null())
                    .col(ColumnDef::new(Region::Discriminator).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_region_parent")
                            .from(Region::Table, Region::ParentId)
                            .to(Region::Table, Common::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        create_translation_table(manager, RegionTranslation::Table, Region::Table, false).await?;

        manager
            .create_table(
                Table::create()
                    .table(ZoneMembersRegion::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ZoneMembersRegion::ZoneId).integer().not_null())
                    .col(ColumnDef::new(ZoneMembersRegion::RegionId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(ZoneMembersRegion::ZoneId)
                            .col(ZoneMembersRegion::RegionId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_zone_members_region_zone")
                            .from(ZoneMembersRegion::Table, ZoneMembersRegion::ZoneId)
                            .to(Zone::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("FK_zone_members_region_region")
                            .from(ZoneMembersRegion::Table, ZoneMembersRegion::RegionId)
                            .to(Region::Table, Common::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // SQLite accepts a single change per ALTER TABLE.
        for column in [
            ColumnDef::new(Channel::Description).string().null().to_owned(),
            ColumnDef::new(Channel::DefaultCurrencyCode).string().null().to_owned(),
            ColumnDef::new(Channel::AvailableLanguageCodes).text().null().to_owned(),
            ColumnDef::new(Channel::AvailableCurrencyCodes).text().null().to_owned(),
        ] {
            add_column(manager, Channel::Table, column).await?;
        }

        add_column(
            manager,
            ProductVariantPrice::Table,
            ColumnDef::new(ProductVariantPrice::CurrencyCode).string().null().to_owned(),
        )
        .await?;

        for column in [
            ColumnDef::new(OrderLine::Quantity).integer().not_null().default(0).to_owned(),
            ColumnDef::new(OrderLine::OrderPlacedQuantity)
                .integer()
                .not_null()
                .default(0)
                .to_owned(),
            ColumnDef::new(OrderLine::ListPriceIncludesTax).boolean().null().to_owned(),
            ColumnDef::new(OrderLine::Adjustments).text().null().to_owned(),
            ColumnDef::new(OrderLine::TaxLines).text().null().to_owned(),
            ColumnDef::new(OrderLine::InitialListPrice).integer().null().to_owned(),
            ColumnDef::new(OrderLine::ListPrice).integer().null().to_owned(),
        ] {
            add_column(manager, OrderLine::Table, column).await?;
        }

        add_column(
            manager,
            StockMovement::Table,
            ColumnDef::new(StockMovement::StockLocationId).integer().null().to_owned(),
        )
        .await?;

        if !sqlite {
            manager
                .create_foreign_key(
                    ForeignKey::create()
                        .name(MOVEMENT_LOCATION_FK)
                        .from(StockMovement::Table, StockMovement::StockLocationId)
                        .to(StockLocation::Table, Common::Id)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sqlite = manager.get_database_backend() == DbBackend::Sqlite;

        if !sqlite {
            manager
                .drop_foreign_key(
                    ForeignKey::drop()
                        .name(MOVEMENT_LOCATION_FK)
                        .table(StockMovement::Table)
                        .to_owned(),
                )
                .await?;
        }

        drop_column(manager, StockMovement::Table, StockMovement::StockLocationId).await?;
        for column in [
            OrderLine::Quantity,
            OrderLine::OrderPlacedQuantity,
            OrderLine::ListPriceIncludesTax,
            OrderLine::Adjustments,
            OrderLine::TaxLines,
            OrderLine::InitialListPrice,
            OrderLine::ListPrice,
        ] {
            drop_column(manager, OrderLine::Table, column).await?;
        }
        drop_column(manager, ProductVariantPrice::Table, ProductVariantPrice::CurrencyCode).await?;
        for column in [
            Channel::Description,
            Channel::DefaultCurrencyCode,
            Channel::AvailableLanguageCodes,
            Channel::AvailableCurrencyCodes,
        ] {
            drop_column(manager, Channel::Table, column).await?;
        }

        drop_table(manager, ZoneMembersRegion::Table).await?;
        drop_table(manager, RegionTranslation::Table).await?;
        drop_table(manager, Region::Table).await?;
        drop_table(manager, OrderFulfillmentsFulfillment::Table).await?;
        drop_table(manager, StockLocationChannelsChannel::Table).await?;
        drop_table(manager, PaymentMethodTranslation::Table).await?;
        drop_table(manager, PromotionTranslation::Table).await?;
        drop_table(manager, OrderLineReference::Table).await?;
        drop_table(manager, StockLevel::Table).await?;
        drop_table(manager, StockLocation::Table).await?;

        if !sqlite {
            manager
                .create_foreign_key(
                    ForeignKey::create()
                        .name(LEGACY_MOVEMENT_ITEM_FK)
                        .from(StockMovement::Table, StockMovement::OrderItemId)
                        .to(OrderItem::Table, Common::Id)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }
}

fn id() -> ColumnDef {
    ColumnDef::new(Common::Id)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn created_at() -> ColumnDef {
    ColumnDef::new(Common::CreatedAt)
        .date_time()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn updated_at() -> ColumnDef {
    ColumnDef::new(Common::UpdatedAt)
        .date_time()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

/// Translation tables share one shape; only promotion and payment method
/// translations carry a description.
async fn create_translation_table<T, B>(
    manager: &SchemaManager<'_>,
    table: T,
    base: B,
    with_description: bool,
) -> Result<(), DbErr>
where
    T: Iden + Clone + 'static,
    B: Iden + 'static,
{
    let fk_name = format!("FK_{}_base", table.to_string());
    let mut stmt = Table::create();
    stmt.table(table.clone())
        .if_not_exists()
        .col(id())
        .col(created_at())
        .col(updated_at())
        .col(ColumnDef::new(Translation::LanguageCode).string().not_null())
        .col(ColumnDef::new(Translation::Name).string().not_null());
    if with_description {
        stmt.col(ColumnDef::new(Translation::Description).text().not_null());
    }
    stmt.col(ColumnDef::new(Translation::BaseId).integer().null())
        .foreign_key(
            ForeignKey::create()
                .name(fk_name)
                .from(table, Translation::BaseId)
                .to(base, Common::Id)
                .on_delete(ForeignKeyAction::Cascade),
        );
    manager.create_table(stmt).await
}

async fn add_column<T: Iden + 'static>(
    manager: &SchemaManager<'_>,
    table: T,
    column: ColumnDef,
) -> Result<(), DbErr> {
    manager
        .alter_table(Table::alter().table(table).add_column(column).to_owned())
        .await
}

async fn drop_column<T: Iden + 'static, C: Iden + 'static>(
    manager: &SchemaManager<'_>,
    table: T,
    column: C,
) -> Result<(), DbErr> {
    manager
        .alter_table(Table::alter().table(table).drop_column(column).to_owned())
        .await
}

async fn drop_table<T: Iden + 'static>(manager: &SchemaManager<'_>, table: T) -> Result<(), DbErr> {
    manager
        .drop_table(Table::drop().table(table).if_exists().to_owned())
        .await
}

#[derive(DeriveIden, Clone)]
enum StockLocation {
    Table,
    #[sea_orm(iden = "name")]
    Name,
    #[sea_orm(iden = "description")]
    Description,
}

#[derive(DeriveIden)]
enum StockLevel {
    Table,
    #[sea_orm(iden = "stockOnHand")]
    StockOnHand,
    #[sea_orm(iden = "stockAllocated")]
    StockAllocated,
    #[sea_orm(iden = "productVariantId")]
    ProductVariantId,
    #[sea_orm(iden = "stockLocationId")]
    StockLocationId,
}

#[derive(DeriveIden, Clone, Copy)]
enum OrderLineReference {
    Table,
    #[sea_orm(iden = "quantity")]
    Quantity,
    #[sea_orm(iden = "fulfillmentId")]
    FulfillmentId,
    #[sea_orm(iden = "modificationId")]
    ModificationId,
    #[sea_orm(iden = "orderLineId")]
    OrderLineId,
    #[sea_orm(iden = "refundId")]
    RefundId,
    #[sea_orm(iden = "discriminator")]
    Discriminator,
}

#[derive(DeriveIden, Clone)]
enum PromotionTranslation {
    Table,
}

#[derive(DeriveIden, Clone)]
enum PaymentMethodTranslation {
    Table,
}

#[derive(DeriveIden, Clone)]
enum RegionTranslation {
    Table,
}

#[derive(DeriveIden)]
enum Translation {
    #[sea_orm(iden = "languageCode")]
    LanguageCode,
    #[sea_orm(iden = "name")]
    Name,
    #[sea_orm(iden = "description")]
    Description,
    #[sea_orm(iden = "baseId")]
    BaseId,
}

#[derive(DeriveIden)]
enum StockLocationChannelsChannel {
    Table,
    #[sea_orm(iden = "stockLocationId")]
    StockLocationId,
    #[sea_orm(iden = "channelId")]
    ChannelId,
}

#[derive(DeriveIden)]
enum OrderFulfillmentsFulfillment {
    Table,
    #[sea_orm(iden = "orderId")]
    OrderId,
    #[sea_orm(iden = "fulfillmentId")]
    FulfillmentId,
}

#[derive(DeriveIden, Clone)]
enum Region {
    Table,
    #[sea_orm(iden = "code")]
    Code,
    #[sea_orm(iden = "type")]
    Type,
    #[sea_orm(iden = "enabled")]
    Enabled,
    #[sea_orm(iden = "parentId")]
    ParentId,
    #[sea_orm(iden = "discriminator")]
    Discriminator,
}

#[derive(DeriveIden)]
enum ZoneMembersRegion {
    Table,
    #[sea_orm(iden = "zoneId")]
    ZoneId,
    #[sea_orm(iden = "regionId")]
    RegionId,
}
