use std::sync::RwLock;

use once_cell::sync::Lazy;
use sea_orm_migration::prelude::*;

use crate::data::DataMigrationOptions;

mod m20230327_000001_v2_structural;
mod m20230327_000002_v2_data;
mod m20230327_000003_v2_cleanup;

/// Structural, data and cleanup steps, applied strictly in that order.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20230327_000001_v2_structural::Migration),
            Box::new(m20230327_000002_v2_data::Migration),
            Box::new(m20230327_000003_v2_cleanup::Migration),
        ]
    }
}

/// Settings the data step picks up when the migrator runs it.
#[derive(Debug, Clone, Default)]
pub struct DataStepSettings {
    pub schema: Option<String>,
    pub options: DataMigrationOptions,
}

static DATA_STEP: Lazy<RwLock<DataStepSettings>> =
    Lazy::new(|| RwLock::new(DataStepSettings::default()));

/// Replaces the settings used by the data step for the rest of the process.
pub fn configure(settings: DataStepSettings) {
    let mut guard = DATA_STEP.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = settings;
}

pub(crate) fn data_step_settings() -> DataStepSettings {
    DATA_STEP
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Column and table names shared by the steps. Names are the camelCase ones
/// of the existing schema.
pub(crate) mod idens {
    use sea_orm_migration::prelude::*;

    #[derive(DeriveIden)]
    pub enum Common {
        #[sea_orm(iden = "id")]
        Id,
        #[sea_orm(iden = "createdAt")]
        CreatedAt,
        #[sea_orm(iden = "updatedAt")]
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Channel {
        Table,
        #[sea_orm(iden = "description")]
        Description,
        #[sea_orm(iden = "currencyCode")]
        CurrencyCode,
        #[sea_orm(iden = "defaultCurrencyCode")]
        DefaultCurrencyCode,
        #[sea_orm(iden = "availableLanguageCodes")]
        AvailableLanguageCodes,
        #[sea_orm(iden = "availableCurrencyCodes")]
        AvailableCurrencyCodes,
    }

    #[derive(DeriveIden)]
    pub enum ProductVariant {
        Table,
        #[sea_orm(iden = "stockOnHand")]
        StockOnHand,
        #[sea_orm(iden = "stockAllocated")]
        StockAllocated,
    }

    #[derive(DeriveIden)]
    pub enum ProductVariantPrice {
        Table,
        #[sea_orm(iden = "currencyCode")]
        CurrencyCode,
    }

    #[derive(DeriveIden)]
    pub enum Promotion {
        Table,
        #[sea_orm(iden = "name")]
        Name,
    }

    #[derive(DeriveIden)]
    pub enum PaymentMethod {
        Table,
        #[sea_orm(iden = "name")]
        Name,
        #[sea_orm(iden = "description")]
        Description,
    }

    #[derive(DeriveIden)]
    pub enum Order {
        Table,
    }

    #[derive(DeriveIden)]
    pub enum OrderLine {
        Table,
        #[sea_orm(iden = "quantity")]
        Quantity,
        #[sea_orm(iden = "orderPlacedQuantity")]
        OrderPlacedQuantity,
        #[sea_orm(iden = "listPriceIncludesTax")]
        ListPriceIncludesTax,
        #[sea_orm(iden = "adjustments")]
        Adjustments,
        #[sea_orm(iden = "taxLines")]
        TaxLines,
        #[sea_orm(iden = "initialListPrice")]
        InitialListPrice,
        #[sea_orm(iden = "listPrice")]
        ListPrice,
    }

    #[derive(DeriveIden)]
    pub enum OrderItem {
        Table,
    }

    #[derive(DeriveIden)]
    pub enum OrderItemFulfillmentsFulfillment {
        #[sea_orm(iden = "order_item_fulfillments_fulfillment")]
        Table,
    }

    #[derive(DeriveIden)]
    pub enum OrderModificationOrderItemsOrderItem {
        #[sea_orm(iden = "order_modification_order_items_order_item")]
        Table,
    }

    #[derive(DeriveIden)]
    pub enum StockMovement {
        Table,
        #[sea_orm(iden = "orderItemId")]
        OrderItemId,
        #[sea_orm(iden = "stockLocationId")]
        StockLocationId,
    }

    #[derive(DeriveIden)]
    pub enum Fulfillment {
        Table,
    }

    #[derive(DeriveIden)]
    pub enum Refund {
        Table,
    }

    #[derive(DeriveIden)]
    pub enum OrderModification {
        Table,
    }

    #[derive(DeriveIden)]
    pub enum Zone {
        Table,
    }
}
