#![allow(dead_code)]

use order_line_migrate::{
    db::{self, DbConfig, DbPool},
    Migrator,
};
use sea_orm::{ConnectionTrait, DatabaseBackend as DbBackend, QueryResult, Statement};
use sea_orm_migration::MigratorTrait;

/// Tables of the item-level schema the migration starts from, with `{pk}` and
/// `{ts}` left to each engine. No foreign keys here: SQLite refuses to drop a
/// column that takes part in one.
const LEGACY_SCHEMA: &[&str] = &[
    r#"CREATE TABLE "channel" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "code" varchar(255) NOT NULL,
        "defaultLanguageCode" varchar(255) NOT NULL,
        "currencyCode" varchar(255) NOT NULL
    )"#,
    r#"CREATE TABLE "promotion" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "name" varchar(255) NOT NULL
    )"#,
    r#"CREATE TABLE "payment_method" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "code" varchar(255) NOT NULL,
        "name" varchar(255) NOT NULL,
        "description" text
    )"#,
    r#"CREATE TABLE "product_variant" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "sku" varchar(255) NOT NULL,
        "stockOnHand" integer NOT NULL DEFAULT 0,
        "stockAllocated" integer NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE "product_variant_price" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "price" integer NOT NULL,
        "channelId" integer NOT NULL,
        "variantId" integer
    )"#,
    r#"CREATE TABLE "order" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "code" varchar(255) NOT NULL
    )"#,
    r#"CREATE TABLE "order_line" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "orderId" integer,
        "productVariantId" integer
    )"#,
    r#"CREATE TABLE "order_item" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "lineId" integer NOT NULL,
        "cancelled" boolean NOT NULL DEFAULT false,
        "refundId" integer,
        "adjustments" text,
        "taxLines" text,
        "listPrice" integer,
        "listPriceIncludesTax" boolean,
        "initialListPrice" integer
    )"#,
    r#"CREATE TABLE "refund" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "total" integer NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE "fulfillment" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "method" varchar(255) NOT NULL
    )"#,
    r#"CREATE TABLE "order_item_fulfillments_fulfillment" (
        "orderItemId" integer NOT NULL,
        "fulfillmentId" integer NOT NULL,
        PRIMARY KEY ("orderItemId", "fulfillmentId")
    )"#,
    r#"CREATE TABLE "order_modification" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "orderId" integer,
        "note" varchar(255) NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE "order_modification_order_items_order_item" (
        "orderModificationId" integer NOT NULL,
        "orderItemId" integer NOT NULL,
        PRIMARY KEY ("orderModificationId", "orderItemId")
    )"#,
    r#"CREATE TABLE "stock_movement" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "type" varchar(255) NOT NULL,
        "quantity" integer NOT NULL,
        "discriminator" varchar(255) NOT NULL,
        "productVariantId" integer,
        "orderItemId" integer,
        "orderLineId" integer
    )"#,
    r#"CREATE TABLE "country" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "code" varchar(255) NOT NULL,
        "enabled" boolean NOT NULL
    )"#,
    r#"CREATE TABLE "country_translation" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "languageCode" varchar(255) NOT NULL,
        "name" varchar(255) NOT NULL,
        "baseId" integer
    )"#,
    r#"CREATE TABLE "zone" (
        "id" {pk},
        "createdAt" {ts},
        "updatedAt" {ts},
        "name" varchar(255) NOT NULL
    )"#,
    r#"CREATE TABLE "zone_members_country" (
        "zoneId" integer NOT NULL,
        "countryId" integer NOT NULL,
        PRIMARY KEY ("zoneId", "countryId")
    )"#,
];

const PROMOTION_ADJUSTMENT: &str = r#"[{"type":"PROMOTION","adjustmentSource":"PROMOTION:1","description":"Summer sale","amount":-100}]"#;
const SHIPPING_ADJUSTMENT: &str = r#"[{"type":"PROMOTION","adjustmentSource":"PROMOTION:1","description":"Summer sale","amount":-50}]"#;
const TAX_LINES: &str = r#"[{"description":"standard tax","taxRate":20}]"#;

/// Order 1 with line A (two live items), line B (one of two items cancelled)
/// and line C (one refunded item), plus the catalog, stock and region rows
/// the rest of the data step reads.
const SCENARIO: &[&str] = &[
    r#"INSERT INTO "channel" ("id", "code", "defaultLanguageCode", "currencyCode") VALUES
        (1, '__default_channel__', 'en', 'USD'), (2, 'eu', 'de', 'EUR')"#,
    r#"INSERT INTO "promotion" ("id", "name") VALUES (1, 'Summer sale')"#,
    r#"INSERT INTO "payment_method" ("id", "code", "name", "description") VALUES
        (1, 'card', 'Card', NULL), (2, 'invoice', 'Invoice', 'Net 30')"#,
    r#"INSERT INTO "product_variant" ("id", "sku", "stockOnHand", "stockAllocated") VALUES
        (1, 'A-1', 10, 2), (2, 'B-1', 5, 1), (3, 'C-1', 0, 0)"#,
    r#"INSERT INTO "product_variant_price" ("id", "price", "channelId", "variantId") VALUES
        (1, 1200, 1, 1), (2, 1100, 2, 1), (3, 500, 1, 2), (4, 800, 1, 3)"#,
    r#"INSERT INTO "order" ("id", "code") VALUES (1, 'ORDER-1')"#,
    r#"INSERT INTO "order_line" ("id", "orderId", "productVariantId") VALUES (1, 1, 1), (2, 1, 2), (3, 1, 3)"#,
    r#"INSERT INTO "refund" ("id", "total") VALUES (1, 800)"#,
    r#"INSERT INTO "fulfillment" ("id", "method") VALUES (1, 'Standard')"#,
    r#"INSERT INTO "order_modification" ("id", "orderId") VALUES (1, 1)"#,
    r#"INSERT INTO "order_item_fulfillments_fulfillment" ("orderItemId", "fulfillmentId") VALUES (1, 1), (2, 1), (4, 1)"#,
    r#"INSERT INTO "order_modification_order_items_order_item" ("orderModificationId", "orderItemId") VALUES (1, 3), (1, 4), (1, 5)"#,
    r#"INSERT INTO "stock_movement" ("id", "type", "quantity", "discriminator", "productVariantId", "orderItemId", "orderLineId") VALUES
        (1, 'SALE', -1, 'Sale', 1, NULL, 1),
        (2, 'RELEASE', 1, 'Release', 1, 1, NULL),
        (3, 'RELEASE', 1, 'Release', 1, 2, NULL),
        (4, 'CANCELLATION', 1, 'Cancellation', 2, 3, NULL),
        (5, 'RELEASE', 1, 'Release', 2, 4, NULL)"#,
    r#"INSERT INTO "country" ("id", "code", "enabled") VALUES (1, 'DE', true), (2, 'AT', false)"#,
    r#"INSERT INTO "country_translation" ("id", "languageCode", "name", "baseId") VALUES
        (1, 'en', 'Germany', 1), (2, 'en', 'Austria', 2)"#,
    r#"INSERT INTO "zone" ("id", "name") VALUES (1, 'Europe')"#,
    r#"INSERT INTO "zone_members_country" ("zoneId", "countryId") VALUES (1, 1), (1, 2)"#,
];

/// Lines the aggregation has to get right beyond the basic scenario: no items,
/// only cancelled items, adjustments with missing keys, blank adjustments and
/// a fractional amount.
const EDGE_LINES: &[&str] = &[
    r#"INSERT INTO "order_line" ("id", "orderId", "productVariantId") VALUES (4, 1, 1), (5, 1, 2), (6, 1, 3), (7, 1, 1), (8, 1, 2)"#,
    r#"INSERT INTO "order_item" ("id", "createdAt", "lineId", "cancelled", "adjustments", "taxLines", "listPrice", "listPriceIncludesTax", "initialListPrice") VALUES
        (6, '2023-01-02 09:00:00', 5, true, '[]', '[]', 700, true, 700),
        (7, '2023-01-01 09:00:00', 5, true, '[]', '[]', 650, true, 650)"#,
    r#"INSERT INTO "order_item" ("id", "createdAt", "lineId", "cancelled", "adjustments") VALUES
        (8, '2023-01-03 09:00:00', 6, false, '[{"type":"DISTRIBUTED_ORDER_PROMOTION","adjustmentSource":"PROMOTION:2","amount":-33},{"type":"OTHER","adjustmentSource":"MANUAL","description":"no amount"}]'),
        (9, '2023-01-03 09:00:00', 6, false, NULL),
        (10, '2023-01-03 09:00:00', 6, true, NULL),
        (11, '2023-01-04 09:00:00', 7, false, ''),
        (12, '2023-01-04 09:00:00', 8, false, '[{"type":"PROMOTION","adjustmentSource":"PROMOTION:3","description":"Quarter off","amount":-1.25}]'),
        (13, '2023-01-04 09:00:00', 8, false, NULL)"#,
];

/// Every table a live run can leave behind, for resetting a MySQL database.
const LIVE_TABLES: &[&str] = &[
    "seaql_migrations",
    "stock_location_channels_channel",
    "stock_level",
    "order_line_reference",
    "order_fulfillments_fulfillment",
    "promotion_translation",
    "payment_method_translation",
    "zone_members_region",
    "region_translation",
    "region",
    "stock_location",
    "channel",
    "promotion",
    "payment_method",
    "product_variant",
    "product_variant_price",
    "order",
    "order_line",
    "order_item",
    "refund",
    "fulfillment",
    "order_item_fulfillments_fulfillment",
    "order_modification",
    "order_modification_order_items_order_item",
    "stock_movement",
    "country",
    "country_translation",
    "zone",
    "zone_members_country",
];

/// The legacy tables rendered for `backend`. Outside SQLite the stock movement
/// keeps the foreign key to its order item that the structural step replaces.
fn legacy_schema(backend: DbBackend) -> Vec<String> {
    let (pk, ts) = match backend {
        DbBackend::Postgres => ("SERIAL PRIMARY KEY", "timestamp NOT NULL DEFAULT now()"),
        DbBackend::MySql => (
            "int NOT NULL AUTO_INCREMENT PRIMARY KEY",
            "datetime NOT NULL DEFAULT CURRENT_TIMESTAMP",
        ),
        _ => (
            "integer PRIMARY KEY AUTOINCREMENT NOT NULL",
            "datetime NOT NULL DEFAULT (CURRENT_TIMESTAMP)",
        ),
    };
    let mut statements: Vec<String> = LEGACY_SCHEMA
        .iter()
        .map(|sql| sql.replace("{pk}", pk).replace("{ts}", ts))
        .collect();
    if backend != DbBackend::Sqlite {
        statements.push(
            r#"ALTER TABLE "stock_movement" ADD CONSTRAINT "FK_cbb0990e398bf7713aebdd38482"
               FOREIGN KEY ("orderItemId") REFERENCES "order_item" ("id")"#
                .to_string(),
        );
    }
    statements
}

pub async fn create_legacy_schema(db: &DbPool) {
    for sql in legacy_schema(db.get_database_backend()) {
        exec(db, &sql).await;
    }
}

/// Opens a fresh in-memory SQLite database holding the legacy schema.
pub async fn legacy_db() -> DbPool {
    let cfg = DbConfig {
        url: "sqlite::memory:".to_string(),
        ..DbConfig::default()
    };
    let db = db::establish_connection_with_config(&cfg)
        .await
        .expect("failed to open sqlite database");
    create_legacy_schema(&db).await;
    db
}

/// Server named by `APP__DATABASE_URL` for the ignored live-engine tests.
pub const LIVE_DATABASE_URL: &str = "APP__DATABASE_URL";

/// Connects to the live server and builds the legacy schema from scratch, or
/// returns `None` when no server is configured.
///
/// PostgreSQL gets a fresh `schema` that the connection searches. MySQL is
/// reset table by table and reads the double-quoted fixture SQL with
/// `ANSI_QUOTES` for the rest of the session.
pub async fn live_db(schema: &str) -> Option<DbPool> {
    let url = std::env::var(LIVE_DATABASE_URL)
        .ok()
        .filter(|url| !url.trim().is_empty())?;
    let cfg = DbConfig {
        url,
        schema: Some(schema.to_string()),
        ..DbConfig::default()
    };
    let db = db::establish_connection_with_config(&cfg)
        .await
        .expect("failed to connect to the live server");

    match db.get_database_backend() {
        DbBackend::Postgres => {
            exec(&db, &format!(r#"DROP SCHEMA IF EXISTS "{schema}" CASCADE"#)).await;
            exec(&db, &format!(r#"CREATE SCHEMA "{schema}""#)).await;
        }
        DbBackend::MySql => {
            exec(
                &db,
                "SET SESSION sql_mode = CONCAT_WS(',', NULLIF(@@SESSION.sql_mode, ''), 'ANSI_QUOTES')",
            )
            .await;
            let tables = LIVE_TABLES
                .iter()
                .map(|table| format!(r#""{table}""#))
                .collect::<Vec<_>>()
                .join(", ");
            let drop = format!("DROP TABLE IF EXISTS {tables}");
            exec_all(
                &db,
                &["SET FOREIGN_KEY_CHECKS = 0", drop.as_str(), "SET FOREIGN_KEY_CHECKS = 1"],
            )
            .await;
        }
        _ => {}
    }
    create_legacy_schema(&db).await;
    Some(db)
}

/// Legacy schema with the structural step applied, ready for the data step.
pub async fn structured_db() -> DbPool {
    let db = legacy_db().await;
    Migrator::up(&db, Some(1))
        .await
        .expect("structural step failed");
    db
}

/// Items go in first: outside SQLite stock movements reference them.
pub async fn seed_scenario(db: &DbPool) {
    let items = format!(
        r#"INSERT INTO "order_item" ("id", "createdAt", "lineId", "cancelled", "refundId", "adjustments", "taxLines", "listPrice", "listPriceIncludesTax", "initialListPrice") VALUES
            (1, '2023-01-01 10:00:00', 1, false, NULL, '{promo}', '{tax}', 1200, true, 1200),
            (2, '2023-01-01 10:00:00', 1, false, NULL, '{promo}', '{tax}', 1200, true, 1200),
            (3, '2023-01-01 10:00:00', 2, true, NULL, '[]', '{tax}', 999, false, 999),
            (4, '2023-01-01 10:05:00', 2, false, NULL, '{shipping}', '{tax}', 500, false, 450),
            (5, '2023-01-01 10:00:00', 3, false, 1, '[]', '[]', 800, true, 800)"#,
        promo = PROMOTION_ADJUSTMENT,
        shipping = SHIPPING_ADJUSTMENT,
        tax = TAX_LINES,
    );
    exec(db, &items).await;
    exec_all(db, SCENARIO).await;
}

pub async fn seed_edge_lines(db: &DbPool) {
    exec_all(db, EDGE_LINES).await;
}

/// Inserts `count` countries with scattered ids, two translations each and
/// membership of zone 1.
pub async fn seed_countries(db: &DbPool, count: u32) {
    exec(db, r#"INSERT INTO "zone" ("id", "name") VALUES (1, 'World')"#).await;
    exec(
        db,
        &format!(
            r#"WITH RECURSIVE "n"("i") AS (SELECT 1 UNION ALL SELECT "i" + 1 FROM "n" WHERE "i" < {count})
               INSERT INTO "country" ("id", "code", "enabled") SELECT "i" * 3 + 7, 'C' || "i", "i" % 2 = 1 FROM "n""#
        ),
    )
    .await;
    for language in ["en", "de"] {
        exec(
            db,
            &format!(
                r#"INSERT INTO "country_translation" ("languageCode", "name", "baseId")
                   SELECT '{language}', 'Country ' || "code", "id" FROM "country""#
            ),
        )
        .await;
    }
    exec(
        db,
        r#"INSERT INTO "zone_members_country" ("zoneId", "countryId") SELECT 1, "id" FROM "country""#,
    )
    .await;
}

pub async fn exec(db: &DbPool, sql: &str) {
    db.execute(Statement::from_string(db.get_database_backend(), sql.to_string()))
        .await
        .unwrap_or_else(|err| panic!("statement failed: {err}\n{sql}"));
}

pub async fn exec_all(db: &DbPool, statements: &[&str]) {
    for sql in statements {
        exec(db, sql).await;
    }
}

pub async fn rows(db: &DbPool, sql: &str) -> Vec<QueryResult> {
    db.query_all(Statement::from_string(db.get_database_backend(), sql.to_string()))
        .await
        .unwrap_or_else(|err| panic!("query failed: {err}\n{sql}"))
}

/// First column of the first row as an integer.
pub async fn scalar(db: &DbPool, sql: &str) -> i64 {
    let row = rows(db, sql)
        .await
        .into_iter()
        .next()
        .expect("query returned no rows");
    row.try_get_by_index::<i64>(0)
        .expect("first column is not an integer")
}

pub async fn table_exists(db: &DbPool, table: &str) -> bool {
    scalar(
        db,
        &format!("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '{table}'"),
    )
    .await
        == 1
}

pub async fn column_exists(db: &DbPool, table: &str, column: &str) -> bool {
    scalar(
        db,
        &format!("SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = '{column}'"),
    )
    .await
        == 1
}
