use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;

use super::{CartRepository, SkuCatalog, StockRepository, StockUpsert, StorageError};
use crate::config::PostgresArgs;
use crate::domain::{CartItem, NewStock, OwnerId, Sku, SkuId, StockFilter, StockItem};
use crate::utils::{retry_on_transient, Backoff, IsTransient};

// ============================================================================
// Postgres Storage
// ============================================================================
//
// All tables key rows by (owner_id, sku_id). Numeric columns are BIGINT,
// bounded to the u32 range on write and range-checked on the way out.
//
// ============================================================================

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sku (
        sku_id BIGINT PRIMARY KEY,
        name   TEXT   NOT NULL,
        type   TEXT   NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_items (
        owner_id   BIGINT      NOT NULL,
        sku_id     BIGINT      NOT NULL REFERENCES sku (sku_id),
        count      BIGINT      NOT NULL CHECK (count BETWEEN 0 AND 4294967295),
        price      BIGINT      NOT NULL DEFAULT 0,
        location   TEXT        NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (owner_id, sku_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS stock_items_owner_location ON stock_items (owner_id, location)",
    r#"
    CREATE TABLE IF NOT EXISTS cart_items (
        owner_id   BIGINT      NOT NULL,
        sku_id     BIGINT      NOT NULL,
        count      BIGINT      NOT NULL CHECK (count > 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (owner_id, sku_id)
    )
    "#,
];

/// Upper bound of `stock_items.count`, the range of `StockItem::count`.
const MAX_STOCK_COUNT: i64 = u32::MAX as i64;

// 23514: check_violation
const CHECK_VIOLATION: &str = "23514";

impl IsTransient for sqlx::Error {
    fn is_transient(&self) -> bool {
        match self {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
            // 57P03: the database system is starting up
            sqlx::Error::Database(e) => e.code().as_deref() == Some("57P03"),
            _ => false,
        }
    }
}

/// Open the pool, retrying while the server is unreachable.
pub async fn connect(args: &PostgresArgs) -> anyhow::Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .database(&args.database)
        .options([("statement_timeout", args.statement_timeout_ms.to_string())]);

    tracing::info!(host = %args.host, port = args.port, database = %args.database, "Connecting to Postgres");

    let pool = retry_on_transient(&Backoff::startup(), "postgres_connect", |_| {
        PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(args.connect_timeout_secs))
            .connect_with(options.clone())
    })
    .await
    .context("failed to connect to Postgres")?;

    Ok(pool)
}

pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to apply schema")?;
    }
    tracing::debug!("Schema ready");
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn column_u32(value: i64, column: &'static str) -> Result<u32, StorageError> {
    u32::try_from(value).map_err(|_| StorageError::InvalidValue { column })
}

fn overflow_or_database(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(CHECK_VIOLATION) {
            return StorageError::CountOverflow;
        }
    }
    StorageError::Database(err)
}

fn stock_from_row(row: &PgRow) -> Result<StockItem, StorageError> {
    Ok(StockItem {
        owner: OwnerId(row.try_get("owner_id")?),
        sku: Sku {
            id: SkuId(column_u32(row.try_get("sku_id")?, "sku_id")?),
            name: row.try_get("name")?,
            kind: row.try_get("type")?,
        },
        count: column_u32(row.try_get("count")?, "count")?,
        price: column_u32(row.try_get("price")?, "price")?,
        location: row.try_get("location")?,
    })
}

fn cart_from_row(row: &PgRow) -> Result<CartItem, StorageError> {
    Ok(CartItem {
        owner: OwnerId(row.try_get("owner_id")?),
        sku: SkuId(column_u32(row.try_get("sku_id")?, "sku_id")?),
        count: column_u32(row.try_get("count")?, "count")?,
    })
}

#[async_trait]
impl SkuCatalog for PgStore {
    async fn get_sku(&self, sku: SkuId) -> Result<Sku, StorageError> {
        let row = sqlx::query("SELECT sku_id, name, type FROM sku WHERE sku_id = $1")
            .bind(i64::from(sku.0))
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound)?;

        Ok(Sku {
            id: SkuId(column_u32(row.try_get("sku_id")?, "sku_id")?),
            name: row.try_get("name")?,
            kind: row.try_get("type")?,
        })
    }
}

#[async_trait]
impl StockRepository for PgStore {
    async fn upsert_stock(&self, stock: &NewStock) -> Result<StockUpsert, StorageError> {
        // xmax is zero only for a freshly inserted tuple.
        let row = sqlx::query(
            r#"
            WITH upserted AS (
                INSERT INTO stock_items (owner_id, sku_id, count, price, location)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (owner_id, sku_id) DO UPDATE SET
                    count      = stock_items.count + EXCLUDED.count,
                    price      = COALESCE(NULLIF(EXCLUDED.price, 0), stock_items.price),
                    location   = COALESCE(NULLIF(EXCLUDED.location, ''), stock_items.location),
                    updated_at = now()
                WHERE stock_items.count + EXCLUDED.count <= $6
                RETURNING owner_id, sku_id, count, price, location, (xmax = 0) AS created
            )
            SELECT u.owner_id, u.sku_id, u.count, u.price, u.location, u.created, s.name, s.type
            FROM upserted u
            JOIN sku s ON s.sku_id = u.sku_id
            "#,
        )
        .bind(stock.owner.0)
        .bind(i64::from(stock.sku.0))
        .bind(i64::from(stock.count))
        .bind(i64::from(stock.price))
        .bind(&stock.location)
        .bind(MAX_STOCK_COUNT)
        .fetch_optional(&self.pool)
        .await
        .map_err(overflow_or_database)?
        // The guarded update skips the row, so nothing comes back.
        .ok_or(StorageError::CountOverflow)?;

        Ok(StockUpsert {
            item: stock_from_row(&row)?,
            created: row.try_get("created")?,
        })
    }

    async fn delete_stock(&self, owner: OwnerId, sku: SkuId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM stock_items WHERE owner_id = $1 AND sku_id = $2")
            .bind(owner.0)
            .bind(i64::from(sku.0))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_stock_by_sku(&self, sku: SkuId) -> Result<StockItem, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT st.owner_id, st.sku_id, st.count, st.price, st.location, s.name, s.type
            FROM stock_items st
            JOIN sku s ON s.sku_id = st.sku_id
            WHERE st.sku_id = $1
            ORDER BY st.owner_id
            LIMIT 1
            "#,
        )
        .bind(i64::from(sku.0))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        stock_from_row(&row)
    }

    async fn count_stock(&self, owner: OwnerId, location: &str) -> Result<u64, StorageError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stock_items WHERE owner_id = $1 AND location = $2")
                .bind(owner.0)
                .bind(location)
                .fetch_one(&self.pool)
                .await?;

        u64::try_from(total).map_err(|_| StorageError::InvalidValue { column: "count" })
    }

    async fn list_stock(&self, filter: &StockFilter) -> Result<Vec<StockItem>, StorageError> {
        let limit = i64::try_from(filter.limit()).map_err(|_| StorageError::InvalidValue { column: "limit" })?;
        let offset =
            i64::try_from(filter.offset()).map_err(|_| StorageError::InvalidValue { column: "offset" })?;

        let rows = sqlx::query(
            r#"
            SELECT st.owner_id, st.sku_id, st.count, st.price, st.location, s.name, s.type
            FROM stock_items st
            JOIN sku s ON s.sku_id = st.sku_id
            WHERE st.owner_id = $1 AND st.location = $2
            ORDER BY st.sku_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.owner.0)
        .bind(&filter.location)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(stock_from_row).collect()
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn upsert_cart_item(&self, item: &CartItem) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (owner_id, sku_id, count)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, sku_id) DO UPDATE SET
                count      = EXCLUDED.count,
                updated_at = now()
            "#,
        )
        .bind(item.owner.0)
        .bind(i64::from(item.sku.0))
        .bind(i64::from(item.count))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_cart_item(&self, owner: OwnerId, sku: SkuId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE owner_id = $1 AND sku_id = $2")
            .bind(owner.0)
            .bind(i64::from(sku.0))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&self, owner: OwnerId) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE owner_id = $1")
            .bind(owner.0)
            .execute(&self.pool)
            .await?;

        match result.rows_affected() {
            0 => Err(StorageError::NotFound),
            removed => Ok(removed),
        }
    }

    async fn list_cart(&self, owner: OwnerId) -> Result<Vec<CartItem>, StorageError> {
        let rows = sqlx::query(
            "SELECT owner_id, sku_id, count FROM cart_items WHERE owner_id = $1 ORDER BY sku_id",
        )
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(cart_from_row).collect()
    }
}
