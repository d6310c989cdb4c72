use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row, ToSql};
use rust_decimal::Decimal;
use std::str::FromStr;
use storefront_types::inventory::{
    InCategory, InventoryRepository, InventoryRow, ProductRecord, ProductRepository, RecentlyAdded,
    SizeVariant, StockLevel, StockRepository, VariantRecord, VariantRepository,
};
use storefront_types::VariantId;
use time::OffsetDateTime;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, Select};
use typesafe_repository::prelude::*;

const ROW_COLUMNS: &str = "r.id, p.name, p.category, p.description, p.price, p.image, r.color,
    r.images, r.sizes, r.offer_active, r.offer_price, r.promotion_active, r.promotion_price,
    r.promotion_label, p.created_at";

/// Products, their colour rows, size variants and warehouse stock in one
/// sqlite database.
pub struct SqliteInventoryStore {
    conn: Connection,
}

impl SqliteInventoryStore {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            let _ = conn.pragma_update(None, "journal_mode", "WAL");
            let _ = conn.pragma_update(None, "busy_timeout", 5000i64);
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS product (
                    name TEXT PRIMARY KEY,
                    category TEXT NOT NULL,
                    description TEXT,
                    price TEXT NOT NULL,
                    image TEXT,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS color_row (
                    id INTEGER PRIMARY KEY,
                    product TEXT NOT NULL,
                    color TEXT NOT NULL,
                    images TEXT NOT NULL DEFAULT '[]',
                    sizes TEXT NOT NULL DEFAULT '',
                    offer_active INTEGER NOT NULL DEFAULT 0,
                    offer_price TEXT,
                    promotion_active INTEGER NOT NULL DEFAULT 0,
                    promotion_price TEXT,
                    promotion_label TEXT
                );
                CREATE TABLE IF NOT EXISTS variant (
                    id INTEGER PRIMARY KEY,
                    row_id INTEGER NOT NULL,
                    size TEXT NOT NULL,
                    sku TEXT,
                    active INTEGER NOT NULL DEFAULT 1,
                    reserved INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS variant_sku ON variant (sku);
                CREATE INDEX IF NOT EXISTS variant_row ON variant (row_id);
                CREATE TABLE IF NOT EXISTS stock (
                    variant_id INTEGER NOT NULL,
                    warehouse_id TEXT NOT NULL,
                    quantity INTEGER NOT NULL,
                    PRIMARY KEY (variant_id, warehouse_id)
                );",
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Stores one colour row with its variants. The product itself is
    /// written by the first row that mentions it.
    pub async fn save_row(&self, row: InventoryRow) -> Result<(), anyhow::Error> {
        let images = serde_json::to_string(&row.images)?;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO product (name, category, description, price, image, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(name) DO NOTHING",
                    params![
                        row.product,
                        row.category,
                        row.description,
                        row.price.to_string(),
                        row.image,
                        row.created_at.unix_timestamp(),
                    ],
                )?;
                tx.execute(
                    "INSERT INTO color_row
                    (id, product, color, images, sizes, offer_active, offer_price, promotion_active, promotion_price, promotion_label)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(id)
                    DO UPDATE SET product=?2, color=?3, images=?4, sizes=?5, offer_active=?6, offer_price=?7, promotion_active=?8, promotion_price=?9, promotion_label=?10",
                    params![
                        row.id,
                        row.product,
                        row.color,
                        images,
                        row.sizes,
                        row.offer_active,
                        row.offer_price.map(|p| p.to_string()),
                        row.promotion_active,
                        row.promotion_price.map(|p| p.to_string()),
                        row.promotion_label,
                    ],
                )?;
                tx.execute("DELETE FROM variant WHERE row_id = ?1", [row.id])?;
                for v in &row.variants {
                    tx.execute(
                        "INSERT INTO variant (id, row_id, size, sku, active, reserved)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        ON CONFLICT(id) DO UPDATE SET row_id=?2, size=?3, sku=?4, active=?5, reserved=?6",
                        params![v.variant_id.0, row.id, v.size, v.sku, v.active, v.reserved],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn save_stock(&self, levels: Vec<StockLevel>) -> Result<(), anyhow::Error> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for l in &levels {
                    tx.execute(
                        "INSERT INTO stock (variant_id, warehouse_id, quantity) VALUES (?1, ?2, ?3)
                        ON CONFLICT(variant_id, warehouse_id) DO UPDATE SET quantity=?3",
                        params![l.variant_id.0, l.warehouse_id, l.quantity],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn select_rows(
        &self,
        filter: &'static str,
        param: Box<dyn ToSql + Send>,
    ) -> Result<Vec<InventoryRow>, anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ROW_COLUMNS} FROM color_row r JOIN product p ON p.name = r.product
                    WHERE {filter} ORDER BY r.id"
                ))?;
                let mut rows = stmt
                    .query_map([&param], inventory_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                let mut variants = conn.prepare_cached(
                    "SELECT size, id, sku, active, reserved FROM variant WHERE row_id = ?1 ORDER BY id",
                )?;
                for row in &mut rows {
                    row.variants = variants
                        .query_map([row.id], |v| {
                            Ok(SizeVariant {
                                size: v.get(0)?,
                                variant_id: VariantId(v.get(1)?),
                                sku: v.get(2)?,
                                active: v.get(3)?,
                                reserved: v.get(4)?,
                            })
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                }
                Ok(rows)
            })
            .await?)
    }
}

fn decimal(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    Decimal::from_str(&row.get::<_, String>(idx)?)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn optional_decimal(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| Decimal::from_str(&s))
        .transpose()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn images(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&row.get::<_, String>(idx)?)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(row.get(idx)?).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err))
    })
}

fn inventory_row(row: &Row) -> rusqlite::Result<InventoryRow> {
    Ok(InventoryRow {
        id: row.get(0)?,
        product: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        price: decimal(row, 4)?,
        image: row.get(5)?,
        color: row.get(6)?,
        images: images(row, 7)?,
        sizes: row.get(8)?,
        variants: vec![],
        offer_active: row.get(9)?,
        offer_price: optional_decimal(row, 10)?,
        promotion_active: row.get(11)?,
        promotion_price: optional_decimal(row, 12)?,
        promotion_label: row.get(13)?,
        created_at: timestamp(row, 14)?,
    })
}

impl Repository<InventoryRow> for SqliteInventoryStore {
    type Error = anyhow::Error;
}

#[async_trait]
impl Select<InventoryRow, InCategory> for SqliteInventoryStore {
    async fn select(&self, InCategory(category): &InCategory) -> Result<Vec<InventoryRow>, Self::Error> {
        self.select_rows("p.category = ?1", Box::new(category.to_string()))
            .await
    }
}

#[async_trait]
impl Select<InventoryRow, RecentlyAdded> for SqliteInventoryStore {
    async fn select(&self, RecentlyAdded { since }: &RecentlyAdded) -> Result<Vec<InventoryRow>, Self::Error> {
        self.select_rows("p.created_at >= ?1", Box::new(since.unix_timestamp()))
            .await
    }
}

impl InventoryRepository for SqliteInventoryStore {}

impl Repository<VariantRecord> for SqliteInventoryStore {
    type Error = anyhow::Error;
}

#[async_trait]
impl Get<VariantRecord> for SqliteInventoryStore {
    async fn get_one(&self, sku: &IdentityOf<VariantRecord>) -> Result<Option<VariantRecord>, Self::Error> {
        let sku = sku.clone();
        Ok(self
            .conn
            .call(move |conn| {
                // an active variant wins over retired ones with the same SKU
                let record = conn
                    .query_row(
                        "SELECT v.sku, v.id, r.product, r.color, v.size, v.active, v.reserved, r.images,
                            r.offer_active, r.offer_price, r.promotion_active, r.promotion_price, r.promotion_label
                        FROM variant v JOIN color_row r ON r.id = v.row_id
                        WHERE v.sku = ?1 ORDER BY v.active DESC, v.id DESC LIMIT 1",
                        [&sku],
                        |row| {
                            Ok(VariantRecord {
                                sku: row.get(0)?,
                                variant_id: VariantId(row.get(1)?),
                                product: row.get(2)?,
                                color: row.get(3)?,
                                size: row.get(4)?,
                                active: row.get(5)?,
                                reserved: row.get(6)?,
                                images: images(row, 7)?,
                                offer_active: row.get(8)?,
                                offer_price: optional_decimal(row, 9)?,
                                promotion_active: row.get(10)?,
                                promotion_price: optional_decimal(row, 11)?,
                                promotion_label: row.get(12)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await?)
    }
}

impl VariantRepository for SqliteInventoryStore {}

impl Repository<ProductRecord> for SqliteInventoryStore {
    type Error = anyhow::Error;
}

#[async_trait]
impl Get<ProductRecord> for SqliteInventoryStore {
    async fn get_one(&self, name: &IdentityOf<ProductRecord>) -> Result<Option<ProductRecord>, Self::Error> {
        let name = name.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT name, category, description, price, image, created_at
                        FROM product WHERE name = ?1",
                        [&name],
                        |row| {
                            Ok(ProductRecord {
                                name: row.get(0)?,
                                category: row.get(1)?,
                                description: row.get(2)?,
                                price: decimal(row, 3)?,
                                image: row.get(4)?,
                                created_at: timestamp(row, 5)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await?)
    }
}

impl ProductRepository for SqliteInventoryStore {}

#[async_trait]
impl StockRepository for SqliteInventoryStore {
    async fn stock_levels(&self, variants: &[VariantId]) -> Result<Vec<StockLevel>, anyhow::Error> {
        if variants.is_empty() {
            return Ok(vec![]);
        }
        let ids = variants.iter().map(|v| v.0).collect::<Vec<_>>();
        Ok(self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let mut stmt = conn.prepare(&format!(
                    "SELECT variant_id, warehouse_id, quantity FROM stock
                    WHERE variant_id IN ({placeholders}) ORDER BY variant_id, warehouse_id"
                ))?;
                let levels = stmt
                    .query_map(params_from_iter(ids.iter()), |row| {
                        Ok(StockLevel {
                            variant_id: VariantId(row.get(0)?),
                            warehouse_id: row.get(1)?,
                            quantity: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(levels)
            })
            .await?)
    }

    async fn reserved(&self, variant: VariantId) -> Result<u32, anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let reserved = conn
                    .query_row(
                        "SELECT reserved FROM variant WHERE id = ?1",
                        [variant.0],
                        |row| row.get::<_, u32>(0),
                    )
                    .optional()?;
                Ok(reserved.unwrap_or(0))
            })
            .await?)
    }
}

/// Seed content for an empty store.
#[derive(serde::Deserialize, Debug, Default)]
pub struct Seed {
    pub rows: Vec<InventoryRow>,
    #[serde(default)]
    pub stock: Vec<StockLevel>,
}

impl SqliteInventoryStore {
    pub async fn seed(&self, seed: Seed) -> Result<(), anyhow::Error> {
        let rows = seed.rows.len();
        for row in seed.rows {
            self.save_row(row).await?;
        }
        let levels = seed.stock.len();
        self.save_stock(seed.stock).await?;
        log::info!("Seeded {rows} inventory rows and {levels} stock levels");
        Ok(())
    }

    pub async fn row_count(&self) -> Result<usize, anyhow::Error> {
        Ok(self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM color_row", [], |r| r.get(0))?;
                Ok(count as usize)
            })
            .await?)
    }
}
