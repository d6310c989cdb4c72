//! In-memory store and cart used by the engine tests.

use anyhow::anyhow;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use storefront_types::cart::{CartOutcome, CartService};
use storefront_types::inventory::{
    InCategory, InventoryRepository, InventoryRow, ProductRecord, ProductRepository,
    RecentlyAdded, SizeVariant, StockLevel, StockRepository, VariantRecord, VariantRepository,
};
use storefront_types::VariantId;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, Select};
use typesafe_repository::prelude::*;

pub(crate) fn size(size: &str, id: i64, sku: Option<&str>, active: bool) -> SizeVariant {
    SizeVariant {
        size: size.to_string(),
        variant_id: VariantId(id),
        sku: sku.map(ToString::to_string),
        active,
        reserved: 0,
    }
}

pub(crate) fn row(
    id: i64,
    product: &str,
    color: &str,
    sizes: &str,
    variants: Vec<SizeVariant>,
) -> InventoryRow {
    InventoryRow {
        id,
        product: product.to_string(),
        category: "mujer".to_string(),
        description: Some("Zapatilla".to_string()),
        price: dec!(59.90),
        image: None,
        color: color.to_string(),
        images: vec![format!(
            "{}-{}-1.jpg",
            product.to_lowercase(),
            color.to_lowercase()
        )],
        sizes: sizes.to_string(),
        variants,
        offer_active: false,
        offer_price: None,
        promotion_active: false,
        promotion_price: None,
        promotion_label: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

/// P1 (new, "mujer"): Negro 38/39/40 as SKU-1..3, Blanco 38/39 as SKU-4/5.
/// P2 (old, "mujer"): Azul S/M as SKU-6/7.
/// P3 (old, "hombre"): Gris 42/43/44 as SKU-8, SKU-9 and the inactive SKU-OLD.
pub(crate) fn example_rows() -> Vec<InventoryRow> {
    let long_ago = OffsetDateTime::now_utc() - time::Duration::days(400);
    let mut negro = row(
        1,
        "P1",
        "Negro",
        "38,39,40",
        vec![
            size("38", 1, Some("SKU-1"), true),
            size("39", 2, Some("SKU-2"), true),
            size("40", 3, Some("SKU-3"), true),
        ],
    );
    negro.variants[1].reserved = 1;
    negro.image = Some("p1-negro-1.jpg".to_string());
    negro.images.push("p1-negro-2.jpg".to_string());
    negro.created_at = OffsetDateTime::now_utc() - time::Duration::days(2);
    let mut blanco = row(
        2,
        "P1",
        "Blanco",
        "38,39",
        vec![
            size("38", 4, Some("SKU-4"), true),
            size("39", 5, Some("SKU-5"), true),
        ],
    );
    blanco.image = negro.image.clone();
    blanco.created_at = negro.created_at;
    let mut azul = row(
        3,
        "P2",
        "Azul",
        "S,M",
        vec![
            size("S", 6, Some("SKU-6"), true),
            size("M", 7, Some("SKU-7"), true),
        ],
    );
    azul.price = dec!(25);
    azul.description = Some("Camiseta".to_string());
    azul.created_at = long_ago;
    let mut gris = row(
        4,
        "P3",
        "Gris",
        "42,43,44",
        vec![
            size("42", 8, Some("SKU-8"), true),
            size("43", 9, Some("SKU-9"), true),
            size("44", 10, Some("SKU-OLD"), false),
        ],
    );
    gris.category = "hombre".to_string();
    gris.price = dec!(89);
    gris.description = Some("Bota".to_string());
    gris.created_at = long_ago;
    vec![negro, blanco, azul, gris]
}

/// The rows a "mujer" category load returns: P1 and P2.
pub(crate) fn mujer_rows() -> Vec<InventoryRow> {
    example_rows()
        .into_iter()
        .filter(|r| r.category == "mujer")
        .collect()
}

fn level(variant: i64, warehouse: &str, quantity: i64) -> StockLevel {
    StockLevel {
        variant_id: VariantId(variant),
        warehouse_id: warehouse.to_string(),
        quantity,
    }
}

pub(crate) fn example_stock() -> Vec<StockLevel> {
    vec![
        level(1, "wh1", 0),
        level(2, "wh1", 3),
        level(2, "wh2", 2),
        level(3, "wh1", 5),
        level(4, "wh1", 2),
        level(6, "wh1", 1),
        level(7, "wh2", 8),
        level(8, "wh1", 4),
        level(8, "wh2", 2),
        level(9, "wh1", 0),
    ]
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    rows: Mutex<Vec<InventoryRow>>,
    stock: Mutex<Vec<StockLevel>>,
    hidden_products: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    pub fail_stock: AtomicBool,
    pub fail_rows: AtomicBool,
    pub row_loads: AtomicUsize,
    pub stock_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new(rows: Vec<InventoryRow>, stock: Vec<StockLevel>) -> Self {
        Self {
            rows: Mutex::new(rows),
            stock: Mutex::new(stock),
            ..Self::default()
        }
    }

    pub fn example() -> Self {
        Self::new(example_rows(), example_stock())
    }

    pub fn hide_product(&self, name: &str) {
        self.hidden_products
            .lock()
            .expect("lock")
            .insert(name.to_string());
    }

    pub fn delay_category(&self, category: &str, delay: Duration) {
        self.delays
            .lock()
            .expect("lock")
            .insert(category.to_string(), delay);
    }

    pub fn set_stock(&self, variant: i64, levels: &[(&str, i64)]) {
        let mut stock = self.stock.lock().expect("lock");
        stock.retain(|l| l.variant_id != VariantId(variant));
        stock.extend(levels.iter().map(|(w, q)| level(variant, w, *q)));
    }

    pub fn row_loads(&self) -> usize {
        self.row_loads.load(Ordering::SeqCst)
    }

    fn filtered(&self, f: impl Fn(&InventoryRow) -> bool) -> Result<Vec<InventoryRow>, anyhow::Error> {
        self.row_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_rows.load(Ordering::SeqCst) {
            return Err(anyhow!("inventory query failed"));
        }
        Ok(self
            .rows
            .lock()
            .expect("lock")
            .iter()
            .filter(|r| f(r))
            .cloned()
            .collect())
    }
}

impl Repository<InventoryRow> for MemoryStore {
    type Error = anyhow::Error;
}

#[async_trait]
impl Select<InventoryRow, InCategory> for MemoryStore {
    async fn select(&self, InCategory(category): &InCategory) -> Result<Vec<InventoryRow>, Self::Error> {
        let delay = self
            .delays
            .lock()
            .expect("lock")
            .get(category.as_str())
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.filtered(|r| r.category == category.as_str())
    }
}

#[async_trait]
impl Select<InventoryRow, RecentlyAdded> for MemoryStore {
    async fn select(&self, RecentlyAdded { since }: &RecentlyAdded) -> Result<Vec<InventoryRow>, Self::Error> {
        self.filtered(|r| r.created_at >= *since)
    }
}

impl InventoryRepository for MemoryStore {}

impl Repository<VariantRecord> for MemoryStore {
    type Error = anyhow::Error;
}

#[async_trait]
impl Get<VariantRecord> for MemoryStore {
    async fn get_one(&self, sku: &IdentityOf<VariantRecord>) -> Result<Option<VariantRecord>, Self::Error> {
        let rows = self.rows.lock().expect("lock");
        Ok(rows.iter().find_map(|r| {
            r.variants
                .iter()
                .find(|v| v.sku.as_deref() == Some(sku.as_str()))
                .map(|v| VariantRecord {
                    sku: sku.clone(),
                    variant_id: v.variant_id,
                    product: r.product.clone(),
                    color: r.color.clone(),
                    size: v.size.clone(),
                    active: v.active,
                    reserved: v.reserved,
                    images: r.images.clone(),
                    offer_active: r.offer_active,
                    offer_price: r.offer_price,
                    promotion_active: r.promotion_active,
                    promotion_price: r.promotion_price,
                    promotion_label: r.promotion_label.clone(),
                })
        }))
    }
}

impl VariantRepository for MemoryStore {}

impl Repository<ProductRecord> for MemoryStore {
    type Error = anyhow::Error;
}

#[async_trait]
impl Get<ProductRecord> for MemoryStore {
    async fn get_one(&self, name: &IdentityOf<ProductRecord>) -> Result<Option<ProductRecord>, Self::Error> {
        if self.hidden_products.lock().expect("lock").contains(name) {
            return Ok(None);
        }
        let rows = self.rows.lock().expect("lock");
        Ok(rows.iter().find(|r| &r.product == name).map(|r| ProductRecord {
            name: r.product.clone(),
            category: r.category.clone(),
            description: r.description.clone(),
            price: r.price,
            image: r.image.clone(),
            created_at: r.created_at,
        }))
    }
}

impl ProductRepository for MemoryStore {}

#[async_trait]
impl StockRepository for MemoryStore {
    async fn stock_levels(&self, variants: &[VariantId]) -> Result<Vec<StockLevel>, anyhow::Error> {
        self.stock_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_stock.load(Ordering::SeqCst) {
            return Err(anyhow!("stock service unavailable"));
        }
        Ok(self
            .stock
            .lock()
            .expect("lock")
            .iter()
            .filter(|l| variants.contains(&l.variant_id))
            .cloned()
            .collect())
    }

    async fn reserved(&self, variant: VariantId) -> Result<u32, anyhow::Error> {
        Ok(self
            .rows
            .lock()
            .expect("lock")
            .iter()
            .flat_map(|r| r.variants.iter())
            .find(|v| v.variant_id == variant)
            .map(|v| v.reserved)
            .unwrap_or(0))
    }
}

/// Cart that answers with queued outcomes, `Added` once the queue is empty.
#[derive(Default)]
pub(crate) struct RecordingCart {
    outcomes: Mutex<VecDeque<Result<CartOutcome, String>>>,
    pub calls: Mutex<Vec<(VariantId, u32)>>,
}

impl RecordingCart {
    pub fn answer(&self, outcome: Result<CartOutcome, String>) {
        self.outcomes.lock().expect("lock").push_back(outcome);
    }
}

#[async_trait]
impl CartService for RecordingCart {
    async fn add(&self, variant: VariantId, quantity: u32) -> Result<CartOutcome, anyhow::Error> {
        self.calls.lock().expect("lock").push((variant, quantity));
        match self.outcomes.lock().expect("lock").pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(err)) => Err(anyhow!(err)),
            None => Ok(CartOutcome::Added),
        }
    }
}
