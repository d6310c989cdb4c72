//! Records exchanged with the inventory store and the repository contracts
//! the catalog engine reads them through.

use crate::category::CategorySlug;
use crate::VariantId;
use async_trait::async_trait;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{SelectBy, Selector};

/// One product in one colour, as the store hands it out.
#[derive(Id, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[Id(ref_id, get_id)]
pub struct InventoryRow {
    #[id]
    pub id: i64,
    pub product: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub color: String,
    pub images: Vec<String>,
    /// Comma separated, in display order.
    pub sizes: String,
    pub variants: Vec<SizeVariant>,
    #[serde(default)]
    pub offer_active: bool,
    pub offer_price: Option<Decimal>,
    #[serde(default)]
    pub promotion_active: bool,
    pub promotion_price: Option<Decimal>,
    pub promotion_label: Option<String>,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl InventoryRow {
    pub fn size_list(&self) -> Vec<&str> {
        self.sizes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unique()
            .collect()
    }

    pub fn variant(&self, size: &str) -> Option<&SizeVariant> {
        self.variants.iter().find(|v| v.size.trim() == size)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeVariant {
    pub size: String,
    pub variant_id: VariantId,
    pub sku: Option<String>,
    #[serde(default = "bool_true")]
    pub active: bool,
    #[serde(default)]
    pub reserved: u32,
}

fn bool_true() -> bool {
    true
}

/// A single variant looked up by SKU together with its colour row data.
#[derive(Id, Clone, Debug, PartialEq)]
#[Id(ref_id, get_id)]
pub struct VariantRecord {
    #[id]
    pub sku: String,
    pub variant_id: VariantId,
    pub product: String,
    pub color: String,
    pub size: String,
    pub active: bool,
    pub reserved: u32,
    pub images: Vec<String>,
    pub offer_active: bool,
    pub offer_price: Option<Decimal>,
    pub promotion_active: bool,
    pub promotion_price: Option<Decimal>,
    pub promotion_label: Option<String>,
}

#[derive(Id, Clone, Debug, PartialEq)]
#[Id(ref_id, get_id)]
pub struct ProductRecord {
    #[id]
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockLevel {
    pub variant_id: VariantId,
    pub warehouse_id: String,
    pub quantity: i64,
}

pub struct InCategory(pub CategorySlug);

pub struct RecentlyAdded {
    pub since: OffsetDateTime,
}

impl Selector for InCategory {}
impl SelectBy<InCategory> for InventoryRow {}

impl Selector for RecentlyAdded {}
impl SelectBy<RecentlyAdded> for InventoryRow {}

pub trait InventoryRepository:
    Repository<InventoryRow, Error = anyhow::Error>
    + Select<InventoryRow, InCategory>
    + Select<InventoryRow, RecentlyAdded>
    + Send
    + Sync
{
}

pub trait VariantRepository:
    Repository<VariantRecord, Error = anyhow::Error> + Get<VariantRecord> + Send + Sync
{
}

pub trait ProductRepository:
    Repository<ProductRecord, Error = anyhow::Error> + Get<ProductRecord> + Send + Sync
{
}

#[async_trait]
pub trait StockRepository: Send + Sync {
    /// Per-warehouse quantities for the given variants. Variants without any
    /// stock row are simply absent from the result.
    async fn stock_levels(&self, variants: &[VariantId]) -> Result<Vec<StockLevel>, anyhow::Error>;

    /// Units of `variant` held for pending orders, zero for unknown variants.
    async fn reserved(&self, variant: VariantId) -> Result<u32, anyhow::Error>;
}
