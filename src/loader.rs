use crate::config::CatalogConfig;
use crate::index::{self, Catalog};
use crate::stock::StockBook;
use futures::future::join_all;
use itertools::Itertools;
use std::sync::Arc;
use storefront_types::category::CategorySlug;
use storefront_types::inventory::{
    InCategory, InventoryRepository, InventoryRow, RecentlyAdded, StockRepository,
};
use storefront_types::VariantId;

/// Pulls one category's rows and stock from the store and hands them to the
/// index builder. Never fails: missing data degrades the result instead.
pub struct CatalogLoader {
    inventory: Arc<dyn InventoryRepository>,
    stock: Arc<dyn StockRepository>,
    recent_days: i64,
    stock_batch: usize,
}

impl CatalogLoader {
    pub fn new(
        inventory: Arc<dyn InventoryRepository>,
        stock: Arc<dyn StockRepository>,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            inventory,
            stock,
            recent_days: config.recent_days,
            stock_batch: config.stock_batch.max(1),
        }
    }

    pub async fn load(&self, category: &CategorySlug) -> Catalog {
        let rows = match self.rows(category).await {
            Ok(rows) => rows,
            Err(err) => {
                log::warn!("Unable to fetch rows of category {category}: {err:#}");
                let mut catalog = Catalog::empty(category.clone());
                catalog.rows_unavailable = true;
                return catalog;
            }
        };
        let variants = rows
            .iter()
            .flat_map(|r| r.variants.iter().map(|v| v.variant_id))
            .unique()
            .collect::<Vec<_>>();
        let book = self.stock_book(&variants).await;
        index::build(category.clone(), &rows, &book)
    }

    async fn rows(&self, category: &CategorySlug) -> Result<Vec<InventoryRow>, anyhow::Error> {
        if category.is_recently_added() {
            self.inventory
                .select(&RecentlyAdded {
                    since: crate::recent_since(self.recent_days),
                })
                .await
        } else {
            self.inventory.select(&InCategory(category.clone())).await
        }
    }

    /// Queries stock in batches. A failed batch only affects its own variants.
    pub async fn stock_book(&self, variants: &[VariantId]) -> StockBook {
        let batches = variants.chunks(self.stock_batch).collect::<Vec<_>>();
        let results = join_all(batches.iter().map(|batch| self.stock.stock_levels(batch))).await;
        let mut book = StockBook::new();
        for (batch, result) in batches.into_iter().zip(results) {
            match result {
                Ok(levels) => book.record(levels),
                Err(err) => {
                    log::warn!(
                        "Unable to fetch stock for {} variants, availability left unconfirmed: {err:#}",
                        batch.len()
                    );
                    book.mark_failed(batch);
                }
            }
        }
        book
    }
}
