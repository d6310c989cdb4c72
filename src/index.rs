//! Groups flat inventory rows into products, colours and sizes, and builds the
//! SKU lookup table the navigation layer resolves against.

use crate::stock::StockBook;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use storefront_types::category::CategorySlug;
use storefront_types::inventory::InventoryRow;
use storefront_types::product::{ColorGroup, Offer, Product, Promotion, Sku, VariantRef};
use storefront_types::VariantId;

/// Everything the overlay needs to display one variant.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Resolution {
    pub sku: Sku,
    pub product: Arc<Product>,
    pub color: String,
    pub size: String,
    pub variant_id: VariantId,
    pub available: Option<u32>,
    pub image: Option<String>,
}

impl Resolution {
    pub fn color_group(&self) -> Option<&ColorGroup> {
        self.product.color(&self.color)
    }
}

/// Read-only SKU lookup. Built in one go by [`build`] and never patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkuIndex {
    entries: HashMap<Sku, Resolution>,
}

impl SkuIndex {
    pub fn get(&self, sku: &Sku) -> Option<&Resolution> {
        self.entries.get(sku)
    }

    pub fn contains(&self, sku: &Sku) -> bool {
        self.entries.contains_key(sku)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skus(&self) -> impl Iterator<Item = &Sku> {
        self.entries.keys().sorted()
    }
}

/// Result of one category load. Replaced wholesale on the next load.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub category: CategorySlug,
    pub products: Vec<Arc<Product>>,
    pub index: SkuIndex,
    /// Rows could not be fetched at all; the grid is shown empty.
    pub rows_unavailable: bool,
}

impl Catalog {
    pub fn empty(category: CategorySlug) -> Self {
        Self {
            category,
            products: vec![],
            index: SkuIndex::default(),
            rows_unavailable: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

struct Candidate {
    color: String,
    images: Vec<String>,
    price: Option<Decimal>,
    label: Option<String>,
}

struct ProductDraft {
    product: Product,
    offers: Vec<Candidate>,
    promotions: Vec<Candidate>,
}

impl ProductDraft {
    fn new(row: &InventoryRow) -> Self {
        Self {
            product: Product {
                name: row.product.clone(),
                category: row.category.clone(),
                description: row.description.clone(),
                price: row.price,
                image: row.image.clone(),
                offer: None,
                promotion: None,
                colors: vec![],
            },
            offers: vec![],
            promotions: vec![],
        }
    }

    fn add_row(&mut self, row: &InventoryRow, stock: &StockBook) {
        let variants = row
            .size_list()
            .into_iter()
            .map(|size| variant_ref(row, size, stock))
            .collect::<Vec<_>>();
        match self
            .product
            .colors
            .iter_mut()
            .find(|c| c.color == row.color)
        {
            Some(group) => {
                for image in &row.images {
                    if !group.images.contains(image) {
                        group.images.push(image.clone());
                    }
                }
                for v in variants {
                    if group.size(&v.size).is_none() {
                        group.variants.push(v);
                    }
                }
            }
            None => self.product.colors.push(ColorGroup {
                color: row.color.clone(),
                images: row.images.iter().unique().cloned().collect(),
                variants,
            }),
        }
        if row.offer_active {
            self.offers.push(Candidate {
                color: row.color.clone(),
                images: row.images.clone(),
                price: row.offer_price,
                label: None,
            });
        }
        if row.promotion_active {
            self.promotions.push(Candidate {
                color: row.color.clone(),
                images: row.images.clone(),
                price: row.promotion_price,
                label: row.promotion_label.clone(),
            });
        }
    }

    fn finish(mut self) -> Product {
        let image = self.product.image.clone();
        if !self.offers.is_empty() {
            let price = representative(&self.offers, image.as_deref()).and_then(|c| c.price);
            self.product.offer = Some(Offer { price });
        }
        if !self.promotions.is_empty() {
            let chosen = representative(&self.promotions, image.as_deref());
            self.product.promotion = Some(Promotion {
                price: chosen.and_then(|c| c.price),
                label: chosen
                    .and_then(|c| c.label.clone())
                    .or_else(|| self.promotions.iter().find_map(|c| c.label.clone())),
            });
        }
        self.product
    }
}

/// Prefers the colour showing the product's default image, then the first
/// candidate that carries a price.
fn representative<'a>(candidates: &'a [Candidate], image: Option<&str>) -> Option<&'a Candidate> {
    let priced = || candidates.iter().filter(|c| c.price.is_some());
    image
        .and_then(|image| priced().find(|c| c.images.iter().any(|i| i == image)))
        .or_else(|| priced().next())
}

fn variant_ref(row: &InventoryRow, size: &str, stock: &StockBook) -> VariantRef {
    match row.variant(size) {
        Some(v) => {
            let sku = v.sku.as_deref().and_then(Sku::parse);
            let aggregate = stock.aggregate(&v.variant_id, v.reserved);
            VariantRef {
                size: size.to_string(),
                sku,
                variant_id: Some(v.variant_id),
                active: v.active,
                stock_total: aggregate.stock_total,
                reserved: v.reserved,
                available: aggregate.available,
            }
        }
        None => VariantRef {
            size: size.to_string(),
            sku: None,
            variant_id: None,
            active: false,
            stock_total: None,
            reserved: 0,
            available: None,
        },
    }
}

/// Builds a fresh catalog from one load's rows. The index is only handed out
/// once every product is complete.
pub fn build(category: CategorySlug, rows: &[InventoryRow], stock: &StockBook) -> Catalog {
    let mut drafts: Vec<ProductDraft> = vec![];
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        let position = *positions.entry(row.product.as_str()).or_insert_with(|| {
            drafts.push(ProductDraft::new(row));
            drafts.len() - 1
        });
        drafts[position].add_row(row, stock);
    }
    let products = drafts
        .into_iter()
        .map(ProductDraft::finish)
        .map(Arc::new)
        .collect::<Vec<_>>();

    let mut entries = HashMap::new();
    for product in &products {
        for color in &product.colors {
            for variant in color.variants.iter().filter(|v| v.is_selectable()) {
                let (Some(sku), Some(variant_id)) = (&variant.sku, variant.variant_id) else {
                    continue;
                };
                let resolution = Resolution {
                    sku: sku.clone(),
                    product: product.clone(),
                    color: color.color.clone(),
                    size: variant.size.clone(),
                    variant_id,
                    available: variant.available,
                    image: color
                        .canonical_image()
                        .map(ToString::to_string)
                        .or_else(|| product.image.clone()),
                };
                if let Some(previous) = entries.insert(sku.clone(), resolution) {
                    log::warn!(
                        "Duplicate SKU {sku}: {} {}/{} replaced by {} {}/{}",
                        previous.product.name,
                        previous.color,
                        previous.size,
                        product.name,
                        color.color,
                        variant.size
                    );
                }
            }
        }
    }
    log::info!(
        "Built catalog {category}: {} products, {} skus",
        products.len(),
        entries.len()
    );
    Catalog {
        category,
        products,
        index: SkuIndex { entries },
        rows_unavailable: false,
    }
}
