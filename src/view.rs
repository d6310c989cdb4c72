use crate::index::{Catalog, Resolution};
use crate::navigation::NavigationState;
use crate::stock::StockBook;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use storefront_types::category::CategorySlug;
use storefront_types::product::{Badge, ColorGroup, Product, Sku, VariantRef};
use storefront_types::{StockStatus, VariantId};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SizeChip {
    pub size: String,
    pub sku: Option<Sku>,
    pub enabled: bool,
    pub available: Option<u32>,
    pub status: StockStatus,
}

impl From<&VariantRef> for SizeChip {
    fn from(v: &VariantRef) -> Self {
        Self {
            size: v.size.clone(),
            sku: v.sku.clone(),
            enabled: v.is_selectable(),
            available: v.available,
            status: v.status(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GridCard {
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub list_price: Decimal,
    pub badge: Option<Badge>,
    pub colors: Vec<String>,
    pub sizes: Vec<SizeChip>,
}

impl From<&Product> for GridCard {
    fn from(p: &Product) -> Self {
        Self {
            name: p.name.clone(),
            image: p.cover_image().map(ToString::to_string),
            price: p.display_price(),
            list_price: p.price,
            badge: p.badge(),
            colors: p.colors.iter().map(|c| c.color.clone()).collect(),
            sizes: p
                .colors
                .first()
                .map(|c| c.variants.iter().map(SizeChip::from).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GridView {
    pub category: CategorySlug,
    pub cards: Vec<GridCard>,
    /// Rows could not be read; an empty grid here is not an empty category.
    pub degraded: bool,
}

impl From<&Catalog> for GridView {
    fn from(catalog: &Catalog) -> Self {
        Self {
            category: catalog.category.clone(),
            cards: catalog.products.iter().map(|p| GridCard::from(p.as_ref())).collect(),
            degraded: catalog.rows_unavailable,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OverlayView {
    pub sku: Sku,
    pub product: Arc<Product>,
    pub color: String,
    pub size: String,
    pub variant_id: VariantId,
    pub available: Option<u32>,
    pub status: StockStatus,
    pub image: Option<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<SizeChip>,
}

impl OverlayView {
    pub fn from_resolution(r: &Resolution) -> Self {
        let sizes = r
            .color_group()
            .map(|c| c.variants.iter().map(SizeChip::from).collect())
            .unwrap_or_default();
        Self {
            sku: r.sku.clone(),
            product: r.product.clone(),
            color: r.color.clone(),
            size: r.size.clone(),
            variant_id: r.variant_id,
            available: r.available,
            status: r.available.into(),
            image: r.image.clone(),
            colors: r.product.colors.iter().map(|c| c.color.clone()).collect(),
            sizes,
        }
    }

    /// Shows another variant of the same product. `None` for sizes that
    /// cannot be selected.
    pub fn select(product: Arc<Product>, color: &ColorGroup, variant: &VariantRef) -> Option<Self> {
        let (Some(sku), Some(variant_id)) = (variant.sku.clone(), variant.variant_id) else {
            return None;
        };
        if !variant.active {
            return None;
        }
        let resolution = Resolution {
            sku,
            image: color
                .canonical_image()
                .map(ToString::to_string)
                .or_else(|| product.image.clone()),
            product,
            color: color.color.clone(),
            size: variant.size.clone(),
            variant_id,
            available: variant.available,
        };
        Some(Self::from_resolution(&resolution))
    }

    pub fn color_group(&self) -> Option<&ColorGroup> {
        self.product.color(&self.color)
    }

    pub fn stock_keys(&self) -> Vec<StockKey> {
        self.color_group().map(stock_keys).unwrap_or_default()
    }

    /// Overwrites the displayed availability with freshly read stock. The
    /// shared index is left alone.
    pub fn refresh_stock(&mut self, book: &StockBook) {
        let Some(group) = self.color_group().cloned() else {
            return;
        };
        for (chip, variant) in self.sizes.iter_mut().zip(&group.variants) {
            if let Some(id) = variant.variant_id {
                chip.available = book.aggregate(&id, variant.reserved).available;
                chip.status = chip.available.into();
            }
        }
        if let Some(chip) = self.sizes.iter().find(|c| c.size == self.size) {
            self.available = chip.available;
            self.status = chip.status;
        }
    }
}

/// A selectable size of one colour with what is needed to recompute its stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockKey {
    pub variant_id: VariantId,
    pub reserved: u32,
    pub size: String,
    pub sku: Sku,
}

pub fn stock_keys(color: &ColorGroup) -> Vec<StockKey> {
    color
        .variants
        .iter()
        .filter(|v| v.is_selectable())
        .filter_map(|v| {
            Some(StockKey {
                variant_id: v.variant_id?,
                reserved: v.reserved,
                size: v.size.clone(),
                sku: v.sku.clone()?,
            })
        })
        .collect()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum OverlayState {
    Closed,
    Loading { sku: Sku },
    Open(Box<OverlayView>),
    /// The SKU in the URL does not resolve anywhere.
    NotAvailable { sku: Sku },
}

impl OverlayState {
    pub fn sku(&self) -> Option<&Sku> {
        match self {
            Self::Closed => None,
            Self::Loading { sku } | Self::NotAvailable { sku } => Some(sku),
            Self::Open(view) => Some(&view.sku),
        }
    }

    pub fn view(&self) -> Option<&OverlayView> {
        match self {
            Self::Open(view) => Some(view),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub url: String,
    pub state: NavigationState,
    pub grid: Option<GridView>,
    pub overlay: OverlayState,
}
