use crate::{StockStatus, VariantId};
use derive_more::{Deref, Display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref)]
pub struct Sku(String);

impl Sku {
    /// Any trimmed, non-empty string is a SKU. The store decides what it
    /// holds, so spaces, accents and punctuation are kept as they are.
    pub fn parse<S: AsRef<str>>(s: S) -> Option<Self> {
        let s = s.as_ref().trim();
        (!s.is_empty()).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub price: Option<Decimal>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub price: Option<Decimal>,
    pub label: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Badge {
    Promotion { label: Option<String> },
    Offer,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub offer: Option<Offer>,
    pub promotion: Option<Promotion>,
    pub colors: Vec<ColorGroup>,
}

impl Product {
    pub fn has_offer(&self) -> bool {
        self.offer.is_some()
    }

    pub fn has_promotion(&self) -> bool {
        self.promotion.is_some()
    }

    /// Promotions win over offers for display; both stay on the product.
    pub fn badge(&self) -> Option<Badge> {
        match (&self.promotion, &self.offer) {
            (Some(p), _) => Some(Badge::Promotion {
                label: p.label.clone(),
            }),
            (None, Some(_)) => Some(Badge::Offer),
            (None, None) => None,
        }
    }

    pub fn display_price(&self) -> Decimal {
        self.promotion
            .as_ref()
            .and_then(|p| p.price)
            .or_else(|| self.offer.as_ref().and_then(|o| o.price))
            .unwrap_or(self.price)
    }

    pub fn color(&self, label: &str) -> Option<&ColorGroup> {
        self.colors.iter().find(|c| c.color == label)
    }

    pub fn cover_image(&self) -> Option<&str> {
        self.image
            .as_deref()
            .or_else(|| self.colors.first().and_then(|c| c.canonical_image()))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ColorGroup {
    pub color: String,
    pub images: Vec<String>,
    pub variants: Vec<VariantRef>,
}

impl ColorGroup {
    pub fn canonical_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn size(&self, label: &str) -> Option<&VariantRef> {
        self.variants.iter().find(|v| v.size == label)
    }

    /// First size a customer may pick: selectable and not confirmed empty.
    /// Falls back to the first selectable size so a sold out colour still opens.
    pub fn preferred_variant(&self) -> Option<&VariantRef> {
        self.variants
            .iter()
            .find(|v| v.is_selectable() && v.available != Some(0))
            .or_else(|| self.variants.iter().find(|v| v.is_selectable()))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VariantRef {
    pub size: String,
    pub sku: Option<Sku>,
    pub variant_id: Option<VariantId>,
    pub active: bool,
    pub stock_total: Option<i64>,
    pub reserved: u32,
    pub available: Option<u32>,
}

impl VariantRef {
    /// Sizes without an active SKU are still listed, but disabled.
    pub fn is_selectable(&self) -> bool {
        self.active && self.sku.is_some() && self.variant_id.is_some()
    }

    pub fn status(&self) -> StockStatus {
        self.available.into()
    }
}
