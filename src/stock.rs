//! Reduces per-warehouse stock rows into the quantity a customer can buy.

use std::collections::{HashMap, HashSet};
use storefront_types::inventory::StockLevel;
use storefront_types::VariantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aggregate {
    /// Sum over warehouses, `None` when no stock row was read.
    pub stock_total: Option<i64>,
    pub available: Option<u32>,
}

/// `max(0, sum(quantities) - reserved)`, or unknown when there is nothing to sum.
pub fn aggregate<I>(quantities: I, reserved: u32) -> Aggregate
where
    I: IntoIterator<Item = i64>,
{
    let total = quantities
        .into_iter()
        .fold(None, |acc: Option<i64>, q| Some(acc.unwrap_or(0).saturating_add(q)));
    match total {
        None => Aggregate::default(),
        Some(total) => {
            let free = total.saturating_sub(i64::from(reserved)).max(0);
            Aggregate {
                stock_total: Some(total),
                available: Some(u32::try_from(free).unwrap_or(u32::MAX)),
            }
        }
    }
}

/// Stock rows gathered for a load, keyed by variant.
///
/// Variants whose query failed are remembered separately so that they report
/// unknown availability even if a later batch happens to mention them.
#[derive(Debug, Default, Clone)]
pub struct StockBook {
    levels: HashMap<VariantId, Vec<i64>>,
    failed: HashSet<VariantId>,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<I: IntoIterator<Item = StockLevel>>(&mut self, levels: I) {
        for level in levels {
            self.levels
                .entry(level.variant_id)
                .or_default()
                .push(level.quantity);
        }
    }

    pub fn mark_failed<'a, I: IntoIterator<Item = &'a VariantId>>(&mut self, variants: I) {
        self.failed.extend(variants);
    }

    pub fn aggregate(&self, variant: &VariantId, reserved: u32) -> Aggregate {
        if self.failed.contains(variant) {
            return Aggregate::default();
        }
        match self.levels.get(variant) {
            Some(q) => aggregate(q.iter().copied(), reserved),
            None => Aggregate::default(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
