use crate::index::Resolution;
use crate::stock::StockBook;
use itertools::Itertools;
use log_error::LogError;
use std::sync::Arc;
use storefront_types::inventory::{ProductRepository, StockRepository, VariantRepository};
use storefront_types::product::{ColorGroup, Offer, Product, Promotion, Sku, VariantRef};

/// Resolves a SKU straight against the store when the loaded index does not
/// know it, e.g. a shared link into another category.
///
/// Only the requested colour and size are populated on the returned product.
pub struct RemoteResolver {
    variants: Arc<dyn VariantRepository>,
    products: Arc<dyn ProductRepository>,
    stock: Arc<dyn StockRepository>,
}

impl RemoteResolver {
    pub fn new(
        variants: Arc<dyn VariantRepository>,
        products: Arc<dyn ProductRepository>,
        stock: Arc<dyn StockRepository>,
    ) -> Self {
        Self {
            variants,
            products,
            stock,
        }
    }

    pub async fn resolve(&self, sku: &Sku) -> Option<Resolution> {
        let variant = self
            .variants
            .get_one(&sku.to_string())
            .await
            .log_error("Unable to look up variant")
            .flatten()?;
        if !variant.active {
            log::debug!("SKU {sku} exists but is inactive");
            return None;
        }
        let Some(product) = self
            .products
            .get_one(&variant.product)
            .await
            .log_error("Unable to load product")
            .flatten()
        else {
            log::warn!("SKU {sku} points to missing product {:?}", variant.product);
            return None;
        };

        let mut book = StockBook::new();
        match self.stock.stock_levels(&[variant.variant_id]).await {
            Ok(levels) => book.record(levels),
            Err(err) => {
                log::warn!("Unable to fetch stock of {sku}, availability left unconfirmed: {err:#}");
                book.mark_failed(&[variant.variant_id]);
            }
        }
        let aggregate = book.aggregate(&variant.variant_id, variant.reserved);

        let images = variant.images.into_iter().unique().collect::<Vec<_>>();
        let image = images.first().cloned().or_else(|| product.image.clone());
        let product = Arc::new(Product {
            name: product.name,
            category: product.category,
            description: product.description,
            price: product.price,
            image: product.image,
            offer: variant.offer_active.then_some(Offer {
                price: variant.offer_price,
            }),
            promotion: variant.promotion_active.then(|| Promotion {
                price: variant.promotion_price,
                label: variant.promotion_label.clone(),
            }),
            colors: vec![ColorGroup {
                color: variant.color.clone(),
                images,
                variants: vec![VariantRef {
                    size: variant.size.clone(),
                    sku: Some(sku.clone()),
                    variant_id: Some(variant.variant_id),
                    active: true,
                    stock_total: aggregate.stock_total,
                    reserved: variant.reserved,
                    available: aggregate.available,
                }],
            }],
        });
        Some(Resolution {
            sku: sku.clone(),
            product,
            color: variant.color,
            size: variant.size,
            variant_id: variant.variant_id,
            available: aggregate.available,
            image,
        })
    }
}
