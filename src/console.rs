//! Line commands understood by the interactive binary.

use crate::stock;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use storefront_types::cart::{CartOutcome, CartService};
use storefront_types::inventory::StockRepository;
use storefront_types::VariantId;
use url::Url;

pub const HELP: &str = "commands: tab <slug> | open <sku> | color <label> | size <label> | close | back | forward | cart <qty> | url <url> | show | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tab(String),
    Open(String),
    Color(String),
    Size(String),
    Close,
    Back,
    Forward,
    Cart(u32),
    Url(Url),
    Show,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        let required = |what: &str| -> Result<String, anyhow::Error> {
            match arg {
                "" => Err(anyhow!("{name} expects {what}")),
                arg => Ok(arg.to_string()),
            }
        };
        Ok(match name.to_lowercase().as_str() {
            "tab" => Self::Tab(required("a category")?),
            "open" => Self::Open(required("a SKU")?),
            "color" | "colour" => Self::Color(required("a colour")?),
            "size" => Self::Size(required("a size")?),
            "close" => Self::Close,
            "back" => Self::Back,
            "forward" => Self::Forward,
            "cart" => Self::Cart(match arg {
                "" => 1,
                qty => qty
                    .parse()
                    .with_context(|| format!("Invalid quantity {qty:?}"))?,
            }),
            "url" => Self::Url(Url::parse(&required("a URL")?)?),
            "show" => Self::Show,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(anyhow!("Unknown command {other:?}")),
        })
    }
}

/// Accepts additions as long as the warehouses hold enough unreserved units.
pub struct StockCheckedCart {
    stock: Arc<dyn StockRepository>,
}

impl StockCheckedCart {
    pub fn new(stock: Arc<dyn StockRepository>) -> Self {
        Self { stock }
    }
}

#[async_trait]
impl CartService for StockCheckedCart {
    async fn add(&self, variant: VariantId, quantity: u32) -> Result<CartOutcome, anyhow::Error> {
        let levels = self.stock.stock_levels(&[variant]).await?;
        let reserved = self.stock.reserved(variant).await?;
        match stock::aggregate(levels.iter().map(|l| l.quantity), reserved).available {
            Some(available) if available >= quantity => {
                log::info!("Added {quantity} x {variant} to cart");
                Ok(CartOutcome::Added)
            }
            remaining => Ok(CartOutcome::InsufficientStock { remaining }),
        }
    }
}
