use crate::VariantId;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOutcome {
    Added,
    /// The store holds less than what was displayed when the customer clicked.
    InsufficientStock { remaining: Option<u32> },
}

#[async_trait]
pub trait CartService: Send + Sync {
    async fn add(&self, variant: VariantId, quantity: u32) -> Result<CartOutcome, anyhow::Error>;
}
