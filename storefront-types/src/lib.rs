use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

pub mod cart;
pub mod category;
pub mod inventory;
pub mod product;

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From,
)]
pub struct VariantId(pub i64);

/// How a computed availability is shown to the customer.
///
/// `Unconfirmed` is not the same as `OutOfStock`: the first means stock could
/// not be read, the second means it was read and nothing is left.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    #[display("Disponible")]
    InStock,
    #[display("Agotado")]
    OutOfStock,
    #[display("Disponibilidad sin confirmar")]
    Unconfirmed,
}

impl From<Option<u32>> for StockStatus {
    fn from(available: Option<u32>) -> Self {
        match available {
            None => Self::Unconfirmed,
            Some(0) => Self::OutOfStock,
            Some(_) => Self::InStock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_availability_is_not_out_of_stock() {
        assert_eq!(StockStatus::from(None), StockStatus::Unconfirmed);
        assert_eq!(StockStatus::from(Some(0)), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from(Some(4)), StockStatus::InStock);
        assert_ne!(StockStatus::from(None), StockStatus::from(Some(0)));
    }
}
