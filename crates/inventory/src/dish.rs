//! Dish inventory record.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A dish offered by a seller company.
///
/// `stock_count` is unsigned: a reservation can never drive it negative,
/// and the engine only decrements after verifying sufficiency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    /// Identity assigned by the dish store on creation.
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub unit_price: Money,
    /// Owning seller company.
    pub company_name: String,
    pub stock_count: u32,
}

impl Dish {
    /// Returns true if the dish can cover the requested quantity.
    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock_count >= quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dish(stock: u32) -> Dish {
        Dish {
            id: ProductId::new(1),
            name: "Tacos al pastor".to_string(),
            description: "Three tacos".to_string(),
            unit_price: Money::from_cents(1200),
            company_name: "Casa Lupita".to_string(),
            stock_count: stock,
        }
    }

    #[test]
    fn has_stock_boundary() {
        assert!(dish(5).has_stock(5));
        assert!(dish(5).has_stock(1));
        assert!(!dish(5).has_stock(6));
        assert!(!dish(0).has_stock(1));
        assert!(dish(0).has_stock(0));
    }
}
