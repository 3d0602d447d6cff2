use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::error::OrderError;
use crate::status::OrderStatus;

/// One grouped line of an order, a value snapshot taken at checkout.
/// Independent of the current dish or cart state, so price never drifts
/// after the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub seller_company: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order. Lines and owner are immutable after creation; only `status`
/// mutates, through the transition methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub owner: UserId,
    pub lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Groups per-unit cart entries into order lines, preserving the order
    /// in which products first appeared in the cart.
    pub fn lines_from_cart(cart_lines: &[CartLine]) -> Vec<OrderLine> {
        let mut grouped: Vec<OrderLine> = Vec::new();
        for line in cart_lines {
            match grouped.iter_mut().find(|g| g.product_id == line.product_id) {
                Some(existing) => existing.quantity += 1,
                None => grouped.push(OrderLine {
                    product_id: line.product_id,
                    name: line.name.clone(),
                    seller_company: line.seller_company.clone(),
                    unit_price: line.unit_price,
                    quantity: 1,
                }),
            }
        }
        grouped
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    /// Quantities keyed by product, the shape of a stock-check request.
    pub fn product_quantities(&self) -> BTreeMap<ProductId, u32> {
        self.lines
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect()
    }

    /// `Pending` to `BeingDelivered`. Fails from any terminal state.
    pub fn begin_delivery(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::BeingDelivered)
    }

    /// `Pending` to `Canceled`. Fails from any terminal state.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Canceled)
    }

    fn transition(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_finalize() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
