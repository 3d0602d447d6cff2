//! Cart aggregator.
//!
//! A cart holds one entry per unit so single units can be removed without
//! touching the rest of the line. All mutations are in-memory; `persist`
//! is the only operation that touches the repository, and only when the
//! dirty flag says there is something to flush.

use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::CartError;
use crate::repository::CartRepository;

/// One unit of one product in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub seller_company: String,
}

/// A user's cart. One per user, never shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub owner: UserId,
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn empty(owner: UserId) -> Self {
        Self {
            owner,
            lines: Vec::new(),
        }
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(|line| line.unit_price).sum()
    }
}

/// The live cart of whichever user is currently interacting with the order
/// service. Holds at most one cart at a time; initializing for a different
/// user replaces it.
pub struct CartSession<R: CartRepository> {
    repository: R,
    current: Option<Cart>,
    dirty: bool,
}

impl<R: CartRepository> CartSession<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            current: None,
            dirty: false,
        }
    }

    /// Loads or creates the user's cart. Idempotent for the same user; a
    /// different user replaces the held cart without flushing it.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&mut self, user_id: UserId) {
        if self.current.as_ref().is_some_and(|c| c.owner == user_id) {
            return;
        }
        self.current = Some(
            self.repository
                .find_by_owner(user_id)
                .await
                .unwrap_or_else(|| Cart::empty(user_id)),
        );
        self.dirty = false;
    }

    /// Re-reads the stored cart for the current user, discarding unflushed
    /// in-memory changes.
    pub async fn refresh(&mut self) -> Result<(), CartError> {
        let owner = self.cart()?.owner;
        self.current = Some(
            self.repository
                .find_by_owner(owner)
                .await
                .unwrap_or_else(|| Cart::empty(owner)),
        );
        self.dirty = false;
        Ok(())
    }

    /// Appends `quantity` individual unit entries.
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        name: &str,
        unit_price: Money,
        seller_company: &str,
    ) -> Result<(), CartError> {
        let cart = self.cart_mut()?;
        for _ in 0..quantity {
            cart.lines.push(CartLine {
                product_id,
                name: name.to_string(),
                unit_price,
                seller_company: seller_company.to_string(),
            });
        }
        if quantity > 0 {
            self.dirty = true;
        }
        Ok(())
    }

    /// Removes up to `quantity` unit entries for the product. Returns the
    /// number actually removed; fails only if the product is absent.
    pub fn remove_line(&mut self, product_id: ProductId, quantity: u32) -> Result<u32, CartError> {
        let cart = self.cart_mut()?;
        let mut removed = 0;
        cart.lines.retain(|line| {
            if removed < quantity && line.product_id == product_id {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed == 0 {
            return Err(CartError::LineNotFound(product_id));
        }
        self.dirty = true;
        Ok(removed)
    }

    /// Empties the cart in memory.
    pub fn clear(&mut self) -> Result<(), CartError> {
        let cart = self.cart_mut()?;
        if !cart.lines.is_empty() {
            cart.lines.clear();
            self.dirty = true;
        }
        Ok(())
    }

    /// Flushes to the repository if anything changed since the last flush.
    #[tracing::instrument(skip(self))]
    pub async fn persist(&mut self) -> Result<(), CartError> {
        if !self.dirty {
            return Ok(());
        }
        let cart = self.current.as_ref().ok_or(CartError::NotInitialized)?;
        self.repository.save(cart.clone()).await;
        self.dirty = false;
        Ok(())
    }

    pub fn cart(&self) -> Result<&Cart, CartError> {
        self.current.as_ref().ok_or(CartError::NotInitialized)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn cart_mut(&mut self) -> Result<&mut Cart, CartError> {
        self.current.as_mut().ok_or(CartError::NotInitialized)
    }
}
