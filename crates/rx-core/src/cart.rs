//! # Store Cache and Cart
//!
//! The POS client's view of the server: the active branch, a snapshot of
//! that branch's products with their batches, and the cart being rung up.
//!
//! The cache is an explicit value owned by the caller, with two named
//! invalidation points.
//!
//! ## Invalidation Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    StoreCache Lifecycle                                 │
//! │                                                                         │
//! │  Event                    Method                 Effect                 │
//! │  ─────                    ──────                 ──────                 │
//! │                                                                         │
//! │  Products fetched ──────► load_products() ─────► snapshot fresh        │
//! │                                                                         │
//! │  Tap product card ──────► add_to_cart() ───────► expiry check + add    │
//! │                                                                         │
//! │  Pay ───────────────────► to_checkout_request()  (read only)           │
//! │                                                                         │
//! │  201 { saleId } ────────► after_checkout() ────► cart cleared,         │
//! │                                                  snapshot stale        │
//! │                                                                         │
//! │  Branch picker ─────────► switch_branch() ─────► products + cart gone  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::checkout::{CheckoutLine, CheckoutRequest};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::stock_status::{check_cart_add, CartAddCheck};
use crate::types::{PaymentMethod, Product, ProductStock};
use crate::validation::validate_quantity;

// =============================================================================
// Cart
// =============================================================================

/// An item in the cart.
///
/// Name and price are frozen when the item is added, so the cart keeps
/// showing what the cashier saw even if the product changes on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i64,
    /// Batch picked by the cashier, if any.
    pub batch_id: Option<String>,
}

impl CartItem {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            name: product.name_en.clone(),
            unit_price: product.unit_price,
            quantity,
            batch_id: None,
        }
    }

    pub fn line_total(&self) -> Money {
        Money::new(self.unit_price) * self.quantity
    }
}

/// The cart being rung up.
///
/// ## Invariants
/// - Items are unique by `product_id` (adding again increases quantity)
/// - Quantity is positive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product or increases its quantity if already present.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            item.quantity = item
                .quantity
                .checked_add(quantity)
                .ok_or_else(quantity_overflow)?;
            return Ok(());
        }

        self.items.push(CartItem::from_product(product, quantity));
        Ok(())
    }

    /// Sets the quantity of a line. Zero removes it.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }

        validate_quantity(quantity)?;

        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| CoreError::product_not_found(product_id))?;
        item.quantity = quantity;
        Ok(())
    }

    /// Pins a line to a specific batch.
    pub fn select_batch(&mut self, product_id: &str, batch_id: Option<String>) -> CoreResult<()> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| CoreError::product_not_found(product_id))?;
        item.batch_id = batch_id;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CoreError::product_not_found(product_id))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn quantity_overflow() -> CoreError {
    ValidationError::OutOfRange {
        field: "quantity".to_string(),
        min: 1,
        max: i64::MAX,
    }
    .into()
}

// =============================================================================
// Store Cache
// =============================================================================

/// Branch-scoped client cache of products plus the cart.
#[derive(Debug, Clone, Default)]
pub struct StoreCache {
    branch_id: Option<String>,
    products: Vec<ProductStock>,
    stale: bool,
    cart: Cart,
}

impl StoreCache {
    pub fn new(branch_id: impl Into<String>) -> Self {
        Self {
            branch_id: Some(branch_id.into()),
            stale: true,
            ..Self::default()
        }
    }

    pub fn branch_id(&self) -> Option<&str> {
        self.branch_id.as_deref()
    }

    /// Replaces the product snapshot with a fresh fetch.
    pub fn load_products(&mut self, products: Vec<ProductStock>) {
        self.products = products;
        self.stale = false;
    }

    /// True when the snapshot must be refetched before it is trusted.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn products(&self) -> &[ProductStock] {
        &self.products
    }

    pub fn product(&self, product_id: &str) -> Option<&ProductStock> {
        self.products.iter().find(|p| p.product.id == product_id)
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    /// Adds a product to the cart after the expiry check.
    ///
    /// A fully expired product is only added when `confirmed` is set; the
    /// returned check tells the UI which prompt or toast to show.
    pub fn add_to_cart(
        &mut self,
        product_id: &str,
        quantity: i64,
        confirmed: bool,
        warning_days: i64,
        today: NaiveDate,
    ) -> CoreResult<CartAddCheck> {
        let stock = self
            .products
            .iter()
            .find(|p| p.product.id == product_id)
            .ok_or_else(|| CoreError::product_not_found(product_id))?;

        let check = check_cart_add(&stock.batches, warning_days, today);
        if check.adds_without_confirmation() || confirmed {
            self.cart.add_item(&stock.product, quantity)?;
        }
        Ok(check)
    }

    /// Builds the checkout body from the cart.
    pub fn to_checkout_request(
        &self,
        payment_method: PaymentMethod,
        customer_id: Option<String>,
    ) -> CoreResult<CheckoutRequest> {
        let branch_id = self.branch_id.clone().ok_or_else(|| ValidationError::Required {
            field: "branchId".to_string(),
        })?;

        if self.cart.is_empty() {
            return Err(ValidationError::Empty {
                field: "items".to_string(),
            }
            .into());
        }

        Ok(CheckoutRequest {
            branch_id,
            customer_id,
            payment_method,
            items: self
                .cart
                .items
                .iter()
                .map(|item| CheckoutLine {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    batch_id: item.batch_id.clone(),
                })
                .collect(),
            total: self.cart.total().amount(),
        })
    }

    /// Invalidation point after a successful checkout.
    pub fn after_checkout(&mut self) {
        self.cart.clear();
        self.stale = true;
    }

    /// Invalidation point when the cashier switches branch.
    pub fn switch_branch(&mut self, branch_id: impl Into<String>) {
        self.branch_id = Some(branch_id.into());
        self.products.clear();
        self.cart.clear();
        self.stale = true;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
