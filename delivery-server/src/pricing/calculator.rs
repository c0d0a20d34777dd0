//! Order Pricing Engine
//!
//! Turns cart lines into an immutable line snapshot plus
//! `subtotal / delivery_fee / discount / total`.
//!
//! # Invariants
//!
//! - `total == subtotal + delivery_fee - discount`, unless clamped at 0
//! - `discount >= 0`, `total >= 0`
//! - `delivery_fee` is the restaurant's gross fee. A free-delivery coupon
//!   sets `delivery_fee_waived` and discounts exactly that fee.

use std::collections::HashMap;

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Coupon, CouponKind, MenuItem, Restaurant};
use shared::order::OrderLine;
use shared::util::round_money;
use thiserror::Error;

use super::coupon::evaluate;
use crate::storage::{Storage, StorageError};

/// One line of the client's cart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub menu_item_id: i64,
    pub quantity: u32,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

/// Read access to menu items
pub trait MenuLookup {
    fn menu_item(&self, id: i64) -> Result<Option<MenuItem>, StorageError>;
}

impl MenuLookup for HashMap<i64, MenuItem> {
    fn menu_item(&self, id: i64) -> Result<Option<MenuItem>, StorageError> {
        Ok(self.get(&id).cloned())
    }
}

/// Menu lookup inside an open write transaction
pub struct TxnMenu<'a> {
    pub storage: &'a Storage,
    pub txn: &'a redb::WriteTransaction,
}

impl MenuLookup for TxnMenu<'_> {
    fn menu_item(&self, id: i64) -> Result<Option<MenuItem>, StorageError> {
        self.storage.get_menu_item_txn(self.txn, id)
    }
}

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Quantity must be at least 1 for item {0}")]
    InvalidQuantity(i64),

    #[error("Menu item {0} not found")]
    ItemNotFound(i64),

    #[error("{name} is not on this restaurant's menu")]
    WrongRestaurant { item_id: i64, name: String },

    #[error("{name} is currently unavailable")]
    ItemUnavailable { item_id: i64, name: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        let message = err.to_string();
        match err {
            PricingError::EmptyCart => AppError::with_message(ErrorCode::EmptyCart, message),
            PricingError::InvalidQuantity(id) => {
                AppError::validation(message).with_detail("menu_item_id", id)
            }
            PricingError::ItemNotFound(id) => {
                AppError::with_message(ErrorCode::MenuItemNotFound, message)
                    .with_detail("menu_item_id", id)
            }
            PricingError::WrongRestaurant { item_id, name }
            | PricingError::ItemUnavailable { item_id, name } => {
                AppError::with_message(ErrorCode::ItemUnavailable, message)
                    .with_detail("menu_item_id", item_id)
                    .with_detail("name", name)
            }
            PricingError::Storage(e) => e.into(),
        }
    }
}

/// Result of pricing a cart
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub lines: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub delivery_fee_waived: bool,
    pub discount: Decimal,
    pub total: Decimal,
    /// Whether the coupon passed in actually applied
    pub coupon_applied: bool,
}

impl PricedOrder {
    /// Fee the client actually pays
    pub fn charged_delivery_fee(&self) -> Decimal {
        if self.delivery_fee_waived {
            Decimal::ZERO
        } else {
            self.delivery_fee
        }
    }
}

/// Price a cart against the restaurant's menu
///
/// Any unknown, foreign or unavailable item fails the whole cart. The coupon,
/// if given, is evaluated as-is; callers decide eligibility with
/// [`super::check`] beforehand.
pub fn price(
    cart: &[CartLine],
    menu: &impl MenuLookup,
    restaurant: &Restaurant,
    coupon: Option<&Coupon>,
    now: i64,
) -> Result<PricedOrder, PricingError> {
    if cart.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let mut lines = Vec::with_capacity(cart.len());
    let mut subtotal = Decimal::ZERO;

    for line in cart {
        if line.quantity == 0 {
            return Err(PricingError::InvalidQuantity(line.menu_item_id));
        }
        let item = menu
            .menu_item(line.menu_item_id)?
            .ok_or(PricingError::ItemNotFound(line.menu_item_id))?;
        if item.restaurant_id != restaurant.id {
            return Err(PricingError::WrongRestaurant {
                item_id: item.id,
                name: item.name,
            });
        }
        if !item.is_available {
            return Err(PricingError::ItemUnavailable {
                item_id: item.id,
                name: item.name,
            });
        }

        let unit_price = item.effective_price();
        let line_total = round_money(unit_price * Decimal::from(line.quantity));
        subtotal += line_total;
        lines.push(OrderLine {
            menu_item_id: item.id,
            name: item.name,
            unit_price,
            quantity: line.quantity,
            line_total,
            special_instructions: line.special_instructions.clone(),
        });
    }

    let delivery_fee = restaurant.delivery_fee.max(Decimal::ZERO);
    let (discount, coupon_applied, delivery_fee_waived) = match coupon {
        Some(c) if c.is_valid(now) => {
            let discount = evaluate(c, subtotal, delivery_fee, now);
            (discount, true, c.kind == CouponKind::FreeDelivery)
        }
        _ => (Decimal::ZERO, false, false),
    };

    let total = round_money((subtotal + delivery_fee - discount).max(Decimal::ZERO));

    Ok(PricedOrder {
        lines,
        subtotal,
        delivery_fee,
        delivery_fee_waived,
        discount,
        total,
        coupon_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::GeoPoint;

    const NOW: i64 = 1_750_000_000_000;

    fn restaurant() -> Restaurant {
        Restaurant {
            id: 1,
            name: "Chez Mama".into(),
            owner_id: 99,
            location: GeoPoint::new(4.05, 9.7),
            delivery_fee: Decimal::from(500),
            minimum_order: Decimal::from(1000),
            delivery_time_min: 20,
            delivery_time_max: 40,
            is_open: true,
            rating: 0.0,
            rating_count: 0,
        }
    }

    fn item(id: i64, restaurant_id: i64, price: i64) -> MenuItem {
        MenuItem {
            id,
            restaurant_id,
            name: format!("Item {id}"),
            price: Decimal::from(price),
            discount_price: None,
            is_available: true,
        }
    }

    fn menu() -> HashMap<i64, MenuItem> {
        let mut discounted = item(3, 1, 3000);
        discounted.discount_price = Some(Decimal::from(2500));
        let mut unavailable = item(4, 1, 1000);
        unavailable.is_available = false;
        [item(1, 1, 2500), item(2, 1, 5000), discounted, unavailable, item(5, 2, 800)]
            .into_iter()
            .map(|i| (i.id, i))
            .collect()
    }

    fn line(id: i64, quantity: u32) -> CartLine {
        CartLine {
            menu_item_id: id,
            quantity,
            special_instructions: None,
        }
    }

    fn coupon(kind: CouponKind, value: i64) -> Coupon {
        Coupon {
            id: 7,
            code: "C".into(),
            kind,
            value: Decimal::from(value),
            minimum_order: Decimal::ZERO,
            maximum_discount: None,
            usage_limit: None,
            usage_count: 0,
            per_user_limit: None,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    fn assert_invariant(p: &PricedOrder) {
        assert!(p.discount >= Decimal::ZERO);
        assert!(p.total >= Decimal::ZERO);
        assert_eq!(p.total, p.subtotal + p.delivery_fee - p.discount);
    }

    #[test]
    fn prices_lines_with_discounted_unit_price() {
        let p = price(&[line(1, 2), line(3, 1)], &menu(), &restaurant(), None, NOW).unwrap();
        assert_eq!(p.subtotal, Decimal::from(7500));
        assert_eq!(p.lines[1].unit_price, Decimal::from(2500));
        assert_eq!(p.delivery_fee, Decimal::from(500));
        assert_eq!(p.total, Decimal::from(8000));
        assert!(!p.coupon_applied);
        assert_invariant(&p);
    }

    #[test]
    fn bienvenue_scenario() {
        let mut c = coupon(CouponKind::Percentage, 10);
        c.maximum_discount = Some(Decimal::from(2000));
        c.minimum_order = Decimal::from(2000);
        let p = price(&[line(2, 1)], &menu(), &restaurant(), Some(&c), NOW).unwrap();
        assert_eq!(p.subtotal, Decimal::from(5000));
        assert_eq!(p.discount, Decimal::from(500));
        assert_eq!(p.delivery_fee, Decimal::from(500));
        assert_eq!(p.total, Decimal::from(5000));
        assert!(p.coupon_applied);
        assert_invariant(&p);
    }

    #[test]
    fn free_delivery_scenario() {
        let c = coupon(CouponKind::FreeDelivery, 0);
        let p = price(&[line(2, 2)], &menu(), &restaurant(), Some(&c), NOW).unwrap();
        assert_eq!(p.subtotal, Decimal::from(10000));
        assert_eq!(p.discount, Decimal::from(500));
        assert!(p.delivery_fee_waived);
        assert_eq!(p.charged_delivery_fee(), Decimal::ZERO);
        assert_eq!(p.total, Decimal::from(10000));
        assert_invariant(&p);
    }

    #[test]
    fn expired_coupon_is_not_applied() {
        let mut c = coupon(CouponKind::FixedAmount, 1000);
        c.expires_at = Some(NOW - 1);
        let p = price(&[line(1, 1)], &menu(), &restaurant(), Some(&c), NOW).unwrap();
        assert_eq!(p.discount, Decimal::ZERO);
        assert!(!p.coupon_applied);
        assert_invariant(&p);
    }

    #[test]
    fn rejects_bad_carts() {
        let m = menu();
        let r = restaurant();
        assert!(matches!(price(&[], &m, &r, None, NOW), Err(PricingError::EmptyCart)));
        assert!(matches!(
            price(&[line(1, 0)], &m, &r, None, NOW),
            Err(PricingError::InvalidQuantity(1))
        ));
        assert!(matches!(
            price(&[line(1, 1), line(42, 1)], &m, &r, None, NOW),
            Err(PricingError::ItemNotFound(42))
        ));
        assert!(matches!(
            price(&[line(4, 1)], &m, &r, None, NOW),
            Err(PricingError::ItemUnavailable { item_id: 4, .. })
        ));
        assert!(matches!(
            price(&[line(5, 1)], &m, &r, None, NOW),
            Err(PricingError::WrongRestaurant { item_id: 5, .. })
        ));
    }

    #[test]
    fn invariant_holds_across_coupons() {
        let coupons = [
            coupon(CouponKind::Percentage, 25),
            coupon(CouponKind::FixedAmount, 100_000),
            coupon(CouponKind::FreeDelivery, 0),
        ];
        for c in &coupons {
            for qty in 1..4 {
                let p = price(&[line(1, qty), line(3, 1)], &menu(), &restaurant(), Some(c), NOW)
                    .unwrap();
                assert_invariant(&p);
            }
        }
    }
}
