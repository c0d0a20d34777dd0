//! Order pricing
//!
//! - [`coupon`] - discount evaluation and eligibility checks
//! - [`calculator`] - subtotal / fee / discount / total from cart lines
//!
//! Pricing runs exactly once, when the order is placed. The resulting line
//! snapshot and amounts are stored on the order and never recomputed.

pub mod calculator;
pub mod coupon;

pub use calculator::{CartLine, MenuLookup, PricedOrder, PricingError, TxnMenu, price};
pub use coupon::{CouponRejection, check, evaluate};
