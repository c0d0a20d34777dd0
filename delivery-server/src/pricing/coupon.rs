//! Coupon Evaluator
//!
//! `evaluate` is the pure discount function used at order placement; it fails
//! closed and returns zero for a coupon that is not currently valid.
//! `check` explains *why* a coupon does not apply and is what the
//! validation endpoint and the order service use before pricing.

use rust_decimal::prelude::*;
use shared::error::{AppError, ErrorCode};
use shared::models::{Coupon, CouponKind};
use shared::util::round_money;
use thiserror::Error;

/// Reason a coupon cannot be applied to a cart
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CouponRejection {
    #[error("Coupon is not active")]
    Inactive,

    #[error("Coupon is not valid yet")]
    NotStarted,

    #[error("Coupon has expired")]
    Expired,

    #[error("Coupon usage limit reached")]
    Exhausted,

    #[error("You already used this coupon")]
    PerUserLimitReached,

    #[error("Minimum order of {minimum} required")]
    MinimumNotMet { minimum: Decimal },
}

impl From<CouponRejection> for AppError {
    fn from(err: CouponRejection) -> Self {
        let message = err.to_string();
        match err {
            CouponRejection::Inactive | CouponRejection::NotStarted | CouponRejection::Expired => {
                AppError::with_message(ErrorCode::CouponInvalid, message)
            }
            CouponRejection::Exhausted | CouponRejection::PerUserLimitReached => {
                AppError::with_message(ErrorCode::CouponUsageExceeded, message)
            }
            CouponRejection::MinimumNotMet { minimum } => {
                AppError::with_message(ErrorCode::CouponMinimumNotMet, message)
                    .with_detail("minimum_order", minimum.to_string())
            }
        }
    }
}

/// Discount granted by `coupon`
///
/// Goods discounts (percentage, fixed amount) are clamped to `[0, subtotal]`.
/// A free-delivery coupon discounts exactly the restaurant's delivery fee.
pub fn evaluate(coupon: &Coupon, subtotal: Decimal, delivery_fee: Decimal, now: i64) -> Decimal {
    if !coupon.is_valid(now) {
        return Decimal::ZERO;
    }

    let subtotal = subtotal.max(Decimal::ZERO);
    let discount = match coupon.kind {
        CouponKind::Percentage => {
            let raw = subtotal * coupon.value / Decimal::ONE_HUNDRED;
            let capped = match coupon.maximum_discount {
                Some(max) => raw.min(max),
                None => raw,
            };
            capped.clamp(Decimal::ZERO, subtotal)
        }
        CouponKind::FixedAmount => coupon.value.min(subtotal).max(Decimal::ZERO),
        CouponKind::FreeDelivery => delivery_fee.max(Decimal::ZERO),
    };

    round_money(discount)
}

/// Eligibility of `coupon` for a cart of `subtotal`
///
/// `user_redemptions` is how many orders this user already placed with it.
pub fn check(
    coupon: &Coupon,
    subtotal: Decimal,
    user_redemptions: u32,
    now: i64,
) -> Result<(), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if !coupon.has_started(now) {
        return Err(CouponRejection::NotStarted);
    }
    if coupon.is_expired(now) {
        return Err(CouponRejection::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponRejection::Exhausted);
    }
    if coupon
        .per_user_limit
        .is_some_and(|limit| user_redemptions >= limit)
    {
        return Err(CouponRejection::PerUserLimitReached);
    }
    if subtotal < coupon.minimum_order {
        return Err(CouponRejection::MinimumNotMet {
            minimum: coupon.minimum_order,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_750_000_000_000;

    fn coupon(kind: CouponKind, value: i64) -> Coupon {
        Coupon {
            id: 1,
            code: "TEST".into(),
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

    fn bienvenue() -> Coupon {
        Coupon {
            code: "BIENVENUE".into(),
            minimum_order: Decimal::from(2000),
            maximum_discount: Some(Decimal::from(2000)),
            ..coupon(CouponKind::Percentage, 10)
        }
    }

    #[test]
    fn percentage_with_cap() {
        let c = bienvenue();
        assert_eq!(evaluate(&c, Decimal::from(5000), Decimal::from(500), NOW), Decimal::from(500));
        // 10% of 30000 = 3000, capped at 2000
        assert_eq!(evaluate(&c, Decimal::from(30000), Decimal::from(500), NOW), Decimal::from(2000));
    }

    #[test]
    fn fixed_amount_never_exceeds_subtotal() {
        let c = coupon(CouponKind::FixedAmount, 1500);
        assert_eq!(evaluate(&c, Decimal::from(1000), Decimal::from(500), NOW), Decimal::from(1000));
        assert_eq!(evaluate(&c, Decimal::from(4000), Decimal::from(500), NOW), Decimal::from(1500));
    }

    #[test]
    fn percentage_over_hundred_is_clamped() {
        let c = coupon(CouponKind::Percentage, 150);
        assert_eq!(evaluate(&c, Decimal::from(1000), Decimal::ZERO, NOW), Decimal::from(1000));
    }

    #[test]
    fn free_delivery_discounts_the_fee() {
        let c = coupon(CouponKind::FreeDelivery, 0);
        assert_eq!(evaluate(&c, Decimal::from(10000), Decimal::from(500), NOW), Decimal::from(500));
    }

    #[test]
    fn invalid_coupon_fails_closed() {
        let mut expired = bienvenue();
        expired.expires_at = Some(NOW - 1);
        assert_eq!(evaluate(&expired, Decimal::from(5000), Decimal::from(500), NOW), Decimal::ZERO);

        let mut inactive = bienvenue();
        inactive.is_active = false;
        assert_eq!(evaluate(&inactive, Decimal::from(5000), Decimal::from(500), NOW), Decimal::ZERO);

        let mut future = bienvenue();
        future.starts_at = Some(NOW + 1000);
        assert_eq!(evaluate(&future, Decimal::from(5000), Decimal::from(500), NOW), Decimal::ZERO);

        let mut used_up = bienvenue();
        used_up.usage_limit = Some(3);
        used_up.usage_count = 3;
        assert_eq!(evaluate(&used_up, Decimal::from(5000), Decimal::from(500), NOW), Decimal::ZERO);
    }

    #[test]
    fn discount_never_negative_or_above_subtotal() {
        let kinds = [
            coupon(CouponKind::Percentage, 35),
            coupon(CouponKind::FixedAmount, 700),
            coupon(CouponKind::FixedAmount, -50),
        ];
        for c in &kinds {
            for sub in [0, 1, 499, 1000, 123456] {
                let sub = Decimal::from(sub);
                let d = evaluate(c, sub, Decimal::from(500), NOW);
                assert!(d >= Decimal::ZERO, "{c:?} gave {d} on {sub}");
                assert!(d <= sub, "{c:?} gave {d} on {sub}");
            }
        }
    }

    #[test]
    fn check_reports_reasons() {
        let c = bienvenue();
        assert!(check(&c, Decimal::from(5000), 0, NOW).is_ok());
        assert_eq!(
            check(&c, Decimal::from(1500), 0, NOW),
            Err(CouponRejection::MinimumNotMet {
                minimum: Decimal::from(2000)
            })
        );

        let mut once = bienvenue();
        once.per_user_limit = Some(1);
        assert_eq!(
            check(&once, Decimal::from(5000), 1, NOW),
            Err(CouponRejection::PerUserLimitReached)
        );

        let mut expired = bienvenue();
        expired.expires_at = Some(NOW - 1);
        assert_eq!(check(&expired, Decimal::from(5000), 0, NOW), Err(CouponRejection::Expired));
    }

    #[test]
    fn rejection_maps_to_error_codes() {
        let err: AppError = CouponRejection::Exhausted.into();
        assert_eq!(err.code, ErrorCode::CouponUsageExceeded);
        let err: AppError = CouponRejection::MinimumNotMet {
            minimum: Decimal::from(2000),
        }
        .into();
        assert_eq!(err.code, ErrorCode::CouponMinimumNotMet);
        assert!(err.details.unwrap().contains_key("minimum_order"));
    }
}
