//! Driver earnings
//!
//! The amount credited to the driver when a delivery completes. Policies
//! are computed from the gross restaurant delivery fee, so a free-delivery
//! coupon does not reduce the driver's pay.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::*;
use serde::Serialize;
use shared::delivery::{Delivery, DeliveryStatus};
use shared::order::Order;
use shared::util::round_money;

/// Computes what a driver earns for a completed delivery
pub trait EarningsPolicy: Send + Sync + std::fmt::Debug {
    fn earnings(&self, delivery: &Delivery, order: &Order) -> Decimal;
}

/// Same amount for every delivery
#[derive(Debug, Clone)]
pub struct FlatRate {
    pub amount: Decimal,
}

impl EarningsPolicy for FlatRate {
    fn earnings(&self, _delivery: &Delivery, _order: &Order) -> Decimal {
        round_money(self.amount.max(Decimal::ZERO))
    }
}

/// Base amount plus a per-kilometre rate
#[derive(Debug, Clone)]
pub struct DistanceBased {
    pub base: Decimal,
    pub per_km: Decimal,
}

impl EarningsPolicy for DistanceBased {
    fn earnings(&self, delivery: &Delivery, _order: &Order) -> Decimal {
        let km = Decimal::from_f64(delivery.distance_km).unwrap_or(Decimal::ZERO);
        round_money((self.base + self.per_km * km).max(Decimal::ZERO))
    }
}

/// Percentage of the restaurant delivery fee
#[derive(Debug, Clone)]
pub struct FeeShare {
    pub percent: Decimal,
}

impl EarningsPolicy for FeeShare {
    fn earnings(&self, _delivery: &Delivery, order: &Order) -> Decimal {
        round_money((order.delivery_fee * self.percent / Decimal::ONE_HUNDRED).max(Decimal::ZERO))
    }
}

/// Policy selector read from `EARNINGS_POLICY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EarningsKind {
    Flat,
    Distance,
    #[default]
    FeeShare,
}

impl FromStr for EarningsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "distance" => Ok(Self::Distance),
            "fee_share" => Ok(Self::FeeShare),
            other => Err(format!("unknown earnings policy: {other}")),
        }
    }
}

/// Aggregated earnings shown to a driver
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EarningsSummary {
    pub today: Decimal,
    pub this_week: Decimal,
    pub this_month: Decimal,
    pub total: Decimal,
    pub wallet_balance: Decimal,
    pub delivered_count: u32,
    pub delivered_today: u32,
}

fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

/// Sum delivered earnings into calendar buckets (UTC, weeks start Monday)
pub fn summarize(deliveries: &[Delivery], wallet_balance: Decimal, now: DateTime<Utc>) -> EarningsSummary {
    let today = day_start(now);
    let week = today - Duration::days(i64::from(now.weekday().num_days_from_monday()));
    let month = today - Duration::days(i64::from(now.day0()));
    let (today, week, month) = (
        today.timestamp_millis(),
        week.timestamp_millis(),
        month.timestamp_millis(),
    );

    let mut summary = EarningsSummary {
        wallet_balance,
        ..Default::default()
    };
    for d in deliveries.iter().filter(|d| d.status == DeliveryStatus::Delivered) {
        let amount = d.driver_earnings.unwrap_or(Decimal::ZERO);
        let at = d.delivered_at.unwrap_or(d.updated_at);
        summary.total += amount;
        summary.delivered_count += 1;
        if at >= month {
            summary.this_month += amount;
        }
        if at >= week {
            summary.this_week += amount;
        }
        if at >= today {
            summary.today += amount;
            summary.delivered_today += 1;
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::GeoPoint;
    use shared::order::{OrderStatus, PaymentMethod, PaymentStatus};

    fn delivery(distance_km: f64) -> Delivery {
        Delivery {
            id: 1,
            order_id: 1,
            driver_id: Some(5),
            status: DeliveryStatus::Delivered,
            pickup: GeoPoint::new(4.05, 9.70),
            dropoff: GeoPoint::new(4.06, 9.71),
            delivery_address: String::new(),
            distance_km,
            estimated_minutes: 0,
            proof_photo: None,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            failure_reason: None,
            driver_earnings: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn order(fee: i64, waived: bool) -> Order {
        Order {
            id: 1,
            order_number: "RD-X".into(),
            client_id: 1,
            restaurant_id: 1,
            address_id: 1,
            coupon_id: None,
            coupon_code: None,
            status: OrderStatus::Delivered,
            items: vec![],
            subtotal: Decimal::from(10000),
            delivery_fee: Decimal::from(fee),
            delivery_fee_waived: waived,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Paid,
            special_instructions: None,
            cancellation_reason: None,
            estimated_delivery: 0,
            delivered_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn policies() {
        let flat = FlatRate {
            amount: Decimal::from(500),
        };
        assert_eq!(flat.earnings(&delivery(3.0), &order(500, false)), Decimal::from(500));

        let distance = DistanceBased {
            base: Decimal::from(300),
            per_km: Decimal::from(100),
        };
        assert_eq!(distance.earnings(&delivery(2.5), &order(500, false)), Decimal::from(550));

        let share = FeeShare {
            percent: Decimal::from(80),
        };
        assert_eq!(share.earnings(&delivery(1.0), &order(500, false)), Decimal::from(400));
        assert_eq!(share.earnings(&delivery(1.0), &order(500, true)), Decimal::from(400));
    }

    #[test]
    fn policy_names() {
        assert_eq!("flat".parse::<EarningsKind>(), Ok(EarningsKind::Flat));
        assert_eq!("FEE_SHARE".parse::<EarningsKind>(), Ok(EarningsKind::FeeShare));
        assert!("tips".parse::<EarningsKind>().is_err());
    }

    #[test]
    fn summary_buckets() {
        // Wednesday 2026-10-14 15:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 15, 0, 0).unwrap();
        let at = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap().timestamp_millis();
        let mk = |when: i64, amount: i64| Delivery {
            delivered_at: Some(when),
            driver_earnings: Some(Decimal::from(amount)),
            ..delivery(1.0)
        };
        let deliveries = vec![
            mk(at(2026, 10, 14), 400),
            mk(at(2026, 10, 12), 300),
            mk(at(2026, 10, 2), 200),
            mk(at(2026, 9, 30), 100),
            Delivery {
                status: DeliveryStatus::Failed,
                ..mk(at(2026, 10, 14), 999)
            },
        ];
        let s = summarize(&deliveries, Decimal::from(50), now);
        assert_eq!(s.today, Decimal::from(400));
        assert_eq!(s.this_week, Decimal::from(700));
        assert_eq!(s.this_month, Decimal::from(900));
        assert_eq!(s.total, Decimal::from(1000));
        assert_eq!(s.delivered_count, 4);
        assert_eq!(s.delivered_today, 1);
        assert_eq!(s.wallet_balance, Decimal::from(50));
    }
}
