//! Order Service
//!
//! Placement (pricing, coupon redemption and delivery creation in one write
//! transaction), actor-driven transitions, ratings and the client tracking
//! view.

use redb::WriteTransaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::delivery::{Delivery, DeliveryStatus, Position};
use shared::models::{Coupon, CouponKind, GeoPoint, UserRole};
use shared::order::{Order, OrderStatus, PaymentMethod, PaymentStatus, Rating, RatingKind};
use shared::util::{now_millis, order_number, snowflake_id};

use super::OrderError;
use super::state_machine::{self, Transition};
use crate::auth::CurrentUser;
use crate::notify::{PushMessage, templates};
use crate::pricing::{self, CartLine, TxnMenu};
use crate::storage::{Storage, StorageError};
use crate::tracking::LocationTracker;

pub const DEFAULT_CLIENT_CANCEL_REASON: &str = "Annulé par le client";

/// Failure reason on a delivery whose order closed before pickup
pub const ORDER_CLOSED_DELIVERY_REASON: &str = "Commande annulée";

/// Average driver speed used for delivery time estimates
const AVERAGE_SPEED_KMH: f64 = 25.0;

/// Placement request
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub restaurant_id: i64,
    pub address_id: i64,
    pub items: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub delivery: Delivery,
}

/// Post-delivery rating request
#[derive(Debug, Clone, Deserialize)]
pub struct RateOrder {
    pub restaurant_rating: u8,
    #[serde(default)]
    pub restaurant_comment: Option<String>,
    #[serde(default)]
    pub driver_rating: Option<u8>,
    #[serde(default)]
    pub driver_comment: Option<String>,
}

/// Result of a coupon pre-validation
#[derive(Debug, Clone, Serialize)]
pub struct CouponQuote {
    pub valid: bool,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    pub discount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverSummary {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub rating: f64,
}

/// Client-side tracking view of an order
#[derive(Debug, Clone, Serialize)]
pub struct OrderTracking {
    pub order_id: i64,
    pub order_status: OrderStatus,
    pub delivery_status: Option<DeliveryStatus>,
    pub driver: Option<DriverSummary>,
    pub driver_location: Option<Position>,
    pub estimated_delivery: i64,
    pub restaurant_location: Option<GeoPoint>,
    pub delivery_location: Option<GeoPoint>,
}

/// Apply a regular transition to `order`
///
/// Returns the client notification to send once the transaction commits.
pub(crate) fn apply_transition(
    order: &mut Order,
    to: OrderStatus,
    now: i64,
) -> Result<Vec<PushMessage>, OrderError> {
    match state_machine::validate(order.status, to)? {
        Transition::Unchanged => Ok(Vec::new()),
        Transition::Changed => Ok(set_status(order, to, now)),
    }
}

/// Apply a checkpoint-driven advance to `order`
pub(crate) fn apply_forced(
    order: &mut Order,
    to: OrderStatus,
    now: i64,
) -> Result<Vec<PushMessage>, OrderError> {
    match state_machine::validate_forced(order.status, to)? {
        Transition::Unchanged => Ok(Vec::new()),
        Transition::Changed => Ok(set_status(order, to, now)),
    }
}

/// Fail the delivery of a closed order if no driver has claimed it yet
///
/// Assigned deliveries are left to their driver, who can only move them to
/// `failed` from here on.
pub(crate) fn close_unclaimed_delivery(
    storage: &Storage,
    txn: &WriteTransaction,
    order: &Order,
    now: i64,
) -> Result<(), StorageError> {
    let Some(mut delivery) = storage
        .delivery_for_order_txn(txn, order.id)?
        .filter(|d| d.status == DeliveryStatus::Searching)
    else {
        return Ok(());
    };
    delivery.status = DeliveryStatus::Failed;
    delivery.failure_reason = Some(ORDER_CLOSED_DELIVERY_REASON.to_string());
    delivery.updated_at = now;
    storage.put_delivery_txn(txn, &delivery)?;
    tracing::info!(
        order_id = order.id,
        delivery_id = delivery.id,
        "Unclaimed delivery withdrawn"
    );
    Ok(())
}

fn set_status(order: &mut Order, to: OrderStatus, now: i64) -> Vec<PushMessage> {
    tracing::info!(
        order_id = order.id,
        from = %order.status,
        to = %to,
        "Order status changed"
    );
    order.status = to;
    order.updated_at = now;
    if to == OrderStatus::Delivered && order.delivered_at.is_none() {
        order.delivered_at = Some(now);
    }
    templates::order_status(order, to).into_iter().collect()
}

pub(crate) fn estimated_minutes(distance_km: f64) -> u32 {
    (distance_km * 60.0 / AVERAGE_SPEED_KMH).ceil().max(0.0) as u32
}

fn new_average(average: f64, count: u32, rating: u8) -> f64 {
    let total = average * f64::from(count) + f64::from(rating);
    let avg = total / f64::from(count + 1);
    (avg * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct OrderService {
    storage: Storage,
}

impl OrderService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    // ========== Placement ==========

    /// Price and persist an order together with its searching delivery
    ///
    /// An unknown or ineligible coupon code is not applied; the order is
    /// still placed at full price.
    pub fn place(&self, client_id: i64, req: PlaceOrder) -> Result<PlacedOrder, OrderError> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let address = self
            .storage
            .get_address_txn(&txn, req.address_id)?
            .filter(|a| a.user_id == client_id)
            .ok_or(OrderError::AddressNotFound(req.address_id))?;
        let restaurant = self
            .storage
            .get_restaurant_txn(&txn, req.restaurant_id)?
            .ok_or(OrderError::RestaurantNotFound(req.restaurant_id))?;

        let menu = TxnMenu {
            storage: &self.storage,
            txn: &txn,
        };
        let base = pricing::price(&req.items, &menu, &restaurant, None, now)?;

        let coupon = match req.coupon_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                self.eligible_coupon(&txn, code, client_id, base.subtotal, now)?
            }
            _ => None,
        };
        let priced = match &coupon {
            Some(c) => pricing::price(&req.items, &menu, &restaurant, Some(c), now)?,
            None => base,
        };
        let coupon = coupon.filter(|_| priced.coupon_applied);

        let order = Order {
            id: snowflake_id(),
            order_number: order_number(),
            client_id,
            restaurant_id: restaurant.id,
            address_id: address.id,
            coupon_id: coupon.as_ref().map(|c| c.id),
            coupon_code: coupon.as_ref().map(|c| Coupon::normalize_code(&c.code)),
            status: OrderStatus::Pending,
            items: priced.lines,
            subtotal: priced.subtotal,
            delivery_fee: priced.delivery_fee,
            delivery_fee_waived: priced.delivery_fee_waived,
            discount: priced.discount,
            total: priced.total,
            payment_method: req.payment_method,
            payment_status: PaymentStatus::Pending,
            special_instructions: req.special_instructions,
            cancellation_reason: None,
            estimated_delivery: now + i64::from(restaurant.delivery_time_max) * 60_000,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_order_txn(&txn, &order)?;

        if let Some(c) = &coupon {
            self.storage.redeem_coupon_txn(&txn, &c.code, client_id)?;
        }

        let distance_km = restaurant.location.distance_km(&address.location);
        let delivery = Delivery {
            id: snowflake_id(),
            order_id: order.id,
            driver_id: None,
            status: DeliveryStatus::Searching,
            pickup: restaurant.location,
            dropoff: address.location,
            delivery_address: match &address.address_details {
                Some(details) => format!("{}, {}", address.address, details),
                None => address.address.clone(),
            },
            distance_km: (distance_km * 100.0).round() / 100.0,
            estimated_minutes: estimated_minutes(distance_km),
            proof_photo: None,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            failure_reason: None,
            driver_earnings: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_delivery_txn(&txn, &delivery)?;

        Storage::commit(txn)?;

        tracing::info!(
            order_id = order.id,
            order_number = %order.order_number,
            client_id,
            restaurant_id = order.restaurant_id,
            total = %order.total,
            coupon = ?order.coupon_code,
            "Order placed"
        );
        Ok(PlacedOrder { order, delivery })
    }

    fn eligible_coupon(
        &self,
        txn: &WriteTransaction,
        code: &str,
        client_id: i64,
        subtotal: Decimal,
        now: i64,
    ) -> Result<Option<Coupon>, OrderError> {
        let Some(coupon) = self.storage.get_coupon_txn(txn, code)? else {
            tracing::info!(code, "Unknown coupon ignored");
            return Ok(None);
        };
        let used = self.storage.coupon_redemptions_txn(txn, code, client_id)?;
        match pricing::check(&coupon, subtotal, used, now) {
            Ok(()) => Ok(Some(coupon)),
            Err(reason) => {
                tracing::info!(code, %reason, "Coupon not applied");
                Ok(None)
            }
        }
    }

    /// Eligibility and discount of a coupon for a prospective cart
    pub fn quote_coupon(
        &self,
        client_id: i64,
        code: &str,
        restaurant_id: i64,
        subtotal: Decimal,
    ) -> Result<CouponQuote, OrderError> {
        if subtotal < Decimal::ZERO {
            return Err(OrderError::Validation("subtotal must not be negative".into()));
        }
        let now = now_millis();
        let restaurant = self
            .storage
            .get_restaurant(restaurant_id)?
            .ok_or(OrderError::RestaurantNotFound(restaurant_id))?;
        let coupon = self
            .storage
            .get_coupon(code)?
            .ok_or_else(|| OrderError::CouponNotFound(Coupon::normalize_code(code)))?;
        let used = self.storage.coupon_redemptions(code, client_id)?;
        pricing::check(&coupon, subtotal, used, now)?;

        Ok(CouponQuote {
            valid: true,
            code: Coupon::normalize_code(&coupon.code),
            kind: coupon.kind,
            discount: pricing::evaluate(&coupon, subtotal, restaurant.delivery_fee, now),
        })
    }

    // ========== Reads ==========

    /// Order owned by `client_id`; foreign orders read as not found
    pub fn get_for_client(&self, client_id: i64, order_id: i64) -> Result<Order, OrderError> {
        self.storage
            .get_order(order_id)?
            .filter(|o| o.client_id == client_id)
            .ok_or(OrderError::NotFound(order_id))
    }

    pub fn list_for_client(&self, client_id: i64) -> Result<Vec<Order>, OrderError> {
        Ok(self.storage.list_client_orders(client_id)?)
    }

    /// Orders of a restaurant, optionally filtered by status
    pub fn list_for_restaurant(
        &self,
        actor: &CurrentUser,
        restaurant_id: i64,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        self.ensure_restaurant_actor(actor, restaurant_id)?;
        let mut orders = self.storage.list_restaurant_orders(restaurant_id)?;
        if let Some(status) = status {
            orders.retain(|o| o.status == status);
        }
        Ok(orders)
    }

    fn ensure_restaurant_actor(
        &self,
        actor: &CurrentUser,
        restaurant_id: i64,
    ) -> Result<(), OrderError> {
        let restaurant = self
            .storage
            .get_restaurant(restaurant_id)?
            .ok_or(OrderError::RestaurantNotFound(restaurant_id))?;
        if actor.is_admin() || (actor.role == UserRole::Restaurant && restaurant.owner_id == actor.id)
        {
            Ok(())
        } else {
            Err(OrderError::Forbidden(format!(
                "Not allowed to manage restaurant {restaurant_id}"
            )))
        }
    }

    // ========== Transitions ==========

    /// Restaurant-side status change (`confirmed`, `preparing`, `ready`,
    /// `cancelled`)
    pub fn update_by_restaurant(
        &self,
        actor: &CurrentUser,
        restaurant_id: i64,
        order_id: i64,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<(Order, Vec<PushMessage>), OrderError> {
        self.ensure_restaurant_actor(actor, restaurant_id)?;
        if !matches!(
            target,
            OrderStatus::Confirmed
                | OrderStatus::Preparing
                | OrderStatus::Ready
                | OrderStatus::Cancelled
        ) {
            return Err(OrderError::Forbidden(format!(
                "Restaurants cannot set status {target}"
            )));
        }

        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .filter(|o| o.restaurant_id == restaurant_id)
            .ok_or(OrderError::NotFound(order_id))?;

        let before = order.status;
        let messages = apply_transition(&mut order, target, now)?;
        if order.status != before {
            if target == OrderStatus::Cancelled {
                order.cancellation_reason = reason;
                close_unclaimed_delivery(&self.storage, &txn, &order, now)?;
            }
            self.storage.put_order_txn(&txn, &order)?;
            Storage::commit(txn)?;
        }
        Ok((order, messages))
    }

    /// Client cancellation, allowed while `pending` or `confirmed`
    pub fn cancel_by_client(
        &self,
        client_id: i64,
        order_id: i64,
        reason: Option<String>,
    ) -> Result<(Order, Vec<PushMessage>), OrderError> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .filter(|o| o.client_id == client_id)
            .ok_or(OrderError::NotFound(order_id))?;

        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(OrderError::NotCancellable(order.status));
        }

        let messages = apply_transition(&mut order, OrderStatus::Cancelled, now)?;
        order.cancellation_reason = Some(
            reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CLIENT_CANCEL_REASON.to_string()),
        );
        close_unclaimed_delivery(&self.storage, &txn, &order, now)?;
        self.storage.put_order_txn(&txn, &order)?;
        Storage::commit(txn)?;

        tracing::info!(order_id, client_id, "Order cancelled by client");
        Ok((order, messages))
    }

    // ========== Ratings ==========

    pub fn rate(&self, client_id: i64, order_id: i64, req: RateOrder) -> Result<(), OrderError> {
        let check = |r: u8| {
            if (1..=5).contains(&r) {
                Ok(())
            } else {
                Err(OrderError::Validation("rating must be between 1 and 5".into()))
            }
        };
        check(req.restaurant_rating)?;
        if let Some(r) = req.driver_rating {
            check(r)?;
        }

        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .filter(|o| o.client_id == client_id)
            .ok_or(OrderError::NotFound(order_id))?;
        if order.status != OrderStatus::Delivered {
            return Err(OrderError::NotDelivered(order.status));
        }
        if self
            .storage
            .rating_exists_txn(&txn, order_id, client_id, RatingKind::Restaurant)?
        {
            return Err(OrderError::AlreadyRated);
        }

        self.storage.insert_rating_txn(
            &txn,
            &Rating {
                id: snowflake_id(),
                order_id,
                user_id: client_id,
                kind: RatingKind::Restaurant,
                target_id: order.restaurant_id,
                rating: req.restaurant_rating,
                comment: req.restaurant_comment,
                created_at: now,
            },
        )?;
        if let Some(mut restaurant) = self.storage.get_restaurant_txn(&txn, order.restaurant_id)? {
            restaurant.rating =
                new_average(restaurant.rating, restaurant.rating_count, req.restaurant_rating);
            restaurant.rating_count += 1;
            self.storage.put_restaurant_txn(&txn, &restaurant)?;
        }

        let driver_id = self
            .storage
            .delivery_for_order_txn(&txn, order_id)?
            .and_then(|d| d.driver_id);
        if let (Some(rating), Some(driver_id)) = (req.driver_rating, driver_id) {
            self.storage.insert_rating_txn(
                &txn,
                &Rating {
                    id: snowflake_id(),
                    order_id,
                    user_id: client_id,
                    kind: RatingKind::Driver,
                    target_id: driver_id,
                    rating,
                    comment: req.driver_comment,
                    created_at: now,
                },
            )?;
            if let Some(mut driver) = self.storage.get_user_txn(&txn, driver_id)? {
                driver.rating = new_average(driver.rating, driver.rating_count, rating);
                driver.rating_count += 1;
                driver.updated_at = now;
                self.storage.put_user_txn(&txn, &driver)?;
            }
        }

        Storage::commit(txn)?;
        Ok(())
    }

    // ========== Tracking ==========

    pub fn track(
        &self,
        client_id: i64,
        order_id: i64,
        tracker: &LocationTracker,
    ) -> Result<OrderTracking, OrderError> {
        let order = self.get_for_client(client_id, order_id)?;
        let delivery = self.storage.delivery_for_order(order_id)?;
        let restaurant = self.storage.get_restaurant(order.restaurant_id)?;

        let driver = match delivery.as_ref().and_then(|d| d.driver_id) {
            Some(id) => self.storage.get_user(id)?.map(|u| DriverSummary {
                id: u.id,
                name: u.name,
                phone: u.phone,
                rating: u.rating,
            }),
            None => None,
        };
        let driver_location = match &delivery {
            Some(d) if d.driver_id.is_some() => tracker.latest(d.id).ok().flatten(),
            _ => None,
        };

        Ok(OrderTracking {
            order_id,
            order_status: order.status,
            delivery_status: delivery.as_ref().map(|d| d.status),
            driver,
            driver_location,
            estimated_delivery: order.estimated_delivery,
            restaurant_location: restaurant.map(|r| r.location),
            delivery_location: delivery.map(|d| d.dropoff),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{Address, MenuItem, Restaurant};

    const CLIENT: i64 = 7;
    const OWNER: i64 = 99;

    fn setup() -> (Storage, OrderService) {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .put_restaurant(&Restaurant {
                id: 1,
                name: "Chez Mama".into(),
                owner_id: OWNER,
                location: GeoPoint::new(4.0511, 9.7679),
                delivery_fee: Decimal::from(500),
                minimum_order: Decimal::from(1000),
                delivery_time_min: 20,
                delivery_time_max: 40,
                is_open: true,
                rating: 0.0,
                rating_count: 0,
            })
            .unwrap();
        storage
            .put_menu_item(&MenuItem {
                id: 10,
                restaurant_id: 1,
                name: "Ndolé".into(),
                price: Decimal::from(2500),
                discount_price: None,
                is_available: true,
            })
            .unwrap();
        storage
            .put_address(&Address {
                id: 20,
                user_id: CLIENT,
                label: "Maison".into(),
                address: "Rue de la Joie".into(),
                address_details: Some("Porte bleue".into()),
                location: GeoPoint::new(4.0611, 9.7779),
            })
            .unwrap();
        storage
            .put_coupon(&Coupon {
                id: 30,
                code: "BIENVENUE".into(),
                kind: CouponKind::Percentage,
                value: Decimal::from(10),
                minimum_order: Decimal::from(2000),
                maximum_discount: Some(Decimal::from(2000)),
                usage_limit: None,
                usage_count: 0,
                per_user_limit: Some(1),
                starts_at: None,
                expires_at: None,
                is_active: true,
            })
            .unwrap();
        let service = OrderService::new(storage.clone());
        (storage, service)
    }

    fn request(quantity: u32, coupon: Option<&str>) -> PlaceOrder {
        PlaceOrder {
            restaurant_id: 1,
            address_id: 20,
            items: vec![CartLine {
                menu_item_id: 10,
                quantity,
                special_instructions: None,
            }],
            payment_method: PaymentMethod::Cash,
            coupon_code: coupon.map(str::to_string),
            special_instructions: None,
        }
    }

    fn owner() -> CurrentUser {
        CurrentUser {
            id: OWNER,
            role: UserRole::Restaurant,
        }
    }

    #[test]
    fn place_creates_order_and_searching_delivery() {
        let (storage, service) = setup();
        let placed = service.place(CLIENT, request(2, Some("bienvenue"))).unwrap();

        assert_eq!(placed.order.subtotal, Decimal::from(5000));
        assert_eq!(placed.order.discount, Decimal::from(500));
        assert_eq!(placed.order.total, Decimal::from(5000));
        assert_eq!(placed.order.coupon_code.as_deref(), Some("BIENVENUE"));
        assert!(placed.order.order_number.starts_with("RD-"));
        assert_eq!(placed.delivery.status, DeliveryStatus::Searching);
        assert_eq!(placed.delivery.delivery_address, "Rue de la Joie, Porte bleue");
        assert!(placed.delivery.distance_km > 0.0);

        assert_eq!(storage.get_coupon("BIENVENUE").unwrap().unwrap().usage_count, 1);
        assert_eq!(
            storage.delivery_for_order(placed.order.id).unwrap().unwrap().id,
            placed.delivery.id
        );
    }

    #[test]
    fn coupon_per_user_limit_falls_back_to_full_price() {
        let (storage, service) = setup();
        service.place(CLIENT, request(2, Some("BIENVENUE"))).unwrap();
        let second = service.place(CLIENT, request(2, Some("BIENVENUE"))).unwrap();
        assert_eq!(second.order.discount, Decimal::ZERO);
        assert!(second.order.coupon_id.is_none());
        assert_eq!(storage.get_coupon("BIENVENUE").unwrap().unwrap().usage_count, 1);
    }

    #[test]
    fn coupon_below_minimum_is_rejected_by_quote() {
        let (_, service) = setup();
        let placed = service.place(CLIENT, request(1, Some("BIENVENUE"))).unwrap();
        assert_eq!(placed.order.subtotal, Decimal::from(2500));
        assert_eq!(placed.order.discount, Decimal::from(250));

        let err = service.quote_coupon(CLIENT, "BIENVENUE", 1, Decimal::from(1500));
        assert!(matches!(err, Err(OrderError::Coupon(_))));
    }

    #[test]
    fn foreign_address_is_not_found() {
        let (_, service) = setup();
        let err = service.place(8, request(1, None)).unwrap_err();
        assert!(matches!(err, OrderError::AddressNotFound(20)));
    }

    #[test]
    fn restaurant_walks_the_sequence() {
        let (_, service) = setup();
        let order = service.place(CLIENT, request(1, None)).unwrap().order;

        let (o, msgs) = service
            .update_by_restaurant(&owner(), 1, order.id, OrderStatus::Confirmed, None)
            .unwrap();
        assert_eq!(o.status, OrderStatus::Confirmed);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].title, "Commande confirmée");

        let (_, msgs) = service
            .update_by_restaurant(&owner(), 1, order.id, OrderStatus::Confirmed, None)
            .unwrap();
        assert!(msgs.is_empty());

        let err = service
            .update_by_restaurant(&owner(), 1, order.id, OrderStatus::Ready, None)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));

        let err = service
            .update_by_restaurant(&owner(), 1, order.id, OrderStatus::OnTheWay, None)
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));
    }

    #[test]
    fn other_owner_is_forbidden() {
        let (_, service) = setup();
        let order = service.place(CLIENT, request(1, None)).unwrap().order;
        let stranger = CurrentUser {
            id: 1234,
            role: UserRole::Restaurant,
        };
        let err = service
            .update_by_restaurant(&stranger, 1, order.id, OrderStatus::Confirmed, None)
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));
    }

    #[test]
    fn client_cancel_only_early() {
        let (_, service) = setup();
        let order = service.place(CLIENT, request(1, None)).unwrap().order;
        let (o, msgs) = service.cancel_by_client(CLIENT, order.id, None).unwrap();
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert_eq!(o.cancellation_reason.as_deref(), Some(DEFAULT_CLIENT_CANCEL_REASON));
        assert_eq!(msgs[0].title, "Commande annulée");

        let order = service.place(CLIENT, request(1, None)).unwrap().order;
        for s in [OrderStatus::Confirmed, OrderStatus::Preparing] {
            service.update_by_restaurant(&owner(), 1, order.id, s, None).unwrap();
        }
        let err = service.cancel_by_client(CLIENT, order.id, None).unwrap_err();
        assert!(matches!(err, OrderError::NotCancellable(OrderStatus::Preparing)));
    }

    #[test]
    fn cancelling_withdraws_unclaimed_delivery() {
        let (storage, service) = setup();
        let by_client = service.place(CLIENT, request(1, None)).unwrap().order;
        let by_owner = service.place(CLIENT, request(1, None)).unwrap().order;
        assert_eq!(storage.searching_deliveries().unwrap().len(), 2);

        service.cancel_by_client(CLIENT, by_client.id, None).unwrap();
        service
            .update_by_restaurant(&owner(), 1, by_owner.id, OrderStatus::Cancelled, Some("rupture".into()))
            .unwrap();

        assert!(storage.searching_deliveries().unwrap().is_empty());
        for id in [by_client.id, by_owner.id] {
            let delivery = storage.delivery_for_order(id).unwrap().unwrap();
            assert_eq!(delivery.status, DeliveryStatus::Failed);
            assert_eq!(delivery.failure_reason.as_deref(), Some(ORDER_CLOSED_DELIVERY_REASON));
            assert!(delivery.driver_id.is_none());
        }
    }

    #[test]
    fn rating_requires_delivery_and_is_unique() {
        let (storage, service) = setup();
        let order = service.place(CLIENT, request(1, None)).unwrap().order;
        let rate = || RateOrder {
            restaurant_rating: 4,
            restaurant_comment: None,
            driver_rating: None,
            driver_comment: None,
        };
        assert!(matches!(
            service.rate(CLIENT, order.id, rate()),
            Err(OrderError::NotDelivered(_))
        ));

        let txn = storage.begin_write().unwrap();
        let mut o = storage.get_order_txn(&txn, order.id).unwrap().unwrap();
        apply_forced(&mut o, OrderStatus::Delivered, 1).unwrap();
        storage.put_order_txn(&txn, &o).unwrap();
        Storage::commit(txn).unwrap();

        service.rate(CLIENT, order.id, rate()).unwrap();
        assert!(matches!(
            service.rate(CLIENT, order.id, rate()),
            Err(OrderError::AlreadyRated)
        ));
        let r = storage.get_restaurant(1).unwrap().unwrap();
        assert_eq!(r.rating_count, 1);
        assert_eq!(r.rating, 4.0);
    }

    #[test]
    fn forced_delivery_sets_timestamp() {
        let (_, service) = setup();
        let mut order = service.place(CLIENT, request(1, None)).unwrap().order;
        let msgs = apply_forced(&mut order, OrderStatus::Delivered, 123).unwrap();
        assert_eq!(order.delivered_at, Some(123));
        assert_eq!(msgs[0].title, "Livraison effectuée");
    }

    #[test]
    fn estimate_uses_average_speed() {
        assert_eq!(estimated_minutes(0.0), 0);
        assert_eq!(estimated_minutes(1.0), 3);
        assert_eq!(estimated_minutes(12.5), 30);
    }

    #[test]
    fn running_average() {
        assert_eq!(new_average(0.0, 0, 5), 5.0);
        assert_eq!(new_average(5.0, 1, 4), 4.5);
        assert_eq!(new_average(4.5, 2, 1), 3.33);
    }
}
