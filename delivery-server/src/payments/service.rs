//! Payment Service

use std::sync::Arc;
use std::time::Duration;

use redb::WriteTransaction;
use serde::Deserialize;
use serde_json::Value;
use shared::models::UserRole;
use shared::order::{OrderStatus, PaymentMethod, PaymentStatus};
use shared::payment::{CURRENCY_XAF, GatewayCallback, Payment, PaymentState};
use shared::util::{now_millis, snowflake_id};

use super::gateway::{CollectRequest, GatewayError, PaymentGateway, STATUS_FAILED, STATUS_SUCCESS};
use super::{MismatchPolicy, PaymentError};
use crate::auth::CurrentUser;
use crate::notify::PushMessage;
use crate::orders::service::{apply_transition, close_unclaimed_delivery};
use crate::orders::state_machine::is_cancellable;
use crate::storage::Storage;

const DEFAULT_FAILURE_REASON: &str = "Paiement échoué";
const PHONE_MIN_LEN: usize = 9;
const PHONE_MAX_LEN: usize = 15;

#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePayment {
    pub order_id: i64,
    pub phone: String,
    pub payment_method: PaymentMethod,
}

/// Result of applying a gateway status to a payment
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub payment: Payment,
    /// Notifications to deliver after the commit
    pub messages: Vec<PushMessage>,
    /// Whether anything was written
    pub changed: bool,
}

impl Reconciled {
    fn unchanged(payment: Payment) -> Self {
        Self {
            payment,
            messages: Vec::new(),
            changed: false,
        }
    }
}

#[derive(Clone)]
pub struct PaymentService {
    storage: Storage,
    gateway: Arc<dyn PaymentGateway>,
    callback_url: String,
    gateway_timeout: Duration,
    mismatch_policy: MismatchPolicy,
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("callback_url", &self.callback_url)
            .field("gateway_timeout", &self.gateway_timeout)
            .field("mismatch_policy", &self.mismatch_policy)
            .finish_non_exhaustive()
    }
}

impl PaymentService {
    pub fn new(
        storage: Storage,
        gateway: Arc<dyn PaymentGateway>,
        callback_url: impl Into<String>,
        gateway_timeout: Duration,
        mismatch_policy: MismatchPolicy,
    ) -> Self {
        Self {
            storage,
            gateway,
            callback_url: callback_url.into(),
            gateway_timeout,
            mismatch_policy,
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        match tokio::time::timeout(self.gateway_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.gateway_timeout.as_millis() as u64)),
        }
    }

    // ========== Initiate ==========

    /// Start a mobile-money collection for an order
    ///
    /// A gateway failure is not an error: the payment comes back `failed`
    /// with the reason recorded.
    pub async fn initiate(&self, user_id: i64, req: InitiatePayment) -> Result<Payment, PaymentError> {
        if !req.payment_method.is_mobile_money() {
            return Err(PaymentError::invalid_method(req.payment_method));
        }
        let phone = req.phone.trim().to_string();
        if !(PHONE_MIN_LEN..=PHONE_MAX_LEN).contains(&phone.chars().count()) {
            return Err(PaymentError::Validation(format!(
                "phone must be between {PHONE_MIN_LEN} and {PHONE_MAX_LEN} characters"
            )));
        }

        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let order = self
            .storage
            .get_order_txn(&txn, req.order_id)?
            .filter(|o| o.client_id == user_id)
            .ok_or(PaymentError::OrderNotFound(req.order_id))?;
        if order.is_paid() {
            return Err(PaymentError::AlreadyPaid);
        }
        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            return Err(PaymentError::OrderClosed(order.status));
        }
        let payment = Payment {
            id: snowflake_id(),
            order_id: order.id,
            user_id,
            amount: order.total,
            currency: CURRENCY_XAF.to_string(),
            method: req.payment_method,
            status: PaymentState::Pending,
            phone_number: phone.clone(),
            transaction_reference: None,
            provider_response: None,
            completed_at: None,
            failure_reason: None,
            last_poll_error: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.put_payment_txn(&txn, &payment)?;
        Storage::commit(txn)?;

        let request = CollectRequest {
            payer: phone,
            amount: payment.amount,
            external_id: payment.external_id(),
            callback_url: self.callback_url.clone(),
        };
        let outcome = self.with_timeout(self.gateway.initiate(request)).await;

        let txn = self.storage.begin_write()?;
        let mut stored = self
            .storage
            .get_payment_txn(&txn, payment.id)?
            .ok_or_else(|| PaymentError::NotFound(payment.id.to_string()))?;
        stored.updated_at = now_millis();
        match outcome {
            Ok(response) => {
                tracing::info!(
                    payment_id = stored.id,
                    order_id = stored.order_id,
                    reference = %response.reference,
                    gateway_status = %response.status,
                    "Payment initiated"
                );
                stored.transaction_reference.get_or_insert(response.reference);
                if stored.provider_response.is_none() {
                    stored.provider_response = Some(response.raw);
                }
                // A callback may already have settled it
                if !stored.status.is_terminal() {
                    stored.status = PaymentState::Processing;
                }
            }
            Err(e) => {
                tracing::warn!(
                    payment_id = stored.id,
                    order_id = stored.order_id,
                    error = %e,
                    "Payment initiation failed"
                );
                if !stored.status.is_terminal() {
                    stored.status = PaymentState::Failed;
                    stored.failure_reason = Some(e.to_string());
                }
            }
        }
        self.storage.put_payment_txn(&txn, &stored)?;
        Storage::commit(txn)?;
        Ok(stored)
    }

    // ========== Reconcile ==========

    /// Apply a gateway webhook
    ///
    /// Idempotent: a payment already in a terminal state is returned as-is.
    pub fn reconcile(&self, callback: &GatewayCallback) -> Result<Reconciled, PaymentError> {
        let txn = self.storage.begin_write()?;
        let by_id = match callback.external_id.trim().parse::<i64>() {
            Ok(id) => self.storage.get_payment_txn(&txn, id)?,
            Err(_) => None,
        };
        let payment = match by_id {
            Some(p) => p,
            None => self
                .storage
                .payment_by_reference_txn(&txn, &callback.reference)?
                .ok_or_else(|| PaymentError::NotFound(callback.external_id.clone()))?,
        };

        let expected = payment.transaction_reference.as_deref();
        if let Some(expected) = expected.filter(|r| *r != callback.reference) {
            tracing::warn!(
                payment_id = payment.id,
                expected,
                received = %callback.reference,
                policy = ?self.mismatch_policy,
                "Callback reference mismatch"
            );
            if self.mismatch_policy == MismatchPolicy::Reject {
                return Ok(Reconciled::unchanged(payment));
            }
        }
        if let Some(amount) = callback.amount.filter(|a| *a != payment.amount) {
            tracing::warn!(
                payment_id = payment.id,
                expected = %payment.amount,
                received = %amount,
                "Callback amount mismatch"
            );
        }

        let raw = serde_json::to_value(callback).unwrap_or(Value::Null);
        let reconciled = self.apply_status(
            &txn,
            payment,
            &callback.status,
            callback.message.clone(),
            raw,
            Some(&callback.reference),
        )?;
        if reconciled.changed {
            Storage::commit(txn)?;
        }
        Ok(reconciled)
    }

    /// Move a payment according to a gateway status string
    fn apply_status(
        &self,
        txn: &WriteTransaction,
        mut payment: Payment,
        status: &str,
        reason: Option<String>,
        raw: Value,
        reference: Option<&str>,
    ) -> Result<Reconciled, PaymentError> {
        if payment.status.is_terminal() {
            tracing::debug!(payment_id = payment.id, status = %payment.status, "Payment already settled");
            return Ok(Reconciled::unchanged(payment));
        }

        let now = now_millis();
        let mut messages = Vec::new();
        let mut order = self
            .storage
            .get_order_txn(txn, payment.order_id)?
            .ok_or(PaymentError::OrderNotFound(payment.order_id))?;

        if payment.transaction_reference.is_none() {
            payment.transaction_reference = reference.map(str::to_string);
        }
        payment.updated_at = now;
        payment.last_poll_error = None;

        if status.eq_ignore_ascii_case(STATUS_SUCCESS) {
            payment.status = PaymentState::Completed;
            payment.completed_at = Some(now);
            payment.provider_response = Some(raw);
            order.payment_status = PaymentStatus::Paid;
            order.updated_at = now;
            if order.status == OrderStatus::Pending {
                messages = apply_transition(&mut order, OrderStatus::Confirmed, now)?;
            }
            tracing::info!(payment_id = payment.id, order_id = order.id, "Payment completed");
        } else if status.eq_ignore_ascii_case(STATUS_FAILED) {
            payment.status = PaymentState::Failed;
            payment.failure_reason = Some(reason.unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()));
            payment.provider_response = Some(raw);
            // A later attempt failing must not unpay a settled order
            if matches!(order.payment_status, PaymentStatus::Pending | PaymentStatus::Failed) {
                order.payment_status = PaymentStatus::Failed;
                order.updated_at = now;
            }
            tracing::info!(
                payment_id = payment.id,
                order_id = order.id,
                reason = ?payment.failure_reason,
                "Payment failed"
            );
        } else {
            payment.status = PaymentState::Processing;
        }

        self.storage.put_payment_txn(txn, &payment)?;
        self.storage.put_order_txn(txn, &order)?;
        Ok(Reconciled {
            payment,
            messages,
            changed: true,
        })
    }

    // ========== Poll ==========

    /// Refresh a non-terminal payment from the gateway
    ///
    /// Gateway failures are stored in `last_poll_error`.
    pub async fn poll(&self, user_id: i64, payment_id: i64) -> Result<Reconciled, PaymentError> {
        let payment = self
            .storage
            .get_payment(payment_id)?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;
        if payment.status.is_terminal() {
            return Ok(Reconciled::unchanged(payment));
        }
        let Some(reference) = payment.transaction_reference.clone() else {
            return Ok(Reconciled::unchanged(payment));
        };

        let outcome = self.with_timeout(self.gateway.status(&reference)).await;

        let txn = self.storage.begin_write()?;
        let mut current = self
            .storage
            .get_payment_txn(&txn, payment_id)?
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;
        match outcome {
            Ok(status) => {
                let reconciled =
                    self.apply_status(&txn, current, &status.status, status.reason, status.raw, None)?;
                if reconciled.changed {
                    Storage::commit(txn)?;
                }
                Ok(reconciled)
            }
            Err(e) => {
                tracing::warn!(payment_id, error = %e, "Payment status poll failed");
                if current.status.is_terminal() {
                    return Ok(Reconciled::unchanged(current));
                }
                current.last_poll_error = Some(e.to_string());
                current.updated_at = now_millis();
                self.storage.put_payment_txn(&txn, &current)?;
                Storage::commit(txn)?;
                Ok(Reconciled {
                    payment: current,
                    messages: Vec::new(),
                    changed: true,
                })
            }
        }
    }

    // ========== Refund ==========

    /// Mark a completed payment refunded
    ///
    /// The order moves to `refunded` when its status still allows it;
    /// otherwise only the payment mirror changes.
    pub fn refund(&self, actor: &CurrentUser, payment_id: i64) -> Result<Reconciled, PaymentError> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let mut payment = self
            .storage
            .get_payment_txn(&txn, payment_id)?
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;
        let mut order = self
            .storage
            .get_order_txn(&txn, payment.order_id)?
            .ok_or(PaymentError::OrderNotFound(payment.order_id))?;

        if !actor.is_admin() {
            let owns = actor.role == UserRole::Restaurant
                && self
                    .storage
                    .get_restaurant_txn(&txn, order.restaurant_id)?
                    .is_some_and(|r| r.owner_id == actor.id);
            if !owns {
                return Err(PaymentError::Forbidden(
                    "Only the restaurant owner or an admin can refund".into(),
                ));
            }
        }
        if payment.status != PaymentState::Completed {
            return Err(PaymentError::NotRefundable(payment.status));
        }

        payment.status = PaymentState::Refunded;
        payment.updated_at = now;
        order.payment_status = PaymentStatus::Refunded;
        order.updated_at = now;
        let messages = if is_cancellable(order.status) {
            let messages = apply_transition(&mut order, OrderStatus::Refunded, now)?;
            close_unclaimed_delivery(&self.storage, &txn, &order, now)?;
            messages
        } else {
            tracing::info!(
                order_id = order.id,
                status = %order.status,
                "Refund recorded, order status kept"
            );
            Vec::new()
        };
        self.storage.put_payment_txn(&txn, &payment)?;
        self.storage.put_order_txn(&txn, &order)?;
        Storage::commit(txn)?;

        tracing::info!(payment_id, order_id = order.id, actor = actor.id, "Payment refunded");
        Ok(Reconciled {
            payment,
            messages,
            changed: true,
        })
    }
}
