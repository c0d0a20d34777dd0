//! Notification templates (French, the apps' language)

use serde_json::json;
use shared::delivery::DeliveryStatus;
use shared::order::{Order, OrderStatus};

use super::PushMessage;

/// Client message for an order reaching `status`
///
/// `None` for destinations without a template (`pending`, `picked_up`,
/// `refunded`).
pub fn order_status(order: &Order, status: OrderStatus) -> Option<PushMessage> {
    let n = &order.order_number;
    let (title, body) = match status {
        OrderStatus::Confirmed => (
            "Commande confirmée",
            format!("Votre commande #{n} a été confirmée et est en cours de préparation."),
        ),
        OrderStatus::Preparing => (
            "En préparation",
            format!("Votre commande #{n} est en cours de préparation."),
        ),
        OrderStatus::Ready => (
            "Commande prête",
            format!("Votre commande #{n} est prête et sera bientôt livrée."),
        ),
        OrderStatus::OnTheWay => ("En route", format!("Votre commande #{n} est en route vers vous!")),
        OrderStatus::Delivered => (
            "Livraison effectuée",
            format!("Votre commande #{n} a été livrée. Bon appétit!"),
        ),
        OrderStatus::Cancelled => ("Commande annulée", format!("Votre commande #{n} a été annulée.")),
        OrderStatus::Pending | OrderStatus::PickedUp | OrderStatus::Refunded => return None,
    };
    Some(PushMessage::new(
        order.client_id,
        title,
        body,
        json!({ "order_id": order.id, "status": status.as_str() }),
    ))
}

/// Client message once a driver accepted the delivery
pub fn driver_assigned(order: &Order) -> PushMessage {
    PushMessage::new(
        order.client_id,
        "Livreur assigné",
        format!(
            "Un livreur a été assigné à votre commande #{}.",
            order.order_number
        ),
        json!({ "order_id": order.id, "status": "assigned" }),
    )
}

/// Driver-side message for a delivery checkpoint
pub fn driver_checkpoint(
    driver_id: i64,
    delivery_id: i64,
    order_id: i64,
    status: DeliveryStatus,
) -> Option<PushMessage> {
    let (title, body) = match status {
        DeliveryStatus::Assigned => (
            "Nouvelle commande assignée",
            "Une nouvelle commande vous a été assignée. Rendez-vous au restaurant pour la récupérer.",
        ),
        DeliveryStatus::PickedUp => (
            "En route vers le client",
            "Vous avez récupéré la commande. Direction l'adresse de livraison!",
        ),
        DeliveryStatus::Delivered => (
            "Livraison terminée",
            "Félicitations! La livraison a été confirmée avec succès.",
        ),
        DeliveryStatus::Failed => ("Livraison échouée", "La livraison n'a pas pu être effectuée."),
        _ => return None,
    };
    Some(PushMessage::new(
        driver_id,
        title,
        body,
        json!({
            "delivery_id": delivery_id,
            "order_id": order_id,
            "status": status.as_str(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::order::{PaymentMethod, PaymentStatus};

    fn order() -> Order {
        Order {
            id: 42,
            order_number: "RD-ABC".into(),
            client_id: 7,
            restaurant_id: 1,
            address_id: 2,
            coupon_id: None,
            coupon_code: None,
            status: OrderStatus::Pending,
            items: vec![],
            subtotal: Decimal::ZERO,
            delivery_fee: Decimal::ZERO,
            delivery_fee_waived: false,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Pending,
            special_instructions: None,
            cancellation_reason: None,
            estimated_delivery: 0,
            delivered_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn confirmed_template() {
        let msg = order_status(&order(), OrderStatus::Confirmed).unwrap();
        assert_eq!(msg.user_id, 7);
        assert_eq!(msg.title, "Commande confirmée");
        assert_eq!(
            msg.body,
            "Votre commande #RD-ABC a été confirmée et est en cours de préparation."
        );
        assert_eq!(msg.data["status"], "confirmed");
        assert_eq!(msg.data["order_id"], 42);
    }

    #[test]
    fn destinations_without_template() {
        assert!(order_status(&order(), OrderStatus::PickedUp).is_none());
        assert!(order_status(&order(), OrderStatus::Refunded).is_none());
        assert!(driver_checkpoint(5, 1, 42, DeliveryStatus::OnTheWay).is_none());
    }

    #[test]
    fn driver_templates_target_driver() {
        let msg = driver_checkpoint(5, 1, 42, DeliveryStatus::Failed).unwrap();
        assert_eq!(msg.user_id, 5);
        assert_eq!(msg.title, "Livraison échouée");
        assert_eq!(driver_assigned(&order()).title, "Livreur assigné");
    }
}
