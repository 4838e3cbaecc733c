//! Order detail actions: pickup, delivery-code completion and the customer
//! and store notifications that follow them.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::push::PushDispatcher;
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::order::{Order, OrderStatus};
use crate::session::Session;
use crate::sync::reconciler::ListReconciler;

pub const DELIVERY_CODE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    ContactCustomer,
    MarkPickedUp,
    CompleteDelivery,
}

/// Buttons the order view offers. Completed orders offer none; an order in
/// a status this client does not know can only be discussed.
pub fn actions(order: &Order) -> Vec<OrderAction> {
    match order.status {
        OrderStatus::InProgress => vec![
            OrderAction::ContactCustomer,
            OrderAction::MarkPickedUp,
            OrderAction::CompleteDelivery,
        ],
        OrderStatus::PickedUp => vec![OrderAction::ContactCustomer, OrderAction::CompleteDelivery],
        OrderStatus::Completed => Vec::new(),
        OrderStatus::Unknown => vec![OrderAction::ContactCustomer],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryCode(String);

impl DeliveryCode {
    /// Only the length is checked here, on the code exactly as typed;
    /// whether it is right is the server's call.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        if raw.chars().count() != DELIVERY_CODE_LEN {
            return Err(ClientError::Validation(
                "Please enter a valid 4-digit delivery code".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub struct OrderFulfillment {
    api: ApiClient,
    session: Arc<Session>,
    reconciler: Arc<ListReconciler>,
    push: PushDispatcher,
}

impl OrderFulfillment {
    pub fn new(
        api: ApiClient,
        session: Arc<Session>,
        reconciler: Arc<ListReconciler>,
        push: PushDispatcher,
    ) -> Self {
        Self {
            api,
            session,
            reconciler,
            push,
        }
    }

    /// `NotFound` means the view shows its "order not found" state.
    pub async fn load(&self, order_id: &str) -> Result<Order, ClientError> {
        let (token, _) = self.session.credentials()?;
        self.api
            .order(&token, order_id)
            .await
            .inspect_err(|err| warn!(order_id, error = %err, "failed to load order"))
    }

    pub async fn mark_picked_up(&self, order: &mut Order) -> Result<(), ClientError> {
        if !order.status.can_advance_to(OrderStatus::PickedUp) {
            return Err(ClientError::Validation(format!(
                "order #{} cannot be picked up",
                order.order_number.as_deref().unwrap_or(&order.id)
            )));
        }

        let (token, identity) = self.session.credentials()?;
        self.api
            .mark_picked_up(&token, &identity.id, &order.id)
            .await
            .map_err(ClientError::into_confirmation)?;

        self.advance(order, OrderStatus::PickedUp);
        info!(order_id = %order.id, "order picked up");

        let code = order.delivery_code.as_deref().unwrap_or_default();
        self.push.dispatch(
            order.customer.expo_push_token.as_deref(),
            "Order picked up",
            &format!("Your runner is on the way. Use the code, {code} to receive your order."),
        );

        let number = order.order_number.as_deref().unwrap_or(&order.id);
        let bank = order.payout_bank().unwrap_or("bank");
        self.push.dispatch(
            order.store.expo_push_token.as_deref(),
            "Payment received",
            &format!(
                "You just received, ₦{} for order #{number} to your {bank} account. Please confirm with your bank.",
                order.total()
            ),
        );

        Ok(())
    }

    /// A short or long code, or an order that cannot complete, is refused
    /// before any request goes out. A wrong code comes back as
    /// `ActionConfirmation` and the order is unchanged.
    pub async fn complete_delivery(&self, order: &mut Order, code: &str) -> Result<(), ClientError> {
        let code = DeliveryCode::parse(code)?;
        if !order.status.can_advance_to(OrderStatus::Completed) {
            return Err(ClientError::Validation(format!(
                "order #{} cannot be completed",
                order.order_number.as_deref().unwrap_or(&order.id)
            )));
        }
        let (token, identity) = self.session.credentials()?;

        self.api
            .mark_delivered(&token, &identity.id, &order.id, code.as_str())
            .await
            .map_err(ClientError::into_confirmation)
            .inspect_err(|err| warn!(order_id = %order.id, error = %err, "delivery not confirmed"))?;

        self.advance(order, OrderStatus::Completed);
        info!(order_id = %order.id, "order delivered");

        self.push.dispatch(
            order.customer.expo_push_token.as_deref(),
            "Order delivered",
            "Your order has been completed successfully",
        );

        Ok(())
    }

    fn advance(&self, order: &mut Order, status: OrderStatus) {
        if order.status.can_advance_to(status) {
            order.status = status;
        }
        self.reconciler.mirror_order_status(&order.id, status);
    }
}
