use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "picked up")]
    PickedUp,
    #[serde(rename = "completed")]
    Completed,
    /// Any status this client does not know. Never advanced.
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl OrderStatus {
    /// Forward-only lifecycle: in progress → picked up → completed.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::InProgress, OrderStatus::PickedUp)
                | (OrderStatus::InProgress, OrderStatus::Completed)
                | (OrderStatus::PickedUp, OrderStatus::Completed)
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreRef {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub expo_push_token: Option<String>,
    #[serde(default)]
    pub payment_info: Vec<PaymentInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub expo_push_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemOption {
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub variants: Vec<ItemOption>,
    #[serde(default)]
    pub add_ons: Vec<ItemOption>,
    #[serde(default)]
    pub total_price: f64,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(rename = "storeId", default)]
    pub store: StoreRef,
    #[serde(rename = "customerInfo", default)]
    pub customer: CustomerRef,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub items_amount: Option<f64>,
    pub status: OrderStatus,
    #[serde(default)]
    pub delivery_code: Option<String>,
}

impl Order {
    /// Server total when present, otherwise the sum of line totals.
    pub fn total(&self) -> f64 {
        self.items_amount
            .unwrap_or_else(|| self.items.iter().map(|item| item.total_price).sum())
    }

    pub fn payout_bank(&self) -> Option<&str> {
        self.store
            .payment_info
            .first()
            .and_then(|info| info.bank_name.as_deref())
    }
}
