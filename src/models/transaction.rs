use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Withdrawal,
    Bonus,
    #[serde(other)]
    Credit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// Withdrawals debit the wallet; everything else credits it.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Withdrawal => -self.amount.abs(),
            _ => self.amount.abs(),
        }
    }
}
