use crate::api::ApiClient;
use crate::error::ClientError;
use crate::models::transaction::Transaction;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub struct WalletSummary {
    pub balance: f64,
    /// Newest first.
    pub transactions: Vec<Transaction>,
}

pub async fn fetch_wallet(api: &ApiClient, session: &Session) -> Result<WalletSummary, ClientError> {
    let (token, identity) = session.credentials()?;

    let (runner, transactions) = tokio::join!(
        api.runner_detail(&token, &identity.id),
        api.transactions(&token, &identity.id),
    );

    let mut transactions = transactions?;
    transactions.sort_by(|a, b| b.date.cmp(&a.date));

    Ok(WalletSummary {
        balance: runner?.wallet,
        transactions,
    })
}
