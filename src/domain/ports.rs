use super::ledger::{Balance, PaymentId, UserId};
use super::payment::InvoiceDraft;
use crate::error::Result;
use async_trait::async_trait;

/// Durable storage for chip balances and settled payment identifiers.
///
/// Every write must be durable before the call returns.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self, user: &UserId) -> Result<Option<Balance>>;
    async fn store(&self, user: &UserId, balance: Balance) -> Result<()>;
    async fn is_settled(&self, payment: &PaymentId) -> Result<bool>;
    /// Writes the credited balance and marks `payment` settled in one atomic
    /// step.
    async fn store_payment(&self, user: &UserId, balance: Balance, payment: &PaymentId)
    -> Result<()>;
    async fn all_balances(&self) -> Result<Vec<(UserId, Balance)>>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreCheckoutAnswer {
    Approve,
    Decline(String),
}

/// The external micropayment platform.
#[async_trait]
pub trait PaymentPlatform: Send + Sync {
    async fn create_invoice_link(&self, draft: &InvoiceDraft) -> Result<String>;
    async fn answer_pre_checkout_query(&self, query_id: &str, answer: PreCheckoutAnswer)
    -> Result<()>;
}

pub type PaymentPlatformBox = Box<dyn PaymentPlatform>;
