use crate::domain::ledger::{Balance, PaymentId, UserId};
use crate::domain::ports::LedgerStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    balances: HashMap<UserId, Balance>,
    settled: HashSet<PaymentId>,
}

/// A thread-safe in-memory ledger store.
///
/// Nothing survives the process. Used for tests and `--ephemeral` runs.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load(&self, user: &UserId) -> Result<Option<Balance>> {
        let state = self.state.read().await;
        Ok(state.balances.get(user).copied())
    }

    async fn store(&self, user: &UserId, balance: Balance) -> Result<()> {
        let mut state = self.state.write().await;
        state.balances.insert(user.clone(), balance);
        Ok(())
    }

    async fn is_settled(&self, payment: &PaymentId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.settled.contains(payment))
    }

    async fn store_payment(
        &self,
        user: &UserId,
        balance: Balance,
        payment: &PaymentId,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.balances.insert(user.clone(), balance);
        state.settled.insert(payment.clone());
        Ok(())
    }

    async fn all_balances(&self) -> Result<Vec<(UserId, Balance)>> {
        let state = self.state.read().await;
        let mut all: Vec<_> = state
            .balances
            .iter()
            .map(|(user, balance)| (user.clone(), *balance))
            .collect();
        all.sort();
        Ok(all)
    }
}
