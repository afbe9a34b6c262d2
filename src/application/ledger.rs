use crate::domain::ledger::{Amount, Balance, PaymentId, UserId};
use crate::domain::ports::LedgerStoreBox;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// Balance granted to a user the first time they are seen.
pub const DEFAULT_STARTER_BALANCE: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentCredit {
    Credited(Balance),
    AlreadySettled,
}

/// Per-user chip balances over a durable store.
///
/// Every read-modify-write runs under that user's lock, so concurrent round
/// payouts and payment credits never lose an update. Balances never drop
/// below zero: a debit that would overdraw fails with `InsufficientBalance`.
pub struct BalanceLedger {
    store: LedgerStoreBox,
    starter: Balance,
    user_locks: StdMutex<HashMap<UserId, Arc<Mutex<()>>>>,
    payments: Mutex<()>,
}

impl BalanceLedger {
    pub fn new(store: LedgerStoreBox) -> Self {
        Self::with_starter_balance(store, Balance::new(DEFAULT_STARTER_BALANCE))
    }

    pub fn with_starter_balance(store: LedgerStoreBox, starter: Balance) -> Self {
        Self {
            store,
            starter,
            user_locks: StdMutex::new(HashMap::new()),
            payments: Mutex::new(()),
        }
    }

    pub fn starter_balance(&self) -> Balance {
        self.starter
    }

    async fn lock_user(&self, user: &UserId) -> UserLock<'_> {
        let lock = {
            let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(user.clone()).or_default().clone()
        };
        UserLock {
            ledger: self,
            user: user.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Current balance; users never seen before get the starter balance.
    pub async fn get_balance(&self, user: &UserId) -> Result<Balance> {
        Ok(self.store.load(user).await?.unwrap_or(self.starter))
    }

    pub async fn credit(&self, user: &UserId, amount: Amount) -> Result<Balance> {
        self.adjust(user, amount.signed()).await
    }

    pub async fn debit(&self, user: &UserId, amount: Amount) -> Result<Balance> {
        self.adjust(user, -amount.signed()).await
    }

    /// Applies a signed delta and flushes it before returning.
    pub async fn adjust(&self, user: &UserId, delta: i64) -> Result<Balance> {
        let _lock = self.lock_user(user).await;

        let current = self.get_balance(user).await?;
        let next = current.checked_adjust(delta)?;
        self.store.store(user, next).await?;

        info!(user = %user, delta, balance = next.value(), "Balance adjusted");
        Ok(next)
    }

    /// Credits a platform payment exactly once.
    ///
    /// # Arguments
    ///
    /// * `user` - The user named in the invoice payload.
    /// * `payment` - The platform's charge id, used as the dedup key.
    /// * `amount` - Chips from the catalog entry.
    ///
    /// The settled check, the credit, and marking the payment settled form one
    /// critical section, so concurrent deliveries of the same payment cannot
    /// both pass the check.
    pub async fn credit_payment(
        &self,
        user: &UserId,
        payment: &PaymentId,
        amount: Amount,
    ) -> Result<PaymentCredit> {
        let _payments = self.payments.lock().await;
        if self.store.is_settled(payment).await? {
            return Ok(PaymentCredit::AlreadySettled);
        }

        let _lock = self.lock_user(user).await;

        let current = self.get_balance(user).await?;
        let next = current.checked_adjust(amount.signed())?;
        self.store.store_payment(user, next, payment).await?;

        info!(
            user = %user,
            payment = %payment,
            chips = amount.value(),
            balance = next.value(),
            "Payment credited"
        );
        Ok(PaymentCredit::Credited(next))
    }

    pub async fn all_balances(&self) -> Result<Vec<(UserId, Balance)>> {
        self.store.all_balances().await
    }
}

/// Holds one user's lock. On release the map entry is dropped once no other
/// task holds or waits on it.
struct UserLock<'a> {
    ledger: &'a BalanceLedger,
    user: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self
            .ledger
            .user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.user)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.user);
        }
    }
}
