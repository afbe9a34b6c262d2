use crate::domain::ledger::{Balance, PaymentId, UserId};
use crate::domain::ports::LedgerStore;
use crate::error::{BlackjackError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch, WriteOptions};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing chip balances.
pub const CF_BALANCES: &str = "balances";
/// Column Family for storing settled payment identifiers.
pub const CF_SETTLED_PAYMENTS: &str = "settled_payments";

/// A persistent ledger store using RocksDB.
///
/// Balances and settled payments live in separate Column Families. A payment
/// credit writes both in one `WriteBatch`, and every write is synced.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
}

impl RocksDbLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures the `balances` and `settled_payments` column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_balances = ColumnFamilyDescriptor::new(CF_BALANCES, Options::default());
        let cf_settled = ColumnFamilyDescriptor::new(CF_SETTLED_PAYMENTS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_balances, cf_settled])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| BlackjackError::Persistence(format!("{name} column family not found")))
    }

    fn synced() -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        opts
    }

    fn encode(balance: Balance) -> Result<Vec<u8>> {
        serde_json::to_vec(&balance)
            .map_err(|e| BlackjackError::Persistence(format!("Serialization error: {e}")))
    }

    fn decode(bytes: &[u8]) -> Result<Balance> {
        serde_json::from_slice(bytes)
            .map_err(|e| BlackjackError::Persistence(format!("Deserialization error: {e}")))
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn load(&self, user: &UserId) -> Result<Option<Balance>> {
        let cf = self.cf(CF_BALANCES)?;
        match self.db.get_pinned_cf(cf, user.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, user: &UserId, balance: Balance) -> Result<()> {
        let cf = self.cf(CF_BALANCES)?;
        self.db
            .put_cf_opt(cf, user.as_str().as_bytes(), Self::encode(balance)?, &Self::synced())?;
        Ok(())
    }

    async fn is_settled(&self, payment: &PaymentId) -> Result<bool> {
        let cf = self.cf(CF_SETTLED_PAYMENTS)?;
        // Just check if the key exists without retrieving the value
        let result = self.db.get_pinned_cf(cf, payment.as_str().as_bytes())?;
        Ok(result.is_some())
    }

    async fn store_payment(
        &self,
        user: &UserId,
        balance: Balance,
        payment: &PaymentId,
    ) -> Result<()> {
        let balances = self.cf(CF_BALANCES)?;
        let settled = self.cf(CF_SETTLED_PAYMENTS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(balances, user.as_str().as_bytes(), Self::encode(balance)?);
        batch.put_cf(settled, payment.as_str().as_bytes(), user.as_str().as_bytes());
        self.db.write_opt(batch, &Self::synced())?;
        Ok(())
    }

    async fn all_balances(&self) -> Result<Vec<(UserId, Balance)>> {
        let cf = self.cf(CF_BALANCES)?;
        let mut balances = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let user = String::from_utf8(key.to_vec())
                .map_err(|e| BlackjackError::Persistence(format!("invalid user key: {e}")))
                .and_then(|key| UserId::parse(key))?;
            balances.push((user, Self::decode(&value)?));
        }
        Ok(balances)
    }
}
