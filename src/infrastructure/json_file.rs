use crate::domain::ledger::{Balance, PaymentId, UserId};
use crate::domain::ports::LedgerStore;
use crate::error::{BlackjackError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct BalanceRecord {
    chips: Balance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    #[serde(default)]
    balances: BTreeMap<UserId, BalanceRecord>,
    #[serde(default)]
    settled_payments: BTreeSet<PaymentId>,
}

impl Default for LedgerFile {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            balances: BTreeMap::new(),
            settled_payments: BTreeSet::new(),
        }
    }
}

/// A ledger kept in a single JSON file.
///
/// The whole file is rewritten on every mutation: the new contents go to a
/// temporary file in the same directory, are synced, and then renamed over
/// the old file. A crash leaves either the old or the new file in place,
/// never a partial one. The in-memory copy only advances once the rename
/// succeeded.
pub struct JsonFileLedgerStore {
    path: PathBuf,
    state: Mutex<LedgerFile>,
}

impl JsonFileLedgerStore {
    /// Opens the ledger at `path`, creating parent directories as needed.
    /// A missing file starts an empty ledger.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let state = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let file: LedgerFile = serde_json::from_slice(&bytes).map_err(|e| {
                BlackjackError::Persistence(format!("corrupt ledger {}: {e}", path.display()))
            })?;
            if file.version != FORMAT_VERSION {
                return Err(BlackjackError::Persistence(format!(
                    "unsupported ledger version {} in {}",
                    file.version,
                    path.display()
                )));
            }
            file
        } else {
            LedgerFile::default()
        };

        info!(
            path = %path.display(),
            users = state.balances.len(),
            settled_payments = state.settled_payments.len(),
            "Opened ledger file"
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, file: &LedgerFile) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|e| BlackjackError::Persistence(format!("Serialization error: {e}")))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        #[cfg(unix)]
        std::fs::File::open(dir)?.sync_all()?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Ledger flushed");
        Ok(())
    }

    async fn mutate(&self, apply: impl FnOnce(&mut LedgerFile)) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        apply(&mut next);
        self.persist(&next)?;
        *state = next;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for JsonFileLedgerStore {
    async fn load(&self, user: &UserId) -> Result<Option<Balance>> {
        let state = self.state.lock().await;
        Ok(state.balances.get(user).map(|record| record.chips))
    }

    async fn store(&self, user: &UserId, balance: Balance) -> Result<()> {
        self.mutate(|file| {
            file.balances
                .insert(user.clone(), BalanceRecord { chips: balance });
        })
        .await
    }

    async fn is_settled(&self, payment: &PaymentId) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.settled_payments.contains(payment))
    }

    async fn store_payment(
        &self,
        user: &UserId,
        balance: Balance,
        payment: &PaymentId,
    ) -> Result<()> {
        self.mutate(|file| {
            file.balances
                .insert(user.clone(), BalanceRecord { chips: balance });
            file.settled_payments.insert(payment.clone());
        })
        .await
    }

    async fn all_balances(&self) -> Result<Vec<(UserId, Balance)>> {
        let state = self.state.lock().await;
        Ok(state
            .balances
            .iter()
            .map(|(user, record)| (user.clone(), record.chips))
            .collect())
    }
}
