use crate::application::ledger::DEFAULT_STARTER_BALANCE;
use crate::application::table::DealerReveal;
use crate::domain::catalog::PackCatalog;
use crate::domain::ports::PaymentPlatformBox;
use crate::error::{BlackjackError, Result};
use crate::infrastructure::telegram::{DEFAULT_API_URL, TelegramBotClient};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Where balances live. Shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct StorageConfig {
    /// JSON ledger file, rewritten atomically on every change.
    #[arg(long, env = "LEDGER_PATH", default_value = "data/ledger.json", global = true)]
    pub ledger_path: PathBuf,

    /// Path to a RocksDB ledger. Requires the `storage-rocksdb` feature.
    #[arg(long, env = "LEDGER_ROCKSDB_PATH", global = true)]
    pub rocksdb_path: Option<PathBuf>,

    /// Keep balances in memory only.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Chips granted to a user the first time they are seen. Never negative.
    #[arg(
        long,
        env = "STARTER_BALANCE",
        default_value_t = DEFAULT_STARTER_BALANCE,
        value_parser = clap::value_parser!(i64).range(0..),
        global = true
    )]
    pub starter_balance: i64,
}

#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:4000")]
    pub listen: SocketAddr,

    /// Allowed browser origin for the mini-app, or `*`.
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_origin: String,

    /// Delay before the dealer reveals after a stand. 0 resolves immediately.
    #[arg(long, env = "DEALER_REVEAL_MS", default_value_t = 250)]
    pub dealer_reveal_ms: u64,

    /// JSON file with the pack catalog. Defaults to the built-in packs.
    #[arg(long, env = "PACK_CATALOG")]
    pub catalog: Option<PathBuf>,

    #[command(flatten)]
    pub payments: PaymentsConfig,
}

impl ServeConfig {
    pub fn dealer_reveal(&self) -> DealerReveal {
        DealerReveal::from_millis(self.dealer_reveal_ms)
    }

    pub fn catalog(&self) -> Result<PackCatalog> {
        match &self.catalog {
            Some(path) => PackCatalog::from_file(path),
            None => Ok(PackCatalog::builtin()),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct PaymentsConfig {
    /// Accept Telegram Stars purchases.
    #[arg(long, env = "STARS_PAYMENTS_ENABLED")]
    pub payments_enabled: bool,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    #[arg(long, env = "TELEGRAM_API_URL", default_value = DEFAULT_API_URL)]
    pub telegram_api_url: String,

    /// Timeout for each Bot API request.
    #[arg(long, env = "PLATFORM_TIMEOUT_MS", default_value_t = 5_000)]
    pub platform_timeout_ms: u64,

    /// Secret expected in the webhook's secret-token header. Required when
    /// payments are enabled; without it the webhook credits nothing.
    #[arg(long, env = "TELEGRAM_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,
}

impl PaymentsConfig {
    /// The configured webhook secret, if it is not blank.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }

    /// The platform client, or `None` when payments are disabled.
    ///
    /// Enabling payments needs both a bot token and a webhook secret: the
    /// secret is the only thing that tells platform updates apart from forged
    /// ones.
    pub fn platform(&self) -> Result<Option<PaymentPlatformBox>> {
        if !self.payments_enabled {
            return Ok(None);
        }
        if self.webhook_secret().is_none() {
            return Err(BlackjackError::InvalidRequest(
                "--webhook-secret is required when payments are enabled".to_string(),
            ));
        }
        let token = self
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                BlackjackError::InvalidRequest(
                    "--bot-token is required when payments are enabled".to_string(),
                )
            })?;
        let client = TelegramBotClient::new(
            token,
            self.telegram_api_url.as_str(),
            Duration::from_millis(self.platform_timeout_ms),
        )?;
        Ok(Some(Box::new(client)))
    }
}
