use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use stars_blackjack::application::ledger::BalanceLedger;
use stars_blackjack::application::payments::PaymentService;
use stars_blackjack::application::table::GameTable;
use stars_blackjack::config::{ServeConfig, StorageConfig};
use stars_blackjack::domain::deck::ShuffledDecks;
use stars_blackjack::domain::ledger::{Balance, UserId};
use stars_blackjack::domain::ports::LedgerStoreBox;
use stars_blackjack::infrastructure::in_memory::InMemoryLedgerStore;
use stars_blackjack::infrastructure::json_file::JsonFileLedgerStore;
use stars_blackjack::interfaces::http::{AppState, cors_layer, router};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Blackjack mini-app backend with Telegram Stars chip packs", long_about = None)]
struct Cli {
    #[command(flatten)]
    storage: StorageConfig,

    /// Maximum log level written to stderr.
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve(ServeConfig),
    /// Print a user's chip balance as `user,chips`.
    Balance {
        /// Platform user id.
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .init();

    let store = open_ledger_store(&cli.storage)?;
    let ledger = Arc::new(BalanceLedger::with_starter_balance(
        store,
        Balance::new(cli.storage.starter_balance),
    ));

    match cli.command {
        Command::Serve(config) => serve(ledger, config).await,
        Command::Balance { user } => {
            let user = UserId::parse(user).into_diagnostic()?;
            let balance = ledger.get_balance(&user).await.into_diagnostic()?;
            println!("{user},{balance}");
            Ok(())
        }
    }
}

fn open_ledger_store(config: &StorageConfig) -> Result<LedgerStoreBox> {
    if config.ephemeral {
        info!("Using in-memory ledger; balances are lost on exit");
        return Ok(Box::new(InMemoryLedgerStore::new()));
    }

    if let Some(path) = &config.rocksdb_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            use stars_blackjack::infrastructure::rocksdb::RocksDbLedgerStore;
            info!(path = %path.display(), "Opening RocksDB ledger");
            return Ok(Box::new(RocksDbLedgerStore::open(path).into_diagnostic()?));
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        warn!(
            path = %path.display(),
            "Persistent RocksDB storage requested via --rocksdb-path, but 'storage-rocksdb' feature is not enabled. Falling back to JSON file ledger."
        );
    }

    Ok(Box::new(
        JsonFileLedgerStore::open(&config.ledger_path).into_diagnostic()?,
    ))
}

async fn serve(ledger: Arc<BalanceLedger>, config: ServeConfig) -> Result<()> {
    let catalog = Arc::new(config.catalog().into_diagnostic()?);
    let platform = config.payments.platform().into_diagnostic()?;
    if platform.is_none() {
        info!("Stars payments disabled; invoices answer coming_soon");
    }
    if config.payments.webhook_secret().is_none() {
        warn!("No webhook secret configured; payment updates will be discarded");
    }

    let table = Arc::new(GameTable::new(
        ledger.clone(),
        Box::new(ShuffledDecks::new()),
        config.dealer_reveal(),
    ));
    let payments = Arc::new(PaymentService::new(ledger, catalog, platform));
    let state = AppState {
        table,
        payments,
        webhook_secret: config.payments.webhook_secret().map(str::to_string),
    };
    let app = router(state).layer(cors_layer(&config.cors_origin));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .into_diagnostic()?;
    info!(addr = %config.listen, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await
        .into_diagnostic()
}
