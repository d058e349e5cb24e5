use std::sync::Arc;

use anyhow::Context;
use ripple_checkout::config::AppConfig;
use ripple_checkout::db::Database;
use ripple_checkout::ledger::LedgerClient;
use ripple_checkout::reconcile::{EngineSettings, ReconciliationEngine};
use ripple_checkout::rpc::HttpRpcClient;
use ripple_checkout::store::{
    CursorStore, MemoryCursorStore, MemoryOrderStore, OrderStore, PgCursorStore, PgOrderStore,
};
use ripple_checkout::trigger::{self, AppState, PaymentSettings};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Run a single pass and exit (for external cron)
fn use_once_mode() -> bool {
    std::env::args().any(|a| a == "--once")
}

fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn open_stores(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn OrderStore>, Arc<dyn CursorStore>)> {
    match config.storage.postgres_url.as_deref() {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to Postgres")?;
            db.init_schema().await.context("Failed to init schema")?;
            tracing::info!("Postgres stores ready");
            Ok((
                Arc::new(PgOrderStore::new(db.pool().clone())),
                Arc::new(PgCursorStore::new(db.pool().clone())),
            ))
        }
        None => {
            tracing::warn!("No postgres_url configured, using in-memory stores");
            Ok((
                Arc::new(MemoryOrderStore::new()),
                Arc::new(MemoryCursorStore::new()),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env).with_context(|| format!("Failed to load config/{}.yaml", env))?;
    let _log_guard = ripple_checkout::logging::init_logging(&config);

    tracing::info!(
        "Starting ripple_checkout {} ({}) in {} mode",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env
    );

    let rpc = HttpRpcClient::new(&config.ledger).context("Failed to build ledger RPC client")?;
    tracing::info!("Ledger node: {}", config.ledger.endpoint());
    let ledger = LedgerClient::new(Arc::new(rpc));

    // Startup sanity check only; the scheduler retries on its own
    match ledger.account_info(&config.wallet.address).await {
        Ok(info) => tracing::info!(
            "Wallet {} found, balance {} drops, sequence {}",
            info.account,
            info.balance_drops,
            info.sequence
        ),
        Err(e) => tracing::warn!("Could not verify wallet {}: {}", config.wallet.address, e),
    }

    let (orders, cursors) = open_stores(&config).await?;
    let engine = Arc::new(ReconciliationEngine::new(
        ledger,
        orders.clone(),
        cursors,
        EngineSettings::from_config(&config),
    ));

    if use_once_mode() {
        let report = engine.run_pass().await?;
        tracing::info!(
            "Pass complete: {} paid, {} on-hold, {} failed, cursor {}",
            report.paid_count(),
            report.on_hold_count(),
            report.failures.len(),
            report.cursor_after
        );
        return Ok(());
    }

    let scheduler = trigger::spawn_scheduler(engine.clone(), config.reconcile.interval());

    let state = Arc::new(AppState::new(
        engine,
        orders,
        config.trigger.cron_secret.clone(),
        PaymentSettings::from_config(&config),
    ));
    let port = get_port_override().unwrap_or(config.gateway.port);

    tokio::select! {
        res = trigger::run_server(&config.gateway.host, port, state) => {
            res.context("Gateway stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    scheduler.abort();
    tracing::info!("ripple_checkout stopped");
    Ok(())
}
