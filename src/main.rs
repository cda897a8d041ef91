use anyhow::Context;
use cats::api::{ExchangeRegistry, FakeExchangeConfig};
use cats::driver::{add_worker, Driver};
use cats::repository::{InMemoryWorkerRepository, WorkerRepository};
use cats::{Budget, Exchange, Market, Settings, WorkerStatus, DEFAULT_BUDGET};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Paper-trade one market with the mean-reversion worker
#[derive(Debug, Parser)]
#[command(name = "cats", version)]
struct Cli {
    /// Market to trade (BTC, EOS, ETH)
    #[arg(long, default_value = "BTC")]
    market: Market,

    /// Exchange adapter; only FAKE ships with this binary
    #[arg(long, default_value = "FAKE")]
    exchange: Exchange,

    /// Budget tranches, colon separated
    #[arg(long, default_value = DEFAULT_BUDGET)]
    budget: Budget,

    /// Settings file (defaults to ./Settings.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many polling rounds
    #[arg(long)]
    max_rounds: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    tracing::info!("🚀 cats starting");
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Market: {} on {}", cli.market, cli.exchange);
    tracing::info!("  Budget: {}", cli.budget);
    tracing::info!("  Sell rate: {}", settings.trading.sell_rate);
    tracing::info!("  Additional buy rate: {}", settings.trading.additional_buy_rate);
    tracing::info!("  Min order budget: {}", settings.trading.min_order_budget);
    tracing::info!("  Tick interval: {}ms", settings.driver.tick_interval_ms);
    tracing::info!("  Tick timeout: {}ms", settings.driver.tick_timeout_ms);

    let registry = Arc::new(ExchangeRegistry::with_fake(FakeExchangeConfig::from(
        &settings.fake,
    )));
    let repo = Arc::new(InMemoryWorkerRepository::new());

    let worker = add_worker(repo.as_ref(), &registry, cli.market, cli.exchange, cli.budget)
        .await
        .context("failed to add worker")?;

    let driver = Driver::new(
        repo.clone(),
        registry,
        settings.trading.clone(),
        settings.driver.tick_interval(),
    )
    .with_tick_timeout(settings.driver.tick_timeout());

    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = driver.run(cli.max_rounds) => {
            let rounds = result.context("driver loop failed")?;
            tracing::info!(rounds, "Driver loop exited");
        }
    }

    let worker = repo
        .get(worker.worker_id)
        .await
        .context("worker vanished from repository")?;
    report(&worker, repo.as_ref()).await?;

    tracing::info!("👋 cats stopped");
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cats=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn report(worker: &cats::Worker, repo: &dyn WorkerRepository) -> anyhow::Result<()> {
    let active = repo.load_by_status(&WorkerStatus::ACTIVE).await?;

    tracing::info!("\n📈 Final state:");
    tracing::info!("  Worker: {}", worker.worker_id);
    tracing::info!("  Status: {}", worker.status);
    tracing::info!("  Budget left: {}", worker.budget);
    tracing::info!("  Orders: {}", worker.order_count());
    tracing::info!("  Balance: {:.8}", worker.balance);
    tracing::info!("  Active workers: {}", active.len());

    Ok(())
}
