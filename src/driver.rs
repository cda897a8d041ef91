use crate::api::{ApiError, ExchangeApi, ExchangeRegistry};
use crate::budget::Budget;
use crate::models::{Exchange, Market, WorkerStatus};
use crate::repository::{RepositoryError, WorkerRepository};
use crate::worker::{work, TickOutcome, TradingRules, Worker, WorkerError};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{market} is already working")]
    WorkerDuplicated { market: Market },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("worker {worker_id} failed: {source}")]
    Worker {
        worker_id: uuid::Uuid,
        #[source]
        source: WorkerError,
    },
}

/// Register a new WATCHING worker for `market`.
///
/// Fails with [`DriverError::WorkerDuplicated`] while another active worker
/// trades the same market, and with [`ApiError::Unsupported`] when no adapter
/// is registered for `exchange`.
pub async fn add_worker(
    repo: &dyn WorkerRepository,
    registry: &ExchangeRegistry,
    market: Market,
    exchange: Exchange,
    budget: Budget,
) -> Result<Worker, DriverError> {
    if !registry.supports(exchange) {
        return Err(ApiError::Unsupported { exchange }.into());
    }
    if repo.has_active_worker(market).await? {
        return Err(DriverError::WorkerDuplicated { market });
    }

    let worker = Worker::new(market, exchange, budget);
    repo.add(&worker).await?;

    tracing::info!(
        worker_id = %worker.worker_id,
        %market,
        %exchange,
        budget = %worker.budget,
        "✅ Worker added"
    );

    Ok(worker)
}

/// What one pass over the active workers did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub ticked: usize,
    pub aborted: usize,
    pub finished: usize,
    /// Workers whose exchange has no registered adapter
    pub skipped: usize,
}

/// Default ceiling on one worker tick
pub const DEFAULT_TICK_TIMEOUT: Duration = Duration::from_secs(30);

/// Polling loop: tick every active worker once, persist it, pause, repeat
pub struct Driver {
    repo: Arc<dyn WorkerRepository>,
    registry: Arc<ExchangeRegistry>,
    rules: TradingRules,
    interval: Duration,
    tick_timeout: Duration,
}

impl Driver {
    pub fn new(
        repo: Arc<dyn WorkerRepository>,
        registry: Arc<ExchangeRegistry>,
        rules: TradingRules,
        interval: Duration,
    ) -> Self {
        Self {
            repo,
            registry,
            rules,
            interval,
            tick_timeout: DEFAULT_TICK_TIMEOUT,
        }
    }

    pub fn with_tick_timeout(mut self, tick_timeout: Duration) -> Self {
        self.tick_timeout = tick_timeout;
        self
    }

    /// Tick each active worker once, sequentially, saving after every tick.
    ///
    /// The pause after each worker applies whether or not it could be ticked.
    pub async fn run_once(&self) -> Result<RoundReport, DriverError> {
        let workers = self.repo.load_by_status(&WorkerStatus::ACTIVE).await?;
        let mut report = RoundReport::default();

        for mut worker in workers {
            match self.registry.api_for(worker.exchange, worker.market) {
                Ok(api) => {
                    let outcome = self.tick(&mut worker, api.as_ref()).await?;
                    self.repo.save(&worker).await?;

                    report.ticked += 1;
                    match outcome {
                        TickOutcome::Aborted(_) => report.aborted += 1,
                        TickOutcome::Completed {
                            status: WorkerStatus::Finished,
                            ..
                        } => report.finished += 1,
                        TickOutcome::Completed { .. } => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        worker_id = %worker.worker_id,
                        exchange = %worker.exchange,
                        error = %e,
                        "No adapter for worker, skipping"
                    );
                    report.skipped += 1;
                }
            }

            tokio::time::sleep(self.interval).await;
        }

        Ok(report)
    }

    /// One tick bounded by the tick timeout. A tick that runs out of time is
    /// abandoned like any other exchange failure.
    async fn tick(
        &self,
        worker: &mut Worker,
        api: &dyn ExchangeApi,
    ) -> Result<TickOutcome, DriverError> {
        let worker_id = worker.worker_id;
        let status = worker.status;

        match tokio::time::timeout(self.tick_timeout, work(worker, api, &self.rules)).await {
            Ok(result) => result.map_err(|source| DriverError::Worker { worker_id, source }),
            Err(elapsed) => {
                let e = ApiError::from(elapsed);
                tracing::warn!(
                    %worker_id,
                    %status,
                    timeout_ms = self.tick_timeout.as_millis() as u64,
                    error = %e,
                    "Tick timed out, abandoned"
                );
                Ok(TickOutcome::Aborted(e))
            }
        }
    }

    /// Keep polling while any worker can be ticked, or for at most
    /// `max_rounds` rounds.
    ///
    /// Workers on an exchange without an adapter never keep the loop alive.
    /// Returns the number of rounds run.
    pub async fn run(&self, max_rounds: Option<usize>) -> Result<usize, DriverError> {
        let mut rounds = 0;

        while max_rounds.map_or(true, |max| rounds < max) {
            let report = self.run_once().await?;
            if report.ticked == 0 {
                tracing::info!(rounds, skipped = report.skipped, "No tradable worker left");
                break;
            }
            rounds += 1;

            tracing::debug!(
                round = rounds,
                ticked = report.ticked,
                aborted = report.aborted,
                finished = report.finished,
                skipped = report.skipped,
                "Round complete"
            );
        }

        Ok(rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FakeExchangeApi, FakeExchangeConfig, FillPolicy};
    use crate::repository::InMemoryWorkerRepository;

    fn registry() -> Arc<ExchangeRegistry> {
        Arc::new(ExchangeRegistry::with_fake(FakeExchangeConfig {
            fill_policy: FillPolicy::Manual,
            ..Default::default()
        }))
    }

    fn budget() -> Budget {
        "10000:20000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_add_worker_rejects_duplicate_market() {
        let repo = InMemoryWorkerRepository::new();
        let registry = registry();

        let first = add_worker(&repo, &registry, Market::Btc, Exchange::Fake, budget())
            .await
            .unwrap();
        assert_eq!(first.status, WorkerStatus::Watching);

        let second = add_worker(&repo, &registry, Market::Btc, Exchange::Fake, budget()).await;
        assert!(matches!(
            second,
            Err(DriverError::WorkerDuplicated {
                market: Market::Btc
            })
        ));

        // other markets are independent
        add_worker(&repo, &registry, Market::Eth, Exchange::Fake, budget())
            .await
            .unwrap();
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_add_worker_allowed_once_previous_finished() {
        let repo = InMemoryWorkerRepository::new();
        let registry = registry();

        let mut first = add_worker(&repo, &registry, Market::Eos, Exchange::Fake, budget())
            .await
            .unwrap();
        first.status = WorkerStatus::Finished;
        repo.save(&first).await.unwrap();

        assert!(add_worker(&repo, &registry, Market::Eos, Exchange::Fake, budget())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_add_worker_on_unregistered_exchange() {
        let repo = InMemoryWorkerRepository::new();
        let result = add_worker(&repo, &registry(), Market::Btc, Exchange::Upbit, budget()).await;

        assert!(matches!(
            result,
            Err(DriverError::Api(ApiError::Unsupported {
                exchange: Exchange::Upbit
            }))
        ));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_run_stops_when_no_worker_is_active() {
        let repo = Arc::new(InMemoryWorkerRepository::new());
        let registry = registry();
        let mut w = add_worker(repo.as_ref(), &registry, Market::Btc, Exchange::Fake, "".parse().unwrap())
            .await
            .unwrap();

        let driver = Driver::new(
            repo.clone(),
            registry,
            TradingRules::default(),
            Duration::ZERO,
        );
        // exhausted ledger: the first tick finishes the worker
        let rounds = driver.run(Some(10)).await.unwrap();
        assert_eq!(rounds, 1);

        w = repo.get(w.worker_id).await.unwrap();
        assert_eq!(w.status, WorkerStatus::Finished);
    }

    #[tokio::test]
    async fn test_run_respects_max_rounds() {
        let repo = Arc::new(InMemoryWorkerRepository::new());
        let registry = registry();
        add_worker(repo.as_ref(), &registry, Market::Btc, Exchange::Fake, budget())
            .await
            .unwrap();

        // no candles: the worker keeps watching forever
        let driver = Driver::new(repo, registry, TradingRules::default(), Duration::ZERO);
        assert_eq!(driver.run(Some(3)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_once_counts_aborted_ticks() {
        let fake = Arc::new(FakeExchangeApi::new(Market::Btc));
        let registry = fake_registry(&fake);

        let repo = Arc::new(InMemoryWorkerRepository::new());
        let w = add_worker(repo.as_ref(), &registry, Market::Btc, Exchange::Fake, budget())
            .await
            .unwrap();

        fake.fail_next_calls(1);
        let driver = Driver::new(repo.clone(), registry, TradingRules::default(), Duration::ZERO);
        let report = driver.run_once().await.unwrap();

        assert_eq!(
            report,
            RoundReport {
                ticked: 1,
                aborted: 1,
                finished: 0,
                skipped: 0
            }
        );
        let stored = repo.get(w.worker_id).await.unwrap();
        assert_eq!(stored.status, WorkerStatus::Watching);
    }

    fn fake_registry(fake: &Arc<FakeExchangeApi>) -> Arc<ExchangeRegistry> {
        let shared = fake.clone();
        let mut registry = ExchangeRegistry::new();
        registry.register(
            Exchange::Fake,
            Box::new(move |_: Market| -> Arc<dyn ExchangeApi> { shared.clone() }),
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_unroutable_worker_still_paces_and_stops_run() {
        let repo = Arc::new(InMemoryWorkerRepository::new());
        let stranded = Worker::with_default_budget(Market::Btc, Exchange::Upbit);
        repo.add(&stranded).await.unwrap();

        let interval = Duration::from_millis(40);
        let driver = Driver::new(repo.clone(), registry(), TradingRules::default(), interval);

        let started = std::time::Instant::now();
        let rounds = driver.run(None).await.unwrap();

        assert_eq!(rounds, 0);
        assert!(started.elapsed() >= interval);
        let stored = repo.get(stranded.worker_id).await.unwrap();
        assert_eq!(stored.status, WorkerStatus::Watching);
    }

    #[tokio::test]
    async fn test_rounds_are_paced_per_worker() {
        let repo = Arc::new(InMemoryWorkerRepository::new());
        let registry = registry();
        // no candles: keeps watching every round
        add_worker(repo.as_ref(), &registry, Market::Eth, Exchange::Fake, budget())
            .await
            .unwrap();
        repo.add(&Worker::with_default_budget(Market::Btc, Exchange::Upbit))
            .await
            .unwrap();

        let interval = Duration::from_millis(20);
        let driver = Driver::new(repo, registry, TradingRules::default(), interval);

        let started = std::time::Instant::now();
        let rounds = driver.run(Some(3)).await.unwrap();

        assert_eq!(rounds, 3);
        // two workers per round, one pause each
        assert!(started.elapsed() >= interval * 6);
    }

    #[tokio::test]
    async fn test_slow_exchange_times_out_tick() {
        let fake = Arc::new(FakeExchangeApi::new(Market::Eth));
        let registry = fake_registry(&fake);
        let repo = Arc::new(InMemoryWorkerRepository::new());
        let w = add_worker(repo.as_ref(), &registry, Market::Eth, Exchange::Fake, budget())
            .await
            .unwrap();

        fake.set_latency(Duration::from_secs(5));
        let driver = Driver::new(repo.clone(), registry, TradingRules::default(), Duration::ZERO)
            .with_tick_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let report = driver.run_once().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            report,
            RoundReport {
                ticked: 1,
                aborted: 1,
                finished: 0,
                skipped: 0
            }
        );
        let stored = repo.get(w.worker_id).await.unwrap();
        assert_eq!(stored.status, WorkerStatus::Watching);
        assert_eq!(stored.order_count(), 0);
        assert!(fake.orders().is_empty());
    }
}
