use crate::models::{Market, WorkerStatus};
use crate::worker::Worker;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("worker {0} not found")]
    NotFound(Uuid),

    #[error("worker {0} already stored")]
    AlreadyExists(Uuid),

    #[error("worker snapshot could not be (de)serialized: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Storage of worker state between ticks.
///
/// A worker is read and written as a whole; `save` after a tick replaces the
/// previous snapshot atomically.
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    async fn load_by_status(&self, statuses: &[WorkerStatus]) -> Result<Vec<Worker>, RepositoryError>;

    async fn save(&self, worker: &Worker) -> Result<(), RepositoryError>;

    async fn add(&self, worker: &Worker) -> Result<(), RepositoryError>;

    /// Whether a WATCHING, BUYING or SELLING worker exists for `market`
    async fn has_active_worker(&self, market: Market) -> Result<bool, RepositoryError> {
        let active = self.load_by_status(&WorkerStatus::ACTIVE).await?;
        Ok(active.iter().any(|w| w.market == market))
    }
}

/// Process-local store keeping each worker as its JSON snapshot
#[derive(Default)]
pub struct InMemoryWorkerRepository {
    snapshots: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryWorkerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, worker_id: Uuid) -> Result<Worker, RepositoryError> {
        let snapshots = self.snapshots.read().await;
        let json = snapshots
            .get(&worker_id)
            .ok_or(RepositoryError::NotFound(worker_id))?;
        Ok(serde_json::from_str(json)?)
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl WorkerRepository for InMemoryWorkerRepository {
    async fn load_by_status(&self, statuses: &[WorkerStatus]) -> Result<Vec<Worker>, RepositoryError> {
        let snapshots = self.snapshots.read().await;
        let mut workers = Vec::new();
        for json in snapshots.values() {
            let worker: Worker = serde_json::from_str(json)?;
            if statuses.contains(&worker.status) {
                workers.push(worker);
            }
        }
        // stable tick order across rounds
        workers.sort_by_key(|w| (w.market.symbol(), w.worker_id));
        Ok(workers)
    }

    async fn save(&self, worker: &Worker) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(worker)?;
        let mut snapshots = self.snapshots.write().await;
        let slot = snapshots
            .get_mut(&worker.worker_id)
            .ok_or(RepositoryError::NotFound(worker.worker_id))?;
        *slot = json;
        Ok(())
    }

    async fn add(&self, worker: &Worker) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(worker)?;
        let mut snapshots = self.snapshots.write().await;
        if snapshots.contains_key(&worker.worker_id) {
            return Err(RepositoryError::AlreadyExists(worker.worker_id));
        }
        snapshots.insert(worker.worker_id, json);

        tracing::debug!(worker_id = %worker.worker_id, market = %worker.market, "Stored new worker");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Exchange;
    use tokio_test::{assert_err, assert_ok};

    fn worker(market: Market, status: WorkerStatus) -> Worker {
        Worker::with_default_budget(market, Exchange::Fake).with_status(status)
    }

    #[tokio::test]
    async fn test_load_by_status_filters() {
        let repo = InMemoryWorkerRepository::new();
        repo.add(&worker(Market::Btc, WorkerStatus::Watching)).await.unwrap();
        repo.add(&worker(Market::Eth, WorkerStatus::Selling)).await.unwrap();
        repo.add(&worker(Market::Eos, WorkerStatus::Finished)).await.unwrap();

        let active = repo.load_by_status(&WorkerStatus::ACTIVE).await.unwrap();
        let markets: Vec<Market> = active.iter().map(|w| w.market).collect();
        assert_eq!(markets, vec![Market::Btc, Market::Eth]);

        let finished = repo.load_by_status(&[WorkerStatus::Finished]).await.unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].market, Market::Eos);
    }

    #[tokio::test]
    async fn test_save_replaces_snapshot() {
        let repo = InMemoryWorkerRepository::new();
        let mut w = worker(Market::Btc, WorkerStatus::Watching);
        repo.add(&w).await.unwrap();

        w.status = WorkerStatus::Buying;
        w.balance = 0.5;
        assert_ok!(repo.save(&w).await);

        let stored = repo.get(w.worker_id).await.unwrap();
        assert_eq!(stored.status, WorkerStatus::Buying);
        assert_eq!(stored.balance, 0.5);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_save_unknown_worker_fails() {
        let repo = InMemoryWorkerRepository::new();
        let w = worker(Market::Btc, WorkerStatus::Watching);
        assert!(matches!(repo.save(&w).await, Err(RepositoryError::NotFound(id)) if id == w.worker_id));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_twice_fails() {
        let repo = InMemoryWorkerRepository::new();
        let w = worker(Market::Btc, WorkerStatus::Watching);
        assert_ok!(repo.add(&w).await);
        assert_err!(repo.add(&w).await);
    }

    #[tokio::test]
    async fn test_has_active_worker_ignores_finished() {
        let repo = InMemoryWorkerRepository::new();
        repo.add(&worker(Market::Eth, WorkerStatus::Finished)).await.unwrap();
        assert!(!repo.has_active_worker(Market::Eth).await.unwrap());

        repo.add(&worker(Market::Eth, WorkerStatus::Buying)).await.unwrap();
        assert!(repo.has_active_worker(Market::Eth).await.unwrap());
        assert!(!repo.has_active_worker(Market::Btc).await.unwrap());
    }
}
