// Core modules
pub mod api;
pub mod budget;
pub mod driver;
pub mod models;
pub mod repository;
pub mod settings;
pub mod worker;

// Re-export commonly used types
pub use api::{ApiError, ExchangeApi, ExchangeRegistry, FakeExchangeApi};
pub use budget::{Budget, BudgetError};
pub use driver::{add_worker, Driver, DriverError};
pub use models::*;
pub use repository::{InMemoryWorkerRepository, RepositoryError, WorkerRepository};
pub use settings::Settings;
pub use worker::{work, TickOutcome, TradingRules, Worker};
