use super::{ApiError, ExchangeApi, FakeExchangeApi, FakeExchangeConfig};
use crate::models::{Exchange, Market};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Builds the adapter for one market of an exchange
pub type ApiFactory = Box<dyn Fn(Market) -> Arc<dyn ExchangeApi> + Send + Sync>;

/// Exchange -> adapter factory table, assembled once at startup.
///
/// Adapters are created on first use per `(exchange, market)` and shared by
/// every later lookup, so all ticks of a worker talk to the same adapter.
#[derive(Default)]
pub struct ExchangeRegistry {
    factories: HashMap<Exchange, ApiFactory>,
    adapters: Mutex<HashMap<(Exchange, Market), Arc<dyn ExchangeApi>>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the in-memory exchange registered as [`Exchange::Fake`]
    pub fn with_fake(config: FakeExchangeConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            Exchange::Fake,
            Box::new(move |market| -> Arc<dyn ExchangeApi> {
                Arc::new(FakeExchangeApi::with_config(market, config.clone()))
            }),
        );
        registry
    }

    pub fn register(&mut self, exchange: Exchange, factory: ApiFactory) {
        self.factories.insert(exchange, factory);
    }

    pub fn supports(&self, exchange: Exchange) -> bool {
        self.factories.contains_key(&exchange)
    }

    pub fn api_for(
        &self,
        exchange: Exchange,
        market: Market,
    ) -> Result<Arc<dyn ExchangeApi>, ApiError> {
        let mut adapters = self.adapters.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(api) = adapters.get(&(exchange, market)) {
            return Ok(api.clone());
        }

        let factory = self
            .factories
            .get(&exchange)
            .ok_or(ApiError::Unsupported { exchange })?;
        let api = factory(market);
        adapters.insert((exchange, market), api.clone());

        tracing::debug!(%exchange, %market, "Created exchange adapter");

        Ok(api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_exchange_is_unsupported() {
        let registry = ExchangeRegistry::with_fake(FakeExchangeConfig::default());
        assert!(registry.supports(Exchange::Fake));
        assert!(!registry.supports(Exchange::Upbit));

        let result = registry.api_for(Exchange::Upbit, Market::Btc);
        assert!(matches!(
            result,
            Err(ApiError::Unsupported {
                exchange: Exchange::Upbit
            })
        ));
    }

    #[test]
    fn test_adapter_is_shared_per_market() {
        let registry = ExchangeRegistry::with_fake(FakeExchangeConfig::default());

        let a = registry.api_for(Exchange::Fake, Market::Eth).unwrap();
        let b = registry.api_for(Exchange::Fake, Market::Eth).unwrap();
        let c = registry.api_for(Exchange::Fake, Market::Btc).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.market(), Market::Btc);
    }
}
