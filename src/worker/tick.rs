use super::{TradingRules, Worker};
use crate::api::{ApiError, ExchangeApi};
use crate::budget::BudgetError;
use crate::models::WorkerStatus;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Budget(#[from] BudgetError),
}

/// Order action fired by a tick. A tick fires at most one.
#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    Buy { order_id: String },
    Sell { order_id: String },
    Cancel { order_id: String },
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The decision branch ran to the end
    Completed {
        action: TickAction,
        status: WorkerStatus,
    },
    /// An exchange call failed; the status was left untouched
    Aborted(ApiError),
}

/// Run one tick of `worker` against its exchange.
///
/// Exchange failures are swallowed into [`TickOutcome::Aborted`] and leave
/// everything but the refreshed orders, balance and prices as they were. Only
/// non-exchange failures (a corrupt budget ledger) come back as `Err`.
pub async fn work(
    worker: &mut Worker,
    api: &dyn ExchangeApi,
    rules: &TradingRules,
) -> Result<TickOutcome, WorkerError> {
    let from = worker.status;

    let result = match from {
        WorkerStatus::Watching => work_for_watching(worker, api, rules).await,
        WorkerStatus::Buying => work_for_buying(worker, api, rules).await,
        WorkerStatus::Selling => work_for_selling(worker, api, rules).await,
        WorkerStatus::Finished => Ok(TickAction::Nothing),
    };

    match result {
        Ok(action) => {
            if worker.status != from {
                tracing::info!(
                    worker_id = %worker.worker_id,
                    market = %worker.market,
                    from = %from,
                    to = %worker.status,
                    action = ?action,
                    "Worker transitioned"
                );
            }
            Ok(TickOutcome::Completed {
                action,
                status: worker.status,
            })
        }
        Err(WorkerError::Api(e)) => {
            tracing::warn!(
                worker_id = %worker.worker_id,
                market = %worker.market,
                status = %from,
                error = %e,
                "Exchange call failed, tick abandoned"
            );
            Ok(TickOutcome::Aborted(e))
        }
        Err(e) => Err(e),
    }
}

async fn work_for_watching(
    worker: &mut Worker,
    api: &dyn ExchangeApi,
    rules: &TradingRules,
) -> Result<TickAction, WorkerError> {
    let unit_budget = worker.unit_budget(rules);
    if unit_budget == 0 {
        tracing::info!(
            worker_id = %worker.worker_id,
            budget = %worker.budget,
            "No tranche left to spend"
        );
        worker.status = WorkerStatus::Finished;
        return Ok(TickAction::Nothing);
    }

    update_prices(worker, api, rules).await?;

    let Some(trade_price) = worker.trade_price().filter(|_| worker.is_buy_timing()) else {
        tracing::debug!(
            worker_id = %worker.worker_id,
            trade_price = ?worker.trade_price(),
            average = ?worker.price_average(),
            "Not a buy timing"
        );
        return Ok(TickAction::Nothing);
    };

    let order = api.buy_order(trade_price, unit_budget).await?;
    let order_id = order.order_id.clone();

    tracing::info!(
        worker_id = %worker.worker_id,
        market = %worker.market,
        price = order.price,
        budget = unit_budget,
        "💰 Buy order placed"
    );

    worker.upsert_order(order);
    worker.status = WorkerStatus::Buying;
    Ok(TickAction::Buy { order_id })
}

async fn work_for_buying(
    worker: &mut Worker,
    api: &dyn ExchangeApi,
    rules: &TradingRules,
) -> Result<TickAction, WorkerError> {
    refresh(worker, api, rules).await?;

    let Some(latest) = worker.latest_order(None).cloned() else {
        worker.status = WorkerStatus::Watching;
        return Ok(TickAction::Nothing);
    };

    if worker.need_to_cancel_buy_order() {
        let order_id = api.cancel_order(&latest.order_id).await?;
        tracing::info!(
            worker_id = %worker.worker_id,
            %order_id,
            trade_price = ?worker.trade_price(),
            "Buy order cancelled, price moved up"
        );
        return Ok(TickAction::Cancel { order_id });
    }

    let buy_price_average = worker.buy_price_average();
    if let (true, Some(average)) = (worker.need_to_sell_or_buy_order(), buy_price_average) {
        // staged so a rejected sell leaves the ledger untouched
        let mut budget = worker.budget.clone();
        budget.spend(latest.executed_funds(), rules.min_order_budget)?;

        let order = api.sell_order(average * rules.sell_rate, worker.balance).await?;
        let order_id = order.order_id.clone();

        tracing::info!(
            worker_id = %worker.worker_id,
            market = %worker.market,
            price = order.price,
            volume = order.ordered_volume,
            budget = %budget,
            "📈 Sell order placed"
        );

        worker.budget = budget;
        worker.upsert_order(order);
        worker.status = WorkerStatus::Selling;
        return Ok(TickAction::Sell { order_id });
    }

    worker.status = WorkerStatus::Watching;
    Ok(TickAction::Nothing)
}

async fn work_for_selling(
    worker: &mut Worker,
    api: &dyn ExchangeApi,
    rules: &TradingRules,
) -> Result<TickAction, WorkerError> {
    refresh(worker, api, rules).await?;

    let Some(latest) = worker.latest_order(None).cloned() else {
        worker.status = WorkerStatus::Finished;
        return Ok(TickAction::Nothing);
    };

    if worker.need_to_cancel_sell_order(rules) {
        let order_id = api.cancel_order(&latest.order_id).await?;
        tracing::info!(
            worker_id = %worker.worker_id,
            %order_id,
            trade_price = ?worker.trade_price(),
            "Sell order cancelled, preparing to average down"
        );
        return Ok(TickAction::Cancel { order_id });
    }

    let unit_budget = worker.unit_budget(rules);
    let next_buy_price = worker.next_additional_buy_price(rules);
    if let (true, Some(price)) = (
        worker.need_to_sell_or_buy_order() && unit_budget > 0,
        next_buy_price,
    ) {
        let order = api.buy_order(price, unit_budget).await?;
        let order_id = order.order_id.clone();

        tracing::info!(
            worker_id = %worker.worker_id,
            market = %worker.market,
            price = order.price,
            budget = unit_budget,
            "📉 Additional buy order placed"
        );

        worker.upsert_order(order);
        worker.status = WorkerStatus::Buying;
        return Ok(TickAction::Buy { order_id });
    }

    tracing::info!(
        worker_id = %worker.worker_id,
        market = %worker.market,
        budget = %worker.budget,
        "🏁 Worker finished"
    );
    worker.status = WorkerStatus::Finished;
    Ok(TickAction::Nothing)
}

/// Re-read prices, open orders and balance, in that order
async fn refresh(
    worker: &mut Worker,
    api: &dyn ExchangeApi,
    rules: &TradingRules,
) -> Result<(), ApiError> {
    update_prices(worker, api, rules).await?;
    update_orders(worker, api).await?;
    update_balance(worker, api).await
}

async fn update_prices(
    worker: &mut Worker,
    api: &dyn ExchangeApi,
    rules: &TradingRules,
) -> Result<(), ApiError> {
    worker.prices = api
        .get_prices(rules.price_unit, rules.price_window, None)
        .await?;
    Ok(())
}

async fn update_orders(worker: &mut Worker, api: &dyn ExchangeApi) -> Result<(), ApiError> {
    let waiting: Vec<String> = worker
        .orders()
        .filter(|o| o.is_waiting())
        .map(|o| o.order_id.clone())
        .collect();
    if waiting.is_empty() {
        return Ok(());
    }

    let updated = api.get_orders(&waiting).await?;
    tracing::debug!(
        worker_id = %worker.worker_id,
        requested = waiting.len(),
        received = updated.len(),
        "Refreshed waiting orders"
    );
    for order in updated {
        worker.upsert_order(order);
    }
    Ok(())
}

async fn update_balance(worker: &mut Worker, api: &dyn ExchangeApi) -> Result<(), ApiError> {
    worker.balance = api.get_balance().await?;
    Ok(())
}
