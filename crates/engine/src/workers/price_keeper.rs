use crate::context::EngineContext;
use crate::error::EngineError;
use crate::frame::StrategyWorker;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    BotSpec, Credentials, OrderRequest, OrderSide, Outcome, StrategyKind, StrategySpec,
};
use exchange_client::client_order_id;
use strategies::price_keeper;

/// Keeps the last-trade price glued to the best ask with micro market buys.
pub struct PriceKeeperWorker;

#[async_trait]
impl StrategyWorker for PriceKeeperWorker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PriceKeeper
    }

    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError> {
        let StrategySpec::PriceKeeper { params, runtime } = &bot.strategy else {
            return Err(EngineError::WrongStrategy(bot.id, self.kind()));
        };

        let snapshot = match ctx.market.snapshot(&bot.symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if ctx.warnings.should_emit(&format!("keeper-snap:{}", bot.symbol)) {
                    tracing::warn!(symbol = %bot.symbol, error = %e, "snapshot failed");
                }
                return Ok(Outcome::skipped("market data unavailable"));
            }
        };
        let Some(best_ask) = snapshot.best_ask else {
            return Ok(Outcome::skipped("no asks on the book"));
        };

        if !price_keeper::should_resync(snapshot.last_price, best_ask) {
            return Ok(Outcome::Noop);
        }

        let request = OrderRequest::market_quote(
            client_order_id("keeper", 0),
            &bot.symbol,
            OrderSide::Buy,
            params.order_amount,
        );
        match ctx.submit_order(bot, creds, &request).await {
            Ok(order_ref) => {
                let mut next_runtime = runtime.clone();
                next_runtime.execution_count += 1;
                next_runtime.last_executed_at = Some(Utc::now());
                next_runtime.last_market_price = Some(snapshot.last_price);
                next_runtime.last_ask_price = Some(best_ask);
                let runtime_json = serde_json::to_value(&next_runtime)
                    .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
                ctx.save_runtime(bot, &runtime_json, None).await;
                Ok(Outcome::Submitted {
                    orders: vec![order_ref],
                })
            }
            Err(reason) => Ok(Outcome::failed(reason, None)),
        }
    }
}
