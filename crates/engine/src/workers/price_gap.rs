use crate::context::EngineContext;
use crate::error::EngineError;
use crate::frame::StrategyWorker;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    BotSpec, Credentials, OrderRequest, OrderSide, Outcome, StrategyKind, StrategySpec,
};
use exchange_client::client_order_id;
use strategies::price_gap;

/// Takes abnormally wide bid/ask spreads with a limit buy inside the gap.
pub struct PriceGapWorker;

#[async_trait]
impl StrategyWorker for PriceGapWorker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PriceGap
    }

    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError> {
        let StrategySpec::PriceGap { params, runtime } = &bot.strategy else {
            return Err(EngineError::WrongStrategy(bot.id, self.kind()));
        };

        let snapshot = match ctx.market.snapshot(&bot.symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if ctx.warnings.should_emit(&format!("gap-snap:{}", bot.symbol)) {
                    tracing::warn!(symbol = %bot.symbol, error = %e, "snapshot failed");
                }
                return Ok(Outcome::skipped("market data unavailable"));
            }
        };

        let Some(take) = price_gap::decide(params, snapshot.best_bid, snapshot.best_ask) else {
            return Ok(Outcome::Noop);
        };

        let request = OrderRequest::limit(
            client_order_id("gap", 0),
            &bot.symbol,
            OrderSide::Buy,
            take.qty,
            take.limit_price,
        );
        match ctx.submit_order(bot, creds, &request).await {
            Ok(order_ref) => {
                let mut next_runtime = runtime.clone();
                next_runtime.gaps_taken += 1;
                next_runtime.last_gap_percent = Some(take.gap_percent);
                next_runtime.last_executed_at = Some(Utc::now());
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
