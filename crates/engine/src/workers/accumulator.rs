use crate::context::EngineContext;
use crate::error::EngineError;
use crate::frame::StrategyWorker;
use crate::workers::INTER_ORDER_PAUSE;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    BotSpec, Credentials, OrderRequest, OrderSide, Outcome, StrategyKind, StrategySpec,
};
use exchange_client::client_order_id;
use strategies::accumulator;

/// Time-sliced budget DCA: each due hour takes half the slice from sellers
/// at market and rests the other half just under best ask.
pub struct AccumulatorWorker;

#[async_trait]
impl StrategyWorker for AccumulatorWorker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Accumulator
    }

    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError> {
        let StrategySpec::Accumulator { params, runtime } = &bot.strategy else {
            return Err(EngineError::WrongStrategy(bot.id, self.kind()));
        };
        if let Err(e) = accumulator::validate(params) {
            return Ok(Outcome::skipped(e.to_string()));
        }

        let snapshot = match ctx.market.snapshot(&bot.symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if ctx.warnings.should_emit(&format!("dca-snap:{}", bot.symbol)) {
                    tracing::warn!(symbol = %bot.symbol, error = %e, "snapshot failed");
                }
                return Ok(Outcome::skipped("market data unavailable"));
            }
        };
        let Some(best_ask) = snapshot.best_ask else {
            return Ok(Outcome::skipped("no asks on the book"));
        };

        let now = Utc::now();
        let Some(plan) = accumulator::plan_slice(params, runtime, best_ask, now) else {
            return Ok(Outcome::Noop);
        };

        // Leg 1: immediate market buy for half the slice.
        let market_request = OrderRequest::market_base(
            client_order_id("dca", 0),
            &bot.symbol,
            OrderSide::Buy,
            plan.market_qty,
        );
        let market_result = ctx.submit_order(bot, creds, &market_request).await;

        // Leg 2: resting limit buy, skipped entirely when the market leg
        // failed.
        let limit_result = match &market_result {
            Ok(_) => {
                tokio::time::sleep(INTER_ORDER_PAUSE).await;
                let limit_request = OrderRequest::limit(
                    client_order_id("dca", 1),
                    &bot.symbol,
                    OrderSide::Buy,
                    plan.limit_qty,
                    plan.limit_price,
                );
                Some(ctx.submit_order(bot, creds, &limit_request).await)
            }
            Err(_) => None,
        };

        let market_placed = market_result.is_ok();
        let limit_placed = matches!(limit_result, Some(Ok(_)));
        let next_runtime = accumulator::settle_slice(runtime, &plan, market_placed, limit_placed, now);

        let schedule_complete = next_runtime.executed_buys >= params.duration_hours;
        let runtime_json = serde_json::to_value(&next_runtime)
            .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
        ctx.save_runtime(bot, &runtime_json, next_runtime.next_buy_at)
            .await;

        if schedule_complete {
            // The schedule is done; stop admitting this bot. The guard in the
            // repository keeps this from ever reviving a deactivated bot.
            if let Err(e) = ctx.repo.set_running(bot.id, false).await {
                tracing::warn!(bot_id = %bot.id, error = %e, "failed to stop completed schedule");
            }
            tracing::info!(bot_id = %bot.id, "accumulation schedule complete");
        }

        Ok(match (market_result, limit_result) {
            (Ok(market_ref), Some(Ok(limit_ref))) => Outcome::Submitted {
                orders: vec![market_ref, limit_ref],
            },
            (Ok(market_ref), Some(Err(_))) => Outcome::Partial {
                orders: vec![market_ref],
                failed: 1,
            },
            (Ok(market_ref), None) => Outcome::Submitted {
                orders: vec![market_ref],
            },
            (Err(reason), _) => Outcome::failed(reason, None),
        })
    }
}
