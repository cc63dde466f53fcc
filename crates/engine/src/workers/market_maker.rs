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
use strategies::market_maker::{self, MakerDecision};

/// Quotes a resting pair around the target price with an oscillating size.
pub struct MarketMakerWorker;

#[async_trait]
impl StrategyWorker for MarketMakerWorker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MarketMaker
    }

    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError> {
        let StrategySpec::MarketMaker { params, runtime } = &bot.strategy else {
            return Err(EngineError::WrongStrategy(bot.id, self.kind()));
        };
        if let Err(e) = market_maker::validate(params) {
            return Ok(Outcome::skipped(e.to_string()));
        }

        let snapshot = match ctx.market.snapshot(&bot.symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if ctx.warnings.should_emit(&format!("mm-snap:{}", bot.symbol)) {
                    tracing::warn!(symbol = %bot.symbol, error = %e, "snapshot failed");
                }
                return Ok(Outcome::skipped("market data unavailable"));
            }
        };

        let pair = match market_maker::decide(params, runtime, snapshot.last_price) {
            MakerDecision::TargetReached => {
                if !runtime.target_reached {
                    // Latch so the bound survives restarts of the engine;
                    // only a bot restart clears it.
                    let mut latched = runtime.clone();
                    latched.target_reached = true;
                    let runtime_json = serde_json::to_value(&latched)
                        .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
                    ctx.save_runtime(bot, &runtime_json, None).await;
                    tracing::info!(bot_id = %bot.id, price = %snapshot.last_price, "price bound crossed, quoting stopped");
                }
                return Ok(Outcome::skipped("price bound reached"));
            }
            MakerDecision::Quote(pair) => pair,
        };

        // Refresh the pair: clear this user's resting orders on the symbol
        // before quoting the new round.
        if let Err(e) = ctx.exchange.cancel_all_open(creds, &bot.symbol, None).await {
            tracing::warn!(bot_id = %bot.id, error = %e, "failed to clear resting orders");
            return Ok(Outcome::failed(format!("cancel failed: {}", e), None));
        }
        tokio::time::sleep(INTER_ORDER_PAUSE).await;

        let bid_request = OrderRequest::limit(
            client_order_id("mm", 0),
            &bot.symbol,
            OrderSide::Buy,
            pair.order_size,
            pair.bid_price,
        );
        let ask_request = OrderRequest::limit(
            client_order_id("mm", 1),
            &bot.symbol,
            OrderSide::Sell,
            pair.order_size,
            pair.ask_price,
        );

        let bid_result = ctx.submit_order(bot, creds, &bid_request).await;
        tokio::time::sleep(INTER_ORDER_PAUSE).await;
        let ask_result = ctx.submit_order(bot, creds, &ask_request).await;

        let next_runtime = market_maker::settle_round(params, runtime, pair.order_size, Utc::now());
        let runtime_json = serde_json::to_value(&next_runtime)
            .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
        ctx.save_runtime(bot, &runtime_json, None).await;

        Ok(match (bid_result, ask_result) {
            (Ok(bid), Ok(ask)) => Outcome::Submitted {
                orders: vec![bid, ask],
            },
            (Ok(one), Err(_)) | (Err(_), Ok(one)) => Outcome::Partial {
                orders: vec![one],
                failed: 1,
            },
            (Err(bid_err), Err(_)) => Outcome::failed(bid_err, None),
        })
    }
}
