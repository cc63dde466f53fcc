use crate::context::EngineContext;
use crate::error::EngineError;
use crate::frame::StrategyWorker;
use crate::workers::INTER_ORDER_PAUSE;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    BotSpec, Credentials, OrderRequest, OrderSide, OrderType, Outcome, StrategyKind, StrategySpec,
};
use exchange_client::client_order_id;
use rust_decimal::Decimal;
use std::collections::HashMap;
use strategies::conditional;

/// Fires user-defined price conditions.
pub struct ConditionalWorker;

#[async_trait]
impl StrategyWorker for ConditionalWorker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Conditional
    }

    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError> {
        let StrategySpec::Conditional { params, runtime } = &bot.strategy else {
            return Err(EngineError::WrongStrategy(bot.id, self.kind()));
        };

        // One price per referenced symbol per tick.
        let mut prices: HashMap<String, Decimal> = HashMap::new();
        for symbol in conditional::symbols_in_use(params) {
            match ctx.market.snapshot(&symbol).await {
                Ok(snapshot) => {
                    prices.insert(symbol, snapshot.last_price);
                }
                Err(e) => {
                    if ctx.warnings.should_emit(&format!("cond-price:{symbol}")) {
                        tracing::warn!(%symbol, error = %e, "price fetch failed");
                    }
                    return Ok(Outcome::skipped("market data unavailable"));
                }
            }
        }

        let now = Utc::now();
        let fired = conditional::triggered_conditions(params, runtime, &prices, now);
        if fired.is_empty() {
            return Ok(Outcome::Noop);
        }

        let mut next_runtime = runtime.clone();
        let mut placed = Vec::new();
        let mut failed = 0u32;

        for (idx, condition) in fired.iter().enumerate() {
            let request = match condition.order_type {
                OrderType::Market => match condition.side {
                    // Market buys are sized in quote, market sells in base.
                    OrderSide::Buy => OrderRequest::market_quote(
                        client_order_id("cond", idx),
                        &condition.symbol,
                        condition.side,
                        condition.size,
                    ),
                    OrderSide::Sell => OrderRequest::market_base(
                        client_order_id("cond", idx),
                        &condition.symbol,
                        condition.side,
                        condition.size,
                    ),
                },
                OrderType::Limit => {
                    let Some(price) = condition.limit_price else {
                        tracing::warn!(condition = %condition.id, "limit condition without a price");
                        failed += 1;
                        continue;
                    };
                    OrderRequest::limit(
                        client_order_id("cond", idx),
                        &condition.symbol,
                        condition.side,
                        condition.size,
                        price,
                    )
                }
            };

            match ctx.submit_order(bot, creds, &request).await {
                Ok(order_ref) => {
                    placed.push(order_ref);
                    next_runtime.trigger_count += 1;
                    next_runtime.last_triggered.insert(condition.id.clone(), now);
                }
                Err(_) => failed += 1,
            }
            if idx + 1 < fired.len() {
                tokio::time::sleep(INTER_ORDER_PAUSE).await;
            }
        }

        let runtime_json = serde_json::to_value(&next_runtime)
            .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
        ctx.save_runtime(bot, &runtime_json, None).await;

        Ok(match (placed.is_empty(), failed) {
            (false, 0) => Outcome::Submitted { orders: placed },
            (false, failed) => Outcome::Partial { orders: placed, failed },
            (true, _) => Outcome::failed("all triggered conditions failed to place", None),
        })
    }
}
