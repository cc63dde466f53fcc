use crate::context::{base_asset, EngineContext};
use crate::error::EngineError;
use crate::frame::StrategyWorker;
use crate::workers::INTER_BATCH_PAUSE;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    BotSpec, Credentials, OrderRef, OrderRequest, OrderSide, Outcome, StrategyKind, StrategySpec,
};
use events::BotEvent;
use exchange_client::client_order_id;
use rust_decimal::Decimal;
use strategies::sell_liquidity::{self, OwnOrder};

/// Orders per placement batch, per venue rate expectations.
const BATCH_SIZE: usize = 10;

/// Enforces the exchange's sell-side depth, gap and count requirements,
/// planning and executing maintenance orders when they slip.
pub struct SellLiquidityWorker;

#[async_trait]
impl StrategyWorker for SellLiquidityWorker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SellLiquidity
    }

    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError> {
        let StrategySpec::SellLiquidity { params, runtime } = &bot.strategy else {
            return Err(EngineError::WrongStrategy(bot.id, self.kind()));
        };

        let snapshot = match ctx.market.snapshot(&bot.symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if ctx.warnings.should_emit(&format!("liq-snap:{}", bot.symbol)) {
                    tracing::warn!(symbol = %bot.symbol, error = %e, "snapshot failed");
                }
                return Ok(Outcome::skipped("market data unavailable"));
            }
        };

        let now = Utc::now();
        let metrics = sell_liquidity::analyze(&snapshot.asks, params, now);
        tracing::debug!(
            bot_id = %bot.id,
            depth_2pct = %metrics.sell_depth_2pct,
            depth_top20 = %metrics.sell_depth_top20,
            order_count = metrics.sell_order_count,
            all_ok = metrics.all_ok,
            "liquidity analyzed"
        );

        let mut next_runtime = runtime.clone();
        next_runtime.last_metrics = Some(metrics.clone());
        next_runtime.liquidity_ok = metrics.all_ok;
        next_runtime.last_maintained_at = Some(now);

        if metrics.all_ok || !params.auto_manage {
            let runtime_json = serde_json::to_value(&next_runtime)
                .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
            ctx.save_runtime(bot, &runtime_json, None).await;
            return Ok(Outcome::Noop);
        }

        // Our resting asks and the base balance bound the plan.
        let rules = match ctx.market.rules(&bot.symbol).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(bot_id = %bot.id, error = %e, "symbol rules unavailable");
                return Ok(Outcome::skipped("symbol metadata unavailable"));
            }
        };
        let own_orders = match ctx
            .exchange
            .open_orders(creds, &bot.symbol, Some(OrderSide::Sell))
            .await
        {
            Ok(open) => open
                .iter()
                .filter_map(|order| {
                    order.order_id().ok().map(|order_id| OwnOrder {
                        order_id,
                        price: order.price,
                        qty: order.orig_qty,
                    })
                })
                .collect::<Vec<_>>(),
            Err(e) => {
                tracing::warn!(bot_id = %bot.id, error = %e, "open-orders fetch failed");
                return Ok(Outcome::skipped("open orders unavailable"));
            }
        };
        let base = base_asset(&bot.symbol);
        let available_base = match ctx.exchange.balances(creds, &[base]).await {
            Ok(balances) => balances
                .iter()
                .find(|b| b.currency.eq_ignore_ascii_case(base))
                .map(|b| b.available)
                .unwrap_or(Decimal::ZERO),
            Err(e) => {
                tracing::warn!(bot_id = %bot.id, error = %e, "balance fetch failed");
                return Ok(Outcome::skipped("balance unavailable"));
            }
        };

        let plan = sell_liquidity::plan(
            &snapshot.asks,
            snapshot.mid_price,
            &own_orders,
            available_base,
            &rules,
            params,
            &metrics,
        );
        if plan.truncated {
            tracing::warn!(
                bot_id = %bot.id,
                available_base = %available_base,
                "liquidity plan truncated to available balance"
            );
        }

        // Cancels first: free the balance the new ladder needs.
        let mut cancelled = 0u32;
        let to_cancel: Vec<String> = plan
            .stale_cancels
            .iter()
            .chain(plan.reposition_cancels.iter())
            .cloned()
            .collect();
        if !to_cancel.is_empty() {
            match ctx.exchange.cancel_batch(creds, &bot.symbol, &to_cancel).await {
                Ok(result) => cancelled = result.cancelled.len() as u32,
                Err(e) => {
                    tracing::warn!(bot_id = %bot.id, error = %e, "cancel batch failed");
                }
            }
        }

        if plan.orders.is_empty() {
            next_runtime.budget_required = plan.budget_required;
            if cancelled > 0 {
                next_runtime.total_maintenance += 1;
            }
            let runtime_json = serde_json::to_value(&next_runtime)
                .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
            ctx.save_runtime(bot, &runtime_json, None).await;
            return Ok(if cancelled > 0 {
                Outcome::Submitted { orders: vec![] }
            } else {
                Outcome::skipped("no viable maintenance orders")
            });
        }

        // Placement in batches of 10 with a pause between batches.
        let mut placed: Vec<OrderRef> = Vec::new();
        let mut failed = 0u32;
        for (batch_idx, chunk) in plan.orders.chunks(BATCH_SIZE).enumerate() {
            let items: Vec<OrderRequest> = chunk
                .iter()
                .enumerate()
                .map(|(i, order)| {
                    OrderRequest::limit(
                        client_order_id("liq", batch_idx * BATCH_SIZE + i),
                        &bot.symbol,
                        OrderSide::Sell,
                        order.qty,
                        order.price,
                    )
                })
                .collect();
            let batch_id = client_order_id("liqbatch", batch_idx);
            match ctx.submit_batch(bot, creds, &batch_id, &items).await {
                Ok(outcome) => {
                    failed += outcome.failed.len() as u32;
                    placed.extend(outcome.placed);
                }
                Err(e) => {
                    tracing::warn!(bot_id = %bot.id, error = %e, "liquidity batch failed outright");
                    failed += items.len() as u32;
                }
            }
            if (batch_idx + 1) * BATCH_SIZE < plan.orders.len() {
                tokio::time::sleep(INTER_BATCH_PAUSE).await;
            }
        }

        next_runtime.budget_required = plan.budget_required;
        next_runtime.total_orders_placed += placed.len() as u64;
        next_runtime.total_maintenance += 1;
        let runtime_json = serde_json::to_value(&next_runtime)
            .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
        ctx.save_runtime(bot, &runtime_json, None).await;

        ctx.emit(BotEvent::LiquidityAdjusted {
            bot_id: bot.id,
            symbol: bot.symbol.clone(),
            placed: placed.len() as u32,
            cancelled,
            budget_required: plan.budget_required,
        });

        Ok(match (placed.is_empty(), failed) {
            (false, 0) => Outcome::Submitted { orders: placed },
            (false, failed) => Outcome::Partial { orders: placed, failed },
            (true, _) => Outcome::failed("no maintenance orders were accepted", None),
        })
    }
}
