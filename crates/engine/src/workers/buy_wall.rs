use crate::context::EngineContext;
use crate::error::EngineError;
use crate::frame::StrategyWorker;
use async_trait::async_trait;
use core_types::{
    BotSpec, Credentials, OrderRequest, OrderSide, Outcome, PlacedRung, StrategyKind,
    StrategySpec,
};
use exchange_client::client_order_id;
use rust_decimal::Decimal;
use std::collections::HashSet;
use strategies::buy_wall;

/// Maintains a static descending ladder of limit buys, reposting rungs whose
/// orders disappear from the book.
pub struct BuyWallWorker;

#[async_trait]
impl StrategyWorker for BuyWallWorker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BuyWall
    }

    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError> {
        let StrategySpec::BuyWall { params, runtime } = &bot.strategy else {
            return Err(EngineError::WrongStrategy(bot.id, self.kind()));
        };

        if let Err(e) = buy_wall::validate(params) {
            return Ok(Outcome::skipped(e.to_string()));
        }

        let mut next_runtime = runtime.clone();

        // First activation: post the whole ladder.
        if !runtime.orders_placed {
            let ladder = buy_wall::initial_orders(params);
            if ladder.is_empty() {
                return Ok(Outcome::skipped("wall has no usable rungs"));
            }
            let (placed, failed_prices, refs) =
                place_rungs(ctx, bot, creds, "wall", &ladder).await?;

            next_runtime.orders_placed = true;
            next_runtime.placed = placed;
            next_runtime.failed = failed_prices;
            let runtime_json = serde_json::to_value(&next_runtime)
                .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
            ctx.save_runtime(bot, &runtime_json, None).await;

            let failed = next_runtime.failed.len() as u32;
            return Ok(match (refs.is_empty(), failed) {
                (false, 0) => Outcome::Submitted { orders: refs },
                (false, failed) => Outcome::Partial { orders: refs, failed },
                (true, _) => Outcome::failed("no wall orders were accepted", None),
            });
        }

        // Maintenance: anything missing from open orders was filled or
        // cancelled externally and gets reposted, together with rungs that
        // failed last round.
        let open = match ctx
            .exchange
            .open_orders(creds, &bot.symbol, Some(OrderSide::Buy))
            .await
        {
            Ok(open) => open,
            Err(e) => {
                if ctx.warnings.should_emit(&format!("wall-open:{}", bot.id)) {
                    tracing::warn!(bot_id = %bot.id, error = %e, "open-orders fetch failed");
                }
                return Ok(Outcome::skipped("open orders unavailable"));
            }
        };
        let open_ids: HashSet<String> = open
            .iter()
            .filter_map(|order| order.order_id().ok())
            .collect();

        let missing = buy_wall::rungs_to_refill(&runtime.placed, &open_ids);
        let retries = buy_wall::rungs_to_retry(params, &runtime.failed);
        if missing.is_empty() && retries.is_empty() {
            return Ok(Outcome::Noop);
        }

        let mut to_post: Vec<buy_wall::RungOrder> = missing
            .iter()
            .map(|rung| buy_wall::RungOrder {
                price: rung.price,
                quote_amount: rung.quote_amount,
                qty: rung.quote_amount / rung.price,
            })
            .collect();
        let refills = to_post.len() as u64;
        to_post.extend(retries);

        let (newly_placed, failed_prices, refs) =
            place_rungs(ctx, bot, creds, "refill", &to_post).await?;

        // Survivors keep their entries; reposted rungs get their new ids.
        let reposted_prices: HashSet<Decimal> =
            to_post.iter().map(|rung| rung.price).collect();
        next_runtime
            .placed
            .retain(|rung| !reposted_prices.contains(&rung.price));
        next_runtime.placed.extend(newly_placed);
        next_runtime.failed = failed_prices;
        next_runtime.total_refills += refills;

        let runtime_json = serde_json::to_value(&next_runtime)
            .map_err(|e| EngineError::Document(core_types::CoreError::Payload(e)))?;
        ctx.save_runtime(bot, &runtime_json, None).await;

        let failed = next_runtime.failed.len() as u32;
        Ok(match (refs.is_empty(), failed) {
            (false, 0) => Outcome::Submitted { orders: refs },
            (false, failed) => Outcome::Partial { orders: refs, failed },
            (true, _) => Outcome::failed("no refill orders were accepted", None),
        })
    }
}

/// Posts a set of rungs as one batch and reconciles the per-item results
/// back onto rung prices.
async fn place_rungs(
    ctx: &EngineContext,
    bot: &BotSpec,
    creds: &Credentials,
    purpose: &str,
    rungs: &[buy_wall::RungOrder],
) -> Result<(Vec<PlacedRung>, Vec<Decimal>, Vec<core_types::OrderRef>), EngineError> {
    let items: Vec<OrderRequest> = rungs
        .iter()
        .enumerate()
        .map(|(idx, rung)| {
            OrderRequest::limit(
                client_order_id(purpose, idx),
                &bot.symbol,
                OrderSide::Buy,
                rung.qty,
                rung.price,
            )
        })
        .collect();

    let batch_id = client_order_id(purpose, items.len());
    let outcome = match ctx.submit_batch(bot, creds, &batch_id, &items).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(bot_id = %bot.id, error = %e, "wall batch failed outright");
            return Ok((Vec::new(), rungs.iter().map(|r| r.price).collect(), Vec::new()));
        }
    };

    let mut placed = Vec::new();
    for order_ref in &outcome.placed {
        if let Some(price) = order_ref.price {
            if let Some(rung) = rungs.iter().find(|r| r.price == price) {
                placed.push(PlacedRung {
                    price: rung.price,
                    quote_amount: rung.quote_amount,
                    venue_order_id: order_ref.venue_order_id.clone(),
                });
            }
        }
    }
    let failed_prices: Vec<Decimal> = outcome
        .failed
        .iter()
        .filter_map(|failure| {
            items
                .iter()
                .find(|i| i.client_order_id == failure.client_order_id)
                .and_then(|i| i.price)
        })
        .collect();

    Ok((placed, failed_prices, outcome.placed))
}
