use crate::context::{quote_asset, EngineContext};
use crate::error::EngineError;
use crate::frame::StrategyWorker;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    BotSpec, Credentials, OrderRequest, OrderSide, Outcome, PriceReference, StrategyKind,
    StrategySpec,
};
use events::BotEvent;
use exchange_client::client_order_id;
use rust_decimal::Decimal;
use strategies::stabilizer::{self, StabilizerDecision};

/// Pushes the market toward a target price with small market buys, capped
/// per operator-reset window.
pub struct StabilizerWorker;

#[async_trait]
impl StrategyWorker for StabilizerWorker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Stabilizer
    }

    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError> {
        let StrategySpec::Stabilizer { params, runtime } = &bot.strategy else {
            return Err(EngineError::WrongStrategy(bot.id, self.kind()));
        };

        let snapshot = match ctx.market.snapshot(&bot.symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if ctx.warnings.should_emit(&format!("stab-snap:{}", bot.symbol)) {
                    tracing::warn!(symbol = %bot.symbol, error = %e, "snapshot failed");
                }
                return Ok(Outcome::skipped("market data unavailable"));
            }
        };
        let reference = match params.reference {
            PriceReference::LastTrade => snapshot.last_price,
            PriceReference::Mid => snapshot.mid_price,
            PriceReference::BestAsk => match snapshot.best_ask {
                Some(ask) => ask,
                None => return Ok(Outcome::skipped("no asks on the book")),
            },
        };

        let quote = quote_asset(&bot.symbol);
        let available = match ctx.exchange.balances(creds, &[quote]).await {
            Ok(balances) => balances
                .iter()
                .find(|b| b.currency.eq_ignore_ascii_case(quote))
                .map(|b| b.available)
                .unwrap_or(Decimal::ZERO),
            Err(e) => {
                tracing::warn!(bot_id = %bot.id, error = %e, "balance fetch failed");
                return Ok(Outcome::skipped("balance unavailable"));
            }
        };

        let buy_quote = match stabilizer::decide(params, runtime, reference, available) {
            StabilizerDecision::OnTarget => return Ok(Outcome::Noop),
            StabilizerDecision::CapExhausted => {
                return Ok(Outcome::skipped("window spend cap reached"));
            }
            StabilizerDecision::NoBalance => {
                return Ok(Outcome::skipped("insufficient quote balance"));
            }
            StabilizerDecision::Buy { quote } => quote,
        };

        let request = OrderRequest::market_quote(
            client_order_id("stab", 0),
            &bot.symbol,
            OrderSide::Buy,
            buy_quote,
        );
        match ctx.submit_order(bot, creds, &request).await {
            Ok(order_ref) => {
                // Where the market settled after the push, best effort.
                let final_price = ctx.exchange.ticker_price(&bot.symbol).await.ok();
                let next_runtime = stabilizer::settle_buy(
                    params,
                    runtime,
                    buy_quote,
                    reference,
                    final_price,
                    Utc::now(),
                );
                if next_runtime.threshold_exceeded && !runtime.threshold_exceeded {
                    ctx.emit(BotEvent::BudgetExhausted {
                        strategy: self.kind(),
                        bot_id: bot.id,
                        spent: next_runtime.window_spent,
                        cap: params.max_buy_amount,
                    });
                }
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
