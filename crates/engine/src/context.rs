use crate::locks::InFlightLocks;
use crate::ring::LogRings;
use crate::warnings::Warnings;
use alerter::Notifier;
use core_types::{
    ActivityLog, BotSpec, Credentials, LogLevel, OrderRef, OrderRequest, TradeRecord,
};
use database::{BotRepository, CredentialStore};
use events::BotEvent;
use exchange_client::responses::BatchOutcome;
use exchange_client::ExchangeApi;
use market_data::SnapshotProvider;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything a strategy engine needs to do its work, shared across all
/// engines and work units.
pub struct EngineContext {
    pub repo: BotRepository,
    pub credentials: CredentialStore,
    pub exchange: Arc<dyn ExchangeApi>,
    pub market: Arc<SnapshotProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub events: broadcast::Sender<BotEvent>,
    pub locks: InFlightLocks,
    pub rings: LogRings,
    pub warnings: Warnings,
}

impl EngineContext {
    /// Broadcast an event; a lagging or absent alerter must never stall work.
    pub fn emit(&self, event: BotEvent) {
        let _ = self.events.send(event);
    }

    /// Pushes a log entry to the strategy's ring and, when `durable`, to the
    /// persisted audit trail. The ring is advisory; the table is the source
    /// of truth.
    pub async fn log(&self, entry: ActivityLog, durable: bool) {
        self.rings.ring(entry.strategy).push(entry.clone());
        if durable {
            if let Err(e) = self.repo.insert_log(&entry).await {
                tracing::error!(error = %e, strategy = %entry.strategy, "failed to persist activity log");
            }
        }
    }

    /// Places a single order and records the trade either way.
    ///
    /// Returns the accepted order ref, or the venue/transport error message
    /// for the caller's outcome classification.
    pub async fn submit_order(
        &self,
        bot: &BotSpec,
        creds: &Credentials,
        request: &OrderRequest,
    ) -> Result<OrderRef, String> {
        match self.exchange.place_order(creds, request).await {
            Ok(order_ref) => {
                let trade = TradeRecord::placed(
                    bot.id,
                    bot.user_id,
                    bot.kind(),
                    request,
                    &order_ref,
                    None,
                );
                self.persist_trade(bot, &trade, std::slice::from_ref(&order_ref))
                    .await;
                Ok(order_ref)
            }
            Err(e) => {
                let message = e.to_string();
                let trade = TradeRecord::failed(
                    bot.id,
                    bot.user_id,
                    bot.kind(),
                    request,
                    message.clone(),
                    None,
                );
                self.persist_trade(bot, &trade, &[]).await;
                Err(message)
            }
        }
    }

    /// Places a batch and records one trade per item, success or failure.
    pub async fn submit_batch(
        &self,
        bot: &BotSpec,
        creds: &Credentials,
        client_batch_id: &str,
        items: &[OrderRequest],
    ) -> Result<BatchOutcome, String> {
        let outcome = self
            .exchange
            .place_batch(creds, client_batch_id, items)
            .await
            .map_err(|e| e.to_string())?;

        for order_ref in &outcome.placed {
            if let Some(request) = items
                .iter()
                .find(|i| i.client_order_id == order_ref.client_order_id)
            {
                let trade = TradeRecord::placed(
                    bot.id,
                    bot.user_id,
                    bot.kind(),
                    request,
                    order_ref,
                    None,
                );
                self.persist_trade(bot, &trade, std::slice::from_ref(order_ref))
                    .await;
            }
        }
        for failure in &outcome.failed {
            if let Some(request) = items
                .iter()
                .find(|i| i.client_order_id == failure.client_order_id)
            {
                let trade = TradeRecord::failed(
                    bot.id,
                    bot.user_id,
                    bot.kind(),
                    request,
                    format!("{}: {}", failure.code, failure.message),
                    None,
                );
                self.persist_trade(bot, &trade, &[]).await;
            }
        }
        Ok(outcome)
    }

    /// Inserts a trade record. An insert failure after orders were placed is
    /// the single most dangerous state the system can be in, so it is logged
    /// loudly and escalated to the operator.
    async fn persist_trade(&self, bot: &BotSpec, trade: &TradeRecord, placed: &[OrderRef]) {
        if let Err(e) = self.repo.insert_trade(trade).await {
            if placed.is_empty() {
                tracing::error!(bot_id = %bot.id, error = %e, "failed to persist trade record");
                return;
            }
            let venue_order_ids: Vec<String> =
                placed.iter().map(|o| o.venue_order_id.clone()).collect();
            tracing::error!(
                bot_id = %bot.id,
                ?venue_order_ids,
                error = %e,
                "ORDERS PLACED WITHOUT TRADE RECORDS"
            );
            self.log(
                ActivityLog::new(
                    Some(bot.id),
                    bot.kind(),
                    LogLevel::Error,
                    "orders placed without trade records",
                    serde_json::json!({
                        "venue_order_ids": venue_order_ids,
                        "error": e.to_string(),
                    }),
                ),
                true,
            )
            .await;
            self.emit(BotEvent::UnrecordedOrders {
                strategy: bot.kind(),
                bot_id: bot.id,
                venue_order_ids,
                error: e.to_string(),
            });
        }
    }

    /// Persists the runtime half of a bot's strategy state.
    pub async fn save_runtime(
        &self,
        bot: &BotSpec,
        runtime: &JsonValue,
        next_run_at: Option<chrono::DateTime<chrono::Utc>>,
    ) {
        if let Err(e) = self.repo.save_runtime(bot.id, runtime, next_run_at).await {
            tracing::error!(bot_id = %bot.id, error = %e, "failed to persist bot runtime");
        }
    }
}

/// The quote asset of a symbol like "GCBUSDT". The venues list pairs against
/// a small set of quote currencies; USDT is the default for this market.
pub fn quote_asset(symbol: &str) -> &str {
    for quote in ["USDT", "USDC", "BTC", "ETH"] {
        if symbol.len() > quote.len() && symbol.ends_with(quote) {
            return &symbol[symbol.len() - quote.len()..];
        }
    }
    "USDT"
}

/// The base asset of a symbol like "GCBUSDT".
pub fn base_asset(symbol: &str) -> &str {
    let quote = quote_asset(symbol);
    symbol.strip_suffix(quote).unwrap_or(symbol)
}

/// The combined admission predicate re-derived at the start of every work
/// unit: user opted in and credentialed, bot active and running.
pub fn admitted(user_enabled: bool, has_credentials: bool, bot: &BotSpec) -> bool {
    user_enabled && has_credentials && bot.is_active && bot.is_running
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::StrategySpec;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn symbol_split_into_base_and_quote() {
        assert_eq!(base_asset("GCBUSDT"), "GCB");
        assert_eq!(quote_asset("GCBUSDT"), "USDT");
        assert_eq!(quote_asset("GCBBTC"), "BTC");
    }

    fn bot(is_active: bool, is_running: bool) -> BotSpec {
        BotSpec {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "keeper".to_string(),
            symbol: "GCBUSDT".to_string(),
            is_active,
            is_running,
            next_run_at: None,
            last_checked_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            strategy: StrategySpec::PriceKeeper {
                params: core_types::PriceKeeperParams {
                    order_amount: dec!(0.1),
                    cooldown_seconds: 3,
                },
                runtime: Default::default(),
            },
        }
    }

    #[test]
    fn admission_requires_every_predicate() {
        assert!(admitted(true, true, &bot(true, true)));
        assert!(!admitted(false, true, &bot(true, true)));
        assert!(!admitted(true, false, &bot(true, true)));
        assert!(!admitted(true, true, &bot(false, true)));
        assert!(!admitted(true, true, &bot(true, false)));
    }
}
