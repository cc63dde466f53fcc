//! # Helmsman Alerter
//!
//! Operator notifications. The engines talk to an injected [`Notifier`] so
//! tests can substitute a recorder; the production implementation posts to
//! the Telegram Bot API. A long-running service translates broadcast
//! [`BotEvent`]s into messages.

use crate::error::AlerterError;
use async_trait::async_trait;
use configuration::TelegramConfig;
use events::BotEvent;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;

pub mod error;

/// The notification seam. Implementations must tolerate being called from
/// many work units concurrently.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), AlerterError>;
}

/// A notifier that drops everything, used when Telegram is not configured.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _message: &str) -> Result<(), AlerterError> {
        Ok(())
    }
}

/// A notifier that records messages in memory. Test double for the engines.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: std::sync::Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("recorder poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<(), AlerterError> {
        self.messages
            .lock()
            .expect("recorder poisoned")
            .push(message.to_string());
        Ok(())
    }
}

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Returns `None` if the token or chat_id is missing from the
    /// configuration, allowing the system to gracefully disable alerting.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("Telegram alerter is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramAlerter {
    async fn notify(&self, message: &str) -> Result<(), AlerterError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);

        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::Api(error_text));
        }

        Ok(())
    }
}

/// A long-running service that listens to the engine event channel and sends
/// notifications for the events an operator cares about.
pub async fn run_alerter_service(
    notifier: std::sync::Arc<dyn Notifier>,
    mut event_rx: broadcast::Receiver<BotEvent>,
) {
    tracing::info!("Alerter service started. Listening for engine events.");

    let _ = notifier.notify("✅ *Helmsman supervisor started*").await;

    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if let Some(message) = render_event(&event) {
                    if let Err(e) = notifier.notify(&message).await {
                        tracing::error!(error = ?e, "Failed to send notification.");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Alerter service lagged, skipped {} events.", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event channel closed. Alerter service shutting down.");
                break;
            }
        }
    }
}

/// Maps an event to an operator-facing message; `None` means no alert.
fn render_event(event: &BotEvent) -> Option<String> {
    match event {
        BotEvent::OrdersSubmitted {
            strategy,
            symbol,
            orders,
            ..
        } => Some(format!(
            "📈 *{}* submitted {} order(s) on `{}`",
            escape_markdown(strategy.as_str()),
            orders.len(),
            escape_markdown(symbol)
        )),
        BotEvent::BudgetExhausted {
            strategy,
            spent,
            cap,
            ..
        } => Some(format!(
            "⛔ *{}* hit its spend cap: `{}` of `{}`",
            escape_markdown(strategy.as_str()),
            spent,
            cap
        )),
        BotEvent::LiquidityAdjusted {
            symbol,
            placed,
            cancelled,
            ..
        } => Some(format!(
            "💧 liquidity adjusted on `{}`: {} placed, {} cancelled",
            escape_markdown(symbol),
            placed,
            cancelled
        )),
        BotEvent::UnrecordedOrders {
            strategy,
            venue_order_ids,
            error,
            ..
        } => Some(format!(
            "🚨 *CRITICAL* {} placed orders without trade records \\({}\\): {}",
            escape_markdown(strategy.as_str()),
            venue_order_ids.len(),
            escape_markdown(error)
        )),
        BotEvent::WorkFailed {
            strategy, reason, ..
        } => Some(format!(
            "⚠️ *{}* work unit failed: {}",
            escape_markdown(strategy.as_str()),
            escape_markdown(reason)
        )),
        BotEvent::SupervisorStopped => Some("🛑 *Helmsman supervisor stopped*".to_string()),
        _ => None,
    }
}

/// Escapes characters with special meaning in Telegram's MarkdownV2.
fn escape_markdown(text: &str) -> String {
    let special_chars = r"_*[]()~`>#+-=|{}.!";
    special_chars
        .chars()
        .fold(text.to_string(), |s, c| s.replace(c, &format!("\\{}", c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::StrategyKind;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn markdown_escape_covers_reserved_characters() {
        assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
    }

    #[test]
    fn engine_lifecycle_events_stay_silent() {
        assert!(render_event(&BotEvent::EngineStarted {
            strategy: StrategyKind::Stabilizer
        })
        .is_none());
        assert!(render_event(&BotEvent::SupervisorStarted { engines: 8 }).is_none());
    }

    #[tokio::test]
    async fn alerter_service_forwards_renderable_events() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (tx, rx) = broadcast::channel(8);
        let handle = tokio::spawn(run_alerter_service(
            notifier.clone() as Arc<dyn Notifier>,
            rx,
        ));

        tx.send(BotEvent::WorkFailed {
            strategy: StrategyKind::BuyWall,
            bot_id: Uuid::new_v4(),
            reason: "venue rejection".to_string(),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let messages = notifier.messages();
        // Startup banner plus the failure alert.
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("work unit failed"));
    }
}
