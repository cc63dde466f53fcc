use chrono::{DateTime, Utc};
use core_types::{OrderRef, StrategyKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The top-level event enum broadcast by the engines.
///
/// The `#[serde(tag = "type", content = "payload")]` attribute serializes each
/// variant into a clean tagged JSON object, the same shape the notification
/// service and any future streaming consumer expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BotEvent {
    /// The supervisor finished booting its engines.
    SupervisorStarted { engines: u32 },
    /// The supervisor completed a graceful shutdown.
    SupervisorStopped,
    /// One strategy engine started or stopped.
    EngineStarted { strategy: StrategyKind },
    EngineStopped { strategy: StrategyKind },
    /// A work unit submitted one or more orders.
    OrdersSubmitted {
        strategy: StrategyKind,
        bot_id: Uuid,
        symbol: String,
        orders: Vec<OrderRef>,
        timestamp: DateTime<Utc>,
    },
    /// A stabilizer hit its per-window spend cap.
    BudgetExhausted {
        strategy: StrategyKind,
        bot_id: Uuid,
        spent: Decimal,
        cap: Decimal,
    },
    /// The sell-side liquidity maintainer acted on the book.
    LiquidityAdjusted {
        bot_id: Uuid,
        symbol: String,
        placed: u32,
        cancelled: u32,
        budget_required: Decimal,
    },
    /// Orders were placed but the trade record could not be persisted.
    /// The single most dangerous state the system can be in.
    UnrecordedOrders {
        strategy: StrategyKind,
        bot_id: Uuid,
        venue_order_ids: Vec<String>,
        error: String,
    },
    /// A work unit failed outright.
    WorkFailed {
        strategy: StrategyKind,
        bot_id: Uuid,
        reason: String,
    },
}
