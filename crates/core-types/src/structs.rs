use crate::enums::{LogLevel, OrderSide, OrderType, StrategyKind, TimeInForce, TradeStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// An end user who owns exchange credentials and bots.
///
/// Credentials are carried separately (see the database crate's credential
/// store) so that this struct can travel through logs and status payloads
/// without ever exposing the API secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Global opt-in: no bot owned by this user may execute while false.
    pub bot_enabled: bool,
    /// Whether both API key and secret are stored for this user.
    pub has_credentials: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The admission half derived from the user: opted in and credentialed.
    pub fn admits_bots(&self) -> bool {
        self.bot_enabled && self.has_credentials
    }
}

/// One user's exchange API key pair. The secret is deliberately excluded
/// from `Debug` so the struct can pass through structured logs without
/// leaking.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// A single price level of an order book snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, qty: Decimal) -> Self {
        Self { price, qty }
    }

    /// Quote value of this level.
    pub fn notional(&self) -> Decimal {
        self.price * self.qty
    }
}

/// An ephemeral view of one symbol's market microstructure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Midpoint of best bid/ask when both sides are present, else last trade.
    pub mid_price: Decimal,
    pub last_price: Decimal,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub fetched_at: DateTime<Utc>,
    /// `server − local` clock offset in milliseconds at fetch time.
    pub server_offset_ms: i64,
}

impl MarketSnapshot {
    /// Bid/ask spread as a percentage of the bid, when both sides exist.
    pub fn spread_percent(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) if !bid.is_zero() => {
                Some((ask - bid) / bid * Decimal::ONE_HUNDRED)
            }
            _ => None,
        }
    }
}

/// Price and quantity formatting rules for one trading symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRules {
    pub symbol: String,
    pub price_precision: u32,
    pub quantity_precision: u32,
    /// Venue-wide minimum base quantity per order.
    pub min_quantity: Decimal,
}

impl SymbolRules {
    pub fn round_price(&self, price: Decimal) -> Decimal {
        price.round_dp(self.price_precision)
    }

    /// Quantities round down so an order can never exceed the intended size.
    pub fn round_quantity(&self, qty: Decimal) -> Decimal {
        qty.round_dp_with_strategy(
            self.quantity_precision,
            rust_decimal::RoundingStrategy::ToZero,
        )
    }
}

/// A fully-specified order as handed to the exchange client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Caller-supplied idempotency id, format `<purpose>_<unixMs>_<idx>`.
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub time_in_force: Option<TimeInForce>,
    /// Base quantity. Exactly one of `quantity`/`quote_amount` is set for
    /// market orders; limit orders always carry `quantity` and `price`.
    pub quantity: Option<Decimal>,
    /// Quote amount, for market orders sized in quote currency.
    pub quote_amount: Option<Decimal>,
    pub price: Option<Decimal>,
}

impl OrderRequest {
    pub fn market_base(client_order_id: String, symbol: &str, side: OrderSide, qty: Decimal) -> Self {
        Self {
            client_order_id,
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            time_in_force: None,
            quantity: Some(qty),
            quote_amount: None,
            price: None,
        }
    }

    pub fn market_quote(
        client_order_id: String,
        symbol: &str,
        side: OrderSide,
        quote: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            time_in_force: None,
            quantity: None,
            quote_amount: Some(quote),
            price: None,
        }
    }

    pub fn limit(
        client_order_id: String,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Limit,
            time_in_force: Some(TimeInForce::Gtc),
            quantity: Some(qty),
            quote_amount: None,
            price: Some(price),
        }
    }
}

/// A reference to an order the venue accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRef {
    pub venue_order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Option<Decimal>,
    pub quantity: Option<Decimal>,
}

/// Append-only record of one order submission attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub user_id: Uuid,
    pub strategy: StrategyKind,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub requested_qty: Option<Decimal>,
    pub requested_quote: Option<Decimal>,
    pub executed_qty: Option<Decimal>,
    pub price: Option<Decimal>,
    pub venue_order_id: Option<String>,
    pub status: TradeStatus,
    pub error: Option<String>,
    /// Raw venue response, kept for post-mortems.
    pub raw_response: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    /// A record for an order the venue accepted.
    pub fn placed(
        bot_id: Uuid,
        user_id: Uuid,
        strategy: StrategyKind,
        request: &OrderRequest,
        order_ref: &OrderRef,
        raw: Option<JsonValue>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot_id,
            user_id,
            strategy,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            requested_qty: request.quantity,
            requested_quote: request.quote_amount,
            executed_qty: None,
            price: request.price.or(order_ref.price),
            venue_order_id: Some(order_ref.venue_order_id.clone()),
            status: TradeStatus::Placed,
            error: None,
            raw_response: raw,
            created_at: Utc::now(),
        }
    }

    /// A record for an order the venue rejected or that never reached it.
    pub fn failed(
        bot_id: Uuid,
        user_id: Uuid,
        strategy: StrategyKind,
        request: &OrderRequest,
        error: String,
        raw: Option<JsonValue>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot_id,
            user_id,
            strategy,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            requested_qty: request.quantity,
            requested_quote: request.quote_amount,
            executed_qty: None,
            price: request.price,
            venue_order_id: None,
            status: TradeStatus::Failed,
            error: Some(error),
            raw_response: raw,
            created_at: Utc::now(),
        }
    }
}

/// One activity log entry. `bot_id` is `None` for supervisor-wide events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub bot_id: Option<Uuid>,
    pub strategy: StrategyKind,
    pub level: LogLevel,
    pub message: String,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(
        bot_id: Option<Uuid>,
        strategy: StrategyKind,
        level: LogLevel,
        message: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot_id,
            strategy,
            level,
            message: message.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Classified result of one work unit (one strategy pass over one bot).
///
/// Only `Submitted` and `Partial` are allowed to mutate monetary counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Conditions not met; nothing to do.
    Noop,
    /// A gate held the bot back (cooldown, credentials, balance).
    Skipped { reason: String },
    /// All intended orders were accepted by the venue.
    Submitted { orders: Vec<OrderRef> },
    /// Some legs failed.
    Partial { orders: Vec<OrderRef>, failed: u32 },
    /// No orders were placed.
    Failed {
        reason: String,
        raw: Option<JsonValue>,
    },
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped { reason: reason.into() }
    }

    pub fn failed(reason: impl Into<String>, raw: Option<JsonValue>) -> Self {
        Outcome::Failed { reason: reason.into(), raw }
    }

    /// Log severity this outcome maps to.
    pub fn level(&self) -> LogLevel {
        match self {
            Outcome::Noop => LogLevel::Info,
            Outcome::Skipped { .. } => LogLevel::Info,
            Outcome::Submitted { .. } => LogLevel::Trade,
            Outcome::Partial { .. } => LogLevel::Warn,
            Outcome::Failed { .. } => LogLevel::Error,
        }
    }

    /// Whether monetary counters may be advanced for this outcome.
    pub fn moved_money(&self) -> bool {
        matches!(self, Outcome::Submitted { .. } | Outcome::Partial { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Noop => "noop",
            Outcome::Skipped { .. } => "skipped",
            Outcome::Submitted { .. } => "submitted",
            Outcome::Partial { .. } => "partial",
            Outcome::Failed { .. } => "failed",
        }
    }
}
