use crate::enums::{OrderSide, OrderType, PriceOperator, PriceReference, StrategyKind};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A persisted bot document.
///
/// Intent fields (`is_active`, the params half of `strategy`) belong to the
/// frontend; runtime fields (`is_running`, `next_run_at`, `last_checked_at`,
/// the runtime half of `strategy`) belong to the engine. Writers touch only
/// their own fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSpec {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub symbol: String,
    /// User intent: whether the bot should run.
    pub is_active: bool,
    /// Engine admission: set once the engine has picked the bot up.
    pub is_running: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub strategy: StrategySpec,
}

impl BotSpec {
    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }
}

/// Typed parameter and runtime records, tagged by strategy kind.
///
/// Loading from storage validates the discriminator and both JSONB halves;
/// a document that fails to parse never reaches an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StrategySpec {
    Conditional {
        params: ConditionalParams,
        runtime: ConditionalRuntime,
    },
    Accumulator {
        params: AccumulatorParams,
        runtime: AccumulatorRuntime,
    },
    Stabilizer {
        params: StabilizerParams,
        runtime: StabilizerRuntime,
    },
    MarketMaker {
        params: MarketMakerParams,
        runtime: MarketMakerRuntime,
    },
    BuyWall {
        params: BuyWallParams,
        runtime: BuyWallRuntime,
    },
    PriceKeeper {
        params: PriceKeeperParams,
        runtime: PriceKeeperRuntime,
    },
    SellLiquidity {
        params: SellLiquidityParams,
        runtime: SellLiquidityRuntime,
    },
    PriceGap {
        params: PriceGapParams,
        runtime: PriceGapRuntime,
    },
}

impl StrategySpec {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategySpec::Conditional { .. } => StrategyKind::Conditional,
            StrategySpec::Accumulator { .. } => StrategyKind::Accumulator,
            StrategySpec::Stabilizer { .. } => StrategyKind::Stabilizer,
            StrategySpec::MarketMaker { .. } => StrategyKind::MarketMaker,
            StrategySpec::BuyWall { .. } => StrategyKind::BuyWall,
            StrategySpec::PriceKeeper { .. } => StrategyKind::PriceKeeper,
            StrategySpec::SellLiquidity { .. } => StrategyKind::SellLiquidity,
            StrategySpec::PriceGap { .. } => StrategyKind::PriceGap,
        }
    }

    /// Builds a typed spec from the storage discriminator and JSONB columns.
    pub fn from_parts(
        kind: &str,
        params: &JsonValue,
        runtime: &JsonValue,
    ) -> Result<Self, CoreError> {
        let kind = StrategyKind::parse(kind)
            .ok_or_else(|| CoreError::UnknownStrategy(kind.to_string()))?;
        let spec = match kind {
            StrategyKind::Conditional => StrategySpec::Conditional {
                params: parse_half(params)?,
                runtime: parse_half(runtime)?,
            },
            StrategyKind::Accumulator => StrategySpec::Accumulator {
                params: parse_half(params)?,
                runtime: parse_half(runtime)?,
            },
            StrategyKind::Stabilizer => StrategySpec::Stabilizer {
                params: parse_half(params)?,
                runtime: parse_half(runtime)?,
            },
            StrategyKind::MarketMaker => StrategySpec::MarketMaker {
                params: parse_half(params)?,
                runtime: parse_half(runtime)?,
            },
            StrategyKind::BuyWall => StrategySpec::BuyWall {
                params: parse_half(params)?,
                runtime: parse_half(runtime)?,
            },
            StrategyKind::PriceKeeper => StrategySpec::PriceKeeper {
                params: parse_half(params)?,
                runtime: parse_half(runtime)?,
            },
            StrategyKind::SellLiquidity => StrategySpec::SellLiquidity {
                params: parse_half(params)?,
                runtime: parse_half(runtime)?,
            },
            StrategyKind::PriceGap => StrategySpec::PriceGap {
                params: parse_half(params)?,
                runtime: parse_half(runtime)?,
            },
        };
        Ok(spec)
    }

    /// Serializes the runtime half for a field-scoped update.
    pub fn runtime_json(&self) -> Result<JsonValue, CoreError> {
        let value = match self {
            StrategySpec::Conditional { runtime, .. } => serde_json::to_value(runtime),
            StrategySpec::Accumulator { runtime, .. } => serde_json::to_value(runtime),
            StrategySpec::Stabilizer { runtime, .. } => serde_json::to_value(runtime),
            StrategySpec::MarketMaker { runtime, .. } => serde_json::to_value(runtime),
            StrategySpec::BuyWall { runtime, .. } => serde_json::to_value(runtime),
            StrategySpec::PriceKeeper { runtime, .. } => serde_json::to_value(runtime),
            StrategySpec::SellLiquidity { runtime, .. } => serde_json::to_value(runtime),
            StrategySpec::PriceGap { runtime, .. } => serde_json::to_value(runtime),
        };
        value.map_err(CoreError::Payload)
    }

    /// The generic cooldown this spec requests from the engine frame, if any.
    /// Conditional bots gate per condition and return `None` here.
    pub fn cooldown_seconds(&self) -> Option<u64> {
        match self {
            StrategySpec::Conditional { .. } => None,
            StrategySpec::Accumulator { .. } => None,
            StrategySpec::Stabilizer { params, .. } => Some(params.cooldown_seconds),
            StrategySpec::MarketMaker { .. } => None,
            StrategySpec::BuyWall { .. } => None,
            StrategySpec::PriceKeeper { params, .. } => Some(params.cooldown_seconds),
            StrategySpec::SellLiquidity { params, .. } => Some(params.check_interval_seconds),
            StrategySpec::PriceGap { params, .. } => Some(params.cooldown_seconds),
        }
    }

    /// Timestamp the frame's cooldown gate compares against.
    pub fn last_executed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            StrategySpec::Stabilizer { runtime, .. } => runtime.last_executed_at,
            StrategySpec::PriceKeeper { runtime, .. } => runtime.last_executed_at,
            StrategySpec::PriceGap { runtime, .. } => runtime.last_executed_at,
            StrategySpec::SellLiquidity { runtime, .. } => runtime.last_maintained_at,
            _ => None,
        }
    }
}

fn parse_half<T: serde::de::DeserializeOwned>(value: &JsonValue) -> Result<T, CoreError> {
    serde_json::from_value(value.clone()).map_err(CoreError::Payload)
}

// ---------------------------------------------------------------------------
// Conditional
// ---------------------------------------------------------------------------

/// A user-defined trigger: when `price OP threshold` holds and the condition's
/// cooldown has elapsed, the configured order is issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceCondition {
    pub id: String,
    pub symbol: String,
    pub operator: PriceOperator,
    pub threshold: Decimal,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Quote amount for market orders, base quantity for limit orders.
    pub size: Decimal,
    /// Limit price; required when `order_type` is `Limit`.
    pub limit_price: Option<Decimal>,
    pub cooldown_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalParams {
    pub conditions: Vec<PriceCondition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionalRuntime {
    #[serde(default)]
    pub trigger_count: u64,
    /// Per-condition last trigger time, keyed by condition id.
    #[serde(default)]
    pub last_triggered: BTreeMap<String, DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Scheduled accumulator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulatorParams {
    /// Total quote budget U spread over the whole schedule.
    pub total_budget: Decimal,
    /// Schedule length H in hours; the hourly slice is `U/H`.
    pub duration_hours: u32,
    /// Limit leg rests this far below best ask, in percent.
    pub bid_offset_percent: Decimal,
}

impl AccumulatorParams {
    pub fn hourly_slice(&self) -> Decimal {
        if self.duration_hours == 0 {
            return Decimal::ZERO;
        }
        self.total_budget / Decimal::from(self.duration_hours)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccumulatorRuntime {
    #[serde(default)]
    pub spent_usdt: Decimal,
    #[serde(default)]
    pub accumulated_base: Decimal,
    #[serde(default)]
    pub executed_buys: u32,
    #[serde(default)]
    pub next_buy_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Stabilizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizerParams {
    pub target_price: Decimal,
    /// Quote spend cap for the current window. Updating this value is the
    /// operator's reset: the frontend clears the latch and the window spend.
    pub max_buy_amount: Decimal,
    pub cooldown_seconds: u64,
    #[serde(default)]
    pub reference: PriceReference,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StabilizerRuntime {
    #[serde(default)]
    pub threshold_exceeded: bool,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub window_spent: Decimal,
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_market_price: Option<Decimal>,
    #[serde(default)]
    pub last_final_price: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Market-maker (oscillating size)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMakerParams {
    pub target_price: Decimal,
    pub spread_percent: Decimal,
    /// Order size at 100%; the oscillation floor is 40% of this.
    pub initial_order_size: Decimal,
    /// Size change per execution.
    pub increment_step: Decimal,
    pub price_floor: Option<Decimal>,
    pub price_ceiling: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketMakerRuntime {
    /// Zero means "not yet initialised"; the first tick adopts the initial size.
    #[serde(default)]
    pub current_order_size: Decimal,
    #[serde(default)]
    pub is_decreasing: bool,
    #[serde(default)]
    pub target_reached: bool,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Buy-wall
// ---------------------------------------------------------------------------

/// One `(price, quote amount)` entry of the wall ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallRung {
    pub price: Decimal,
    pub quote_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyWallParams {
    pub target_price: Decimal,
    /// Rungs sorted descending by price.
    pub rungs: Vec<WallRung>,
}

/// A rung that is currently resting on the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedRung {
    pub price: Decimal,
    pub quote_amount: Decimal,
    pub venue_order_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyWallRuntime {
    #[serde(default)]
    pub orders_placed: bool,
    #[serde(default)]
    pub placed: Vec<PlacedRung>,
    /// Rung prices whose placement failed on the last attempt.
    #[serde(default)]
    pub failed: Vec<Decimal>,
    #[serde(default)]
    pub total_refills: u64,
}

// ---------------------------------------------------------------------------
// Price-keeper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceKeeperParams {
    /// Quote amount of each micro market buy.
    pub order_amount: Decimal,
    pub cooldown_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceKeeperRuntime {
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_market_price: Option<Decimal>,
    #[serde(default)]
    pub last_ask_price: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Price-gap taker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceGapParams {
    /// Bid/ask spread percentage above which the gap is taken.
    pub gap_threshold_percent: Decimal,
    /// How far above best bid the gap order rests, in percent.
    pub step_percent: Decimal,
    /// Quote amount of each gap order.
    pub quote_amount: Decimal,
    pub cooldown_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceGapRuntime {
    #[serde(default)]
    pub gaps_taken: u64,
    #[serde(default)]
    pub last_gap_percent: Option<Decimal>,
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Sell-liquidity maintainer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellLiquidityParams {
    /// Multiplier applied to the exchange's base thresholds.
    pub scale_factor: Decimal,
    /// Required quote depth within +2% of best ask, before scaling.
    pub min_depth_2_percent: Decimal,
    /// Required quote depth across the top 20 asks, before scaling.
    pub min_depth_top20: Decimal,
    pub min_order_count: u32,
    /// Maximum tolerated gap between adjacent asks, in percent. Equality is
    /// compliant; only a strictly larger gap is a violation.
    pub max_order_gap_percent: Decimal,
    pub check_interval_seconds: u64,
    /// When false the analyzer still runs but the planner never acts.
    pub auto_manage: bool,
}

impl SellLiquidityParams {
    pub fn effective_depth_2pct(&self) -> Decimal {
        self.min_depth_2_percent * self.scale_factor
    }

    pub fn effective_depth_top20(&self) -> Decimal {
        self.min_depth_top20 * self.scale_factor
    }
}

/// The analyzer's verdict over one order book snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityMetrics {
    pub sell_depth_2pct: Decimal,
    pub sell_depth_top20: Decimal,
    pub sell_order_count: u32,
    pub gaps_ok: bool,
    pub depth_2pct_ok: bool,
    pub depth_top20_ok: bool,
    pub order_count_ok: bool,
    pub all_ok: bool,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellLiquidityRuntime {
    #[serde(default)]
    pub last_metrics: Option<LiquidityMetrics>,
    #[serde(default)]
    pub liquidity_ok: bool,
    /// Quote value the last plan wanted to add to the book.
    #[serde(default)]
    pub budget_required: Decimal,
    #[serde(default)]
    pub total_orders_placed: u64,
    #[serde(default)]
    pub total_maintenance: u64,
    #[serde(default)]
    pub last_maintained_at: Option<DateTime<Utc>>,
}
