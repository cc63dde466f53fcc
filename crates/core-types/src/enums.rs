use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;

/// Identifies which strategy engine a bot document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Conditional,
    Accumulator,
    Stabilizer,
    MarketMaker,
    BuyWall,
    PriceKeeper,
    SellLiquidity,
    PriceGap,
}

impl StrategyKind {
    /// All strategy kinds in supervisor boot order.
    pub const ALL: [StrategyKind; 8] = [
        StrategyKind::Conditional,
        StrategyKind::Accumulator,
        StrategyKind::Stabilizer,
        StrategyKind::MarketMaker,
        StrategyKind::BuyWall,
        StrategyKind::PriceKeeper,
        StrategyKind::SellLiquidity,
        StrategyKind::PriceGap,
    ];

    /// The stable string form used as the database discriminator and in URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Conditional => "conditional",
            StrategyKind::Accumulator => "accumulator",
            StrategyKind::Stabilizer => "stabilizer",
            StrategyKind::MarketMaker => "market_maker",
            StrategyKind::BuyWall => "buy_wall",
            StrategyKind::PriceKeeper => "price_keeper",
            StrategyKind::SellLiquidity => "sell_liquidity",
            StrategyKind::PriceGap => "price_gap",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl serde::Serialize for OrderSide {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            OrderSide::Buy => serializer.serialize_str("BUY"),
            OrderSide::Sell => serializer.serialize_str("SELL"),
        }
    }
}

impl<'de> serde::Deserialize<'de> for OrderSide {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(serde::de::Error::custom(format!(
                "unknown variant `{}`, expected `BUY` or `SELL`",
                s
            ))),
        }
    }
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    /// Returns the opposite side of the order.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Ioc,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
        }
    }
}

/// Persisted status of a trade record. Records are append-only; the status is
/// fixed at insert time from the venue's immediate response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Placed,
    Filled,
    Failed,
    Cancelled,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Placed => "placed",
            TradeStatus::Filled => "filled",
            TradeStatus::Failed => "failed",
            TradeStatus::Cancelled => "cancelled",
        }
    }
}

/// Severity of an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
    Trade,
    Liquidity,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Info,
        LogLevel::Success,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Trade,
        LogLevel::Liquidity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Trade => "trade",
            LogLevel::Liquidity => "liquidity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == s)
    }
}

/// Comparison operator for a user-defined price condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceOperator {
    #[serde(rename = "<")]
    Below,
    #[serde(rename = ">")]
    Above,
    #[serde(rename = "<=")]
    BelowOrEqual,
    #[serde(rename = ">=")]
    AboveOrEqual,
}

impl PriceOperator {
    /// Evaluates `price OP threshold`.
    pub fn holds(&self, price: Decimal, threshold: Decimal) -> bool {
        match self {
            PriceOperator::Below => price < threshold,
            PriceOperator::Above => price > threshold,
            PriceOperator::BelowOrEqual => price <= threshold,
            PriceOperator::AboveOrEqual => price >= threshold,
        }
    }
}

/// Which market price a strategy uses as its reference. The source system
/// mixed last-trade, best-ask and mid implicitly; here it is always declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceReference {
    #[default]
    LastTrade,
    BestAsk,
    Mid,
}
