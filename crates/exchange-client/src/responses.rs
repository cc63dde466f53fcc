use crate::error::ExchangeError;
use core_types::{BookLevel, OrderRef, OrderRequest, OrderSide, SymbolRules};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

/// Venue error body. Codes arrive as numbers on one venue and strings on the
/// other; both normalize to a string.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(deserialize_with = "de_code")]
    pub code: String,
    #[serde(default, alias = "message")]
    pub msg: String,
}

fn de_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected error code shape: {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: i64,
}

/// Raw depth payload: price/qty pairs as decimal strings, best levels first.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDepthResponse {
    #[serde(default)]
    pub bids: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub asks: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A typed order book snapshot.
#[derive(Debug, Clone)]
pub struct DepthSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub timestamp: Option<i64>,
}

impl From<RawDepthResponse> for DepthSnapshot {
    fn from(raw: RawDepthResponse) -> Self {
        let level = |(price, qty): (Decimal, Decimal)| BookLevel::new(price, qty);
        Self {
            bids: raw.bids.into_iter().map(level).collect(),
            asks: raw.asks.into_iter().map(level).collect(),
            timestamp: raw.timestamp,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerPriceResponse {
    #[serde(alias = "lastPrice")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfoResponse {
    pub symbol: String,
    pub price_precision: u32,
    pub quantity_precision: u32,
    #[serde(default)]
    pub min_quantity: Option<Decimal>,
}

impl SymbolInfoResponse {
    pub fn into_rules(self, default_min_qty: Decimal) -> SymbolRules {
        SymbolRules {
            symbol: self.symbol,
            price_precision: self.price_precision,
            quantity_precision: self.quantity_precision,
            min_quantity: self.min_quantity.unwrap_or(default_min_qty),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBalance {
    #[serde(alias = "asset")]
    pub currency: String,
    pub available_amount: Decimal,
    #[serde(default)]
    pub frozen_amount: Decimal,
    #[serde(default)]
    pub total_amount: Decimal,
}

/// Per-asset balance as the engines consume it.
#[derive(Debug, Clone)]
pub struct AssetBalance {
    pub currency: String,
    pub available: Decimal,
    pub frozen: Decimal,
    pub total: Decimal,
}

impl From<RawBalance> for AssetBalance {
    fn from(raw: RawBalance) -> Self {
        Self {
            currency: raw.currency,
            available: raw.available_amount,
            frozen: raw.frozen_amount,
            total: raw.total_amount,
        }
    }
}

/// An order resting on the venue's book.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    #[serde(flatten)]
    id: OrderIdFields,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub orig_qty: Decimal,
    #[serde(default)]
    pub executed_qty: Option<Decimal>,
}

impl OpenOrder {
    pub fn order_id(&self) -> Result<String, ExchangeError> {
        self.id.normalized()
    }
}

/// The venues disagree on the order-id field: one returns a numeric
/// `orderId`, the other a string `orderIdString` (and sometimes both).
/// Missing both is a placement failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdFields {
    #[serde(default)]
    order_id: Option<JsonValue>,
    #[serde(default)]
    order_id_string: Option<String>,
}

impl OrderIdFields {
    pub fn normalized(&self) -> Result<String, ExchangeError> {
        if let Some(s) = &self.order_id_string {
            if !s.is_empty() {
                return Ok(s.clone());
            }
        }
        match &self.order_id {
            Some(JsonValue::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(JsonValue::Number(n)) => Ok(n.to_string()),
            _ => Err(ExchangeError::MissingOrderId),
        }
    }
}

/// Acknowledgement of a single order placement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    #[serde(flatten)]
    id: OrderIdFields,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub orig_qty: Option<Decimal>,
}

impl OrderAck {
    /// Normalizes the ack into an `OrderRef` for the originating request.
    pub fn into_order_ref(self, request: &OrderRequest) -> Result<OrderRef, ExchangeError> {
        let venue_order_id = self.id.normalized()?;
        Ok(OrderRef {
            venue_order_id,
            client_order_id: self
                .client_order_id
                .unwrap_or_else(|| request.client_order_id.clone()),
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price.or(self.price),
            quantity: request.quantity.or(self.orig_qty),
        })
    }
}

/// One entry of a batch placement response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemAck {
    #[serde(deserialize_with = "de_code", default = "zero_code")]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(flatten)]
    pub ack: OrderAck,
}

fn zero_code() -> String {
    "0".to_string()
}

impl BatchItemAck {
    pub fn succeeded(&self) -> bool {
        self.code == "0" || self.code == "200"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchPlaceResponse {
    #[serde(alias = "orders", alias = "items", default)]
    pub results: Vec<BatchItemAck>,
}

/// A failed leg of a batch placement.
#[derive(Debug, Clone)]
pub struct BatchItemFailure {
    pub client_order_id: String,
    pub code: String,
    pub message: String,
}

/// Classified result of a batch placement: accepted refs plus failed legs.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub placed: Vec<OrderRef>,
    pub failed: Vec<BatchItemFailure>,
}

/// Result of a batch cancel. One venue acknowledges unknown ids as success;
/// `unknown` is only populated when the reconcile policy is active.
#[derive(Debug, Clone, Default)]
pub struct BatchCancelOutcome {
    pub cancelled: Vec<String>,
    pub unknown: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn error_code_normalizes_numbers_and_strings() {
        let numeric: ApiErrorResponse =
            serde_json::from_str(r#"{"code": -1021, "msg": "timestamp outside recvWindow"}"#)
                .unwrap();
        assert_eq!(numeric.code, "-1021");

        let stringy: ApiErrorResponse =
            serde_json::from_str(r#"{"code": "AUTH_104", "message": "signature expired"}"#)
                .unwrap();
        assert_eq!(stringy.code, "AUTH_104");
        assert_eq!(stringy.msg, "signature expired");
    }

    #[test]
    fn depth_pairs_parse_from_decimal_strings() {
        let raw: RawDepthResponse = serde_json::from_str(
            r#"{"bids": [["0.0099", "1200"]], "asks": [["0.0101", "800"]], "timestamp": 1700000000000}"#,
        )
        .unwrap();
        let depth = DepthSnapshot::from(raw);
        assert_eq!(depth.bids[0].price, dec!(0.0099));
        assert_eq!(depth.asks[0].qty, dec!(800));
    }

    #[test]
    fn order_id_normalization_handles_both_venue_shapes() {
        let numeric: OrderAck = serde_json::from_str(r#"{"orderId": 123456}"#).unwrap();
        assert_eq!(numeric.id.normalized().unwrap(), "123456");

        let stringy: OrderAck =
            serde_json::from_str(r#"{"orderIdString": "9f8e7d"}"#).unwrap();
        assert_eq!(stringy.id.normalized().unwrap(), "9f8e7d");

        let neither: OrderAck = serde_json::from_str(r#"{"status": "NEW"}"#).unwrap();
        assert!(matches!(
            neither.id.normalized(),
            Err(ExchangeError::MissingOrderId)
        ));
    }

    #[test]
    fn batch_item_without_code_defaults_to_success() {
        let item: BatchItemAck = serde_json::from_str(r#"{"orderId": 1}"#).unwrap();
        assert!(item.succeeded());

        let rejected: BatchItemAck =
            serde_json::from_str(r#"{"code": 3001, "msg": "insufficient balance"}"#).unwrap();
        assert!(!rejected.succeeded());
    }
}
