//! # Helmsman Exchange Client
//!
//! Typed, signed REST client for the two spot venues the supervisor trades
//! on. The venues expose analogous endpoints but disagree on authentication
//! canonicalisation and a handful of response shapes; one `RestClient`
//! parameterized by a [`VenueProfile`] covers both.
//!
//! All prices and quantities cross the wire as decimal strings rounded to the
//! symbol's declared precision; rounding happens here, at the serialization
//! boundary, and nowhere else.

use crate::clock::VenueClock;
use crate::error::ExchangeError;
use crate::responses::{
    ApiErrorResponse, AssetBalance, BatchCancelOutcome, BatchItemFailure, BatchOutcome,
    BatchPlaceResponse, DepthSnapshot, OpenOrder, OrderAck, RawBalance, RawDepthResponse,
    ServerTimeResponse, SymbolInfoResponse, TickerPriceResponse,
};
use async_trait::async_trait;
use configuration::{VenueConfig, VenuesConfig};
use core_types::{Credentials, OrderRef, OrderRequest, OrderSide, SymbolRules};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

pub mod clock;
pub mod error;
pub mod responses;
mod sign;


/// Venue-wide minimum base quantity per order.
pub const MIN_ORDER_QTY: Decimal = dec!(0.01);

const MAX_ATTEMPTS: u32 = 3;

/// Which canonical-string construction a venue expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVariant {
    A,
    B,
}

/// Endpoint paths for one venue. The shapes are analogous; only prefixes and
/// a few segment names differ.
#[derive(Debug, Clone)]
pub struct VenuePaths {
    pub time: &'static str,
    pub depth: &'static str,
    pub ticker: &'static str,
    pub symbols: &'static str,
    pub balances: &'static str,
    pub open_orders: &'static str,
    pub order: &'static str,
    pub batch_order: &'static str,
    pub open_order: &'static str,
}

/// How `cancel_batch` treats ids the venue silently accepts. One venue
/// returns success even for unknown ids; operators choose whether to trust
/// that or reconcile against open orders afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownCancelPolicy {
    #[default]
    TrustVenue,
    Reconcile,
}

/// Everything the client needs to know about one venue.
#[derive(Debug, Clone)]
pub struct VenueProfile {
    pub name: &'static str,
    pub base_url: String,
    pub signature: SignatureVariant,
    pub paths: VenuePaths,
    pub recv_window: u64,
    pub http_timeout: Duration,
    pub batch_timeout: Duration,
    pub cancel_policy: UnknownCancelPolicy,
}

impl VenueProfile {
    pub fn venue_a(cfg: &VenueConfig) -> Self {
        Self {
            name: "venue-a",
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            signature: SignatureVariant::A,
            paths: VenuePaths {
                time: "/sapi/v1/time",
                depth: "/sapi/v1/depth",
                ticker: "/sapi/v1/ticker/price",
                symbols: "/sapi/v1/symbols",
                balances: "/sapi/v1/balances",
                open_orders: "/sapi/v1/open-orders",
                order: "/sapi/v1/order",
                batch_order: "/sapi/v1/batch-order",
                open_order: "/sapi/v1/open-order",
            },
            recv_window: cfg.recv_window,
            http_timeout: Duration::from_secs(cfg.http_timeout_secs),
            batch_timeout: Duration::from_secs(cfg.batch_timeout_secs),
            cancel_policy: UnknownCancelPolicy::TrustVenue,
        }
    }

    pub fn venue_b(cfg: &VenueConfig) -> Self {
        Self {
            name: "venue-b",
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            signature: SignatureVariant::B,
            paths: VenuePaths {
                time: "/open/api/v2/time",
                depth: "/open/api/v2/market/depth",
                ticker: "/open/api/v2/market/ticker-price",
                symbols: "/open/api/v2/symbols",
                balances: "/open/api/v2/account/balances",
                open_orders: "/open/api/v2/order/open-orders",
                order: "/open/api/v2/order",
                batch_order: "/open/api/v2/batch-order",
                open_order: "/open/api/v2/open-order",
            },
            recv_window: cfg.recv_window,
            http_timeout: Duration::from_secs(cfg.http_timeout_secs),
            batch_timeout: Duration::from_secs(cfg.batch_timeout_secs),
            cancel_policy: UnknownCancelPolicy::Reconcile,
        }
    }

    /// Builds the profile for the venue selected in configuration.
    pub fn from_settings(venues: &VenuesConfig) -> Self {
        match venues.active.as_str() {
            "b" => Self::venue_b(&venues.venue_b),
            _ => Self::venue_a(&venues.venue_a),
        }
    }
}

/// Builds a caller-supplied idempotency id: `<purpose>_<unixMs>_<idx>`.
pub fn client_order_id(purpose: &str, idx: usize) -> String {
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{}_{}_{}", purpose, unix_ms, idx)
}

/// The generic, abstract interface to a trading venue.
///
/// This trait is the contract the strategy engines program against, allowing
/// the underlying implementation (live or mock) to be swapped out.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Fetches the venue clock and records the offset. Returns epoch ms.
    async fn server_time(&self) -> Result<i64, ExchangeError>;

    /// Fetches an order book snapshot. (Public)
    async fn depth(&self, symbol: &str, limit: u32) -> Result<DepthSnapshot, ExchangeError>;

    /// Fetches the last trade price. (Public)
    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, ExchangeError>;

    /// Fetches precision metadata for a symbol, cached per process. (Public)
    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError>;

    /// Fetches per-asset balances. (Authenticated)
    async fn balances(
        &self,
        creds: &Credentials,
        currencies: &[&str],
    ) -> Result<Vec<AssetBalance>, ExchangeError>;

    /// Lists resting orders, optionally filtered by side. (Authenticated)
    async fn open_orders(
        &self,
        creds: &Credentials,
        symbol: &str,
        side: Option<OrderSide>,
    ) -> Result<Vec<OpenOrder>, ExchangeError>;

    /// Places a single order. (Authenticated)
    async fn place_order(
        &self,
        creds: &Credentials,
        request: &OrderRequest,
    ) -> Result<OrderRef, ExchangeError>;

    /// Places a batch of orders under one `clientBatchId`. (Authenticated)
    async fn place_batch(
        &self,
        creds: &Credentials,
        client_batch_id: &str,
        items: &[OrderRequest],
    ) -> Result<BatchOutcome, ExchangeError>;

    /// Cancels one order by venue id. (Authenticated)
    async fn cancel_order(
        &self,
        creds: &Credentials,
        symbol: &str,
        order_id: &str,
    ) -> Result<(), ExchangeError>;

    /// Cancels a set of orders. (Authenticated)
    async fn cancel_batch(
        &self,
        creds: &Credentials,
        symbol: &str,
        order_ids: &[String],
    ) -> Result<BatchCancelOutcome, ExchangeError>;

    /// Cancels all resting orders for a symbol, optionally one side only.
    /// (Authenticated)
    async fn cancel_all_open(
        &self,
        creds: &Credentials,
        symbol: &str,
        side: Option<OrderSide>,
    ) -> Result<(), ExchangeError>;
}

/// A concrete `ExchangeApi` over one venue's REST surface.
pub struct RestClient {
    http: reqwest::Client,
    profile: VenueProfile,
    clock: Arc<VenueClock>,
    rules_cache: RwLock<HashMap<String, SymbolRules>>,
}

impl RestClient {
    pub fn new(profile: VenueProfile, clock: Arc<VenueClock>) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(profile.batch_timeout.max(profile.http_timeout))
            .build()?;
        Ok(Self {
            http,
            profile,
            clock,
            rules_cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn venue_name(&self) -> &'static str {
        self.profile.name
    }

    pub fn clock(&self) -> Arc<VenueClock> {
        Arc::clone(&self.clock)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.profile.base_url, path)
    }

    async fn sync_clock(&self) -> Result<i64, ExchangeError> {
        let response: ServerTimeResponse = self
            .get_public(self.profile.paths.time, &BTreeMap::new())
            .await?;
        self.clock.record(response.server_time);
        tracing::debug!(
            venue = self.profile.name,
            offset_ms = self.clock.offset_ms(),
            "venue clock synced"
        );
        Ok(response.server_time)
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &BTreeMap<String, String>,
    ) -> Result<T, ExchangeError> {
        let mut request = self
            .http
            .get(self.url(path))
            .timeout(self.profile.http_timeout);
        if !query.is_empty() {
            request = request.query(&query.iter().collect::<Vec<_>>());
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_http_failure(status, &text, None));
        }
        parse_payload(&text)
    }

    /// Issues one signed request with the drift/network retry policy: up to
    /// three attempts, resyncing the clock and re-signing between attempts.
    /// Rate limits and ordinary venue rejections surface immediately.
    async fn signed_request(
        &self,
        creds: &Credentials,
        method: Method,
        path: &str,
        query: BTreeMap<String, String>,
        body: Option<JsonValue>,
        timeout: Duration,
    ) -> Result<String, ExchangeError> {
        if self.clock.is_stale() {
            // A failed presync is not fatal; the attempt itself will classify.
            if let Err(e) = self.sync_clock().await {
                tracing::warn!(venue = self.profile.name, error = %e, "clock presync failed");
            }
        }

        let body_json = match &body {
            Some(value) => Some(serde_json::to_string(value).map_err(|e| {
                ExchangeError::InvalidData(format!("unserializable request body: {}", e))
            })?),
            None => None,
        };

        let mut last_drift: Option<ExchangeError> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let result = self
                .send_signed_once(creds, &method, path, &query, body_json.as_deref(), timeout)
                .await;
            match result {
                Ok(text) => return Ok(text),
                Err(e) if (e.is_time_drift() || e.is_network()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        venue = self.profile.name,
                        path,
                        attempt,
                        error = %e,
                        "signed call failed, resyncing clock and retrying"
                    );
                    let _ = self.sync_clock().await;
                    last_drift = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(match last_drift {
            Some(e) if e.is_time_drift() => ExchangeError::AuthExhausted(e.to_string()),
            Some(e) => e,
            None => ExchangeError::AuthExhausted("retries exhausted".to_string()),
        })
    }

    async fn send_signed_once(
        &self,
        creds: &Credentials,
        method: &Method,
        path: &str,
        query: &BTreeMap<String, String>,
        body_json: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ExchangeError> {
        let ts = self.clock.now_ms();
        let mut headers = HeaderMap::new();
        let signature = match self.profile.signature {
            SignatureVariant::A => {
                let canonical =
                    sign::canonical_variant_a(ts, method.as_str(), path, query, body_json);
                let signature = sign::hmac_sha256_hex(&creds.api_secret, &canonical);
                insert_header(&mut headers, "apikey", &creds.api_key)?;
                insert_header(&mut headers, "timestamp", &ts.to_string())?;
                insert_header(
                    &mut headers,
                    "recvWindow",
                    &self.profile.recv_window.to_string(),
                )?;
                signature
            }
            SignatureVariant::B => {
                let canonical = sign::canonical_variant_b(
                    &creds.api_key,
                    self.profile.recv_window,
                    ts,
                    method.as_str(),
                    path,
                    query,
                    body_json,
                );
                let signature = sign::hmac_sha256_hex(&creds.api_secret, &canonical);
                insert_header(&mut headers, "validate-algorithms", "HmacSHA256")?;
                insert_header(&mut headers, "validate-appkey", &creds.api_key)?;
                insert_header(
                    &mut headers,
                    "validate-recvwindow",
                    &self.profile.recv_window.to_string(),
                )?;
                insert_header(&mut headers, "validate-timestamp", &ts.to_string())?;
                signature
            }
        };
        let signature_header = match self.profile.signature {
            SignatureVariant::A => "signature",
            SignatureVariant::B => "validate-signature",
        };
        insert_header(&mut headers, signature_header, &signature)?;

        let mut request = self
            .http
            .request(method.clone(), self.url(path))
            .headers(headers)
            .timeout(timeout);
        if !query.is_empty() {
            request = request.query(&query.iter().collect::<Vec<_>>());
        }
        if let Some(body) = body_json {
            request = request
                .header("content-type", "application/json")
                .body(body.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let text = response.text().await?;

        if status.is_success() {
            // Some endpoints report rejection inside a 200 envelope.
            if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(&text) {
                if !err.code.is_empty() && err.code != "0" && err.code != "200" && !err.msg.is_empty()
                {
                    return Err(ExchangeError::Venue {
                        code: err.code,
                        message: err.msg,
                    });
                }
            }
            Ok(text)
        } else {
            Err(classify_http_failure(status, &text, retry_after))
        }
    }

    /// Serializes an order into the venue body shape, rounding decimals to
    /// the symbol's precision and enforcing the minimum size.
    async fn order_body(&self, request: &OrderRequest) -> Result<JsonValue, ExchangeError> {
        let rules = self.symbol_rules_cached(&request.symbol).await?;
        let min_qty = rules.min_quantity.max(MIN_ORDER_QTY);

        let mut body = serde_json::Map::new();
        body.insert("symbol".into(), json!(request.symbol));
        body.insert("side".into(), json!(request.side.as_str()));
        body.insert("type".into(), json!(request.order_type.as_str()));
        body.insert("clientOrderId".into(), json!(request.client_order_id));
        if let Some(tif) = request.time_in_force {
            body.insert("timeInForce".into(), json!(tif.as_str()));
        }
        if let Some(price) = request.price {
            body.insert("price".into(), json!(rules.round_price(price).to_string()));
        }
        match (request.quantity, request.quote_amount) {
            (Some(qty), _) => {
                let rounded = rules.round_quantity(qty);
                if rounded < min_qty {
                    return Err(ExchangeError::BelowMinimum(rounded, min_qty));
                }
                body.insert("quantity".into(), json!(rounded.to_string()));
            }
            (None, Some(quote)) => {
                if quote <= Decimal::ZERO {
                    return Err(ExchangeError::InvalidData(
                        "quote amount must be positive".to_string(),
                    ));
                }
                body.insert("quoteQty".into(), json!(quote.to_string()));
            }
            (None, None) => {
                return Err(ExchangeError::InvalidData(
                    "order carries neither quantity nor quote amount".to_string(),
                ));
            }
        }
        Ok(JsonValue::Object(body))
    }

    async fn symbol_rules_cached(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        if let Some(rules) = self.rules_cache.read().await.get(symbol) {
            return Ok(rules.clone());
        }
        let rules = self.fetch_symbol_rules(symbol).await?;
        self.rules_cache
            .write()
            .await
            .insert(symbol.to_string(), rules.clone());
        Ok(rules)
    }

    async fn fetch_symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        // One venue returns the single symbol, the other always a list.
        let text: String = {
            let response = self
                .http
                .get(self.url(self.profile.paths.symbols))
                .query(&[("symbol", symbol)])
                .timeout(self.profile.http_timeout)
                .send()
                .await?;
            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(classify_http_failure(status, &text, None));
            }
            text
        };
        let info = match serde_json::from_str::<SymbolInfoResponse>(&text) {
            Ok(single) => single,
            Err(_) => serde_json::from_str::<Vec<SymbolInfoResponse>>(&text)
                .map_err(|e| ExchangeError::Deserialization(e.to_string()))?
                .into_iter()
                .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
                .ok_or_else(|| {
                    ExchangeError::InvalidData(format!("symbol {} not listed", symbol))
                })?,
        };
        Ok(info.into_rules(MIN_ORDER_QTY))
    }
}

fn insert_header(
    headers: &mut HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), ExchangeError> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| ExchangeError::InvalidData(format!("invalid header value for {}", name)))?;
    headers.insert(name, value);
    Ok(())
}

fn classify_http_failure(
    status: reqwest::StatusCode,
    text: &str,
    retry_after_ms: Option<u64>,
) -> ExchangeError {
    if status.as_u16() == 429 {
        return ExchangeError::RateLimited { retry_after_ms };
    }
    match serde_json::from_str::<ApiErrorResponse>(text) {
        Ok(err) => ExchangeError::Venue {
            code: err.code,
            message: err.msg,
        },
        Err(_) => ExchangeError::Deserialization(format!(
            "HTTP {} with undecodable body: {}",
            status,
            text.chars().take(256).collect::<String>()
        )),
    }
}

fn parse_payload<T: DeserializeOwned>(text: &str) -> Result<T, ExchangeError> {
    serde_json::from_str::<T>(text).map_err(|e| {
        match serde_json::from_str::<ApiErrorResponse>(text) {
            Ok(err) if !err.msg.is_empty() => ExchangeError::Venue {
                code: err.code,
                message: err.msg,
            },
            _ => ExchangeError::Deserialization(e.to_string()),
        }
    })
}

#[async_trait]
impl ExchangeApi for RestClient {
    async fn server_time(&self) -> Result<i64, ExchangeError> {
        self.sync_clock().await
    }

    async fn depth(&self, symbol: &str, limit: u32) -> Result<DepthSnapshot, ExchangeError> {
        let mut query = BTreeMap::new();
        query.insert("symbol".to_string(), symbol.to_string());
        query.insert("limit".to_string(), limit.to_string());
        let raw: RawDepthResponse = self.get_public(self.profile.paths.depth, &query).await?;
        Ok(raw.into())
    }

    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let response = self
            .http
            .get(self.url(self.profile.paths.ticker))
            .query(&[("symbol", symbol)])
            .timeout(self.profile.http_timeout)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_http_failure(status, &text, None));
        }
        // Shape differs between venues: `{"price": "…"}` vs a bare string.
        if let Ok(ticker) = serde_json::from_str::<TickerPriceResponse>(&text) {
            return Ok(ticker.price);
        }
        let bare = text.trim().trim_matches('"');
        Decimal::from_str(bare)
            .map_err(|_| ExchangeError::Deserialization(format!("unparseable ticker: {}", text)))
    }

    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        self.symbol_rules_cached(symbol).await
    }

    async fn balances(
        &self,
        creds: &Credentials,
        currencies: &[&str],
    ) -> Result<Vec<AssetBalance>, ExchangeError> {
        let mut query = BTreeMap::new();
        if !currencies.is_empty() {
            query.insert("currencies".to_string(), currencies.join(","));
        }
        let text = self
            .signed_request(
                creds,
                Method::GET,
                self.profile.paths.balances,
                query,
                None,
                self.profile.http_timeout,
            )
            .await?;
        let raw: Vec<RawBalance> = parse_payload(&text)?;
        Ok(raw.into_iter().map(AssetBalance::from).collect())
    }

    async fn open_orders(
        &self,
        creds: &Credentials,
        symbol: &str,
        side: Option<OrderSide>,
    ) -> Result<Vec<OpenOrder>, ExchangeError> {
        let mut query = BTreeMap::new();
        query.insert("symbol".to_string(), symbol.to_string());
        if let Some(side) = side {
            query.insert("side".to_string(), side.as_str().to_string());
        }
        let text = self
            .signed_request(
                creds,
                Method::GET,
                self.profile.paths.open_orders,
                query,
                None,
                self.profile.http_timeout,
            )
            .await?;
        parse_payload(&text)
    }

    async fn place_order(
        &self,
        creds: &Credentials,
        request: &OrderRequest,
    ) -> Result<OrderRef, ExchangeError> {
        let body = self.order_body(request).await?;
        let text = self
            .signed_request(
                creds,
                Method::POST,
                self.profile.paths.order,
                BTreeMap::new(),
                Some(body),
                self.profile.http_timeout,
            )
            .await?;
        let ack: OrderAck = parse_payload(&text)?;
        ack.into_order_ref(request)
    }

    async fn place_batch(
        &self,
        creds: &Credentials,
        client_batch_id: &str,
        items: &[OrderRequest],
    ) -> Result<BatchOutcome, ExchangeError> {
        if items.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let mut bodies = Vec::with_capacity(items.len());
        for item in items {
            bodies.push(self.order_body(item).await?);
        }
        let body = json!({
            "clientBatchId": client_batch_id,
            "items": bodies,
        });
        let text = self
            .signed_request(
                creds,
                Method::POST,
                self.profile.paths.batch_order,
                BTreeMap::new(),
                Some(body),
                self.profile.batch_timeout,
            )
            .await?;
        let response: BatchPlaceResponse = parse_payload(&text)?;
        if response.results.len() != items.len() {
            return Err(ExchangeError::InvalidData(format!(
                "batch response has {} entries for {} items",
                response.results.len(),
                items.len()
            )));
        }

        let mut outcome = BatchOutcome::default();
        for (item, ack) in items.iter().zip(response.results) {
            if ack.succeeded() {
                match ack.ack.into_order_ref(item) {
                    Ok(order_ref) => outcome.placed.push(order_ref),
                    Err(_) => outcome.failed.push(BatchItemFailure {
                        client_order_id: item.client_order_id.clone(),
                        code: ack.code,
                        message: "accepted without an order id".to_string(),
                    }),
                }
            } else {
                outcome.failed.push(BatchItemFailure {
                    client_order_id: item.client_order_id.clone(),
                    code: ack.code,
                    message: ack.msg,
                });
            }
        }
        Ok(outcome)
    }

    async fn cancel_order(
        &self,
        creds: &Credentials,
        symbol: &str,
        order_id: &str,
    ) -> Result<(), ExchangeError> {
        let path = format!("{}/{}", self.profile.paths.order, order_id);
        let mut query = BTreeMap::new();
        query.insert("symbol".to_string(), symbol.to_string());
        self.signed_request(
            creds,
            Method::DELETE,
            &path,
            query,
            None,
            self.profile.http_timeout,
        )
        .await?;
        Ok(())
    }

    async fn cancel_batch(
        &self,
        creds: &Credentials,
        symbol: &str,
        order_ids: &[String],
    ) -> Result<BatchCancelOutcome, ExchangeError> {
        if order_ids.is_empty() {
            return Ok(BatchCancelOutcome::default());
        }
        let body = json!({
            "symbol": symbol,
            "orderIds": order_ids,
        });
        self.signed_request(
            creds,
            Method::DELETE,
            self.profile.paths.batch_order,
            BTreeMap::new(),
            Some(body),
            self.profile.batch_timeout,
        )
        .await?;

        match self.profile.cancel_policy {
            UnknownCancelPolicy::TrustVenue => Ok(BatchCancelOutcome {
                cancelled: order_ids.to_vec(),
                unknown: Vec::new(),
            }),
            UnknownCancelPolicy::Reconcile => {
                // The venue acknowledges unknown ids as success; the book is
                // the only honest source of what is still resting.
                let open = self.open_orders(creds, symbol, None).await?;
                let mut still_open = Vec::new();
                for order in &open {
                    if let Ok(id) = order.order_id() {
                        if order_ids.contains(&id) {
                            still_open.push(id);
                        }
                    }
                }
                let cancelled = order_ids
                    .iter()
                    .filter(|id| !still_open.contains(id))
                    .cloned()
                    .collect();
                Ok(BatchCancelOutcome {
                    cancelled,
                    unknown: still_open,
                })
            }
        }
    }

    async fn cancel_all_open(
        &self,
        creds: &Credentials,
        symbol: &str,
        side: Option<OrderSide>,
    ) -> Result<(), ExchangeError> {
        let mut query = BTreeMap::new();
        query.insert("symbol".to_string(), symbol.to_string());
        if let Some(side) = side {
            query.insert("side".to_string(), side.as_str().to_string());
        }
        self.signed_request(
            creds,
            Method::DELETE,
            self.profile.paths.open_order,
            query,
            None,
            self.profile.http_timeout,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_order_id_carries_purpose_and_index() {
        let id = client_order_id("gapfill", 3);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "gapfill");
        assert!(parts[1].parse::<u128>().unwrap() > 0);
        assert_eq!(parts[2], "3");
    }

    #[test]
    fn venue_profiles_disagree_on_signature_variant() {
        let cfg = VenueConfig {
            base_url: "https://x.example/".to_string(),
            recv_window: 5000,
            http_timeout_secs: 10,
            batch_timeout_secs: 30,
        };
        let a = VenueProfile::venue_a(&cfg);
        let b = VenueProfile::venue_b(&cfg);
        assert_eq!(a.signature, SignatureVariant::A);
        assert_eq!(b.signature, SignatureVariant::B);
        assert_eq!(a.base_url, "https://x.example");
        assert_eq!(b.cancel_policy, UnknownCancelPolicy::Reconcile);
    }
}
