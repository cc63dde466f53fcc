//! # Helmsman Market Data
//!
//! On-demand market snapshots for the strategy engines: mid price, top-N
//! depth and symbol precision metadata. Snapshots are fresh per call; no
//! staleness guarantee is made to callers. Concurrent callers for the same
//! symbol share a single in-flight venue fetch.

use crate::error::MarketDataError;
use chrono::Utc;
use core_types::{MarketSnapshot, SymbolRules};
use exchange_client::clock::VenueClock;
use exchange_client::ExchangeApi;
use futures::future::{BoxFuture, FutureExt, Shared};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub mod error;

type SharedFetch = Shared<BoxFuture<'static, Result<MarketSnapshot, String>>>;

/// Read-only provider of per-symbol market snapshots.
pub struct SnapshotProvider {
    api: Arc<dyn ExchangeApi>,
    clock: Arc<VenueClock>,
    depth_limit: u32,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
}

impl SnapshotProvider {
    pub fn new(api: Arc<dyn ExchangeApi>, clock: Arc<VenueClock>, depth_limit: u32) -> Self {
        Self {
            api,
            clock,
            depth_limit,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches a fresh snapshot, joining an in-flight fetch when one exists.
    pub async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
        let fetch = {
            let mut in_flight = self.in_flight.lock().expect("in-flight map poisoned");
            if let Some(existing) = in_flight.get(symbol) {
                existing.clone()
            } else {
                let api = Arc::clone(&self.api);
                let clock = Arc::clone(&self.clock);
                let sym = symbol.to_string();
                let limit = self.depth_limit;
                let fetch = async move { fetch_snapshot(api, clock, sym, limit).await }
                    .boxed()
                    .shared();
                in_flight.insert(symbol.to_string(), fetch.clone());
                fetch
            }
        };

        let result = fetch.await;
        // Sharing is best-effort: a late removal can drop a newer entry,
        // which only costs one extra fetch.
        self.in_flight
            .lock()
            .expect("in-flight map poisoned")
            .remove(symbol);

        let snapshot = result.map_err(MarketDataError::Fetch)?;
        // A book with no levels on either side and no last trade gives the
        // strategies nothing to price against; surface it instead of handing
        // out a zero mid.
        if snapshot.bids.is_empty()
            && snapshot.asks.is_empty()
            && snapshot.last_price <= Decimal::ZERO
        {
            return Err(MarketDataError::EmptyMarket(symbol.to_string()));
        }
        Ok(snapshot)
    }

    /// Precision metadata for a symbol; the exchange client caches it.
    pub async fn rules(&self, symbol: &str) -> Result<SymbolRules, MarketDataError> {
        Ok(self.api.symbol_rules(symbol).await?)
    }
}

async fn fetch_snapshot(
    api: Arc<dyn ExchangeApi>,
    clock: Arc<VenueClock>,
    symbol: String,
    limit: u32,
) -> Result<MarketSnapshot, String> {
    let (depth, last) = tokio::join!(api.depth(&symbol, limit), api.ticker_price(&symbol));
    let depth = depth.map_err(|e| e.to_string())?;
    let last = last.map_err(|e| e.to_string())?;

    let best_bid = depth.bids.first().map(|l| l.price);
    let best_ask = depth.asks.first().map(|l| l.price);

    Ok(MarketSnapshot {
        symbol,
        mid_price: mid_price(best_bid, best_ask, last),
        last_price: last,
        best_bid,
        best_ask,
        bids: depth.bids,
        asks: depth.asks,
        fetched_at: Utc::now(),
        server_offset_ms: clock.offset_ms(),
    })
}

/// Best-bid/ask midpoint when both sides are present, else the last trade.
pub fn mid_price(best_bid: Option<Decimal>, best_ask: Option<Decimal>, last: Decimal) -> Decimal {
    match (best_bid, best_ask) {
        (Some(bid), Some(ask)) => (bid + ask) / dec!(2),
        _ => last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_types::{BookLevel, OrderRef, OrderRequest, OrderSide};
    use exchange_client::error::ExchangeError;
    use exchange_client::responses::{
        AssetBalance, BatchCancelOutcome, BatchOutcome, DepthSnapshot, OpenOrder,
    };
    use core_types::Credentials;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn mid_uses_midpoint_when_both_sides_present() {
        assert_eq!(
            mid_price(Some(dec!(0.0099)), Some(dec!(0.0101)), dec!(0.0095)),
            dec!(0.0100)
        );
    }

    #[test]
    fn mid_falls_back_to_last_trade_on_one_sided_book() {
        assert_eq!(mid_price(None, Some(dec!(0.0101)), dec!(0.0095)), dec!(0.0095));
        assert_eq!(mid_price(Some(dec!(0.0099)), None, dec!(0.0095)), dec!(0.0095));
        assert_eq!(mid_price(None, None, dec!(0.0095)), dec!(0.0095));
    }

    /// Mock venue that counts depth fetches and answers slowly, so two
    /// concurrent callers demonstrably share one fetch. With `empty` set it
    /// serves a dead market: no levels, zero last trade.
    struct CountingApi {
        depth_calls: AtomicU32,
        empty: bool,
    }

    #[async_trait]
    impl ExchangeApi for CountingApi {
        async fn server_time(&self) -> Result<i64, ExchangeError> {
            Ok(0)
        }

        async fn depth(&self, _symbol: &str, _limit: u32) -> Result<DepthSnapshot, ExchangeError> {
            self.depth_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.empty {
                return Ok(DepthSnapshot {
                    bids: vec![],
                    asks: vec![],
                    timestamp: None,
                });
            }
            Ok(DepthSnapshot {
                bids: vec![BookLevel::new(dec!(0.0099), dec!(100))],
                asks: vec![BookLevel::new(dec!(0.0101), dec!(100))],
                timestamp: None,
            })
        }

        async fn ticker_price(&self, _symbol: &str) -> Result<Decimal, ExchangeError> {
            if self.empty {
                return Ok(Decimal::ZERO);
            }
            Ok(dec!(0.0100))
        }

        async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
            Ok(SymbolRules {
                symbol: symbol.to_string(),
                price_precision: 6,
                quantity_precision: 2,
                min_quantity: dec!(0.01),
            })
        }

        async fn balances(
            &self,
            _creds: &Credentials,
            _currencies: &[&str],
        ) -> Result<Vec<AssetBalance>, ExchangeError> {
            Ok(vec![])
        }

        async fn open_orders(
            &self,
            _creds: &Credentials,
            _symbol: &str,
            _side: Option<OrderSide>,
        ) -> Result<Vec<OpenOrder>, ExchangeError> {
            Ok(vec![])
        }

        async fn place_order(
            &self,
            _creds: &Credentials,
            _request: &OrderRequest,
        ) -> Result<OrderRef, ExchangeError> {
            Err(ExchangeError::InvalidData("not supported".into()))
        }

        async fn place_batch(
            &self,
            _creds: &Credentials,
            _client_batch_id: &str,
            _items: &[OrderRequest],
        ) -> Result<BatchOutcome, ExchangeError> {
            Ok(BatchOutcome::default())
        }

        async fn cancel_order(
            &self,
            _creds: &Credentials,
            _symbol: &str,
            _order_id: &str,
        ) -> Result<(), ExchangeError> {
            Ok(())
        }

        async fn cancel_batch(
            &self,
            _creds: &Credentials,
            _symbol: &str,
            _order_ids: &[String],
        ) -> Result<BatchCancelOutcome, ExchangeError> {
            Ok(BatchCancelOutcome::default())
        }

        async fn cancel_all_open(
            &self,
            _creds: &Credentials,
            _symbol: &str,
            _side: Option<OrderSide>,
        ) -> Result<(), ExchangeError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn dead_market_is_surfaced_not_zero_priced() {
        let api = Arc::new(CountingApi {
            depth_calls: AtomicU32::new(0),
            empty: true,
        });
        let provider = SnapshotProvider::new(api, Arc::new(VenueClock::new()), 20);
        let err = provider.snapshot("GCBUSDT").await.unwrap_err();
        assert!(matches!(err, MarketDataError::EmptyMarket(_)));
    }

    #[tokio::test]
    async fn concurrent_snapshot_callers_share_one_fetch() {
        let api = Arc::new(CountingApi {
            depth_calls: AtomicU32::new(0),
            empty: false,
        });
        let provider = Arc::new(SnapshotProvider::new(
            api.clone(),
            Arc::new(VenueClock::new()),
            20,
        ));

        let a = {
            let p = Arc::clone(&provider);
            tokio::spawn(async move { p.snapshot("GCBUSDT").await })
        };
        let b = {
            let p = Arc::clone(&provider);
            tokio::spawn(async move { p.snapshot("GCBUSDT").await })
        };

        let snap_a = a.await.unwrap().unwrap();
        let snap_b = b.await.unwrap().unwrap();
        assert_eq!(snap_a.mid_price, dec!(0.0100));
        assert_eq!(snap_b.mid_price, dec!(0.0100));
        assert_eq!(api.depth_calls.load(Ordering::SeqCst), 1);

        // A later call fetches again: snapshots are fresh per call.
        provider.snapshot("GCBUSDT").await.unwrap();
        assert_eq!(api.depth_calls.load(Ordering::SeqCst), 2);
    }
}
