use crate::context::EngineContext;
use crate::error::EngineError;
use crate::frame::{run_engine, tick_for, StrategyWorker};
use crate::workers::{
    AccumulatorWorker, BuyWallWorker, ConditionalWorker, MarketMakerWorker, PriceGapWorker,
    PriceKeeperWorker, SellLiquidityWorker, StabilizerWorker,
};
use configuration::{MarketConfig, SupervisorConfig};
use core_types::{ActivityLog, Outcome, StrategyKind};
use events::BotEvent;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// Per-strategy slice of the status payload.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyStatus {
    pub running: bool,
    pub live_bot_count: i64,
}

/// Market context attached to the status payload.
#[derive(Debug, Clone, Serialize)]
pub struct MarketStatus {
    pub symbol: String,
    pub mid_price: Decimal,
    pub last_price: Decimal,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub per_strategy: BTreeMap<String, StrategyStatus>,
    pub market: Option<MarketStatus>,
    pub in_flight_work_units: usize,
}

/// Result of a forced liquidity adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct AdjustReport {
    pub placed: u32,
    pub failed: u32,
    pub outcome: String,
}

struct EngineHandle {
    shutdown_tx: watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

/// Owns the set of live strategy engines.
///
/// Engines are started per admission counts at boot, can be started and
/// stopped individually at runtime, and all stop with a bounded drain on
/// shutdown. User-level enable/disable goes through here so there is exactly
/// one path by which engines learn of admission changes.
pub struct Supervisor {
    ctx: Arc<EngineContext>,
    config: SupervisorConfig,
    market: MarketConfig,
    workers: HashMap<StrategyKind, Arc<dyn StrategyWorker>>,
    engines: Mutex<HashMap<StrategyKind, EngineHandle>>,
}

impl Supervisor {
    pub fn new(ctx: Arc<EngineContext>, config: SupervisorConfig, market: MarketConfig) -> Self {
        let mut workers: HashMap<StrategyKind, Arc<dyn StrategyWorker>> = HashMap::new();
        workers.insert(StrategyKind::Conditional, Arc::new(ConditionalWorker));
        workers.insert(StrategyKind::Accumulator, Arc::new(AccumulatorWorker));
        workers.insert(StrategyKind::Stabilizer, Arc::new(StabilizerWorker));
        workers.insert(StrategyKind::MarketMaker, Arc::new(MarketMakerWorker));
        workers.insert(StrategyKind::BuyWall, Arc::new(BuyWallWorker));
        workers.insert(StrategyKind::PriceKeeper, Arc::new(PriceKeeperWorker));
        workers.insert(StrategyKind::SellLiquidity, Arc::new(SellLiquidityWorker));
        workers.insert(StrategyKind::PriceGap, Arc::new(PriceGapWorker));

        Self {
            ctx,
            config,
            market,
            workers,
            engines: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> Arc<EngineContext> {
        Arc::clone(&self.ctx)
    }

    /// Boot: start each engine that has admissible bots. The conditional and
    /// sell-liquidity engines always start and self-idle when empty. Boot
    /// itself writes nothing, so booting twice without intervening work
    /// leaves persisted state untouched.
    pub async fn boot(&self) -> Result<(), EngineError> {
        let mut started = 0u32;
        for kind in StrategyKind::ALL {
            let always_on = matches!(
                kind,
                StrategyKind::Conditional | StrategyKind::SellLiquidity
            );
            let live = self.ctx.repo.count_live_bots(kind).await?;
            if always_on || live > 0 {
                if self.start(kind).await? {
                    started += 1;
                }
            } else {
                tracing::info!(strategy = %kind, "no admissible bots, engine not started");
            }
        }
        self.ctx.emit(BotEvent::SupervisorStarted { engines: started });
        tracing::info!(engines = started, "supervisor booted");
        Ok(())
    }

    /// Starts one strategy engine. Returns false when it is already running.
    pub async fn start(&self, kind: StrategyKind) -> Result<bool, EngineError> {
        let mut engines = self.engines.lock().await;
        if let Some(handle) = engines.get(&kind) {
            if !handle.join.is_finished() {
                return Ok(false);
            }
        }

        let worker = Arc::clone(
            self.workers
                .get(&kind)
                .expect("worker exists for every strategy"),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tick = tick_for(kind, &self.config);
        let deadline = Duration::from_secs(self.config.shutdown_deadline_secs);
        let join = tokio::spawn(run_engine(
            Arc::clone(&self.ctx),
            worker,
            tick,
            deadline,
            shutdown_rx,
        ));
        engines.insert(kind, EngineHandle { shutdown_tx, join });
        Ok(true)
    }

    /// Stops one strategy engine, draining its work units within the
    /// shutdown deadline. Returns false when it was not running.
    pub async fn stop(&self, kind: StrategyKind) -> Result<bool, EngineError> {
        let handle = {
            let mut engines = self.engines.lock().await;
            engines.remove(&kind)
        };
        let Some(handle) = handle else {
            return Ok(false);
        };

        let _ = handle.shutdown_tx.send(true);
        let grace = Duration::from_secs(self.config.shutdown_deadline_secs + 2);
        match tokio::time::timeout(grace, handle.join).await {
            Ok(_) => {}
            Err(_) => {
                tracing::warn!(strategy = %kind, "engine did not stop in time");
            }
        }
        Ok(true)
    }

    /// Re-enables bot execution for one user.
    pub async fn enable_for_user(&self, user_id: Uuid) -> Result<bool, EngineError> {
        Ok(self.ctx.repo.set_bot_enabled(user_id, true).await?)
    }

    /// Disables bot execution for one user. Engines re-derive admission each
    /// tick, so the user is skipped within one tick. Live open orders placed
    /// earlier remain on the book by design.
    pub async fn disable_for_user(&self, user_id: Uuid) -> Result<bool, EngineError> {
        let changed = self.ctx.repo.set_bot_enabled(user_id, false).await?;
        if changed {
            tracing::info!(%user_id, "user disabled; engines will skip within one tick");
        }
        Ok(changed)
    }

    pub async fn status(&self) -> SupervisorStatus {
        let engines = self.engines.lock().await;
        let mut per_strategy = BTreeMap::new();
        for kind in StrategyKind::ALL {
            let running = engines
                .get(&kind)
                .map(|handle| !handle.join.is_finished())
                .unwrap_or(false);
            let live_bot_count = self.ctx.repo.count_live_bots(kind).await.unwrap_or(0);
            per_strategy.insert(
                kind.as_str().to_string(),
                StrategyStatus {
                    running,
                    live_bot_count,
                },
            );
        }
        drop(engines);

        let market = match self.ctx.market.snapshot(&self.market.default_symbol).await {
            Ok(snapshot) => Some(MarketStatus {
                symbol: snapshot.symbol.clone(),
                mid_price: snapshot.mid_price,
                last_price: snapshot.last_price,
                best_bid: snapshot.best_bid,
                best_ask: snapshot.best_ask,
                spread_percent: snapshot.spread_percent(),
            }),
            Err(e) => {
                tracing::debug!(error = %e, "status market snapshot unavailable");
                None
            }
        };

        SupervisorStatus {
            per_strategy,
            market,
            in_flight_work_units: self.ctx.locks.in_flight(),
        }
    }

    /// Recent entries from the strategy's advisory ring, newest first.
    pub fn logs(&self, kind: StrategyKind, limit: usize) -> Vec<ActivityLog> {
        self.ctx.rings.ring(kind).recent(limit)
    }

    /// Runs one sell-liquidity pass for a bot immediately, outside its tick.
    pub async fn force_adjust_liquidity(&self, bot_id: Uuid) -> Result<AdjustReport, EngineError> {
        let bot = self
            .ctx
            .repo
            .fetch_bot(bot_id)
            .await?
            .ok_or(EngineError::BotNotFound(bot_id))?;
        if bot.kind() != StrategyKind::SellLiquidity {
            return Err(EngineError::WrongStrategy(bot_id, StrategyKind::SellLiquidity));
        }
        let creds = self
            .ctx
            .credentials
            .resolve(bot.user_id)
            .await?
            .ok_or(EngineError::MissingCredentials(bot.user_id))?;

        let Some(_guard) = self.ctx.locks.try_acquire(bot.id) else {
            return Ok(AdjustReport {
                placed: 0,
                failed: 0,
                outcome: "busy".to_string(),
            });
        };
        let worker = self
            .workers
            .get(&StrategyKind::SellLiquidity)
            .expect("sell-liquidity worker registered");
        let outcome = worker
            .process(&self.ctx, &bot, &creds)
            .await
            .unwrap_or_else(|e| Outcome::failed(e.to_string(), None));

        let report = match &outcome {
            Outcome::Submitted { orders } => AdjustReport {
                placed: orders.len() as u32,
                failed: 0,
                outcome: outcome.label().to_string(),
            },
            Outcome::Partial { orders, failed } => AdjustReport {
                placed: orders.len() as u32,
                failed: *failed,
                outcome: outcome.label().to_string(),
            },
            other => AdjustReport {
                placed: 0,
                failed: 0,
                outcome: other.label().to_string(),
            },
        };
        Ok(report)
    }

    /// Full shutdown: stop every engine, then announce.
    pub async fn shutdown(&self) {
        for kind in StrategyKind::ALL {
            if let Err(e) = self.stop(kind).await {
                tracing::warn!(strategy = %kind, error = %e, "stop failed during shutdown");
            }
        }
        self.ctx.emit(BotEvent::SupervisorStopped);
        tracing::info!("supervisor shut down");
    }
}
