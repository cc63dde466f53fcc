use crate::context::{admitted, EngineContext};
use crate::error::EngineError;
use async_trait::async_trait;
use chrono::Utc;
use configuration::SupervisorConfig;
use core_types::{ActivityLog, BotSpec, Credentials, Outcome, StrategyKind};
use events::BotEvent;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Upper bound on one work unit, wide enough for a batch call plus pauses.
const WORK_UNIT_DEADLINE: Duration = Duration::from_secs(60);

/// One strategy's evaluator/executor. The frame owns scheduling, locking,
/// admission, cooldowns and outcome bookkeeping; the worker owns everything
/// strategy-specific.
#[async_trait]
pub trait StrategyWorker: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// One pass over one bot. Called with the lock held, admission verified
    /// and credentials resolved. Errors are contained by the frame and
    /// recorded as failed outcomes; they never reach the tick loop.
    async fn process(
        &self,
        ctx: &EngineContext,
        bot: &BotSpec,
        creds: &Credentials,
    ) -> Result<Outcome, EngineError>;
}

/// Tick cadence per strategy, from configuration.
pub fn tick_for(kind: StrategyKind, config: &SupervisorConfig) -> Duration {
    let secs = match kind {
        StrategyKind::Conditional => config.conditional_tick_secs,
        StrategyKind::Accumulator => config.accumulator_tick_secs,
        StrategyKind::MarketMaker => config.market_maker_tick_secs,
        StrategyKind::Stabilizer => config.stabilizer_tick_secs,
        StrategyKind::PriceKeeper => config.price_keeper_tick_secs,
        StrategyKind::BuyWall => config.buy_wall_tick_secs,
        StrategyKind::SellLiquidity => config.sell_liquidity_tick_secs,
        StrategyKind::PriceGap => config.price_gap_tick_secs,
    };
    Duration::from_secs(secs.max(1))
}

/// The long-lived scheduler loop for one strategy engine.
///
/// Each tick reads the fresh candidate list and spawns one work unit per
/// bot. Work units run concurrently across bots and never overlap for one
/// bot (in-flight lock). Stop is observed between ticks and inside work
/// units; outstanding units get a bounded drain before abandonment.
pub async fn run_engine(
    ctx: Arc<EngineContext>,
    worker: Arc<dyn StrategyWorker>,
    tick: Duration,
    shutdown_deadline: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let kind = worker.kind();
    tracing::info!(strategy = %kind, tick_secs = tick.as_secs(), "engine started");
    ctx.emit(BotEvent::EngineStarted { strategy: kind });

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut units: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        // Reap finished work units so the set does not grow unboundedly.
        while units.try_join_next().is_some() {}

        let bots = match due_bots_with_retry(&ctx, kind).await {
            Ok(bots) => bots,
            Err(e) => {
                if ctx.warnings.should_emit(&format!("{kind}:due-bots")) {
                    tracing::warn!(strategy = %kind, error = %e, "skipping tick: repository unavailable");
                }
                continue;
            }
        };

        for bot in bots {
            if *shutdown.borrow() {
                break;
            }
            let ctx = Arc::clone(&ctx);
            let worker = Arc::clone(&worker);
            let shutdown = shutdown.clone();
            units.spawn(async move {
                run_work_unit(ctx, worker, bot, shutdown).await;
            });
        }
    }

    // Drain: let in-flight units finish within the deadline, then abandon
    // the rest. Their lock guards release when the tasks are dropped.
    let drained = tokio::time::timeout(shutdown_deadline, async {
        while units.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(strategy = %kind, "shutdown deadline hit, abandoning in-flight work");
        units.abort_all();
    }

    ctx.emit(BotEvent::EngineStopped { strategy: kind });
    tracing::info!(strategy = %kind, "engine stopped");
}

/// Transient read failures get exactly one retry before the tick is skipped.
async fn due_bots_with_retry(
    ctx: &EngineContext,
    kind: StrategyKind,
) -> Result<Vec<BotSpec>, database::DbError> {
    match ctx.repo.due_bots(kind, Utc::now()).await {
        Ok(bots) => Ok(bots),
        Err(first) => {
            tracing::debug!(strategy = %kind, error = %first, "due-bots read failed, retrying once");
            ctx.repo.due_bots(kind, Utc::now()).await
        }
    }
}

/// One pass of one strategy over one bot.
async fn run_work_unit(
    ctx: Arc<EngineContext>,
    worker: Arc<dyn StrategyWorker>,
    bot: BotSpec,
    mut shutdown: watch::Receiver<bool>,
) {
    let kind = worker.kind();

    // (a) Try-only lock; a unit still running from a previous tick wins.
    let Some(_guard) = ctx.locks.try_acquire(bot.id) else {
        tracing::debug!(strategy = %kind, bot_id = %bot.id, "bot already in flight, skipping");
        return;
    };

    // (b) Refetch the document: the frontend may have changed intent since
    // the candidate query ran.
    let bot = match ctx.repo.fetch_bot(bot.id).await {
        Ok(Some(fresh)) => fresh,
        Ok(None) => return, // deleted since the query
        Err(e) => {
            tracing::warn!(strategy = %kind, bot_id = %bot.id, error = %e, "refetch failed, skipping");
            return;
        }
    };

    // Re-derive admission rather than trusting the candidate query.
    let user = match ctx.repo.get_user(bot.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(strategy = %kind, bot_id = %bot.id, error = %e, "user fetch failed, skipping");
            return;
        }
    };
    if !admitted(user.bot_enabled, user.has_credentials, &bot) {
        tracing::debug!(strategy = %kind, bot_id = %bot.id, "bot no longer admitted, skipping");
        return;
    }

    // (c) Generic cooldown gate.
    if let (Some(cooldown), Some(last)) = (
        bot.strategy.cooldown_seconds(),
        bot.strategy.last_executed_at(),
    ) {
        let elapsed = Utc::now() - last;
        if elapsed < chrono::Duration::seconds(cooldown as i64) {
            record_outcome(&ctx, &bot, Outcome::skipped("cooldown active")).await;
            return;
        }
    }

    // (d) Credentials, resolved fresh for this unit only.
    let creds = match ctx.credentials.resolve(bot.user_id).await {
        Ok(Some(creds)) => creds,
        Ok(None) => {
            record_outcome(&ctx, &bot, Outcome::skipped("credentials missing")).await;
            return;
        }
        Err(e) => {
            tracing::warn!(strategy = %kind, bot_id = %bot.id, error = %e, "credential lookup failed");
            return;
        }
    };

    // (e)-(g) Strategy evaluation and action, bounded by the unit deadline
    // and the shutdown signal.
    let outcome = tokio::select! {
        result = tokio::time::timeout(WORK_UNIT_DEADLINE, worker.process(&ctx, &bot, &creds)) => {
            match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => Outcome::failed(e.to_string(), None),
                Err(_) => Outcome::failed("timeout", None),
            }
        }
        _ = shutdown.changed() => {
            if *shutdown.borrow() {
                Outcome::skipped("engine stopping")
            } else {
                Outcome::skipped("engine signal")
            }
        }
    };

    if matches!(outcome, Outcome::Noop) {
        if let Err(e) = ctx.repo.touch_last_checked(bot.id).await {
            tracing::debug!(bot_id = %bot.id, error = %e, "failed to touch last_checked_at");
        }
    }
    if let Outcome::Failed { reason, .. } = &outcome {
        ctx.emit(BotEvent::WorkFailed {
            strategy: kind,
            bot_id: bot.id,
            reason: reason.clone(),
        });
    }
    record_outcome(&ctx, &bot, outcome).await;
    // (h) The lock guard releases here on every path.
}

/// Exactly one activity log entry per outcome. Quiet outcomes (noop, gate
/// skips) stay in the advisory ring; anything that touched the venue or
/// failed is also appended durably. Every execution that placed orders is
/// announced on the event channel so the operator hears about it regardless
/// of which strategy acted.
async fn record_outcome(ctx: &EngineContext, bot: &BotSpec, outcome: Outcome) {
    if let Outcome::Submitted { orders } | Outcome::Partial { orders, .. } = &outcome {
        if !orders.is_empty() {
            ctx.emit(BotEvent::OrdersSubmitted {
                strategy: bot.kind(),
                bot_id: bot.id,
                symbol: bot.symbol.clone(),
                orders: orders.clone(),
                timestamp: Utc::now(),
            });
        }
    }

    let (message, durable) = match &outcome {
        Outcome::Noop => ("conditions not met".to_string(), false),
        Outcome::Skipped { reason } => (format!("skipped: {}", reason), false),
        Outcome::Submitted { orders } => (format!("submitted {} order(s)", orders.len()), true),
        Outcome::Partial { orders, failed } => (
            format!("partial: {} placed, {} failed", orders.len(), failed),
            true,
        ),
        Outcome::Failed { reason, .. } => (format!("failed: {}", reason), true),
    };
    let payload = serde_json::to_value(&outcome).unwrap_or_else(|_| json!({}));
    let entry = ActivityLog::new(Some(bot.id), bot.kind(), outcome.level(), message, payload);
    ctx.log(entry, durable).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_follow_configuration() {
        let config: SupervisorConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(tick_for(StrategyKind::Conditional, &config).as_secs(), 10);
        assert_eq!(tick_for(StrategyKind::Accumulator, &config).as_secs(), 60);
        assert_eq!(tick_for(StrategyKind::MarketMaker, &config).as_secs(), 30);
        assert_eq!(tick_for(StrategyKind::Stabilizer, &config).as_secs(), 5);
        assert_eq!(tick_for(StrategyKind::PriceKeeper, &config).as_secs(), 3);
        assert_eq!(tick_for(StrategyKind::BuyWall, &config).as_secs(), 10);
        assert_eq!(tick_for(StrategyKind::SellLiquidity, &config).as_secs(), 10);
        assert_eq!(tick_for(StrategyKind::PriceGap, &config).as_secs(), 3);
    }
}
