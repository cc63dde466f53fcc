use crate::error::DbError;
use chrono::{DateTime, Utc};
use core_types::{
    ActivityLog, BotSpec, LogLevel, StrategyKind, StrategySpec, TradeRecord, User,
};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// High-level, application-specific interface to the persisted bot state.
///
/// Encapsulates all SQL. Every update is field-scoped: the engine writes only
/// runtime fields (`is_running`, `runtime`, `next_run_at`, `last_checked_at`)
/// and never touches intent fields owned by the frontend.
#[derive(Debug, Clone)]
pub struct BotRepository {
    pool: PgPool,
}

/// A raw row from the `bots` table before the strategy payloads are typed.
#[derive(Debug, Clone, FromRow)]
struct DbBotRow {
    bot_id: Uuid,
    user_id: Uuid,
    name: String,
    symbol: String,
    strategy: String,
    is_active: bool,
    is_running: bool,
    params: JsonValue,
    runtime: JsonValue,
    next_run_at: Option<DateTime<Utc>>,
    last_checked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DbBotRow {
    fn into_spec(self) -> Result<BotSpec, DbError> {
        let strategy = StrategySpec::from_parts(&self.strategy, &self.params, &self.runtime)?;
        Ok(BotSpec {
            id: self.bot_id,
            user_id: self.user_id,
            name: self.name,
            symbol: self.symbol,
            is_active: self.is_active,
            is_running: self.is_running,
            next_run_at: self.next_run_at,
            last_checked_at: self.last_checked_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            strategy,
        })
    }
}

const BOT_COLUMNS: &str = "b.bot_id, b.user_id, b.name, b.symbol, b.strategy, b.is_active, \
     b.is_running, b.params, b.runtime, b.next_run_at, b.last_checked_at, b.created_at, \
     b.updated_at";

impl BotRepository {
    /// Creates a new repository over a shared connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DbError> {
        let row = sqlx::query(
            "SELECT user_id, bot_enabled, \
                    (api_key IS NOT NULL AND api_secret IS NOT NULL) AS has_credentials, \
                    created_at, updated_at \
             FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(User {
                id: row.try_get("user_id")?,
                bot_enabled: row.try_get("bot_enabled")?,
                has_credentials: row.try_get("has_credentials")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    /// Flips the user's global opt-in flag. Engines observe the change on
    /// their next tick through the admission join in `due_bots`.
    pub async fn set_bot_enabled(&self, user_id: Uuid, enabled: bool) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE users SET bot_enabled = $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Bots
    // ------------------------------------------------------------------

    pub async fn fetch_bot(&self, bot_id: Uuid) -> Result<Option<BotSpec>, DbError> {
        let row = sqlx::query_as::<_, DbBotRow>(&format!(
            "SELECT {} FROM bots b WHERE b.bot_id = $1",
            BOT_COLUMNS
        ))
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(DbBotRow::into_spec).transpose()
    }

    /// The "due bots" query: active, running, owned by an enabled and
    /// credentialed user, and either unscheduled or past their next run.
    /// Rows with an unparseable strategy payload are skipped with a warning
    /// rather than poisoning the whole tick.
    pub async fn due_bots(
        &self,
        kind: StrategyKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<BotSpec>, DbError> {
        let rows = sqlx::query_as::<_, DbBotRow>(&format!(
            "SELECT {} FROM bots b \
             JOIN users u ON u.user_id = b.user_id \
             WHERE b.strategy = $1 \
               AND b.is_active AND b.is_running \
               AND u.bot_enabled \
               AND u.api_key IS NOT NULL AND u.api_secret IS NOT NULL \
               AND (b.next_run_at IS NULL OR b.next_run_at <= $2) \
             ORDER BY b.created_at",
            BOT_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut bots = Vec::with_capacity(rows.len());
        for row in rows {
            let bot_id = row.bot_id;
            match row.into_spec() {
                Ok(bot) => bots.push(bot),
                Err(e) => {
                    tracing::warn!(%bot_id, error = %e, "skipping bot with invalid document");
                }
            }
        }
        Ok(bots)
    }

    /// Counts bots that would pass admission for a strategy right now.
    pub async fn count_live_bots(&self, kind: StrategyKind) -> Result<i64, DbError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM bots b \
             JOIN users u ON u.user_id = b.user_id \
             WHERE b.strategy = $1 \
               AND b.is_active AND b.is_running \
               AND u.bot_enabled \
               AND u.api_key IS NOT NULL AND u.api_secret IS NOT NULL",
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    /// Engine-side admission flag. Setting it true is guarded so the engine
    /// can never revive a bot the user has deactivated in the meantime.
    pub async fn set_running(&self, bot_id: Uuid, running: bool) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE bots SET is_running = $2, updated_at = now() \
             WHERE bot_id = $1 AND (NOT $2 OR is_active)",
        )
        .bind(bot_id)
        .bind(running)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persists the runtime half of a bot's strategy state plus scheduling
    /// fields. Never touches params or intent flags.
    pub async fn save_runtime(
        &self,
        bot_id: Uuid,
        runtime: &JsonValue,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE bots SET runtime = $2, next_run_at = $3, \
                    last_checked_at = now(), updated_at = now() \
             WHERE bot_id = $1",
        )
        .bind(bot_id)
        .bind(runtime)
        .bind(next_run_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records a no-action pass without touching anything else.
    pub async fn touch_last_checked(&self, bot_id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE bots SET last_checked_at = now() WHERE bot_id = $1")
            .bind(bot_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Trade records (append-only)
    // ------------------------------------------------------------------

    pub async fn insert_trade(&self, trade: &TradeRecord) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO trade_records \
             (trade_id, bot_id, user_id, strategy, symbol, side, order_type, \
              requested_qty, requested_quote, executed_qty, price, venue_order_id, \
              status, error, raw_response, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(trade.id)
        .bind(trade.bot_id)
        .bind(trade.user_id)
        .bind(trade.strategy.as_str())
        .bind(&trade.symbol)
        .bind(trade.side.as_str())
        .bind(trade.order_type.as_str())
        .bind(trade.requested_qty)
        .bind(trade.requested_quote)
        .bind(trade.executed_qty)
        .bind(trade.price)
        .bind(&trade.venue_order_id)
        .bind(trade.status.as_str())
        .bind(&trade.error)
        .bind(&trade.raw_response)
        .bind(trade.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Activity logs (append-only)
    // ------------------------------------------------------------------

    pub async fn insert_log(&self, log: &ActivityLog) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO activity_logs \
             (log_id, bot_id, strategy, level, message, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(log.id)
        .bind(log.bot_id)
        .bind(log.strategy.as_str())
        .bind(log.level.as_str())
        .bind(&log.message)
        .bind(&log.payload)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent durable log entries for one strategy, newest first.
    pub async fn recent_logs(
        &self,
        kind: StrategyKind,
        limit: i64,
    ) -> Result<Vec<ActivityLog>, DbError> {
        let rows = sqlx::query(
            "SELECT log_id, bot_id, strategy, level, message, payload, created_at \
             FROM activity_logs WHERE strategy = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(kind.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let level: String = row.try_get("level")?;
                Ok(ActivityLog {
                    id: row.try_get("log_id")?,
                    bot_id: row.try_get("bot_id")?,
                    strategy: kind,
                    level: LogLevel::parse(&level).unwrap_or(LogLevel::Info),
                    message: row.try_get("message")?,
                    payload: row.try_get("payload")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
