use crate::error::StrategyError;
use chrono::{DateTime, Duration, Utc};
use core_types::{AccumulatorParams, AccumulatorRuntime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Rejects parameter sets no schedule can be built from.
pub fn validate(params: &AccumulatorParams) -> Result<(), StrategyError> {
    if params.total_budget <= Decimal::ZERO {
        return Err(StrategyError::InvalidParameters(
            "total budget must be positive".to_string(),
        ));
    }
    if params.duration_hours == 0 {
        return Err(StrategyError::InvalidParameters(
            "duration must be at least one hour".to_string(),
        ));
    }
    if params.bid_offset_percent < Decimal::ZERO
        || params.bid_offset_percent >= Decimal::ONE_HUNDRED
    {
        return Err(StrategyError::InvalidParameters(
            "bid offset must be in [0, 100) percent".to_string(),
        ));
    }
    Ok(())
}

/// The two legs of one accumulation slice.
///
/// Half the slice is taken from sellers immediately; the other half rests
/// just below best ask to be filled by subsequent sellers.
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePlan {
    /// Quote value of the whole slice.
    pub slice: Decimal,
    /// Base quantity of the immediate market leg (`0.5 · slice / bestAsk`).
    pub market_qty: Decimal,
    /// Price of the resting limit leg (`bestAsk · (1 − offset%)`).
    pub limit_price: Decimal,
    /// Base quantity of the limit leg (half the slice at the limit price).
    pub limit_qty: Decimal,
}

/// Plans the next slice, or `None` when the schedule is complete, the slice
/// is not yet due, or the book gives no usable ask.
pub fn plan_slice(
    params: &AccumulatorParams,
    runtime: &AccumulatorRuntime,
    best_ask: Decimal,
    now: DateTime<Utc>,
) -> Option<SlicePlan> {
    if runtime.executed_buys >= params.duration_hours {
        return None;
    }
    if let Some(next) = runtime.next_buy_at {
        if now < next {
            return None;
        }
    }
    if best_ask <= Decimal::ZERO {
        return None;
    }

    let remaining = params.total_budget - runtime.spent_usdt;
    let slice = params.hourly_slice().min(remaining);
    if slice <= Decimal::ZERO {
        return None;
    }

    let half = slice / dec!(2);
    let limit_price = best_ask * (Decimal::ONE - params.bid_offset_percent / Decimal::ONE_HUNDRED);
    if limit_price <= Decimal::ZERO {
        return None;
    }

    Some(SlicePlan {
        slice,
        market_qty: half / best_ask,
        limit_price,
        limit_qty: half / limit_price,
    })
}

/// Advances the runtime after a slice attempt.
///
/// Only legs that reached the venue count as spend. A failed market leg does
/// not consume the slice (the hour is retried on the next due time), but the
/// schedule still advances one hour so a broken venue is not hammered.
pub fn settle_slice(
    runtime: &AccumulatorRuntime,
    plan: &SlicePlan,
    market_placed: bool,
    limit_placed: bool,
    now: DateTime<Utc>,
) -> AccumulatorRuntime {
    let half = plan.slice / dec!(2);
    let mut next = runtime.clone();

    if next.started_at.is_none() {
        next.started_at = Some(now);
    }
    if market_placed {
        next.spent_usdt += half;
        next.accumulated_base += plan.market_qty;
        next.executed_buys += 1;
    }
    if limit_placed {
        // The limit leg's quote is committed when the order is accepted;
        // fills are reconciled against balances, not tracked per order.
        next.spent_usdt += half;
    }
    next.next_buy_at = Some(now + Duration::hours(1));
    next
}

/// Budget conservation: `spent + remaining ≤ total` by construction.
pub fn remaining_budget(params: &AccumulatorParams, runtime: &AccumulatorRuntime) -> Decimal {
    (params.total_budget - runtime.spent_usdt).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AccumulatorParams {
        AccumulatorParams {
            total_budget: dec!(240),
            duration_hours: 24,
            bid_offset_percent: dec!(0.5),
        }
    }

    #[test]
    fn validation_rejects_degenerate_schedules() {
        assert!(validate(&params()).is_ok());

        let mut zero_budget = params();
        zero_budget.total_budget = Decimal::ZERO;
        assert!(matches!(
            validate(&zero_budget),
            Err(StrategyError::InvalidParameters(_))
        ));

        let mut no_hours = params();
        no_hours.duration_hours = 0;
        assert!(validate(&no_hours).is_err());

        let mut bad_offset = params();
        bad_offset.bid_offset_percent = dec!(100);
        assert!(validate(&bad_offset).is_err());
    }

    #[test]
    fn hour_one_slice_matches_schedule() {
        // totalBudget=240 over 24h at best-ask 1.000: market leg 5 quote,
        // limit leg 5 quote at 0.995.
        let plan = plan_slice(
            &params(),
            &AccumulatorRuntime::default(),
            dec!(1.000),
            Utc::now(),
        )
        .expect("first slice is due immediately");

        assert_eq!(plan.slice, dec!(10));
        assert_eq!(plan.market_qty, dec!(5));
        assert_eq!(plan.limit_price, dec!(0.995));
        assert_eq!(plan.limit_qty, dec!(5) / dec!(0.995));
    }

    #[test]
    fn settle_advances_counters_and_schedule() {
        let now = Utc::now();
        let plan = plan_slice(&params(), &AccumulatorRuntime::default(), dec!(1.000), now).unwrap();
        let runtime = settle_slice(&AccumulatorRuntime::default(), &plan, true, true, now);

        assert_eq!(runtime.spent_usdt, dec!(10));
        assert_eq!(runtime.executed_buys, 1);
        assert_eq!(runtime.accumulated_base, dec!(5));
        assert_eq!(runtime.next_buy_at, Some(now + Duration::hours(1)));
        assert_eq!(runtime.started_at, Some(now));
    }

    #[test]
    fn slice_waits_for_its_due_time() {
        let now = Utc::now();
        let mut runtime = AccumulatorRuntime::default();
        runtime.next_buy_at = Some(now + Duration::minutes(10));
        assert!(plan_slice(&params(), &runtime, dec!(1.000), now).is_none());

        runtime.next_buy_at = Some(now);
        assert!(plan_slice(&params(), &runtime, dec!(1.000), now).is_some());
    }

    #[test]
    fn schedule_stops_after_all_buys() {
        let mut runtime = AccumulatorRuntime::default();
        runtime.executed_buys = 24;
        assert!(plan_slice(&params(), &runtime, dec!(1.000), Utc::now()).is_none());
    }

    #[test]
    fn failed_market_leg_keeps_budget_untouched() {
        let now = Utc::now();
        let plan = plan_slice(&params(), &AccumulatorRuntime::default(), dec!(1.000), now).unwrap();
        let runtime = settle_slice(&AccumulatorRuntime::default(), &plan, false, false, now);
        assert_eq!(runtime.spent_usdt, Decimal::ZERO);
        assert_eq!(runtime.executed_buys, 0);
        // The hour still advances.
        assert_eq!(runtime.next_buy_at, Some(now + Duration::hours(1)));
    }

    #[test]
    fn partial_success_counts_only_the_market_half() {
        let now = Utc::now();
        let plan = plan_slice(&params(), &AccumulatorRuntime::default(), dec!(1.000), now).unwrap();
        let runtime = settle_slice(&AccumulatorRuntime::default(), &plan, true, false, now);
        assert_eq!(runtime.spent_usdt, dec!(5));
        assert_eq!(runtime.executed_buys, 1);
    }

    #[test]
    fn final_slice_is_clamped_to_remaining_budget() {
        let mut runtime = AccumulatorRuntime::default();
        runtime.spent_usdt = dec!(236);
        runtime.executed_buys = 23;
        let plan = plan_slice(&params(), &runtime, dec!(1.000), Utc::now()).unwrap();
        assert_eq!(plan.slice, dec!(4));

        let settled = settle_slice(&runtime, &plan, true, true, Utc::now());
        assert!(settled.spent_usdt <= params().total_budget);
        assert!(settled.executed_buys <= params().duration_hours);
    }

    #[test]
    fn budget_conservation_holds_across_full_schedule() {
        let p = params();
        let mut runtime = AccumulatorRuntime::default();
        let mut now = Utc::now();
        loop {
            let Some(plan) = plan_slice(&p, &runtime, dec!(1.000), now) else {
                break;
            };
            runtime = settle_slice(&runtime, &plan, true, true, now);
            assert!(runtime.spent_usdt + remaining_budget(&p, &runtime) <= p.total_budget);
            now += Duration::hours(1);
        }
        assert_eq!(runtime.executed_buys, 24);
        assert_eq!(runtime.spent_usdt, dec!(240));
    }
}
