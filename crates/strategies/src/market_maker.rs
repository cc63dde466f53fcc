use crate::error::StrategyError;
use core_types::{MarketMakerParams, MarketMakerRuntime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Oscillation floor as a fraction of the initial order size.
const SIZE_FLOOR_FACTOR: Decimal = dec!(0.4);

/// Rejects parameter sets that cannot quote or oscillate.
pub fn validate(params: &MarketMakerParams) -> Result<(), StrategyError> {
    if params.target_price <= Decimal::ZERO {
        return Err(StrategyError::InvalidParameters(
            "target price must be positive".to_string(),
        ));
    }
    if params.spread_percent <= Decimal::ZERO {
        return Err(StrategyError::InvalidParameters(
            "spread must be positive".to_string(),
        ));
    }
    if params.initial_order_size <= Decimal::ZERO || params.increment_step <= Decimal::ZERO {
        return Err(StrategyError::InvalidParameters(
            "order size and increment step must be positive".to_string(),
        ));
    }
    if let (Some(floor), Some(ceiling)) = (params.price_floor, params.price_ceiling) {
        if floor >= ceiling {
            return Err(StrategyError::InvalidParameters(
                "price floor must be below the ceiling".to_string(),
            ));
        }
    }
    Ok(())
}

/// One pass of the oscillating market-maker.
#[derive(Debug, Clone, PartialEq)]
pub enum MakerDecision {
    /// Market crossed the configured floor/ceiling; stop quoting until the
    /// bot is restarted.
    TargetReached,
    /// Place this pair of resting orders.
    Quote(QuotePair),
}

/// The two resting orders around the target price.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotePair {
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    /// Base size of both orders this round.
    pub order_size: Decimal,
}

/// Decides whether to quote and at what size.
pub fn decide(
    params: &MarketMakerParams,
    runtime: &MarketMakerRuntime,
    market_price: Decimal,
) -> MakerDecision {
    if runtime.target_reached {
        return MakerDecision::TargetReached;
    }
    if let Some(ceiling) = params.price_ceiling {
        if market_price >= ceiling {
            return MakerDecision::TargetReached;
        }
    }
    if let Some(floor) = params.price_floor {
        if market_price <= floor {
            return MakerDecision::TargetReached;
        }
    }

    let half_spread = params.spread_percent / dec!(200);
    let size = if runtime.current_order_size.is_zero() {
        params.initial_order_size
    } else {
        runtime.current_order_size
    };
    MakerDecision::Quote(QuotePair {
        bid_price: params.target_price * (Decimal::ONE - half_spread),
        ask_price: params.target_price * (Decimal::ONE + half_spread),
        order_size: size,
    })
}

/// Steps the order size one increment along the oscillation.
///
/// The size walks between 100% and 40% of the initial size; the direction
/// flips whenever a bound is reached.
pub fn next_size(
    params: &MarketMakerParams,
    current: Decimal,
    is_decreasing: bool,
) -> (Decimal, bool) {
    let upper = params.initial_order_size;
    let lower = params.initial_order_size * SIZE_FLOOR_FACTOR;
    let current = if current.is_zero() { upper } else { current };

    // At a bound the next move always heads away from it.
    let going_down = if current >= upper {
        true
    } else if current <= lower {
        false
    } else {
        is_decreasing
    };

    if going_down {
        let stepped = (current - params.increment_step).max(lower);
        (stepped, stepped > lower)
    } else {
        let stepped = (current + params.increment_step).min(upper);
        (stepped, stepped >= upper)
    }
}

/// Advances the runtime after a quoting round.
pub fn settle_round(
    params: &MarketMakerParams,
    runtime: &MarketMakerRuntime,
    quoted_size: Decimal,
    now: chrono::DateTime<chrono::Utc>,
) -> MarketMakerRuntime {
    let (size, is_decreasing) = next_size(params, quoted_size, runtime.is_decreasing);
    let mut next = runtime.clone();
    next.current_order_size = size;
    next.is_decreasing = is_decreasing;
    next.execution_count += 1;
    next.last_executed_at = Some(now);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MarketMakerParams {
        MarketMakerParams {
            target_price: dec!(0.0100),
            spread_percent: dec!(2),
            initial_order_size: dec!(1000),
            increment_step: dec!(200),
            price_floor: Some(dec!(0.0080)),
            price_ceiling: Some(dec!(0.0120)),
        }
    }

    #[test]
    fn validation_rejects_unquotable_parameters() {
        assert!(validate(&params()).is_ok());

        let mut no_spread = params();
        no_spread.spread_percent = Decimal::ZERO;
        assert!(matches!(
            validate(&no_spread),
            Err(StrategyError::InvalidParameters(_))
        ));

        let mut inverted_bounds = params();
        inverted_bounds.price_floor = Some(dec!(0.0130));
        assert!(validate(&inverted_bounds).is_err());

        let mut no_step = params();
        no_step.increment_step = Decimal::ZERO;
        assert!(validate(&no_step).is_err());
    }

    #[test]
    fn quotes_symmetric_pair_around_target() {
        let decision = decide(&params(), &MarketMakerRuntime::default(), dec!(0.0100));
        let MakerDecision::Quote(pair) = decision else {
            panic!("expected a quote");
        };
        // 2% spread: 1% each side of target.
        assert_eq!(pair.bid_price, dec!(0.009900));
        assert_eq!(pair.ask_price, dec!(0.010100));
        assert_eq!(pair.order_size, dec!(1000));
    }

    #[test]
    fn size_oscillates_between_full_and_forty_percent() {
        let p = params();
        let mut size = p.initial_order_size;
        let mut decreasing = true;
        let mut seen = Vec::new();
        for _ in 0..8 {
            let (next, dir) = next_size(&p, size, decreasing);
            seen.push(next);
            size = next;
            decreasing = dir;
        }
        assert_eq!(
            seen,
            vec![
                dec!(800),
                dec!(600),
                dec!(400), // floor reached, direction flips
                dec!(600),
                dec!(800),
                dec!(1000), // ceiling reached, direction flips
                dec!(800),
                dec!(600),
            ]
        );
        for s in seen {
            assert!(s >= dec!(400) && s <= dec!(1000));
        }
    }

    #[test]
    fn ceiling_cross_latches_target_reached() {
        assert_eq!(
            decide(&params(), &MarketMakerRuntime::default(), dec!(0.0120)),
            MakerDecision::TargetReached
        );
        assert_eq!(
            decide(&params(), &MarketMakerRuntime::default(), dec!(0.0080)),
            MakerDecision::TargetReached
        );

        let mut runtime = MarketMakerRuntime::default();
        runtime.target_reached = true;
        // Once latched, an in-range price still does not quote.
        assert_eq!(
            decide(&params(), &runtime, dec!(0.0100)),
            MakerDecision::TargetReached
        );
    }

    #[test]
    fn settle_round_steps_the_size() {
        let runtime = settle_round(
            &params(),
            &MarketMakerRuntime::default(),
            dec!(1000),
            chrono::Utc::now(),
        );
        assert_eq!(runtime.current_order_size, dec!(800));
        assert!(runtime.is_decreasing);
        assert_eq!(runtime.execution_count, 1);
    }

    #[test]
    fn uninitialised_size_adopts_the_initial() {
        let decision = decide(&params(), &MarketMakerRuntime::default(), dec!(0.0100));
        let MakerDecision::Quote(pair) = decision else {
            panic!("expected a quote");
        };
        assert_eq!(pair.order_size, params().initial_order_size);
    }
}
