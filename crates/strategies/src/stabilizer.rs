use chrono::{DateTime, Utc};
use core_types::{StabilizerParams, StabilizerRuntime};
use rust_decimal::Decimal;

/// What the stabilizer should do this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum StabilizerDecision {
    /// Reference price is already at or above target.
    OnTarget,
    /// The per-window spend cap is exhausted; wait for an operator reset.
    CapExhausted,
    /// No quote balance left to spend.
    NoBalance,
    /// Push the price with a market buy of this quote amount.
    Buy { quote: Decimal },
}

/// Decides one stabilizer pass from the declared reference price.
///
/// The buy amount is bounded by what remains of the window cap and by the
/// available quote balance.
pub fn decide(
    params: &StabilizerParams,
    runtime: &StabilizerRuntime,
    reference_price: Decimal,
    available_quote: Decimal,
) -> StabilizerDecision {
    if runtime.threshold_exceeded {
        return StabilizerDecision::CapExhausted;
    }
    if reference_price >= params.target_price {
        return StabilizerDecision::OnTarget;
    }

    let window_remaining = params.max_buy_amount - runtime.window_spent;
    if window_remaining <= Decimal::ZERO {
        return StabilizerDecision::CapExhausted;
    }

    let quote = window_remaining.min(available_quote);
    if quote <= Decimal::ZERO {
        return StabilizerDecision::NoBalance;
    }
    StabilizerDecision::Buy { quote }
}

/// Advances the runtime after an executed buy, latching the cap flag once the
/// window is spent. The latch stays set until the operator updates
/// `max_buy_amount`, which clears it frontend-side.
pub fn settle_buy(
    params: &StabilizerParams,
    runtime: &StabilizerRuntime,
    quote: Decimal,
    market_price: Decimal,
    final_price: Option<Decimal>,
    now: DateTime<Utc>,
) -> StabilizerRuntime {
    let mut next = runtime.clone();
    next.window_spent += quote;
    next.execution_count += 1;
    next.last_executed_at = Some(now);
    next.last_market_price = Some(market_price);
    next.last_final_price = final_price;
    if next.window_spent >= params.max_buy_amount {
        next.threshold_exceeded = true;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PriceReference;
    use rust_decimal_macros::dec;

    fn params() -> StabilizerParams {
        StabilizerParams {
            target_price: dec!(0.011),
            max_buy_amount: dec!(5),
            cooldown_seconds: 5,
            reference: PriceReference::LastTrade,
        }
    }

    #[test]
    fn buys_full_window_when_under_target_and_funded() {
        // Market 0.010 under target 0.011 with cap 5 and balance 100: one
        // market buy for exactly 5 quote units.
        let decision = decide(
            &params(),
            &StabilizerRuntime::default(),
            dec!(0.010),
            dec!(100),
        );
        assert_eq!(decision, StabilizerDecision::Buy { quote: dec!(5) });
    }

    #[test]
    fn execution_latches_cap_when_window_spent() {
        let runtime = settle_buy(
            &params(),
            &StabilizerRuntime::default(),
            dec!(5),
            dec!(0.010),
            Some(dec!(0.0104)),
            Utc::now(),
        );
        assert!(runtime.threshold_exceeded);
        assert_eq!(runtime.execution_count, 1);
        assert_eq!(runtime.window_spent, dec!(5));

        // The latch holds even when the price is still under target.
        assert_eq!(
            decide(&params(), &runtime, dec!(0.010), dec!(100)),
            StabilizerDecision::CapExhausted
        );
    }

    #[test]
    fn balance_bounds_the_buy() {
        let decision = decide(
            &params(),
            &StabilizerRuntime::default(),
            dec!(0.010),
            dec!(2.5),
        );
        assert_eq!(decision, StabilizerDecision::Buy { quote: dec!(2.5) });

        assert_eq!(
            decide(
                &params(),
                &StabilizerRuntime::default(),
                dec!(0.010),
                Decimal::ZERO
            ),
            StabilizerDecision::NoBalance
        );
    }

    #[test]
    fn at_or_above_target_is_a_noop() {
        assert_eq!(
            decide(&params(), &StabilizerRuntime::default(), dec!(0.011), dec!(100)),
            StabilizerDecision::OnTarget
        );
        assert_eq!(
            decide(&params(), &StabilizerRuntime::default(), dec!(0.012), dec!(100)),
            StabilizerDecision::OnTarget
        );
    }

    #[test]
    fn partial_window_spend_leaves_the_remainder() {
        let runtime = settle_buy(
            &params(),
            &StabilizerRuntime::default(),
            dec!(2),
            dec!(0.010),
            None,
            Utc::now(),
        );
        assert!(!runtime.threshold_exceeded);
        assert_eq!(
            decide(&params(), &runtime, dec!(0.010), dec!(100)),
            StabilizerDecision::Buy { quote: dec!(3) }
        );
    }
}
