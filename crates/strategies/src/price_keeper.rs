use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Divergence tolerance as a fraction of the ask.
const TOLERANCE_FACTOR: Decimal = dec!(0.0001);

/// True when the last trade has fallen measurably behind the best ask and a
/// micro market buy should re-sync it: `|M − A| > A·0.0001` and `M < A`.
pub fn should_resync(market_price: Decimal, best_ask: Decimal) -> bool {
    let tolerance = best_ask * TOLERANCE_FACTOR;
    (market_price - best_ask).abs() > tolerance && market_price < best_ask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divergence_within_tolerance_is_left_alone() {
        // |1.000000 − 1.000050| = 0.000050 ≤ tolerance 0.00010005.
        assert!(!should_resync(dec!(1.000000), dec!(1.000050)));
    }

    #[test]
    fn ask_moving_up_beyond_tolerance_triggers() {
        // |1.000000 − 1.000200| = 0.0002 > tolerance 0.00010002.
        assert!(should_resync(dec!(1.000000), dec!(1.000200)));
    }

    #[test]
    fn market_above_ask_never_triggers() {
        // Buying would push the price further from the ask.
        assert!(!should_resync(dec!(1.000500), dec!(1.000200)));
    }

    #[test]
    fn exact_tolerance_boundary_is_a_noop() {
        // |M − A| == A·0.0001 exactly: not strictly greater, no action.
        let ask = dec!(1);
        let market = ask - ask * TOLERANCE_FACTOR;
        assert!(!should_resync(market, ask));
    }
}
