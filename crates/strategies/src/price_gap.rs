use core_types::PriceGapParams;
use rust_decimal::Decimal;

/// A decision to take a wide bid/ask gap.
#[derive(Debug, Clone, PartialEq)]
pub struct GapTake {
    /// Observed spread, percent of the bid.
    pub gap_percent: Decimal,
    /// Limit buy resting inside the gap at `bid · (1 + step%)`.
    pub limit_price: Decimal,
    /// Base quantity derived from the configured quote amount.
    pub qty: Decimal,
}

/// Checks the bid/ask spread against the configured threshold and, when it
/// is strictly exceeded, plans a limit buy inside the gap.
pub fn decide(
    params: &PriceGapParams,
    best_bid: Option<Decimal>,
    best_ask: Option<Decimal>,
) -> Option<GapTake> {
    let (bid, ask) = match (best_bid, best_ask) {
        (Some(bid), Some(ask)) if bid > Decimal::ZERO && ask > bid => (bid, ask),
        _ => return None,
    };

    let gap_percent = (ask - bid) / bid * Decimal::ONE_HUNDRED;
    if gap_percent <= params.gap_threshold_percent {
        return None;
    }

    let limit_price = bid * (Decimal::ONE + params.step_percent / Decimal::ONE_HUNDRED);
    if limit_price >= ask || limit_price <= Decimal::ZERO {
        // The step would cross the ask; taking at that price is no longer a
        // gap order.
        return None;
    }

    Some(GapTake {
        gap_percent,
        limit_price,
        qty: params.quote_amount / limit_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> PriceGapParams {
        PriceGapParams {
            gap_threshold_percent: dec!(2),
            step_percent: dec!(0.5),
            quote_amount: dec!(10),
            cooldown_seconds: 30,
        }
    }

    #[test]
    fn wide_spread_is_taken_inside_the_gap() {
        let take = decide(&params(), Some(dec!(0.0100)), Some(dec!(0.0105)))
            .expect("5% spread exceeds the 2% threshold");
        assert_eq!(take.gap_percent, dec!(5));
        assert_eq!(take.limit_price, dec!(0.01005));
        assert!(take.limit_price < dec!(0.0105));
        assert_eq!(take.qty, dec!(10) / dec!(0.01005));
    }

    #[test]
    fn narrow_spread_is_ignored() {
        assert!(decide(&params(), Some(dec!(0.0100)), Some(dec!(0.0101))).is_none());
    }

    #[test]
    fn threshold_equality_is_not_taken() {
        // Exactly 2%: not strictly greater, no action.
        assert!(decide(&params(), Some(dec!(0.0100)), Some(dec!(0.0102))).is_none());
    }

    #[test]
    fn one_sided_book_is_ignored() {
        assert!(decide(&params(), None, Some(dec!(0.0105))).is_none());
        assert!(decide(&params(), Some(dec!(0.0100)), None).is_none());
    }

    #[test]
    fn step_crossing_the_ask_aborts() {
        let mut p = params();
        p.step_percent = dec!(10);
        assert!(decide(&p, Some(dec!(0.0100)), Some(dec!(0.0105))).is_none());
    }
}
