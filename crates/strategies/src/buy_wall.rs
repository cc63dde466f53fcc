use crate::error::StrategyError;
use core_types::{BuyWallParams, PlacedRung, WallRung};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Rejects walls the ladder logic cannot maintain: no rungs, non-positive
/// entries, or rungs out of descending price order (highest bid first).
pub fn validate(params: &BuyWallParams) -> Result<(), StrategyError> {
    if params.rungs.is_empty() {
        return Err(StrategyError::InvalidParameters(
            "wall has no rungs".to_string(),
        ));
    }
    if params
        .rungs
        .iter()
        .any(|rung| rung.price <= Decimal::ZERO || rung.quote_amount <= Decimal::ZERO)
    {
        return Err(StrategyError::InvalidParameters(
            "rung prices and quote amounts must be positive".to_string(),
        ));
    }
    if !rungs_sorted_descending(params) {
        return Err(StrategyError::InvalidParameters(
            "rungs must be sorted descending by price".to_string(),
        ));
    }
    Ok(())
}

/// A rung converted to an order: base quantity computed from the quote
/// amount at the rung price.
#[derive(Debug, Clone, PartialEq)]
pub struct RungOrder {
    pub price: Decimal,
    pub quote_amount: Decimal,
    pub qty: Decimal,
}

fn to_order(rung: &WallRung) -> Option<RungOrder> {
    if rung.price <= Decimal::ZERO || rung.quote_amount <= Decimal::ZERO {
        return None;
    }
    Some(RungOrder {
        price: rung.price,
        quote_amount: rung.quote_amount,
        qty: rung.quote_amount / rung.price,
    })
}

/// The full ladder for first activation. Rungs with nonsensical values are
/// dropped rather than failing the wall.
pub fn initial_orders(params: &BuyWallParams) -> Vec<RungOrder> {
    params.rungs.iter().filter_map(to_order).collect()
}

/// True when the rungs are sorted descending by price, the shape the wall
/// expects (highest bid first).
pub fn rungs_sorted_descending(params: &BuyWallParams) -> bool {
    params
        .rungs
        .windows(2)
        .all(|pair| pair[0].price >= pair[1].price)
}

/// Rungs whose resting order has disappeared from the open-order set
/// (filled, or cancelled externally) and must be reposted.
pub fn rungs_to_refill<'a>(
    placed: &'a [PlacedRung],
    open_order_ids: &HashSet<String>,
) -> Vec<&'a PlacedRung> {
    placed
        .iter()
        .filter(|rung| !open_order_ids.contains(&rung.venue_order_id))
        .collect()
}

/// Rungs whose placement failed last time and should be retried alongside
/// any refills.
pub fn rungs_to_retry<'a>(params: &'a BuyWallParams, failed: &[Decimal]) -> Vec<RungOrder> {
    params
        .rungs
        .iter()
        .filter(|rung| failed.contains(&rung.price))
        .filter_map(to_order)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> BuyWallParams {
        BuyWallParams {
            target_price: dec!(0.0100),
            rungs: vec![
                WallRung { price: dec!(0.0098), quote_amount: dec!(49) },
                WallRung { price: dec!(0.0096), quote_amount: dec!(48) },
                WallRung { price: dec!(0.0094), quote_amount: dec!(47) },
            ],
        }
    }

    #[test]
    fn validation_rejects_unusable_walls() {
        assert!(validate(&params()).is_ok());

        let empty = BuyWallParams {
            target_price: dec!(0.0100),
            rungs: vec![],
        };
        assert!(matches!(
            validate(&empty),
            Err(StrategyError::InvalidParameters(_))
        ));

        let mut unsorted = params();
        unsorted.rungs.swap(0, 2);
        assert!(validate(&unsorted).is_err());

        let mut negative = params();
        negative.rungs[1].quote_amount = Decimal::ZERO;
        assert!(validate(&negative).is_err());
    }

    #[test]
    fn ladder_converts_quote_to_base_quantity() {
        let orders = initial_orders(&params());
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0].qty, dec!(49) / dec!(0.0098));
        assert_eq!(orders[2].price, dec!(0.0094));
    }

    #[test]
    fn descending_order_is_recognised() {
        assert!(rungs_sorted_descending(&params()));

        let mut shuffled = params();
        shuffled.rungs.swap(0, 2);
        assert!(!rungs_sorted_descending(&shuffled));
    }

    #[test]
    fn zero_priced_rungs_are_dropped() {
        let mut p = params();
        p.rungs.push(WallRung { price: Decimal::ZERO, quote_amount: dec!(10) });
        assert_eq!(initial_orders(&p).len(), 3);
    }

    #[test]
    fn missing_orders_are_selected_for_refill() {
        let placed = vec![
            PlacedRung {
                price: dec!(0.0098),
                quote_amount: dec!(49),
                venue_order_id: "1".to_string(),
            },
            PlacedRung {
                price: dec!(0.0096),
                quote_amount: dec!(48),
                venue_order_id: "2".to_string(),
            },
        ];
        // Order "1" was filled; only "2" is still on the book.
        let open: HashSet<String> = HashSet::from(["2".to_string()]);
        let refill = rungs_to_refill(&placed, &open);
        assert_eq!(refill.len(), 1);
        assert_eq!(refill[0].price, dec!(0.0098));
    }

    #[test]
    fn nothing_refills_while_all_orders_rest() {
        let placed = vec![PlacedRung {
            price: dec!(0.0098),
            quote_amount: dec!(49),
            venue_order_id: "1".to_string(),
        }];
        let open: HashSet<String> = HashSet::from(["1".to_string()]);
        assert!(rungs_to_refill(&placed, &open).is_empty());
    }

    #[test]
    fn failed_rungs_retry_by_price() {
        let retry = rungs_to_retry(&params(), &[dec!(0.0096)]);
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].price, dec!(0.0096));
    }
}
