use chrono::{DateTime, Duration, Utc};
use core_types::{ConditionalParams, ConditionalRuntime, PriceCondition};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Selects the conditions that should fire right now.
///
/// A condition fires when a price is known for its symbol, `price OP
/// threshold` holds, and its own cooldown has elapsed. Conditions on the same
/// bot are independent; several may fire in the same tick.
pub fn triggered_conditions<'a>(
    params: &'a ConditionalParams,
    runtime: &ConditionalRuntime,
    prices: &HashMap<String, Decimal>,
    now: DateTime<Utc>,
) -> Vec<&'a PriceCondition> {
    params
        .conditions
        .iter()
        .filter(|condition| {
            let Some(price) = prices.get(&condition.symbol) else {
                return false;
            };
            if !condition.operator.holds(*price, condition.threshold) {
                return false;
            }
            cooldown_elapsed(runtime, condition, now)
        })
        .collect()
}

fn cooldown_elapsed(
    runtime: &ConditionalRuntime,
    condition: &PriceCondition,
    now: DateTime<Utc>,
) -> bool {
    match runtime.last_triggered.get(&condition.id) {
        Some(last) => now - *last >= Duration::seconds(condition.cooldown_seconds as i64),
        None => true,
    }
}

/// The distinct symbols a bot's conditions reference, so the engine fetches
/// each price once per tick.
pub fn symbols_in_use(params: &ConditionalParams) -> Vec<String> {
    let mut symbols: Vec<String> = params
        .conditions
        .iter()
        .map(|c| c.symbol.clone())
        .collect();
    symbols.sort();
    symbols.dedup();
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{OrderSide, OrderType, PriceOperator};
    use rust_decimal_macros::dec;

    fn condition(id: &str, operator: PriceOperator, threshold: Decimal) -> PriceCondition {
        PriceCondition {
            id: id.to_string(),
            symbol: "GCBUSDT".to_string(),
            operator,
            threshold,
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            size: dec!(5),
            limit_price: None,
            cooldown_seconds: 60,
        }
    }

    fn prices(price: Decimal) -> HashMap<String, Decimal> {
        HashMap::from([("GCBUSDT".to_string(), price)])
    }

    #[test]
    fn fires_when_operator_holds_and_no_prior_trigger() {
        let params = ConditionalParams {
            conditions: vec![condition("c1", PriceOperator::Below, dec!(0.011))],
        };
        let fired = triggered_conditions(
            &params,
            &ConditionalRuntime::default(),
            &prices(dec!(0.010)),
            Utc::now(),
        );
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, "c1");
    }

    #[test]
    fn respects_per_condition_cooldown() {
        let params = ConditionalParams {
            conditions: vec![condition("c1", PriceOperator::Below, dec!(0.011))],
        };
        let now = Utc::now();
        let mut runtime = ConditionalRuntime::default();
        runtime
            .last_triggered
            .insert("c1".to_string(), now - Duration::seconds(30));

        assert!(triggered_conditions(&params, &runtime, &prices(dec!(0.010)), now).is_empty());

        // The exact boundary fires again.
        runtime
            .last_triggered
            .insert("c1".to_string(), now - Duration::seconds(60));
        assert_eq!(
            triggered_conditions(&params, &runtime, &prices(dec!(0.010)), now).len(),
            1
        );
    }

    #[test]
    fn multiple_conditions_fire_independently_in_one_tick() {
        let params = ConditionalParams {
            conditions: vec![
                condition("below", PriceOperator::Below, dec!(0.011)),
                condition("above", PriceOperator::Above, dec!(0.009)),
                condition("too-high", PriceOperator::Above, dec!(0.02)),
            ],
        };
        let fired = triggered_conditions(
            &params,
            &ConditionalRuntime::default(),
            &prices(dec!(0.010)),
            Utc::now(),
        );
        let ids: Vec<&str> = fired.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["below", "above"]);
    }

    #[test]
    fn unknown_symbol_price_never_fires() {
        let mut c = condition("c1", PriceOperator::Above, dec!(0));
        c.symbol = "OTHERUSDT".to_string();
        let params = ConditionalParams { conditions: vec![c] };
        assert!(triggered_conditions(
            &params,
            &ConditionalRuntime::default(),
            &prices(dec!(0.010)),
            Utc::now()
        )
        .is_empty());
    }

    #[test]
    fn symbols_deduplicate() {
        let params = ConditionalParams {
            conditions: vec![
                condition("a", PriceOperator::Below, dec!(1)),
                condition("b", PriceOperator::Above, dec!(2)),
            ],
        };
        assert_eq!(symbols_in_use(&params), vec!["GCBUSDT".to_string()]);
    }
}
