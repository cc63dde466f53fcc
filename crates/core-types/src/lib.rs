pub mod bot;
pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use bot::{
    AccumulatorParams, AccumulatorRuntime, BotSpec, BuyWallParams, BuyWallRuntime,
    ConditionalParams, ConditionalRuntime, LiquidityMetrics, MarketMakerParams,
    MarketMakerRuntime, PlacedRung, PriceCondition, PriceGapParams, PriceGapRuntime,
    PriceKeeperParams, PriceKeeperRuntime, SellLiquidityParams, SellLiquidityRuntime,
    StabilizerParams, StabilizerRuntime, StrategySpec, WallRung,
};
pub use enums::{
    LogLevel, OrderSide, OrderType, PriceOperator, PriceReference, StrategyKind, TimeInForce,
    TradeStatus,
};
pub use error::CoreError;
pub use structs::{
    ActivityLog, BookLevel, Credentials, MarketSnapshot, OrderRef, OrderRequest, Outcome,
    SymbolRules, TradeRecord, User,
};

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn strategy_kind_round_trips_through_discriminator() {
        for kind in StrategyKind::ALL {
            assert_eq!(StrategyKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(StrategyKind::parse("arbitrage"), None);
    }

    #[test]
    fn order_side_serializes_in_venue_format() {
        assert_eq!(serde_json::to_string(&OrderSide::Buy).unwrap(), "\"BUY\"");
        let side: OrderSide = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(side, OrderSide::Sell);
    }

    #[test]
    fn price_operator_includes_equality_variants() {
        assert!(PriceOperator::BelowOrEqual.holds(dec!(1), dec!(1)));
        assert!(PriceOperator::AboveOrEqual.holds(dec!(1), dec!(1)));
        assert!(!PriceOperator::Below.holds(dec!(1), dec!(1)));
        assert!(!PriceOperator::Above.holds(dec!(1), dec!(1)));
    }

    #[test]
    fn spec_loads_from_discriminator_and_defaults_runtime() {
        let params = json!({
            "target_price": "0.011",
            "max_buy_amount": "5",
            "cooldown_seconds": 5
        });
        let spec = StrategySpec::from_parts("stabilizer", &params, &json!({})).unwrap();
        match &spec {
            StrategySpec::Stabilizer { params, runtime } => {
                assert_eq!(params.target_price, dec!(0.011));
                assert_eq!(runtime.execution_count, 0);
                assert!(!runtime.threshold_exceeded);
            }
            other => panic!("wrong variant: {:?}", other.kind()),
        }
        assert_eq!(spec.cooldown_seconds(), Some(5));
    }

    #[test]
    fn spec_rejects_unknown_discriminator() {
        let err = StrategySpec::from_parts("momentum", &json!({}), &json!({})).unwrap_err();
        assert!(matches!(err, CoreError::UnknownStrategy(_)));
    }

    #[test]
    fn symbol_rules_round_quantity_toward_zero() {
        let rules = SymbolRules {
            symbol: "GCBUSDT".into(),
            price_precision: 6,
            quantity_precision: 2,
            min_quantity: dec!(0.01),
        };
        assert_eq!(rules.round_quantity(dec!(1.999)), dec!(1.99));
        assert_eq!(rules.round_price(dec!(0.0123456789)), dec!(0.012346));
    }

    #[test]
    fn credentials_debug_never_prints_the_secret() {
        let creds = Credentials {
            api_key: "public-key".to_string(),
            api_secret: "super-secret".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("public-key"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn only_submitted_and_partial_outcomes_move_money() {
        assert!(!Outcome::Noop.moved_money());
        assert!(!Outcome::skipped("cooldown").moved_money());
        assert!(!Outcome::failed("venue rejection", None).moved_money());
        assert!(Outcome::Submitted { orders: vec![] }.moved_money());
        assert!(Outcome::Partial { orders: vec![], failed: 1 }.moved_money());
    }
}
