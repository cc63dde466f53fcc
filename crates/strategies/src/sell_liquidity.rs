use chrono::{DateTime, Utc};
use core_types::{BookLevel, LiquidityMetrics, SellLiquidityParams, SymbolRules};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

/// Depth-fill weights for ladder positions 11–20, percent of the depth bucket.
const DEPTH_WEIGHTS: [u8; 10] = [5, 5, 5, 5, 10, 10, 10, 15, 15, 20];

/// Budget split between gap-filling (top 10) and depth-filling (11–20).
const GAP_BUDGET_SHARE: Decimal = dec!(0.2);
const DEPTH_BUDGET_SHARE: Decimal = dec!(0.8);

/// Own asks outside `[mid·0.98, mid·1.25]` are considered stale.
const STALE_LOWER: Decimal = dec!(0.98);
const STALE_UPPER: Decimal = dec!(1.25);

/// Anchor for orders at the front of the book: `mid · 1.005`.
const FRONT_ANCHOR: Decimal = dec!(1.005);

/// Multiplicative price step of the depth ladder: +0.5% per position.
const DEPTH_STEP: Decimal = dec!(1.005);

/// Repositioning: trigger when the book holds over 1.5× the required depth,
/// cancel up to 30% of own orders in `(mid·1.02, mid·1.10]`, highest first.
const REPOSITION_TRIGGER: Decimal = dec!(1.5);
const REPOSITION_FRACTION: Decimal = dec!(0.3);
const REPOSITION_ZONE_LOW: Decimal = dec!(1.02);
const REPOSITION_ZONE_HIGH: Decimal = dec!(1.10);

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Pure sell-side verdict over one book snapshot against the scaled
/// exchange requirements.
pub fn analyze(
    asks: &[BookLevel],
    params: &SellLiquidityParams,
    now: DateTime<Utc>,
) -> LiquidityMetrics {
    let mut asks = asks.to_vec();
    asks.sort_by(|a, b| a.price.cmp(&b.price));

    let sell_depth_2pct = match asks.first() {
        Some(best) => {
            let band_top = best.price * dec!(1.02);
            asks.iter()
                .take_while(|level| level.price < band_top)
                .map(BookLevel::notional)
                .sum()
        }
        None => Decimal::ZERO,
    };

    let sell_depth_top20: Decimal = asks.iter().take(20).map(BookLevel::notional).sum();
    let sell_order_count = asks.len() as u32;
    let gaps_ok = gap_violations(&asks, params.max_order_gap_percent).is_empty();

    let depth_2pct_ok = sell_depth_2pct >= params.effective_depth_2pct();
    let depth_top20_ok = sell_depth_top20 >= params.effective_depth_top20();
    let order_count_ok = sell_order_count >= params.min_order_count;

    LiquidityMetrics {
        sell_depth_2pct,
        sell_depth_top20,
        sell_order_count,
        gaps_ok,
        depth_2pct_ok,
        depth_top20_ok,
        order_count_ok,
        all_ok: gaps_ok && depth_2pct_ok && depth_top20_ok && order_count_ok,
        checked_at: now,
    }
}

/// Adjacent-ask gaps strictly wider than the tolerance, checked over the
/// first `min(20, len) − 1` pairs. Equality is compliant.
pub fn gap_violations(sorted_asks: &[BookLevel], max_gap_percent: Decimal) -> Vec<(usize, Decimal)> {
    let mut violations = Vec::new();
    if sorted_asks.len() < 2 {
        return violations;
    }
    let last_pair = (sorted_asks.len() - 2).min(19);
    for i in 0..=last_pair {
        let lower = sorted_asks[i].price;
        if lower <= Decimal::ZERO {
            continue;
        }
        let gap = (sorted_asks[i + 1].price - lower) / lower * Decimal::ONE_HUNDRED;
        if gap > max_gap_percent {
            violations.push((i, gap));
        }
    }
    violations
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// One of our asks currently resting on the book.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnOrder {
    pub order_id: String,
    pub price: Decimal,
    pub qty: Decimal,
}

/// A sell order the planner wants on the book.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOrder {
    pub price: Decimal,
    pub qty: Decimal,
}

impl PlannedOrder {
    pub fn notional(&self) -> Decimal {
        self.price * self.qty
    }
}

/// The maintenance actions for one pass.
#[derive(Debug, Clone, Default)]
pub struct LiquidityPlan {
    /// Own order ids priced outside the sane band around mid.
    pub stale_cancels: Vec<String>,
    /// Own order ids cancelled to reposition over-supplied depth.
    pub reposition_cancels: Vec<String>,
    /// New asks, gap fills first, then the depth ladder.
    pub orders: Vec<PlannedOrder>,
    /// Quote value of `orders`.
    pub budget_required: Decimal,
    /// True when the balance bound dropped part of the ladder.
    pub truncated: bool,
}

/// Builds the maintenance plan. Pure: all venue interaction happens in the
/// engine worker executing the plan.
pub fn plan(
    asks: &[BookLevel],
    mid: Decimal,
    own_orders: &[OwnOrder],
    available_base: Decimal,
    rules: &SymbolRules,
    params: &SellLiquidityParams,
    metrics: &LiquidityMetrics,
) -> LiquidityPlan {
    let mut asks = asks.to_vec();
    asks.sort_by(|a, b| a.price.cmp(&b.price));

    let mut plan = LiquidityPlan::default();
    if mid <= Decimal::ZERO {
        return plan;
    }

    // 1. Stale-order sweep.
    let stale_low = mid * STALE_LOWER;
    let stale_high = mid * STALE_UPPER;
    plan.stale_cancels = own_orders
        .iter()
        .filter(|o| o.price < stale_low || o.price > stale_high)
        .map(|o| o.order_id.clone())
        .collect();

    // 2. Budget split.
    let budget = params.effective_depth_top20();
    let gap_budget = budget * GAP_BUDGET_SHARE;
    let depth_budget = budget * DEPTH_BUDGET_SHARE;

    let mut proposed: Vec<PlannedOrder> = Vec::new();

    // 3. Gap-filling inside the top 10.
    let top10: Vec<BookLevel> = asks.iter().take(10).cloned().collect();
    let gaps = gap_violations(&top10, params.max_order_gap_percent);
    let front_anchor = mid * FRONT_ANCHOR;
    let needs_front = asks
        .first()
        .map(|best| best.price > front_anchor * dec!(1.01))
        .unwrap_or(true);

    let gap_slots = gaps.len() + usize::from(needs_front);
    if gap_slots > 0 {
        let share = gap_budget / Decimal::from(gap_slots as u64);
        if needs_front {
            proposed.push(PlannedOrder {
                price: front_anchor,
                qty: share / front_anchor,
            });
        }
        let half_gap = params.max_order_gap_percent / dec!(200);
        for (i, _) in &gaps {
            let price = top10[*i].price * (Decimal::ONE + half_gap);
            proposed.push(PlannedOrder {
                price,
                qty: share / price,
            });
        }
    }

    // 4. Depth ladder: 10 orders from the 10th ask (or the front anchor),
    //    stepping +0.5% per position, weighted toward the tail.
    let depth_start = if asks.len() >= 10 {
        asks[9].price
    } else {
        front_anchor
    };
    let mut price = depth_start;
    for weight in DEPTH_WEIGHTS {
        price *= DEPTH_STEP;
        let quota = depth_budget * Decimal::from(weight) / Decimal::ONE_HUNDRED;
        proposed.push(PlannedOrder {
            price,
            qty: quota / price,
        });
    }

    // 5. Round to venue precision, keep only prices strictly above mid, and
    //    deduplicate against the book, our own orders, and the plan itself.
    let mut taken: HashSet<Decimal> = own_orders
        .iter()
        .map(|o| rules.round_price(o.price))
        .chain(asks.iter().map(|l| rules.round_price(l.price)))
        .collect();
    let min_qty = rules.min_quantity.max(dec!(0.01));

    let mut deduped: Vec<PlannedOrder> = Vec::new();
    for order in proposed {
        let price = rules.round_price(order.price);
        let qty = rules.round_quantity(order.qty);
        if price <= mid || qty < min_qty {
            continue;
        }
        if !taken.insert(price) {
            continue;
        }
        deduped.push(PlannedOrder { price, qty });
    }

    // 6. Balance-bounded greedy truncation.
    let mut base_used = Decimal::ZERO;
    for order in deduped {
        if base_used + order.qty > available_base {
            plan.truncated = true;
            continue;
        }
        base_used += order.qty;
        plan.orders.push(order);
    }
    plan.budget_required = plan.orders.iter().map(PlannedOrder::notional).sum();

    // 7. Repositioning: over-supplied book and a sizeable inventory of our
    //    own orders in the near depth zone.
    if metrics.sell_depth_top20 > budget * REPOSITION_TRIGGER && own_orders.len() > 5 {
        let zone_low = mid * REPOSITION_ZONE_LOW;
        let zone_high = mid * REPOSITION_ZONE_HIGH;
        let mut candidates: Vec<&OwnOrder> = own_orders
            .iter()
            .filter(|o| o.price > zone_low && o.price <= zone_high)
            .collect();
        candidates.sort_by(|a, b| b.price.cmp(&a.price));
        let limit = (Decimal::from(own_orders.len() as u64) * REPOSITION_FRACTION)
            .floor()
            .to_usize()
            .unwrap_or(0);
        plan.reposition_cancels = candidates
            .into_iter()
            .take(limit)
            .map(|o| o.order_id.clone())
            .collect();
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SellLiquidityParams {
        SellLiquidityParams {
            scale_factor: dec!(1),
            min_depth_2_percent: dec!(500),
            min_depth_top20: dec!(1000),
            min_order_count: 30,
            max_order_gap_percent: dec!(1),
            check_interval_seconds: 10,
            auto_manage: true,
        }
    }

    fn rules() -> SymbolRules {
        SymbolRules {
            symbol: "GCBUSDT".to_string(),
            price_precision: 6,
            quantity_precision: 2,
            min_quantity: dec!(0.01),
        }
    }

    fn level(price: Decimal, qty: Decimal) -> BookLevel {
        BookLevel::new(price, qty)
    }

    #[test]
    fn analyzer_verdict_on_thin_book() {
        // Three asks, thin and gappy: every check fails.
        let asks = vec![
            level(dec!(1.000), dec!(100)),
            level(dec!(1.005), dec!(50)),
            level(dec!(1.020), dec!(200)),
        ];
        let metrics = analyze(&asks, &params(), Utc::now());

        assert_eq!(metrics.sell_depth_2pct, dec!(150.25));
        assert_eq!(
            metrics.sell_depth_top20,
            dec!(100) + dec!(1.005) * dec!(50) + dec!(1.020) * dec!(200)
        );
        assert_eq!(metrics.sell_order_count, 3);
        assert!(!metrics.depth_2pct_ok);
        assert!(!metrics.gaps_ok, "1.005→1.020 is a 1.49% gap");
        assert!(!metrics.order_count_ok);
        assert!(!metrics.all_ok);
    }

    #[test]
    fn gap_equal_to_tolerance_is_compliant() {
        let asks = vec![level(dec!(1.00), dec!(10)), level(dec!(1.01), dec!(10))];
        // Exactly 1%: compliant.
        assert!(gap_violations(&asks, dec!(1)).is_empty());
        // Anything strictly wider is not.
        let wider = vec![level(dec!(1.00), dec!(10)), level(dec!(1.0101), dec!(10))];
        assert_eq!(wider.len(), 2);
        assert_eq!(gap_violations(&wider, dec!(1)).len(), 1);
    }

    #[test]
    fn empty_book_yields_zero_metrics() {
        let metrics = analyze(&[], &params(), Utc::now());
        assert_eq!(metrics.sell_depth_2pct, Decimal::ZERO);
        assert_eq!(metrics.sell_order_count, 0);
        assert!(metrics.gaps_ok);
        assert!(!metrics.all_ok);
    }

    fn dense_book() -> Vec<BookLevel> {
        // Ten asks 0.1% apart starting at 1.000: no gap violations and a
        // front close enough to mid that no anchor order is needed.
        (0..10)
            .map(|i| {
                level(
                    dec!(1.000) + Decimal::from(i) * dec!(0.001),
                    dec!(50),
                )
            })
            .collect()
    }

    #[test]
    fn depth_ladder_follows_the_weighted_split() {
        let asks = dense_book();
        let mid = dec!(0.998);
        let metrics = analyze(&asks, &params(), Utc::now());
        let plan = plan(
            &asks,
            mid,
            &[],
            dec!(1_000_000),
            &rules(),
            &params(),
            &metrics,
        );

        // No gaps, no front order: the whole plan is the 10-rung ladder.
        assert_eq!(plan.orders.len(), 10);

        // Quote values follow [5,5,5,5,10,10,10,15,15,20]% of the 800 bucket,
        // up to quantity rounding.
        let expected = [
            dec!(40), dec!(40), dec!(40), dec!(40), dec!(80),
            dec!(80), dec!(80), dec!(120), dec!(120), dec!(160),
        ];
        for (order, want) in plan.orders.iter().zip(expected) {
            let diff = (order.notional() - want).abs();
            assert!(
                diff < dec!(0.05),
                "order at {} has notional {}, wanted ~{}",
                order.price,
                order.notional(),
                want
            );
        }

        // Lawfulness: total ≤ d20·s, strictly above mid, unique prices.
        assert!(plan.budget_required <= params().effective_depth_top20());
        let mut seen = HashSet::new();
        for order in &plan.orders {
            assert!(order.price > mid);
            assert!(seen.insert(order.price));
        }
        assert!(!plan.truncated);
    }

    #[test]
    fn gapped_front_gets_anchor_and_gap_orders() {
        // Front at 1.10 while mid is 1.0: the anchor at mid·1.005 applies,
        // and the 1.10→1.15 gap (4.5%) gets an in-gap order.
        let asks = vec![
            level(dec!(1.10), dec!(100)),
            level(dec!(1.15), dec!(100)),
        ];
        let mid = dec!(1.0);
        let metrics = analyze(&asks, &params(), Utc::now());
        let plan = plan(
            &asks,
            mid,
            &[],
            dec!(1_000_000),
            &rules(),
            &params(),
            &metrics,
        );

        let anchor = rules().round_price(mid * dec!(1.005));
        assert!(plan.orders.iter().any(|o| o.price == anchor));
        // In-gap order at 1.10 · (1 + 1%/2).
        let in_gap = rules().round_price(dec!(1.10) * dec!(1.005));
        assert!(plan.orders.iter().any(|o| o.price == in_gap));
    }

    #[test]
    fn stale_own_orders_are_swept() {
        let asks = dense_book();
        let mid = dec!(0.998);
        let own = vec![
            OwnOrder { order_id: "low".into(), price: dec!(0.90), qty: dec!(10) },
            OwnOrder { order_id: "fine".into(), price: dec!(1.01), qty: dec!(10) },
            OwnOrder { order_id: "high".into(), price: dec!(1.30), qty: dec!(10) },
        ];
        let metrics = analyze(&asks, &params(), Utc::now());
        let plan = plan(
            &asks,
            mid,
            &own,
            dec!(1_000_000),
            &rules(),
            &params(),
            &metrics,
        );
        assert_eq!(plan.stale_cancels, vec!["low".to_string(), "high".to_string()]);
    }

    #[test]
    fn planner_never_duplicates_existing_prices() {
        let asks = dense_book();
        let mid = dec!(0.998);
        let metrics = analyze(&asks, &params(), Utc::now());
        // Park an own order exactly where the first ladder rung would land.
        let first_rung = rules().round_price(asks[9].price * dec!(1.005));
        let own = vec![OwnOrder {
            order_id: "parked".into(),
            price: first_rung,
            qty: dec!(1),
        }];
        let plan = plan(
            &asks,
            mid,
            &own,
            dec!(1_000_000),
            &rules(),
            &params(),
            &metrics,
        );
        assert!(plan.orders.iter().all(|o| o.price != first_rung));
    }

    #[test]
    fn balance_bound_truncates_greedily() {
        let asks = dense_book();
        let mid = dec!(0.998);
        let metrics = analyze(&asks, &params(), Utc::now());
        // Enough base for only the first few rungs (~40 quote each ≈ 39.6 base).
        let plan = plan(&asks, mid, &[], dec!(100), &rules(), &params(), &metrics);

        assert!(plan.truncated);
        assert!(!plan.orders.is_empty());
        let total_base: Decimal = plan.orders.iter().map(|o| o.qty).sum();
        assert!(total_base <= dec!(100));
    }

    #[test]
    fn sub_minimum_orders_are_dropped() {
        let asks = dense_book();
        let mid = dec!(0.998);
        let metrics = analyze(&asks, &params(), Utc::now());
        let mut p = params();
        // A microscopic budget makes every rung round below the minimum.
        p.min_depth_top20 = dec!(0.05);
        let plan = plan(&asks, mid, &[], dec!(1_000_000), &rules(), &p, &metrics);
        assert!(plan.orders.is_empty());
    }

    #[test]
    fn oversupplied_book_repositions_highest_orders() {
        let asks: Vec<BookLevel> = (0..20)
            .map(|i| level(dec!(1.00) + Decimal::from(i) * dec!(0.001), dec!(500)))
            .collect();
        let mid = dec!(1.0);
        let metrics = analyze(&asks, &params(), Utc::now());
        assert!(metrics.sell_depth_top20 > dec!(1500));

        // Seven own orders, five inside (mid·1.02, mid·1.10].
        let own: Vec<OwnOrder> = [
            ("a", dec!(1.010)),
            ("b", dec!(1.030)),
            ("c", dec!(1.040)),
            ("d", dec!(1.050)),
            ("e", dec!(1.060)),
            ("f", dec!(1.090)),
            ("g", dec!(1.200)),
        ]
        .into_iter()
        .map(|(id, price)| OwnOrder {
            order_id: id.to_string(),
            price,
            qty: dec!(10),
        })
        .collect();

        let plan = plan(
            &asks,
            mid,
            &own,
            dec!(1_000_000),
            &rules(),
            &params(),
            &metrics,
        );
        // 30% of 7 orders → 2 cancels, highest-priced in-zone first.
        assert_eq!(
            plan.reposition_cancels,
            vec!["f".to_string(), "e".to_string()]
        );
    }
}
