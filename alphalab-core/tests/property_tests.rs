//! Property tests for kernel invariants.
//!
//! Uses proptest to verify:
//! 1. Commission floor and per-tier monotonicity
//! 2. Cash accounting: every fill moves cash by exactly its signed notional plus commission
//! 3. Equity identity: equity equals cash plus marked positions after every event
//! 4. Equity curve: strictly increasing timestamps, idempotent bar replays
//! 5. Drawdown bounds

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use alphalab_core::analysis::{drawdown_stats, total_return};
use alphalab_core::domain::{Bar, FillEvent, OrderSide};
use alphalab_core::engine::execution::CommissionSchedule;
use alphalab_core::engine::{Portfolio, PortfolioConfig, TieredCommission};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_side() -> impl Strategy<Value = OrderSide> {
    prop_oneof![Just(OrderSide::Buy), Just(OrderSide::Sell)]
}

fn arb_fills() -> impl Strategy<Value = Vec<(OrderSide, u64, f64)>> {
    prop::collection::vec((arb_side(), 1..2_000_u64, arb_price()), 1..40)
}

fn t(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
}

// ── 1. Commission ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn commission_never_below_floor(q in 0..1_000_000_u64) {
        prop_assert!(TieredCommission::default().commission(q) >= 1.30);
    }

    #[test]
    fn commission_monotonic_within_tier(a in 0..=500_u64, b in 0..=500_u64, c in 501..1_000_000_u64, d in 501..1_000_000_u64) {
        let fees = TieredCommission::default();
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(fees.commission(lo) <= fees.commission(hi));
        let (lo, hi) = (c.min(d), c.max(d));
        prop_assert!(fees.commission(lo) <= fees.commission(hi));
    }
}

// ── 2 & 3. Cash accounting and equity identity ───────────────────────

proptest! {
    #[test]
    fn cash_moves_by_signed_notional_and_commission(fills in arb_fills()) {
        let fees = TieredCommission::default();
        let mut p = Portfolio::new(1_000_000.0, t(0), PortfolioConfig::default());
        p.on_market(&Bar::new("X", t(1), 100.0, 100.0, 100.0, 100.0, 1.0)).unwrap();

        for (side, quantity, price) in fills {
            let before = p.cash();
            let fill = FillEvent {
                timestamp: t(1),
                symbol: "X".into(),
                venue: "ARCA".into(),
                quantity,
                side,
                fill_cost: price,
                commission: fees.commission(quantity),
            };
            p.on_fill(&fill).unwrap();

            let signed_notional = side.sign() as f64 * quantity as f64 * price;
            let expected = before - signed_notional - fill.commission;
            prop_assert!((p.cash() - expected).abs() < 1e-6);
            prop_assert!(p.verify_equity());
        }
    }

    #[test]
    fn position_quantity_is_sum_of_signed_fills(fills in arb_fills()) {
        let mut p = Portfolio::new(1_000_000.0, t(0), PortfolioConfig::default());
        let mut net = 0_i64;
        for (side, quantity, price) in fills {
            net += side.sign() * quantity as i64;
            p.on_fill(&FillEvent {
                timestamp: t(1),
                symbol: "X".into(),
                venue: "ARCA".into(),
                quantity,
                side,
                fill_cost: price,
                commission: 0.0,
            }).unwrap();
        }
        prop_assert_eq!(p.quantity("X"), net);
        prop_assert_eq!(p.position("X").is_none(), net == 0);
    }
}

// ── 4. Equity curve ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn curve_is_strictly_increasing_and_replays_are_idempotent(
        closes in prop::collection::vec(arb_price(), 1..50),
        replay in any::<prop::sample::Index>(),
    ) {
        let mut p = Portfolio::new(100_000.0, t(0), PortfolioConfig::default());
        p.on_fill(&FillEvent {
            timestamp: t(0),
            symbol: "X".into(),
            venue: "ARCA".into(),
            quantity: 10,
            side: OrderSide::Buy,
            fill_cost: 100.0,
            commission: 1.30,
        }).unwrap();

        for (i, &close) in closes.iter().enumerate() {
            p.on_market(&Bar::new("X", t(i as i64 + 1), close, close, close, close, 1.0)).unwrap();
        }
        let curve = p.equity_curve().to_vec();
        prop_assert_eq!(curve.len(), closes.len() + 1);
        prop_assert!(curve.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        // Replaying the last bar changes nothing.
        let last = closes.len() - 1;
        let close = closes[last];
        p.on_market(&Bar::new("X", t(last as i64 + 1), close, close, close, close, 1.0)).unwrap();
        prop_assert_eq!(p.equity_curve(), curve.as_slice());

        // Any earlier bar is rejected.
        let earlier = replay.index(closes.len()) as i64;
        if earlier < last as i64 {
            prop_assert!(p.on_market(&Bar::new("X", t(earlier + 1), 1.0, 1.0, 1.0, 1.0, 1.0)).is_err());
        }
    }
}

// ── 5. Drawdown ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn drawdown_is_a_fraction(equity in prop::collection::vec(1.0..1e6_f64, 0..100)) {
        let (dd, duration) = drawdown_stats(&equity);
        prop_assert!((0.0..1.0).contains(&dd));
        prop_assert!(duration < equity.len().max(1));
        prop_assert!(total_return(&equity).is_finite());
    }
}
