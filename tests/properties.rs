use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tick_feed::market::types::{price_decimals, round_to};
use tick_feed::market::{CatalogRecord, Instrument, Registry};
use tick_feed::sim::{order_book, PriceSimulator};

fn decimals_used(price: f64) -> u32 {
    (0..=2).find(|&d| round_to(price, d) == price).unwrap_or(3)
}

proptest! {
    #[test]
    fn walk_stays_in_band(base in 0.5f64..5_000.0, moves in prop::collection::vec(-0.01f64..=0.01, 1..400)) {
        let mut inst = Instrument::new("P", base);
        let (lo, hi) = inst.band();
        for delta in moves {
            let before = inst.current_price * (1.0 + delta);
            let quote = inst.apply_move(delta);

            prop_assert!(quote.price >= lo && quote.price <= hi, "{} outside [{}, {}]", quote.price, lo, hi);
            prop_assert_eq!(quote.amount_change, round_to(quote.price - base, 2));
            prop_assert_eq!(quote.percent_change, round_to(quote.amount_change / base * 100.0, 2));

            // Precision follows the tier of the clamped value that was rounded.
            let clamped = before.clamp(lo, hi);
            prop_assert!(decimals_used(quote.price) <= price_decimals(clamped));
        }
    }

    #[test]
    fn walk_keeps_tier_at_inexact_band_edges(
        base in prop::sample::select(vec![2.1, 13.0, 15.5, 0.7, 3.3, 27.3, 123.45, 731.0]),
        moves in prop::collection::vec(prop_oneof![Just(-0.01f64), Just(0.01f64), -0.01f64..=0.01], 1..400),
    ) {
        let mut inst = Instrument::new("P", base);
        let (lo, hi) = inst.band();
        for delta in moves {
            let clamped = (inst.current_price * (1.0 + delta)).clamp(lo, hi);
            let quote = inst.apply_move(delta);
            prop_assert!(quote.price >= lo && quote.price <= hi, "{} outside [{}, {}]", quote.price, lo, hi);
            prop_assert!(decimals_used(quote.price) <= price_decimals(clamped), "{} for base {}", quote.price, base);
        }
    }

    #[test]
    fn mutation_count_is_bounded(n in 1usize..40, seed in any::<u64>()) {
        let records = (0..n)
            .map(|i| CatalogRecord { symbol: format!("S{i}"), price: 10.0 + i as f64 })
            .collect();
        let mut sim = PriceSimulator::new(Registry::from_records(records).unwrap(), Some(seed));
        for _ in 0..20 {
            let tick = sim.step();
            prop_assert!(tick.len() >= 1 && tick.len() <= n.div_ceil(2));
        }
    }

    #[test]
    fn order_book_shape(seed in any::<u64>()) {
        let book = order_book::generate(&mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(book.buy.len(), 5);
        prop_assert_eq!(book.sell.len(), 5);
        prop_assert!(book.buy.iter().all(|l| (50.0..150.0).contains(&l.price) && (1..=1000).contains(&l.volume)));
        prop_assert!(book.sell.iter().all(|l| (150.0..250.0).contains(&l.price) && (1..=1000).contains(&l.volume)));
    }
}
