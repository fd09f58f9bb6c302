use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEPTH: usize = 5;

// Price ranges in cents, half-open: buy [50.00, 150.00), sell [150.00, 250.00)
const BUY_CENTS: std::ops::Range<u32> = 5_000..15_000;
const SELL_CENTS: std::ops::Range<u32> = 15_000..25_000;
const VOLUME: std::ops::RangeInclusive<u32> = 1..=1_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub volume: u32,
}

/// Synthetic five-level depth. Carries no state between calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub buy: Vec<BookLevel>,
    pub sell: Vec<BookLevel>,
}

/// Draw a fresh book. Buy side is ordered best (highest) first, sell side
/// lowest first.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> OrderBookSnapshot {
    let mut buy = side(rng, BUY_CENTS);
    let mut sell = side(rng, SELL_CENTS);
    buy.sort_by(|a, b| b.price.total_cmp(&a.price));
    sell.sort_by(|a, b| a.price.total_cmp(&b.price));
    OrderBookSnapshot { buy, sell }
}

fn side<R: Rng + ?Sized>(rng: &mut R, cents: std::ops::Range<u32>) -> Vec<BookLevel> {
    (0..DEPTH)
        .map(|_| BookLevel {
            price: f64::from(rng.gen_range(cents.clone())) / 100.0,
            volume: rng.gen_range(VOLUME),
        })
        .collect()
}
