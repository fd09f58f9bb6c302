use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, trace};

use crate::market::{PriceTick, Registry};

// Largest single-interval move, as a fraction of the current price.
pub const MAX_STEP_PCT: f64 = 0.01;

/// Random-walks a subset of the registry each interval.
pub struct PriceSimulator<R = StdRng> {
    registry: Registry,
    rng: R,
}

impl PriceSimulator<StdRng> {
    /// Seeded for reproducible runs, OS entropy otherwise.
    pub fn new(registry: Registry, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(registry, rng)
    }
}

impl<R: Rng> PriceSimulator<R> {
    pub fn with_rng(registry: Registry, rng: R) -> Self {
        Self { registry, rng }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Upper bound on instruments touched per interval: ceil(N / 2).
    pub fn max_mutations(&self) -> usize {
        self.registry.len().div_ceil(2)
    }

    /// Run one interval and return only the instruments that moved.
    #[instrument(level = "trace", skip(self), fields(instruments = self.registry.len()))]
    pub fn step(&mut self) -> PriceTick {
        let n = self.registry.len();
        if n == 0 {
            trace!("Empty registry, nothing to move");
            return PriceTick::default();
        }

        let count = self.rng.gen_range(1..=self.max_mutations());
        let selected = self.pick_distinct(count, n);

        let mut quotes = Vec::with_capacity(count);
        for index in selected {
            let delta_pct = self.rng.gen_range(-MAX_STEP_PCT..=MAX_STEP_PCT);
            if let Some(instrument) = self.registry.get_mut(index) {
                let quote = instrument.apply_move(delta_pct);
                trace!(symbol = %quote.symbol, price = quote.price, delta_pct, "Moved price");
                quotes.push(quote);
            }
        }

        debug!(mutated = quotes.len(), "Simulated price tick");
        PriceTick { quotes }
    }

    // Draw indices in [0, n) until `count` unique ones are collected, keeping
    // draw order.
    fn pick_distinct(&mut self, count: usize, n: usize) -> Vec<usize> {
        let mut picked: Vec<usize> = Vec::with_capacity(count);
        while picked.len() < count {
            let index = self.rng.gen_range(0..n);
            if !picked.contains(&index) {
                picked.push(index);
            }
        }
        picked
    }
}
