// Single periodic task driving both generators and the broadcaster.
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::feed::broadcaster::{Broadcaster, Delivery};
use crate::market::Instrument;
use crate::sim::PriceSimulator;

/// What one interval produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub mutated: usize,
    pub prices: Option<Delivery>,
    pub order_book: Option<Delivery>,
}

pub struct Scheduler<R = StdRng> {
    simulator: PriceSimulator<R>,
    broadcaster: Arc<Broadcaster>,
    period: Duration,
}

impl<R: Rng + Send + 'static> Scheduler<R> {
    pub fn new(simulator: PriceSimulator<R>, broadcaster: Arc<Broadcaster>, period: Duration) -> Self {
        Self {
            simulator,
            broadcaster,
            period,
        }
    }

    /// Run forever on the current runtime. Ticks never overlap: each interval's
    /// work finishes before the timer is awaited again, and a late tick is
    /// pushed back rather than doubled up.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(period_ms = self.period.as_millis() as u64, "Tick scheduler started");
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately; the feed starts one period in
        interval.tick().await;

        loop {
            interval.tick().await;
            self.tick_once();
        }
    }

    /// One interval: move prices, draw a book, publish both. A failure on one
    /// channel is logged and does not stop the other.
    pub fn tick_once(&mut self) -> TickReport {
        let tick = self.simulator.step();
        let catalog: Arc<[Instrument]> = self.simulator.registry().instruments().into();

        let prices = match self.broadcaster.publish_prices(&tick, catalog) {
            Ok(delivery) => Some(delivery),
            Err(e) => {
                warn!(error = %e, "Price tick not published");
                None
            }
        };

        let book = self.broadcaster.next_order_book();
        let order_book = match self.broadcaster.publish_order_book(&book) {
            Ok(delivery) => Some(delivery),
            Err(e) => {
                warn!(error = %e, "Order book not published");
                None
            }
        };

        metrics::counter!("feed_ticks_total").increment(1);
        metrics::counter!("feed_instruments_mutated_total").increment(tick.len() as u64);
        debug!(mutated = tick.len(), ?prices, ?order_book, "Tick complete");

        TickReport {
            mutated: tick.len(),
            prices,
            order_book,
        }
    }
}
