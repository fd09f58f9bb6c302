// Fan-out of encoded payloads to the price and order-book subscribers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, instrument, warn};

use crate::market::types::snapshot;
use crate::market::{Instrument, PriceTick};
use crate::sim::order_book::{self, OrderBookSnapshot};

/// JSON text encoded once per publish. Queues share the allocation; each socket
/// writer copies the bytes into its own text frame.
pub type Payload = Arc<str>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to encode {channel} payload: {source}")]
    Encode {
        channel: Channel,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Prices,
    OrderBook,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Prices => "prices",
            Channel::OrderBook => "orderbook",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle given to a connection: its identity plus the queue it drains.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub channel: Channel,
    pub receiver: mpsc::Receiver<Payload>,
}

/// Outcome of one publish on one channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub sent: usize,
    pub dropped: usize,
    pub removed: usize,
}

#[derive(Default)]
struct SubscriberSet {
    entries: Vec<(SubscriberId, mpsc::Sender<Payload>)>,
}

impl SubscriberSet {
    fn insert(&mut self, id: SubscriberId, tx: mpsc::Sender<Payload>) {
        self.entries.push((id, tx));
    }

    fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    fn remove_all(&mut self, ids: &[SubscriberId]) {
        self.entries.retain(|(existing, _)| !ids.contains(existing));
    }

    // Copy-on-iterate: delivery happens after the lock is released.
    fn targets(&self) -> Vec<(SubscriberId, mpsc::Sender<Payload>)> {
        self.entries.clone()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct PriceChannel {
    subscribers: SubscriberSet,
    catalog: Arc<[Instrument]>,
    snapshot: Payload,
}

pub struct Broadcaster {
    prices: Mutex<PriceChannel>,
    books: Mutex<SubscriberSet>,
    book_rng: Mutex<StdRng>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl Broadcaster {
    /// `catalog` seeds the snapshot handed to the first price subscribers.
    pub fn new(catalog: Arc<[Instrument]>, queue_capacity: usize) -> Result<Self, FeedError> {
        let full = encode(Channel::Prices, &snapshot(&catalog))?;
        Ok(Self {
            prices: Mutex::new(PriceChannel {
                subscribers: SubscriberSet::default(),
                catalog,
                snapshot: full,
            }),
            books: Mutex::new(SubscriberSet::default()),
            book_rng: Mutex::new(StdRng::from_entropy()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        })
    }

    /// Draw order books from a seeded stream, so a fixed seed reproduces them too.
    pub fn with_book_seed(self, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self {
                book_rng: Mutex::new(StdRng::seed_from_u64(seed)),
                ..self
            },
            None => self,
        }
    }

    /// Next book from the shared generator, used both on subscribe and on each tick.
    pub fn next_order_book(&self) -> OrderBookSnapshot {
        order_book::generate(&mut *self.book_rng.lock())
    }

    /// Register a subscriber and queue the channel's current full state to it.
    #[instrument(skip(self))]
    pub fn subscribe(&self, channel: Channel) -> Result<Subscription, FeedError> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, receiver) = mpsc::channel(self.queue_capacity);

        let total = match channel {
            Channel::Prices => {
                let mut prices = self.prices.lock();
                // Snapshot and insert under the lock publish_prices swaps under.
                // A fresh queue always has room for the first message.
                let _ = tx.try_send(prices.snapshot.clone());
                prices.subscribers.insert(id, tx);
                prices.subscribers.len()
            }
            Channel::OrderBook => {
                let book = encode(channel, &self.next_order_book())?;
                let mut books = self.books.lock();
                let _ = tx.try_send(book);
                books.insert(id, tx);
                books.len()
            }
        };

        info!(%id, %channel, subscribers = total, "Subscriber joined");
        metrics::gauge!("feed_subscribers", "channel" => channel.as_str()).set(total as f64);
        Ok(Subscription { id, channel, receiver })
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, channel: Channel, id: SubscriberId) {
        let (removed, total) = match channel {
            Channel::Prices => {
                let mut prices = self.prices.lock();
                (prices.subscribers.remove(id), prices.subscribers.len())
            }
            Channel::OrderBook => {
                let mut books = self.books.lock();
                (books.remove(id), books.len())
            }
        };
        if removed {
            info!(%id, %channel, subscribers = total, "Subscriber left");
            metrics::gauge!("feed_subscribers", "channel" => channel.as_str()).set(total as f64);
        }
    }

    /// Replace the stored catalog and push `tick` to every price subscriber.
    /// An empty tick only refreshes the stored state.
    pub fn publish_prices(&self, tick: &PriceTick, catalog: Arc<[Instrument]>) -> Result<Delivery, FeedError> {
        let full = encode(Channel::Prices, &snapshot(&catalog))?;
        let payload = if tick.is_empty() {
            None
        } else {
            Some(encode(Channel::Prices, tick)?)
        };

        let targets = {
            let mut prices = self.prices.lock();
            prices.catalog = catalog;
            prices.snapshot = full;
            if payload.is_some() {
                prices.subscribers.targets()
            } else {
                Vec::new()
            }
        };

        Ok(match payload {
            Some(payload) => self.deliver(Channel::Prices, targets, payload),
            None => Delivery::default(),
        })
    }

    /// Push a freshly generated book to every order-book subscriber.
    pub fn publish_order_book(&self, book: &OrderBookSnapshot) -> Result<Delivery, FeedError> {
        let payload = encode(Channel::OrderBook, book)?;
        let targets = self.books.lock().targets();
        Ok(self.deliver(Channel::OrderBook, targets, payload))
    }

    /// Latest published catalog.
    pub fn catalog(&self) -> Arc<[Instrument]> {
        self.prices.lock().catalog.clone()
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::Prices => self.prices.lock().subscribers.len(),
            Channel::OrderBook => self.books.lock().len(),
        }
    }

    fn deliver(
        &self,
        channel: Channel,
        targets: Vec<(SubscriberId, mpsc::Sender<Payload>)>,
        payload: Payload,
    ) -> Delivery {
        let mut delivery = Delivery::default();
        let mut closed = Vec::new();

        for (id, tx) in targets {
            match tx.try_send(payload.clone()) {
                Ok(()) => delivery.sent += 1,
                Err(TrySendError::Full(_)) => {
                    delivery.dropped += 1;
                    debug!(%id, %channel, "Subscriber queue full, payload dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%id, %channel, "Subscriber gone, removing");
                    closed.push(id);
                }
            }
        }

        if !closed.is_empty() {
            delivery.removed = closed.len();
            let total = match channel {
                Channel::Prices => {
                    let mut prices = self.prices.lock();
                    prices.subscribers.remove_all(&closed);
                    prices.subscribers.len()
                }
                Channel::OrderBook => {
                    let mut books = self.books.lock();
                    books.remove_all(&closed);
                    books.len()
                }
            };
            metrics::gauge!("feed_subscribers", "channel" => channel.as_str()).set(total as f64);
        }

        if delivery.dropped > 0 {
            warn!(%channel, dropped = delivery.dropped, "Slow subscribers skipped a payload");
        }
        metrics::counter!("feed_messages_sent_total", "channel" => channel.as_str()).increment(delivery.sent as u64);
        metrics::counter!("feed_messages_dropped_total", "channel" => channel.as_str())
            .increment(delivery.dropped as u64);
        delivery
    }
}

fn encode<T: Serialize + ?Sized>(channel: Channel, value: &T) -> Result<Payload, FeedError> {
    serde_json::to_string(value)
        .map(Payload::from)
        .map_err(|source| FeedError::Encode { channel, source })
}
