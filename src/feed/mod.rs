// Real-time distribution of simulated data
pub mod broadcaster;  // subscriber registries and non-blocking fan-out
pub mod scheduler;    // periodic tick driving simulator -> broadcaster

pub use broadcaster::{Broadcaster, Channel, Delivery, FeedError, Payload, SubscriberId, Subscription};
pub use scheduler::{Scheduler, TickReport};
