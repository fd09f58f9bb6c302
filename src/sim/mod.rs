// Synthetic market generators driven once per interval
pub mod price;       // bounded random walk over the instrument registry
pub mod order_book;  // stateless five-level depth generator

pub use order_book::{BookLevel, OrderBookSnapshot};
pub use price::PriceSimulator;
