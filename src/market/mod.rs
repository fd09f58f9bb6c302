// Instrument catalog and simulated price state
pub mod types;      // instruments, quotes, price rounding rules
pub mod catalog;    // where the startup catalog comes from (file, memory)
pub mod registry;   // validated, ordered instrument set

pub use catalog::{CatalogSource, FileCatalog, StaticCatalog};
pub use registry::{LoadError, Registry};
pub use types::{CatalogRecord, Instrument, PriceTick, Quote};
