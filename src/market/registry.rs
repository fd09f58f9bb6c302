use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::market::catalog::CatalogSource;
use crate::market::types::{snapshot, CatalogRecord, Instrument, Quote};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed CSV catalog: {0}")]
    Csv(#[from] csv::Error),
    #[error("catalog contains no instruments")]
    Empty,
    #[error("blank symbol at record {index}")]
    BlankSymbol { index: usize },
    #[error("duplicate symbol {symbol}")]
    DuplicateSymbol { symbol: String },
    #[error("invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },
}

/// Ordered set of instruments. Only the price simulator holds it mutably.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    instruments: Vec<Instrument>,
}

impl Registry {
    /// Load and validate every record from `source`.
    pub async fn load(source: &dyn CatalogSource) -> Result<Self, LoadError> {
        let records = source.load().await?;
        let registry = Self::from_records(records)?;
        info!(instruments = registry.len(), "Loaded instrument catalog");
        Ok(registry)
    }

    #[instrument(skip(records), fields(records = records.len()))]
    pub fn from_records(records: Vec<CatalogRecord>) -> Result<Self, LoadError> {
        if records.is_empty() {
            return Err(LoadError::Empty);
        }

        let mut seen = HashSet::with_capacity(records.len());
        let mut instruments = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let symbol = record.symbol.trim().to_string();
            if symbol.is_empty() {
                return Err(LoadError::BlankSymbol { index });
            }
            if !record.price.is_finite() || record.price <= 0.0 {
                return Err(LoadError::InvalidPrice { symbol, price: record.price });
            }
            if !seen.insert(symbol.clone()) {
                return Err(LoadError::DuplicateSymbol { symbol });
            }
            debug!(symbol = %symbol, price = record.price, "Registered instrument");
            instruments.push(Instrument::new(symbol, record.price));
        }

        Ok(Self { instruments })
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Instrument> {
        self.instruments.get_mut(index)
    }

    /// Price-channel projection of every instrument, in catalog order.
    pub fn snapshot(&self) -> Vec<Quote> {
        snapshot(&self.instruments)
    }
}
