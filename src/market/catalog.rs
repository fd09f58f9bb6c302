// Catalog sources feeding the registry at startup.
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::market::registry::LoadError;
use crate::market::types::CatalogRecord;

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<Vec<CatalogRecord>, LoadError>;
}

/// Catalog stored on disk. `.csv` files need a `symbol,price` header, anything
/// else is read as a JSON array of `{symbol, price}` objects.
pub struct FileCatalog {
    pub path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_csv(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CatalogSource for FileCatalog {
    async fn load(&self) -> Result<Vec<CatalogRecord>, LoadError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|source| LoadError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Read catalog file");

        if self.is_csv() {
            parse_csv(&bytes)
        } else {
            parse_json(&bytes)
        }
    }
}

/// In-memory catalog.
pub struct StaticCatalog {
    records: Vec<CatalogRecord>,
}

impl StaticCatalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn load(&self) -> Result<Vec<CatalogRecord>, LoadError> {
        Ok(self.records.clone())
    }
}

pub fn parse_json(bytes: &[u8]) -> Result<Vec<CatalogRecord>, LoadError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn parse_csv(bytes: &[u8]) -> Result<Vec<CatalogRecord>, LoadError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
