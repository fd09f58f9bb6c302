use serde::{Deserialize, Serialize};

// Allowed drift around the base price: [base * 0.9, base * 1.1]
pub const BAND_LOWER: f64 = 0.9;
pub const BAND_UPPER: f64 = 1.1;

/// Decimal places used for a price of the given magnitude.
pub fn price_decimals(value: f64) -> u32 {
    if value >= 500.0 {
        0
    } else if value >= 50.0 {
        1
    } else {
        2
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

// Slack when turning a band edge into whole tier steps.
const STEP_EPSILON: f64 = 1e-6;

// Band edges are snapped to 9 places: 2.1 * 0.9 is 1.8900000000000001 in f64.
fn band_edge(value: f64) -> f64 {
    round_to(value, 9)
}

// Round at the tier of `value`, but never leave [lo, hi]. If the rounded value
// falls outside, step to the nearest representable value inside the band; when
// the band is narrower than one step, the unrounded value is kept.
fn round_within(value: f64, lo: f64, hi: f64) -> f64 {
    let decimals = price_decimals(value);
    let factor = 10f64.powi(decimals as i32);
    let rounded = round_to(value, decimals);

    let candidate = if rounded < lo {
        (lo * factor - STEP_EPSILON).ceil() / factor
    } else if rounded > hi {
        (hi * factor + STEP_EPSILON).floor() / factor
    } else {
        rounded
    };

    if candidate >= lo && candidate <= hi {
        candidate
    } else {
        value
    }
}

/// Catalog entry as it appears in the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub symbol: String,
    pub price: f64,
}

/// A tradable instrument and its simulated state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub base_price: f64,
    #[serde(rename = "price")]
    pub current_price: f64,
    pub amount_change: f64,
    #[serde(rename = "change")]
    pub percent_change: f64,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            base_price: price,
            current_price: price,
            amount_change: 0.0,
            percent_change: 0.0,
        }
    }

    /// Inclusive price band the current price must stay within.
    pub fn band(&self) -> (f64, f64) {
        (band_edge(self.base_price * BAND_LOWER), band_edge(self.base_price * BAND_UPPER))
    }

    /// Move the price by `delta_pct` (e.g. 0.004 = +0.4%), clamp it to the band,
    /// round it to its tier and refresh the derived fields.
    pub fn apply_move(&mut self, delta_pct: f64) -> Quote {
        let (lo, hi) = self.band();
        let moved = self.current_price * (1.0 + delta_pct);
        let clamped = moved.clamp(lo, hi);

        self.current_price = round_within(clamped, lo, hi);
        self.amount_change = round_to(self.current_price - self.base_price, 2);
        self.percent_change = round_to(self.amount_change / self.base_price * 100.0, 2);
        self.quote()
    }

    pub fn quote(&self) -> Quote {
        Quote {
            symbol: self.symbol.clone(),
            price: self.current_price,
            amount_change: self.amount_change,
            percent_change: self.percent_change,
        }
    }
}

/// Wire view of one instrument on the price channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub amount_change: f64,
    #[serde(rename = "change")]
    pub percent_change: f64,
}

/// Instruments mutated during one interval, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTick {
    pub quotes: Vec<Quote>,
}

impl PriceTick {
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }
}

/// Full price-channel projection of a set of instruments.
pub fn snapshot(instruments: &[Instrument]) -> Vec<Quote> {
    instruments.iter().map(Instrument::quote).collect()
}
