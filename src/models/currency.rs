//! Currency model
//!
//! The currency table is reference data seeded by the `seed-currencies` CLI
//! tool; organizations point at a currency by ISO code.

use serde::{Deserialize, Serialize};

/// Currency reference entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code, e.g. "EUR"
    pub code: String,
    /// Display name
    pub name: String,
    /// Symbol, e.g. "€"
    pub symbol: String,
    /// Number of decimal places customarily shown
    pub decimal_places: i32,
}
