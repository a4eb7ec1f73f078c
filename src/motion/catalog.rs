//! Discrete speed and zone catalogs.
//!
//! The controller only understands a fixed set of named speed (`v100`) and zone (`z50`)
//! constants. A [`MotionCatalog`] snaps a continuous magnitude onto the nearest named
//! level. Exact ties between two adjacent levels resolve to the lower level.

use crate::error::{AppResult, ToroError};
use crate::motion::literal::format_number;
use serde::{Deserialize, Serialize};

/// Predefined TCP speed levels in mm/s.
pub const STANDARD_SPEED_LEVELS: [f64; 25] = [
    5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0, 150.0, 200.0, 300.0, 400.0, 500.0,
    600.0, 800.0, 1000.0, 1500.0, 2000.0, 2500.0, 3000.0, 4000.0, 5000.0, 6000.0, 7000.0,
];

/// Predefined fly-by zone radii in mm.
pub const STANDARD_ZONE_LEVELS: [f64; 14] = [
    0.0, 1.0, 5.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0, 150.0, 200.0,
];

/// One catalog level bound to its symbolic constant name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Numeric magnitude of the level.
    pub level: f64,
    /// Constant name emitted into instructions.
    pub symbol: String,
}

impl CatalogEntry {
    /// Binds `level` to `<prefix><level>`, e.g. `v100`.
    pub fn prefixed(prefix: &str, level: f64) -> Self {
        Self {
            level,
            symbol: format!("{prefix}{}", format_number(level)),
        }
    }
}

/// Returns the symbol of the entry nearest to `value`.
///
/// `entries` must be ascending. On an exact tie the earlier (lower) entry wins.
///
/// # Errors
/// - `InvalidCatalog` when `entries` is empty
/// - `InvalidLevel` when `value` is not finite
pub fn quantize(entries: &[CatalogEntry], value: f64) -> AppResult<&str> {
    if !value.is_finite() {
        return Err(ToroError::InvalidLevel(value));
    }
    let mut best: Option<(&CatalogEntry, f64)> = None;
    for entry in entries {
        let distance = (entry.level - value).abs();
        match best {
            // Strict comparison keeps the lower entry on ties.
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((entry, distance)),
        }
    }
    best.map(|(entry, _)| entry.symbol.as_str())
        .ok_or_else(|| ToroError::InvalidCatalog("catalog has no levels".to_string()))
}

/// A validated, ascending catalog of discrete levels.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionCatalog {
    entries: Vec<CatalogEntry>,
}

impl MotionCatalog {
    /// Builds a catalog from explicit entries.
    ///
    /// # Errors
    /// `InvalidCatalog` when `entries` is empty, contains a non-finite level, or is not
    /// strictly ascending.
    pub fn new(entries: Vec<CatalogEntry>) -> AppResult<Self> {
        if entries.is_empty() {
            return Err(ToroError::InvalidCatalog("catalog has no levels".to_string()));
        }
        if let Some(bad) = entries.iter().find(|e| !e.level.is_finite()) {
            return Err(ToroError::InvalidCatalog(format!(
                "level for '{}' is not finite",
                bad.symbol
            )));
        }
        if entries.windows(2).any(|w| w[0].level >= w[1].level) {
            return Err(ToroError::InvalidCatalog(
                "levels must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// Builds a catalog whose symbols are `<prefix><level>`.
    pub fn from_levels(prefix: &str, levels: &[f64]) -> AppResult<Self> {
        Self::new(
            levels
                .iter()
                .map(|level| CatalogEntry::prefixed(prefix, *level))
                .collect(),
        )
    }

    /// The standard speed catalog (`v5` .. `v7000`).
    pub fn standard_speeds() -> Self {
        Self {
            entries: STANDARD_SPEED_LEVELS
                .iter()
                .map(|level| CatalogEntry::prefixed("v", *level))
                .collect(),
        }
    }

    /// The standard zone catalog (`z0` .. `z200`).
    pub fn standard_zones() -> Self {
        Self {
            entries: STANDARD_ZONE_LEVELS
                .iter()
                .map(|level| CatalogEntry::prefixed("z", *level))
                .collect(),
        }
    }

    /// Snaps `value` onto the nearest level and returns its symbol.
    pub fn quantize(&self, value: f64) -> AppResult<&str> {
        quantize(&self.entries, value)
    }

    /// Catalog entries in ascending order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

/// A speed or zone argument: either a magnitude to quantize or a symbol used verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MotionParameter {
    /// Magnitude snapped through a [`MotionCatalog`].
    Level(f64),
    /// Already-named constant such as `vmax` or `fine`.
    Symbol(String),
}

impl MotionParameter {
    /// Resolves to the symbol emitted into instruction text.
    pub fn resolve(&self, catalog: &MotionCatalog) -> AppResult<String> {
        match self {
            MotionParameter::Level(level) => catalog.quantize(*level).map(str::to_string),
            MotionParameter::Symbol(symbol) => Ok(symbol.clone()),
        }
    }
}

impl From<f64> for MotionParameter {
    fn from(level: f64) -> Self {
        MotionParameter::Level(level)
    }
}

impl From<i32> for MotionParameter {
    fn from(level: i32) -> Self {
        MotionParameter::Level(f64::from(level))
    }
}

impl From<&str> for MotionParameter {
    fn from(symbol: &str) -> Self {
        MotionParameter::Symbol(symbol.to_string())
    }
}

impl From<String> for MotionParameter {
    fn from(symbol: String) -> Self {
        MotionParameter::Symbol(symbol)
    }
}
