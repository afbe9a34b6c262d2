use crate::domain::ledger::Amount;
use crate::error::{BlackjackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A purchasable bundle of chips at a fixed price in Telegram Stars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
    pub id: String,
    pub chips: u64,
    pub price_stars: u64,
    pub title: String,
}

impl Pack {
    fn new(id: &str, chips: u64, price_stars: u64, title: &str) -> Self {
        Self {
            id: id.to_string(),
            chips,
            price_stars,
            title: title.to_string(),
        }
    }
}

/// Read-only pack catalog, fixed at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackCatalog {
    packs: Vec<Pack>,
}

impl PackCatalog {
    /// Validates packs: non-empty unique ids, positive prices, and chip counts
    /// the ledger can credit.
    pub fn new(packs: Vec<Pack>) -> Result<Self> {
        let mut ids = HashSet::with_capacity(packs.len());
        for pack in &packs {
            if pack.id.trim().is_empty() {
                return Err(BlackjackError::InvalidRequest(
                    "pack id must not be empty".to_string(),
                ));
            }
            if pack.chips == 0 || pack.price_stars == 0 {
                return Err(BlackjackError::InvalidRequest(format!(
                    "pack {} must have positive chips and price",
                    pack.id
                )));
            }
            if pack.chips > Amount::MAX {
                return Err(BlackjackError::InvalidRequest(format!(
                    "pack {} grants {} chips, more than a balance can hold",
                    pack.id, pack.chips
                )));
            }
            if !ids.insert(pack.id.as_str()) {
                return Err(BlackjackError::InvalidRequest(format!(
                    "duplicate pack id {}",
                    pack.id
                )));
            }
        }
        Ok(Self { packs })
    }

    pub fn builtin() -> Self {
        Self {
            packs: vec![
                Pack::new("chips_500", 500, 25, "500 chips"),
                Pack::new("chips_1000", 1_000, 45, "1,000 chips"),
                Pack::new("chips_2500", 2_500, 100, "2,500 chips"),
                Pack::new("chips_5000", 5_000, 180, "5,000 chips"),
            ],
        }
    }

    /// Parses a JSON array of packs.
    pub fn from_json(json: &str) -> Result<Self> {
        let packs: Vec<Pack> = serde_json::from_str(json)
            .map_err(|e| BlackjackError::InvalidRequest(format!("invalid catalog: {e}")))?;
        Self::new(packs)
    }

    /// Loads and validates a catalog file.
    ///
    /// # Arguments
    ///
    /// * `path` - A JSON array of packs with `id`, `chips`, `priceStars` and
    ///   `title` fields.
    ///
    /// Fails on unreadable files and on any pack [`PackCatalog::new`] rejects,
    /// so a bad catalog stops startup rather than failing at payment time.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn get(&self, id: &str) -> Option<&Pack> {
        self.packs.iter().find(|pack| pack.id == id)
    }

    pub fn packs(&self) -> &[Pack] {
        &self.packs
    }
}

impl Default for PackCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
