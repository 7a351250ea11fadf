//! Best clear times
//!
//! Persisted to LocalStorage, keeps the 10 fastest rounds.

use serde::{Deserialize, Serialize};

/// Maximum number of records to keep
pub const MAX_RECORDS: usize = 10;

/// One cleared round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearRecord {
    /// Time from round start to the last seagull hit
    pub elapsed_ms: f64,
    /// Seagulls in the round
    pub seagulls: u32,
    /// Balls thrown during the round
    pub throws: u32,
    /// Unix timestamp (ms) when achieved
    pub timestamp: f64,
}

/// Fastest rounds, best first
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BestTimes {
    pub entries: Vec<ClearRecord>,
}

impl BestTimes {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "gull_toss_best_times";

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Check if a time makes the board
    pub fn qualifies(&self, elapsed_ms: f64) -> bool {
        if !(elapsed_ms > 0.0) || !elapsed_ms.is_finite() {
            return false;
        }
        if self.entries.len() < MAX_RECORDS {
            return true;
        }
        self.entries
            .last()
            .map(|e| elapsed_ms < e.elapsed_ms)
            .unwrap_or(true)
    }

    /// Rank a time would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, elapsed_ms: f64) -> Option<usize> {
        if !self.qualifies(elapsed_ms) {
            return None;
        }
        let rank = self.entries.iter().position(|e| elapsed_ms < e.elapsed_ms);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Insert a record if it qualifies, returning its rank
    pub fn add(&mut self, record: ClearRecord) -> Option<usize> {
        let rank = self.potential_rank(record.elapsed_ms)?;
        self.entries.insert(rank - 1, record);
        self.entries.truncate(MAX_RECORDS);
        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best(&self) -> Option<&ClearRecord> {
        self.entries.first()
    }

    /// Load records from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(records) = serde_json::from_str::<BestTimes>(&json) {
                    log::info!("Loaded {} best times", records.entries.len());
                    return records;
                }
            }
        }

        log::info!("No best times found, starting fresh");
        Self::new()
    }

    /// Save records to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Best times saved ({} entries)", self.entries.len());
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::new()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

/// Format a duration as `m:ss.t`
pub fn format_elapsed(elapsed_ms: f64) -> String {
    let tenths = (elapsed_ms.max(0.0) / 100.0).floor() as u64;
    let minutes = tenths / 600;
    let seconds = (tenths / 10) % 60;
    format!("{}:{:02}.{}", minutes, seconds, tenths % 10)
}
