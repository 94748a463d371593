//! Highscore persistence
//!
//! A single best score, stored as `{"highscore": n}`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// On-disk record
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HighscoreRecord {
    #[serde(default)]
    pub highscore: u64,
}

/// Load/save the best score
pub trait HighscoreStore {
    /// Stored value, 0 when missing or unreadable
    fn load(&mut self) -> u64;
    fn save(&mut self, highscore: u64) -> Result<()>;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonHighscoreStore {
    path: PathBuf,
}

impl JsonHighscoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<u64> {
        let json = std::fs::read_to_string(&self.path)?;
        let record: HighscoreRecord = serde_json::from_str(&json)?;
        Ok(record.highscore)
    }
}

impl HighscoreStore for JsonHighscoreStore {
    fn load(&mut self) -> u64 {
        if !self.path.exists() {
            log::info!("No highscore file at {}, starting from 0", self.path.display());
            return 0;
        }
        match self.read() {
            Ok(highscore) => {
                log::info!("Loaded highscore {highscore}");
                highscore
            }
            Err(e) => {
                log::warn!("Error loading highscore from {}: {e}", self.path.display());
                0
            }
        }
    }

    fn save(&mut self, highscore: u64) -> Result<()> {
        let json = serde_json::to_string(&HighscoreRecord { highscore })?;
        std::fs::write(&self.path, json)?;
        log::info!("Highscore saved: {highscore}");
        Ok(())
    }
}

/// In-memory store that counts writes
#[derive(Debug, Clone, Default)]
pub struct MemoryHighscoreStore {
    pub value: u64,
    pub saves: usize,
    /// Make every save fail
    pub fail: bool,
}

impl MemoryHighscoreStore {
    pub fn with_value(value: u64) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

impl HighscoreStore for MemoryHighscoreStore {
    fn load(&mut self) -> u64 {
        self.value
    }

    fn save(&mut self, highscore: u64) -> Result<()> {
        if self.fail {
            return Err(std::io::Error::other("highscore store unavailable").into());
        }
        self.value = highscore;
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pinball_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_loads_zero() {
        let mut store = JsonHighscoreStore::new(temp_path("missing"));
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn test_round_trip_file() {
        let path = temp_path("roundtrip");
        let mut store = JsonHighscoreStore::new(&path);
        store.save(70).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"highscore":70}"#);
        assert_eq!(store.load(), 70);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_loads_zero() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").unwrap();
        let mut store = JsonHighscoreStore::new(&path);
        assert_eq!(store.load(), 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let mut store = MemoryHighscoreStore::with_value(50);
        assert_eq!(store.load(), 50);
        store.save(70).unwrap();
        assert_eq!((store.value, store.saves), (70, 1));

        store.fail = true;
        assert!(store.save(80).is_err());
        assert_eq!(store.value, 70);
    }
}
