//! Collaborators the engine talks to but does not own: key-value storage,
//! the branches-collected economy, level progress, and pronunciation.
//!
//! Every call here is best-effort. Failures are logged and swallowed so
//! gameplay never waits on, or aborts because of, persistence or speech.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

pub const COLLECTED_KEY: &str = "kana-branches:branches-collected";
pub const PROGRESS_PREFIX: &str = "kana-branches:progress:";

/// Minimal string key-value store (browser `localStorage` or memory).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Cross-session currency: earned by wave retirement, spent by undo, reset
/// and restart. Never negative.
pub trait CollectedCounter {
    fn total(&self) -> u32;
    /// Applies `delta` (floored at zero) and returns the new total.
    fn increment(&mut self, delta: i64) -> u32;
}

fn apply_delta(total: u32, delta: i64) -> u32 {
    (i64::from(total) + delta).clamp(0, i64::from(u32::MAX)) as u32
}

/// Counter that lives only for the session.
#[derive(Debug, Default)]
pub struct MemoryCounter {
    total: u32,
}

impl MemoryCounter {
    pub fn new(total: u32) -> Self {
        Self { total }
    }
}

impl CollectedCounter for MemoryCounter {
    fn total(&self) -> u32 {
        self.total
    }

    fn increment(&mut self, delta: i64) -> u32 {
        self.total = apply_delta(self.total, delta);
        self.total
    }
}

/// Counter cached in memory and written through to a [`KeyValueStore`].
pub struct StoredCounter {
    store: Rc<dyn KeyValueStore>,
    total: u32,
}

impl StoredCounter {
    pub fn load(store: Rc<dyn KeyValueStore>) -> Self {
        let total = match load_json::<u32>(store.as_ref(), COLLECTED_KEY) {
            Ok(v) => v.unwrap_or(0),
            Err(e) => {
                log::warn!("branches collected: load failed, starting at 0: {e}");
                0
            }
        };
        Self { store, total }
    }
}

impl CollectedCounter for StoredCounter {
    fn total(&self) -> u32 {
        self.total
    }

    fn increment(&mut self, delta: i64) -> u32 {
        self.total = apply_delta(self.total, delta);
        if let Err(e) = save_json(self.store.as_ref(), COLLECTED_KEY, &self.total) {
            log::warn!("branches collected: save failed: {e}");
        }
        self.total
    }
}

/// Per-level best results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub completed: bool,
    pub best_score: u32,
    pub fewest_moves: Option<u32>,
}

pub struct ProgressStore {
    store: Rc<dyn KeyValueStore>,
}

impl ProgressStore {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(level: u32) -> String {
        format!("{PROGRESS_PREFIX}{level}")
    }

    pub fn get(&self, level: u32) -> LevelProgress {
        match load_json(self.store.as_ref(), &Self::key(level)) {
            Ok(v) => v.unwrap_or_default(),
            Err(e) => {
                log::warn!("progress: load for level {level} failed: {e}");
                LevelProgress::default()
            }
        }
    }

    /// Merges a cleared run into the stored record.
    pub fn record_clear(&self, level: u32, score: u32, moves: u32) -> LevelProgress {
        let mut progress = self.get(level);
        progress.completed = true;
        progress.best_score = progress.best_score.max(score);
        progress.fewest_moves = Some(progress.fewest_moves.map_or(moves, |m| m.min(moves)));
        if let Err(e) = save_json(self.store.as_ref(), &Self::key(level), &progress) {
            log::warn!("progress: save for level {level} failed: {e}");
        }
        progress
    }
}

/// Fire-and-forget request to speak a kana's reading.
pub trait PronunciationCue {
    fn speak(&self, kana: &str, romaji: &str);
}

/// Cue that does nothing; used natively and in tests.
pub struct Silent;

impl PronunciationCue for Silent {
    fn speak(&self, _kana: &str, _romaji: &str) {}
}

/// Everything the engine needs from the outside world.
pub struct Services {
    pub counter: Box<dyn CollectedCounter>,
    pub progress: Option<ProgressStore>,
    pub speech: Box<dyn PronunciationCue>,
}

impl Services {
    /// In-memory services with a silent cue.
    pub fn in_memory() -> Self {
        let store: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
        Self::with_store(store, Box::new(Silent))
    }

    pub fn with_store(store: Rc<dyn KeyValueStore>, speech: Box<dyn PronunciationCue>) -> Self {
        Self {
            counter: Box::new(StoredCounter::load(store.clone())),
            progress: Some(ProgressStore::new(store)),
            speech,
        }
    }
}
