//! Browser surface: the `KanaGame` class the page drives, plus the
//! `localStorage` store and speech-synthesis cue it wires into the engine.

use std::collections::BTreeSet;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::{SpeechSynthesisUtterance, Storage, window};

use crate::engine::{Engine, GameState, SelectOutcome};
use crate::error::StorageError;
use crate::level::{LevelConfig, get_level_config};
use crate::services::{KeyValueStore, MemoryStore, PronunciationCue, Services};
use crate::settings::{DisplayMode, EngineSettings};

/// `window.localStorage` as a [`KeyValueStore`].
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    pub fn open() -> Option<Self> {
        let storage = window()?.local_storage().ok()??;
        Some(Self { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage
            .get_item(key)
            .map_err(|_| StorageError::Read(key.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage
            .set_item(key, value)
            .map_err(|_| StorageError::Write(key.to_string()))
    }
}

/// Speaks the kana through the Web Speech API. Any failure is dropped.
pub struct SpeechCue;

impl PronunciationCue for SpeechCue {
    fn speak(&self, kana: &str, _romaji: &str) {
        let Some(synth) = window().and_then(|w| w.speech_synthesis().ok()) else {
            return;
        };
        let Ok(utterance) = SpeechSynthesisUtterance::new_with_text(kana) else {
            return;
        };
        utterance.set_lang("ja-JP");
        synth.cancel();
        synth.speak(&utterance);
    }
}

fn browser_services() -> Services {
    let store: Rc<dyn KeyValueStore> = match LocalStorageStore::open() {
        Some(store) => Rc::new(store),
        None => {
            log::warn!("localStorage unavailable, progress will not persist");
            Rc::new(MemoryStore::new())
        }
    };
    Services::with_store(store, Box::new(SpeechCue))
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn resolve_level(level: u32) -> Result<LevelConfig, JsValue> {
    let mut rng = SmallRng::from_entropy();
    get_level_config(level, &mut rng).ok_or_else(|| JsValue::from_str("no such level"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GameView<'a> {
    level: &'a LevelConfig,
    state: &'a GameState,
    selected_branch: Option<&'a str>,
    flipping_tiles: &'a BTreeSet<String>,
    disappearing_branch: Option<&'a str>,
    landing_branch: Option<&'a str>,
    has_valid_moves: bool,
    can_undo: bool,
    branches_collected: u32,
}

#[wasm_bindgen]
pub struct KanaGame {
    engine: Engine,
    last_tick_ms: Option<f64>,
}

#[wasm_bindgen]
impl KanaGame {
    /// Starts `level` (1-based). `settings_json` may override any tunable.
    #[wasm_bindgen(constructor)]
    pub fn new(level: u32, settings_json: Option<String>) -> Result<KanaGame, JsValue> {
        let settings = match settings_json {
            Some(json) => EngineSettings::from_json(&json).map_err(js_err)?,
            None => EngineSettings::default(),
        };
        let config = resolve_level(level)?;
        let engine = Engine::new(config, settings, browser_services(), SmallRng::from_entropy())
            .map_err(js_err)?;
        Ok(KanaGame {
            engine,
            last_tick_ms: None,
        })
    }

    pub fn load_level(&mut self, level: u32) -> Result<(), JsValue> {
        let config = resolve_level(level)?;
        self.engine.start_level(config).map_err(js_err)?;
        self.last_tick_ms = None;
        Ok(())
    }

    /// Tap on a branch. Returns what happened as a short tag.
    pub fn select_branch(&mut self, id: &str) -> String {
        match self.engine.select_branch(id) {
            SelectOutcome::Picked { .. } => "picked",
            SelectOutcome::Deselected => "deselected",
            SelectOutcome::Moved(_) => "moved",
            SelectOutcome::Rejected(_) => "rejected",
            SelectOutcome::Ignored => "ignored",
        }
        .to_string()
    }

    pub fn move_tile(&mut self, source: &str, target: &str) -> bool {
        self.engine.move_tile(source, target).is_ok()
    }

    pub fn undo_move(&mut self) -> bool {
        self.engine.undo_move()
    }

    pub fn reset_game(&mut self) {
        self.engine.reset_game();
    }

    pub fn restart_preset(&mut self) {
        self.engine.restart_preset();
    }

    /// Feed with the `requestAnimationFrame` timestamp.
    pub fn tick(&mut self, now_ms: f64) {
        let elapsed = match self.last_tick_ms {
            Some(last) if now_ms > last => (now_ms - last) as u64,
            _ => 0,
        };
        // Carry the fractional remainder so sub-millisecond frames add up.
        self.last_tick_ms = Some(match self.last_tick_ms {
            Some(last) if now_ms > last => last + elapsed as f64,
            _ => now_ms,
        });
        self.engine.advance(elapsed);
    }

    pub fn set_display_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode = match mode {
            "flip" => DisplayMode::Flip,
            "fade" => DisplayMode::Fade,
            other => return Err(JsValue::from_str(&format!("unknown display mode '{other}'"))),
        };
        self.engine.set_display_mode(mode);
        Ok(())
    }

    pub fn cancel_timers(&mut self) {
        self.engine.cancel_timers();
    }

    pub fn branches_collected(&self) -> u32 {
        self.engine.branches_collected()
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        let view = GameView {
            level: self.engine.config(),
            state: self.engine.state(),
            selected_branch: self.engine.state().selected_branch(),
            flipping_tiles: self.engine.flipping_tiles(),
            disappearing_branch: self.engine.disappearing_branch(),
            landing_branch: self.engine.landing_branch(),
            has_valid_moves: self.engine.has_valid_moves(),
            can_undo: self.engine.undo_depth() > 0,
            branches_collected: self.engine.branches_collected(),
        };
        serde_json::to_string(&view).map_err(js_err)
    }

    pub fn drain_events_json(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.engine.drain_events()).map_err(js_err)
    }
}
