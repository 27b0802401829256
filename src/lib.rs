//! Kana Branches core crate.
//!
//! A tile-sorting puzzle for learning hiragana: kana tiles are shuffled over a
//! set of branches and the player lifts runs of identical kana from one branch
//! to another until each group of one kana sits alone on a branch. The engine
//! is plain Rust and runs natively for tests; the `web` module exposes it to
//! the page through wasm-bindgen.

use wasm_bindgen::prelude::*;

pub mod board;
pub mod color;
pub mod engine;
pub mod error;
pub mod kana;
pub mod level;
mod logging;
pub mod services;
pub mod settings;
pub mod web;

pub use board::{Branch, BranchType, KanaTile, has_valid_moves};
pub use color::{ColorToken, generate_color_map};
pub use engine::{Engine, GameEvent, GameState, LevelState, MoveReport, SelectOutcome};
pub use error::{GenerationIssue, LevelError, MoveError, StorageError};
pub use kana::KANA;
pub use level::{LevelConfig, get_level_config};
pub use settings::{DisplayMode, EngineSettings};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Info);
}

#[wasm_bindgen]
pub fn level_count() -> u32 {
    level::level_count()
}

/// Reading for a kana glyph, or `undefined` in JS when unknown.
#[wasm_bindgen]
pub fn kana_reading(kana: &str) -> Option<String> {
    kana::find(kana).map(str::to_string)
}
