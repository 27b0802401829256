// Browser-surface smoke tests; run with `wasm-pack test --node`.
#![cfg(target_arch = "wasm32")]

use kana_branches::web::KanaGame;
use wasm_bindgen_test::*;

#[wasm_bindgen_test]
fn game_view_reports_first_level() {
    let game = KanaGame::new(1, None).unwrap();
    let view: serde_json::Value = serde_json::from_str(&game.state_json().unwrap()).unwrap();
    assert_eq!(view["level"]["kanaSubset"].as_array().unwrap().len(), 2);
    assert_eq!(view["state"]["levelState"]["phase"], "idle");
    assert_eq!(view["canUndo"], false);
}

#[wasm_bindgen_test]
fn unknown_level_and_mode_are_errors() {
    assert!(KanaGame::new(0, None).is_err());
    let mut game = KanaGame::new(2, Some(r#"{"displayMode":"fade"}"#.into())).unwrap();
    assert!(game.set_display_mode("sparkle").is_err());
    assert!(game.set_display_mode("flip").is_ok());
}

#[wasm_bindgen_test]
fn tapping_an_unknown_branch_is_ignored() {
    let mut game = KanaGame::new(1, None).unwrap();
    assert_eq!(game.select_branch("nowhere"), "ignored");
    game.tick(16.0);
    game.tick(48.0);
    assert_eq!(game.drain_events_json().unwrap(), "[]");
}
