#![cfg(target_arch = "wasm32")]

use dots_and_boxes::GameEngine;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn small_engine() -> GameEngine {
    GameEngine::new(Some(r#"{ "grid_size": 3 }"#.to_string())).expect("valid config")
}

#[wasm_bindgen_test]
fn claim_line_passes_the_turn() {
    let mut engine = small_engine();
    assert_eq!(engine.current_player(), 0);

    let json = engine.claim_line("h", 0, 0).expect("legal move");
    assert!(json.contains("TurnPassed"));
    assert_eq!(engine.current_player(), 1);

    assert!(engine.claim_line("h", 0, 0).is_err());
    assert!(engine.claim_line("x", 0, 1).is_err());
}

#[wasm_bindgen_test]
fn state_json_survives_a_round_trip() {
    let mut engine = small_engine();
    engine.claim_line("vertical", 1, 2).expect("legal move");
    let json = engine.state_json().expect("serializes");

    let mut other = small_engine();
    other.set_state_json(&json).expect("consistent state");
    assert_eq!(other.current_player(), 1);
    assert!(other.set_state_json("{}").is_err());
}

#[wasm_bindgen_test]
fn ai_finishes_a_game() {
    let mut engine = GameEngine::new(Some(
        r#"{ "grid_size": 3, "players": [ { "type": "ai" }, { "type": "ai" } ] }"#.to_string(),
    ))
    .expect("valid config");

    while !engine.is_finished() {
        engine.apply_ai_move().expect("ai move is legal");
    }
    assert!(engine.is_terminal());
    assert_eq!(engine.scores().iter().sum::<u32>(), 4);

    engine.restart();
    assert!(!engine.is_finished());
}

#[wasm_bindgen_test]
async fn think_ai_resolves_with_a_decision() {
    let engine = small_engine();
    let value: JsValue = JsFuture::from(engine.think_ai(Some(0)))
        .await
        .expect("promise resolves");
    let json = value.as_string().expect("decision is a JSON string");
    assert!(json.contains("\"line\""));
}
