pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use log::{info, LevelFilter};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AiAgent, AiConfig, AiDecision};
pub use game::{
    Board, BoardError, BoxPos, ClaimLineAction, ConfigError, ControlMode, GameConfig, GameEvent,
    GamePhase, GameState, IntegrityError, Line, MoveOutcome, Orientation, Player, PlayerId,
    RuleEngine, RuleError, RuleResolution, Standing,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::init_logging(LevelFilter::Info);
}

/// JS 边界上可能出现的错误。
#[derive(Debug, Error)]
enum BridgeError {
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown line orientation `{0}`")]
    Orientation(String),
}

fn to_js_error(error: BridgeError) -> JsValue {
    let structured = match &error {
        BridgeError::Rule(inner) => to_value(inner).ok(),
        BridgeError::Config(inner) => to_value(inner).ok(),
        BridgeError::Integrity(inner) => to_value(inner).ok(),
        BridgeError::Json(_) | BridgeError::Orientation(_) => None,
    };
    structured.unwrap_or_else(|| JsValue::from_str(&error.to_string()))
}

#[derive(Debug, Serialize)]
struct AiMoveResponse {
    decision: AiDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<RuleResolution>,
}

fn config_from_json(config_json: Option<&str>) -> Result<GameConfig, BridgeError> {
    match config_json {
        Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(json)?),
        _ => Ok(GameConfig::default()),
    }
}

fn state_from_json(json: &str) -> Result<GameState, BridgeError> {
    let state: GameState = serde_json::from_str(json)?;
    state.integrity_check()?;
    Ok(state)
}

fn parse_line(orientation: &str, row: usize, col: usize) -> Result<Line, BridgeError> {
    let orientation = Orientation::from_str(orientation)
        .map_err(|_| BridgeError::Orientation(orientation.to_string()))?;
    Ok(Line::new(orientation, row, col))
}

fn claim_line_on(
    state: &mut GameState,
    action: ClaimLineAction,
) -> Result<RuleResolution, BridgeError> {
    let engine = RuleEngine::new();
    let events = engine.claim_line(state, action)?;
    Ok(RuleResolution::new(state.clone(), events))
}

/// 让当前玩家由 AI 代为走一步；对局已结束时只返回空决策。
fn ai_move_on(state: &mut GameState, config: &AiConfig) -> Result<AiMoveResponse, BridgeError> {
    let agent = AiAgent::new(config.clone());
    let decision = agent.decide(state, state.current_player);
    let applied = match decision.line {
        Some(line) => Some(claim_line_on(
            state,
            ClaimLineAction::new(decision.player_id, line),
        )?),
        None => None,
    };
    Ok(AiMoveResponse { decision, applied })
}

/// 为已入座的 `player_id` 计算 AI 决策。
fn ai_decision_for(state: &GameState, player_id: PlayerId) -> Result<AiDecision, BridgeError> {
    state.integrity_check()?;
    if state.get_player(player_id).is_none() {
        return Err(RuleError::PlayerNotFound { player_id }.into());
    }
    Ok(AiAgent::default().decide(state, player_id))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, BridgeError> {
    Ok(serde_json::to_string(value)?)
}

#[wasm_bindgen]
pub struct GameEngine {
    state: GameState,
    ai_config: AiConfig,
}

impl GameEngine {
    fn from_config_json(config_json: Option<&str>) -> Result<GameEngine, BridgeError> {
        let config = config_from_json(config_json)?;
        let state = GameState::from_config(config)?;
        info!(
            "new {0}x{0} game with {1} players",
            state.board.size(),
            state.player_count()
        );
        Ok(GameEngine {
            state,
            ai_config: AiConfig::default(),
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GameEngine, JsValue> {
        Self::from_config_json(config_json.as_deref()).map_err(to_js_error)
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(&self.state).map_err(to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.state = state_from_json(json).map_err(to_js_error)?;
        Ok(())
    }

    pub fn set_ai_config_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.ai_config = serde_json::from_str(json)
            .map_err(BridgeError::from)
            .map_err(to_js_error)?;
        Ok(())
    }

    pub fn available_lines_json(&self) -> Result<String, JsValue> {
        to_json(&RuleEngine::legal_lines(&self.state)).map_err(to_js_error)
    }

    pub fn claim_line(
        &mut self,
        orientation: &str,
        row: usize,
        col: usize,
    ) -> Result<String, JsValue> {
        let line = parse_line(orientation, row, col).map_err(to_js_error)?;
        let action = ClaimLineAction::new(self.state.current_player, line);
        claim_line_on(&mut self.state, action)
            .and_then(|resolution| to_json(&resolution))
            .map_err(to_js_error)
    }

    pub fn claim_line_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        serde_json::from_str::<ClaimLineAction>(action_json)
            .map_err(BridgeError::from)
            .and_then(|action| claim_line_on(&mut self.state, action))
            .and_then(|resolution| to_json(&resolution))
            .map_err(to_js_error)
    }

    /// 只给出建议，不落子。
    pub fn suggest_move_json(&self) -> Result<String, JsValue> {
        let agent = AiAgent::new(self.ai_config.clone());
        let decision = agent.decide(&self.state, self.state.current_player);
        to_json(&decision).map_err(to_js_error)
    }

    pub fn apply_ai_move(&mut self) -> Result<String, JsValue> {
        ai_move_on(&mut self.state, &self.ai_config)
            .and_then(|response| to_json(&response))
            .map_err(to_js_error)
    }

    /// 等待 `delay_ms`（缺省取 `AiConfig::think_delay_ms`）后在状态副本上计算 AI 决策。
    pub fn think_ai(&self, delay_ms: Option<u32>) -> Promise {
        let state = self.state.clone();
        let config = self.ai_config.clone();
        let delay = delay_ms.unwrap_or(config.think_delay_ms);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let agent = AiAgent::new(config);
            let decision = agent.decide(&state, state.current_player);
            let json = to_json(&decision).map_err(to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.state.board.is_terminal()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn awaiting_ai(&self) -> bool {
        self.state.awaiting_ai()
    }

    pub fn current_player(&self) -> u8 {
        self.state.current_player
    }

    pub fn scores(&self) -> Vec<u32> {
        self.state.scores.clone()
    }

    pub fn standings_json(&self) -> Result<String, JsValue> {
        to_json(&self.state.standings()).map_err(to_js_error)
    }

    pub fn restart(&mut self) {
        self.state.restart();
    }
}

/// 根据开局配置创建新的对局状态。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state(config: JsValue) -> Result<JsValue, JsValue> {
    let config: GameConfig = if config.is_undefined() || config.is_null() {
        GameConfig::default()
    } else {
        from_value(config).map_err(JsValue::from)?
    };
    let state = GameState::from_config(config)
        .map_err(BridgeError::from)
        .map_err(to_js_error)?;
    to_value(&state).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(BridgeError::from)
        .map_err(to_js_error)
}

#[wasm_bindgen(js_name = "availableLines")]
pub fn available_lines(state: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    to_value(&RuleEngine::legal_lines(&state)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "claimLine")]
pub fn claim_line(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: ClaimLineAction = from_value(action).map_err(JsValue::from)?;
    let resolution = claim_line_on(&mut state, action).map_err(to_js_error)?;
    to_value(&resolution).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(state: JsValue, player_id: u8) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let decision = ai_decision_for(&state, player_id).map_err(to_js_error)?;
    to_value(&decision).map_err(JsValue::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(json: &str) -> GameEngine {
        GameEngine::from_config_json(Some(json)).expect("config should be accepted")
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let engine = GameEngine::from_config_json(None).expect("default config is valid");
        assert_eq!(engine.state().board.size(), game::state::DEFAULT_GRID_SIZE);
        assert_eq!(engine.state().player_count(), 2);

        let blank = GameEngine::from_config_json(Some("  ")).expect("blank means default");
        assert_eq!(blank.state().board.size(), game::state::DEFAULT_GRID_SIZE);
    }

    #[test]
    fn bad_configs_are_reported() {
        assert!(matches!(
            GameEngine::from_config_json(Some(r#"{ "grid_size": 7 }"#)),
            Err(BridgeError::Config(ConfigError::UnsupportedGridSize { size: 7 }))
        ));
        assert!(matches!(
            GameEngine::from_config_json(Some("{ not json")),
            Err(BridgeError::Json(_))
        ));
    }

    #[test]
    fn parse_line_accepts_known_orientations() {
        assert_eq!(
            parse_line("vertical", 1, 2).expect("valid orientation"),
            Line::vertical(1, 2)
        );
        assert!(matches!(
            parse_line("diagonal", 0, 0),
            Err(BridgeError::Orientation(name)) if name == "diagonal"
        ));
    }

    #[test]
    fn state_round_trips_through_json_with_validation() {
        let mut engine = engine(r#"{ "grid_size": 3 }"#);
        claim_line_on(
            &mut engine.state,
            ClaimLineAction::new(0, Line::horizontal(0, 0)),
        )
        .expect("legal move");

        let json = to_json(engine.state()).expect("state serializes");
        let restored = state_from_json(&json).expect("state is consistent");
        assert_eq!(&restored, engine.state());

        let mut value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        value["scores"][1] = serde_json::json!(4);
        let tampered = serde_json::to_string(&value).expect("serializes");
        assert!(matches!(
            state_from_json(&tampered),
            Err(BridgeError::Integrity(IntegrityError::ScoreMismatch { .. }))
        ));
    }

    #[test]
    fn ai_moves_follow_the_turn_controller() {
        let mut engine = engine(
            r#"{ "grid_size": 3, "players": [ { "name": "A", "type": "ai" }, { "name": "B", "type": "ai" } ] }"#,
        );
        assert!(engine.state().awaiting_ai());

        let config = AiConfig::default();
        while !engine.state().is_finished() {
            let before = engine.state().board.available_lines();
            let response = ai_move_on(&mut engine.state, &config).expect("ai move is legal");
            let line = response.decision.line.expect("unfinished game has a move");
            assert!(before.contains(&line));
            assert!(response.applied.is_some());
        }

        let response = ai_move_on(&mut engine.state, &config).expect("finished game is fine");
        assert!(response.decision.line.is_none());
        assert!(response.applied.is_none());
        assert_eq!(engine.state().scores.iter().sum::<u32>(), 4);
    }

    #[test]
    fn ai_decisions_are_only_made_for_seated_players() {
        let engine = engine(r#"{ "grid_size": 4 }"#);
        let decision = ai_decision_for(engine.state(), 1).expect("player 1 is seated");
        assert_eq!(decision.player_id, 1);
        assert!(decision.line.is_some());

        assert!(matches!(
            ai_decision_for(engine.state(), 2),
            Err(BridgeError::Rule(RuleError::PlayerNotFound { player_id: 2 }))
        ));
    }

    #[test]
    fn resolution_json_stays_small_over_a_long_game() {
        let mut engine = engine(r#"{ "grid_size": 30 }"#);
        let mut largest = 0;
        let mut moves = 0;

        while !engine.state().is_finished() {
            let line = engine.state().board.available_lines()[0];
            let action = ClaimLineAction::new(engine.state().current_player, line);
            let resolution = claim_line_on(&mut engine.state, action).expect("legal move");
            largest = largest.max(to_json(&resolution).expect("serializes").len());
            moves += 1;
        }

        assert_eq!(moves, engine.state().board.total_lines());
        assert!(engine.state().event_log.len() <= game::state::EVENT_LOG_CAPACITY);
        assert!(largest < 32_000, "resolution grew to {largest} bytes");
    }

    #[test]
    fn resolution_json_exposes_events_and_board() {
        let mut engine = engine(r#"{ "grid_size": 3 }"#);
        let resolution = claim_line_on(
            &mut engine.state,
            ClaimLineAction::new(0, Line::vertical(0, 0)),
        )
        .expect("legal move");
        let json: serde_json::Value =
            serde_json::from_str(&to_json(&resolution).expect("serializes")).expect("valid");

        assert_eq!(json["state"]["board"]["vertical_lines"][0][0], 0);
        assert_eq!(json["state"]["current_player"], 1);
        assert_eq!(json["events"][0]["type"], "LineClaimed");
        assert_eq!(json["events"][1]["type"], "TurnPassed");
        assert!(json.get("standings").is_none());
    }
}
