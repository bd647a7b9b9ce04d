use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    board::{BoardError, Line, PlayerId},
    state::{GameEvent, GameState, IntegrityError, Standing},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimLineAction {
    pub player_id: PlayerId,
    pub line: Line,
}

impl ClaimLineAction {
    pub fn new(player_id: PlayerId, line: Line) -> Self {
        Self { player_id, line }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the game has already finished")]
    GameFinished,
    #[error("player {player_id} moved during player {current}'s turn")]
    NotPlayerTurn { player_id: PlayerId, current: PlayerId },
    #[error("player {player_id} is not seated in this game")]
    PlayerNotFound { player_id: PlayerId },
    #[error("{error}")]
    Board {
        #[from]
        error: BoardError,
    },
    #[error("game state is corrupt: {error}")]
    IntegrityViolation { error: IntegrityError },
}

/// 每步之后交给渲染层的结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standings: Option<Vec<Standing>>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        let standings = state.is_finished().then(|| state.standings());
        Self {
            state,
            events,
            standings,
        }
    }
}

/// 回合控制：唯一修改对局状态的入口。
#[derive(Debug, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn ensure_turn_owner(state: &GameState, player_id: PlayerId) -> Result<(), RuleError> {
        if state.get_player(player_id).is_none() {
            return Err(RuleError::PlayerNotFound { player_id });
        }
        if state.current_player != player_id {
            return Err(RuleError::NotPlayerTurn {
                player_id,
                current: state.current_player,
            });
        }
        Ok(())
    }

    fn emit(state: &mut GameState, events: &mut Vec<GameEvent>, event: GameEvent) {
        state.record_event(event.clone());
        events.push(event);
    }

    /// 当前玩家可以选择的连线；终局后为空。
    pub fn legal_lines(state: &GameState) -> Vec<Line> {
        if state.is_finished() {
            return Vec::new();
        }
        state.board.available_lines()
    }

    /// 占领一条线并推进回合。
    ///
    /// 闭合至少一个方格时同一玩家继续行动，否则轮到下一位；棋盘下满即结束对局。
    pub fn claim_line(
        &self,
        state: &mut GameState,
        action: ClaimLineAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }

        Self::ensure_integrity(state)?;
        Self::ensure_turn_owner(state, action.player_id)?;

        let ClaimLineAction { player_id, line } = action;
        let outcome = state.board.apply_move(line, player_id).map_err(|error| {
            warn!("rejected move from player {player_id}: {error}");
            RuleError::from(error)
        })?;

        let mut events = Vec::new();
        Self::emit(state, &mut events, GameEvent::LineClaimed { player_id, line });

        if !outcome.grants_extra_turn() {
            let next = state.pass_turn();
            Self::emit(
                state,
                &mut events,
                GameEvent::TurnPassed {
                    from: player_id,
                    to: next,
                },
            );
            return Ok(events);
        }

        state.credit_boxes(player_id, outcome.completed_count());
        Self::emit(
            state,
            &mut events,
            GameEvent::BoxesCompleted {
                player_id,
                boxes: outcome.completed_boxes,
            },
        );

        if state.board.is_terminal() {
            state.finish();
            let winners = state.winners();
            info!(
                "game finished after {} turns, winners {:?}, scores {:?}",
                state.turn, winners, state.scores
            );
            Self::emit(state, &mut events, GameEvent::GameFinished { winners });
        } else {
            Self::emit(state, &mut events, GameEvent::ExtraTurn { player_id });
        }

        Ok(events)
    }

    pub fn check_outcome(state: &GameState) -> Option<Vec<Standing>> {
        state.is_finished().then(|| state.standings())
    }
}
