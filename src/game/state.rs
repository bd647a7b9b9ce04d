use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use super::board::{Board, BoardError, BoxPos, Line, PlayerId};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;
pub const DEFAULT_GRID_SIZE: usize = 30;
/// 设置界面可选的点阵尺寸（每边点数）。
pub const SUPPORTED_GRID_SIZES: [usize; 10] = [3, 4, 5, 6, 8, 10, 20, 30, 40, 50];
/// `GameState::event_log` 只保留最近的这么多条事件。
pub const EVENT_LOG_CAPACITY: usize = 64;
pub const DEFAULT_COLORS: [&str; MAX_PLAYERS] = ["#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    #[default]
    Human,
    Ai,
}

impl FromStr for ControlMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(ControlMode::Human),
            "ai" | "computer" => Ok(ControlMode::Ai),
            _ => Err(()),
        }
    }
}

/// 玩家信息。名字与颜色只用于展示，规则与 AI 不读取它们。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "type")]
    pub control: ControlMode,
    #[serde(default)]
    pub color: String,
}

impl Player {
    pub fn new(name: impl Into<String>, control: ControlMode, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control,
            color: color.into(),
        }
    }

    /// 设置界面为第 `index` 个席位预填的玩家。
    pub fn default_for(index: usize) -> Self {
        Self::new(
            format!("Player {}", index + 1),
            ControlMode::Human,
            DEFAULT_COLORS[index % DEFAULT_COLORS.len()],
        )
    }

    pub fn is_ai(&self) -> bool {
        self.control == ControlMode::Ai
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum ConfigError {
    #[error("unsupported grid size {size}")]
    UnsupportedGridSize { size: usize },
    #[error("a game needs 2 to 4 players, got {count}")]
    InvalidPlayerCount { count: usize },
    #[error("{error}")]
    Board {
        #[from]
        error: BoardError,
    },
}

/// 开局配置，仅在开局时读取。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameConfig {
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
    #[serde(default = "default_players")]
    pub players: Vec<Player>,
}

fn default_grid_size() -> usize {
    DEFAULT_GRID_SIZE
}

fn default_players() -> Vec<Player> {
    (0..MIN_PLAYERS).map(Player::default_for).collect()
}

impl GameConfig {
    pub fn new(grid_size: usize, players: Vec<Player>) -> Self {
        Self { grid_size, players }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_GRID_SIZES.contains(&self.grid_size) {
            return Err(ConfigError::UnsupportedGridSize {
                size: self.grid_size,
            });
        }
        let count = self.players.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
            return Err(ConfigError::InvalidPlayerCount { count });
        }
        Ok(())
    }

    /// 空白的名字和颜色回落到席位默认值。
    fn normalized(mut self) -> Self {
        for (index, player) in self.players.iter_mut().enumerate() {
            let fallback = Player::default_for(index);
            if player.name.trim().is_empty() {
                player.name = fallback.name;
            }
            if player.color.trim().is_empty() {
                player.color = fallback.color;
            }
        }
        self
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE, default_players())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    InProgress,
    Finished,
}

/// 终局排名中的一行。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Standing {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    pub winner: bool,
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameStarted {
        grid_size: usize,
        player_count: usize,
    },
    LineClaimed {
        player_id: PlayerId,
        line: Line,
    },
    BoxesCompleted {
        player_id: PlayerId,
        boxes: Vec<BoxPos>,
    },
    ExtraTurn {
        player_id: PlayerId,
    },
    TurnPassed {
        from: PlayerId,
        to: PlayerId,
    },
    GameFinished {
        winners: Vec<PlayerId>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("board arrays do not describe a {size}x{size} dot grid")]
    MalformedBoard { size: usize },
    #[error("box ({row}, {col}) ownership disagrees with its claimed sides")]
    BoxOwnershipMismatch { row: usize, col: usize },
    #[error("claimed box counter is {recorded} but {actual} boxes are owned")]
    ClaimedBoxCountMismatch { recorded: usize, actual: usize },
    #[error("player count {count} is outside 2..=4")]
    InvalidPlayerCount { count: usize },
    #[error("current player {player_id} does not exist")]
    InvalidPlayerIndex { player_id: PlayerId },
    #[error("score table has {actual} entries for {expected} players")]
    ScoreTableMismatch { expected: usize, actual: usize },
    #[error("player {player_id} has score {recorded} but owns {actual} boxes")]
    ScoreMismatch {
        player_id: PlayerId,
        recorded: u32,
        actual: u32,
    },
    #[error("an element is owned by unknown player {player_id}")]
    UnknownOwner { player_id: PlayerId },
    #[error("phase says finished={finished} but the board is terminal={terminal}")]
    PhaseMismatch { finished: bool, terminal: bool },
}

/// 对局会话：棋盘、玩家、比分与当前行动者。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub players: Vec<Player>,
    pub scores: Vec<u32>,
    pub current_player: PlayerId,
    #[serde(default = "first_turn")]
    pub turn: u32,
    #[serde(default)]
    pub phase: GamePhase,
    /// 最近的事件，超过 `EVENT_LOG_CAPACITY` 时丢弃最早的。
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

fn first_turn() -> u32 {
    1
}

impl GameState {
    pub fn new(board: Board, players: Vec<Player>) -> Self {
        let scores = vec![0; players.len()];
        Self {
            board,
            players,
            scores,
            current_player: 0,
            turn: first_turn(),
            phase: GamePhase::default(),
            event_log: Vec::new(),
        }
    }

    pub fn from_config(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = config.normalized();
        let board = Board::new(config.grid_size)?;
        let mut state = Self::new(board, config.players);
        state.record_event(GameEvent::GameStarted {
            grid_size: config.grid_size,
            player_count: state.players.len(),
        });
        Ok(state)
    }

    pub fn config(&self) -> GameConfig {
        GameConfig::new(self.board.size(), self.players.clone())
    }

    /// 以相同的尺寸和玩家重新开局。
    pub fn restart(&mut self) {
        let mut board = self.board.clone();
        board.reset();
        *self = Self::new(board, self.players.clone());
        self.record_event(GameEvent::GameStarted {
            grid_size: self.board.size(),
            player_count: self.players.len(),
        });
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
        let excess = self.event_log.len().saturating_sub(EVENT_LOG_CAPACITY);
        if excess > 0 {
            self.event_log.drain(..excess);
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id as usize)
    }

    pub fn current(&self) -> Option<&Player> {
        self.get_player(self.current_player)
    }

    pub fn score_of(&self, id: PlayerId) -> u32 {
        self.scores.get(id as usize).copied().unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::Finished
    }

    /// 对局进行中且轮到 AI 行动。
    pub fn awaiting_ai(&self) -> bool {
        !self.is_finished() && self.current().is_some_and(Player::is_ai)
    }

    pub fn next_player_after(&self, id: PlayerId) -> PlayerId {
        let count = self.players.len().max(1);
        ((id as usize + 1) % count) as PlayerId
    }

    pub fn credit_boxes(&mut self, player_id: PlayerId, count: usize) {
        if let Some(score) = self.scores.get_mut(player_id as usize) {
            *score += count as u32;
        }
    }

    /// 把回合交给下一位玩家，返回新的当前玩家。
    pub fn pass_turn(&mut self) -> PlayerId {
        self.current_player = self.next_player_after(self.current_player);
        self.turn += 1;
        self.current_player
    }

    pub fn finish(&mut self) -> Vec<Standing> {
        self.phase = GamePhase::Finished;
        self.standings()
    }

    /// 按得分从高到低排列（同分保持座次顺序），所有最高分玩家都是赢家。
    pub fn standings(&self) -> Vec<Standing> {
        let best = self.scores.iter().copied().max().unwrap_or(0);
        let mut standings: Vec<Standing> = self
            .players
            .iter()
            .enumerate()
            .map(|(index, player)| {
                let score = self.score_of(index as PlayerId);
                Standing {
                    player_id: index as PlayerId,
                    name: player.name.clone(),
                    score,
                    winner: self.is_finished() && score == best,
                }
            })
            .collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings
    }

    pub fn winners(&self) -> Vec<PlayerId> {
        self.standings()
            .into_iter()
            .filter(|standing| standing.winner)
            .map(|standing| standing.player_id)
            .collect()
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        self.board.integrity_check()?;

        let count = self.players.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
            return Err(IntegrityError::InvalidPlayerCount { count });
        }
        if self.current_player as usize >= count {
            return Err(IntegrityError::InvalidPlayerIndex {
                player_id: self.current_player,
            });
        }
        if self.scores.len() != count {
            return Err(IntegrityError::ScoreTableMismatch {
                expected: count,
                actual: self.scores.len(),
            });
        }

        let owners = self
            .board
            .horizontal_lines()
            .iter()
            .chain(self.board.vertical_lines())
            .chain(self.board.boxes())
            .flatten()
            .flatten();
        for owner in owners {
            if *owner as usize >= count {
                return Err(IntegrityError::UnknownOwner { player_id: *owner });
            }
        }

        let finished = self.is_finished();
        let terminal = self.board.is_terminal();
        if finished != terminal {
            return Err(IntegrityError::PhaseMismatch { finished, terminal });
        }

        for (index, actual) in self.board.scores(count).into_iter().enumerate() {
            let recorded = self.scores[index];
            if recorded != actual {
                return Err(IntegrityError::ScoreMismatch {
                    player_id: index as PlayerId,
                    recorded,
                    actual,
                });
            }
        }

        Ok(())
    }
}
