//! 游戏核心逻辑模块（棋盘引擎、对局状态、回合规则）。

pub mod board;
pub mod rules;
pub mod state;

pub use board::{
    Board,
    BoardError,
    BoxPos,
    Line,
    MoveOutcome,
    Orientation,
    PlayerId,
    MIN_GRID_SIZE,
};
pub use rules::{ClaimLineAction, RuleEngine, RuleError, RuleResolution};
pub use state::{
    ConfigError,
    ControlMode,
    GameConfig,
    GameEvent,
    GamePhase,
    GameState,
    IntegrityError,
    Player,
    Standing,
    SUPPORTED_GRID_SIZES,
};
