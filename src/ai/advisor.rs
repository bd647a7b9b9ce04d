use log::debug;
use serde::{Deserialize, Serialize};

use crate::game::{Board, GameState, Line, Orientation, PlayerId};
use crate::utils::Stopwatch;

/// 每闭合一个方格的奖励。
pub const COMPLETION_REWARD: f64 = 1000.0;
/// 留给对手一个三边方格的惩罚。
pub const GIVEAWAY_PENALTY: f64 = 500.0;
/// 位置评估里对三边方格的额外惩罚，与 `GIVEAWAY_PENALTY` 叠加。
pub const THREE_SIDED_PENALTY: f64 = 200.0;
pub const TWO_SIDED_BONUS: f64 = 50.0;
pub const CENTER_DISTANCE_WEIGHT: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    /// 连续闭合方格时向后看的最大层数。
    pub max_chain_depth: u8,
    /// 后续最佳走法计入当前分数时的权重。
    pub chain_weight: f64,
    /// 控制层在调用 AI 前的停顿，便于渲染上一步。
    pub think_delay_ms: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 3,
            chain_weight: 0.5,
            think_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    pub player_id: PlayerId,
    pub evaluation: f64,
    pub candidates: usize,
    pub nodes: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Default)]
struct SearchStats {
    nodes: u64,
}

/// 启发式选线。
///
/// 只沿着行动方自己的连续回合向后看，不模拟对手的应对。
/// 每次模拟都在棋盘副本上进行，调用方持有的棋盘不会被修改。
#[derive(Debug, Clone, Default)]
pub struct AiAgent {
    config: AiConfig,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// 得分最高的连线；同分时取枚举顺序中最早的一条。棋盘下满时返回 `None`。
    pub fn select_move(&self, board: &Board, player_id: PlayerId) -> Option<Line> {
        let mut stats = SearchStats::default();
        self.search(board, player_id, &mut stats)
            .map(|(line, _)| line)
    }

    pub fn decide(&self, state: &GameState, player_id: PlayerId) -> AiDecision {
        let watch = Stopwatch::start();
        let mut stats = SearchStats::default();
        let candidates = if state.is_finished() {
            0
        } else {
            state.board.available_lines().len()
        };

        let best = if candidates == 0 {
            None
        } else {
            self.search(&state.board, player_id, &mut stats)
        };

        let duration_ms = watch.elapsed().as_millis() as u64;
        if let Some((line, score)) = best {
            debug!(
                "player {player_id} picks {line} (score {score:.1}) from {candidates} lines, {} nodes in {duration_ms}ms",
                stats.nodes
            );
        }

        AiDecision {
            line: best.map(|(line, _)| line),
            player_id,
            evaluation: best.map(|(_, score)| score).unwrap_or(0.0),
            candidates,
            nodes: stats.nodes,
            duration_ms,
        }
    }

    /// 评估“由 `player_id` 占领 `line`”这一步的分数。
    pub fn evaluate(&self, board: &Board, line: Line, player_id: PlayerId, depth: u8) -> f64 {
        let mut stats = SearchStats::default();
        self.score_line(board, line, player_id, depth, &mut stats)
    }

    fn search(
        &self,
        board: &Board,
        player_id: PlayerId,
        stats: &mut SearchStats,
    ) -> Option<(Line, f64)> {
        let mut best_line = None;
        let mut best_score = f64::NEG_INFINITY;

        for line in board.available_lines() {
            let score = self.score_line(board, line, player_id, 0, stats);
            if score > best_score {
                best_score = score;
                best_line = Some(line);
            }
        }

        best_line.map(|line| (line, best_score))
    }

    fn score_line(
        &self,
        board: &Board,
        line: Line,
        player_id: PlayerId,
        depth: u8,
        stats: &mut SearchStats,
    ) -> f64 {
        stats.nodes += 1;

        let mut scratch = board.clone();
        let completed = match scratch.apply_move(line, player_id) {
            Ok(outcome) => outcome.completed_count(),
            Err(error) => {
                debug!("skipping unplayable line: {error}");
                return f64::NEG_INFINITY;
            }
        };

        let mut score = completed as f64 * COMPLETION_REWARD;
        score -= giveaway_count(&scratch, line) as f64 * GIVEAWAY_PENALTY;
        score += positional_value(&scratch, line, completed);

        if completed > 0 && depth < self.config.max_chain_depth {
            let follow_up = scratch
                .available_lines()
                .into_iter()
                .map(|next| self.score_line(&scratch, next, player_id, depth + 1, stats))
                .fold(f64::NEG_INFINITY, f64::max);
            if follow_up > f64::NEG_INFINITY {
                score += follow_up * self.config.chain_weight;
            }
        }

        score
    }
}

/// 与连线相邻、尚未归属且恰好三边已占的方格数。
fn giveaway_count(board: &Board, line: Line) -> usize {
    board
        .adjacent_boxes(line)
        .into_iter()
        .flatten()
        .filter(|pos| board.box_owner(*pos).is_none() && board.count_box_sides(*pos) == 3)
        .count()
}

fn positional_value(board: &Board, line: Line, completed: usize) -> f64 {
    let size = board.size() as f64;
    let center_col = (size - 1.0) / 2.0;
    // 横线的行距以 N / 2 为中心，竖线以 (N - 1) / 2 为中心。
    let center_row = match line.orientation {
        Orientation::Horizontal => size / 2.0,
        Orientation::Vertical => (size - 1.0) / 2.0,
    };
    let distance = (line.row as f64 - center_row).abs() + (line.col as f64 - center_col).abs();
    let mut score = -distance * CENTER_DISTANCE_WEIGHT;

    let mut two_sided = 0;
    let mut three_sided = 0;
    for pos in board.adjacent_boxes(line).into_iter().flatten() {
        if board.box_owner(pos).is_some() {
            continue;
        }
        match board.count_box_sides(pos) {
            2 => two_sided += 1,
            3 => three_sided += 1,
            _ => {}
        }
    }

    score -= three_sided as f64 * THREE_SIDED_PENALTY;
    if completed == 0 {
        score += two_sided as f64 * TWO_SIDED_BONUS;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{BoxPos, ClaimLineAction, ControlMode, GameConfig, Player, RuleEngine};

    fn board_with(size: usize, lines: &[Line]) -> Board {
        let mut board = Board::new(size).expect("valid size");
        for line in lines {
            board.apply_move(*line, 1).expect("setup line");
        }
        board
    }

    #[test]
    fn empty_single_box_prefers_the_bottom_edge() {
        // Scores: H(0,0) -7.5, H(1,0) -2.5, V(0,0) -5, V(0,1) -5.
        let board = Board::new(2).expect("valid size");
        let agent = AiAgent::default();
        assert_eq!(agent.evaluate(&board, Line::horizontal(0, 0), 0, 0), -7.5);
        assert_eq!(agent.evaluate(&board, Line::horizontal(1, 0), 0, 0), -2.5);
        assert_eq!(agent.evaluate(&board, Line::vertical(0, 1), 0, 0), -5.0);
        assert_eq!(agent.select_move(&board, 0), Some(Line::horizontal(1, 0)));
    }

    #[test]
    fn ties_go_to_the_first_enumerated_line() {
        // V(0,0) and V(0,1) both score 45.0; H(0,0) scores 42.5.
        let board = board_with(2, &[Line::horizontal(1, 0)]);
        let agent = AiAgent::default();
        assert_eq!(agent.evaluate(&board, Line::vertical(0, 0), 0, 0), 45.0);
        assert_eq!(agent.evaluate(&board, Line::vertical(0, 1), 0, 0), 45.0);
        assert_eq!(agent.select_move(&board, 0), Some(Line::vertical(0, 0)));
        for _ in 0..5 {
            assert_eq!(agent.select_move(&board, 0), Some(Line::vertical(0, 0)));
        }
    }

    #[test]
    fn closing_the_last_box_scores_without_follow_up() {
        let board = board_with(
            2,
            &[
                Line::horizontal(0, 0),
                Line::horizontal(1, 0),
                Line::vertical(0, 0),
            ],
        );
        let agent = AiAgent::default();
        assert_eq!(agent.evaluate(&board, Line::vertical(0, 1), 0, 0), 995.0);
        assert_eq!(agent.select_move(&board, 0), Some(Line::vertical(0, 1)));
    }

    #[test]
    fn giveaway_lines_are_penalised_twice() {
        // Box (0,0) of a 3x3 dot grid already has two sides; a third side costs 500 + 200.
        let board = board_with(3, &[Line::horizontal(0, 0), Line::vertical(0, 0)]);
        let agent = AiAgent::default();
        let score = agent.evaluate(&board, Line::horizontal(1, 0), 0, 0);
        // H(1,0): distance |1 - 1.5| + |0 - 1| = 1.5; box (1,0) below reaches one side only.
        assert_eq!(score, -7.5 - 500.0 - 200.0);

        let choice = agent.select_move(&board, 0).expect("lines remain");
        let closes_in = choice == Line::horizontal(1, 0) || choice == Line::vertical(0, 1);
        assert!(!closes_in, "advisor should not hand out box (0, 0)");
    }

    #[test]
    fn chain_lookahead_rewards_follow_up_captures() {
        // Both top boxes are three-sided; V(0,0) and V(0,2) close them one after another.
        let board = board_with(
            3,
            &[
                Line::horizontal(0, 0),
                Line::horizontal(1, 0),
                Line::vertical(0, 1),
                Line::horizontal(0, 1),
                Line::horizontal(1, 1),
            ],
        );
        let shallow = AiAgent::new(AiConfig {
            max_chain_depth: 0,
            ..AiConfig::default()
        });
        assert_eq!(shallow.evaluate(&board, Line::vertical(0, 0), 0, 0), 990.0);

        let agent = AiAgent::default();
        let chained = agent.evaluate(&board, Line::vertical(0, 0), 0, 0);
        assert!(chained > 990.0 + 0.5 * 990.0, "got {chained}");

        let pick = agent.select_move(&board, 0).expect("lines remain");
        assert!(pick == Line::vertical(0, 0) || pick == Line::vertical(0, 2));
    }

    #[test]
    fn evaluation_leaves_the_board_untouched() {
        let board = board_with(
            4,
            &[
                Line::horizontal(1, 1),
                Line::horizontal(2, 1),
                Line::vertical(1, 1),
                Line::horizontal(0, 0),
            ],
        );
        let snapshot = board.clone();
        let agent = AiAgent::default();

        for line in board.available_lines() {
            agent.evaluate(&board, line, 0, 0);
        }
        let pick = agent.select_move(&board, 0);

        assert_eq!(board, snapshot);
        assert_eq!(pick, Some(Line::vertical(1, 2)));
    }

    #[test]
    fn claimed_lines_are_never_worth_playing() {
        let board = board_with(3, &[Line::vertical(1, 1)]);
        let agent = AiAgent::default();
        assert_eq!(
            agent.evaluate(&board, Line::vertical(1, 1), 0, 0),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn decide_reports_nothing_on_finished_games() {
        let engine = RuleEngine::new();
        let mut state = GameState::from_config(GameConfig::new(
            3,
            vec![
                Player::new("A", ControlMode::Ai, "#111"),
                Player::new("B", ControlMode::Ai, "#222"),
            ],
        ))
        .expect("config should be valid");
        let agent = AiAgent::default();

        while !state.is_finished() {
            let decision = agent.decide(&state, state.current_player);
            let line = decision.line.expect("unfinished game has a move");
            assert!(decision.candidates > 0);
            assert!(decision.nodes >= decision.candidates as u64);
            let action = ClaimLineAction::new(state.current_player, line);
            engine
                .claim_line(&mut state, action)
                .expect("advisor moves are legal");
        }

        let decision = agent.decide(&state, 0);
        assert_eq!(decision.line, None);
        assert_eq!(decision.candidates, 0);
        assert_eq!(state.scores.iter().sum::<u32>(), 4);
        assert!(state.board.box_owner(BoxPos::new(1, 1)).is_some());
    }
}
