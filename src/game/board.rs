//! 棋盘引擎：点阵拓扑、连线与方格归属、落线及方格完成判定。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::IntegrityError;

/// 玩家标识，即玩家在固定回合顺序中的下标。
pub type PlayerId = u8;

/// 每边最少的点数（1×1 个方格）。
pub const MIN_GRID_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl FromStr for Orientation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal" | "h" => Ok(Orientation::Horizontal),
            "vertical" | "v" => Ok(Orientation::Vertical),
            _ => Err(()),
        }
    }
}

/// 两个相邻点之间的连线。
///
/// 横线 `(row, col)` 连接点 `(row, col)-(row, col + 1)`，
/// 竖线 `(row, col)` 连接点 `(row, col)-(row + 1, col)`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Line {
    #[serde(rename = "type")]
    pub orientation: Orientation,
    pub row: usize,
    pub col: usize,
}

impl Line {
    pub fn new(orientation: Orientation, row: usize, col: usize) -> Self {
        Self {
            orientation,
            row,
            col,
        }
    }

    pub fn horizontal(row: usize, col: usize) -> Self {
        Self::new(Orientation::Horizontal, row, col)
    }

    pub fn vertical(row: usize, col: usize) -> Self {
        Self::new(Orientation::Vertical, row, col)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.orientation {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        };
        write!(f, "{kind}({}, {})", self.row, self.col)
    }
}

/// 方格坐标。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BoxPos {
    pub row: usize,
    pub col: usize,
}

impl BoxPos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// 围成该方格的四条边：上、下、左、右。
    pub fn bounding_lines(self) -> [Line; 4] {
        [
            Line::horizontal(self.row, self.col),
            Line::horizontal(self.row + 1, self.col),
            Line::vertical(self.row, self.col),
            Line::vertical(self.row, self.col + 1),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum BoardError {
    #[error("a grid needs at least 2 dots per side, got {size}")]
    InvalidDimension { size: usize },
    #[error("line {line} lies outside a {size}x{size} dot grid")]
    LineOutOfRange { line: Line, size: usize },
    #[error("line {line} is already claimed")]
    LineAlreadyClaimed { line: Line },
}

/// 一次落线的结果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveOutcome {
    pub line: Line,
    pub player_id: PlayerId,
    #[serde(default)]
    pub completed_boxes: Vec<BoxPos>,
}

impl MoveOutcome {
    pub fn completed_count(&self) -> usize {
        self.completed_boxes.len()
    }

    /// 完成至少一个方格的玩家继续行动。
    pub fn grants_extra_turn(&self) -> bool {
        !self.completed_boxes.is_empty()
    }
}

/// N×N 点阵上的连线与方格状态。
///
/// 每条线、每个方格只保存一个 `Option<PlayerId>`：`None` 表示未占领。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    size: usize,
    horizontal_lines: Vec<Vec<Option<PlayerId>>>,
    vertical_lines: Vec<Vec<Option<PlayerId>>>,
    boxes: Vec<Vec<Option<PlayerId>>>,
    claimed_boxes: usize,
}

impl Board {
    pub fn new(size: usize) -> Result<Self, BoardError> {
        if size < MIN_GRID_SIZE {
            return Err(BoardError::InvalidDimension { size });
        }
        Ok(Self::blank(size))
    }

    fn blank(size: usize) -> Self {
        let cells = size - 1;
        Self {
            size,
            horizontal_lines: vec![vec![None; cells]; size],
            vertical_lines: vec![vec![None; size]; cells],
            boxes: vec![vec![None; cells]; cells],
            claimed_boxes: 0,
        }
    }

    /// 清空所有连线与方格，保留点阵尺寸。
    pub fn reset(&mut self) {
        *self = Self::blank(self.size);
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// 每行（每列）的方格数。
    #[inline]
    pub fn box_rows(&self) -> usize {
        self.size - 1
    }

    #[inline]
    pub fn total_boxes(&self) -> usize {
        self.box_rows() * self.box_rows()
    }

    #[inline]
    pub fn claimed_box_count(&self) -> usize {
        self.claimed_boxes
    }

    pub fn horizontal_line_count(&self) -> usize {
        self.size * (self.size - 1)
    }

    pub fn vertical_line_count(&self) -> usize {
        (self.size - 1) * self.size
    }

    pub fn total_lines(&self) -> usize {
        self.horizontal_line_count() + self.vertical_line_count()
    }

    pub fn contains_line(&self, line: Line) -> bool {
        match line.orientation {
            Orientation::Horizontal => line.row < self.size && line.col < self.size - 1,
            Orientation::Vertical => line.row < self.size - 1 && line.col < self.size,
        }
    }

    pub fn contains_box(&self, pos: BoxPos) -> bool {
        pos.row < self.box_rows() && pos.col < self.box_rows()
    }

    fn line_slot(&self, line: Line) -> Option<Option<PlayerId>> {
        let grid = match line.orientation {
            Orientation::Horizontal => &self.horizontal_lines,
            Orientation::Vertical => &self.vertical_lines,
        };
        grid.get(line.row).and_then(|row| row.get(line.col)).copied()
    }

    fn line_slot_mut(&mut self, line: Line) -> Option<&mut Option<PlayerId>> {
        let grid = match line.orientation {
            Orientation::Horizontal => &mut self.horizontal_lines,
            Orientation::Vertical => &mut self.vertical_lines,
        };
        grid.get_mut(line.row).and_then(|row| row.get_mut(line.col))
    }

    pub fn line_owner(&self, line: Line) -> Option<PlayerId> {
        self.line_slot(line).flatten()
    }

    #[inline]
    pub fn is_claimed(&self, line: Line) -> bool {
        self.line_owner(line).is_some()
    }

    pub fn box_owner(&self, pos: BoxPos) -> Option<PlayerId> {
        self.boxes
            .get(pos.row)
            .and_then(|row| row.get(pos.col))
            .copied()
            .flatten()
    }

    pub fn count_box_sides(&self, pos: BoxPos) -> u8 {
        pos.bounding_lines()
            .iter()
            .filter(|line| self.is_claimed(**line))
            .count() as u8
    }

    /// 方格尚无归属且四条边均已被占领。
    pub fn is_box_complete(&self, pos: BoxPos) -> bool {
        self.contains_box(pos) && self.box_owner(pos).is_none() && self.count_box_sides(pos) == 4
    }

    /// 与连线相邻的方格，按“先上后下 / 先左后右”的顺序给出，棋盘边缘处为 `None`。
    pub fn adjacent_boxes(&self, line: Line) -> [Option<BoxPos>; 2] {
        let last = self.box_rows();
        let Line { row, col, .. } = line;
        match line.orientation {
            Orientation::Horizontal => [
                (row > 0).then(|| BoxPos::new(row - 1, col)),
                (row < last).then(|| BoxPos::new(row, col)),
            ],
            Orientation::Vertical => [
                (col > 0).then(|| BoxPos::new(row, col - 1)),
                (col < last).then(|| BoxPos::new(row, col)),
            ],
        }
    }

    /// 占领一条线，并把因此闭合的方格记到该玩家名下。
    ///
    /// 越界或重复占领会被拒绝，且棋盘保持不变。
    pub fn apply_move(
        &mut self,
        line: Line,
        player_id: PlayerId,
    ) -> Result<MoveOutcome, BoardError> {
        let size = self.size;
        let slot = self
            .line_slot_mut(line)
            .ok_or(BoardError::LineOutOfRange { line, size })?;
        if slot.is_some() {
            return Err(BoardError::LineAlreadyClaimed { line });
        }
        *slot = Some(player_id);

        let mut completed_boxes = Vec::with_capacity(2);
        for pos in self.adjacent_boxes(line).into_iter().flatten() {
            if self.is_box_complete(pos) {
                self.boxes[pos.row][pos.col] = Some(player_id);
                self.claimed_boxes += 1;
                completed_boxes.push(pos);
            }
        }

        Ok(MoveOutcome {
            line,
            player_id,
            completed_boxes,
        })
    }

    /// 所有方格都已有归属。
    pub fn is_terminal(&self) -> bool {
        self.claimed_boxes == self.total_boxes()
    }

    /// 未占领的连线：先横线后竖线，各自按行优先顺序。
    pub fn available_lines(&self) -> Vec<Line> {
        let horizontal = unclaimed_in(&self.horizontal_lines, Orientation::Horizontal);
        let vertical = unclaimed_in(&self.vertical_lines, Orientation::Vertical);
        horizontal.chain(vertical).collect()
    }

    /// 按方格归属直接重新计数的比分。
    pub fn scores(&self, player_count: usize) -> Vec<u32> {
        let mut scores = vec![0u32; player_count];
        for owner in self.boxes.iter().flatten().flatten() {
            if let Some(score) = scores.get_mut(*owner as usize) {
                *score += 1;
            }
        }
        scores
    }

    pub fn horizontal_lines(&self) -> &[Vec<Option<PlayerId>>] {
        &self.horizontal_lines
    }

    pub fn vertical_lines(&self) -> &[Vec<Option<PlayerId>>] {
        &self.vertical_lines
    }

    pub fn boxes(&self) -> &[Vec<Option<PlayerId>>] {
        &self.boxes
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let size = self.size;
        if size < MIN_GRID_SIZE {
            return Err(IntegrityError::MalformedBoard { size });
        }
        let cells = size - 1;
        let shaped = |grid: &[Vec<Option<PlayerId>>], rows: usize, cols: usize| {
            grid.len() == rows && grid.iter().all(|row| row.len() == cols)
        };
        if !shaped(&self.horizontal_lines, size, cells)
            || !shaped(&self.vertical_lines, cells, size)
            || !shaped(&self.boxes, cells, cells)
        {
            return Err(IntegrityError::MalformedBoard { size });
        }

        let mut owned = 0;
        for row in 0..cells {
            for col in 0..cells {
                let pos = BoxPos::new(row, col);
                let closed = self.count_box_sides(pos) == 4;
                let has_owner = self.box_owner(pos).is_some();
                if closed != has_owner {
                    return Err(IntegrityError::BoxOwnershipMismatch { row, col });
                }
                if has_owner {
                    owned += 1;
                }
            }
        }

        if owned != self.claimed_boxes {
            return Err(IntegrityError::ClaimedBoxCountMismatch {
                recorded: self.claimed_boxes,
                actual: owned,
            });
        }
        Ok(())
    }
}

fn unclaimed_in(
    grid: &[Vec<Option<PlayerId>>],
    orientation: Orientation,
) -> impl Iterator<Item = Line> + '_ {
    grid.iter().enumerate().flat_map(move |(row, cols)| {
        cols.iter()
            .enumerate()
            .filter(|(_, owner)| owner.is_none())
            .map(move |(col, _)| Line::new(orientation, row, col))
    })
}
