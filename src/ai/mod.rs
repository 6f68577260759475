pub mod easy;
pub mod normal;
pub mod search;

use crate::board::Board;
use crate::config::ReversiConfig;
use crate::types::{Difficulty, Piece, Position};

pub use easy::GreedyEvaluator;
pub use normal::NormalEvaluator;
pub use search::Searcher;

/// Static square weights: corners high, X-squares and C-squares penalized.
pub(crate) const POSITION_WEIGHTS: [[i32; 8]; 8] = [
    [100, -20, 10, 5, 5, 10, -20, 100],
    [-20, -50, -2, -2, -2, -2, -50, -20],
    [10, -2, -1, -1, -1, -1, -2, 10],
    [5, -2, -1, -1, -1, -1, -2, 5],
    [5, -2, -1, -1, -1, -1, -2, 5],
    [10, -2, -1, -1, -1, -1, -2, 10],
    [-20, -50, -2, -2, -2, -2, -50, -20],
    [100, -20, 10, 5, 5, 10, -20, 100],
];

pub(crate) fn weight_of(pos: Position) -> i32 {
    POSITION_WEIGHTS[pos.row as usize][pos.col as usize]
}

/// Chooses the next move for a computer-controlled side.
///
/// Contract:
/// - Never mutates `board`; lookahead works on copies.
/// - Returns a position accepted by `board.can_place(.., side)` whenever
///   `board.has_any_legal_move(side)` holds, `None` otherwise.
pub trait MoveEvaluator: Send + Sync {
    fn difficulty(&self) -> Difficulty;

    fn next_move(&self, board: &Board, side: Piece) -> Option<Position>;
}

/// Builds the evaluator for a tier.
pub fn evaluator_for(difficulty: Difficulty, config: &ReversiConfig) -> Box<dyn MoveEvaluator> {
    match difficulty {
        Difficulty::Easy => Box::new(GreedyEvaluator),
        Difficulty::Normal => Box::new(NormalEvaluator::new(config.normal.jitter)),
        Difficulty::Hard => Box::new(Searcher::new(config.search)),
    }
}
