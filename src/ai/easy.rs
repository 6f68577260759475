use crate::ai::MoveEvaluator;
use crate::board::Board;
use crate::types::{Difficulty, Piece, Position};

/// Takes whatever flips the most discs right now.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyEvaluator;

impl MoveEvaluator for GreedyEvaluator {
    fn difficulty(&self) -> Difficulty {
        Difficulty::Easy
    }

    fn next_move(&self, board: &Board, side: Piece) -> Option<Position> {
        let mut best: Option<(Position, u32)> = None;
        // legal_moves is row-major; strict `>` keeps the first of equal counts.
        for mv in board.legal_moves(side) {
            let flips = board.flip_mask(mv.index(), side).count_ones();
            if best.is_none_or(|(_, count)| flips > count) {
                best = Some((mv, flips));
            }
        }
        best.map(|(mv, _)| mv)
    }
}
