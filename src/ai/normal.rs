use std::cmp::Ordering;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ai::{MoveEvaluator, weight_of};
use crate::board::Board;
use crate::types::{Difficulty, Piece, Position};

/// At or below this many empties the tie-break flips toward bigger captures.
const ENDGAME_EMPTIES: u8 = 12;

/// Positional play with a little noise so games do not repeat.
#[derive(Debug)]
pub struct NormalEvaluator {
    jitter: u8,
    rng: Mutex<StdRng>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    mv: Position,
    score: i32,
    flips: u32,
}

impl NormalEvaluator {
    pub fn new(jitter: u8) -> Self {
        Self {
            jitter,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible variant for tests and replays.
    pub fn with_seed(jitter: u8, seed: u64) -> Self {
        Self {
            jitter,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn noise(&self) -> i32 {
        if self.jitter == 0 {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_range(0..=self.jitter as i32)
    }
}

/// Orders two candidates with equal score: before the endgame fewer flips are
/// better, afterwards more flips are.
fn tie_break(a: &Candidate, b: &Candidate, endgame: bool) -> Ordering {
    if endgame {
        a.flips.cmp(&b.flips)
    } else {
        b.flips.cmp(&a.flips)
    }
}

fn is_better(candidate: &Candidate, best: &Candidate, endgame: bool) -> bool {
    match candidate.score.cmp(&best.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => tie_break(candidate, best, endgame) == Ordering::Greater,
    }
}

impl MoveEvaluator for NormalEvaluator {
    fn difficulty(&self) -> Difficulty {
        Difficulty::Normal
    }

    fn next_move(&self, board: &Board, side: Piece) -> Option<Position> {
        let endgame = board.empty_count() <= ENDGAME_EMPTIES;
        let mut best: Option<Candidate> = None;

        for mv in board.legal_moves(side) {
            let candidate = Candidate {
                mv,
                score: weight_of(mv) + self.noise(),
                flips: board.flip_mask(mv.index(), side).count_ones(),
            };
            if best.is_none_or(|b| is_better(&candidate, &b, endgame)) {
                best = Some(candidate);
            }
        }

        best.map(|c| c.mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::bit;

    fn idx(row: usize, col: usize) -> usize {
        row * 8 + col
    }

    #[test]
    fn prefers_corner_over_edge() {
        // a1 and e1 are both on offer; the corner wins regardless of jitter.
        let black = bit(idx(0, 2)) | bit(idx(2, 4));
        let white = bit(idx(0, 1)) | bit(idx(1, 4));
        let board = Board::from_bitboards(black, white);

        for seed in 0..16 {
            let evaluator = NormalEvaluator::with_seed(2, seed);
            assert_eq!(
                evaluator.next_move(&board, Piece::Black),
                Some(Position::new(0, 0))
            );
        }
    }

    #[test]
    fn midgame_tie_prefers_fewer_captures() {
        // d1 captures two discs southward, a4 captures one eastward; both weigh 5.
        let black = bit(idx(3, 3)) | bit(idx(3, 2));
        let white = bit(idx(1, 3)) | bit(idx(2, 3)) | bit(idx(3, 1));
        let board = Board::from_bitboards(black, white);
        let evaluator = NormalEvaluator::with_seed(0, 1);

        assert_eq!(
            evaluator.next_move(&board, Piece::Black),
            Some(Position::new(3, 0))
        );
    }

    #[test]
    fn tie_break_switches_at_the_endgame_threshold() {
        let few = Candidate {
            mv: Position::new(0, 3),
            score: 5,
            flips: 1,
        };
        let many = Candidate {
            mv: Position::new(3, 0),
            score: 5,
            flips: 3,
        };

        assert!(is_better(&few, &many, false));
        assert!(!is_better(&many, &few, false));
        assert!(is_better(&many, &few, true));
        assert!(!is_better(&few, &many, true));
    }

    #[test]
    fn score_dominates_flip_count() {
        let corner = Candidate {
            mv: Position::new(0, 0),
            score: 100,
            flips: 1,
        };
        let edge = Candidate {
            mv: Position::new(0, 3),
            score: 5,
            flips: 6,
        };
        assert!(is_better(&corner, &edge, true));
        assert!(is_better(&corner, &edge, false));
    }

    #[test]
    fn always_legal_on_random_positions() {
        let evaluator = NormalEvaluator::with_seed(2, 99);
        let mut board = Board::new();
        let mut side = Piece::Black;
        while !board.is_terminal() {
            if let Some(mv) = evaluator.next_move(&board, side) {
                assert!(board.can_place(mv.row, mv.col, side));
                board.place(mv.row, mv.col, side);
            } else {
                assert!(!board.has_any_legal_move(side));
            }
            side = side.opposite();
        }
    }
}
