use tracing::debug;

use crate::ai::{MoveEvaluator, POSITION_WEIGHTS};
use crate::board::{BOARD_SIZE, Board};
use crate::config::SearchConfig;
use crate::types::{Difficulty, Piece, Position};

const MIN_SCORE: i32 = -i32::MAX;
const MAX_SCORE: i32 = i32::MAX;
/// Per-disc multiplier for finished games. Larger than the biggest possible
/// positional sum, so any won final position beats any heuristic score.
pub const END_WEIGHT: i32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchResult {
    mv: Option<usize>,
    score: i32,
}

impl SearchResult {
    fn leaf(score: i32) -> Self {
        Self { mv: None, score }
    }

    fn negate(self) -> Self {
        Self {
            mv: None,
            score: -self.score,
        }
    }
}

/// Summary of one root search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchReport {
    pub best_move: Position,
    /// Score of `best_move` from the mover's perspective.
    pub score: i32,
    pub depth: u8,
    /// Search ran to the end of the game.
    pub exact: bool,
    pub nodes: u64,
}

/// Hard tier: negamax with alpha-beta pruning and exact endgame solving.
#[derive(Debug, Clone, Copy)]
pub struct Searcher {
    config: SearchConfig,
}

struct SearchRun {
    nodes: u64,
}

impl Searcher {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Depth used for `board`, and whether that depth reaches the end of the game.
    pub fn depth_for(&self, board: &Board) -> (u8, bool) {
        let empty = board.empty_count();
        if empty <= self.config.endgame_threshold {
            (empty, true)
        } else {
            (self.config.depth, false)
        }
    }

    /// Searches the best move.
    /// Returns `None` when `side` has no legal move.
    pub fn search(&self, board: &Board, side: Piece) -> Option<SearchReport> {
        let legal = board.legal_mask(side);
        if legal == 0 {
            return None;
        }

        let (depth, exact) = self.depth_for(board);
        let mut run = SearchRun { nodes: 0 };
        let result = run.negaalpha(board, side, depth.max(1), MIN_SCORE, MAX_SCORE);
        let best = result.mv.unwrap_or_else(|| legal.trailing_zeros() as usize);

        Some(SearchReport {
            best_move: Position::from_index(best),
            score: result.score,
            depth,
            exact,
            nodes: run.nodes,
        })
    }
}

impl MoveEvaluator for Searcher {
    fn difficulty(&self) -> Difficulty {
        Difficulty::Hard
    }

    fn next_move(&self, board: &Board, side: Piece) -> Option<Position> {
        let report = self.search(board, side)?;
        debug!(
            side = ?side,
            best = ?report.best_move,
            score = report.score,
            depth = report.depth,
            exact = report.exact,
            nodes = report.nodes,
            "hard search finished"
        );
        Some(report.best_move)
    }
}

impl SearchRun {
    fn negaalpha(
        &mut self,
        board: &Board,
        side: Piece,
        depth: u8,
        alpha: i32,
        beta: i32,
    ) -> SearchResult {
        self.nodes += 1;

        let legal = board.legal_mask(side);
        if legal == 0 {
            if board.legal_mask(side.opposite()) == 0 {
                return SearchResult::leaf(final_score(board, side));
            }
            // Pass: the opponent moves at the same depth.
            return self
                .negaalpha(board, side.opposite(), depth, -beta, -alpha)
                .negate();
        }

        if depth == 0 {
            return SearchResult::leaf(positional_score(board, side));
        }

        let moves = ordered_moves(legal);
        let mut best_move = moves[0];
        let mut best_score = MIN_SCORE;
        let mut alpha = alpha;

        for mv in moves {
            let mut next = *board;
            next.play(mv, side);
            let score = -self
                .negaalpha(&next, side.opposite(), depth - 1, -beta, -alpha)
                .score;

            // Strictly greater: a pruned sibling's bound never displaces an exact score.
            if score > best_score {
                best_score = score;
                best_move = mv;
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                break;
            }
        }

        SearchResult {
            mv: Some(best_move),
            score: best_score,
        }
    }
}

/// Disc difference times [`END_WEIGHT`], from `side`'s perspective.
fn final_score(board: &Board, side: Piece) -> i32 {
    let own = board.count_of(side) as i32;
    let opp = board.count_of(side.opposite()) as i32;
    (own - opp) * END_WEIGHT
}

/// Sum of square weights, own discs minus opponent discs.
fn positional_score(board: &Board, side: Piece) -> i32 {
    let cells = board.to_array();
    let own = side.to_u8();
    let opp = side.opposite().to_u8();
    cells
        .iter()
        .enumerate()
        .map(|(pos, &cell)| {
            let weight = POSITION_WEIGHTS[pos / BOARD_SIZE][pos % BOARD_SIZE];
            if cell == own {
                weight
            } else if cell == opp {
                -weight
            } else {
                0
            }
        })
        .sum()
}

/// Static weight descending, then square index.
fn ordered_moves(mut legal: u64) -> Vec<usize> {
    let mut moves = Vec::with_capacity(legal.count_ones() as usize);
    while legal != 0 {
        moves.push(legal.trailing_zeros() as usize);
        legal &= legal - 1;
    }
    moves.sort_by(|&a, &b| {
        let wa = POSITION_WEIGHTS[a / BOARD_SIZE][a % BOARD_SIZE];
        let wb = POSITION_WEIGHTS[b / BOARD_SIZE][b % BOARD_SIZE];
        wb.cmp(&wa).then_with(|| a.cmp(&b))
    });
    moves
}
