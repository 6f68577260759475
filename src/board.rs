use once_cell::sync::Lazy;

use crate::types::{Piece, Position};

pub const BOARD_SIZE: usize = 8;
pub const NUM_SQUARES: usize = BOARD_SIZE * BOARD_SIZE;
const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// For every square and direction, the squares walked outward until the edge.
static RAYS: Lazy<Vec<[Vec<u8>; 8]>> = Lazy::new(|| {
    (0..NUM_SQUARES)
        .map(|pos| {
            let (row, col) = pos_to_row_col(pos);
            std::array::from_fn(|dir| {
                let (dr, dc) = DIRECTIONS[dir];
                let mut ray = Vec::new();
                let mut r = row + dr;
                let mut c = col + dc;
                while in_bounds(r, c) {
                    ray.push((r as usize * BOARD_SIZE + c as usize) as u8);
                    r += dr;
                    c += dc;
                }
                ray
            })
        })
        .collect()
});

/// Reversi board state represented by two bitboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    black: u64,
    white: u64,
}

impl Board {
    /// Creates the initial board:
    /// d4=white, e4=black, d5=black, e5=white.
    pub fn new() -> Self {
        Self {
            black: bit(28) | bit(35),
            white: bit(27) | bit(36),
        }
    }

    /// Builds a board from raw masks. Overlapping bits are treated as black.
    pub fn from_bitboards(black: u64, white: u64) -> Self {
        Self {
            black,
            white: white & !black,
        }
    }

    /// Builds a board from 64 cells where 0=empty, 1=black, 2=white.
    pub fn from_cells(cells: &[u8]) -> Option<Self> {
        if cells.len() != NUM_SQUARES {
            return None;
        }
        let mut board = Self::from_bitboards(0, 0);
        for (pos, &cell) in cells.iter().enumerate() {
            match Piece::from_u8(cell)? {
                Piece::Black => board.black |= bit(pos),
                Piece::White => board.white |= bit(pos),
                Piece::Empty => {}
            }
        }
        Some(board)
    }

    pub fn piece_at(&self, row: u8, col: u8) -> Piece {
        let Some(pos) = Position::checked(row as i32, col as i32) else {
            return Piece::Empty;
        };
        let square = bit(pos.index());
        if self.black & square != 0 {
            Piece::Black
        } else if self.white & square != 0 {
            Piece::White
        } else {
            Piece::Empty
        }
    }

    /// True when `piece` may be put at `(row, col)`: the cell is empty and at
    /// least one direction captures.
    pub fn can_place(&self, row: u8, col: u8, piece: Piece) -> bool {
        let Some(pos) = Position::checked(row as i32, col as i32) else {
            return false;
        };
        self.flip_mask(pos.index(), piece) != 0
    }

    /// Returns every legal cell for `piece` in row-major order.
    pub fn legal_moves(&self, piece: Piece) -> Vec<Position> {
        mask_to_positions(self.legal_mask(piece))
    }

    pub fn has_any_legal_move(&self, piece: Piece) -> bool {
        self.legal_mask(piece) != 0
    }

    /// Neither color can move.
    pub fn is_terminal(&self) -> bool {
        !self.has_any_legal_move(Piece::Black) && !self.has_any_legal_move(Piece::White)
    }

    /// Places one stone and flips captured stones.
    /// Returns the flipped cells in capture order, one run per direction.
    /// Returns an empty list and leaves the board untouched when the move is illegal.
    pub fn place(&mut self, row: u8, col: u8, piece: Piece) -> Vec<Position> {
        let Some(pos) = Position::checked(row as i32, col as i32) else {
            return Vec::new();
        };
        let Some((me, opp)) = self.sides(piece) else {
            return Vec::new();
        };

        let flips = Self::collect_flips(pos.index(), me, opp);
        if flips.is_empty() {
            return Vec::new();
        }

        let mask = flips.iter().fold(0u64, |acc, &sq| acc | bit(sq as usize));
        self.apply(pos.index(), mask, piece);

        flips.into_iter().map(|sq| Position::from_index(sq as usize)).collect()
    }

    pub fn count_of(&self, piece: Piece) -> u8 {
        match piece {
            Piece::Black => self.black.count_ones() as u8,
            Piece::White => self.white.count_ones() as u8,
            Piece::Empty => self.empty_count(),
        }
    }

    /// Returns `(black_count, white_count)`.
    pub fn count(&self) -> (u8, u8) {
        (self.black.count_ones() as u8, self.white.count_ones() as u8)
    }

    /// Returns the number of empty squares.
    pub fn empty_count(&self) -> u8 {
        let (black_count, white_count) = self.count();
        NUM_SQUARES as u8 - black_count - white_count
    }

    /// Converts board to `[u8; 64]` where 0=empty, 1=black, 2=white.
    pub fn to_array(&self) -> [u8; NUM_SQUARES] {
        let mut board = [0u8; NUM_SQUARES];
        for (pos, cell) in board.iter_mut().enumerate() {
            let square = bit(pos);
            *cell = if (self.black & square) != 0 {
                1
            } else if (self.white & square) != 0 {
                2
            } else {
                0
            };
        }
        board
    }

    /// Framed text rendering, one line per row, for game logs.
    pub fn render(&self) -> Vec<String> {
        let border = format!("+{}+", "-".repeat(BOARD_SIZE * 2));
        let mut lines = Vec::with_capacity(BOARD_SIZE + 2);
        lines.push(border.clone());
        for row in 0..BOARD_SIZE as u8 {
            let cells: String = (0..BOARD_SIZE as u8)
                .map(|col| self.piece_at(row, col).glyph())
                .collect();
            lines.push(format!("|{cells}|"));
        }
        lines.push(border);
        lines
    }

    /// Legal move mask for `piece`. Zero for `Piece::Empty`.
    pub(crate) fn legal_mask(&self, piece: Piece) -> u64 {
        let Some((me, opp)) = self.sides(piece) else {
            return 0;
        };

        let occupied = me | opp;
        let mut legal = 0u64;

        for pos in 0..NUM_SQUARES {
            let move_bit = bit(pos);
            if (occupied & move_bit) != 0 {
                continue;
            }
            if Self::has_capture(pos, me, opp) {
                legal |= move_bit;
            }
        }

        legal
    }

    /// Flip mask for putting `piece` at square index `pos`. Zero when illegal.
    pub(crate) fn flip_mask(&self, pos: usize, piece: Piece) -> u64 {
        let Some((me, opp)) = self.sides(piece) else {
            return 0;
        };
        if pos >= NUM_SQUARES || ((me | opp) & bit(pos)) != 0 {
            return 0;
        }
        RAYS[pos].iter().fold(0u64, |acc, ray| {
            let len = run_length(ray, me, opp);
            ray[..len].iter().fold(acc, |acc, &sq| acc | bit(sq as usize))
        })
    }

    /// Mask-based placement used by search. Caller guarantees legality.
    pub(crate) fn play(&mut self, pos: usize, piece: Piece) -> u64 {
        let flips = self.flip_mask(pos, piece);
        if flips != 0 {
            self.apply(pos, flips, piece);
        }
        flips
    }

    fn apply(&mut self, pos: usize, flips: u64, piece: Piece) {
        let placed = bit(pos) | flips;
        match piece {
            Piece::Black => {
                self.black |= placed;
                self.white &= !flips;
            }
            Piece::White => {
                self.white |= placed;
                self.black &= !flips;
            }
            Piece::Empty => {}
        }
    }

    fn sides(&self, piece: Piece) -> Option<(u64, u64)> {
        match piece {
            Piece::Black => Some((self.black, self.white)),
            Piece::White => Some((self.white, self.black)),
            Piece::Empty => None,
        }
    }

    fn has_capture(pos: usize, me: u64, opp: u64) -> bool {
        RAYS[pos].iter().any(|ray| run_length(ray, me, opp) > 0)
    }

    fn collect_flips(pos: usize, me: u64, opp: u64) -> Vec<u8> {
        if pos >= NUM_SQUARES {
            return Vec::new();
        }

        let move_bit = bit(pos);
        if ((me | opp) & move_bit) != 0 {
            return Vec::new();
        }

        let mut flips = Vec::new();
        for ray in &RAYS[pos] {
            let len = run_length(ray, me, opp);
            flips.extend_from_slice(&ray[..len]);
        }
        flips
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the capturable opponent run at the start of `ray`; zero when the
/// run is empty or not closed by an own stone.
fn run_length(ray: &[u8], me: u64, opp: u64) -> usize {
    let mut len = 0;
    for &sq in ray {
        let square = bit(sq as usize);
        if (opp & square) != 0 {
            len += 1;
        } else if (me & square) != 0 {
            return len;
        } else {
            return 0;
        }
    }
    0
}

pub(crate) fn bit(pos: usize) -> u64 {
    if pos < NUM_SQUARES { 1u64 << pos } else { 0 }
}

pub(crate) fn mask_to_positions(mut mask: u64) -> Vec<Position> {
    let mut out = Vec::with_capacity(mask.count_ones() as usize);
    while mask != 0 {
        out.push(Position::from_index(mask.trailing_zeros() as usize));
        mask &= mask - 1;
    }
    out
}

fn pos_to_row_col(pos: usize) -> (i32, i32) {
    ((pos / BOARD_SIZE) as i32, (pos % BOARD_SIZE) as i32)
}

fn in_bounds(row: i32, col: i32) -> bool {
    (0..BOARD_SIZE as i32).contains(&row) && (0..BOARD_SIZE as i32).contains(&col)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    const FULL_BOARD: u64 = u64::MAX;

    fn idx(row: usize, col: usize) -> usize {
        row * BOARD_SIZE + col
    }

    fn p(row: u8, col: u8) -> Position {
        Position::new(row, col)
    }

    fn random_playout_boards(seed: u64) -> Vec<(Board, Piece)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut board = Board::new();
        let mut side = Piece::Black;
        let mut seen = Vec::new();
        while !board.is_terminal() {
            seen.push((board, side));
            let moves = board.legal_moves(side);
            if moves.is_empty() {
                side = side.opposite();
                continue;
            }
            let mv = moves[rng.random_range(0..moves.len())];
            board.place(mv.row, mv.col, side);
            side = side.opposite();
        }
        seen.push((board, side));
        seen
    }

    #[test]
    fn t01_initial_black_legal_moves_are_four_expected_squares() {
        let board = Board::new();

        let expected = vec![p(2, 3), p(3, 2), p(4, 5), p(5, 4)]; // d3,c4,f5,e6

        assert_eq!(board.legal_moves(Piece::Black), expected);
        assert_eq!(
            board.legal_mask(Piece::Black),
            bit(idx(2, 3)) | bit(idx(3, 2)) | bit(idx(4, 5)) | bit(idx(5, 4))
        );
    }

    #[test]
    fn place_flips_opponent_stones_and_updates_counts() {
        let mut board = Board::new();

        let flips = board.place(2, 3, Piece::Black); // d3

        assert_eq!(flips, vec![p(3, 3)]); // d4
        assert_eq!(board.count(), (4, 1));
        assert_eq!(board.empty_count(), 59);

        let cells = board.to_array();
        assert_eq!(cells[idx(2, 3)], 1);
        assert_eq!(cells[idx(3, 3)], 1);
        assert_eq!(cells[idx(3, 4)], 1);
        assert_eq!(cells[idx(4, 3)], 1);
        assert_eq!(cells[idx(4, 4)], 2);
    }

    #[test]
    fn illegal_place_returns_empty_and_keeps_board_unchanged() {
        let mut board = Board::new();
        let before = board;

        assert!(board.place(0, 0, Piece::Black).is_empty());
        assert!(board.place(3, 3, Piece::Black).is_empty()); // occupied
        assert!(board.place(9, 0, Piece::Black).is_empty());
        assert!(board.place(2, 3, Piece::Empty).is_empty());

        assert_eq!(board, before);
    }

    #[test]
    fn flips_are_ordered_runs_outward_from_the_placed_cell() {
        // Black a1 closes an east run at g1 and a south run at a4.
        let black = bit(idx(0, 6)) | bit(idx(3, 0));
        let white = bit(idx(0, 1))
            | bit(idx(0, 2))
            | bit(idx(0, 3))
            | bit(idx(0, 4))
            | bit(idx(0, 5))
            | bit(idx(1, 0))
            | bit(idx(2, 0));
        let mut board = Board::from_bitboards(black, white);

        let flips = board.place(0, 0, Piece::Black);

        // East run first (direction order), then south run.
        assert_eq!(
            flips,
            vec![p(0, 1), p(0, 2), p(0, 3), p(0, 4), p(0, 5), p(1, 0), p(2, 0)]
        );
        assert_eq!(board.count(), (10, 0));
    }

    #[test]
    fn run_must_be_closed_by_own_stone_on_board() {
        // White run to the edge with no closing black stone.
        let white = bit(idx(0, 1)) | bit(idx(0, 2));
        let board = Board::from_bitboards(0, white);
        assert!(!board.can_place(0, 0, Piece::Black));

        // Immediate own-color neighbour captures nothing.
        let board = Board::from_bitboards(bit(idx(0, 1)), 0);
        assert!(!board.can_place(0, 0, Piece::Black));
    }

    #[test]
    fn terminal_when_neither_side_can_move() {
        let board = Board::from_bitboards(FULL_BOARD ^ bit(0), 0);
        assert!(!board.has_any_legal_move(Piece::Black));
        assert!(!board.has_any_legal_move(Piece::White));
        assert!(board.is_terminal());

        assert!(!Board::new().is_terminal());
    }

    #[test]
    fn one_side_blocked_is_not_terminal() {
        let black = bit(idx(0, 1));
        let white = FULL_BOARD ^ bit(0) ^ black;
        let board = Board::from_bitboards(black, white);

        assert!(!board.has_any_legal_move(Piece::Black));
        assert!(board.has_any_legal_move(Piece::White));
        assert!(!board.is_terminal());
    }

    #[test]
    fn replaying_flip_list_reproduces_post_move_board() {
        for seed in [1u64, 7, 42, 1234, 98765] {
            for (board, side) in random_playout_boards(seed) {
                for mv in board.legal_moves(side) {
                    let mut after = board;
                    let flips = after.place(mv.row, mv.col, side);
                    assert!(!flips.is_empty());

                    let mut cells = board.to_array();
                    cells[mv.index()] = side.to_u8();
                    for f in &flips {
                        assert_eq!(cells[f.index()], side.opposite().to_u8());
                        cells[f.index()] = side.to_u8();
                    }
                    assert_eq!(Board::from_cells(&cells), Some(after));
                    let total = after.count_of(Piece::Empty) as usize
                        + after.count_of(Piece::Black) as usize
                        + after.count_of(Piece::White) as usize;
                    assert_eq!(total, NUM_SQUARES);
                }
            }
        }
    }

    #[test]
    fn legal_move_queries_agree_on_reachable_boards() {
        for seed in [3u64, 11, 2024] {
            for (board, _) in random_playout_boards(seed) {
                for piece in [Piece::Black, Piece::White] {
                    let moves = board.legal_moves(piece);
                    assert_eq!(board.has_any_legal_move(piece), !moves.is_empty());
                    for mv in &moves {
                        assert!(board.can_place(mv.row, mv.col, piece));
                    }
                }
                assert_eq!(
                    board.is_terminal(),
                    !board.has_any_legal_move(Piece::Black)
                        && !board.has_any_legal_move(Piece::White)
                );
            }
        }
    }

    #[test]
    fn from_cells_rejects_bad_input() {
        assert_eq!(Board::from_cells(&[0; 10]), None);
        let mut cells = [0u8; NUM_SQUARES];
        cells[5] = 3;
        assert_eq!(Board::from_cells(&cells), None);
        assert_eq!(Board::from_cells(&Board::new().to_array()), Some(Board::new()));
    }

    #[test]
    fn render_frames_every_row() {
        let lines = Board::new().render();
        assert_eq!(lines.len(), BOARD_SIZE + 2);
        assert!(lines[0].starts_with('+'));
        assert!(lines[4].contains('○'));
        assert!(lines[4].contains('●'));
    }
}
