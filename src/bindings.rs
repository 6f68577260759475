//! Stateless browser entry points. Boards cross the boundary as 64 cells
//! (0 empty, 1 black, 2 white), row-major.

use wasm_bindgen::prelude::*;

use crate::ai::evaluator_for;
use crate::board::Board;
use crate::config::ReversiConfig;
use crate::types::{Difficulty, Piece, Position};

#[wasm_bindgen]
pub fn wasm_ready() -> bool {
    true
}

/// Legal moves for the side to play, as `[{row, col}, ...]`.
#[wasm_bindgen]
pub fn legal_moves(cells: &[u8], black: bool) -> Result<JsValue, JsValue> {
    let board = parse_board(cells)?;
    let moves = board.legal_moves(side(black));
    serde_wasm_bindgen::to_value(&moves).map_err(JsValue::from)
}

/// Move suggested by the evaluator of `tier` (0 easy, 1 normal, 2 hard),
/// or `null` when the side has to pass.
#[wasm_bindgen]
pub fn suggest_move(cells: &[u8], black: bool, tier: u8) -> Result<JsValue, JsValue> {
    let board = parse_board(cells)?;
    let difficulty =
        Difficulty::from_u8(tier).ok_or_else(|| JsValue::from_str("tier must be 0, 1 or 2"))?;
    let evaluator = evaluator_for(difficulty, &ReversiConfig::default());
    let mv: Option<Position> = evaluator.next_move(&board, side(black));
    serde_wasm_bindgen::to_value(&mv).map_err(JsValue::from)
}

fn parse_board(cells: &[u8]) -> Result<Board, JsValue> {
    Board::from_cells(cells).ok_or_else(|| JsValue::from_str("board must be 64 cells of 0, 1 or 2"))
}

fn side(black: bool) -> Piece {
    if black { Piece::Black } else { Piece::White }
}
