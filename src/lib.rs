pub mod ai;
pub mod bindings;
pub mod board;
pub mod collab;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod session;
pub mod types;

pub use ai::{GreedyEvaluator, MoveEvaluator, NormalEvaluator, Searcher, evaluator_for};
pub use board::Board;
pub use collab::{Collaborators, ParticipantId, SessionId};
pub use config::{ConfigError, ReversiConfig};
pub use dispatch::{InlineDispatcher, SearchDispatcher, ThreadDispatcher};
pub use error::{SessionError, SessionResult};
pub use registry::{SessionRegistry, Slot};
pub use session::{Phase, TurnCoordinator, TurnState};
pub use types::{Difficulty, GameKind, GameResult, GameState, Outcome, Piece, Position};
