use derive_more::{Display, Error};

/// Rejection reasons for session commands. Returned synchronously, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum SessionError {
    /// Coordinate outside 0..8 or the cell is already occupied.
    #[display("coordinate is outside the board or already occupied")]
    InvalidCoordinate,
    /// The placement captures nothing.
    #[display("illegal move")]
    IllegalMove,
    /// Not this actor's color, or the session is not waiting for a move.
    #[display("it is not your turn")]
    WrongTurn,
    /// No live session for the actor.
    #[display("no session found")]
    NotFound,
    /// Actor is not a participant or the operation's precondition is unmet.
    #[display("not authorized")]
    NotAuthorized,
    /// The session has already finished.
    #[display("session has already ended")]
    AlreadyTerminal,
    /// The actor is already taking part in another live session.
    #[display("already in a session")]
    AlreadyInSession,
}

pub type SessionResult<T> = Result<T, SessionError>;
