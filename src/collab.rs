//! Hooks into the host application. The engine only calls these; rendering,
//! inventory, economy and score storage live on the other side.

use std::fmt;
use std::sync::Arc;

use crate::types::{GameKind, GameState, Outcome, Piece, Position};

pub type ParticipantId = String;
pub type SessionId = u64;

/// Draws the board and restores players once a session is over.
pub trait Presentation: Send + Sync {
    /// A disc was put at `at`; `flips` is in capture order for animation.
    fn on_placed(&self, _session: SessionId, _at: Position, _piece: Piece, _flips: &[Position]) {}

    fn on_pass(&self, _session: SessionId, _piece: Piece) {}

    fn on_state(&self, _session: SessionId, _state: &GameState) {}

    /// Puts a participant or spectator back where they were before the session.
    fn restore(&self, _participant: &str) {}
}

/// Answers whether a participant is currently online.
pub trait Reachability: Send + Sync {
    fn is_reachable(&self, participant: &str) -> bool;
}

/// Wager custody.
pub trait Economy: Send + Sync {
    fn withdraw_wager(&self, _participant: &str) {}

    /// The session never produced a result; hand the wager back.
    fn refund_wager(&self, _participant: &str) {}

    fn notify_outcome(&self, _participant: &str, _outcome: Outcome) {}

    /// Hands back the items a participant put into custody for the session.
    fn restore_inventory(&self, _participant: &str) {}
}

pub trait Ranking: Send + Sync {
    fn record_result(&self, participant: &str, kind: GameKind, outcome: Outcome);
}

/// Treats everyone as reachable and drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

impl Presentation for Noop {}

impl Reachability for Noop {
    fn is_reachable(&self, _participant: &str) -> bool {
        true
    }
}

impl Economy for Noop {}

impl Ranking for Noop {
    fn record_result(&self, _participant: &str, _kind: GameKind, _outcome: Outcome) {}
}

/// The set of collaborators a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub presentation: Arc<dyn Presentation>,
    pub reachability: Arc<dyn Reachability>,
    pub economy: Arc<dyn Economy>,
    pub ranking: Arc<dyn Ranking>,
}

impl Collaborators {
    pub fn noop() -> Self {
        Self {
            presentation: Arc::new(Noop),
            reachability: Arc::new(Noop),
            economy: Arc::new(Noop),
            ranking: Arc::new(Noop),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
