use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument, warn};
use web_time::Instant;

use crate::ai::{MoveEvaluator, evaluator_for};
use crate::collab::{Collaborators, SessionId};
use crate::config::ReversiConfig;
use crate::dispatch::{SearchDispatcher, SearchOutcome, ThreadDispatcher};
use crate::error::{SessionError, SessionResult};
use crate::session::{SessionContext, TurnCoordinator};
use crate::types::{Difficulty, GameState, Position};

/// A board location in the host's world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub x: i32,
    pub z: i32,
}

impl Slot {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Walks the diamond rings around the origin: `(1,0)`, `(0,1)`, `(-1,0)`,
/// `(0,-1)`, then `(1,0)`'s ring of size 2 starting at `(2,0)`, and so on.
#[derive(Debug, Clone)]
pub struct SlotSpiral {
    x: i32,
    z: i32,
    size: i32,
}

impl Default for SlotSpiral {
    fn default() -> Self {
        Self { x: 1, z: 0, size: 1 }
    }
}

impl Iterator for SlotSpiral {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let current = Slot::new(self.x, self.z);
        let size = self.size;
        if self.x > 0 && self.z >= 0 {
            self.x -= 1;
            self.z += 1;
        } else if self.x <= 0 && self.z > 0 {
            self.x -= 1;
            self.z -= 1;
        } else if self.x < 0 && self.z <= 0 {
            self.x += 1;
            self.z -= 1;
        } else {
            self.x += 1;
            self.z += 1;
            if self.x == size && self.z == 0 {
                self.size += 1;
                self.x += 1;
            }
        }
        Some(current)
    }
}

/// Owns every live [`TurnCoordinator`] and is the only place they are mutated.
///
/// Computer moves finish on worker threads and queue up in the inbox; call
/// [`SessionRegistry::tick`] regularly to apply them and to finalize sessions
/// whose end-of-game wait has elapsed.
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, TurnCoordinator>,
    next_id: SessionId,
    config: ReversiConfig,
    collaborators: Collaborators,
    dispatcher: Arc<dyn SearchDispatcher>,
    outbox: Sender<SearchOutcome>,
    inbox: Receiver<SearchOutcome>,
    rng: StdRng,
}

impl SessionRegistry {
    pub fn new(config: ReversiConfig, collaborators: Collaborators) -> Self {
        let (outbox, inbox) = mpsc::channel();
        Self {
            sessions: BTreeMap::new(),
            next_id: 1,
            config,
            collaborators,
            dispatcher: Arc::new(ThreadDispatcher),
            outbox,
            inbox,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn SearchDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Fixes the color draw, for tests and replays.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &ReversiConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: SessionId) -> Option<&TurnCoordinator> {
        self.sessions.get(&id)
    }

    /// The live session `participant` plays in or watches.
    pub fn session_of(&self, participant: &str) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| {
                !s.phase().is_terminal()
                    && (s.is_participant(participant) || s.is_spectator(participant))
            })
            .map(TurnCoordinator::id)
    }

    pub fn snapshot_of(&self, participant: &str) -> SessionResult<GameState> {
        let id = self.session_of(participant).ok_or(SessionError::NotFound)?;
        self.sessions
            .get(&id)
            .map(TurnCoordinator::snapshot)
            .ok_or(SessionError::NotFound)
    }

    /// First slot in spiral order not held by a live session.
    pub fn allocate_slot(&self) -> Slot {
        let taken: BTreeSet<Slot> = self
            .sessions
            .values()
            .filter(|s| !s.phase().is_terminal())
            .filter_map(TurnCoordinator::slot)
            .collect();
        SlotSpiral::default()
            .find(|slot| !taken.contains(slot))
            .unwrap_or(Slot::new(0, 0))
    }

    /// Starts a game against the built-in evaluator for `difficulty`.
    pub fn create_single(&mut self, owner: &str, difficulty: Difficulty) -> SessionResult<SessionId> {
        let evaluator: Arc<dyn MoveEvaluator> = Arc::from(evaluator_for(difficulty, &self.config));
        self.create_single_with(owner, evaluator)
    }

    /// Starts a game against any evaluator.
    #[instrument(skip(self, evaluator), fields(difficulty = ?evaluator.difficulty()))]
    pub fn create_single_with(
        &mut self,
        owner: &str,
        evaluator: Arc<dyn MoveEvaluator>,
    ) -> SessionResult<SessionId> {
        self.ensure_free(owner)?;
        let id = self.allocate_id();
        let slot = self.allocate_slot();
        let owner_is_black = self.rng.random_bool(0.5);

        let mut session = TurnCoordinator::new_single(id, owner.to_string(), evaluator, self.context());
        session.prepare(slot, owner_is_black);
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Invites `opponent`; the session waits in `Invitation` until they answer.
    #[instrument(skip(self))]
    pub fn create_versus(&mut self, owner: &str, opponent: &str) -> SessionResult<SessionId> {
        if owner == opponent {
            return Err(SessionError::NotAuthorized);
        }
        self.ensure_free(owner)?;
        self.ensure_free(opponent)?;

        let id = self.allocate_id();
        let session = TurnCoordinator::new_versus(
            id,
            owner.to_string(),
            opponent.to_string(),
            self.context(),
        );
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// The invited opponent accepts their pending invitation.
    pub fn accept(&mut self, actor: &str) -> SessionResult<SessionId> {
        let id = self.invitation_for(actor)?;
        let slot = self.allocate_slot();
        let owner_is_black = self.rng.random_bool(0.5);
        self.session_mut(id)?.accept(actor, slot, owner_is_black)?;
        Ok(id)
    }

    pub fn deny(&mut self, actor: &str) -> SessionResult<()> {
        let id = self.invitation_for(actor)?;
        self.session_mut(id)?.deny(actor)
    }

    pub fn submit_move(&mut self, actor: &str, x: i32, y: i32) -> SessionResult<Vec<Position>> {
        let id = self.participating(actor)?;
        self.session_mut(id)?.submit_move(actor, x, y)
    }

    pub fn cancel(&mut self, actor: &str) -> SessionResult<()> {
        let id = self.participating(actor)?;
        self.session_mut(id)?.cancel(actor)
    }

    pub fn resign(&mut self, actor: &str) -> SessionResult<()> {
        let id = self.participating(actor)?;
        self.session_mut(id)?.resign(actor)
    }

    /// `actor` starts watching the session `participant` plays in.
    pub fn join_spectator(&mut self, actor: &str, participant: &str) -> SessionResult<SessionId> {
        self.ensure_free(actor)?;
        let id = self.participating(participant)?;
        self.session_mut(id)?.join_spectator(actor)?;
        Ok(id)
    }

    pub fn leave_spectator(&mut self, actor: &str) -> SessionResult<()> {
        let id = self
            .sessions
            .values()
            .find(|s| s.is_spectator(actor))
            .map(TurnCoordinator::id)
            .ok_or(SessionError::NotFound)?;
        self.session_mut(id)?.leave_spectator(actor)
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Applies finished searches, finalizes sessions whose end wait is over
    /// and drops finalized sessions.
    pub fn tick_at(&mut self, now: Instant) {
        while let Ok(outcome) = self.inbox.try_recv() {
            match self.sessions.get_mut(&outcome.session) {
                Some(session) => session.apply_search_outcome(outcome),
                None => debug!(session_id = outcome.session, "search result for unknown session"),
            }
        }

        for session in self.sessions.values_mut() {
            if session.finalize_at().is_some_and(|at| at <= now) {
                session.finalize();
            }
        }

        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_finalized());
        let reaped = before - self.sessions.len();
        if reaped > 0 {
            info!(reaped, live = self.sessions.len(), "sessions reaped");
        }
    }

    fn context(&self) -> SessionContext {
        SessionContext {
            config: self.config.clone(),
            collaborators: self.collaborators.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            outbox: self.outbox.clone(),
        }
    }

    fn allocate_id(&mut self) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn ensure_free(&self, participant: &str) -> SessionResult<()> {
        if self.session_of(participant).is_some() {
            warn!(%participant, "already in a live session");
            return Err(SessionError::AlreadyInSession);
        }
        Ok(())
    }

    fn participating(&self, actor: &str) -> SessionResult<SessionId> {
        self.sessions
            .values()
            .find(|s| !s.phase().is_terminal() && s.is_participant(actor))
            .map(TurnCoordinator::id)
            .ok_or(SessionError::NotFound)
    }

    fn invitation_for(&self, actor: &str) -> SessionResult<SessionId> {
        self.sessions
            .values()
            .find(|s| s.is_invited(actor))
            .map(TurnCoordinator::id)
            .ok_or(SessionError::NotFound)
    }

    fn session_mut(&mut self, id: SessionId) -> SessionResult<&mut TurnCoordinator> {
        self.sessions.get_mut(&id).ok_or(SessionError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dispatch::InlineDispatcher;
    use crate::session::Phase;

    fn registry() -> SessionRegistry {
        let mut config = ReversiConfig::default();
        config.min_thinking_millis = 0;
        SessionRegistry::new(config, Collaborators::noop())
            .with_dispatcher(Arc::new(InlineDispatcher))
            .with_seed(42)
    }

    #[test]
    fn spiral_walks_diamond_rings() {
        let first: Vec<Slot> = SlotSpiral::default().take(12).collect();
        let expected = [
            (1, 0),
            (0, 1),
            (-1, 0),
            (0, -1),
            (2, 0),
            (1, 1),
            (0, 2),
            (-1, 1),
            (-2, 0),
            (-1, -1),
            (0, -2),
            (1, -1),
        ];
        assert_eq!(
            first,
            expected.map(|(x, z)| Slot::new(x, z)).to_vec()
        );
        assert_eq!(SlotSpiral::default().nth(12), Some(Slot::new(3, 0)));
    }

    #[test]
    fn spiral_never_repeats() {
        let slots: Vec<Slot> = SlotSpiral::default().take(500).collect();
        let unique: BTreeSet<Slot> = slots.iter().copied().collect();
        assert_eq!(unique.len(), slots.len());
        assert!(!unique.contains(&Slot::new(0, 0)));
    }

    #[test]
    fn live_sessions_get_distinct_slots() {
        let mut reg = registry();
        let mut slots = BTreeSet::new();
        for i in 0..6 {
            let id = reg.create_single(&format!("p{i}"), Difficulty::Easy).unwrap();
            reg.tick();
            slots.insert(reg.get(id).and_then(TurnCoordinator::slot).unwrap());
        }
        assert_eq!(slots.len(), 6);
        assert!(slots.contains(&Slot::new(1, 0)));
    }

    #[test]
    fn released_slot_is_reused() {
        let mut reg = registry();
        let first = reg.create_single("a", Difficulty::Easy).unwrap();
        reg.create_single("b", Difficulty::Easy).unwrap();
        reg.tick();
        assert_eq!(reg.get(first).and_then(TurnCoordinator::slot), Some(Slot::new(1, 0)));

        // Single-player owners may walk away from a computer game.
        reg.cancel("a").unwrap();
        reg.tick();
        assert!(reg.get(first).is_none());
        assert_eq!(reg.allocate_slot(), Slot::new(1, 0));
    }

    #[test]
    fn participants_are_exclusive() {
        let mut reg = registry();
        reg.create_versus("alice", "bob").unwrap();

        assert_eq!(reg.create_versus("bob", "carol"), Err(SessionError::AlreadyInSession));
        assert_eq!(reg.create_single("alice", Difficulty::Hard), Err(SessionError::AlreadyInSession));
        assert_eq!(reg.create_versus("dave", "dave"), Err(SessionError::NotAuthorized));
    }

    #[test]
    fn unknown_actor_gets_not_found() {
        let mut reg = registry();
        assert_eq!(reg.submit_move("nobody", 2, 3), Err(SessionError::NotFound));
        assert_eq!(reg.accept("nobody"), Err(SessionError::NotFound));
        assert_eq!(reg.resign("nobody"), Err(SessionError::NotFound));
        assert_eq!(reg.snapshot_of("nobody"), Err(SessionError::NotFound));
    }

    #[test]
    fn ended_session_is_reaped_after_end_wait() {
        let mut reg = registry();
        let id = reg.create_versus("alice", "bob").unwrap();
        reg.accept("bob").unwrap();
        reg.resign("alice").unwrap();
        assert_eq!(reg.get(id).map(TurnCoordinator::phase), Some(Phase::End));

        reg.tick_at(Instant::now());
        assert!(reg.get(id).is_some(), "still inside the end wait");
        assert_eq!(reg.session_of("alice"), None);

        reg.tick_at(Instant::now() + Duration::from_secs(16));
        assert!(reg.get(id).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn spectator_joins_through_a_participant() {
        let mut reg = registry();
        let id = reg.create_versus("alice", "bob").unwrap();
        reg.accept("bob").unwrap();

        assert_eq!(reg.join_spectator("carol", "bob"), Ok(id));
        assert_eq!(reg.session_of("carol"), Some(id));
        assert_eq!(reg.submit_move("carol", 2, 3), Err(SessionError::NotFound));
        reg.leave_spectator("carol").unwrap();
        assert_eq!(reg.session_of("carol"), None);
    }
}
