use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use derive_more::Display;
use tracing::{debug, error, info, instrument, warn};
use web_time::Instant;

use crate::ai::MoveEvaluator;
use crate::board::Board;
use crate::collab::{Collaborators, ParticipantId, SessionId};
use crate::config::ReversiConfig;
use crate::dispatch::{SearchDispatcher, SearchOutcome, SearchRequest};
use crate::error::{SessionError, SessionResult};
use crate::registry::Slot;
use crate::types::{GameKind, GameResult, GameState, Outcome, Piece, Position};

/// Session lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Phase {
    Invitation,
    Prepare,
    InGame,
    End,
    Cancel,
    InvitationDenied,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::End | Self::Cancel | Self::InvitationDenied)
    }
}

/// Turn sub-state while `InGame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TurnState {
    #[display("PreTurn({_0:?})")]
    PreTurn(Piece),
    #[display("ActiveTurn({_0:?})")]
    ActiveTurn(Piece),
    #[display("PostTurn({_0:?})")]
    PostTurn(Piece),
}

/// Who supplies the moves for one side.
#[derive(Clone)]
pub enum Mover {
    /// Moves arrive through [`TurnCoordinator::submit_move`].
    Human(ParticipantId),
    /// Moves are computed off-thread and delivered as [`SearchOutcome`]s.
    Computer(Arc<dyn MoveEvaluator>),
}

impl Mover {
    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human(_))
    }

    pub fn participant(&self) -> Option<&str> {
        match self {
            Self::Human(id) => Some(id),
            Self::Computer(_) => None,
        }
    }
}

impl fmt::Debug for Mover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human(id) => f.debug_tuple("Human").field(id).finish(),
            Self::Computer(evaluator) => f
                .debug_tuple("Computer")
                .field(&evaluator.difficulty())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Place { at: Position, flips: u8 },
    Pass,
}

/// One entry of the game log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRecord {
    pub ply: u16,
    pub piece: Piece,
    pub kind: MoveKind,
}

/// What every session shares with the registry that created it.
#[derive(Clone)]
pub struct SessionContext {
    pub config: ReversiConfig,
    pub collaborators: Collaborators,
    pub dispatcher: Arc<dyn SearchDispatcher>,
    pub outbox: Sender<SearchOutcome>,
}

/// State machine for one game: `Invitation → Prepare → InGame → {End, Cancel, InvitationDenied}`.
///
/// All mutation goes through `&mut self`, so whoever owns the coordinator is
/// the single writer. Computer moves come back through
/// [`TurnCoordinator::apply_search_outcome`] and are re-validated first.
pub struct TurnCoordinator {
    id: SessionId,
    owner: ParticipantId,
    opponent: Mover,
    phase: Phase,
    turn: Option<TurnState>,
    board: Board,
    owner_color: Option<Piece>,
    slot: Option<Slot>,
    spectators: BTreeSet<ParticipantId>,
    log: Vec<MoveRecord>,
    last_flips: Vec<Position>,
    last_was_pass: bool,
    result: Option<GameResult>,
    finalize_at: Option<Instant>,
    finalized: bool,
    pending_search: Option<u64>,
    next_ticket: u64,
    ctx: SessionContext,
}

impl TurnCoordinator {
    /// Two-human game, waiting for the opponent to accept.
    #[instrument(skip(ctx))]
    pub fn new_versus(
        id: SessionId,
        owner: ParticipantId,
        opponent: ParticipantId,
        ctx: SessionContext,
    ) -> Self {
        info!(session_id = id, %owner, %opponent, "invitation sent");
        let session = Self::with_phase(id, owner, Mover::Human(opponent), Phase::Invitation, ctx);
        session.ctx.collaborators.economy.withdraw_wager(&session.owner);
        session
    }

    /// Game against a computer opponent; skips the invitation.
    #[instrument(skip(evaluator, ctx), fields(difficulty = ?evaluator.difficulty()))]
    pub fn new_single(
        id: SessionId,
        owner: ParticipantId,
        evaluator: Arc<dyn MoveEvaluator>,
        ctx: SessionContext,
    ) -> Self {
        info!(session_id = id, %owner, "single game requested");
        let session = Self::with_phase(id, owner, Mover::Computer(evaluator), Phase::Prepare, ctx);
        session.ctx.collaborators.economy.withdraw_wager(&session.owner);
        session
    }

    fn with_phase(
        id: SessionId,
        owner: ParticipantId,
        opponent: Mover,
        phase: Phase,
        ctx: SessionContext,
    ) -> Self {
        Self {
            id,
            owner,
            opponent,
            phase,
            turn: None,
            board: Board::new(),
            owner_color: None,
            slot: None,
            spectators: BTreeSet::new(),
            log: Vec::new(),
            last_flips: Vec::new(),
            last_was_pass: false,
            result: None,
            finalize_at: None,
            finalized: false,
            pending_search: None,
            next_ticket: 0,
            ctx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn opponent(&self) -> &Mover {
        &self.opponent
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn(&self) -> Option<TurnState> {
        self.turn
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub fn log(&self) -> &[MoveRecord] {
        &self.log
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn spectators(&self) -> impl Iterator<Item = &str> {
        self.spectators.iter().map(String::as_str)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_search_pending(&self) -> bool {
        self.pending_search.is_some()
    }

    pub(crate) fn finalize_at(&self) -> Option<Instant> {
        self.finalize_at
    }

    pub fn kind(&self) -> GameKind {
        match &self.opponent {
            Mover::Human(_) => GameKind::Versus,
            Mover::Computer(evaluator) => GameKind::Single(evaluator.difficulty()),
        }
    }

    /// Owner or human opponent.
    pub fn is_participant(&self, actor: &str) -> bool {
        self.owner == actor || self.opponent.participant() == Some(actor)
    }

    pub fn is_spectator(&self, actor: &str) -> bool {
        self.spectators.contains(actor)
    }

    /// The invited human opponent, while the invitation is open.
    pub fn is_invited(&self, actor: &str) -> bool {
        self.phase == Phase::Invitation && self.opponent.participant() == Some(actor)
    }

    pub fn color_of(&self, actor: &str) -> Option<Piece> {
        let owner_color = self.owner_color?;
        if self.owner == actor {
            Some(owner_color)
        } else if self.opponent.participant() == Some(actor) {
            Some(owner_color.opposite())
        } else {
            None
        }
    }

    pub fn mover_for(&self, color: Piece) -> Option<Mover> {
        let owner_color = self.owner_color?;
        if color == owner_color {
            Some(Mover::Human(self.owner.clone()))
        } else if color == owner_color.opposite() {
            Some(self.opponent.clone())
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> GameState {
        let (black_count, white_count) = self.board.count();
        GameState {
            board: self.board.to_array().to_vec(),
            phase: self.phase.to_string(),
            turn: self.turn.map(|t| t.to_string()),
            black_count,
            white_count,
            is_game_over: self.phase.is_terminal(),
            is_pass: self.last_was_pass,
            flipped: self.last_flips.iter().map(|p| p.index() as u8).collect(),
        }
    }

    /// Opponent accepts the invitation; the session moves on to `Prepare`.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn accept(&mut self, actor: &str, slot: Slot, owner_is_black: bool) -> SessionResult<()> {
        self.require_invited(actor)?;
        info!(%actor, "invitation accepted");
        self.phase = Phase::Prepare;
        self.prepare(slot, owner_is_black);
        Ok(())
    }

    /// Opponent turns the invitation down.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn deny(&mut self, actor: &str) -> SessionResult<()> {
        self.require_invited(actor)?;
        info!(%actor, "invitation denied");
        self.phase = Phase::InvitationDenied;
        self.ctx.collaborators.economy.refund_wager(&self.owner);
        self.finalize();
        Ok(())
    }

    fn require_invited(&self, actor: &str) -> SessionResult<()> {
        if self.phase.is_terminal() {
            return Err(SessionError::AlreadyTerminal);
        }
        if self.opponent.participant() != Some(actor) {
            return Err(SessionError::NotAuthorized);
        }
        if self.phase != Phase::Invitation {
            return Err(SessionError::WrongTurn);
        }
        Ok(())
    }

    /// Checks participants, takes the slot, assigns colors and starts the game.
    /// An unreachable participant cancels the session instead. Does nothing
    /// outside `Prepare`.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub(crate) fn prepare(&mut self, slot: Slot, owner_is_black: bool) {
        if self.phase != Phase::Prepare {
            warn!(phase = %self.phase, "prepare outside the prepare phase ignored");
            return;
        }

        let reachability = Arc::clone(&self.ctx.collaborators.reachability);
        let unreachable = self
            .humans()
            .into_iter()
            .find(|id| !reachability.is_reachable(id));
        if let Some(id) = unreachable {
            warn!(participant = %id, "participant unreachable while preparing, cancelling");
            self.enter_cancel();
            return;
        }

        self.board = Board::new();
        self.slot = Some(slot);
        self.owner_color = Some(if owner_is_black { Piece::Black } else { Piece::White });
        info!(
            ?slot,
            owner = %self.owner,
            owner_color = ?self.owner_color,
            opponent = ?self.opponent,
            "game starting"
        );

        self.phase = Phase::InGame;
        self.pre_turn(Piece::Black);
    }

    /// Places a disc for `actor`.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn submit_move(&mut self, actor: &str, x: i32, y: i32) -> SessionResult<Vec<Position>> {
        if self.phase.is_terminal() {
            return Err(SessionError::AlreadyTerminal);
        }
        if !self.is_participant(actor) {
            return Err(SessionError::NotAuthorized);
        }
        let Some(TurnState::ActiveTurn(color)) = self.turn else {
            return Err(SessionError::WrongTurn);
        };
        if self.phase != Phase::InGame || self.color_of(actor) != Some(color) {
            debug!(%actor, ?color, "move out of turn");
            return Err(SessionError::WrongTurn);
        }
        self.apply_move(color, x, y)
    }

    /// Feeds back the result of a search dispatched by this session. Results
    /// that no longer match the current turn are dropped.
    #[instrument(skip(self, outcome), fields(session_id = self.id, ticket = outcome.ticket))]
    pub fn apply_search_outcome(&mut self, outcome: SearchOutcome) {
        let expected = Some(TurnState::ActiveTurn(outcome.side));
        if self.pending_search != Some(outcome.ticket)
            || self.phase != Phase::InGame
            || self.turn != expected
        {
            debug!(phase = %self.phase, turn = ?self.turn, "discarding stale search result");
            return;
        }
        self.pending_search = None;

        let failure = match outcome.result {
            Ok(mv) => match self.apply_move(outcome.side, mv.row as i32, mv.col as i32) {
                Ok(_) => return,
                Err(err) => format!("computer chose {mv:?}: {err}"),
            },
            Err(err) => err.to_string(),
        };
        error!(error = %failure, "computer move failed, cancelling session");
        self.enter_cancel();
    }

    /// Cancels the session when the table of eligibility allows it.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn cancel(&mut self, actor: &str) -> SessionResult<()> {
        if self.phase.is_terminal() {
            return Err(SessionError::AlreadyTerminal);
        }
        if !self.is_participant(actor) {
            return Err(SessionError::NotAuthorized);
        }

        let allowed = match self.phase {
            Phase::Invitation => actor == self.owner,
            Phase::InGame => self.other_side_unreachable(actor),
            _ => false,
        };
        if !allowed {
            debug!(%actor, phase = %self.phase, "cancel refused");
            return Err(SessionError::NotAuthorized);
        }

        info!(%actor, "session cancelled");
        self.enter_cancel();
        Ok(())
    }

    /// Ends the game at once with `actor` as the loser.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn resign(&mut self, actor: &str) -> SessionResult<()> {
        if self.phase.is_terminal() {
            return Err(SessionError::AlreadyTerminal);
        }
        if !self.is_participant(actor) || self.phase != Phase::InGame {
            return Err(SessionError::NotAuthorized);
        }
        let color = self.color_of(actor).ok_or(SessionError::NotAuthorized)?;

        info!(%actor, ?color, "resigned");
        self.end_game(Some(color));
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn join_spectator(&mut self, actor: &str) -> SessionResult<()> {
        if self.phase.is_terminal() {
            return Err(SessionError::AlreadyTerminal);
        }
        if self.is_participant(actor) {
            return Err(SessionError::NotAuthorized);
        }
        if self.spectators.insert(actor.to_string()) {
            info!(%actor, "spectator joined");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn leave_spectator(&mut self, actor: &str) -> SessionResult<()> {
        if !self.spectators.remove(actor) {
            return Err(SessionError::NotFound);
        }
        self.ctx.collaborators.presentation.restore(actor);
        info!(%actor, "spectator left");
        Ok(())
    }

    /// Releases the slot and restores everyone. Only acts once the session
    /// has reached a terminal phase, and only once.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn finalize(&mut self) {
        if self.finalized || !self.phase.is_terminal() {
            return;
        }
        self.finalized = true;
        self.finalize_at = None;
        self.pending_search = None;
        self.slot = None;

        let presentation = Arc::clone(&self.ctx.collaborators.presentation);
        let economy = Arc::clone(&self.ctx.collaborators.economy);
        for id in self.humans() {
            economy.restore_inventory(&id);
            presentation.restore(&id);
        }
        for id in &self.spectators {
            presentation.restore(id);
        }
        info!(phase = %self.phase, "session finalized");
    }

    fn pre_turn(&mut self, color: Piece) {
        let mut color = color;
        loop {
            self.turn = Some(TurnState::PreTurn(color));
            if self.board.is_terminal() {
                self.end_game(None);
                return;
            }
            if self.board.has_any_legal_move(color) {
                break;
            }
            info!(?color, "no legal move, passing");
            self.record(color, MoveKind::Pass);
            self.last_flips.clear();
            self.last_was_pass = true;
            self.ctx.collaborators.presentation.on_pass(self.id, color);
            color = color.opposite();
        }

        self.turn = Some(TurnState::ActiveTurn(color));
        self.emit_state();

        if let Some(Mover::Computer(evaluator)) = self.mover_for(color) {
            self.dispatch_search(color, evaluator);
        }
    }

    fn dispatch_search(&mut self, color: Piece, evaluator: Arc<dyn MoveEvaluator>) {
        if self.pending_search.is_some() {
            warn!("search already in flight");
            return;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending_search = Some(ticket);
        debug!(ticket, ?color, "dispatching search");

        let request = SearchRequest {
            session: self.id,
            ticket,
            board: self.board,
            side: color,
            evaluator,
            min_thinking: self.ctx.config.min_thinking_time(),
        };
        let dispatcher = Arc::clone(&self.ctx.dispatcher);
        dispatcher.dispatch(request, self.ctx.outbox.clone());
    }

    fn apply_move(&mut self, color: Piece, x: i32, y: i32) -> SessionResult<Vec<Position>> {
        let pos = Position::checked(x, y).ok_or(SessionError::InvalidCoordinate)?;
        if self.board.piece_at(pos.row, pos.col) != Piece::Empty {
            return Err(SessionError::InvalidCoordinate);
        }
        if !self.board.can_place(pos.row, pos.col, color) {
            return Err(SessionError::IllegalMove);
        }

        self.turn = Some(TurnState::PostTurn(color));
        let flips = self.board.place(pos.row, pos.col, color);
        self.ctx
            .collaborators
            .presentation
            .on_placed(self.id, pos, color, &flips);
        self.record(
            color,
            MoveKind::Place {
                at: pos,
                flips: flips.len() as u8,
            },
        );
        self.last_flips = flips.clone();
        self.last_was_pass = false;
        info!(?color, at = ?pos, flips = flips.len(), "disc placed");

        self.post_turn(color);
        Ok(flips)
    }

    fn post_turn(&mut self, color: Piece) {
        if self.board.is_terminal() {
            self.end_game(None);
        } else {
            self.pre_turn(color.opposite());
        }
    }

    /// `resigned` is the color that gave up, if any.
    fn end_game(&mut self, resigned: Option<Piece>) {
        self.phase = Phase::End;
        self.turn = None;
        self.pending_search = None;

        let (black_count, white_count) = self.board.count();
        let winner = match resigned {
            Some(loser) => Some(loser.opposite()),
            None if black_count > white_count => Some(Piece::Black),
            None if white_count > black_count => Some(Piece::White),
            None => None,
        };
        self.result = Some(GameResult {
            winner: winner.map_or(0, Piece::to_u8),
            black_count,
            white_count,
            resigned: resigned.is_some(),
        });
        info!(black_count, white_count, ?winner, resigned = resigned.is_some(), "game over");
        for line in self.board.render() {
            info!("{line}");
        }

        let kind = self.kind();
        for id in self.humans() {
            let outcome = match (winner, self.color_of(&id)) {
                (None, _) => Outcome::Draw,
                (Some(w), Some(c)) if w == c => Outcome::Win,
                _ => Outcome::Lose,
            };
            self.ctx.collaborators.ranking.record_result(&id, kind, outcome);
            self.ctx.collaborators.economy.notify_outcome(&id, outcome);
        }

        self.finalize_at = Some(Instant::now() + self.ctx.config.session_end_wait());
        self.emit_state();
    }

    fn enter_cancel(&mut self) {
        self.phase = Phase::Cancel;
        self.turn = None;
        self.pending_search = None;
        self.ctx.collaborators.economy.refund_wager(&self.owner);
        self.emit_state();
        self.finalize();
    }

    /// True when the participant facing `actor` cannot object to a cancel.
    /// A computer opponent never objects.
    fn other_side_unreachable(&self, actor: &str) -> bool {
        let other = if actor == self.owner {
            self.opponent.participant()
        } else {
            Some(self.owner.as_str())
        };
        match other {
            Some(id) => !self.ctx.collaborators.reachability.is_reachable(id),
            None => true,
        }
    }

    fn humans(&self) -> Vec<ParticipantId> {
        let mut ids = vec![self.owner.clone()];
        if let Some(id) = self.opponent.participant() {
            ids.push(id.to_string());
        }
        ids
    }

    fn record(&mut self, piece: Piece, kind: MoveKind) {
        let ply = self.log.len() as u16 + 1;
        self.log.push(MoveRecord { ply, piece, kind });
    }

    fn emit_state(&self) {
        let state = self.snapshot();
        self.ctx.collaborators.presentation.on_state(self.id, &state);
    }
}

impl fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("opponent", &self.opponent)
            .field("phase", &self.phase)
            .field("turn", &self.turn)
            .field("owner_color", &self.owner_color)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
