//! Off-thread move search.
//!
//! A session hands a [`SearchRequest`] to a [`SearchDispatcher`]; the answer
//! comes back as a [`SearchOutcome`] on a channel drained by the registry.
//! The request carries a copy of the board, never the session's own.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use derive_more::{Display, Error};
use tracing::{debug, warn};
use web_time::Instant;

use crate::ai::MoveEvaluator;
use crate::board::Board;
use crate::collab::SessionId;
use crate::types::{Piece, Position};

pub struct SearchRequest {
    pub session: SessionId,
    /// Identifies this search within its session; stale tickets are dropped.
    pub ticket: u64,
    pub board: Board,
    pub side: Piece,
    pub evaluator: Arc<dyn MoveEvaluator>,
    /// Results faster than this are held back (cosmetic).
    pub min_thinking: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SearchFailure {
    #[display("evaluator panicked: {_0}")]
    Panicked(#[error(not(source))] String),
    #[display("evaluator returned no move")]
    NoMove,
    #[display("search worker could not be started: {_0}")]
    Spawn(#[error(not(source))] String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub session: SessionId,
    pub ticket: u64,
    pub side: Piece,
    pub result: Result<Position, SearchFailure>,
}

pub trait SearchDispatcher: Send + Sync {
    fn dispatch(&self, request: SearchRequest, outbox: Sender<SearchOutcome>);
}

/// One worker thread per search, with thinking-time padding.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDispatcher;

impl SearchDispatcher for ThreadDispatcher {
    fn dispatch(&self, request: SearchRequest, outbox: Sender<SearchOutcome>) {
        let (session, ticket, side) = (request.session, request.ticket, request.side);
        let failed = outbox.clone();
        let spawned = thread::Builder::new()
            .name(format!("reversi-search-{session}"))
            .spawn(move || {
                let started = Instant::now();
                let outcome = run_search(&request);
                let elapsed = started.elapsed();
                if let Some(rest) = request.min_thinking.checked_sub(elapsed) {
                    thread::sleep(rest);
                }
                debug!(session, ticket, ?elapsed, "search finished");
                if outbox.send(outcome).is_err() {
                    debug!(session, ticket, "registry gone, dropping search result");
                }
            });

        if let Err(err) = spawned {
            warn!(session, ticket, error = %err, "failed to spawn search worker");
            let outcome = SearchOutcome {
                session,
                ticket,
                side,
                result: Err(SearchFailure::Spawn(err.to_string())),
            };
            if failed.send(outcome).is_err() {
                debug!(session, ticket, "registry gone, dropping spawn failure");
            }
        }
    }
}

/// Runs the search on the caller's thread. The outcome still travels through
/// the channel, so it is applied on the next tick like a threaded one.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl SearchDispatcher for InlineDispatcher {
    fn dispatch(&self, request: SearchRequest, outbox: Sender<SearchOutcome>) {
        let outcome = run_search(&request);
        if outbox.send(outcome).is_err() {
            debug!(session = request.session, "registry gone, dropping search result");
        }
    }
}

/// Evaluates `request`, turning a panic inside the evaluator into a failure.
pub(crate) fn run_search(request: &SearchRequest) -> SearchOutcome {
    let board = request.board;
    let evaluator = Arc::clone(&request.evaluator);
    let side = request.side;
    let result = panic::catch_unwind(AssertUnwindSafe(|| evaluator.next_move(&board, side)));

    let result = match result {
        Ok(Some(mv)) => Ok(mv),
        Ok(None) => Err(SearchFailure::NoMove),
        Err(payload) => Err(SearchFailure::Panicked(panic_message(payload.as_ref()))),
    };

    SearchOutcome {
        session: request.session,
        ticket: request.ticket,
        side,
        result,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::ai::GreedyEvaluator;
    use crate::types::Difficulty;

    struct Exploding;

    impl MoveEvaluator for Exploding {
        fn difficulty(&self) -> Difficulty {
            Difficulty::Hard
        }

        fn next_move(&self, _board: &Board, _side: Piece) -> Option<Position> {
            panic!("boom");
        }
    }

    fn request(evaluator: Arc<dyn MoveEvaluator>) -> SearchRequest {
        SearchRequest {
            session: 7,
            ticket: 3,
            board: Board::new(),
            side: Piece::Black,
            evaluator,
            min_thinking: Duration::ZERO,
        }
    }

    #[test]
    fn inline_dispatch_delivers_through_channel() {
        let (tx, rx) = mpsc::channel();
        InlineDispatcher.dispatch(request(Arc::new(GreedyEvaluator)), tx);

        let outcome = rx.try_recv().expect("inline result is queued immediately");
        assert_eq!(outcome.session, 7);
        assert_eq!(outcome.ticket, 3);
        assert_eq!(outcome.result, Ok(Position::new(2, 3)));
    }

    #[test]
    fn thread_dispatch_delivers_eventually() {
        let (tx, rx) = mpsc::channel();
        ThreadDispatcher.dispatch(request(Arc::new(GreedyEvaluator)), tx);

        let outcome = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("worker must answer");
        assert_eq!(outcome.result, Ok(Position::new(2, 3)));
    }

    #[test]
    fn dispatch_after_registry_is_gone_does_not_panic() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        InlineDispatcher.dispatch(request(Arc::new(GreedyEvaluator)), tx.clone());
        ThreadDispatcher.dispatch(request(Arc::new(GreedyEvaluator)), tx);
    }

    #[test]
    fn panicking_evaluator_becomes_failure() {
        let outcome = run_search(&request(Arc::new(Exploding)));
        assert_eq!(
            outcome.result,
            Err(SearchFailure::Panicked("boom".to_string()))
        );
    }

    #[test]
    fn evaluator_without_move_is_reported() {
        let mut req = request(Arc::new(GreedyEvaluator));
        req.board = Board::from_bitboards(u64::MAX ^ 1, 0);
        req.side = Piece::White;
        assert_eq!(run_search(&req).result, Err(SearchFailure::NoMove));
    }
}
