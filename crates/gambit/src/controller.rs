//! Turn and synchronization controller.
//!
//! [`dispatch`] applies one decoded client message to a locked session. The
//! caller holds the session mutex for the whole call, so the turn-stamp check,
//! the rules-engine call, the state change, and the broadcast form one unit.
//!
//! Nothing here reports errors to clients. Stale stamps, illegal moves, and
//! out-of-phase messages are dropped and logged; clients infer failure from
//! the missing broadcast.

use crate::protocol::{CandidatesQuery, ClientMessage, GameResult, MoveRequest, ServerMessage};
use crate::rules::MoveDescriptor;
use crate::session::{EndpointId, GameSession, Phase};

/// Why a message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dropped {
    /// Session is still waiting for its second player.
    NotPaired,
    /// Session already reported an outcome.
    Finished,
    /// Sender is not attached to this session.
    NotMember,
    /// Join sent on an already-joined connection.
    AlreadyJoined,
    /// Turn-stamp does not name the side to move.
    StaleStamp { stamp: u8 },
    /// Rules engine refused the move.
    Illegal,
}

/// What handling a message did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Dropped(Dropped),
    /// Candidate list broadcast to both endpoints.
    Candidates(usize),
    /// Move committed, echoed, turn flipped.
    Moved,
    /// Move committed and ended the game; both endpoints closed.
    GameOver(GameResult),
}

pub fn dispatch(session: &mut GameSession, sender: EndpointId, message: ClientMessage) -> Dispatch {
    let result = match session.phase() {
        Phase::AwaitingJoin => Dispatch::Dropped(Dropped::NotPaired),
        Phase::Finished => Dispatch::Dropped(Dropped::Finished),
        Phase::InPlay if !session.is_member(sender) => Dispatch::Dropped(Dropped::NotMember),
        Phase::InPlay => match message {
            ClientMessage::Join(_) => Dispatch::Dropped(Dropped::AlreadyJoined),
            ClientMessage::Query(query) => handle_query(session, query),
            ClientMessage::Move(mv) => handle_move(session, mv),
        },
    };

    if let Dispatch::Dropped(reason) = result {
        tracing::debug!(
            session = %session.id(),
            endpoint = %sender,
            turn = %session.turn(),
            ?reason,
            "Message dropped"
        );
    }
    result
}

fn handle_query(session: &mut GameSession, query: CandidatesQuery) -> Dispatch {
    if !session.turn().matches_stamp(query.stamp) {
        return Dispatch::Dropped(Dropped::StaleStamp { stamp: query.stamp });
    }

    let destinations = session.board().legal_destinations(query.square);
    let count = destinations.len();
    session.broadcast(&ServerMessage::Candidates(destinations));
    Dispatch::Candidates(count)
}

fn handle_move(session: &mut GameSession, mv: MoveRequest) -> Dispatch {
    if !session.turn().matches_stamp(mv.stamp) {
        return Dispatch::Dropped(Dropped::StaleStamp { stamp: mv.stamp });
    }

    let descriptor = MoveDescriptor {
        from: mv.from,
        to: mv.to,
    };
    if let Err(e) = session.board_mut().apply_move(descriptor) {
        tracing::debug!(session = %session.id(), error = %e, "Move rejected by rules engine");
        return Dispatch::Dropped(Dropped::Illegal);
    }

    let mover = session.turn();
    session.flip_turn();
    session.broadcast_frame(mv.frame().clone());
    tracing::debug!(
        session = %session.id(),
        color = %mover,
        from = %mv.from,
        to = %mv.to,
        "Move committed"
    );

    match session.board().outcome() {
        Some(result) => {
            session.broadcast(&ServerMessage::Outcome(result));
            session.finish();
            tracing::info!(session = %session.id(), result = ?result, "Game over");
            Dispatch::GameOver(result)
        }
        None => Dispatch::Moved,
    }
}
