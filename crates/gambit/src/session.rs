//! GameSession: one paired game between two endpoints.
//!
//! A session owns:
//! - The endpoints attached to it (at most two, in arrival order)
//! - The color pool handed out on join
//! - Whose turn it is
//! - The rules-engine board
//!
//! Sessions are shared between the connection tasks of both players as
//! [`SharedSession`]. Every mutation happens under that lock, one inbound
//! message at a time (see `controller.rs`).
//!
//! Writing to clients: each [`Endpoint`] is the sending half of an unbounded
//! queue drained by the connection's writer task. Sends never block; a closed
//! queue means the writer is gone, and the endpoint is dropped from the session.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::protocol::{Color, ServerMessage, SessionId};
use crate::rules::Board;

pub type SharedSession = Arc<Mutex<GameSession>>;

/// Maximum endpoints per session.
pub const SESSION_CAPACITY: usize = 2;

/// Unique identifier for one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(uuid::Uuid);

impl EndpointId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instruction for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Bytes),
    Close,
}

/// Handle used to push frames to one connected client.
#[derive(Debug, Clone)]
pub struct Endpoint {
    id: EndpointId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Endpoint {
    /// Create an endpoint and the receiver its writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: EndpointId::new(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Queue a frame. Returns false if the connection's writer is gone.
    pub fn send(&self, frame: Bytes) -> bool {
        self.tx.send(Outbound::Frame(frame)).is_ok()
    }

    /// Ask the writer to close the connection after draining queued frames.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

/// Session lifecycle. Moves are only processed `InPlay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingJoin,
    InPlay,
    Finished,
}

/// Result of [`GameSession::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Joined and was sent this color.
    Assigned(Color),
    /// Joined after both colors were already handed out; no message sent.
    Attached,
    /// Already connected or session full; nothing changed.
    Rejected,
}

pub struct GameSession {
    id: SessionId,
    endpoints: Vec<Endpoint>,
    /// Popped from the back: the first joiner gets color 0.
    color_pool: Vec<Color>,
    turn: Color,
    board: Box<dyn Board>,
    phase: Phase,
    finished: CancellationToken,
}

impl GameSession {
    pub fn new(id: SessionId, board: Box<dyn Board>) -> Self {
        Self {
            id,
            endpoints: Vec::with_capacity(SESSION_CAPACITY),
            color_pool: vec![Color::One, Color::Zero],
            turn: Color::Zero,
            board,
            phase: Phase::AwaitingJoin,
            finished: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_member(&self, id: EndpointId) -> bool {
        self.endpoints.iter().any(|e| e.id == id)
    }

    /// Token cancelled once the session reaches [`Phase::Finished`].
    pub fn finished_token(&self) -> CancellationToken {
        self.finished.clone()
    }

    /// Attach an endpoint and hand it the next color.
    ///
    /// Silently rejected if the endpoint is already attached or the session
    /// is full. Callers learn of rejection only through the absence of an
    /// Assign frame on the wire.
    pub fn connect(&mut self, endpoint: Endpoint) -> ConnectOutcome {
        if self.is_member(endpoint.id) || self.endpoints.len() >= SESSION_CAPACITY {
            tracing::debug!(
                session = %self.id,
                endpoint = %endpoint.id,
                endpoints = self.endpoints.len(),
                "Join rejected"
            );
            return ConnectOutcome::Rejected;
        }

        let color = self.color_pool.pop();
        if let Some(color) = color {
            let frame = ServerMessage::Assign(color).encode();
            if !endpoint.send(frame) {
                tracing::debug!(endpoint = %endpoint.id, "Assign not delivered, writer gone");
            }
        }
        self.endpoints.push(endpoint);

        if self.phase == Phase::AwaitingJoin && self.color_pool.is_empty() {
            self.phase = Phase::InPlay;
            tracing::info!(session = %self.id, "Session paired");
        }

        match color {
            Some(color) => ConnectOutcome::Assigned(color),
            None => ConnectOutcome::Attached,
        }
    }

    /// Remove an endpoint if present. No other state changes.
    pub fn disconnect(&mut self, id: EndpointId) -> bool {
        let before = self.endpoints.len();
        self.endpoints.retain(|e| e.id != id);
        let removed = self.endpoints.len() != before;
        if removed {
            tracing::info!(session = %self.id, endpoint = %id, "Endpoint disconnected");
        }
        removed
    }

    /// Deliver a message to every endpoint.
    ///
    /// An endpoint whose writer is gone is dropped from the session; delivery
    /// to the others continues.
    pub fn broadcast(&mut self, message: &ServerMessage) {
        self.broadcast_frame(message.encode());
    }

    pub(crate) fn broadcast_frame(&mut self, frame: Bytes) {
        let session = &self.id;
        self.endpoints.retain(|endpoint| {
            let delivered = endpoint.send(frame.clone());
            if !delivered {
                tracing::info!(
                    session = %session,
                    endpoint = %endpoint.id,
                    "Broadcast failed, dropping endpoint"
                );
            }
            delivered
        });
    }

    pub(crate) fn board(&self) -> &dyn Board {
        self.board.as_ref()
    }

    pub(crate) fn board_mut(&mut self) -> &mut dyn Board {
        self.board.as_mut()
    }

    pub(crate) fn flip_turn(&mut self) {
        self.turn = self.turn.opponent();
    }

    /// Enter [`Phase::Finished`]: close every endpoint and wake both
    /// connection loops.
    pub(crate) fn finish(&mut self) {
        self.phase = Phase::Finished;
        for endpoint in &self.endpoints {
            endpoint.close();
        }
        self.finished.cancel();
    }
}
