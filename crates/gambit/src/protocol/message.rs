//! Wire protocol types for client-server game traffic.
//!
//! Client to server: Join, Move, Query.
//! Server to client: Assign, Move (echo), Outcome, Candidates.

use tokio_util::bytes::Bytes;

/// Key two clients use to land in the same game.
///
/// Generated as a v4 UUID in simple (32 hex chars) form, but any UTF-8 string
/// received on the wire is accepted for lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// First byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Join = 0,
    Assign = 1,
    Move = 2,
    Outcome = 3,
    Query = 4,
    Candidates = 5,
}

impl Opcode {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Self::Join),
            1 => Ok(Self::Assign),
            2 => Ok(Self::Move),
            3 => Ok(Self::Outcome),
            4 => Ok(Self::Query),
            5 => Ok(Self::Candidates),
            other => Err(other),
        }
    }
}

/// Side of the board as seen on the wire. Color 0 moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Zero,
    One,
}

impl Color {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    /// Whether a sender-supplied turn-stamp names this color.
    pub fn matches_stamp(self, stamp: u8) -> bool {
        self.as_byte() == stamp
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_byte())
    }
}

/// Zero-based board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub rank: u8,
    pub file: u8,
}

impl Square {
    pub const BOARD_SIZE: u8 = 8;

    /// Returns `None` when either index falls off an 8x8 board.
    pub fn new(rank: u8, file: u8) -> Option<Self> {
        (rank < Self::BOARD_SIZE && file < Self::BOARD_SIZE).then_some(Self { rank, file })
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.rank, self.file)
    }
}

/// A move attempt, or the echo of an accepted one.
///
/// The inbound frame is retained so the accepted-move broadcast is
/// byte-identical to what the mover sent, trailing bytes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub stamp: u8,
    pub(crate) frame: Bytes,
}

impl MoveRequest {
    /// Build a move frame in canonical layout
    /// `[2, from.file, from.rank, to.file, to.rank, stamp]`.
    pub fn new(from: Square, to: Square, stamp: u8) -> Self {
        let frame = Bytes::from(vec![
            Opcode::Move.as_byte(),
            from.file,
            from.rank,
            to.file,
            to.rank,
            stamp,
        ]);
        Self {
            from,
            to,
            stamp,
            frame,
        }
    }

    pub fn frame(&self) -> &Bytes {
        &self.frame
    }
}

/// Request for every legal destination from one square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatesQuery {
    pub square: Square,
    pub stamp: u8,
}

/// Terminal result broadcast when the game ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Won(Color),
    Draw,
}

impl GameResult {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Won(color) => color.as_byte(),
            Self::Draw => 2,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            2 => Some(Self::Draw),
            other => Color::from_byte(other).map(Self::Won),
        }
    }
}

/// Messages from client to server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join(SessionId),
    Move(MoveRequest),
    Query(CandidatesQuery),
}

impl ClientMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Join(_) => Opcode::Join,
            Self::Move(_) => Opcode::Move,
            Self::Query(_) => Opcode::Query,
        }
    }
}

/// Messages from server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Assign(Color),
    Move(MoveRequest),
    Outcome(GameResult),
    /// Destinations in rules-engine enumeration order.
    Candidates(Vec<Square>),
}

impl ServerMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Assign(_) => Opcode::Assign,
            Self::Move(_) => Opcode::Move,
            Self::Outcome(_) => Opcode::Outcome,
            Self::Candidates(_) => Opcode::Candidates,
        }
    }
}
