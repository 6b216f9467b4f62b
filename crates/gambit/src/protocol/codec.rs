//! Frame codec for the game protocol.
//!
//! Layouts (all single bytes, coordinates are raw 0-7 indices):
//!
//! | opcode | payload                                   |
//! |--------|-------------------------------------------|
//! | 0      | UTF-8 session id                          |
//! | 1      | color                                     |
//! | 2      | src file, src rank, dst file, dst rank, .., stamp |
//! | 3      | result (0, 1 = winner color, 2 = draw)    |
//! | 4      | rank, file, .., stamp                     |
//! | 5      | (rank, file) pairs                        |
//!
//! Opcode 2 puts the file first while opcodes 4 and 5 put the rank first.
//! Existing clients depend on that, so it must not be normalised. The
//! turn-stamp is always the last byte of a move or query frame; clients may
//! send extra bytes between the coordinates and the stamp.

use thiserror::Error;
use tokio_util::bytes::{BufMut, Bytes, BytesMut};

use super::message::{
    CandidatesQuery, ClientMessage, Color, GameResult, MoveRequest, Opcode, ServerMessage,
    SessionId, Square,
};

const MOVE_MIN_LEN: usize = 6;
const QUERY_MIN_LEN: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("opcode {0:?} is not accepted in this direction")]
    UnexpectedOpcode(Opcode),

    #[error("{opcode:?} frame too short ({len} bytes)")]
    Truncated { opcode: Opcode, len: usize },

    #[error("square off the board: rank {rank}, file {file}")]
    OffBoard { rank: u8, file: u8 },

    #[error("session id is not valid UTF-8")]
    InvalidSessionId,

    #[error("invalid color byte {0}")]
    InvalidColor(u8),

    #[error("invalid result byte {0}")]
    InvalidResult(u8),

    #[error("candidate list has odd length {0}")]
    OddCandidates(usize),
}

fn split_opcode(frame: &[u8]) -> Result<(Opcode, &[u8]), DecodeError> {
    let (&first, payload) = frame.split_first().ok_or(DecodeError::Empty)?;
    let opcode = Opcode::try_from(first).map_err(DecodeError::UnknownOpcode)?;
    Ok((opcode, payload))
}

fn square(rank: u8, file: u8) -> Result<Square, DecodeError> {
    Square::new(rank, file).ok_or(DecodeError::OffBoard { rank, file })
}

fn decode_move(frame: &[u8]) -> Result<MoveRequest, DecodeError> {
    if frame.len() < MOVE_MIN_LEN {
        return Err(DecodeError::Truncated {
            opcode: Opcode::Move,
            len: frame.len(),
        });
    }
    let from = square(frame[2], frame[1])?;
    let to = square(frame[4], frame[3])?;
    let stamp = frame[frame.len() - 1];
    Ok(MoveRequest {
        from,
        to,
        stamp,
        frame: Bytes::copy_from_slice(frame),
    })
}

impl ClientMessage {
    /// Decode one inbound frame.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let (opcode, payload) = split_opcode(frame)?;
        match opcode {
            Opcode::Join => {
                let key = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidSessionId)?;
                Ok(Self::Join(SessionId::from(key)))
            }
            Opcode::Move => decode_move(frame).map(Self::Move),
            Opcode::Query => {
                if frame.len() < QUERY_MIN_LEN {
                    return Err(DecodeError::Truncated {
                        opcode,
                        len: frame.len(),
                    });
                }
                let square = square(frame[1], frame[2])?;
                let stamp = frame[frame.len() - 1];
                Ok(Self::Query(CandidatesQuery { square, stamp }))
            }
            other => Err(DecodeError::UnexpectedOpcode(other)),
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Self::Join(id) => {
                let mut buf = BytesMut::with_capacity(1 + id.as_str().len());
                buf.put_u8(Opcode::Join.as_byte());
                buf.put_slice(id.as_str().as_bytes());
                buf.freeze()
            }
            Self::Move(mv) => mv.frame.clone(),
            Self::Query(query) => Bytes::from(vec![
                Opcode::Query.as_byte(),
                query.square.rank,
                query.square.file,
                query.stamp,
            ]),
        }
    }
}

impl ServerMessage {
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Assign(color) => Bytes::from(vec![Opcode::Assign.as_byte(), color.as_byte()]),
            Self::Move(mv) => mv.frame.clone(),
            Self::Outcome(result) => {
                Bytes::from(vec![Opcode::Outcome.as_byte(), result.as_byte()])
            }
            Self::Candidates(squares) => {
                let mut buf = BytesMut::with_capacity(1 + squares.len() * 2);
                buf.put_u8(Opcode::Candidates.as_byte());
                for sq in squares {
                    buf.put_u8(sq.rank);
                    buf.put_u8(sq.file);
                }
                buf.freeze()
            }
        }
    }

    /// Decode one outbound frame, as a client would.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let (opcode, payload) = split_opcode(frame)?;
        match opcode {
            Opcode::Assign => {
                let &byte = payload.first().ok_or(DecodeError::Truncated {
                    opcode,
                    len: frame.len(),
                })?;
                Color::from_byte(byte)
                    .map(Self::Assign)
                    .ok_or(DecodeError::InvalidColor(byte))
            }
            Opcode::Move => decode_move(frame).map(Self::Move),
            Opcode::Outcome => {
                let &byte = payload.first().ok_or(DecodeError::Truncated {
                    opcode,
                    len: frame.len(),
                })?;
                GameResult::from_byte(byte)
                    .map(Self::Outcome)
                    .ok_or(DecodeError::InvalidResult(byte))
            }
            Opcode::Candidates => {
                if payload.len() % 2 != 0 {
                    return Err(DecodeError::OddCandidates(payload.len()));
                }
                payload
                    .chunks_exact(2)
                    .map(|pair| square(pair[0], pair[1]))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Candidates)
            }
            other => Err(DecodeError::UnexpectedOpcode(other)),
        }
    }
}
