//! Binary wire protocol spoken over the game websocket.
//!
//! Every frame is `[opcode, payload..]` with fixed-layout payloads. The
//! transport delivers whole frames, so there is no length prefix.
//!
//! # Architecture
//!
//! - **message**: Typed messages, opcodes, colors, squares, result codes
//! - **codec**: Byte encoding/decoding for both directions

pub mod codec;
pub mod message;

pub use codec::DecodeError;
pub use message::{
    CandidatesQuery, ClientMessage, Color, GameResult, MoveRequest, Opcode, ServerMessage,
    SessionId, Square,
};
