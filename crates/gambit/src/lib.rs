//! gambit: two-player chess session coordinator and move relay.
//!
//! Clients allocate a session id over HTTP, join it over a WebSocket, and
//! exchange binary frames. The server pairs players, assigns colors, enforces
//! turn order, validates moves through a rules engine, relays accepted moves,
//! and reports the outcome.

pub mod connection;
pub mod controller;
pub mod protocol;
pub mod registry;
pub mod rules;
pub mod session;
pub mod telemetry;
pub mod transport;
mod version;

pub use connection::run_connection;
pub use controller::{Dispatch, Dropped, dispatch};
pub use registry::SessionRegistry;
pub use rules::{Board, IllegalMove, MoveDescriptor, RulesEngine, StandardChess};
pub use session::{ConnectOutcome, Endpoint, EndpointId, GameSession, Outbound, Phase, SharedSession};
pub use version::{GAMBIT_VERSION, VersionInfo};
