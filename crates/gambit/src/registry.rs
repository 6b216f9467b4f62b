//! Session registry and the two-phase handoff slot.
//!
//! `allocate` is called once per lobby request. The first call of each pair
//! creates a session and parks its id in the pending slot; the second call
//! returns that same id and clears the slot. Both steps run under the slot
//! lock, so a pair of concurrent callers always sees exactly one
//! create-then-reuse sequence.
//!
//! Pairing is by arrival order only. When more than two unrelated clients
//! allocate at the same time, two of them may end up in a session neither
//! intended to share. There is no expiry on the pending slot.
//!
//! Sessions are never removed. A finished game stays in the map until the
//! process exits.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::protocol::SessionId;
use crate::rules::{RulesEngine, StandardChess};
use crate::session::{GameSession, SharedSession};

pub struct SessionRegistry {
    sessions: DashMap<SessionId, SharedSession>,
    pending: StdMutex<Option<SessionId>>,
    rules: Arc<dyn RulesEngine>,
}

impl SessionRegistry {
    pub fn new(rules: Arc<dyn RulesEngine>) -> Self {
        Self {
            sessions: DashMap::new(),
            pending: StdMutex::new(None),
            rules,
        }
    }

    /// Lock the pending slot.
    /// On poison: logs and recovers; the slot holds a plain id and is valid in
    /// any state.
    fn lock_pending(&self) -> MutexGuard<'_, Option<SessionId>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Pending slot mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Hand out a session id for the next player to join.
    ///
    /// Odd calls create a session; even calls return the previous call's id.
    pub fn allocate(&self) -> SessionId {
        let mut pending = self.lock_pending();

        if let Some(id) = pending.take() {
            tracing::info!(session = %id, "Handing out pending session");
            return id;
        }

        let id = SessionId::generate();
        let session = GameSession::new(id.clone(), self.rules.new_board());
        self.sessions
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        *pending = Some(id.clone());
        tracing::info!(session = %id, "Created session");
        id
    }

    pub fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Id waiting for its second player, if any.
    pub fn pending(&self) -> Option<SessionId> {
        self.lock_pending().clone()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Arc::new(StandardChess))
    }
}
