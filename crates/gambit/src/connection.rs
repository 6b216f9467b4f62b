//! Connection lifecycle: join, play loop, teardown.
//!
//! [`run_connection`] is transport-agnostic. It consumes the inbound frames
//! of one connection and pushes outbound traffic through the connection's
//! [`Endpoint`]. The WebSocket handler in `transport::http::ws` adapts a
//! socket to this shape.

use std::pin::pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::bytes::Bytes;

use crate::controller::{Dispatch, dispatch};
use crate::protocol::{ClientMessage, SessionId};
use crate::registry::SessionRegistry;
use crate::session::{ConnectOutcome, Endpoint, SharedSession};

/// Drive one client connection until it disconnects or its game ends.
///
/// Frames before the first valid Join are discarded. A Join naming an
/// unknown session closes the connection. Once joined, every frame is
/// decoded and dispatched under the session lock; undecodable frames are
/// dropped. On exit the endpoint is detached from its session.
pub async fn run_connection<S>(registry: Arc<SessionRegistry>, frames: S, endpoint: Endpoint)
where
    S: Stream<Item = Bytes>,
{
    let mut frames = pin!(frames);

    let Some(id) = await_join(&mut frames).await else {
        tracing::debug!(endpoint = %endpoint.id(), "Connection ended before join");
        return;
    };

    let Some(session) = registry.get(&id) else {
        tracing::info!(session = %id, endpoint = %endpoint.id(), "Join for unknown session, closing");
        endpoint.close();
        return;
    };

    let finished = {
        let mut guard = session.lock().await;
        match guard.connect(endpoint.clone()) {
            ConnectOutcome::Assigned(color) => {
                tracing::info!(session = %id, endpoint = %endpoint.id(), %color, "Player joined");
            }
            ConnectOutcome::Attached => {
                tracing::info!(session = %id, endpoint = %endpoint.id(), "Player reattached");
            }
            ConnectOutcome::Rejected => {}
        }
        guard.finished_token()
    };

    loop {
        tokio::select! {
            biased;

            _ = finished.cancelled() => break,

            frame = frames.next() => {
                let Some(frame) = frame else { break };
                if handle_frame(&session, &endpoint, &frame).await {
                    break;
                }
            }
        }
    }

    session.lock().await.disconnect(endpoint.id());
}

async fn await_join<S>(frames: &mut S) -> Option<SessionId>
where
    S: Stream<Item = Bytes> + Unpin,
{
    while let Some(frame) = frames.next().await {
        match ClientMessage::decode(&frame) {
            Ok(ClientMessage::Join(id)) => return Some(id),
            Ok(other) => {
                tracing::debug!(opcode = ?other.opcode(), "Frame before join, ignoring");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Undecodable frame before join, ignoring");
            }
        }
    }
    None
}

/// Returns true when the game ended on this frame.
async fn handle_frame(session: &SharedSession, endpoint: &Endpoint, frame: &[u8]) -> bool {
    let message = match ClientMessage::decode(frame) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(endpoint = %endpoint.id(), error = %e, "Undecodable frame, ignoring");
            return false;
        }
    };

    let mut guard = session.lock().await;
    matches!(
        dispatch(&mut guard, endpoint.id(), message),
        Dispatch::GameOver(_)
    )
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc as fmpsc;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::protocol::{Color, GameResult};
    use crate::rules::testing::{ScriptedEngine, sq};
    use crate::session::{Outbound, Phase};

    struct Client {
        inbound: fmpsc::UnboundedSender<Bytes>,
        outbound: mpsc::UnboundedReceiver<Outbound>,
        task: JoinHandle<()>,
    }

    impl Client {
        fn connect(registry: &Arc<SessionRegistry>) -> Self {
            let (inbound, frames) = fmpsc::unbounded();
            let (endpoint, outbound) = Endpoint::channel();
            let task = tokio::spawn(run_connection(Arc::clone(registry), frames, endpoint));
            Self {
                inbound,
                outbound,
                task,
            }
        }

        fn send(&self, frame: &[u8]) {
            self.inbound
                .unbounded_send(Bytes::copy_from_slice(frame))
                .unwrap();
        }

        fn join(&self, id: &SessionId) {
            let mut frame = vec![0];
            frame.extend_from_slice(id.as_str().as_bytes());
            self.send(&frame);
        }

        async fn recv(&mut self) -> Option<Outbound> {
            self.outbound.recv().await
        }
    }

    fn frame(bytes: &[u8]) -> Option<Outbound> {
        Some(Outbound::Frame(Bytes::copy_from_slice(bytes)))
    }

    fn registry(engine: ScriptedEngine) -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(Arc::new(engine)))
    }

    async fn paired(registry: &Arc<SessionRegistry>) -> (Client, Client) {
        let id = registry.allocate();
        registry.allocate();
        let mut zero = Client::connect(registry);
        zero.join(&id);
        assert_eq!(zero.recv().await, frame(&[1, 0]));
        let mut one = Client::connect(registry);
        one.join(&id);
        assert_eq!(one.recv().await, frame(&[1, 1]));
        (zero, one)
    }

    #[tokio::test]
    async fn frames_before_join_are_ignored() {
        let registry = registry(ScriptedEngine::default());
        let id = registry.allocate();
        let mut client = Client::connect(&registry);

        client.send(&[2, 4, 1, 4, 3, 0]);
        client.send(&[9]);
        client.join(&id);

        assert_eq!(client.recv().await, frame(&[1, 0]));
    }

    #[tokio::test]
    async fn unknown_session_closes_connection() {
        let registry = registry(ScriptedEngine::default());
        let mut client = Client::connect(&registry);

        client.join(&SessionId::from("missing"));

        assert_eq!(client.recv().await, Some(Outbound::Close));
        client.task.await.unwrap();
    }

    #[tokio::test]
    async fn move_is_relayed_to_both_players() {
        let engine = ScriptedEngine::default().allow(sq(1, 4), sq(3, 4));
        let registry = registry(engine);
        let (mut zero, mut one) = paired(&registry).await;

        zero.send(&[2, 4, 1, 4, 3, 0]);

        assert_eq!(zero.recv().await, frame(&[2, 4, 1, 4, 3, 0]));
        assert_eq!(one.recv().await, frame(&[2, 4, 1, 4, 3, 0]));
    }

    #[tokio::test]
    async fn garbage_after_join_is_ignored() {
        let engine = ScriptedEngine::default().destinations(sq(1, 4), vec![sq(2, 4)]);
        let registry = registry(engine);
        let (mut zero, mut one) = paired(&registry).await;

        zero.send(&[]);
        zero.send(&[2, 4]);
        zero.send(&[4, 1, 4, 0]);

        assert_eq!(zero.recv().await, frame(&[5, 2, 4]));
        assert_eq!(one.recv().await, frame(&[5, 2, 4]));
    }

    #[tokio::test]
    async fn game_over_closes_both_and_ends_tasks() {
        let engine = ScriptedEngine::default()
            .allow(sq(1, 4), sq(3, 4))
            .finish_after(1, GameResult::Won(Color::Zero));
        let registry = registry(engine);
        let (mut zero, mut one) = paired(&registry).await;

        zero.send(&[2, 4, 1, 4, 3, 0]);

        for client in [&mut zero, &mut one] {
            assert_eq!(client.recv().await, frame(&[2, 4, 1, 4, 3, 0]));
            assert_eq!(client.recv().await, frame(&[3, 0]));
            assert_eq!(client.recv().await, Some(Outbound::Close));
        }
        zero.task.await.unwrap();
        one.task.await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_leaves_session_in_play() {
        let registry = registry(ScriptedEngine::default());
        let id = registry.allocate();
        registry.allocate();
        let mut zero = Client::connect(&registry);
        zero.join(&id);
        zero.recv().await;
        let mut one = Client::connect(&registry);
        one.join(&id);
        one.recv().await;

        drop(one.inbound);
        one.task.await.unwrap();

        let session = registry.get(&id).unwrap();
        let session = session.lock().await;
        assert_eq!(session.endpoint_count(), 1);
        assert_eq!(session.phase(), Phase::InPlay);
    }

    async fn drain(outbound: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Some(item) = outbound.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn simultaneous_moves_with_same_stamp_commit_once() {
        let e2e4 = [2, 4, 1, 4, 3, 0];

        for _ in 0..32 {
            let engine = ScriptedEngine::default().allow(sq(1, 4), sq(3, 4));
            let registry = registry(engine.clone());
            let id = registry.allocate();
            registry.allocate();
            let mut zero = Client::connect(&registry);
            zero.join(&id);
            zero.recv().await;
            let mut one = Client::connect(&registry);
            one.join(&id);
            one.recv().await;

            // Both connection tasks race for the session lock.
            zero.send(&e2e4);
            one.send(&e2e4);
            drop(zero.inbound);
            drop(one.inbound);
            zero.task.await.unwrap();
            one.task.await.unwrap();

            assert_eq!(engine.applied().len(), 1);
            let session = registry.get(&id).unwrap();
            assert_eq!(session.lock().await.turn(), Color::One);
            assert_eq!(drain(&mut zero.outbound).await, vec![frame(&e2e4).unwrap()]);
            assert_eq!(drain(&mut one.outbound).await, vec![frame(&e2e4).unwrap()]);
        }
    }
}
