//! WebSocket adapter for the connection lifecycle handler.

use std::future;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};

use crate::connection::run_connection;
use crate::registry::SessionRegistry;
use crate::session::{Endpoint, Outbound};

/// Serve one upgraded socket.
///
/// A writer task drains the endpoint's outbound queue into the socket. The
/// inbound side yields binary frames until a close frame or transport error;
/// text and control frames are skipped.
pub async fn handle_socket(socket: WebSocket, registry: Arc<SessionRegistry>) {
    let (mut sink, stream) = socket.split();
    let (endpoint, mut outbound) = Endpoint::channel();
    let endpoint_id = endpoint.id();

    let writer = tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            match item {
                Outbound::Frame(frame) => {
                    if let Err(e) = sink.send(Message::Binary(frame)).await {
                        tracing::debug!(endpoint = %endpoint_id, error = %e, "Socket write failed");
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let frames = stream
        .take_while(|msg| future::ready(matches!(msg, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Binary(frame)) => Some(frame),
                _ => None,
            })
        });

    tracing::debug!(endpoint = %endpoint_id, "WebSocket connected");
    run_connection(registry, frames, endpoint).await;

    if let Err(e) = writer.await {
        tracing::error!(endpoint = %endpoint_id, error = %e, "Socket writer task failed");
    }
    tracing::debug!(endpoint = %endpoint_id, "WebSocket closed");
}
