//! Realtime channel for one open ticket conversation
//!
//! Connects a Socket.IO v4 WebSocket, authenticates with the session token,
//! joins the ticket room, and then runs a background task that forwards
//! decoded inbound events and sends outbound acks and typing events.
//! Delivery is best effort: there is no reconnection and no retry.

pub mod codec;
pub mod events;
pub mod socket;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::auth::Session;
use crate::chat::{Inbound, Outbound};
use codec::Packet;
use socket::ChannelSocket;

/// What the channel task reports to the conversation runtime.
#[derive(Debug)]
pub enum ChannelUpdate {
    Event(Inbound),
    /// The server or the network ended the connection.
    Closed(String),
}

/// Handle to the channel task. Dropping it also tears the channel down.
pub struct Channel {
    outbound: mpsc::UnboundedSender<Outbound>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Channel {
    /// Connect, authenticate and join `ticket_id`.
    ///
    /// Inbound events are delivered on `updates` until the channel closes.
    pub async fn attach(
        base_url: &str,
        session: &Session,
        ticket_id: &str,
        updates: mpsc::UnboundedSender<ChannelUpdate>,
    ) -> Result<Self> {
        let mut socket = ChannelSocket::connect(base_url).await?;

        let auth = serde_json::json!({
            "token": session.token.token,
            "userId": session.user_id,
        });
        socket.handshake(&auth).await?;

        socket
            .emit(
                events::JOIN_TICKET,
                &events::join_payload(ticket_id, &session.user_id),
            )
            .await?;
        tracing::info!("Joined ticket {}", ticket_id);

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(channel_loop(
            socket,
            ticket_id.to_string(),
            session.user_id.clone(),
            updates,
            outbound_rx,
            shutdown_rx,
        ));

        Ok(Self {
            outbound,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    /// Queue an outbound event (fire-and-forget).
    pub fn emit(&self, event: Outbound) {
        if self.outbound.send(event).is_err() {
            tracing::debug!("Channel task gone -- outbound event dropped");
        }
    }

    /// Close the channel and wait for the task to finish.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Channel task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Background loop: forward inbound events, send outbound ones.
async fn channel_loop(
    mut socket: ChannelSocket,
    ticket_id: String,
    user_id: String,
    updates: mpsc::UnboundedSender<ChannelUpdate>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let closed_by_remote = loop {
        tokio::select! {
            packet = socket.recv_packet() => {
                match packet {
                    Ok(Some(Packet::Event { name, payload })) => {
                        if let Some(inbound) = events::decode(&name, payload, &ticket_id, Utc::now()) {
                            if updates.send(ChannelUpdate::Event(inbound)).is_err() {
                                // Nobody is listening any more.
                                break None;
                            }
                        }
                    }
                    Ok(Some(Packet::Disconnect)) => {
                        break Some("server disconnected the namespace".to_string());
                    }
                    Ok(Some(Packet::ConnectError(message))) => {
                        break Some(message);
                    }
                    Ok(Some(other)) => {
                        tracing::debug!("Ignoring channel packet {:?}", other);
                    }
                    Ok(None) => {
                        break Some("connection closed by server".to_string());
                    }
                    Err(e) => {
                        break Some(format!("{:#}", e));
                    }
                }
            }
            Some(event) = outbound.recv() => {
                let (name, payload) = events::encode(&event, &ticket_id, &user_id);
                if let Err(e) = socket.emit(name, &payload).await {
                    break Some(format!("{:#}", e));
                }
            }
            _ = &mut shutdown => {
                break None;
            }
        }
    };

    match closed_by_remote {
        Some(reason) => {
            tracing::warn!("Channel for {} closed: {}", ticket_id, reason);
            let _ = updates.send(ChannelUpdate::Closed(reason));
            drop(updates);
        }
        None => {
            // Detach inbound delivery first so nothing arrives after teardown.
            drop(updates);
            // Flush events queued just before close (e.g. typing=false).
            while let Ok(event) = outbound.try_recv() {
                let (name, payload) = events::encode(&event, &ticket_id, &user_id);
                if socket.emit(name, &payload).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Err(e) = socket.close().await {
        tracing::debug!("Channel close: {:#}", e);
    }
    tracing::info!("Channel for {} torn down", ticket_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

    fn session() -> Session {
        Session::new("secret-token".into(), "u1".into(), "Alex".into(), None)
    }

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    }

    async fn send(ws: &mut WebSocketStream<TcpStream>, text: &str) {
        ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    /// Accept one client and complete the Socket.IO handshake.
    async fn accept_handshaken(listener: &TcpListener) -> (WebSocketStream<TcpStream>, String) {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        send(
            &mut ws,
            r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#,
        )
        .await;
        let connect = next_text(&mut ws).await.unwrap();
        (ws, connect)
    }

    #[tokio::test]
    async fn test_attach_stream_and_teardown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut ws, connect) = accept_handshaken(&listener).await;
            assert!(connect.starts_with("40"));
            assert!(connect.contains(r#""token":"secret-token""#));
            assert!(connect.contains(r#""userId":"u1""#));
            send(&mut ws, r#"40{"sid":"n1"}"#).await;

            let join = next_text(&mut ws).await.unwrap();
            assert!(join.starts_with(r#"42["joinTicket""#), "got {}", join);
            assert!(join.contains(r#""ticketId":"T-1""#));

            send(&mut ws, "2").await;
            send(
                &mut ws,
                r#"42["newMessage",{"_id":"m1","ticketId":"T-1","sender":{"_id":"u2","name":"Sam"},"text":"hi","createdAt":"2024-05-01T09:00:00Z"}]"#,
            )
            .await;
            send(&mut ws, r#"42["userTyping",{"userId":"u2","isTyping":true}]"#).await;

            let mut seen = Vec::new();
            while let Some(frame) = next_text(&mut ws).await {
                seen.push(frame);
            }
            seen
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = Channel::attach(&format!("http://{}", addr), &session(), "T-1", tx)
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        match first {
            Some(ChannelUpdate::Event(Inbound::NewMessage(env))) => {
                assert_eq!(env.message.id, "m1");
                assert_eq!(env.message.author.display_name, "Sam");
            }
            other => panic!("expected newMessage, got {:?}", other),
        }
        let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert!(matches!(
            second,
            Some(ChannelUpdate::Event(Inbound::Typing { ref user_id, is_typing: true })) if user_id == "u2"
        ));

        channel.emit(Outbound::Delivered {
            message_id: "m1".into(),
        });
        channel.close().await;

        // Inbound delivery is detached after teardown.
        assert!(rx.recv().await.is_none());

        let frames = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(frames.iter().any(|f| f == "3"), "pong expected: {:?}", frames);
        assert!(
            frames.iter().any(|f| f.starts_with(r#"42["messageReceived""#)
                && f.contains(r#""messageId":"m1""#)
                && f.contains(r#""userId":"u1""#)),
            "delivery ack expected: {:?}",
            frames
        );
        assert!(frames.iter().any(|f| f == "41"));
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut ws, _connect) = accept_handshaken(&listener).await;
            send(&mut ws, r#"44{"message":"Authentication error"}"#).await;
            let _ = next_text(&mut ws).await;
        });

        let (tx, _rx) = mpsc::unbounded_channel();
        let err = Channel::attach(&format!("http://{}", addr), &session(), "T-1", tx)
            .await
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("Authentication error"));
    }

    #[tokio::test]
    async fn test_server_close_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut ws, _connect) = accept_handshaken(&listener).await;
            send(&mut ws, r#"40{"sid":"n1"}"#).await;
            let _join = next_text(&mut ws).await;
            send(&mut ws, "41").await;
            let _ = next_text(&mut ws).await;
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = Channel::attach(&format!("http://{}", addr), &session(), "T-1", tx)
            .await
            .unwrap();

        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert!(matches!(update, Some(ChannelUpdate::Closed(_))));
        channel.close().await;
    }
}
