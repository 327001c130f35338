//! Socket.IO WebSocket connection and frame handling

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::codec::{self, Packet};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct ChannelSocket {
    stream: WsStream,
}

/// Build the Engine.IO WebSocket URL from the channel base URL.
pub fn ws_url(base: &str) -> String {
    let base = base
        .trim_end_matches('/')
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}/socket.io/?EIO=4&transport=websocket", base)
}

impl ChannelSocket {
    /// Open the WebSocket. No Socket.IO handshake yet; see [`Self::handshake`].
    pub async fn connect(base_url: &str) -> Result<Self> {
        let url = ws_url(base_url);
        tracing::info!("Connecting channel to {}", url);

        let (stream, response) = connect_async(&url)
            .await
            .context("WebSocket connection failed")?;

        tracing::info!("WebSocket connected (status={})", response.status());

        Ok(Self { stream })
    }

    /// Wait for the Engine.IO open packet, then connect the default
    /// namespace with `auth` and wait for the server to accept it.
    pub async fn handshake(&mut self, auth: &Value) -> Result<()> {
        match self.recv_packet().await? {
            Some(Packet::Open(info)) => {
                tracing::debug!("Engine.IO open: {}", info);
            }
            Some(other) => bail!("Expected Engine.IO open packet, got {:?}", other),
            None => bail!("Connection closed before handshake"),
        }

        self.send_text(&codec::encode_connect(auth)).await?;

        loop {
            match self.recv_packet().await? {
                Some(Packet::Connect(_)) => {
                    tracing::info!("Channel namespace connected");
                    return Ok(());
                }
                Some(Packet::ConnectError(message)) => {
                    bail!("Channel rejected connection: {}", message)
                }
                Some(other) => {
                    tracing::debug!("Ignoring {:?} during handshake", other);
                }
                None => bail!("Connection closed during handshake"),
            }
        }
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, msg: &str) -> Result<()> {
        tracing::debug!("WS send: {}", msg);
        self.stream
            .send(Message::Text(msg.to_string()))
            .await
            .context("Failed to send WebSocket message")
    }

    /// Emit a Socket.IO event.
    pub async fn emit(&mut self, name: &str, payload: &Value) -> Result<()> {
        self.send_text(&codec::encode_event(name, payload)).await
    }

    /// Receive the next packet that needs the caller's attention.
    ///
    /// Engine.IO pings are answered here and WebSocket pings get pongs.
    /// Returns `None` when the connection is closed.
    pub async fn recv_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("WS recv: {}", text);

                    match codec::parse(&text) {
                        Packet::Ping => {
                            self.send_text(codec::PONG).await?;
                        }
                        Packet::Pong | Packet::Noop => {}
                        Packet::Close => return Ok(None),
                        packet => return Ok(Some(packet)),
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(e).context("WebSocket receive error");
                }
                None => {
                    return Ok(None);
                }
            }
        }
    }

    /// Leave the namespace and close the WebSocket.
    pub async fn close(&mut self) -> Result<()> {
        // Best effort: the server may already be gone.
        let _ = self.send_text(codec::DISCONNECT).await;
        self.stream
            .close(None)
            .await
            .context("Failed to close WebSocket")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_scheme_mapping() {
        assert_eq!(
            ws_url("https://school.example/"),
            "wss://school.example/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            ws_url("http://localhost:5000"),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
    }
}
