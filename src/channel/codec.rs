//! Engine.IO v4 / Socket.IO packet framing
//!
//! Text frames only. Engine.IO packet types are the first character:
//! 0 open, 1 close, 2 ping, 3 pong, 4 message, 6 noop. A `4` packet carries a
//! Socket.IO packet: 0 connect, 1 disconnect, 2 event, 3 ack, 4 connect error,
//! optionally followed by a `/namespace,` and an ack id before the JSON.

use serde_json::Value;

/// Engine.IO pong, sent in reply to a server ping.
pub const PONG: &str = "3";

/// Socket.IO disconnect from the default namespace.
pub const DISCONNECT: &str = "41";

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake (`sid`, `pingInterval`, ...)
    Open(Value),
    Close,
    Ping,
    Pong,
    Noop,
    /// Socket.IO namespace connected
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        payload: Value,
    },
    ConnectError(String),
    Unknown(String),
}

/// Parse one text frame.
pub fn parse(frame: &str) -> Packet {
    let Some(kind) = frame.chars().next() else {
        return Packet::Unknown(String::new());
    };
    let rest = &frame[kind.len_utf8()..];

    match kind {
        '0' => Packet::Open(serde_json::from_str(rest).unwrap_or(Value::Null)),
        '1' => Packet::Close,
        '2' => Packet::Ping,
        '3' => Packet::Pong,
        '6' => Packet::Noop,
        '4' => parse_socketio(rest).unwrap_or_else(|| Packet::Unknown(frame.to_string())),
        _ => Packet::Unknown(frame.to_string()),
    }
}

fn parse_socketio(body: &str) -> Option<Packet> {
    let kind = body.chars().next()?;
    let mut rest = &body[kind.len_utf8()..];

    // Namespace other than "/" is written as "/name," before the data.
    if rest.starts_with('/') {
        let comma = rest.find(',')?;
        rest = &rest[comma + 1..];
    }
    // Ack id
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    rest = &rest[digits..];

    let data: Option<Value> = if rest.is_empty() {
        None
    } else {
        serde_json::from_str(rest).ok()
    };

    match kind {
        '0' => Some(Packet::Connect(data)),
        '1' => Some(Packet::Disconnect),
        '2' => {
            let mut items = match data? {
                Value::Array(items) => items.into_iter(),
                _ => return None,
            };
            let name = items.next()?.as_str()?.to_string();
            let payload = items.next().unwrap_or(Value::Null);
            Some(Packet::Event { name, payload })
        }
        '4' => {
            let message = match data {
                Some(Value::Object(map)) => map
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("connection refused")
                    .to_string(),
                Some(Value::String(s)) => s,
                _ => "connection refused".to_string(),
            };
            Some(Packet::ConnectError(message))
        }
        _ => None,
    }
}

/// Socket.IO connect packet for the default namespace with an auth payload.
pub fn encode_connect(auth: &Value) -> String {
    format!("40{}", auth)
}

/// Socket.IO event packet for the default namespace.
pub fn encode_event(name: &str, payload: &Value) -> String {
    format!("42{}", serde_json::json!([name, payload]))
}
