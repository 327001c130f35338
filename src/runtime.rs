//! Async runtime for one open conversation.
//!
//! Executes the [`Action`]s produced by [`Conversation`] and turns REST
//! completions, channel updates and the typing deadline back into
//! [`Event`]s. REST calls run in a `JoinSet` owned by the runtime so that
//! closing the conversation aborts whatever is still in flight.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::api::{self, TicketClient};
use crate::channel::{Channel, ChannelUpdate};
use crate::chat::{Action, Conversation, Event, Notice, NoticeLevel};
use crate::config::Config;

pub struct ConversationRuntime {
    conversation: Conversation,
    client: Arc<TicketClient>,
    channel: Option<Channel>,
    updates: mpsc::UnboundedReceiver<ChannelUpdate>,
    updates_open: bool,
    tasks: JoinSet<Event>,
    notices: Vec<Notice>,
    compose_cleared: bool,
}

impl ConversationRuntime {
    /// Open `ticket_id`: request the first history page, then attach the
    /// realtime channel (best effort, bounded by the connect timeout).
    pub async fn open(config: &Config, ticket_id: &str) -> Result<Self> {
        let client = TicketClient::new(config)?;
        let session = client.session().clone();

        let conversation = Conversation::new(
            ticket_id,
            session.author(),
            config.page_size,
            config.typing_timeout(),
        );

        let (tx, updates) = mpsc::unbounded_channel();
        let mut runtime = Self {
            conversation,
            client: Arc::new(client),
            channel: None,
            updates,
            updates_open: true,
            tasks: JoinSet::new(),
            notices: Vec::new(),
            compose_cleared: false,
        };

        let actions = runtime.conversation.open();
        runtime.execute(actions);

        let attach = Channel::attach(&config.socket_url, &session, ticket_id, tx);
        match tokio::time::timeout(config.connect_timeout(), attach).await {
            Ok(Ok(channel)) => {
                runtime.conversation.mark_live();
                runtime.channel = Some(channel);
            }
            Ok(Err(e)) => {
                tracing::warn!("Realtime channel unavailable, continuing without it: {:#}", e);
            }
            Err(_) => {
                tracing::warn!(
                    "Realtime channel did not connect within {}s, continuing without it",
                    config.connect_timeout_secs
                );
            }
        }

        Ok(runtime)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Feed one event to the conversation and run the resulting actions.
    pub fn dispatch(&mut self, event: Event) {
        let actions = self.conversation.handle(event, Instant::now());
        self.execute(actions);
    }

    /// Wait for the next event from the channel, a finished REST call or
    /// the typing deadline. Pends forever when nothing is outstanding.
    pub async fn next_event(&mut self) -> Event {
        loop {
            let deadline = self.conversation.typing_deadline();
            let wake_at = tokio::time::Instant::from_std(deadline.unwrap_or_else(Instant::now));

            tokio::select! {
                update = self.updates.recv(), if self.updates_open => match update {
                    Some(ChannelUpdate::Event(inbound)) => return Event::Channel(inbound),
                    Some(ChannelUpdate::Closed(reason)) => return Event::ChannelClosed { reason },
                    None => self.updates_open = false,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(event) => return event,
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => tracing::error!("REST task failed: {}", e),
                },
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => return Event::Tick,
                else => std::future::pending::<()>().await,
            }
        }
    }

    /// Whether the compose buffer should be cleared (consumes the flag).
    pub fn take_compose_cleared(&mut self) -> bool {
        std::mem::take(&mut self.compose_cleared)
    }

    /// Notices recorded since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Tear the conversation down: abort REST calls, send a final
    /// `typing=false` if owed, and close the channel.
    pub async fn close(mut self) {
        self.tasks.abort_all();
        let actions = self.conversation.close();
        self.execute(actions);

        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        while self.tasks.join_next().await.is_some() {}
        tracing::info!("Conversation {} closed", self.conversation.ticket_id());
    }

    fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::FetchPage(request) => {
                    let client = Arc::clone(&self.client);
                    self.tasks.spawn(async move {
                        let result = api::fetch_page(&client, &request).await;
                        Event::HistoryLoaded { request, result }
                    });
                }
                Action::CreateMessage(send) => {
                    let client = Arc::clone(&self.client);
                    self.tasks.spawn(async move {
                        let result = api::create_message(&client, &send.ticket_id, &send.text).await;
                        Event::SendFinished {
                            temp_id: send.temp_id,
                            result,
                        }
                    });
                }
                Action::Emit(event) => match &self.channel {
                    Some(channel) => channel.emit(event),
                    None => tracing::debug!("No channel, dropping {:?}", event),
                },
                Action::ClearCompose => self.compose_cleared = true,
                Action::Notify(notice) => {
                    match notice.level {
                        NoticeLevel::Error => tracing::warn!("{}", notice.text),
                        NoticeLevel::Info => tracing::info!("{}", notice.text),
                    }
                    self.notices.push(notice);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP responder: answers every request with `body`.
    async fn serve_json(listener: TcpListener, body: &'static str) {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    match stream.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    }

    /// An address nothing listens on.
    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn config(api_url: String, socket_url: String) -> Config {
        Config {
            api_url,
            socket_url,
            session: Some(Session::new(
                "opaque-token".into(),
                "u1".into(),
                "Alex".into(),
                None,
            )),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_open_without_channel_loads_history() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}/api", listener.local_addr().unwrap());
        tokio::spawn(serve_json(
            listener,
            r#"{"success":true,"messages":[
                {"_id":"m2","ticketId":"T-1","sender":"u2","text":"second","createdAt":"2024-05-01T09:01:00Z"},
                {"_id":"m1","ticketId":"T-1","sender":{"_id":"u2","name":"Sam"},"text":"first","createdAt":"2024-05-01T09:00:00Z"}
            ]}"#,
        ));

        let mut runtime = ConversationRuntime::open(&config(api_url, closed_port().await), "T-1")
            .await
            .unwrap();
        assert!(!runtime.conversation().is_live());

        let event = tokio::time::timeout(Duration::from_secs(5), runtime.next_event())
            .await
            .unwrap();
        assert!(matches!(event, Event::HistoryLoaded { .. }));
        runtime.dispatch(event);

        let ids: Vec<&str> = runtime
            .conversation()
            .messages()
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert!(!runtime.conversation().has_more_history());
        assert!(runtime.take_notices().is_empty());

        runtime.close().await;
    }

    #[tokio::test]
    async fn test_silent_channel_falls_back_to_rest() {
        let api = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}/api", api.local_addr().unwrap());
        tokio::spawn(serve_json(
            api,
            r#"{"success":true,"messages":[{"_id":"m1","ticketId":"T-1","sender":"u2","text":"hi","createdAt":"2024-05-01T09:00:00Z"}]}"#,
        ));

        // Completes the WebSocket upgrade, then never sends the open packet.
        let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let socket_url = format!("http://{}", socket.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((tcp, _)) = socket.accept().await {
                if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
                    held.push(ws);
                }
            }
        });

        let mut config = config(api_url, socket_url);
        config.connect_timeout_secs = 1;

        let mut runtime = tokio::time::timeout(
            Duration::from_secs(5),
            ConversationRuntime::open(&config, "T-1"),
        )
        .await
        .expect("open must not wait on a silent channel")
        .unwrap();
        assert!(!runtime.conversation().is_live());

        let event = tokio::time::timeout(Duration::from_secs(5), runtime.next_event())
            .await
            .unwrap();
        assert!(matches!(event, Event::HistoryLoaded { .. }));
        runtime.dispatch(event);
        assert_eq!(runtime.conversation().message_count(), 1);

        runtime.close().await;
    }

    #[tokio::test]
    async fn test_submit_clears_compose_and_confirms() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}/api", listener.local_addr().unwrap());
        // The same body serves both the page fetch (no `messages` array means
        // an empty page) and the create call.
        tokio::spawn(serve_json(
            listener,
            r#"{"success":true,"message":{"_id":"real-1","ticketId":"T-1","sender":"u1","text":"hello","createdAt":"2024-05-01T09:00:00Z"}}"#,
        ));

        let mut runtime = ConversationRuntime::open(&config(api_url, closed_port().await), "T-1")
            .await
            .unwrap();
        let loaded = tokio::time::timeout(Duration::from_secs(5), runtime.next_event())
            .await
            .unwrap();
        runtime.dispatch(loaded);
        assert_eq!(runtime.conversation().message_count(), 0);

        runtime.dispatch(Event::Submit {
            text: "hello".into(),
        });
        assert!(runtime.take_compose_cleared());
        assert!(!runtime.take_compose_cleared());
        assert!(runtime.conversation().is_sending());
        assert!(runtime.conversation().messages()[0].is_temporary());

        let finished = tokio::time::timeout(Duration::from_secs(5), runtime.next_event())
            .await
            .unwrap();
        assert!(matches!(finished, Event::SendFinished { .. }));
        runtime.dispatch(finished);

        let messages = runtime.conversation().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "real-1");
        assert!(!runtime.conversation().is_sending());

        runtime.close().await;
    }

    #[tokio::test]
    async fn test_close_aborts_pending_requests() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}/api", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let runtime = ConversationRuntime::open(&config(api_url, closed_port().await), "T-1")
            .await
            .unwrap();
        assert!(runtime.conversation().is_loading_history());

        tokio::time::timeout(Duration::from_secs(5), runtime.close())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_open_requires_session() {
        let config = Config::default();
        let err = ConversationRuntime::open(&config, "T-1").await.err().unwrap();
        assert!(err.to_string().contains("not logged in"));
    }
}
