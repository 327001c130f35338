//! Headless conversation: print history and live events until Ctrl-C.

use std::collections::HashSet;

use anyhow::Result;

use crate::chat::{Conversation, Event};
use crate::config::Config;
use crate::models::Message;
use crate::runtime::ConversationRuntime;

pub async fn watch(config: &Config, ticket_id: &str) -> Result<()> {
    let mut runtime = ConversationRuntime::open(config, ticket_id).await?;
    let mut printed = HashSet::new();
    let mut typing = Vec::new();

    if runtime.conversation().is_live() {
        println!("Watching ticket {}... (Ctrl-C to stop)", ticket_id);
    } else {
        println!(
            "Watching ticket {} without realtime updates... (Ctrl-C to stop)",
            ticket_id
        );
    }

    loop {
        tokio::select! {
            event = runtime.next_event() => runtime.dispatch(event),
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }

        let fresh = print_new_messages(runtime.conversation(), &mut printed);
        if !fresh.is_empty() {
            // Printed counts as seen.
            runtime.dispatch(Event::Visible { ids: fresh });
        }

        let now_typing = runtime.conversation().typing_names();
        if now_typing != typing {
            if !now_typing.is_empty() {
                println!("-- {} typing", now_typing.join(", "));
            }
            typing = now_typing;
        }

        for notice in runtime.take_notices() {
            eprintln!("{}", notice.text);
        }
    }

    runtime.close().await;
    Ok(())
}

/// Print confirmed messages not printed before, oldest first. Returns
/// their ids.
fn print_new_messages(conversation: &Conversation, printed: &mut HashSet<String>) -> Vec<String> {
    let mut fresh = Vec::new();
    for message in conversation.messages() {
        if message.is_temporary() || printed.contains(&message.id) {
            continue;
        }
        println!("{}", format_line(message));
        printed.insert(message.id.clone());
        fresh.push(message.id.clone());
    }
    fresh
}

fn format_line(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.author.display_name,
        message.body.preview()
    )
}
