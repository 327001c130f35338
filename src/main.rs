//! ticket-chat - terminal client for support ticket conversations
//!
//! Real-time chat between a ticket's requester and staff, over the ticket
//! service's REST API and Socket.IO channel.

mod api;
mod auth;
mod channel;
mod chat;
mod config;
mod models;
mod runtime;
mod tui;
mod watch;

use std::fs::{self, File};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;

#[derive(Parser)]
#[command(name = "ticket-chat")]
#[command(about = "Terminal client for support ticket conversations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// REST base URL for this invocation
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Realtime channel URL for this invocation
    #[arg(long, global = true)]
    socket_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session token issued by the ticket service
    Login {
        /// Bearer token
        #[arg(long)]
        token: String,

        /// Id of the user the token belongs to
        #[arg(long)]
        user_id: String,

        /// Display name shown on your messages
        #[arg(long)]
        name: String,

        /// Avatar URL
        #[arg(long)]
        avatar: Option<String>,
    },

    /// Clear the stored session
    Logout,

    /// Show session and endpoint information
    Status,

    /// Print one page of a ticket's messages
    History {
        /// Ticket ID
        ticket_id: String,

        /// Page number (1 = newest)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Messages per page (defaults to the configured page size)
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Send a message to a ticket
    Send {
        /// Ticket ID
        ticket_id: String,

        /// Message text
        text: String,
    },

    /// Print a ticket's conversation as it happens
    Watch {
        /// Ticket ID
        ticket_id: String,
    },

    /// Open a ticket conversation in the terminal user interface
    Tui {
        /// Ticket ID
        ticket_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        || tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if matches!(cli.command, Commands::Tui { .. }) {
        // Log lines would corrupt the alternate screen.
        let dir = Config::data_dir()?;
        fs::create_dir_all(&dir).context("Failed to create data directory")?;
        let log_file = File::create(dir.join("tui.log")).context("Failed to create TUI log")?;
        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(log_file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    let mut stored = Config::load()?;
    let config = stored
        .clone()
        .with_overrides(cli.api_url, cli.socket_url);

    match cli.command {
        Commands::Login {
            token,
            user_id,
            name,
            avatar,
        } => {
            auth::login(&mut stored, token, user_id, name, avatar)?;
        }
        Commands::Logout => {
            auth::logout(&mut stored)?;
        }
        Commands::Status => {
            auth::status(&config)?;
        }
        Commands::History {
            ticket_id,
            page,
            limit,
        } => {
            let limit = limit.unwrap_or(config.page_size);
            api::print_history(&config, &ticket_id, page, limit).await?;
        }
        Commands::Send { ticket_id, text } => {
            tracing::info!("Sending message...");
            api::send_message(&config, &ticket_id, &text).await?;
        }
        Commands::Watch { ticket_id } => {
            watch::watch(&config, &ticket_id).await?;
        }
        Commands::Tui { ticket_id } => {
            tui::run(&config, &ticket_id).await?;
        }
    }

    Ok(())
}
