//! `vacance` : terminal client for the VacanceAI travel assistant.

mod actions;
mod session;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vacance_models::{ConversationId, Role};
use vacance_sdk::store::CONVERSATION_KEY;
use vacance_sdk::{resolve_conversation_id, ChatConfig, ConversationStore, ConversationsApi, FileStore};

#[derive(Parser, Debug)]
#[command(name = "vacance")]
#[command(author, version, about = "Chat with the VacanceAI travel assistant", long_about = None)]
pub struct Cli {
    /// Backend base URL (ex: https://api.vacance.ai). Falls back to $VACANCE_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Bearer token for the REST endpoints
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open an interactive chat session
    Chat {
        /// Conversation to join instead of the stored one
        #[arg(long)]
        conversation: Option<ConversationId>,

        /// Start a fresh conversation and remember it
        #[arg(long, conflicts_with = "conversation")]
        new: bool,
    },
    /// Create a conversation on the server and remember it
    New,
    /// Print the stored history of a conversation
    History {
        #[arg(long)]
        conversation: Option<ConversationId>,
    },
    /// Clear the stored history of a conversation
    Clear {
        #[arg(long)]
        conversation: Option<ConversationId>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ChatConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    let store = FileStore::in_config_dir()?;
    let mut api = ConversationsApi::new(config.api_url.clone());
    if let Some(token) = cli.token {
        api = api.with_token(token);
    }

    match cli.command {
        Commands::Chat { conversation, new } => {
            let id = match conversation {
                Some(id) => id,
                None if new => {
                    let id = ConversationId::from(Uuid::new_v4().to_string());
                    store.set(CONVERSATION_KEY, id.as_str())?;
                    id
                }
                None => resolve_conversation_id(&store)?,
            };
            if !session::run(config, id).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::New => {
            let id = api.create().await?;
            store.set(CONVERSATION_KEY, id.as_str())?;
            println!("{id}");
        }
        Commands::History { conversation } => {
            let id = match conversation {
                Some(id) => id,
                None => resolve_conversation_id(&store)?,
            };
            let history = api.history(&id).await?;
            if history.messages.is_empty() {
                println!("(no messages in {id})");
            }
            for message in &history.messages {
                let who = match message.role {
                    Role::User => "you",
                    Role::Assistant => "assistant",
                };
                println!("{who}> {}", message.content);
                for action in message.actions() {
                    println!("  {}", actions::describe(action));
                }
            }
        }
        Commands::Clear { conversation } => {
            let id = match conversation {
                Some(id) => id,
                None => resolve_conversation_id(&store)?,
            };
            api.clear(&id).await?;
            println!("cleared {id}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
