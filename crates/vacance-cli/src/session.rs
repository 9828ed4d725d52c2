//! Interactive chat loop.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;
use vacance_models::{ConversationId, Role, UiAction};
use vacance_sdk::{
    ChannelSnapshot, ChatChannel, ChatConfig, ConnectionState, TracingTelemetry, WsConnector,
};

use crate::actions;

const QUIT: &str = "/quit";

/// Run a chat session until `/quit`, end of input, or retry exhaustion.
///
/// Returns `false` when the channel gave up reconnecting.
pub async fn run(config: ChatConfig, id: ConversationId) -> anyhow::Result<bool> {
    let max_retries = config.retry.max_retries;
    let mut channel =
        ChatChannel::new(WsConnector, config).with_telemetry(Arc::new(TracingTelemetry));

    // Actions are printed from this loop so they always follow their message.
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<UiAction>();
    channel.set_action_handler(move |action| {
        let _ = action_tx.send(action.clone());
    });

    let mut updates = channel.subscribe();
    channel.open(id.clone());
    println!("conversation {id} ({QUIT} to leave)");

    let mut view = View::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let healthy = loop {
        tokio::select! {
            biased;

            changed = updates.changed() => {
                if changed.is_err() {
                    break true;
                }
                let snapshot = updates.borrow_and_update().clone();
                view.render(&snapshot, max_retries);
                if snapshot.connection_error() {
                    eprintln!("could not reach the assistant, giving up");
                    break false;
                }
            }
            Some(action) = action_rx.recv() => {
                println!("  {}", actions::describe(&action));
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break true;
                };
                match line.trim() {
                    QUIT => break true,
                    "" => {}
                    _ => channel.send_message(&line, None),
                }
            }
        }
    };

    channel.close();
    Ok(healthy)
}

/// What has already been shown, so each update only prints the difference.
#[derive(Default)]
struct View {
    printed: usize,
    state: ConnectionState,
    typing: bool,
}

impl View {
    fn render(&mut self, snapshot: &ChannelSnapshot, max_retries: u32) {
        if snapshot.state != self.state {
            self.state = snapshot.state;
            match snapshot.state {
                ConnectionState::Connecting if snapshot.retry_count > 0 => {
                    println!("… reconnecting ({}/{max_retries})", snapshot.retry_count);
                }
                ConnectionState::Connecting => println!("… connecting"),
                ConnectionState::Connected => println!("connected"),
                ConnectionState::Disconnected => println!("connection lost"),
                ConnectionState::Idle | ConnectionState::Failed => {}
            }
        }

        for message in snapshot.messages.iter().skip(self.printed) {
            // The user's own lines are already on screen.
            if message.role == Role::Assistant {
                println!("assistant> {}", message.content);
            }
        }
        self.printed = snapshot.messages.len();

        if snapshot.is_typing && !self.typing {
            println!("… assistant is typing");
        }
        self.typing = snapshot.is_typing;
    }
}
