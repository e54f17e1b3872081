//! Prints the controller's live [`MissionEvent`] feed to the terminal.
//!
//! Subscribes to [`MissionStore::subscribe`](vantage_mission::MissionStore::subscribe)
//! and renders each event on its own colored line, in the spirit of the
//! teacher CLI's old tool-call hook but driven off the mission event bus
//! rather than a per-agent hook trait (this crate no longer has one — every
//! tool call already funnels through `ToolRegistry::call`, which is where
//! these events originate).

use tokio::sync::broadcast;
use vantage_mission::MissionEvent;

/// Spawns a background task that prints every event from `receiver` until
/// the channel closes. Returns the task handle so the caller can abort it
/// on shutdown if it chooses to.
pub fn spawn_printer(mut receiver: broadcast::Receiver<MissionEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    println!("\x1b[90m[events] missed {skipped} event(s)\x1b[0m");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &MissionEvent) {
    match event {
        MissionEvent::ModelCall(details) => {
            println!(
                "\x1b[90m[model] {} via {} ({} prompt + {} completion tokens, ${:.4}, {:.2}s)\x1b[0m",
                details.agent_name, details.model, details.prompt_tokens, details.completion_tokens, details.cost_usd, details.duration_sec
            );
        }
        MissionEvent::ToolCall { agent_name, tool_name, result, .. } => match result {
            Ok(_) => println!("\x1b[36m[tool]\x1b[0m {agent_name} called {tool_name}"),
            Err(err) => println!("\x1b[31m[tool failed]\x1b[0m {agent_name} called {tool_name}: {err}"),
        },
        MissionEvent::NoteGenerated { note, .. } => {
            println!("\x1b[32m[note]\x1b[0m {} ({})", note.note_id, note.source_id);
        }
        MissionEvent::NoteUpdatedFromFullContent { note_id, .. } => {
            println!("\x1b[32m[note updated]\x1b[0m {note_id}");
        }
        MissionEvent::AgentStatus { status, .. } => {
            println!("\x1b[35m[status]\x1b[0m {status:?}");
        }
        MissionEvent::ExecutionLog { entry, .. } => {
            println!("\x1b[90m[log] {}: {}\x1b[0m", entry.agent_name, entry.action);
        }
    }
}
