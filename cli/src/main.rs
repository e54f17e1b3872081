//! `vantage` — a thin REPL over one mission, driving
//! [`MissionController::handle_message`] turn by turn from stdin.
//!
//! The first line of input becomes the mission's opening request; every
//! line after that is a chat turn handled by the Messenger agent (approve
//! questions, refine the goal, ask to start research, or just chat). Typing
//! `:report` prints whatever has been written so far; `:quit` exits.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use vantage_dispatch::{DispatcherConfig, ModelDispatcher, RoleTable};
use vantage_mission::domain::MissionMetadata;
use vantage_mission::{MissionConfig, MissionController, MissionStore};

#[derive(Parser, Debug)]
#[command(name = "vantage", about = "Mission orchestration engine CLI")]
struct Args {
    /// Path to a TOML config file supplying an `[env]` table of defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path; omit to run with a non-durable in-memory store.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Default provider used for any role without an explicit `*_LLM_PROVIDER` override.
    #[arg(long, default_value = "openai")]
    default_provider: String,

    /// Default model used for any role without an explicit `*_LLM_MODEL` override.
    #[arg(long, default_value = "gpt-5-mini")]
    default_model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    vantage_cli::config::load_and_apply(&args.config.clone().unwrap_or_else(vantage_cli::config::default_config_path))?;

    let providers = vantage_cli::provider::from_env();
    if providers.is_empty() {
        anyhow::bail!("no LLM provider credentials found; set OPENAI_API_KEY, DEEPSEEK_API_KEY, or OPENROUTER_API_KEY");
    }

    let role_table = RoleTable::from_env(&args.default_provider, &args.default_model);
    let dispatcher_config = DispatcherConfig {
        max_retries: env_u32("MAX_RETRIES", 3),
        retry_delay: std::time::Duration::from_secs(env_u64("RETRY_DELAY", 1)),
        request_timeout: std::time::Duration::from_secs(env_u64("LLM_REQUEST_TIMEOUT", 120)),
    };
    let dispatcher = Arc::new(ModelDispatcher::new(role_table, providers, dispatcher_config));

    let registry = Arc::new(vantage_cli::tools::build());
    let config = MissionConfig::from_env();

    let store = Arc::new(match &args.db {
        Some(path) => MissionStore::open(path, config.thought_pad_context_limit, 200)?,
        None => MissionStore::in_memory(config.thought_pad_context_limit, 200)?,
    });
    vantage_cli::events::spawn_printer(store.subscribe());

    let controller = Arc::new(MissionController::new(Arc::clone(&store), dispatcher, registry, config));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    print!("research request> ");
    std::io::stdout().flush()?;
    let Some(opening) = stdin.next_line().await? else {
        return Ok(());
    };
    let mission_id = controller.create_mission(opening.trim().to_string(), MissionMetadata::new())?;
    println!("mission {mission_id} created");

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(raw) = stdin.next_line().await? else {
            break;
        };
        let input = raw.trim();
        if input.is_empty() {
            continue;
        }
        if input == ":quit" {
            break;
        }
        if input == ":report" {
            let ctx = store.get(&mission_id)?;
            for (section_id, text) in &ctx.report_sections {
                println!("--- {section_id} ---\n{text}\n");
            }
            continue;
        }

        match controller.handle_message(&mission_id, input).await {
            Ok(outcome) => {
                println!("{}", outcome.response_to_user);
                println!("\x1b[90m[phase: {:?}]\x1b[0m", outcome.phase);
            }
            Err(err) => eprintln!("error: {err}"),
        }
    }

    Ok(())
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
