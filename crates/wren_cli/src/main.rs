use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use session_model::ParticipantRole;
use session_store::read_transcript;
use wren_api::{JoinSessionRequest, WrenApiClient};
use wren_cli::render::format_log;
use wren_cli::repl;
use wren_sync::{init_logging, AnswerOutcome, AnswerUpdate, SessionSync, SyncConfig, TokenAccumulator};

#[derive(Parser)]
#[command(name = "wren", version, about = "Terminal client for Wren sessions")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "WREN_API_URL", global = true)]
    api_url: Option<String>,

    /// User id sent with every request
    #[arg(long, env = "WREN_USER_ID", global = true)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a one-off question and stream the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Create a session
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        theme: Option<String>,
    },
    /// Join a session and follow it interactively
    Join {
        session_id: String,
        #[arg(long, default_value = "player", value_parser = parse_role)]
        role: ParticipantRole,
        #[arg(long)]
        character: Option<String>,
    },
    /// Print an exported transcript
    Transcript { path: PathBuf },
}

fn parse_role(value: &str) -> Result<ParticipantRole, String> {
    ParticipantRole::parse(value)
        .ok_or_else(|| format!("unknown role `{value}` (expected player, gm or observer)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = SyncConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }

    match cli.command {
        Command::Ask { question } => {
            let api = client(&config, cli.user_id.as_deref())?;
            ask(api, &question.join(" ")).await
        }
        Command::Create { name, theme } => {
            let api = client(&config, cli.user_id.as_deref())?;
            let created = api.create_session(&name, theme.as_deref()).await?;
            println!("created session {} ({})", created.session_id, created.name);
            if let Some(message) = created.message {
                println!("{message}");
            }
            Ok(())
        }
        Command::Join {
            session_id,
            role,
            character,
        } => {
            let api = client(&config, cli.user_id.as_deref())?;
            let mut join = JoinSessionRequest::new(api.user_id()).with_role(role);
            if let Some(character) = character {
                join = join.with_character_name(character);
            }
            let transport = Arc::new(api.transport());
            let (sync, joined) =
                SessionSync::join(api, transport, &session_id, &join, config.reconnect.clone())
                    .await
                    .with_context(|| format!("joining session {session_id}"))?;
            let note = if joined.already_member { " (already a member)" } else { "" };
            println!("joined {} as {}{note}", joined.session_id, joined.role.as_str());
            repl::run(sync).await
        }
        Command::Transcript { path } => {
            let transcript = read_transcript(&path)?;
            println!(
                "transcript of {} exported {}",
                transcript.session_id(),
                transcript.header.exported_at
            );
            for entry in &transcript.entries {
                println!("{}", format_log(entry));
            }
            Ok(())
        }
    }
}

fn client(config: &SyncConfig, user_id: Option<&str>) -> Result<WrenApiClient> {
    WrenApiClient::new(config.api_config(user_id))
        .context("set --user-id or WREN_USER_ID to talk to the backend")
}

async fn ask(api: WrenApiClient, question: &str) -> Result<()> {
    let transport = Arc::new(api.transport());
    let accumulator = TokenAccumulator::new(api, transport);
    let handle = accumulator.start(question, |update| {
        if let AnswerUpdate::Token { fragment, .. } = update {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(fragment.as_bytes());
            let _ = stdout.flush();
        }
    })?;

    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel();
            handle.wait().await
        }
    };
    println!();

    match outcome {
        AnswerOutcome::Completed(_) => Ok(()),
        AnswerOutcome::Failed(error) => bail!(error),
        AnswerOutcome::Cancelled => {
            eprintln!("answer cancelled");
            Ok(())
        }
    }
}
