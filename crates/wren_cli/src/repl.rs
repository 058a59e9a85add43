//! Interactive loop for a joined session.

use std::path::Path;

use anyhow::Result;
use session_store::{export_transcript, transcript_root, write_transcript, TranscriptError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use wren_sync::SessionSync;

use crate::commands::{parse_input, ClientCommand, Input, HELP_TEXT};
use crate::render::ViewPrinter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run until `/quit`, end of input or the store is dropped, then leave.
pub async fn run(sync: SessionSync) -> Result<()> {
    let mut printer = ViewPrinter::new();
    let mut view = sync.view();
    let mut notices = sync.notices();

    print_lines(printer.render(&view.borrow_and_update()));
    println!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                print_lines(printer.render(&view.borrow_and_update()));
            }
            changed = notices.changed() => {
                if changed.is_err() {
                    break;
                }
                print_lines(printer.render_notices(&notices.borrow_and_update()));
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if handle_line(&sync, &line).await == Flow::Quit {
                    break;
                }
            }
        }
    }

    sync.leave().await;
    Ok(())
}

/// Act on one input line. Failures are printed; only `/quit` ends the loop.
pub async fn handle_line(sync: &SessionSync, line: &str) -> Flow {
    match parse_input(line) {
        Input::Empty => {}
        Input::Question(question) => match sync.ask(&question) {
            Ok(handle) => debug!(request_id = handle.request_id(), "question sent"),
            Err(error) => println!("error: {error}"),
        },
        Input::Session(command) => match sync.submit(&command).await {
            Ok(outcome) => {
                if let Some(summary) = outcome.summary() {
                    println!("{summary}");
                }
            }
            Err(error) => println!("error: {error}"),
        },
        Input::Client(command) => return handle_client_command(sync, command).await,
    }
    Flow::Continue
}

async fn handle_client_command(sync: &SessionSync, command: ClientCommand) -> Flow {
    match command {
        ClientCommand::Help => println!("{HELP_TEXT}"),
        ClientCommand::Refresh => match sync.refresh().await {
            Ok(()) => println!("session refreshed"),
            Err(error) => println!("error: {error}"),
        },
        ClientCommand::Save(path) => match save_transcript(sync, path.as_deref()) {
            Ok(path) => println!("transcript saved to {}", path.display()),
            Err(error) => println!("error: {error}"),
        },
        ClientCommand::Cancel => {
            let cancelled = sync.cancel_answers();
            println!("cancelled {cancelled} answer(s)");
        }
        ClientCommand::Quit => return Flow::Quit,
        ClientCommand::Unknown(command) => {
            println!("unknown command {command}; type /help for commands");
        }
    }
    Flow::Continue
}

/// Write the current log to `path`, or into the transcript directory.
pub fn save_transcript(
    sync: &SessionSync,
    path: Option<&Path>,
) -> Result<std::path::PathBuf, TranscriptError> {
    let logs = sync.store().read(|view| view.logs().to_vec());
    match path {
        Some(path) => {
            write_transcript(path, sync.session_id(), &logs)?;
            Ok(path.to_path_buf())
        }
        None => {
            let root = transcript_root().ok_or(TranscriptError::NoTranscriptRoot)?;
            export_transcript(&root, sync.session_id(), &logs)
        }
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}
