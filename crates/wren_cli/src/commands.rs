use std::path::PathBuf;

/// Commands the backend interprets; the whole line is forwarded.
pub const SESSION_COMMANDS: [&str; 8] = [
    "/scene", "/roll", "/summon", "/echo", "/mark", "/meta", "/recall", "/pulse",
];

pub const HELP_TEXT: &str = "\
Session commands (sent to the table):
  /scene <text>    set the scene
  /roll <dice>     roll dice, e.g. /roll 6d6
  /summon <what>   summon an entity
  /echo <text>     say something in character
  /mark <note>     mark a moment
  /meta <note>     out-of-character note
  /recall <topic>  ask the GM about earlier events
  /pulse           status pulse
Client commands:
  /help            show this help
  /refresh         refetch the session snapshot
  /save [path]     export the log as a JSONL transcript
  /cancel          cancel streaming answers
  /quit            leave the session
Anything else is asked as a question.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Help,
    Refresh,
    Save(Option<PathBuf>),
    Cancel,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Question(String),
    Session(String),
    Client(ClientCommand),
}

pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if !trimmed.starts_with('/') {
        return Input::Question(trimmed.to_string());
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };
    let command = command.to_ascii_lowercase();

    if SESSION_COMMANDS.contains(&command.as_str()) {
        return Input::Session(trimmed.to_string());
    }

    let parsed = match command.as_str() {
        "/help" => ClientCommand::Help,
        "/refresh" => ClientCommand::Refresh,
        "/save" => ClientCommand::Save((!rest.is_empty()).then(|| PathBuf::from(rest))),
        "/cancel" => ClientCommand::Cancel,
        "/quit" | "/exit" => ClientCommand::Quit,
        _ => ClientCommand::Unknown(command),
    };

    Input::Client(parsed)
}
