use std::path::PathBuf;

use pretty_assertions::assert_eq;
use wren_cli::commands::{parse_input, ClientCommand, Input, SESSION_COMMANDS};

#[test]
fn plain_text_is_a_question() {
    assert_eq!(
        parse_input("  who guards the gate?  "),
        Input::Question("who guards the gate?".to_string())
    );
    assert_eq!(parse_input("   "), Input::Empty);
}

#[test]
fn table_commands_are_forwarded_whole() {
    assert_eq!(
        parse_input("/roll 6d6 edge"),
        Input::Session("/roll 6d6 edge".to_string())
    );
    assert_eq!(parse_input(" /PULSE "), Input::Session("/PULSE".to_string()));
    for command in SESSION_COMMANDS {
        assert!(matches!(parse_input(command), Input::Session(_)), "{command}");
    }
}

#[test]
fn client_commands_parse_with_arguments() {
    assert_eq!(parse_input("/help"), Input::Client(ClientCommand::Help));
    assert_eq!(parse_input("/refresh"), Input::Client(ClientCommand::Refresh));
    assert_eq!(parse_input("/cancel"), Input::Client(ClientCommand::Cancel));
    assert_eq!(parse_input("/quit"), Input::Client(ClientCommand::Quit));
    assert_eq!(parse_input("/save"), Input::Client(ClientCommand::Save(None)));
    assert_eq!(
        parse_input("/save  run/night.jsonl "),
        Input::Client(ClientCommand::Save(Some(PathBuf::from("run/night.jsonl"))))
    );
}

#[test]
fn unrecognized_slash_command_is_reported() {
    assert_eq!(
        parse_input("/teleport home"),
        Input::Client(ClientCommand::Unknown("/teleport".to_string()))
    );
}
