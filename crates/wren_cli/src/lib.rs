//! Line-oriented terminal client for Wren sessions.
//!
//! The `wren` binary asks one-shot questions, creates and joins sessions and
//! inspects exported transcripts. Inside a joined session every stdin line is
//! either a question, a command forwarded to the table, or a client command
//! (see [`commands::HELP_TEXT`]).

pub mod commands;
pub mod render;
pub mod repl;
