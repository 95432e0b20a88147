//! Command parsing and dispatch
//!
//! One command per line: a fixed-width word, then an optional argument.
//! The table pairs each word with a handler tagged by arity, so an
//! argument-count mismatch is caught before any handler runs. Lookup is
//! a first-match scan comparing exactly [`WORD_LEN`] bytes.
//!
//! Nothing here ever panics on malformed input; every protocol failure
//! maps to a recoverable response.

use std::path::Path;

use tracing::debug;

use spindle_common::{Error, Result};

use crate::player::Deck;
use crate::response::Response;

/// Fixed width of a command word
pub const WORD_LEN: usize = 4;

/// A command handler, tagged by arity
///
/// The tag is what validates the argument count; a nullary handler can
/// never be invoked with an argument nor a unary one without.
pub enum Handler {
    Nullary(fn(&Deck) -> Result<()>),
    Unary(fn(&Deck, &str) -> Result<()>),
}

/// One entry of the command table
pub struct Command {
    pub word: &'static str,
    pub handler: Handler,
}

/// The command table: insertion-ordered, first match wins
pub const COMMANDS: &[Command] = &[
    Command {
        word: "play",
        handler: Handler::Nullary(cmd_play),
    },
    Command {
        word: "stop",
        handler: Handler::Nullary(cmd_stop),
    },
    Command {
        word: "ejct",
        handler: Handler::Nullary(cmd_ejct),
    },
    Command {
        word: "quit",
        handler: Handler::Nullary(cmd_quit),
    },
    Command {
        word: "load",
        handler: Handler::Unary(cmd_load),
    },
    Command {
        word: "seek",
        handler: Handler::Unary(cmd_seek),
    },
];

fn cmd_play(deck: &Deck) -> Result<()> {
    deck.play()
}

fn cmd_stop(deck: &Deck) -> Result<()> {
    deck.stop()
}

fn cmd_ejct(deck: &Deck) -> Result<()> {
    deck.eject()
}

fn cmd_quit(deck: &Deck) -> Result<()> {
    deck.shutdown()
}

fn cmd_load(deck: &Deck, arg: &str) -> Result<()> {
    deck.load(Path::new(arg))
}

fn cmd_seek(deck: &Deck, arg: &str) -> Result<()> {
    let seconds: f64 = arg
        .parse()
        .map_err(|_| Error::BadCommand(format!("bad position: {arg}")))?;
    deck.seek(seconds)
}

/// A parsed command line: the word and, if present, its argument
///
/// An absent argument is distinct from an empty one; only whitespace
/// after the word means absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub word: String,
    pub arg: Option<String>,
}

/// Split one line (terminator already stripped) into word and argument
pub fn parse_line(line: &str) -> Result<ParsedLine> {
    if line.len() < WORD_LEN {
        return Err(Error::BadCommand("missing command word".to_string()));
    }
    // A word boundary that splits a multibyte character cannot name any
    // command either.
    let word = line
        .get(..WORD_LEN)
        .ok_or_else(|| Error::BadCommand("no such command".to_string()))?;
    let rest = &line[WORD_LEN..];

    let arg = rest
        .char_indices()
        .find(|&(_, c)| !c.is_whitespace())
        .map(|(start, _)| rest[start..].trim_end().to_string());

    Ok(ParsedLine {
        word: word.to_string(),
        arg,
    })
}

/// Execute a parsed command; returns the matched word on success
fn execute(deck: &Deck, parsed: &ParsedLine) -> Result<&'static str> {
    let command = COMMANDS
        .iter()
        .find(|c| c.word.as_bytes() == parsed.word.as_bytes())
        .ok_or_else(|| Error::BadCommand("no such command".to_string()))?;

    match (&command.handler, &parsed.arg) {
        (Handler::Nullary(handler), None) => handler(deck)?,
        (Handler::Nullary(_), Some(_)) => {
            return Err(Error::BadCommand(format!(
                "{} does not expect an argument",
                command.word
            )))
        }
        (Handler::Unary(handler), Some(arg)) => handler(deck, arg)?,
        (Handler::Unary(_), None) => {
            return Err(Error::BadCommand(format!(
                "{} expects an argument",
                command.word
            )))
        }
    }

    Ok(command.word)
}

/// Handle one line from the control channel
///
/// Parses, dispatches, and maps the outcome into the response to emit.
pub fn handle_line(deck: &Deck, line: &str) -> Response {
    debug!(line, "got command");
    let outcome = parse_line(line).and_then(|parsed| execute(deck, &parsed));
    debug!("command processed");
    match outcome {
        Ok(word) => Response::Okay(word),
        Err(err) => Response::failure(&err),
    }
}
