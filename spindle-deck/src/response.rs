//! Protocol responses
//!
//! Responses are single lines on standard output; logs go to stderr so
//! the protocol channel stays clean. Failures come in two flavours
//! picked by blame: `WHAT` when the user got it wrong, `FAIL` when the
//! environment did.

use spindle_common::{Blame, Error};

/// A line of the control protocol, daemon to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Greeting, emitted once on startup
    Ohai,
    /// Acknowledgement carrying the matched command word
    Okay(&'static str),
    /// The user's command was at fault
    What(String),
    /// The environment was at fault
    Fail(String),
    /// Farewell, emitted once on reaching the terminal state
    Ttfn,
}

impl Response {
    /// Map a failed operation into its response line
    pub fn failure(err: &Error) -> Response {
        match err.blame() {
            Blame::User => Response::What(err.to_string()),
            // Programmer-blamed failures abort before reaching here; if
            // one slips through, reporting beats swallowing.
            Blame::Environment | Blame::Programmer => Response::Fail(err.to_string()),
        }
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Ohai => write!(
                f,
                "OHAI {} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            Response::Okay(word) => write!(f, "OKAY {word}"),
            Response::What(reason) => write!(f, "WHAT {reason}"),
            Response::Fail(reason) => write!(f, "FAIL {reason}"),
            Response::Ttfn => write!(f, "TTFN"),
        }
    }
}
