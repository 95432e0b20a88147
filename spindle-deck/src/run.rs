//! The cooperative main loop
//!
//! Interleaves two duties at a fixed cadence: take the next command line
//! from the control channel, and advance playback by one step. Neither
//! starves the other; a slow decode only delays the next tick, and an
//! idle channel costs nothing. The loop runs until a state read observes
//! the terminal state.

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use spindle_common::{Error, PlayerState, Result};

use crate::cmd;
use crate::player::Deck;
use crate::response::Response;

/// Drive the deck until it shuts down
///
/// Emits the greeting first and the farewell last. A closed control
/// channel is treated as a quit: the deck is shut down gracefully
/// rather than spinning on end of input.
pub async fn run<R, W>(deck: &Deck, poll_interval: Duration, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut tick = interval(poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    emit(&mut output, &Response::Ohai)?;

    while deck.state() != PlayerState::ShuttingDown {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let response = cmd::handle_line(deck, &line);
                    emit(&mut output, &response)?;
                }
                Ok(None) => {
                    debug!("control channel closed, shutting down");
                    let _ = deck.shutdown();
                }
                Err(e) => {
                    warn!("control channel read failed: {e}");
                    let _ = deck.shutdown();
                }
            },
            _ = tick.tick() => {
                if let Err(err) = deck.update() {
                    emit(&mut output, &Response::failure(&err))?;
                }
            }
        }
    }

    emit(&mut output, &Response::Ttfn)?;
    Ok(())
}

fn emit<W: Write>(output: &mut W, response: &Response) -> Result<()> {
    writeln!(output, "{response}")
        .and_then(|_| output.flush())
        .map_err(|e| Error::Internal(format!("cannot write response: {e}")))
}
