//! Spindle deck daemon - main entry point
//!
//! Startup order matters: logging first, then configuration, then the
//! audio backend and driver selection, then the deck itself (created
//! `Void` and immediately ejected). Logs go to stderr; standard output
//! carries only protocol responses.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spindle_common::DeckEvent;
use spindle_deck::audio::{CpalAudio, DriverId};
use spindle_deck::{run, Config, Deck};

/// Command-line arguments for spindle-deck
#[derive(Parser, Debug)]
#[command(name = "spindle-deck")]
#[command(about = "Playback-control daemon for one audio deck")]
#[command(version)]
struct Args {
    /// Numeric output driver id; omit to list the available devices
    driver: Option<usize>,

    /// Path to TOML configuration file
    #[arg(short, long, env = "SPINDLE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stderr only, stdout is the protocol channel
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spindle_deck=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    let audio = CpalAudio::init().context("Failed to initialise audio backend")?;
    let devices = CpalAudio::devices().context("Failed to enumerate output devices")?;

    let Some(driver) = args.driver else {
        // No driver selected: print what there is, then leave.
        for (id, name) in devices.iter().enumerate() {
            info!("{id}: {name}");
        }
        bail!("no output driver id supplied");
    };
    if driver >= devices.len() {
        bail!(
            "no output device with id {driver} ({} available)",
            devices.len()
        );
    }

    info!(driver, device = %devices[driver], "starting spindle deck daemon");

    let deck = Deck::new(
        Arc::new(audio),
        DriverId(driver),
        config.driver.options.clone(),
        config.event_capacity,
    );
    spawn_event_logger(deck.subscribe());

    deck.eject().context("Failed to initialise player")?;

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = std::io::stdout();
    run::run(&deck, config.poll_interval(), stdin, stdout.lock())
        .await
        .context("Main loop failed")?;

    info!("shutdown complete");
    Ok(())
}

/// Log every deck event; the daemon's own bus subscriber
fn spawn_event_logger(mut rx: broadcast::Receiver<DeckEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(DeckEvent::StateChanged {
                    old_state,
                    new_state,
                    ..
                }) => info!(%old_state, %new_state, "deck state changed"),
                Ok(DeckEvent::TrackLoaded { path, .. }) => info!(%path, "track loaded"),
                Ok(DeckEvent::TrackFinished { .. }) => info!("track finished"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
