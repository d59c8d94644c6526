mod config;
mod controller;
mod devices;
mod events;
mod gpio;
mod guard;
mod lcd;
mod link;
mod netwatch;
mod payload;
mod ports;
mod state;
mod topics;

#[cfg(feature = "adc")]
mod adc;
#[cfg(any(feature = "lcd", feature = "adc", test))]
mod i2cscan;
#[cfg(feature = "sim")]
mod sim;

#[cfg(test)]
mod mock;

use anyhow::{bail, Result};
use std::env;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::EnvFilter;

use controller::Controller;

/// Depth of the event queue feeding the controller.
const EVENT_QUEUE: usize = 32;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "node.toml".to_string());
    let cfg = config::load(&config_path)?;

    // ── Logging ─────────────────────────────────────────────────────
    // RUST_LOG wins; otherwise the verbose feature selects the level.
    let default_level = if cfg.features.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        path = %config_path,
        node = %cfg.node_id,
        broker = %cfg.broker_addr(),
        probe = %cfg.probe_addr(),
        tick_ms = cfg.timing.tick_ms,
        "configuration loaded"
    );

    // ── Collaborators ───────────────────────────────────────────────
    let (events_tx, mut events) = mpsc::channel(EVENT_QUEUE);

    let (link, session) = link::new(&cfg);
    tokio::spawn(session.run(events_tx.clone()));
    tokio::spawn(netwatch::run(
        cfg.probe_addr(),
        cfg.timing.probe_interval(),
        cfg.timing.probe_timeout(),
        events_tx,
    ));

    let devices = devices::build(&cfg)?;
    let mut controller = Controller::new(
        &cfg.node_id,
        cfg.features,
        cfg.timing.tag_timeout(),
        devices,
        link,
    )?;
    controller.start();

    // ── Main loop ───────────────────────────────────────────────────
    // Ticks and events are handled one at a time on this task.
    let mut ticker = interval(cfg.timing.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => controller.tick(),
            event = events.recv() => match event {
                Some(event) => controller.handle_event(event),
                None => bail!("event sources stopped"),
            },
        }
    }
}
