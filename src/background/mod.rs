//! Background module - per-record worker loops and their supervisor
//!
//! Structure:
//! - `actors`: the capture and prune loops
//! - `events`: structured cycle log events
//! - `flows`: the orchestrator owning every worker task

pub mod actors;
pub mod events;
pub mod flows;

use chrono::{DateTime, Local};
use tokio::sync::broadcast;

/// Sleep until `instant` unless shutdown arrives first.
/// Returns `false` when the worker should stop.
pub(crate) async fn sleep_until(
    instant: &DateTime<Local>,
    shutdown: &mut broadcast::Receiver<()>,
) -> bool {
    let delay = (*instant - Local::now()).to_std().unwrap_or_default();
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.recv() => false,
    }
}
