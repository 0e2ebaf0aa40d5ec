//! Prune worker - enforces a record's retention window

use crate::background::events::{Action, CycleLog};
use crate::background::sleep_until;
use crate::config::structure::Record;
use crate::operations::retention::{PruneSummary, prune_expired};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::warn;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::{sync::broadcast, task::spawn_blocking};

pub struct PruneWorker {
    record: Arc<Record>,
    log: CycleLog,
}

impl PruneWorker {
    pub fn new(record: Arc<Record>) -> Self {
        let log = CycleLog::new(record.name.as_str(), Action::Prune);
        Self { record, log }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut last_run: Option<DateTime<Local>> = None;
        loop {
            let now = Local::now();
            let Some(next) = self
                .record
                .prune_schedule
                .next_after(&now, last_run.as_ref())
            else {
                warn!(
                    record = self.record.name.as_str(),
                    action = Action::Prune.as_str();
                    "Prune schedule has no future instant, stopping"
                );
                return;
            };

            if !sleep_until(&next, &mut shutdown).await {
                return;
            }
            last_run = Some(next);
            let _ = self.run_cycle(SystemTime::now()).await;
        }
    }

    /// One prune cycle relative to `now`. Failures are logged and returned.
    pub async fn run_cycle(&self, now: SystemTime) -> Result<PruneSummary> {
        let started = self.log.starting();
        let cutoff = now.checked_sub(self.record.retention).unwrap_or(UNIX_EPOCH);
        let record = self.record.clone();

        let result = spawn_blocking(move || prune_expired(&record.templates(), cutoff))
            .await
            .context("prune task panicked")
            .and_then(|result| result);

        match &result {
            Ok(summary) => self.log.success(
                started,
                format_args!(
                    "Deleted {} file(s), removed {} empty dir(s), {} failure(s)",
                    summary.files_deleted, summary.dirs_deleted, summary.failures
                ),
            ),
            Err(err) => self.log.failure(started, err.as_ref()),
        }
        result
    }
}
