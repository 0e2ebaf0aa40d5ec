use crate::background::actors::{CaptureWorker, PruneWorker};
use crate::config::structure::Record;
use crate::operations::fetch::Fetcher;
use log::{error, info};
use std::{future::Future, sync::Arc};
use tokio::{sync::broadcast, task::JoinSet};

/// Owns one capture and one prune task per record for the lifetime of the
/// process, and stops all of them together.
pub struct Orchestrator {
    tasks: JoinSet<()>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Spawn both workers of every record onto the current runtime.
    pub fn start<F: Fetcher>(records: Vec<Record>, fetcher: Arc<F>) -> Self {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut tasks = JoinSet::new();

        for record in records {
            let record = Arc::new(record);
            info!(
                record = record.name.as_str();
                "Starting workers: capture on `{}`, keep {:?}, prune into {}",
                record.source,
                record.retention,
                record
                    .templates()
                    .iter()
                    .map(|template| template.glob_pattern())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let capture = CaptureWorker::new(record.clone(), fetcher.clone());
            tasks.spawn(capture.run(shutdown_tx.subscribe()));

            let prune = PruneWorker::new(record);
            tasks.spawn(prune.run(shutdown_tx.subscribe()));
        }

        Self { tasks, shutdown_tx }
    }

    pub fn worker_count(&self) -> usize {
        self.tasks.len()
    }

    /// Handle that can broadcast shutdown from elsewhere.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until `signal` resolves or every worker has stopped on its own,
    /// then shut the remaining workers down.
    pub async fn run_until(mut self, signal: impl Future<Output = ()>) {
        tokio::select! {
            _ = signal => info!("Shutdown requested"),
            _ = Self::drain(&mut self.tasks) => info!("Every worker has stopped"),
        }
        self.shutdown().await;
    }

    /// Broadcast shutdown and wait for every worker to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        Self::drain(&mut self.tasks).await;
    }

    async fn drain(tasks: &mut JoinSet<()>) {
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!("Worker task ended abnormally: {}", err);
            }
        }
    }
}
