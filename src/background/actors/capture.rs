//! Capture worker - fetch, persist and thumbnail one snapshot per cycle

use crate::background::events::{Action, CycleLog};
use crate::background::sleep_until;
use crate::common::errors::CaptureError;
use crate::config::structure::Record;
use crate::operations::{
    fetch::Fetcher, template::TemplateParams, thumbnail::generate_thumbnail,
};
use chrono::{DateTime, Local};
use log::warn;
use std::{path::PathBuf, sync::Arc};
use tokio::{sync::broadcast, task::spawn_blocking};

/// Paths written by one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutput {
    pub snapshot: PathBuf,
    pub thumbnail: Option<PathBuf>,
}

pub struct CaptureWorker<F> {
    record: Arc<Record>,
    fetcher: Arc<F>,
    snapshot_log: CycleLog,
    thumbnail_log: CycleLog,
}

impl<F: Fetcher> CaptureWorker<F> {
    pub fn new(record: Arc<Record>, fetcher: Arc<F>) -> Self {
        let snapshot_log = CycleLog::new(record.name.as_str(), Action::Snapshot);
        let thumbnail_log = CycleLog::new(record.name.as_str(), Action::SnapshotThumb);
        Self {
            record,
            fetcher,
            snapshot_log,
            thumbnail_log,
        }
    }

    /// Run cycles at every resolved instant until shutdown is broadcast.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut last_run: Option<DateTime<Local>> = None;
        loop {
            let now = Local::now();
            let Some(next) = self
                .record
                .capture_schedule
                .next_after(&now, last_run.as_ref())
            else {
                warn!(
                    record = self.record.name.as_str(),
                    action = Action::Snapshot.as_str();
                    "Capture schedule has no future instant, stopping"
                );
                return;
            };

            if !sleep_until(&next, &mut shutdown).await {
                return;
            }
            last_run = Some(next);
            // errors are logged inside; the next cycle is scheduled regardless
            let _ = self.run_cycle(Local::now()).await;
        }
    }

    /// One capture cycle. Every failure is logged and returned; nothing here
    /// affects later cycles.
    pub async fn run_cycle(&self, now: DateTime<Local>) -> Result<CaptureOutput, CaptureError> {
        let params = TemplateParams::from_instant(&now);

        let started = self.snapshot_log.starting();
        let (snapshot, bytes) = match self.capture_snapshot(&params).await {
            Ok(captured) => captured,
            Err(err) => {
                self.snapshot_log.failure(started, &err);
                return Err(err);
            }
        };
        self.snapshot_log.success(
            started,
            format_args!("Saved {} bytes to {:?}", bytes.len(), snapshot),
        );

        let Some(thumbnail) = &self.record.thumbnail else {
            return Ok(CaptureOutput {
                snapshot,
                thumbnail: None,
            });
        };

        let started = self.thumbnail_log.starting();
        let target = thumbnail.path_template.render(&params);
        let spec = thumbnail.clone();
        let blocking_target = target.clone();
        let result = spawn_blocking(move || generate_thumbnail(&bytes, &spec, &blocking_target))
            .await
            .unwrap_or_else(|join_error| {
                Err(CaptureError::storage(
                    target.clone(),
                    std::io::Error::other(join_error),
                ))
            });

        match result {
            Ok((width, height)) => {
                self.thumbnail_log.success(
                    started,
                    format_args!("Saved {}x{} thumbnail to {:?}", width, height, target),
                );
                Ok(CaptureOutput {
                    snapshot,
                    thumbnail: Some(target),
                })
            }
            Err(err) => {
                self.thumbnail_log.failure(started, &err);
                Err(err)
            }
        }
    }

    async fn capture_snapshot(
        &self,
        params: &TemplateParams,
    ) -> Result<(PathBuf, Vec<u8>), CaptureError> {
        let bytes = self.fetcher.fetch(&self.record.source).await?;
        let path = self.record.path_template.render(params);

        let write_path = path.clone();
        spawn_blocking(move || -> Result<Vec<u8>, CaptureError> {
            if let Some(parent) = write_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|error| CaptureError::storage(parent, error))?;
            }
            std::fs::write(&write_path, &bytes)
                .map_err(|error| CaptureError::storage(&write_path, error))?;
            Ok(bytes)
        })
        .await
        .unwrap_or_else(|join_error| {
            Err(CaptureError::storage(
                path.clone(),
                std::io::Error::other(join_error),
            ))
        })
        .map(|bytes| (path, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::structure::{RecordKind, ThumbnailSpec};
    use crate::operations::{schedule::Schedule, template::PathTemplate};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use pretty_assertions::assert_eq;
    use reqwest::Url;
    use std::{
        future::Future,
        io::Cursor,
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    /// Fails the first `failures` calls, then returns `body`.
    struct ScriptedFetcher {
        failures: usize,
        calls: AtomicUsize,
        body: Vec<u8>,
        notify: mpsc::UnboundedSender<usize>,
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.notify.send(call);
            let result = if call < self.failures {
                Err(CaptureError::fetch(
                    url.as_str(),
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "simulated"),
                ))
            } else {
                Ok(self.body.clone())
            };
            async move { result }
        }
    }

    fn scripted(failures: usize, body: Vec<u8>) -> (Arc<ScriptedFetcher>, mpsc::UnboundedReceiver<usize>) {
        let (notify, calls) = mpsc::unbounded_channel();
        let fetcher = ScriptedFetcher {
            failures,
            calls: AtomicUsize::new(0),
            body,
            notify,
        };
        (Arc::new(fetcher), calls)
    }

    fn record(root: &Path, schedule: &str, thumbnail: Option<ThumbnailSpec>) -> Arc<Record> {
        Arc::new(Record {
            name: "cam1".into(),
            kind: RecordKind::Snapshot,
            source: Url::parse("http://camera.local/snap.cgi").unwrap(),
            capture_schedule: schedule.parse::<Schedule>().unwrap(),
            retention: Duration::from_secs(900),
            prune_schedule: "30m".parse::<Schedule>().unwrap(),
            path_template: PathTemplate::parse(&format!(
                "{}/{{date}}/{{datetime}}.jpg",
                root.display()
            ))
            .unwrap(),
            thumbnail,
        })
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn cycle_writes_snapshot_to_templated_path() {
        let dir = tempdir().unwrap();
        let (fetcher, _calls) = scripted(0, b"jpeg".to_vec());
        let worker = CaptureWorker::new(record(dir.path(), "1m", None), fetcher);
        let now = Local::now();

        let output = worker.run_cycle(now).await.unwrap();

        let params = TemplateParams::from_instant(&now);
        let expected = dir
            .path()
            .join(&params.date)
            .join(format!("{}.jpg", params.datetime));
        assert_eq!(output.snapshot, expected);
        assert_eq!(output.thumbnail, None);
        assert_eq!(std::fs::read(&expected).unwrap(), b"jpeg".to_vec());
    }

    #[tokio::test]
    async fn failed_fetch_writes_nothing() {
        let dir = tempdir().unwrap();
        let (fetcher, _calls) = scripted(1, b"jpeg".to_vec());
        let worker = CaptureWorker::new(record(dir.path(), "1m", None), fetcher);

        let result = worker.run_cycle(Local::now()).await;

        assert!(matches!(result, Err(CaptureError::Fetch { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn thumbnail_uses_same_instant_as_snapshot() {
        let dir = tempdir().unwrap();
        let thumbnail = ThumbnailSpec {
            width: 64,
            height: 64,
            path_template: PathTemplate::parse(&format!(
                "{}/thumbs/{{date}}/{{datetime}}.jpg",
                dir.path().display()
            ))
            .unwrap(),
            quality: 75,
        };
        let (fetcher, _calls) = scripted(0, png_bytes(256, 128));
        let worker = CaptureWorker::new(record(dir.path(), "1m", Some(thumbnail)), fetcher);

        let output = worker.run_cycle(Local::now()).await.unwrap();

        let thumb = output.thumbnail.unwrap();
        assert_eq!(thumb.file_name(), output.snapshot.file_name());
        let decoded = image::open(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }

    #[tokio::test]
    async fn thumbnail_failure_keeps_primary_artifact() {
        let dir = tempdir().unwrap();
        let thumbnail = ThumbnailSpec {
            width: 64,
            height: 64,
            path_template: PathTemplate::parse(&format!(
                "{}/thumbs/{{datetime}}.jpg",
                dir.path().display()
            ))
            .unwrap(),
            quality: 75,
        };
        let (fetcher, _calls) = scripted(0, b"not an image".to_vec());
        let worker = CaptureWorker::new(record(dir.path(), "1m", Some(thumbnail)), fetcher);
        let now = Local::now();

        let result = worker.run_cycle(now).await;

        assert!(matches!(result, Err(CaptureError::Thumbnail { .. })));
        let snapshot = worker.record.path_template.expand(&now);
        assert!(snapshot.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_does_not_stop_the_loop() {
        let dir = tempdir().unwrap();
        let (fetcher, mut calls) = scripted(1, b"jpeg".to_vec());
        let worker = CaptureWorker::new(record(dir.path(), "1s", None), fetcher.clone());
        let (shutdown, receiver) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(receiver));

        assert_eq!(calls.recv().await, Some(0));
        assert_eq!(calls.recv().await, Some(1));

        shutdown.send(()).unwrap();
        handle.await.unwrap();
        assert!(fetcher.calls.load(Ordering::SeqCst) >= 2);
    }
}
