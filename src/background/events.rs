use log::{error, info};
use std::{error::Error as StdError, fmt, sync::Arc, time::Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Snapshot,
    SnapshotThumb,
    Prune,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Snapshot => "snapshot",
            Action::SnapshotThumb => "snapshot-thumb",
            Action::Prune => "prune",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured cycle events for one record and action.
///
/// Every event carries the `record`, `action` and `status` keys; the
/// formatter installed at startup renders them in front of the message.
#[derive(Debug, Clone)]
pub struct CycleLog {
    record: Arc<str>,
    action: Action,
}

impl CycleLog {
    pub fn new(record: impl Into<Arc<str>>, action: Action) -> Self {
        Self {
            record: record.into(),
            action,
        }
    }

    pub fn starting(&self) -> Instant {
        info!(
            record = &*self.record,
            action = self.action.as_str(),
            status = "starting";
            "{} cycle starting", self.action
        );
        Instant::now()
    }

    pub fn success(&self, started: Instant, details: fmt::Arguments<'_>) {
        info!(
            record = &*self.record,
            action = self.action.as_str(),
            status = "success",
            duration = &*format!("{:?}", started.elapsed());
            "{}", details
        );
    }

    pub fn failure(&self, started: Instant, error: &(dyn StdError + 'static)) {
        error!(
            record = &*self.record,
            action = self.action.as_str(),
            status = "failure",
            duration = &*format!("{:?}", started.elapsed());
            "{}", error_chain(error)
        );
    }
}

/// Render an error and all of its sources on one line.
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
