use std::error::Error as StdError;
use std::path::PathBuf;

use log::error;
use thiserror::Error;

/// Log an error with its whole context chain and hand it back to the caller.
pub fn handle_error(error: anyhow::Error) -> anyhow::Error {
    error!("{:?}", error);
    error
}

// ────────────────────────────────────────────────────────────────
// Configuration errors
// ────────────────────────────────────────────────────────────────

/// A malformed or missing record field. Fatal at load time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid duration `{0}`: expected digits followed by one of s, m, h, d, w")]
    InvalidDuration(String),
    #[error("duration `{0}` is too large")]
    DurationOverflow(String),
    #[error("retention window must be greater than zero")]
    ZeroRetention,
    #[error("fetch timeout must be greater than zero")]
    ZeroFetchTimeout,
    #[error("schedule list is empty")]
    EmptySchedule,
    #[error("invalid schedule entry `{entry}`: {reason}")]
    InvalidSchedule { entry: String, reason: String },
    #[error("unsupported record type `{0}`, only `snapshot` is supported")]
    UnsupportedKind(String),
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("path template is empty")]
    EmptyTemplate,
    #[error("invalid path template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("unknown placeholder `{placeholder}` in template `{template}`")]
    UnknownPlaceholder {
        template: String,
        placeholder: String,
    },
    #[error("invalid thumbnail size `{0}`, expected `W,H` with positive integers")]
    InvalidThumbnailSize(String),
    #[error("thumbnail quality {0} is outside 1..=100")]
    InvalidQuality(u8),
    #[error("thumbnail settings are incomplete: `THUMBS_SIZE` and `THUMBS_FILE_FORMAT` must be set together")]
    IncompleteThumbnail,
    #[error("record name is empty")]
    EmptyName,
    #[error("record name `{0}` may only contain letters, digits, `-` and `_`")]
    InvalidName(String),
    #[error("record `{0}` is declared more than once")]
    DuplicateName(String),
    #[error("records `{name}` and `{other}` would both read `{variable}`")]
    AmbiguousName {
        name: String,
        other: String,
        variable: String,
    },
    #[error("no records configured, set `RECORDS`")]
    NoRecords,
    #[error("{0}")]
    Environment(String),
}

/// A configuration error attributed to the record (or the global settings) it came from.
#[derive(Debug, Error)]
#[error("record `{record}`: {source}")]
pub struct RecordError {
    pub record: String,
    #[source]
    pub source: ConfigError,
}

/// Every configuration error found during one load.
#[derive(Debug, Error)]
#[error("{} configuration error(s) found", .0.len())]
pub struct ConfigReport(pub Vec<RecordError>);

// ────────────────────────────────────────────────────────────────
// Capture cycle errors
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("fetching {url} failed")]
    Fetch {
        url: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
    #[error("storage failure at {path:?}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("thumbnail generation failed for {path:?}")]
    Thumbnail {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl CaptureError {
    pub fn fetch(url: impl Into<String>, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Fetch {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
