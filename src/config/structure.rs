use crate::common::{DEFAULT_FETCH_TIMEOUT, DEFAULT_LOG_LEVEL, errors::ConfigError};
use crate::operations::{schedule::Schedule, template::PathTemplate};
use reqwest::Url;
use serde::Deserialize;
use std::{str::FromStr, time::Duration};

/// Process-wide settings, read from unprefixed environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Names of the records to load (`RECORDS=cam1,cam2`)
    #[serde(default)]
    pub records: Vec<String>,
    /// Timeout for one snapshot request
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: String,
    /// `env_logger` filter string
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_fetch_timeout() -> String {
    DEFAULT_FETCH_TIMEOUT.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            fetch_timeout: default_fetch_timeout(),
            log_level: default_log_level(),
        }
    }
}

/// One record as written in the environment, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub schedule: String,
    pub keep_time: String,
    pub prune_schedule: String,
    pub file_format: String,
    pub thumbs_size: Option<String>,
    pub thumbs_file_format: Option<String>,
    pub thumbs_quality: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Snapshot,
}

impl FromStr for RecordKind {
    type Err = ConfigError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            "snapshot" => Ok(RecordKind::Snapshot),
            other => Err(ConfigError::UnsupportedKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailSpec {
    /// Bounding box width
    pub width: u32,
    /// Bounding box height
    pub height: u32,
    pub path_template: PathTemplate,
    /// JPEG quality, 1..=100
    pub quality: u8,
}

/// A validated, immutable capture and retention policy.
#[derive(Debug, Clone)]
pub struct Record {
    pub name: String,
    pub kind: RecordKind,
    pub source: Url,
    pub capture_schedule: Schedule,
    pub retention: Duration,
    pub prune_schedule: Schedule,
    pub path_template: PathTemplate,
    pub thumbnail: Option<ThumbnailSpec>,
}

impl Record {
    /// Every template whose expansions belong to this record.
    pub fn templates(&self) -> Vec<&PathTemplate> {
        let mut templates = vec![&self.path_template];
        if let Some(thumbnail) = &self.thumbnail {
            templates.push(&thumbnail.path_template);
        }
        templates
    }
}
