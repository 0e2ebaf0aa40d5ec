//! Path templates - `{date}`, `{time}` and `{datetime}` placeholders
//!
//! Includes:
//! - Expansion from one captured instant
//! - Glob pattern derivation
//! - Matcher and scan root used to enumerate existing artifacts

use crate::common::errors::ConfigError;
use chrono::{DateTime, TimeZone};
use regex::Regex;
use std::{
    fmt::{self, Display},
    path::{MAIN_SEPARATOR, Path, PathBuf},
    sync::LazyLock,
};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("placeholder pattern is valid"));

const KNOWN_PLACEHOLDERS: &[&str] = &["{date}", "{time}", "{datetime}"];

/// Time-derived values for one capture event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParams {
    pub date: String,
    pub time: String,
    pub datetime: String,
}

impl TemplateParams {
    pub fn from_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self
    where
        Tz::Offset: Display,
    {
        Self {
            date: instant.format("%Y-%m-%d").to_string(),
            time: instant.format("%H-%M-%S").to_string(),
            datetime: instant.format("%Y-%m-%dT%H-%M-%S").to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    scan_root: PathBuf,
    depth: usize,
    matcher: Regex,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate);
        }
        if let Some(unknown) = PLACEHOLDER
            .find_iter(raw)
            .find(|found| !KNOWN_PLACEHOLDERS.contains(&found.as_str()))
        {
            return Err(ConfigError::UnknownPlaceholder {
                template: raw.to_string(),
                placeholder: unknown.as_str().to_string(),
            });
        }

        // Split at the last separator before the first placeholder: everything
        // before it is a fixed directory, everything after it is matched.
        let first_placeholder = PLACEHOLDER.find(raw).map_or(raw.len(), |found| found.start());
        let (scan_root, relative) = match raw[..first_placeholder].rfind(MAIN_SEPARATOR) {
            Some(0) => (PathBuf::from(MAIN_SEPARATOR.to_string()), &raw[1..]),
            Some(index) => (PathBuf::from(&raw[..index]), &raw[index + 1..]),
            None => (PathBuf::from("."), raw),
        };

        let separator = regex::escape(&MAIN_SEPARATOR.to_string());
        let mut pattern = String::from("^");
        let mut cursor = 0;
        for found in PLACEHOLDER.find_iter(relative) {
            pattern.push_str(&regex::escape(&relative[cursor..found.start()]));
            pattern.push_str(&format!("[^{separator}]*"));
            cursor = found.end();
        }
        pattern.push_str(&regex::escape(&relative[cursor..]));
        pattern.push('$');

        let matcher = Regex::new(&pattern).map_err(|error| ConfigError::InvalidTemplate {
            template: raw.to_string(),
            reason: error.to_string(),
        })?;

        Ok(Self {
            raw: raw.to_string(),
            scan_root,
            depth: relative.split(MAIN_SEPARATOR).count(),
            matcher,
        })
    }

    /// Substitute every placeholder with the matching captured value.
    pub fn render(&self, params: &TemplateParams) -> PathBuf {
        let rendered = PLACEHOLDER.replace_all(&self.raw, |caps: &regex::Captures| {
            match &caps[0] {
                "{date}" => params.date.clone(),
                "{time}" => params.time.clone(),
                "{datetime}" => params.datetime.clone(),
                other => other.to_string(),
            }
        });
        PathBuf::from(rendered.into_owned())
    }

    pub fn expand<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: Display,
    {
        self.render(&TemplateParams::from_instant(instant))
    }

    /// Every placeholder replaced with a single `*`.
    pub fn glob_pattern(&self) -> String {
        PLACEHOLDER.replace_all(&self.raw, "*").into_owned()
    }

    /// Deepest fixed directory the template can expand under.
    pub fn scan_root(&self) -> &Path {
        &self.scan_root
    }

    /// Number of path components between the scan root and an artifact.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether `path`, found under the scan root, is an expansion of this template.
    pub fn matches(&self, path: &Path) -> bool {
        path.strip_prefix(&self.scan_root)
            .map(|relative| self.matcher.is_match(&relative.to_string_lossy()))
            .unwrap_or(false)
    }
}

impl Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
