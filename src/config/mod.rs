//! Configuration loading - environment variables into validated records
//!
//! Global settings are plain variables (`RECORDS`, `FETCH_TIMEOUT`,
//! `LOG_LEVEL`); each record reads the variables prefixed with
//! `RECORD_<NAME>_`. Every problem is collected before anything starts.

pub mod structure;

use crate::common::{
    DEFAULT_THUMBNAIL_QUALITY, RECORD_ENV_PREFIX,
    errors::{ConfigError, ConfigReport, RecordError},
};
use crate::operations::duration::parse_duration;
use crate::operations::{schedule::Schedule, template::PathTemplate};
use dotenv::dotenv;
use reqwest::Url;
use std::{collections::HashSet, time::Duration};
use structure::{AppConfig, RawRecord, Record, RecordKind, ThumbnailSpec};

const GLOBAL_SCOPE: &str = "<global>";

/// Variable suffixes read for every record, after `RECORD_<NAME>_`.
const RECORD_FIELDS: [&str; 9] = [
    "TYPE",
    "URL",
    "SCHEDULE",
    "KEEP_TIME",
    "PRUNE_SCHEDULE",
    "FILE_FORMAT",
    "THUMBS_SIZE",
    "THUMBS_FILE_FORMAT",
    "THUMBS_QUALITY",
];

/// Validated process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub record_names: Vec<String>,
    pub fetch_timeout: Duration,
    pub log_level: String,
}

/// Load `.env` (if any) and snapshot the process environment.
pub fn read_environment() -> Vec<(String, String)> {
    dotenv().ok();
    std::env::vars().collect()
}

pub fn load_settings(vars: &[(String, String)]) -> Result<Settings, ConfigReport> {
    let app_config: AppConfig = envy::from_iter(vars.iter().cloned()).map_err(|error| {
        ConfigReport(vec![global_error(ConfigError::Environment(error.to_string()))])
    })?;

    let mut errors = Vec::new();
    let fetch_timeout = check(
        &mut errors,
        parse_duration(&app_config.fetch_timeout).and_then(|timeout| {
            if timeout.is_zero() {
                Err(ConfigError::ZeroFetchTimeout)
            } else {
                Ok(timeout)
            }
        }),
    );
    let record_names = check(&mut errors, validate_names(&app_config.records));

    match (fetch_timeout, record_names) {
        (Some(fetch_timeout), Some(record_names)) if errors.is_empty() => Ok(Settings {
            record_names,
            fetch_timeout,
            log_level: app_config.log_level,
        }),
        _ => Err(ConfigReport(errors.into_iter().map(global_error).collect())),
    }
}

/// Build every record named in `settings`, or report all of their problems.
pub fn load_records(
    settings: &Settings,
    vars: &[(String, String)],
) -> Result<Vec<Record>, ConfigReport> {
    let mut records = Vec::new();
    let mut failures = Vec::new();

    for name in &settings.record_names {
        let prefix = env_prefix(name);
        let raw = envy::prefixed(prefix.as_str())
            .from_iter::<_, RawRecord>(vars.iter().cloned())
            .map_err(|error| {
                vec![ConfigError::Environment(format!(
                    "reading `{prefix}*` variables: {error}"
                ))]
            });

        match raw.and_then(|raw| build_record(name, raw)) {
            Ok(record) => records.push(record),
            Err(errors) => failures.extend(errors.into_iter().map(|source| RecordError {
                record: name.clone(),
                source,
            })),
        }
    }

    if failures.is_empty() {
        Ok(records)
    } else {
        Err(ConfigReport(failures))
    }
}

pub fn env_prefix(name: &str) -> String {
    format!(
        "{RECORD_ENV_PREFIX}{}_",
        name.to_ascii_uppercase().replace('-', "_")
    )
}

fn validate_names(names: &[String]) -> Result<Vec<String>, ConfigError> {
    if names.is_empty() {
        return Err(ConfigError::NoRecords);
    }
    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(names.len());
    for name in names.iter().map(|name| name.trim()) {
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidName(name.to_string()));
        }
        // `cam-1` and `CAM_1` would read the same variables
        if !seen.insert(env_prefix(name)) {
            return Err(ConfigError::DuplicateName(name.to_string()));
        }
        validated.push(name.to_string());
    }
    check_field_overlap(&validated)?;
    Ok(validated)
}

/// With `cam` and `cam_thumbs`, `RECORD_CAM_THUMBS_FILE_FORMAT` is both
/// `cam`'s `THUMBS_FILE_FORMAT` and `cam_thumbs`'s `FILE_FORMAT`.
fn check_field_overlap(names: &[String]) -> Result<(), ConfigError> {
    let variables = |name: &str| {
        let prefix = env_prefix(name);
        RECORD_FIELDS.map(|field| format!("{prefix}{field}"))
    };
    for (index, name) in names.iter().enumerate() {
        let own = variables(name);
        for other in &names[index + 1..] {
            if let Some(variable) = variables(other).into_iter().find(|var| own.contains(var)) {
                return Err(ConfigError::AmbiguousName {
                    name: name.clone(),
                    other: other.clone(),
                    variable,
                });
            }
        }
    }
    Ok(())
}

fn build_record(name: &str, raw: RawRecord) -> Result<Record, Vec<ConfigError>> {
    let mut errors = Vec::new();

    let kind = check(&mut errors, raw.kind.parse::<RecordKind>());
    let source = check(
        &mut errors,
        Url::parse(&raw.url).map_err(|error| ConfigError::InvalidUrl {
            url: raw.url.clone(),
            reason: error.to_string(),
        }),
    );
    let capture_schedule = check(&mut errors, raw.schedule.parse::<Schedule>());
    let retention = check(
        &mut errors,
        parse_duration(&raw.keep_time).and_then(|retention| {
            if retention.is_zero() {
                Err(ConfigError::ZeroRetention)
            } else {
                Ok(retention)
            }
        }),
    );
    let prune_schedule = check(&mut errors, raw.prune_schedule.parse::<Schedule>());
    let path_template = check(&mut errors, PathTemplate::parse(&raw.file_format));
    let thumbnail = check(&mut errors, build_thumbnail(&raw));

    match (
        kind,
        source,
        capture_schedule,
        retention,
        prune_schedule,
        path_template,
        thumbnail,
    ) {
        (
            Some(kind),
            Some(source),
            Some(capture_schedule),
            Some(retention),
            Some(prune_schedule),
            Some(path_template),
            Some(thumbnail),
        ) if errors.is_empty() => Ok(Record {
            name: name.to_string(),
            kind,
            source,
            capture_schedule,
            retention,
            prune_schedule,
            path_template,
            thumbnail,
        }),
        _ => Err(errors),
    }
}

fn build_thumbnail(raw: &RawRecord) -> Result<Option<ThumbnailSpec>, ConfigError> {
    let (size, file_format) = match (&raw.thumbs_size, &raw.thumbs_file_format) {
        (None, None) if raw.thumbs_quality.is_none() => return Ok(None),
        (Some(size), Some(file_format)) => (size, file_format),
        _ => return Err(ConfigError::IncompleteThumbnail),
    };

    let (width, height) = parse_bounding_box(size)?;
    let quality = raw.thumbs_quality.unwrap_or(DEFAULT_THUMBNAIL_QUALITY);
    if !(1..=100).contains(&quality) {
        return Err(ConfigError::InvalidQuality(quality));
    }

    Ok(Some(ThumbnailSpec {
        width,
        height,
        path_template: PathTemplate::parse(file_format)?,
        quality,
    }))
}

fn parse_bounding_box(size: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::InvalidThumbnailSize(size.to_string());
    let (width, height) = size.split_once(',').ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

fn check<T>(errors: &mut Vec<ConfigError>, result: Result<T, ConfigError>) -> Option<T> {
    result.map_err(|error| errors.push(error)).ok()
}

fn global_error(source: ConfigError) -> RecordError {
    RecordError {
        record: GLOBAL_SCOPE.to_string(),
        source,
    }
}
