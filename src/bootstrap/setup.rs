//! Setup/initialization module - handles application startup tasks
//!
//! Includes:
//! - Logger initialization
//! - Configuration loading and reporting

use crate::common::errors::ConfigReport;
use crate::config::{Settings, load_records, load_settings, read_environment, structure::Record};
use anstyle::{AnsiColor, Style};
use env_logger::{Builder, WriteStyle};
use log::{error, info, kv::Key};
use std::io::Write;

// ────────────────────────────────────────────────────────────────
// Logger Initialization
// ────────────────────────────────────────────────────────────────

const DIM: Style = Style::new().dimmed();
const CYAN: Style = AnsiColor::Cyan.on_default();

/// Install the process-wide logger. `filters` uses the `env_logger` syntax,
/// e.g. `info` or `warn,camshot::operations::retention=debug`.
pub fn initialize_logger(filters: &str) {
    Builder::new()
        .write_style(WriteStyle::Auto)
        .format(|buf, record| {
            let level_style = buf.default_level_style(record.level());
            let key_values = record.key_values();
            let field = |name: &'static str| {
                key_values
                    .get(Key::from(name))
                    .map(|value| value.to_string())
            };

            // `[record action status]`, keeping only what the event carries
            let scope: Vec<String> = ["record", "action", "status"]
                .into_iter()
                .filter_map(|name| field(name))
                .collect();
            let scope = if scope.is_empty() {
                String::new()
            } else {
                format!(" [{}]", scope.join(" "))
            };

            let duration = field("duration")
                .map(|duration| format!(" {CYAN}({duration}){CYAN:#}"))
                .unwrap_or_default();

            writeln!(
                buf,
                "{DIM}{}{DIM:#} {level_style}{:<5}{level_style:#} {DIM}{}{DIM:#}{}{} {}",
                buf.timestamp(),
                record.level(),
                record.target(),
                scope,
                duration,
                record.args()
            )
        })
        .parse_filters(filters)
        .init();
}

// ────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────

fn report(config_report: &ConfigReport) {
    for record_error in &config_report.0 {
        error!("{}", record_error);
    }
    error!("{}, no worker was started", config_report);
}

/// Read the environment, start logging, and validate every record.
/// Configuration problems are logged and returned as one report.
pub fn initialize() -> Result<(Settings, Vec<Record>), ConfigReport> {
    let vars = read_environment();

    let settings = match load_settings(&vars) {
        Ok(settings) => settings,
        Err(config_report) => {
            initialize_logger(crate::common::DEFAULT_LOG_LEVEL);
            report(&config_report);
            return Err(config_report);
        }
    };
    initialize_logger(&settings.log_level);

    let records = load_records(&settings, &vars).inspect_err(report)?;
    info!(
        "Loaded {} record(s), fetch timeout {:?}",
        records.len(),
        settings.fetch_timeout
    );
    Ok((settings, records))
}
