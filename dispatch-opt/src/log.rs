//! Logger setup: `log` macros are dispatched by `fern` to stdout (info and below) and
//! stderr (warnings and errors), with coloured levels when writing to a terminal.
use anyhow::{Result, anyhow, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::Arguments;
use std::io::IsTerminal;
use std::sync::OnceLock;

/// Environment variable overriding the configured log level
pub const LOG_LEVEL_ENV: &str = "DISPATCH_LOG_LEVEL";

const DEFAULT_LOG_LEVEL: &str = "info";

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Parses one of `off`, `error`, `warn`, `info`, `debug` or `trace`, ignoring case
pub fn parse_log_level(level: &str) -> Result<LevelFilter> {
    let filter = match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {}", unknown),
    };
    Ok(filter)
}

/// Level from `DISPATCH_LOG_LEVEL` if set, else from the configuration, else `info`
fn resolve_log_level(from_config: Option<&str>) -> Result<LevelFilter> {
    match env::var(LOG_LEVEL_ENV) {
        Ok(level) => parse_log_level(&level),
        Err(_) => parse_log_level(from_config.unwrap_or(DEFAULT_LOG_LEVEL)),
    }
}

/// Installs the global logger. Fails if a logger is already installed.
pub fn init(log_level_from_config: Option<&str>) -> Result<()> {
    let log_level = resolve_log_level(log_level_from_config)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let colour_stdout = std::io::stdout().is_terminal();
    let colour_stderr = std::io::stderr().is_terminal();

    Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    format_record(out, message, record, colour_stdout.then_some(&colours));
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            Dispatch::new()
                .format(move |out, message, record| {
                    format_record(out, message, record, colour_stderr.then_some(&colours));
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        )
        .apply()
        .map_err(|err| anyhow!("Failed to install logger: {}", err))?;

    LOGGER_INIT.get_or_init(|| ());
    Ok(())
}

fn format_record(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    colours: Option<&ColoredLevelConfig>,
) {
    let timestamp = Local::now().format("%H:%M:%S");
    let target = record.target();
    match colours {
        Some(colours) => {
            let level = colours.color(record.level());
            out.finish(format_args!("[{timestamp} {level} {target}] {message}"))
        }
        None => {
            let level = record.level();
            out.finish(format_args!("[{timestamp} {level} {target}] {message}"))
        }
    }
}
