//! stderr diagnostics for the CLI. Libraries only emit events; the subscriber
//! lives here.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Environment variable read when `--log-level` is absent.
pub const LOG_LEVEL_ENV: &str = "SKYLINK_LOG";

/// Environment variable read when `--log-format` is absent.
pub const LOG_FORMAT_ENV: &str = "SKYLINK_LOG_FORMAT";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    /// One JSON object per event, for log shippers on the ground station.
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    /// Per-chunk and per-packet events from the pipeline crates.
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// At debug and below, events from klv, ts, fragment and transport are
    /// interleaved, so the emitting module is printed with each line.
    pub fn shows_targets(self) -> bool {
        self >= LogLevel::Debug
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(level.shows_targets());

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
